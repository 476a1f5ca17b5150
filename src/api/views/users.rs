use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::api::gate::CurrentUser;
use crate::db::{UserFilter, UserStore};
use crate::error::{AppError, AuthError, DatabaseError};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

/// `me` names the authenticated user; anything else must be a user id.
fn parse_user_id(raw: &str, current: Option<&CurrentUser>) -> Result<Uuid, AppError> {
    if raw == "me" {
        return current
            .map(|CurrentUser(user)| user.id)
            .ok_or_else(|| DatabaseError::NotFound.into());
    }
    Uuid::parse_str(raw).map_err(|_| DatabaseError::NotFound.into())
}

pub async fn list_users(state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let users = state.db.list_users().await?;
    Ok(HttpResponse::Ok().json(users))
}

pub async fn get_user(
    path: web::Path<String>,
    current: Option<CurrentUser>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let user_id = parse_user_id(&path, current.as_ref())?;
    let user = state.db.find_user_by(&UserFilter::Id(user_id)).await?;
    Ok(HttpResponse::Ok().json(user))
}

pub async fn create_user(
    body: web::Json<CreateUserRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let email = body
        .email
        .as_deref()
        .filter(|email| !email.is_empty())
        .ok_or_else(|| AppError::ValidationError("email missing".into()))?;
    let password = body
        .password
        .as_deref()
        .filter(|password| !password.is_empty())
        .ok_or_else(|| AppError::ValidationError("password missing".into()))?;

    match state.auth_service.register_user(email, password).await {
        Ok(user) => Ok(HttpResponse::Created().json(user)),
        Err(AppError::AuthError(AuthError::EmailAlreadyRegistered(_))) => {
            Err(AppError::ValidationError("email already registered".into()))
        }
        Err(e) => Err(e),
    }
}

pub async fn delete_user(
    path: web::Path<String>,
    current: Option<CurrentUser>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let user_id = parse_user_id(&path, current.as_ref())?;
    state.db.delete_user(user_id).await?;
    info!("Deleted user {}", user_id);
    Ok(HttpResponse::Ok().json(json!({})))
}
