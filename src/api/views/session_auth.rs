use actix_web::cookie::Cookie;
use actix_web::{web, HttpRequest, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use crate::api::auth::RequestCredentials;
use crate::auth::verify_password;
use crate::db::UserStore;
use crate::error::{AppError, AuthError};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct SessionLoginForm {
    pub email: Option<String>,
    pub password: Option<String>,
}

fn error_body(message: &str) -> serde_json::Value {
    json!({ "error": message })
}

pub async fn login(
    form: web::Form<SessionLoginForm>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let Some(email) = form.email.as_deref().filter(|email| !email.is_empty()) else {
        return Ok(HttpResponse::BadRequest().json(error_body("email missing")));
    };
    let Some(password) = form.password.as_deref().filter(|password| !password.is_empty()) else {
        return Ok(HttpResponse::BadRequest().json(error_body("password missing")));
    };

    let authenticator = state
        .authenticator
        .as_ref()
        .ok_or(AuthError::SessionsUnsupported)?;

    let users = state.db.find_users_by_email(email).await?;
    if users.is_empty() {
        return Ok(HttpResponse::NotFound().json(error_body("no user found for this email")));
    }

    let Some(user) = users
        .into_iter()
        .find(|user| verify_password(password, &user.hashed_password))
    else {
        warn!("Wrong password for {}", email);
        return Ok(HttpResponse::Unauthorized().json(error_body("wrong password")));
    };

    let session_id = authenticator
        .create_session(user.id)
        .await?
        .ok_or(AuthError::SessionsUnsupported)?;
    info!("Session opened for user {} via {}", user.id, authenticator.name());

    let cookie = Cookie::build(state.config.auth.session_name.clone(), session_id)
        .path("/")
        .http_only(true)
        .finish();
    Ok(HttpResponse::Ok().cookie(cookie).json(user))
}

pub async fn logout(req: HttpRequest, state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let authenticator = state
        .authenticator
        .as_ref()
        .ok_or(AuthError::SessionsUnsupported)?;

    let credentials = RequestCredentials::from_request(&req, &state.config.auth.session_name);
    if !authenticator.destroy_session(&credentials).await? {
        return Ok(HttpResponse::NotFound().json(error_body("Not found")));
    }
    Ok(HttpResponse::Ok().json(json!({})))
}
