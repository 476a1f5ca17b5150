use actix_web::{web, HttpResponse};
use serde_json::json;

use crate::error::{AppError, AuthError};
use crate::AppState;

pub async fn status() -> HttpResponse {
    HttpResponse::Ok().json(json!({ "status": "OK" }))
}

pub async fn stats(state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let users = state.db.count_users().await?;
    Ok(HttpResponse::Ok().json(json!({ "users": users })))
}

pub async fn unauthorized() -> Result<HttpResponse, AppError> {
    Err(AuthError::Unauthorized.into())
}

pub async fn forbidden() -> Result<HttpResponse, AppError> {
    Err(AuthError::Forbidden.into())
}
