use actix_web::cookie::Cookie;
use actix_web::http::header;
use actix_web::{web, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{AppError, AuthError};
use crate::AppState;

pub const SESSION_COOKIE: &str = "session_id";

#[derive(Debug, Deserialize)]
pub struct CredentialsForm {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ResetRequestForm {
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PasswordUpdateForm {
    pub email: Option<String>,
    pub reset_token: Option<String>,
    pub new_password: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct EmailMessage {
    pub email: String,
    pub message: String,
}

impl EmailMessage {
    fn new(email: impl Into<String>, message: &str) -> Self {
        Self {
            email: email.into(),
            message: message.to_string(),
        }
    }
}

pub async fn index() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({ "message": "Bienvenue" }))
}

pub async fn register_user(
    form: web::Form<CredentialsForm>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let (Some(email), Some(password)) = (form.email.as_deref(), form.password.as_deref()) else {
        return Ok(HttpResponse::BadRequest().json(serde_json::json!({
            "message": "email and password are required"
        })));
    };

    match state.auth_service.register_user(email, password).await {
        Ok(user) => Ok(HttpResponse::Ok().json(EmailMessage::new(user.email, "user created"))),
        Err(AppError::AuthError(AuthError::EmailAlreadyRegistered(_))) => {
            warn!("Registration refused for already registered email");
            Ok(HttpResponse::BadRequest().json(serde_json::json!({
                "message": "email already registered"
            })))
        }
        Err(e) => Err(e),
    }
}

pub async fn login(
    form: web::Form<CredentialsForm>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let email = form.email.as_deref().unwrap_or_default();
    let password = form.password.as_deref().unwrap_or_default();

    if !state.auth_service.valid_login(email, password).await? {
        info!("Login failed for {}", email);
        return Err(AuthError::Unauthorized.into());
    }

    let session_id = state
        .auth_service
        .create_session(email)
        .await?
        .ok_or(AuthError::Unauthorized)?;

    info!("Login successful for {}", email);
    Ok(HttpResponse::Ok()
        .cookie(Cookie::build(SESSION_COOKIE, session_id).path("/").http_only(true).finish())
        .json(EmailMessage::new(email, "logged in")))
}

pub async fn logout(req: HttpRequest, state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let session_id = req.cookie(SESSION_COOKIE).map(|c| c.value().to_string());
    let user = state
        .auth_service
        .get_user_from_session_id(session_id.as_deref())
        .await?
        .ok_or(AuthError::Forbidden)?;

    state.auth_service.destroy_session(user.id).await?;
    info!("Logged out user {}", user.id);

    Ok(HttpResponse::Found()
        .insert_header((header::LOCATION, "/"))
        .finish())
}

pub async fn profile(req: HttpRequest, state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let session_id = req.cookie(SESSION_COOKIE).map(|c| c.value().to_string());
    let user = state
        .auth_service
        .get_user_from_session_id(session_id.as_deref())
        .await?
        .ok_or(AuthError::Forbidden)?;

    Ok(HttpResponse::Ok().json(serde_json::json!({ "email": user.email })))
}

pub async fn get_reset_password_token(
    form: web::Form<ResetRequestForm>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let email = form.email.as_deref().ok_or(AuthError::UnknownEmail)?;
    let reset_token = state.auth_service.get_reset_password_token(email).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "email": email,
        "reset_token": reset_token,
    })))
}

pub async fn update_password(
    form: web::Form<PasswordUpdateForm>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let reset_token = form.reset_token.as_deref().ok_or(AuthError::InvalidResetToken)?;
    let new_password = form.new_password.as_deref().ok_or(AuthError::InvalidResetToken)?;

    state.auth_service.update_password(reset_token, new_password).await?;

    Ok(HttpResponse::Ok().json(EmailMessage::new(
        form.email.clone().unwrap_or_default(),
        "Password updated",
    )))
}
