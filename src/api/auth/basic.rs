use std::sync::Arc;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use tracing::debug;

use super::{Authenticator, RequestCredentials};
use crate::auth::verify_password;
use crate::db::{User, UserStore};
use crate::error::AppError;

/// The base64 payload of a `Basic` authorization header.
pub fn extract_base64_authorization_header(authorization: &str) -> Option<&str> {
    authorization.strip_prefix("Basic ")
}

/// `None` unless the payload is valid base64 holding UTF-8 text.
pub fn decode_base64_authorization_header(encoded: &str) -> Option<String> {
    let bytes = BASE64.decode(encoded).ok()?;
    String::from_utf8(bytes).ok()
}

/// Splits `email:password` at the first colon; the password may contain more.
pub fn extract_user_credentials(decoded: &str) -> Option<(&str, &str)> {
    decoded.split_once(':')
}

/// Credentials sent with every request as `Authorization: Basic ...`.
pub struct BasicAuth {
    users: Arc<dyn UserStore>,
}

impl BasicAuth {
    pub fn new(users: Arc<dyn UserStore>) -> Self {
        Self { users }
    }

    /// First user registered under `email` whose password matches.
    pub async fn user_object_from_credentials(&self, email: &str, password: &str) -> Result<Option<User>, AppError> {
        let candidates = self.users.find_users_by_email(email).await?;
        Ok(candidates
            .into_iter()
            .find(|user| verify_password(password, &user.hashed_password)))
    }
}

#[async_trait]
impl Authenticator for BasicAuth {
    fn name(&self) -> &'static str {
        "basic_auth"
    }

    async fn current_user(&self, credentials: &RequestCredentials) -> Result<Option<User>, AppError> {
        let Some(decoded) = credentials
            .authorization
            .as_deref()
            .and_then(extract_base64_authorization_header)
            .and_then(decode_base64_authorization_header)
        else {
            debug!("Missing or malformed Basic authorization header");
            return Ok(None);
        };

        match extract_user_credentials(&decoded) {
            Some((email, password)) => self.user_object_from_credentials(email, password).await,
            None => Ok(None),
        }
    }
}
