//! Request authenticators for the `/api/v1` scope.
//!
//! Every authenticator answers the same question, "which user sent this
//! request?", from the credentials a request carries. Session-capable ones
//! can also issue and revoke session ids.

mod basic;
mod session;
mod session_db;

pub use basic::{
    decode_base64_authorization_header, extract_base64_authorization_header,
    extract_user_credentials, BasicAuth,
};
pub use session::SessionAuth;
pub use session_db::SessionDbAuth;

use std::sync::Arc;

use actix_web::http::header;
use actix_web::HttpRequest;
use async_trait::async_trait;
use uuid::Uuid;

use crate::config::{AuthConfig, AuthType};
use crate::db::{DbOperations, User, UserStore};
use crate::error::AppError;

/// Credentials captured from a request before any await point.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestCredentials {
    pub authorization: Option<String>,
    pub session_id: Option<String>,
}

impl RequestCredentials {
    pub fn from_request(req: &HttpRequest, cookie_name: &str) -> Self {
        Self {
            authorization: req
                .headers()
                .get(header::AUTHORIZATION)
                .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned()),
            session_id: req.cookie(cookie_name).map(|c| c.value().to_string()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.authorization.is_none() && self.session_id.is_none()
    }
}

/// Whether `path` needs credentials. Trailing slashes are ignored and an
/// excluded entry ending in `*` matches every path with that prefix.
pub fn require_auth(path: &str, excluded_paths: &[String]) -> bool {
    if excluded_paths.is_empty() {
        return true;
    }

    let path = path.trim_end_matches('/');
    !excluded_paths.iter().any(|excluded| match excluded.strip_suffix('*') {
        Some(prefix) => path.starts_with(prefix),
        None => excluded.trim_end_matches('/') == path,
    })
}

#[async_trait]
pub trait Authenticator: Send + Sync {
    fn name(&self) -> &'static str;

    async fn current_user(&self, credentials: &RequestCredentials) -> Result<Option<User>, AppError>;

    /// `None` when this authenticator does not issue sessions.
    async fn create_session(&self, _user_id: Uuid) -> Result<Option<String>, AppError> {
        Ok(None)
    }

    /// Revokes the session named by the request cookie. Returns whether
    /// anything was revoked.
    async fn destroy_session(&self, _credentials: &RequestCredentials) -> Result<bool, AppError> {
        Ok(false)
    }

    /// Drops expired sessions, returning how many were removed.
    async fn cleanup_expired(&self) -> Result<u64, AppError> {
        Ok(0)
    }
}

/// Gate-only authenticator: protected paths are reachable by nobody.
pub struct BaseAuth;

#[async_trait]
impl Authenticator for BaseAuth {
    fn name(&self) -> &'static str {
        "auth"
    }

    async fn current_user(&self, _credentials: &RequestCredentials) -> Result<Option<User>, AppError> {
        Ok(None)
    }
}

/// `None` disables the gate altogether.
pub fn build_authenticator(config: &AuthConfig, db: Arc<DbOperations>) -> Option<Arc<dyn Authenticator>> {
    let users: Arc<dyn UserStore> = db.clone();
    let authenticator: Arc<dyn Authenticator> = match config.auth_type {
        AuthType::None => return None,
        AuthType::Auth => Arc::new(BaseAuth),
        AuthType::BasicAuth => Arc::new(BasicAuth::new(users)),
        AuthType::SessionAuth => Arc::new(SessionAuth::new(users)),
        AuthType::SessionExpAuth => Arc::new(SessionAuth::with_duration(users, config.session_duration)),
        AuthType::SessionDbAuth => Arc::new(SessionDbAuth::new(db, config.session_duration)),
    };
    Some(authenticator)
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    fn excluded() -> Vec<String> {
        vec![
            "/api/v1/status/".to_string(),
            "/api/v1/stat*".to_string(),
            "/api/v1/auth_session/login/".to_string(),
        ]
    }

    #[test]
    fn test_require_auth_without_exclusions() {
        assert!(require_auth("/api/v1/status", &[]));
    }

    #[test]
    fn test_require_auth_ignores_trailing_slash() {
        let excluded = vec!["/api/v1/status/".to_string()];
        assert!(!require_auth("/api/v1/status", &excluded));
        assert!(!require_auth("/api/v1/status/", &excluded));
        assert!(require_auth("/api/v1/users", &excluded));
    }

    #[test]
    fn test_require_auth_wildcard() {
        let excluded = excluded();
        assert!(!require_auth("/api/v1/stats", &excluded));
        assert!(!require_auth("/api/v1/status", &excluded));
        assert!(!require_auth("/api/v1/auth_session/login", &excluded));
        assert!(require_auth("/api/v1/users", &excluded));
        assert!(require_auth("/api/v1/auth_session/logout", &excluded));
    }

    #[test]
    fn test_credentials_from_request() {
        let req = TestRequest::default()
            .insert_header((header::AUTHORIZATION, "Basic Zm9vOmJhcg=="))
            .cookie(actix_web::cookie::Cookie::new("_my_session_id", "abc"))
            .to_http_request();

        let credentials = RequestCredentials::from_request(&req, "_my_session_id");
        assert_eq!(credentials.authorization.as_deref(), Some("Basic Zm9vOmJhcg=="));
        assert_eq!(credentials.session_id.as_deref(), Some("abc"));
        assert!(!credentials.is_empty());

        let other = RequestCredentials::from_request(&req, "session_id");
        assert!(other.session_id.is_none());

        let bare = RequestCredentials::from_request(&TestRequest::default().to_http_request(), "session_id");
        assert!(bare.is_empty());
    }

    #[test]
    fn test_credentials_keep_non_utf8_authorization() {
        let req = TestRequest::default()
            .insert_header((header::AUTHORIZATION, header::HeaderValue::from_bytes(b"Basic \xe9").unwrap()))
            .to_http_request();

        let credentials = RequestCredentials::from_request(&req, "session_id");
        assert!(!credentials.is_empty());
        assert!(credentials.authorization.unwrap().starts_with("Basic "));
    }

    #[tokio::test]
    async fn test_base_auth_resolves_nobody() {
        let credentials = RequestCredentials {
            authorization: Some("Basic Zm9vOmJhcg==".into()),
            session_id: None,
        };
        assert!(BaseAuth.current_user(&credentials).await.unwrap().is_none());
        assert!(BaseAuth.create_session(Uuid::new_v4()).await.unwrap().is_none());
        assert!(!BaseAuth.destroy_session(&credentials).await.unwrap());
    }
}
