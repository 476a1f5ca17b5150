pub mod api;
pub mod auth;
pub mod client;
pub mod config;
pub mod db;
pub mod error;

use std::sync::Arc;
use std::time::Duration;

use actix_cors::Cors;
use actix_web::{web, HttpResponse};
use tracing::{error, info};

pub use error::AppError;
pub type Result<T> = std::result::Result<T, AppError>;
pub use config::Settings;

pub use api::Authenticator;
pub use auth::AuthService;
pub use db::{DbOperations, User, UserSession, UserStore};

/// Health check endpoint handler
/// Returns a JSON response with server status, database reachability and timestamp
pub async fn health_check(state: web::Data<AppState>) -> HttpResponse {
    let database = match sqlx::query("SELECT 1").execute(state.db.pool()).await {
        Ok(_) => "ok",
        Err(e) => {
            error!("Health check could not reach the database: {}", e);
            "unavailable"
        }
    };

    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "database": database,
        "auth_type": state.authenticator.as_ref().map(|a| a.name()).unwrap_or("none"),
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// Application state shared across all workers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Settings>,
    pub db: Arc<DbOperations>,
    pub auth_service: Arc<AuthService>,
    pub authenticator: Option<Arc<dyn Authenticator>>,
}

impl AppState {
    pub async fn new(config: Settings) -> Result<Self> {
        let db = DbOperations::connect(&config.database).await?;
        Ok(Self::with_db(config, db))
    }

    pub fn with_db(config: Settings, db: DbOperations) -> Self {
        let db = Arc::new(db);
        let authenticator = api::build_authenticator(&config.auth, db.clone());
        let auth_service = Arc::new(AuthService::new(db.clone()));

        Self {
            config: Arc::new(config),
            db,
            auth_service,
            authenticator,
        }
    }

    /// Drops expired sessions of the configured authenticator every `period`.
    pub fn spawn_session_cleanup(&self, period: Duration) -> Option<tokio::task::JoinHandle<()>> {
        let authenticator = self.authenticator.clone()?;
        Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                if let Err(e) = authenticator.cleanup_expired().await {
                    error!("Session cleanup failed: {}", e);
                }
            }
        }))
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.db.close().await;
        info!("Database connections closed");
        Ok(())
    }
}

/// Registers every route of the service.
pub fn configure_app(cfg: &mut web::ServiceConfig, state: &AppState) {
    use auth::handlers;

    cfg.route("/health", web::get().to(health_check))
        .route("/", web::get().to(handlers::index))
        .route("/users", web::post().to(handlers::register_user))
        .service(
            web::resource("/sessions")
                .route(web::post().to(handlers::login))
                .route(web::delete().to(handlers::logout)),
        )
        .route("/profile", web::get().to(handlers::profile))
        .service(
            web::resource("/reset_password")
                .route(web::post().to(handlers::get_reset_password_token))
                .route(web::put().to(handlers::update_password)),
        );

    api::configure(cfg, state);
}

pub fn build_cors(config: &config::CorsConfig) -> Cors {
    if !config.enabled {
        return Cors::default();
    }

    let cors = if config.allow_any_origin {
        Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .supports_credentials()
    } else {
        Cors::default()
            .allowed_origin("http://localhost:5000")
            .allowed_origin("http://127.0.0.1:5000")
            .allowed_methods(vec!["GET", "POST", "PUT", "DELETE"])
            .allowed_headers(vec!["Authorization", "Content-Type"])
            .supports_credentials()
    };

    cors.max_age(config.max_age as usize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AuthType;

    #[tokio::test]
    async fn test_app_state_creation() {
        let config = Settings::new_for_test().expect("Failed to load test config");
        let state = AppState::new(config).await.expect("Failed to build state");

        assert_eq!(state.authenticator.as_ref().map(|a| a.name()), Some("session_auth"));
        assert_eq!(state.db.count_users().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_app_state_clone() {
        let config = Settings::new_for_test().expect("Failed to load test config");
        let state = AppState::new(config).await.unwrap();
        let cloned = state.clone();

        assert!(Arc::ptr_eq(&state.config, &cloned.config));
        assert!(Arc::ptr_eq(&state.db, &cloned.db));
        assert!(Arc::ptr_eq(&state.auth_service, &cloned.auth_service));
    }

    #[tokio::test]
    async fn test_no_authenticator_without_auth_type() {
        let config = Settings::new_for_test_with_auth(AuthType::None, 0).unwrap();
        let state = AppState::new(config).await.unwrap();

        assert!(state.authenticator.is_none());
        assert!(state.spawn_session_cleanup(Duration::from_secs(60)).is_none());
    }

    #[tokio::test]
    async fn test_session_cleanup_drops_expired_db_sessions() {
        let config = Settings::new_for_test_with_auth(AuthType::SessionDbAuth, 1).unwrap();
        let state = AppState::new(config).await.unwrap();
        let user = state.auth_service.register_user("bob@example.com", "pw").await.unwrap();
        let authenticator = state.authenticator.clone().unwrap();
        let session_id = authenticator.create_session(user.id).await.unwrap().unwrap();
        assert!(state.db.find_session(&session_id).await.unwrap().is_some());

        let cleanup = state.spawn_session_cleanup(Duration::from_millis(100)).unwrap();
        tokio::time::sleep(Duration::from_millis(2500)).await;
        cleanup.abort();

        assert!(state.db.find_session(&session_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_session_cleanup_drops_expired_memory_sessions() {
        let config = Settings::new_for_test_with_auth(AuthType::SessionExpAuth, 1).unwrap();
        let state = AppState::new(config).await.unwrap();
        let authenticator = state.authenticator.clone().unwrap();
        authenticator.create_session(uuid::Uuid::new_v4()).await.unwrap();

        let cleanup = state.spawn_session_cleanup(Duration::from_millis(100)).unwrap();
        tokio::time::sleep(Duration::from_millis(2500)).await;
        cleanup.abort();

        // Already swept by the background task
        assert_eq!(authenticator.cleanup_expired().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_bad_database_url() {
        let mut config = Settings::new_for_test().unwrap();
        config.database.url = "sqlite:///nonexistent-dir/definitely/missing.db".to_string();

        let result = AppState::new(config).await;
        assert!(matches!(result, Err(AppError::DatabaseError(_))));
    }
}
