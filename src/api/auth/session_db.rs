use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};
use uuid::Uuid;

use super::{Authenticator, RequestCredentials};
use crate::auth::generate_uuid;
use crate::db::{DbOperations, User, UserFilter, UserSession, UserStore};
use crate::error::{AppError, DatabaseError};

/// Sessions persisted in the `user_sessions` table.
pub struct SessionDbAuth {
    db: Arc<DbOperations>,
    session_duration: i64,
}

impl SessionDbAuth {
    pub fn new(db: Arc<DbOperations>, session_duration: i64) -> Self {
        Self { db, session_duration }
    }

    pub async fn user_id_for_session_id(&self, session_id: &str) -> Result<Option<Uuid>, AppError> {
        let Some(session) = self.db.find_session(session_id).await? else {
            return Ok(None);
        };
        if session.is_expired(self.session_duration) {
            debug!("Persisted session expired");
            return Ok(None);
        }
        Ok(Some(session.user_id))
    }
}

#[async_trait]
impl Authenticator for SessionDbAuth {
    fn name(&self) -> &'static str {
        "session_db_auth"
    }

    async fn current_user(&self, credentials: &RequestCredentials) -> Result<Option<User>, AppError> {
        let Some(session_id) = credentials.session_id.as_deref() else {
            return Ok(None);
        };
        let Some(user_id) = self.user_id_for_session_id(session_id).await? else {
            return Ok(None);
        };

        match self.db.find_user_by(&UserFilter::Id(user_id)).await {
            Ok(user) => Ok(Some(user)),
            Err(AppError::DatabaseError(DatabaseError::NotFound)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn create_session(&self, user_id: Uuid) -> Result<Option<String>, AppError> {
        let session = UserSession::new(user_id, generate_uuid());
        self.db.create_session(&session).await?;
        Ok(Some(session.session_id))
    }

    async fn destroy_session(&self, credentials: &RequestCredentials) -> Result<bool, AppError> {
        match credentials.session_id.as_deref() {
            Some(session_id) => self.db.delete_session(session_id).await,
            None => Ok(false),
        }
    }

    async fn cleanup_expired(&self) -> Result<u64, AppError> {
        let removed = self.db.cleanup_expired_sessions(self.session_duration).await?;
        if removed > 0 {
            info!("Removed {} expired persisted sessions", removed);
        }
        Ok(removed)
    }
}
