use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use super::{Authenticator, RequestCredentials};
use crate::auth::generate_uuid;
use crate::db::{User, UserFilter, UserStore};
use crate::error::{AppError, DatabaseError};

#[derive(Debug, Clone)]
struct SessionEntry {
    user_id: Uuid,
    created_at: DateTime<Utc>,
}

impl SessionEntry {
    fn is_expired(&self, duration_secs: i64) -> bool {
        duration_secs > 0 && Utc::now() > self.created_at + Duration::seconds(duration_secs)
    }
}

/// Sessions held in process memory; they do not survive a restart.
pub struct SessionAuth {
    sessions: RwLock<HashMap<String, SessionEntry>>,
    users: Arc<dyn UserStore>,
    session_duration: i64,
}

impl SessionAuth {
    /// Sessions that never expire.
    pub fn new(users: Arc<dyn UserStore>) -> Self {
        Self::with_duration(users, 0)
    }

    /// Sessions valid for `session_duration` seconds; zero or less never
    /// expires.
    pub fn with_duration(users: Arc<dyn UserStore>, session_duration: i64) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            users,
            session_duration,
        }
    }

    pub async fn user_id_for_session_id(&self, session_id: &str) -> Option<Uuid> {
        let sessions = self.sessions.read().await;
        let entry = sessions.get(session_id)?;
        if entry.is_expired(self.session_duration) {
            debug!("Session expired");
            return None;
        }
        Some(entry.user_id)
    }
}

#[async_trait]
impl Authenticator for SessionAuth {
    fn name(&self) -> &'static str {
        if self.session_duration > 0 {
            "session_exp_auth"
        } else {
            "session_auth"
        }
    }

    async fn current_user(&self, credentials: &RequestCredentials) -> Result<Option<User>, AppError> {
        let Some(session_id) = credentials.session_id.as_deref() else {
            return Ok(None);
        };
        let Some(user_id) = self.user_id_for_session_id(session_id).await else {
            return Ok(None);
        };

        match self.users.find_user_by(&UserFilter::Id(user_id)).await {
            Ok(user) => Ok(Some(user)),
            Err(AppError::DatabaseError(DatabaseError::NotFound)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn create_session(&self, user_id: Uuid) -> Result<Option<String>, AppError> {
        let session_id = generate_uuid();
        let entry = SessionEntry {
            user_id,
            created_at: Utc::now(),
        };
        self.sessions.write().await.insert(session_id.clone(), entry);
        Ok(Some(session_id))
    }

    async fn destroy_session(&self, credentials: &RequestCredentials) -> Result<bool, AppError> {
        let Some(session_id) = credentials.session_id.as_deref() else {
            return Ok(false);
        };
        if self.user_id_for_session_id(session_id).await.is_none() {
            return Ok(false);
        }
        Ok(self.sessions.write().await.remove(session_id).is_some())
    }

    async fn cleanup_expired(&self) -> Result<u64, AppError> {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, entry| !entry.is_expired(self.session_duration));
        let removed = (before - sessions.len()) as u64;
        if removed > 0 {
            info!("Removed {} expired sessions", removed);
        }
        Ok(removed)
    }
}
