use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub hashed_password: String,
    #[serde(skip_serializing)]
    pub session_id: Option<String>,
    #[serde(skip_serializing)]
    pub reset_token: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn new(email: String, hashed_password: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            email,
            hashed_password,
            session_id: None,
            reset_token: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Lookup key for a single user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserFilter {
    Id(Uuid),
    Email(String),
    SessionId(String),
    ResetToken(String),
}

/// Partial update of a user row. `None` leaves a column untouched; for the
/// nullable columns `Some(None)` clears the value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserUpdate {
    pub hashed_password: Option<String>,
    pub session_id: Option<Option<String>>,
    pub reset_token: Option<Option<String>>,
}

impl UserUpdate {
    pub fn hashed_password(mut self, hashed_password: String) -> Self {
        self.hashed_password = Some(hashed_password);
        self
    }

    pub fn session_id(mut self, session_id: Option<String>) -> Self {
        self.session_id = Some(session_id);
        self
    }

    pub fn reset_token(mut self, reset_token: Option<String>) -> Self {
        self.reset_token = Some(reset_token);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserSession {
    pub id: Uuid,
    pub user_id: Uuid,
    pub session_id: String,
    pub created_at: DateTime<Utc>,
}

impl UserSession {
    pub fn new(user_id: Uuid, session_id: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            session_id,
            created_at: Utc::now(),
        }
    }

    pub fn is_expired(&self, duration_secs: i64) -> bool {
        duration_secs > 0 && Utc::now() > self.created_at + chrono::Duration::seconds(duration_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_json_hides_secrets() {
        let mut user = User::new("bob@example.com".into(), "$argon2id$...".into());
        user.session_id = Some("sid".into());
        user.reset_token = Some("tok".into());

        let json = serde_json::to_value(&user).unwrap();
        assert_eq!(json["email"], "bob@example.com");
        assert!(json.get("hashed_password").is_none());
        assert!(json.get("session_id").is_none());
        assert!(json.get("reset_token").is_none());
    }

    #[test]
    fn test_session_expiry() {
        let mut session = UserSession::new(Uuid::new_v4(), "sid".into());
        assert!(!session.is_expired(0));
        assert!(!session.is_expired(-5));
        assert!(!session.is_expired(60));

        session.created_at = Utc::now() - chrono::Duration::seconds(120);
        assert!(session.is_expired(60));
        assert!(!session.is_expired(0));
    }

    #[test]
    fn test_update_builder() {
        assert_eq!(UserUpdate::default().hashed_password, None);
        let update = UserUpdate::default().session_id(None);
        assert_ne!(update, UserUpdate::default());
        assert_eq!(update.session_id, Some(None));
    }
}
