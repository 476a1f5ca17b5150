use std::sync::Arc;

use tracing::{debug, info};
use uuid::Uuid;

use crate::auth::password::{generate_uuid, hash_password, verify_password};
use crate::db::models::{User, UserFilter, UserUpdate};
use crate::db::operations::UserStore;
use crate::error::{AppError, AuthError, DatabaseError};

/// Registration, login sessions and password resets. The session id lives
/// on the user row, so a user holds at most one session at a time.
pub struct AuthService {
    store: Arc<dyn UserStore>,
}

impl AuthService {
    pub fn new(store: Arc<dyn UserStore>) -> Self {
        Self { store }
    }

    async fn find_user(&self, filter: UserFilter) -> Result<Option<User>, AppError> {
        match self.store.find_user_by(&filter).await {
            Ok(user) => Ok(Some(user)),
            Err(AppError::DatabaseError(DatabaseError::NotFound)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// The email check and the insert are two separate statements.
    pub async fn register_user(&self, email: &str, password: &str) -> Result<User, AppError> {
        if self.find_user(UserFilter::Email(email.to_string())).await?.is_some() {
            return Err(AuthError::EmailAlreadyRegistered(email.to_string()).into());
        }

        let hashed_password = hash_password(password)?;
        let user = self.store.add_user(email, &hashed_password).await?;
        info!("Registered user {}", user.id);
        Ok(user)
    }

    pub async fn valid_login(&self, email: &str, password: &str) -> Result<bool, AppError> {
        let valid = match self.find_user(UserFilter::Email(email.to_string())).await? {
            Some(user) => verify_password(password, &user.hashed_password),
            None => false,
        };
        Ok(valid)
    }

    /// Issues a new session id for `email`, replacing any previous one.
    pub async fn create_session(&self, email: &str) -> Result<Option<String>, AppError> {
        let Some(user) = self.find_user(UserFilter::Email(email.to_string())).await? else {
            return Ok(None);
        };

        let session_id = generate_uuid();
        self.store
            .update_user(user.id, UserUpdate::default().session_id(Some(session_id.clone())))
            .await?;
        debug!("Created session for user {}", user.id);
        Ok(Some(session_id))
    }

    pub async fn get_user_from_session_id(&self, session_id: Option<&str>) -> Result<Option<User>, AppError> {
        match session_id {
            Some(session_id) => self.find_user(UserFilter::SessionId(session_id.to_string())).await,
            None => Ok(None),
        }
    }

    /// Unknown users are ignored.
    pub async fn destroy_session(&self, user_id: Uuid) -> Result<(), AppError> {
        match self.store.update_user(user_id, UserUpdate::default().session_id(None)).await {
            Ok(()) | Err(AppError::DatabaseError(DatabaseError::NotFound)) => Ok(()),
            Err(e) => Err(e),
        }
    }

    pub async fn get_reset_password_token(&self, email: &str) -> Result<String, AppError> {
        let user = self
            .find_user(UserFilter::Email(email.to_string()))
            .await?
            .ok_or(AuthError::UnknownEmail)?;

        let reset_token = generate_uuid();
        self.store
            .update_user(user.id, UserUpdate::default().reset_token(Some(reset_token.clone())))
            .await?;
        info!("Issued reset token for user {}", user.id);
        Ok(reset_token)
    }

    /// Consumes `reset_token`: it cannot be used a second time.
    pub async fn update_password(&self, reset_token: &str, password: &str) -> Result<(), AppError> {
        let user = self
            .find_user(UserFilter::ResetToken(reset_token.to_string()))
            .await?
            .ok_or(AuthError::InvalidResetToken)?;

        let hashed_password = hash_password(password)?;
        self.store
            .update_user(
                user.id,
                UserUpdate::default()
                    .hashed_password(hashed_password)
                    .reset_token(None),
            )
            .await?;
        info!("Password updated for user {}", user.id);
        Ok(())
    }
}
