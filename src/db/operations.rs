use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::{QueryBuilder, Sqlite, Transaction};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::DatabaseConfig;
use crate::db::models::{User, UserFilter, UserSession, UserUpdate};
use crate::error::{AppError, DatabaseError};

const SELECT_USER: &str =
    "SELECT id, email, hashed_password, session_id, reset_token, created_at, updated_at FROM users";

/// User persistence as seen by the authentication service.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Inserts a new user. Email uniqueness is the caller's concern.
    async fn add_user(&self, email: &str, hashed_password: &str) -> Result<User, AppError>;

    /// First user matching `filter`, or `DatabaseError::NotFound`.
    async fn find_user_by(&self, filter: &UserFilter) -> Result<User, AppError>;

    async fn find_users_by_email(&self, email: &str) -> Result<Vec<User>, AppError>;

    /// Applies `changes` to the user `id`, or `DatabaseError::NotFound`.
    async fn update_user(&self, id: Uuid, changes: UserUpdate) -> Result<(), AppError>;
}

#[derive(Clone)]
pub struct DbOperations {
    pool: SqlitePool,
}

impl DbOperations {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Opens the pool described by `config` and brings the schema up to date.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, AppError> {
        let options = SqliteConnectOptions::from_str(&config.url)
            .map_err(|e| DatabaseError::ConnectionError(e.to_string()))?
            .create_if_missing(true)
            .foreign_keys(true);

        // In-memory databases live only as long as a connection does.
        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections.max(1))
            .acquire_timeout(Duration::from_secs(5))
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(|e| DatabaseError::ConnectionError(e.to_string()))?;

        let db = Self::new(pool);
        db.migrate().await?;
        info!("Database ready at {}", config.url);
        Ok(db)
    }

    pub async fn migrate(&self) -> Result<(), AppError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    pub async fn begin_transaction(&self) -> Result<Transaction<'_, Sqlite>, AppError> {
        Ok(self.pool.begin().await?)
    }

    pub async fn list_users(&self) -> Result<Vec<User>, AppError> {
        let mut builder = QueryBuilder::<Sqlite>::new(SELECT_USER);
        builder.push(" ORDER BY created_at");

        let users = builder
            .build_query_as::<User>()
            .fetch_all(&self.pool)
            .await?;

        Ok(users)
    }

    pub async fn count_users(&self) -> Result<i64, AppError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    pub async fn delete_user(&self, id: Uuid) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound.into());
        }
        Ok(())
    }

    pub async fn create_session(&self, session: &UserSession) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO user_sessions (id, user_id, session_id, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(session.id)
        .bind(session.user_id)
        .bind(&session.session_id)
        .bind(session.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn find_session(&self, session_id: &str) -> Result<Option<UserSession>, AppError> {
        let session = sqlx::query_as::<_, UserSession>(
            "SELECT id, user_id, session_id, created_at FROM user_sessions WHERE session_id = ?",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(session)
    }

    /// Returns whether a row was removed.
    pub async fn delete_session(&self, session_id: &str) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM user_sessions WHERE session_id = ?")
            .bind(session_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Drops persisted sessions older than `duration_secs`. Nothing expires
    /// when the duration is not positive.
    pub async fn cleanup_expired_sessions(&self, duration_secs: i64) -> Result<u64, AppError> {
        if duration_secs <= 0 {
            return Ok(0);
        }

        let cutoff = Utc::now() - ChronoDuration::seconds(duration_secs);
        let mut transaction = self.begin_transaction().await?;

        let result = sqlx::query("DELETE FROM user_sessions WHERE created_at < ?")
            .bind(cutoff)
            .execute(&mut *transaction)
            .await;

        match result {
            Ok(result) => {
                transaction.commit().await?;
                Ok(result.rows_affected())
            }
            Err(e) => {
                transaction.rollback().await?;
                Err(e.into())
            }
        }
    }
}

#[async_trait]
impl UserStore for DbOperations {
    async fn add_user(&self, email: &str, hashed_password: &str) -> Result<User, AppError> {
        let user = User::new(email.to_string(), hashed_password.to_string());

        sqlx::query(
            r#"
            INSERT INTO users (id, email, hashed_password, session_id, reset_token, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.hashed_password)
        .bind(&user.session_id)
        .bind(&user.reset_token)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await?;

        debug!("Inserted user {}", user.id);
        Ok(user)
    }

    async fn find_user_by(&self, filter: &UserFilter) -> Result<User, AppError> {
        let mut builder = QueryBuilder::<Sqlite>::new(SELECT_USER);
        match filter {
            UserFilter::Id(id) => builder.push(" WHERE id = ").push_bind(*id),
            UserFilter::Email(email) => builder.push(" WHERE email = ").push_bind(email.clone()),
            UserFilter::SessionId(session_id) => {
                builder.push(" WHERE session_id = ").push_bind(session_id.clone())
            }
            UserFilter::ResetToken(token) => {
                builder.push(" WHERE reset_token = ").push_bind(token.clone())
            }
        };
        builder.push(" LIMIT 1");

        builder
            .build_query_as::<User>()
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DatabaseError::NotFound.into())
    }

    async fn find_users_by_email(&self, email: &str) -> Result<Vec<User>, AppError> {
        let mut builder = QueryBuilder::<Sqlite>::new(SELECT_USER);
        builder.push(" WHERE email = ").push_bind(email.to_string());

        let users = builder
            .build_query_as::<User>()
            .fetch_all(&self.pool)
            .await?;

        Ok(users)
    }

    async fn update_user(&self, id: Uuid, changes: UserUpdate) -> Result<(), AppError> {
        let mut builder = QueryBuilder::<Sqlite>::new("UPDATE users SET updated_at = ");
        builder.push_bind(Utc::now());

        if let Some(hashed_password) = changes.hashed_password {
            builder.push(", hashed_password = ").push_bind(hashed_password);
        }
        if let Some(session_id) = changes.session_id {
            builder.push(", session_id = ").push_bind(session_id);
        }
        if let Some(reset_token) = changes.reset_token {
            builder.push(", reset_token = ").push_bind(reset_token);
        }
        builder.push(" WHERE id = ").push_bind(id);

        let result = builder.build().execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound.into());
        }
        Ok(())
    }
}
