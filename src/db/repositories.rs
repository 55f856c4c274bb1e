//! Credential store: the `users` table behind the `UserStore` seam.

use async_trait::async_trait;
use uuid::Uuid;

use super::DbPool;
use crate::error::{AppError, AppResult};
use crate::models::user::{NewUser, User};

const USER_COLUMNS: &str =
    "id, username, email, password_hash, confirmed, refresh_token, avatar, created_at";

/// Lookup and persistence of user records, keyed by email.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>>;

    /// Fails with `Conflict` when the email is already taken.
    async fn insert(&self, user: NewUser) -> AppResult<User>;

    /// Persists the mutable fields: confirmed, refresh_token, password_hash, avatar.
    /// Fails with `NotFound` if the row disappeared.
    async fn update(&self, user: &User) -> AppResult<User>;
}

#[derive(Clone)]
pub struct PgUserStore {
    pool: DbPool,
}

impl PgUserStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let row = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn insert(&self, user: NewUser) -> AppResult<User> {
        let row = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (id, username, email, password_hash)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (email) DO NOTHING
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .fetch_optional(&self.pool)
        .await?;
        row.ok_or_else(|| AppError::Conflict("Account already exists".to_string()))
    }

    async fn update(&self, user: &User) -> AppResult<User> {
        let row = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
            SET confirmed = $2, refresh_token = $3, password_hash = $4, avatar = $5
            WHERE email = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(&user.email)
        .bind(user.confirmed)
        .bind(&user.refresh_token)
        .bind(&user.password_hash)
        .bind(&user.avatar)
        .fetch_optional(&self.pool)
        .await?;
        row.ok_or_else(|| AppError::NotFound("User not found".to_string()))
    }
}
