//! User record and its public projection.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub confirmed: bool,
    pub refresh_token: Option<String>,
    pub avatar: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Fields supplied at signup. New users always start unconfirmed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
}

/// What the API returns for a user; never carries credentials.
#[derive(Debug, Clone, Serialize)]
pub struct UserResponse {
    pub id: String,
    pub username: String,
    pub email: String,
    pub avatar: Option<String>,
    pub confirmed: bool,
    pub created_at: String,
}

impl From<User> for UserResponse {
    fn from(u: User) -> Self {
        Self {
            id: u.id.to_string(),
            username: u.username,
            email: u.email,
            avatar: u.avatar,
            confirmed: u.confirmed,
            created_at: u.created_at.to_rfc3339(),
        }
    }
}
