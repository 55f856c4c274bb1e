//! In-process user store for tests and running without PostgreSQL.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::UserStore;
use crate::error::{AppError, AppResult};
use crate::models::user::{NewUser, User};

#[derive(Clone, Default)]
pub struct MemoryUserStore {
    users: Arc<RwLock<HashMap<String, User>>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop a user; lets tests simulate a record vanishing mid-flow.
    pub async fn remove(&self, email: &str) -> Option<User> {
        self.users.write().await.remove(email)
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>> {
        Ok(self.users.read().await.get(email).cloned())
    }

    async fn insert(&self, user: NewUser) -> AppResult<User> {
        let mut users = self.users.write().await;
        if users.contains_key(&user.email) {
            return Err(AppError::Conflict("Account already exists".to_string()));
        }
        let row = User {
            id: Uuid::new_v4(),
            username: user.username,
            email: user.email,
            password_hash: user.password_hash,
            confirmed: false,
            refresh_token: None,
            avatar: None,
            created_at: Utc::now(),
        };
        users.insert(row.email.clone(), row.clone());
        Ok(row)
    }

    async fn update(&self, user: &User) -> AppResult<User> {
        let mut users = self.users.write().await;
        let row = users
            .get_mut(&user.email)
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
        row.confirmed = user.confirmed;
        row.refresh_token = user.refresh_token.clone();
        row.password_hash = user.password_hash.clone();
        row.avatar = user.avatar.clone();
        Ok(row.clone())
    }
}
