//! Authenticated user endpoints.

use axum::{extract::State, Json};
use serde::Deserialize;
use validator::Validate;

use crate::error::AppError;
use crate::handlers::http::AppState;
use crate::middleware::auth::AuthUser;
use crate::models::user::UserResponse;

/// GET /users/me
pub async fn me(AuthUser(user): AuthUser) -> Json<UserResponse> {
    Json(user.into())
}

#[derive(Debug, Deserialize, Validate)]
pub struct AvatarRequest {
    /// `null` clears the avatar.
    #[validate(url, length(max = 512))]
    pub avatar_url: Option<String>,
}

/// PATCH /users/avatar
pub async fn update_avatar(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(body): Json<AvatarRequest>,
) -> Result<Json<UserResponse>, AppError> {
    body.validate().map_err(|e| AppError::Validation(e.to_string()))?;
    let user = state
        .auth_service()
        .update_avatar(user, body.avatar_url)
        .await?;
    Ok(Json(user.into()))
}
