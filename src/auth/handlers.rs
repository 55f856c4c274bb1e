//! Auth HTTP handlers: signup, login, refresh, email confirmation, password reset.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Html,
    Form, Json,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::auth::TokenPair;
use crate::error::AppError;
use crate::handlers::http::AppState;
use crate::mailer::escape_html;
use crate::middleware::auth::BearerToken;
use crate::models::user::UserResponse;

#[derive(Debug, Deserialize, Validate)]
pub struct SignupRequest {
    #[validate(length(min = 1, max = 50))]
    pub username: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 6, max = 128))]
    pub password: String,
}

/// OAuth2 password-flow form; `username` carries the email.
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct EmailRequest {
    #[validate(email)]
    pub email: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct NewPasswordForm {
    #[validate(length(min = 6, max = 128))]
    pub new_password: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

fn message(message: &'static str) -> Json<MessageResponse> {
    Json(MessageResponse { message })
}

fn validate<T: Validate>(body: &T) -> Result<(), AppError> {
    body.validate().map_err(|e| AppError::Validation(e.to_string()))
}

/// POST /auth/signup
pub async fn signup(
    State(state): State<AppState>,
    Json(body): Json<SignupRequest>,
) -> Result<(StatusCode, Json<UserResponse>), AppError> {
    validate(&body)?;
    let user = state
        .auth_service()
        .signup(&body.email, &body.username, &body.password, state.base_url())
        .await?;
    Ok((StatusCode::CREATED, Json(user.into())))
}

/// POST /auth/login
pub async fn login(
    State(state): State<AppState>,
    Form(body): Form<LoginForm>,
) -> Result<Json<TokenPair>, AppError> {
    let pair = state
        .auth_service()
        .login(&body.username, &body.password)
        .await?;
    Ok(Json(pair))
}

/// GET /auth/refresh_token
pub async fn refresh_token(
    State(state): State<AppState>,
    BearerToken(token): BearerToken,
) -> Result<Json<TokenPair>, AppError> {
    Ok(Json(state.auth_service().refresh(&token).await?))
}

/// GET /auth/confirmed_email/:token
pub async fn confirmed_email(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    let outcome = state.auth_service().confirm_email(&token).await?;
    Ok(message(outcome.message()))
}

/// POST /auth/request_email
pub async fn request_email(
    State(state): State<AppState>,
    Json(body): Json<EmailRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    validate(&body)?;
    let msg = state
        .auth_service()
        .request_email(&body.email, state.base_url())
        .await?;
    Ok(message(msg))
}

/// POST /auth/password_reset_request
pub async fn password_reset_request(
    State(state): State<AppState>,
    Json(body): Json<EmailRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    validate(&body)?;
    let msg = state
        .auth_service()
        .request_password_reset(&body.email, state.base_url())
        .await?;
    Ok(message(msg))
}

/// GET /auth/password_reset/:token: form that posts back to the same URL.
pub async fn password_reset_form(Path(token): Path<String>) -> Html<String> {
    let token = escape_html(&token);
    Html(format!(
        r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"><title>Reset password</title></head>
<body>
<h1>Choose a new password</h1>
<form method="post" action="/auth/password_reset/{token}">
  <input type="password" name="new_password" minlength="6" maxlength="128" required>
  <button type="submit">Reset password</button>
</form>
</body>
</html>"#
    ))
}

/// POST /auth/password_reset/:token
pub async fn password_reset_confirm(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Form(body): Form<NewPasswordForm>,
) -> Result<Json<MessageResponse>, AppError> {
    validate(&body)?;
    let msg = state
        .auth_service()
        .confirm_password_reset(&token, &body.new_password)
        .await?;
    Ok(message(msg))
}
