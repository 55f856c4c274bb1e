//! Authentication service for a contacts REST API.
//!
//! Signup with email confirmation, login issuing access/refresh JWT pairs,
//! refresh-token rotation, and password reset by emailed token.

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod mailer;
pub mod middleware;
pub mod models;
pub mod services;

pub use config::Config;
pub use error::AppError;
pub use handlers::http::AppState;
pub use services::AuthService;

use axum::routing::{get, patch, post};
use handlers::{http, users};
use middleware::rate_limit::{auth_rate_limit_config, GovernorLayer};
use tower_http::trace::TraceLayer;

/// Build the API router (auth, users, health). Used by main and by integration tests.
///
/// Signup and login are rate limited per client IP, so the router must be
/// served with `into_make_service_with_connect_info::<SocketAddr>()` unless a
/// proxy sets `X-Forwarded-For`.
pub fn create_app(state: AppState) -> axum::Router {
    let auth_routes = axum::Router::new()
        .route(
            "/signup",
            post(auth::signup).layer(GovernorLayer {
                config: auth_rate_limit_config(),
            }),
        )
        .route(
            "/login",
            post(auth::login).layer(GovernorLayer {
                config: auth_rate_limit_config(),
            }),
        )
        .route("/refresh_token", get(auth::refresh_token))
        .route("/confirmed_email/:token", get(auth::confirmed_email))
        .route("/request_email", post(auth::request_email))
        .route("/password_reset_request", post(auth::password_reset_request))
        .route(
            "/password_reset/:token",
            get(auth::password_reset_form).post(auth::password_reset_confirm),
        );

    let user_routes = axum::Router::new()
        .route("/me", get(users::me))
        .route("/avatar", patch(users::update_avatar));

    axum::Router::new()
        .route("/health", get(http::health))
        .nest("/auth", auth_routes)
        .nest("/users", user_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
