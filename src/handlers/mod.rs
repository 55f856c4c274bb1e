//! HTTP handlers: shared state, health, user endpoints.

pub mod http;
pub mod users;

pub use http::{health, AppState};
