//! Authentication: password hashing, purpose-scoped JWTs, HTTP handlers.

mod handlers;
mod jwt;
mod password;

pub use handlers::{
    confirmed_email, login, password_reset_confirm, password_reset_form, password_reset_request,
    refresh_token, request_email, signup,
};
pub use jwt::{Claims, TokenPair, TokenPurpose, TokenService};
pub use password::{hash_password, verify_password};
