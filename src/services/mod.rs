//! Business logic: account lifecycle and background mail delivery.

pub mod auth;
pub mod mail;

pub use auth::{AuthService, ConfirmOutcome};
pub use mail::{MailJob, MailQueue, MailWorker};
