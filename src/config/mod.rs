//! Application configuration loaded from environment.

use chrono::Duration;
use std::net::SocketAddr;

/// Application configuration loaded from `.env` and environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server bind address (e.g. `0.0.0.0:8000`).
    pub server_addr: SocketAddr,
    /// PostgreSQL connection URL. `None` runs against the in-memory user store.
    pub database_url: Option<String>,
    /// JWT signing secret (min 32 chars).
    pub jwt_secret: String,
    pub tokens: TokenTtls,
    /// Base URL used in emailed links. Always ends with `/`.
    pub public_base_url: String,
    /// SMTP settings. `None` logs outgoing mail instead of sending it.
    pub smtp: Option<SmtpConfig>,
    /// Log level: `error`, `warn`, `info`, `debug`, `trace`.
    pub log_level: String,
}

/// Lifetimes of the four token purposes.
#[derive(Debug, Clone, Copy)]
pub struct TokenTtls {
    pub access: Duration,
    pub refresh: Duration,
    pub email_confirm: Duration,
    pub password_reset: Duration,
}

impl Default for TokenTtls {
    fn default() -> Self {
        Self {
            access: Duration::minutes(15),
            refresh: Duration::days(7),
            email_confirm: Duration::days(7),
            password_reset: Duration::hours(1),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    /// Sender mailbox, e.g. `Rolodex <noreply@example.com>`.
    pub from: String,
}

impl Config {
    /// Load configuration from environment. Call `dotenvy::dotenv().ok()` before this.
    pub fn from_env() -> Result<Self, ConfigLoadError> {
        let server_addr = std::env::var("SERVER_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:8000".to_string());
        let server_addr: SocketAddr = server_addr
            .parse()
            .map_err(|_| ConfigLoadError::InvalidServerAddr)?;

        let database_url = std::env::var("DATABASE_URL").ok().filter(|u| !u.is_empty());
        let jwt_secret = std::env::var("JWT_SECRET")
            .unwrap_or_else(|_| "rolodex_jwt_secret_change_in_production_32chars".to_string());
        if jwt_secret.len() < 32 {
            return Err(ConfigLoadError::WeakJwtSecret);
        }

        let defaults = TokenTtls::default();
        let tokens = TokenTtls {
            access: env_ttl("ACCESS_TOKEN_TTL_MINUTES", defaults.access, Duration::try_minutes)?,
            refresh: env_ttl("REFRESH_TOKEN_TTL_DAYS", defaults.refresh, Duration::try_days)?,
            email_confirm: env_ttl("EMAIL_TOKEN_TTL_DAYS", defaults.email_confirm, Duration::try_days)?,
            password_reset: env_ttl(
                "RESET_TOKEN_TTL_MINUTES",
                defaults.password_reset,
                Duration::try_minutes,
            )?,
        };

        let public_base_url = normalize_base_url(
            &std::env::var("PUBLIC_BASE_URL").unwrap_or_else(|_| "http://localhost:8000/".to_string()),
        );

        let smtp = match std::env::var("SMTP_HOST") {
            Ok(host) if !host.is_empty() => {
                let port = std::env::var("SMTP_PORT")
                    .unwrap_or_else(|_| "465".to_string())
                    .parse()
                    .map_err(|_| ConfigLoadError::InvalidNumber("SMTP_PORT"))?;
                let username = std::env::var("SMTP_USERNAME").unwrap_or_default();
                let from = std::env::var("MAIL_FROM").unwrap_or_else(|_| username.clone());
                Some(SmtpConfig {
                    host,
                    port,
                    password: std::env::var("SMTP_PASSWORD").unwrap_or_default(),
                    username,
                    from,
                })
            }
            _ => None,
        };

        let log_level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            server_addr,
            database_url,
            jwt_secret,
            tokens,
            public_base_url,
            smtp,
            log_level,
        })
    }
}

/// Upper bound for any configured token lifetime.
pub const MAX_TOKEN_TTL_DAYS: i64 = 365;

fn env_ttl(
    key: &'static str,
    default: Duration,
    unit: fn(i64) -> Option<Duration>,
) -> Result<Duration, ConfigLoadError> {
    parse_ttl(key, std::env::var(key).ok().as_deref(), default, unit)
}

/// `None` keeps the default. Values must be positive and at most
/// `MAX_TOKEN_TTL_DAYS` once converted with `unit`.
fn parse_ttl(
    key: &'static str,
    raw: Option<&str>,
    default: Duration,
    unit: fn(i64) -> Option<Duration>,
) -> Result<Duration, ConfigLoadError> {
    let Some(raw) = raw else {
        return Ok(default);
    };
    raw.trim()
        .parse::<i64>()
        .ok()
        .filter(|n| *n > 0)
        .and_then(unit)
        .filter(|ttl| ttl.num_days() <= MAX_TOKEN_TTL_DAYS)
        .ok_or(ConfigLoadError::InvalidTtl(key))
}

/// Ensure the URL ends with a single `/` so links can be appended directly.
pub fn normalize_base_url(url: &str) -> String {
    format!("{}/", url.trim_end_matches('/'))
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigLoadError {
    #[error("Invalid SERVER_ADDR")]
    InvalidServerAddr,
    #[error("JWT_SECRET must be at least 32 characters")]
    WeakJwtSecret,
    #[error("{0} must be a positive integer")]
    InvalidNumber(&'static str),
    #[error("{0} must be a positive integer of at most 365 days")]
    InvalidTtl(&'static str),
}
