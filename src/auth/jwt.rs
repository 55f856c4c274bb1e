//! JWT issue and validation.
//!
//! Every token carries a `purpose` claim. Validation checks it alongside the
//! signature and expiry, so an email-confirmation token can never be
//! presented as an access or refresh token even though all purposes share
//! one signing secret.

use crate::config::TokenTtls;
use crate::error::{AppError, AppResult};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenPurpose {
    Access,
    Refresh,
    EmailConfirm,
    PasswordReset,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // email
    pub purpose: TokenPurpose,
    pub exp: i64,
    pub iat: i64,
    /// Unique per token so two tokens issued in the same second still differ.
    pub jti: String,
}

/// Access + refresh pair handed out by login and refresh.
#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
}

#[derive(Clone)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttls: TokenTtls,
}

impl TokenService {
    pub fn new(secret: &str, ttls: TokenTtls) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttls,
        }
    }

    /// Sign a token for `subject`. A negative `ttl` yields an already-expired token.
    pub fn issue(&self, subject: &str, purpose: TokenPurpose, ttl: Duration) -> AppResult<String> {
        let now = Utc::now();
        let exp = now
            .checked_add_signed(ttl)
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("token ttl out of range: {}", ttl)))?;
        let claims = Claims {
            sub: subject.to_string(),
            purpose,
            exp: exp.timestamp(),
            iat: now.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("jwt encode: {}", e)))
    }

    /// Returns the subject if the signature is valid, the purpose matches and
    /// the token has not expired. No leeway is applied to `exp`.
    pub fn validate(&self, token: &str, expected: TokenPurpose) -> AppResult<String> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 0;
        let data = decode::<Claims>(token, &self.decoding, &validation).map_err(|e| {
            match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                    AppError::InvalidToken("token has expired".to_string())
                }
                _ => AppError::InvalidToken(e.to_string()),
            }
        })?;
        if data.claims.purpose != expected {
            return Err(AppError::InvalidToken("invalid scope for token".to_string()));
        }
        Ok(data.claims.sub)
    }

    pub fn issue_pair(&self, subject: &str) -> AppResult<TokenPair> {
        Ok(TokenPair {
            access_token: self.issue(subject, TokenPurpose::Access, self.ttls.access)?,
            refresh_token: self.issue(subject, TokenPurpose::Refresh, self.ttls.refresh)?,
            token_type: "bearer",
        })
    }

    pub fn issue_email_token(&self, subject: &str) -> AppResult<String> {
        self.issue(subject, TokenPurpose::EmailConfirm, self.ttls.email_confirm)
    }

    pub fn issue_reset_token(&self, subject: &str) -> AppResult<String> {
        self.issue(subject, TokenPurpose::PasswordReset, self.ttls.password_reset)
    }
}
