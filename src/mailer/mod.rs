//! Outgoing mail: confirmation and password-reset messages.

mod smtp;

pub use smtp::SmtpMailer;

use async_trait::async_trait;

use crate::error::AppResult;

/// Delivers the two token-bearing messages. Links are `base_url` + route + token;
/// `base_url` always ends with `/`.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_confirmation(
        &self,
        to_email: &str,
        username: &str,
        base_url: &str,
        token: &str,
    ) -> AppResult<()>;

    async fn send_password_reset(&self, to_email: &str, base_url: &str, token: &str)
        -> AppResult<()>;
}

pub fn confirmation_link(base_url: &str, token: &str) -> String {
    format!("{}auth/confirmed_email/{}", base_url, token)
}

pub fn password_reset_link(base_url: &str, token: &str) -> String {
    format!("{}auth/password_reset/{}", base_url, token)
}

pub(crate) fn confirmation_body(username: &str, link: &str) -> String {
    let username = escape_html(username);
    format!(
        "<html><body>\
         <p>Hi {username},</p>\
         <p>Thanks for signing up. Please confirm your email address by following the link below:</p>\
         <p><a href=\"{link}\">Confirm email</a></p>\
         </body></html>"
    )
}

pub(crate) fn password_reset_body(link: &str) -> String {
    format!(
        "<html><body>\
         <p>A password reset was requested for your account.</p>\
         <p><a href=\"{link}\">Choose a new password</a></p>\
         <p>If you did not request this, you can ignore this email.</p>\
         </body></html>"
    )
}

pub(crate) fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

/// Stands in for SMTP when no host is configured. Recipients are logged at
/// `info`; links carry live tokens and are only logged at `debug`.
#[derive(Clone, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send_confirmation(
        &self,
        to_email: &str,
        username: &str,
        base_url: &str,
        token: &str,
    ) -> AppResult<()> {
        tracing::info!(to = %to_email, "confirmation email not sent, SMTP disabled");
        tracing::debug!(
            to = %to_email,
            username = %username,
            link = %confirmation_link(base_url, token),
            "confirmation link"
        );
        Ok(())
    }

    async fn send_password_reset(
        &self,
        to_email: &str,
        base_url: &str,
        token: &str,
    ) -> AppResult<()> {
        tracing::info!(to = %to_email, "password reset email not sent, SMTP disabled");
        tracing::debug!(
            to = %to_email,
            link = %password_reset_link(base_url, token),
            "password reset link"
        );
        Ok(())
    }
}
