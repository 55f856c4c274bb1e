//! SMTP delivery via lettre.

use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

use super::{confirmation_body, confirmation_link, password_reset_body, password_reset_link, Mailer};
use crate::config::SmtpConfig;
use crate::error::{AppError, AppResult};

#[derive(Clone)]
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    /// Implicit-TLS relay (port 465 by default).
    pub fn new(config: &SmtpConfig) -> AppResult<Self> {
        let from: Mailbox = config
            .from
            .parse()
            .map_err(|e| AppError::Config(format!("MAIL_FROM: {}", e)))?;
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
            .map_err(|e| AppError::Config(format!("SMTP_HOST: {}", e)))?
            .port(config.port)
            .credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ))
            .build();
        Ok(Self { transport, from })
    }

    async fn send_html(&self, to_email: &str, subject: &str, body: String) -> AppResult<()> {
        let to: Mailbox = to_email
            .parse()
            .map_err(|e| AppError::Mail(format!("recipient {}: {}", to_email, e)))?;
        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(body)
            .map_err(|e| AppError::Mail(e.to_string()))?;
        self.transport
            .send(message)
            .await
            .map_err(|e| AppError::Mail(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send_confirmation(
        &self,
        to_email: &str,
        username: &str,
        base_url: &str,
        token: &str,
    ) -> AppResult<()> {
        let link = confirmation_link(base_url, token);
        self.send_html(to_email, "Confirm your email", confirmation_body(username, &link))
            .await
    }

    async fn send_password_reset(
        &self,
        to_email: &str,
        base_url: &str,
        token: &str,
    ) -> AppResult<()> {
        let link = password_reset_link(base_url, token);
        self.send_html(to_email, "Password reset", password_reset_body(&link))
            .await
    }
}
