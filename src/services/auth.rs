//! Account lifecycle: signup, login, token refresh, email confirmation and
//! password reset.
//!
//! A user moves Unregistered -> Registered-Unconfirmed (signup) ->
//! Registered-Confirmed (email confirmation). Only confirmed users can log in.
//! The latest refresh token is stored on the user record, so each login or
//! refresh invalidates the previous refresh token.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::auth::{hash_password, verify_password, TokenPair, TokenPurpose, TokenService};
use crate::db::UserStore;
use crate::error::{AppError, AppResult};
use crate::models::user::{NewUser, User};
use crate::services::mail::{MailJob, MailQueue};

pub const MSG_EMAIL_CONFIRMED: &str = "Email confirmed";
pub const MSG_ALREADY_CONFIRMED: &str = "Your email is already confirmed";
pub const MSG_CHECK_EMAIL: &str = "Check your email for confirmation.";
pub const MSG_RESET_SENT: &str = "A password reset email has been sent";
pub const MSG_PASSWORD_CHANGED: &str = "Password changed successfully";

const INVALID_CREDENTIALS: &str = "Invalid email or password";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmOutcome {
    Confirmed,
    AlreadyConfirmed,
}

impl ConfirmOutcome {
    pub fn message(self) -> &'static str {
        match self {
            ConfirmOutcome::Confirmed => MSG_EMAIL_CONFIRMED,
            ConfirmOutcome::AlreadyConfirmed => MSG_ALREADY_CONFIRMED,
        }
    }
}

#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserStore>,
    tokens: TokenService,
    mail: MailQueue,
}

impl AuthService {
    pub fn new(users: Arc<dyn UserStore>, tokens: TokenService, mail: MailQueue) -> Self {
        Self {
            users,
            tokens,
            mail,
        }
    }

    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    /// Create an unconfirmed account and queue its confirmation email.
    pub async fn signup(
        &self,
        email: &str,
        username: &str,
        password: &str,
        base_url: &str,
    ) -> AppResult<User> {
        if self.users.find_by_email(email).await?.is_some() {
            return Err(AppError::Conflict("Account already exists".to_string()));
        }
        let password_hash = hash_password(password)?;
        let user = self
            .users
            .insert(NewUser {
                username: username.to_string(),
                email: email.to_string(),
                password_hash,
            })
            .await?;
        info!(user_id = %user.id, "user signed up");
        self.queue_confirmation(&user, base_url)?;
        Ok(user)
    }

    pub async fn login(&self, email: &str, password: &str) -> AppResult<TokenPair> {
        let mut user = self
            .users
            .find_by_email(email)
            .await?
            .ok_or_else(|| AppError::Auth(INVALID_CREDENTIALS.to_string()))?;
        if !user.confirmed {
            return Err(AppError::Auth("Email not confirmed".to_string()));
        }
        if !verify_password(password, &user.password_hash) {
            debug!(user_id = %user.id, "password mismatch");
            return Err(AppError::Auth(INVALID_CREDENTIALS.to_string()));
        }
        let pair = self.rotate(&mut user).await?;
        info!(user_id = %user.id, "user logged in");
        Ok(pair)
    }

    /// Exchange the current refresh token for a new pair. A token that is
    /// valid but no longer the stored one (already rotated) is rejected.
    pub async fn refresh(&self, presented: &str) -> AppResult<TokenPair> {
        let email = self
            .tokens
            .validate(presented, TokenPurpose::Refresh)
            .map_err(|e| {
                debug!(error = %e, "refresh token rejected");
                AppError::Auth("Could not validate credentials".to_string())
            })?;
        let mut user = self
            .users
            .find_by_email(&email)
            .await?
            .ok_or_else(|| AppError::Auth("Invalid refresh token".to_string()))?;
        if user.refresh_token.as_deref() != Some(presented) {
            warn!(user_id = %user.id, "stale refresh token presented");
            return Err(AppError::Auth("Invalid refresh token".to_string()));
        }
        self.rotate(&mut user).await
    }

    pub async fn confirm_email(&self, token: &str) -> AppResult<ConfirmOutcome> {
        let email = self
            .tokens
            .validate(token, TokenPurpose::EmailConfirm)
            .map_err(|_| AppError::Validation("Invalid token for email verification".to_string()))?;
        let mut user = self
            .users
            .find_by_email(&email)
            .await?
            .ok_or_else(|| AppError::Validation("Verification error".to_string()))?;
        if user.confirmed {
            return Ok(ConfirmOutcome::AlreadyConfirmed);
        }
        user.confirmed = true;
        self.users.update(&user).await?;
        info!(user_id = %user.id, "email confirmed");
        Ok(ConfirmOutcome::Confirmed)
    }

    /// Re-send the confirmation email. Unknown addresses get the same answer
    /// as unconfirmed ones.
    pub async fn request_email(&self, email: &str, base_url: &str) -> AppResult<&'static str> {
        match self.users.find_by_email(email).await? {
            Some(user) if user.confirmed => Ok(MSG_ALREADY_CONFIRMED),
            Some(user) => {
                self.queue_confirmation(&user, base_url)?;
                Ok(MSG_CHECK_EMAIL)
            }
            None => {
                debug!("confirmation requested for unknown email");
                Ok(MSG_CHECK_EMAIL)
            }
        }
    }

    pub async fn request_password_reset(
        &self,
        email: &str,
        base_url: &str,
    ) -> AppResult<&'static str> {
        let user = self
            .users
            .find_by_email(email)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
        let token = self.tokens.issue_reset_token(&user.email)?;
        self.mail.enqueue(MailJob::PasswordReset {
            to: user.email.clone(),
            base_url: base_url.to_string(),
            token,
        });
        info!(user_id = %user.id, "password reset requested");
        Ok(MSG_RESET_SENT)
    }

    pub async fn confirm_password_reset(
        &self,
        token: &str,
        new_password: &str,
    ) -> AppResult<&'static str> {
        let email = self
            .tokens
            .validate(token, TokenPurpose::PasswordReset)
            .map_err(|_| AppError::Validation("Invalid or expired token".to_string()))?;
        let mut user = self
            .users
            .find_by_email(&email)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
        user.password_hash = hash_password(new_password)?;
        self.users.update(&user).await?;
        info!(user_id = %user.id, "password reset");
        Ok(MSG_PASSWORD_CHANGED)
    }

    /// Resolve the user behind an access token.
    pub async fn current_user(&self, access_token: &str) -> AppResult<User> {
        let unauthorized = || AppError::Auth("Could not validate credentials".to_string());
        let email = self
            .tokens
            .validate(access_token, TokenPurpose::Access)
            .map_err(|_| unauthorized())?;
        self.users
            .find_by_email(&email)
            .await?
            .ok_or_else(unauthorized)
    }

    pub async fn update_avatar(&self, mut user: User, avatar: Option<String>) -> AppResult<User> {
        user.avatar = avatar;
        self.users.update(&user).await
    }

    async fn rotate(&self, user: &mut User) -> AppResult<TokenPair> {
        let pair = self.tokens.issue_pair(&user.email)?;
        user.refresh_token = Some(pair.refresh_token.clone());
        self.users.update(user).await?;
        Ok(pair)
    }

    fn queue_confirmation(&self, user: &User, base_url: &str) -> AppResult<()> {
        let token = self.tokens.issue_email_token(&user.email)?;
        self.mail.enqueue(MailJob::Confirmation {
            to: user.email.clone(),
            username: user.username.clone(),
            base_url: base_url.to_string(),
            token,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TokenTtls;
    use crate::db::MemoryUserStore;
    use crate::mailer::Mailer;
    use async_trait::async_trait;
    use chrono::Duration;
    use tokio::sync::mpsc;

    const BASE: &str = "http://h.test/";

    /// Forwards every email as (recipient, token).
    struct ForwardingMailer(mpsc::UnboundedSender<(String, String)>);

    #[async_trait]
    impl Mailer for ForwardingMailer {
        async fn send_confirmation(&self, to: &str, _: &str, _: &str, token: &str) -> AppResult<()> {
            let _ = self.0.send((to.to_string(), token.to_string()));
            Ok(())
        }

        async fn send_password_reset(&self, to: &str, _: &str, token: &str) -> AppResult<()> {
            let _ = self.0.send((to.to_string(), token.to_string()));
            Ok(())
        }
    }

    struct Harness {
        auth: AuthService,
        store: MemoryUserStore,
        outbox: mpsc::UnboundedReceiver<(String, String)>,
    }

    impl Harness {
        async fn next_token(&mut self) -> String {
            tokio::time::timeout(std::time::Duration::from_secs(5), self.outbox.recv())
                .await
                .expect("email was not sent")
                .expect("outbox closed")
                .1
        }
    }

    fn harness() -> Harness {
        let (tx, outbox) = mpsc::unbounded_channel();
        let (queue, _worker) = MailQueue::start(Arc::new(ForwardingMailer(tx)), 64);
        let store = MemoryUserStore::new();
        let tokens = TokenService::new("service-test-secret-0123456789abcdef", TokenTtls::default());
        Harness {
            auth: AuthService::new(Arc::new(store.clone()), tokens, queue),
            store,
            outbox,
        }
    }

    async fn confirmed_user(h: &mut Harness) {
        h.auth.signup("a@x.com", "alice", "pw1", BASE).await.unwrap();
        let token = h.next_token().await;
        h.auth.confirm_email(&token).await.unwrap();
    }

    /// Never finishes a send until `release` fires.
    struct StalledMailer {
        release: Arc<tokio::sync::Notify>,
        delivered: Arc<std::sync::atomic::AtomicBool>,
    }

    #[async_trait]
    impl Mailer for StalledMailer {
        async fn send_confirmation(&self, _: &str, _: &str, _: &str, _: &str) -> AppResult<()> {
            self.release.notified().await;
            self.delivered.store(true, std::sync::atomic::Ordering::SeqCst);
            Ok(())
        }

        async fn send_password_reset(&self, _: &str, _: &str, _: &str) -> AppResult<()> {
            self.release.notified().await;
            self.delivered.store(true, std::sync::atomic::Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn signup_and_reset_do_not_wait_for_delivery() {
        let release = Arc::new(tokio::sync::Notify::new());
        let delivered = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let (queue, worker) = MailQueue::start(
            Arc::new(StalledMailer {
                release: release.clone(),
                delivered: delivered.clone(),
            }),
            64,
        );
        let tokens = TokenService::new("service-test-secret-0123456789abcdef", TokenTtls::default());
        let auth = AuthService::new(Arc::new(MemoryUserStore::new()), tokens, queue);

        let user = tokio::time::timeout(
            std::time::Duration::from_secs(2),
            auth.signup("a@x.com", "alice", "pw1", BASE),
        )
        .await
        .expect("signup waited on email delivery")
        .unwrap();
        assert_eq!(user.email, "a@x.com");

        tokio::time::timeout(
            std::time::Duration::from_secs(2),
            auth.request_password_reset("a@x.com", BASE),
        )
        .await
        .expect("reset request waited on email delivery")
        .unwrap();
        assert!(!delivered.load(std::sync::atomic::Ordering::SeqCst));

        release.notify_waiters();
        worker.shutdown(std::time::Duration::from_millis(100)).await;
    }

    #[tokio::test]
    async fn signup_twice_conflicts() {
        let mut h = harness();
        let user = h.auth.signup("a@x.com", "alice", "pw1", BASE).await.unwrap();
        assert!(!user.confirmed);
        assert_ne!(user.password_hash, "pw1");
        h.next_token().await;
        assert!(matches!(
            h.auth.signup("a@x.com", "alice2", "pw2", BASE).await,
            Err(AppError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn login_requires_confirmation() {
        let mut h = harness();
        h.auth.signup("a@x.com", "alice", "pw1", BASE).await.unwrap();
        match h.auth.login("a@x.com", "pw1").await {
            Err(AppError::Auth(msg)) => assert_eq!(msg, "Email not confirmed"),
            other => panic!("expected unauthorized, got {:?}", other.map(|_| ())),
        }

        let token = h.next_token().await;
        assert_eq!(h.auth.confirm_email(&token).await.unwrap(), ConfirmOutcome::Confirmed);

        let pair = h.auth.login("a@x.com", "pw1").await.unwrap();
        let stored = h.store.find_by_email("a@x.com").await.unwrap().unwrap();
        assert_eq!(stored.refresh_token.as_deref(), Some(pair.refresh_token.as_str()));
    }

    #[tokio::test]
    async fn login_rejects_unknown_user_and_wrong_password() {
        let mut h = harness();
        confirmed_user(&mut h).await;
        assert!(matches!(h.auth.login("b@x.com", "pw1").await, Err(AppError::Auth(_))));
        assert!(matches!(h.auth.login("a@x.com", "nope").await, Err(AppError::Auth(_))));
    }

    #[tokio::test]
    async fn confirmation_is_idempotent() {
        let mut h = harness();
        h.auth.signup("a@x.com", "alice", "pw1", BASE).await.unwrap();
        let token = h.next_token().await;
        assert_eq!(h.auth.confirm_email(&token).await.unwrap(), ConfirmOutcome::Confirmed);
        let again = h.auth.confirm_email(&token).await.unwrap();
        assert_eq!(again, ConfirmOutcome::AlreadyConfirmed);
        assert_eq!(again.message(), MSG_ALREADY_CONFIRMED);
        assert!(h.store.find_by_email("a@x.com").await.unwrap().unwrap().confirmed);
    }

    #[tokio::test]
    async fn confirm_for_vanished_user_is_bad_request() {
        let mut h = harness();
        h.auth.signup("a@x.com", "alice", "pw1", BASE).await.unwrap();
        let token = h.next_token().await;
        h.store.remove("a@x.com").await;
        assert!(matches!(h.auth.confirm_email(&token).await, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn refresh_rotates_and_rejects_reuse() {
        let mut h = harness();
        confirmed_user(&mut h).await;
        let first = h.auth.login("a@x.com", "pw1").await.unwrap();
        let second = h.auth.refresh(&first.refresh_token).await.unwrap();
        assert_ne!(first.refresh_token, second.refresh_token);
        assert!(matches!(
            h.auth.refresh(&first.refresh_token).await,
            Err(AppError::Auth(_))
        ));
        assert!(h.auth.refresh(&second.refresh_token).await.is_ok());
    }

    #[tokio::test]
    async fn second_login_invalidates_first_refresh_token() {
        let mut h = harness();
        confirmed_user(&mut h).await;
        let first = h.auth.login("a@x.com", "pw1").await.unwrap();
        h.auth.login("a@x.com", "pw1").await.unwrap();
        assert!(h.auth.refresh(&first.refresh_token).await.is_err());
    }

    #[tokio::test]
    async fn refresh_rejects_access_token() {
        let mut h = harness();
        confirmed_user(&mut h).await;
        let pair = h.auth.login("a@x.com", "pw1").await.unwrap();
        assert!(matches!(h.auth.refresh(&pair.access_token).await, Err(AppError::Auth(_))));
    }

    #[tokio::test]
    async fn password_reset_replaces_hash() {
        let mut h = harness();
        confirmed_user(&mut h).await;
        assert_eq!(
            h.auth.request_password_reset("a@x.com", BASE).await.unwrap(),
            MSG_RESET_SENT
        );
        let token = h.next_token().await;
        h.auth.confirm_password_reset(&token, "pw2").await.unwrap();

        let stored = h.store.find_by_email("a@x.com").await.unwrap().unwrap();
        assert!(!verify_password("pw1", &stored.password_hash));
        assert!(verify_password("pw2", &stored.password_hash));
        assert!(h.auth.login("a@x.com", "pw2").await.is_ok());
    }

    #[tokio::test]
    async fn password_reset_errors() {
        let mut h = harness();
        assert!(matches!(
            h.auth.request_password_reset("nobody@x.com", BASE).await,
            Err(AppError::NotFound(_))
        ));

        confirmed_user(&mut h).await;
        let confirm_token = h.auth.tokens().issue_email_token("a@x.com").unwrap();
        assert!(matches!(
            h.auth.confirm_password_reset(&confirm_token, "pw2").await,
            Err(AppError::Validation(_))
        ));

        let expired = h
            .auth
            .tokens()
            .issue("a@x.com", TokenPurpose::PasswordReset, Duration::seconds(-1))
            .unwrap();
        assert!(matches!(
            h.auth.confirm_password_reset(&expired, "pw2").await,
            Err(AppError::Validation(_))
        ));

        let valid = h.auth.tokens().issue_reset_token("a@x.com").unwrap();
        h.store.remove("a@x.com").await;
        assert!(matches!(
            h.auth.confirm_password_reset(&valid, "pw2").await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn request_email_resends_only_when_unconfirmed() {
        let mut h = harness();
        assert_eq!(h.auth.request_email("nobody@x.com", BASE).await.unwrap(), MSG_CHECK_EMAIL);

        h.auth.signup("a@x.com", "alice", "pw1", BASE).await.unwrap();
        h.next_token().await;
        assert_eq!(h.auth.request_email("a@x.com", BASE).await.unwrap(), MSG_CHECK_EMAIL);
        let resent = h.next_token().await;
        h.auth.confirm_email(&resent).await.unwrap();

        assert_eq!(
            h.auth.request_email("a@x.com", BASE).await.unwrap(),
            MSG_ALREADY_CONFIRMED
        );
    }

    #[tokio::test]
    async fn current_user_and_avatar() {
        let mut h = harness();
        confirmed_user(&mut h).await;
        let pair = h.auth.login("a@x.com", "pw1").await.unwrap();
        let me = h.auth.current_user(&pair.access_token).await.unwrap();
        assert_eq!(me.username, "alice");
        assert!(h.auth.current_user(&pair.refresh_token).await.is_err());

        let updated = h
            .auth
            .update_avatar(me, Some("https://img.test/a.png".to_string()))
            .await
            .unwrap();
        assert_eq!(updated.avatar.as_deref(), Some("https://img.test/a.png"));
    }
}
