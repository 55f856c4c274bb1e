//! Entry point: load config, wire dependencies, and run the server.

use rolodex::auth::TokenService;
use rolodex::config::Config;
use rolodex::db::{self, MemoryUserStore, PgUserStore, UserStore};
use rolodex::mailer::{LogMailer, Mailer, SmtpMailer};
use rolodex::services::mail::DEFAULT_MAIL_QUEUE_CAPACITY;
use rolodex::services::{AuthService, MailQueue};
use rolodex::{create_app, AppState};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const MAIL_DRAIN_GRACE: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = Config::from_env().map_err(|e| anyhow::anyhow!("config: {}", e))?;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))?;
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let users: Arc<dyn UserStore> = match &config.database_url {
        Some(url) => {
            let pool = db::create_pool(url).await?;
            db::run_migrations(&pool).await?;
            Arc::new(PgUserStore::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory user store");
            Arc::new(MemoryUserStore::new())
        }
    };

    let mailer: Arc<dyn Mailer> = match &config.smtp {
        Some(smtp) => Arc::new(SmtpMailer::new(smtp)?),
        None => {
            tracing::warn!("SMTP_HOST not set, outgoing email will only be logged");
            Arc::new(LogMailer)
        }
    };
    let (mail_queue, mail_worker) = MailQueue::start(mailer, DEFAULT_MAIL_QUEUE_CAPACITY);

    let tokens = TokenService::new(&config.jwt_secret, config.tokens);
    let state = AppState {
        auth_service: AuthService::new(users, tokens, mail_queue),
        public_base_url: config.public_base_url.clone(),
    };

    let app = create_app(state);

    tracing::info!(addr = %config.server_addr, "listening");
    let listener = tokio::net::TcpListener::bind(config.server_addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    mail_worker.shutdown(MAIL_DRAIN_GRACE).await;
    tracing::info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
