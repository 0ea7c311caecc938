mod account;
mod chat;
mod clock;
mod config;
mod crypto;
mod entity;
mod mailer;
mod otp;
mod store;
mod web;

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = config::Config::load()?;

    let db = store::Db::new(&config.data_dir).await?;
    let clock: Arc<dyn clock::Clock> = Arc::new(clock::SystemClock);
    let mailer = Arc::new(mailer::BrevoMailer::new(&config.mail)?);

    let otp = otp::OtpService::new(
        db.clone(),
        db.clone(),
        mailer,
        clock.clone(),
        config.otp,
    );
    let accounts = account::AccountService::new(db.clone(), db.clone(), otp, clock);

    let gemini = Arc::new(chat::GeminiClient::new(&config.llm.url, config.llm.timeout)?);
    let chat = chat::ChatProxy::new(gemini, db.clone(), config.llm.api_keys.clone());

    let state = Arc::new(web::AppState {
        accounts,
        chat,
        sessions: db,
    });

    let listener = tokio::net::TcpListener::bind(&config.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind))?;
    info!("Listening on {}", config.bind);

    axum::serve(listener, web::router(state))
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
            }
            info!("Shutdown signal received");
        })
        .await?;

    info!("Shutdown complete");
    Ok(())
}
