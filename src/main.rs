use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use outlay::{
    api::{build_router, AppState},
    config::{CliArgs, Command, Config},
    report::run_report,
    storage::{open_storage, StorageBackend},
    telemetry::{init_logging, install_metrics},
    token::TokenSigner,
};
use time::Duration;
use tokio::signal;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliArgs::parse();
    let config = Config::load(&cli);
    init_logging(&config.logging);

    let storage = open_storage(&config.storage).context("failed to open storage")?;

    match cli.command.clone().unwrap_or(Command::Serve) {
        Command::Serve => serve(config, storage).await,
        Command::Report {
            email,
            month,
            category,
        } => {
            let summary = run_report(
                storage.as_ref(),
                &email,
                month.as_deref(),
                category.as_deref(),
            )?;
            println!("{}", summary);
            Ok(())
        }
    }
}

async fn serve(config: Config, storage: Arc<dyn StorageBackend>) -> anyhow::Result<()> {
    let ttl = Duration::days(i64::from(config.auth.token_ttl_days));
    let tokens = match config.auth.jwt_secret.as_deref() {
        Some(secret) if !secret.is_empty() => TokenSigner::new(secret, ttl),
        _ => {
            tracing::warn!("No JWT secret configured; sessions will not survive a restart");
            TokenSigner::random(ttl)
        }
    };

    let metrics = if config.metrics.enabled {
        install_metrics()
    } else {
        None
    };

    let state = AppState::new(storage, tokens)
        .with_cookie_secure(config.auth.cookie_secure)
        .with_metrics(metrics);
    let app = build_router(Arc::new(state));

    let addr = config
        .listen_addr()
        .context("invalid server host or port")?;
    tracing::info!(%addr, "API listening");

    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutdown signal received");
}
