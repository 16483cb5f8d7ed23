mod admin;
mod cli;
mod config_source;
mod data_dir;
mod dsn;

use anyhow::{Context, Result};
use axum::Router;
use axum::http::StatusCode;
use axum::routing::get;
use clap::Parser;

use cli::Cli;
use config_source::FileConfigSource;
use novagate_common::Settings;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let data_dir = data_dir::resolve_data_dir(&cli.data_dir);
    let dsn = dsn::resolve_dsn(&cli.dsn, &data_dir).context("resolve dsn")?;

    let defaults = Settings::default();
    let host = if cli.host.trim().is_empty() { defaults.host.clone() } else { cli.host.clone() };
    let port = cli.port.unwrap_or(defaults.port);
    let settings = Settings { host, port, dsn, ..defaults };

    let db = novagate_storage::connect_shared(&settings.dsn)
        .await
        .context("connect database")?;
    novagate_storage::sync_schema(&db).await.context("sync database schema")?;

    let config_source = FileConfigSource::new(cli.config.as_str());

    let boot = novagate_core::bootstrap::bootstrap(&settings, &config_source, db, cli.proxy.clone())
        .await
        .context("bootstrap gateway")?;

    let app = Router::new()
        .merge(novagate_core::handler::router(boot.state.clone()))
        .merge(admin::router(boot.state.clone()))
        .route("/favicon.ico", get(|| async { StatusCode::NO_CONTENT }));

    let bind = format!("{}:{}", settings.host, settings.port);
    let listener = tokio::net::TcpListener::bind(&bind).await.context("bind listener")?;
    tracing::info!(event = "listening", addr = %bind);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serve")?;
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!(event = "shutdown_requested"),
        Err(err) => tracing::warn!(event = "shutdown_signal_error", error = %err),
    }
}
