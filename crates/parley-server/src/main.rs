//! Parley scene server entry point.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use parley_core::clock::SystemClock;
use parley_core::rng::SystemRng;
use parley_server::config::{AppConfig, LogConfig, LogFormat};
use parley_server::error::AppError;
use parley_server::routes;
use parley_server::state::AppState;
use parley_transport::tcp_transport::TcpTransport;

/// Parley scene server.
#[derive(Debug, Parser)]
#[command(name = "parley-server", version)]
#[command(about = "Turn-taking scene server for a connected game process")]
struct Args {
    /// YAML configuration file. Defaults are used when omitted.
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Write the default configuration to PATH and exit.
    #[arg(long, value_name = "PATH")]
    write_default_config: Option<PathBuf>,
}

fn init_tracing(log: &LogConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log.level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match log.format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.pretty().init(),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "cannot listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let args = Args::parse();

    if let Some(path) = &args.write_default_config {
        AppConfig::default().write_to(path)?;
        return Ok(());
    }

    let mut config = AppConfig::load(args.config.as_deref())?;
    config.apply_env_overrides(|name| std::env::var(name).ok())?;

    init_tracing(&config.log);
    info!(policy = ?config.policy, "starting parley scene server");

    let transport = Arc::new(TcpTransport::new(config.transport.clone()));
    let app_state = AppState::assemble(
        &config,
        transport,
        Arc::new(SystemClock),
        Box::new(SystemRng::new()),
    );
    app_state.bus.start().await?;
    let ticker = Arc::clone(&app_state.coordinator).spawn();

    let app = routes::build_router(app_state.clone())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = config.http.bind_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "http control surface listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    ticker.abort();
    app_state.bus.shutdown();
    info!("parley scene server stopped");

    Ok(())
}
