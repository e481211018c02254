use clap::Parser;
use std::future::Future;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing::{info, warn};

use turnstile::config::TurnstileConfig;
use turnstile::ratelimit::{build_limiter, RateLimiter};
use turnstile::web::{AppState, HttpServer};

/// Per-client rate limited HTTP service.
#[derive(Debug, Parser)]
#[command(name = "turnstile", version, about)]
struct Args {
    /// Path to a YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listen address from the configuration
    #[arg(long)]
    addr: Option<SocketAddr>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = TurnstileConfig::load(args.config.as_deref())?;
    if let Some(addr) = args.addr {
        config.server.addr = addr;
    }

    turnstile::logging::init(&config.logging)?;

    info!("Starting Turnstile");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    info!(
        addr = %config.server.addr,
        env = %config.server.env,
        rate_limit_enabled = config.rate_limit.enabled,
        "Configuration loaded"
    );

    let rate_limiter = if config.rate_limit.enabled {
        Some(build_limiter(config.rate_limit.limiter_spec())?)
    } else {
        warn!("Rate limiting is disabled");
        None
    };

    let state = AppState::new(rate_limiter.clone(), config.server.request_timeout());
    let server = HttpServer::new(config.server.addr, state);

    // Run the server with graceful shutdown on Ctrl+C
    run(server, rate_limiter, shutdown_signal()).await?;

    info!("Turnstile stopped");
    Ok(())
}

/// Serve until `signal` resolves, then close the limiter.
///
/// The limiter is closed even when the server fails, and the server error is
/// returned afterwards.
async fn run<F>(
    server: HttpServer,
    rate_limiter: Option<Arc<dyn RateLimiter>>,
    signal: F,
) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let served = server.serve_with_shutdown(signal).await;

    if let Some(limiter) = rate_limiter {
        limiter.close().await?;
        info!("Rate limiter stopped");
    }

    served?;
    Ok(())
}

/// Wait for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
