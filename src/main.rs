use std::net::SocketAddr;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

use gatekeeper::config::GatekeeperConfig;
use gatekeeper::http::{AppState, HttpServer};
use gatekeeper::ratelimit::{PolicyCatalog, RateLimiter, SystemClock, TokioScheduler};

/// Command line arguments; anything set here wins over the config file.
#[derive(Parser, Debug)]
#[command(name = "gatekeeper")]
#[command(about = "Fixed-window admission control for cost-bearing endpoints", version)]
struct Args {
    /// Path to a YAML configuration file
    #[arg(short, long)]
    config: Option<String>,

    /// HTTP listen address
    #[arg(long)]
    http_addr: Option<SocketAddr>,

    /// Seconds between sweeps of expired counters
    #[arg(long)]
    sweep_interval_secs: Option<u64>,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

impl Args {
    /// Override file and environment settings with the flags that were given.
    fn apply(&self, config: &mut GatekeeperConfig) {
        if let Some(addr) = self.http_addr {
            config.server.http_addr = addr;
        }
        if let Some(secs) = self.sweep_interval_secs {
            config.rate_limiting.sweep_interval_secs = secs;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.log_format);

    info!("Starting Gatekeeper admission service");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let mut config = GatekeeperConfig::load(args.config.as_deref())?;
    args.apply(&mut config);
    config.validate()?;
    info!(http_addr = %config.server.http_addr, "Configuration loaded");

    let mut catalog = PolicyCatalog::builtin();
    if let Some(path) = &config.rate_limiting.policies_path {
        catalog = catalog.merge(PolicyCatalog::from_file(path)?);
    }
    for policy in catalog.iter() {
        info!(
            scope = policy.scope(),
            limit = policy.limit(),
            window_secs = policy.window_seconds(),
            "Policy loaded"
        );
    }

    let rate_limiter = Arc::new(RateLimiter::new(Arc::new(SystemClock::new())));
    rate_limiter.start_sweeper(
        &TokioScheduler::current()?,
        config.rate_limiting.sweep_interval(),
    );

    let server = HttpServer::new(
        config.server.http_addr,
        AppState::new(Arc::clone(&rate_limiter), catalog),
    );
    server.serve_with_shutdown(shutdown_signal()).await?;

    rate_limiter.shutdown();
    info!("Gatekeeper admission service stopped");
    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true);

    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
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
