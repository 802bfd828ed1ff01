//! SecretStack - local Secret Manager emulator
//!
//! Serves the Secret Manager API over an RPC-style JSON binding and a REST
//! binding, backed by an in-memory store, with an optional authorization gate
//! that consults an external policy oracle.

mod config;
mod router;
mod signals;

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use secretstack_auth::AuthzGate;
use secretstack_secretmanager::SecretManagerState;

#[derive(Parser, Debug)]
#[command(name = "secretstack")]
#[command(about = "Local emulator for the Secret Manager API", long_about = None)]
struct Args {
    /// Port to listen on [default: 8080]
    #[arg(short, long, env = "SECRETSTACK_PORT")]
    port: Option<u16>,

    /// Host to bind to [default: 0.0.0.0]
    #[arg(long, env = "SECRETSTACK_HOST")]
    host: Option<String>,

    /// Authorization mode: off, permissive, or strict [default: off]
    #[arg(long, env = "IAM_MODE")]
    iam_mode: Option<String>,

    /// Policy oracle endpoint (host:port or URL)
    #[arg(long, env = "IAM_HOST")]
    iam_host: Option<String>,

    /// Deadline for a single policy check in milliseconds [default: 5000]
    #[arg(long, env = "IAM_TIMEOUT_MS")]
    iam_timeout_ms: Option<u64>,

    /// Log level (trace, debug, info, warn, error) [default: info]
    #[arg(long, env = "SECRETSTACK_LOG_LEVEL")]
    log_level: Option<String>,

    /// Configuration file
    #[arg(long)]
    config: Option<PathBuf>,
}

impl Args {
    /// Command line and environment take precedence over the config file
    fn apply(self, config: &mut config::Config) {
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(host) = self.host {
            config.server.host = host;
        }
        if let Some(level) = self.log_level {
            config.server.log_level = level;
        }
        if let Some(mode) = self.iam_mode {
            config.authz.mode = mode;
        }
        if let Some(host) = self.iam_host {
            config.authz.host = Some(host);
        }
        if let Some(timeout) = self.iam_timeout_ms {
            config.authz.timeout_ms = timeout;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let mut settings = config::Config::load(args.config.as_deref())?;
    args.apply(&mut settings);

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "secretstack={},tower_http=debug",
                    settings.server.log_level
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let authz = settings.authz_config()?;
    let gate = AuthzGate::from_config(&authz)?;

    info!("Starting SecretStack...");
    info!("  IAM mode: {}", gate.mode());
    if let Some(endpoint) = authz.endpoint.as_deref().filter(|_| gate.mode().is_enabled()) {
        info!("  Policy oracle: {} (timeout {:?})", endpoint, authz.check_timeout);
    }

    let app = router::create_router(SecretManagerState::new(gate));

    let addr: SocketAddr = format!("{}:{}", settings.server.host, settings.server.port).parse()?;
    info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(signals::wait_for_shutdown_signal())
        .await?;

    info!("SecretStack stopped");
    Ok(())
}
