//! ctxctl-policy: policy service HTTP API.
//!
//! Serves the `/v2` policy API on `service_port` until SIGINT/SIGTERM, then
//! drains in-flight requests for at most `shutdown_timeout_ms`.
//!
//! Configuration: `--config <path>` or `CTXCTL_CONFIG`, plus `CTXCTL__*`
//! environment overrides.

use std::sync::Arc;

use ctxctl::actor::ActorRegistry;
use ctxctl::config::Config;
use ctxctl::http::{router, serve_until_cancelled, PolicyApi};
use ctxctl::policy::{MemoryPolicyStore, PolicyExecutor};
use ctxctl::utils::bootstrap::{init_tracing, parse_config_path, shutdown_on_signal};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let config = Config::load(parse_config_path().as_deref())?;
    let port: u16 = config.service_port.parse()?;

    let api = PolicyApi {
        store: Arc::new(MemoryPolicyStore::new()),
        executor: PolicyExecutor::new(ActorRegistry::with_defaults(&config)?),
    };

    let listener = TcpListener::bind(("0.0.0.0", port)).await.map_err(|e| {
        error!(port, error = %e, "Could not listen to port");
        e
    })?;
    info!(port, "ctxctl-policy started");

    let shutdown = CancellationToken::new();
    shutdown_on_signal(shutdown.clone());

    serve_until_cancelled(listener, router(api), shutdown, config.shutdown_timeout()).await?;
    Ok(())
}
