//! ctxctl-sample-controller: sample action and placement controller.
//!
//! Runs two listeners:
//!
//! - the gRPC dispatch server with both controller roles, on the port the
//!   service naming convention resolves (`SERVICE_NAME`, default `sample`;
//!   `<NAME>_SERVICE_PORT`, default 9050), bound on every interface
//! - the sample intent HTTP API on `service_port`, which drains for at most
//!   `shutdown_timeout_ms` after SIGINT/SIGTERM
//!
//! The dispatch server has no graceful shutdown; the process exits when the
//! HTTP API stops or either listener fails.
//!
//! Configuration: `--config <path>` or `CTXCTL_CONFIG`, plus `CTXCTL__*`
//! environment overrides.

use std::sync::Arc;

use ctxctl::appcontext::MemoryContextStore;
use ctxctl::config::Config;
use ctxctl::discovery::ACTION_CONTROLLER;
use ctxctl::http::serve_until_cancelled;
use ctxctl::intent::MemoryIntentStore;
use ctxctl::sample::{api, SampleAction, SamplePlacement, SampleStores};
use ctxctl::server::DispatchServer;
use ctxctl::utils::bootstrap::{init_tracing, parse_config_path, shutdown_on_signal};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let config = Config::load(parse_config_path().as_deref())?;
    let port: u16 = config.service_port.parse()?;

    let stores = SampleStores {
        contexts: Arc::new(MemoryContextStore::new()),
        intents: Arc::new(MemoryIntentStore::new()),
    };

    let listener = TcpListener::bind(("0.0.0.0", port)).await.map_err(|e| {
        error!(port, error = %e, "Could not listen to port");
        e
    })?;
    let shutdown = CancellationToken::new();
    shutdown_on_signal(shutdown.clone());
    let intent_api = serve_until_cancelled(
        listener,
        api::router(stores.intents.clone()),
        shutdown,
        config.shutdown_timeout(),
    );

    let server = DispatchServer::new(&ACTION_CONTROLLER)
        .with_action(Arc::new(SampleAction::new(stores.clone())))
        .with_placement(Arc::new(SamplePlacement::new(stores)));

    info!(
        service = %server.endpoint().service_name,
        grpc_port = server.endpoint().port,
        http_port = port,
        "ctxctl-sample-controller starting"
    );

    tokio::select! {
        result = server.start() => match result {
            Ok(never) => match never {},
            Err(e) => {
                error!(error = %e, "Controller dispatch server exited");
                Err(e.into())
            }
        },
        result = intent_api => {
            result.inspect_err(|e| error!(error = %e, "Sample intent API exited"))?;
            info!("ctxctl-sample-controller stopped");
            Ok(())
        }
    }
}
