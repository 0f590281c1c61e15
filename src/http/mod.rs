//! HTTP side of the policy service.
//!
//! [`router`] builds the `/v2` API. [`serve_until_cancelled`] is the shutdown
//! pattern every long-running HTTP listener here uses: serve until a
//! cancellation token fires, then give in-flight requests a bounded window to
//! finish before tearing the server down.

mod handlers;

use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::policy::{PolicyExecutor, PolicyStore};

pub const API_VERSION: &str = "v2";

const POLICY_INTENT_PATH: &str = "/projects/:project/composite-apps/:composite_app/:composite_app_version/deployment-intent-groups/:deployment_intent_group/policy-intents/:policy_intent_id";

#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    #[error("HTTP server failed: {0}")]
    Serve(#[source] std::io::Error),

    #[error("HTTP server did not drain within {0:?}")]
    DrainTimeout(Duration),

    #[error("HTTP server task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Shared state for the policy API handlers.
#[derive(Clone)]
pub struct PolicyApi {
    pub store: Arc<dyn PolicyStore>,
    pub executor: PolicyExecutor,
}

/// Build the `/v2` router.
pub fn router(api: PolicyApi) -> Router {
    let v2 = Router::new()
        .route("/health", get(handlers::health))
        .route("/policy/agents", get(handlers::list_agents))
        .route(
            "/policy/agents/:id",
            post(handlers::register_agent)
                .get(handlers::get_agent)
                .delete(handlers::delete_agent),
        )
        .route("/policy/agents/:id/events/:event_id", post(handlers::ingest_event))
        .route(
            "/policies/:policy_id",
            post(handlers::create_policy)
                .get(handlers::get_policy)
                .delete(handlers::delete_policy),
        )
        .route(
            POLICY_INTENT_PATH,
            post(handlers::create_policy_intent)
                .get(handlers::get_policy_intent)
                .delete(handlers::delete_policy_intent),
        )
        .with_state(api);

    Router::new()
        .nest(&format!("/{}", API_VERSION), v2)
        .layer(TraceLayer::new_for_http())
}

/// Serve `router` on `listener` until `shutdown` is cancelled, then wait at
/// most `drain` for in-flight requests.
pub async fn serve_until_cancelled(
    listener: TcpListener,
    router: Router,
    shutdown: CancellationToken,
    drain: Duration,
) -> Result<(), HttpError> {
    if let Ok(addr) = listener.local_addr() {
        info!(addr = %addr, "HTTP server listening");
    }

    let signal = shutdown.clone();
    let mut server = tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(signal.cancelled_owned())
            .await
    });

    let result = tokio::select! {
        result = &mut server => result,
        _ = shutdown.cancelled() => {
            info!(drain = ?drain, "Shutting down HTTP server");
            match tokio::time::timeout(drain, &mut server).await {
                Ok(result) => result,
                Err(_) => {
                    warn!(drain = ?drain, "Shutting down HTTP server timed out");
                    server.abort();
                    return Err(HttpError::DrainTimeout(drain));
                }
            }
        }
    };

    result?.map_err(HttpError::Serve)?;
    info!("HTTP server stopped");
    Ok(())
}
