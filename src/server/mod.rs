//! Dispatch server.
//!
//! Binds one TCP listener on every interface at the resolved port and serves
//! every registered controller role on it, plus the standard gRPC health
//! service. Both roles can be registered on a
//! single process; each stays addressable by its own service path.
//!
//! [`DispatchServer::start`] has no shutdown path: it returns only when the
//! listener cannot be bound or the transport fails. That mirrors how
//! controllers are deployed (the process manager restarts them). The HTTP
//! side of the system drains gracefully instead; see [`crate::http`].
//! [`DispatchServer::start_with_shutdown`] exists for embedding and tests.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tokio_util::sync::CancellationToken;
use tonic::service::{Routes, RoutesBuilder};
use tonic::transport::Server;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::controller::{ActionController, ContextUpdateService, PlacementController, PlacementService};
use crate::discovery::{ControllerEndpoint, ServiceLocator};
use crate::proto::contextupdate_server::ContextupdateServer;
use crate::proto::placement_controller_server::PlacementControllerServer;

/// Fatal dispatch server failures.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("Could not listen to port {addr}: {source}")]
    Listen {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("gRPC server failed: {0}")]
    Serve(#[from] tonic::transport::Error),

    #[error("gRPC server stopped accepting connections")]
    Stopped,
}

/// Span per inbound call, tagged with the RPC path.
pub fn grpc_trace_layer() -> TraceLayer<
    tower_http::classify::SharedClassifier<tower_http::classify::GrpcErrorsAsFailures>,
    impl Fn(&http::Request<tonic::body::BoxBody>) -> tracing::Span + Clone,
> {
    TraceLayer::new_for_grpc().make_span_with(|request: &http::Request<tonic::body::BoxBody>| {
        let path = request.uri().path();
        tracing::info_span!("dispatch", %path)
    })
}

/// Builder for the controller dispatch server.
pub struct DispatchServer {
    endpoint: ControllerEndpoint,
    action: Option<Arc<dyn ActionController>>,
    placement: Option<Arc<dyn PlacementController>>,
}

impl DispatchServer {
    /// Server listening on the port `locator` resolves.
    pub fn new(locator: &ServiceLocator) -> Self {
        Self::with_endpoint(locator.resolve())
    }

    pub fn with_endpoint(endpoint: ControllerEndpoint) -> Self {
        Self {
            endpoint,
            action: None,
            placement: None,
        }
    }

    /// Register the action role.
    pub fn with_action(mut self, controller: Arc<dyn ActionController>) -> Self {
        self.action = Some(controller);
        self
    }

    /// Register the placement role.
    pub fn with_placement(mut self, controller: Arc<dyn PlacementController>) -> Self {
        self.placement = Some(controller);
        self
    }

    pub fn endpoint(&self) -> &ControllerEndpoint {
        &self.endpoint
    }

    /// Bind and serve until the transport fails.
    pub async fn start(self) -> Result<Infallible, DispatchError> {
        let listener = self.bind().await?;
        self.serve_on(listener).await
    }

    /// Bind and serve until `shutdown` is cancelled.
    pub async fn start_with_shutdown(self, shutdown: CancellationToken) -> Result<(), DispatchError> {
        let listener = self.bind().await?;
        self.serve_on_with_shutdown(listener, shutdown).await
    }

    /// Serve on an already bound listener until the transport fails.
    pub async fn serve_on(self, listener: TcpListener) -> Result<Infallible, DispatchError> {
        let addr = local_addr(&listener);
        let routes = self.routes().await;
        info!(addr = %addr, "Controller dispatch server listening");

        Server::builder()
            .layer(grpc_trace_layer())
            .add_routes(routes)
            .serve_with_incoming(TcpListenerStream::new(listener))
            .await
            .map_err(|e| {
                error!(addr = %addr, error = %e, "gRPC server failed");
                DispatchError::Serve(e)
            })?;
        Err(DispatchError::Stopped)
    }

    /// Serve on an already bound listener until `shutdown` is cancelled.
    pub async fn serve_on_with_shutdown(
        self,
        listener: TcpListener,
        shutdown: CancellationToken,
    ) -> Result<(), DispatchError> {
        let addr = local_addr(&listener);
        let routes = self.routes().await;
        info!(addr = %addr, "Controller dispatch server listening");

        Server::builder()
            .layer(grpc_trace_layer())
            .add_routes(routes)
            .serve_with_incoming_shutdown(TcpListenerStream::new(listener), shutdown.cancelled_owned())
            .await?;
        info!(addr = %addr, "Controller dispatch server stopped");
        Ok(())
    }

    async fn bind(&self) -> Result<TcpListener, DispatchError> {
        let addr = self.endpoint.listen_addr();
        info!(host = %self.endpoint.host, port = self.endpoint.port, "Binding controller dispatch server");
        TcpListener::bind(addr).await.map_err(|source| {
            error!(addr = %addr, error = %source, "Could not listen to port");
            DispatchError::Listen {
                addr: addr.to_string(),
                source,
            }
        })
    }

    async fn routes(self) -> Routes {
        let (mut reporter, health_service) = tonic_health::server::health_reporter();
        let mut routes = RoutesBuilder::default();
        routes.add_service(health_service);

        if let Some(action) = self.action {
            reporter
                .set_serving::<ContextupdateServer<ContextUpdateService>>()
                .await;
            routes.add_service(ContextupdateServer::new(ContextUpdateService::new(action)));
            info!(service = %self.endpoint.service_name, "Registered action controller");
        }
        if let Some(placement) = self.placement {
            reporter
                .set_serving::<PlacementControllerServer<PlacementService>>()
                .await;
            routes.add_service(PlacementControllerServer::new(PlacementService::new(placement)));
            info!(service = %self.endpoint.service_name, "Registered placement controller");
        }
        routes.routes()
    }
}

fn local_addr(listener: &TcpListener) -> String {
    listener
        .local_addr()
        .map(|a: SocketAddr| a.to_string())
        .unwrap_or_else(|_| "unknown".to_string())
}
