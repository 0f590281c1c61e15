//! Dispatch server with both controller roles, driven through the
//! orchestrator-side client over real TCP.

use std::sync::Arc;

use async_trait::async_trait;
use ctxctl::appcontext::AppContextId;
use ctxctl::client::{
    invoke_context_terminate, invoke_context_update, invoke_filter_clusters, invoke_post_event, ClientError,
};
use ctxctl::config::Config;
use ctxctl::controller::{ActionController, ControllerError, PlacementController, FILTER_FAILED};
use ctxctl::discovery::{ControllerEndpoint, ControllerRole, ACTION_CONTROLLER};
use ctxctl::proto::EventType;
use ctxctl::server::{DispatchError, DispatchServer};
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// Fails every call whose AppContext handle is "missing".
#[derive(Default)]
struct Recording {
    events: Mutex<Vec<(String, EventType)>>,
}

#[async_trait]
impl ActionController for Recording {
    async fn update_app_context(
        &self,
        _intent_name: &str,
        app_context: &AppContextId,
        _update_from: Option<&AppContextId>,
    ) -> Result<(), ControllerError> {
        if app_context.as_str() == "missing" {
            return Err(ControllerError::msg("not found"));
        }
        Ok(())
    }

    async fn post_event(&self, app_context: &AppContextId, event: EventType) -> Result<(), ControllerError> {
        self.events
            .lock()
            .await
            .push((app_context.to_string(), event));
        Ok(())
    }
}

struct Placement;

#[async_trait]
impl PlacementController for Placement {
    async fn filter_clusters(&self, app_context: &AppContextId) -> Result<(), ControllerError> {
        if app_context.as_str() == "missing" {
            return Err(ControllerError::msg("not found"));
        }
        Ok(())
    }
}

struct Harness {
    endpoint: ControllerEndpoint,
    action: Arc<Recording>,
    shutdown: CancellationToken,
    config: Config,
}

impl Drop for Harness {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn start() -> Harness {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let endpoint = ControllerEndpoint {
        service_name: "sample".to_string(),
        host: "127.0.0.1".to_string(),
        port,
        role: ControllerRole::Action,
    };

    let action = Arc::new(Recording::default());
    let shutdown = CancellationToken::new();
    let server = DispatchServer::with_endpoint(endpoint.clone())
        .with_action(action.clone())
        .with_placement(Arc::new(Placement));
    let token = shutdown.clone();
    tokio::spawn(async move { server.serve_on_with_shutdown(listener, token).await });

    Harness {
        endpoint,
        action,
        shutdown,
        config: Config::for_test(),
    }
}

#[tokio::test]
async fn test_update_app_context_success() {
    let h = start().await;
    invoke_context_update(&h.config, &h.endpoint, "i1", "ctx1", "")
        .await
        .unwrap();
}

#[tokio::test]
async fn test_update_app_context_failure_reports_controller_message() {
    let h = start().await;
    let err = invoke_context_update(&h.config, &h.endpoint, "i1", "missing", "")
        .await
        .unwrap_err();

    match err {
        ClientError::Rejected { message, .. } => assert_eq!(message, "not found"),
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_update_app_context_rejects_empty_intent() {
    let h = start().await;
    let err = invoke_context_update(&h.config, &h.endpoint, "", "ctx1", "")
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Rejected { .. }));
}

#[tokio::test]
async fn test_terminate_uses_default_action() {
    let h = start().await;
    invoke_context_terminate(&h.config, &h.endpoint, "ctx1")
        .await
        .unwrap();
}

#[tokio::test]
async fn test_post_event_reaches_controller() {
    let h = start().await;
    invoke_post_event(&h.config, &h.endpoint, "ctx1", "TERMINATE")
        .await
        .unwrap();

    let events = h.action.events.lock().await;
    assert_eq!(events.as_slice(), &[("ctx1".to_string(), EventType::Terminate)]);
}

#[tokio::test]
async fn test_post_event_unknown_name() {
    let h = start().await;
    let err = invoke_post_event(&h.config, &h.endpoint, "ctx1", "RESTART")
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::UnknownEvent(_)));
}

#[tokio::test]
async fn test_filter_clusters_on_same_listener() {
    let h = start().await;
    let response = invoke_filter_clusters(&h.config, &h.endpoint, "ctx1")
        .await
        .unwrap();
    assert!(response.status);
    assert_eq!(response.app_context, "ctx1");

    let err = invoke_filter_clusters(&h.config, &h.endpoint, "missing")
        .await
        .unwrap_err();
    match err {
        ClientError::Rejected { message, .. } => assert_eq!(message, FILTER_FAILED),
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_health_reports_serving() {
    use tonic_health::pb::health_client::HealthClient;
    use tonic_health::pb::HealthCheckRequest;

    let h = start().await;
    let channel = tonic::transport::Channel::from_shared(h.endpoint.uri())
        .unwrap()
        .connect()
        .await
        .unwrap();
    let mut client = HealthClient::new(channel);
    let response = client
        .check(HealthCheckRequest {
            service: "contextupdate.Contextupdate".to_string(),
        })
        .await
        .unwrap()
        .into_inner();
    assert_eq!(response.status, 1); // SERVING
}

#[tokio::test]
async fn test_unreachable_controller() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let endpoint = ControllerEndpoint {
        service_name: "gone".to_string(),
        host: "127.0.0.1".to_string(),
        port,
        role: ControllerRole::Action,
    };
    let err = invoke_context_update(&Config::for_test(), &endpoint, "i1", "ctx1", "")
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Connect { .. }));
}

#[tokio::test]
async fn test_start_fails_when_port_taken() {
    let taken = TcpListener::bind("0.0.0.0:0").await.unwrap();
    let endpoint = ControllerEndpoint {
        service_name: "sample".to_string(),
        host: "127.0.0.1".to_string(),
        port: taken.local_addr().unwrap().port(),
        role: ControllerRole::Action,
    };

    let err = DispatchServer::with_endpoint(endpoint)
        .with_action(Arc::new(Recording::default()))
        .start()
        .await
        .unwrap_err();
    assert!(matches!(err, DispatchError::Listen { .. }));
}

#[tokio::test]
async fn test_start_serves_when_resolved_host_is_not_local() {
    let free = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = free.local_addr().unwrap().port();
    drop(free);

    // Kubernetes sets <NAME>_SERVICE_HOST to the Service ClusterIP.
    let resolved = ACTION_CONTROLLER.resolve_with(|var| match var {
        "SAMPLE_SERVICE_HOST" => Some("10.96.12.34".to_string()),
        "SAMPLE_SERVICE_PORT" => Some(port.to_string()),
        _ => None,
    });
    assert_eq!(resolved.host, "10.96.12.34");

    let shutdown = CancellationToken::new();
    let server = tokio::spawn(
        DispatchServer::with_endpoint(resolved.clone())
            .with_action(Arc::new(Recording::default()))
            .start_with_shutdown(shutdown.clone()),
    );

    let local = ControllerEndpoint {
        host: "127.0.0.1".to_string(),
        ..resolved
    };
    let config = Config::for_test();
    let mut result = invoke_context_update(&config, &local, "i1", "ctx1", "").await;
    for _ in 0..50 {
        if !matches!(result, Err(ClientError::Connect { .. })) {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        result = invoke_context_update(&config, &local, "i1", "ctx1", "").await;
    }
    result.unwrap();

    shutdown.cancel();
    server.await.unwrap().unwrap();
}
