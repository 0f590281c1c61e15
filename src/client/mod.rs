//! Orchestrator-side calls into controllers.
//!
//! Each call connects to the resolved endpoint, applies the configured call
//! deadline, and folds both result channels into one outcome: a transport
//! error whose details carry a response is reported with that response's
//! message, the same as a successful call that reports failure.

use std::future::Future;
use std::time::Duration;

use prost::Message;
use tonic::transport::Channel;
use tonic::Status;
use tracing::{info, warn};

use crate::config::Config;
use crate::discovery::ControllerEndpoint;
use crate::proto::contextupdate_client::ContextupdateClient;
use crate::proto::placement_controller_client::PlacementControllerClient;
use crate::proto::{
    ContextUpdateRequest, ContextUpdateResponse, EventType, PostEventRequest, PostEventResponse,
    ResourceRequest, ResourceResponse, TerminateRequest, TerminateResponse,
};

/// Errors from calling a controller.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Could not get a client for {service}: {source}")]
    Connect {
        service: String,
        #[source]
        source: tonic::transport::Error,
    },

    #[error("Invalid controller address {0}")]
    InvalidAddress(String),

    #[error("{method} to {service} timed out after {timeout:?}")]
    Timeout {
        method: &'static str,
        service: String,
        timeout: Duration,
    },

    #[error("{method} Failed: {message}")]
    Rejected { method: &'static str, message: String },

    #[error("{method} call failed: {status}")]
    Rpc {
        method: &'static str,
        #[source]
        status: Status,
    },

    #[error("Unknown event type {0}")]
    UnknownEvent(String),
}

/// A controller reply that reports success or failure in-band.
trait Outcome: Message + Default {
    fn succeeded(&self) -> bool;
    fn message(&self) -> &str;
}

impl Outcome for ContextUpdateResponse {
    fn succeeded(&self) -> bool {
        self.app_context_updated
    }
    fn message(&self) -> &str {
        &self.app_context_update_message
    }
}

impl Outcome for TerminateResponse {
    fn succeeded(&self) -> bool {
        self.app_context_terminated
    }
    fn message(&self) -> &str {
        &self.app_context_terminated_message
    }
}

impl Outcome for PostEventResponse {
    fn succeeded(&self) -> bool {
        self.success
    }
    fn message(&self) -> &str {
        &self.post_event_message
    }
}

impl Outcome for ResourceResponse {
    fn succeeded(&self) -> bool {
        self.status
    }
    fn message(&self) -> &str {
        &self.message
    }
}

async fn connect(endpoint: &ControllerEndpoint) -> Result<Channel, ClientError> {
    let uri = endpoint.uri();
    let channel = Channel::from_shared(uri.clone()).map_err(|_| ClientError::InvalidAddress(uri))?;
    channel.connect().await.map_err(|source| ClientError::Connect {
        service: endpoint.service_name.clone(),
        source,
    })
}

/// Run `call` under the configured deadline and interpret its outcome.
async fn invoke<R, F, Fut>(
    config: &Config,
    endpoint: &ControllerEndpoint,
    method: &'static str,
    call: F,
) -> Result<R, ClientError>
where
    R: Outcome,
    F: FnOnce(Channel) -> Fut,
    Fut: Future<Output = Result<tonic::Response<R>, Status>>,
{
    let timeout = config.grpc_call_timeout();
    let attempt = async {
        let channel = connect(endpoint).await?;
        Ok::<_, ClientError>(call(channel).await)
    };
    let result = tokio::time::timeout(timeout, attempt)
        .await
        .map_err(|_| ClientError::Timeout {
            method,
            service: endpoint.service_name.clone(),
            timeout,
        })??;

    let response = match result {
        Ok(response) => response.into_inner(),
        Err(status) => match R::decode(status.details()) {
            Ok(response) if !status.details().is_empty() => response,
            _ => return Err(ClientError::Rpc { method, status }),
        },
    };

    if response.succeeded() {
        info!(
            method,
            controller = %endpoint.service_name,
            message = response.message(),
            "Controller call passed"
        );
        Ok(response)
    } else {
        warn!(
            method,
            controller = %endpoint.service_name,
            message = response.message(),
            "Controller call failed"
        );
        Err(ClientError::Rejected {
            method,
            message: response.message().to_string(),
        })
    }
}

/// Ask an action controller to apply `intent_name` to `app_context`.
pub async fn invoke_context_update(
    config: &Config,
    endpoint: &ControllerEndpoint,
    intent_name: &str,
    app_context: &str,
    update_from_app_context: &str,
) -> Result<(), ClientError> {
    let request = ContextUpdateRequest {
        app_context: app_context.to_string(),
        intent_name: intent_name.to_string(),
        update_from_app_context: update_from_app_context.to_string(),
    };
    invoke(config, endpoint, "ContextUpdate", |channel| async move {
        ContextupdateClient::new(channel).update_app_context(request).await
    })
    .await
    .map(|_| ())
}

/// Ask an action controller to release `app_context`.
pub async fn invoke_context_terminate(
    config: &Config,
    endpoint: &ControllerEndpoint,
    app_context: &str,
) -> Result<(), ClientError> {
    let request = TerminateRequest {
        app_context: app_context.to_string(),
    };
    invoke(config, endpoint, "Terminate Context", |channel| async move {
        ContextupdateClient::new(channel).terminate_app_context(request).await
    })
    .await
    .map(|_| ())
}

/// Forward a lifecycle event, given by its wire name (`INSTANTIATE`, ...).
pub async fn invoke_post_event(
    config: &Config,
    endpoint: &ControllerEndpoint,
    app_context: &str,
    event_type: &str,
) -> Result<(), ClientError> {
    let event = EventType::from_str_name(event_type)
        .ok_or_else(|| ClientError::UnknownEvent(event_type.to_string()))?;
    let request = PostEventRequest {
        app_context: app_context.to_string(),
        event_type: event as i32,
    };
    invoke(config, endpoint, "PostEvent", |channel| async move {
        ContextupdateClient::new(channel).post_event(request).await
    })
    .await
    .map(|_| ())
}

/// Ask a placement controller to filter the clusters of `app_context`.
pub async fn invoke_filter_clusters(
    config: &Config,
    endpoint: &ControllerEndpoint,
    app_context: &str,
) -> Result<ResourceResponse, ClientError> {
    let request = ResourceRequest {
        app_context: app_context.to_string(),
    };
    invoke(config, endpoint, "FilterClusters", |channel| async move {
        PlacementControllerClient::new(channel).filter_clusters(request).await
    })
    .await
}
