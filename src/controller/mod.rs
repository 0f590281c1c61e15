//! Controller contract.
//!
//! Two capability traits, one per role:
//! - [`ActionController`] mutates the resources of an AppContext
//! - [`PlacementController`] narrows the clusters an AppContext deploys to
//!
//! Each call runs through the same three states. `Received` validates the
//! request shape and never touches the document. `Mutating` runs the role's
//! business logic on its own task, so a panic there becomes a failed response
//! instead of a dropped connection. `Responded` emits exactly one reply whose
//! message and error always agree.

mod service;

use std::future::Future;

use async_trait::async_trait;
use tracing::{debug, error, info};

use crate::appcontext::{AppContextId, StoreError};
use crate::intent::IntentError;
use crate::proto::{
    ContextUpdateRequest, ContextUpdateResponse, EventType, PostEventRequest, PostEventResponse,
    ResourceRequest, ResourceResponse, TerminateRequest, TerminateResponse,
};

pub use service::{ContextUpdateService, PlacementService};

pub const CONTEXT_UPDATED: &str = "Context updated successfully.";
pub const CONTEXT_TERMINATED: &str = "Context Terminated successfully.";
pub const EVENT_POSTED: &str = "Post Context Updated successfully.";
pub const INVALID_REQUEST: &str = "Invalid request.";
pub const FILTER_FAILED: &str = "Failed to filter clusters.";

/// Errors a controller reports for a single call.
#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    #[error("invalid request: {0}")]
    InvalidRequest(&'static str),

    #[error(transparent)]
    Context(#[from] StoreError),

    #[error(transparent)]
    Intent(#[from] IntentError),

    #[error("No intents are defined for the deploymentIntentGroup: {0}")]
    NoIntents(String),

    #[error("controller task aborted: {0}")]
    Aborted(String),

    #[error("{0}")]
    Failed(String),
}

impl ControllerError {
    /// Failure carrying only a message.
    pub fn msg(message: impl Into<String>) -> Self {
        ControllerError::Failed(message.into())
    }

    pub fn is_invalid_request(&self) -> bool {
        matches!(self, ControllerError::InvalidRequest(_))
    }
}

/// Action role: arbitrary mutation of an AppContext.
#[async_trait]
pub trait ActionController: Send + Sync + 'static {
    /// Apply `intent_name` to the AppContext behind `app_context`.
    ///
    /// Returning `Ok` promises the document has been written.
    async fn update_app_context(
        &self,
        intent_name: &str,
        app_context: &AppContextId,
        update_from: Option<&AppContextId>,
    ) -> Result<(), ControllerError>;

    /// Release whatever the controller created for `app_context`.
    async fn terminate_app_context(&self, app_context: &AppContextId) -> Result<(), ControllerError> {
        debug!(app_context = %app_context, "No terminate action registered");
        Ok(())
    }

    /// React to a lifecycle event for `app_context`.
    async fn post_event(&self, app_context: &AppContextId, event: EventType) -> Result<(), ControllerError> {
        debug!(app_context = %app_context, event = event.as_str_name(), "No post-event action registered");
        Ok(())
    }
}

/// Placement role: choose where an AppContext's apps land.
#[async_trait]
pub trait PlacementController: Send + Sync + 'static {
    async fn filter_clusters(&self, app_context: &AppContextId) -> Result<(), ControllerError>;
}

/// Where a call is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallState {
    Received,
    Mutating,
    Responded,
}

impl CallState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallState::Received => "received",
            CallState::Mutating => "mutating",
            CallState::Responded => "responded",
        }
    }
}

/// The single response of one call, with the error that accompanies a failure.
#[derive(Debug)]
pub struct Reply<R> {
    pub response: R,
    pub error: Option<ControllerError>,
}

impl<R> Reply<R> {
    fn ok(response: R) -> Self {
        Self {
            response,
            error: None,
        }
    }

    fn failed(response: R, error: ControllerError) -> Self {
        Self {
            response,
            error: Some(error),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Run `work` on its own task; a panic surfaces as [`ControllerError::Aborted`].
async fn mutate<F>(method: &'static str, app_context: &AppContextId, work: F) -> Result<(), ControllerError>
where
    F: Future<Output = Result<(), ControllerError>> + Send + 'static,
{
    debug!(method, app_context = %app_context, state = CallState::Mutating.as_str());
    match tokio::spawn(work).await {
        Ok(result) => result,
        Err(e) => Err(ControllerError::Aborted(e.to_string())),
    }
}

fn responded(method: &'static str, app_context: &AppContextId, error: Option<&ControllerError>) {
    match error {
        None => info!(method, app_context = %app_context, state = CallState::Responded.as_str(), "Controller call succeeded"),
        Some(e) => error!(method, app_context = %app_context, state = CallState::Responded.as_str(), error = %e, "Controller call failed"),
    }
}

fn optional_handle(value: &str) -> Option<AppContextId> {
    (!value.is_empty()).then(|| AppContextId::from(value))
}

/// `UpdateAppContext` state machine.
pub async fn update_app_context(
    controller: std::sync::Arc<dyn ActionController>,
    request: ContextUpdateRequest,
) -> Reply<ContextUpdateResponse> {
    let failed = |e: ControllerError| {
        let response = ContextUpdateResponse {
            app_context_updated: false,
            app_context_update_message: e.to_string(),
        };
        Reply::failed(response, e)
    };

    let handle = AppContextId::from(request.app_context);
    debug!(method = "UpdateAppContext", app_context = %handle, intent = %request.intent_name, state = CallState::Received.as_str());
    if request.intent_name.is_empty() {
        let reply = failed(ControllerError::InvalidRequest("intent name is empty"));
        responded("UpdateAppContext", &handle, reply.error.as_ref());
        return reply;
    }
    if handle.is_empty() {
        let reply = failed(ControllerError::InvalidRequest("app context handle is empty"));
        responded("UpdateAppContext", &handle, reply.error.as_ref());
        return reply;
    }

    let update_from = optional_handle(&request.update_from_app_context);
    let intent = request.intent_name;
    let target = handle.clone();
    let result = mutate("UpdateAppContext", &handle, async move {
        controller
            .update_app_context(&intent, &target, update_from.as_ref())
            .await
    })
    .await;

    let reply = match result {
        Ok(()) => Reply::ok(ContextUpdateResponse {
            app_context_updated: true,
            app_context_update_message: CONTEXT_UPDATED.to_string(),
        }),
        Err(e) => failed(e),
    };
    responded("UpdateAppContext", &handle, reply.error.as_ref());
    reply
}

/// `TerminateAppContext` state machine.
pub async fn terminate_app_context(
    controller: std::sync::Arc<dyn ActionController>,
    request: TerminateRequest,
) -> Reply<TerminateResponse> {
    let failed = |e: ControllerError| {
        let response = TerminateResponse {
            app_context_terminated: false,
            app_context_terminated_message: e.to_string(),
        };
        Reply::failed(response, e)
    };

    let handle = AppContextId::from(request.app_context);
    if handle.is_empty() {
        let reply = failed(ControllerError::InvalidRequest("app context handle is empty"));
        responded("TerminateAppContext", &handle, reply.error.as_ref());
        return reply;
    }

    let target = handle.clone();
    let result = mutate("TerminateAppContext", &handle, async move {
        controller.terminate_app_context(&target).await
    })
    .await;

    let reply = match result {
        Ok(()) => Reply::ok(TerminateResponse {
            app_context_terminated: true,
            app_context_terminated_message: CONTEXT_TERMINATED.to_string(),
        }),
        Err(e) => failed(e),
    };
    responded("TerminateAppContext", &handle, reply.error.as_ref());
    reply
}

/// `PostEvent` state machine.
pub async fn post_event(
    controller: std::sync::Arc<dyn ActionController>,
    request: PostEventRequest,
) -> Reply<PostEventResponse> {
    let failed = |e: ControllerError| {
        let response = PostEventResponse {
            success: false,
            post_event_message: e.to_string(),
        };
        Reply::failed(response, e)
    };

    let handle = AppContextId::from(request.app_context);
    let event = match EventType::try_from(request.event_type) {
        Ok(event) => event,
        Err(_) => {
            let reply = failed(ControllerError::InvalidRequest("unknown event type"));
            responded("PostEvent", &handle, reply.error.as_ref());
            return reply;
        }
    };
    if handle.is_empty() {
        let reply = failed(ControllerError::InvalidRequest("app context handle is empty"));
        responded("PostEvent", &handle, reply.error.as_ref());
        return reply;
    }

    let target = handle.clone();
    let result = mutate("PostEvent", &handle, async move {
        controller.post_event(&target, event).await
    })
    .await;

    let reply = match result {
        Ok(()) => Reply::ok(PostEventResponse {
            success: true,
            post_event_message: EVENT_POSTED.to_string(),
        }),
        Err(e) => failed(e),
    };
    responded("PostEvent", &handle, reply.error.as_ref());
    reply
}

/// `FilterClusters` state machine.
///
/// Unlike the action calls, the response message is fixed text; the
/// controller's own error travels only on the error channel.
pub async fn filter_clusters(
    controller: std::sync::Arc<dyn PlacementController>,
    request: ResourceRequest,
) -> Reply<ResourceResponse> {
    let handle = AppContextId::from(request.app_context);
    if handle.is_empty() {
        let reply = Reply::failed(
            ResourceResponse {
                app_context: String::new(),
                status: false,
                message: INVALID_REQUEST.to_string(),
            },
            ControllerError::InvalidRequest("app context handle is empty"),
        );
        responded("FilterClusters", &handle, reply.error.as_ref());
        return reply;
    }

    let target = handle.clone();
    let result = mutate("FilterClusters", &handle, async move {
        controller.filter_clusters(&target).await
    })
    .await;

    let reply = match result {
        Ok(()) => Reply::ok(ResourceResponse {
            app_context: handle.to_string(),
            status: true,
            message: String::new(),
        }),
        Err(e) => Reply::failed(
            ResourceResponse {
                app_context: handle.to_string(),
                status: false,
                message: FILTER_FAILED.to_string(),
            },
            e,
        ),
    };
    responded("FilterClusters", &handle, reply.error.as_ref());
    reply
}
