//! tonic adapters for the controller roles.

use std::sync::Arc;

use bytes::Bytes;
use prost::Message;
use tonic::{Code, Request, Response, Status};

use super::{ActionController, PlacementController, Reply};
use crate::proto::{
    contextupdate_server::Contextupdate, placement_controller_server::PlacementController as PlacementRpc,
    ContextUpdateRequest, ContextUpdateResponse, PostEventRequest, PostEventResponse, ResourceRequest,
    ResourceResponse, TerminateRequest, TerminateResponse,
};

/// Convert a reply into the transport result.
///
/// A failed reply becomes an error status whose message is the error text
/// and whose details hold the encoded response, so callers reading either
/// channel see the same outcome.
pub(crate) fn into_status<R: Message>(reply: Reply<R>) -> Result<Response<R>, Status> {
    match reply.error {
        None => Ok(Response::new(reply.response)),
        Some(e) => {
            let code = if e.is_invalid_request() {
                Code::InvalidArgument
            } else {
                Code::Internal
            };
            Err(Status::with_details(
                code,
                e.to_string(),
                Bytes::from(reply.response.encode_to_vec()),
            ))
        }
    }
}

/// `contextupdate.Contextupdate` backed by an [`ActionController`].
#[derive(Clone)]
pub struct ContextUpdateService {
    controller: Arc<dyn ActionController>,
}

impl ContextUpdateService {
    pub fn new(controller: Arc<dyn ActionController>) -> Self {
        Self { controller }
    }
}

#[tonic::async_trait]
impl Contextupdate for ContextUpdateService {
    async fn update_app_context(
        &self,
        request: Request<ContextUpdateRequest>,
    ) -> Result<Response<ContextUpdateResponse>, Status> {
        into_status(super::update_app_context(self.controller.clone(), request.into_inner()).await)
    }

    async fn terminate_app_context(
        &self,
        request: Request<TerminateRequest>,
    ) -> Result<Response<TerminateResponse>, Status> {
        into_status(super::terminate_app_context(self.controller.clone(), request.into_inner()).await)
    }

    async fn post_event(
        &self,
        request: Request<PostEventRequest>,
    ) -> Result<Response<PostEventResponse>, Status> {
        into_status(super::post_event(self.controller.clone(), request.into_inner()).await)
    }
}

/// `placementcontroller.PlacementController` backed by a [`PlacementController`].
#[derive(Clone)]
pub struct PlacementService {
    controller: Arc<dyn PlacementController>,
}

impl PlacementService {
    pub fn new(controller: Arc<dyn PlacementController>) -> Self {
        Self { controller }
    }
}

#[tonic::async_trait]
impl PlacementRpc for PlacementService {
    async fn filter_clusters(
        &self,
        request: Request<ResourceRequest>,
    ) -> Result<Response<ResourceResponse>, Status> {
        into_status(super::filter_clusters(self.controller.clone(), request.into_inner()).await)
    }
}
