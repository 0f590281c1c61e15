//! Wire types for the controller extension protocol.
//!
//! Messages are declared with prost derives; the client and server stubs for
//! `contextupdate.Contextupdate` and `placementcontroller.PlacementController`
//! are generated by `build.rs`.

/// Request to apply an intent to an AppContext.
#[derive(Clone, PartialEq, prost::Message)]
pub struct ContextUpdateRequest {
    /// Handle of the AppContext to mutate.
    #[prost(string, tag = "1")]
    pub app_context: String,
    /// Name of the intent that drives the mutation.
    #[prost(string, tag = "2")]
    pub intent_name: String,
    /// Previous AppContext when the call is part of an update, empty otherwise.
    #[prost(string, tag = "3")]
    pub update_from_app_context: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct ContextUpdateResponse {
    #[prost(bool, tag = "1")]
    pub app_context_updated: bool,
    #[prost(string, tag = "2")]
    pub app_context_update_message: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct TerminateRequest {
    #[prost(string, tag = "1")]
    pub app_context: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct TerminateResponse {
    #[prost(bool, tag = "1")]
    pub app_context_terminated: bool,
    #[prost(string, tag = "2")]
    pub app_context_terminated_message: String,
}

/// Lifecycle events an orchestrator forwards to action controllers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum EventType {
    Instantiate = 0,
    Terminate = 1,
    Update = 2,
}

impl EventType {
    pub fn as_str_name(&self) -> &'static str {
        match self {
            EventType::Instantiate => "INSTANTIATE",
            EventType::Terminate => "TERMINATE",
            EventType::Update => "UPDATE",
        }
    }

    pub fn from_str_name(value: &str) -> Option<Self> {
        match value {
            "INSTANTIATE" => Some(Self::Instantiate),
            "TERMINATE" => Some(Self::Terminate),
            "UPDATE" => Some(Self::Update),
            _ => None,
        }
    }
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct PostEventRequest {
    #[prost(string, tag = "1")]
    pub app_context: String,
    #[prost(enumeration = "EventType", tag = "2")]
    pub event_type: i32,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct PostEventResponse {
    #[prost(bool, tag = "1")]
    pub success: bool,
    #[prost(string, tag = "2")]
    pub post_event_message: String,
}

/// Placement request: the AppContext whose cluster selection should be filtered.
#[derive(Clone, PartialEq, prost::Message)]
pub struct ResourceRequest {
    #[prost(string, tag = "1")]
    pub app_context: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct ResourceResponse {
    #[prost(string, tag = "1")]
    pub app_context: String,
    #[prost(bool, tag = "2")]
    pub status: bool,
    #[prost(string, tag = "3")]
    pub message: String,
}

include!(concat!(env!("OUT_DIR"), "/contextupdate.Contextupdate.rs"));
include!(concat!(env!("OUT_DIR"), "/placementcontroller.PlacementController.rs"));
