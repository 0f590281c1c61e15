//! Policy service documents.

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use crate::intent::Metadata;

/// An event source registered with the policy service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentSpec {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(default)]
    pub addr: String,
}

/// A policy hosted by an external engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    #[serde(default)]
    pub metadata: Metadata,
    pub spec: PolicySpec,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PolicySpec {
    pub engine_url: String,
    pub namespace: String,
    pub policy_name: String,
}

/// Engine location embedded in a policy intent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PolicyRef {
    pub engine_url: String,
    pub policy_name: String,
}

impl PolicyRef {
    /// Evaluation endpoint: `http://{engineUrl}/{policyName}`.
    pub fn evaluation_url(&self) -> String {
        format!("http://{}/{}", self.engine_url, self.policy_name)
    }
}

/// Event a policy intent listens for. An empty agent matches every agent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRef {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub agent: String,
}

impl EventRef {
    pub fn matches(&self, agent_id: &str, event_id: &str) -> bool {
        self.id == event_id && (self.agent.is_empty() || self.agent == agent_id)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PolicyIntentSpec {
    #[serde(rename = "policyIntentID")]
    pub policy_intent_id: String,
    pub project: String,
    pub composite_app: String,
    pub composite_app_version: String,
    pub deployment_intent_group: String,
    pub policy: PolicyRef,
    pub actor: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actor_arg: Option<Value>,
    pub event: EventRef,
    #[serde(rename = "supportingEvent", skip_serializing_if = "Vec::is_empty")]
    pub supporting_events: Vec<EventRef>,
}

/// Binds an event to a policy evaluation and an actor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PolicyIntent {
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default)]
    pub spec: PolicyIntentSpec,
}

/// Storage key of a policy intent.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyIntentKey {
    pub project: String,
    pub composite_app: String,
    pub composite_app_version: String,
    pub deployment_intent_group: String,
    pub policy_intent: String,
}

impl PolicyIntentKey {
    /// Copy the key's path segments into `spec`.
    pub fn apply_to(&self, spec: &mut PolicyIntentSpec) {
        spec.policy_intent_id = self.policy_intent.clone();
        spec.project = self.project.clone();
        spec.composite_app = self.composite_app.clone();
        spec.composite_app_version = self.composite_app_version.clone();
        spec.deployment_intent_group = self.deployment_intent_group.clone();
    }
}
