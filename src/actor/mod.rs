//! Actors: side effects a policy evaluation can trigger.
//!
//! An actor receives three opaque JSON payloads (the evaluation result, the
//! policy intent spec and the agent spec) and decides on its own whether to
//! act.

mod workflow;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::config::Config;

pub use workflow::{EvaluationResult, WorkflowActor, WorkflowArgs};

/// Registry name of the workflow trigger.
pub const TEMPORAL_ACTOR: &str = "temporal";

#[derive(Debug, thiserror::Error)]
pub enum ActorError {
    #[error("Temporal Workflow Execution failed: malformed {what}: {source}")]
    Decode {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("Workflow execution failed: Temporal workflow name is missing(Provide in policy Intent)")]
    MissingWorkflowName,

    #[error("Workflow execution failed: workflow manager address is missing")]
    MissingManager,

    #[error("Temporal Workflow Execution failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Temporal Workflow Execution failed. Couldn't start workflow {0}")]
    Status(reqwest::StatusCode),

    #[error("Unknown actor: {0}")]
    Unknown(String),
}

#[async_trait]
pub trait Actor: Send + Sync {
    async fn execute(&self, evaluation: &[u8], intent_spec: &[u8], agent_spec: &[u8]) -> Result<(), ActorError>;

    fn name(&self) -> &str;
}

/// Actors addressable by name from a policy intent.
#[derive(Clone, Default)]
pub struct ActorRegistry {
    actors: HashMap<String, Arc<dyn Actor>>,
}

impl ActorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in actors.
    pub fn with_defaults(config: &Config) -> Result<Self, ActorError> {
        let mut registry = Self::new();
        registry.register(Arc::new(WorkflowActor::from_config(config)?));
        Ok(registry)
    }

    pub fn register(&mut self, actor: Arc<dyn Actor>) {
        self.actors.insert(actor.name().to_string(), actor);
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn Actor>, ActorError> {
        self.actors
            .get(name)
            .cloned()
            .ok_or_else(|| ActorError::Unknown(name.to_string()))
    }
}
