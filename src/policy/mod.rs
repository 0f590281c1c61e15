//! Policy service: event sources, policies, and the intents that bind an
//! event to a policy evaluation and an actor.

mod executor;
mod model;
mod store;

pub use executor::PolicyExecutor;
pub use model::{
    AgentSpec, EventRef, Metadata, Policy, PolicyIntent, PolicyIntentKey, PolicyIntentSpec, PolicyRef,
    PolicySpec,
};
pub use store::{MemoryPolicyStore, PolicyStore};

use crate::actor::ActorError;

#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("EvaluatePolicy failed due to http error. http Status code: {0}")]
    Evaluate(u16),

    #[error("EvaluatePolicy failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Actor(#[from] ActorError),

    #[error("Policy store error: {0}")]
    Backend(String),
}
