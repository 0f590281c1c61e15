//! Policy evaluation and actor dispatch for one event.

use bytes::Bytes;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use serde_json::Value;
use tracing::{error, info};

use super::model::{AgentSpec, PolicyIntentSpec};
use super::PolicyError;
use crate::actor::ActorRegistry;

#[derive(Serialize)]
struct EvaluationInput<'a> {
    input: EvaluationPayload<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EvaluationPayload<'a> {
    intent_spec: &'a PolicyIntentSpec,
    agent_spec: &'a AgentSpec,
    event: &'a Value,
}

/// Evaluates a policy intent against an event and runs its actor.
#[derive(Clone)]
pub struct PolicyExecutor {
    client: Client,
    actors: ActorRegistry,
}

impl PolicyExecutor {
    pub fn new(actors: ActorRegistry) -> Self {
        Self {
            client: Client::new(),
            actors,
        }
    }

    /// POST `input` to the policy engine; anything but `200 OK` is a failure.
    pub async fn evaluate(&self, url: &str, input: Vec<u8>) -> Result<Bytes, PolicyError> {
        let response = self
            .client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(input)
            .send()
            .await?;
        let status = response.status();
        if status != StatusCode::OK {
            error!(url = %url, status = status.as_u16(), "EvaluatePolicy failed due to http error");
            return Err(PolicyError::Evaluate(status.as_u16()));
        }
        Ok(response.bytes().await?)
    }

    /// Evaluate `spec`'s policy for `event` and hand the result to its actor.
    pub async fn execute_event(
        &self,
        spec: &PolicyIntentSpec,
        agent: &AgentSpec,
        event: &Value,
    ) -> Result<(), PolicyError> {
        let actor = self.actors.get(&spec.actor)?;
        let input = serde_json::to_vec(&EvaluationInput {
            input: EvaluationPayload {
                intent_spec: spec,
                agent_spec: agent,
                event,
            },
        })?;

        let evaluation = self.evaluate(&spec.policy.evaluation_url(), input).await?;
        let intent_spec = serde_json::to_vec(spec)?;
        let agent_spec = serde_json::to_vec(agent)?;
        actor.execute(&evaluation, &intent_spec, &agent_spec).await?;

        info!(
            intent = %spec.policy_intent_id,
            actor = %spec.actor,
            "Policy event executed"
        );
        Ok(())
    }
}
