//! Policy API handlers.

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, info, warn};

use super::PolicyApi;
use crate::policy::{AgentSpec, Policy, PolicyError, PolicyIntent, PolicyIntentKey};

const INTENT_NOT_FOUND: &str = "404 Policy Intent not found";

/// Handler failure rendered as a status plus plain-text body.
pub(super) struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl From<PolicyError> for ApiError {
    fn from(e: PolicyError) -> Self {
        let status = match e {
            PolicyError::NotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        error!(error = %e, "Policy API request failed");
        Self {
            status,
            message: e.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, self.message).into_response()
    }
}

fn decode<T: DeserializeOwned>(body: &[u8]) -> Result<T, ApiError> {
    serde_json::from_slice(body).map_err(|e| {
        warn!(error = %e, "Rejecting malformed request body");
        ApiError::bad_request(e.to_string())
    })
}

pub(super) async fn health() -> StatusCode {
    StatusCode::OK
}

// ============================================================================
// Agents
// ============================================================================

pub(super) async fn register_agent(
    State(api): State<PolicyApi>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<(StatusCode, Json<AgentSpec>), ApiError> {
    let mut agent: AgentSpec = decode(&body)?;
    agent.id = id;
    let agent = api.store.put_agent(agent).await?;
    info!(agent = %agent.id, "Registering Agent processed successfully");
    Ok((StatusCode::CREATED, Json(agent)))
}

pub(super) async fn get_agent(
    State(api): State<PolicyApi>,
    Path(id): Path<String>,
) -> Result<Json<AgentSpec>, ApiError> {
    Ok(Json(api.store.get_agent(&id).await?))
}

pub(super) async fn list_agents(State(api): State<PolicyApi>) -> Result<Json<Vec<AgentSpec>>, ApiError> {
    Ok(Json(api.store.list_agents().await?))
}

pub(super) async fn delete_agent(
    State(api): State<PolicyApi>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    api.store.delete_agent(&id).await?;
    Ok(StatusCode::OK)
}

/// Fan an incoming event out to every matching policy intent.
pub(super) async fn ingest_event(
    State(api): State<PolicyApi>,
    Path((agent_id, event_id)): Path<(String, String)>,
    body: Bytes,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let event: Value = decode(&body)?;
    let agent = match api.store.get_agent(&agent_id).await {
        Ok(agent) => agent,
        Err(PolicyError::NotFound(_)) => AgentSpec {
            id: agent_id.clone(),
            addr: String::new(),
        },
        Err(e) => return Err(e.into()),
    };

    let intents = api.store.intents_for_event(&agent_id, &event_id).await?;
    let dispatched = intents.len();
    for intent in intents {
        let executor = api.executor.clone();
        let agent = agent.clone();
        let event = event.clone();
        tokio::spawn(async move {
            if let Err(e) = executor.execute_event(&intent.spec, &agent, &event).await {
                error!(
                    intent = %intent.spec.policy_intent_id,
                    error = %e,
                    "ExecuteEvent failed"
                );
            }
        });
    }

    info!(agent = %agent_id, event = %event_id, dispatched, "Event received");
    Ok((StatusCode::ACCEPTED, Json(json!({ "dispatched": dispatched }))))
}

// ============================================================================
// Policies
// ============================================================================

pub(super) async fn create_policy(
    State(api): State<PolicyApi>,
    Path(policy_id): Path<String>,
    body: Bytes,
) -> Result<(StatusCode, Json<Policy>), ApiError> {
    let policy: Policy = decode(&body)?;
    let policy = api.store.put_policy(&policy_id, policy).await?;
    info!(policy = %policy_id, "Create Policy processed successfully");
    Ok((StatusCode::CREATED, Json(policy)))
}

pub(super) async fn get_policy(
    State(api): State<PolicyApi>,
    Path(policy_id): Path<String>,
) -> Result<Json<Policy>, ApiError> {
    Ok(Json(api.store.get_policy(&policy_id).await?))
}

pub(super) async fn delete_policy(
    State(api): State<PolicyApi>,
    Path(policy_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    api.store.delete_policy(&policy_id).await?;
    info!(policy = %policy_id, "Delete Policy processed successfully");
    Ok(StatusCode::OK)
}

// ============================================================================
// Policy intents
// ============================================================================

#[derive(Deserialize)]
pub(super) struct IntentPath {
    project: String,
    composite_app: String,
    composite_app_version: String,
    deployment_intent_group: String,
    policy_intent_id: String,
}

impl From<IntentPath> for PolicyIntentKey {
    fn from(p: IntentPath) -> Self {
        PolicyIntentKey {
            project: p.project,
            composite_app: p.composite_app,
            composite_app_version: p.composite_app_version,
            deployment_intent_group: p.deployment_intent_group,
            policy_intent: p.policy_intent_id,
        }
    }
}

pub(super) async fn create_policy_intent(
    State(api): State<PolicyApi>,
    Path(path): Path<IntentPath>,
    body: Bytes,
) -> Result<(StatusCode, Json<PolicyIntent>), ApiError> {
    let mut intent: PolicyIntent = decode(&body)?;
    let key = PolicyIntentKey::from(path);
    key.apply_to(&mut intent.spec);
    let intent = api.store.put_intent(key, intent).await?;
    info!(intent = %intent.spec.policy_intent_id, "Create Policy intent processed successfully");
    Ok((StatusCode::CREATED, Json(intent)))
}

pub(super) async fn get_policy_intent(
    State(api): State<PolicyApi>,
    Path(path): Path<IntentPath>,
) -> Result<Response, ApiError> {
    let key = PolicyIntentKey::from(path);
    match api.store.get_intent(&key).await? {
        Some(intent) => Ok(Json(intent).into_response()),
        None => Ok((StatusCode::NOT_FOUND, INTENT_NOT_FOUND).into_response()),
    }
}

pub(super) async fn delete_policy_intent(
    State(api): State<PolicyApi>,
    Path(path): Path<IntentPath>,
) -> Result<StatusCode, ApiError> {
    let key = PolicyIntentKey::from(path);
    api.store.delete_intent(&key).await?;
    info!(intent = %key.policy_intent, "Delete Policy intent processed successfully");
    Ok(StatusCode::OK)
}
