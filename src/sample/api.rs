//! Sample intent HTTP API.
//!
//! Intents reach the sample controller through this API; the controller
//! roles read them back when the orchestrator calls. Two routes under `/v2`:
//!
//! - `POST .../deployment-intent-groups/{dig}/sampleIntents` stores an intent (201)
//! - `GET .../deployment-intent-groups/{dig}/sampleIntents/{name}` reads one back (200)

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::http::API_VERSION;
use crate::intent::{DigScope, Intent, IntentError, IntentStore};

const SAMPLE_INTENTS_PATH: &str = "/projects/:project/composite-apps/:compositeApp/:compositeAppVersion/deployment-intent-groups/:deploymentIntentGroup/sampleIntents";

/// Build the `/v2` sample intent router.
pub fn router(intents: Arc<dyn IntentStore>) -> Router {
    let v2 = Router::new()
        .route(SAMPLE_INTENTS_PATH, post(create_sample_intent))
        .route(&format!("{}/:sampleIntent", SAMPLE_INTENTS_PATH), get(get_sample_intent))
        .with_state(intents);

    Router::new()
        .nest(&format!("/{}", API_VERSION), v2)
        .layer(TraceLayer::new_for_http())
}

struct IntentApiError {
    status: StatusCode,
    message: String,
}

impl From<IntentError> for IntentApiError {
    fn from(e: IntentError) -> Self {
        let status = match e {
            IntentError::AlreadyExists(_) => StatusCode::CONFLICT,
            IntentError::NotFound(_) => StatusCode::NOT_FOUND,
            IntentError::EmptyName => StatusCode::BAD_REQUEST,
            IntentError::Backend(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        error!(error = %e, "Sample intent request failed");
        Self {
            status,
            message: e.to_string(),
        }
    }
}

impl IntoResponse for IntentApiError {
    fn into_response(self) -> Response {
        (self.status, self.message).into_response()
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SampleIntentPath {
    project: String,
    composite_app: String,
    composite_app_version: String,
    deployment_intent_group: String,
    sample_intent: String,
}

async fn create_sample_intent(
    State(intents): State<Arc<dyn IntentStore>>,
    Path(scope): Path<DigScope>,
    body: Bytes,
) -> Result<(StatusCode, Json<Intent>), IntentApiError> {
    if body.is_empty() {
        warn!("Empty request body");
        return Err(IntentApiError {
            status: StatusCode::BAD_REQUEST,
            message: "Empty request body".to_string(),
        });
    }
    let intent: Intent = serde_json::from_slice(&body).map_err(|e| {
        warn!(error = %e, "Error decoding the request body");
        IntentApiError {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            message: e.to_string(),
        }
    })?;

    let intent = intents.create(&scope, intent, true).await?;
    info!(
        dig = %scope.deployment_intent_group,
        intent = %intent.metadata.name,
        "Created sample intent"
    );
    Ok((StatusCode::CREATED, Json(intent)))
}

async fn get_sample_intent(
    State(intents): State<Arc<dyn IntentStore>>,
    Path(path): Path<SampleIntentPath>,
) -> Result<Json<Intent>, IntentApiError> {
    let scope = DigScope::new(
        path.project,
        path.composite_app,
        path.composite_app_version,
        path.deployment_intent_group,
    );
    Ok(Json(intents.get(&scope.intent(path.sample_intent)).await?))
}
