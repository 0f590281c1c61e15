//! Workflow trigger actor.
//!
//! Starts a workflow on the workflow manager when the policy evaluation
//! says action is required:
//!
//! `POST http://{mgr}/v2/projects/{p}/composite-apps/{ca}/{v}/deployment-intent-groups/{dig}/temporal-workflow-intents/{wf}/start`
//!
//! Only `201 Created` counts as success.

use std::time::Duration;

use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, error, info, warn};

use super::{Actor, ActorError, TEMPORAL_ACTOR};
use crate::config::Config;
use crate::policy::PolicyIntentSpec;

#[derive(Debug, Default, Deserialize)]
struct Evaluation {
    #[serde(default)]
    result: EvaluationNamespace,
}

#[derive(Debug, Default, Deserialize)]
struct EvaluationNamespace {
    #[serde(default)]
    emco: EvaluationResult,
}

/// The `result.emco` section of a policy evaluation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EvaluationResult {
    pub action_required: bool,
    /// Overrides the intent's workflow name when non-empty.
    pub workflow_name: String,
}

impl EvaluationResult {
    pub fn parse(evaluation: &[u8]) -> Result<Self, ActorError> {
        serde_json::from_slice::<Evaluation>(evaluation)
            .map(|e| e.result.emco)
            .map_err(|source| ActorError::Decode {
                what: "evaluation result",
                source,
            })
    }
}

/// Actor arguments carried in the policy intent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WorkflowArgs {
    #[serde(rename = "workFlowMgr")]
    pub work_flow_mgr: String,
    #[serde(rename = "workFlowName")]
    pub work_flow_name: String,
}

pub struct WorkflowActor {
    client: Client,
    default_mgr: String,
    max_retries: usize,
}

impl WorkflowActor {
    pub fn from_config(config: &Config) -> Result<Self, ActorError> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.workflow_timeout() {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
            default_mgr: config.workflow_mgr_url.clone(),
            max_retries: config.workflow_max_retries,
        })
    }

    /// Start URL for workflow `workflow` of the intent's deployment intent group.
    pub fn start_url(mgr: &str, spec: &PolicyIntentSpec, workflow: &str) -> String {
        format!(
            "http://{}/v2/projects/{}/composite-apps/{}/{}/deployment-intent-groups/{}/temporal-workflow-intents/{}/start",
            mgr,
            spec.project,
            spec.composite_app,
            spec.composite_app_version,
            spec.deployment_intent_group,
            workflow
        )
    }

    fn backoff(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(Duration::from_millis(100))
            .with_max_delay(Duration::from_secs(5))
            .with_max_times(self.max_retries)
    }

    fn is_retryable(err: &ActorError) -> bool {
        match err {
            ActorError::Http(e) => e.is_timeout() || e.is_connect(),
            ActorError::Status(status) => status.is_server_error(),
            _ => false,
        }
    }

    async fn start(&self, url: &str) -> Result<(), ActorError> {
        let response = self.client.post(url).send().await?;
        let status = response.status();
        if status == StatusCode::CREATED {
            Ok(())
        } else {
            warn!(url = %url, status = %status, "Workflow manager rejected the start request");
            Err(ActorError::Status(status))
        }
    }
}

#[async_trait]
impl Actor for WorkflowActor {
    async fn execute(&self, evaluation: &[u8], intent_spec: &[u8], _agent_spec: &[u8]) -> Result<(), ActorError> {
        let result = EvaluationResult::parse(evaluation)?;
        if !result.action_required {
            info!("No action required");
            return Ok(());
        }

        let spec: PolicyIntentSpec =
            serde_json::from_slice(intent_spec).map_err(|source| ActorError::Decode {
                what: "policy intent",
                source,
            })?;
        let args: WorkflowArgs = match &spec.actor_arg {
            Some(value) => WorkflowArgs::deserialize(value).map_err(|source| ActorError::Decode {
                what: "actor arguments",
                source,
            })?,
            None => WorkflowArgs::default(),
        };

        let workflow = if result.workflow_name.is_empty() {
            args.work_flow_name
        } else {
            result.workflow_name
        };
        if workflow.is_empty() {
            return Err(ActorError::MissingWorkflowName);
        }
        let mgr = if args.work_flow_mgr.is_empty() {
            self.default_mgr.clone()
        } else {
            args.work_flow_mgr
        };
        if mgr.is_empty() {
            return Err(ActorError::MissingManager);
        }

        let url = Self::start_url(&mgr, &spec, &workflow);
        info!(url = %url, "Sending request to workflow manager");
        (|| async { self.start(&url).await })
            .retry(self.backoff())
            .when(Self::is_retryable)
            .notify(|e, delay| debug!(error = %e, delay = ?delay, "Retrying workflow start"))
            .await
            .inspect_err(|e| error!(url = %url, error = %e, "Workflow start failed"))
    }

    fn name(&self) -> &str {
        TEMPORAL_ACTOR
    }
}
