//! Reference controller logic.
//!
//! Both roles load the AppContext, read its composite-app metadata, and look
//! up the intents of its deployment intent group. A real controller would
//! act on each intent; the sample logs them. Intents arrive through the
//! HTTP API in [`api`].

pub mod api;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info, warn};

use crate::appcontext::{AppContext, AppContextId, ContextStore};
use crate::controller::{ActionController, ControllerError, PlacementController};
use crate::intent::{DigScope, Intent, IntentStore};

/// Stores the sample logic reads from.
#[derive(Clone)]
pub struct SampleStores {
    pub contexts: Arc<dyn ContextStore>,
    pub intents: Arc<dyn IntentStore>,
}

impl SampleStores {
    async fn intents_for(&self, app_context: &AppContextId) -> Result<Vec<Intent>, ControllerError> {
        let ctx = AppContext::load(self.contexts.clone(), app_context.clone())
            .await
            .inspect_err(|e| error!(id = %app_context, error = %e, "Failed to get the appContext"))?;
        let meta = ctx
            .meta()
            .await
            .inspect_err(|e| error!(id = %app_context, error = %e, "Failed to get the appContext metaData"))?;

        let scope = DigScope::new(
            meta.project,
            meta.composite_app,
            meta.version,
            meta.deployment_intent_group,
        );
        let intents = self.intents.list(&scope).await.inspect_err(|e| {
            error!(dig = %scope.deployment_intent_group, error = %e, "Failed to get the intents for the deploymentIntentGroup")
        })?;
        if intents.is_empty() {
            warn!(dig = %scope.deployment_intent_group, "No intents are defined for the deploymentIntentGroup");
            return Err(ControllerError::NoIntents(scope.deployment_intent_group));
        }
        Ok(intents)
    }
}

/// Sample action controller.
pub struct SampleAction {
    stores: SampleStores,
}

impl SampleAction {
    pub fn new(stores: SampleStores) -> Self {
        Self { stores }
    }
}

#[async_trait]
impl ActionController for SampleAction {
    async fn update_app_context(
        &self,
        intent_name: &str,
        app_context: &AppContextId,
        _update_from: Option<&AppContextId>,
    ) -> Result<(), ControllerError> {
        for intent in self.stores.intents_for(app_context).await? {
            info!(
                requested = %intent_name,
                intent = %intent.metadata.name,
                app = %intent.spec.app,
                "Applying intent"
            );
        }
        Ok(())
    }
}

/// Sample placement controller.
pub struct SamplePlacement {
    stores: SampleStores,
}

impl SamplePlacement {
    pub fn new(stores: SampleStores) -> Self {
        Self { stores }
    }
}

#[async_trait]
impl PlacementController for SamplePlacement {
    async fn filter_clusters(&self, app_context: &AppContextId) -> Result<(), ControllerError> {
        for intent in self.stores.intents_for(app_context).await? {
            info!(intent = %intent.metadata.name, app = %intent.spec.app, "Filtering clusters");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::appcontext::{CompositeAppMeta, MemoryContextStore, StoreError};
    use crate::intent::MemoryIntentStore;

    async fn fixture() -> (SampleStores, AppContextId) {
        let contexts = Arc::new(MemoryContextStore::new());
        let meta = CompositeAppMeta {
            project: "p".to_string(),
            composite_app: "ca".to_string(),
            version: "v1".to_string(),
            deployment_intent_group: "dig".to_string(),
            ..Default::default()
        };
        let ctx = AppContext::create(contexts.clone(), &meta).await.unwrap();
        let stores = SampleStores {
            contexts,
            intents: Arc::new(MemoryIntentStore::new()),
        };
        (stores, ctx.id().clone())
    }

    #[tokio::test]
    async fn test_update_with_intents() {
        let (stores, id) = fixture().await;
        stores
            .intents
            .create(&DigScope::new("p", "ca", "v1", "dig"), Intent::named("i1", "web"), true)
            .await
            .unwrap();

        let action = SampleAction::new(stores);
        action.update_app_context("i1", &id, None).await.unwrap();
    }

    #[tokio::test]
    async fn test_no_intents_is_error() {
        let (stores, id) = fixture().await;
        let placement = SamplePlacement::new(stores);

        let err = placement.filter_clusters(&id).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "No intents are defined for the deploymentIntentGroup: dig"
        );
    }

    #[tokio::test]
    async fn test_unknown_context() {
        let (stores, _) = fixture().await;
        let action = SampleAction::new(stores);

        let err = action
            .update_app_context("i1", &AppContextId::from("missing"), None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ControllerError::Context(StoreError::ContextNotFound(_))
        ));
    }
}
