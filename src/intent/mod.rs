//! Controller intents.
//!
//! An intent is the controller-specific configuration attached to one
//! deployment intent group. Controllers look intents up; they never
//! mutate them.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

/// Errors from intent storage.
#[derive(Debug, thiserror::Error)]
pub enum IntentError {
    #[error("Intent already exists: {0}")]
    AlreadyExists(String),

    #[error("Intent not found: {0}")]
    NotFound(String),

    #[error("Intent name must not be empty")]
    EmptyName,

    #[error("Intent store error: {0}")]
    Backend(String),
}

pub type Result<T> = std::result::Result<T, IntentError>;

/// Scope of a deployment intent group.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DigScope {
    pub project: String,
    pub composite_app: String,
    pub composite_app_version: String,
    pub deployment_intent_group: String,
}

impl DigScope {
    pub fn new(
        project: impl Into<String>,
        composite_app: impl Into<String>,
        composite_app_version: impl Into<String>,
        deployment_intent_group: impl Into<String>,
    ) -> Self {
        Self {
            project: project.into(),
            composite_app: composite_app.into(),
            composite_app_version: composite_app_version.into(),
            deployment_intent_group: deployment_intent_group.into(),
        }
    }

    /// Key of the named intent within this scope.
    pub fn intent(&self, name: impl Into<String>) -> IntentKey {
        IntentKey {
            scope: self.clone(),
            intent: name.into(),
        }
    }
}

/// Fully qualified intent key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntentKey {
    #[serde(flatten)]
    pub scope: DigScope,
    pub intent: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Metadata {
    pub name: String,
    pub description: String,
    pub user_data1: String,
    pub user_data2: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IntentSpec {
    pub app: String,
    /// Controller-specific payload, opaque to the protocol.
    #[serde(alias = "sampleIntentData")]
    pub data: serde_json::Value,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Intent {
    pub metadata: Metadata,
    #[serde(default)]
    pub spec: IntentSpec,
}

impl Intent {
    pub fn named(name: impl Into<String>, app: impl Into<String>) -> Self {
        Self {
            metadata: Metadata {
                name: name.into(),
                ..Default::default()
            },
            spec: IntentSpec {
                app: app.into(),
                ..Default::default()
            },
        }
    }
}

/// Read/write access to intents, keyed by deployment intent group.
#[async_trait]
pub trait IntentStore: Send + Sync {
    /// Store an intent. With `fail_if_exists`, a second create of the same
    /// name is rejected; otherwise it replaces the stored value.
    async fn create(&self, scope: &DigScope, intent: Intent, fail_if_exists: bool) -> Result<Intent>;

    async fn get(&self, key: &IntentKey) -> Result<Intent>;

    /// All intents in a deployment intent group, ordered by name.
    async fn list(&self, scope: &DigScope) -> Result<Vec<Intent>>;

    async fn delete(&self, key: &IntentKey) -> Result<()>;
}

/// In-memory intent store.
#[derive(Default)]
pub struct MemoryIntentStore {
    intents: RwLock<BTreeMap<IntentKey, Intent>>,
}

impl MemoryIntentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl IntentStore for MemoryIntentStore {
    async fn create(&self, scope: &DigScope, intent: Intent, fail_if_exists: bool) -> Result<Intent> {
        if intent.metadata.name.is_empty() {
            return Err(IntentError::EmptyName);
        }
        let key = scope.intent(intent.metadata.name.clone());
        let mut intents = self.intents.write().await;
        if fail_if_exists && intents.contains_key(&key) {
            return Err(IntentError::AlreadyExists(key.intent));
        }
        intents.insert(key, intent.clone());
        Ok(intent)
    }

    async fn get(&self, key: &IntentKey) -> Result<Intent> {
        self.intents
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| IntentError::NotFound(key.intent.clone()))
    }

    async fn list(&self, scope: &DigScope) -> Result<Vec<Intent>> {
        Ok(self
            .intents
            .read()
            .await
            .iter()
            .filter(|(k, _)| &k.scope == scope)
            .map(|(_, v)| v.clone())
            .collect())
    }

    async fn delete(&self, key: &IntentKey) -> Result<()> {
        match self.intents.write().await.remove(key) {
            Some(_) => Ok(()),
            None => Err(IntentError::NotFound(key.intent.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scope() -> DigScope {
        DigScope::new("p", "ca", "v1", "dig")
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let store = MemoryIntentStore::new();
        store
            .create(&scope(), Intent::named("i1", "web"), true)
            .await
            .unwrap();

        let got = store.get(&scope().intent("i1")).await.unwrap();
        assert_eq!(got.spec.app, "web");
    }

    #[tokio::test]
    async fn test_create_duplicate() {
        let store = MemoryIntentStore::new();
        store.create(&scope(), Intent::named("i1", "a"), true).await.unwrap();

        let err = store
            .create(&scope(), Intent::named("i1", "b"), true)
            .await
            .unwrap_err();
        assert!(matches!(err, IntentError::AlreadyExists(ref n) if n == "i1"));

        // replace is allowed without the flag
        store.create(&scope(), Intent::named("i1", "b"), false).await.unwrap();
        assert_eq!(store.get(&scope().intent("i1")).await.unwrap().spec.app, "b");
    }

    #[tokio::test]
    async fn test_list_is_scoped() {
        let store = MemoryIntentStore::new();
        let other = DigScope::new("p", "ca", "v1", "other");
        store.create(&scope(), Intent::named("b", "x"), true).await.unwrap();
        store.create(&scope(), Intent::named("a", "x"), true).await.unwrap();
        store.create(&other, Intent::named("c", "x"), true).await.unwrap();

        let names: Vec<_> = store
            .list(&scope())
            .await
            .unwrap()
            .into_iter()
            .map(|i| i.metadata.name)
            .collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_empty_name_rejected() {
        let store = MemoryIntentStore::new();
        assert!(matches!(
            store.create(&scope(), Intent::default(), true).await,
            Err(IntentError::EmptyName)
        ));
    }

    #[tokio::test]
    async fn test_delete_missing() {
        let store = MemoryIntentStore::new();
        assert!(matches!(
            store.delete(&scope().intent("nope")).await,
            Err(IntentError::NotFound(_))
        ));
    }

    #[test]
    fn test_intent_json_shape() {
        let json = r#"{"metadata":{"name":"i1","userData1":"u"},"spec":{"app":"web"}}"#;
        let intent: Intent = serde_json::from_str(json).unwrap();
        assert_eq!(intent.metadata.user_data1, "u");
        assert_eq!(intent.spec.app, "web");
    }
}
