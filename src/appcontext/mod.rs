//! AppContext: the per-deployment state document.
//!
//! A document is a tree of `/`-terminated keys under `/context/{id}/`:
//!
//! ```text
//! /context/{id}/                                  root, value = id
//! /context/{id}/meta/                             CompositeAppMeta
//! /context/{id}/app/{app}/                        app name
//! /context/{id}/app/{app}/cluster/{cluster}/      cluster name
//! /context/{id}/app/{app}/cluster/{cluster}/resource/{res}/   manifest
//! .../status/                                     status value at any level
//! .../instruction/{order|dependency}/             ordering instructions
//! ```
//!
//! The orchestrator creates and deletes documents; controllers only load an
//! existing document through the handle they were given.

mod store;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

pub use store::{ContextStore, MemoryContextStore};

const CONTEXT_PREFIX: &str = "/context/";
const REVISION_PREFIX: &str = "/revision/";

/// Errors from AppContext operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Key doesn't exist: {0}")]
    NotFound(String),

    #[error("Failed to get the appContext with ID: {0}")]
    ContextNotFound(AppContextId),

    #[error("Not a valid run time context {0} name")]
    InvalidName(&'static str),

    #[error("No handle was found for the given {0}")]
    HandleNotFound(&'static str),

    #[error("Not a valid app context instruction {0}")]
    InvalidInstruction(&'static str),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Context store error: {0}")]
    Backend(String),
}

/// Result type for AppContext operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Opaque AppContext identifier issued by the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AppContextId(String);

impl AppContextId {
    /// Issue a fresh identifier.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn root_key(&self) -> String {
        format!("{}{}/", CONTEXT_PREFIX, self.0)
    }

    fn revision_key(&self) -> String {
        format!("{}{}/", REVISION_PREFIX, self.0)
    }
}

impl From<&str> for AppContextId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for AppContextId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for AppContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Key of one node in an AppContext document.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Handle(String);

impl Handle {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn child(&self, level: &str, name: &str) -> Handle {
        Handle(format!("{}{}/{}/", self.0, level, name))
    }

    fn level(&self, level: &str) -> Handle {
        Handle(format!("{}{}/", self.0, level))
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Composite application metadata stored at `/meta/`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct CompositeAppMeta {
    pub project: String,
    pub composite_app: String,
    pub version: String,
    pub release: String,
    pub deployment_intent_group: String,
    pub namespace: String,
    pub level: String,
    #[serde(rename = "ChildContextIDs")]
    pub child_context_ids: Vec<String>,
    pub logical_cloud: String,
    pub logical_cloud_namespace: String,
    pub logical_cloud_level: String,
}

/// Instruction kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstructionType {
    Order,
    Dependency,
}

impl InstructionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            InstructionType::Order => "order",
            InstructionType::Dependency => "dependency",
        }
    }
}

impl FromStr for InstructionType {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "order" => Ok(InstructionType::Order),
            "dependency" => Ok(InstructionType::Dependency),
            _ => Err(StoreError::InvalidInstruction("type")),
        }
    }
}

/// Levels an instruction may be attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstructionLevel {
    App,
    Resource,
    Subresource,
}

impl InstructionLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            InstructionLevel::App => "app",
            InstructionLevel::Resource => "resource",
            InstructionLevel::Subresource => "subresource",
        }
    }
}

impl FromStr for InstructionLevel {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "app" => Ok(InstructionLevel::App),
            "resource" => Ok(InstructionLevel::Resource),
            "subresource" => Ok(InstructionLevel::Subresource),
            _ => Err(StoreError::InvalidInstruction("level")),
        }
    }
}

/// Accessor for one AppContext document.
#[derive(Clone)]
pub struct AppContext {
    store: Arc<dyn ContextStore>,
    id: AppContextId,
}

impl AppContext {
    /// Create a new document with its metadata. Orchestrator only.
    pub async fn create(store: Arc<dyn ContextStore>, meta: &CompositeAppMeta) -> Result<Self> {
        let id = AppContextId::generate();
        store
            .put(&id.root_key(), Value::String(id.as_str().to_string()))
            .await?;
        store.put(&id.revision_key(), Value::from(0u64)).await?;
        let ctx = Self { store, id };
        ctx.put(&ctx.root().level("meta"), serde_json::to_value(meta)?)
            .await?;
        info!(app_context = %ctx.id, "Created AppContext");
        Ok(ctx)
    }

    /// Load a document created earlier.
    pub async fn load(store: Arc<dyn ContextStore>, id: impl Into<AppContextId>) -> Result<Self> {
        let id = id.into();
        if id.is_empty() {
            return Err(StoreError::ContextNotFound(id));
        }
        match store.get(&id.root_key()).await {
            Ok(_) => Ok(Self { store, id }),
            Err(StoreError::NotFound(_)) => Err(StoreError::ContextNotFound(id)),
            Err(e) => Err(e),
        }
    }

    pub fn id(&self) -> &AppContextId {
        &self.id
    }

    /// Root handle of the composite app.
    pub fn root(&self) -> Handle {
        Handle(self.id.root_key())
    }

    /// Delete the whole document.
    pub async fn delete(&self) -> Result<()> {
        self.store.delete_prefix(&self.id.root_key()).await?;
        self.store.delete(&self.id.revision_key()).await?;
        info!(app_context = %self.id, "Deleted AppContext");
        Ok(())
    }

    /// Number of mutations applied since creation. Concurrent writers on the
    /// same document each count once.
    pub async fn revision(&self) -> Result<u64> {
        let value = self.store.get(&self.id.revision_key()).await?;
        Ok(value.as_u64().unwrap_or(0))
    }

    pub async fn meta(&self) -> Result<CompositeAppMeta> {
        let value = self.store.get(self.root().level("meta").as_str()).await?;
        Ok(serde_json::from_value(value)?)
    }

    pub async fn set_meta(&self, meta: &CompositeAppMeta) -> Result<()> {
        self.put(&self.root().level("meta"), serde_json::to_value(meta)?)
            .await
    }

    pub async fn add_app(&self, app: &str) -> Result<Handle> {
        non_empty(app, "app")?;
        let handle = self.root().child("app", app);
        self.put(&handle, Value::String(app.to_string())).await?;
        debug!(handle = %handle, "Added app handle");
        Ok(handle)
    }

    pub async fn app_handle(&self, app: &str) -> Result<Handle> {
        non_empty(app, "app")?;
        self.existing(self.root().child("app", app), "app").await
    }

    pub async fn delete_app(&self, handle: &Handle) -> Result<()> {
        self.store.delete_prefix(handle.as_str()).await?;
        self.bump().await
    }

    /// Add a cluster under an app handle.
    pub async fn add_cluster(&self, app: &Handle, cluster: &str) -> Result<Handle> {
        non_empty(cluster, "cluster")?;
        let handle = app.child("cluster", cluster);
        self.put(&handle, Value::String(cluster.to_string())).await?;
        debug!(handle = %handle, "Added cluster handle");
        Ok(handle)
    }

    pub async fn cluster_handle(&self, app: &str, cluster: &str) -> Result<Handle> {
        non_empty(app, "app")?;
        non_empty(cluster, "cluster")?;
        self.existing(self.root().child("app", app).child("cluster", cluster), "cluster")
            .await
    }

    pub async fn delete_cluster(&self, handle: &Handle) -> Result<()> {
        self.store.delete_prefix(handle.as_str()).await?;
        self.bump().await
    }

    /// Names of every cluster placed for `app`. Empty lists are an error.
    pub async fn cluster_names(&self, app: &str) -> Result<Vec<String>> {
        non_empty(app, "app")?;
        let prefix = format!("{}app/{}/cluster/", self.root(), app);
        let names = self.child_names(&prefix).await?;
        if names.is_empty() {
            return Err(StoreError::Backend("Cluster list is empty".to_string()));
        }
        Ok(names)
    }

    /// Add a resource manifest under a cluster handle.
    pub async fn add_resource(&self, cluster: &Handle, resource: &str, value: Value) -> Result<Handle> {
        non_empty(resource, "resource")?;
        let handle = cluster.child("resource", resource);
        self.put(&handle, value).await?;
        debug!(handle = %handle, "Added resource handle");
        Ok(handle)
    }

    pub async fn resource_handle(&self, app: &str, cluster: &str, resource: &str) -> Result<Handle> {
        non_empty(app, "app")?;
        non_empty(cluster, "cluster")?;
        non_empty(resource, "resource")?;
        let handle = self
            .root()
            .child("app", app)
            .child("cluster", cluster)
            .child("resource", resource);
        self.existing(handle, "resource").await
    }

    pub async fn resource_names(&self, app: &str, cluster: &str) -> Result<Vec<String>> {
        non_empty(app, "app")?;
        non_empty(cluster, "cluster")?;
        let prefix = format!("{}app/{}/cluster/{}/resource/", self.root(), app, cluster);
        self.child_names(&prefix).await
    }

    /// Attach an instruction at `level` beneath `handle`.
    pub async fn add_instruction(
        &self,
        handle: &Handle,
        level: InstructionLevel,
        kind: InstructionType,
        value: Value,
    ) -> Result<Handle> {
        let instruction = Handle(format!(
            "{}{}/instruction/{}/",
            handle,
            level.as_str(),
            kind.as_str()
        ));
        self.put(&instruction, value).await?;
        debug!(handle = %instruction, "Added instruction handle");
        Ok(instruction)
    }

    /// Composite-app-wide instruction of the given kind.
    pub async fn app_instruction(&self, kind: InstructionType) -> Result<Value> {
        let key = format!("{}app/instruction/{}/", self.root(), kind.as_str());
        self.store.get(&key).await
    }

    /// Store a value at `{handle}{level}/`, e.g. a status object.
    pub async fn add_level_value(&self, handle: &Handle, level: &str, value: Value) -> Result<Handle> {
        non_empty(level, "level")?;
        let target = handle.level(level);
        self.put(&target, value).await?;
        Ok(target)
    }

    pub async fn status(&self, handle: &Handle) -> Result<Value> {
        self.store.get(handle.level("status").as_str()).await
    }

    pub async fn value(&self, handle: &Handle) -> Result<Value> {
        self.store.get(handle.as_str()).await
    }

    /// Replace the value at an existing handle.
    pub async fn update_value(&self, handle: &Handle, value: Value) -> Result<()> {
        self.value(handle).await?;
        self.put(handle, value).await
    }

    /// Every key beneath `handle`, including the handle itself.
    pub async fn handles(&self, handle: &Handle) -> Result<Vec<Handle>> {
        Ok(self
            .store
            .keys(handle.as_str())
            .await?
            .into_iter()
            .map(Handle)
            .collect())
    }

    async fn put(&self, handle: &Handle, value: Value) -> Result<()> {
        self.store.put(handle.as_str(), value).await?;
        self.bump().await
    }

    async fn bump(&self) -> Result<()> {
        self.store.increment(&self.id.revision_key()).await?;
        Ok(())
    }

    async fn existing(&self, handle: Handle, what: &'static str) -> Result<Handle> {
        match self.store.get(handle.as_str()).await {
            Ok(_) => Ok(handle),
            Err(StoreError::NotFound(_)) => Err(StoreError::HandleNotFound(what)),
            Err(e) => Err(e),
        }
    }

    /// Direct children names under `prefix` (keys of the form `{prefix}{name}/`).
    async fn child_names(&self, prefix: &str) -> Result<Vec<String>> {
        Ok(self
            .store
            .keys(prefix)
            .await?
            .iter()
            .filter_map(|k| k.strip_prefix(prefix))
            .filter_map(|rest| rest.strip_suffix('/'))
            .filter(|name| !name.is_empty() && !name.contains('/'))
            .map(str::to_string)
            .collect())
    }
}

impl fmt::Debug for AppContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppContext").field("id", &self.id).finish()
    }
}

fn non_empty(value: &str, what: &'static str) -> Result<()> {
    if value.is_empty() {
        Err(StoreError::InvalidName(what))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests;
