//! Persistence for agents, policies and policy intents.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::model::{AgentSpec, Policy, PolicyIntent, PolicyIntentKey};
use super::PolicyError;

/// Interface for policy service persistence.
///
/// Reads of a missing agent or policy are errors; a missing policy intent is
/// `Ok(None)` so the API can answer 404.
#[async_trait]
pub trait PolicyStore: Send + Sync {
    async fn put_agent(&self, agent: AgentSpec) -> Result<AgentSpec, PolicyError>;
    async fn get_agent(&self, id: &str) -> Result<AgentSpec, PolicyError>;
    async fn list_agents(&self) -> Result<Vec<AgentSpec>, PolicyError>;
    async fn delete_agent(&self, id: &str) -> Result<(), PolicyError>;

    async fn put_policy(&self, id: &str, policy: Policy) -> Result<Policy, PolicyError>;
    async fn get_policy(&self, id: &str) -> Result<Policy, PolicyError>;
    async fn delete_policy(&self, id: &str) -> Result<(), PolicyError>;

    async fn put_intent(&self, key: PolicyIntentKey, intent: PolicyIntent) -> Result<PolicyIntent, PolicyError>;
    async fn get_intent(&self, key: &PolicyIntentKey) -> Result<Option<PolicyIntent>, PolicyError>;
    async fn delete_intent(&self, key: &PolicyIntentKey) -> Result<(), PolicyError>;

    /// Intents triggered by `event_id` coming from `agent_id`.
    async fn intents_for_event(&self, agent_id: &str, event_id: &str) -> Result<Vec<PolicyIntent>, PolicyError>;
}

/// In-memory policy store.
#[derive(Default)]
pub struct MemoryPolicyStore {
    agents: RwLock<BTreeMap<String, AgentSpec>>,
    policies: RwLock<BTreeMap<String, Policy>>,
    intents: RwLock<BTreeMap<PolicyIntentKey, PolicyIntent>>,
}

impl MemoryPolicyStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PolicyStore for MemoryPolicyStore {
    async fn put_agent(&self, agent: AgentSpec) -> Result<AgentSpec, PolicyError> {
        self.agents
            .write()
            .await
            .insert(agent.id.clone(), agent.clone());
        Ok(agent)
    }

    async fn get_agent(&self, id: &str) -> Result<AgentSpec, PolicyError> {
        self.agents
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| PolicyError::NotFound(format!("agent {}", id)))
    }

    async fn list_agents(&self) -> Result<Vec<AgentSpec>, PolicyError> {
        Ok(self.agents.read().await.values().cloned().collect())
    }

    async fn delete_agent(&self, id: &str) -> Result<(), PolicyError> {
        self.agents
            .write()
            .await
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| PolicyError::NotFound(format!("agent {}", id)))
    }

    async fn put_policy(&self, id: &str, policy: Policy) -> Result<Policy, PolicyError> {
        self.policies
            .write()
            .await
            .insert(id.to_string(), policy.clone());
        Ok(policy)
    }

    async fn get_policy(&self, id: &str) -> Result<Policy, PolicyError> {
        self.policies
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| PolicyError::NotFound(format!("policy {}", id)))
    }

    async fn delete_policy(&self, id: &str) -> Result<(), PolicyError> {
        self.policies
            .write()
            .await
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| PolicyError::NotFound(format!("policy {}", id)))
    }

    async fn put_intent(&self, key: PolicyIntentKey, intent: PolicyIntent) -> Result<PolicyIntent, PolicyError> {
        self.intents.write().await.insert(key, intent.clone());
        Ok(intent)
    }

    async fn get_intent(&self, key: &PolicyIntentKey) -> Result<Option<PolicyIntent>, PolicyError> {
        Ok(self.intents.read().await.get(key).cloned())
    }

    async fn delete_intent(&self, key: &PolicyIntentKey) -> Result<(), PolicyError> {
        self.intents.write().await.remove(key);
        Ok(())
    }

    async fn intents_for_event(&self, agent_id: &str, event_id: &str) -> Result<Vec<PolicyIntent>, PolicyError> {
        Ok(self
            .intents
            .read()
            .await
            .values()
            .filter(|i| i.spec.event.matches(agent_id, event_id))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::super::model::{EventRef, PolicyIntentSpec};
    use super::*;

    fn intent(name: &str, event: &str, agent: &str) -> (PolicyIntentKey, PolicyIntent) {
        let key = PolicyIntentKey {
            project: "p".to_string(),
            composite_app: "ca".to_string(),
            composite_app_version: "v1".to_string(),
            deployment_intent_group: "dig".to_string(),
            policy_intent: name.to_string(),
        };
        let intent = PolicyIntent {
            spec: PolicyIntentSpec {
                event: EventRef {
                    id: event.to_string(),
                    agent: agent.to_string(),
                },
                ..Default::default()
            },
            ..Default::default()
        };
        (key, intent)
    }

    #[tokio::test]
    async fn test_intents_for_event_matches_agent_or_wildcard() {
        let store = MemoryPolicyStore::new();
        for (name, event, agent) in [
            ("a", "cpu", "agent1"),
            ("b", "cpu", ""),
            ("c", "cpu", "agent2"),
            ("d", "mem", "agent1"),
        ] {
            let (key, value) = intent(name, event, agent);
            store.put_intent(key, value).await.unwrap();
        }

        let matched = store.intents_for_event("agent1", "cpu").await.unwrap();
        assert_eq!(matched.len(), 2);
    }

    #[tokio::test]
    async fn test_missing_intent_is_none() {
        let store = MemoryPolicyStore::new();
        let (key, _) = intent("a", "cpu", "");
        assert!(store.get_intent(&key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_agents_round_trip() {
        let store = MemoryPolicyStore::new();
        assert!(store.list_agents().await.unwrap().is_empty());

        store
            .put_agent(AgentSpec {
                id: "a1".to_string(),
                addr: "10.0.0.1:9000".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(store.get_agent("a1").await.unwrap().addr, "10.0.0.1:9000");

        store.delete_agent("a1").await.unwrap();
        assert!(matches!(
            store.get_agent("a1").await,
            Err(PolicyError::NotFound(_))
        ));
    }
}
