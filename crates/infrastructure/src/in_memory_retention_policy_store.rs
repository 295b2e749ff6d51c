use async_trait::async_trait;
use tokio::sync::RwLock;

use freightdesk_application::RetentionPolicyStore;
use freightdesk_core::AppResult;
use freightdesk_domain::{EventType, RetentionDays, RetentionPolicy};

/// In-memory retention policy store.
#[derive(Debug, Default)]
pub struct InMemoryRetentionPolicyStore {
    policy: RwLock<RetentionPolicy>,
}

impl InMemoryRetentionPolicyStore {
    /// Creates a store holding `policy`.
    #[must_use]
    pub fn new(policy: RetentionPolicy) -> Self {
        Self {
            policy: RwLock::new(policy),
        }
    }
}

#[async_trait]
impl RetentionPolicyStore for InMemoryRetentionPolicyStore {
    async fn load_policy(&self) -> AppResult<RetentionPolicy> {
        Ok(self.policy.read().await.clone())
    }

    async fn set_retention_days(
        &self,
        event_type: &EventType,
        days: RetentionDays,
    ) -> AppResult<RetentionPolicy> {
        let mut policy = self.policy.write().await;
        policy.set(event_type.clone(), days);
        Ok(policy.clone())
    }
}
