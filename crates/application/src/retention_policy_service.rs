use std::sync::Arc;

use serde_json::json;

use freightdesk_core::{AppError, AppResult};
use freightdesk_domain::{
    EventType, NewAuditLogRecord, RetentionAuditAction, RetentionDays, RetentionPolicy,
};

use crate::retention_ports::{
    AuditLogRepository, OptimizationReport, PolicyEntry, PolicyOverview, RetentionPolicyStore,
};


/// Reads and updates per-event-type retention windows.
#[derive(Clone)]
pub struct RetentionPolicyService {
    store: Arc<dyn RetentionPolicyStore>,
    audit_repository: Arc<dyn AuditLogRepository>,
}

impl RetentionPolicyService {
    /// Creates a policy service.
    #[must_use]
    pub fn new(
        store: Arc<dyn RetentionPolicyStore>,
        audit_repository: Arc<dyn AuditLogRepository>,
    ) -> Self {
        Self {
            store,
            audit_repository,
        }
    }

    /// Loads the policy for one run.
    pub async fn load_policy(&self) -> AppResult<RetentionPolicy> {
        self.store.load_policy().await
    }

    /// Resolves one event type's window, falling back to the global default.
    pub async fn retention_days(&self, event_type: &EventType) -> AppResult<RetentionDays> {
        Ok(self.store.load_policy().await?.retention_days_for(event_type))
    }

    /// Validates and persists one window, then records the change.
    pub async fn set_retention_days(
        &self,
        event_type: &EventType,
        days: u16,
        actor_id: Option<i64>,
    ) -> AppResult<RetentionPolicy> {
        let days = RetentionDays::new(days)?;
        let previous = self.retention_days(event_type).await?;
        let policy = self.store.set_retention_days(event_type, days).await?;

        let record = NewAuditLogRecord::new(
            EventType::system(),
            RetentionAuditAction::RetentionPolicyUpdated.as_str(),
            actor_id,
            Some(json!({
                "event_type": event_type,
                "previous_days": previous,
                "retention_days": days,
            })),
        )?;
        self.audit_repository.append_record(record).await?;

        Ok(policy)
    }

    /// Returns the current policy as operator-facing rows.
    pub async fn show_policies(&self) -> AppResult<PolicyOverview> {
        let policy = self.store.load_policy().await?;
        let entries = policy
            .entries()
            .iter()
            .map(|(event_type, days)| PolicyEntry {
                event_type: event_type.clone(),
                retention_days: *days,
                human_span: days.human_span(),
                archive_threshold_days: days.archive_threshold(),
            })
            .collect();

        Ok(PolicyOverview {
            default_days: policy.default_days(),
            entries,
        })
    }

    /// Writes every recommended window from an optimization report.
    pub async fn apply_optimizations(
        &self,
        report: &OptimizationReport,
        actor_id: Option<i64>,
    ) -> AppResult<RetentionPolicy> {
        let mut policy = self.store.load_policy().await?;
        for optimization in &report.optimizations {
            policy = self
                .set_retention_days(
                    &optimization.event_type,
                    optimization.recommended_days.days(),
                    actor_id,
                )
                .await?;
        }

        Ok(policy)
    }
}

/// Parses an `event_type:days` assignment such as `security:400`.
pub fn parse_policy_assignment(value: &str) -> AppResult<(EventType, RetentionDays)> {
    let Some((event_type, days)) = value.split_once(':') else {
        return Err(AppError::Validation(format!(
            "policy assignment '{value}' must use the form event_type:days"
        )));
    };

    Ok((EventType::new(event_type)?, RetentionDays::parse(days)?))
}
