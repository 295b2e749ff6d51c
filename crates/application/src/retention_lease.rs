use std::sync::Arc;

use freightdesk_core::{AppError, AppResult};
use freightdesk_domain::EventType;

use crate::retention_ports::{ArchivalLease, ArchivalLeaseCoordinator};

const LEASE_SCOPE_PREFIX: &str = "audit-retention";

/// Lease configuration shared by archival and cleanup runs.
#[derive(Clone)]
pub(crate) struct LeaseSettings {
    coordinator: Arc<dyn ArchivalLeaseCoordinator>,
    holder_id: String,
    lease_seconds: u32,
}

impl LeaseSettings {
    pub(crate) fn new(
        coordinator: Arc<dyn ArchivalLeaseCoordinator>,
        holder_id: impl Into<String>,
        lease_seconds: u32,
    ) -> Self {
        Self {
            coordinator,
            holder_id: holder_id.into(),
            lease_seconds,
        }
    }

    /// Acquires the lease for one event type or fails with a conflict.
    pub(crate) async fn acquire(&self, event_type: &EventType) -> AppResult<ArchivalLease> {
        let scope_key = scope_key(event_type);
        self.coordinator
            .try_acquire_lease(
                scope_key.as_str(),
                self.holder_id.as_str(),
                self.lease_seconds,
            )
            .await?
            .ok_or_else(|| {
                AppError::Conflict(format!(
                    "another retention run holds the lease for event type '{event_type}'"
                ))
            })
    }

    /// Extends the lease before a destructive step, failing if it was lost.
    pub(crate) async fn renew(&self, lease: &ArchivalLease) -> AppResult<()> {
        if self
            .coordinator
            .renew_lease(lease, self.lease_seconds)
            .await?
        {
            return Ok(());
        }

        Err(AppError::Conflict(format!(
            "retention lease '{}' expired before deletion",
            lease.scope_key
        )))
    }

    pub(crate) async fn release(&self, lease: &ArchivalLease) -> AppResult<()> {
        self.coordinator.release_lease(lease).await
    }
}

pub(crate) fn scope_key(event_type: &EventType) -> String {
    format!("{LEASE_SCOPE_PREFIX}:{event_type}")
}
