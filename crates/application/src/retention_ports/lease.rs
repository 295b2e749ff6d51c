use async_trait::async_trait;

use freightdesk_core::AppResult;

/// Lease held by one retention run over one scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchivalLease {
    /// Leased scope, such as `audit-retention:security`.
    pub scope_key: String,
    /// Ownership token used for compare-and-delete release.
    pub token: String,
    /// Holder that acquired the lease.
    pub holder_id: String,
}

/// Coordination port that keeps overlapping retention runs off the same rows.
#[async_trait]
pub trait ArchivalLeaseCoordinator: Send + Sync {
    /// Attempts to acquire one lease for the given scope.
    ///
    /// Returns `None` while another holder owns an unexpired lease.
    async fn try_acquire_lease(
        &self,
        scope_key: &str,
        holder_id: &str,
        lease_seconds: u32,
    ) -> AppResult<Option<ArchivalLease>>;

    /// Extends a held lease. Returns `false` when the lease was lost.
    async fn renew_lease(&self, lease: &ArchivalLease, lease_seconds: u32) -> AppResult<bool>;

    /// Releases one lease using token compare-and-delete semantics.
    async fn release_lease(&self, lease: &ArchivalLease) -> AppResult<()>;
}
