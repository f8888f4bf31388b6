use async_trait::async_trait;
use bastion_audit_core::AppResult;

/// Coordination scope shared by every audit run and administrative mark.
pub const AUDIT_RUN_LEASE_SCOPE: &str = "audit-run";

/// Exclusive right to mutate the record store for a bounded time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditRunLease {
    /// Coordination scope key.
    pub scope_key: String,
    /// Lease token used for safe release.
    pub token: String,
    /// Lease holder identity.
    pub holder_id: String,
}

/// Coordination port that serializes audit runs.
#[async_trait]
pub trait AuditRunLeaseCoordinator: Send + Sync {
    /// Attempts to acquire the run lease. Returns `None` while another holder
    /// owns an unexpired lease.
    async fn try_acquire_lease(
        &self,
        holder_id: &str,
        lease_seconds: u32,
    ) -> AppResult<Option<AuditRunLease>>;

    /// Releases one lease using token compare-and-delete semantics.
    async fn release_lease(&self, lease: &AuditRunLease) -> AppResult<()>;
}
