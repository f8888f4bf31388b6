use async_trait::async_trait;
use bastion_audit_core::{AppResult, AuditRunId, RecordId};
use bastion_audit_domain::{AuthorizationRecord, PolicyRule};

use super::{AuditCommit, AuditRunEntry, AuditRunQuery, RecordQuery};

/// Read port for stored policy rules.
#[async_trait]
pub trait RuleRepository: Send + Sync {
    /// Lists every rule in definition order.
    async fn list_rules(&self) -> AppResult<Vec<PolicyRule>>;
}

/// Port for authorization records and audit run history.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Loads the complete record set in stable insertion order.
    async fn load_records(&self) -> AppResult<Vec<AuthorizationRecord>>;

    /// Applies every mutation and appends the run summary atomically.
    ///
    /// On failure nothing from the commit may remain visible.
    async fn commit_audit_run(&self, commit: AuditCommit) -> AppResult<AuditRunEntry>;

    /// Lists records matching a query, in insertion order.
    async fn list_records(&self, query: RecordQuery) -> AppResult<Vec<AuthorizationRecord>>;

    /// Finds one record.
    async fn find_record(&self, record_id: RecordId) -> AppResult<Option<AuthorizationRecord>>;

    /// Sets or clears the deletion mark of one record.
    ///
    /// `Some(reason)` marks the record, `None` unmarks it. Returns
    /// `AppError::NotFound` for unknown records.
    async fn set_deletion_mark(
        &self,
        record_id: RecordId,
        deletion_reason: Option<String>,
    ) -> AppResult<()>;

    /// Lists run history, newest run time first.
    async fn list_audit_runs(&self, query: AuditRunQuery) -> AppResult<Vec<AuditRunEntry>>;

    /// Finds one run history entry.
    async fn find_audit_run(&self, run_id: AuditRunId) -> AppResult<Option<AuditRunEntry>>;
}
