use bastion_audit_core::AuditRunId;
use bastion_audit_domain::{AuditRunSummary, RecordMutation};
use chrono::{DateTime, Utc};

/// Everything one audit run writes, committed as a single unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditCommit {
    /// Run summary to append to the run history.
    pub summary: AuditRunSummary,
    /// Deletion-mark changes, in record order.
    pub mutations: Vec<RecordMutation>,
}

/// Persisted audit run history entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditRunEntry {
    /// Stable run identifier.
    pub run_id: AuditRunId,
    /// Counts recorded for the run.
    pub summary: AuditRunSummary,
    /// Time the run was committed.
    pub created_at: DateTime<Utc>,
}

/// Query parameters for run history listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuditRunQuery {
    /// Maximum rows returned.
    pub limit: usize,
    /// Number of rows skipped for offset pagination.
    pub offset: usize,
}

impl Default for AuditRunQuery {
    fn default() -> Self {
        Self {
            limit: 50,
            offset: 0,
        }
    }
}

/// Query parameters for authorization record listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordQuery {
    /// Optional exact person filter.
    pub person: Option<String>,
    /// Optional deletion-mark filter.
    pub marked_for_deletion: Option<bool>,
    /// Maximum rows returned.
    pub limit: usize,
    /// Number of rows skipped for offset pagination.
    pub offset: usize,
}

impl Default for RecordQuery {
    fn default() -> Self {
        Self {
            person: None,
            marked_for_deletion: None,
            limit: 100,
            offset: 0,
        }
    }
}
