use bastion_audit_core::RecordId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::AuthorizationRecord;

/// Outcome counts of one audit pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRunSummary {
    run_time: DateTime<Utc>,
    total_records: usize,
    marked_deletions: usize,
}

impl AuditRunSummary {
    /// Creates a run summary.
    #[must_use]
    pub fn new(run_time: DateTime<Utc>, total_records: usize, marked_deletions: usize) -> Self {
        Self {
            run_time,
            total_records,
            marked_deletions,
        }
    }

    /// Returns the run timestamp.
    #[must_use]
    pub fn run_time(&self) -> DateTime<Utc> {
        self.run_time
    }

    /// Returns the number of records examined.
    #[must_use]
    pub fn total_records(&self) -> usize {
        self.total_records
    }

    /// Returns the number of records newly marked in this run.
    #[must_use]
    pub fn marked_deletions(&self) -> usize {
        self.marked_deletions
    }
}

/// Deletion-mark change for one stored record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordMutation {
    /// Target record.
    pub record_id: RecordId,
    /// New marked-for-deletion flag.
    pub marked_for_deletion: bool,
    /// New deletion reason; present exactly when the flag is set.
    pub deletion_reason: Option<String>,
}

impl RecordMutation {
    /// Captures the current deletion mark of a record.
    #[must_use]
    pub fn from_record(record: &AuthorizationRecord) -> Self {
        Self {
            record_id: record.id(),
            marked_for_deletion: record.is_marked_for_deletion(),
            deletion_reason: record.deletion_reason().map(str::to_owned),
        }
    }
}
