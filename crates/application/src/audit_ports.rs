mod lease;
mod records;
mod repositories;

pub use lease::{AUDIT_RUN_LEASE_SCOPE, AuditRunLease, AuditRunLeaseCoordinator};
pub use records::{AuditCommit, AuditRunEntry, AuditRunQuery, RecordQuery};
pub use repositories::{RecordStore, RuleRepository};
