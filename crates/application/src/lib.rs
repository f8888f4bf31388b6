//! Application services and ports for authorization auditing.

#![forbid(unsafe_code)]

mod audit_engine;
mod audit_ports;
mod audit_service;
mod policy_context;

pub use audit_engine::{AuditEngine, AuditOutcome, AuditStage, StageCounts};
pub use audit_ports::{
    AUDIT_RUN_LEASE_SCOPE, AuditCommit, AuditRunEntry, AuditRunLease, AuditRunLeaseCoordinator,
    AuditRunQuery, RecordQuery, RecordStore, RuleRepository,
};
pub use audit_service::{AuditRunReport, AuditService, AuditServiceConfig};
pub use policy_context::{PolicyContext, PolicyResolution, RuleDiagnostic};
