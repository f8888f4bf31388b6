//! Domain entities and policy primitives for bastion host authorization audits.

#![forbid(unsafe_code)]

mod audit_run;
mod authorization;
mod host_pattern;
mod ip_range;
mod policy_rule;

pub use audit_run::{AuditRunSummary, RecordMutation};
pub use authorization::{
    AuthorizationRecord, AuthorizationRecordInput, DATABASE_PROTOCOLS, DeletionReason,
    DuplicateKey,
};
pub use host_pattern::{HostMatcher, HostPattern, HostPatternKind};
pub use ip_range::{IpSet, RANGE_SEPARATOR, expand_ip_range};
pub use policy_rule::{
    LongAccessThresholdPayload, MasterDatabaseIpsPayload, OperationsPersonnelPayload, PolicyRule,
    RuleCategory, RulePayload,
};
