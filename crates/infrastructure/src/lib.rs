//! Infrastructure adapters for audit application ports.

#![forbid(unsafe_code)]

mod in_memory_audit_run_lease_coordinator;
mod in_memory_record_store;
mod in_memory_rule_repository;
mod postgres_record_store;
mod postgres_rule_repository;
mod redis_audit_run_lease_coordinator;

pub use in_memory_audit_run_lease_coordinator::InMemoryAuditRunLeaseCoordinator;
pub use in_memory_record_store::InMemoryRecordStore;
pub use in_memory_rule_repository::InMemoryRuleRepository;
pub use postgres_record_store::PostgresRecordStore;
pub use postgres_rule_repository::PostgresRuleRepository;
pub use redis_audit_run_lease_coordinator::RedisAuditRunLeaseCoordinator;
