use std::sync::Arc;

use bastion_audit_core::{AppError, AppResult, AuditRunId, NonEmptyString, RecordId};
use bastion_audit_domain::AuthorizationRecord;
use chrono::{DateTime, Utc};

use crate::audit_ports::{
    AuditCommit, AuditRunEntry, AuditRunLease, AuditRunLeaseCoordinator, AuditRunQuery,
    RecordQuery, RecordStore, RuleRepository,
};
use crate::{AuditEngine, PolicyContext, PolicyResolution, RuleDiagnostic, StageCounts};

mod records;
mod runs;

const MAX_RECORD_PAGE: usize = 500;
const MAX_RUN_PAGE: usize = 200;

/// Runtime settings for audit run coordination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditServiceConfig {
    holder_id: NonEmptyString,
    lease_seconds: u32,
}

impl AuditServiceConfig {
    /// Creates validated settings.
    pub fn new(holder_id: impl Into<String>, lease_seconds: u32) -> AppResult<Self> {
        if lease_seconds == 0 {
            return Err(AppError::Validation(
                "lease_seconds must be greater than zero".to_owned(),
            ));
        }

        Ok(Self {
            holder_id: NonEmptyString::new(holder_id)?,
            lease_seconds,
        })
    }

    /// Returns the lease holder identity.
    #[must_use]
    pub fn holder_id(&self) -> &str {
        self.holder_id.as_str()
    }

    /// Returns the lease TTL in seconds.
    #[must_use]
    pub fn lease_seconds(&self) -> u32 {
        self.lease_seconds
    }
}

/// Result of one committed audit run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditRunReport {
    /// Persisted run history entry.
    pub run: AuditRunEntry,
    /// Per-stage breakdown of newly marked records.
    pub stage_counts: StageCounts,
    /// Rules skipped while resolving the policy context.
    pub diagnostics: Vec<RuleDiagnostic>,
}

impl AuditRunReport {
    /// Returns the operator-facing completion message.
    #[must_use]
    pub fn message(&self) -> String {
        format!(
            "audit complete, marked {} records for deletion",
            self.run.summary.marked_deletions()
        )
    }
}

/// Audit use-cases over the rule repository and record store.
#[derive(Clone)]
pub struct AuditService {
    rule_repository: Arc<dyn RuleRepository>,
    record_store: Arc<dyn RecordStore>,
    lease_coordinator: Arc<dyn AuditRunLeaseCoordinator>,
    config: AuditServiceConfig,
}

impl AuditService {
    /// Creates an audit service.
    #[must_use]
    pub fn new(
        rule_repository: Arc<dyn RuleRepository>,
        record_store: Arc<dyn RecordStore>,
        lease_coordinator: Arc<dyn AuditRunLeaseCoordinator>,
        config: AuditServiceConfig,
    ) -> Self {
        Self {
            rule_repository,
            record_store,
            lease_coordinator,
            config,
        }
    }

    /// Returns the coordination settings.
    #[must_use]
    pub fn config(&self) -> &AuditServiceConfig {
        &self.config
    }

    async fn acquire_lease(&self) -> AppResult<AuditRunLease> {
        self.lease_coordinator
            .try_acquire_lease(self.config.holder_id(), self.config.lease_seconds())
            .await?
            .ok_or_else(|| AppError::Conflict("another audit run is in progress".to_owned()))
    }

    /// Releases the lease and returns the operation result.
    ///
    /// A release failure only surfaces when the operation itself succeeded;
    /// otherwise the operation error wins and the lease expires by TTL.
    async fn release_after<T>(&self, lease: &AuditRunLease, result: AppResult<T>) -> AppResult<T> {
        let released = self.lease_coordinator.release_lease(lease).await;

        match (result, released) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(release_error)) => Err(AppError::Internal(format!(
                "failed to release audit run lease '{}': {release_error}",
                lease.scope_key
            ))),
            (Err(error), _) => Err(error),
        }
    }
}
