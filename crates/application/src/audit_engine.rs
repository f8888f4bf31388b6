//! Four-stage classification of authorization records.
//!
//! Stages run in a fixed order over the whole record set and only consider
//! records that are still unmarked, so a record receives at most one deletion
//! reason per run, from the earliest stage that flags it:
//!
//! 1. duplicate authorization (independent of rules)
//! 2. long-standing access older than the threshold
//! 3. production host access by non-operations personnel
//! 4. master database access by non-operations personnel

use std::collections::HashSet;

use bastion_audit_domain::{AuditRunSummary, AuthorizationRecord, DeletionReason, RecordMutation};
use chrono::{DateTime, TimeDelta, Utc};

use crate::PolicyContext;

/// Audit stages in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuditStage {
    /// Duplicate authorization detection.
    Duplicate,
    /// Long-standing access expiry.
    LongStandingAccess,
    /// Production environment restriction.
    ProductionEnvironment,
    /// Master database restriction.
    MasterDatabase,
}

impl AuditStage {
    /// Every stage in execution order.
    pub const ALL: [Self; 4] = [
        Self::Duplicate,
        Self::LongStandingAccess,
        Self::ProductionEnvironment,
        Self::MasterDatabase,
    ];

    /// Returns stable identifier.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Duplicate => "duplicate",
            Self::LongStandingAccess => "long_standing_access",
            Self::ProductionEnvironment => "production_environment",
            Self::MasterDatabase => "master_database",
        }
    }
}

/// Records newly marked by each stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StageCounts {
    /// Marked as duplicates.
    pub duplicate: usize,
    /// Marked for long-standing access.
    pub long_standing_access: usize,
    /// Marked for production environment access.
    pub production_environment: usize,
    /// Marked for master database access.
    pub master_database: usize,
}

impl StageCounts {
    /// Returns the count for one stage.
    #[must_use]
    pub fn get(&self, stage: AuditStage) -> usize {
        match stage {
            AuditStage::Duplicate => self.duplicate,
            AuditStage::LongStandingAccess => self.long_standing_access,
            AuditStage::ProductionEnvironment => self.production_environment,
            AuditStage::MasterDatabase => self.master_database,
        }
    }

    /// Returns the sum over all stages.
    #[must_use]
    pub fn total(&self) -> usize {
        self.duplicate
            + self.long_standing_access
            + self.production_environment
            + self.master_database
    }
}

/// Result of one engine pass, ready to be committed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditOutcome {
    /// Run summary.
    pub summary: AuditRunSummary,
    /// Deletion marks added in this run, in record order.
    pub mutations: Vec<RecordMutation>,
    /// Per-stage breakdown of the newly marked records.
    pub stage_counts: StageCounts,
}

/// Rule-evaluation engine bound to one policy context.
#[derive(Debug, Clone)]
pub struct AuditEngine {
    context: PolicyContext,
}

impl AuditEngine {
    /// Creates an engine for one run.
    #[must_use]
    pub fn new(context: PolicyContext) -> Self {
        Self { context }
    }

    /// Returns the policy context.
    #[must_use]
    pub fn context(&self) -> &PolicyContext {
        &self.context
    }

    /// Classifies every record, marking violations in place.
    ///
    /// Records must be in stable storage order: the first of several
    /// duplicates in that order is the one kept.
    pub fn execute(
        &self,
        records: &mut [AuthorizationRecord],
        run_time: DateTime<Utc>,
    ) -> AuditOutcome {
        let mut marked = Vec::new();
        let context = &self.context;

        let duplicates = duplicate_indices(records);
        let duplicate = mark_indices(
            records,
            &duplicates,
            DeletionReason::DuplicateAuthorization,
            &mut marked,
        );

        let threshold_days = context.long_access_threshold_days();
        let long_standing_access = match long_access_cutoff(run_time, threshold_days) {
            Some(cutoff) => mark_where(
                records,
                DeletionReason::LongStandingAccess { threshold_days },
                &mut marked,
                |record| {
                    !context.is_operations_person(record.person()) && record.checked_at() < cutoff
                },
            ),
            None => 0,
        };

        let production_environment = mark_where(
            records,
            DeletionReason::ProductionEnvironmentAccess,
            &mut marked,
            |record| {
                !context.is_operations_person(record.person())
                    && context.is_production_host(record.host_name())
            },
        );

        let master_database = mark_where(
            records,
            DeletionReason::MasterDatabaseAccess,
            &mut marked,
            |record| {
                !context.is_operations_person(record.person())
                    && record.uses_database_protocol()
                    && context.master_database_ips().contains(record.host_ip())
            },
        );

        marked.sort_unstable();
        let mutations = marked
            .iter()
            .map(|index| RecordMutation::from_record(&records[*index]))
            .collect::<Vec<_>>();

        AuditOutcome {
            summary: AuditRunSummary::new(run_time, records.len(), mutations.len()),
            mutations,
            stage_counts: StageCounts {
                duplicate,
                long_standing_access,
                production_environment,
                master_database,
            },
        }
    }
}

/// Returns the instant before which grants are long-standing, or `None` when
/// the check is disabled or the cutoff falls outside the representable range.
fn long_access_cutoff(run_time: DateTime<Utc>, threshold_days: u32) -> Option<DateTime<Utc>> {
    if threshold_days == 0 {
        return None;
    }

    TimeDelta::try_days(i64::from(threshold_days))
        .and_then(|threshold| run_time.checked_sub_signed(threshold))
}

fn duplicate_indices(records: &[AuthorizationRecord]) -> Vec<usize> {
    let mut seen = HashSet::new();
    records
        .iter()
        .enumerate()
        .filter(|(_, record)| !record.is_marked_for_deletion())
        .filter_map(|(index, record)| (!seen.insert(record.duplicate_key())).then_some(index))
        .collect()
}

fn mark_indices(
    records: &mut [AuthorizationRecord],
    indices: &[usize],
    reason: DeletionReason,
    marked: &mut Vec<usize>,
) -> usize {
    let message = reason.message();
    let before = marked.len();
    for index in indices {
        if records[*index].mark_for_deletion(message.as_str()) {
            marked.push(*index);
        }
    }

    marked.len() - before
}

fn mark_where(
    records: &mut [AuthorizationRecord],
    reason: DeletionReason,
    marked: &mut Vec<usize>,
    violates: impl Fn(&AuthorizationRecord) -> bool,
) -> usize {
    let matching = records
        .iter()
        .enumerate()
        .filter(|(_, record)| !record.is_marked_for_deletion() && violates(record))
        .map(|(index, _)| index)
        .collect::<Vec<_>>();

    mark_indices(records, &matching, reason, marked)
}
