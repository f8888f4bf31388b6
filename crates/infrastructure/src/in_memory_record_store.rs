use std::collections::BTreeMap;

use async_trait::async_trait;
use bastion_audit_application::{
    AuditCommit, AuditRunEntry, AuditRunQuery, RecordQuery, RecordStore,
};
use bastion_audit_core::{AppError, AppResult, AuditRunId, RecordId};
use bastion_audit_domain::{AuthorizationRecord, AuthorizationRecordInput, RecordMutation};
use chrono::Utc;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct StoreState {
    records: BTreeMap<RecordId, AuthorizationRecord>,
    runs: Vec<AuditRunEntry>,
}

/// In-memory record store with all-or-nothing audit commits.
#[derive(Debug, Default)]
pub struct InMemoryRecordStore {
    state: RwLock<StoreState>,
}

impl InMemoryRecordStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts one unmarked record with the next identifier.
    pub async fn insert(&self, input: AuthorizationRecordInput) -> AuthorizationRecord {
        let mut state = self.state.write().await;
        let next_id = state
            .records
            .keys()
            .next_back()
            .map_or(1, |last| last.as_i64() + 1);
        let record = AuthorizationRecord::new(RecordId::new(next_id), input);
        state.records.insert(record.id(), record.clone());
        record
    }
}

fn validate_mutation(
    records: &BTreeMap<RecordId, AuthorizationRecord>,
    mutation: &RecordMutation,
) -> AppResult<()> {
    if !records.contains_key(&mutation.record_id) {
        return Err(AppError::Persistence(format!(
            "audit commit references unknown record '{}'",
            mutation.record_id
        )));
    }

    if mutation.marked_for_deletion != mutation.deletion_reason.is_some() {
        return Err(AppError::Persistence(format!(
            "audit commit for record '{}' pairs the deletion flag with an inconsistent reason",
            mutation.record_id
        )));
    }

    Ok(())
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn load_records(&self) -> AppResult<Vec<AuthorizationRecord>> {
        Ok(self.state.read().await.records.values().cloned().collect())
    }

    async fn commit_audit_run(&self, commit: AuditCommit) -> AppResult<AuditRunEntry> {
        let mut state = self.state.write().await;
        for mutation in &commit.mutations {
            validate_mutation(&state.records, mutation)?;
        }

        for mutation in commit.mutations {
            if let Some(record) = state.records.get_mut(&mutation.record_id) {
                record.clear_deletion_mark();
                if let Some(reason) = mutation.deletion_reason {
                    record.mark_for_deletion(reason);
                }
            }
        }

        let entry = AuditRunEntry {
            run_id: AuditRunId::new(),
            summary: commit.summary,
            created_at: Utc::now(),
        };
        state.runs.push(entry.clone());

        Ok(entry)
    }

    async fn list_records(&self, query: RecordQuery) -> AppResult<Vec<AuthorizationRecord>> {
        let state = self.state.read().await;

        Ok(state
            .records
            .values()
            .filter(|record| {
                query
                    .person
                    .as_deref()
                    .is_none_or(|person| record.person() == person)
            })
            .filter(|record| {
                query
                    .marked_for_deletion
                    .is_none_or(|marked| record.is_marked_for_deletion() == marked)
            })
            .skip(query.offset)
            .take(query.limit)
            .cloned()
            .collect())
    }

    async fn find_record(&self, record_id: RecordId) -> AppResult<Option<AuthorizationRecord>> {
        Ok(self.state.read().await.records.get(&record_id).cloned())
    }

    async fn set_deletion_mark(
        &self,
        record_id: RecordId,
        deletion_reason: Option<String>,
    ) -> AppResult<()> {
        let mut state = self.state.write().await;
        let record = state.records.get_mut(&record_id).ok_or_else(|| {
            AppError::NotFound(format!("authorization record '{record_id}' does not exist"))
        })?;

        record.clear_deletion_mark();
        if let Some(reason) = deletion_reason {
            record.mark_for_deletion(reason);
        }

        Ok(())
    }

    async fn list_audit_runs(&self, query: AuditRunQuery) -> AppResult<Vec<AuditRunEntry>> {
        let state = self.state.read().await;
        let mut runs = state.runs.clone();
        runs.sort_by(|left, right| {
            right
                .summary
                .run_time()
                .cmp(&left.summary.run_time())
                .then_with(|| right.created_at.cmp(&left.created_at))
        });

        Ok(runs
            .into_iter()
            .skip(query.offset)
            .take(query.limit)
            .collect())
    }

    async fn find_audit_run(&self, run_id: AuditRunId) -> AppResult<Option<AuditRunEntry>> {
        Ok(self
            .state
            .read()
            .await
            .runs
            .iter()
            .find(|entry| entry.run_id == run_id)
            .cloned())
    }
}
