use super::*;

impl AuditService {
    /// Runs one full audit pass and commits its marks with the run summary.
    ///
    /// Fails with `AppError::Conflict` while another run holds the lease.
    pub async fn run_audit(&self, run_time: DateTime<Utc>) -> AppResult<AuditRunReport> {
        let lease = self.acquire_lease().await?;
        let result = self.run_audit_with_lease(run_time).await;
        self.release_after(&lease, result).await
    }

    async fn run_audit_with_lease(&self, run_time: DateTime<Utc>) -> AppResult<AuditRunReport> {
        let rules = self.rule_repository.list_rules().await?;
        let PolicyResolution {
            context,
            diagnostics,
        } = PolicyContext::from_rules(&rules);

        let mut records = self.record_store.load_records().await?;
        records.sort_by_key(AuthorizationRecord::id);

        let outcome = AuditEngine::new(context).execute(&mut records, run_time);
        let run = self
            .record_store
            .commit_audit_run(AuditCommit {
                summary: outcome.summary,
                mutations: outcome.mutations,
            })
            .await
            .map_err(|error| match error {
                AppError::Persistence(_) => error,
                other => AppError::Persistence(format!("failed to commit audit run: {other}")),
            })?;

        Ok(AuditRunReport {
            run,
            stage_counts: outcome.stage_counts,
            diagnostics,
        })
    }

    /// Lists run history, newest run time first.
    pub async fn list_audit_runs(&self, query: AuditRunQuery) -> AppResult<Vec<AuditRunEntry>> {
        self.record_store
            .list_audit_runs(AuditRunQuery {
                limit: query.limit.clamp(1, MAX_RUN_PAGE),
                offset: query.offset,
            })
            .await
    }

    /// Returns one run history entry.
    pub async fn find_audit_run(&self, run_id: AuditRunId) -> AppResult<AuditRunEntry> {
        self.record_store
            .find_audit_run(run_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("audit run '{run_id}' does not exist")))
    }
}
