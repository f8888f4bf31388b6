use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};

use bastion_audit_application::{
    AuditCommit, AuditRunEntry, AuditRunQuery, RecordQuery, RecordStore,
};
use bastion_audit_core::{AppError, AppResult, AuditRunId, RecordId};
use bastion_audit_domain::{AuditRunSummary, AuthorizationRecord, AuthorizationRecordInput};

/// PostgreSQL-backed store for authorization records and audit run history.
#[derive(Clone)]
pub struct PostgresRecordStore {
    pool: PgPool,
}

impl PostgresRecordStore {
    /// Creates a store with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Inserts one unmarked record and returns it with its assigned id.
    pub async fn insert_record(
        &self,
        input: AuthorizationRecordInput,
    ) -> AppResult<AuthorizationRecord> {
        let record_id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO authorization_records (
                person,
                host_ip,
                host_name,
                host_network,
                host_group,
                protocol,
                account_login_name,
                checked_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id
            "#,
        )
        .bind(input.person.as_str())
        .bind(input.host_ip.as_str())
        .bind(input.host_name.as_str())
        .bind(input.host_network.as_deref())
        .bind(input.host_group.as_deref())
        .bind(input.protocol.as_deref())
        .bind(input.account_login_name.as_deref())
        .bind(input.checked_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to insert authorization record: {error}"))
        })?;

        Ok(AuthorizationRecord::new(RecordId::new(record_id), input))
    }
}

#[derive(Debug, FromRow)]
struct AuthorizationRecordRow {
    id: i64,
    person: String,
    host_ip: String,
    host_name: String,
    host_network: Option<String>,
    host_group: Option<String>,
    protocol: Option<String>,
    account_login_name: Option<String>,
    checked_at: DateTime<Utc>,
    deletion_reason: Option<String>,
}

impl From<AuthorizationRecordRow> for AuthorizationRecord {
    fn from(row: AuthorizationRecordRow) -> Self {
        AuthorizationRecord::restore(
            RecordId::new(row.id),
            AuthorizationRecordInput {
                person: row.person,
                host_ip: row.host_ip,
                host_name: row.host_name,
                host_network: row.host_network,
                host_group: row.host_group,
                protocol: row.protocol,
                account_login_name: row.account_login_name,
                checked_at: row.checked_at,
            },
            row.deletion_reason,
        )
    }
}

#[derive(Debug, FromRow)]
struct AuditRunRow {
    id: uuid::Uuid,
    run_time: DateTime<Utc>,
    total_records: i64,
    marked_deletions: i64,
    created_at: DateTime<Utc>,
}

impl TryFrom<AuditRunRow> for AuditRunEntry {
    type Error = AppError;

    fn try_from(row: AuditRunRow) -> Result<Self, Self::Error> {
        let count = |value: i64| {
            usize::try_from(value).map_err(|_| {
                AppError::Internal(format!("audit run '{}' has a negative count", row.id))
            })
        };

        Ok(AuditRunEntry {
            run_id: AuditRunId::from_uuid(row.id),
            summary: AuditRunSummary::new(
                row.run_time,
                count(row.total_records)?,
                count(row.marked_deletions)?,
            ),
            created_at: row.created_at,
        })
    }
}

fn to_db_count(value: usize) -> AppResult<i64> {
    i64::try_from(value)
        .map_err(|_| AppError::Validation("audit run count exceeds supported range".to_owned()))
}

fn to_db_page(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

const RECORD_COLUMNS: &str = r#"
    id,
    person,
    host_ip,
    host_name,
    host_network,
    host_group,
    protocol,
    account_login_name,
    checked_at,
    deletion_reason
"#;

#[async_trait]
impl RecordStore for PostgresRecordStore {
    async fn load_records(&self) -> AppResult<Vec<AuthorizationRecord>> {
        let rows = sqlx::query_as::<_, AuthorizationRecordRow>(
            format!("SELECT {RECORD_COLUMNS} FROM authorization_records ORDER BY id").as_str(),
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to load authorization records: {error}"))
        })?;

        Ok(rows.into_iter().map(AuthorizationRecord::from).collect())
    }

    async fn commit_audit_run(&self, commit: AuditCommit) -> AppResult<AuditRunEntry> {
        let total_records = to_db_count(commit.summary.total_records())?;
        let marked_deletions = to_db_count(commit.summary.marked_deletions())?;

        let mut transaction =
            self.pool.begin().await.map_err(|error| {
                AppError::Persistence(format!("failed to begin transaction: {error}"))
            })?;

        for mutation in &commit.mutations {
            let result = sqlx::query(
                r#"
                UPDATE authorization_records
                SET marked_for_deletion = $2,
                    deletion_reason = $3
                WHERE id = $1
                "#,
            )
            .bind(mutation.record_id.as_i64())
            .bind(mutation.marked_for_deletion)
            .bind(mutation.deletion_reason.as_deref())
            .execute(&mut *transaction)
            .await
            .map_err(|error| {
                AppError::Persistence(format!(
                    "failed to update authorization record '{}': {error}",
                    mutation.record_id
                ))
            })?;

            if result.rows_affected() == 0 {
                return Err(AppError::Persistence(format!(
                    "authorization record '{}' disappeared during the audit run",
                    mutation.record_id
                )));
            }
        }

        let row = sqlx::query_as::<_, AuditRunRow>(
            r#"
            INSERT INTO audit_runs (id, run_time, total_records, marked_deletions)
            VALUES ($1, $2, $3, $4)
            RETURNING id, run_time, total_records, marked_deletions, created_at
            "#,
        )
        .bind(AuditRunId::new().as_uuid())
        .bind(commit.summary.run_time())
        .bind(total_records)
        .bind(marked_deletions)
        .fetch_one(&mut *transaction)
        .await
        .map_err(|error| {
            AppError::Persistence(format!("failed to append audit run summary: {error}"))
        })?;

        transaction.commit().await.map_err(|error| {
            AppError::Persistence(format!("failed to commit transaction: {error}"))
        })?;

        AuditRunEntry::try_from(row)
    }

    async fn list_records(&self, query: RecordQuery) -> AppResult<Vec<AuthorizationRecord>> {
        let rows = sqlx::query_as::<_, AuthorizationRecordRow>(
            format!(
                r#"
                SELECT {RECORD_COLUMNS}
                FROM authorization_records
                WHERE ($1::TEXT IS NULL OR person = $1)
                    AND ($2::BOOLEAN IS NULL OR marked_for_deletion = $2)
                ORDER BY id
                LIMIT $3
                OFFSET $4
                "#
            )
            .as_str(),
        )
        .bind(query.person)
        .bind(query.marked_for_deletion)
        .bind(to_db_page(query.limit))
        .bind(to_db_page(query.offset))
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to list authorization records: {error}"))
        })?;

        Ok(rows.into_iter().map(AuthorizationRecord::from).collect())
    }

    async fn find_record(&self, record_id: RecordId) -> AppResult<Option<AuthorizationRecord>> {
        let row = sqlx::query_as::<_, AuthorizationRecordRow>(
            format!("SELECT {RECORD_COLUMNS} FROM authorization_records WHERE id = $1").as_str(),
        )
        .bind(record_id.as_i64())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to find authorization record '{record_id}': {error}"
            ))
        })?;

        Ok(row.map(AuthorizationRecord::from))
    }

    async fn set_deletion_mark(
        &self,
        record_id: RecordId,
        deletion_reason: Option<String>,
    ) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE authorization_records
            SET marked_for_deletion = $2,
                deletion_reason = $3
            WHERE id = $1
            "#,
        )
        .bind(record_id.as_i64())
        .bind(deletion_reason.is_some())
        .bind(deletion_reason)
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to update deletion mark of authorization record '{record_id}': {error}"
            ))
        })?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "authorization record '{record_id}' does not exist"
            )));
        }

        Ok(())
    }

    async fn list_audit_runs(&self, query: AuditRunQuery) -> AppResult<Vec<AuditRunEntry>> {
        let rows = sqlx::query_as::<_, AuditRunRow>(
            r#"
            SELECT id, run_time, total_records, marked_deletions, created_at
            FROM audit_runs
            ORDER BY run_time DESC, created_at DESC
            LIMIT $1
            OFFSET $2
            "#,
        )
        .bind(to_db_page(query.limit))
        .bind(to_db_page(query.offset))
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list audit runs: {error}")))?;

        rows.into_iter().map(AuditRunEntry::try_from).collect()
    }

    async fn find_audit_run(&self, run_id: AuditRunId) -> AppResult<Option<AuditRunEntry>> {
        let row = sqlx::query_as::<_, AuditRunRow>(
            r#"
            SELECT id, run_time, total_records, marked_deletions, created_at
            FROM audit_runs
            WHERE id = $1
            "#,
        )
        .bind(run_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to find audit run '{run_id}': {error}"))
        })?;

        row.map(AuditRunEntry::try_from).transpose()
    }
}
