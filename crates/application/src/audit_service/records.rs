use super::*;

impl AuditService {
    /// Lists authorization records in id order.
    pub async fn list_records(&self, query: RecordQuery) -> AppResult<Vec<AuthorizationRecord>> {
        let person = query
            .person
            .map(|person| person.trim().to_owned())
            .filter(|person| !person.is_empty());

        self.record_store
            .list_records(RecordQuery {
                person,
                marked_for_deletion: query.marked_for_deletion,
                limit: query.limit.clamp(1, MAX_RECORD_PAGE),
                offset: query.offset,
            })
            .await
    }

    /// Returns one authorization record.
    pub async fn find_record(&self, record_id: RecordId) -> AppResult<AuthorizationRecord> {
        self.record_store
            .find_record(record_id)
            .await?
            .ok_or_else(|| not_found(record_id))
    }

    /// Marks a record for deletion by hand, replacing any earlier reason.
    pub async fn mark_record(
        &self,
        record_id: RecordId,
        reason: impl Into<String>,
    ) -> AppResult<AuthorizationRecord> {
        let reason = NonEmptyString::new(reason)?;
        self.set_deletion_mark(record_id, Some(reason.into())).await
    }

    /// Clears the deletion mark and reason of one record.
    pub async fn unmark_record(&self, record_id: RecordId) -> AppResult<AuthorizationRecord> {
        self.set_deletion_mark(record_id, None).await
    }

    async fn set_deletion_mark(
        &self,
        record_id: RecordId,
        deletion_reason: Option<String>,
    ) -> AppResult<AuthorizationRecord> {
        let lease = self.acquire_lease().await?;
        let result = async {
            self.record_store
                .set_deletion_mark(record_id, deletion_reason)
                .await?;
            self.find_record(record_id).await
        }
        .await;

        self.release_after(&lease, result).await
    }
}

fn not_found(record_id: RecordId) -> AppError {
    AppError::NotFound(format!("authorization record '{record_id}' does not exist"))
}
