use std::time::{Duration, Instant};

use async_trait::async_trait;
use bastion_audit_application::{AUDIT_RUN_LEASE_SCOPE, AuditRunLease, AuditRunLeaseCoordinator};
use bastion_audit_core::{AppError, AppResult};
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Debug, Clone)]
struct HeldLease {
    token: String,
    expires_at: Instant,
}

/// Process-local lease coordinator for single-process deployments and tests.
#[derive(Debug, Default)]
pub struct InMemoryAuditRunLeaseCoordinator {
    held: Mutex<Option<HeldLease>>,
}

impl InMemoryAuditRunLeaseCoordinator {
    /// Creates a coordinator with no lease held.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AuditRunLeaseCoordinator for InMemoryAuditRunLeaseCoordinator {
    async fn try_acquire_lease(
        &self,
        holder_id: &str,
        lease_seconds: u32,
    ) -> AppResult<Option<AuditRunLease>> {
        if holder_id.trim().is_empty() {
            return Err(AppError::Validation(
                "audit run lease holder_id must not be empty".to_owned(),
            ));
        }

        if lease_seconds == 0 {
            return Err(AppError::Validation(
                "audit run lease_seconds must be greater than zero".to_owned(),
            ));
        }

        let now = Instant::now();
        let mut held = self.held.lock().await;
        if held.as_ref().is_some_and(|lease| lease.expires_at > now) {
            return Ok(None);
        }

        let token = format!("{holder_id}:{}", Uuid::new_v4());
        let expires_at = now
            .checked_add(Duration::from_secs(u64::from(lease_seconds)))
            .unwrap_or(now);
        *held = Some(HeldLease {
            token: token.clone(),
            expires_at,
        });

        Ok(Some(AuditRunLease {
            scope_key: AUDIT_RUN_LEASE_SCOPE.to_owned(),
            token,
            holder_id: holder_id.to_owned(),
        }))
    }

    async fn release_lease(&self, lease: &AuditRunLease) -> AppResult<()> {
        let mut held = self.held.lock().await;
        if held
            .as_ref()
            .is_some_and(|current| current.token == lease.token)
        {
            *held = None;
        }

        Ok(())
    }
}
