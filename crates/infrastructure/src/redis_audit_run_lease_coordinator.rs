//! Redis-backed lease coordinator shared by every auditor process.

use async_trait::async_trait;
use bastion_audit_application::{AUDIT_RUN_LEASE_SCOPE, AuditRunLease, AuditRunLeaseCoordinator};
use bastion_audit_core::{AppError, AppResult};
use redis::{AsyncCommands, ExistenceCheck, Script, SetExpiry, SetOptions};

const RELEASE_LEASE_SCRIPT: &str = r#"
if redis.call('GET', KEYS[1]) == ARGV[1] then
  return redis.call('DEL', KEYS[1])
else
  return 0
end
"#;

/// Redis implementation of audit run lease coordination.
#[derive(Clone)]
pub struct RedisAuditRunLeaseCoordinator {
    client: redis::Client,
    key_prefix: String,
}

impl RedisAuditRunLeaseCoordinator {
    /// Creates one coordinator adapter.
    #[must_use]
    pub fn new(client: redis::Client, key_prefix: impl Into<String>) -> Self {
        Self {
            client,
            key_prefix: key_prefix.into(),
        }
    }

    fn key_for(&self, scope_key: &str) -> String {
        format!("{}:{scope_key}", self.key_prefix)
    }

    async fn connection(&self) -> AppResult<redis::aio::MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|error| AppError::Internal(format!("failed to connect to redis: {error}")))
    }
}

#[async_trait]
impl AuditRunLeaseCoordinator for RedisAuditRunLeaseCoordinator {
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

        let key = self.key_for(AUDIT_RUN_LEASE_SCOPE);
        let token = format!("{holder_id}:{}", uuid::Uuid::new_v4());
        let mut connection = self.connection().await?;

        // Key and TTL in one command: the lease always expires.
        let options = SetOptions::default()
            .conditional_set(ExistenceCheck::NX)
            .with_expiration(SetExpiry::EX(u64::from(lease_seconds)));
        let reply: Option<String> = connection
            .set_options(key.as_str(), token.as_str(), options)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to acquire audit run lease: {error}"))
            })?;

        if reply.is_none() {
            return Ok(None);
        }

        Ok(Some(AuditRunLease {
            scope_key: AUDIT_RUN_LEASE_SCOPE.to_owned(),
            token,
            holder_id: holder_id.to_owned(),
        }))
    }

    async fn release_lease(&self, lease: &AuditRunLease) -> AppResult<()> {
        let key = self.key_for(lease.scope_key.as_str());
        let mut connection = self.connection().await?;

        Script::new(RELEASE_LEASE_SCRIPT)
            .key(key)
            .arg(lease.token.as_str())
            .invoke_async::<i32>(&mut connection)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to release audit run lease: {error}"))
            })?;

        Ok(())
    }
}
