use std::str::FromStr;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::{FromRow, PgPool};

use bastion_audit_application::RuleRepository;
use bastion_audit_core::{AppError, AppResult};
use bastion_audit_domain::{PolicyRule, RuleCategory};

/// PostgreSQL-backed policy rule repository.
#[derive(Clone)]
pub struct PostgresRuleRepository {
    pool: PgPool,
}

impl PostgresRuleRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct PolicyRuleRow {
    category: String,
    rule_key: String,
    payload: Value,
    description: Option<String>,
}

#[async_trait]
impl RuleRepository for PostgresRuleRepository {
    async fn list_rules(&self) -> AppResult<Vec<PolicyRule>> {
        let rows = sqlx::query_as::<_, PolicyRuleRow>(
            r#"
            SELECT category, rule_key, payload, description
            FROM policy_rules
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list policy rules: {error}")))?;

        let mut rules = Vec::with_capacity(rows.len());
        for row in rows {
            let Ok(category) = RuleCategory::from_str(row.category.as_str()) else {
                tracing::warn!(
                    category = %row.category,
                    rule_key = %row.rule_key,
                    "skipping policy rule with unknown category"
                );
                continue;
            };

            match PolicyRule::new(category, row.rule_key, row.payload, row.description) {
                Ok(rule) => rules.push(rule),
                Err(error) => {
                    tracing::warn!(%category, error = %error, "skipping invalid policy rule");
                }
            }
        }

        Ok(rules)
    }
}

#[cfg(test)]
mod tests {
    use bastion_audit_application::{PolicyContext, RuleRepository};
    use bastion_audit_domain::RuleCategory;
    use sqlx::PgPool;
    use sqlx::migrate::Migrator;
    use sqlx::postgres::PgPoolOptions;

    use super::PostgresRuleRepository;

    static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

    async fn test_pool() -> Option<PgPool> {
        let Ok(database_url) = std::env::var("DATABASE_URL") else {
            return None;
        };

        let pool = match PgPoolOptions::new()
            .max_connections(2)
            .connect(database_url.as_str())
            .await
        {
            Ok(pool) => pool,
            Err(error) => panic!("failed to connect to DATABASE_URL in test: {error}"),
        };

        if let Err(error) = MIGRATOR.run(&pool).await {
            panic!("failed to run migrations for postgres rule tests: {error}");
        }

        Some(pool)
    }

    #[tokio::test]
    async fn seeded_rules_resolve_into_policy_context() {
        let Some(pool) = test_pool().await else {
            return;
        };

        let repository = PostgresRuleRepository::new(pool);
        let rules = repository.list_rules().await;
        assert!(rules.is_ok());
        let rules = rules.unwrap_or_default();

        assert!(
            rules
                .iter()
                .any(|rule| rule.category() == RuleCategory::LongAccessThreshold)
        );

        let resolution = PolicyContext::from_rules(&rules);
        assert!(resolution.context.is_production_host("web-outpub-02"));
        assert!(
            resolution
                .context
                .master_database_ips()
                .contains("192.168.240.181")
        );
    }
}
