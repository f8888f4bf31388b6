//! Bastion authorization auditor runtime.

#![forbid(unsafe_code)]

mod config;

use std::env;
use std::sync::Arc;
use std::time::Duration;

use bastion_audit_application::{
    AuditRunLeaseCoordinator, AuditRunQuery, AuditRunReport, AuditService, AuditServiceConfig,
    AuditStage,
};
use bastion_audit_core::{AppError, AppResult};
use bastion_audit_infrastructure::{
    InMemoryAuditRunLeaseCoordinator, PostgresRecordStore, PostgresRuleRepository,
    RedisAuditRunLeaseCoordinator,
};
use chrono::Utc;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::{AuditorConfig, Command};

const LEASE_KEY_PREFIX: &str = "bastion_audit:lease";

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let command = Command::parse(env::args().skip(1))?;
    let config = AuditorConfig::load()?;
    let pool = connect_pool(config.database_url.as_str()).await?;
    run_migrations(&pool).await?;

    match command {
        Command::Migrate => {
            info!("migrations applied");
            Ok(())
        }
        Command::History => log_history(&build_audit_service(pool, &config)?).await,
        Command::Run => run_audits(&build_audit_service(pool, &config)?, &config).await,
    }
}

async fn connect_pool(database_url: &str) -> AppResult<PgPool> {
    PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await
        .map_err(|error| AppError::Internal(format!("failed to connect to database: {error}")))
}

async fn run_migrations(pool: &PgPool) -> AppResult<()> {
    sqlx::migrate!("../../crates/infrastructure/migrations")
        .run(pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to run database migrations: {error}")))
}

fn build_audit_service(pool: PgPool, config: &AuditorConfig) -> AppResult<AuditService> {
    let lease_coordinator: Arc<dyn AuditRunLeaseCoordinator> = match &config.redis_url {
        Some(redis_url) => {
            let client = redis::Client::open(redis_url.as_str()).map_err(|error| {
                AppError::Validation(format!("invalid REDIS_URL value: {error}"))
            })?;
            Arc::new(RedisAuditRunLeaseCoordinator::new(client, LEASE_KEY_PREFIX))
        }
        None => Arc::new(InMemoryAuditRunLeaseCoordinator::new()),
    };

    Ok(AuditService::new(
        Arc::new(PostgresRuleRepository::new(pool.clone())),
        Arc::new(PostgresRecordStore::new(pool)),
        lease_coordinator,
        AuditServiceConfig::new(config.holder_id.as_str(), config.lease_seconds)?,
    ))
}

async fn run_audits(service: &AuditService, config: &AuditorConfig) -> AppResult<()> {
    info!(
        holder_id = %config.holder_id,
        lease_seconds = config.lease_seconds,
        run_timeout_seconds = config.run_timeout_seconds,
        interval_seconds = ?config.interval_seconds,
        distributed_lease = config.redis_url.is_some(),
        "bastion-audit-auditor started"
    );

    let Some(interval_seconds) = config.interval_seconds else {
        return run_once(service, config).await.map(|_| ());
    };

    let mut interval = tokio::time::interval(Duration::from_secs(interval_seconds));
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        interval.tick().await;
        match run_once(service, config).await {
            Ok(_) => {}
            Err(AppError::Conflict(message)) => {
                info!(holder_id = %config.holder_id, reason = %message, "audit run skipped");
            }
            Err(error) => {
                warn!(holder_id = %config.holder_id, error = %error, "audit run failed");
            }
        }
    }
}

async fn run_once(service: &AuditService, config: &AuditorConfig) -> AppResult<AuditRunReport> {
    let run_time = config.run_time.unwrap_or_else(Utc::now);
    let report = tokio::time::timeout(
        Duration::from_secs(config.run_timeout_seconds),
        service.run_audit(run_time),
    )
    .await
    .map_err(|_| {
        AppError::Internal(format!(
            "audit run exceeded {} seconds and was abandoned",
            config.run_timeout_seconds
        ))
    })??;

    for diagnostic in &report.diagnostics {
        warn!(
            category = %diagnostic.category,
            rule_key = %diagnostic.rule_key,
            description = diagnostic.description.as_deref().unwrap_or(""),
            error = %diagnostic.message,
            "policy rule skipped"
        );
    }

    info!(
        run_id = %report.run.run_id,
        run_time = %report.run.summary.run_time(),
        total_records = report.run.summary.total_records(),
        marked_deletions = report.run.summary.marked_deletions(),
        "{}",
        report.message()
    );

    for stage in AuditStage::ALL {
        info!(
            run_id = %report.run.run_id,
            stage = stage.as_str(),
            marked = report.stage_counts.get(stage),
            "audit stage result"
        );
    }

    Ok(report)
}

async fn log_history(service: &AuditService) -> AppResult<()> {
    let runs = service.list_audit_runs(AuditRunQuery::default()).await?;
    if runs.is_empty() {
        info!("no audit runs recorded");
    }

    for run in runs {
        info!(
            run_id = %run.run_id,
            run_time = %run.summary.run_time(),
            total_records = run.summary.total_records(),
            marked_deletions = run.summary.marked_deletions(),
            created_at = %run.created_at,
            "audit run"
        );
    }

    Ok(())
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}
