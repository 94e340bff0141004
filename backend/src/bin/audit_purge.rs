//! Retention purge runner, intended for a scheduled job. Deletes audit events
//! older than the configured retention window; the purge itself is recorded as
//! a bulk_delete event.

use gradekeeper_backend::{
    config::Config,
    db::connection::create_pool,
    services::audit_log::{AuditLogService, AuditLogServiceTrait},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gradekeeper_backend=info".into()),
        )
        .init();

    let config = Config::load()?;
    let pool = create_pool(&config.database_url).await?;

    let service = AuditLogService::new(pool.clone());
    let deleted = service
        .purge_older_than(config.audit_retention_days)
        .await?;
    tracing::info!(
        "Deleted {} audit events older than {} days",
        deleted,
        config.audit_retention_days
    );

    sqlx::query("VACUUM (ANALYZE) audit_events")
        .execute(&pool)
        .await?;

    Ok(())
}
