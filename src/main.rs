use anyhow::Result;
use records_migrate::migration::{MigrationContext, StepFlags};
use records_migrate::schema::ensure_target_schema;
use records_migrate::util::db;
use records_migrate::util::env as env_util;
use records_migrate::util::tracing_setup::init_tracing;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing("info")?;
    env_util::bootstrap_cli("records-migrate");
    env_util::preflight_check(
        "records-migrate",
        &[],
        &[
            "LEGACY_DATABASE_URL",
            "MYSQL_HOST",
            "MYSQL_DATABASE",
            "TARGET_DATABASE_URL",
            "DATABASE_URL",
            "POSTGRES_HOST",
            "POSTGRES_DATABASE",
            "MIGRATE_ALL",
            "MIGRATE_CHUNK_ROWS",
            "DB_MAX_CONNS",
        ],
    )?;

    let flags = StepFlags::from_env();
    info!(?flags, "step switches");

    let source = db::connect_legacy().await?;
    let target = db::connect_target().await?;
    ensure_target_schema(&target).await?;

    let mut ctx = MigrationContext::new(source, target, flags);
    let outcome = ctx.run().await;
    ctx.emit_stage_summary();
    outcome?;

    for (step, stats) in ctx.stats.enumerate() {
        info!(
            step,
            inserted = stats.inserted,
            dropped = stats.dropped_unresolved + stats.dropped_anomalies,
            "final step counts"
        );
    }
    info!(
        total_inserted = ctx.stats.total_inserted(),
        total_dropped = ctx.stats.total_dropped(),
        "migration complete; check the target for errors"
    );
    Ok(())
}
