//! One-off repair for records whose checkpoint array still carries the
//! finish time as a trailing entry. Scans every stored record, trims the
//! tail where it equals the total time, and rewrites only the rows that
//! actually changed.

use anyhow::{Context, Result};
use records_migrate::normalization::checkpoints::trim_finish;
use records_migrate::util::db::connect_target;
use records_migrate::util::env as env_util;
use records_migrate::util::progress::Progress;
use records_migrate::util::tracing_setup::init_tracing;
use tracing::info;

#[derive(sqlx::FromRow)]
struct StoredRecord {
    map_id: i32,
    player_id: i32,
    time: i32,
    checkpoints: Vec<i32>,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing("info")?;
    env_util::bootstrap_cli("fix_checkpoints");

    let pool = connect_target().await?;

    let rows: Vec<StoredRecord> =
        sqlx::query_as("SELECT map_id, player_id, time, checkpoints FROM records")
            .persistent(false)
            .fetch_all(&pool)
            .await
            .context("records: fetch for checkpoint repair failed")?;
    info!(rows = rows.len(), "scanning records for trailing finish entries");

    let mut progress = Progress::new("repair records", Some(rows.len()));
    let mut repaired = 0u64;
    for row in rows {
        let mut checkpoints = row.checkpoints;
        let before = checkpoints.len();
        trim_finish(&mut checkpoints, row.time);
        if checkpoints.len() != before {
            sqlx::query("UPDATE records SET checkpoints = $1 WHERE map_id = $2 AND player_id = $3")
                .bind(&checkpoints)
                .bind(row.map_id)
                .bind(row.player_id)
                .persistent(false)
                .execute(&pool)
                .await
                .with_context(|| {
                    format!(
                        "records: checkpoint rewrite for map {} player {} failed",
                        row.map_id, row.player_id
                    )
                })?;
            repaired += 1;
        }
        progress.tick(1);
    }
    progress.finish();

    info!(
        scanned = progress.processed(),
        repaired, "checkpoint repair complete"
    );
    Ok(())
}
