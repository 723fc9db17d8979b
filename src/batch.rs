//! Parameter-bounded, conflict-tolerant multi-row inserts.
use anyhow::{Context, Result};
use sqlx::{query_builder::Separated, PgPool, Postgres, QueryBuilder};
use tracing::debug;

/// PostgreSQL caps one statement at 65535 bind parameters (the extended
/// protocol indexes them with a u16).
pub const PARAM_CEILING: usize = 65_535;

/// Rows per statement by convention; far below the ceiling for the narrow
/// tables this tool writes.
pub const DEFAULT_CHUNK_ROWS: usize = 1_000;

/// One row's bind values, pushed in the builder's declared column order.
///
/// Implementations must push owned (or Copy) values; the builder outlives
/// the borrow of `self`.
pub trait BindRow {
    fn push(&self, b: &mut Separated<'_, '_, Postgres, &'static str>);
}

/// Chunked `INSERT ... ON CONFLICT ... DO NOTHING` builder for one target
/// table.
///
/// The chunk size is derived from the column count so a statement never
/// exceeds [`PARAM_CEILING`] bind parameters; wide tables get smaller
/// chunks automatically. Statements execute sequentially, first chunk
/// first, and rows already present in the target are skipped silently, so
/// re-running the same input is a no-op.
pub struct BatchInsert {
    table: &'static str,
    columns: &'static [&'static str],
    conflict_target: &'static [&'static str],
    chunk_rows: usize,
}

impl BatchInsert {
    pub fn new(
        table: &'static str,
        columns: &'static [&'static str],
        conflict_target: &'static [&'static str],
    ) -> Self {
        Self::with_chunk_rows(table, columns, conflict_target, DEFAULT_CHUNK_ROWS)
    }

    /// Like [`BatchInsert::new`] but with a caller-chosen chunk size, still
    /// clamped to what the parameter ceiling allows for this column count.
    pub fn with_chunk_rows(
        table: &'static str,
        columns: &'static [&'static str],
        conflict_target: &'static [&'static str],
        requested: usize,
    ) -> Self {
        let per_row = columns.len().max(1);
        let ceiling_rows = (PARAM_CEILING / per_row).max(1);
        Self {
            table,
            columns,
            conflict_target,
            chunk_rows: requested.clamp(1, ceiling_rows),
        }
    }

    pub fn chunk_rows(&self) -> usize {
        self.chunk_rows
    }

    /// Number of statements [`BatchInsert::execute`] will issue for `rows`
    /// input rows. Zero rows means zero statements.
    pub fn chunk_count(&self, rows: usize) -> usize {
        rows.div_ceil(self.chunk_rows)
    }

    fn build_chunk<R: BindRow>(&self, chunk: &[R]) -> QueryBuilder<'static, Postgres> {
        let mut qb: QueryBuilder<'static, Postgres> = QueryBuilder::new(format!(
            "INSERT INTO {} ({}) ",
            self.table,
            self.columns.join(", ")
        ));
        qb.push_values(chunk.iter(), |mut b, row| row.push(&mut b));
        if !self.conflict_target.is_empty() {
            qb.push(" ON CONFLICT (");
            qb.push(self.conflict_target.join(", "));
            qb.push(") DO NOTHING");
        }
        qb
    }

    /// Insert all rows, chunk by chunk, awaiting each statement before the
    /// next. Returns the number of rows the target actually accepted
    /// (conflicts skip silently). Any statement failure aborts with the
    /// table name and chunk index in the error context.
    pub async fn execute<R: BindRow>(&self, pool: &PgPool, rows: &[R]) -> Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }
        let mut inserted = 0u64;
        for (chunk_index, chunk) in rows.chunks(self.chunk_rows).enumerate() {
            let mut qb = self.build_chunk(chunk);
            let done = qb
                .build()
                .persistent(false)
                .execute(pool)
                .await
                .with_context(|| format!("{}: chunk {} failed", self.table, chunk_index))?;
            inserted += done.rows_affected();
            debug!(
                table = self.table,
                chunk = chunk_index,
                rows = chunk.len(),
                "chunk flushed"
            );
        }
        Ok(inserted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct PairRow(i32, i32);

    impl BindRow for PairRow {
        fn push(&self, b: &mut Separated<'_, '_, Postgres, &'static str>) {
            b.push_bind(self.0).push_bind(self.1);
        }
    }

    const FIVE_COLS: &[&str] = &["a", "b", "c", "d", "e"];

    #[test]
    fn default_chunking_splits_2500_rows_into_three() {
        let batch = BatchInsert::new("records", FIVE_COLS, &["a", "b"]);
        assert_eq!(batch.chunk_rows(), 1000);
        assert_eq!(batch.chunk_count(2500), 3);

        let rows = vec![(); 2500];
        let sizes: Vec<usize> = rows.chunks(batch.chunk_rows()).map(|c| c.len()).collect();
        assert_eq!(sizes, vec![1000, 1000, 500]);
        assert!(batch.chunk_rows() * FIVE_COLS.len() < PARAM_CEILING);
    }

    #[test]
    fn wide_tables_shrink_the_chunk() {
        const WIDE: &[&str] = &["c"; 80];
        let batch = BatchInsert::new("wide", WIDE, &["c"]);
        assert!(batch.chunk_rows() < DEFAULT_CHUNK_ROWS);
        assert!(batch.chunk_rows() * WIDE.len() <= PARAM_CEILING);
        // One more row per chunk would cross the ceiling.
        assert!((batch.chunk_rows() + 1) * WIDE.len() > PARAM_CEILING);
    }

    #[test]
    fn requested_chunk_size_is_clamped() {
        let batch = BatchInsert::with_chunk_rows("t", FIVE_COLS, &["a"], 1_000_000);
        assert!(batch.chunk_rows() * FIVE_COLS.len() <= PARAM_CEILING);

        let min = BatchInsert::with_chunk_rows("t", FIVE_COLS, &["a"], 0);
        assert_eq!(min.chunk_rows(), 1);
    }

    #[test]
    fn empty_input_builds_no_statements() {
        let batch = BatchInsert::new("t", FIVE_COLS, &["a"]);
        assert_eq!(batch.chunk_count(0), 0);
    }

    #[test]
    fn statement_carries_conflict_clause_and_placeholders() {
        let batch = BatchInsert::new("votes", &["map_id", "player_id"], &["map_id", "player_id"]);
        let rows = vec![PairRow(1, 10), PairRow(2, 20)];
        let qb = batch.build_chunk(&rows);
        let sql = qb.sql();
        assert!(sql.starts_with("INSERT INTO votes (map_id, player_id) VALUES"));
        assert!(sql.ends_with("ON CONFLICT (map_id, player_id) DO NOTHING"));
        assert_eq!(sql.matches('$').count(), rows.len() * 2);
    }
}
