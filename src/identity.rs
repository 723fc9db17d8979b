//! Natural-key to surrogate-id resolution for the identity tables.
//!
//! `player_ids` and `map_ids` own the surrogate keys every other target
//! table references. Registration inserts unseen keys and leaves existing
//! rows untouched, so the ids handed out by a previous run survive a
//! re-run. Resolution is an in-memory map lookup; a miss means the source
//! row referenced a login or map uid absent from the listing tables, and
//! the caller drops that row.

use std::collections::HashMap;

use anyhow::{Context, Result};
use sqlx::{query_builder::Separated, PgPool, Postgres, Row};

use crate::batch::{BatchInsert, BindRow};

impl BindRow for String {
    fn push(&self, b: &mut Separated<'_, '_, Postgres, &'static str>) {
        b.push_bind(self.clone());
    }
}

pub struct IdentityResolver {
    table: &'static str,
    key_columns: &'static [&'static str],
    index: HashMap<String, i32>,
}

impl IdentityResolver {
    pub fn players() -> Self {
        Self::new("player_ids", &["login"])
    }

    pub fn maps() -> Self {
        Self::new("map_ids", &["uid"])
    }

    fn new(table: &'static str, key_columns: &'static [&'static str]) -> Self {
        Self {
            table,
            key_columns,
            index: HashMap::new(),
        }
    }

    #[cfg(test)]
    pub(crate) fn with_index<I>(table: &'static str, pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'static str, i32)>,
    {
        let mut resolver = Self::new(table, &["key"]);
        resolver.index = pairs
            .into_iter()
            .map(|(key, id)| (key.to_owned(), id))
            .collect();
        resolver
    }

    /// Insert every key the table does not know yet. Keys already present
    /// (from this run or a previous one) are skipped by the target, so
    /// duplicates are harmless. Returns the number of rows actually added.
    pub async fn register(
        &self,
        pool: &PgPool,
        keys: &[String],
        chunk_rows: usize,
    ) -> Result<u64> {
        let batch =
            BatchInsert::with_chunk_rows(self.table, self.key_columns, self.key_columns, chunk_rows);
        batch.execute(pool, keys).await
    }

    /// Read the full id index back from the target. Must run after
    /// [`IdentityResolver::register`] and before any [`IdentityResolver::resolve`]
    /// call, so ids assigned by earlier runs are part of the index too.
    pub async fn reload(&mut self, pool: &PgPool) -> Result<usize> {
        let sql = format!("SELECT id, {} FROM {}", self.key_columns[0], self.table);
        let rows = sqlx::query(&sql)
            .persistent(false)
            .fetch_all(pool)
            .await
            .with_context(|| format!("{}: loading id index", self.table))?;
        let mut index = HashMap::with_capacity(rows.len());
        for row in rows {
            let id: i32 = row.try_get("id")?;
            let key: String = row.try_get(self.key_columns[0])?;
            index.insert(key, id);
        }
        self.index = index;
        Ok(self.index.len())
    }

    pub fn resolve(&self, key: &str) -> Option<i32> {
        self.index.get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}
