//! Target schema bootstrap.
//!
//! Every statement is `CREATE TABLE IF NOT EXISTS`, so running against a
//! half-migrated or fully-migrated target changes nothing. Order matters:
//! the identity tables own the ids everything else references.

use anyhow::{Context, Result};
use sqlx::PgPool;
use tracing::{debug, info};

/// All target tables, in creation (and foreign-key) order.
pub const TARGET_TABLES: &[&str] = &[
    "player_ids",
    "players",
    "map_ids",
    "records",
    "votes",
    "best_sector_records",
    "sector_records",
    "donations",
];

const TABLES: &[(&str, &str)] = &[
    (
        "player_ids",
        "CREATE TABLE IF NOT EXISTS player_ids(
    id INT4 GENERATED ALWAYS AS IDENTITY,
    login VARCHAR(100) NOT NULL UNIQUE,
    PRIMARY KEY(id)
);",
    ),
    (
        "players",
        "CREATE TABLE IF NOT EXISTS players(
    id INT4 NOT NULL,
    nickname VARCHAR(100) NOT NULL,
    region VARCHAR(100) NOT NULL,
    wins INT4 NOT NULL,
    time_played INT4 NOT NULL,
    visits INT4 NOT NULL,
    is_united BOOLEAN NOT NULL,
    last_online TIMESTAMP,
    average REAL,
    PRIMARY KEY(id),
    CONSTRAINT fk_player_id
      FOREIGN KEY(id)
        REFERENCES player_ids(id)
);",
    ),
    (
        "map_ids",
        "CREATE TABLE IF NOT EXISTS map_ids(
    id INT4 GENERATED ALWAYS AS IDENTITY,
    uid VARCHAR(27) NOT NULL UNIQUE,
    PRIMARY KEY(id)
);",
    ),
    (
        "records",
        "CREATE TABLE IF NOT EXISTS records(
    map_id INT4 NOT NULL,
    player_id INT4 NOT NULL,
    time INT4 NOT NULL,
    checkpoints INT4[] NOT NULL,
    date TIMESTAMP NOT NULL,
    PRIMARY KEY(map_id, player_id),
    CONSTRAINT fk_player_id
      FOREIGN KEY(player_id)
        REFERENCES player_ids(id),
    CONSTRAINT fk_map_id
      FOREIGN KEY(map_id)
        REFERENCES map_ids(id)
);",
    ),
    (
        "votes",
        "CREATE TABLE IF NOT EXISTS votes(
    map_id INT4 NOT NULL,
    player_id INT4 NOT NULL,
    vote INT2 NOT NULL,
    date TIMESTAMP NOT NULL,
    PRIMARY KEY(map_id, player_id),
    CONSTRAINT fk_player_id
      FOREIGN KEY(player_id)
        REFERENCES player_ids(id),
    CONSTRAINT fk_map_id
      FOREIGN KEY(map_id)
        REFERENCES map_ids(id)
);",
    ),
    (
        "best_sector_records",
        "CREATE TABLE IF NOT EXISTS best_sector_records(
    map_id INT4 NOT NULL,
    player_id INT4 NOT NULL,
    index INT2 NOT NULL,
    sector INT4 NOT NULL,
    date TIMESTAMP NOT NULL,
    PRIMARY KEY(map_id, index),
    CONSTRAINT fk_player_id
      FOREIGN KEY(player_id)
        REFERENCES player_ids(id),
    CONSTRAINT fk_map_id
      FOREIGN KEY(map_id)
        REFERENCES map_ids(id)
);",
    ),
    (
        "sector_records",
        "CREATE TABLE IF NOT EXISTS sector_records(
    map_id INT4 NOT NULL,
    player_id INT4 NOT NULL,
    sectors INT4[] NOT NULL,
    PRIMARY KEY(map_id, player_id),
    CONSTRAINT fk_player_id
      FOREIGN KEY(player_id)
        REFERENCES player_ids(id),
    CONSTRAINT fk_map_id
      FOREIGN KEY(map_id)
        REFERENCES map_ids(id)
);",
    ),
    (
        "donations",
        "CREATE TABLE IF NOT EXISTS donations(
    player_id INT4 NOT NULL,
    amount INT4 NOT NULL,
    date TIMESTAMP NOT NULL,
    PRIMARY KEY(player_id, date),
    CONSTRAINT fk_player_id
      FOREIGN KEY(player_id)
        REFERENCES player_ids(id)
);",
    ),
];

pub async fn ensure_target_schema(pool: &PgPool) -> Result<()> {
    for (table, ddl) in TABLES {
        sqlx::query(ddl)
            .persistent(false)
            .execute(pool)
            .await
            .with_context(|| format!("{table}: creating table"))?;
        debug!(table, "table ensured");
    }
    info!(tables = TABLES.len(), "target schema ensured");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ddl_list_matches_the_table_roster() {
        let from_ddl: Vec<&str> = TABLES.iter().map(|(name, _)| *name).collect();
        assert_eq!(from_ddl, TARGET_TABLES);
    }

    #[test]
    fn every_statement_is_create_if_not_exists() {
        for (name, ddl) in TABLES {
            assert!(
                ddl.starts_with(&format!("CREATE TABLE IF NOT EXISTS {name}(")),
                "{name} DDL is not idempotent"
            );
        }
    }

    #[test]
    fn identity_tables_precede_their_dependents() {
        let pos = |name: &str| {
            TARGET_TABLES
                .iter()
                .position(|t| *t == name)
                .unwrap_or_else(|| panic!("{name} missing from roster"))
        };
        for dependent in ["players", "records", "votes", "donations"] {
            assert!(pos("player_ids") < pos(dependent));
        }
        for dependent in ["records", "votes", "best_sector_records", "sector_records"] {
            assert!(pos("map_ids") < pos(dependent));
        }
    }
}
