//! Typed reads from the legacy MySQL store.
//!
//! The legacy schema predates sane defaults: dates can be the MySQL
//! zero-date (guarded with NULLIF so they decode as NULL), integer
//! columns are a mix of signed and unsigned widths (read uniformly via
//! CAST AS SIGNED), and nicknames were written with a mismatched
//! connection charset, repaired here with the classic
//! latin1-to-binary-to-utf8 round trip. Every nullable-or-suspect column
//! decodes as an Option and is coerced or dropped downstream.

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use sqlx::MySqlPool;

#[derive(Debug, sqlx::FromRow)]
pub struct PlayerRow {
    pub login: String,
    pub nickname: Option<String>,
    pub nation: Option<String>,
    pub wins: Option<i64>,
    pub time_played: Option<i64>,
    pub updated_at: Option<NaiveDateTime>,
    pub visits: Option<i64>,
}

#[derive(Debug, sqlx::FromRow)]
pub struct RecordRow {
    pub uid: String,
    pub login: String,
    pub score: Option<i64>,
    pub date: Option<NaiveDateTime>,
    pub checkpoints: Option<String>,
}

#[derive(Debug, sqlx::FromRow)]
pub struct VoteRow {
    pub uid: String,
    pub login: String,
    pub score: Option<i64>,
}

/// One row of either sector table. `login` carries the raw PlayerNick
/// value, which in these tables actually holds the login, qualifier
/// suffix and all.
#[derive(Debug, sqlx::FromRow)]
pub struct SectorSourceRow {
    pub uid: String,
    pub login: Option<String>,
    pub index: Option<i64>,
    pub time: Option<i64>,
}

#[derive(Debug, sqlx::FromRow)]
pub struct DonationRow {
    pub login: String,
    pub amount: Option<i64>,
    pub updated_at: Option<NaiveDateTime>,
}

pub async fn fetch_map_uids(pool: &MySqlPool) -> Result<Vec<String>> {
    sqlx::query_scalar("SELECT Uid AS uid FROM challenges")
        .fetch_all(pool)
        .await
        .context("challenges: source fetch failed")
}

pub async fn fetch_player_logins(pool: &MySqlPool) -> Result<Vec<String>> {
    sqlx::query_scalar("SELECT Login AS login FROM players")
        .fetch_all(pool)
        .await
        .context("players: login fetch failed")
}

pub async fn fetch_players(pool: &MySqlPool) -> Result<Vec<PlayerRow>> {
    sqlx::query_as(
        "SELECT p.Login AS login,
                CONVERT(CAST(CONVERT(p.NickName USING LATIN1) AS BINARY) USING UTF8) AS nickname,
                p.Nation AS nation,
                CAST(p.Wins AS SIGNED) AS wins,
                CAST(p.TimePlayed AS SIGNED) AS time_played,
                NULLIF(p.UpdatedAt, '0000-00-00 00:00:00') AS updated_at,
                CAST(x.visits AS SIGNED) AS visits
         FROM players p
         LEFT JOIN players_extra x ON x.playerID = p.Id",
    )
    .fetch_all(pool)
    .await
    .context("players: source fetch failed")
}

pub async fn fetch_records(pool: &MySqlPool) -> Result<Vec<RecordRow>> {
    sqlx::query_as(
        "SELECT challenges.Uid AS uid,
                players.Login AS login,
                CAST(records.Score AS SIGNED) AS score,
                NULLIF(records.Date, '0000-00-00 00:00:00') AS date,
                records.Checkpoints AS checkpoints
         FROM records
         INNER JOIN challenges ON challenges.Id = records.ChallengeId
         INNER JOIN players ON players.Id = records.PlayerId",
    )
    .fetch_all(pool)
    .await
    .context("records: source fetch failed")
}

pub async fn fetch_votes(pool: &MySqlPool) -> Result<Vec<VoteRow>> {
    sqlx::query_as(
        "SELECT challenges.Uid AS uid,
                players.Login AS login,
                CAST(rs_karma.Score AS SIGNED) AS score
         FROM rs_karma
         INNER JOIN challenges ON challenges.Id = rs_karma.ChallengeId
         INNER JOIN players ON players.Id = rs_karma.PlayerId",
    )
    .fetch_all(pool)
    .await
    .context("rs_karma: source fetch failed")
}

pub async fn fetch_best_sectors(pool: &MySqlPool) -> Result<Vec<SectorSourceRow>> {
    fetch_sector_table(pool, "secrecs_all").await
}

pub async fn fetch_player_sectors(pool: &MySqlPool) -> Result<Vec<SectorSourceRow>> {
    fetch_sector_table(pool, "secrecs_own").await
}

async fn fetch_sector_table(pool: &MySqlPool, table: &str) -> Result<Vec<SectorSourceRow>> {
    let sql = format!(
        "SELECT ChallengeID AS uid,
                PlayerNick AS login,
                CAST(Sector AS SIGNED) AS `index`,
                CAST(Time AS SIGNED) AS time
         FROM {table}"
    );
    sqlx::query_as(&sql)
        .fetch_all(pool)
        .await
        .with_context(|| format!("{table}: source fetch failed"))
}

pub async fn fetch_donations(pool: &MySqlPool) -> Result<Vec<DonationRow>> {
    sqlx::query_as(
        "SELECT p.Login AS login,
                CAST(x.donations AS SIGNED) AS amount,
                NULLIF(p.UpdatedAt, '0000-00-00 00:00:00') AS updated_at
         FROM players_extra x
         INNER JOIN players p ON p.Id = x.playerID
         WHERE x.donations > 0",
    )
    .fetch_all(pool)
    .await
    .context("players_extra: source fetch failed")
}
