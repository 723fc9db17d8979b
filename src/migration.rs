//! Migration orchestration.
//!
//! One context drives every step in dependency order: the identity tables
//! are registered and indexed first, then each enabled table step fetches
//! its source rows, transforms and resolves them in memory, and hands the
//! result to the chunked batch writer. A step failure on the target side
//! aborts the run; rows that merely fail to resolve or carry junk values
//! are dropped and counted, never fatal.

use std::cmp::Reverse;
use std::time::{Duration, Instant};

use anyhow::Result;
use chrono::{NaiveDateTime, Utc};
use futures::future::BoxFuture;
use sqlx::{query_builder::Separated, MySqlPool, PgPool, Postgres};
use tracing::{info, warn};

use crate::batch::{BatchInsert, BindRow, DEFAULT_CHUNK_ROWS};
use crate::identity::IdentityResolver;
use crate::legacy::{self, DonationRow, PlayerRow, RecordRow, SectorSourceRow, VoteRow};
use crate::normalization::checkpoints::{parse_checkpoints, trim_finish};
use crate::normalization::login::canonical_login;
use crate::normalization::nation::NationIndex;
use crate::normalization::vote::normalize_vote;
use crate::sectors::{self, SectorGroup, SectorRow};
use crate::util::env::{env_flag, env_parse};
use crate::util::progress::Progress;

const PLAYER_COLUMNS: &[&str] = &[
    "id",
    "nickname",
    "region",
    "wins",
    "time_played",
    "visits",
    "is_united",
    "last_online",
];
const RECORD_COLUMNS: &[&str] = &["map_id", "player_id", "time", "checkpoints", "date"];
const VOTE_COLUMNS: &[&str] = &["map_id", "player_id", "vote", "date"];
const BEST_SECTOR_COLUMNS: &[&str] = &["map_id", "player_id", "index", "sector", "date"];
const SECTOR_COLUMNS: &[&str] = &["map_id", "player_id", "sectors"];
const DONATION_COLUMNS: &[&str] = &["player_id", "amount", "date"];

/// Per-step switches, read once at startup. A disabled step is skipped
/// whole; there are no partial runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct StepFlags {
    pub players: bool,
    pub records: bool,
    pub votes: bool,
    pub best_sectors: bool,
    pub sector_records: bool,
    pub donations: bool,
}

impl StepFlags {
    /// MIGRATE_ALL turns everything on; otherwise each step has its own
    /// MIGRATE_* flag. Absence means off.
    pub fn from_env() -> Self {
        let all = env_flag("MIGRATE_ALL", false);
        Self {
            players: all || env_flag("MIGRATE_PLAYERS", false),
            records: all || env_flag("MIGRATE_RECORDS", false),
            votes: all || env_flag("MIGRATE_VOTES", false),
            best_sectors: all || env_flag("MIGRATE_BEST_SECTORS", false),
            sector_records: all || env_flag("MIGRATE_SECTORS", false),
            donations: all || env_flag("MIGRATE_DONATIONS", false),
        }
    }

    pub fn any_enabled(&self) -> bool {
        self.players
            || self.records
            || self.votes
            || self.best_sectors
            || self.sector_records
            || self.donations
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct StepStats {
    pub fetched: u64,
    pub inserted: u64,
    pub dropped_unresolved: u64,
    pub dropped_anomalies: u64,
    pub coerced_defaults: u64,
}

impl StepStats {
    fn log(&self, step: &'static str) {
        info!(
            target: "metrics",
            step,
            fetched = self.fetched,
            inserted = self.inserted,
            dropped_unresolved = self.dropped_unresolved,
            dropped_anomalies = self.dropped_anomalies,
            coerced_defaults = self.coerced_defaults,
            "step stats"
        );
        if self.dropped_unresolved + self.dropped_anomalies > 0 {
            warn!(
                step,
                dropped_unresolved = self.dropped_unresolved,
                dropped_anomalies = self.dropped_anomalies,
                "rows dropped during step"
            );
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct MigrationStats {
    pub players: StepStats,
    pub records: StepStats,
    pub votes: StepStats,
    pub best_sectors: StepStats,
    pub sector_records: StepStats,
    pub donations: StepStats,
}

impl MigrationStats {
    pub fn enumerate(&self) -> [(&'static str, &StepStats); 6] {
        [
            ("players", &self.players),
            ("records", &self.records),
            ("votes", &self.votes),
            ("best_sector_records", &self.best_sectors),
            ("sector_records", &self.sector_records),
            ("donations", &self.donations),
        ]
    }

    pub fn total_inserted(&self) -> u64 {
        self.enumerate().iter().map(|(_, s)| s.inserted).sum()
    }

    pub fn total_dropped(&self) -> u64 {
        self.enumerate()
            .iter()
            .map(|(_, s)| s.dropped_unresolved + s.dropped_anomalies)
            .sum()
    }
}

#[derive(Debug, Clone)]
struct StageTiming {
    name: String,
    elapsed: Duration,
    success: bool,
}

impl StageTiming {
    fn elapsed_ms(&self) -> f64 {
        self.elapsed.as_secs_f64() * 1000.0
    }
}

pub struct MigrationContext {
    source: MySqlPool,
    target: PgPool,
    flags: StepFlags,
    chunk_rows: usize,
    run_stamp: NaiveDateTime,
    players: IdentityResolver,
    maps: IdentityResolver,
    nations: NationIndex,
    stage_timings: Vec<StageTiming>,
    pub stats: MigrationStats,
}

impl MigrationContext {
    pub fn new(source: MySqlPool, target: PgPool, flags: StepFlags) -> Self {
        Self {
            source,
            target,
            flags,
            chunk_rows: env_parse("MIGRATE_CHUNK_ROWS", DEFAULT_CHUNK_ROWS),
            run_stamp: Utc::now().naive_utc(),
            players: IdentityResolver::players(),
            maps: IdentityResolver::maps(),
            nations: NationIndex::with_defaults(),
            stage_timings: Vec::new(),
            stats: MigrationStats::default(),
        }
    }

    async fn profile_stage<T, F>(&mut self, name: &'static str, func: F) -> Result<T>
    where
        F: for<'ctx> FnOnce(&'ctx mut MigrationContext) -> BoxFuture<'ctx, Result<T>>,
    {
        let start = Instant::now();
        let result = func(self).await;
        let elapsed = start.elapsed();
        let success = result.is_ok();
        info!(
            target: "metrics",
            stage = name,
            took_ms = format!("{:.2}", elapsed.as_secs_f64() * 1000.0),
            success,
            "stage timing"
        );
        self.stage_timings.push(StageTiming {
            name: name.to_string(),
            elapsed,
            success,
        });
        result
    }

    pub fn emit_stage_summary(&self) {
        if self.stage_timings.is_empty() {
            return;
        }
        let mut timings = self.stage_timings.clone();
        timings.sort_by_key(|t| Reverse(t.elapsed));
        let total = timings
            .iter()
            .fold(Duration::ZERO, |acc, timing| acc + timing.elapsed);
        info!(
            target: "metrics",
            stages = timings.len(),
            total_ms = format!("{:.2}", total.as_secs_f64() * 1000.0),
            "migration stage timing summary"
        );
        for timing in timings {
            let pct = if total.as_nanos() == 0 {
                0.0
            } else {
                (timing.elapsed.as_secs_f64() / total.as_secs_f64()) * 100.0
            };
            info!(
                target: "metrics",
                stage = %timing.name,
                took_ms = format!("{:.2}", timing.elapsed_ms()),
                pct = format!("{:.1}", pct),
                success = timing.success,
                "stage timing detail"
            );
        }
    }

    /// Drive every enabled step in dependency order. Identity registration
    /// always runs first so each later step resolves against a complete
    /// index that includes ids assigned by earlier runs.
    pub async fn run(&mut self) -> Result<()> {
        if !self.flags.any_enabled() {
            warn!("no migration step enabled; set MIGRATE_ALL=1 or per-step MIGRATE_* flags");
            return Ok(());
        }

        self.profile_stage("identity", |ctx| Box::pin(ctx.register_identities()))
            .await?;

        if self.flags.players {
            self.stats.players = self
                .profile_stage("players", |ctx| Box::pin(ctx.migrate_players()))
                .await?;
        } else {
            info!(stage = "players", "stage disabled, skipping");
        }

        if self.flags.records {
            self.stats.records = self
                .profile_stage("records", |ctx| Box::pin(ctx.migrate_records()))
                .await?;
        } else {
            info!(stage = "records", "stage disabled, skipping");
        }

        if self.flags.votes {
            self.stats.votes = self
                .profile_stage("votes", |ctx| Box::pin(ctx.migrate_votes()))
                .await?;
        } else {
            info!(stage = "votes", "stage disabled, skipping");
        }

        if self.flags.best_sectors {
            self.stats.best_sectors = self
                .profile_stage("best_sector_records", |ctx| {
                    Box::pin(ctx.migrate_best_sectors())
                })
                .await?;
        } else {
            info!(stage = "best_sector_records", "stage disabled, skipping");
        }

        if self.flags.sector_records {
            self.stats.sector_records = self
                .profile_stage("sector_records", |ctx| Box::pin(ctx.migrate_sector_records()))
                .await?;
        } else {
            info!(stage = "sector_records", "stage disabled, skipping");
        }

        if self.flags.donations {
            self.stats.donations = self
                .profile_stage("donations", |ctx| Box::pin(ctx.migrate_donations()))
                .await?;
        } else {
            info!(stage = "donations", "stage disabled, skipping");
        }

        Ok(())
    }

    async fn register_identities(&mut self) -> Result<()> {
        let uids = legacy::fetch_map_uids(&self.source).await?;
        let logins: Vec<String> = legacy::fetch_player_logins(&self.source)
            .await?
            .into_iter()
            .map(|raw| canonical_login(&raw).to_owned())
            .collect();
        let new_maps = self.maps.register(&self.target, &uids, self.chunk_rows).await?;
        let new_players = self
            .players
            .register(&self.target, &logins, self.chunk_rows)
            .await?;
        let total_maps = self.maps.reload(&self.target).await?;
        let total_players = self.players.reload(&self.target).await?;
        info!(
            new_maps,
            new_players, total_maps, total_players, "identity tables registered and indexed"
        );
        Ok(())
    }

    async fn migrate_players(&mut self) -> Result<StepStats> {
        let rows = legacy::fetch_players(&self.source).await?;
        let mut stats = StepStats {
            fetched: rows.len() as u64,
            ..Default::default()
        };
        let mut prog = Progress::new("players", Some(rows.len()));
        let out = prepare_players(rows, &self.players, &self.nations, &mut stats, &mut prog);
        prog.finish();
        let batch = BatchInsert::with_chunk_rows("players", PLAYER_COLUMNS, &["id"], self.chunk_rows);
        stats.inserted = batch.execute(&self.target, &out).await?;
        stats.log("players");
        Ok(stats)
    }

    async fn migrate_records(&mut self) -> Result<StepStats> {
        let rows = legacy::fetch_records(&self.source).await?;
        let mut stats = StepStats {
            fetched: rows.len() as u64,
            ..Default::default()
        };
        let mut prog = Progress::new("records", Some(rows.len()));
        let out = prepare_records(
            rows,
            &self.maps,
            &self.players,
            self.run_stamp,
            &mut stats,
            &mut prog,
        );
        prog.finish();
        let batch = BatchInsert::with_chunk_rows(
            "records",
            RECORD_COLUMNS,
            &["map_id", "player_id"],
            self.chunk_rows,
        );
        stats.inserted = batch.execute(&self.target, &out).await?;
        stats.log("records");
        Ok(stats)
    }

    async fn migrate_votes(&mut self) -> Result<StepStats> {
        let rows = legacy::fetch_votes(&self.source).await?;
        let mut stats = StepStats {
            fetched: rows.len() as u64,
            ..Default::default()
        };
        let mut prog = Progress::new("votes", Some(rows.len()));
        let out = prepare_votes(
            rows,
            &self.maps,
            &self.players,
            self.run_stamp,
            &mut stats,
            &mut prog,
        );
        prog.finish();
        let batch = BatchInsert::with_chunk_rows(
            "votes",
            VOTE_COLUMNS,
            &["map_id", "player_id"],
            self.chunk_rows,
        );
        stats.inserted = batch.execute(&self.target, &out).await?;
        stats.log("votes");
        Ok(stats)
    }

    async fn migrate_best_sectors(&mut self) -> Result<StepStats> {
        let rows = legacy::fetch_best_sectors(&self.source).await?;
        let mut stats = StepStats {
            fetched: rows.len() as u64,
            ..Default::default()
        };
        let mut prog = Progress::new("best_sector_records", Some(rows.len()));
        let out = prepare_best_sectors(
            rows,
            &self.maps,
            &self.players,
            self.run_stamp,
            &mut stats,
            &mut prog,
        );
        prog.finish();
        let batch = BatchInsert::with_chunk_rows(
            "best_sector_records",
            BEST_SECTOR_COLUMNS,
            &["map_id", "index"],
            self.chunk_rows,
        );
        stats.inserted = batch.execute(&self.target, &out).await?;
        stats.log("best_sector_records");
        Ok(stats)
    }

    async fn migrate_sector_records(&mut self) -> Result<StepStats> {
        let rows = legacy::fetch_player_sectors(&self.source).await?;
        let mut stats = StepStats {
            fetched: rows.len() as u64,
            ..Default::default()
        };
        let grouped = sectors::aggregate(prepare_sector_rows(rows, &mut stats));
        stats.dropped_anomalies += grouped.dropped_anomalies;
        let mut prog = Progress::new("sector_records", Some(grouped.groups.len()));
        let out = resolve_sector_groups(
            grouped.groups,
            &self.maps,
            &self.players,
            &mut stats,
            &mut prog,
        );
        prog.finish();
        let batch = BatchInsert::with_chunk_rows(
            "sector_records",
            SECTOR_COLUMNS,
            &["map_id", "player_id"],
            self.chunk_rows,
        );
        stats.inserted = batch.execute(&self.target, &out).await?;
        stats.log("sector_records");
        Ok(stats)
    }

    async fn migrate_donations(&mut self) -> Result<StepStats> {
        let rows = legacy::fetch_donations(&self.source).await?;
        let mut stats = StepStats {
            fetched: rows.len() as u64,
            ..Default::default()
        };
        let mut prog = Progress::new("donations", Some(rows.len()));
        let out = prepare_donations(rows, &self.players, &mut stats, &mut prog);
        prog.finish();
        let batch = BatchInsert::with_chunk_rows(
            "donations",
            DONATION_COLUMNS,
            &["player_id", "date"],
            self.chunk_rows,
        );
        stats.inserted = batch.execute(&self.target, &out).await?;
        stats.log("donations");
        Ok(stats)
    }
}

struct PlayerInsert {
    id: i32,
    nickname: String,
    region: String,
    wins: i32,
    time_played: i32,
    visits: i32,
    is_united: bool,
    last_online: Option<NaiveDateTime>,
}

impl BindRow for PlayerInsert {
    fn push(&self, b: &mut Separated<'_, '_, Postgres, &'static str>) {
        b.push_bind(self.id)
            .push_bind(self.nickname.clone())
            .push_bind(self.region.clone())
            .push_bind(self.wins)
            .push_bind(self.time_played)
            .push_bind(self.visits)
            .push_bind(self.is_united)
            .push_bind(self.last_online);
    }
}

struct RecordInsert {
    map_id: i32,
    player_id: i32,
    time: i32,
    checkpoints: Vec<i32>,
    date: NaiveDateTime,
}

impl BindRow for RecordInsert {
    fn push(&self, b: &mut Separated<'_, '_, Postgres, &'static str>) {
        b.push_bind(self.map_id)
            .push_bind(self.player_id)
            .push_bind(self.time)
            .push_bind(self.checkpoints.clone())
            .push_bind(self.date);
    }
}

struct VoteInsert {
    map_id: i32,
    player_id: i32,
    vote: i16,
    date: NaiveDateTime,
}

impl BindRow for VoteInsert {
    fn push(&self, b: &mut Separated<'_, '_, Postgres, &'static str>) {
        b.push_bind(self.map_id)
            .push_bind(self.player_id)
            .push_bind(self.vote)
            .push_bind(self.date);
    }
}

struct BestSectorInsert {
    map_id: i32,
    player_id: i32,
    index: i16,
    sector: i32,
    date: NaiveDateTime,
}

impl BindRow for BestSectorInsert {
    fn push(&self, b: &mut Separated<'_, '_, Postgres, &'static str>) {
        b.push_bind(self.map_id)
            .push_bind(self.player_id)
            .push_bind(self.index)
            .push_bind(self.sector)
            .push_bind(self.date);
    }
}

struct SectorRecordInsert {
    map_id: i32,
    player_id: i32,
    sectors: Vec<Option<i32>>,
}

impl BindRow for SectorRecordInsert {
    fn push(&self, b: &mut Separated<'_, '_, Postgres, &'static str>) {
        b.push_bind(self.map_id)
            .push_bind(self.player_id)
            .push_bind(self.sectors.clone());
    }
}

struct DonationInsert {
    player_id: i32,
    amount: i32,
    date: NaiveDateTime,
}

impl BindRow for DonationInsert {
    fn push(&self, b: &mut Separated<'_, '_, Postgres, &'static str>) {
        b.push_bind(self.player_id)
            .push_bind(self.amount)
            .push_bind(self.date);
    }
}

/// Narrow a source-side counter to INT4. A value that cannot fit gets the
/// same treatment as a missing one: zero, counted as a coerced default.
fn narrow_counter(value: i64, stats: &mut StepStats) -> i32 {
    i32::try_from(value).unwrap_or_else(|_| {
        stats.coerced_defaults += 1;
        0
    })
}

fn prepare_players(
    rows: Vec<PlayerRow>,
    players: &IdentityResolver,
    nations: &NationIndex,
    stats: &mut StepStats,
    prog: &mut Progress,
) -> Vec<PlayerInsert> {
    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        prog.tick(1);
        let login = canonical_login(&row.login);
        let Some(id) = players.resolve(login) else {
            stats.dropped_unresolved += 1;
            continue;
        };
        let nickname = match row.nickname.as_deref() {
            Some(n) if !n.trim().is_empty() => n.to_owned(),
            _ => {
                stats.coerced_defaults += 1;
                login.to_owned()
            }
        };
        let nation = row.nation.unwrap_or_default();
        // Unmapped codes pass through unchanged.
        let region = match nations.region_name(&nation) {
            Some(name) => name.to_owned(),
            None => nation,
        };
        let visits = match row.visits {
            Some(v) => narrow_counter(v, stats),
            None => {
                stats.coerced_defaults += 1;
                0
            }
        };
        let wins = narrow_counter(row.wins.unwrap_or(0), stats);
        let time_played = narrow_counter(row.time_played.unwrap_or(0), stats);
        out.push(PlayerInsert {
            id,
            nickname,
            region,
            wins,
            time_played,
            visits,
            // The legacy schema never stored united status or score
            // averages; is_united stays false and average stays NULL.
            is_united: false,
            last_online: row.updated_at,
        });
    }
    out
}

fn prepare_records(
    rows: Vec<RecordRow>,
    maps: &IdentityResolver,
    players: &IdentityResolver,
    run_stamp: NaiveDateTime,
    stats: &mut StepStats,
    prog: &mut Progress,
) -> Vec<RecordInsert> {
    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        prog.tick(1);
        let (Some(map_id), Some(player_id)) = (
            maps.resolve(&row.uid),
            players.resolve(canonical_login(&row.login)),
        ) else {
            stats.dropped_unresolved += 1;
            continue;
        };
        let Some(time) = row.score.and_then(|s| i32::try_from(s).ok()) else {
            stats.dropped_anomalies += 1;
            continue;
        };
        let mut checkpoints = match row.checkpoints.as_deref().map(parse_checkpoints) {
            Some(Some(cps)) => cps,
            // Unparsable fragments poison the whole list; the row goes.
            Some(None) => {
                stats.dropped_anomalies += 1;
                continue;
            }
            None => {
                stats.coerced_defaults += 1;
                Vec::new()
            }
        };
        trim_finish(&mut checkpoints, time);
        let date = match row.date {
            Some(d) => d,
            None => {
                stats.coerced_defaults += 1;
                run_stamp
            }
        };
        out.push(RecordInsert {
            map_id,
            player_id,
            time,
            checkpoints,
            date,
        });
    }
    out
}

fn prepare_votes(
    rows: Vec<VoteRow>,
    maps: &IdentityResolver,
    players: &IdentityResolver,
    run_stamp: NaiveDateTime,
    stats: &mut StepStats,
    prog: &mut Progress,
) -> Vec<VoteInsert> {
    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        prog.tick(1);
        let (Some(map_id), Some(player_id)) = (
            maps.resolve(&row.uid),
            players.resolve(canonical_login(&row.login)),
        ) else {
            stats.dropped_unresolved += 1;
            continue;
        };
        let Some(vote) = row
            .score
            .and_then(|s| i16::try_from(normalize_vote(s)).ok())
        else {
            stats.dropped_anomalies += 1;
            continue;
        };
        out.push(VoteInsert {
            map_id,
            player_id,
            vote,
            // The source never stored vote dates; every row gets the run
            // timestamp.
            date: run_stamp,
        });
    }
    out
}

fn prepare_best_sectors(
    rows: Vec<SectorSourceRow>,
    maps: &IdentityResolver,
    players: &IdentityResolver,
    run_stamp: NaiveDateTime,
    stats: &mut StepStats,
    prog: &mut Progress,
) -> Vec<BestSectorInsert> {
    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        prog.tick(1);
        let Some(raw_login) = row.login.as_deref() else {
            stats.dropped_unresolved += 1;
            continue;
        };
        let (Some(map_id), Some(player_id)) = (
            maps.resolve(&row.uid),
            players.resolve(canonical_login(raw_login)),
        ) else {
            stats.dropped_unresolved += 1;
            continue;
        };
        let index = match row.index.and_then(|i| i16::try_from(i).ok()).filter(|i| *i >= 0) {
            Some(i) => i,
            None => {
                stats.dropped_anomalies += 1;
                continue;
            }
        };
        let Some(sector) = row.time.and_then(|t| i32::try_from(t).ok()) else {
            stats.dropped_anomalies += 1;
            continue;
        };
        out.push(BestSectorInsert {
            map_id,
            player_id,
            index,
            sector,
            date: run_stamp,
        });
    }
    out
}

/// Convert raw sector rows into aggregator input, dropping rows with a
/// missing login, index, or time. Grouping keys keep the raw login; the
/// qualifier suffix is only stripped at resolution time.
fn prepare_sector_rows(rows: Vec<SectorSourceRow>, stats: &mut StepStats) -> Vec<SectorRow> {
    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        let (Some(login), Some(index), Some(time)) = (row.login, row.index, row.time) else {
            stats.dropped_anomalies += 1;
            continue;
        };
        out.push(SectorRow {
            map_key: row.uid,
            player_key: login,
            index,
            time,
        });
    }
    out
}

fn resolve_sector_groups(
    groups: Vec<SectorGroup>,
    maps: &IdentityResolver,
    players: &IdentityResolver,
    stats: &mut StepStats,
    prog: &mut Progress,
) -> Vec<SectorRecordInsert> {
    let mut out = Vec::with_capacity(groups.len());
    for group in groups {
        prog.tick(1);
        let (Some(map_id), Some(player_id)) = (
            maps.resolve(&group.map_key),
            players.resolve(canonical_login(&group.player_key)),
        ) else {
            stats.dropped_unresolved += 1;
            continue;
        };
        out.push(SectorRecordInsert {
            map_id,
            player_id,
            sectors: group.sectors,
        });
    }
    out
}

fn prepare_donations(
    rows: Vec<DonationRow>,
    players: &IdentityResolver,
    stats: &mut StepStats,
    prog: &mut Progress,
) -> Vec<DonationInsert> {
    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        prog.tick(1);
        let Some(player_id) = players.resolve(canonical_login(&row.login)) else {
            stats.dropped_unresolved += 1;
            continue;
        };
        let Some(amount) = row
            .amount
            .filter(|a| *a > 0)
            .and_then(|a| i32::try_from(a).ok())
        else {
            stats.dropped_anomalies += 1;
            continue;
        };
        // The date is part of the primary key; a fixed fallback keeps
        // re-runs conflict-stable for players without a last-update stamp.
        let date = row
            .updated_at
            .unwrap_or_else(|| chrono::DateTime::<Utc>::UNIX_EPOCH.naive_utc());
        out.push(DonationInsert {
            player_id,
            amount,
            date,
        });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn stamp() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2011, 6, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn maps() -> IdentityResolver {
        IdentityResolver::with_index("map_ids", [("uid_a", 1), ("uid_b", 2)])
    }

    fn players() -> IdentityResolver {
        IdentityResolver::with_index("player_ids", [("wirtual", 10), ("hefest", 11)])
    }

    fn record_row(uid: &str, login: &str, score: i64, cps: &str) -> RecordRow {
        RecordRow {
            uid: uid.to_owned(),
            login: login.to_owned(),
            score: Some(score),
            date: Some(stamp()),
            checkpoints: Some(cps.to_owned()),
        }
    }

    #[test]
    fn rows_with_unknown_logins_are_dropped_not_fatal() {
        let rows = vec![
            record_row("uid_a", "wirtual", 120, "12,45,78,120"),
            record_row("uid_a", "ghost", 99, "99"),
        ];
        let mut stats = StepStats::default();
        let mut prog = Progress::new("test", Some(rows.len()));
        let out = prepare_records(rows, &maps(), &players(), stamp(), &mut stats, &mut prog);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].player_id, 10);
        assert_eq!(stats.dropped_unresolved, 1);
        assert_eq!(stats.dropped_anomalies, 0);
    }

    #[test]
    fn record_checkpoints_lose_the_finish_entry() {
        let rows = vec![record_row("uid_a", "wirtual", 120, "12,45,78,120")];
        let mut stats = StepStats::default();
        let mut prog = Progress::new("test", Some(1));
        let out = prepare_records(rows, &maps(), &players(), stamp(), &mut stats, &mut prog);
        assert_eq!(out[0].checkpoints, vec![12, 45, 78]);
        assert_eq!(out[0].time, 120);
    }

    #[test]
    fn corrupt_checkpoint_strings_drop_the_row() {
        let rows = vec![
            record_row("uid_a", "wirtual", 120, "12,abc,78"),
            record_row("uid_b", "hefest", 90, "45"),
        ];
        let mut stats = StepStats::default();
        let mut prog = Progress::new("test", Some(rows.len()));
        let out = prepare_records(rows, &maps(), &players(), stamp(), &mut stats, &mut prog);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].player_id, 11);
        assert_eq!(stats.dropped_anomalies, 1);
        assert_eq!(stats.coerced_defaults, 0);
    }

    #[test]
    fn absent_checkpoint_strings_coerce_to_empty() {
        let mut null_cps = record_row("uid_a", "wirtual", 120, "");
        null_cps.checkpoints = None;
        let blank_cps = record_row("uid_b", "hefest", 90, "   ");
        let rows = vec![null_cps, blank_cps];
        let mut stats = StepStats::default();
        let mut prog = Progress::new("test", Some(rows.len()));
        let out = prepare_records(rows, &maps(), &players(), stamp(), &mut stats, &mut prog);
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|r| r.checkpoints.is_empty()));
        assert_eq!(stats.coerced_defaults, 1);
        assert_eq!(stats.dropped_anomalies, 0);
    }

    #[test]
    fn record_times_past_int4_are_dropped() {
        let rows = vec![record_row("uid_a", "wirtual", 5_000_000_000, "12")];
        let mut stats = StepStats::default();
        let mut prog = Progress::new("test", Some(1));
        let out = prepare_records(rows, &maps(), &players(), stamp(), &mut stats, &mut prog);
        assert!(out.is_empty());
        assert_eq!(stats.dropped_anomalies, 1);
    }

    #[test]
    fn logins_resolve_after_qualifier_stripping() {
        let rows = vec![record_row("uid_a", "wirtual/united", 120, "120")];
        let mut stats = StepStats::default();
        let mut prog = Progress::new("test", Some(1));
        let out = prepare_records(rows, &maps(), &players(), stamp(), &mut stats, &mut prog);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].player_id, 10);
    }

    #[test]
    fn vote_magnitudes_are_normalized() {
        let rows = vec![
            VoteRow {
                uid: "uid_a".into(),
                login: "wirtual".into(),
                score: Some(6),
            },
            VoteRow {
                uid: "uid_a".into(),
                login: "hefest".into(),
                score: Some(-6),
            },
            VoteRow {
                uid: "uid_b".into(),
                login: "wirtual".into(),
                score: Some(4),
            },
        ];
        let mut stats = StepStats::default();
        let mut prog = Progress::new("test", Some(rows.len()));
        let out = prepare_votes(rows, &maps(), &players(), stamp(), &mut stats, &mut prog);
        let votes: Vec<i16> = out.iter().map(|v| v.vote).collect();
        assert_eq!(votes, vec![3, -3, 4]);
        assert!(out.iter().all(|v| v.date == stamp()));
    }

    #[test]
    fn oversized_votes_are_dropped_not_wrapped() {
        let rows = vec![VoteRow {
            uid: "uid_a".into(),
            login: "wirtual".into(),
            score: Some(40_000),
        }];
        let mut stats = StepStats::default();
        let mut prog = Progress::new("test", Some(1));
        let out = prepare_votes(rows, &maps(), &players(), stamp(), &mut stats, &mut prog);
        assert!(out.is_empty());
        assert_eq!(stats.dropped_anomalies, 1);
    }

    #[test]
    fn nickname_falls_back_to_login() {
        let rows = vec![PlayerRow {
            login: "wirtual".into(),
            nickname: Some("  ".into()),
            nation: Some("NOR".into()),
            wins: Some(5),
            time_played: Some(3600),
            updated_at: Some(stamp()),
            visits: None,
        }];
        let mut stats = StepStats::default();
        let mut prog = Progress::new("test", Some(1));
        let out = prepare_players(
            rows,
            &players(),
            &NationIndex::with_defaults(),
            &mut stats,
            &mut prog,
        );
        assert_eq!(out[0].nickname, "wirtual");
        assert_eq!(out[0].region, "Norway");
        assert_eq!(out[0].visits, 0);
        assert!(!out[0].is_united);
        assert_eq!(stats.coerced_defaults, 2);
    }

    #[test]
    fn unmapped_nation_codes_pass_through() {
        let rows = vec![PlayerRow {
            login: "hefest".into(),
            nickname: Some("Hefest".into()),
            nation: Some("XYZ".into()),
            wins: None,
            time_played: None,
            updated_at: None,
            visits: Some(12),
        }];
        let mut stats = StepStats::default();
        let mut prog = Progress::new("test", Some(1));
        let out = prepare_players(
            rows,
            &players(),
            &NationIndex::with_defaults(),
            &mut stats,
            &mut prog,
        );
        assert_eq!(out[0].region, "XYZ");
        assert_eq!(out[0].wins, 0);
        assert_eq!(out[0].last_online, None);
    }

    #[test]
    fn huge_player_counters_fall_back_to_zero() {
        let rows = vec![PlayerRow {
            login: "wirtual".into(),
            nickname: Some("Wirtual".into()),
            nation: Some("NOR".into()),
            wins: Some(5_000_000_000),
            time_played: Some(3600),
            updated_at: None,
            visits: Some(3),
        }];
        let mut stats = StepStats::default();
        let mut prog = Progress::new("test", Some(1));
        let out = prepare_players(
            rows,
            &players(),
            &NationIndex::with_defaults(),
            &mut stats,
            &mut prog,
        );
        assert_eq!(out[0].wins, 0);
        assert_eq!(out[0].time_played, 3600);
        assert_eq!(out[0].visits, 3);
        assert_eq!(stats.coerced_defaults, 1);
        assert_eq!(stats.dropped_anomalies, 0);
    }

    #[test]
    fn best_sector_rows_without_a_player_are_dropped() {
        let rows = vec![
            SectorSourceRow {
                uid: "uid_a".into(),
                login: None,
                index: Some(0),
                time: Some(100),
            },
            SectorSourceRow {
                uid: "uid_a".into(),
                login: Some("wirtual".into()),
                index: Some(1),
                time: Some(200),
            },
        ];
        let mut stats = StepStats::default();
        let mut prog = Progress::new("test", Some(rows.len()));
        let out = prepare_best_sectors(rows, &maps(), &players(), stamp(), &mut stats, &mut prog);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].index, 1);
        assert_eq!(out[0].sector, 200);
        assert_eq!(stats.dropped_unresolved, 1);
    }

    #[test]
    fn negative_sector_indices_are_anomalies() {
        let rows = vec![SectorSourceRow {
            uid: "uid_a".into(),
            login: Some("wirtual".into()),
            index: Some(-2),
            time: Some(100),
        }];
        let mut stats = StepStats::default();
        let mut prog = Progress::new("test", Some(1));
        let out = prepare_best_sectors(rows, &maps(), &players(), stamp(), &mut stats, &mut prog);
        assert!(out.is_empty());
        assert_eq!(stats.dropped_anomalies, 1);
    }

    #[test]
    fn best_sector_times_past_int4_are_dropped() {
        let rows = vec![SectorSourceRow {
            uid: "uid_a".into(),
            login: Some("wirtual".into()),
            index: Some(0),
            time: Some(5_000_000_000),
        }];
        let mut stats = StepStats::default();
        let mut prog = Progress::new("test", Some(1));
        let out = prepare_best_sectors(rows, &maps(), &players(), stamp(), &mut stats, &mut prog);
        assert!(out.is_empty());
        assert_eq!(stats.dropped_anomalies, 1);
    }

    #[test]
    fn sector_groups_resolve_on_stripped_logins() {
        let rows = vec![
            SectorSourceRow {
                uid: "uid_a".into(),
                login: Some("wirtual/united".into()),
                index: Some(0),
                time: Some(10),
            },
            SectorSourceRow {
                uid: "uid_a".into(),
                login: Some("wirtual/united".into()),
                index: Some(2),
                time: Some(30),
            },
            SectorSourceRow {
                uid: "uid_a".into(),
                login: Some("nobody".into()),
                index: Some(0),
                time: Some(40),
            },
        ];
        let mut stats = StepStats::default();
        let grouped = sectors::aggregate(prepare_sector_rows(rows, &mut stats));
        let mut prog = Progress::new("test", Some(grouped.groups.len()));
        let out = resolve_sector_groups(grouped.groups, &maps(), &players(), &mut stats, &mut prog);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].player_id, 10);
        assert_eq!(out[0].sectors, vec![Some(10), None, Some(30)]);
        assert_eq!(stats.dropped_unresolved, 1);
    }

    #[test]
    fn donations_keep_a_stable_fallback_date() {
        let rows = vec![
            DonationRow {
                login: "wirtual".into(),
                amount: Some(500),
                updated_at: None,
            },
            DonationRow {
                login: "hefest".into(),
                amount: Some(0),
                updated_at: Some(stamp()),
            },
        ];
        let mut stats = StepStats::default();
        let mut prog = Progress::new("test", Some(rows.len()));
        let out = prepare_donations(rows, &players(), &mut stats, &mut prog);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].amount, 500);
        assert_eq!(
            out[0].date,
            chrono::DateTime::<Utc>::UNIX_EPOCH.naive_utc()
        );
        assert_eq!(stats.dropped_anomalies, 1);
    }

    #[test]
    fn oversized_donation_amounts_are_dropped() {
        let rows = vec![DonationRow {
            login: "wirtual".into(),
            amount: Some(5_000_000_000),
            updated_at: Some(stamp()),
        }];
        let mut stats = StepStats::default();
        let mut prog = Progress::new("test", Some(1));
        let out = prepare_donations(rows, &players(), &mut stats, &mut prog);
        assert!(out.is_empty());
        assert_eq!(stats.dropped_anomalies, 1);
    }

    #[test]
    fn step_roster_follows_dependency_order() {
        let stats = MigrationStats::default();
        let names: Vec<&str> = stats.enumerate().iter().map(|(name, _)| *name).collect();
        assert_eq!(
            names,
            [
                "players",
                "records",
                "votes",
                "best_sector_records",
                "sector_records",
                "donations"
            ]
        );
    }

    #[test]
    fn step_flags_cover_every_step() {
        let none = StepFlags::default();
        assert!(!none.any_enabled());
        let one = StepFlags {
            donations: true,
            ..Default::default()
        };
        assert!(one.any_enabled());
    }
}
