//! Per-player sector time aggregation.
//!
//! The source stores one row per (map, player, sector index); the target
//! wants one row per (map, player) carrying the whole sector array. Rows
//! for one pair are not adjacent in the source, so the whole set is
//! grouped in memory in a single pass, keyed by the natural-key pair.

use indexmap::IndexMap;

/// Upper bound on a believable sector index; rows beyond it are treated
/// as corrupt.
pub const MAX_SECTOR_INDEX: usize = 4096;

/// One source row: a single sector time for one player on one map.
#[derive(Debug, Clone)]
pub struct SectorRow {
    pub map_key: String,
    pub player_key: String,
    pub index: i64,
    pub time: i64,
}

/// Every sector time for one (map, player) pair, positioned by sector
/// index. Positions never observed stay `None` and insert as NULL array
/// elements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectorGroup {
    pub map_key: String,
    pub player_key: String,
    pub sectors: Vec<Option<i32>>,
}

pub struct Aggregated {
    pub groups: Vec<SectorGroup>,
    pub dropped_anomalies: u64,
}

/// Group sector rows by (map, player) in one linear pass.
///
/// Groups come out in first-sighting order of each key pair. A duplicate
/// (map, player, index) triple keeps the last value seen. Rows with an
/// index outside `0..=`[`MAX_SECTOR_INDEX`], and rows whose time does not
/// fit INT4, are dropped and counted instead of inserted.
pub fn aggregate<I>(rows: I) -> Aggregated
where
    I: IntoIterator<Item = SectorRow>,
{
    let mut groups: IndexMap<(String, String), Vec<Option<i32>>> = IndexMap::new();
    let mut dropped_anomalies = 0u64;
    for row in rows {
        let slot = match usize::try_from(row.index) {
            Ok(i) if i <= MAX_SECTOR_INDEX => i,
            _ => {
                dropped_anomalies += 1;
                continue;
            }
        };
        let time = match i32::try_from(row.time) {
            Ok(t) => t,
            Err(_) => {
                dropped_anomalies += 1;
                continue;
            }
        };
        let sectors = groups.entry((row.map_key, row.player_key)).or_default();
        if sectors.len() <= slot {
            sectors.resize(slot + 1, None);
        }
        sectors[slot] = Some(time);
    }
    Aggregated {
        groups: groups
            .into_iter()
            .map(|((map_key, player_key), sectors)| SectorGroup {
                map_key,
                player_key,
                sectors,
            })
            .collect(),
        dropped_anomalies,
    }
}
