//! Row-throughput progress logging shared by the migration binaries.
use std::time::{Duration, Instant};
use tracing::info;

use crate::util::env::env_parse;

/// Progress logging interval (rows). Override with env PROGRESS_INTERVAL.
fn progress_interval() -> usize {
    env_parse("PROGRESS_INTERVAL", 500usize).max(1)
}

#[derive(Clone)]
pub struct Progress {
    label: String,
    total: Option<usize>,
    every: usize,
    start: Instant,
    last_log: Instant,
    processed: usize,
}

impl Progress {
    pub fn new<L: Into<String>>(label: L, total: Option<usize>) -> Self {
        let now = Instant::now();
        Self {
            label: label.into(),
            total,
            every: progress_interval(),
            start: now,
            last_log: now,
            processed: 0,
        }
    }

    pub fn tick(&mut self, n: usize) {
        self.processed += n;
        if self.processed == n || self.processed % self.every == 0 {
            self.log(false);
        }
    }

    pub fn finish(&mut self) {
        self.log(true);
    }

    pub fn processed(&self) -> usize {
        self.processed
    }

    fn log(&mut self, done: bool) {
        let now = Instant::now();
        if !done && now.duration_since(self.last_log) < Duration::from_millis(200) {
            // Avoid log-spam if the interval is very small and the loop is fast
            return;
        }
        self.last_log = now;

        let elapsed = now.duration_since(self.start).as_secs_f64().max(0.001);
        let rate = (self.processed as f64) / elapsed;
        let (pct, eta_s, remaining) = if let Some(t) = self.total {
            let pct = (100.0 * (self.processed as f64)) / (t.max(1) as f64);
            let eta = if self.processed > 0 {
                let per = elapsed / (self.processed as f64);
                ((t.saturating_sub(self.processed) as f64) * per).max(0.0)
            } else {
                0.0
            };
            (Some(pct), Some(eta), Some(t.saturating_sub(self.processed)))
        } else {
            (None, None, None)
        };

        match (pct, eta_s, remaining) {
            (Some(p), Some(_eta), Some(rem)) if done => {
                info!(target: "progress", label=%self.label, processed=self.processed, remaining=rem, total=?self.total, pct=?format!("{:.1}", p), rate=?format!("{:.1}/s", rate), took=?format!("{:.1}s", elapsed), "done");
            }
            (Some(p), Some(eta), Some(rem)) => {
                info!(target: "progress", label=%self.label, processed=self.processed, remaining=rem, total=?self.total, pct=?format!("{:.1}", p), rate=?format!("{:.1}/s", rate), eta=?format!("{:.1}s", eta), "progress");
            }
            _ if done => {
                info!(target: "progress", label=%self.label, processed=self.processed, rate=?format!("{:.1}/s", rate), took=?format!("{:.1}s", elapsed), "done");
            }
            _ => {
                info!(target: "progress", label=%self.label, processed=self.processed, rate=?format!("{:.1}/s", rate), "progress");
            }
        }
    }
}
