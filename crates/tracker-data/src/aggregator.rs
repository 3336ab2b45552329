//! Scope aggregation of the daily snapshot.
//!
//! Collapses raw daily rows to one row per grain key of a scope. The
//! combining rule is fixed per column:
//!
//! | column            | rule |
//! |-------------------|------|
//! | statistic counts  | sum  |
//! | latitude/longitude| mean of the published values |
//! | last update       | max  |

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::Serialize;

use tracker_core::models::{hover_text, DailyCounts, LocationNaming, RawDailyRow};
use tracker_core::{Scope, Statistic};

use crate::reconciler::Reconciliation;

// ── DailyLocationRow ──────────────────────────────────────────────────────────

/// One location of a scope's daily snapshot after aggregation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyLocationRow {
    /// Grain key: canonical country, state name or county code.
    pub key: String,
    /// Display name.
    pub name: String,
    /// Centroid of the constituent rows.
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub counts: DailyCounts,
    /// Most recent update among the constituent rows.
    pub last_update: Option<NaiveDateTime>,
    pub hover_text: String,
    /// Number of raw rows merged into this one.
    pub constituents: usize,
}

/// A running mean over the values that are present.
#[derive(Debug, Default, Clone, Copy)]
struct Mean {
    sum: f64,
    n: u32,
}

impl Mean {
    fn add(&mut self, value: Option<f64>) {
        if let Some(v) = value {
            self.sum += v;
            self.n += 1;
        }
    }

    fn value(&self) -> Option<f64> {
        (self.n > 0).then(|| self.sum / f64::from(self.n))
    }
}

#[derive(Debug, Default)]
struct GroupAccumulator<'a> {
    counts: DailyCounts,
    latitude: Mean,
    longitude: Mean,
    last_update: Option<NaiveDateTime>,
    members: Vec<&'a RawDailyRow>,
}

impl<'a> GroupAccumulator<'a> {
    fn add(&mut self, row: &'a RawDailyRow) {
        self.counts.accumulate(&row.counts);
        self.latitude.add(row.latitude);
        self.longitude.add(row.longitude);
        self.last_update = self.last_update.max(row.last_update);
        self.members.push(row);
    }
}

// ── DailySnapshot ─────────────────────────────────────────────────────────────

/// The aggregated daily snapshot of one scope, sorted by key.
#[derive(Debug, Clone, Serialize)]
pub struct DailySnapshot {
    pub scope: Scope,
    pub rows: Vec<DailyLocationRow>,
}

impl DailySnapshot {
    /// Column-wise sum of the four statistics over all rows.
    pub fn totals(&self) -> DailyCounts {
        let mut totals = DailyCounts::default();
        for row in &self.rows {
            totals.accumulate(&row.counts);
        }
        totals
    }

    pub fn get(&self, key: &str) -> Option<&DailyLocationRow> {
        self.rows
            .binary_search_by(|r| r.key.as_str().cmp(key))
            .ok()
            .map(|i| &self.rows[i])
    }

    /// Most recent update time across the snapshot.
    pub fn last_update(&self) -> Option<NaiveDateTime> {
        self.rows.iter().filter_map(|r| r.last_update).max()
    }

    /// Rows that report `stat`, for ranking.
    pub fn reporting(&self, stat: Statistic) -> impl Iterator<Item = (&DailyLocationRow, i64)> {
        self.rows
            .iter()
            .filter(|r| !r.counts.is_empty())
            .filter_map(move |r| r.counts.get(stat).map(|v| (r, v)))
    }
}

// ── Aggregation ───────────────────────────────────────────────────────────────

/// Aggregate `rows` to the grain of `scope` without a geometry check.
pub fn aggregate(rows: &[RawDailyRow], scope: Scope, naming: LocationNaming) -> DailySnapshot {
    aggregate_with(rows, naming, &Reconciliation::identity(scope))
}

/// Aggregate `rows` to the grain of the reconciled scope. Rows that do not
/// belong to the scope are left out.
pub fn aggregate_with(
    rows: &[RawDailyRow],
    naming: LocationNaming,
    reconciliation: &Reconciliation,
) -> DailySnapshot {
    let scope = reconciliation.scope();
    let mut groups: BTreeMap<String, GroupAccumulator<'_>> = BTreeMap::new();
    for row in rows {
        if let Some(key) = reconciliation.grain_key(row) {
            groups.entry(key).or_default().add(row);
        }
    }

    let rows = groups
        .into_iter()
        .map(|(key, acc)| {
            let name = match (scope, acc.members.as_slice()) {
                (Scope::UsCounties, [only]) => naming.display_name(only, &key),
                _ => key.clone(),
            };
            DailyLocationRow {
                hover_text: hover_text(&name, &acc.counts),
                latitude: acc.latitude.value(),
                longitude: acc.longitude.value(),
                counts: acc.counts,
                last_update: acc.last_update,
                constituents: acc.members.len(),
                name,
                key,
            }
        })
        .collect();

    DailySnapshot { scope, rows }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
