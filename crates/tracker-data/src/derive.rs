//! Derived views of a cumulative table.
//!
//! Every view shares the cumulative table's date axis. Undefined values (no
//! prior day, division by zero, non-finite results) are `None`, never zero.
//! Views that need a population only keep locations that have one.

use serde::Serialize;
use tracing::debug;

use tracker_core::population::PopulationTable;
use tracker_core::table::{CumulativeTable, DerivedTable};
use tracker_core::{Scope, ValueType};

/// The five views of one `(scope, statistic)` series.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedViews {
    pub cumulative: DerivedTable,
    pub daily_diff: DerivedTable,
    pub daily_percent_change: DerivedTable,
    pub per_capita: DerivedTable,
    pub one_per_n: DerivedTable,
}

impl DerivedViews {
    pub fn get(&self, value_type: ValueType) -> &DerivedTable {
        match value_type {
            ValueType::Cumulative => &self.cumulative,
            ValueType::DailyDiff => &self.daily_diff,
            ValueType::DailyPercentChange => &self.daily_percent_change,
            ValueType::PerCapita => &self.per_capita,
            ValueType::OnePerN => &self.one_per_n,
        }
    }
}

/// Shape of a derived views set, for logging and introspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ViewShape {
    pub dates: usize,
    pub locations: usize,
    pub with_population: usize,
}

impl DerivedViews {
    pub fn shape(&self) -> ViewShape {
        ViewShape {
            dates: self.cumulative.dates().len(),
            locations: self.cumulative.locations().len(),
            with_population: self.per_capita.locations().len(),
        }
    }
}

fn finite(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}

fn step(w: &[i64]) -> Option<i64> {
    w[1].checked_sub(w[0])
}

/// `c[t] - c[t-1]`; undefined on the first date.
pub fn daily_diff(values: &[i64]) -> Vec<Option<f64>> {
    let mut out = Vec::with_capacity(values.len());
    out.extend(values.first().map(|_| None));
    out.extend(values.windows(2).map(|w| step(w).map(|d| d as f64)));
    out
}

/// `(c[t] - c[t-1]) / c[t-1] * 100`; undefined on the first date and where
/// the previous value is zero.
pub fn daily_percent_change(values: &[i64]) -> Vec<Option<f64>> {
    let mut out = Vec::with_capacity(values.len());
    out.extend(values.first().map(|_| None));
    out.extend(values.windows(2).map(|w| {
        if w[0] == 0 {
            None
        } else {
            step(w).and_then(|d| finite(d as f64 / w[0] as f64 * 100.0))
        }
    }));
    out
}

/// `c[t] * multiplier / population`.
pub fn per_capita(values: &[i64], population: u64, multiplier: f64) -> Vec<Option<f64>> {
    if population == 0 {
        return vec![None; values.len()];
    }
    let pop = population as f64;
    values
        .iter()
        .map(|v| finite(*v as f64 * multiplier / pop))
        .collect()
}

/// `population / c[t]`: one case per that many people. Undefined where the
/// count is zero.
pub fn one_per_n(values: &[i64], population: u64) -> Vec<Option<f64>> {
    let pop = population as f64;
    values
        .iter()
        .map(|v| if *v == 0 { None } else { finite(pop / *v as f64) })
        .collect()
}

/// Compute every view of `table` for `scope`. Without a population table the
/// population views are empty.
pub fn derive(table: &CumulativeTable, scope: Scope, population: Option<&PopulationTable>) -> DerivedViews {
    let cumulative: DerivedTable = table.filter_map_columns(|_, col| Some(col.iter().map(|v| Some(*v as f64)).collect()));
    let daily_diff: DerivedTable = table.filter_map_columns(|_, col| Some(daily_diff(col)));
    let daily_percent_change: DerivedTable = table.filter_map_columns(|_, col| Some(daily_percent_change(col)));

    let multiplier = scope.per_capita_multiplier();
    let lookup = |loc: &str| population.and_then(|p| p.for_location(scope, loc));
    let per_capita: DerivedTable = table.filter_map_columns(|loc, col| lookup(loc).map(|pop| per_capita(col, pop, multiplier)));
    let one_per_n: DerivedTable = table.filter_map_columns(|loc, col| lookup(loc).map(|pop| one_per_n(col, pop)));

    let without = table.locations().len() - per_capita.locations().len();
    if without > 0 {
        debug!("{}: {} locations without population", scope, without);
    }

    DerivedViews {
        cumulative,
        daily_diff,
        daily_percent_change,
        per_capita,
        one_per_n,
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
