//! The materialized statistics store and its query API.
//!
//! A [`DerivedStore`] is built once by the processor and never mutated
//! afterwards, so it can be shared behind an `Arc` and read from any number
//! of callers without locking. Every query returns a typed [`Result`]; asking
//! for a scope, statistic or location that was never built is `NotFound`.

use std::borrow::Cow;
use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;

use tracker_core::models::DailyCounts;
use tracker_core::population::PopulationTable;
use tracker_core::table::DerivedTable;
use tracker_core::{Result, Scope, Statistic, TrackerError, ValueType};
use tracker_data::aggregator::DailySnapshot;
use tracker_data::derive::DerivedViews;
use tracker_data::geometry::BoundaryGeometry;
use tracker_data::reconciler::Reconciliation;

// ── Query results ─────────────────────────────────────────────────────────────

/// Latest-date values of every view for one location.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LatestStat {
    pub location: String,
    pub date: NaiveDate,
    pub value: Option<f64>,
    pub daily_diff: Option<f64>,
    pub percent_change: Option<f64>,
    /// `None` when the location has no population.
    pub per_capita: Option<f64>,
    pub one_per_n: Option<f64>,
}

/// One entry of a ranking.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedLocation<V> {
    pub location: String,
    pub value: V,
}

// ── ScopeData ─────────────────────────────────────────────────────────────────

/// Everything built for one scope.
#[derive(Debug, Clone)]
pub struct ScopeData {
    pub series: BTreeMap<Statistic, DerivedViews>,
    pub daily: DailySnapshot,
    pub geometry: BoundaryGeometry,
    pub reconciliation: Reconciliation,
    pub population: PopulationTable,
}

// ── DerivedStore ──────────────────────────────────────────────────────────────

/// Read-only lookup keyed by `(scope, statistic, value type)`.
#[derive(Debug, Clone)]
pub struct DerivedStore {
    report_date: NaiveDate,
    scopes: BTreeMap<Scope, ScopeData>,
}

impl DerivedStore {
    pub fn new(report_date: NaiveDate, scopes: BTreeMap<Scope, ScopeData>) -> Self {
        Self { report_date, scopes }
    }

    // ── Introspection ────────────────────────────────────────────────────

    /// Date of the daily snapshot the store was built from.
    pub fn report_date(&self) -> NaiveDate {
        self.report_date
    }

    /// Scopes that were built.
    pub fn scopes(&self) -> impl Iterator<Item = Scope> + '_ {
        self.scopes.keys().copied()
    }

    pub fn value_types(&self) -> &'static [ValueType] {
        &ValueType::ALL
    }

    /// Statistics with a time series at `scope`.
    pub fn available_statistics(&self, scope: Scope) -> Result<Vec<Statistic>> {
        Ok(self.scope(scope)?.series.keys().copied().collect())
    }

    pub fn overall_location(&self, scope: Scope) -> &'static str {
        scope.overall_location()
    }

    pub fn get_daily_report(&self, scope: Scope) -> Result<&DailySnapshot> {
        Ok(&self.scope(scope)?.daily)
    }

    pub fn get_geometry(&self, scope: Scope) -> Result<&BoundaryGeometry> {
        Ok(&self.scope(scope)?.geometry)
    }

    /// Geometry locations that have data, for the choropleth layer.
    pub fn choropleth_locations(&self, scope: Scope) -> Result<&[String]> {
        Ok(self.scope(scope)?.reconciliation.choropleth_locations())
    }

    pub fn get_population(&self, scope: Scope) -> Result<&PopulationTable> {
        Ok(&self.scope(scope)?.population)
    }

    // ── Series ───────────────────────────────────────────────────────────

    /// The date × location table of one view, or only its overall column.
    pub fn get_series(
        &self,
        scope: Scope,
        stat: Statistic,
        value_type: ValueType,
        overall: bool,
    ) -> Result<Cow<'_, DerivedTable>> {
        let table = self.views(scope, stat)?.get(value_type);
        if !overall {
            return Ok(Cow::Borrowed(table));
        }
        let name = scope.overall_location();
        if !table.contains(name) {
            return Err(TrackerError::NotFound(format!(
                "{} has no {} {} series for {}",
                scope, value_type, stat, name
            )));
        }
        Ok(Cow::Owned(table.select(&[name])))
    }

    /// Latest values of every view for `location`, or for the scope's
    /// overall location when none is given.
    pub fn get_latest(&self, stat: Statistic, scope: Scope, location: Option<&str>) -> Result<LatestStat> {
        let views = self.views(scope, stat)?;
        let location = location.unwrap_or_else(|| scope.overall_location());
        latest_for(views, location)
            .ok_or_else(|| TrackerError::NotFound(format!("{} in {} {} series", location, scope, stat)))
    }

    /// Latest values for every location of `(scope, stat)`, overall first.
    pub fn get_all_location_stats(&self, scope: Scope, stat: Statistic) -> Result<Vec<LatestStat>> {
        let views = self.views(scope, stat)?;
        Ok(views
            .cumulative
            .locations()
            .iter()
            .filter_map(|loc| latest_for(views, loc))
            .collect())
    }

    // ── Rankings ─────────────────────────────────────────────────────────

    /// The `n` highest latest-date values of a view, excluding the overall
    /// location and undefined values. Ties are broken by name.
    pub fn get_top_locations(
        &self,
        scope: Scope,
        stat: Statistic,
        value_type: ValueType,
        n: usize,
    ) -> Result<Vec<RankedLocation<f64>>> {
        let table = self.views(scope, stat)?.get(value_type);
        let Some(last) = table.dates().len().checked_sub(1) else {
            return Ok(Vec::new());
        };
        let overall = scope.overall_location();
        let mut ranked: Vec<RankedLocation<f64>> = table
            .row(last)
            .filter(|(loc, _)| *loc != overall)
            .filter_map(|(loc, v)| {
                v.map(|value| RankedLocation {
                    location: loc.to_string(),
                    value,
                })
            })
            .collect();
        ranked.sort_by(|a, b| b.value.total_cmp(&a.value).then_with(|| a.location.cmp(&b.location)));
        ranked.truncate(n);
        Ok(ranked)
    }

    /// The `n` lowest counts of today's daily snapshot. Rows that do not
    /// report `stat` are excluded before ranking.
    pub fn get_bottom_locations(&self, scope: Scope, stat: Statistic, n: usize) -> Result<Vec<RankedLocation<i64>>> {
        self.rank_daily(scope, stat, n, |a, b| a.cmp(b))
    }

    /// The `n` highest counts of today's daily snapshot.
    pub fn get_top_daily_locations(&self, scope: Scope, stat: Statistic, n: usize) -> Result<Vec<RankedLocation<i64>>> {
        self.rank_daily(scope, stat, n, |a, b| b.cmp(a))
    }

    /// Sum of the four statistics over a scope's daily snapshot.
    pub fn get_daily_totals(&self, scope: Scope) -> Result<DailyCounts> {
        Ok(self.scope(scope)?.daily.totals())
    }

    // ── Private helpers ──────────────────────────────────────────────────

    fn scope(&self, scope: Scope) -> Result<&ScopeData> {
        self.scopes
            .get(&scope)
            .ok_or_else(|| TrackerError::NotFound(format!("scope {}", scope)))
    }

    fn views(&self, scope: Scope, stat: Statistic) -> Result<&DerivedViews> {
        self.scope(scope)?
            .series
            .get(&stat)
            .ok_or_else(|| TrackerError::NotFound(format!("{} is not tracked for {}", stat, scope)))
    }

    fn rank_daily<F>(&self, scope: Scope, stat: Statistic, n: usize, order: F) -> Result<Vec<RankedLocation<i64>>>
    where
        F: Fn(&i64, &i64) -> Ordering,
    {
        let daily = &self.scope(scope)?.daily;
        let mut ranked: Vec<RankedLocation<i64>> = daily
            .reporting(stat)
            .map(|(row, value)| RankedLocation {
                location: row.key.clone(),
                value,
            })
            .collect();
        ranked.sort_by(|a, b| order(&a.value, &b.value).then_with(|| a.location.cmp(&b.location)));
        ranked.truncate(n);
        Ok(ranked)
    }
}

fn latest_for(views: &DerivedViews, location: &str) -> Option<LatestStat> {
    let date = views.cumulative.latest_date()?;
    let latest = |table: &DerivedTable| table.latest(location).copied().flatten();
    Some(LatestStat {
        location: location.to_string(),
        date,
        value: *views.cumulative.latest(location)?,
        daily_diff: latest(&views.daily_diff),
        percent_change: latest(&views.daily_percent_change),
        per_capita: latest(&views.per_capita),
        one_per_n: latest(&views.one_per_n),
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
