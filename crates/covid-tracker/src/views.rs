//! Plain-text renderings of the query API for the terminal.

use tracker_core::formatting::{format_count, format_number, format_optional, format_signed};
use tracker_core::models::DailyCounts;
use tracker_core::{Result, Scope, Statistic, TrackerError, ValueType};
use tracker_runtime::store::{DerivedStore, LatestStat, RankedLocation};

/// Decimal places shown for a view.
fn decimals(value_type: ValueType) -> u32 {
    match value_type {
        ValueType::Cumulative | ValueType::DailyDiff | ValueType::OnePerN => 0,
        ValueType::DailyPercentChange | ValueType::PerCapita => 2,
    }
}

fn count_or_na(value: Option<i64>) -> String {
    value.map(format_count).unwrap_or_else(|| "n/a".to_string())
}

fn render(lines: Vec<String>) -> String {
    let mut out = lines.join("\n");
    out.push('\n');
    out
}

fn totals_lines(lines: &mut Vec<String>, totals: &DailyCounts) {
    for stat in Statistic::ALL {
        lines.push(format!("  {:<10} {:>14}", stat, count_or_na(totals.get(stat))));
    }
}

fn latest_lines(lines: &mut Vec<String>, scope: Scope, latest: &LatestStat) {
    let diff = latest
        .daily_diff
        .map(|v| format_signed(v, 0))
        .unwrap_or_else(|| "n/a".to_string());
    let pct = latest
        .percent_change
        .map(|v| format!("{}%", format_signed(v, 2)))
        .unwrap_or_else(|| "n/a".to_string());
    let per = format!("Per {}", format_number(scope.per_capita_multiplier(), 0));

    lines.push(format!("  {:<22} {:>14}", ValueType::Cumulative, format_optional(latest.value, 0)));
    lines.push(format!("  {:<22} {:>14}", ValueType::DailyDiff, diff));
    lines.push(format!("  {:<22} {:>14}", ValueType::DailyPercentChange, pct));
    lines.push(format!("  {:<22} {:>14}", per, format_optional(latest.per_capita, 2)));
    lines.push(format!("  {:<22} {:>14}", ValueType::OnePerN, format_optional(latest.one_per_n, 0)));
}

/// Daily totals for the scope, its sources, and the latest overall values
/// of `stat`.
pub fn summary(store: &DerivedStore, scope: Scope, stat: Statistic) -> Result<String> {
    let report = store.get_daily_report(scope)?;
    let mut lines = vec![format!("{}: daily report {}", scope, store.report_date())];
    if let Some(updated) = report.last_update() {
        lines.push(format!("  last updated {}", updated));
    }
    totals_lines(&mut lines, &store.get_daily_totals(scope)?);

    let population = store.get_population(scope)?;
    let geometry = store.get_geometry(scope)?;
    lines.push(String::new());
    lines.push(format!(
        "  {:<10} {:>14} ({} locations)",
        "Population",
        format_number(population.total() as f64, 0),
        population.len()
    ));
    lines.push(format!(
        "  {:<10} {:>14} of {} features with data, joined on {}",
        "Map",
        store.choropleth_locations(scope)?.len(),
        geometry.locations().len(),
        geometry.feature_id_key()
    ));

    match store.get_latest(stat, scope, None) {
        Ok(latest) => {
            lines.push(String::new());
            lines.push(format!("{} {} as of {}", latest.location, stat, latest.date));
            latest_lines(&mut lines, scope, &latest);
        }
        Err(e) if e.is_not_found() => {
            lines.push(String::new());
            lines.push(format!("No {} time series for {}", stat, scope));
        }
        Err(e) => return Err(e),
    }
    Ok(render(lines))
}

/// Latest values of every view for one location.
pub fn latest(store: &DerivedStore, scope: Scope, stat: Statistic, location: Option<&str>) -> Result<String> {
    let latest = store.get_latest(stat, scope, location)?;
    let mut lines = vec![format!("{} {} as of {}", latest.location, stat, latest.date)];
    latest_lines(&mut lines, scope, &latest);
    Ok(render(lines))
}

/// One line per location with the latest value of every view.
pub fn table(store: &DerivedStore, scope: Scope, stat: Statistic) -> Result<String> {
    let rows = store.get_all_location_stats(scope, stat)?;
    let mut lines = Vec::with_capacity(rows.len() + 1);
    lines.push(format!(
        "{:<36} {:>14} {:>12} {:>11} {:>11} {:>12}",
        "Location",
        ValueType::Cumulative.label(),
        ValueType::DailyDiff.label(),
        ValueType::DailyPercentChange.label(),
        ValueType::PerCapita.label(),
        ValueType::OnePerN.label()
    ));
    for row in rows {
        lines.push(format!(
            "{:<36} {:>14} {:>12} {:>11} {:>11} {:>12}",
            row.location,
            format_optional(row.value, 0),
            format_optional(row.daily_diff, 0),
            format_optional(row.percent_change, 2),
            format_optional(row.per_capita, 2),
            format_optional(row.one_per_n, 0)
        ));
    }
    Ok(render(lines))
}

fn ranking_lines<V, F>(lines: &mut Vec<String>, ranked: &[RankedLocation<V>], fmt_value: F)
where
    F: Fn(&V) -> String,
{
    for (i, entry) in ranked.iter().enumerate() {
        lines.push(format!("{:>3}. {:<36} {:>14}", i + 1, entry.location, fmt_value(&entry.value)));
    }
}

/// Highest latest-date values of a view.
pub fn top(store: &DerivedStore, scope: Scope, stat: Statistic, value_type: ValueType, n: usize) -> Result<String> {
    let ranked = store.get_top_locations(scope, stat, value_type, n)?;
    let mut lines = vec![format!("Top {} {} by {} ({})", n, scope, stat, value_type)];
    ranking_lines(&mut lines, &ranked, |v| format_number(*v, decimals(value_type)));
    Ok(render(lines))
}

/// Lowest counts of today's daily report.
pub fn bottom(store: &DerivedStore, scope: Scope, stat: Statistic, n: usize) -> Result<String> {
    let ranked = store.get_bottom_locations(scope, stat, n)?;
    let mut lines = vec![format!("Bottom {} {} by {} ({})", n, scope, stat, store.report_date())];
    ranking_lines(&mut lines, &ranked, |v| format_count(*v));
    Ok(render(lines))
}

/// A location with counts but no column in a population view has no
/// population entry.
fn missing_location(store: &DerivedStore, scope: Scope, stat: Statistic, value_type: ValueType, location: &str) -> TrackerError {
    let has_counts = value_type.needs_population()
        && store
            .get_series(scope, stat, ValueType::Cumulative, false)
            .map(|t| t.contains(location))
            .unwrap_or(false);
    if has_counts {
        TrackerError::NotFound(format!("population for {} in {}", location, scope))
    } else {
        TrackerError::NotFound(format!("{} in {} {} {}", location, scope, stat, value_type))
    }
}

/// Date-indexed values of one view, either for one location or the total.
pub fn series(
    store: &DerivedStore,
    scope: Scope,
    stat: Statistic,
    value_type: ValueType,
    location: Option<&str>,
    overall: bool,
) -> Result<String> {
    let table = store.get_series(scope, stat, value_type, overall)?;
    let location = if overall {
        scope.overall_location()
    } else {
        location.unwrap_or_else(|| scope.overall_location())
    };
    let Some(column) = table.column(location) else {
        return Err(missing_location(store, scope, stat, value_type, location));
    };

    let mut lines = vec![format!("{} {} ({})", location, stat, value_type)];
    for (date, value) in table.dates().iter().zip(column) {
        lines.push(format!("{}  {:>14}", date, format_optional(*value, decimals(value_type))));
    }
    Ok(render(lines))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
