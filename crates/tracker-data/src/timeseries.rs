//! Cumulative time-series builder.
//!
//! Groups the sub-location rows of a published time series to the grain of
//! a scope and sums them per date. The result has the scope's overall
//! location as its first column, then one column per location in ascending
//! canonical-name order.

use std::collections::BTreeMap;

use tracing::debug;

use tracker_core::table::CumulativeTable;
use tracker_core::{Result, Scope, Statistic, TrackerError};

use crate::reader::{RawSeriesRow, RawTimeSeries, TimeSeriesSchema};
use crate::reconciler::{canonicalize, US_COUNTRY};

/// Layout a scope's time series is published in.
pub fn expected_schema(scope: Scope) -> TimeSeriesSchema {
    match scope {
        Scope::World => TimeSeriesSchema::Global,
        Scope::Usa | Scope::UsCounties => TimeSeriesSchema::Us,
    }
}

/// Grain key of a time-series row, or `None` when the row is not part of
/// the scope.
fn series_key(scope: Scope, row: &RawSeriesRow) -> Option<String> {
    match scope {
        Scope::World => Some(canonicalize(&row.country_region, scope)),
        Scope::Usa => (row.country_region == US_COUNTRY)
            .then(|| row.province_state.clone())
            .flatten(),
        Scope::UsCounties => (row.country_region == US_COUNTRY)
            .then(|| row.fips.clone())
            .flatten(),
    }
}

fn add_into(sums: &mut [i64], values: &[i64], source_name: &str) -> Result<()> {
    for (sum, value) in sums.iter_mut().zip(values) {
        *sum = sum.checked_add(*value).ok_or_else(|| {
            TrackerError::Other(anyhow::anyhow!("{}: count overflow while summing", source_name))
        })?;
    }
    Ok(())
}

/// Build the cumulative table of `stat` at `scope` from `raw`.
///
/// Fails with `NotFound` when the scope does not track `stat`, and with
/// `SchemaMismatch` when `raw` is not in the scope's layout.
pub fn build(scope: Scope, stat: Statistic, source_name: &str, raw: &RawTimeSeries) -> Result<CumulativeTable> {
    if !scope.tracks(stat) {
        return Err(TrackerError::NotFound(format!("{} time series for {}", stat, scope)));
    }
    let expected = expected_schema(scope);
    if raw.schema != expected {
        let column = match expected {
            TimeSeriesSchema::Global => "Country/Region",
            TimeSeriesSchema::Us => "Country_Region",
        };
        return Err(TrackerError::missing_column(source_name, column));
    }

    let width = raw.dates.len();
    let mut groups: BTreeMap<String, Vec<i64>> = BTreeMap::new();
    let mut skipped = 0usize;
    for row in &raw.rows {
        let Some(key) = series_key(scope, row) else {
            skipped += 1;
            continue;
        };
        let sums = groups.entry(key).or_insert_with(|| vec![0; width]);
        add_into(sums, &row.values, source_name)?;
    }
    if skipped > 0 {
        debug!("{}: {} rows outside {} left out", source_name, skipped, scope);
    }

    let mut overall = vec![0i64; width];
    for sums in groups.values() {
        add_into(&mut overall, sums, source_name)?;
    }

    let mut table = CumulativeTable::new(raw.dates.clone())?;
    table.push_column(scope.overall_location(), overall)?;
    for (location, values) in groups {
        table.push_column(location, values)?;
    }

    debug!(
        "{} {}: {} locations x {} dates",
        scope,
        stat,
        table.locations().len() - 1,
        width
    );
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::read_time_series;
    use chrono::NaiveDate;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, 3, day).unwrap()
    }

    const GLOBAL: &str = "\
Province/State,Country/Region,Lat,Long,3/1/20,3/2/20,3/3/20
Hubei,China,30.9,112.2,10,12,15
Beijing,China,40.1,116.4,1,2,3
,Italy,41.8,12.5,5,8,13
,US,40.0,-100.0,0,1,2
,\"Korea, South\",36.0,128.0,4,4,4
";

    const US: &str = "\
UID,iso2,iso3,code3,FIPS,Admin2,Province_State,Country_Region,Lat,Long_,Combined_Key,3/1/20,3/2/20
84001001,US,USA,840,1001.0,Autauga,Alabama,US,32.5,-86.6,\"Autauga, Alabama, US\",1,2
84001003,US,USA,840,1003.0,Baldwin,Alabama,US,30.7,-87.7,\"Baldwin, Alabama, US\",0,3
84090001,US,USA,840,,Unassigned,Alabama,US,0,0,\"Unassigned, Alabama, US\",4,4
84006037,US,USA,840,6037.0,Los Angeles,California,US,34.3,-118.2,\"Los Angeles, California, US\",7,9
";

    fn global() -> RawTimeSeries {
        read_time_series("global.csv", GLOBAL.as_bytes()).unwrap()
    }

    fn us() -> RawTimeSeries {
        read_time_series("us.csv", US.as_bytes()).unwrap()
    }

    #[test]
    fn test_world_overall_first_then_sorted() {
        let table = build(Scope::World, Statistic::Confirmed, "global.csv", &global()).unwrap();
        assert_eq!(
            table.locations(),
            &["Worldwide", "China", "Italy", "South Korea", "United States of America"]
        );
        assert_eq!(table.dates(), &[d(1), d(2), d(3)]);
    }

    #[test]
    fn test_world_sums_provinces() {
        let table = build(Scope::World, Statistic::Confirmed, "global.csv", &global()).unwrap();
        assert_eq!(table.column("China").unwrap(), &[11, 14, 18]);
        assert_eq!(table.column("Worldwide").unwrap(), &[20, 27, 37]);
    }

    #[test]
    fn test_overall_equals_sum_of_locations() {
        let table = build(Scope::World, Statistic::Deaths, "global.csv", &global()).unwrap();
        for row in 0..table.dates().len() {
            let mut values = table.row(row);
            let (_, overall) = values.next().unwrap();
            let sum: i64 = values.map(|(_, v)| *v).sum();
            assert_eq!(*overall, sum);
        }
    }

    #[test]
    fn test_usa_groups_by_state() {
        let table = build(Scope::Usa, Statistic::Confirmed, "us.csv", &us()).unwrap();
        assert_eq!(table.locations(), &["US Total", "Alabama", "California"]);
        assert_eq!(table.column("Alabama").unwrap(), &[5, 9]);
        assert_eq!(table.column("US Total").unwrap(), &[12, 18]);
    }

    #[test]
    fn test_counties_drop_rows_without_code() {
        let table = build(Scope::UsCounties, Statistic::Confirmed, "us.csv", &us()).unwrap();
        assert_eq!(table.locations(), &["US Total", "01001", "01003", "06037"]);
        assert_eq!(table.column("US Total").unwrap(), &[8, 14]);
    }

    #[test]
    fn test_untracked_statistic_is_not_found() {
        let err = build(Scope::Usa, Statistic::Recovered, "us.csv", &us()).unwrap_err();
        assert!(err.is_not_found());
        let err = build(Scope::World, Statistic::Active, "global.csv", &global()).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_wrong_layout_is_schema_mismatch() {
        let err = build(Scope::Usa, Statistic::Confirmed, "global.csv", &global()).unwrap_err();
        assert!(matches!(err, TrackerError::SchemaMismatch { .. }));
    }

    #[test]
    fn test_empty_series_has_zero_overall() {
        let raw = read_time_series("g.csv", b"Province/State,Country/Region,Lat,Long,3/1/20\n").unwrap();
        let table = build(Scope::World, Statistic::Confirmed, "g.csv", &raw).unwrap();
        assert_eq!(table.locations(), &["Worldwide"]);
        assert_eq!(table.column("Worldwide").unwrap(), &[0]);
    }

    #[test]
    fn test_overflowing_sum_is_an_error() {
        let row = |country: &str| RawSeriesRow {
            province_state: None,
            country_region: country.to_string(),
            admin2: None,
            fips: None,
            combined_key: None,
            values: vec![i64::MAX],
        };
        let raw = RawTimeSeries {
            schema: TimeSeriesSchema::Global,
            dates: vec![d(1)],
            rows: vec![row("Italy"), row("Spain")],
        };
        let err = build(Scope::World, Statistic::Confirmed, "g.csv", &raw).unwrap_err();
        assert!(err.to_string().contains("overflow"));
    }
}
