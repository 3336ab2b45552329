//! Processor construction.
//!
//! Fetches every source, then runs the pipeline once per scope:
//! read → reconcile → aggregate → build time series → derive. Construction is
//! all-or-nothing: the store is only returned once every stage has succeeded,
//! and any fatal error leaves nothing published.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info};

use tracker_core::settings::SourceLayout;
use tracker_core::{Result, Scope};
use tracker_data::aggregator::aggregate_with;
use tracker_data::derive::derive;
use tracker_data::geometry::read_boundary_geometry;
use tracker_data::reader::{read_daily_report, read_population, read_time_series, DailyReport};
use tracker_data::reconciler::reconcile;
use tracker_data::timeseries;

use crate::fetch::{fetch_sources, FetchOptions, ScopeSources, SourceBundle};
use crate::store::{DerivedStore, ScopeData};

/// Fetch every source named by `layout` and build the store.
///
/// # Example
/// ```no_run
/// use tracker_core::settings::SourceLayout;
/// use tracker_runtime::fetch::FetchOptions;
/// use tracker_runtime::processor;
///
/// # async fn run() -> tracker_core::Result<()> {
/// let store = processor::load(&SourceLayout::default(), &FetchOptions::default()).await?;
/// println!("report date: {}", store.report_date());
/// # Ok(())
/// # }
/// ```
pub async fn load(layout: &SourceLayout, options: &FetchOptions) -> Result<Arc<DerivedStore>> {
    let started = Instant::now();
    let bundle = fetch_sources(layout, options).await?;
    info!("sources fetched in {:?}", started.elapsed());

    let store = build(&bundle)?;
    info!("store built in {:?}", started.elapsed());
    Ok(Arc::new(store))
}

/// Build the store from already-fetched sources.
pub fn build(bundle: &SourceBundle) -> Result<DerivedStore> {
    let report = read_daily_report(&bundle.daily.name, &bundle.daily.data)?;
    info!(
        "daily report {}: {} rows ({:?} naming)",
        bundle.report_date,
        report.rows.len(),
        report.naming
    );

    let mut scopes = BTreeMap::new();
    for (&scope, sources) in &bundle.scopes {
        scopes.insert(scope, build_scope(scope, sources, &report)?);
    }
    Ok(DerivedStore::new(bundle.report_date, scopes))
}

fn build_scope(scope: Scope, sources: &ScopeSources, report: &DailyReport) -> Result<ScopeData> {
    let geometry = read_boundary_geometry(scope, &sources.geometry.name, &sources.geometry.data)?;
    let reconciliation = reconcile(&geometry, &report.rows);
    let daily = aggregate_with(&report.rows, report.naming, &reconciliation);
    let population = read_population(scope, &sources.population.name, &sources.population.data)?;

    let mut series = BTreeMap::new();
    for (&stat, doc) in &sources.time_series {
        let raw = read_time_series(&doc.name, &doc.data)?;
        let table = timeseries::build(scope, stat, &doc.name, &raw)?;
        let views = derive(&table, scope, Some(&population));
        debug!("{} {}: {:?}", scope, stat, views.shape());
        series.insert(stat, views);
    }

    info!(
        "{}: {} daily locations, {} choropleth locations, {} series",
        scope,
        daily.rows.len(),
        reconciliation.choropleth_locations().len(),
        series.len()
    );

    Ok(ScopeData {
        series,
        daily,
        geometry,
        reconciliation,
        population,
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;

    use chrono::NaiveDate;
    use tempfile::TempDir;
    use tracker_core::settings::SourceLocation;
    use tracker_core::{Statistic, TrackerError, ValueType};

    const DAILY: &str = "\
FIPS,Admin2,Province_State,Country_Region,Last_Update,Lat,Long_,Confirmed,Deaths,Recovered,Active,Combined_Key
01001,Autauga,Alabama,US,2020-04-15 22:56:51,32.5,-86.6,26,1,0,25,\"Autauga, Alabama, US\"
06037,Los Angeles,California,US,2020-04-15 22:56:51,34.3,-118.2,10496,402,0,10094,\"Los Angeles, California, US\"
,,Hubei,China,2020-04-15 22:56:51,30.9,112.2,67803,3222,63507,1074,\"Hubei, China\"
,,Greenland,Denmark,2020-04-15 22:56:51,71.7,-42.6,11,0,11,0,\"Greenland, Denmark\"
,,,Italy,2020-04-15 22:56:51,41.8,12.5,165155,21645,38092,105418,Italy
";

    const GLOBAL_CONFIRMED: &str = "\
Province/State,Country/Region,Lat,Long,4/13/20,4/14/20,4/15/20
Hubei,China,30.9,112.2,67803,67803,67803
,Italy,41.8,12.5,159516,162488,165155
,US,40.0,-100.0,580619,607670,636350
";

    const GLOBAL_DEATHS: &str = "\
Province/State,Country/Region,Lat,Long,4/13/20,4/14/20,4/15/20
Hubei,China,30.9,112.2,3212,3222,3222
,Italy,41.8,12.5,20465,21067,21645
,US,40.0,-100.0,23528,25831,28326
";

    const GLOBAL_RECOVERED: &str = "\
Province/State,Country/Region,Lat,Long,4/13/20,4/14/20,4/15/20
Hubei,China,30.9,112.2,63000,63200,63507
,Italy,41.8,12.5,35435,37130,38092
,US,40.0,-100.0,43482,47763,52096
";

    const US_CONFIRMED: &str = "\
UID,iso2,iso3,code3,FIPS,Admin2,Province_State,Country_Region,Lat,Long_,Combined_Key,4/14/20,4/15/20
84001001,US,USA,840,1001.0,Autauga,Alabama,US,32.5,-86.6,\"Autauga, Alabama, US\",24,26
84006037,US,USA,840,6037.0,Los Angeles,California,US,34.3,-118.2,\"Los Angeles, California, US\",10047,10496
";

    const US_DEATHS: &str = "\
UID,iso2,iso3,code3,FIPS,Admin2,Province_State,Country_Region,Lat,Long_,Combined_Key,Population,4/14/20,4/15/20
84001001,US,USA,840,1001.0,Autauga,Alabama,US,32.5,-86.6,\"Autauga, Alabama, US\",55869,1,1
84006037,US,USA,840,6037.0,Los Angeles,California,US,34.3,-118.2,\"Los Angeles, California, US\",10039107,360,402
";

    fn write(location: SourceLocation, body: &str) {
        let SourceLocation::File(path) = location else {
            panic!("expected a file location");
        };
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, body).unwrap();
    }

    fn fixture(root: &Path, with_daily: bool) -> SourceLayout {
        let layout = SourceLayout::default().with_root(root.to_string_lossy().into_owned());
        let today = NaiveDate::from_ymd_opt(2020, 4, 15).unwrap();
        if with_daily {
            write(layout.daily_report(today), DAILY);
        }

        let ts = |scope, stat| layout.time_series(scope, stat).unwrap();
        write(ts(Scope::World, Statistic::Confirmed), GLOBAL_CONFIRMED);
        write(ts(Scope::World, Statistic::Deaths), GLOBAL_DEATHS);
        write(ts(Scope::World, Statistic::Recovered), GLOBAL_RECOVERED);
        write(ts(Scope::Usa, Statistic::Confirmed), US_CONFIRMED);
        write(ts(Scope::Usa, Statistic::Deaths), US_DEATHS);

        write(
            layout.geometry(Scope::World),
            r#"{"type":"FeatureCollection","features":[
                {"properties":{"name":"China"}},
                {"properties":{"name":"Italy"}},
                {"properties":{"name":"United States of America"}},
                {"properties":{"name":"Greenland"}},
                {"properties":{"name":"Antarctica"}}
            ]}"#,
        );
        write(
            layout.geometry(Scope::Usa),
            r#"{"features":[{"properties":{"NAME":"Alabama"}},{"properties":{"NAME":"California"}}]}"#,
        );
        write(
            layout.geometry(Scope::UsCounties),
            r#"{"features":[{"properties":{"STATE":"01","COUNTY":"001"}},{"properties":{"STATE":"06","COUNTY":"037"}}]}"#,
        );

        write(
            layout.population(Scope::World),
            "Location,Population\nChina,1439323776\nItaly,60461826\nUnited States of America,331002651\n",
        );
        write(
            layout.population(Scope::Usa),
            "Province_State,Population\nAlabama,4903185\nCalifornia,39512223\n",
        );
        write(
            layout.population(Scope::UsCounties),
            "FIPS,Population\n1001,55869\n6037,10039107\n",
        );
        layout
    }

    fn options() -> FetchOptions {
        FetchOptions::new(5, NaiveDate::from_ymd_opt(2020, 4, 15))
    }

    // ── End-to-end construction ──────────────────────────────────────────

    #[tokio::test]
    async fn test_load_builds_every_scope() {
        let dir = TempDir::new().unwrap();
        let layout = fixture(dir.path(), true);
        let store = load(&layout, &options()).await.unwrap();

        assert_eq!(store.scopes().collect::<Vec<_>>(), Scope::ALL.to_vec());
        assert_eq!(
            store.available_statistics(Scope::World).unwrap(),
            vec![Statistic::Confirmed, Statistic::Deaths, Statistic::Recovered]
        );
        assert_eq!(
            store.available_statistics(Scope::Usa).unwrap(),
            vec![Statistic::Confirmed, Statistic::Deaths]
        );
    }

    #[tokio::test]
    async fn test_overall_equals_sum_everywhere() {
        let dir = TempDir::new().unwrap();
        let store = load(&fixture(dir.path(), true), &options()).await.unwrap();

        for scope in Scope::ALL {
            for stat in store.available_statistics(scope).unwrap() {
                let table = store.get_series(scope, stat, ValueType::Cumulative, false).unwrap();
                for row in 0..table.dates().len() {
                    let mut values = table.row(row);
                    let (name, overall) = values.next().unwrap();
                    assert_eq!(name, scope.overall_location());
                    let sum: f64 = values.map(|(_, v)| v.unwrap()).sum();
                    assert_eq!(overall.unwrap(), sum);
                }
            }
        }
    }

    #[tokio::test]
    async fn test_untracked_series_is_not_found() {
        let dir = TempDir::new().unwrap();
        let store = load(&fixture(dir.path(), true), &options()).await.unwrap();
        let err = store
            .get_series(Scope::Usa, Statistic::Recovered, ValueType::Cumulative, false)
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_reconciliation_outcome() {
        let dir = TempDir::new().unwrap();
        let store = load(&fixture(dir.path(), true), &options()).await.unwrap();

        let world = store.choropleth_locations(Scope::World).unwrap();
        assert!(world.iter().any(|l| l == "Greenland"));
        assert!(!world.iter().any(|l| l == "Antarctica"));

        let daily = store.get_daily_report(Scope::World).unwrap();
        assert!(daily.get("Greenland").is_some());
        assert!(daily.get("United States of America").is_some());

        let usa = store.get_daily_totals(Scope::Usa).unwrap();
        assert_eq!(usa.confirmed, Some(10522));
        assert_eq!(
            store.get_geometry(Scope::UsCounties).unwrap().document()["features"][0]["id"],
            "01001"
        );
    }

    #[tokio::test]
    async fn test_latest_and_rankings() {
        let dir = TempDir::new().unwrap();
        let store = load(&fixture(dir.path(), true), &options()).await.unwrap();

        let latest = store.get_latest(Statistic::Confirmed, Scope::World, None).unwrap();
        assert_eq!(latest.value, Some(869_308.0));
        assert_eq!(latest.daily_diff, Some((869_308 - 837_961) as f64));

        let top = store
            .get_top_locations(Scope::Usa, Statistic::Confirmed, ValueType::Cumulative, 5)
            .unwrap();
        assert_eq!(top[0].location, "California");
        assert_eq!(top.len(), 2);

        let bottom = store.get_bottom_locations(Scope::UsCounties, Statistic::Deaths, 1).unwrap();
        assert_eq!(bottom[0].location, "01001");
    }

    #[tokio::test]
    async fn test_falls_back_to_yesterday() {
        let dir = TempDir::new().unwrap();
        let layout = fixture(dir.path(), false);
        write(
            layout.daily_report(NaiveDate::from_ymd_opt(2020, 4, 14).unwrap()),
            DAILY,
        );
        let store = load(&layout, &options()).await.unwrap();
        assert_eq!(store.report_date(), NaiveDate::from_ymd_opt(2020, 4, 14).unwrap());
    }

    #[tokio::test]
    async fn test_missing_sources_abort_construction() {
        let dir = TempDir::new().unwrap();
        let layout = fixture(dir.path(), false);
        let err = load(&layout, &options()).await.unwrap_err();
        assert!(matches!(err, TrackerError::SourceUnavailable { .. }));

        let layout = fixture(dir.path(), true);
        let SourceLocation::File(pop) = layout.population(Scope::Usa) else {
            panic!("expected a file location");
        };
        fs::remove_file(pop).unwrap();
        let err = load(&layout, &options()).await.unwrap_err();
        assert!(matches!(err, TrackerError::SourceUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_malformed_series_is_fatal() {
        let dir = TempDir::new().unwrap();
        let layout = fixture(dir.path(), true);
        write(
            layout.time_series(Scope::World, Statistic::Deaths).unwrap(),
            "Province/State,Country/Region,Lat,Long,4/15/20\n,Italy,41.8,12.5,lots\n",
        );
        let err = load(&layout, &options()).await.unwrap_err();
        assert!(matches!(err, TrackerError::MalformedValue { .. }));
    }
}
