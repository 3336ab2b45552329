//! Location reconciliation across sources.
//!
//! Resolves every raw daily row to the key of its scope's grain, using the
//! canonical-name map, and checks the boundary geometry's location list
//! against the daily snapshot. A geometry country absent from the country
//! column gets one attempt at a join repair through the province column;
//! anything still unmatched is logged and left out of the choropleth list.

use std::collections::{BTreeSet, HashSet};

use tracing::{debug, warn};

use tracker_core::models::RawDailyRow;
use tracker_core::names;
use tracker_core::Scope;

use crate::geometry::BoundaryGeometry;

/// Country value of rows that belong to the USA scopes.
pub const US_COUNTRY: &str = "US";

/// Canonical name of `name` for `scope`.
pub fn canonicalize(name: &str, scope: Scope) -> String {
    names::canonicalize(name, scope).into_owned()
}

/// Outcome of reconciling one scope's geometry with its daily rows.
#[derive(Debug, Clone)]
pub struct Reconciliation {
    scope: Scope,
    /// Geometry locations that have data, in geometry order.
    locations: Vec<String>,
    /// Geometry countries found only in the province column.
    repaired: BTreeSet<String>,
    /// Geometry locations with no matching row.
    missed: Vec<String>,
}

impl Reconciliation {
    /// No geometry check; rows resolve through the canonical-name map only.
    pub fn identity(scope: Scope) -> Self {
        Self {
            scope,
            locations: Vec::new(),
            repaired: BTreeSet::new(),
            missed: Vec::new(),
        }
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    /// Locations the choropleth renderer should draw.
    pub fn choropleth_locations(&self) -> &[String] {
        &self.locations
    }

    pub fn repaired(&self) -> impl Iterator<Item = &str> {
        self.repaired.iter().map(String::as_str)
    }

    pub fn missed(&self) -> &[String] {
        &self.missed
    }

    /// Grain key of `row` in this scope, or `None` when the row does not
    /// belong to the scope (non-US rows at USA grain, rows without a county
    /// code at county grain).
    pub fn grain_key(&self, row: &RawDailyRow) -> Option<String> {
        match self.scope {
            Scope::World => {
                if let Some(p) = row.province_state.as_deref() {
                    if self.repaired.contains(p) {
                        return Some(p.to_string());
                    }
                }
                Some(canonicalize(&row.country_region, Scope::World))
            }
            Scope::Usa => (row.country_region == US_COUNTRY)
                .then(|| row.province_state.clone())
                .flatten(),
            Scope::UsCounties => (row.country_region == US_COUNTRY)
                .then(|| row.fips.clone())
                .flatten(),
        }
    }
}

/// Check `geometry` against `rows` for its scope. Never fails: misses are
/// logged and recorded.
pub fn reconcile(geometry: &BoundaryGeometry, rows: &[RawDailyRow]) -> Reconciliation {
    let scope = geometry.scope();
    let mut result = Reconciliation::identity(scope);

    let keys: HashSet<String> = rows.iter().filter_map(|r| result.grain_key(r)).collect();
    let provinces: HashSet<&str> = match scope {
        Scope::World => rows
            .iter()
            .filter_map(|r| r.province_state.as_deref())
            .collect(),
        Scope::Usa | Scope::UsCounties => HashSet::new(),
    };

    for location in geometry.locations() {
        if keys.contains(location) {
            result.locations.push(location.clone());
        } else if provinces.contains(location.as_str()) {
            warn!(
                "{} found in state/province field of dataset, using it as a country",
                location
            );
            result.repaired.insert(location.clone());
            result.locations.push(location.clone());
        } else {
            warn!("{} ({}) not found in dataset", location, scope);
            result.missed.push(location.clone());
        }
    }

    debug!(
        "{}: {} geometry locations matched, {} repaired, {} missed",
        scope,
        result.locations.len() - result.repaired.len(),
        result.repaired.len(),
        result.missed.len()
    );
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::read_boundary_geometry;
    use tracker_core::models::DailyCounts;

    fn row(province: Option<&str>, country: &str, fips: Option<&str>) -> RawDailyRow {
        RawDailyRow {
            fips: fips.map(str::to_string),
            admin2: None,
            province_state: province.map(str::to_string),
            country_region: country.to_string(),
            last_update: None,
            latitude: None,
            longitude: None,
            counts: DailyCounts {
                confirmed: Some(1),
                ..DailyCounts::default()
            },
            combined_key: None,
        }
    }

    fn world_geometry(names: &[&str]) -> BoundaryGeometry {
        let features: Vec<String> = names
            .iter()
            .map(|n| format!(r#"{{"properties":{{"name":"{}"}}}}"#, n))
            .collect();
        let doc = format!(r#"{{"features":[{}]}}"#, features.join(","));
        read_boundary_geometry(Scope::World, "world.json", doc.as_bytes()).unwrap()
    }

    #[test]
    fn test_canonical_names_match_geometry() {
        let rows = vec![row(None, "US", None), row(None, "Korea, South", None)];
        let geo = world_geometry(&["United States of America", "South Korea"]);
        let rec = reconcile(&geo, &rows);
        assert_eq!(
            rec.choropleth_locations(),
            &["United States of America", "South Korea"]
        );
        assert!(rec.missed().is_empty());
    }

    #[test]
    fn test_province_repair() {
        let rows = vec![
            row(None, "Denmark", None),
            row(Some("Greenland"), "Denmark", None),
        ];
        let geo = world_geometry(&["Denmark", "Greenland"]);
        let rec = reconcile(&geo, &rows);
        assert_eq!(rec.choropleth_locations(), &["Denmark", "Greenland"]);
        assert_eq!(rec.repaired().collect::<Vec<_>>(), vec!["Greenland"]);
        assert_eq!(rec.grain_key(&rows[1]).as_deref(), Some("Greenland"));
        assert_eq!(rec.grain_key(&rows[0]).as_deref(), Some("Denmark"));
    }

    #[test]
    fn test_unmatched_location_dropped_not_fatal() {
        let rows = vec![row(None, "Italy", None)];
        let geo = world_geometry(&["Italy", "Antarctica"]);
        let rec = reconcile(&geo, &rows);
        assert_eq!(rec.choropleth_locations(), &["Italy"]);
        assert_eq!(rec.missed(), &["Antarctica"]);
    }

    #[test]
    fn test_grain_keys_for_us_scopes() {
        let county = row(Some("Alabama"), "US", Some("01001"));
        let unassigned = row(Some("Alabama"), "US", None);
        let foreign = row(Some("Ontario"), "Canada", None);

        let usa = Reconciliation::identity(Scope::Usa);
        assert_eq!(usa.grain_key(&county).as_deref(), Some("Alabama"));
        assert_eq!(usa.grain_key(&foreign), None);

        let counties = Reconciliation::identity(Scope::UsCounties);
        assert_eq!(counties.grain_key(&county).as_deref(), Some("01001"));
        assert_eq!(counties.grain_key(&unassigned), None);
        assert_eq!(counties.grain_key(&foreign), None);
    }

    #[test]
    fn test_state_geometry_has_no_province_repair() {
        let rows = vec![row(Some("Alabama"), "US", Some("01001"))];
        let doc = r#"{"features":[{"properties":{"NAME":"Alabama"}},{"properties":{"NAME":"Guam"}}]}"#;
        let geo = read_boundary_geometry(Scope::Usa, "states.json", doc.as_bytes()).unwrap();
        let rec = reconcile(&geo, &rows);
        assert_eq!(rec.choropleth_locations(), &["Alabama"]);
        assert_eq!(rec.missed(), &["Guam"]);
    }
}
