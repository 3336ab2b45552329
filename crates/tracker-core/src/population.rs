use std::collections::BTreeMap;

use crate::models::Scope;

/// Name of the synthetic row that holds the sum of all populations.
pub const TOTAL_ROW: &str = "Total";

/// Canonical location name → population, for one scope.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PopulationTable {
    entries: BTreeMap<String, u64>,
    total: u64,
}

impl PopulationTable {
    /// Build a table from `(location, population)` pairs. A published
    /// `Total` row is ignored and replaced by the computed sum; repeated
    /// locations keep their last value.
    pub fn from_entries<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (S, u64)>,
        S: Into<String>,
    {
        let entries: BTreeMap<String, u64> = entries
            .into_iter()
            .map(|(loc, pop)| (loc.into(), pop))
            .filter(|(loc, _)| loc != TOTAL_ROW)
            .collect();
        let total = entries.values().sum();
        Self { entries, total }
    }

    pub fn get(&self, location: &str) -> Option<u64> {
        if location == TOTAL_ROW {
            return Some(self.total);
        }
        self.entries.get(location).copied()
    }

    /// Population for a location of `scope`, resolving the scope's overall
    /// location to the synthetic total.
    pub fn for_location(&self, scope: Scope, location: &str) -> Option<u64> {
        if location == scope.overall_location() {
            Some(self.total)
        } else {
            self.get(location)
        }
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn locations(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}
