//! Date-indexed location matrices.
//!
//! A [`TimeSeriesTable`] holds one column per location and one row per date.
//! Dates are strictly ascending and every column has exactly one value per
//! date. Columns keep their insertion order, which the builders use to place
//! the scope's overall location first followed by canonical names in
//! ascending order.

use std::collections::HashMap;

use anyhow::anyhow;
use chrono::NaiveDate;

use crate::error::Result;

/// Date × location matrix of values of type `V`.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeriesTable<V> {
    dates: Vec<NaiveDate>,
    locations: Vec<String>,
    columns: Vec<Vec<V>>,
    index: HashMap<String, usize>,
}

/// Cumulative counts as published (after aggregation).
pub type CumulativeTable = TimeSeriesTable<i64>;

/// A derived view; `None` marks an undefined value (no prior day,
/// division by zero, non-finite result).
pub type DerivedTable = TimeSeriesTable<Option<f64>>;

impl<V: Clone> TimeSeriesTable<V> {
    /// Create an empty table over `dates`, which must be strictly ascending.
    pub fn new(dates: Vec<NaiveDate>) -> Result<Self> {
        if dates.windows(2).any(|w| w[0] >= w[1]) {
            return Err(anyhow!("time series dates must be strictly ascending").into());
        }
        Ok(Self {
            dates,
            locations: Vec::new(),
            columns: Vec::new(),
            index: HashMap::new(),
        })
    }

    /// Append a location column. Fails when the length does not match the
    /// date axis or the location already exists.
    pub fn push_column(&mut self, location: impl Into<String>, values: Vec<V>) -> Result<()> {
        let location = location.into();
        if values.len() != self.dates.len() {
            return Err(anyhow!(
                "column '{}' has {} values for {} dates",
                location,
                values.len(),
                self.dates.len()
            )
            .into());
        }
        if self.index.contains_key(&location) {
            return Err(anyhow!("duplicate location column '{}'", location).into());
        }
        self.index.insert(location.clone(), self.columns.len());
        self.locations.push(location);
        self.columns.push(values);
        Ok(())
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn locations(&self) -> &[String] {
        &self.locations
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn contains(&self, location: &str) -> bool {
        self.index.contains_key(location)
    }

    pub fn column(&self, location: &str) -> Option<&[V]> {
        self.index.get(location).map(|&i| self.columns[i].as_slice())
    }

    /// Iterate `(location, column)` pairs in column order.
    pub fn columns(&self) -> impl Iterator<Item = (&str, &[V])> {
        self.locations
            .iter()
            .zip(self.columns.iter())
            .map(|(l, c)| (l.as_str(), c.as_slice()))
    }

    pub fn latest_date(&self) -> Option<NaiveDate> {
        self.dates.last().copied()
    }

    /// Value of `location` on the most recent date.
    pub fn latest(&self, location: &str) -> Option<&V> {
        self.column(location).and_then(|c| c.last())
    }

    pub fn value_at(&self, date: NaiveDate, location: &str) -> Option<&V> {
        let row = self.dates.binary_search(&date).ok()?;
        self.column(location).map(|c| &c[row])
    }

    /// The slice of every location on the row at `row`.
    pub fn row(&self, row: usize) -> impl Iterator<Item = (&str, &V)> {
        self.columns().filter_map(move |(l, c)| c.get(row).map(|v| (l, v)))
    }

    /// A new table restricted to `locations`, in the given order. Unknown
    /// locations are skipped.
    pub fn select(&self, locations: &[&str]) -> Self {
        let mut out = Self {
            dates: self.dates.clone(),
            locations: Vec::new(),
            columns: Vec::new(),
            index: HashMap::new(),
        };
        for loc in locations {
            if let Some(col) = self.column(loc) {
                if !out.index.contains_key(*loc) {
                    out.index.insert(loc.to_string(), out.columns.len());
                    out.locations.push(loc.to_string());
                    out.columns.push(col.to_vec());
                }
            }
        }
        out
    }

    /// Build a table over the same dates by transforming each column. A
    /// column for which `f` returns `None` is left out of the result.
    pub fn filter_map_columns<W, F>(&self, mut f: F) -> TimeSeriesTable<W>
    where
        W: Clone,
        F: FnMut(&str, &[V]) -> Option<Vec<W>>,
    {
        let mut out = TimeSeriesTable {
            dates: self.dates.clone(),
            locations: Vec::new(),
            columns: Vec::new(),
            index: HashMap::new(),
        };
        for (loc, col) in self.columns() {
            if let Some(values) = f(loc, col) {
                debug_assert_eq!(values.len(), col.len());
                out.index.insert(loc.to_string(), out.columns.len());
                out.locations.push(loc.to_string());
                out.columns.push(values);
            }
        }
        out
    }
}
