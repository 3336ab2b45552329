//! CSV source readers.
//!
//! Each reader takes the raw bytes of one published document and produces a
//! typed in-memory table. Headers are resolved once per document; a missing
//! required column is a [`TrackerError::SchemaMismatch`] and a cell that
//! should hold a number or a date but does not is a
//! [`TrackerError::MalformedValue`]. Only optional identifying fields may be
//! empty.

use chrono::{NaiveDate, NaiveDateTime};
use csv::{ReaderBuilder, StringRecord};
use tracing::debug;

use tracker_core::models::{normalize_admin_code, DailyCounts, LocationNaming, RawDailyRow};
use tracker_core::names;
use tracker_core::population::PopulationTable;
use tracker_core::{Result, Scope, Statistic, TrackerError};

use crate::reconciler::US_COUNTRY;

// ── Daily snapshot ────────────────────────────────────────────────────────────

/// A parsed daily snapshot.
#[derive(Debug, Clone)]
pub struct DailyReport {
    /// How rows of this document are named for display.
    pub naming: LocationNaming,
    pub rows: Vec<RawDailyRow>,
}

/// Column positions of a daily snapshot, resolved from its header.
struct DailyColumns {
    fips: Option<usize>,
    admin2: Option<usize>,
    province_state: Option<usize>,
    country_region: usize,
    last_update: Option<usize>,
    latitude: Option<usize>,
    longitude: Option<usize>,
    combined_key: Option<usize>,
    stats: [(Statistic, usize); 4],
}

impl DailyColumns {
    fn resolve(source_name: &str, headers: &StringRecord) -> Result<Self> {
        let find = |names: &[&str]| find_column(headers, names);
        let require = |names: &[&str]| {
            find(names).ok_or_else(|| TrackerError::missing_column(source_name, names[0]))
        };

        let mut stats = [(Statistic::Confirmed, 0); 4];
        for (slot, stat) in stats.iter_mut().zip(Statistic::ALL) {
            *slot = (stat, require(&[stat.daily_column()])?);
        }

        Ok(Self {
            fips: find(&["FIPS"]),
            admin2: find(&["Admin2"]),
            province_state: find(&["Province_State", "Province/State"]),
            country_region: require(&["Country_Region", "Country/Region"])?,
            last_update: find(&["Last_Update", "Last Update"]),
            latitude: find(&["Lat", "Latitude"]),
            longitude: find(&["Long_", "Longitude"]),
            combined_key: find(&["Combined_Key"]),
            stats,
        })
    }

    fn naming(&self) -> LocationNaming {
        if self.combined_key.is_some() {
            LocationNaming::CombinedKey
        } else {
            LocationNaming::ProvinceCountry
        }
    }
}

/// Parse a daily snapshot document.
pub fn read_daily_report(source_name: &str, data: &[u8]) -> Result<DailyReport> {
    let mut reader = ReaderBuilder::new().trim(csv::Trim::All).from_reader(data);
    let headers = clean_headers(reader.headers()?);
    let columns = DailyColumns::resolve(source_name, &headers)?;

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let line = line_of(&record);
        let cell = |idx: Option<usize>| idx.and_then(|i| non_empty(&record, i));

        let country_region = cell(Some(columns.country_region)).ok_or_else(|| {
            TrackerError::MalformedValue {
                source_name: source_name.to_string(),
                line,
                column: headers[columns.country_region].to_string(),
                value: String::new(),
            }
        })?;

        let mut counts = DailyCounts::default();
        for (stat, idx) in columns.stats {
            let value = parse_optional(source_name, line, &headers, idx, &record, parse_count)?;
            counts.set(stat, value);
        }

        rows.push(RawDailyRow {
            fips: cell(columns.fips).and_then(|f| normalize_admin_code(&f)),
            admin2: cell(columns.admin2),
            province_state: cell(columns.province_state),
            country_region,
            last_update: match columns.last_update {
                Some(i) => parse_optional(source_name, line, &headers, i, &record, parse_timestamp)?,
                None => None,
            },
            latitude: match columns.latitude {
                Some(i) => parse_optional(source_name, line, &headers, i, &record, parse_float)?,
                None => None,
            },
            longitude: match columns.longitude {
                Some(i) => parse_optional(source_name, line, &headers, i, &record, parse_float)?,
                None => None,
            },
            counts,
            combined_key: cell(columns.combined_key),
        });
    }

    debug!("{}: {} daily rows", source_name, rows.len());
    Ok(DailyReport {
        naming: columns.naming(),
        rows,
    })
}

// ── Time series ───────────────────────────────────────────────────────────────

/// Identifying-column layout of a time-series document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeSeriesSchema {
    /// `Province/State, Country/Region, Lat, Long, <dates>`
    Global,
    /// `UID, iso2, iso3, code3, FIPS, Admin2, Province_State, Country_Region,
    /// Lat, Long_, Combined_Key, [Population], <dates>`
    Us,
}

impl TimeSeriesSchema {
    fn detect(source_name: &str, headers: &StringRecord) -> Result<Self> {
        if find_column(headers, &["Country/Region"]).is_some() {
            Ok(Self::Global)
        } else if find_column(headers, &["Country_Region"]).is_some() {
            Ok(Self::Us)
        } else {
            Err(TrackerError::missing_column(source_name, "Country/Region"))
        }
    }

    /// Columns that are not dates.
    fn id_columns(&self) -> &'static [&'static str] {
        match self {
            Self::Global => &["Province/State", "Country/Region", "Lat", "Long"],
            Self::Us => &[
                "UID",
                "iso2",
                "iso3",
                "code3",
                "FIPS",
                "Admin2",
                "Province_State",
                "Country_Region",
                "Lat",
                "Long_",
                "Combined_Key",
                "Population",
            ],
        }
    }

    fn province_column(&self) -> &'static str {
        match self {
            Self::Global => "Province/State",
            Self::Us => "Province_State",
        }
    }

    fn country_column(&self) -> &'static str {
        match self {
            Self::Global => "Country/Region",
            Self::Us => "Country_Region",
        }
    }
}

/// One sub-location row of a time-series document.
#[derive(Debug, Clone, PartialEq)]
pub struct RawSeriesRow {
    pub province_state: Option<String>,
    pub country_region: String,
    pub admin2: Option<String>,
    /// Normalised 5-character county code (US schema only).
    pub fips: Option<String>,
    pub combined_key: Option<String>,
    /// Cumulative counts, aligned with [`RawTimeSeries::dates`].
    pub values: Vec<i64>,
}

/// A `{sub-location row} × {date column}` matrix as published.
#[derive(Debug, Clone)]
pub struct RawTimeSeries {
    pub schema: TimeSeriesSchema,
    /// Strictly ascending.
    pub dates: Vec<NaiveDate>,
    pub rows: Vec<RawSeriesRow>,
}

/// Parse a time-series document. Date columns may appear in any order; the
/// result is sorted by date.
pub fn read_time_series(source_name: &str, data: &[u8]) -> Result<RawTimeSeries> {
    let mut reader = ReaderBuilder::new().trim(csv::Trim::All).from_reader(data);
    let headers = clean_headers(reader.headers()?);
    let schema = TimeSeriesSchema::detect(source_name, &headers)?;
    let id_columns = schema.id_columns();

    let mut date_columns: Vec<(NaiveDate, usize)> = Vec::new();
    for (idx, name) in headers.iter().enumerate() {
        if id_columns.contains(&name) {
            continue;
        }
        let date = parse_series_date(name).ok_or_else(|| TrackerError::MalformedValue {
            source_name: source_name.to_string(),
            line: 1,
            column: name.to_string(),
            value: name.to_string(),
        })?;
        date_columns.push((date, idx));
    }
    date_columns.sort_by_key(|(date, _)| *date);
    if let Some(w) = date_columns.windows(2).find(|w| w[0].0 == w[1].0) {
        return Err(TrackerError::MalformedValue {
            source_name: source_name.to_string(),
            line: 1,
            column: headers[w[1].1].to_string(),
            value: format!("duplicate date {}", w[1].0),
        });
    }

    let country_idx = find_column(&headers, &[schema.country_column()])
        .ok_or_else(|| TrackerError::missing_column(source_name, schema.country_column()))?;
    let province_idx = find_column(&headers, &[schema.province_column()]);
    let admin2_idx = find_column(&headers, &["Admin2"]);
    let fips_idx = find_column(&headers, &["FIPS"]);
    let key_idx = find_column(&headers, &["Combined_Key"]);

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let line = line_of(&record);
        let cell = |idx: Option<usize>| idx.and_then(|i| non_empty(&record, i));

        let mut values = Vec::with_capacity(date_columns.len());
        for &(_, idx) in &date_columns {
            let raw = record.get(idx).unwrap_or("");
            let value = parse_count(raw).ok_or_else(|| TrackerError::MalformedValue {
                source_name: source_name.to_string(),
                line,
                column: headers[idx].to_string(),
                value: raw.to_string(),
            })?;
            values.push(value);
        }

        let country_region = cell(Some(country_idx)).ok_or_else(|| TrackerError::MalformedValue {
            source_name: source_name.to_string(),
            line,
            column: headers[country_idx].to_string(),
            value: String::new(),
        })?;

        rows.push(RawSeriesRow {
            province_state: cell(province_idx),
            country_region,
            admin2: cell(admin2_idx),
            fips: cell(fips_idx).and_then(|f| normalize_admin_code(&f)),
            combined_key: cell(key_idx),
            values,
        });
    }

    debug!(
        "{}: {:?} schema, {} rows x {} dates",
        source_name,
        schema,
        rows.len(),
        date_columns.len()
    );

    Ok(RawTimeSeries {
        schema,
        dates: date_columns.into_iter().map(|(d, _)| d).collect(),
        rows,
    })
}

// ── Population ────────────────────────────────────────────────────────────────

/// Column positions of a population document, resolved for one scope.
///
/// Besides plain `Location,Population` tables, the CSSE lookup-table layout
/// is accepted: it lists countries, states and counties in one document, so
/// rows are kept only at the scope's grain.
struct PopulationColumns {
    location: usize,
    population: usize,
    country: Option<usize>,
    province: Option<usize>,
    admin2: Option<usize>,
}

impl PopulationColumns {
    fn resolve(scope: Scope, source_name: &str, headers: &StringRecord) -> Result<Self> {
        let location_names: &[&str] = match scope {
            Scope::World => &["Location", "Country_Region", "Country/Region"],
            Scope::Usa => &["Location", "Province_State", "Province/State"],
            Scope::UsCounties => &["Location", "FIPS"],
        };
        Ok(Self {
            location: find_column(headers, location_names)
                .ok_or_else(|| TrackerError::missing_column(source_name, location_names[0]))?,
            population: find_column(headers, &["Population"])
                .ok_or_else(|| TrackerError::missing_column(source_name, "Population"))?,
            country: find_column(headers, &["Country_Region", "Country/Region"]),
            province: find_column(headers, &["Province_State", "Province/State"]),
            admin2: find_column(headers, &["Admin2"]),
        })
    }

    fn at_grain(&self, scope: Scope, record: &StringRecord) -> bool {
        let filled = |idx: Option<usize>| idx.and_then(|i| non_empty(record, i)).is_some();
        let in_us = self
            .country
            .and_then(|i| non_empty(record, i))
            .map_or(true, |c| c == US_COUNTRY);
        match scope {
            Scope::World => !filled(self.province),
            Scope::Usa => in_us && !filled(self.admin2),
            Scope::UsCounties => in_us && (self.admin2.is_none() || filled(self.admin2)),
        }
    }
}

/// Parse a population document. The location column depends on the scope:
/// `Location` or the country column for [`Scope::World`], `Location` or the
/// state column for [`Scope::Usa`], `Location` or `FIPS` for
/// [`Scope::UsCounties`]. Names are canonicalised; county locations are
/// normalised county codes. Rows with an empty population are skipped.
pub fn read_population(scope: Scope, source_name: &str, data: &[u8]) -> Result<PopulationTable> {
    let mut reader = ReaderBuilder::new().trim(csv::Trim::All).from_reader(data);
    let headers = clean_headers(reader.headers()?);
    let columns = PopulationColumns::resolve(scope, source_name, &headers)?;

    let mut entries = Vec::new();
    let mut skipped = 0usize;
    for record in reader.records() {
        let record = record?;
        let line = line_of(&record);
        if !columns.at_grain(scope, &record) {
            skipped += 1;
            continue;
        }
        let Some(raw_location) = non_empty(&record, columns.location) else {
            debug!("{}: line {} has no location, skipped", source_name, line);
            continue;
        };
        let location = match scope {
            Scope::UsCounties => match normalize_admin_code(&raw_location) {
                Some(code) => code,
                None => {
                    debug!("{}: line {} has no county code, skipped", source_name, line);
                    continue;
                }
            },
            Scope::World | Scope::Usa => names::canonicalize(&raw_location, scope).into_owned(),
        };
        let raw = record.get(columns.population).unwrap_or("");
        if raw.is_empty() {
            debug!("{}: line {} has no population, skipped", source_name, line);
            continue;
        }
        let population = parse_count(raw)
            .and_then(|p| u64::try_from(p).ok())
            .ok_or_else(|| TrackerError::MalformedValue {
                source_name: source_name.to_string(),
                line,
                column: headers[columns.population].to_string(),
                value: raw.to_string(),
            })?;
        entries.push((location, population));
    }

    let table = PopulationTable::from_entries(entries);
    debug!(
        "{}: {} locations, total population {}, {} rows at another grain",
        source_name,
        table.len(),
        table.total(),
        skipped
    );
    Ok(table)
}

// ── Internal helpers ──────────────────────────────────────────────────────────

/// Strip a UTF-8 byte-order mark from the first header.
fn clean_headers(headers: &StringRecord) -> StringRecord {
    headers
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').trim())
        .collect()
}

fn find_column(headers: &StringRecord, names: &[&str]) -> Option<usize> {
    names
        .iter()
        .find_map(|name| headers.iter().position(|h| h == *name))
}

fn line_of(record: &StringRecord) -> u64 {
    record.position().map(|p| p.line()).unwrap_or(0)
}

fn non_empty(record: &StringRecord, idx: usize) -> Option<String> {
    record
        .get(idx)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Parse an optional cell: empty is `None`, unparseable is an error.
fn parse_optional<T>(
    source_name: &str,
    line: u64,
    headers: &StringRecord,
    idx: usize,
    record: &StringRecord,
    parse: fn(&str) -> Option<T>,
) -> Result<Option<T>> {
    let raw = record.get(idx).unwrap_or("");
    if raw.is_empty() {
        return Ok(None);
    }
    parse(raw).map(Some).ok_or_else(|| TrackerError::MalformedValue {
        source_name: source_name.to_string(),
        line,
        column: headers.get(idx).unwrap_or("").to_string(),
        value: raw.to_string(),
    })
}

/// Largest magnitude a published count may have. Keeps every sum over a
/// document well inside `i64`.
const MAX_COUNT: i64 = 1_000_000_000_000;

/// Integer count; accepts float renderings with no fractional part.
fn parse_count(raw: &str) -> Option<i64> {
    let value = match raw.parse::<i64>() {
        Ok(v) => v,
        Err(_) => {
            let f = raw.parse::<f64>().ok()?;
            if !f.is_finite() || f.fract() != 0.0 || f.abs() > MAX_COUNT as f64 {
                return None;
            }
            f as i64
        }
    };
    (value.abs() <= MAX_COUNT).then_some(value)
}

fn parse_float(raw: &str) -> Option<f64> {
    raw.parse::<f64>().ok().filter(|f| f.is_finite())
}

fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    const FORMATS: &[&str] = &[
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%m/%d/%Y %H:%M",
        "%m/%d/%y %H:%M",
        "%m/%d/%Y %H:%M:%S",
    ];
    FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
}

/// Time-series headers are `M/D/YY`; four-digit years are accepted too.
fn parse_series_date(raw: &str) -> Option<NaiveDate> {
    let year = raw.split('/').nth(2)?;
    let fmt = if year.len() == 4 { "%m/%d/%Y" } else { "%m/%d/%y" };
    NaiveDate::parse_from_str(raw, fmt).ok()
}

// ── Tests ─────────────────────────────────────────────────────────────────────
