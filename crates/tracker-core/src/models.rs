use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::formatting::format_count;

/// Line separator used in hover summaries; the rendering collaborator treats
/// the summary as HTML.
pub const HOVER_LINE_BREAK: &str = "<br>";

/// Geographic granularity of analysis.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum Scope {
    /// Grain = country.
    World,
    /// Grain = state / province of the United States.
    Usa,
    /// Grain = county, keyed by its 5-character FIPS code.
    UsCounties,
}

impl Scope {
    pub const ALL: [Scope; 3] = [Scope::World, Scope::Usa, Scope::UsCounties];

    /// Human-readable scope name.
    pub fn label(&self) -> &'static str {
        match self {
            Scope::World => "Worldwide",
            Scope::Usa => "United States",
            Scope::UsCounties => "US Counties",
        }
    }

    /// Name of the synthetic location that holds the sum over the scope.
    pub fn overall_location(&self) -> &'static str {
        match self {
            Scope::World => "Worldwide",
            Scope::Usa | Scope::UsCounties => "US Total",
        }
    }

    /// Per-capita values are reported "per N people" with this N.
    pub fn per_capita_multiplier(&self) -> f64 {
        match self {
            Scope::World => 100_000.0,
            Scope::Usa => 10_000.0,
            Scope::UsCounties => 1_000.0,
        }
    }

    /// Statistics for which the publisher provides a time series at this
    /// scope. Anything else is reported as `NotFound`, never zero-filled.
    pub fn tracked_statistics(&self) -> &'static [Statistic] {
        match self {
            Scope::World => &[Statistic::Confirmed, Statistic::Deaths, Statistic::Recovered],
            Scope::Usa | Scope::UsCounties => &[Statistic::Confirmed, Statistic::Deaths],
        }
    }

    pub fn tracks(&self, stat: Statistic) -> bool {
        self.tracked_statistics().contains(&stat)
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A reported epidemiological count.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, clap::ValueEnum,
)]
pub enum Statistic {
    Confirmed,
    Deaths,
    Recovered,
    Active,
}

impl Statistic {
    pub const ALL: [Statistic; 4] = [
        Statistic::Confirmed,
        Statistic::Deaths,
        Statistic::Recovered,
        Statistic::Active,
    ];

    /// Column name of this statistic in the daily snapshot.
    pub fn daily_column(&self) -> &'static str {
        match self {
            Statistic::Confirmed => "Confirmed",
            Statistic::Deaths => "Deaths",
            Statistic::Recovered => "Recovered",
            Statistic::Active => "Active",
        }
    }
}

impl fmt::Display for Statistic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.daily_column())
    }
}

/// A view computed from a cumulative series.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, clap::ValueEnum,
)]
pub enum ValueType {
    Cumulative,
    DailyDiff,
    DailyPercentChange,
    PerCapita,
    OnePerN,
}

impl ValueType {
    pub const ALL: [ValueType; 5] = [
        ValueType::Cumulative,
        ValueType::DailyDiff,
        ValueType::DailyPercentChange,
        ValueType::PerCapita,
        ValueType::OnePerN,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            ValueType::Cumulative => "Total",
            ValueType::DailyDiff => "Change",
            ValueType::DailyPercentChange => "Change (%)",
            ValueType::PerCapita => "Per Capita",
            ValueType::OnePerN => "1 Per N",
        }
    }

    /// Whether this view depends on a population join.
    pub fn needs_population(&self) -> bool {
        matches!(self, ValueType::PerCapita | ValueType::OnePerN)
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ── Daily snapshot rows ───────────────────────────────────────────────────────

/// The four statistic counts of one daily row. A `None` means the publisher
/// left the cell empty.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyCounts {
    pub confirmed: Option<i64>,
    pub deaths: Option<i64>,
    pub recovered: Option<i64>,
    pub active: Option<i64>,
}

impl DailyCounts {
    pub fn get(&self, stat: Statistic) -> Option<i64> {
        match stat {
            Statistic::Confirmed => self.confirmed,
            Statistic::Deaths => self.deaths,
            Statistic::Recovered => self.recovered,
            Statistic::Active => self.active,
        }
    }

    pub fn set(&mut self, stat: Statistic, value: Option<i64>) {
        match stat {
            Statistic::Confirmed => self.confirmed = value,
            Statistic::Deaths => self.deaths = value,
            Statistic::Recovered => self.recovered = value,
            Statistic::Active => self.active = value,
        }
    }

    /// `true` when every count is missing.
    pub fn is_empty(&self) -> bool {
        Statistic::ALL.iter().all(|s| self.get(*s).is_none())
    }

    /// Sum `other` into `self`. A count stays `None` only while every
    /// contributor is missing it.
    pub fn accumulate(&mut self, other: &DailyCounts) {
        for stat in Statistic::ALL {
            let merged = match (self.get(stat), other.get(stat)) {
                (Some(a), Some(b)) => Some(a + b),
                (a, b) => a.or(b),
            };
            self.set(stat, merged);
        }
    }
}

/// One administrative unit's latest snapshot as published.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawDailyRow {
    /// Normalised 5-character county code, when published.
    pub fips: Option<String>,
    pub admin2: Option<String>,
    pub province_state: Option<String>,
    pub country_region: String,
    pub last_update: Option<NaiveDateTime>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub counts: DailyCounts,
    pub combined_key: Option<String>,
}

/// How a daily source names its rows for display. Resolved once from the
/// header of the source, never per row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocationNaming {
    /// The source carries a `Combined_Key` column.
    CombinedKey,
    /// Only `Province_State` / `Country_Region` are available.
    ProvinceCountry,
}

impl LocationNaming {
    /// Display name of `row`; `key` is used when the row carries no name of
    /// its own under this naming scheme.
    pub fn display_name(&self, row: &RawDailyRow, key: &str) -> String {
        match self {
            LocationNaming::CombinedKey => row
                .combined_key
                .clone()
                .filter(|k| !k.is_empty())
                .unwrap_or_else(|| key.to_string()),
            LocationNaming::ProvinceCountry => match row.province_state.as_deref() {
                Some(p) if !p.is_empty() => format!("{}, {}", p, row.country_region),
                _ => key.to_string(),
            },
        }
    }
}

/// Human-readable multi-line summary shown when hovering a location.
pub fn hover_text(location: &str, counts: &DailyCounts) -> String {
    let mut parts = vec![location.to_string()];
    for stat in Statistic::ALL {
        let value = counts
            .get(stat)
            .map(format_count)
            .unwrap_or_else(|| "n/a".to_string());
        parts.push(format!("{} = {}", stat, value));
    }
    parts.join(HOVER_LINE_BREAK)
}

/// Normalise a published county code to its 5-character form.
///
/// Accepts `1001`, `01001` and `1001.0`. Returns `None` for empty or
/// non-numeric values.
pub fn normalize_admin_code(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let digits = trimmed.strip_suffix(".0").unwrap_or(trimmed);
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let stripped = digits.trim_start_matches('0');
    let code = if stripped.is_empty() { "0" } else { stripped };
    if code.len() > 5 {
        return Some(code.to_string());
    }
    Some(format!("{:0>5}", code))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
