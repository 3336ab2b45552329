use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use clap::Parser;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TrackerError};
use crate::models::{Scope, Statistic, ValueType};

// ── Settings (CLI) ─────────────────────────────────────────────────────────────

/// Epidemiological statistics from the CSSE daily reports and time series
#[derive(Parser, Debug, Clone)]
#[command(
    name = "covid-tracker",
    about = "Epidemiological statistics from the CSSE daily reports and time series",
    version
)]
pub struct Settings {
    /// Root directory (or http(s) URL) that relative source locations resolve against
    #[arg(long, env = "COVID_TRACKER_DATA_DIR")]
    pub data_dir: Option<String>,

    /// Source layout file (JSON); defaults to ~/.covid-tracker/sources.json when present
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Write the effective source layout to the config path and exit
    #[arg(long)]
    pub init_config: bool,

    /// Timeout in seconds for each source fetch (1-600)
    #[arg(long, default_value = "30", value_parser = clap::value_parser!(u64).range(1..=600))]
    pub timeout_secs: u64,

    /// Date treated as "today" when selecting the daily report (YYYY-MM-DD)
    #[arg(long)]
    pub as_of: Option<NaiveDate>,

    /// Geographic scope
    #[arg(long, value_enum, default_value = "world")]
    pub scope: Scope,

    /// Statistic to report
    #[arg(long, value_enum, default_value = "confirmed")]
    pub stat: Statistic,

    /// Derived view used by the top and series views
    #[arg(long, value_enum, default_value = "cumulative")]
    pub value_type: ValueType,

    /// Output view
    #[arg(long, default_value = "summary", value_parser = ["summary", "table", "top", "bottom", "latest", "series"])]
    pub view: String,

    /// Location for the latest and series views (defaults to the scope total)
    #[arg(long)]
    pub location: Option<String>,

    /// Number of locations in the top and bottom views
    #[arg(short = 'n', long, default_value = "10")]
    pub count: usize,

    /// Restrict the series view to the scope total
    #[arg(long)]
    pub overall: bool,

    /// Logging level
    #[arg(long, default_value = "INFO", value_parser = ["DEBUG", "INFO", "WARNING", "ERROR", "CRITICAL"])]
    pub log_level: String,

    /// Log file path
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,
}

impl Settings {
    /// Effective log level after applying `--debug`.
    pub fn effective_log_level(&self) -> &str {
        if self.debug {
            "DEBUG"
        } else {
            &self.log_level
        }
    }
}

// ── Source locations ──────────────────────────────────────────────────────────

/// Where one source document lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceLocation {
    File(PathBuf),
    Url(String),
}

impl SourceLocation {
    /// Resolve `entry` against `root`. Absolute paths and URLs are kept as-is.
    pub fn resolve(root: &str, entry: &str) -> Self {
        if is_url(entry) {
            return Self::Url(entry.to_string());
        }
        if Path::new(entry).is_absolute() {
            return Self::File(PathBuf::from(entry));
        }
        if is_url(root) {
            return Self::Url(format!(
                "{}/{}",
                root.trim_end_matches('/'),
                entry.trim_start_matches('/')
            ));
        }
        Self::File(Path::new(root).join(entry))
    }

    /// Append a path segment.
    pub fn join(&self, segment: &str) -> Self {
        match self {
            Self::File(p) => Self::File(p.join(segment)),
            Self::Url(u) => Self::Url(format!("{}/{}", u.trim_end_matches('/'), segment)),
        }
    }

    /// Last path segment, used to label the source in logs and errors.
    pub fn name(&self) -> String {
        match self {
            Self::File(p) => p
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| p.display().to_string()),
            Self::Url(u) => u.rsplit('/').next().unwrap_or(u).to_string(),
        }
    }
}

impl std::fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::File(p) => write!(f, "{}", p.display()),
            Self::Url(u) => f.write_str(u),
        }
    }
}

fn is_url(s: &str) -> bool {
    s.starts_with("http://") || s.starts_with("https://")
}

// ── SourceLayout ───────────────────────────────────────────────────────────────

/// One entry per scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerScope {
    pub world: String,
    pub usa: String,
    pub us_counties: String,
}

impl PerScope {
    pub fn get(&self, scope: Scope) -> &str {
        match scope {
            Scope::World => &self.world,
            Scope::Usa => &self.usa,
            Scope::UsCounties => &self.us_counties,
        }
    }
}

/// Locations of every source document, persisted as JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceLayout {
    /// Root that every relative entry resolves against.
    pub root: String,
    /// CSSE data directory (contains the daily-report and time-series dirs).
    pub csse_base: String,
    pub daily_reports_dir: String,
    pub time_series_dir: String,
    pub geometry: PerScope,
    pub population: PerScope,
}

impl Default for SourceLayout {
    fn default() -> Self {
        Self {
            root: ".".to_string(),
            csse_base: "covid-19-data/csse_covid_19_data".to_string(),
            daily_reports_dir: "csse_covid_19_daily_reports".to_string(),
            time_series_dir: "csse_covid_19_time_series".to_string(),
            geometry: PerScope {
                world: "data/countries.geo.json".to_string(),
                usa: "data/us_states_500k_res.json".to_string(),
                us_counties: "data/us_counties_500k_res.json".to_string(),
            },
            population: PerScope {
                world: "data/population_world.csv".to_string(),
                usa: "data/population_us_states.csv".to_string(),
                us_counties: "data/population_us_counties.csv".to_string(),
            },
        }
    }
}

impl SourceLayout {
    /// Return the default path to the persisted layout file.
    /// Uses `~/.covid-tracker/sources.json`.
    pub fn config_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".covid-tracker")
            .join("sources.json")
    }

    /// Load the layout: an explicit path must exist and parse, the default
    /// path is used when present, otherwise defaults apply.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => Self::load_from(path),
            None => {
                let path = Self::config_path();
                if path.exists() {
                    Self::load_from(&path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            TrackerError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&content)
            .map_err(|e| TrackerError::Config(format!("invalid layout {}: {}", path.display(), e)))
    }

    /// Atomically write the layout, creating parent directories if needed.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, &json)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }

    /// Replace the root, keeping every other entry.
    pub fn with_root(mut self, root: impl Into<String>) -> Self {
        self.root = root.into();
        self
    }

    fn csse(&self) -> SourceLocation {
        SourceLocation::resolve(&self.root, &self.csse_base)
    }

    /// Daily snapshot for `date`, named `MM-DD-YYYY.csv`.
    pub fn daily_report(&self, date: NaiveDate) -> SourceLocation {
        self.csse()
            .join(&self.daily_reports_dir)
            .join(&format!("{}.csv", date.format("%m-%d-%Y")))
    }

    /// Time series for `(scope, stat)`, or `None` when the publisher does
    /// not provide one.
    pub fn time_series(&self, scope: Scope, stat: Statistic) -> Option<SourceLocation> {
        if !scope.tracks(stat) {
            return None;
        }
        let kind = stat.daily_column().to_lowercase();
        let region = match scope {
            Scope::World => "global",
            Scope::Usa | Scope::UsCounties => "US",
        };
        let file = format!("time_series_covid19_{}_{}.csv", kind, region);
        Some(self.csse().join(&self.time_series_dir).join(&file))
    }

    pub fn geometry(&self, scope: Scope) -> SourceLocation {
        SourceLocation::resolve(&self.root, self.geometry.get(scope))
    }

    pub fn population(&self, scope: Scope) -> SourceLocation {
        SourceLocation::resolve(&self.root, self.population.get(scope))
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_settings_defaults() {
        let s = Settings::parse_from(["covid-tracker"]);
        assert_eq!(s.scope, Scope::World);
        assert_eq!(s.stat, Statistic::Confirmed);
        assert_eq!(s.value_type, ValueType::Cumulative);
        assert_eq!(s.view, "summary");
        assert_eq!(s.count, 10);
        assert_eq!(s.timeout_secs, 30);
        assert_eq!(s.effective_log_level(), "INFO");
    }

    #[test]
    fn test_settings_enum_flags() {
        let s = Settings::parse_from([
            "covid-tracker",
            "--scope",
            "us-counties",
            "--stat",
            "deaths",
            "--value-type",
            "one-per-n",
            "--as-of",
            "2020-04-15",
            "--debug",
        ]);
        assert_eq!(s.scope, Scope::UsCounties);
        assert_eq!(s.stat, Statistic::Deaths);
        assert_eq!(s.value_type, ValueType::OnePerN);
        assert_eq!(s.as_of, NaiveDate::from_ymd_opt(2020, 4, 15));
        assert_eq!(s.effective_log_level(), "DEBUG");
    }

    #[test]
    fn test_settings_rejects_unknown_view() {
        assert!(Settings::try_parse_from(["covid-tracker", "--view", "map"]).is_err());
    }

    #[test]
    fn test_daily_report_file_name() {
        let layout = SourceLayout::default().with_root("/data");
        let date = NaiveDate::from_ymd_opt(2020, 4, 5).unwrap();
        assert_eq!(
            layout.daily_report(date),
            SourceLocation::File(PathBuf::from(
                "/data/covid-19-data/csse_covid_19_data/csse_covid_19_daily_reports/04-05-2020.csv"
            ))
        );
    }

    #[test]
    fn test_time_series_file_names() {
        let layout = SourceLayout::default().with_root("https://example.org/repo/");
        assert_eq!(
            layout.time_series(Scope::World, Statistic::Recovered).unwrap().name(),
            "time_series_covid19_recovered_global.csv"
        );
        let us = layout.time_series(Scope::UsCounties, Statistic::Deaths).unwrap();
        assert_eq!(
            us,
            SourceLocation::Url(
                "https://example.org/repo/covid-19-data/csse_covid_19_data/csse_covid_19_time_series/time_series_covid19_deaths_US.csv"
                    .to_string()
            )
        );
        assert!(layout.time_series(Scope::Usa, Statistic::Recovered).is_none());
        assert!(layout.time_series(Scope::World, Statistic::Active).is_none());
    }

    #[test]
    fn test_absolute_entries_ignore_root() {
        let mut layout = SourceLayout::default().with_root("/data");
        layout.geometry.world = "https://cdn.example.org/countries.geo.json".to_string();
        layout.population.usa = "/srv/pop/states.csv".to_string();
        assert_eq!(
            layout.geometry(Scope::World),
            SourceLocation::Url("https://cdn.example.org/countries.geo.json".to_string())
        );
        assert_eq!(
            layout.population(Scope::Usa),
            SourceLocation::File(PathBuf::from("/srv/pop/states.csv"))
        );
    }

    #[test]
    fn test_layout_save_and_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("sources.json");
        let layout = SourceLayout::default().with_root("/srv/covid");
        layout.save_to(&path).unwrap();
        assert!(!path.with_extension("json.tmp").exists());
        assert_eq!(SourceLayout::load(Some(&path)).unwrap(), layout);
    }

    #[test]
    fn test_layout_partial_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sources.json");
        std::fs::write(&path, r#"{"root": "/mnt/csse"}"#).unwrap();
        let layout = SourceLayout::load_from(&path).unwrap();
        assert_eq!(layout.root, "/mnt/csse");
        assert_eq!(layout.daily_reports_dir, "csse_covid_19_daily_reports");
    }

    #[test]
    fn test_layout_explicit_missing_is_config_error() {
        let err = SourceLayout::load(Some(Path::new("/nonexistent/sources.json"))).unwrap_err();
        assert!(matches!(err, TrackerError::Config(_)));
    }

    #[test]
    fn test_layout_invalid_json_is_config_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sources.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(
            SourceLayout::load_from(&path).unwrap_err(),
            TrackerError::Config(_)
        ));
    }
}
