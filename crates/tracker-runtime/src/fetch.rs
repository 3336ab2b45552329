//! Source fetching.
//!
//! Reads every document named by a [`SourceLayout`] into memory, from local
//! files or over HTTP, before any parsing starts. Each request is bounded by
//! a timeout. The daily snapshot for the `as_of` date falls back to the day
//! before when it is missing or times out; every other failure is fatal.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{Days, Local, NaiveDate};
use reqwest::StatusCode;
use tracing::{debug, info, warn};

use tracker_core::settings::{SourceLayout, SourceLocation};
use tracker_core::{Result, Scope, Statistic, TrackerError};

// ── Defaults ──────────────────────────────────────────────────────────────────

/// Default per-request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// How many days before `as_of` the daily snapshot may come from.
const DAILY_FALLBACK_DAYS: u64 = 1;

// ── FetchOptions ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchOptions {
    /// Upper bound on a single file read or HTTP request.
    pub timeout: Duration,
    /// The date treated as "today" when picking the daily snapshot.
    pub as_of: NaiveDate,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            as_of: Local::now().date_naive(),
        }
    }
}

impl FetchOptions {
    pub fn new(timeout_secs: u64, as_of: Option<NaiveDate>) -> Self {
        let defaults = Self::default();
        Self {
            timeout: Duration::from_secs(timeout_secs),
            as_of: as_of.unwrap_or(defaults.as_of),
        }
    }
}

// ── Fetched documents ─────────────────────────────────────────────────────────

/// Raw bytes of one source, labelled for logs and errors.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub name: String,
    pub data: Vec<u8>,
}

/// Documents of one scope.
#[derive(Debug, Clone)]
pub struct ScopeSources {
    pub time_series: BTreeMap<Statistic, SourceDocument>,
    pub geometry: SourceDocument,
    pub population: SourceDocument,
}

/// Everything construction needs, fully fetched.
#[derive(Debug, Clone)]
pub struct SourceBundle {
    /// Date of the daily snapshot actually used.
    pub report_date: NaiveDate,
    pub daily: SourceDocument,
    pub scopes: BTreeMap<Scope, ScopeSources>,
}

/// Why a single fetch failed.
#[derive(Debug)]
enum FetchFailure {
    /// Absent or timed out; eligible for the daily fallback.
    Missing(String),
    Failed(String),
}

impl FetchFailure {
    fn into_error(self, source_name: &str) -> TrackerError {
        match self {
            Self::Missing(reason) | Self::Failed(reason) => TrackerError::unavailable(source_name, reason),
        }
    }
}

// ── SourceFetcher ─────────────────────────────────────────────────────────────

/// Reads [`SourceLocation`]s with a per-request timeout.
pub struct SourceFetcher {
    client: reqwest::Client,
    timeout: Duration,
}

impl SourceFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("covid-tracker/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TrackerError::Config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { client, timeout })
    }

    /// Fetch one document. Any failure is `SourceUnavailable`.
    pub async fn fetch(&self, location: &SourceLocation) -> Result<SourceDocument> {
        let name = location.name();
        let data = self
            .try_fetch(location)
            .await
            .map_err(|f| f.into_error(&location.to_string()))?;
        debug!("{}: {} bytes", name, data.len());
        Ok(SourceDocument { name, data })
    }

    /// Fetch the daily snapshot for `as_of`, falling back one day when it is
    /// missing or times out.
    pub async fn fetch_daily_report(
        &self,
        layout: &SourceLayout,
        as_of: NaiveDate,
    ) -> Result<(NaiveDate, SourceDocument)> {
        let mut last_failure = None;
        for back in 0..=DAILY_FALLBACK_DAYS {
            let Some(date) = as_of.checked_sub_days(Days::new(back)) else {
                break;
            };
            let location = layout.daily_report(date);
            match self.try_fetch(&location).await {
                Ok(data) => {
                    if back > 0 {
                        warn!("daily report for {} unavailable, using {}", as_of, date);
                    }
                    info!("daily report {} ({} bytes)", location.name(), data.len());
                    let name = location.name();
                    return Ok((date, SourceDocument { name, data }));
                }
                Err(FetchFailure::Missing(reason)) => {
                    debug!("{}: {}", location, reason);
                    last_failure = Some((location, reason));
                }
                Err(failure) => return Err(failure.into_error(&location.to_string())),
            }
        }
        let (location, reason) = last_failure.unwrap_or_else(|| (layout.daily_report(as_of), "no date to try".into()));
        Err(TrackerError::unavailable(
            location.to_string(),
            format!("{} (also tried {} day before {})", reason, DAILY_FALLBACK_DAYS, as_of),
        ))
    }

    async fn try_fetch(&self, location: &SourceLocation) -> std::result::Result<Vec<u8>, FetchFailure> {
        match location {
            SourceLocation::File(path) => match tokio::time::timeout(self.timeout, tokio::fs::read(path)).await {
                Err(_) => Err(FetchFailure::Missing(format!("timed out after {:?}", self.timeout))),
                Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => Err(FetchFailure::Missing(e.to_string())),
                Ok(Err(e)) => Err(FetchFailure::Failed(e.to_string())),
                Ok(Ok(data)) => Ok(data),
            },
            SourceLocation::Url(url) => {
                let response = self.client.get(url).send().await.map_err(classify_http)?;
                let status = response.status();
                if status == StatusCode::NOT_FOUND {
                    return Err(FetchFailure::Missing(format!("HTTP {}", status)));
                }
                if !status.is_success() {
                    return Err(FetchFailure::Failed(format!("HTTP {}", status)));
                }
                let body = response.bytes().await.map_err(classify_http)?;
                Ok(body.to_vec())
            }
        }
    }
}

fn classify_http(e: reqwest::Error) -> FetchFailure {
    if e.is_timeout() {
        FetchFailure::Missing(format!("timed out: {}", e))
    } else {
        FetchFailure::Failed(e.to_string())
    }
}

/// Fetch every document of `layout` for all scopes.
pub async fn fetch_sources(layout: &SourceLayout, options: &FetchOptions) -> Result<SourceBundle> {
    let fetcher = SourceFetcher::new(options.timeout)?;
    let (report_date, daily) = fetcher.fetch_daily_report(layout, options.as_of).await?;

    let mut scopes = BTreeMap::new();
    for scope in Scope::ALL {
        let mut time_series = BTreeMap::new();
        for &stat in scope.tracked_statistics() {
            if let Some(location) = layout.time_series(scope, stat) {
                time_series.insert(stat, fetcher.fetch(&location).await?);
            }
        }
        let geometry = fetcher.fetch(&layout.geometry(scope)).await?;
        let population = fetcher.fetch(&layout.population(scope)).await?;
        debug!("{}: {} time series fetched", scope, time_series.len());
        scopes.insert(
            scope,
            ScopeSources {
                time_series,
                geometry,
                population,
            },
        );
    }

    Ok(SourceBundle {
        report_date,
        daily,
        scopes,
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
