use thiserror::Error;

/// All errors produced by the tracker crates.
#[derive(Error, Debug)]
pub enum TrackerError {
    /// A source file or URL could not be obtained (missing, unreachable or
    /// timed out) beyond the allowed fallback window.
    #[error("Source unavailable: {source_name}: {reason}")]
    SourceUnavailable { source_name: String, reason: String },

    /// A source is missing a column the reader requires.
    #[error("Schema mismatch in {source_name}: missing column '{column}'")]
    SchemaMismatch { source_name: String, column: String },

    /// A cell that must hold a number or date could not be parsed.
    #[error("Malformed value in {source_name} line {line}, column '{column}': '{value}'")]
    MalformedValue {
        source_name: String,
        line: u64,
        column: String,
        value: String,
    },

    /// A query named a series, statistic or location that was never built.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A configuration value is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A CSV document could not be tokenised.
    #[error("Failed to parse CSV: {0}")]
    Csv(#[from] csv::Error),

    /// A JSON document could not be parsed.
    #[error("Failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Pass-through for any raw I/O error that does not carry a path.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Catch-all for errors from third-party crates via `anyhow`.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl TrackerError {
    pub fn unavailable(source_name: impl Into<String>, reason: impl ToString) -> Self {
        Self::SourceUnavailable {
            source_name: source_name.into(),
            reason: reason.to_string(),
        }
    }

    pub fn missing_column(source_name: impl Into<String>, column: impl Into<String>) -> Self {
        Self::SchemaMismatch {
            source_name: source_name.into(),
            column: column.into(),
        }
    }

    /// `true` for the query-time error kind; everything else aborts construction.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Convenience alias used throughout the tracker crates.
pub type Result<T> = std::result::Result<T, TrackerError>;
