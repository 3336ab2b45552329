//! Shared types for the CSSE statistics tracker.
//!
//! Closed enumerations for scopes, statistics and derived views, the raw
//! daily-row model, date-indexed tables, population tables, canonical
//! location names, the error taxonomy and runtime settings.

pub mod error;
pub mod formatting;
pub mod models;
pub mod names;
pub mod population;
pub mod settings;
pub mod table;

pub use error::{Result, TrackerError};
pub use models::{Scope, Statistic, ValueType};
