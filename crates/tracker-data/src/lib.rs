//! Data layer for the CSSE statistics tracker.
//!
//! Responsible for reading the published CSV and GeoJSON documents,
//! reconciling location names across sources, aggregating the daily snapshot
//! to each scope's grain, building cumulative time series and computing their
//! derived views.

pub mod aggregator;
pub mod derive;
pub mod geometry;
pub mod reader;
pub mod reconciler;
pub mod timeseries;

pub use tracker_core as core;
