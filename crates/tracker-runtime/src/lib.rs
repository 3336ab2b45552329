//! Runtime layer for the CSSE statistics tracker.
//!
//! Fetches the published sources, runs the processing pipeline once and
//! exposes the resulting immutable store through its query API.

pub mod fetch;
pub mod processor;
pub mod store;

pub use tracker_core as core;
pub use tracker_data as data;
