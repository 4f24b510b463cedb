//! Precipitation catalog synchronizer.
//!
//! Turns the daily per-subbasin precipitation table produced by the
//! extraction step into a time-series catalog for the hydrologic model, and
//! writes the gauge registry that points the model at each catalog record.
//!
//! Modules, leaves first:
//! - `model`, `pathname`: domain types and catalog pathname grammar.
//! - `ingest`: input table loader.
//! - `catalog`: the `Catalog` trait and the file-backed store.
//! - `sync`: stale-entry cleanup, grouping, record assembly, writes.
//! - `verify`: re-read check of the last written record.
//! - `registry`: gauge registry rendering and output.
//! - `pipeline`: the end-to-end run used by the binary.

pub mod catalog;
pub mod config;
pub mod ingest;
pub mod logging;
pub mod model;
pub mod pathname;
pub mod pipeline;
pub mod registry;
pub mod sync;
pub mod verify;
