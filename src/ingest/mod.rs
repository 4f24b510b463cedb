//! Input loading.
//!
//! Submodules:
//! - `table`: reads the extracted daily precipitation table (one CSV file or
//!   a directory of CSV block files) into `PrecipitationRow`s.

pub mod table;

pub use table::{LoadError, load_table};
