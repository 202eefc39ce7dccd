//! Input/output helpers.
//!
//! - CSV ingest + complete-case filter (`ingest`)
//! - weights and unit-table CSV exports (`export`)
//! - estimates JSON read/write (`results`)

pub mod export;
pub mod ingest;
pub mod results;

pub use export::*;
pub use ingest::*;
pub use results::*;
