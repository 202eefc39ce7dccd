//! Data sources that do not come from a CSV: the simulated data-generating process.

pub mod sim;

pub use sim::*;
