//! `ipw-exposure` library crate.
//!
//! The binary (`ipw`) is a thin wrapper around this library so that:
//!
//! - core logic is testable without spawning processes
//! - weighting and estimation are reusable from other tools
//! - code stays easy to navigate as the project grows

pub mod app;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod estimate;
pub mod io;
pub mod math;
pub mod models;
pub mod report;
pub mod weights;
