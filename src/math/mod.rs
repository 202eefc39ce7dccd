//! Mathematical utilities: least squares, densities, quantiles, summaries.

pub mod density;
pub mod ols;
pub mod quantile;
pub mod summary;

pub use density::*;
pub use ols::*;
pub use quantile::*;
pub use summary::*;
