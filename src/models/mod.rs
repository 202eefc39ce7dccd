//! Exposure models.
//!
//! Models are small and deterministic so that weighting code can stay generic:
//! - `design`: covariate encoding and aliased-column pruning
//! - `linear`: OLS with residual sd (normal-density weights)
//! - `multinomial`: softmax regression over exposure bins (quantile-bin weights)

pub mod design;
pub mod linear;
pub mod multinomial;

pub use design::*;
pub use linear::*;
pub use multinomial::*;
