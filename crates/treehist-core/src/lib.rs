#![deny(missing_docs)]

//! Core plumbing for the treehist sampler: structured errors, deterministic
//! randomness, small dense matrices, and scalar statistics.

pub mod errors;
pub mod matrix;
pub mod rng;
pub mod stats;

pub use errors::{ErrorInfo, TreehistError};
pub use matrix::{expm, SquareMatrix};
pub use rng::{derive_substream_seed, RngHandle};
pub use stats::{poisson_ln_pmf, poisson_pmf};
