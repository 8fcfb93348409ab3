#![deny(missing_docs)]

//! Transactional MCMC proposals over branch character histories.
//!
//! The crate provides the generic [`Proposal`] contract shared by every move
//! in the family and one concrete, numerically careful implementation:
//! endpoint-conditioned CTMC path resampling by uniformization
//! ([`PathUniformizationProposal`]).

/// Shared model context consumed by proposals.
pub mod model;
/// Endpoint-conditioned path resampling by uniformization.
pub mod path_uniformization;
/// The transactional proposal contract.
pub mod proposal;

pub use model::Model;
pub use path_uniformization::{PathProposalConfig, PathUniformizationProposal};
pub use proposal::{Proposal, Target};
