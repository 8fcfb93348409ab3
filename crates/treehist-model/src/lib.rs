#![deny(missing_docs)]

//! Data model for character histories evolving along a phylogenetic tree:
//! per-branch change events, the tree view consumed by proposals, and the
//! rate provider abstraction over CTMC generator matrices.

pub mod event;
pub mod history;
pub mod rate;
pub mod store;
pub mod tree;

pub use event::CharacterEvent;
pub use history::BranchHistory;
pub use rate::{GeneratorMatrix, RateProvider};
pub use store::HistoryStore;
pub use tree::{Tree, TreeNode};
