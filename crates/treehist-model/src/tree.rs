//! Minimal tree view consumed by branch-history proposals.
//!
//! The sampler only reads branch lengths, ages, and parent links; topology
//! construction and editing live elsewhere.

use serde::{Deserialize, Serialize};
use treehist_core::errors::{ErrorInfo, TreehistError};

/// One node of the tree together with the branch leading into it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeNode {
    /// Stable index of the node within its tree.
    pub index: usize,
    /// Index of the parent node, or `None` for the root.
    pub parent: Option<usize>,
    /// Length of the branch between this node and its parent.
    pub branch_length: f64,
    /// Age of the node (distance above the youngest tip).
    pub age: f64,
}

impl TreeNode {
    /// Whether this node is the root of its tree.
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }
}

/// An indexed collection of tree nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tree {
    nodes: Vec<TreeNode>,
}

impl Tree {
    /// Builds a tree view, validating that node indices match positions and
    /// parent links stay in range.
    pub fn new(nodes: Vec<TreeNode>) -> Result<Self, TreehistError> {
        for (position, node) in nodes.iter().enumerate() {
            if node.index != position {
                return Err(TreehistError::Config(
                    ErrorInfo::new("node-index-mismatch", "node index must match its position")
                        .with_context("position", position.to_string())
                        .with_context("index", node.index.to_string()),
                ));
            }
            if let Some(parent) = node.parent {
                if parent >= nodes.len() {
                    return Err(TreehistError::Config(
                        ErrorInfo::new("parent-out-of-range", "parent index beyond node count")
                            .with_context("node", node.index.to_string())
                            .with_context("parent", parent.to_string()),
                    ));
                }
            }
        }
        Ok(Self { nodes })
    }

    /// Number of nodes in the tree.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the tree has no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Looks up a node by index.
    pub fn node(&self, index: usize) -> Result<&TreeNode, TreehistError> {
        self.nodes.get(index).ok_or_else(|| {
            TreehistError::Config(
                ErrorInfo::new("node-out-of-range", "no node at the requested index")
                    .with_context("index", index.to_string())
                    .with_context("len", self.nodes.len().to_string()),
            )
        })
    }

    /// Iterates over all nodes in index order.
    pub fn nodes(&self) -> impl Iterator<Item = &TreeNode> {
        self.nodes.iter()
    }
}
