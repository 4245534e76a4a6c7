//! Documentation node tree for docsmith.
//!
//! - [`Node`] — owned fragments as declared in manifests or resolved by handlers
//! - [`DocTree`] — the arena holding the connected forest, with parent links,
//!   relative paths, lookups, sorting and merging
//! - [`generate_new_name`] — default collision renamer used by [`DocTree::union`]

pub mod naming;
pub mod node;
pub mod tree;

pub use naming::generate_new_name;
pub use node::{Content, ContentSelector, Node, NodeSelector, Template};
pub use tree::{DocTree, NodeId, TreeNode, UnionReport};
