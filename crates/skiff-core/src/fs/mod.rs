//! Filesystem primitives shared across features.

pub mod install_method;
pub mod tree_hash;

pub use install_method::InstallMethod;
pub use tree_hash::hash_tree;
