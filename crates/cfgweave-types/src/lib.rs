//! Foundation types for cfgweave.
//!
//! This crate provides the tree and flag types shared by the merge engine and
//! by whatever loader hands configuration fragments to it.
//!
//! # Key Types
//!
//! - [`ConfigNode`] — A configuration tree: either a [`Scalar`] or a [`Container`]
//! - [`Container`] — Insertion-ordered mapping from key to child node
//! - [`MergeFlags`] — Bitset of merge behaviours (`OVERWRITE`, `FLATTEN`)
//! - [`NamedFlags`] — Caller-registered boolean switches for conditional keys

pub mod error;
pub mod flags;
pub mod node;

pub use error::NodeError;
pub use flags::{MergeFlags, NamedFlags};
pub use node::{ConfigNode, Container, Scalar};
