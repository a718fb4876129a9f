//! Error types for the merge crate.

use cfgweave_types::NodeError;

/// Errors that can occur around a merge engine.
///
/// Merging itself never fails; these cover engine construction and reading
/// the merged tree back out.
#[derive(Debug, thiserror::Error)]
pub enum MergeError {
    /// A configured flag name can never be matched by a key directive.
    #[error("flag {name:?} can never match a directive: {reason}")]
    UnreachableFlag { name: String, reason: String },

    /// Converting the merged tree failed.
    #[error("node error: {0}")]
    Node(#[from] NodeError),
}

/// Convenience alias for merge results.
pub type MergeResult<T> = Result<T, MergeError>;
