//! Configuration for XFA merge processing.

use serde::{Deserialize, Serialize};

/// What a failed re-merge leaves behind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemergeFailurePolicy {
    /// Restore the Form tree, bindings and global registry captured before the re-merge.
    #[default]
    Restore,
    /// Drop the Form tree and keep only the Template and Data trees.
    Discard,
}

/// Merge engine configuration.
///
/// # Example
///
/// ```
/// use xfa_forms::config::{MergeOptions, RemergeFailurePolicy};
///
/// let options = MergeOptions::new()
///     .with_max_recursion_depth(64)
///     .with_remerge_failure(RemergeFailurePolicy::Discard);
/// assert_eq!(options.max_recursion_depth, 64);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeOptions {
    /// Maximum template/form nesting walked by the merge and rebind passes.
    ///
    /// Cyclic or pathologically deep input fails with
    /// [`Error::RecursionLimitExceeded`](crate::Error::RecursionLimitExceeded)
    /// instead of overflowing the stack.
    pub max_recursion_depth: u32,

    /// Behavior when a re-merge fails part way.
    pub remerge_failure: RemergeFailurePolicy,

    /// Allow binding to create missing Data nodes.
    pub create_data_nodes: bool,

    /// Largest `name[n]` index a `dataRef` path may create Data nodes up to.
    pub max_path_index: usize,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl MergeOptions {
    /// Create new configuration with defaults.
    pub fn new() -> Self {
        Self {
            max_recursion_depth: 256,
            remerge_failure: RemergeFailurePolicy::Restore,
            create_data_nodes: true,
            max_path_index: 4096,
        }
    }

    /// Set the recursion depth guard.
    pub fn with_max_recursion_depth(mut self, depth: u32) -> Self {
        self.max_recursion_depth = depth;
        self
    }

    /// Set the re-merge failure policy.
    pub fn with_remerge_failure(mut self, policy: RemergeFailurePolicy) -> Self {
        self.remerge_failure = policy;
        self
    }

    /// Enable or disable on-demand Data node creation.
    pub fn with_data_creation(mut self, enable: bool) -> Self {
        self.create_data_nodes = enable;
        self
    }

    /// Set the largest index a `dataRef` path may create.
    pub fn with_max_path_index(mut self, index: usize) -> Self {
        self.max_path_index = index;
        self
    }
}
