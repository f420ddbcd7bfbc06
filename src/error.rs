//! Error types for the XFA forms library.
//!
//! This module defines all error types that can occur while loading XFA
//! packets, merging Template and Data into a Form tree, and scripting
//! repeating instances through instance managers.
//!
//! Resolver misses (no matching Data node, no path match) are not errors:
//! they are valid "no binding" outcomes and never surface here.

use crate::xfa::{Element, NodeId, Packet};
use std::fmt;

/// Result type alias for XFA library operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The occurrence bound an instance-manager operation would violate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OccurBound {
    /// The minimum instance count
    Min(usize),
    /// The maximum instance count
    Max(usize),
}

impl fmt::Display for OccurBound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OccurBound::Min(min) => write!(f, "min {}", min),
            OccurBound::Max(max) => write!(f, "max {}", max),
        }
    }
}

/// Error types that can occur during XFA processing.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Occurrence bound exceeded; the tree is left unchanged
    #[error("Boundary violation: {requested} instances would violate occurrence {bound}")]
    BoundaryViolation {
        /// Bound that would be violated
        bound: OccurBound,
        /// Instance count the operation would have produced
        requested: usize,
    },

    /// Instance index outside the managed run; the tree is left unchanged
    #[error("Index out of bounds: index {index}, instance count {count}")]
    IndexOutOfBounds {
        /// Requested index
        index: usize,
        /// Current instance count
        count: usize,
    },

    /// The node arena refused to allocate a node
    #[error("Cannot create {element:?} node in {packet:?} packet")]
    CreationFailure {
        /// Requested element kind
        element: Element,
        /// Requested packet
        packet: Packet,
    },

    /// Recursion depth limit exceeded while walking a tree
    #[error("Recursion depth limit exceeded (max: {0})")]
    RecursionLimitExceeded(u32),

    /// A bind path asked for more Data nodes than allowed
    #[error("Bind path index {index} exceeds the limit of {limit}")]
    PathIndexLimitExceeded {
        /// Requested `[n]` index
        index: usize,
        /// Configured limit
        limit: usize,
    },

    /// Node id does not belong to this document
    #[error("Invalid node: {0}")]
    InvalidNode(NodeId),

    /// Node is not an instance manager
    #[error("Node {0} is not an instance manager")]
    NotInstanceManager(NodeId),

    /// No template root or top-level subform to merge from
    #[error("Template packet has no subform to merge")]
    MissingTemplate,

    /// Malformed XFA packet
    #[error("Invalid XFA: {0}")]
    InvalidXfa(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boundary_violation_error() {
        let err = Error::BoundaryViolation {
            bound: OccurBound::Max(3),
            requested: 4,
        };
        let msg = format!("{}", err);
        assert!(msg.contains("Boundary violation"));
        assert!(msg.contains("max 3"));
        assert!(msg.contains('4'));
    }

    #[test]
    fn test_index_out_of_bounds_error() {
        let err = Error::IndexOutOfBounds { index: 5, count: 2 };
        let msg = format!("{}", err);
        assert!(msg.contains("index 5"));
        assert!(msg.contains("count 2"));
    }

    #[test]
    fn test_creation_failure_error() {
        let err = Error::CreationFailure {
            element: Element::DataGroup,
            packet: Packet::Form,
        };
        let msg = format!("{}", err);
        assert!(msg.contains("DataGroup"));
        assert!(msg.contains("Form"));
    }

    #[test]
    fn test_recursion_limit_error() {
        let err = Error::RecursionLimitExceeded(64);
        assert!(format!("{}", err).contains("64"));
    }

    #[test]
    fn test_error_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Error>();
    }
}
