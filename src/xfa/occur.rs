//! Occurrence bounds of repeating containers.
//!
//! Bounds live on an `occur` child of a Template subform (or the clone held by
//! its Form instance manager) as `min`, `max` and `initial` attributes.

use super::node::{Element, NodeId};
use super::tree::NodeTree;

/// Marker for an unbounded `max`.
pub const UNBOUNDED: i32 = -1;

/// Normalized repetition bounds.
///
/// Always satisfies `min <= initial` and, when bounded, `initial <= max` and
/// `min <= max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Occurrence {
    /// Minimum instance count
    pub min: usize,
    /// Maximum instance count, [`UNBOUNDED`] for no limit
    pub max: i32,
    /// Instance count produced when no data drives the container
    pub initial: usize,
}

impl Default for Occurrence {
    fn default() -> Self {
        Self::SINGLE
    }
}

impl Occurrence {
    /// A single, non-repeating instance.
    pub const SINGLE: Occurrence = Occurrence {
        min: 1,
        max: 1,
        initial: 1,
    };

    /// Build normalized bounds from raw attribute values.
    pub fn from_raw(min: Option<i32>, max: Option<i32>, initial: Option<i32>) -> Self {
        let min = match min {
            Some(m) if m >= 0 => m,
            _ => 1,
        };
        let max = match max {
            Some(m) if m < 0 => UNBOUNDED,
            Some(m) => m,
            None if min == 0 => 1,
            None => min,
        };
        if max == 0 {
            return Self {
                min: 0,
                max: 0,
                initial: 0,
            };
        }
        let max = if max != UNBOUNDED && max < min { min } else { max };
        let mut initial = match initial {
            Some(i) if i >= min => i,
            _ => min,
        };
        if max != UNBOUNDED && initial > max {
            initial = max;
        }
        Self {
            min: min as usize,
            max,
            initial: initial as usize,
        }
    }

    /// Whether `max` is unbounded.
    pub fn is_unbounded(&self) -> bool {
        self.max < 0
    }

    /// `max` as a count, `None` when unbounded.
    pub fn max_count(&self) -> Option<usize> {
        (self.max >= 0).then_some(self.max as usize)
    }

    /// Whether another instance may be added on top of `count`.
    pub fn allows_more(&self, count: usize) -> bool {
        self.max_count().map_or(true, |max| count < max)
    }

    /// Whether `count` lies within `[min, max]`.
    pub fn contains(&self, count: usize) -> bool {
        count >= self.min && self.max_count().map_or(true, |max| count <= max)
    }
}

fn int_attribute(tree: &NodeTree, node: NodeId, key: &str) -> Option<i32> {
    tree.attribute(node, key).and_then(|v| v.trim().parse().ok())
}

/// Read the bounds of `node` from its `occur` child.
///
/// A node without an `occur` child is single and non-repeating.
pub fn read_occurrence(tree: &NodeTree, node: NodeId) -> Occurrence {
    match tree.first_child_by_class(node, Element::Occur) {
        Some(occur) => read_occur_node(tree, occur),
        None => Occurrence::SINGLE,
    }
}

/// Read the bounds stored on an `occur` node itself.
pub fn read_occur_node(tree: &NodeTree, occur: NodeId) -> Occurrence {
    Occurrence::from_raw(
        int_attribute(tree, occur, "min"),
        int_attribute(tree, occur, "max"),
        int_attribute(tree, occur, "initial"),
    )
}

/// Store a new `max` on `occur`, lowering `min` when it would exceed it.
///
/// Values below 1 other than [`UNBOUNDED`] become 1.
pub fn write_max(tree: &mut NodeTree, occur: NodeId, max: i32) {
    let max = if max != UNBOUNDED && max < 1 { 1 } else { max };
    tree.set_attribute(occur, "max", max.to_string());
    let min = read_occur_node(tree, occur).min as i32;
    if max != UNBOUNDED && max < min {
        tree.set_attribute(occur, "min", max.to_string());
    }
}

/// Store a new `min` on `occur`, raising a positive `max` when it would fall below.
///
/// Negative values become 1.
pub fn write_min(tree: &mut NodeTree, occur: NodeId, min: i32) {
    let min = if min < 0 { 1 } else { min };
    tree.set_attribute(occur, "min", min.to_string());
    let max = int_attribute(tree, occur, "max").unwrap_or(min);
    if max > 0 && max < min {
        tree.set_attribute(occur, "max", min.to_string());
    }
}
