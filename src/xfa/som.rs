//! Path resolver for `bind ref` expressions over the Data tree.
//!
//! Supports the subset of XFA Scripting Object Model paths used by data
//! binding: an optional `$`, `$data` or `$record` head followed by
//! dot-separated segments of the form `name`, `name[n]` or `name[*]`.

use super::node::{name_hash, Element, NodeId, Packet};
use super::tree::NodeTree;
use crate::error::{Error, Result};
use bitflags::bitflags;

bitflags! {
    /// Resolution behavior.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ResolveFlags: u8 {
        /// Allow a relative head segment to match in ancestor scopes
        const PARENT = 1 << 0;
        /// Create nodes for segments that match nothing
        const CREATE = 1 << 1;
        /// A final segment without an index yields every same-name sibling,
        /// so the caller can pick one that is still unbound
        const BIND_NEW = 1 << 2;
    }
}

/// How the result set came about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveOutcome {
    /// Every node already existed
    Existing,
    /// One new node was created for the final segment
    CreatedOne,
    /// Nodes were created for a final `[*]` segment
    CreatedAll,
    /// Nodes were created below an intermediate `[*]` segment
    CreatedMidAll,
}

/// Result of a resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// Matched nodes in document order
    pub nodes: Vec<NodeId>,
    /// How the nodes were obtained
    pub outcome: ResolveOutcome,
}

impl Resolution {
    fn empty() -> Self {
        Self {
            nodes: Vec::new(),
            outcome: ResolveOutcome::Existing,
        }
    }

    /// First matched node.
    pub fn first(&self) -> Option<NodeId> {
        self.nodes.first().copied()
    }
}

/// Document context a path is resolved in.
#[derive(Debug, Clone, Copy)]
pub struct SomRoots {
    /// Target of `$data`
    pub data: Option<NodeId>,
    /// Target of `$record`
    pub record: Option<NodeId>,
    /// Largest `name[n]` index that may be created
    pub max_index: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Index {
    Implicit,
    At(usize),
    All,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Segment {
    name: String,
    index: Index,
}

fn parse_segment(raw: &str) -> Option<Segment> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    let Some(open) = raw.find('[') else {
        return Some(Segment {
            name: raw.to_string(),
            index: Index::Implicit,
        });
    };
    let inner = raw[open + 1..].strip_suffix(']')?.trim();
    let index = if inner == "*" {
        Index::All
    } else {
        Index::At(inner.parse().ok()?)
    };
    Some(Segment {
        name: raw[..open].trim().to_string(),
        index,
    })
}

enum Head {
    Scope,
    Data,
    Record,
}

fn parse_path(path: &str) -> Option<(Head, Vec<Segment>)> {
    let mut parts = path.trim().split('.');
    let first = parts.next()?.trim();
    let (head, first_segment) = match first {
        "$" => (Head::Scope, None),
        "$data" => (Head::Data, None),
        "$record" => (Head::Record, None),
        other => (Head::Scope, Some(parse_segment(other)?)),
    };
    let mut segments: Vec<Segment> = first_segment.into_iter().collect();
    for part in parts {
        segments.push(parse_segment(part)?);
    }
    Some((head, segments))
}

fn matching_children(tree: &NodeTree, parent: NodeId, hash: u32) -> Vec<NodeId> {
    tree.children_by_name(parent, hash)
        .filter(|&c| tree.element(c).is_data())
        .collect()
}

fn select(found: Vec<NodeId>, index: &Index, last: bool, flags: ResolveFlags) -> Vec<NodeId> {
    match index {
        Index::All => found,
        Index::At(n) => found.get(*n).copied().into_iter().collect(),
        Index::Implicit if last && flags.contains(ResolveFlags::BIND_NEW) => found,
        Index::Implicit => found.first().copied().into_iter().collect(),
    }
}

fn create_named(tree: &mut NodeTree, parent: NodeId, element: Element, name: &str) -> Result<NodeId> {
    let node = tree.create_node(Packet::Datasets, element)?;
    tree.set_name(node, name);
    tree.create_markup(node);
    tree.append_child(parent, node);
    Ok(node)
}

/// Resolve `path` against `scope`.
///
/// `leaf_kind` is the element created for the final segment when
/// [`ResolveFlags::CREATE`] is set; intermediate segments create data groups.
/// Creating past [`SomRoots::max_index`] fails with
/// [`Error::PathIndexLimitExceeded`]. An unparsable path resolves to nothing.
pub fn resolve(
    tree: &mut NodeTree,
    roots: SomRoots,
    scope: NodeId,
    path: &str,
    flags: ResolveFlags,
    leaf_kind: Element,
) -> Result<Resolution> {
    let Some((head, segments)) = parse_path(path) else {
        log::debug!("Unparsable bind path {:?}", path);
        return Ok(Resolution::empty());
    };
    let start = match head {
        Head::Scope => Some(scope),
        Head::Data => roots.data,
        Head::Record => roots.record,
    };
    let Some(start) = start else {
        return Ok(Resolution::empty());
    };
    if segments.is_empty() {
        return Ok(Resolution {
            nodes: vec![start],
            outcome: ResolveOutcome::Existing,
        });
    }

    let mut current = vec![start];
    if matches!(head, Head::Scope) && flags.contains(ResolveFlags::PARENT) {
        // A relative head binds in the nearest scope that has a match.
        let hash = name_hash(&segments[0].name);
        let mut level = Some(scope);
        while let Some(node) = level {
            if tree.packet(node) != Packet::Datasets {
                break;
            }
            if !matching_children(tree, node, hash).is_empty() {
                current = vec![node];
                break;
            }
            level = tree.parent(node);
        }
    }

    let mut created = false;
    let mut created_below_all = false;
    let mut seen_all = false;
    let last_index = segments.len() - 1;
    for (i, segment) in segments.iter().enumerate() {
        let last = i == last_index;
        let hash = name_hash(&segment.name);
        let mut next = Vec::new();
        for &parent in &current {
            let found = select(matching_children(tree, parent, hash), &segment.index, last, flags);
            if !found.is_empty() {
                next.extend(found);
                continue;
            }
            if !flags.contains(ResolveFlags::CREATE) || segment.name.is_empty() {
                continue;
            }
            let kind = if last { leaf_kind } else { Element::DataGroup };
            let existing = matching_children(tree, parent, hash).len();
            let wanted = match segment.index {
                Index::At(n) if n > roots.max_index => {
                    return Err(Error::PathIndexLimitExceeded {
                        index: n,
                        limit: roots.max_index,
                    });
                },
                Index::At(n) => n + 1,
                _ => 1,
            };
            let mut node = None;
            for _ in existing..wanted.max(existing + 1) {
                node = Some(create_named(tree, parent, kind, &segment.name)?);
            }
            next.extend(node);
            created = true;
            created_below_all |= seen_all;
        }
        seen_all |= segment.index == Index::All;
        current = next;
        if current.is_empty() {
            break;
        }
    }

    let outcome = if !created {
        ResolveOutcome::Existing
    } else if segments[last_index].index == Index::All {
        ResolveOutcome::CreatedAll
    } else if created_below_all {
        ResolveOutcome::CreatedMidAll
    } else {
        ResolveOutcome::CreatedOne
    };
    Ok(Resolution {
        nodes: current,
        outcome,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixture {
        tree: NodeTree,
        data: NodeId,
        record: NodeId,
        rows: Vec<NodeId>,
    }

    fn fixture() -> Fixture {
        let mut tree = NodeTree::new();
        let data = tree.create_node(Packet::Datasets, Element::DataGroup).unwrap();
        tree.set_name(data, "data");
        let record = create_named(&mut tree, data, Element::DataGroup, "order").unwrap();
        let rows = (0..3)
            .map(|_| create_named(&mut tree, record, Element::DataGroup, "Row").unwrap())
            .collect::<Vec<_>>();
        create_named(&mut tree, rows[0], Element::DataValue, "qty").unwrap();
        Fixture {
            tree,
            data,
            record,
            rows,
        }
    }

    fn roots(f: &Fixture) -> SomRoots {
        SomRoots {
            data: Some(f.data),
            record: Some(f.record),
            max_index: 16,
        }
    }

    #[test]
    fn test_parse_segments() {
        assert_eq!(
            parse_segment("Row[2]"),
            Some(Segment {
                name: "Row".into(),
                index: Index::At(2)
            })
        );
        assert_eq!(parse_segment("Row[*]").map(|s| s.index), Some(Index::All));
        assert_eq!(parse_segment("Row[x]"), None);
    }

    #[test]
    fn test_resolve_indexed_and_all() {
        let mut f = fixture();
        let r = roots(&f);
        let res = resolve(&mut f.tree, r, f.record, "$.Row[1]", ResolveFlags::empty(), Element::DataGroup)
            .unwrap();
        assert_eq!(res.nodes, vec![f.rows[1]]);

        let res = resolve(&mut f.tree, r, f.data, "$record.Row[*]", ResolveFlags::empty(), Element::DataGroup)
            .unwrap();
        assert_eq!(res.nodes, f.rows);
        assert_eq!(res.outcome, ResolveOutcome::Existing);
    }

    #[test]
    fn test_relative_climbs_with_parent_flag() {
        let mut f = fixture();
        let r = roots(&f);
        let scope = f.rows[0];
        let res = resolve(&mut f.tree, r, scope, "Row", ResolveFlags::empty(), Element::DataGroup).unwrap();
        assert!(res.nodes.is_empty());

        let res = resolve(&mut f.tree, r, scope, "Row", ResolveFlags::PARENT, Element::DataGroup).unwrap();
        assert_eq!(res.nodes, vec![f.rows[0]]);
    }

    #[test]
    fn test_bind_new_returns_all_candidates() {
        let mut f = fixture();
        let r = roots(&f);
        let res = resolve(&mut f.tree, r, f.record, "Row", ResolveFlags::BIND_NEW, Element::DataGroup).unwrap();
        assert_eq!(res.nodes.len(), 3);
    }

    #[test]
    fn test_create_missing_path() {
        let mut f = fixture();
        let r = roots(&f);
        let before = f.tree.len();
        let res = resolve(
            &mut f.tree,
            r,
            f.record,
            "$.shipping.city",
            ResolveFlags::CREATE,
            Element::DataValue,
        )
        .unwrap();
        assert_eq!(res.outcome, ResolveOutcome::CreatedOne);
        assert_eq!(f.tree.len(), before + 2);
        let city = res.nodes[0];
        assert_eq!(f.tree.element(city), Element::DataValue);
        assert_eq!(f.tree.path(f.tree.parent(city).unwrap()), "order.shipping");
    }

    #[test]
    fn test_create_all_outcome() {
        let mut f = fixture();
        let r = roots(&f);
        let res = resolve(&mut f.tree, r, f.rows[1], "$.note[*]", ResolveFlags::CREATE, Element::DataValue)
            .unwrap();
        assert_eq!(res.outcome, ResolveOutcome::CreatedAll);
        assert_eq!(res.nodes.len(), 1);
    }

    #[test]
    fn test_create_index_is_capped() {
        let mut f = fixture();
        let r = roots(&f);
        let before = f.tree.len();
        let err = resolve(&mut f.tree, r, f.record, "$.line[100000000]", ResolveFlags::CREATE, Element::DataValue)
            .unwrap_err();
        assert!(matches!(err, Error::PathIndexLimitExceeded { index: 100000000, limit: 16 }));
        assert_eq!(f.tree.len(), before);

        // Indexes within the limit still create the missing siblings.
        let res = resolve(&mut f.tree, r, f.record, "$.line[2]", ResolveFlags::CREATE, Element::DataValue).unwrap();
        assert_eq!(res.outcome, ResolveOutcome::CreatedOne);
        assert_eq!(f.tree.len(), before + 3);
    }
}
