//! Instance managers of repeating subforms.
//!
//! A merge places an instance manager node named `_<subform>` in the Form
//! tree right before the run of instances it governs. The manager stores no
//! count: the run is re-read from the tree on every call, so it stays correct
//! whatever else edits the Form tree.
//!
//! # Example
//!
//! ```ignore
//! let mut doc = XfaParser::new().parse(xdp)?;
//! doc.do_data_merge()?;
//! let rows = doc.instance_managers()[0];
//! rows.add_instance(&mut doc, true)?;
//! rows.move_instance(&mut doc, 0, rows.count(&doc) - 1)?;
//! ```

use super::document::XfaDocument;
use super::node::{name_hash, Element, NodeId, Packet};
use super::occur::{read_occur_node, write_max, write_min, Occurrence};
use super::rebind::RebindOrigin;
use super::tree::NodeTree;
use crate::error::{Error, OccurBound, Result};
use indexmap::{IndexMap, IndexSet};

/// Handle for one instance manager node.
///
/// The handle is a plain id; every operation takes the owning document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InstanceManager {
    node: NodeId,
}

impl InstanceManager {
    pub(crate) fn new(node: NodeId) -> Self {
        Self { node }
    }

    /// The manager node.
    pub fn node(&self) -> NodeId {
        self.node
    }

    /// Name of the managed subform (the manager name without its `_` prefix).
    pub fn name<'a>(&self, doc: &'a XfaDocument) -> &'a str {
        let name = doc.tree.name(self.node);
        name.strip_prefix('_').unwrap_or(name)
    }

    /// The managed instances in document order.
    pub fn instances(&self, doc: &XfaDocument) -> Vec<NodeId> {
        let tree = &doc.tree;
        let Some(base) = tree.name(self.node).strip_prefix('_') else {
            return Vec::new();
        };
        let hash = name_hash(base);
        let mut run = Vec::new();
        for &node in tree.following_siblings(self.node) {
            let element = tree.element(node);
            if element == Element::InstanceManager {
                break;
            }
            if !element.is_subform_like() {
                continue;
            }
            if tree.name_hash(node) != hash {
                break;
            }
            run.push(node);
        }
        run
    }

    /// Number of managed instances.
    pub fn count(&self, doc: &XfaDocument) -> usize {
        self.instances(doc).len()
    }

    /// The instance at `index`.
    pub fn instance(&self, doc: &XfaDocument, index: usize) -> Option<NodeId> {
        self.instances(doc).get(index).copied()
    }

    fn occur_node(&self, doc: &XfaDocument) -> Option<NodeId> {
        doc.tree
            .first_child_by_class(self.node, Element::Occur)
            .or_else(|| {
                let template = doc.bindings.template(self.node)?;
                doc.tree.first_child_by_class(template, Element::Occur)
            })
    }

    /// Occurrence bounds in effect for this manager.
    pub fn occurrence(&self, doc: &XfaDocument) -> Occurrence {
        self.occur_node(doc)
            .map(|occur| read_occur_node(&doc.tree, occur))
            .unwrap_or_default()
    }

    /// The manager's own `occur` node, cloned from the template on first use.
    fn own_occur_node(&self, doc: &mut XfaDocument) -> Result<NodeId> {
        if let Some(occur) = doc.tree.first_child_by_class(self.node, Element::Occur) {
            return Ok(occur);
        }
        let occur = doc.tree.create_node(Packet::Form, Element::Occur)?;
        if let Some(source) = self.occur_node(doc) {
            doc.tree.copy_attributes(source, occur);
            doc.bindings.set_template(occur, source);
        }
        doc.tree.insert_child(self.node, occur, doc.tree.first_child(self.node));
        Ok(occur)
    }

    /// Change the minimum; a positive `max` below it is raised to match.
    pub fn set_min(&self, doc: &mut XfaDocument, min: i32) -> Result<()> {
        let occur = self.own_occur_node(doc)?;
        write_min(&mut doc.tree, occur, min);
        Ok(())
    }

    /// Change the maximum; `-1` means unbounded and `min` is lowered to fit.
    pub fn set_max(&self, doc: &mut XfaDocument, max: i32) -> Result<()> {
        let occur = self.own_occur_node(doc)?;
        write_max(&mut doc.tree, occur, max);
        Ok(())
    }

    /// Grow or shrink the run to exactly `desired` instances.
    ///
    /// Shrinking removes instances from the end, together with Data nodes
    /// no other Form node is bound to. Growing appends data-bound instances.
    pub fn set_count(&self, doc: &mut XfaDocument, desired: usize) -> Result<()> {
        let occur = self.occurrence(doc);
        if desired < occur.min {
            return Err(Error::BoundaryViolation {
                bound: OccurBound::Min(occur.min),
                requested: desired,
            });
        }
        if let Some(max) = occur.max_count() {
            if desired > max {
                return Err(Error::BoundaryViolation {
                    bound: OccurBound::Max(max),
                    requested: desired,
                });
            }
        }

        let instances = self.instances(doc);
        let mut count = instances.len();
        if desired == count {
            return Ok(());
        }
        log::debug!("Setting {:?} instance count {} -> {}", self.name(doc), count, desired);
        if desired < count {
            for &instance in instances[desired..].iter().rev() {
                self.remove_item(doc, instance, true);
            }
        } else {
            while count < desired {
                let instance = self.create_instance(doc, true)?;
                self.insert_item(doc, instance, count, count, false);
                count += 1;
                doc.notify.on_node_ready(instance);
            }
        }
        doc.notify.on_layout_invalidated();
        Ok(())
    }

    /// Append one instance at the end of the run.
    pub fn add_instance(&self, doc: &mut XfaDocument, bind_data: bool) -> Result<NodeId> {
        let count = self.count(doc);
        self.check_room(doc, count)?;
        let instance = self.create_instance(doc, bind_data)?;
        self.insert_item(doc, instance, count, count, false);
        log::debug!("Added {:?} instance {} at index {}", self.name(doc), instance, count);
        doc.notify.on_node_ready(instance);
        doc.notify.on_layout_invalidated();
        Ok(instance)
    }

    /// Insert one instance so it ends up at `index`.
    ///
    /// The Data nodes bound by the new instance are moved next to those of
    /// its neighbour so both trees keep the same relative order.
    pub fn insert_instance(&self, doc: &mut XfaDocument, index: usize, bind_data: bool) -> Result<NodeId> {
        let count = self.count(doc);
        if index > count {
            return Err(Error::IndexOutOfBounds { index, count });
        }
        self.check_room(doc, count)?;
        let instance = self.create_instance(doc, bind_data)?;
        self.insert_item(doc, instance, index, count, true);
        log::debug!("Inserted {:?} instance {} at index {}", self.name(doc), instance, index);
        doc.notify.on_node_ready(instance);
        doc.notify.on_layout_invalidated();
        Ok(instance)
    }

    /// Remove the instance at `index` and the Data nodes only it was bound to.
    pub fn remove_instance(&self, doc: &mut XfaDocument, index: usize) -> Result<()> {
        let instances = self.instances(doc);
        let count = instances.len();
        if index >= count {
            return Err(Error::IndexOutOfBounds { index, count });
        }
        let min = self.occurrence(doc).min;
        if count - 1 < min {
            return Err(Error::BoundaryViolation {
                bound: OccurBound::Min(min),
                requested: count - 1,
            });
        }

        self.remove_item(doc, instances[index], true);
        log::debug!("Removed {:?} instance at index {}", self.name(doc), index);
        for (i, instance) in self.instances(doc).into_iter().enumerate().skip(index) {
            if doc.tree.element(instance) == Element::Subform {
                doc.notify.on_instance_index_changed(instance, i);
            }
        }
        doc.notify.on_layout_invalidated();
        Ok(())
    }

    /// Move the instance at `from` so it ends up at `to`, reordering bound Data to match.
    pub fn move_instance(&self, doc: &mut XfaDocument, from: usize, to: usize) -> Result<()> {
        let instances = self.instances(doc);
        let count = instances.len();
        if from >= count {
            return Err(Error::IndexOutOfBounds { index: from, count });
        }
        if to >= count {
            return Err(Error::IndexOutOfBounds { index: to, count });
        }
        if from == to {
            return Ok(());
        }

        let moving = instances[from];
        self.remove_item(doc, moving, false);
        self.insert_item(doc, moving, to, count - 1, true);
        log::debug!("Moved {:?} instance {} -> {}", self.name(doc), from, to);

        for index in [to, from] {
            if let Some(instance) = self.instance(doc, index) {
                if doc.tree.element(instance) == Element::Subform {
                    doc.notify.on_instance_index_changed(instance, index);
                }
            }
        }
        doc.notify.on_layout_invalidated();
        Ok(())
    }

    fn check_room(&self, doc: &XfaDocument, count: usize) -> Result<()> {
        match self.occurrence(doc).max_count() {
            Some(max) if count >= max => Err(Error::BoundaryViolation {
                bound: OccurBound::Max(max),
                requested: count + 1,
            }),
            _ => Ok(()),
        }
    }

    /// Merge a new detached instance from the manager's template.
    ///
    /// The data scope is the nearest bound ancestor of the manager, else the
    /// data record.
    fn create_instance(&self, doc: &mut XfaDocument, bind_data: bool) -> Result<NodeId> {
        let template = doc.bindings.template(self.node).ok_or(Error::MissingTemplate)?;
        let parent = doc.tree.parent(self.node).ok_or(Error::InvalidNode(self.node))?;
        let fallback = doc.record();
        let scope = doc.find_data_scope(Some(parent), fallback);

        let instance = doc
            .copy_container_at(template, parent, scope, true, bind_data, true, 0)?
            .ok_or(Error::CreationFailure {
                element: doc.tree.element(template),
                packet: Packet::Form,
            })?;
        doc.update_binding_relations_from(instance, RebindOrigin::InstanceManager)?;
        doc.tree.remove_child(parent, instance);
        Ok(instance)
    }

    /// Place a detached instance at `position` of a run of `count`.
    fn insert_item(&self, doc: &mut XfaDocument, instance: NodeId, position: usize, count: usize, move_data: bool) {
        let Some(parent) = doc.tree.parent(self.node) else {
            return;
        };
        let run = self.instances(doc);
        if position >= count || position >= run.len() {
            let last = run.last().copied();
            let before = doc.tree.next_sibling(last.unwrap_or(self.node));
            doc.tree.insert_child(parent, instance, before);
            if move_data {
                if let Some(last) = last {
                    let moved = collect_bound_data(doc, instance);
                    let neighbours = collect_bound_data(doc, last);
                    reorder_data_nodes(&mut doc.tree, &moved, &neighbours, false);
                }
            }
        } else {
            let anchor = run[position];
            doc.tree.insert_child(parent, instance, Some(anchor));
            if move_data {
                let moved = collect_bound_data(doc, instance);
                let neighbours = collect_bound_data(doc, anchor);
                reorder_data_nodes(&mut doc.tree, &moved, &neighbours, true);
            }
        }
    }

    /// Detach `instance`; with `remove_data`, also release its bindings and
    /// drop Data nodes left without any bound Form node.
    fn remove_item(&self, doc: &mut XfaDocument, instance: NodeId, remove_data: bool) {
        if !remove_data {
            doc.tree.detach(instance);
            return;
        }
        doc.dispose(instance);
        for form in doc.tree.container_descendants(instance) {
            let Some(data) = doc.bindings.unbind(form) else {
                continue;
            };
            if !doc.bindings.has_items(data) {
                if let Some(data_parent) = doc.tree.parent(data) {
                    log::trace!("Removing unreferenced data node {}", data);
                    doc.tree.remove_child(data_parent, data);
                    doc.registry.forget(data);
                    doc.disposed.push(data);
                }
            }
        }
    }
}

/// Data nodes bound anywhere in the container subtree of `root`.
fn collect_bound_data(doc: &XfaDocument, root: NodeId) -> IndexSet<NodeId> {
    doc.tree
        .container_descendants(root)
        .into_iter()
        .filter_map(|form| doc.bindings.binding(form))
        .collect()
}

/// Move Data nodes so their sibling order follows a Form-tree move.
///
/// Both sets are partitioned by parent and name. In each partition holding
/// nodes from both sets, the `moved` nodes are relocated as a block right
/// before the first `neighbours` node, or right after the last one when
/// `insert_before` is false. Nodes present in both sets stay put.
pub(crate) fn reorder_data_nodes(
    tree: &mut NodeTree,
    moved: &IndexSet<NodeId>,
    neighbours: &IndexSet<NodeId>,
    insert_before: bool,
) {
    let mut partitions: IndexMap<(Option<NodeId>, u32), (Vec<NodeId>, Vec<NodeId>)> = IndexMap::new();
    for &node in moved.iter().filter(|n| !neighbours.contains(*n)) {
        let key = (tree.parent(node), tree.name_hash(node));
        partitions.entry(key).or_default().0.push(node);
    }
    for &node in neighbours.iter().filter(|n| !moved.contains(*n)) {
        let key = (tree.parent(node), tree.name_hash(node));
        partitions.entry(key).or_default().1.push(node);
    }

    for ((parent, _), (mut movers, mut anchors)) in partitions {
        let Some(parent) = parent else {
            continue;
        };
        if movers.is_empty() || anchors.is_empty() {
            continue;
        }
        movers.sort_by_key(|&n| tree.index_in_parent(n));
        anchors.sort_by_key(|&n| tree.index_in_parent(n));

        let before = if insert_before {
            anchors.first().copied()
        } else {
            anchors.last().and_then(|&last| {
                tree.following_siblings(last)
                    .iter()
                    .copied()
                    .find(|n| !movers.contains(n))
            })
        };
        log::trace!("Reordering {} data node(s) under {}", movers.len(), parent);
        for node in movers {
            tree.remove_child(parent, node);
            tree.insert_child(parent, node, before);
        }
    }
}
