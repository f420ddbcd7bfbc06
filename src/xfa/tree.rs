//! Arena storage for XFA nodes.
//!
//! All three trees (Template, Data, Form) share one [`NodeTree`]. Children are
//! stored as id vectors and parents as ids, so detaching and re-attaching a
//! subtree only moves indices. Detached nodes stay allocated until the owning
//! document drops; they are simply unreachable from any packet root.

use super::node::{name_hash, Element, MarkupRef, Node, NodeFlags, NodeId, Packet};
use crate::error::{Error, Result};

/// Node arena.
#[derive(Debug, Clone, Default)]
pub struct NodeTree {
    nodes: Vec<Node>,
}

impl NodeTree {
    /// Create an empty arena.
    pub fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    /// Number of allocated nodes (attached or not).
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether no node was ever allocated.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Allocate a detached node.
    ///
    /// Fails with [`Error::CreationFailure`] when `element` cannot live in `packet`.
    pub fn create_node(&mut self, packet: Packet, element: Element) -> Result<NodeId> {
        if !element.is_valid_in(packet) {
            return Err(Error::CreationFailure { element, packet });
        }
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node::new(packet, element));
        Ok(id)
    }

    /// Look up a node, rejecting ids from another arena.
    pub fn node(&self, id: NodeId) -> Result<&Node> {
        self.nodes.get(id.index()).ok_or(Error::InvalidNode(id))
    }

    /// Whether `id` was allocated by this arena.
    pub fn contains(&self, id: NodeId) -> bool {
        id.index() < self.nodes.len()
    }

    // Ids handed to the accessors below are minted by this arena.
    fn get(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    fn get_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.index()]
    }

    /// Element kind of `id`.
    pub fn element(&self, id: NodeId) -> Element {
        self.get(id).element
    }

    /// Packet of `id`.
    pub fn packet(&self, id: NodeId) -> Packet {
        self.get(id).packet
    }

    /// Whether `id` is a container node.
    pub fn is_container(&self, id: NodeId) -> bool {
        self.get(id).element.is_container()
    }

    /// Name of `id`.
    pub fn name(&self, id: NodeId) -> &str {
        &self.get(id).name
    }

    /// Name hash of `id`.
    pub fn name_hash(&self, id: NodeId) -> u32 {
        self.get(id).name_hash
    }

    /// Rename `id` and refresh its name hash.
    pub fn set_name(&mut self, id: NodeId, name: &str) {
        let node = self.get_mut(id);
        node.name = name.to_string();
        node.name_hash = name_hash(name);
    }

    /// Attribute value of `id`.
    pub fn attribute(&self, id: NodeId, key: &str) -> Option<&str> {
        self.get(id).attribute(key)
    }

    /// Set an attribute on `id`.
    pub fn set_attribute(&mut self, id: NodeId, key: &str, value: impl Into<String>) {
        self.get_mut(id).attributes.insert(key.to_string(), value.into());
    }

    /// Remove an attribute from `id`.
    pub fn remove_attribute(&mut self, id: NodeId, key: &str) -> Option<String> {
        self.get_mut(id).attributes.shift_remove(key)
    }

    /// Copy all attributes of `from` onto `to`.
    pub(crate) fn copy_attributes(&mut self, from: NodeId, to: NodeId) {
        let attributes = self.get(from).attributes.clone();
        self.get_mut(to).attributes.extend(attributes);
    }

    /// Parent of `id`.
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).parent
    }

    /// Ordered children of `id`.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.get(id).children
    }

    /// First child of `id`.
    pub fn first_child(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).children.first().copied()
    }

    /// Position of `id` among its siblings.
    pub fn index_in_parent(&self, id: NodeId) -> Option<usize> {
        let parent = self.parent(id)?;
        self.get(parent).children.iter().position(|&c| c == id)
    }

    /// Next sibling of `id`.
    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let idx = self.index_in_parent(id)?;
        self.get(parent).children.get(idx + 1).copied()
    }

    /// Previous sibling of `id`.
    pub fn prev_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let idx = self.index_in_parent(id)?;
        idx.checked_sub(1).map(|i| self.get(parent).children[i])
    }

    /// Siblings following `id`, in document order.
    pub fn following_siblings(&self, id: NodeId) -> &[NodeId] {
        match (self.parent(id), self.index_in_parent(id)) {
            (Some(parent), Some(idx)) => &self.get(parent).children[idx + 1..],
            _ => &[],
        }
    }

    /// First child of `id` whose name hash is `hash`.
    pub fn first_child_by_name(&self, id: NodeId, hash: u32) -> Option<NodeId> {
        self.children(id).iter().copied().find(|&c| self.name_hash(c) == hash)
    }

    /// First child of `id` of kind `element`.
    pub fn first_child_by_class(&self, id: NodeId, element: Element) -> Option<NodeId> {
        self.children(id).iter().copied().find(|&c| self.element(c) == element)
    }

    /// Children of `id` whose name hash is `hash`, in document order.
    pub fn children_by_name(&self, id: NodeId, hash: u32) -> impl Iterator<Item = NodeId> + '_ {
        self.children(id).iter().copied().filter(move |&c| self.name_hash(c) == hash)
    }

    /// Children of `id` of kind `element`, in document order.
    pub fn children_by_class(
        &self,
        id: NodeId,
        element: Element,
    ) -> impl Iterator<Item = NodeId> + '_ {
        self.children(id).iter().copied().filter(move |&c| self.element(c) == element)
    }

    /// Next sibling of `id` sharing the name hash `hash`.
    pub fn next_same_name_sibling(&self, id: NodeId, hash: u32) -> Option<NodeId> {
        self.following_siblings(id).iter().copied().find(|&c| self.name_hash(c) == hash)
    }

    /// Next sibling of `id` of kind `element`.
    pub fn next_same_class_sibling(&self, id: NodeId, element: Element) -> Option<NodeId> {
        self.following_siblings(id).iter().copied().find(|&c| self.element(c) == element)
    }

    /// Insert `node` under `parent`, before `before` when it is a child of
    /// `parent`, else at the end. A still-attached `node` is moved.
    pub fn insert_child(&mut self, parent: NodeId, node: NodeId, before: Option<NodeId>) {
        self.detach(node);
        let position = before.and_then(|b| self.get(parent).children.iter().position(|&c| c == b));
        let children = &mut self.get_mut(parent).children;
        match position {
            Some(idx) => children.insert(idx, node),
            None => children.push(node),
        }
        self.get_mut(node).parent = Some(parent);
    }

    /// Append `node` as last child of `parent`.
    pub fn append_child(&mut self, parent: NodeId, node: NodeId) {
        self.insert_child(parent, node, None);
    }

    /// Remove `node` from `parent`. Returns false when it was not a child.
    pub fn remove_child(&mut self, parent: NodeId, node: NodeId) -> bool {
        let children = &mut self.get_mut(parent).children;
        match children.iter().position(|&c| c == node) {
            Some(idx) => {
                children.remove(idx);
                self.get_mut(node).parent = None;
                true
            },
            None => false,
        }
    }

    /// Detach `node` from whatever parent holds it.
    pub fn detach(&mut self, node: NodeId) {
        if let Some(parent) = self.parent(node) {
            self.remove_child(parent, node);
        }
    }

    /// State flags of `id`.
    pub fn flags(&self, id: NodeId) -> NodeFlags {
        self.get(id).flags
    }

    /// Whether `id` carries `flag`.
    pub fn has_flag(&self, id: NodeId, flag: NodeFlags) -> bool {
        self.get(id).flags.contains(flag)
    }

    /// Set `flag` on `id`.
    pub fn set_flag(&mut self, id: NodeId, flag: NodeFlags) {
        self.get_mut(id).flags.insert(flag);
    }

    /// Clear `flag` on `id`.
    pub fn clear_flag(&mut self, id: NodeId, flag: NodeFlags) {
        self.get_mut(id).flags.remove(flag);
    }

    /// Whether `id` is a Form node left unused by the merge in progress.
    pub fn is_unused(&self, id: NodeId) -> bool {
        self.has_flag(id, NodeFlags::UNUSED)
    }

    /// Markup back-reference of `id`.
    pub fn markup(&self, id: NodeId) -> Option<&MarkupRef> {
        self.get(id).markup.as_ref()
    }

    /// Create the markup back-reference of `id` named after the node, if missing.
    pub fn create_markup(&mut self, id: NodeId) {
        let node = self.get_mut(id);
        if node.markup.is_none() {
            node.markup = Some(MarkupRef {
                tag: node.name.clone(),
            });
        }
    }

    /// Attach an explicit markup back-reference to `id`.
    pub fn set_markup(&mut self, id: NodeId, markup: MarkupRef) {
        self.get_mut(id).markup = Some(markup);
    }

    /// Drop the markup back-reference of `id`.
    pub fn clear_markup(&mut self, id: NodeId) -> Option<MarkupRef> {
        self.get_mut(id).markup.take()
    }

    /// `root` and all its descendants in pre-order.
    pub fn descendants(&self, root: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            out.push(id);
            stack.extend(self.children(id).iter().rev().copied());
        }
        out
    }

    /// `root` and its container descendants reached through containers only, in pre-order.
    pub fn container_descendants(&self, root: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut cursor = ContainerCursor::new(root);
        while let Some(id) = cursor.current() {
            out.push(id);
            cursor.move_to_next(self);
        }
        out
    }

    /// Whether `ancestor` is `node` or one of its ancestors.
    pub fn is_ancestor_or_self(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.parent(id);
        }
        false
    }

    /// Dot-separated name path from the packet root down to `id`.
    pub fn path(&self, id: NodeId) -> String {
        let mut parts = Vec::new();
        let mut current = Some(id);
        while let Some(node) = current {
            if self.parent(node).is_none() {
                break;
            }
            parts.push(self.name(node).to_string());
            current = self.parent(node);
        }
        parts.reverse();
        parts.join(".")
    }
}

/// Pre-order cursor over the container nodes of a subtree.
///
/// Only container children are descended into, so properties such as `occur`
/// or `bind` are never visited. The cursor can skip the subtree under its
/// current node, which binding uses to ignore everything below a DataRef miss.
#[derive(Debug, Clone)]
pub struct ContainerCursor {
    root: NodeId,
    current: Option<NodeId>,
}

impl ContainerCursor {
    /// Start at `root`.
    pub fn new(root: NodeId) -> Self {
        Self {
            root,
            current: Some(root),
        }
    }

    /// Node under the cursor.
    pub fn current(&self) -> Option<NodeId> {
        self.current
    }

    /// Advance in pre-order.
    pub fn move_to_next(&mut self, tree: &NodeTree) -> Option<NodeId> {
        let current = self.current?;
        match tree.children(current).iter().copied().find(|&c| tree.is_container(c)) {
            Some(child) => {
                self.current = Some(child);
                self.current
            },
            None => self.skip_children_and_move_to_next(tree),
        }
    }

    /// Advance past the subtree under the cursor.
    pub fn skip_children_and_move_to_next(&mut self, tree: &NodeTree) -> Option<NodeId> {
        let mut node = self.current?;
        loop {
            if node == self.root {
                self.current = None;
                return None;
            }
            if let Some(next) =
                tree.following_siblings(node).iter().copied().find(|&c| tree.is_container(c))
            {
                self.current = Some(next);
                return self.current;
            }
            match tree.parent(node) {
                Some(parent) => node = parent,
                None => {
                    self.current = None;
                    return None;
                },
            }
        }
    }
}
