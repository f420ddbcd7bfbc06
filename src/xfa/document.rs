//! Per-document merge context.
//!
//! [`XfaDocument`] owns the node arena holding the Template, Data and Form
//! trees together with every piece of document-scoped engine state: relation
//! tables, the global binding registry, options, the change observer and the
//! list of page sets waiting for layout. Engine entry points are methods on it
//! (see the `merge`, `rebind` and `instance_manager` modules).

use super::dump::FormNodeDump;
use super::instance_manager::InstanceManager;
use super::node::{name_hash, Element, NodeId, Packet};
use super::notify::{FormNotify, NoopNotify};
use super::registry::GlobalBindingRegistry;
use super::relations::BindingTable;
use super::tree::NodeTree;
use crate::config::MergeOptions;
use crate::error::{Error, Result};
use std::fmt;

/// Name of the data root group under the datasets packet.
pub(crate) const DATA_ROOT_NAME: &str = "data";
/// Name of the data-description group under the datasets packet.
pub(crate) const DATA_DESCRIPTION_NAME: &str = "dataDescription";

/// State captured before a re-merge so a failure can be rolled back.
#[derive(Debug, Clone)]
pub(crate) struct DocumentSnapshot {
    tree: NodeTree,
    bindings: BindingTable,
    registry: GlobalBindingRegistry,
    pending_page_sets: Vec<NodeId>,
    disposed: Vec<NodeId>,
}

/// An XFA document: Template, Data and Form trees plus merge state.
pub struct XfaDocument {
    pub(crate) tree: NodeTree,
    pub(crate) bindings: BindingTable,
    pub(crate) registry: GlobalBindingRegistry,
    pub(crate) options: MergeOptions,
    pub(crate) notify: Box<dyn FormNotify>,
    pub(crate) root: NodeId,
    pub(crate) pending_page_sets: Vec<NodeId>,
    pub(crate) disposed: Vec<NodeId>,
}

impl fmt::Debug for XfaDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("XfaDocument")
            .field("nodes", &self.tree.len())
            .field("bound", &self.bindings.bound_count())
            .field("globals", &self.registry.len())
            .field("options", &self.options)
            .field("pending_page_sets", &self.pending_page_sets)
            .finish_non_exhaustive()
    }
}

impl Default for XfaDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl XfaDocument {
    /// Create an empty document holding only the XDP root.
    pub fn new() -> Self {
        Self::with_options(MergeOptions::default())
    }

    /// Create an empty document with explicit options.
    pub fn with_options(options: MergeOptions) -> Self {
        let mut tree = NodeTree::new();
        let root = NodeId(0);
        // The Xfa element is always valid in the Xdp packet.
        if let Ok(id) = tree.create_node(Packet::Xdp, Element::Xfa) {
            debug_assert_eq!(id, root);
            tree.set_name(id, "xfa");
        }
        Self {
            tree,
            bindings: BindingTable::new(),
            registry: GlobalBindingRegistry::new(),
            options,
            notify: Box::new(NoopNotify),
            root,
            pending_page_sets: Vec::new(),
            disposed: Vec::new(),
        }
    }

    /// Install the change observer, returning the previous one.
    pub fn set_notify(&mut self, notify: Box<dyn FormNotify>) -> Box<dyn FormNotify> {
        std::mem::replace(&mut self.notify, notify)
    }

    /// Engine options.
    pub fn options(&self) -> &MergeOptions {
        &self.options
    }

    /// Replace the engine options.
    pub fn set_options(&mut self, options: MergeOptions) {
        self.options = options;
    }

    /// The node arena.
    pub fn tree(&self) -> &NodeTree {
        &self.tree
    }

    /// Mutable access to the node arena, for building Template and Data trees.
    pub fn tree_mut(&mut self) -> &mut NodeTree {
        &mut self.tree
    }

    /// Relation tables.
    pub fn bindings(&self) -> &BindingTable {
        &self.bindings
    }

    /// Global binding registry.
    pub fn registry(&self) -> &GlobalBindingRegistry {
        &self.registry
    }

    /// The XDP root.
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Data node bound to `form`.
    pub fn binding(&self, form: NodeId) -> Option<NodeId> {
        self.bindings.binding(form)
    }

    /// Form nodes bound to `data`.
    pub fn items(&self, data: NodeId) -> &[NodeId] {
        self.bindings.items(data)
    }

    /// Template node a Form node was produced from.
    pub fn template_of(&self, form: NodeId) -> Option<NodeId> {
        self.bindings.template(form)
    }

    /// Page sets detached from the Form tree by the last merge, waiting for layout.
    pub fn pending_page_sets(&self) -> &[NodeId] {
        &self.pending_page_sets
    }

    /// Nodes detached by the engine since the document was created.
    pub fn disposed_nodes(&self) -> &[NodeId] {
        &self.disposed
    }

    /// Template packet root.
    pub fn template_root(&self) -> Option<NodeId> {
        self.tree.first_child_by_class(self.root, Element::Template)
    }

    /// Form packet root.
    pub fn form_root(&self) -> Option<NodeId> {
        self.tree.first_child_by_class(self.root, Element::Form)
    }

    /// Datasets packet root.
    pub fn datasets_root(&self) -> Option<NodeId> {
        self.tree.first_child_by_class(self.root, Element::DataModel)
    }

    /// The `data` group holding the data records.
    pub fn data_root(&self) -> Option<NodeId> {
        let datasets = self.datasets_root()?;
        self.data_group_named(datasets, DATA_ROOT_NAME)
    }

    /// The `dataDescription` group, if the datasets packet carries one.
    pub fn data_description_root(&self) -> Option<NodeId> {
        let datasets = self.datasets_root()?;
        self.data_group_named(datasets, DATA_DESCRIPTION_NAME)
    }

    /// The first data record: the first group under the data root.
    pub fn record(&self) -> Option<NodeId> {
        let data = self.data_root()?;
        self.tree.first_child_by_class(data, Element::DataGroup)
    }

    fn data_group_named(&self, parent: NodeId, name: &str) -> Option<NodeId> {
        let hash = name_hash(name);
        self.tree
            .children_by_name(parent, hash)
            .find(|&c| self.tree.element(c) == Element::DataGroup)
    }

    /// Return the Template packet root, creating it when missing.
    pub fn ensure_template_root(&mut self) -> Result<NodeId> {
        if let Some(root) = self.template_root() {
            return Ok(root);
        }
        self.create_packet_root(Packet::Template, Element::Template, "template")
    }

    /// Return the Form packet root, creating it when missing.
    pub fn ensure_form_root(&mut self) -> Result<NodeId> {
        if let Some(root) = self.form_root() {
            return Ok(root);
        }
        self.create_packet_root(Packet::Form, Element::Form, "form")
    }

    /// Return the datasets root, creating it when missing.
    pub fn ensure_datasets_root(&mut self) -> Result<NodeId> {
        if let Some(root) = self.datasets_root() {
            return Ok(root);
        }
        self.create_packet_root(Packet::Datasets, Element::DataModel, "datasets")
    }

    /// Return the data root, creating it (and the datasets root) when missing.
    pub fn ensure_data_root(&mut self) -> Result<NodeId> {
        if let Some(data) = self.data_root() {
            return Ok(data);
        }
        let datasets = self.ensure_datasets_root()?;
        let data = self.tree.create_node(Packet::Datasets, Element::DataGroup)?;
        self.tree.set_name(data, DATA_ROOT_NAME);
        self.tree.create_markup(data);
        self.tree.append_child(datasets, data);
        Ok(data)
    }

    fn create_packet_root(&mut self, packet: Packet, element: Element, name: &str) -> Result<NodeId> {
        let node = self.tree.create_node(packet, element)?;
        self.tree.set_name(node, name);
        self.tree.append_child(self.root, node);
        Ok(node)
    }

    /// Allocate a named node and append it under `parent`.
    pub fn add_node(
        &mut self,
        parent: NodeId,
        packet: Packet,
        element: Element,
        name: &str,
    ) -> Result<NodeId> {
        self.tree.node(parent)?;
        let node = self.tree.create_node(packet, element)?;
        self.tree.set_name(node, name);
        self.tree.append_child(parent, node);
        Ok(node)
    }

    /// Handle for the instance manager node `node`.
    pub fn instance_manager(&self, node: NodeId) -> Result<InstanceManager> {
        if self.tree.node(node)?.element() != Element::InstanceManager {
            return Err(Error::NotInstanceManager(node));
        }
        Ok(InstanceManager::new(node))
    }

    /// Every instance manager attached to the Form tree, in document order.
    pub fn instance_managers(&self) -> Vec<InstanceManager> {
        let Some(form) = self.form_root() else {
            return Vec::new();
        };
        self.tree
            .descendants(form)
            .into_iter()
            .filter(|&n| self.tree.element(n) == Element::InstanceManager)
            .map(InstanceManager::new)
            .collect()
    }

    /// Instance manager governing the subform instance `form`.
    pub fn instance_manager_for(&self, form: NodeId) -> Option<InstanceManager> {
        if !self.tree.contains(form) || !self.tree.element(form).is_subform_like() {
            return None;
        }
        let parent = self.tree.parent(form)?;
        let index = self.tree.index_in_parent(form)?;
        let siblings = self.tree.children(parent);
        let manager = siblings[..index]
            .iter()
            .rev()
            .copied()
            .find(|&n| self.tree.element(n) == Element::InstanceManager)?;
        let im = InstanceManager::new(manager);
        im.instances(self).contains(&form).then_some(im)
    }

    /// Value of a bound Data node or the default value of a Form field.
    pub fn value(&self, node: NodeId) -> Option<String> {
        super::binding::node_value(&self.tree, node)
    }

    /// Serializable snapshot of the Form tree.
    pub fn dump_form(&self) -> Option<FormNodeDump> {
        self.form_root().map(|form| FormNodeDump::build(self, form))
    }

    pub(crate) fn check_depth(&self, depth: u32) -> Result<()> {
        if depth > self.options.max_recursion_depth {
            return Err(Error::RecursionLimitExceeded(self.options.max_recursion_depth));
        }
        Ok(())
    }

    /// Detach `node` and queue it for disposal.
    pub(crate) fn dispose(&mut self, node: NodeId) {
        if let Some(parent) = self.tree.parent(node) {
            self.tree.remove_child(parent, node);
            self.notify.on_child_removed(parent, node);
        }
        self.disposed.push(node);
    }

    pub(crate) fn snapshot(&self) -> DocumentSnapshot {
        DocumentSnapshot {
            tree: self.tree.clone(),
            bindings: self.bindings.clone(),
            registry: self.registry.clone(),
            pending_page_sets: self.pending_page_sets.clone(),
            disposed: self.disposed.clone(),
        }
    }

    pub(crate) fn restore(&mut self, snapshot: DocumentSnapshot) {
        self.tree = snapshot.tree;
        self.bindings = snapshot.bindings;
        self.registry = snapshot.registry;
        self.pending_page_sets = snapshot.pending_page_sets;
        self.disposed = snapshot.disposed;
    }
}
