//! Binding resolver.
//!
//! Decides which Data node a Template container binds to, creates Data nodes
//! on demand and transfers values across a new binding. The bind mode comes
//! from the `match` attribute of the container's `bind` child:
//!
//! - `none`: never bound
//! - `once` (default): first unbound same-name node of the expected kind in
//!   the data scope or one of its ancestors
//! - `global`: one Data node per name for the whole document, found anywhere
//!   below the scope chain and remembered in the global registry
//! - `dataRef`: the node named by the `ref` path expression

use super::document::XfaDocument;
use super::node::{name_hash, Element, NodeFlags, NodeId, Packet};
use super::occur::read_occurrence;
use super::som::{self, ResolveFlags, ResolveOutcome, SomRoots};
use super::tree::{ContainerCursor, NodeTree};
use crate::error::Result;

/// How a Template container finds its Data node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BindMode {
    /// Not bound to data
    None,
    /// Bound by name within the data scope chain
    #[default]
    Once,
    /// Bound by name to one document-wide Data node
    Global,
    /// Bound through a path expression
    DataRef,
}

impl BindMode {
    /// Parse a `match` attribute value; unknown values mean `once`.
    pub fn from_attribute(value: &str) -> Self {
        match value {
            "none" => Self::None,
            "global" => Self::Global,
            "dataRef" => Self::DataRef,
            _ => Self::Once,
        }
    }
}

/// Bind mode of `template`.
pub fn bind_mode(tree: &NodeTree, template: NodeId) -> BindMode {
    tree.first_child_by_class(template, Element::Bind)
        .and_then(|bind| tree.attribute(bind, "match"))
        .map(BindMode::from_attribute)
        .unwrap_or_default()
}

/// `ref` path of the `bind` child of `template`.
pub fn bind_ref(tree: &NodeTree, template: NodeId) -> Option<&str> {
    tree.first_child_by_class(template, Element::Bind)
        .and_then(|bind| tree.attribute(bind, "ref"))
}

/// Whether `node` is a field showing a multi-select list box.
pub fn is_multi_select_list(tree: &NodeTree, node: NodeId) -> bool {
    if tree.element(node) != Element::Field {
        return false;
    }
    tree.first_child_by_class(node, Element::Ui)
        .and_then(|ui| tree.first_child_by_class(ui, Element::ChoiceList))
        .and_then(|list| tree.attribute(list, "open"))
        == Some("multiSelect")
}

/// Kind of Data node `node` binds to, `None` for containers that never bind.
pub fn expected_data_kind(tree: &NodeTree, node: NodeId) -> Option<Element> {
    match tree.element(node) {
        Element::Subform => Some(Element::DataGroup),
        Element::Field if is_multi_select_list(tree, node) => Some(Element::DataGroup),
        Element::Field | Element::ExclGroup => Some(Element::DataValue),
        _ => None,
    }
}

/// Value carried by a Data node, or the value of a Form or Template field.
pub fn node_value(tree: &NodeTree, node: NodeId) -> Option<String> {
    match tree.element(node) {
        Element::DataValue => tree.attribute(node, "value").map(str::to_string),
        Element::DataGroup => {
            let values: Vec<&str> = tree
                .children(node)
                .iter()
                .filter_map(|&c| tree.attribute(c, "value"))
                .collect();
            (!values.is_empty()).then(|| values.join("\n"))
        },
        _ => {
            let value = tree.first_child_by_class(node, Element::Value)?;
            let content = tree.first_child(value)?;
            tree.attribute(content, "value").map(str::to_string)
        },
    }
}

/// A successful match during a template walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct MatchOutcome {
    /// Matched Data node
    pub data: NodeId,
    /// Bind mode of the template node that matched
    pub mode: BindMode,
    /// Whether the walk root itself matched rather than a descendant
    pub self_match: bool,
}

/// Data-description groups nested under `root` through `group` children, in pre-order.
fn description_groups(tree: &NodeTree, root: NodeId) -> Vec<NodeId> {
    let group_hash = name_hash("group");
    let mut out = Vec::new();
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        out.push(node);
        let nested: Vec<NodeId> = tree
            .children_by_name(node, group_hash)
            .filter(|&c| tree.element(c) == Element::DataGroup)
            .collect();
        stack.extend(nested.into_iter().rev());
    }
    out
}

impl XfaDocument {
    pub(crate) fn som_roots(&self) -> SomRoots {
        SomRoots {
            data: self.data_root(),
            record: self.record(),
            max_index: self.options.max_path_index,
        }
    }

    /// First unbound Data node of `kind` named `hash` in `scope` or its ancestors.
    pub(crate) fn find_once_data_node(&self, hash: u32, scope: NodeId, kind: Element) -> Option<NodeId> {
        if hash == 0 {
            return None;
        }
        let mut last = None;
        let mut current = Some(scope);
        while let Some(level) = current {
            if self.tree.packet(level) != Packet::Datasets {
                break;
            }
            let hit = self.tree.children_by_name(level, hash).find(|&c| {
                Some(c) != last && self.tree.element(c) == kind && !self.bindings.has_items(c)
            });
            if hit.is_some() {
                return hit;
            }
            last = Some(level);
            current = self.tree.parent(level);
        }
        None
    }

    fn scope_match_global(
        &self,
        scope: NodeId,
        hash: u32,
        kind: Element,
        up_level: bool,
        depth: u32,
    ) -> Result<Option<NodeId>> {
        self.check_depth(depth)?;
        let description = self.data_description_root();
        let mut last = None;
        let mut current = Some(scope);
        while let Some(level) = current {
            if self.tree.packet(level) != Packet::Datasets {
                break;
            }
            let hit = self.tree.children_by_name(level, hash).find(|&c| {
                Some(c) != last && self.tree.element(c) == kind && !self.bindings.has_items(c)
            });
            if hit.is_some() {
                return Ok(hit);
            }
            for group in self.tree.children_by_class(level, Element::DataGroup) {
                if Some(group) == description {
                    continue;
                }
                if let Some(found) = self.scope_match_global(group, hash, kind, false, depth + 1)? {
                    return Ok(Some(found));
                }
            }
            if !up_level {
                break;
            }
            last = Some(level);
            current = self.tree.parent(level);
        }
        Ok(None)
    }

    /// Global-mode lookup: registry first, then a document-wide search.
    pub(crate) fn find_global_data_node(
        &mut self,
        hash: u32,
        scope: NodeId,
        kind: Element,
    ) -> Result<Option<NodeId>> {
        if hash == 0 {
            return Ok(None);
        }
        if let Some(hit) = self.registry.lookup(hash) {
            log::trace!("Global binding registry hit for hash {:#x}", hash);
            return Ok(Some(hit));
        }
        let found = self.scope_match_global(scope, hash, kind, true, 0)?;
        if let Some(data) = found {
            self.registry.register(hash, data);
        }
        Ok(found)
    }

    /// DataRef lookup through the path resolver, preferring unbound results.
    pub(crate) fn find_data_ref_data_node(
        &mut self,
        path: &str,
        scope: NodeId,
        kind: Element,
        force_bind: bool,
        up_level: bool,
    ) -> Result<Option<NodeId>> {
        let mut flags = ResolveFlags::BIND_NEW;
        if up_level {
            flags |= ResolveFlags::PARENT;
        }
        let roots = self.som_roots();
        let resolution = som::resolve(&mut self.tree, roots, scope, path, flags, kind)?;
        let picked = if resolution.nodes.len() > 1
            || matches!(
                resolution.outcome,
                ResolveOutcome::CreatedAll | ResolveOutcome::CreatedMidAll
            ) {
            resolution.nodes.iter().copied().find(|&n| !self.bindings.has_items(n))
        } else {
            resolution.first().filter(|&n| force_bind || !self.bindings.has_items(n))
        };
        Ok(picked.filter(|&n| self.tree.element(n) == kind))
    }

    /// Walk the container subtree under `cursor` until a template node finds data.
    ///
    /// `accessed` is set once any node in the walk consults the Data tree.
    /// Global-mode nodes are only resolved when `force_bind` is set.
    pub(crate) fn find_matching_data_node(
        &mut self,
        template: NodeId,
        scope: NodeId,
        cursor: &mut ContainerCursor,
        force_bind: bool,
        up_level: bool,
        accessed: &mut bool,
    ) -> Result<Option<MatchOutcome>> {
        while let Some(current) = cursor.current() {
            let Some(kind) = expected_data_kind(&self.tree, current) else {
                cursor.move_to_next(&self.tree);
                continue;
            };
            if self.tree.first_child_by_class(current, Element::Occur).is_some()
                && read_occurrence(&self.tree, current).max == 0
            {
                cursor.move_to_next(&self.tree);
                continue;
            }

            let mode = bind_mode(&self.tree, current);
            let hash = self.tree.name_hash(current);
            let found = match mode {
                BindMode::None => None,
                BindMode::Global if !force_bind => {
                    *accessed = true;
                    None
                },
                BindMode::Global
                    if kind == Element::DataValue || is_multi_select_list(&self.tree, current) =>
                {
                    *accessed = true;
                    self.find_global_data_node(hash, scope, kind)?
                },
                BindMode::Global | BindMode::Once => {
                    *accessed = true;
                    self.find_once_data_node(hash, scope, kind)
                },
                BindMode::DataRef => {
                    *accessed = true;
                    let path = bind_ref(&self.tree, current).unwrap_or_default().to_string();
                    let found =
                        self.find_data_ref_data_node(&path, scope, kind, force_bind, up_level)?;
                    if found.is_none() {
                        cursor.skip_children_and_move_to_next(&self.tree);
                        continue;
                    }
                    found
                },
            };
            match found {
                Some(data) => {
                    return Ok(Some(MatchOutcome {
                        data,
                        mode,
                        self_match: current == template,
                    }));
                },
                None => {
                    cursor.move_to_next(&self.tree);
                },
            }
        }
        Ok(None)
    }

    /// Find the Data node `template` binds to within `scope`.
    ///
    /// With `force_create`, a miss creates the node the bind mode asks for
    /// (when data creation is enabled in the options). Returns `None` for
    /// `none`-mode templates and for misses that cannot create.
    pub fn find_match(
        &mut self,
        template: NodeId,
        scope: NodeId,
        force_create: bool,
    ) -> Result<Option<NodeId>> {
        self.tree.node(template)?;
        self.tree.node(scope)?;
        let mode = bind_mode(&self.tree, template);
        if mode == BindMode::None {
            return Ok(None);
        }
        let mut cursor = ContainerCursor::new(template);
        let mut accessed = false;
        let found =
            self.find_matching_data_node(template, scope, &mut cursor, true, true, &mut accessed)?;
        if let Some(outcome) = found.filter(|m| m.self_match) {
            return Ok(Some(outcome.data));
        }
        if !force_create {
            return Ok(None);
        }
        Ok(self
            .create_data_for(template, template, mode, scope)?
            .map(|(data, _)| data))
    }

    /// Create (or for path bindings, resolve with creation) the Data node
    /// `node` needs under `scope`. `template` supplies the bind rule.
    ///
    /// Returns the node and whether it already existed.
    pub(crate) fn create_data_for(
        &mut self,
        node: NodeId,
        template: NodeId,
        mode: BindMode,
        scope: NodeId,
    ) -> Result<Option<(NodeId, bool)>> {
        if !self.options.create_data_nodes {
            return Ok(None);
        }
        let kind = if self.tree.element(node) == Element::Subform
            || is_multi_select_list(&self.tree, node)
        {
            Element::DataGroup
        } else {
            Element::DataValue
        };
        let hash = self.tree.name_hash(node);
        let name = self.tree.name(node).to_string();
        match mode {
            BindMode::None => Ok(None),
            BindMode::Once => {
                if hash == 0 || self.tree.attribute(node, "scope") == Some("none") {
                    return Ok(None);
                }
                Ok(self.maybe_create_data_node(scope, kind, &name)?.map(|d| (d, false)))
            },
            BindMode::Global => {
                if hash == 0 {
                    return Ok(None);
                }
                if let Some(hit) = self.registry.lookup(hash) {
                    return Ok(Some((hit, true)));
                }
                let Some(record) = self.record() else {
                    return Ok(None);
                };
                let created = self.maybe_create_data_node(record, kind, &name)?;
                if let Some(data) = created {
                    self.registry.register(hash, data);
                }
                Ok(created.map(|d| (d, false)))
            },
            BindMode::DataRef => {
                let path = bind_ref(&self.tree, template).unwrap_or_default().to_string();
                let roots = self.som_roots();
                let resolution =
                    som::resolve(&mut self.tree, roots, scope, &path, ResolveFlags::CREATE, kind)?;
                let existed = resolution.outcome == ResolveOutcome::Existing;
                Ok(resolution.first().map(|d| (d, existed)))
            },
        }
    }

    /// Create a Data node of `kind` named `name` under `parent`.
    ///
    /// When `parent` is linked to a data description, only nodes the
    /// description declares with the same kind are created.
    pub(crate) fn maybe_create_data_node(
        &mut self,
        parent: NodeId,
        kind: Element,
        name: &str,
    ) -> Result<Option<NodeId>> {
        let Some(description) = self.bindings.data_description(parent) else {
            let node = self.new_data_node(parent, kind, name)?;
            return Ok(Some(node));
        };

        let hash = name_hash(name);
        for group in description_groups(&self.tree, description) {
            let Some(described) = self.tree.first_child_by_name(group, hash) else {
                continue;
            };
            if self.tree.element(described) != kind {
                break;
            }
            let node = self.new_data_node(parent, kind, name)?;
            if kind == Element::DataValue
                && self.tree.attribute(described, "contains") == Some("metaData")
            {
                self.tree.set_attribute(node, "contains", "metaData");
            }
            self.bindings.set_data_description(node, described);
            return Ok(Some(node));
        }
        log::debug!("Data description of {} does not declare {:?}", parent, name);
        Ok(None)
    }

    fn new_data_node(&mut self, parent: NodeId, kind: Element, name: &str) -> Result<NodeId> {
        let node = self.tree.create_node(Packet::Datasets, kind)?;
        self.tree.set_name(node, name);
        self.tree.create_markup(node);
        self.tree.append_child(parent, node);
        self.tree.set_flag(node, NodeFlags::INITIALIZED);
        log::trace!("Created data node {} {:?} under {}", node, name, parent);
        Ok(node)
    }

    /// Link the children of `data` to their declarations under `description`.
    pub(crate) fn update_data_relation(
        &mut self,
        data: NodeId,
        description: NodeId,
        depth: u32,
    ) -> Result<()> {
        self.check_depth(depth)?;
        for child in self.tree.children(data).to_vec() {
            let hash = self.tree.name_hash(child);
            if hash == 0 {
                continue;
            }
            for group in description_groups(&self.tree, description) {
                let Some(described) = self.tree.first_child_by_name(group, hash) else {
                    continue;
                };
                if self.tree.element(described) != self.tree.element(child) {
                    break;
                }
                self.bindings.set_data_description(child, described);
                self.update_data_relation(child, described, depth + 1)?;
                break;
            }
        }
        Ok(())
    }

    /// Nearest Data node bound to `form` or one of its container ancestors,
    /// else `fallback`.
    pub(crate) fn find_data_scope(&self, form: Option<NodeId>, fallback: Option<NodeId>) -> Option<NodeId> {
        let mut current = form;
        while let Some(node) = current {
            if !self.tree.is_container(node) {
                break;
            }
            if let Some(data) = self.bindings.binding(node) {
                return Some(data);
            }
            current = self.tree.parent(node);
        }
        fallback
    }

    /// Bind `form` to `data` and transfer the value in the given direction.
    pub(crate) fn create_data_binding(&mut self, form: NodeId, data: NodeId, data_to_form: bool) -> Result<()> {
        self.bindings.bind(form, data);
        let element = self.tree.element(form);
        if !matches!(element, Element::Field | Element::ExclGroup) {
            return Ok(());
        }
        if data_to_form {
            self.transfer_data_to_form(form, data)
        } else {
            self.transfer_form_to_data(form, data)
        }
    }

    fn transfer_data_to_form(&mut self, form: NodeId, data: NodeId) -> Result<()> {
        let value = node_value(&self.tree, data).unwrap_or_default();
        if self.tree.element(form) == Element::ExclGroup {
            return self.select_exclusive_member(form, &value);
        }
        let content = if is_multi_select_list(&self.tree, form) {
            Element::ExData
        } else {
            Element::Text
        };
        self.set_field_value(form, &value, content)
    }

    fn transfer_form_to_data(&mut self, form: NodeId, data: NodeId) -> Result<()> {
        if self.tree.element(form) == Element::ExclGroup {
            let checked = self.tree.children_by_class(form, Element::Field).find_map(|field| {
                let value = node_value(&self.tree, field)?;
                (!value.is_empty() && self.item_text(field, 0).as_deref() == Some(value.as_str()))
                    .then_some(value)
            });
            if let Some(value) = checked {
                self.tree.set_attribute(data, "value", value.clone());
                self.tree.set_attribute(form, "value", value);
            }
            return Ok(());
        }

        let value = node_value(&self.tree, form).unwrap_or_default();
        if is_multi_select_list(&self.tree, form) {
            if value.is_empty() {
                self.tree.set_attribute(data, "dataNode", "dataGroup");
            }
            for line in value.lines().filter(|l| !l.is_empty()) {
                let item = self.new_data_node(data, Element::DataValue, "value")?;
                self.tree.set_attribute(item, "value", line);
            }
        } else if !value.is_empty() {
            self.tree.set_attribute(data, "value", value);
        }
        Ok(())
    }

    fn item_text(&self, field: NodeId, index: usize) -> Option<String> {
        let items = self.tree.first_child_by_class(field, Element::Items)?;
        let item = *self.tree.children(items).get(index)?;
        self.tree.attribute(item, "value").map(str::to_string)
    }

    fn select_exclusive_member(&mut self, group: NodeId, value: &str) -> Result<()> {
        let members: Vec<NodeId> = self.tree.children_by_class(group, Element::Field).collect();
        for member in members {
            let on = self.item_text(member, 0);
            let state = if on.as_deref() == Some(value) {
                on.unwrap_or_default()
            } else {
                self.item_text(member, 1).unwrap_or_default()
            };
            self.set_field_value(member, &state, Element::Text)?;
        }
        self.tree.set_attribute(group, "value", value);
        Ok(())
    }

    /// Store `value` as the content of the `value` property of `form`.
    pub(crate) fn set_field_value(&mut self, form: NodeId, value: &str, content: Element) -> Result<()> {
        let value_node = self.ensure_value_placeholder(form)?;
        let content_node = match self.tree.first_child(value_node) {
            Some(existing) => existing,
            None => {
                let node = self.tree.create_node(Packet::Form, content)?;
                self.tree.append_child(value_node, node);
                node
            },
        };
        self.tree.set_attribute(content_node, "value", value);
        Ok(())
    }

    /// Make sure `form` carries a `value` property, so unbound fields still
    /// present a value node. Returns it.
    pub(crate) fn ensure_value_placeholder(&mut self, form: NodeId) -> Result<NodeId> {
        if let Some(value) = self.tree.first_child_by_class(form, Element::Value) {
            return Ok(value);
        }
        let value = self.tree.create_node(Packet::Form, Element::Value)?;
        self.tree.append_child(form, value);
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xfa::document::DATA_DESCRIPTION_NAME;

    fn doc_with_data() -> (XfaDocument, NodeId) {
        let mut doc = XfaDocument::new();
        let data = doc.ensure_data_root().unwrap();
        let record = doc.add_node(data, Packet::Datasets, Element::DataGroup, "order").unwrap();
        (doc, record)
    }

    fn template_field(doc: &mut XfaDocument, name: &str, mode: Option<&str>) -> NodeId {
        let root = doc.ensure_template_root().unwrap();
        let field = doc.add_node(root, Packet::Template, Element::Field, name).unwrap();
        if let Some(mode) = mode {
            let bind = doc.add_node(field, Packet::Template, Element::Bind, "").unwrap();
            doc.tree_mut().set_attribute(bind, "match", mode);
        }
        field
    }

    #[test]
    fn test_bind_mode_defaults_to_once() {
        let mut doc = XfaDocument::new();
        let field = template_field(&mut doc, "a", None);
        assert_eq!(bind_mode(doc.tree(), field), BindMode::Once);
        let field = template_field(&mut doc, "b", Some("global"));
        assert_eq!(bind_mode(doc.tree(), field), BindMode::Global);
        assert_eq!(BindMode::from_attribute("bogus"), BindMode::Once);
    }

    #[test]
    fn test_once_climbs_scope_chain() {
        let (mut doc, record) = doc_with_data();
        let inner = doc.add_node(record, Packet::Datasets, Element::DataGroup, "inner").unwrap();
        let total = doc.add_node(record, Packet::Datasets, Element::DataValue, "total").unwrap();

        let hit = doc.find_once_data_node(name_hash("total"), inner, Element::DataValue);
        assert_eq!(hit, Some(total));
        assert_eq!(doc.find_once_data_node(name_hash("total"), inner, Element::DataGroup), None);
    }

    #[test]
    fn test_once_skips_bound_nodes() {
        let (mut doc, record) = doc_with_data();
        let first = doc.add_node(record, Packet::Datasets, Element::DataValue, "x").unwrap();
        let second = doc.add_node(record, Packet::Datasets, Element::DataValue, "x").unwrap();
        doc.bindings.bind(NodeId(900), first);
        assert_eq!(doc.find_once_data_node(name_hash("x"), record, Element::DataValue), Some(second));
    }

    #[test]
    fn test_global_registers_first_hit() {
        let (mut doc, record) = doc_with_data();
        let deep = doc.add_node(record, Packet::Datasets, Element::DataGroup, "deep").unwrap();
        let shared = doc.add_node(deep, Packet::Datasets, Element::DataValue, "shared").unwrap();
        let other = doc.add_node(record, Packet::Datasets, Element::DataGroup, "other").unwrap();

        let hash = name_hash("shared");
        assert_eq!(doc.find_global_data_node(hash, other, Element::DataValue).unwrap(), Some(shared));
        assert_eq!(doc.registry().lookup(hash), Some(shared));
        doc.bindings.bind(NodeId(900), shared);
        // Registry hits ignore bindings.
        assert_eq!(doc.find_global_data_node(hash, record, Element::DataValue).unwrap(), Some(shared));
    }

    #[test]
    fn test_find_match_creates_once_node() {
        let (mut doc, record) = doc_with_data();
        let field = template_field(&mut doc, "email", None);
        assert_eq!(doc.find_match(field, record, false).unwrap(), None);

        let created = doc.find_match(field, record, true).unwrap().unwrap();
        assert_eq!(doc.tree().parent(created), Some(record));
        assert_eq!(doc.tree().element(created), Element::DataValue);
        assert_eq!(doc.find_match(field, record, false).unwrap(), Some(created));
    }

    #[test]
    fn test_find_match_none_mode() {
        let (mut doc, record) = doc_with_data();
        let field = template_field(&mut doc, "label", Some("none"));
        assert_eq!(doc.find_match(field, record, true).unwrap(), None);
    }

    #[test]
    fn test_data_description_limits_creation() {
        let (mut doc, record) = doc_with_data();
        let datasets = doc.datasets_root().unwrap();
        let dd = doc
            .add_node(datasets, Packet::Datasets, Element::DataGroup, DATA_DESCRIPTION_NAME)
            .unwrap();
        let dd_order = doc.add_node(dd, Packet::Datasets, Element::DataGroup, "order").unwrap();
        doc.add_node(dd_order, Packet::Datasets, Element::DataValue, "known").unwrap();
        doc.bindings.set_data_description(record, dd_order);

        assert!(doc.maybe_create_data_node(record, Element::DataValue, "known").unwrap().is_some());
        assert!(doc.maybe_create_data_node(record, Element::DataValue, "unknown").unwrap().is_none());
        assert!(doc.maybe_create_data_node(record, Element::DataGroup, "known").unwrap().is_none());
    }

    #[test]
    fn test_data_to_form_value_transfer() {
        let (mut doc, record) = doc_with_data();
        let data = doc.add_node(record, Packet::Datasets, Element::DataValue, "name").unwrap();
        doc.tree_mut().set_attribute(data, "value", "Ada");
        let form_root = doc.ensure_form_root().unwrap();
        let field = doc.add_node(form_root, Packet::Form, Element::Field, "name").unwrap();

        doc.create_data_binding(field, data, true).unwrap();
        assert_eq!(doc.value(field).as_deref(), Some("Ada"));
        assert_eq!(doc.items(data), &[field]);
    }

    #[test]
    fn test_form_to_data_multi_select() {
        let (mut doc, record) = doc_with_data();
        let data = doc.add_node(record, Packet::Datasets, Element::DataGroup, "colors").unwrap();
        let form_root = doc.ensure_form_root().unwrap();
        let field = doc.add_node(form_root, Packet::Form, Element::Field, "colors").unwrap();
        let ui = doc.add_node(field, Packet::Form, Element::Ui, "").unwrap();
        let list = doc.add_node(ui, Packet::Form, Element::ChoiceList, "").unwrap();
        doc.tree_mut().set_attribute(list, "open", "multiSelect");
        doc.set_field_value(field, "red\nblue", Element::ExData).unwrap();

        doc.create_data_binding(field, data, false).unwrap();
        assert_eq!(doc.tree().children(data).len(), 2);
        assert_eq!(doc.value(data).as_deref(), Some("red\nblue"));
    }
}
