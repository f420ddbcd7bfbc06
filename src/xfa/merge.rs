//! Merge engine.
//!
//! Walks a Template subtree together with a Data scope and produces the bound
//! Form subtree. Repeating containers expand per their occurrence bounds and,
//! for subform sets, per their relation (`ordered`, `choice`, `unordered`).
//!
//! When a Form tree already exists, every node in it is flagged
//! [`NodeFlags::UNUSED`] first and the merge reuses matching unused nodes
//! instead of allocating new ones; whatever is still unused afterwards is
//! swept away.

use super::binding::{BindMode, MatchOutcome};
use super::document::XfaDocument;
use super::node::{name_hash, Element, NodeFlags, NodeId, Packet};
use super::occur::{read_occur_node, Occurrence};
use super::rebind::RebindOrigin;
use super::tree::{ContainerCursor, NodeTree};
use crate::config::RemergeFailurePolicy;
use crate::error::{Error, Result};
use std::collections::VecDeque;

/// How the containers of a subform set are instantiated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Relation {
    /// Every child container, in template order
    #[default]
    Ordered,
    /// Only the first child container that matches data
    Choice,
    /// Data-matched children in data order, then the rest in template order
    Unordered,
}

impl Relation {
    /// Parse a `relation` attribute value.
    pub fn from_attribute(value: &str) -> Self {
        match value {
            "choice" => Self::Choice,
            "unordered" => Self::Unordered,
            _ => Self::Ordered,
        }
    }
}

/// A template child paired with the Data node it matched.
#[derive(Debug, Clone, Copy)]
struct RecurseRecord {
    template: NodeId,
    data: NodeId,
}

/// Reorder `records` by the position of their Data nodes under `scope`.
///
/// In choice mode only the first record in data order survives. Records whose
/// Data node is not a child of `scope` keep their relative order at the end.
fn sort_records(tree: &NodeTree, records: &mut Vec<RecurseRecord>, scope: NodeId, choice: bool) {
    let mut sorted = Vec::new();
    for &child in tree.children(scope) {
        if let Some(pos) = records.iter().position(|r| r.data == child) {
            sorted.push(records.remove(pos));
            if choice {
                break;
            }
        }
    }
    if sorted.is_empty() {
        return;
    }
    if !choice {
        sorted.append(records);
    }
    *records = sorted;
}

/// Whether a non-container template child is cloned into Form instances.
fn needs_generate_form(tree: &NodeTree, child: NodeId, use_instance_manager: bool) -> bool {
    let element = tree.element(child);
    if element == Element::Variables {
        return true;
    }
    if element.is_container() {
        return false;
    }
    !(element == Element::Proto || (use_instance_manager && element == Element::Occur))
}

impl XfaDocument {
    /// Copy `template` into the Form tree under `form_parent`.
    ///
    /// `scope` is the Data node matched against; `one_instance` produces a
    /// single instance without an instance manager; `do_bind` controls
    /// whether Data nodes are matched at all. Returns the first Form instance
    /// produced, `None` when the template yields nothing (for example an
    /// occurrence `max` of 0).
    ///
    /// With `do_bind` and a `scope`, every container produced that found no
    /// Data match is bound to Data created under `scope`, or given an empty
    /// value when creation is not possible.
    pub fn copy_container(
        &mut self,
        template: NodeId,
        form_parent: NodeId,
        scope: Option<NodeId>,
        one_instance: bool,
        do_bind: bool,
    ) -> Result<Option<NodeId>> {
        self.tree.node(template)?;
        self.tree.node(form_parent)?;
        let before: Vec<NodeId> = self.tree.children(form_parent).to_vec();
        let first = self.copy_container_at(template, form_parent, scope, one_instance, do_bind, true, 0)?;
        if let (true, Some(scope)) = (do_bind, scope) {
            let added: Vec<NodeId> = self
                .tree
                .children(form_parent)
                .iter()
                .copied()
                .filter(|&child| self.tree.is_container(child) && !before.contains(&child))
                .collect();
            for node in added {
                self.rebind_in_scope(node, scope, RebindOrigin::Merge)?;
            }
        }
        Ok(first)
    }

    #[allow(clippy::too_many_arguments)]
    pub(crate) fn copy_container_at(
        &mut self,
        template: NodeId,
        form_parent: NodeId,
        scope: Option<NodeId>,
        one_instance: bool,
        data_merge: bool,
        up_level: bool,
        depth: u32,
    ) -> Result<Option<NodeId>> {
        self.check_depth(depth)?;
        match self.tree.element(template) {
            Element::Subform | Element::SubformSet | Element::Area | Element::PageArea => {
                self.copy_subform_set(template, form_parent, scope, one_instance, data_merge, depth)
            },
            Element::ExclGroup | Element::Field | Element::Draw | Element::ContentArea => self
                .copy_field(template, form_parent, scope, data_merge, up_level, depth)
                .map(Some),
            Element::PageSet => self.copy_page_set(template, form_parent, scope, depth).map(Some),
            _ => Ok(None),
        }
    }

    /// Copy the children of `template` into the Form instance `instance`:
    /// properties are cloned, containers merged against `scope`.
    #[allow(clippy::too_many_arguments)]
    fn copy_instance_children(
        &mut self,
        template: NodeId,
        instance: NodeId,
        scope: Option<NodeId>,
        use_instance_manager: bool,
        data_merge: bool,
        up_level: bool,
        first_container_only: bool,
        depth: u32,
    ) -> Result<()> {
        let mut copied_container = false;
        for child in self.tree.children(template).to_vec() {
            if needs_generate_form(&self.tree, child, use_instance_manager) {
                self.clone_or_merge_container(instance, child, true, None)?;
            } else if self.tree.is_container(child) {
                if copied_container && first_container_only {
                    continue;
                }
                self.copy_container_at(child, instance, scope, false, data_merge, up_level, depth + 1)?;
                copied_container = true;
            }
        }
        Ok(())
    }

    fn copy_subform_set(
        &mut self,
        template: NodeId,
        form_parent: NodeId,
        scope: Option<NodeId>,
        mut one_instance: bool,
        data_merge: bool,
        depth: u32,
    ) -> Result<Option<NodeId>> {
        let element = self.tree.element(template);
        let use_im = self.tree.element(form_parent) != Element::Area;
        let mut instance_manager = None;
        let mut occur = None;
        let mut existing: VecDeque<NodeId> = VecDeque::new();
        let mut use_pool = false;

        if !one_instance && element.is_subform_like() {
            if use_im {
                instance_manager =
                    Some(self.clone_or_merge_instance_manager(form_parent, template, &mut existing)?);
            }
            if let Some(template_occur) = self.tree.first_child_by_class(template, Element::Occur) {
                occur = Some(match instance_manager {
                    Some(im) => self.clone_or_merge_container(im, template_occur, false, None)?,
                    None => template_occur,
                });
            } else if let Some(im) = instance_manager {
                occur = self.tree.first_child_by_class(im, Element::Occur);
                if let Some(node) = occur {
                    self.tree.clear_flag(node, NodeFlags::UNUSED);
                }
            }
            if let Some(im) = instance_manager {
                self.tree.set_flag(im, NodeFlags::INITIALIZED);
                use_pool = true;
                if self.tree.element(form_parent) == Element::PageArea {
                    one_instance = true;
                    use_pool = !existing.is_empty();
                } else if self.tree.name_hash(template) == 0 && existing.is_empty() {
                    use_pool = false;
                }
            }
        }

        let bounds = match occur {
            Some(node) if !one_instance => read_occur_node(&self.tree, node),
            _ => Occurrence::SINGLE,
        };
        let relation = if element == Element::SubformSet {
            self.tree
                .attribute(template, "relation")
                .map(Relation::from_attribute)
                .unwrap_or_default()
        } else {
            Relation::Ordered
        };

        let mut first_instance = None;
        let mut repeat = 0usize;
        let mut parent_mode = BindMode::None;

        if data_merge {
            let mut cursor = ContainerCursor::new(template);
            let mut accessed = false;
            if matches!(element, Element::SubformSet | Element::Area) {
                cursor.move_to_next(&self.tree);
            } else if let Some(scope) = scope {
                let mut produced: Vec<(NodeId, NodeId)> = Vec::new();
                while bounds.allows_more(repeat) {
                    let found = self.find_matching_data_node(
                        template,
                        scope,
                        &mut cursor,
                        false,
                        true,
                        &mut accessed,
                    )?;
                    let Some(MatchOutcome { data, mode, .. }) = found else {
                        break;
                    };
                    if cursor.current() != Some(template) {
                        break;
                    }
                    parent_mode = mode;
                    let pool = use_pool.then_some(&mut existing);
                    let instance = self.clone_or_merge_container(form_parent, template, false, pool)?;
                    first_instance.get_or_insert(instance);
                    self.create_data_binding(instance, data, true)?;
                    produced.push((instance, data));
                    repeat += 1;
                }
                for (instance, data) in produced {
                    self.copy_instance_children(
                        template,
                        instance,
                        Some(data),
                        use_im,
                        true,
                        false,
                        false,
                        depth,
                    )?;
                }
            }

            if let Some(scope) = scope {
                while bounds.allows_more(repeat) {
                    let found = self.find_matching_data_node(
                        template,
                        scope,
                        &mut cursor,
                        false,
                        true,
                        &mut accessed,
                    )?;
                    let Some(matched) = found else {
                        break;
                    };
                    if matched.mode == BindMode::DataRef && parent_mode == BindMode::DataRef {
                        break;
                    }

                    let pool = use_pool.then_some(&mut existing);
                    let instance = self.clone_or_merge_container(form_parent, template, false, pool)?;
                    first_instance.get_or_insert(instance);
                    match relation {
                        Relation::Choice | Relation::Unordered => {
                            self.copy_related_children(template, instance, scope, relation, use_im, &mut accessed, depth)?;
                        },
                        Relation::Ordered => {
                            self.copy_instance_children(
                                template,
                                instance,
                                Some(scope),
                                use_im,
                                true,
                                true,
                                false,
                                depth,
                            )?;
                        },
                    }
                    repeat += 1;
                    if !self.bindings.has_items(matched.data) {
                        log::debug!(
                            "Data node {} matched under template {} was not consumed, stopping expansion",
                            matched.data,
                            template
                        );
                        break;
                    }
                }
            }

            if repeat == 0 && !accessed {
                let mut limit = bounds.max_count();
                if instance_manager.is_some() && self.tree.name_hash(template) == 0 {
                    let available = existing.len();
                    limit = Some(if available < bounds.min { bounds.initial } else { available });
                }
                while limit.map_or(true, |limit| repeat < limit) {
                    if instance_manager.is_some() {
                        if use_pool && existing.is_empty() {
                            if self.tree.name_hash(template) != 0 {
                                break;
                            }
                            use_pool = false;
                        } else if !use_pool && limit.is_none() {
                            break;
                        }
                    } else if self
                        .find_form_dom_instance(element, self.tree.name_hash(template), form_parent)
                        .is_none()
                    {
                        break;
                    }
                    let pool = use_pool.then_some(&mut existing);
                    let instance = self.clone_or_merge_container(form_parent, template, false, pool)?;
                    first_instance.get_or_insert(instance);
                    self.copy_instance_children(template, instance, scope, use_im, true, true, false, depth)?;
                    repeat += 1;
                }
            }
        }

        let minimal = if repeat == 0 { bounds.initial } else { bounds.min };
        while repeat < minimal {
            let pool = use_pool.then_some(&mut existing);
            let instance = self.clone_or_merge_container(form_parent, template, false, pool)?;
            first_instance.get_or_insert(instance);
            self.copy_instance_children(
                template,
                instance,
                scope,
                use_im,
                data_merge,
                true,
                relation == Relation::Choice,
                depth,
            )?;
            repeat += 1;
        }

        // Former instances no data row claimed.
        for node in existing.drain(..) {
            for gone in self.tree.descendants(node) {
                self.bindings.unbind(gone);
            }
            log::trace!("Dropping unclaimed instance {} of template {}", node, template);
            self.notify.on_child_removed(form_parent, node);
            self.disposed.push(node);
        }

        log::trace!(
            "Merged template {} {:?}: {} instance(s)",
            template,
            self.tree.name(template),
            repeat
        );
        Ok(first_instance)
    }

    /// Choice and unordered children of one subform-set instance.
    #[allow(clippy::too_many_arguments)]
    fn copy_related_children(
        &mut self,
        template: NodeId,
        instance: NodeId,
        scope: NodeId,
        relation: Relation,
        use_im: bool,
        accessed: &mut bool,
        depth: u32,
    ) -> Result<()> {
        let mut matched: Vec<RecurseRecord> = Vec::new();
        let mut unmatched: Vec<NodeId> = Vec::new();
        for child in self.tree.children(template).to_vec() {
            if needs_generate_form(&self.tree, child, use_im) {
                self.clone_or_merge_container(instance, child, true, None)?;
            } else if self.tree.is_container(child) {
                let mut cursor = ContainerCursor::new(child);
                let found =
                    self.find_matching_data_node(child, scope, &mut cursor, false, true, accessed)?;
                match found {
                    Some(m) if m.self_match => matched.insert(
                        0,
                        RecurseRecord {
                            template: child,
                            data: m.data,
                        },
                    ),
                    Some(m) => matched.push(RecurseRecord {
                        template: child,
                        data: m.data,
                    }),
                    None => unmatched.push(child),
                }
            }
        }

        match relation {
            Relation::Choice => {
                sort_records(&self.tree, &mut matched, scope, true);
                if let Some(first) = matched.first() {
                    self.copy_container_at(first.template, instance, Some(scope), false, true, true, depth + 1)?;
                }
            },
            Relation::Unordered => {
                sort_records(&self.tree, &mut matched, scope, false);
                for record in matched {
                    self.copy_container_at(record.template, instance, Some(scope), false, true, true, depth + 1)?;
                }
                for child in unmatched {
                    self.copy_container_at(child, instance, Some(scope), false, true, true, depth + 1)?;
                }
            },
            Relation::Ordered => {},
        }
        Ok(())
    }

    fn copy_field(
        &mut self,
        template: NodeId,
        form_parent: NodeId,
        scope: Option<NodeId>,
        data_merge: bool,
        up_level: bool,
        depth: u32,
    ) -> Result<NodeId> {
        let field = self.clone_or_merge_container(form_parent, template, false, None)?;
        let is_group = self.tree.element(template) == Element::ExclGroup;
        for child in self.tree.children(template).to_vec() {
            if needs_generate_form(&self.tree, child, true) {
                self.clone_or_merge_container(field, child, true, None)?;
            } else if is_group && self.tree.element(child) == Element::Field {
                self.check_depth(depth + 1)?;
                self.copy_field(child, field, None, false, true, depth + 1)?;
            }
        }

        match scope {
            Some(scope) if data_merge => {
                let mut cursor = ContainerCursor::new(template);
                let mut accessed = false;
                let found =
                    self.find_matching_data_node(template, scope, &mut cursor, true, up_level, &mut accessed)?;
                if let Some(matched) = found.filter(|m| m.self_match) {
                    self.create_data_binding(field, matched.data, true)?;
                }
            },
            _ => {
                self.ensure_unbound_placeholder(field)?;
            },
        }
        Ok(field)
    }

    pub(crate) fn ensure_unbound_placeholder(&mut self, form: NodeId) -> Result<()> {
        if matches!(self.tree.element(form), Element::Field | Element::ExclGroup) {
            self.ensure_value_placeholder(form)?;
        }
        Ok(())
    }

    /// Page sets and their page areas are copied without data; page areas
    /// never repeat inside a page set.
    fn copy_page_set(
        &mut self,
        template: NodeId,
        form_parent: NodeId,
        scope: Option<NodeId>,
        depth: u32,
    ) -> Result<NodeId> {
        let page_set = self.clone_or_merge_container(form_parent, template, false, None)?;
        for child in self.tree.children(template).to_vec() {
            if needs_generate_form(&self.tree, child, true) {
                self.clone_or_merge_container(page_set, child, true, None)?;
            } else if self.tree.is_container(child) {
                self.copy_container_at(child, page_set, scope, true, false, true, depth + 1)?;
            }
        }
        Ok(page_set)
    }

    /// First unused Form child of `form_parent` of kind `element` named `hash`.
    pub(crate) fn find_form_dom_instance(
        &self,
        element: Element,
        hash: u32,
        form_parent: NodeId,
    ) -> Option<NodeId> {
        self.tree.children(form_parent).iter().copied().find(|&child| {
            self.tree.element(child) == element
                && self.tree.name_hash(child) == hash
                && self.tree.is_unused(child)
        })
    }

    /// Produce the Form counterpart of `template` under `form_parent`.
    ///
    /// Reuses a node from `pool` when one is given, else an unused same-kind
    /// same-name child of `form_parent`, else clones `template`. With
    /// `recursive`, generated property children are produced the same way.
    pub(crate) fn clone_or_merge_container(
        &mut self,
        form_parent: NodeId,
        template: NodeId,
        recursive: bool,
        pool: Option<&mut VecDeque<NodeId>>,
    ) -> Result<NodeId> {
        let from_pool = pool.is_some();
        let existing = match pool {
            Some(pool) => pool.pop_front(),
            None => self.find_form_dom_instance(
                self.tree.element(template),
                self.tree.name_hash(template),
                form_parent,
            ),
        };

        if let Some(node) = existing {
            if from_pool || self.tree.is_container(node) {
                self.tree.append_child(form_parent, node);
            }
            self.tree.clear_flag(node, NodeFlags::UNUSED);
            self.bindings.set_template(node, template);
            if recursive && self.tree.element(node) != Element::Items {
                for child in self.tree.children(template).to_vec() {
                    if needs_generate_form(&self.tree, child, true) {
                        self.clone_or_merge_container(node, child, true, None)?;
                    }
                }
            }
            self.tree.set_flag(node, NodeFlags::INITIALIZED);
            return Ok(node);
        }

        let node = self.clone_template_to_form(template, false)?;
        self.tree.append_child(form_parent, node);
        if recursive {
            for child in self.tree.children(template).to_vec() {
                if needs_generate_form(&self.tree, child, true) {
                    let clone = self.clone_template_to_form(child, true)?;
                    self.tree.append_child(node, clone);
                }
            }
        }
        Ok(node)
    }

    /// Clone `template` into a detached Form node, with all descendants when `recursive`.
    fn clone_template_to_form(&mut self, template: NodeId, recursive: bool) -> Result<NodeId> {
        let root = self.clone_single(template)?;
        if !recursive {
            return Ok(root);
        }
        let mut stack = vec![(template, root)];
        while let Some((source, target)) = stack.pop() {
            for child in self.tree.children(source).to_vec() {
                let clone = self.clone_single(child)?;
                self.tree.append_child(target, clone);
                stack.push((child, clone));
            }
        }
        Ok(root)
    }

    fn clone_single(&mut self, template: NodeId) -> Result<NodeId> {
        let node = self.tree.create_node(Packet::Form, self.tree.element(template))?;
        let name = self.tree.name(template).to_string();
        self.tree.set_name(node, &name);
        self.tree.copy_attributes(template, node);
        self.bindings.set_template(node, template);
        Ok(node)
    }

    /// Get or create the instance manager `_<name>` of `template` under
    /// `form_parent`. A reused manager moves to the end of `form_parent` and
    /// its former instances are detached into `existing`.
    fn clone_or_merge_instance_manager(
        &mut self,
        form_parent: NodeId,
        template: NodeId,
        existing: &mut VecDeque<NodeId>,
    ) -> Result<NodeId> {
        let manager_name = format!("_{}", self.tree.name(template));
        let manager_hash = name_hash(&manager_name);
        if let Some(manager) =
            self.find_form_dom_instance(Element::InstanceManager, manager_hash, form_parent)
        {
            let hash = self.tree.name_hash(template);
            let mut next = self.tree.next_sibling(manager);
            while let Some(node) = next {
                let element = self.tree.element(node);
                if element == Element::InstanceManager {
                    break;
                }
                if !element.is_subform_like() {
                    next = self.tree.next_sibling(node);
                    continue;
                }
                if self.tree.name_hash(node) != hash {
                    break;
                }
                next = self.tree.next_sibling(node);
                self.tree.remove_child(form_parent, node);
                existing.push_back(node);
            }
            self.tree.append_child(form_parent, manager);
            self.tree.clear_flag(manager, NodeFlags::UNUSED);
            self.bindings.set_template(manager, template);
            return Ok(manager);
        }

        let manager = self.tree.create_node(Packet::Form, Element::InstanceManager)?;
        self.tree.set_name(manager, &manager_name);
        self.tree.append_child(form_parent, manager);
        self.bindings.set_template(manager, template);
        Ok(manager)
    }

    /// Merge the Template packet with the Data packet into the Form packet.
    ///
    /// Returns the top-level Form subform. Fails with
    /// [`Error::MissingTemplate`] when there is no template subform to merge.
    pub fn do_data_merge(&mut self) -> Result<NodeId> {
        let data_root = self.ensure_data_root()?;
        let description = self.data_description_root();
        let record = self.record();

        let template_root = self.template_root().ok_or(Error::MissingTemplate)?;
        let record_hash = record.map(|r| self.tree.name_hash(r)).unwrap_or(0);
        let by_record = (record_hash != 0)
            .then(|| self.tree.first_child_by_name(template_root, record_hash))
            .flatten()
            .filter(|&t| self.tree.element(t) == Element::Subform);
        let chosen = by_record
            .or_else(|| self.tree.first_child_by_class(template_root, Element::Subform))
            .ok_or(Error::MissingTemplate)?;

        log::debug!("Merging template subform {:?}", self.tree.name(chosen));

        let (form_root, empty_form) = match self.form_root() {
            Some(form) => {
                for node in self.tree.descendants(form).into_iter().skip(1) {
                    self.tree.set_flag(node, NodeFlags::UNUSED);
                }
                (form, false)
            },
            None => (self.ensure_form_root()?, true),
        };

        let top = self.clone_or_merge_container(form_root, chosen, false, None)?;
        let record = match record {
            Some(record) => record,
            None => {
                let name = match self.tree.name(top) {
                    "" => "form".to_string(),
                    name => name.to_string(),
                };
                let record = self.tree.create_node(Packet::Datasets, Element::DataGroup)?;
                self.tree.set_name(record, &name);
                self.tree.create_markup(record);
                let before = self.tree.first_child(data_root);
                self.tree.insert_child(data_root, record, before);
                record
            },
        };

        self.create_data_binding(top, record, true)?;
        for child in self.tree.children(chosen).to_vec() {
            if needs_generate_form(&self.tree, child, true) {
                self.clone_or_merge_container(top, child, true, None)?;
            } else if self.tree.is_container(child) {
                self.copy_container_at(child, top, Some(record), false, true, true, 1)?;
            }
        }

        if let Some(description) = description {
            self.update_data_relation(data_root, description, 0)?;
        }

        self.update_binding_relations(top)?;

        while let Some(page_set) = self.tree.first_child_by_class(top, Element::PageSet) {
            self.tree.remove_child(top, page_set);
            self.pending_page_sets.push(page_set);
        }

        if !empty_form {
            self.sweep_unused(form_root);
        }
        log::info!(
            "Data merge complete: {} bound form node(s)",
            self.bindings.bound_count()
        );
        Ok(top)
    }

    /// Drop still-unused containers and instance managers; keep unused properties.
    fn sweep_unused(&mut self, form_root: NodeId) {
        let mut stack: Vec<NodeId> = self.tree.children(form_root).iter().rev().copied().collect();
        while let Some(node) = stack.pop() {
            if self.tree.is_unused(node) {
                if self.tree.is_container(node) || self.tree.element(node) == Element::InstanceManager {
                    for gone in self.tree.descendants(node) {
                        self.bindings.unbind(gone);
                    }
                    self.dispose(node);
                    continue;
                }
                self.tree.clear_flag(node, NodeFlags::UNUSED);
            }
            self.tree.set_flag(node, NodeFlags::INITIALIZED);
            stack.extend(self.tree.children(node).iter().rev().copied());
        }
    }

    /// Rebuild the Form tree from the Template and Data trees.
    ///
    /// Clears every binding and the global registry, then merges again,
    /// reusing existing Form nodes where the template still produces them.
    /// On failure the document is restored or left without a Form tree,
    /// depending on [`MergeOptions::remerge_failure`](crate::config::MergeOptions::remerge_failure).
    pub fn re_merge(&mut self) -> Result<NodeId> {
        let snapshot = match self.options.remerge_failure {
            RemergeFailurePolicy::Restore => Some(self.snapshot()),
            RemergeFailurePolicy::Discard => None,
        };

        self.bindings.clear_bindings();
        self.registry.clear();
        self.pending_page_sets.clear();

        match self.do_data_merge() {
            Ok(top) => {
                self.notify.on_layout_invalidated();
                Ok(top)
            },
            Err(err) => {
                match snapshot {
                    Some(snapshot) => {
                        log::warn!("Re-merge failed, restoring previous form: {}", err);
                        self.restore(snapshot);
                    },
                    None => {
                        log::warn!("Re-merge failed, discarding form: {}", err);
                        self.bindings.clear_bindings();
                        if let Some(form) = self.form_root() {
                            self.dispose(form);
                        }
                    },
                }
                Err(err)
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn template_with_top(doc: &mut XfaDocument) -> NodeId {
        let root = doc.ensure_template_root().unwrap();
        doc.add_node(root, Packet::Template, Element::Subform, "form1").unwrap()
    }

    fn with_occur(doc: &mut XfaDocument, node: NodeId, min: &str, max: &str) {
        let occur = doc.add_node(node, Packet::Template, Element::Occur, "").unwrap();
        doc.tree_mut().set_attribute(occur, "min", min);
        doc.tree_mut().set_attribute(occur, "max", max);
    }

    fn form_children_named(doc: &XfaDocument, parent: NodeId, name: &str) -> Vec<NodeId> {
        let hash = name_hash(name);
        doc.tree().children_by_name(parent, hash).collect()
    }

    #[test]
    fn test_relation_from_attribute() {
        assert_eq!(Relation::from_attribute("choice"), Relation::Choice);
        assert_eq!(Relation::from_attribute("unordered"), Relation::Unordered);
        assert_eq!(Relation::from_attribute("ordered"), Relation::Ordered);
    }

    #[test]
    fn test_needs_generate_form() {
        let mut doc = XfaDocument::new();
        let top = template_with_top(&mut doc);
        let occur = doc.add_node(top, Packet::Template, Element::Occur, "").unwrap();
        let proto = doc.add_node(top, Packet::Template, Element::Proto, "").unwrap();
        let vars = doc.add_node(top, Packet::Template, Element::Variables, "").unwrap();
        let field = doc.add_node(top, Packet::Template, Element::Field, "f").unwrap();
        let tree = doc.tree();
        assert!(!needs_generate_form(tree, occur, true));
        assert!(needs_generate_form(tree, occur, false));
        assert!(!needs_generate_form(tree, proto, false));
        assert!(needs_generate_form(tree, vars, true));
        assert!(!needs_generate_form(tree, field, true));
    }

    #[test]
    fn test_merge_without_template_fails() {
        let mut doc = XfaDocument::new();
        assert!(matches!(doc.do_data_merge(), Err(Error::MissingTemplate)));
    }

    #[test]
    fn test_merge_creates_record() {
        let mut doc = XfaDocument::new();
        template_with_top(&mut doc);
        let top = doc.do_data_merge().unwrap();
        let record = doc.record().unwrap();
        assert_eq!(doc.tree().name(record), "form1");
        assert_eq!(doc.binding(top), Some(record));
    }

    #[test]
    fn test_max_zero_produces_nothing() {
        let mut doc = XfaDocument::new();
        let top = template_with_top(&mut doc);
        let hidden = doc.add_node(top, Packet::Template, Element::Subform, "hidden").unwrap();
        with_occur(&mut doc, hidden, "1", "0");

        let form_top = doc.do_data_merge().unwrap();
        assert!(form_children_named(&doc, form_top, "hidden").is_empty());
        // The instance manager still exists, with an empty run.
        let managers = doc.instance_managers();
        assert_eq!(managers.len(), 1);
        assert_eq!(managers[0].count(&doc), 0);
    }

    #[test]
    fn test_unbound_fields_get_value_placeholder() {
        let mut doc = XfaDocument::new();
        let top = template_with_top(&mut doc);
        let label = doc.add_node(top, Packet::Template, Element::Field, "label").unwrap();
        let bind = doc.add_node(label, Packet::Template, Element::Bind, "").unwrap();
        doc.tree_mut().set_attribute(bind, "match", "none");

        let form_top = doc.do_data_merge().unwrap();
        let field = form_children_named(&doc, form_top, "label")[0];
        assert_eq!(doc.binding(field), None);
        assert!(doc.tree().first_child_by_class(field, Element::Value).is_some());
    }

    #[test]
    fn test_copy_container_binds_field_on_miss() {
        let mut doc = XfaDocument::new();
        let data = doc.ensure_data_root().unwrap();
        let record = doc.add_node(data, Packet::Datasets, Element::DataGroup, "order").unwrap();
        let top = template_with_top(&mut doc);
        let email = doc.add_node(top, Packet::Template, Element::Field, "email").unwrap();
        let form_root = doc.ensure_form_root().unwrap();

        let field = doc
            .copy_container(email, form_root, Some(record), false, true)
            .unwrap()
            .unwrap();
        let bound = doc.binding(field).unwrap();
        assert_eq!(doc.tree().parent(bound), Some(record));
        assert_eq!(doc.tree().name(bound), "email");
        assert_eq!(doc.items(bound), &[field]);
    }

    #[test]
    fn test_copy_container_without_binding_gets_placeholder() {
        let mut doc = XfaDocument::new();
        let data = doc.ensure_data_root().unwrap();
        let record = doc.add_node(data, Packet::Datasets, Element::DataGroup, "order").unwrap();
        let top = template_with_top(&mut doc);
        let email = doc.add_node(top, Packet::Template, Element::Field, "email").unwrap();
        let form_root = doc.ensure_form_root().unwrap();

        let field = doc
            .copy_container(email, form_root, Some(record), false, false)
            .unwrap()
            .unwrap();
        assert_eq!(doc.binding(field), None);
        assert!(doc.tree().first_child_by_class(field, Element::Value).is_some());
        assert!(doc.tree().children(record).is_empty());
    }

    #[test]
    fn test_sort_records_by_data_order() {
        let mut doc = XfaDocument::new();
        let data = doc.ensure_data_root().unwrap();
        let a = doc.add_node(data, Packet::Datasets, Element::DataValue, "a").unwrap();
        let b = doc.add_node(data, Packet::Datasets, Element::DataValue, "b").unwrap();
        let mut records = vec![
            RecurseRecord {
                template: NodeId(100),
                data: b,
            },
            RecurseRecord {
                template: NodeId(101),
                data: a,
            },
        ];
        let mut choice = records.clone();
        sort_records(doc.tree(), &mut choice, data, true);
        assert_eq!(choice.len(), 1);
        assert_eq!(choice[0].data, a);

        sort_records(doc.tree(), &mut records, data, false);
        assert_eq!(records.iter().map(|r| r.data).collect::<Vec<_>>(), vec![a, b]);
    }

    #[test]
    fn test_re_merge_discard_policy_drops_form() {
        let mut doc = XfaDocument::with_options(
            crate::config::MergeOptions::new().with_remerge_failure(RemergeFailurePolicy::Discard),
        );
        template_with_top(&mut doc);
        doc.do_data_merge().unwrap();
        assert!(doc.form_root().is_some());

        let template_root = doc.template_root().unwrap();
        doc.tree_mut().detach(template_root);
        assert!(doc.re_merge().is_err());
        assert!(doc.form_root().is_none());
    }

    #[test]
    fn test_re_merge_restore_policy_keeps_form() {
        let mut doc = XfaDocument::new();
        template_with_top(&mut doc);
        let top = doc.do_data_merge().unwrap();
        let bound = doc.binding(top);

        let template_root = doc.template_root().unwrap();
        doc.tree_mut().detach(template_root);
        assert!(matches!(doc.re_merge(), Err(Error::MissingTemplate)));
        assert!(doc.form_root().is_some());
        assert_eq!(doc.binding(top), bound);
    }
}
