//! Rebind pass.
//!
//! After a merge, or after an instance manager adds instances, some Form
//! nodes may still lack a Data binding. The pass walks the subtree twice:
//! [`BindPass::Direct`] settles `none`, `once` and `global` nodes, then
//! [`BindPass::DataRef`] settles `dataRef` nodes. Below a `dataRef` node the
//! second pass handles every descendant, so nothing under a path binding is
//! resolved independently against the outer scope.

use super::binding::{bind_mode, BindMode};
use super::document::XfaDocument;
use super::node::{Element, NodeId};
use crate::error::Result;

/// Which bind modes a traversal settles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindPass {
    /// `none`, `once` and `global` nodes outside path-bound subtrees
    Direct,
    /// `dataRef` nodes and everything below them
    DataRef,
}

/// What triggered a rebind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RebindOrigin {
    /// A full merge or re-merge
    Merge,
    /// An instance manager mutation
    InstanceManager,
}

#[derive(Debug, Clone, Copy)]
struct Walk {
    pass: BindPass,
    origin: RebindOrigin,
    /// An ancestor is bound through a path expression.
    under_data_ref: bool,
}

impl XfaDocument {
    /// Create missing bindings for every container in the Form subtree `root`.
    ///
    /// Unbound nodes get Data nodes created on demand, subject to
    /// [`MergeOptions::create_data_nodes`](crate::config::MergeOptions::create_data_nodes).
    /// Subtrees still flagged unused by a merge in progress are skipped.
    pub fn update_binding_relations(&mut self, root: NodeId) -> Result<()> {
        self.update_binding_relations_from(root, RebindOrigin::Merge)
    }

    pub(crate) fn update_binding_relations_from(
        &mut self,
        root: NodeId,
        origin: RebindOrigin,
    ) -> Result<()> {
        self.tree.node(root)?;
        let fallback = self.data_root();
        let Some(scope) = self.find_data_scope(self.tree.parent(root), fallback) else {
            log::debug!("No data scope for {}, skipping rebind", root);
            return Ok(());
        };
        self.rebind_in_scope(root, scope, origin)
    }

    /// Both passes over `root`, resolving against `scope`.
    pub(crate) fn rebind_in_scope(&mut self, root: NodeId, scope: NodeId, origin: RebindOrigin) -> Result<()> {
        for pass in [BindPass::Direct, BindPass::DataRef] {
            let walk = Walk {
                pass,
                origin,
                under_data_ref: false,
            };
            self.rebind_node(root, scope, walk, 0)?;
        }
        Ok(())
    }

    fn rebind_node(&mut self, form: NodeId, scope: NodeId, mut walk: Walk, depth: u32) -> Result<()> {
        self.check_depth(depth)?;
        let element = self.tree.element(form);
        let mut data = self.bindings.binding(form);
        let mut descend = true;

        if matches!(element, Element::Subform | Element::ExclGroup | Element::Field) {
            let template = self.bindings.template(form);
            let mode = template
                .map(|t| bind_mode(&self.tree, t))
                .unwrap_or_default();
            let direct = walk.pass == BindPass::Direct || walk.under_data_ref;
            match mode {
                BindMode::None => {
                    if direct {
                        self.ensure_unbound_placeholder(form)?;
                    }
                },
                BindMode::Once => {
                    if direct {
                        data = self.rebind_once(form, data, scope, walk.origin)?;
                    }
                },
                BindMode::Global => {
                    if direct {
                        data = self.rebind_global(form, data, scope)?;
                    }
                },
                BindMode::DataRef => {
                    descend = walk.pass == BindPass::DataRef;
                    walk.under_data_ref = true;
                    if data.is_none() && walk.pass == BindPass::DataRef {
                        data = self.rebind_data_ref(form, template, scope)?;
                    }
                },
            }
        }

        let walks_children = matches!(
            element,
            Element::Subform | Element::SubformSet | Element::Area | Element::PageArea | Element::PageSet
        );
        if descend && walks_children {
            let child_scope = data.unwrap_or(scope);
            for child in self.tree.children(form).to_vec() {
                if !self.tree.is_container(child) || self.tree.is_unused(child) {
                    continue;
                }
                self.rebind_node(child, child_scope, walk, depth + 1)?;
            }
        }
        Ok(())
    }

    fn rebind_once(
        &mut self,
        form: NodeId,
        bound: Option<NodeId>,
        scope: NodeId,
        origin: RebindOrigin,
    ) -> Result<Option<NodeId>> {
        if let Some(data) = bound {
            // Instance operations pull the bound data under the scope of the
            // new instance; a plain merge leaves it where it was found.
            if origin == RebindOrigin::InstanceManager && self.tree.parent(data) != Some(scope) {
                log::trace!("Moving data node {} under scope {}", data, scope);
                self.tree.append_child(scope, data);
            }
            return Ok(Some(data));
        }
        let created = self.create_data_for(form, form, BindMode::Once, scope)?;
        match created {
            Some((data, _)) => {
                log::trace!("Rebind created data node {} for {}", data, form);
                self.create_data_binding(form, data, false)?;
                Ok(Some(data))
            },
            None => {
                self.ensure_unbound_placeholder(form)?;
                Ok(None)
            },
        }
    }

    fn rebind_global(&mut self, form: NodeId, bound: Option<NodeId>, scope: NodeId) -> Result<Option<NodeId>> {
        if bound.is_some() {
            return Ok(bound);
        }
        if self.tree.name_hash(form) == 0 {
            self.ensure_unbound_placeholder(form)?;
            return Ok(None);
        }
        match self.create_data_for(form, form, BindMode::Global, scope)? {
            Some((data, existed)) => {
                self.create_data_binding(form, data, existed)?;
                Ok(Some(data))
            },
            None => {
                self.ensure_unbound_placeholder(form)?;
                Ok(None)
            },
        }
    }

    fn rebind_data_ref(
        &mut self,
        form: NodeId,
        template: Option<NodeId>,
        scope: NodeId,
    ) -> Result<Option<NodeId>> {
        let Some(template) = template else {
            self.ensure_unbound_placeholder(form)?;
            return Ok(None);
        };
        match self.create_data_for(form, template, BindMode::DataRef, scope)? {
            Some((data, existed)) => {
                log::trace!("Rebind resolved path binding of {} to {}", form, data);
                self.create_data_binding(form, data, existed)?;
                Ok(Some(data))
            },
            None => {
                self.ensure_unbound_placeholder(form)?;
                Ok(None)
            },
        }
    }
}
