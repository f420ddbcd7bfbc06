//! Cross-tree relation tables.
//!
//! A Form node binds to at most one Data node; a Data node keeps the ordered
//! list of Form nodes bound to it (its item list), since one Data node can back
//! several repeated Form instances. Both directions are updated together so the
//! tables never disagree.

use super::node::NodeId;
use std::collections::HashMap;

/// Form↔Data bindings, Form→Template origins and Data→description links.
#[derive(Debug, Clone, Default)]
pub struct BindingTable {
    form_to_data: HashMap<NodeId, NodeId>,
    data_items: HashMap<NodeId, Vec<NodeId>>,
    template_of: HashMap<NodeId, NodeId>,
    description_of: HashMap<NodeId, NodeId>,
}

impl BindingTable {
    /// Create empty tables.
    pub fn new() -> Self {
        Self::default()
    }

    /// Data node bound to `form`.
    pub fn binding(&self, form: NodeId) -> Option<NodeId> {
        self.form_to_data.get(&form).copied()
    }

    /// Whether `form` has a binding.
    pub fn is_bound(&self, form: NodeId) -> bool {
        self.form_to_data.contains_key(&form)
    }

    /// Bind `form` to `data`, releasing any previous binding of `form`.
    pub fn bind(&mut self, form: NodeId, data: NodeId) {
        if self.binding(form) == Some(data) {
            return;
        }
        self.unbind(form);
        self.form_to_data.insert(form, data);
        self.data_items.entry(data).or_default().push(form);
    }

    /// Clear the binding of `form`. Returns the Data node it was bound to.
    pub fn unbind(&mut self, form: NodeId) -> Option<NodeId> {
        let data = self.form_to_data.remove(&form)?;
        self.remove_item(data, form);
        Some(data)
    }

    /// Form nodes bound to `data`, in binding order.
    pub fn items(&self, data: NodeId) -> &[NodeId] {
        self.data_items.get(&data).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Whether any Form node is bound to `data`.
    pub fn has_items(&self, data: NodeId) -> bool {
        !self.items(data).is_empty()
    }

    /// Drop `form` from the item list of `data`. Returns the remaining item count.
    pub fn remove_item(&mut self, data: NodeId, form: NodeId) -> usize {
        let Some(items) = self.data_items.get_mut(&data) else {
            return 0;
        };
        items.retain(|&f| f != form);
        let remaining = items.len();
        if remaining == 0 {
            self.data_items.remove(&data);
        }
        if self.form_to_data.get(&form) == Some(&data) {
            self.form_to_data.remove(&form);
        }
        remaining
    }

    /// Template node `form` was cloned from.
    pub fn template(&self, form: NodeId) -> Option<NodeId> {
        self.template_of.get(&form).copied()
    }

    /// Record the Template origin of `form`.
    pub fn set_template(&mut self, form: NodeId, template: NodeId) {
        self.template_of.insert(form, template);
    }

    /// Data-description node describing `data`.
    pub fn data_description(&self, data: NodeId) -> Option<NodeId> {
        self.description_of.get(&data).copied()
    }

    /// Link `data` to its data-description node.
    pub fn set_data_description(&mut self, data: NodeId, description: NodeId) {
        self.description_of.insert(data, description);
    }

    /// Drop every Form→Data binding and item list.
    pub fn clear_bindings(&mut self) {
        self.form_to_data.clear();
        self.data_items.clear();
    }

    /// Number of bound Form nodes.
    pub fn bound_count(&self) -> usize {
        self.form_to_data.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_updates_both_directions() {
        let mut table = BindingTable::new();
        let (f1, f2, d) = (NodeId(1), NodeId(2), NodeId(10));
        table.bind(f1, d);
        table.bind(f2, d);

        assert_eq!(table.binding(f1), Some(d));
        assert_eq!(table.items(d), &[f1, f2]);

        assert_eq!(table.unbind(f1), Some(d));
        assert_eq!(table.items(d), &[f2]);
        assert!(!table.is_bound(f1));
    }

    #[test]
    fn test_rebind_releases_previous_data() {
        let mut table = BindingTable::new();
        let (f, d1, d2) = (NodeId(1), NodeId(10), NodeId(11));
        table.bind(f, d1);
        table.bind(f, d2);
        assert!(!table.has_items(d1));
        assert_eq!(table.items(d2), &[f]);
    }

    #[test]
    fn test_remove_item_reports_remaining() {
        let mut table = BindingTable::new();
        let (f1, f2, d) = (NodeId(1), NodeId(2), NodeId(10));
        table.bind(f1, d);
        table.bind(f2, d);
        assert_eq!(table.remove_item(d, f1), 1);
        assert_eq!(table.remove_item(d, f2), 0);
        assert_eq!(table.binding(f2), None);
        assert_eq!(table.bound_count(), 0);
    }
}
