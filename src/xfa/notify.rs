//! Observer hooks for Form tree changes.
//!
//! The layout engine and scripting layer live outside this crate; they learn
//! about instance changes through [`FormNotify`].

use super::node::NodeId;
use std::sync::{Arc, Mutex};

/// Receives Form tree change notifications. Every method defaults to a no-op.
pub trait FormNotify {
    /// The Form tree changed in a way that needs a new layout.
    fn on_layout_invalidated(&mut self) {}

    /// A new instance finished merging and binding.
    fn on_node_ready(&mut self, _node: NodeId) {}

    /// An existing instance now sits at a different index of its run.
    fn on_instance_index_changed(&mut self, _instance: NodeId, _index: usize) {}

    /// `child` was detached from `parent`.
    fn on_child_removed(&mut self, _parent: NodeId, _child: NodeId) {}
}

/// Ignores every notification.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotify;

impl FormNotify for NoopNotify {}

/// A recorded notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormEvent {
    /// See [`FormNotify::on_layout_invalidated`]
    LayoutInvalidated,
    /// See [`FormNotify::on_node_ready`]
    NodeReady(NodeId),
    /// See [`FormNotify::on_instance_index_changed`]
    InstanceIndexChanged(NodeId, usize),
    /// See [`FormNotify::on_child_removed`]
    ChildRemoved(NodeId, NodeId),
}

/// Records notifications into a shared log.
///
/// Clones share the same log, so a clone can be handed to the document while
/// the caller keeps another to inspect events.
#[derive(Debug, Default, Clone)]
pub struct RecordingNotify {
    events: Arc<Mutex<Vec<FormEvent>>>,
}

impl RecordingNotify {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the events recorded so far.
    pub fn events(&self) -> Vec<FormEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Drain the recorded events.
    pub fn take(&self) -> Vec<FormEvent> {
        self.events.lock().map(|mut e| std::mem::take(&mut *e)).unwrap_or_default()
    }

    fn push(&self, event: FormEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

impl FormNotify for RecordingNotify {
    fn on_layout_invalidated(&mut self) {
        self.push(FormEvent::LayoutInvalidated);
    }

    fn on_node_ready(&mut self, node: NodeId) {
        self.push(FormEvent::NodeReady(node));
    }

    fn on_instance_index_changed(&mut self, instance: NodeId, index: usize) {
        self.push(FormEvent::InstanceIndexChanged(instance, index));
    }

    fn on_child_removed(&mut self, parent: NodeId, child: NodeId) {
        self.push(FormEvent::ChildRemoved(parent, child));
    }
}
