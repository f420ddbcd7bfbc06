//! Node value types shared by the Template, Data and Form trees.
//!
//! Every XFA node lives in one [`NodeTree`](super::tree::NodeTree) arena and is
//! addressed by a stable [`NodeId`]. A node knows its element kind, the packet it
//! belongs to, its attributes, its ordered children and its parent; cross-tree
//! relations (bindings, template origin) are kept outside the node in
//! [`BindingTable`](super::relations::BindingTable).

use bitflags::bitflags;
use indexmap::IndexMap;
use serde::Serialize;
use std::fmt;

/// Stable arena index of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[repr(transparent)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    /// Raw arena index.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The packet (role) a node belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Packet {
    /// The XDP root holding every packet
    Xdp,
    /// Declarative layout schema
    Template,
    /// Instantiated, bound tree
    Form,
    /// Live data document
    Datasets,
}

/// XFA element kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Element {
    /// XDP root
    Xfa,
    /// Template packet root
    Template,
    /// Form packet root
    Form,
    /// Datasets packet root
    DataModel,
    /// Data node with children
    DataGroup,
    /// Data node carrying a value
    DataValue,
    /// Repeatable container
    Subform,
    /// Group of subforms with a relation
    SubformSet,
    /// Positioned container that never gets instance managers
    Area,
    /// Master page
    PageArea,
    /// Set of master pages
    PageSet,
    /// Flowing region of a page area
    ContentArea,
    /// Interactive field
    Field,
    /// Static draw element
    Draw,
    /// Radio button group
    ExclGroup,
    /// Runtime handle of a repeating group
    InstanceManager,
    /// Occurrence bounds
    Occur,
    /// Binding rule
    Bind,
    /// User interface description
    Ui,
    /// Choice list widget
    ChoiceList,
    /// Value property
    Value,
    /// Text content
    Text,
    /// Rich or multi-valued content
    ExData,
    /// Choice items
    Items,
    /// Script variables
    Variables,
    /// Prototype definitions
    Proto,
    /// Caption property
    Caption,
    /// Any element the engine has no special handling for
    Unknown,
}

impl Element {
    /// Parse from an XFA element local name.
    pub fn from_xfa_name(name: &str) -> Self {
        match name {
            "xdp" | "xfa" => Self::Xfa,
            "template" => Self::Template,
            "form" => Self::Form,
            "datasets" => Self::DataModel,
            "subform" => Self::Subform,
            "subformSet" => Self::SubformSet,
            "area" => Self::Area,
            "pageArea" => Self::PageArea,
            "pageSet" => Self::PageSet,
            "contentArea" => Self::ContentArea,
            "field" => Self::Field,
            "draw" => Self::Draw,
            "exclGroup" => Self::ExclGroup,
            "instanceManager" => Self::InstanceManager,
            "occur" => Self::Occur,
            "bind" => Self::Bind,
            "ui" => Self::Ui,
            "choiceList" => Self::ChoiceList,
            "value" => Self::Value,
            "text" => Self::Text,
            "exData" => Self::ExData,
            "items" => Self::Items,
            "variables" => Self::Variables,
            "proto" => Self::Proto,
            "caption" => Self::Caption,
            _ => Self::Unknown,
        }
    }

    /// XFA element local name.
    pub fn xfa_name(self) -> &'static str {
        match self {
            Self::Xfa => "xfa",
            Self::Template => "template",
            Self::Form => "form",
            Self::DataModel => "datasets",
            Self::DataGroup => "dataGroup",
            Self::DataValue => "dataValue",
            Self::Subform => "subform",
            Self::SubformSet => "subformSet",
            Self::Area => "area",
            Self::PageArea => "pageArea",
            Self::PageSet => "pageSet",
            Self::ContentArea => "contentArea",
            Self::Field => "field",
            Self::Draw => "draw",
            Self::ExclGroup => "exclGroup",
            Self::InstanceManager => "instanceManager",
            Self::Occur => "occur",
            Self::Bind => "bind",
            Self::Ui => "ui",
            Self::ChoiceList => "choiceList",
            Self::Value => "value",
            Self::Text => "text",
            Self::ExData => "exData",
            Self::Items => "items",
            Self::Variables => "variables",
            Self::Proto => "proto",
            Self::Caption => "caption",
            Self::Unknown => "unknown",
        }
    }

    /// Container nodes take part in merging; everything else is a property.
    pub fn is_container(self) -> bool {
        matches!(
            self,
            Self::Subform
                | Self::SubformSet
                | Self::Area
                | Self::PageArea
                | Self::PageSet
                | Self::ContentArea
                | Self::Field
                | Self::Draw
                | Self::ExclGroup
        )
    }

    /// Subform-like containers that repeat and own an instance run.
    pub fn is_subform_like(self) -> bool {
        matches!(self, Self::Subform | Self::SubformSet)
    }

    /// Data packet element kinds.
    pub fn is_data(self) -> bool {
        matches!(self, Self::DataModel | Self::DataGroup | Self::DataValue)
    }

    /// Whether a node of this kind may be allocated in `packet`.
    pub fn is_valid_in(self, packet: Packet) -> bool {
        match packet {
            Packet::Xdp => self == Self::Xfa,
            Packet::Datasets => self.is_data(),
            Packet::Template => {
                !self.is_data() && !matches!(self, Self::Xfa | Self::InstanceManager | Self::Form)
            },
            Packet::Form => !self.is_data() && !matches!(self, Self::Xfa | Self::Template),
        }
    }
}

bitflags! {
    /// Per-node state flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct NodeFlags: u8 {
        /// Form node left over from a previous merge and not reused yet
        const UNUSED = 1 << 0;
        /// Node finished merging
        const INITIALIZED = 1 << 1;
    }
}

/// Back-reference to the markup element a node was loaded from or will be
/// serialized to. Owned by the markup layer; the engine only creates, moves
/// or clears it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkupRef {
    /// Qualified tag of the markup element
    pub tag: String,
}

/// Compute the XFA name hash of `name`.
///
/// The empty name hashes to 0, which marks a node as unnamed.
pub fn name_hash(name: &str) -> u32 {
    name.encode_utf16()
        .fold(0u32, |hash, unit| hash.wrapping_mul(31).wrapping_add(unit as u32))
}

/// A node of any packet.
#[derive(Debug, Clone)]
pub struct Node {
    pub(crate) element: Element,
    pub(crate) packet: Packet,
    pub(crate) name: String,
    pub(crate) name_hash: u32,
    pub(crate) attributes: IndexMap<String, String>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) parent: Option<NodeId>,
    pub(crate) flags: NodeFlags,
    pub(crate) markup: Option<MarkupRef>,
}

impl Node {
    pub(crate) fn new(packet: Packet, element: Element) -> Self {
        Self {
            element,
            packet,
            name: String::new(),
            name_hash: 0,
            attributes: IndexMap::new(),
            children: Vec::new(),
            parent: None,
            flags: NodeFlags::empty(),
            markup: None,
        }
    }

    /// Element kind.
    pub fn element(&self) -> Element {
        self.element
    }

    /// Owning packet.
    pub fn packet(&self) -> Packet {
        self.packet
    }

    /// Node name ("" when unnamed).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Hash of the node name.
    pub fn name_hash(&self) -> u32 {
        self.name_hash
    }

    /// Attribute value by name.
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    /// Ordered children.
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Parent node, if attached.
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// State flags.
    pub fn flags(&self) -> NodeFlags {
        self.flags
    }

    /// Markup back-reference, if any.
    pub fn markup(&self) -> Option<&MarkupRef> {
        self.markup.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_from_xfa_name() {
        assert_eq!(Element::from_xfa_name("subform"), Element::Subform);
        assert_eq!(Element::from_xfa_name("exclGroup"), Element::ExclGroup);
        assert_eq!(Element::from_xfa_name("occur"), Element::Occur);
        assert_eq!(Element::from_xfa_name("somethingElse"), Element::Unknown);
    }

    #[test]
    fn test_container_kinds() {
        assert!(Element::Subform.is_container());
        assert!(Element::Field.is_container());
        assert!(!Element::InstanceManager.is_container());
        assert!(!Element::Occur.is_container());
        assert!(!Element::DataGroup.is_container());
    }

    #[test]
    fn test_packet_validity() {
        assert!(Element::DataGroup.is_valid_in(Packet::Datasets));
        assert!(!Element::DataGroup.is_valid_in(Packet::Form));
        assert!(!Element::Subform.is_valid_in(Packet::Datasets));
        assert!(Element::InstanceManager.is_valid_in(Packet::Form));
        assert!(!Element::InstanceManager.is_valid_in(Packet::Template));
    }

    #[test]
    fn test_name_hash() {
        assert_eq!(name_hash(""), 0);
        assert_eq!(name_hash("a"), 97);
        assert_eq!(name_hash("ab"), 97 * 31 + 98);
        assert_ne!(name_hash("Row"), name_hash("row"));
    }
}
