//! XFA (XML Forms Architecture) merge and binding engine.
//!
//! An XFA document carries three trees: the declarative **Template**, the
//! live **Data** document and the instantiated **Form**. This module decides
//! which Data nodes correspond to which Template nodes, expands repeating
//! containers to the right cardinality and keeps Form and Data in sync while
//! instances are added, removed and reordered.
//!
//! # Features
//!
//! - Load XDP, template and datasets packets ([`XfaParser`])
//! - Full merge and re-merge ([`XfaDocument::do_data_merge`], [`XfaDocument::re_merge`])
//! - `once`, `global`, `dataRef` and `none` binding with on-demand data creation
//! - Ordered, choice and unordered subform sets
//! - Instance managers: set count, add, insert, remove, move ([`InstanceManager`])
//!
//! # Limitations
//!
//! **NOT supported:**
//! - Layout, rendering and scripting
//! - Serializing the trees back to XML
//!
//! # Example
//!
//! ```
//! use xfa_forms::xfa::XfaParser;
//!
//! let xdp = r#"<xdp:xdp xmlns:xdp="http://ns.adobe.com/xdp/">
//!   <template>
//!     <subform name="form1">
//!       <subform name="Row"><occur min="0" max="-1"/><field name="qty"/></subform>
//!     </subform>
//!   </template>
//!   <xfa:datasets xmlns:xfa="http://www.xfa.org/schema/xfa-data/1.0/">
//!     <xfa:data><form1><Row><qty>1</qty></Row><Row><qty>2</qty></Row></form1></xfa:data>
//!   </xfa:datasets>
//! </xdp:xdp>"#;
//!
//! let mut doc = XfaParser::new().parse(xdp)?;
//! doc.do_data_merge()?;
//!
//! let rows = doc.instance_managers()[0];
//! assert_eq!(rows.count(&doc), 2);
//! rows.add_instance(&mut doc, true)?;
//! assert_eq!(rows.count(&doc), 3);
//! # Ok::<(), xfa_forms::Error>(())
//! ```

mod binding;
mod document;
mod dump;
mod instance_manager;
mod merge;
mod node;
mod notify;
mod occur;
mod parser;
mod rebind;
mod registry;
mod relations;
mod som;
mod tree;

pub use binding::{bind_mode, bind_ref, node_value, BindMode};
pub use document::XfaDocument;
pub use dump::FormNodeDump;
pub use instance_manager::InstanceManager;
pub use merge::Relation;
pub use node::{name_hash, Element, MarkupRef, Node, NodeFlags, NodeId, Packet};
pub use notify::{FormEvent, FormNotify, NoopNotify, RecordingNotify};
pub use occur::{read_occurrence, Occurrence, UNBOUNDED};
pub use parser::XfaParser;
pub use rebind::BindPass;
pub use registry::GlobalBindingRegistry;
pub use relations::BindingTable;
pub use som::{resolve, ResolveFlags, ResolveOutcome, Resolution, SomRoots};
pub use tree::{ContainerCursor, NodeTree};
