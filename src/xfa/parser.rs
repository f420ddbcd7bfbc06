//! XFA packet loader.
//!
//! Reads an XDP document, or separate template and datasets packets, into an
//! [`XfaDocument`] ready for [`XfaDocument::do_data_merge`].
//!
//! # Packet Structure
//!
//! - **template**: elements map to [`Element`] by local name; the `name`
//!   attribute becomes the node name, other attributes are kept verbatim and
//!   text content is stored in the `value` attribute.
//! - **datasets**: the `data` group holds the records. Elements with element
//!   children (or `xfa:dataNode="dataGroup"`) become data groups, the rest
//!   data values carrying their text. An optional `dataDescription` group
//!   is loaded the same way.
//!
//! Other packets (config, localeSet, a stored form packet) are skipped.

use super::document::{XfaDocument, DATA_DESCRIPTION_NAME, DATA_ROOT_NAME};
use super::node::{Element, MarkupRef, NodeId, Packet};
use crate::config::MergeOptions;
use crate::error::{Error, Result};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

/// One parsed markup element.
#[derive(Debug, Default)]
struct XmlElement {
    /// Qualified tag
    tag: String,
    /// Local name without prefix
    local: String,
    /// Attributes by local name; namespace declarations dropped
    attributes: Vec<(String, String)>,
    children: Vec<XmlElement>,
    text: String,
}

impl XmlElement {
    fn from_start(e: &BytesStart<'_>) -> Result<Self> {
        let tag = String::from_utf8_lossy(e.name().as_ref()).to_string();
        let local = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
        let mut attributes = Vec::new();
        for attr in e.attributes() {
            let attr = attr.map_err(|err| Error::InvalidXfa(format!("bad attribute in <{}>: {}", tag, err)))?;
            let key = attr.key.as_ref();
            if key == b"xmlns" || key.starts_with(b"xmlns:") {
                continue;
            }
            let name = String::from_utf8_lossy(attr.key.local_name().as_ref()).to_string();
            let value = attr
                .unescape_value()
                .map_err(|err| Error::InvalidXfa(format!("bad attribute value in <{}>: {}", tag, err)))?
                .to_string();
            attributes.push((name, value));
        }
        Ok(Self {
            tag,
            local,
            attributes,
            ..Default::default()
        })
    }

    fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Parse `xml` into its root element.
fn read_document(xml: &str) -> Result<XmlElement> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut stack: Vec<XmlElement> = Vec::new();
    let mut root = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => {
                stack.push(XmlElement::from_start(e)?);
            },
            Ok(Event::Empty(ref e)) => {
                let element = XmlElement::from_start(e)?;
                match stack.last_mut() {
                    Some(parent) => parent.children.push(element),
                    None => root = Some(element),
                }
            },
            Ok(Event::Text(e)) => {
                if let Some(current) = stack.last_mut() {
                    let text = e
                        .unescape()
                        .map_err(|err| Error::InvalidXfa(format!("bad text content: {}", err)))?;
                    current.text.push_str(&text);
                }
            },
            Ok(Event::CData(e)) => {
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&String::from_utf8_lossy(&e.into_inner()));
                }
            },
            Ok(Event::End(_)) => {
                let Some(element) = stack.pop() else {
                    return Err(Error::InvalidXfa("unbalanced end tag".to_string()));
                };
                match stack.last_mut() {
                    Some(parent) => parent.children.push(element),
                    None => root = Some(element),
                }
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(Error::InvalidXfa(format!(
                    "XML error at position {}: {}",
                    reader.buffer_position(),
                    e
                )));
            },
            _ => {},
        }
    }

    if !stack.is_empty() {
        return Err(Error::InvalidXfa(format!("unclosed element <{}>", stack[stack.len() - 1].tag)));
    }
    root.ok_or_else(|| Error::InvalidXfa("document has no root element".to_string()))
}

/// Loads XFA packets into an [`XfaDocument`].
#[derive(Debug, Clone, Default)]
pub struct XfaParser {
    options: MergeOptions,
}

impl XfaParser {
    /// Create a parser producing documents with default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a parser producing documents with `options`.
    pub fn with_options(options: MergeOptions) -> Self {
        Self { options }
    }

    /// Load an XDP document.
    ///
    /// A bare `<template>` or `<xfa:datasets>` root is accepted as a single packet.
    ///
    /// # Example
    ///
    /// ```
    /// use xfa_forms::xfa::XfaParser;
    ///
    /// let xdp = r#"<xdp:xdp xmlns:xdp="http://ns.adobe.com/xdp/">
    ///   <template><subform name="form1"><field name="qty"/></subform></template>
    ///   <xfa:datasets xmlns:xfa="http://www.xfa.org/schema/xfa-data/1.0/">
    ///     <xfa:data><form1><qty>3</qty></form1></xfa:data>
    ///   </xfa:datasets>
    /// </xdp:xdp>"#;
    ///
    /// let doc = XfaParser::new().parse(xdp).unwrap();
    /// assert!(doc.template_root().is_some());
    /// assert!(doc.record().is_some());
    /// ```
    pub fn parse(&self, xml: &str) -> Result<XfaDocument> {
        let root = read_document(xml)?;
        let mut doc = XfaDocument::with_options(self.options.clone());
        match root.local.as_str() {
            "xdp" => {
                for packet in &root.children {
                    self.load_packet(&mut doc, packet)?;
                }
            },
            "template" | "datasets" => self.load_packet(&mut doc, &root)?,
            other => {
                return Err(Error::InvalidXfa(format!("unexpected root element <{}>", other)));
            },
        }
        log::debug!("Loaded XFA document with {} nodes", doc.tree().len());
        Ok(doc)
    }

    /// Load a template packet and, optionally, a datasets packet.
    pub fn parse_packets(&self, template: &str, datasets: Option<&str>) -> Result<XfaDocument> {
        let mut doc = XfaDocument::with_options(self.options.clone());
        let root = read_document(template)?;
        if root.local != "template" {
            return Err(Error::InvalidXfa(format!("expected <template>, found <{}>", root.tag)));
        }
        self.load_template(&mut doc, &root)?;
        if let Some(datasets) = datasets {
            let root = read_document(datasets)?;
            if root.local != "datasets" {
                return Err(Error::InvalidXfa(format!("expected <datasets>, found <{}>", root.tag)));
            }
            self.load_datasets(&mut doc, &root)?;
        }
        Ok(doc)
    }

    fn load_packet(&self, doc: &mut XfaDocument, packet: &XmlElement) -> Result<()> {
        match packet.local.as_str() {
            "template" => self.load_template(doc, packet),
            "datasets" => self.load_datasets(doc, packet),
            other => {
                log::debug!("Skipping XFA packet <{}>", other);
                Ok(())
            },
        }
    }

    fn load_template(&self, doc: &mut XfaDocument, packet: &XmlElement) -> Result<()> {
        let root = doc.ensure_template_root()?;
        doc.tree_mut().set_markup(
            root,
            MarkupRef {
                tag: packet.tag.clone(),
            },
        );
        let mut stack: Vec<(&XmlElement, NodeId)> = packet.children.iter().rev().map(|c| (c, root)).collect();
        while let Some((element, parent)) = stack.pop() {
            let kind = Element::from_xfa_name(&element.local);
            if !kind.is_valid_in(Packet::Template) {
                log::warn!("Ignoring <{}> in template packet", element.tag);
                continue;
            }
            let name = element.attribute("name").unwrap_or("");
            let node = doc.add_node(parent, Packet::Template, kind, name)?;
            let tree = doc.tree_mut();
            for (key, value) in &element.attributes {
                if key != "name" {
                    tree.set_attribute(node, key, value.as_str());
                }
            }
            if !element.text.is_empty() {
                tree.set_attribute(node, "value", element.text.as_str());
            }
            tree.set_markup(
                node,
                MarkupRef {
                    tag: element.tag.clone(),
                },
            );
            stack.extend(element.children.iter().rev().map(|c| (c, node)));
        }
        Ok(())
    }

    fn load_datasets(&self, doc: &mut XfaDocument, packet: &XmlElement) -> Result<()> {
        let datasets = doc.ensure_datasets_root()?;
        for child in &packet.children {
            match child.local.as_str() {
                DATA_ROOT_NAME => {
                    let data = doc.ensure_data_root()?;
                    self.load_data_children(doc, child, data)?;
                },
                DATA_DESCRIPTION_NAME => {
                    let description = doc.add_node(datasets, Packet::Datasets, Element::DataGroup, DATA_DESCRIPTION_NAME)?;
                    for (key, value) in &child.attributes {
                        doc.tree_mut().set_attribute(description, key, value.as_str());
                    }
                    doc.tree_mut().create_markup(description);
                    self.load_data_children(doc, child, description)?;
                },
                other => log::debug!("Skipping datasets child <{}>", other),
            }
        }
        Ok(())
    }

    fn load_data_children(&self, doc: &mut XfaDocument, element: &XmlElement, parent: NodeId) -> Result<()> {
        let mut stack: Vec<(&XmlElement, NodeId)> = element.children.iter().rev().map(|c| (c, parent)).collect();
        while let Some((element, parent)) = stack.pop() {
            let kind = match element.attribute("dataNode") {
                Some("dataGroup") => Element::DataGroup,
                Some("dataValue") => Element::DataValue,
                _ if element.children.is_empty() => Element::DataValue,
                _ => Element::DataGroup,
            };
            let node = doc.add_node(parent, Packet::Datasets, kind, &element.local)?;
            let tree = doc.tree_mut();
            for (key, value) in &element.attributes {
                if key != "dataNode" {
                    tree.set_attribute(node, key, value.as_str());
                }
            }
            if kind == Element::DataValue {
                tree.set_attribute(node, "value", element.text.as_str());
            }
            tree.set_markup(
                node,
                MarkupRef {
                    tag: element.tag.clone(),
                },
            );
            stack.extend(element.children.iter().rev().map(|c| (c, node)));
        }
        Ok(())
    }
}
