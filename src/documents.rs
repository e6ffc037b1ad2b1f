//! XML element tree
//!
//! A minimal namespace-aware element tree built with quick-xml. Schema
//! documents are read into this tree first and then translated into
//! structured [`crate::parsing::SchemaDocument`] nodes.

use crate::error::{Error, Result};
use crate::namespaces::{NamespaceContext, QName};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::HashMap;

/// XML Element in the document tree
#[derive(Debug, Clone)]
pub struct Element {
    /// Element qualified name, namespace resolved
    pub qname: QName,
    /// Element attributes; unprefixed attributes have no namespace
    pub attributes: HashMap<QName, String>,
    /// Text content (if any)
    pub text: Option<String>,
    /// Child elements
    pub children: Vec<Element>,
    /// In-scope namespace declarations (inherited ones included)
    pub namespaces: NamespaceContext,
}

impl Element {
    /// Create a new element
    pub fn new(qname: QName) -> Self {
        Self {
            qname,
            attributes: HashMap::new(),
            text: None,
            children: Vec::new(),
            namespaces: NamespaceContext::new(),
        }
    }

    /// Get the local name of the element
    pub fn local_name(&self) -> &str {
        &self.qname.local_name
    }

    /// Get the namespace of the element
    pub fn namespace(&self) -> Option<&str> {
        self.qname.namespace.as_deref()
    }

    /// Get an unqualified attribute value by local name
    pub fn get_attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .get(&QName::local(name))
            .map(|s| s.as_str())
    }

    /// Get an attribute value by qualified name
    pub fn get_attribute_qname(&self, qname: &QName) -> Option<&str> {
        self.attributes.get(qname).map(|s| s.as_str())
    }

    /// Add a child element
    pub fn add_child(&mut self, child: Element) {
        self.children.push(child);
    }

    /// Find child elements by namespace and local name
    pub fn children_named<'a>(
        &'a self,
        namespace: &'a str,
        local_name: &'a str,
    ) -> impl Iterator<Item = &'a Element> + 'a {
        self.children
            .iter()
            .filter(move |e| e.namespace() == Some(namespace) && e.local_name() == local_name)
    }
}

/// XML Document representation
#[derive(Debug, Default)]
pub struct Document {
    /// Root element of the document
    pub root: Option<Element>,
}

impl Document {
    /// Create a new empty document
    pub fn new() -> Self {
        Self { root: None }
    }

    /// Parse an XML document from a string
    pub fn from_string(xml: &str) -> Result<Self> {
        Self::parse(xml.as_bytes())
    }

    /// Parse an XML document from bytes
    pub fn parse(xml: &[u8]) -> Result<Self> {
        let mut reader = Reader::from_reader(xml);
        reader.trim_text(true);

        let mut doc = Document::new();
        let mut stack: Vec<Element> = Vec::new();
        let mut buf = Vec::new();

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) => {
                    let inherited = stack.last().map(|parent| &parent.namespaces);
                    let element = Self::parse_element(&e, inherited)?;
                    stack.push(element);
                }
                Ok(Event::End(_)) => {
                    if let Some(current) = stack.pop() {
                        Self::attach(&mut doc, &mut stack, current);
                    }
                }
                Ok(Event::Empty(e)) => {
                    let inherited = stack.last().map(|parent| &parent.namespaces);
                    let element = Self::parse_element(&e, inherited)?;
                    Self::attach(&mut doc, &mut stack, element);
                }
                Ok(Event::Text(e)) => {
                    if let Some(current) = stack.last_mut() {
                        let text = e
                            .unescape()
                            .map_err(|e| Error::Xml(format!("Failed to unescape text: {}", e)))?
                            .to_string();
                        if !text.trim().is_empty() {
                            current.text = Some(text);
                        }
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(Error::Xml(format!(
                        "Error parsing XML at position {}: {}",
                        reader.buffer_position(),
                        e
                    )))
                }
                _ => {} // comments, processing instructions, doctype
            }
            buf.clear();
        }

        if !stack.is_empty() {
            return Err(Error::Xml("Unexpected end of document".to_string()));
        }

        Ok(doc)
    }

    fn attach(doc: &mut Document, stack: &mut [Element], element: Element) {
        match stack.last_mut() {
            Some(parent) => parent.add_child(element),
            None => doc.root = Some(element),
        }
    }

    /// Parse element from BytesStart event, resolving prefixes against the
    /// inherited scope plus the element's own declarations
    fn parse_element(start: &BytesStart, inherited: Option<&NamespaceContext>) -> Result<Element> {
        let name = std::str::from_utf8(start.name().as_ref())
            .map_err(|e| Error::Xml(format!("Invalid element name: {}", e)))?
            .to_string();

        let mut own = NamespaceContext::new();
        let mut raw_attributes = Vec::new();

        for attr_result in start.attributes() {
            let attr = attr_result
                .map_err(|e| Error::Xml(format!("Failed to parse attribute: {}", e)))?;

            let attr_name = std::str::from_utf8(attr.key.as_ref())
                .map_err(|e| Error::Xml(format!("Invalid attribute name: {}", e)))?
                .to_string();

            let attr_value = attr
                .unescape_value()
                .map_err(|e| Error::Xml(format!("Failed to unescape attribute value: {}", e)))?
                .to_string();

            if attr_name == "xmlns" {
                own.set_default_namespace(&attr_value);
            } else if let Some(prefix) = attr_name.strip_prefix("xmlns:") {
                own.add_prefix(prefix, &attr_value);
            } else {
                raw_attributes.push((attr_name, attr_value));
            }
        }

        let scope = match inherited {
            Some(parent) => parent.nested(&own),
            None => own,
        };

        let mut element = Element::new(scope.resolve(&name)?);
        for (attr_name, attr_value) in raw_attributes {
            // unprefixed attributes are never in the default namespace
            let attr_qname = if attr_name.contains(':') {
                scope.resolve(&attr_name)?
            } else {
                QName::local(attr_name)
            };
            element.attributes.insert(attr_qname, attr_value);
        }
        element.namespaces = scope;

        Ok(element)
    }

    /// Get the root element
    pub fn root(&self) -> Option<&Element> {
        self.root.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_xml() {
        let xml = r#"<root><child>text</child></root>"#;
        let doc = Document::from_string(xml).unwrap();

        let root = doc.root.unwrap();
        assert_eq!(root.local_name(), "root");
        assert_eq!(root.children.len(), 1);
        assert_eq!(root.children[0].local_name(), "child");
        assert_eq!(root.children[0].text.as_deref(), Some("text"));
    }

    #[test]
    fn test_parse_with_attributes() {
        let xml = r#"<root attr1="value1" attr2="value2"><child/></root>"#;
        let doc = Document::from_string(xml).unwrap();

        let root = doc.root.unwrap();
        assert_eq!(root.get_attribute("attr1"), Some("value1"));
        assert_eq!(root.get_attribute("attr2"), Some("value2"));
    }

    #[test]
    fn test_namespaces_are_inherited() {
        let xml = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema" xmlns="urn:d">
            <xs:element name="a"><inner xmlns:p="urn:p" p:attr="1"/></xs:element>
        </xs:schema>"#;
        let doc = Document::from_string(xml).unwrap();

        let root = doc.root.unwrap();
        assert_eq!(root.namespace(), Some("http://www.w3.org/2001/XMLSchema"));
        let element = &root.children[0];
        assert_eq!(element.namespace(), Some("http://www.w3.org/2001/XMLSchema"));
        assert_eq!(element.namespaces.get_default_namespace(), Some("urn:d"));

        let inner = &element.children[0];
        assert_eq!(inner.namespace(), Some("urn:d"));
        assert_eq!(
            inner.get_attribute_qname(&QName::namespaced("urn:p", "attr")),
            Some("1")
        );
    }

    #[test]
    fn test_children_named() {
        let xml = r#"<r xmlns="urn:x"><a/><b/><a/></r>"#;
        let doc = Document::from_string(xml).unwrap();

        let root = doc.root.unwrap();
        assert_eq!(root.children_named("urn:x", "a").count(), 2);
        assert_eq!(root.children_named("urn:y", "a").count(), 0);
    }

    #[test]
    fn test_unknown_prefix_fails() {
        assert!(Document::from_string("<p:root/>").is_err());
    }

    #[test]
    fn test_truncated_document_fails() {
        assert!(Document::from_string("<root><child>").is_err());
    }
}
