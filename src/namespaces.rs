//! XML namespace handling
//!
//! Qualified names and prefix scopes. A [`QName`] with no namespace and a
//! [`QName`] in the empty namespace are the same name: the empty string is
//! normalized away on construction.

use crate::error::{Error, Result};
use crate::XML_NAMESPACE;
use std::collections::HashMap;
use std::fmt;

/// XML Namespace URI
pub type NamespaceUri = String;

/// Namespace prefix
pub type Prefix = String;

/// Qualified name (QName) - combination of namespace and local name
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
pub struct QName {
    /// Namespace URI (None for no namespace)
    pub namespace: Option<NamespaceUri>,
    /// Local name
    pub local_name: String,
}

impl QName {
    /// Create a new QName
    pub fn new(namespace: Option<String>, local_name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.filter(|ns| !ns.is_empty()),
            local_name: local_name.into(),
        }
    }

    /// Create a QName without a namespace
    pub fn local(local_name: impl Into<String>) -> Self {
        Self {
            namespace: None,
            local_name: local_name.into(),
        }
    }

    /// Create a QName with a namespace
    pub fn namespaced(namespace: impl Into<String>, local_name: impl Into<String>) -> Self {
        Self::new(Some(namespace.into()), local_name)
    }

    /// Namespace URI, with the empty string standing for "no namespace"
    pub fn namespace_str(&self) -> &str {
        self.namespace.as_deref().unwrap_or("")
    }

    /// Same local name moved into another namespace
    pub fn with_namespace(&self, namespace: Option<&str>) -> Self {
        Self::new(namespace.map(str::to_string), self.local_name.clone())
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{{{}}}{}", ns, self.local_name),
            None => write!(f, "{}", self.local_name),
        }
    }
}

/// Namespace context for resolving prefixes
///
/// Contexts nest: [`NamespaceContext::nested`] layers an element's own
/// declarations over the inherited ones.
#[derive(Debug, Clone)]
pub struct NamespaceContext {
    /// Mapping from prefix to namespace URI
    prefixes: HashMap<Prefix, NamespaceUri>,
    /// Default namespace (no prefix)
    default_namespace: Option<NamespaceUri>,
}

impl NamespaceContext {
    /// Create a new empty namespace context
    pub fn new() -> Self {
        Self {
            prefixes: HashMap::new(),
            default_namespace: None,
        }
    }

    /// Add a namespace prefix mapping
    pub fn add_prefix(&mut self, prefix: impl Into<String>, namespace: impl Into<String>) {
        self.prefixes.insert(prefix.into(), namespace.into());
    }

    /// Set the default namespace; `xmlns=""` undeclares it
    pub fn set_default_namespace(&mut self, namespace: impl Into<String>) {
        let namespace = namespace.into();
        self.default_namespace = if namespace.is_empty() {
            None
        } else {
            Some(namespace)
        };
    }

    /// Get the namespace for a prefix
    pub fn get_namespace(&self, prefix: &str) -> Option<&str> {
        if prefix == "xml" {
            return Some(XML_NAMESPACE);
        }
        self.prefixes.get(prefix).map(|s| s.as_str())
    }

    /// Get the default namespace
    pub fn get_default_namespace(&self) -> Option<&str> {
        self.default_namespace.as_deref()
    }

    /// Whether this context declares anything at all
    pub fn is_empty(&self) -> bool {
        self.prefixes.is_empty() && self.default_namespace.is_none()
    }

    /// Layer `inner` declarations over this context
    pub fn nested(&self, inner: &NamespaceContext) -> NamespaceContext {
        if inner.is_empty() {
            return self.clone();
        }
        let mut merged = self.clone();
        for (prefix, ns) in &inner.prefixes {
            merged.prefixes.insert(prefix.clone(), ns.clone());
        }
        if inner.default_namespace.is_some() {
            merged.default_namespace = inner.default_namespace.clone();
        }
        merged
    }

    /// Resolve a prefixed name to a QName, using the default namespace for
    /// unprefixed names
    pub fn resolve(&self, prefixed_name: &str) -> Result<QName> {
        let prefixed_name = prefixed_name.trim();
        if let Some((prefix, local)) = prefixed_name.split_once(':') {
            let namespace = self
                .get_namespace(prefix)
                .ok_or_else(|| Error::Namespace(format!("Unknown prefix: {}", prefix)))?;
            Ok(QName::namespaced(namespace, local))
        } else {
            Ok(QName::new(self.default_namespace.clone(), prefixed_name))
        }
    }
}

impl Default for NamespaceContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qname_creation() {
        let qname = QName::namespaced("http://example.com", "element");
        assert_eq!(qname.namespace, Some("http://example.com".to_string()));
        assert_eq!(qname.local_name, "element");
    }

    #[test]
    fn test_empty_namespace_is_no_namespace() {
        assert_eq!(QName::namespaced("", "a"), QName::local("a"));
        assert_eq!(QName::local("a").namespace_str(), "");
    }

    #[test]
    fn test_qname_display() {
        let qname = QName::namespaced("http://example.com", "element");
        assert_eq!(qname.to_string(), "{http://example.com}element");

        let qname_local = QName::local("element");
        assert_eq!(qname_local.to_string(), "element");
    }

    #[test]
    fn test_nested_context() {
        let mut outer = NamespaceContext::new();
        outer.add_prefix("xs", "http://www.w3.org/2001/XMLSchema");
        outer.set_default_namespace("urn:outer");

        let mut inner = NamespaceContext::new();
        inner.set_default_namespace("urn:inner");

        let merged = outer.nested(&inner);
        assert_eq!(merged.get_default_namespace(), Some("urn:inner"));
        assert_eq!(
            merged.get_namespace("xs"),
            Some("http://www.w3.org/2001/XMLSchema")
        );
    }

    #[test]
    fn test_resolve_prefixed_name() {
        let mut ctx = NamespaceContext::new();
        ctx.add_prefix("xs", "http://www.w3.org/2001/XMLSchema");

        let qname = ctx.resolve("xs:element").unwrap();
        assert_eq!(qname.namespace_str(), "http://www.w3.org/2001/XMLSchema");
        assert_eq!(qname.local_name, "element");

        assert!(ctx.resolve("nope:element").is_err());
        assert_eq!(ctx.resolve("plain").unwrap(), QName::local("plain"));
        assert_eq!(ctx.resolve("xml:lang").unwrap().namespace_str(), XML_NAMESPACE);
    }
}
