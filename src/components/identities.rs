//! Identity constraints (xs:key, xs:keyref, xs:unique)
//!
//! Only the declarations are modelled; evaluating selectors and fields
//! against instance documents is left to validators.

use std::fmt;

use crate::namespaces::QName;

use super::IdentityId;

/// Kind of identity constraint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentityCategory {
    /// xs:key
    Key,
    /// xs:keyref
    Keyref,
    /// xs:unique
    Unique,
}

impl IdentityCategory {
    /// Parse from the declaring element's local name
    pub fn parse(local_name: &str) -> Option<Self> {
        match local_name {
            "key" => Some(Self::Key),
            "keyref" => Some(Self::Keyref),
            "unique" => Some(Self::Unique),
            _ => None,
        }
    }
}

impl fmt::Display for IdentityCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Key => write!(f, "key"),
            Self::Keyref => write!(f, "keyref"),
            Self::Unique => write!(f, "unique"),
        }
    }
}

/// A resolved identity constraint
#[derive(Debug, Clone, PartialEq)]
pub struct IdentityConstraint {
    /// Position in the identity constraint table
    pub id: IdentityId,
    /// Constraint name
    pub name: QName,
    /// key, keyref or unique
    pub category: IdentityCategory,
    /// Selector XPath
    pub selector: String,
    /// Field XPaths, at least one
    pub fields: Vec<String>,
    /// The referenced key or unique, for keyrefs
    pub referenced: Option<IdentityId>,
    /// Source document location
    pub location: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_category() {
        assert_eq!(IdentityCategory::parse("key"), Some(IdentityCategory::Key));
        assert_eq!(IdentityCategory::parse("keyref"), Some(IdentityCategory::Keyref));
        assert_eq!(IdentityCategory::parse("unique"), Some(IdentityCategory::Unique));
        assert_eq!(IdentityCategory::parse("element"), None);
        assert_eq!(IdentityCategory::Keyref.to_string(), "keyref");
    }
}
