//! Global attribute declarations

use crate::namespaces::QName;

use super::types::AttributeUse;
use super::{AttributeId, TypeId};

/// A resolved global attribute declaration
#[derive(Debug, Clone, PartialEq)]
pub struct GlobalAttribute {
    /// Position in the attribute table
    pub id: AttributeId,
    /// Attribute name
    pub name: QName,
    /// Declared simple type
    pub type_id: TypeId,
    /// Synthetic type of a standalone instance of this attribute
    pub attribute_type: TypeId,
    /// Default value
    pub default: Option<String>,
    /// Fixed value
    pub fixed: Option<String>,
    /// Source document location
    pub location: Option<String>,
}

impl GlobalAttribute {
    /// The declaration as an optional attribute use
    pub fn to_use(&self) -> AttributeUse {
        AttributeUse {
            name: self.name.clone(),
            type_id: self.type_id,
            required: false,
            default: self.default.clone(),
            fixed: self.fixed.clone(),
            global: Some(self.id),
        }
    }
}
