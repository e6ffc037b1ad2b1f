//! Global element declarations

use std::collections::BTreeSet;

use crate::namespaces::QName;

use super::particles::{ElementParticle, Occurs};
use super::types::DerivationSet;
use super::{ElementId, IdentityId, TypeId};

/// A resolved global element declaration
#[derive(Debug, Clone, PartialEq)]
pub struct GlobalElement {
    /// Position in the element table
    pub id: ElementId,
    /// Element name
    pub name: QName,
    /// Declared type
    pub type_id: TypeId,
    /// Synthetic type of a standalone instance of this element
    pub document_type: TypeId,
    /// Whether xsi:nil is allowed
    pub nillable: bool,
    /// Default value
    pub default: Option<String>,
    /// Fixed value
    pub fixed: Option<String>,
    /// Whether the element is abstract
    pub is_abstract: bool,
    /// Disallowed substitutions
    pub block: DerivationSet,
    /// Disallowed substitution group membership derivations
    pub final_set: DerivationSet,
    /// Substitution group head
    pub substitution_group: Option<ElementId>,
    /// Every element that may substitute for this one, transitively
    pub substitution_members: BTreeSet<QName>,
    /// Identity constraints declared on the element
    pub identity_constraints: Vec<IdentityId>,
    /// Source document location
    pub location: Option<String>,
}

impl GlobalElement {
    /// The element as a (1, 1) particle, as used by its document type
    pub fn to_particle(&self) -> ElementParticle {
        ElementParticle {
            occurs: Occurs::once(),
            name: self.name.clone(),
            type_id: self.type_id,
            nillable: self.nillable,
            default: self.default.clone(),
            fixed: self.fixed.clone(),
            block: self.block,
            identity_constraints: self.identity_constraints.clone(),
            global: Some(self.id),
            is_abstract: self.is_abstract,
        }
    }

    /// The value constraint, if any
    pub fn value_constraint(&self) -> Option<&str> {
        self.fixed.as_deref().or(self.default.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_particle() {
        let element = GlobalElement {
            id: ElementId(3),
            name: QName::namespaced("urn:a", "root"),
            type_id: TypeId(7),
            document_type: TypeId(8),
            nillable: true,
            default: None,
            fixed: Some("x".to_string()),
            is_abstract: false,
            block: DerivationSet::default(),
            final_set: DerivationSet::default(),
            substitution_group: None,
            substitution_members: BTreeSet::new(),
            identity_constraints: Vec::new(),
            location: None,
        };

        let particle = element.to_particle();
        assert_eq!(particle.occurs, Occurs::once());
        assert_eq!(particle.global, Some(ElementId(3)));
        assert_eq!(particle.type_id, TypeId(7));
        assert!(particle.nillable);
        assert_eq!(element.value_constraint(), Some("x"));
    }
}
