//! Schema components
//!
//! The resolved component model: types, element and attribute declarations,
//! identity constraints and content model particles. Components refer to one
//! another by arena index ([`TypeId`], [`ElementId`], ...), never by pointer;
//! the arena owning them is either the compilation context or the finished
//! [`crate::compiler::SchemaTypeSystem`].

pub mod attributes;
pub mod builtins;
pub mod elements;
pub mod facets;
pub mod identities;
pub mod particles;
pub mod simple_types;
pub mod types;
pub mod wildcards;

use std::fmt;

pub use attributes::GlobalAttribute;
pub use elements::GlobalElement;
pub use facets::{FacetSet, WhiteSpace};
pub use identities::{IdentityCategory, IdentityConstraint};
pub use particles::{
    Compositor, ElementParticle, ModelGroup, Occurs, ParticleKind, SchemaParticle,
    WildcardParticle,
};
pub use types::{
    AttributeModel, AttributeUse, ContentCategory, DerivationMethod, DerivationSet, SchemaType,
    SimpleInfo, SimpleVariety, TypeKind, TypeRole,
};
pub use wildcards::{ProcessContents, Wildcard};

macro_rules! arena_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
        pub struct $name(pub(crate) usize);

        impl $name {
            /// Position in the owning arena
            pub fn index(&self) -> usize {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}#{}", $prefix, self.0)
            }
        }
    };
}

arena_id!(
    /// Index of a type in the type arena
    TypeId,
    "type"
);
arena_id!(
    /// Index of a global element declaration
    ElementId,
    "element"
);
arena_id!(
    /// Index of a global attribute declaration
    AttributeId,
    "attribute"
);
arena_id!(
    /// Index of an identity constraint
    IdentityId,
    "identity"
);

impl TypeId {
    /// xs:anyType, the universal base type; always the first arena slot
    pub const ANY_TYPE: TypeId = TypeId(0);
    /// xs:anySimpleType; always the second arena slot
    pub const ANY_SIMPLE_TYPE: TypeId = TypeId(1);
}

/// Read access to resolved components by index
///
/// Implemented by the compilation arena (where unresolved slots yield
/// `None`) and by finished type systems.
pub trait ComponentLookup {
    /// A resolved type
    fn lookup_type(&self, id: TypeId) -> Option<&SchemaType>;

    /// A global element declaration
    fn lookup_element(&self, id: ElementId) -> Option<&GlobalElement>;
}
