//! Parsed schema documents
//!
//! [`SchemaDocument`] is the structured form of one XSD document that the
//! compiler consumes: declarations as typed nodes with every QName prefix
//! already resolved. Nothing here is resolved against other documents;
//! references stay [`QName`]s until the compiler looks them up.

mod reader;

use crate::components::{Compositor, DerivationMethod, DerivationSet, IdentityCategory, Occurs, ProcessContents};
use crate::namespaces::QName;

pub use reader::digest;

/// One parsed XSD document
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchemaDocument {
    /// Where the document was read from
    pub location: Option<String>,
    /// SHA-256 of the document text, hex encoded
    pub digest: String,
    /// targetNamespace
    pub target_namespace: Option<String>,
    /// elementFormDefault="qualified"
    pub element_form_qualified: bool,
    /// attributeFormDefault="qualified"
    pub attribute_form_qualified: bool,
    /// blockDefault
    pub block_default: DerivationSet,
    /// finalDefault
    pub final_default: DerivationSet,
    /// xs:import declarations
    pub imports: Vec<Import>,
    /// xs:include declarations
    pub includes: Vec<Include>,
    /// xs:redefine declarations
    pub redefines: Vec<Redefine>,
    /// Global simple and complex types
    pub types: Vec<TypeDecl>,
    /// Global elements
    pub elements: Vec<ElementDecl>,
    /// Global attributes
    pub attributes: Vec<AttributeDecl>,
    /// Named model groups
    pub groups: Vec<GroupDecl>,
    /// Named attribute groups
    pub attribute_groups: Vec<AttributeGroupDecl>,
}

impl SchemaDocument {
    /// Create an empty document
    pub fn new(target_namespace: Option<&str>) -> Self {
        Self {
            target_namespace: target_namespace.filter(|ns| !ns.is_empty()).map(str::to_string),
            ..Self::default()
        }
    }

    /// Set the source location
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Target namespace, with the empty string standing for none
    pub fn namespace_str(&self) -> &str {
        self.target_namespace.as_deref().unwrap_or("")
    }

    /// Number of top-level components declared
    pub fn component_count(&self) -> usize {
        self.types.len()
            + self.elements.len()
            + self.attributes.len()
            + self.groups.len()
            + self.attribute_groups.len()
            + self
                .redefines
                .iter()
                .map(|r| r.types.len() + r.groups.len() + r.attribute_groups.len())
                .sum::<usize>()
    }
}

/// xs:import
#[derive(Debug, Clone, PartialEq)]
pub struct Import {
    /// Declared namespace; None imports no-namespace components
    pub namespace: Option<String>,
    /// Location hint
    pub schema_location: Option<String>,
}

/// xs:include
#[derive(Debug, Clone, PartialEq)]
pub struct Include {
    /// Location of the included document
    pub schema_location: String,
}

/// xs:redefine and the components it redefines
#[derive(Debug, Clone, PartialEq)]
pub struct Redefine {
    /// Location of the redefined document
    pub schema_location: String,
    /// Redefining types
    pub types: Vec<TypeDecl>,
    /// Redefining model groups
    pub groups: Vec<GroupDecl>,
    /// Redefining attribute groups
    pub attribute_groups: Vec<AttributeGroupDecl>,
}

/// A simple or complex type definition
#[derive(Debug, Clone, PartialEq)]
pub enum TypeDecl {
    /// xs:simpleType
    Simple(SimpleTypeDecl),
    /// xs:complexType
    Complex(ComplexTypeDecl),
}

impl TypeDecl {
    /// Declared name; None for anonymous types
    pub fn name(&self) -> Option<&str> {
        match self {
            TypeDecl::Simple(s) => s.name.as_deref(),
            TypeDecl::Complex(c) => c.name.as_deref(),
        }
    }

    /// Base type named by the derivation, if any
    pub fn base_name(&self) -> Option<&QName> {
        match self {
            TypeDecl::Simple(s) => match &s.content {
                SimpleContentDecl::Restriction { base, .. } => base.as_ref(),
                _ => None,
            },
            TypeDecl::Complex(c) => c.base.as_ref(),
        }
    }
}

/// xs:simpleType
#[derive(Debug, Clone, PartialEq)]
pub struct SimpleTypeDecl {
    /// Name; None for anonymous types
    pub name: Option<String>,
    /// final attribute
    pub final_set: Option<DerivationSet>,
    /// The derivation
    pub content: SimpleContentDecl,
}

/// The derivation of a simple type
#[derive(Debug, Clone, PartialEq)]
pub enum SimpleContentDecl {
    /// xs:restriction
    Restriction {
        /// base attribute
        base: Option<QName>,
        /// Inline base type
        inline_base: Option<Box<SimpleTypeDecl>>,
        /// Constraining facets, in document order
        facets: Vec<FacetDecl>,
    },
    /// xs:list
    List {
        /// itemType attribute
        item_type: Option<QName>,
        /// Inline item type
        inline_item: Option<Box<SimpleTypeDecl>>,
    },
    /// xs:union
    Union {
        /// memberTypes attribute
        member_types: Vec<QName>,
        /// Inline member types
        inline_members: Vec<SimpleTypeDecl>,
    },
}

/// One constraining facet
#[derive(Debug, Clone, PartialEq)]
pub struct FacetDecl {
    /// Facet element local name, e.g. "maxLength"
    pub name: String,
    /// value attribute
    pub value: String,
}

/// How a complex type's content is declared
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    /// Particles and attributes directly inside xs:complexType
    Implicit,
    /// xs:complexContent
    Complex,
    /// xs:simpleContent
    Simple,
}

/// xs:complexType
#[derive(Debug, Clone, PartialEq)]
pub struct ComplexTypeDecl {
    /// Name; None for anonymous types
    pub name: Option<String>,
    /// abstract attribute
    pub is_abstract: bool,
    /// mixed attribute of the type or of xs:complexContent
    pub mixed: bool,
    /// block attribute
    pub block: Option<DerivationSet>,
    /// final attribute
    pub final_set: Option<DerivationSet>,
    /// How the content is declared
    pub content_kind: ContentKind,
    /// Derivation method; restriction for the implicit form
    pub derivation: DerivationMethod,
    /// Base type; None for the implicit form (anyType)
    pub base: Option<QName>,
    /// Content model
    pub particle: Option<ParticleDecl>,
    /// Attribute uses, attribute group references, wildcard
    pub attributes: AttributesDecl,
    /// simpleContent restriction: inline simple type
    pub inline_simple: Option<Box<SimpleTypeDecl>>,
    /// simpleContent restriction: facets
    pub facets: Vec<FacetDecl>,
}

impl ComplexTypeDecl {
    /// An implicit restriction of anyType with the given content
    pub fn implicit(name: Option<&str>, particle: Option<ParticleDecl>) -> Self {
        Self {
            name: name.map(str::to_string),
            is_abstract: false,
            mixed: false,
            block: None,
            final_set: None,
            content_kind: ContentKind::Implicit,
            derivation: DerivationMethod::Restriction,
            base: None,
            particle,
            attributes: AttributesDecl::default(),
            inline_simple: None,
            facets: Vec::new(),
        }
    }
}

/// The attribute part of a complex type or attribute group
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttributesDecl {
    /// Local attributes and attribute references
    pub uses: Vec<AttributeDecl>,
    /// xs:attributeGroup references
    pub group_refs: Vec<QName>,
    /// xs:anyAttribute
    pub wildcard: Option<WildcardDecl>,
}

/// Attribute use attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UseKind {
    /// Attribute is optional (default)
    #[default]
    Optional,
    /// Attribute is required
    Required,
    /// Attribute is prohibited
    Prohibited,
}

/// xs:attribute, global, local or a reference
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeDecl {
    /// name attribute
    pub name: Option<String>,
    /// ref attribute
    pub reference: Option<QName>,
    /// type attribute
    pub type_name: Option<QName>,
    /// Inline simple type
    pub inline_type: Option<SimpleTypeDecl>,
    /// use attribute
    pub use_kind: UseKind,
    /// default attribute
    pub default: Option<String>,
    /// fixed attribute
    pub fixed: Option<String>,
    /// form attribute; None defers to attributeFormDefault
    pub qualified: Option<bool>,
}

/// xs:any or xs:anyAttribute
#[derive(Debug, Clone, PartialEq)]
pub struct WildcardDecl {
    /// namespace attribute as written ("##any" when absent)
    pub namespace: String,
    /// processContents attribute
    pub process: ProcessContents,
}

/// One content model node
#[derive(Debug, Clone, PartialEq)]
pub enum ParticleDecl {
    /// xs:sequence, xs:choice or xs:all
    Group {
        /// Compositor
        compositor: Compositor,
        /// Occurrence bounds
        occurs: Occurs,
        /// Children
        particles: Vec<ParticleDecl>,
    },
    /// xs:group ref=...
    GroupRef {
        /// Referenced group
        reference: QName,
        /// Occurrence bounds
        occurs: Occurs,
    },
    /// xs:element, local or a reference
    Element(Box<ElementDecl>),
    /// xs:any
    Any {
        /// Occurrence bounds
        occurs: Occurs,
        /// Names and processing
        wildcard: WildcardDecl,
    },
}

impl ParticleDecl {
    /// Occurrence bounds of this node
    pub fn occurs(&self) -> Occurs {
        match self {
            ParticleDecl::Group { occurs, .. }
            | ParticleDecl::GroupRef { occurs, .. }
            | ParticleDecl::Any { occurs, .. } => *occurs,
            ParticleDecl::Element(e) => e.occurs,
        }
    }
}

/// xs:element, global, local or a reference
#[derive(Debug, Clone, PartialEq)]
pub struct ElementDecl {
    /// name attribute
    pub name: Option<String>,
    /// ref attribute
    pub reference: Option<QName>,
    /// Occurrence bounds (always (1, 1) for globals)
    pub occurs: Occurs,
    /// type attribute
    pub type_name: Option<QName>,
    /// Inline simple or complex type
    pub inline_type: Option<TypeDecl>,
    /// substitutionGroup attribute
    pub substitution_group: Option<QName>,
    /// nillable attribute
    pub nillable: bool,
    /// abstract attribute
    pub is_abstract: bool,
    /// default attribute
    pub default: Option<String>,
    /// fixed attribute
    pub fixed: Option<String>,
    /// block attribute
    pub block: Option<DerivationSet>,
    /// final attribute
    pub final_set: Option<DerivationSet>,
    /// form attribute; None defers to elementFormDefault
    pub qualified: Option<bool>,
    /// xs:key, xs:keyref and xs:unique children
    pub identity_constraints: Vec<IdentityDecl>,
}

impl ElementDecl {
    /// A named element with a type reference
    pub fn named(name: &str, type_name: Option<QName>) -> Self {
        Self {
            name: Some(name.to_string()),
            reference: None,
            occurs: Occurs::once(),
            type_name,
            inline_type: None,
            substitution_group: None,
            nillable: false,
            is_abstract: false,
            default: None,
            fixed: None,
            block: None,
            final_set: None,
            qualified: None,
            identity_constraints: Vec::new(),
        }
    }
}

/// xs:key, xs:keyref or xs:unique
#[derive(Debug, Clone, PartialEq)]
pub struct IdentityDecl {
    /// name attribute
    pub name: String,
    /// Which kind
    pub category: IdentityCategory,
    /// xs:selector xpath
    pub selector: String,
    /// xs:field xpaths
    pub fields: Vec<String>,
    /// refer attribute, keyrefs only
    pub refer: Option<QName>,
}

/// xs:group (named model group definition)
#[derive(Debug, Clone, PartialEq)]
pub struct GroupDecl {
    /// name attribute
    pub name: String,
    /// The compositor particle
    pub particle: Option<ParticleDecl>,
}

/// xs:attributeGroup (named attribute group definition)
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeGroupDecl {
    /// name attribute
    pub name: String,
    /// Contents
    pub attributes: AttributesDecl,
}
