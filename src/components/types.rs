//! Type definitions
//!
//! A [`SchemaType`] is the frozen, resolved form of one simple or complex
//! type definition. Types are produced once by the resolver and never
//! mutated afterwards; derivation questions are answered by walking base
//! links through a [`ComponentLookup`].

use std::collections::HashSet;
use std::fmt;

use indexmap::IndexMap;

use crate::namespaces::QName;
use crate::qnameset::QNameSet;

use super::facets::FacetSet;
use super::particles::SchemaParticle;
use super::wildcards::Wildcard;
use super::{AttributeId, ComponentLookup, ElementId, TypeId};

/// Derivation method for types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DerivationMethod {
    /// Type derived by restriction
    #[default]
    Restriction,
    /// Type derived by extension
    Extension,
}

impl DerivationMethod {
    /// Parse from string
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "restriction" => Some(Self::Restriction),
            "extension" => Some(Self::Extension),
            _ => None,
        }
    }
}

impl fmt::Display for DerivationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Restriction => write!(f, "restriction"),
            Self::Extension => write!(f, "extension"),
        }
    }
}

/// Content category of a type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContentCategory {
    /// No content (empty element)
    Empty,
    /// Simple content (text only)
    Simple,
    /// Mixed content (text and elements)
    Mixed,
    /// Element-only content
    ElementOnly,
}

impl fmt::Display for ContentCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Empty => "empty",
            Self::Simple => "simple",
            Self::Mixed => "mixed",
            Self::ElementOnly => "element-only",
        };
        write!(f, "{}", s)
    }
}

/// Block/final derivation flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct DerivationSet {
    /// Block/finalize extension
    pub extension: bool,
    /// Block/finalize restriction
    pub restriction: bool,
    /// Block substitution
    pub substitution: bool,
    /// Finalize derivation by list
    pub list: bool,
    /// Finalize derivation by union
    pub union: bool,
}

impl DerivationSet {
    /// Every flag set
    pub fn all() -> Self {
        Self {
            extension: true,
            restriction: true,
            substitution: true,
            list: true,
            union: true,
        }
    }

    /// Parse from attribute value
    ///
    /// `#all` sets only the flags in `applicable`, so that `block="#all"` on
    /// a complex type does not claim to block list derivation.
    pub fn from_attr(value: &str, applicable: DerivationSet) -> Self {
        let mut flags = DerivationSet::default();
        for token in value.split_whitespace() {
            match token {
                "#all" => return applicable,
                "extension" => flags.extension = true,
                "restriction" => flags.restriction = true,
                "substitution" => flags.substitution = true,
                "list" => flags.list = true,
                "union" => flags.union = true,
                _ => {}
            }
        }
        flags.intersect(&applicable)
    }

    /// Flags meaningful on a complex type's block/final or an element's final
    pub fn complex() -> Self {
        Self {
            extension: true,
            restriction: true,
            ..Self::default()
        }
    }

    /// Flags meaningful on a simple type's final
    pub fn simple() -> Self {
        Self {
            restriction: true,
            list: true,
            union: true,
            ..Self::default()
        }
    }

    /// Flags meaningful on an element's block
    pub fn element_block() -> Self {
        Self {
            extension: true,
            restriction: true,
            substitution: true,
            ..Self::default()
        }
    }

    /// Flags set in both
    pub fn intersect(&self, other: &DerivationSet) -> DerivationSet {
        DerivationSet {
            extension: self.extension && other.extension,
            restriction: self.restriction && other.restriction,
            substitution: self.substitution && other.substitution,
            list: self.list && other.list,
            union: self.union && other.union,
        }
    }

    /// Flags set in either
    pub fn union_with(&self, other: &DerivationSet) -> DerivationSet {
        DerivationSet {
            extension: self.extension || other.extension,
            restriction: self.restriction || other.restriction,
            substitution: self.substitution || other.substitution,
            list: self.list || other.list,
            union: self.union || other.union,
        }
    }

    /// Whether every flag of `other` is also set here
    pub fn contains_all(&self, other: &DerivationSet) -> bool {
        self.union_with(other) == *self
    }

    /// Whether no flag is set
    pub fn is_empty(&self) -> bool {
        *self == DerivationSet::default()
    }

    /// Check if a derivation method is blocked
    pub fn is_blocked(&self, method: DerivationMethod) -> bool {
        match method {
            DerivationMethod::Restriction => self.restriction,
            DerivationMethod::Extension => self.extension,
        }
    }

    /// The set with only `method` flagged
    pub fn of(method: DerivationMethod) -> Self {
        let mut set = DerivationSet::default();
        match method {
            DerivationMethod::Restriction => set.restriction = true,
            DerivationMethod::Extension => set.extension = true,
        }
        set
    }
}

impl fmt::Display for DerivationSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut tokens = Vec::new();
        if self.extension {
            tokens.push("extension");
        }
        if self.restriction {
            tokens.push("restriction");
        }
        if self.substitution {
            tokens.push("substitution");
        }
        if self.list {
            tokens.push("list");
        }
        if self.union {
            tokens.push("union");
        }
        write!(f, "{}", tokens.join(" "))
    }
}

/// Simple or complex
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeKind {
    /// Simple type
    Simple,
    /// Complex type
    Complex,
}

/// Variety of a simple type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SimpleVariety {
    /// Single value of a primitive value space
    Atomic,
    /// Whitespace separated items
    List,
    /// Value of one of the member types
    Union,
}

/// Why a type exists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeRole {
    /// A built-in type
    Builtin,
    /// A type defined in a schema document, named or anonymous
    Declared,
    /// The synthetic type of a standalone instance of a global element
    Document(ElementId),
    /// The synthetic type of a standalone global attribute
    Attribute(AttributeId),
}

/// One attribute use in a type's attribute model
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeUse {
    /// Attribute name
    pub name: QName,
    /// Declared simple type
    pub type_id: TypeId,
    /// Whether the attribute must be present
    pub required: bool,
    /// Default value
    pub default: Option<String>,
    /// Fixed value
    pub fixed: Option<String>,
    /// The global declaration, when the use is a reference
    pub global: Option<AttributeId>,
}

impl AttributeUse {
    /// The value constraint, if any
    pub fn value_constraint(&self) -> Option<&str> {
        self.fixed.as_deref().or(self.default.as_deref())
    }
}

/// Attribute uses plus the attribute wildcard
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttributeModel {
    /// Attribute uses by name, in declaration order
    pub uses: IndexMap<QName, AttributeUse>,
    /// The attribute wildcard (xs:anyAttribute)
    pub wildcard: Option<Wildcard>,
}

impl AttributeModel {
    /// Whether the model declares nothing
    pub fn is_empty(&self) -> bool {
        self.uses.is_empty() && self.wildcard.is_none()
    }

    /// Look up an attribute use
    pub fn get(&self, name: &QName) -> Option<&AttributeUse> {
        self.uses.get(name)
    }
}

/// Value space information for a simple type (or simple content)
#[derive(Debug, Clone, PartialEq)]
pub struct SimpleInfo {
    /// Variety
    pub variety: SimpleVariety,
    /// Nearest built-in ancestor for atomic types, e.g. "int"
    pub builtin: &'static str,
    /// Effective facets accumulated along the restriction chain
    pub facets: FacetSet,
    /// Item type, for lists
    pub item_type: Option<TypeId>,
    /// Member types, for unions
    pub member_types: Vec<TypeId>,
}

impl SimpleInfo {
    /// Atomic value space of a built-in type
    pub fn atomic(builtin: &'static str, facets: FacetSet) -> Self {
        Self {
            variety: SimpleVariety::Atomic,
            builtin,
            facets,
            item_type: None,
            member_types: Vec::new(),
        }
    }
}

/// A resolved type definition
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaType {
    /// Position in the arena
    pub id: TypeId,
    /// Qualified name; None for anonymous types
    pub name: Option<QName>,
    /// Simple or complex
    pub kind: TypeKind,
    /// Why the type exists
    pub role: TypeRole,
    /// Base type; None only for xs:anyType
    pub base: Option<TypeId>,
    /// How the type derives from its base
    pub derivation: DerivationMethod,
    /// Content category (simple types have simple content)
    pub content: ContentCategory,
    /// Content model, normalized; None when there are no particles
    pub particle: Option<SchemaParticle>,
    /// Attribute uses and wildcard
    pub attributes: AttributeModel,
    /// Union of the element wildcards in the content model
    pub wildcard_summary: Option<QNameSet>,
    /// Value space, for simple types and complex types with simple content
    pub simple: Option<SimpleInfo>,
    /// Anonymous types defined inside this one
    pub anonymous_types: Vec<TypeId>,
    /// Enclosing type, for anonymous types
    pub outer: Option<TypeId>,
    /// Whether the type is abstract
    pub is_abstract: bool,
    /// Derivations disallowed from this type
    pub final_set: DerivationSet,
    /// Substitutions disallowed for this type
    pub block: DerivationSet,
    /// Source document location
    pub location: Option<String>,
}

impl SchemaType {
    /// Whether this is xs:anyType
    pub fn is_any_type(&self) -> bool {
        self.base.is_none()
    }

    /// Whether this is a simple type
    pub fn is_simple(&self) -> bool {
        self.kind == TypeKind::Simple
    }

    /// Whether this is a built-in type
    pub fn is_builtin(&self) -> bool {
        self.role == TypeRole::Builtin
    }

    /// Whether instances may contain character data
    pub fn allows_text(&self) -> bool {
        matches!(self.content, ContentCategory::Simple | ContentCategory::Mixed)
    }

    /// Whether the content model can match nothing
    pub fn is_emptiable(&self) -> bool {
        self.particle.as_ref().map_or(true, SchemaParticle::is_emptiable)
    }

    /// Display name, falling back to the arena id for anonymous types
    pub fn display_name(&self) -> String {
        match &self.name {
            Some(name) => name.to_string(),
            None => format!("anonymous {}", self.id),
        }
    }
}

/// Base chain of `id`, starting with `id` itself
pub fn base_chain<L: ComponentLookup + ?Sized>(lookup: &L, id: TypeId) -> Vec<TypeId> {
    let mut chain = Vec::new();
    let mut seen = HashSet::new();
    let mut current = Some(id);
    while let Some(type_id) = current {
        if !seen.insert(type_id) {
            break;
        }
        chain.push(type_id);
        current = lookup.lookup_type(type_id).and_then(|t| t.base);
    }
    chain
}

/// The derivation methods used on the way from `derived` up to `base`, or
/// None when `derived` does not derive from `base`
///
/// A union type is also reached from any of its members (by restriction);
/// list and union steps flag `list` and `union`.
pub fn derivation_steps<L: ComponentLookup + ?Sized>(
    lookup: &L,
    derived: TypeId,
    base: TypeId,
) -> Option<DerivationSet> {
    let mut methods = DerivationSet::default();
    for type_id in base_chain(lookup, derived) {
        if type_id == base {
            return Some(methods);
        }
        let Some(ty) = lookup.lookup_type(type_id) else {
            return None;
        };
        if ty.base.is_some() {
            methods = methods.union_with(&DerivationSet::of(ty.derivation));
        }
        if let Some(simple) = &ty.simple {
            match simple.variety {
                SimpleVariety::List if ty.is_simple() => methods.list = true,
                SimpleVariety::Union if ty.is_simple() => methods.union = true,
                _ => {}
            }
        }
    }
    // a member of a union validly derives from the union
    let base_type = lookup.lookup_type(base)?;
    let members = base_type
        .simple
        .as_ref()
        .filter(|s| s.variety == SimpleVariety::Union)
        .map(|s| s.member_types.clone())
        .unwrap_or_default();
    members
        .into_iter()
        .filter(|member| *member != base)
        .find_map(|member| derivation_steps(lookup, derived, member))
        .map(|steps| {
            let mut steps = steps;
            steps.restriction = true;
            steps
        })
}

/// Whether `derived` derives from `base` by any combination of methods
pub fn is_derived_from<L: ComponentLookup + ?Sized>(lookup: &L, derived: TypeId, base: TypeId) -> bool {
    derivation_steps(lookup, derived, base).is_some()
}

/// Whether `derived` derives from `base` through restriction steps only
pub fn is_restriction_derived<L: ComponentLookup + ?Sized>(
    lookup: &L,
    derived: TypeId,
    base: TypeId,
) -> bool {
    match derivation_steps(lookup, derived, base) {
        Some(steps) => !steps.extension,
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derivation_set_from_attr() {
        let all = DerivationSet::from_attr("#all", DerivationSet::complex());
        assert!(all.extension && all.restriction);
        assert!(!all.list && !all.substitution);

        let some = DerivationSet::from_attr("restriction substitution", DerivationSet::element_block());
        assert!(some.restriction && some.substitution && !some.extension);

        let filtered = DerivationSet::from_attr("list", DerivationSet::complex());
        assert!(filtered.is_empty());
    }

    #[test]
    fn test_derivation_set_algebra() {
        let ext = DerivationSet::of(DerivationMethod::Extension);
        let res = DerivationSet::of(DerivationMethod::Restriction);
        let both = ext.union_with(&res);
        assert!(both.contains_all(&ext));
        assert!(!ext.contains_all(&both));
        assert!(both.is_blocked(DerivationMethod::Restriction));
        assert_eq!(ext.intersect(&res), DerivationSet::default());
        assert_eq!(both.to_string(), "extension restriction");
    }

    #[test]
    fn test_content_category_display() {
        assert_eq!(ContentCategory::ElementOnly.to_string(), "element-only");
        assert_eq!(ContentCategory::Mixed.to_string(), "mixed");
    }
}
