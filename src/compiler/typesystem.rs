//! The compiled schema type system
//!
//! A [`SchemaTypeSystem`] owns the arenas a successful compilation
//! produced. It is immutable, can be shared between threads, and can be
//! linked into later compilations through the [`LinkedLoader`] trait.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use indexmap::IndexMap;
use serde::Serialize;

use crate::components::{
    AttributeId, ComponentLookup, ContentCategory, DerivationSet, ElementId, GlobalAttribute,
    GlobalElement, IdentityCategory, IdentityConstraint, IdentityId, SchemaType, TypeId, TypeKind,
};
use crate::error::Result;
use crate::namespaces::QName;
use crate::XSD_NAMESPACE;

use super::context::{degraded_type, CompileContext, Slot};

static NEXT_SYSTEM_ID: AtomicU64 = AtomicU64::new(1);

/// Resolves names to components of already compiled type systems
///
/// The built-in types are seeded into every compilation, so a loader only
/// answers for user-defined components.
pub trait LinkedLoader {
    /// A global type
    fn find_type(&self, name: &QName) -> Option<(&SchemaTypeSystem, TypeId)>;
    /// A global element
    fn find_element(&self, name: &QName) -> Option<(&SchemaTypeSystem, ElementId)>;
    /// A global attribute
    fn find_attribute(&self, name: &QName) -> Option<(&SchemaTypeSystem, AttributeId)>;
    /// An identity constraint
    fn find_identity(&self, name: &QName) -> Option<(&SchemaTypeSystem, IdentityId)>;
    /// Whether components of `namespace` are available (None for no namespace)
    fn has_namespace(&self, namespace: Option<&str>) -> bool;
}

/// Links nothing but the built-in types
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinLoader;

impl LinkedLoader for BuiltinLoader {
    fn find_type(&self, _name: &QName) -> Option<(&SchemaTypeSystem, TypeId)> {
        None
    }

    fn find_element(&self, _name: &QName) -> Option<(&SchemaTypeSystem, ElementId)> {
        None
    }

    fn find_attribute(&self, _name: &QName) -> Option<(&SchemaTypeSystem, AttributeId)> {
        None
    }

    fn find_identity(&self, _name: &QName) -> Option<(&SchemaTypeSystem, IdentityId)> {
        None
    }

    fn has_namespace(&self, namespace: Option<&str>) -> bool {
        namespace == Some(XSD_NAMESPACE)
    }
}

/// Several compiled type systems searched in order
#[derive(Debug, Clone, Default)]
pub struct LinkedSystems {
    systems: Vec<Arc<SchemaTypeSystem>>,
}

impl LinkedSystems {
    /// An empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a type system; earlier systems win on name clashes
    pub fn with(mut self, system: Arc<SchemaTypeSystem>) -> Self {
        self.systems.push(system);
        self
    }

    /// Add a type system
    pub fn push(&mut self, system: Arc<SchemaTypeSystem>) {
        self.systems.push(system);
    }

    /// Number of linked systems
    pub fn len(&self) -> usize {
        self.systems.len()
    }

    /// Whether no system is linked
    pub fn is_empty(&self) -> bool {
        self.systems.is_empty()
    }
}

impl LinkedLoader for LinkedSystems {
    fn find_type(&self, name: &QName) -> Option<(&SchemaTypeSystem, TypeId)> {
        self.systems.iter().find_map(|s| s.find_type(name))
    }

    fn find_element(&self, name: &QName) -> Option<(&SchemaTypeSystem, ElementId)> {
        self.systems.iter().find_map(|s| s.find_element(name))
    }

    fn find_attribute(&self, name: &QName) -> Option<(&SchemaTypeSystem, AttributeId)> {
        self.systems.iter().find_map(|s| s.find_attribute(name))
    }

    fn find_identity(&self, name: &QName) -> Option<(&SchemaTypeSystem, IdentityId)> {
        self.systems.iter().find_map(|s| s.find_identity(name))
    }

    fn has_namespace(&self, namespace: Option<&str>) -> bool {
        namespace == Some(XSD_NAMESPACE) || self.systems.iter().any(|s| s.defines_namespace(namespace))
    }
}

/// A component looked up by handle
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ComponentHandle<'s> {
    /// A type definition
    Type(&'s SchemaType),
    /// A global element declaration
    Element(&'s GlobalElement),
    /// A global attribute declaration
    Attribute(&'s GlobalAttribute),
    /// An identity constraint
    Identity(&'s IdentityConstraint),
}

/// The resolved, checked result of a compilation
#[derive(Debug)]
pub struct SchemaTypeSystem {
    id: u64,
    pub(crate) types: Vec<SchemaType>,
    pub(crate) elements: Vec<GlobalElement>,
    pub(crate) attributes: Vec<GlobalAttribute>,
    pub(crate) identities: Vec<IdentityConstraint>,
    type_names: IndexMap<QName, TypeId>,
    element_names: IndexMap<QName, ElementId>,
    attribute_names: IndexMap<QName, AttributeId>,
    identity_names: IndexMap<QName, IdentityId>,
    invalid: BTreeSet<TypeId>,
    namespaces: BTreeSet<String>,
}

impl SchemaTypeSystem {
    /// Freeze a finished compilation. Slots that never resolved are
    /// replaced by degraded stand-ins and marked invalid.
    pub(crate) fn from_context(ctx: CompileContext<'_>) -> Self {
        let mut invalid = ctx.invalid;

        let types = ctx
            .types
            .into_iter()
            .enumerate()
            .map(|(index, slot)| match slot {
                Slot::Resolved(ty) => ty,
                _ => {
                    invalid.insert(TypeId(index));
                    degraded_type(TypeId(index))
                }
            })
            .collect();

        let element_names_by_id: HashMap<ElementId, &QName> =
            ctx.element_names.iter().map(|(name, id)| (*id, name)).collect();
        let elements = ctx
            .elements
            .into_iter()
            .enumerate()
            .map(|(index, slot)| match slot {
                Slot::Resolved(element) => element,
                _ => {
                    let id = ElementId(index);
                    let name = element_names_by_id
                        .get(&id)
                        .map_or_else(|| QName::local(""), |n| (*n).clone());
                    unresolved_element(id, name)
                }
            })
            .collect();

        let attribute_names_by_id: HashMap<AttributeId, &QName> =
            ctx.attribute_names.iter().map(|(name, id)| (*id, name)).collect();
        let attributes = ctx
            .attributes
            .into_iter()
            .enumerate()
            .map(|(index, slot)| match slot {
                Slot::Resolved(attribute) => attribute,
                _ => {
                    let id = AttributeId(index);
                    GlobalAttribute {
                        id,
                        name: attribute_names_by_id
                            .get(&id)
                            .map_or_else(|| QName::local(""), |n| (*n).clone()),
                        type_id: TypeId::ANY_SIMPLE_TYPE,
                        attribute_type: TypeId::ANY_TYPE,
                        default: None,
                        fixed: None,
                        location: None,
                    }
                }
            })
            .collect();

        let identity_names_by_id: HashMap<IdentityId, &QName> =
            ctx.identity_names.iter().map(|(name, id)| (*id, name)).collect();
        let identities = ctx
            .identities
            .into_iter()
            .enumerate()
            .map(|(index, slot)| match slot {
                Slot::Resolved(identity) => identity,
                _ => {
                    let id = IdentityId(index);
                    IdentityConstraint {
                        id,
                        name: identity_names_by_id
                            .get(&id)
                            .map_or_else(|| QName::local(""), |n| (*n).clone()),
                        category: IdentityCategory::Unique,
                        selector: String::new(),
                        fields: Vec::new(),
                        referenced: None,
                        location: None,
                    }
                }
            })
            .collect();

        Self {
            id: NEXT_SYSTEM_ID.fetch_add(1, Ordering::Relaxed),
            types,
            elements,
            attributes,
            identities,
            type_names: ctx.type_names,
            element_names: ctx.element_names,
            attribute_names: ctx.attribute_names,
            identity_names: ctx.identity_names,
            invalid,
            namespaces: ctx.namespaces,
        }
    }

    /// Process-unique identity of this type system
    pub fn system_id(&self) -> u64 {
        self.id
    }

    /// Whether a type passed every check
    pub fn is_valid(&self, id: TypeId) -> bool {
        !self.invalid.contains(&id)
    }

    /// Types that failed a check or were degraded
    pub fn invalid_types(&self) -> impl Iterator<Item = TypeId> + '_ {
        self.invalid.iter().copied()
    }

    /// Namespaces defined by the compiled documents ("" for none)
    pub fn namespaces(&self) -> impl Iterator<Item = &str> {
        self.namespaces.iter().map(String::as_str)
    }

    /// Whether the compiled documents define `namespace`
    pub fn defines_namespace(&self, namespace: Option<&str>) -> bool {
        self.namespaces.contains(namespace.unwrap_or(""))
    }

    /// Look up a global type by name; built-in types included
    pub fn find_type(&self, name: &QName) -> Option<(&SchemaTypeSystem, TypeId)> {
        self.type_names.get(name).map(|id| (self, *id))
    }

    /// Look up a global element by name
    pub fn find_element(&self, name: &QName) -> Option<(&SchemaTypeSystem, ElementId)> {
        self.element_names.get(name).map(|id| (self, *id))
    }

    /// Look up a global attribute by name
    pub fn find_attribute(&self, name: &QName) -> Option<(&SchemaTypeSystem, AttributeId)> {
        self.attribute_names.get(name).map(|id| (self, *id))
    }

    /// Look up an identity constraint by name
    pub fn find_identity(&self, name: &QName) -> Option<(&SchemaTypeSystem, IdentityId)> {
        self.identity_names.get(name).map(|id| (self, *id))
    }

    /// A global type definition by name
    pub fn global_type(&self, name: &QName) -> Option<&SchemaType> {
        self.type_names.get(name).and_then(|id| self.types.get(id.0))
    }

    /// A global element declaration by name
    pub fn global_element(&self, name: &QName) -> Option<&GlobalElement> {
        self.element_names.get(name).and_then(|id| self.elements.get(id.0))
    }

    /// A global attribute declaration by name
    pub fn global_attribute(&self, name: &QName) -> Option<&GlobalAttribute> {
        self.attribute_names.get(name).and_then(|id| self.attributes.get(id.0))
    }

    /// An identity constraint by name
    pub fn identity_constraint(&self, name: &QName) -> Option<&IdentityConstraint> {
        self.identity_names.get(name).and_then(|id| self.identities.get(id.0))
    }

    /// A type by id
    pub fn type_by_id(&self, id: TypeId) -> Option<&SchemaType> {
        self.types.get(id.0)
    }

    /// A global element by id
    pub fn element_by_id(&self, id: ElementId) -> Option<&GlobalElement> {
        self.elements.get(id.0)
    }

    /// A global attribute by id
    pub fn attribute_by_id(&self, id: AttributeId) -> Option<&GlobalAttribute> {
        self.attributes.get(id.0)
    }

    /// An identity constraint by id
    pub fn identity_by_id(&self, id: IdentityId) -> Option<&IdentityConstraint> {
        self.identities.get(id.0)
    }

    /// Names of the user-defined global types, in declaration order
    pub fn global_types(&self) -> impl Iterator<Item = (&QName, &SchemaType)> {
        self.type_names
            .iter()
            .filter_map(|(name, id)| self.types.get(id.0).filter(|t| !t.is_builtin()).map(|t| (name, t)))
    }

    /// The global elements, in declaration order
    pub fn global_elements(&self) -> impl Iterator<Item = &GlobalElement> {
        self.element_names.values().filter_map(|id| self.elements.get(id.0))
    }

    /// The global attributes, in declaration order
    pub fn global_attributes(&self) -> impl Iterator<Item = &GlobalAttribute> {
        self.attribute_names.values().filter_map(|id| self.attributes.get(id.0))
    }

    /// The synthetic type of a standalone instance of a global element
    pub fn document_type(&self, element: &QName) -> Option<&SchemaType> {
        self.global_element(element)
            .and_then(|e| self.types.get(e.document_type.0))
    }

    /// Every type, built-in, anonymous and synthetic ones included
    pub fn all_types(&self) -> &[SchemaType] {
        &self.types
    }

    /// Load a component by handle
    ///
    /// Handles are `type:{ns}local`, `element:{ns}local`,
    /// `attribute:{ns}local` and `identity:{ns}local` for named
    /// components, and `type#N`, `element#N`, `attribute#N`, `identity#N`
    /// for arena positions (the form ids display as).
    pub fn resolve_handle(&self, handle: &str) -> Option<ComponentHandle<'_>> {
        if let Some((kind, position)) = handle.split_once('#') {
            let index: usize = position.parse().ok()?;
            return match kind {
                "type" => self.types.get(index).map(ComponentHandle::Type),
                "element" => self.elements.get(index).map(ComponentHandle::Element),
                "attribute" => self.attributes.get(index).map(ComponentHandle::Attribute),
                "identity" => self.identities.get(index).map(ComponentHandle::Identity),
                _ => None,
            };
        }
        let (kind, name) = handle.split_once(':')?;
        let name = parse_clark_name(name)?;
        match kind {
            "type" => self.global_type(&name).map(ComponentHandle::Type),
            "element" => self.global_element(&name).map(ComponentHandle::Element),
            "attribute" => self.global_attribute(&name).map(ComponentHandle::Attribute),
            "identity" => self.identity_constraint(&name).map(ComponentHandle::Identity),
            _ => None,
        }
    }

    /// Handle of a named global type
    pub fn type_handle(name: &QName) -> String {
        format!("type:{}", name)
    }

    /// A serializable overview of the user-defined components
    pub fn summary(&self) -> TypeSystemSummary {
        let type_name = |id: TypeId| {
            self.types
                .get(id.0)
                .map_or_else(|| id.to_string(), SchemaType::display_name)
        };
        TypeSystemSummary {
            namespaces: self.namespaces.iter().cloned().collect(),
            types: self
                .global_types()
                .map(|(name, ty)| TypeSummary {
                    name: name.to_string(),
                    kind: ty.kind,
                    content: (ty.kind == TypeKind::Complex).then_some(ty.content),
                    base: ty.base.map(type_name),
                    derivation: ty.base.map(|_| ty.derivation.to_string()),
                    content_model: ty.particle.as_ref().map(|p| p.describe()),
                    attributes: ty.attributes.uses.keys().map(QName::to_string).collect(),
                    valid: self.is_valid(ty.id),
                })
                .collect(),
            elements: self
                .global_elements()
                .map(|e| ElementSummary {
                    name: e.name.to_string(),
                    type_name: type_name(e.type_id),
                    substitution_group: e
                        .substitution_group
                        .and_then(|h| self.elements.get(h.0))
                        .map(|h| h.name.to_string()),
                    substitution_members: e.substitution_members.iter().map(QName::to_string).collect(),
                    identity_constraints: e
                        .identity_constraints
                        .iter()
                        .filter_map(|id| self.identities.get(id.0))
                        .map(|ic| format!("{} {}", ic.category, ic.name))
                        .collect(),
                    valid: self.is_valid(e.document_type),
                })
                .collect(),
            attributes: self
                .global_attributes()
                .map(|a| AttributeSummary {
                    name: a.name.to_string(),
                    type_name: type_name(a.type_id),
                })
                .collect(),
            invalid_types: self.invalid.iter().map(|id| type_name(*id)).collect(),
        }
    }

    /// The summary as pretty-printed JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.summary())?)
    }
}

impl LinkedLoader for SchemaTypeSystem {
    fn find_type(&self, name: &QName) -> Option<(&SchemaTypeSystem, TypeId)> {
        SchemaTypeSystem::find_type(self, name)
    }

    fn find_element(&self, name: &QName) -> Option<(&SchemaTypeSystem, ElementId)> {
        SchemaTypeSystem::find_element(self, name)
    }

    fn find_attribute(&self, name: &QName) -> Option<(&SchemaTypeSystem, AttributeId)> {
        SchemaTypeSystem::find_attribute(self, name)
    }

    fn find_identity(&self, name: &QName) -> Option<(&SchemaTypeSystem, IdentityId)> {
        SchemaTypeSystem::find_identity(self, name)
    }

    fn has_namespace(&self, namespace: Option<&str>) -> bool {
        namespace == Some(XSD_NAMESPACE) || self.defines_namespace(namespace)
    }
}

impl ComponentLookup for SchemaTypeSystem {
    fn lookup_type(&self, id: TypeId) -> Option<&SchemaType> {
        self.types.get(id.0)
    }

    fn lookup_element(&self, id: ElementId) -> Option<&GlobalElement> {
        self.elements.get(id.0)
    }
}

fn unresolved_element(id: ElementId, name: QName) -> GlobalElement {
    GlobalElement {
        id,
        name,
        type_id: TypeId::ANY_TYPE,
        document_type: TypeId::ANY_TYPE,
        nillable: false,
        default: None,
        fixed: None,
        is_abstract: false,
        block: DerivationSet::default(),
        final_set: DerivationSet::default(),
        substitution_group: None,
        substitution_members: Default::default(),
        identity_constraints: Vec::new(),
        location: None,
    }
}

/// Parse `{namespace}local` or a bare `local`
fn parse_clark_name(text: &str) -> Option<QName> {
    match text.strip_prefix('{') {
        Some(rest) => {
            let (namespace, local) = rest.split_once('}')?;
            (!local.is_empty()).then(|| QName::new(Some(namespace.to_string()), local))
        }
        None => (!text.is_empty()).then(|| QName::local(text)),
    }
}

/// Overview of a compiled type system
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TypeSystemSummary {
    /// Namespaces the compiled documents define
    pub namespaces: Vec<String>,
    /// Global type definitions
    pub types: Vec<TypeSummary>,
    /// Global element declarations
    pub elements: Vec<ElementSummary>,
    /// Global attribute declarations
    pub attributes: Vec<AttributeSummary>,
    /// Names of the types that failed a check
    pub invalid_types: Vec<String>,
}

/// Overview of one global type
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TypeSummary {
    /// Qualified name
    pub name: String,
    /// Simple or complex
    pub kind: TypeKind,
    /// Content category of a complex type
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<ContentCategory>,
    /// Base type name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base: Option<String>,
    /// Derivation method from the base
    #[serde(skip_serializing_if = "Option::is_none")]
    pub derivation: Option<String>,
    /// The content model
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_model: Option<String>,
    /// Attribute use names
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<String>,
    /// Whether the type passed every check
    pub valid: bool,
}

/// Overview of one global element
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ElementSummary {
    /// Qualified name
    pub name: String,
    /// Declared type name
    #[serde(rename = "type")]
    pub type_name: String,
    /// Substitution group head
    #[serde(skip_serializing_if = "Option::is_none")]
    pub substitution_group: Option<String>,
    /// Elements that may substitute for this one
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub substitution_members: Vec<String>,
    /// Identity constraints
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub identity_constraints: Vec<String>,
    /// Whether the element's document type is usable
    pub valid: bool,
}

/// Overview of one global attribute
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttributeSummary {
    /// Qualified name
    pub name: String,
    /// Declared type name
    #[serde(rename = "type")]
    pub type_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::CompileOptions;

    fn builtin_system() -> SchemaTypeSystem {
        let options = CompileOptions::default();
        SchemaTypeSystem::from_context(CompileContext::new(&options, &BuiltinLoader))
    }

    #[test]
    fn test_clark_names() {
        assert_eq!(parse_clark_name("{urn:a}T"), Some(QName::namespaced("urn:a", "T")));
        assert_eq!(parse_clark_name("T"), Some(QName::local("T")));
        assert_eq!(parse_clark_name("{}T"), Some(QName::local("T")));
        assert_eq!(parse_clark_name("{urn:a}"), None);
        assert_eq!(parse_clark_name("{urn:a"), None);
    }

    #[test]
    fn test_builtin_handles() {
        let system = builtin_system();
        let handle = format!("type:{{{}}}int", XSD_NAMESPACE);
        match system.resolve_handle(&handle) {
            Some(ComponentHandle::Type(ty)) => {
                assert_eq!(ty.name, Some(QName::namespaced(XSD_NAMESPACE, "int")))
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(
            system.resolve_handle("type#0"),
            Some(ComponentHandle::Type(ty)) if ty.is_any_type()
        ));
        assert!(system.resolve_handle("element#0").is_none());
        assert!(system.resolve_handle("widget:T").is_none());
        assert!(system.resolve_handle("type#x").is_none());
    }

    #[test]
    fn test_system_ids_are_distinct() {
        let a = builtin_system();
        let b = builtin_system();
        assert_ne!(a.system_id(), b.system_id());
        assert_eq!(a.global_types().count(), 0);
    }
}
