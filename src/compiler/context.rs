//! Compilation context
//!
//! Everything one compilation mutates lives in [`CompileContext`]: the
//! component arenas, the global name tables, the diagnostics and the
//! bookkeeping for linked components. It is created by `compile`, threaded
//! by reference through every pass and consumed when the type system is
//! frozen. Nothing in it is shared between compilations.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::rc::Rc;

use indexmap::IndexMap;
use tracing::warn;

use crate::components::builtins::{self, BuiltinType, BUILTIN_TYPES};
use crate::components::{
    AttributeId, AttributeModel, ComponentLookup, ContentCategory, DerivationMethod,
    DerivationSet, ElementId, FacetSet, GlobalAttribute, GlobalElement, IdentityConstraint,
    IdentityId, Occurs, ProcessContents, SchemaParticle, SchemaType, SimpleInfo, SimpleVariety,
    TypeId, TypeKind, TypeRole, Wildcard, WildcardParticle,
};
use crate::error::{CompileError, ErrorCategory, Severity};
use crate::namespaces::QName;
use crate::parsing::{AttributeDecl, AttributeGroupDecl, ElementDecl, GroupDecl, IdentityDecl, TypeDecl};
use crate::qnameset::QNameSet;
use crate::XSD_NAMESPACE;

use super::typesystem::LinkedLoader;
use super::CompileOptions;

/// Resolution state of one arena entry
///
/// A slot is taken out of `Pending` exactly once. Finding a slot in
/// `Resolving` while resolving it again means the component depends on
/// itself.
#[derive(Debug)]
pub(crate) enum Slot<B, T> {
    /// Declared but not resolved yet
    Pending(B),
    /// Resolution in progress
    Resolving,
    /// Resolved and frozen
    Resolved(T),
}

impl<B, T> Slot<B, T> {
    pub(crate) fn resolved(&self) -> Option<&T> {
        match self {
            Slot::Resolved(value) => Some(value),
            _ => None,
        }
    }

    pub(crate) fn resolved_mut(&mut self) -> Option<&mut T> {
        match self {
            Slot::Resolved(value) => Some(value),
            _ => None,
        }
    }
}

/// The document a declaration came from, as far as name resolution cares
#[derive(Debug, Clone, Default)]
pub(crate) struct Scope {
    /// Effective target namespace
    pub namespace: Option<String>,
    /// Whether the document has no namespace of its own and was pulled
    /// into `namespace` by include or redefine
    pub chameleon: bool,
    pub element_qualified: bool,
    pub attribute_qualified: bool,
    pub block_default: DerivationSet,
    pub final_default: DerivationSet,
    pub location: Option<String>,
}

impl Scope {
    /// A reference as written in this document, with no-namespace names of
    /// a chameleon document moved into its effective namespace
    pub(crate) fn qualify(&self, name: &QName) -> QName {
        if self.chameleon && name.namespace.is_none() {
            name.with_namespace(self.namespace.as_deref())
        } else {
            name.clone()
        }
    }

    /// Name of a top-level component declared in this document
    pub(crate) fn global_name(&self, local: &str) -> QName {
        QName::new(self.namespace.clone(), local)
    }

    /// Name of a local element declaration
    pub(crate) fn element_name(&self, local: &str, qualified: Option<bool>) -> QName {
        if qualified.unwrap_or(self.element_qualified) {
            self.global_name(local)
        } else {
            QName::local(local)
        }
    }

    /// Name of a local attribute declaration
    pub(crate) fn attribute_name(&self, local: &str, qualified: Option<bool>) -> QName {
        if qualified.unwrap_or(self.attribute_qualified) {
            self.global_name(local)
        } else {
            QName::local(local)
        }
    }
}

/// How a type slot is to be built
#[derive(Debug)]
pub(crate) enum TypeBuilder {
    /// A type defined in a schema document
    Declared {
        decl: TypeDecl,
        scope: Rc<Scope>,
        name: Option<QName>,
        outer: Option<TypeId>,
        /// The redefined original, for a redefining type
        original: Option<TypeId>,
    },
    /// Wrapper type of a standalone instance of a global element
    Document { element: ElementId },
    /// Wrapper type of a standalone global attribute
    Attribute { attribute: AttributeId },
}

/// A global element declaration waiting for resolution
#[derive(Debug)]
pub(crate) struct ElementEntry {
    pub decl: ElementDecl,
    pub scope: Rc<Scope>,
}

/// A global attribute declaration waiting for resolution
#[derive(Debug)]
pub(crate) struct AttributeEntry {
    pub decl: AttributeDecl,
    pub scope: Rc<Scope>,
}

/// An identity constraint waiting for resolution
#[derive(Debug)]
pub(crate) struct IdentityEntry {
    pub decl: IdentityDecl,
    pub scope: Rc<Scope>,
}

/// A named model group definition
#[derive(Debug)]
pub(crate) struct GroupEntry {
    pub name: QName,
    pub decl: GroupDecl,
    pub scope: Rc<Scope>,
    /// The redefined original, for a redefining group
    pub original: Option<usize>,
}

/// A named attribute group definition
#[derive(Debug)]
pub(crate) struct AttributeGroupEntry {
    pub name: QName,
    pub decl: AttributeGroupDecl,
    pub scope: Rc<Scope>,
    /// The redefined original, for a redefining attribute group
    pub original: Option<usize>,
}

/// Expanded attribute group contents
#[derive(Debug, Clone, Default)]
pub(crate) struct ExpandedAttributes {
    pub model: AttributeModel,
    pub prohibited: Vec<QName>,
}

pub(crate) type TypeSlot = Slot<TypeBuilder, SchemaType>;
pub(crate) type ElementSlot = Slot<ElementEntry, GlobalElement>;
pub(crate) type AttributeSlot = Slot<AttributeEntry, GlobalAttribute>;
pub(crate) type IdentitySlot = Slot<IdentityEntry, IdentityConstraint>;

/// Components copied in from linked type systems, keyed by
/// (system id, foreign index)
#[derive(Debug, Default)]
pub(crate) struct ForeignMap {
    pub types: HashMap<(u64, TypeId), TypeId>,
    pub elements: HashMap<(u64, ElementId), ElementId>,
    pub attributes: HashMap<(u64, AttributeId), AttributeId>,
    pub identities: HashMap<(u64, IdentityId), IdentityId>,
    /// Local indices of every copied type
    pub copied_types: HashSet<TypeId>,
    /// Local indices of every copied element
    pub copied_elements: HashSet<ElementId>,
}

/// The mutable state of one compilation
pub(crate) struct CompileContext<'a> {
    pub options: &'a CompileOptions,
    pub linked: &'a dyn LinkedLoader,
    pub errors: Vec<CompileError>,

    pub types: Vec<TypeSlot>,
    pub type_names: IndexMap<QName, TypeId>,
    pub elements: Vec<ElementSlot>,
    pub element_names: IndexMap<QName, ElementId>,
    pub attributes: Vec<AttributeSlot>,
    pub attribute_names: IndexMap<QName, AttributeId>,
    pub identities: Vec<IdentitySlot>,
    pub identity_names: IndexMap<QName, IdentityId>,

    pub groups: Vec<GroupEntry>,
    pub group_names: HashMap<QName, usize>,
    pub attribute_groups: Vec<AttributeGroupEntry>,
    pub attribute_group_names: HashMap<QName, usize>,
    /// Expanded model groups; None marks a group that failed to expand
    pub group_cache: HashMap<usize, Option<SchemaParticle>>,
    pub group_stack: Vec<usize>,
    pub attribute_group_cache: HashMap<usize, ExpandedAttributes>,
    pub attribute_group_stack: Vec<usize>,

    /// Types that failed a check or were degraded
    pub invalid: BTreeSet<TypeId>,
    pub foreign: ForeignMap,
    /// Namespaces the compiled documents define ("" for none)
    pub namespaces: BTreeSet<String>,
}

impl<'a> CompileContext<'a> {
    /// A fresh context with the built-in types seeded
    pub(crate) fn new(options: &'a CompileOptions, linked: &'a dyn LinkedLoader) -> Self {
        let mut ctx = Self {
            options,
            linked,
            errors: Vec::new(),
            types: Vec::with_capacity(BUILTIN_TYPES.len()),
            type_names: IndexMap::new(),
            elements: Vec::new(),
            element_names: IndexMap::new(),
            attributes: Vec::new(),
            attribute_names: IndexMap::new(),
            identities: Vec::new(),
            identity_names: IndexMap::new(),
            groups: Vec::new(),
            group_names: HashMap::new(),
            attribute_groups: Vec::new(),
            attribute_group_names: HashMap::new(),
            group_cache: HashMap::new(),
            group_stack: Vec::new(),
            attribute_group_cache: HashMap::new(),
            attribute_group_stack: Vec::new(),
            invalid: BTreeSet::new(),
            foreign: ForeignMap::default(),
            namespaces: BTreeSet::new(),
        };
        for (index, builtin) in BUILTIN_TYPES.iter().enumerate() {
            let ty = builtin_type(TypeId(index), builtin);
            ctx.type_names
                .insert(QName::namespaced(XSD_NAMESPACE, builtin.name), TypeId(index));
            ctx.types.push(Slot::Resolved(ty));
        }
        ctx
    }

    /// Record a diagnostic
    pub(crate) fn record(&mut self, error: CompileError) {
        if error.is_fatal() {
            warn!(category = %error.category, "{}", error);
        }
        self.errors.push(error);
    }

    /// Record a diagnostic against a component in a document
    pub(crate) fn report(
        &mut self,
        category: ErrorCategory,
        message: impl Into<String>,
        scope: &Scope,
        component: Option<String>,
    ) {
        let mut error = CompileError::new(category, message);
        if let Some(location) = &scope.location {
            error = error.with_location(location.clone());
        }
        if let Some(component) = component {
            error = error.with_component(component);
        }
        self.record(error);
    }

    /// Record a reference that could not be resolved. In partial mode the
    /// diagnostic is recoverable and the caller's fallback stands in.
    pub(crate) fn unresolved(&mut self, kind: &str, name: &QName, scope: &Scope, component: Option<String>) {
        let severity = if self.options.partial {
            Severity::Recoverable
        } else {
            Severity::Error
        };
        let mut error = CompileError::new(
            ErrorCategory::Reference,
            format!("{} '{}' is not defined", kind, name),
        )
        .with_severity(severity);
        if let Some(location) = &scope.location {
            error = error.with_location(location.clone());
        }
        if let Some(component) = component {
            error = error.with_component(component);
        }
        self.record(error);
    }

    /// Whether any error-severity diagnostic has been recorded
    pub(crate) fn has_fatal_errors(&self) -> bool {
        self.errors.iter().any(CompileError::is_fatal)
    }

    /// Reserve a type slot
    pub(crate) fn push_type(&mut self, slot: TypeSlot) -> TypeId {
        self.types.push(slot);
        TypeId(self.types.len() - 1)
    }

    /// Allocate an anonymous type declared inside `outer`
    pub(crate) fn push_anonymous(&mut self, decl: TypeDecl, scope: &Rc<Scope>, outer: Option<TypeId>) -> TypeId {
        self.push_type(Slot::Pending(TypeBuilder::Declared {
            decl,
            scope: Rc::clone(scope),
            name: None,
            outer,
            original: None,
        }))
    }

    /// Register an identity constraint declared on an element
    pub(crate) fn push_identity(&mut self, decl: &IdentityDecl, scope: &Rc<Scope>) -> IdentityId {
        let id = IdentityId(self.identities.len());
        let name = scope.global_name(&decl.name);
        if self.identity_names.contains_key(&name) {
            self.report(
                ErrorCategory::IdentityConstraint,
                format!("duplicate identity constraint '{}'", name),
                scope,
                None,
            );
        } else {
            self.identity_names.insert(name, id);
        }
        self.identities.push(Slot::Pending(IdentityEntry {
            decl: decl.clone(),
            scope: Rc::clone(scope),
        }));
        id
    }

    /// Resolved type, if its slot is resolved
    pub(crate) fn resolved_type(&self, id: TypeId) -> Option<&SchemaType> {
        self.types.get(id.0).and_then(Slot::resolved)
    }

    /// Resolved global element
    pub(crate) fn resolved_element(&self, id: ElementId) -> Option<&GlobalElement> {
        self.elements.get(id.0).and_then(Slot::resolved)
    }

    /// Resolved global attribute
    pub(crate) fn resolved_attribute(&self, id: AttributeId) -> Option<&GlobalAttribute> {
        self.attributes.get(id.0).and_then(Slot::resolved)
    }

    /// Mark a type invalid
    pub(crate) fn invalidate(&mut self, id: TypeId) {
        self.invalid.insert(id);
    }

    /// Whether a type came from a linked type system
    pub(crate) fn is_foreign(&self, id: TypeId) -> bool {
        self.foreign.copied_types.contains(&id)
    }
}

impl ComponentLookup for CompileContext<'_> {
    fn lookup_type(&self, id: TypeId) -> Option<&SchemaType> {
        self.resolved_type(id)
    }

    fn lookup_element(&self, id: ElementId) -> Option<&GlobalElement> {
        self.resolved_element(id)
    }
}

/// The arena entry for one built-in type
pub(crate) fn builtin_type(id: TypeId, builtin: &'static BuiltinType) -> SchemaType {
    let position = |name: &str| BUILTIN_TYPES.iter().position(|b| b.name == name).map(TypeId);
    let name = Some(QName::namespaced(XSD_NAMESPACE, builtin.name));

    if builtin.name == builtins::XSD_ANY_TYPE {
        let any = Wildcard::new(QNameSet::all(), ProcessContents::Lax);
        let particle = SchemaParticle::Wildcard(WildcardParticle {
            occurs: Occurs::zero_or_more(),
            wildcard: any.clone(),
        });
        return SchemaType {
            id,
            name,
            kind: TypeKind::Complex,
            role: TypeRole::Builtin,
            base: None,
            derivation: DerivationMethod::Restriction,
            content: ContentCategory::Mixed,
            wildcard_summary: particle.wildcard_summary(),
            particle: Some(particle),
            attributes: AttributeModel {
                uses: IndexMap::new(),
                wildcard: Some(any),
            },
            simple: None,
            anonymous_types: Vec::new(),
            outer: None,
            is_abstract: false,
            final_set: DerivationSet::default(),
            block: DerivationSet::default(),
            location: None,
        };
    }

    let simple = match builtin.item {
        Some(item) => SimpleInfo {
            variety: SimpleVariety::List,
            builtin: builtins::XSD_ANY_SIMPLE_TYPE,
            facets: FacetSet {
                min_length: Some(1),
                ..FacetSet::default()
            },
            item_type: position(item),
            member_types: Vec::new(),
        },
        None => SimpleInfo::atomic(builtin.name, FacetSet::default()),
    };

    SchemaType {
        id,
        name,
        kind: TypeKind::Simple,
        role: TypeRole::Builtin,
        base: builtin.base.and_then(position),
        derivation: DerivationMethod::Restriction,
        content: ContentCategory::Simple,
        particle: None,
        attributes: AttributeModel::default(),
        wildcard_summary: None,
        simple: Some(simple),
        anonymous_types: Vec::new(),
        outer: None,
        is_abstract: false,
        final_set: DerivationSet::default(),
        block: DerivationSet::default(),
        location: None,
    }
}

/// Stand-in for a type slot that never resolved
pub(crate) fn degraded_type(id: TypeId) -> SchemaType {
    let mut ty = builtin_type(TypeId::ANY_TYPE, &BUILTIN_TYPES[0]);
    ty.id = id;
    ty.name = None;
    ty.role = TypeRole::Declared;
    ty.base = Some(TypeId::ANY_TYPE);
    ty
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::BuiltinLoader;

    #[test]
    fn test_builtins_seeded_in_order() {
        let options = CompileOptions::default();
        let ctx = CompileContext::new(&options, &BuiltinLoader);

        let any = ctx.resolved_type(TypeId::ANY_TYPE).unwrap();
        assert!(any.is_any_type());
        assert_eq!(any.content, ContentCategory::Mixed);

        let any_simple = ctx.resolved_type(TypeId::ANY_SIMPLE_TYPE).unwrap();
        assert_eq!(any_simple.base, Some(TypeId::ANY_TYPE));

        for (index, slot) in ctx.types.iter().enumerate() {
            let ty = slot.resolved().unwrap();
            if let Some(base) = ty.base {
                assert!(base.index() < index, "{} precedes its base", ty.display_name());
            }
        }

        let nmtokens = ctx.type_names[&QName::namespaced(XSD_NAMESPACE, "NMTOKENS")];
        let info = ctx.resolved_type(nmtokens).unwrap().simple.as_ref().unwrap();
        assert_eq!(info.variety, SimpleVariety::List);
        assert_eq!(info.item_type, Some(ctx.type_names[&QName::namespaced(XSD_NAMESPACE, "NMTOKEN")]));
    }

    #[test]
    fn test_chameleon_scope_qualifies_unprefixed_names() {
        let scope = Scope {
            namespace: Some("urn:a".to_string()),
            chameleon: true,
            ..Scope::default()
        };
        assert_eq!(scope.qualify(&QName::local("T")), QName::namespaced("urn:a", "T"));
        let xs = QName::namespaced(XSD_NAMESPACE, "string");
        assert_eq!(scope.qualify(&xs), xs);

        let plain = Scope {
            namespace: Some("urn:a".to_string()),
            ..Scope::default()
        };
        assert_eq!(plain.qualify(&QName::local("T")), QName::local("T"));
        assert_eq!(plain.element_name("e", None), QName::local("e"));
        assert_eq!(plain.element_name("e", Some(true)), QName::namespaced("urn:a", "e"));
    }
}
