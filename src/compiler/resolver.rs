//! Component resolution
//!
//! Builds every pending arena slot into its resolved component. Global
//! elements and attributes are resolved first (they only need to know
//! which type slot they point at), then the document types of the global
//! elements, then every remaining type slot in arena order.
//! A type resolves its base before itself; meeting a base that is still
//! being resolved means the derivation is circular, and the dependent type
//! is degraded to a restriction of the ur-type so resolution can go on.
//! Substitution groups and keyref targets are linked last.

use std::mem;
use std::rc::Rc;
use std::str::FromStr;

use tracing::{debug, trace};

use crate::components::builtins::{self, ValueSpace, XSD_ANY_SIMPLE_TYPE};
use crate::components::{
    AttributeId, AttributeModel, Compositor, ContentCategory, DerivationMethod, DerivationSet,
    ElementId, FacetSet, GlobalAttribute, GlobalElement, IdentityCategory, IdentityConstraint, IdentityId,
    Occurs, SchemaParticle, SchemaType, SimpleInfo, SimpleVariety, TypeId, TypeKind, TypeRole, WhiteSpace,
};
use crate::components::facets::Pattern;
use crate::error::ErrorCategory;
use crate::namespaces::QName;
use crate::parsing::{
    ComplexTypeDecl, ContentKind, FacetDecl, SimpleContentDecl, SimpleTypeDecl, TypeDecl,
};

use super::content::{translate_attributes, translate_particle, Site};
use super::context::{degraded_type, CompileContext, ExpandedAttributes, Scope, Slot, TypeBuilder};

/// Resolve every pending component
pub(crate) fn resolve(ctx: &mut CompileContext<'_>) {
    for index in 0..ctx.elements.len() {
        resolve_element(ctx, ElementId(index));
    }
    for index in 0..ctx.attributes.len() {
        resolve_attribute(ctx, AttributeId(index));
    }
    resolve_document_types(ctx);

    // resolving a type can allocate further (anonymous) slots
    let mut index = 0;
    while index < ctx.types.len() {
        resolve_type(ctx, TypeId(index));
        index += 1;
    }

    link_substitution_groups(ctx);
    resolve_identities(ctx);
    debug!(
        types = ctx.types.len(),
        elements = ctx.elements.len(),
        invalid = ctx.invalid.len(),
        "resolution complete"
    );
}

/// The wrapper type of a standalone element only needs the element itself
fn resolve_document_types(ctx: &mut CompileContext<'_>) {
    for index in 0..ctx.elements.len() {
        if let Some(document) = ctx.resolved_element(ElementId(index)).map(|e| e.document_type) {
            resolve_type(ctx, document);
        }
    }
}

fn resolve_element(ctx: &mut CompileContext<'_>, id: ElementId) {
    let entry = match mem::replace(&mut ctx.elements[id.0], Slot::Resolving) {
        Slot::Pending(entry) => entry,
        // a circular substitution group; reported when the chain is linked
        other => {
            ctx.elements[id.0] = other;
            return;
        }
    };
    let decl = entry.decl;
    let scope = entry.scope;
    let Some(local) = decl.name.as_deref() else {
        return;
    };
    let name = scope.global_name(local);
    let label = name.to_string();

    let head = decl.substitution_group.as_ref().and_then(|head| {
        let head = scope.qualify(head);
        let found = ctx.find_element(&head);
        if found.is_none() {
            ctx.unresolved("substitution group head", &head, &scope, Some(label.clone()));
        }
        found
    });

    let type_id = match (&decl.type_name, &decl.inline_type) {
        (Some(type_name), _) => ctx.type_reference(type_name, &scope, TypeId::ANY_TYPE, &label),
        (None, Some(inline)) => ctx.push_anonymous(inline.clone(), &scope, None),
        // the type of the substitution group head, if there is one
        (None, None) => match head {
            Some(head) => {
                resolve_element(ctx, head);
                ctx.resolved_element(head).map_or(TypeId::ANY_TYPE, |h| h.type_id)
            }
            None => TypeId::ANY_TYPE,
        },
    };

    let identity_constraints = decl
        .identity_constraints
        .iter()
        .map(|ic| ctx.push_identity(ic, &scope))
        .collect();
    let document_type = ctx.push_type(Slot::Pending(TypeBuilder::Document { element: id }));

    trace!(element = %name, "resolved element");
    ctx.elements[id.0] = Slot::Resolved(GlobalElement {
        id,
        name,
        type_id,
        document_type,
        nillable: decl.nillable,
        default: decl.default,
        fixed: decl.fixed,
        is_abstract: decl.is_abstract,
        block: decl
            .block
            .unwrap_or_else(|| scope.block_default.intersect(&DerivationSet::element_block())),
        final_set: decl
            .final_set
            .unwrap_or_else(|| scope.final_default.intersect(&DerivationSet::complex())),
        substitution_group: head,
        substitution_members: Default::default(),
        identity_constraints,
        location: scope.location.clone(),
    });
}

fn resolve_attribute(ctx: &mut CompileContext<'_>, id: AttributeId) {
    let entry = match mem::replace(&mut ctx.attributes[id.0], Slot::Resolving) {
        Slot::Pending(entry) => entry,
        other => {
            ctx.attributes[id.0] = other;
            return;
        }
    };
    let decl = entry.decl;
    let scope = entry.scope;
    let Some(local) = decl.name.as_deref() else {
        return;
    };
    let name = scope.global_name(local);
    let label = name.to_string();

    let type_id = match (&decl.type_name, &decl.inline_type) {
        (Some(type_name), _) => ctx.type_reference(type_name, &scope, TypeId::ANY_SIMPLE_TYPE, &label),
        (None, Some(inline)) => ctx.push_anonymous(TypeDecl::Simple(inline.clone()), &scope, None),
        (None, None) => TypeId::ANY_SIMPLE_TYPE,
    };
    let attribute_type = ctx.push_type(Slot::Pending(TypeBuilder::Attribute { attribute: id }));

    ctx.attributes[id.0] = Slot::Resolved(GlobalAttribute {
        id,
        name,
        type_id,
        attribute_type,
        default: decl.default,
        fixed: decl.fixed,
        location: scope.location.clone(),
    });
}

/// Resolve one type slot. Returns false when the slot is being resolved
/// further up the stack.
fn resolve_type(ctx: &mut CompileContext<'_>, id: TypeId) -> bool {
    let builder = match mem::replace(&mut ctx.types[id.0], Slot::Resolving) {
        Slot::Pending(builder) => builder,
        Slot::Resolving => return false,
        resolved => {
            ctx.types[id.0] = resolved;
            return true;
        }
    };

    let ty = match builder {
        TypeBuilder::Declared {
            decl,
            scope,
            name,
            outer,
            original,
        } => {
            let site = TypeSite {
                id,
                scope,
                name,
                outer,
                original,
            };
            match decl {
                TypeDecl::Simple(simple) => build_simple(ctx, &site, &simple),
                TypeDecl::Complex(complex) => build_complex(ctx, &site, &complex),
            }
        }
        TypeBuilder::Document { element } => document_type(ctx, id, element),
        TypeBuilder::Attribute { attribute } => attribute_type(ctx, id, attribute),
    };
    trace!(ty = %ty.display_name(), "resolved type");
    ctx.types[id.0] = Slot::Resolved(ty);
    true
}

/// A type definition being built
struct TypeSite {
    id: TypeId,
    scope: Rc<Scope>,
    name: Option<QName>,
    outer: Option<TypeId>,
    original: Option<TypeId>,
}

impl TypeSite {
    fn label(&self) -> String {
        match &self.name {
            Some(name) => name.to_string(),
            None => format!("anonymous {}", self.id),
        }
    }

    /// Resolve the base type reference. In a redefinition the type's own
    /// name refers to the type being redefined.
    fn base_reference(&self, ctx: &mut CompileContext<'_>, base: &QName, fallback: TypeId) -> TypeId {
        let qualified = self.scope.qualify(base);
        if let (Some(original), Some(own)) = (self.original, &self.name) {
            if qualified == *own {
                return original;
            }
        }
        ctx.type_reference(base, &self.scope, fallback, &self.label())
    }

    fn report(&self, ctx: &mut CompileContext<'_>, category: ErrorCategory, message: String) {
        ctx.report(category, message, &self.scope, Some(self.label()));
        ctx.invalidate(self.id);
    }
}

/// Make sure `dependency` is resolved before `site` uses it. On a cycle the
/// error is recorded against `site`, which is marked invalid.
fn require_type(ctx: &mut CompileContext<'_>, site: &TypeSite, dependency: TypeId) -> bool {
    if resolve_type(ctx, dependency) {
        return true;
    }
    site.report(
        ctx,
        ErrorCategory::CyclicDependency,
        format!("type '{}' depends on itself", site.label()),
    );
    false
}

fn resolved_or_degraded(ctx: &CompileContext<'_>, id: TypeId) -> SchemaType {
    ctx.resolved_type(id)
        .cloned()
        .unwrap_or_else(|| degraded_type(id))
}

/// Inline anonymous simple type
fn anonymous_simple(
    ctx: &mut CompileContext<'_>,
    site: &TypeSite,
    decl: &SimpleTypeDecl,
    anonymous: &mut Vec<TypeId>,
) -> TypeId {
    let id = ctx.push_anonymous(TypeDecl::Simple(decl.clone()), &site.scope, Some(site.id));
    anonymous.push(id);
    id
}

/// A simple type dependency: resolved, and simple; otherwise anySimpleType
fn simple_dependency(ctx: &mut CompileContext<'_>, site: &TypeSite, id: TypeId, role: &str) -> SchemaType {
    if !require_type(ctx, site, id) {
        return resolved_or_degraded(ctx, TypeId::ANY_SIMPLE_TYPE);
    }
    let ty = resolved_or_degraded(ctx, id);
    if !ty.is_simple() {
        site.report(
            ctx,
            ErrorCategory::Structure,
            format!("{} '{}' of '{}' is not a simple type", role, ty.display_name(), site.label()),
        );
        return resolved_or_degraded(ctx, TypeId::ANY_SIMPLE_TYPE);
    }
    ty
}

fn value_space(info: &SimpleInfo) -> ValueSpace {
    match info.variety {
        SimpleVariety::Atomic => builtins::builtin(info.builtin).map_or(ValueSpace::String, |b| b.value_space),
        SimpleVariety::List | SimpleVariety::Union => ValueSpace::String,
    }
}

/// Parse a facet value into its slot; false when the value is malformed
fn parse_into<T: FromStr>(value: &str, slot: &mut Option<T>) -> bool {
    match value.parse() {
        Ok(parsed) => {
            *slot = Some(parsed);
            true
        }
        Err(_) => false,
    }
}

/// Facets of one restriction step
fn facet_set(ctx: &mut CompileContext<'_>, site: &TypeSite, facets: &[FacetDecl]) -> FacetSet {
    let mut set = FacetSet::default();
    let mut patterns = Vec::new();
    let mut enumeration = Vec::new();

    for facet in facets {
        let value = facet.value.trim();
        let well_formed = match facet.name.as_str() {
            "length" => parse_into(value, &mut set.length),
            "minLength" => parse_into(value, &mut set.min_length),
            "maxLength" => parse_into(value, &mut set.max_length),
            "totalDigits" => parse_into(value, &mut set.total_digits) && set.total_digits != Some(0),
            "fractionDigits" => parse_into(value, &mut set.fraction_digits),
            "whiteSpace" => {
                set.white_space = WhiteSpace::parse(value);
                set.white_space.is_some()
            }
            "minInclusive" => {
                set.min_inclusive = Some(value.to_string());
                true
            }
            "maxInclusive" => {
                set.max_inclusive = Some(value.to_string());
                true
            }
            "minExclusive" => {
                set.min_exclusive = Some(value.to_string());
                true
            }
            "maxExclusive" => {
                set.max_exclusive = Some(value.to_string());
                true
            }
            "enumeration" => {
                enumeration.push(facet.value.clone());
                true
            }
            "pattern" => match Pattern::new(&facet.value) {
                Ok(pattern) => {
                    patterns.push(pattern);
                    true
                }
                Err(e) => {
                    site.report(ctx, ErrorCategory::Structure, format!("invalid pattern facet: {}", e));
                    continue;
                }
            },
            other => {
                site.report(ctx, ErrorCategory::Structure, format!("unknown facet '{}'", other));
                continue;
            }
        };
        if !well_formed {
            site.report(
                ctx,
                ErrorCategory::Structure,
                format!("invalid value '{}' for facet {}", facet.value, facet.name),
            );
        }
    }

    if !patterns.is_empty() {
        set.patterns.push(patterns);
    }
    if !enumeration.is_empty() {
        set.enumeration = Some(enumeration);
    }
    set
}

/// Apply a restriction step to the base's value space
fn restrict_simple(ctx: &mut CompileContext<'_>, site: &TypeSite, base: SimpleInfo, facets: &[FacetDecl]) -> SimpleInfo {
    let mut step = facet_set(ctx, site, facets);
    drop_invalid_bounds(ctx, site, &base, &mut step);
    let (merged, problems) = base.facets.restrict(&step, value_space(&base));
    for problem in problems {
        site.report(ctx, ErrorCategory::Structure, format!("facet of '{}': {}", site.label(), problem));
    }
    SimpleInfo { facets: merged, ..base }
}

/// Bound facets must be values of the base's atomic type; invalid ones are
/// recorded and left out of the restriction
fn drop_invalid_bounds(ctx: &mut CompileContext<'_>, site: &TypeSite, base: &SimpleInfo, step: &mut FacetSet) {
    if base.variety != SimpleVariety::Atomic {
        return;
    }
    let Some(builtin) = builtins::builtin(base.builtin).filter(|b| !b.is_special()) else {
        return;
    };
    let bounds = [
        ("minInclusive", &mut step.min_inclusive),
        ("maxInclusive", &mut step.max_inclusive),
        ("minExclusive", &mut step.min_exclusive),
        ("maxExclusive", &mut step.max_exclusive),
    ];
    for (name, slot) in bounds {
        let Some(value) = slot.as_deref() else {
            continue;
        };
        if builtin.validate(value).is_err() {
            site.report(
                ctx,
                ErrorCategory::ValueValidity,
                format!("{} value '{}' of '{}' is not a valid {}", name, value, site.label(), builtin.name),
            );
            *slot = None;
        }
    }
}

fn any_simple_info() -> SimpleInfo {
    SimpleInfo::atomic(XSD_ANY_SIMPLE_TYPE, FacetSet::default())
}

fn build_simple(ctx: &mut CompileContext<'_>, site: &TypeSite, decl: &SimpleTypeDecl) -> SchemaType {
    let mut anonymous = Vec::new();
    let mut base_id = TypeId::ANY_SIMPLE_TYPE;

    let simple = match &decl.content {
        SimpleContentDecl::Restriction {
            base,
            inline_base,
            facets,
        } => {
            base_id = match (base, inline_base) {
                (Some(base), _) => site.base_reference(ctx, base, TypeId::ANY_SIMPLE_TYPE),
                (None, Some(inline)) => anonymous_simple(ctx, site, inline, &mut anonymous),
                (None, None) => TypeId::ANY_SIMPLE_TYPE,
            };
            let base = simple_dependency(ctx, site, base_id, "base type");
            base_id = base.id;
            if base.final_set.restriction {
                site.report(
                    ctx,
                    ErrorCategory::Structure,
                    format!("'{}' restricts '{}', which is final for restriction", site.label(), base.display_name()),
                );
            }
            let info = base.simple.clone().unwrap_or_else(any_simple_info);
            restrict_simple(ctx, site, info, facets)
        }
        SimpleContentDecl::List { item_type, inline_item } => {
            let item_id = match (item_type, inline_item) {
                (Some(item), _) => site.base_reference(ctx, item, TypeId::ANY_SIMPLE_TYPE),
                (None, Some(inline)) => anonymous_simple(ctx, site, inline, &mut anonymous),
                (None, None) => TypeId::ANY_SIMPLE_TYPE,
            };
            let item = simple_dependency(ctx, site, item_id, "item type");
            if item.simple.as_ref().map(|s| s.variety) == Some(SimpleVariety::List) {
                site.report(
                    ctx,
                    ErrorCategory::Structure,
                    format!("list item type '{}' is itself a list", item.display_name()),
                );
            }
            if item.final_set.list {
                site.report(
                    ctx,
                    ErrorCategory::Structure,
                    format!("item type '{}' is final for list", item.display_name()),
                );
            }
            SimpleInfo {
                variety: SimpleVariety::List,
                builtin: XSD_ANY_SIMPLE_TYPE,
                facets: FacetSet::default(),
                item_type: Some(item.id),
                member_types: Vec::new(),
            }
        }
        SimpleContentDecl::Union {
            member_types,
            inline_members,
        } => {
            let mut members = Vec::new();
            for member in member_types {
                members.push(site.base_reference(ctx, member, TypeId::ANY_SIMPLE_TYPE));
            }
            for inline in inline_members {
                members.push(anonymous_simple(ctx, site, inline, &mut anonymous));
            }
            let mut resolved = Vec::with_capacity(members.len());
            for member in members {
                let member = simple_dependency(ctx, site, member, "member type");
                if member.final_set.union {
                    site.report(
                        ctx,
                        ErrorCategory::Structure,
                        format!("member type '{}' is final for union", member.display_name()),
                    );
                }
                resolved.push(member.id);
            }
            if resolved.is_empty() {
                site.report(ctx, ErrorCategory::Structure, format!("union '{}' has no member types", site.label()));
            }
            SimpleInfo {
                variety: SimpleVariety::Union,
                builtin: XSD_ANY_SIMPLE_TYPE,
                facets: FacetSet::default(),
                item_type: None,
                member_types: resolved,
            }
        }
    };

    SchemaType {
        id: site.id,
        name: site.name.clone(),
        kind: TypeKind::Simple,
        role: TypeRole::Declared,
        base: Some(base_id),
        derivation: DerivationMethod::Restriction,
        content: ContentCategory::Simple,
        particle: None,
        attributes: AttributeModel::default(),
        wildcard_summary: None,
        simple: Some(simple),
        anonymous_types: anonymous,
        outer: site.outer,
        is_abstract: false,
        final_set: decl
            .final_set
            .unwrap_or_else(|| site.scope.final_default.intersect(&DerivationSet::simple())),
        block: DerivationSet::default(),
        location: site.scope.location.clone(),
    }
}

fn build_complex(ctx: &mut CompileContext<'_>, site: &TypeSite, decl: &ComplexTypeDecl) -> SchemaType {
    let label = site.label();
    let mut anonymous = Vec::new();

    let mut base_id = match &decl.base {
        Some(base) => site.base_reference(ctx, base, TypeId::ANY_TYPE),
        None => TypeId::ANY_TYPE,
    };
    if !require_type(ctx, site, base_id) {
        base_id = TypeId::ANY_TYPE;
    }
    let base = resolved_or_degraded(ctx, base_id);
    if decl.content_kind != ContentKind::Implicit && base.final_set.is_blocked(decl.derivation) {
        site.report(
            ctx,
            ErrorCategory::Structure,
            format!(
                "'{}' derives by {} from '{}', which is final for {}",
                label,
                decl.derivation,
                base.display_name(),
                decl.derivation
            ),
        );
    }

    let content_site = Site::new(&site.scope, Some(site.id), &label);
    let own_attributes = translate_attributes(ctx, &decl.attributes, &content_site, &mut anonymous);
    let attributes = match decl.derivation {
        DerivationMethod::Extension => extend_attributes(ctx, site, &base.attributes, own_attributes),
        DerivationMethod::Restriction => restrict_attributes(&base.attributes, own_attributes),
    };

    let (content, particle, simple) = match decl.content_kind {
        ContentKind::Simple => {
            let simple = simple_content(ctx, site, decl, &base, &mut anonymous);
            (ContentCategory::Simple, None, Some(simple))
        }
        ContentKind::Complex | ContentKind::Implicit => {
            let own = decl
                .particle
                .as_ref()
                .and_then(|p| translate_particle(ctx, p, &content_site, &mut anonymous))
                .map(SchemaParticle::normalized)
                .filter(|p| p.as_group().map_or(true, |g| !g.particles.is_empty()));
            let (content, particle) = match decl.derivation {
                DerivationMethod::Extension => extend_content(ctx, site, decl, &base, own),
                DerivationMethod::Restriction => {
                    let content = if decl.mixed {
                        ContentCategory::Mixed
                    } else if own.is_some() {
                        ContentCategory::ElementOnly
                    } else {
                        ContentCategory::Empty
                    };
                    (content, own)
                }
            };
            (content, particle, None)
        }
    };

    SchemaType {
        id: site.id,
        name: site.name.clone(),
        kind: TypeKind::Complex,
        role: TypeRole::Declared,
        base: Some(base_id),
        derivation: decl.derivation,
        content,
        wildcard_summary: particle.as_ref().and_then(SchemaParticle::wildcard_summary),
        particle,
        attributes,
        simple,
        anonymous_types: anonymous,
        outer: site.outer,
        is_abstract: decl.is_abstract,
        final_set: decl
            .final_set
            .unwrap_or_else(|| site.scope.final_default.intersect(&DerivationSet::complex())),
        block: decl
            .block
            .unwrap_or_else(|| site.scope.block_default.intersect(&DerivationSet::complex())),
        location: site.scope.location.clone(),
    }
}

/// Value space of a complex type with simple content
fn simple_content(
    ctx: &mut CompileContext<'_>,
    site: &TypeSite,
    decl: &ComplexTypeDecl,
    base: &SchemaType,
    anonymous: &mut Vec<TypeId>,
) -> SimpleInfo {
    let base_simple = match &base.simple {
        Some(simple) => Some(simple.clone()),
        // a mixed, emptiable base may be restricted to simple content
        None if decl.derivation == DerivationMethod::Restriction
            && base.content == ContentCategory::Mixed
            && base.is_emptiable()
            && decl.inline_simple.is_some() =>
        {
            Some(any_simple_info())
        }
        None => None,
    };
    let Some(base_simple) = base_simple else {
        site.report(
            ctx,
            ErrorCategory::Structure,
            format!(
                "'{}' has simple content but its base '{}' does not",
                site.label(),
                base.display_name()
            ),
        );
        return any_simple_info();
    };

    match decl.derivation {
        DerivationMethod::Extension => base_simple,
        DerivationMethod::Restriction => {
            let start = match &decl.inline_simple {
                Some(inline) => {
                    let id = anonymous_simple(ctx, site, inline, anonymous);
                    simple_dependency(ctx, site, id, "content type")
                        .simple
                        .unwrap_or(base_simple)
                }
                None => base_simple,
            };
            restrict_simple(ctx, site, start, &decl.facets)
        }
    }
}

/// Content of a type derived by extension: the base content followed by
/// the type's own particle
fn extend_content(
    ctx: &mut CompileContext<'_>,
    site: &TypeSite,
    decl: &ComplexTypeDecl,
    base: &SchemaType,
    own: Option<SchemaParticle>,
) -> (ContentCategory, Option<SchemaParticle>) {
    if base.content == ContentCategory::Simple {
        site.report(
            ctx,
            ErrorCategory::Structure,
            format!(
                "'{}' extends '{}' with complex content but the base has simple content",
                site.label(),
                base.display_name()
            ),
        );
        let content = if own.is_some() { ContentCategory::ElementOnly } else { ContentCategory::Empty };
        return (content, own);
    }

    let base_particle = base.particle.clone();
    if own.is_some() && base_particle.is_some() {
        let base_mixed = base.content == ContentCategory::Mixed;
        if base_mixed != decl.mixed {
            site.report(
                ctx,
                ErrorCategory::Structure,
                format!(
                    "'{}' and its base '{}' must both be mixed or both element-only",
                    site.label(),
                    base.display_name()
                ),
            );
        }
    }

    let particle = match (base_particle, own) {
        (None, own) => own,
        (base_particle, None) => base_particle,
        (Some(base_particle), Some(own)) => {
            let is_all = |p: &SchemaParticle| matches!(p, SchemaParticle::All(_));
            if is_all(&base_particle) || is_all(&own) {
                site.report(
                    ctx,
                    ErrorCategory::Structure,
                    format!("'{}' cannot extend a content model containing an all group", site.label()),
                );
                Some(base_particle)
            } else {
                Some(
                    SchemaParticle::group(Compositor::Sequence, Occurs::once(), vec![base_particle, own])
                        .normalized(),
                )
            }
        }
    };

    let content = match &particle {
        None if decl.mixed => ContentCategory::Mixed,
        None => ContentCategory::Empty,
        Some(_) if decl.mixed || base.content == ContentCategory::Mixed => ContentCategory::Mixed,
        Some(_) => ContentCategory::ElementOnly,
    };
    (content, particle)
}

fn extend_attributes(
    ctx: &mut CompileContext<'_>,
    site: &TypeSite,
    base: &AttributeModel,
    own: ExpandedAttributes,
) -> AttributeModel {
    let mut model = base.clone();
    for (name, attribute_use) in own.model.uses {
        if model.uses.contains_key(&name) {
            site.report(
                ctx,
                ErrorCategory::Structure,
                format!("attribute '{}' of '{}' is already declared by its base", name, site.label()),
            );
            continue;
        }
        model.uses.insert(name, attribute_use);
    }
    model.wildcard = match (own.model.wildcard, base.wildcard.as_ref()) {
        (Some(own), Some(base)) => Some(own.union(base)),
        (Some(own), None) => Some(own),
        (None, base) => base.cloned(),
    };
    model
}

/// Attributes of a restriction: the base's uses, overridden or prohibited
/// by the type's own, and only the type's own wildcard
fn restrict_attributes(base: &AttributeModel, own: ExpandedAttributes) -> AttributeModel {
    let mut model = AttributeModel::default();
    for (name, base_use) in &base.uses {
        if let Some(own_use) = own.model.uses.get(name) {
            model.uses.insert(name.clone(), own_use.clone());
        } else if !own.prohibited.contains(name) {
            model.uses.insert(name.clone(), base_use.clone());
        }
    }
    for (name, own_use) in own.model.uses {
        if !model.uses.contains_key(&name) {
            model.uses.insert(name, own_use);
        }
    }
    model.wildcard = own.model.wildcard;
    model
}

/// Synthetic type of a standalone element instance: a single occurrence
/// of the element
fn document_type(ctx: &CompileContext<'_>, id: TypeId, element: ElementId) -> SchemaType {
    let global = ctx.resolved_element(element);
    SchemaType {
        id,
        name: None,
        kind: TypeKind::Complex,
        role: TypeRole::Document(element),
        base: Some(TypeId::ANY_TYPE),
        derivation: DerivationMethod::Restriction,
        content: ContentCategory::ElementOnly,
        particle: global.map(|e| SchemaParticle::Element(e.to_particle())),
        attributes: AttributeModel::default(),
        wildcard_summary: None,
        simple: None,
        anonymous_types: Vec::new(),
        outer: None,
        is_abstract: false,
        final_set: DerivationSet::default(),
        block: DerivationSet::default(),
        location: global.and_then(|e| e.location.clone()),
    }
}

/// Synthetic type of a standalone attribute: an empty type carrying the
/// attribute
fn attribute_type(ctx: &mut CompileContext<'_>, id: TypeId, attribute: AttributeId) -> SchemaType {
    let global = ctx.resolved_attribute(attribute).cloned();
    let mut attributes = AttributeModel::default();
    let mut location = None;
    if let Some(global) = global {
        location = global.location.clone();
        resolve_type(ctx, global.type_id);
        if ctx.resolved_type(global.type_id).map_or(false, |t| !t.is_simple()) {
            let scope = Scope {
                location: location.clone(),
                ..Scope::default()
            };
            ctx.report(
                ErrorCategory::Structure,
                format!("type of attribute '{}' is not a simple type", global.name),
                &scope,
                Some(global.name.to_string()),
            );
            ctx.invalidate(id);
        }
        let attribute_use = global.to_use();
        attributes.uses.insert(attribute_use.name.clone(), attribute_use);
    }
    SchemaType {
        id,
        name: None,
        kind: TypeKind::Complex,
        role: TypeRole::Attribute(attribute),
        base: Some(TypeId::ANY_TYPE),
        derivation: DerivationMethod::Restriction,
        content: ContentCategory::Empty,
        particle: None,
        attributes,
        wildcard_summary: None,
        simple: None,
        anonymous_types: Vec::new(),
        outer: None,
        is_abstract: false,
        final_set: DerivationSet::default(),
        block: DerivationSet::default(),
        location,
    }
}

/// Record every element in the substitution groups of its heads,
/// transitively
fn link_substitution_groups(ctx: &mut CompileContext<'_>) {
    for index in 0..ctx.elements.len() {
        let id = ElementId(index);
        if ctx.foreign.copied_elements.contains(&id) {
            continue;
        }
        let Some(member) = ctx.resolved_element(id) else {
            continue;
        };
        let name = member.name.clone();
        let location = member.location.clone();
        let document_type = member.document_type;
        let mut current = member.substitution_group;
        let mut visited = vec![id];

        while let Some(head) = current {
            if head == id {
                let scope = Scope {
                    location,
                    ..Scope::default()
                };
                ctx.report(
                    ErrorCategory::CyclicDependency,
                    format!("substitution group of element '{}' is circular", name),
                    &scope,
                    Some(name.to_string()),
                );
                ctx.invalidate(document_type);
                // break the cycle here so later walks terminate
                if let Some(element) = ctx.elements[id.0].resolved_mut() {
                    element.substitution_group = None;
                }
                break;
            }
            if visited.contains(&head) {
                break;
            }
            visited.push(head);
            let Some(head_element) = ctx.elements.get_mut(head.0).and_then(Slot::resolved_mut) else {
                break;
            };
            head_element.substitution_members.insert(name.clone());
            current = head_element.substitution_group;
        }
    }
}

/// Build identity constraints and link keyrefs to their keys
fn resolve_identities(ctx: &mut CompileContext<'_>) {
    let mut keyrefs = Vec::new();
    for index in 0..ctx.identities.len() {
        let entry = match mem::replace(&mut ctx.identities[index], Slot::Resolving) {
            Slot::Pending(entry) => entry,
            other => {
                ctx.identities[index] = other;
                continue;
            }
        };
        let id = IdentityId(index);
        let name = entry.scope.global_name(&entry.decl.name);
        if let Some(refer) = &entry.decl.refer {
            keyrefs.push((id, entry.scope.qualify(refer), Rc::clone(&entry.scope)));
        }
        ctx.identities[index] = Slot::Resolved(IdentityConstraint {
            id,
            name,
            category: entry.decl.category,
            selector: entry.decl.selector,
            fields: entry.decl.fields,
            referenced: None,
            location: entry.scope.location.clone(),
        });
    }

    for (id, refer, scope) in keyrefs {
        let Some((keyref_name, keyref_fields)) = ctx.identities[id.0]
            .resolved()
            .map(|k| (k.name.clone(), k.fields.len()))
        else {
            continue;
        };
        let Some(target) = ctx.find_identity(&refer) else {
            ctx.report(
                ErrorCategory::IdentityConstraint,
                format!("keyref '{}' refers to unknown key '{}'", keyref_name, refer),
                &scope,
                Some(keyref_name.to_string()),
            );
            continue;
        };
        let Some((category, fields)) = ctx.identities[target.0]
            .resolved()
            .map(|t| (t.category, t.fields.len()))
        else {
            continue;
        };
        if category == IdentityCategory::Keyref {
            ctx.report(
                ErrorCategory::IdentityConstraint,
                format!("keyref '{}' refers to '{}', which is itself a keyref", keyref_name, refer),
                &scope,
                Some(keyref_name.to_string()),
            );
            continue;
        }
        if fields != keyref_fields {
            ctx.report(
                ErrorCategory::IdentityConstraint,
                format!(
                    "keyref '{}' has {} field(s) but '{}' has {}",
                    keyref_name, keyref_fields, refer, fields
                ),
                &scope,
                Some(keyref_name.to_string()),
            );
        }
        if let Some(keyref) = ctx.identities[id.0].resolved_mut() {
            keyref.referenced = Some(target);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::importer::DocumentUnit;
    use crate::compiler::translate::translate;
    use crate::compiler::{BuiltinLoader, CompileOptions};
    use crate::components::types::is_derived_from;
    use crate::parsing::SchemaDocument;

    fn translated<'a>(options: &'a CompileOptions, xsd: &str) -> CompileContext<'a> {
        let mut ctx = CompileContext::new(options, &BuiltinLoader);
        let document = SchemaDocument::parse_str(xsd, Some("t.xsd")).unwrap();
        let namespace = document.target_namespace.clone();
        translate(
            &mut ctx,
            vec![DocumentUnit {
                document,
                namespace,
                chameleon: false,
                redefine: None,
            }],
        );
        ctx
    }

    fn resolved<'a>(options: &'a CompileOptions, xsd: &str) -> CompileContext<'a> {
        let mut ctx = translated(options, xsd);
        resolve(&mut ctx);
        ctx
    }

    fn type_named<'c>(ctx: &'c CompileContext<'_>, local: &str) -> &'c SchemaType {
        let id = ctx.type_names[&QName::namespaced("urn:t", local)];
        ctx.resolved_type(id).unwrap()
    }

    const HEADER: &str = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema" xmlns:t="urn:t" targetNamespace="urn:t">"#;

    fn schema(body: &str) -> String {
        format!("{}{}</xs:schema>", HEADER, body)
    }

    #[test]
    fn test_extension_appends_content() {
        let options = CompileOptions::default();
        let ctx = resolved(
            &options,
            &schema(
                r#"<xs:complexType name="Base"><xs:sequence><xs:element name="a"/></xs:sequence>
                     <xs:attribute name="id" type="xs:string"/></xs:complexType>
                   <xs:complexType name="Derived"><xs:complexContent><xs:extension base="t:Base">
                     <xs:sequence><xs:element name="b"/></xs:sequence>
                     <xs:attribute name="extra" type="xs:int"/>
                   </xs:extension></xs:complexContent></xs:complexType>"#,
            ),
        );

        let derived = type_named(&ctx, "Derived");
        let particle = derived.particle.as_ref().unwrap();
        assert_eq!(particle.compositor(), Some(Compositor::Sequence));
        assert_eq!(particle.children().len(), 2);
        assert_eq!(derived.content, ContentCategory::ElementOnly);
        assert_eq!(derived.attributes.uses.len(), 2);
        assert!(is_derived_from(&ctx, derived.id, type_named(&ctx, "Base").id));
        assert!(ctx.errors.is_empty(), "{:?}", ctx.errors);
    }

    #[test]
    fn test_simple_restriction_accumulates_facets() {
        let options = CompileOptions::default();
        let ctx = resolved(
            &options,
            &schema(
                r#"<xs:simpleType name="Small"><xs:restriction base="xs:int">
                     <xs:maxInclusive value="100"/></xs:restriction></xs:simpleType>
                   <xs:simpleType name="Smaller"><xs:restriction base="t:Small">
                     <xs:minInclusive value="10"/></xs:restriction></xs:simpleType>"#,
            ),
        );

        let smaller = type_named(&ctx, "Smaller");
        let info = smaller.simple.as_ref().unwrap();
        assert_eq!(info.builtin, "int");
        assert_eq!(info.facets.max_inclusive.as_deref(), Some("100"));
        assert_eq!(info.facets.min_inclusive.as_deref(), Some("10"));
        assert!(ctx.errors.is_empty(), "{:?}", ctx.errors);
    }

    #[test]
    fn test_loosened_facet_reported() {
        let options = CompileOptions::default();
        let ctx = resolved(
            &options,
            &schema(
                r#"<xs:simpleType name="Short"><xs:restriction base="xs:string">
                     <xs:maxLength value="5"/></xs:restriction></xs:simpleType>
                   <xs:simpleType name="Longer"><xs:restriction base="t:Short">
                     <xs:maxLength value="10"/></xs:restriction></xs:simpleType>"#,
            ),
        );

        assert_eq!(ctx.errors.len(), 1);
        assert!(ctx.errors[0].message.contains("maxLength"));
        assert!(ctx.invalid.contains(&type_named(&ctx, "Longer").id));
    }

    #[test]
    fn test_circular_base_degrades() {
        let options = CompileOptions::default();
        let ctx = resolved(
            &options,
            &schema(
                r#"<xs:complexType name="A"><xs:complexContent><xs:extension base="t:B"/></xs:complexContent></xs:complexType>
                   <xs:complexType name="B"><xs:complexContent><xs:extension base="t:A"/></xs:complexContent></xs:complexType>"#,
            ),
        );

        let cycles: Vec<_> = ctx
            .errors
            .iter()
            .filter(|e| e.category == ErrorCategory::CyclicDependency)
            .collect();
        assert_eq!(cycles.len(), 1);
        assert!(ctx.types.iter().all(|slot| slot.resolved().is_some()));
        assert!(!ctx.invalid.is_empty());
    }

    #[test]
    fn test_element_takes_head_type() {
        let options = CompileOptions::default();
        let ctx = resolved(
            &options,
            &schema(
                r#"<xs:element name="head" type="xs:string"/>
                   <xs:element name="member" substitutionGroup="t:head"/>
                   <xs:element name="second" substitutionGroup="t:member" type="xs:token"/>"#,
            ),
        );

        let head = ctx.resolved_element(ctx.element_names[&QName::namespaced("urn:t", "head")]).unwrap();
        let member = ctx.resolved_element(ctx.element_names[&QName::namespaced("urn:t", "member")]).unwrap();
        assert_eq!(member.type_id, head.type_id);
        assert_eq!(head.substitution_members.len(), 2);
        assert!(head.substitution_members.contains(&QName::namespaced("urn:t", "second")));
    }

    #[test]
    fn test_circular_substitution_group() {
        let options = CompileOptions::default();
        let ctx = resolved(
            &options,
            &schema(
                r#"<xs:element name="a" substitutionGroup="t:b"/>
                   <xs:element name="b" substitutionGroup="t:a"/>"#,
            ),
        );

        assert!(ctx
            .errors
            .iter()
            .any(|e| e.category == ErrorCategory::CyclicDependency && e.message.contains("circular")));
    }

    #[test]
    fn test_keyref_linked_to_key() {
        let options = CompileOptions::default();
        let ctx = resolved(
            &options,
            &schema(
                r#"<xs:element name="root"><xs:complexType><xs:sequence>
                     <xs:element name="item" maxOccurs="unbounded"/></xs:sequence></xs:complexType>
                     <xs:key name="itemKey"><xs:selector xpath="item"/><xs:field xpath="@id"/></xs:key>
                     <xs:keyref name="itemRef" refer="t:itemKey"><xs:selector xpath="ref"/><xs:field xpath="@to"/></xs:keyref>
                   </xs:element>"#,
            ),
        );

        assert!(ctx.errors.is_empty(), "{:?}", ctx.errors);
        let keyref = ctx.identity_names[&QName::namespaced("urn:t", "itemRef")];
        let key = ctx.identity_names[&QName::namespaced("urn:t", "itemKey")];
        assert_eq!(ctx.identities[keyref.index()].resolved().unwrap().referenced, Some(key));
    }

    #[test]
    fn test_keyref_field_count_mismatch() {
        let options = CompileOptions::default();
        let ctx = resolved(
            &options,
            &schema(
                r#"<xs:element name="root">
                     <xs:key name="k"><xs:selector xpath="a"/><xs:field xpath="@x"/><xs:field xpath="@y"/></xs:key>
                     <xs:keyref name="r" refer="t:k"><xs:selector xpath="b"/><xs:field xpath="@x"/></xs:keyref>
                   </xs:element>"#,
            ),
        );

        assert_eq!(ctx.errors.len(), 1);
        assert_eq!(ctx.errors[0].category, ErrorCategory::IdentityConstraint);
    }

    #[test]
    fn test_restriction_prohibits_base_attribute() {
        let options = CompileOptions::default();
        let ctx = resolved(
            &options,
            &schema(
                r#"<xs:complexType name="Base">
                     <xs:attribute name="a" type="xs:string"/><xs:attribute name="b" type="xs:string"/>
                   </xs:complexType>
                   <xs:complexType name="R"><xs:complexContent><xs:restriction base="t:Base">
                     <xs:attribute name="b" use="prohibited"/>
                   </xs:restriction></xs:complexContent></xs:complexType>"#,
            ),
        );

        let restricted = type_named(&ctx, "R");
        assert!(restricted.attributes.get(&QName::local("a")).is_some());
        assert!(restricted.attributes.get(&QName::local("b")).is_none());
    }

    #[test]
    fn test_list_of_list_rejected() {
        let options = CompileOptions::default();
        let ctx = resolved(
            &options,
            &schema(r#"<xs:simpleType name="L"><xs:list itemType="xs:NMTOKENS"/></xs:simpleType>"#),
        );

        assert_eq!(ctx.errors.len(), 1);
        assert!(ctx.errors[0].message.contains("itself a list"));
    }

    #[test]
    fn test_resolving_again_changes_nothing() {
        let options = CompileOptions::default();
        let mut ctx = resolved(
            &options,
            &schema(
                r#"<xs:complexType name="Base"><xs:sequence><xs:element name="a"/></xs:sequence></xs:complexType>
                   <xs:complexType name="Derived"><xs:complexContent><xs:extension base="t:Base">
                     <xs:sequence><xs:element name="b"/></xs:sequence>
                   </xs:extension></xs:complexContent></xs:complexType>
                   <xs:element name="head" type="t:Base"/>
                   <xs:element name="member" type="t:Derived" substitutionGroup="t:head"/>
                   <xs:element name="root"><xs:complexType><xs:sequence><xs:element name="ref"/></xs:sequence></xs:complexType>
                     <xs:keyref name="dangling" refer="t:missing"><xs:selector xpath="ref"/><xs:field xpath="@to"/></xs:keyref>
                   </xs:element>"#,
            ),
        );
        let types: Vec<Option<SchemaType>> = ctx.types.iter().map(|s| s.resolved().cloned()).collect();
        let elements: Vec<Option<GlobalElement>> = ctx.elements.iter().map(|s| s.resolved().cloned()).collect();
        let errors = ctx.errors.clone();
        assert_eq!(errors.len(), 1);

        let derived = ctx.type_names[&QName::namespaced("urn:t", "Derived")];
        assert!(resolve_type(&mut ctx, derived));
        resolve(&mut ctx);

        let types_again: Vec<Option<SchemaType>> = ctx.types.iter().map(|s| s.resolved().cloned()).collect();
        let elements_again: Vec<Option<GlobalElement>> = ctx.elements.iter().map(|s| s.resolved().cloned()).collect();
        assert_eq!(types_again, types);
        assert_eq!(elements_again, elements);
        assert_eq!(ctx.errors, errors);
    }

    #[test]
    fn test_document_types_resolve_before_declared_types() {
        let options = CompileOptions::default();
        let mut ctx = translated(
            &options,
            &schema(
                r#"<xs:complexType name="T"><xs:sequence><xs:element name="a"/></xs:sequence></xs:complexType>
                   <xs:element name="root" type="t:T"/>"#,
            ),
        );
        for index in 0..ctx.elements.len() {
            resolve_element(&mut ctx, ElementId(index));
        }
        resolve_document_types(&mut ctx);

        let root = ctx.resolved_element(ctx.element_names[&QName::namespaced("urn:t", "root")]).unwrap();
        let document = ctx.resolved_type(root.document_type).unwrap();
        assert_eq!(document.role, TypeRole::Document(root.id));
        assert!(matches!(document.particle, Some(SchemaParticle::Element(_))));
        assert!(ctx.resolved_type(ctx.type_names[&QName::namespaced("urn:t", "T")]).is_none());
    }

    #[test]
    fn test_bound_facet_outside_lexical_space() {
        let options = CompileOptions::default();
        let ctx = resolved(
            &options,
            &schema(
                r#"<xs:simpleType name="D"><xs:restriction base="xs:date">
                     <xs:minInclusive value="aé12345"/><xs:maxInclusive value="2020-01-01"/>
                   </xs:restriction></xs:simpleType>"#,
            ),
        );

        assert_eq!(ctx.errors.len(), 1, "{:?}", ctx.errors);
        assert_eq!(ctx.errors[0].category, ErrorCategory::ValueValidity);
        assert!(ctx.errors[0].message.contains("minInclusive"));
        let date = type_named(&ctx, "D");
        let info = date.simple.as_ref().unwrap();
        assert_eq!(info.facets.min_inclusive, None);
        assert_eq!(info.facets.max_inclusive.as_deref(), Some("2020-01-01"));
        assert!(ctx.invalid.contains(&date.id));
    }
}
