//! Derivation and restriction checks
//!
//! Runs after resolution over every type and global declaration of the
//! compilation:
//! - complex types derived by restriction must restrict their base's content
//!   category, content model (Particle Valid (Restriction)) and attributes
//! - at most one ID attribute per type, never with a value constraint
//! - default and fixed values must be valid for their types
//! - substitution group members must derive from their head
//!
//! Reference: https://www.w3.org/TR/xmlschema-1/#cos-particle-restrict

use std::collections::HashSet;
use std::fmt;

use tracing::{debug, trace};

use crate::components::simple_types::{is_id_type, validate_value};
use crate::components::types::{derivation_steps, is_restriction_derived};
use crate::components::{
    AttributeModel, AttributeUse, ComponentLookup, ContentCategory, DerivationMethod, ElementId,
    ElementParticle, ModelGroup, Occurs, SchemaParticle, SchemaType, TypeId, TypeKind, TypeRole,
    WildcardParticle,
};
use crate::error::{CompileError, ErrorCategory};
use crate::namespaces::QName;

use super::context::CompileContext;

/// Why a particle is not a valid restriction of its base
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RestrictionFailure {
    /// The W3C constraint that failed
    pub rule: &'static str,
    pub message: String,
}

impl fmt::Display for RestrictionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.message, self.rule)
    }
}

pub(crate) type Check = Result<(), RestrictionFailure>;

fn fail(rule: &'static str, message: impl Into<String>) -> Check {
    Err(RestrictionFailure {
        rule,
        message: message.into(),
    })
}

const RANGE_OK: &str = "range-ok";
const NAME_AND_TYPE_OK: &str = "rcase-NameAndTypeOK";
const NS_COMPAT: &str = "rcase-NSCompat";
const NS_SUBSET: &str = "rcase-NSSubset";
const NS_RECURSE_CHECK_CARDINALITY: &str = "rcase-NSRecurseCheckCardinality";
const RECURSE: &str = "rcase-Recurse";
const RECURSE_LAX: &str = "rcase-RecurseLax";
const RECURSE_UNORDERED: &str = "rcase-RecurseUnordered";
const MAP_AND_SUM: &str = "rcase-MapAndSum";
const PARTICLE_RESTRICT: &str = "cos-particle-restrict";
const CONTENT_RESTRICT: &str = "derivation-ok-restriction";

/// Occurrence Range OK
fn range_ok(rule: &'static str, base: Occurs, derived: Occurs, what: &str) -> Check {
    if derived.is_restriction_of(&base) {
        Ok(())
    } else {
        fail(
            rule,
            format!("occurrence range {} of {} is not within the base range {}", derived, what, base),
        )
    }
}

/// Particle Valid (Restriction): whether `derived` restricts `base`
pub(crate) fn particle_valid<L: ComponentLookup + ?Sized>(
    lookup: &L,
    base: &SchemaParticle,
    derived: &SchemaParticle,
) -> Check {
    use SchemaParticle::{All, Choice, Element, Sequence, Wildcard};

    trace!(base = %base.describe(), derived = %derived.describe(), "particle restriction");
    match (base, derived) {
        (Element(b), Element(d)) => name_and_type_ok(lookup, b, d),
        (Wildcard(b), Element(d)) => ns_compat(b, d),
        (Wildcard(b), Wildcard(d)) => ns_subset(b, d),
        (Wildcard(b), All(_) | Choice(_) | Sequence(_)) => ns_recurse_check_cardinality(lookup, b, derived),
        (All(_) | Choice(_) | Sequence(_), Element(_)) => recurse_as_if_group(lookup, base, derived),
        (All(b), All(d)) | (Sequence(b), Sequence(d)) => recurse(lookup, b, d),
        (Choice(b), Choice(d)) => recurse_lax(lookup, b, d),
        (All(b), Sequence(d)) => recurse_unordered(lookup, b, d),
        (Choice(b), Sequence(d)) => map_and_sum(lookup, b, d),
        _ => fail(
            PARTICLE_RESTRICT,
            format!("{} cannot restrict {}", derived.describe(), base.describe()),
        ),
    }
}

fn name_and_type_ok<L: ComponentLookup + ?Sized>(lookup: &L, base: &ElementParticle, derived: &ElementParticle) -> Check {
    if base.name != derived.name {
        return fail(
            NAME_AND_TYPE_OK,
            format!("element '{}' does not match base element '{}'", derived.name, base.name),
        );
    }
    if derived.nillable && !base.nillable {
        return fail(
            NAME_AND_TYPE_OK,
            format!("element '{}' is nillable but the base element is not", derived.name),
        );
    }
    range_ok(NAME_AND_TYPE_OK, base.occurs, derived.occurs, &format!("element '{}'", derived.name))?;
    if let Some(fixed) = &base.fixed {
        if derived.fixed.as_deref().map(str::trim) != Some(fixed.trim()) {
            return fail(
                NAME_AND_TYPE_OK,
                format!("element '{}' must keep the base fixed value '{}'", derived.name, fixed),
            );
        }
    }
    if let Some(extra) = derived
        .identity_constraints
        .iter()
        .find(|ic| !base.identity_constraints.contains(ic))
    {
        return fail(
            NAME_AND_TYPE_OK,
            format!("element '{}' adds identity constraint {}", derived.name, extra),
        );
    }
    if derived.type_id != base.type_id
        && base.type_id != TypeId::ANY_TYPE
        && !is_restriction_derived(lookup, derived.type_id, base.type_id)
    {
        let name = |id: TypeId| {
            lookup
                .lookup_type(id)
                .map_or_else(|| id.to_string(), SchemaType::display_name)
        };
        return fail(
            NAME_AND_TYPE_OK,
            format!(
                "type '{}' of element '{}' is not a restriction of '{}'",
                name(derived.type_id),
                derived.name,
                name(base.type_id)
            ),
        );
    }
    if !derived.block.contains_all(&base.block) {
        return fail(
            NAME_AND_TYPE_OK,
            format!("element '{}' blocks less than the base element", derived.name),
        );
    }
    Ok(())
}

fn ns_compat(base: &WildcardParticle, derived: &ElementParticle) -> Check {
    if !base.wildcard.names.contains(&derived.name) {
        return fail(
            NS_COMPAT,
            format!("element '{}' is not admitted by the base wildcard [{}]", derived.name, base.wildcard.names),
        );
    }
    range_ok(NS_COMPAT, base.occurs, derived.occurs, &format!("element '{}'", derived.name))
}

fn ns_subset(base: &WildcardParticle, derived: &WildcardParticle) -> Check {
    range_ok(NS_SUBSET, base.occurs, derived.occurs, "the wildcard")?;
    if !derived.wildcard.names.is_subset_of(&base.wildcard.names) {
        return fail(
            NS_SUBSET,
            format!(
                "wildcard [{}] admits names the base wildcard [{}] does not",
                derived.wildcard.names, base.wildcard.names
            ),
        );
    }
    if !derived.wildcard.process.is_restriction_of(&base.wildcard.process) {
        return fail(
            NS_SUBSET,
            format!(
                "wildcard processing '{}' is weaker than the base processing '{}'",
                derived.wildcard.process, base.wildcard.process
            ),
        );
    }
    Ok(())
}

fn ns_recurse_check_cardinality<L: ComponentLookup + ?Sized>(
    lookup: &L,
    base: &WildcardParticle,
    derived: &SchemaParticle,
) -> Check {
    // every child is checked against the wildcard as if it could repeat
    let unbounded = SchemaParticle::Wildcard(WildcardParticle {
        occurs: Occurs::zero_or_more(),
        wildcard: base.wildcard.clone(),
    });
    for child in derived.children() {
        particle_valid(lookup, &unbounded, child)?;
    }
    range_ok(
        NS_RECURSE_CHECK_CARDINALITY,
        base.occurs,
        derived.effective_total_range(),
        &derived.describe(),
    )
}

fn recurse_as_if_group<L: ComponentLookup + ?Sized>(
    lookup: &L,
    base: &SchemaParticle,
    derived: &SchemaParticle,
) -> Check {
    let Some(compositor) = base.compositor() else {
        return particle_valid(lookup, base, derived);
    };
    let wrapped = SchemaParticle::group(compositor, Occurs::once(), vec![derived.clone()]);
    particle_valid(lookup, base, &wrapped)
}

fn not_emptiable(rule: &'static str, particle: &SchemaParticle) -> Check {
    fail(
        rule,
        format!(
            "base {} is not emptiable and has no counterpart in the restriction",
            particle.describe()
        ),
    )
}

fn recurse<L: ComponentLookup + ?Sized>(lookup: &L, base: &ModelGroup, derived: &ModelGroup) -> Check {
    range_ok(RECURSE, base.occurs, derived.occurs, "the group")?;
    let mut next = 0;
    for child in &derived.particles {
        loop {
            let Some(candidate) = base.particles.get(next) else {
                return fail(
                    RECURSE,
                    format!("{} has no counterpart in the base content model", child.describe()),
                );
            };
            next += 1;
            match particle_valid(lookup, candidate, child) {
                Ok(()) => break,
                Err(_) if candidate.is_emptiable() => continue,
                Err(failure) => return Err(failure),
            }
        }
    }
    match base.particles[next..].iter().find(|p| !p.is_emptiable()) {
        Some(unmapped) => not_emptiable(RECURSE, unmapped),
        None => Ok(()),
    }
}

fn recurse_lax<L: ComponentLookup + ?Sized>(lookup: &L, base: &ModelGroup, derived: &ModelGroup) -> Check {
    range_ok(RECURSE_LAX, base.occurs, derived.occurs, "the choice")?;
    let mut next = 0;
    for child in &derived.particles {
        loop {
            let Some(candidate) = base.particles.get(next) else {
                return fail(
                    RECURSE_LAX,
                    format!("{} matches no remaining branch of the base choice", child.describe()),
                );
            };
            next += 1;
            if particle_valid(lookup, candidate, child).is_ok() {
                break;
            }
        }
    }
    Ok(())
}

fn recurse_unordered<L: ComponentLookup + ?Sized>(lookup: &L, base: &ModelGroup, derived: &ModelGroup) -> Check {
    range_ok(RECURSE_UNORDERED, base.occurs, derived.occurs, "the group")?;
    let mut mapped = vec![false; base.particles.len()];
    for child in &derived.particles {
        let SchemaParticle::Element(element) = child else {
            return fail(
                RECURSE_UNORDERED,
                format!("{} cannot restrict a member of an all group", child.describe()),
            );
        };
        if element.occurs.max.map_or(true, |max| max > 1) {
            return fail(
                RECURSE_UNORDERED,
                format!("element '{}' may occur more than once", element.name),
            );
        }
        let position = base.particles.iter().position(|p| match p {
            SchemaParticle::Element(b) => b.name == element.name,
            _ => false,
        });
        let Some(position) = position else {
            return fail(
                RECURSE_UNORDERED,
                format!("element '{}' is not a member of the base all group", element.name),
            );
        };
        if mapped[position] {
            return fail(
                RECURSE_UNORDERED,
                format!("element '{}' appears more than once", element.name),
            );
        }
        particle_valid(lookup, &base.particles[position], child)?;
        mapped[position] = true;
    }
    match base
        .particles
        .iter()
        .zip(&mapped)
        .find(|(p, mapped)| !**mapped && !p.is_emptiable())
    {
        Some((unmapped, _)) => not_emptiable(RECURSE_UNORDERED, unmapped),
        None => Ok(()),
    }
}

fn map_and_sum<L: ComponentLookup + ?Sized>(lookup: &L, base: &ModelGroup, derived: &ModelGroup) -> Check {
    let count = derived.particles.len() as u32;
    let summed = Occurs::new(
        derived.occurs.min.saturating_mul(count),
        derived.occurs.max.map(|max| max.saturating_mul(count)),
    );
    range_ok(MAP_AND_SUM, base.occurs, summed, "the sequence")?;
    for child in &derived.particles {
        if !base
            .particles
            .iter()
            .any(|candidate| particle_valid(lookup, candidate, child).is_ok())
        {
            return fail(
                MAP_AND_SUM,
                format!("{} matches no branch of the base choice", child.describe()),
            );
        }
    }
    Ok(())
}

/// Content category and content model of a restriction
pub(crate) fn content_restriction_ok<L: ComponentLookup + ?Sized>(
    lookup: &L,
    base: &SchemaType,
    derived: &SchemaType,
) -> Check {
    use ContentCategory::{ElementOnly, Empty, Mixed, Simple};

    let compatible = match derived.content {
        Simple => base.content == Simple || (base.content == Mixed && base.is_emptiable()),
        Empty => base.content == Empty || (matches!(base.content, Mixed | ElementOnly) && base.is_emptiable()),
        Mixed => base.content == Mixed,
        ElementOnly => matches!(base.content, Mixed | ElementOnly),
    };
    if !compatible {
        return fail(
            CONTENT_RESTRICT,
            format!("{} content cannot restrict {} content", derived.content, base.content),
        );
    }

    if !matches!(derived.content, Mixed | ElementOnly) {
        return Ok(());
    }
    match (&base.particle, &derived.particle) {
        (Some(base_particle), Some(derived_particle)) => particle_valid(lookup, base_particle, derived_particle),
        (Some(base_particle), None) if !base_particle.is_emptiable() => fail(
            CONTENT_RESTRICT,
            format!("the base content model {} is not emptiable", base_particle.describe()),
        ),
        (None, Some(derived_particle)) => fail(
            CONTENT_RESTRICT,
            format!("{} cannot restrict an empty content model", derived_particle.describe()),
        ),
        _ => Ok(()),
    }
}

/// Attribute uses and wildcard of a restriction; one message per problem
pub(crate) fn attribute_restriction_problems<L: ComponentLookup + ?Sized>(
    lookup: &L,
    base: &AttributeModel,
    derived: &AttributeModel,
) -> Vec<String> {
    let mut problems = Vec::new();
    for (name, derived_use) in &derived.uses {
        let Some(base_use) = base.uses.get(name) else {
            if !base.wildcard.as_ref().map_or(false, |w| w.names.contains(name)) {
                problems.push(format!("attribute '{}' is not allowed by the base type", name));
            }
            continue;
        };
        if base_use.required && !derived_use.required {
            problems.push(format!("attribute '{}' is required in the base type", name));
        }
        if derived_use.type_id != base_use.type_id
            && !is_restriction_derived(lookup, derived_use.type_id, base_use.type_id)
        {
            problems.push(format!("type of attribute '{}' does not restrict the base attribute type", name));
        }
        if let Some(fixed) = &base_use.fixed {
            if derived_use.fixed.as_deref() != Some(fixed.as_str()) {
                problems.push(format!("attribute '{}' must keep the base fixed value '{}'", name, fixed));
            }
        }
    }
    for (name, base_use) in &base.uses {
        if base_use.required && !derived.uses.contains_key(name) {
            problems.push(format!("required attribute '{}' of the base type is missing", name));
        }
    }
    match (&derived.wildcard, &base.wildcard) {
        (Some(_), None) => problems.push("attribute wildcard is not allowed by the base type".to_string()),
        (Some(derived), Some(base)) if !derived.is_restriction_of(base) => problems.push(format!(
            "attribute wildcard [{}] is not a subset of the base wildcard [{}]",
            derived, base
        )),
        _ => {}
    }
    problems
}

/// Collects the findings of one checking pass over a resolved context
struct Checker<'c, 'a> {
    ctx: &'c CompileContext<'a>,
    restriction_checks: bool,
    errors: Vec<CompileError>,
    invalid: Vec<TypeId>,
    rejected_members: Vec<QName>,
    checked_values: HashSet<(QName, TypeId, String)>,
}

impl<'c, 'a> Checker<'c, 'a> {
    fn new(ctx: &'c CompileContext<'a>) -> Self {
        Self {
            ctx,
            restriction_checks: ctx.options.restriction_checks,
            errors: Vec::new(),
            invalid: Vec::new(),
            rejected_members: Vec::new(),
            checked_values: HashSet::new(),
        }
    }

    fn error(&mut self, category: ErrorCategory, message: String, location: &Option<String>, component: String) {
        let mut error = CompileError::new(category, message).with_component(component);
        if let Some(location) = location {
            error = error.with_location(location.clone());
        }
        self.errors.push(error);
    }

    fn type_error(&mut self, ty: &SchemaType, category: ErrorCategory, message: String) {
        self.error(category, message, &ty.location, ty.display_name());
        self.invalid.push(ty.id);
    }

    fn run(&mut self) {
        let ctx = self.ctx;
        for slot in &ctx.types {
            let Some(ty) = slot.resolved() else {
                continue;
            };
            if ty.role != TypeRole::Declared || ctx.is_foreign(ty.id) {
                continue;
            }
            self.check_type(ty);
        }
        for id in ctx.attribute_names.values() {
            if let Some(attribute) = ctx.resolved_attribute(*id) {
                let attribute_use = attribute.to_use();
                self.check_attribute_value(&attribute_use, &attribute.location, attribute.name.to_string());
            }
        }
        for id in ctx.element_names.values() {
            let Some(element) = ctx.resolved_element(*id) else {
                continue;
            };
            if let Some(value) = element.value_constraint() {
                self.check_element_value(&element.name, element.type_id, value, &element.location);
            }
            self.check_substitution(*id);
        }
    }

    fn check_type(&mut self, ty: &SchemaType) {
        let ctx = self.ctx;
        let base = ty.base.and_then(|id| ctx.resolved_type(id));

        if ty.kind == TypeKind::Complex {
            if let Some(base) = base.filter(|b| !b.is_any_type()) {
                if ty.derivation == DerivationMethod::Restriction {
                    self.check_restriction(base, ty);
                }
            }
            self.check_ids(ty, base);
            for attribute_use in ty.attributes.uses.values() {
                let inherited = base.and_then(|b| b.attributes.get(&attribute_use.name));
                if inherited != Some(attribute_use) {
                    self.check_attribute_value(attribute_use, &ty.location, ty.display_name());
                }
            }
        }

        if let Some(particle) = &ty.particle {
            for leaf in particle.leaves() {
                if let SchemaParticle::Element(element) = leaf {
                    if let (None, Some(value)) = (element.global, element.fixed.as_deref().or(element.default.as_deref())) {
                        self.check_element_value(&element.name, element.type_id, value, &ty.location);
                    }
                }
            }
        }
    }

    fn check_restriction(&mut self, base: &SchemaType, ty: &SchemaType) {
        if self.restriction_checks {
            if let Err(failure) = content_restriction_ok(self.ctx, base, ty) {
                self.type_error(
                    ty,
                    ErrorCategory::RestrictionInvalid,
                    format!(
                        "'{}' is not a valid restriction of '{}': {}",
                        ty.display_name(),
                        base.display_name(),
                        failure
                    ),
                );
            }
        }
        for problem in attribute_restriction_problems(self.ctx, &base.attributes, &ty.attributes) {
            self.type_error(
                ty,
                ErrorCategory::RestrictionInvalid,
                format!("'{}' is not a valid restriction of '{}': {}", ty.display_name(), base.display_name(), problem),
            );
        }
    }

    fn check_ids(&mut self, ty: &SchemaType, base: Option<&SchemaType>) {
        let ctx = self.ctx;
        let ids: Vec<&AttributeUse> = ty
            .attributes
            .uses
            .values()
            .filter(|u| is_id_type(ctx, u.type_id))
            .collect();
        let inherited = base.map_or(0, |b| {
            b.attributes
                .uses
                .values()
                .filter(|u| is_id_type(ctx, u.type_id))
                .count()
        });
        if ids.len() > 1 && ids.len() > inherited {
            self.type_error(
                ty,
                ErrorCategory::Structure,
                format!("type '{}' has more than one attribute of type ID", ty.display_name()),
            );
        }
    }

    fn check_attribute_value(&mut self, attribute_use: &AttributeUse, location: &Option<String>, component: String) {
        let Some(value) = attribute_use.value_constraint() else {
            return;
        };
        if is_id_type(self.ctx, attribute_use.type_id) {
            self.error(
                ErrorCategory::ValueValidity,
                format!("attribute '{}' of type ID cannot have a default or fixed value", attribute_use.name),
                location,
                component,
            );
            return;
        }
        if let Err(e) = validate_value(self.ctx, attribute_use.type_id, value) {
            self.error(
                ErrorCategory::ValueValidity,
                format!("value '{}' of attribute '{}' is not valid: {}", value, attribute_use.name, e),
                location,
                component,
            );
        }
    }

    fn check_element_value(&mut self, name: &QName, type_id: TypeId, value: &str, location: &Option<String>) {
        if !self
            .checked_values
            .insert((name.clone(), type_id, value.to_string()))
        {
            return;
        }
        let Some(ty) = self.ctx.resolved_type(type_id) else {
            return;
        };
        let problem = if ty.simple.is_some() {
            if is_id_type(self.ctx, type_id) {
                Some("a type derived from ID cannot have a default or fixed value".to_string())
            } else {
                validate_value(self.ctx, type_id, value)
                    .err()
                    .map(|e| format!("value '{}' is not valid: {}", value, e))
            }
        } else {
            match ty.content {
                ContentCategory::Mixed if ty.is_emptiable() => None,
                ContentCategory::Mixed => Some("mixed content without an emptiable content model cannot have a default".to_string()),
                category => Some(format!("{} content cannot have a default or fixed value", category)),
            }
        };
        if let Some(problem) = problem {
            self.error(
                ErrorCategory::ValueValidity,
                format!("element '{}': {}", name, problem),
                location,
                name.to_string(),
            );
        }
    }

    fn check_substitution(&mut self, id: ElementId) {
        let ctx = self.ctx;
        let Some(member) = ctx.resolved_element(id) else {
            return;
        };
        let Some(head) = member.substitution_group.and_then(|h| ctx.resolved_element(h)) else {
            return;
        };

        let problem = if head.final_set.extension && head.final_set.restriction {
            Some(format!("head '{}' is final and cannot have substitution group members", head.name))
        } else {
            match derivation_steps(ctx, member.type_id, head.type_id) {
                None => Some(format!(
                    "type of '{}' does not derive from the type of its substitution group head '{}'",
                    member.name, head.name
                )),
                Some(steps) if (steps.extension && head.final_set.extension)
                    || (steps.restriction && head.final_set.restriction) =>
                {
                    Some(format!(
                        "head '{}' is final for the derivation of the type of '{}'",
                        head.name, member.name
                    ))
                }
                Some(_) => None,
            }
        };
        if let Some(problem) = problem {
            self.error(
                ErrorCategory::RestrictionInvalid,
                format!("inconsistent substitution group member '{}': {}", member.name, problem),
                &member.location,
                member.name.to_string(),
            );
            self.invalid.push(member.document_type);
            self.rejected_members.push(member.name.clone());
        }
    }
}

/// Run every check over the resolved components
pub(crate) fn check(ctx: &mut CompileContext<'_>) {
    let (errors, invalid, rejected) = {
        let mut checker = Checker::new(ctx);
        checker.run();
        (checker.errors, checker.invalid, checker.rejected_members)
    };
    debug!(findings = errors.len(), "checks complete");

    for error in errors {
        ctx.record(error);
    }
    for id in invalid {
        ctx.invalidate(id);
    }
    if !rejected.is_empty() {
        for slot in &mut ctx.elements {
            if let Some(element) = slot.resolved_mut() {
                element.substitution_members.retain(|m| !rejected.contains(m));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::context::degraded_type;
    use crate::compiler::importer::DocumentUnit;
    use crate::compiler::resolver::resolve;
    use crate::compiler::translate::translate;
    use crate::compiler::{BuiltinLoader, CompileOptions};
    use crate::components::{Compositor, DerivationSet, ProcessContents, Wildcard};
    use crate::parsing::SchemaDocument;
    use crate::qnameset::QNameSet;
    use crate::XSD_NAMESPACE;
    use proptest::prelude::*;

    fn element(local: &str, min: u32, max: Option<u32>) -> SchemaParticle {
        SchemaParticle::Element(ElementParticle {
            occurs: Occurs::new(min, max),
            name: QName::local(local),
            type_id: TypeId::ANY_TYPE,
            nillable: false,
            default: None,
            fixed: None,
            block: DerivationSet::default(),
            identity_constraints: Vec::new(),
            global: None,
            is_abstract: false,
        })
    }

    fn typed(local: &str, type_id: TypeId) -> SchemaParticle {
        match element(local, 1, Some(1)) {
            SchemaParticle::Element(mut e) => {
                e.type_id = type_id;
                SchemaParticle::Element(e)
            }
            other => other,
        }
    }

    fn any(namespaces: &str, min: u32, max: Option<u32>) -> SchemaParticle {
        SchemaParticle::Wildcard(WildcardParticle {
            occurs: Occurs::new(min, max),
            wildcard: Wildcard::new(QNameSet::from_wildcard_namespace(namespaces, None), ProcessContents::Strict),
        })
    }

    fn sequence(children: Vec<SchemaParticle>) -> SchemaParticle {
        SchemaParticle::group(Compositor::Sequence, Occurs::once(), children)
    }

    fn choice(children: Vec<SchemaParticle>) -> SchemaParticle {
        SchemaParticle::group(Compositor::Choice, Occurs::once(), children)
    }

    fn all(children: Vec<SchemaParticle>) -> SchemaParticle {
        SchemaParticle::group(Compositor::All, Occurs::once(), children)
    }

    fn with_lookup<R>(f: impl FnOnce(&CompileContext<'_>) -> R) -> R {
        let options = CompileOptions::default();
        let ctx = CompileContext::new(&options, &BuiltinLoader);
        f(&ctx)
    }

    fn builtin(ctx: &CompileContext<'_>, local: &str) -> TypeId {
        ctx.type_names[&QName::namespaced(XSD_NAMESPACE, local)]
    }

    #[test]
    fn test_optional_base_particle_may_be_dropped() {
        with_lookup(|ctx| {
            let base = sequence(vec![element("a", 1, Some(1)), element("b", 0, Some(1))]);
            let derived = sequence(vec![element("a", 1, Some(1))]).normalized();
            assert_eq!(particle_valid(ctx, &base, &derived), Ok(()));
        });
    }

    #[test]
    fn test_required_base_particle_may_not_be_dropped() {
        with_lookup(|ctx| {
            let base = sequence(vec![element("a", 1, Some(1)), element("b", 1, Some(1))]);
            let derived = sequence(vec![element("a", 1, Some(1))]).normalized();
            let failure = particle_valid(ctx, &base, &derived).unwrap_err();
            assert_eq!(failure.rule, RECURSE);
            assert!(failure.message.contains("element 'b'"), "{}", failure);
        });
    }

    #[test]
    fn test_name_and_type() {
        with_lookup(|ctx| {
            let int = builtin(ctx, "int");
            let short = builtin(ctx, "short");
            let string = builtin(ctx, "string");

            assert_eq!(particle_valid(ctx, &typed("a", int), &typed("a", short)), Ok(()));
            let failure = particle_valid(ctx, &typed("a", int), &typed("a", string)).unwrap_err();
            assert_eq!(failure.rule, NAME_AND_TYPE_OK);
            let failure = particle_valid(ctx, &typed("a", int), &typed("b", int)).unwrap_err();
            assert!(failure.message.contains("does not match"));
            assert!(particle_valid(ctx, &element("a", 0, None), &element("a", 2, Some(5))).is_ok());
            assert!(particle_valid(ctx, &element("a", 1, Some(1)), &element("a", 0, Some(1))).is_err());
        });
    }

    #[test]
    fn test_nillable_and_fixed() {
        with_lookup(|ctx| {
            let mut nillable = element("a", 1, Some(1));
            if let SchemaParticle::Element(e) = &mut nillable {
                e.nillable = true;
            }
            assert!(particle_valid(ctx, &element("a", 1, Some(1)), &nillable).is_err());
            assert!(particle_valid(ctx, &nillable, &element("a", 1, Some(1))).is_ok());

            let mut fixed = element("a", 1, Some(1));
            if let SchemaParticle::Element(e) = &mut fixed {
                e.fixed = Some("x".to_string());
            }
            let failure = particle_valid(ctx, &fixed, &element("a", 1, Some(1))).unwrap_err();
            assert!(failure.message.contains("fixed"));
        });
    }

    #[test]
    fn test_wildcard_rules() {
        with_lookup(|ctx| {
            let base = any("##any", 0, None);
            assert!(particle_valid(ctx, &base, &element("a", 1, Some(3))).is_ok());
            assert!(particle_valid(ctx, &base, &any("urn:x", 0, Some(1))).is_ok());
            assert!(particle_valid(ctx, &base, &sequence(vec![element("a", 1, Some(1)), element("b", 0, None)])).is_ok());

            let narrow = any("urn:x", 0, Some(1));
            let failure = particle_valid(ctx, &narrow, &element("a", 1, Some(1))).unwrap_err();
            assert_eq!(failure.rule, NS_COMPAT);
            let failure = particle_valid(ctx, &narrow, &any("##any", 0, Some(1))).unwrap_err();
            assert_eq!(failure.rule, NS_SUBSET);

            let bounded = any("##any", 0, Some(2));
            let three = sequence(vec![element("a", 1, Some(1)), element("b", 1, Some(1)), element("c", 1, Some(1))]);
            let failure = particle_valid(ctx, &bounded, &three).unwrap_err();
            assert_eq!(failure.rule, NS_RECURSE_CHECK_CARDINALITY);
        });
    }

    #[test]
    fn test_choice_rules() {
        with_lookup(|ctx| {
            let base = choice(vec![element("a", 1, Some(1)), element("b", 1, Some(1)), element("c", 1, Some(1))]);
            assert!(particle_valid(ctx, &base, &choice(vec![element("a", 1, Some(1)), element("c", 1, Some(1))])).is_ok());
            let failure =
                particle_valid(ctx, &base, &choice(vec![element("c", 1, Some(1)), element("a", 1, Some(1))])).unwrap_err();
            assert_eq!(failure.rule, RECURSE_LAX);

            // a choice that may repeat can be narrowed to a sequence of its branches
            let repeating = SchemaParticle::group(
                Compositor::Choice,
                Occurs::new(1, Some(2)),
                vec![element("a", 1, Some(1)), element("b", 1, Some(1))],
            );
            let pair = sequence(vec![element("b", 1, Some(1)), element("a", 1, Some(1))]);
            assert!(particle_valid(ctx, &repeating, &pair).is_ok());
            let failure = particle_valid(ctx, &base, &pair).unwrap_err();
            assert_eq!(failure.rule, MAP_AND_SUM);

            // a single element against a choice is wrapped in a choice first
            assert!(particle_valid(ctx, &base, &element("b", 1, Some(1))).is_ok());
        });
    }

    #[test]
    fn test_all_rules() {
        with_lookup(|ctx| {
            let base = all(vec![element("a", 1, Some(1)), element("b", 0, Some(1)), element("c", 1, Some(1))]);
            let reordered = sequence(vec![element("c", 1, Some(1)), element("a", 1, Some(1))]);
            assert!(particle_valid(ctx, &base, &reordered).is_ok());

            let missing = sequence(vec![element("b", 1, Some(1)), element("a", 1, Some(1))]);
            let failure = particle_valid(ctx, &base, &missing).unwrap_err();
            assert_eq!(failure.rule, RECURSE_UNORDERED);
            assert!(failure.message.contains("element 'c'"));

            let subset = all(vec![element("a", 1, Some(1)), element("c", 1, Some(1))]);
            assert!(particle_valid(ctx, &base, &subset).is_ok());
        });
    }

    #[test]
    fn test_unlisted_pairs_rejected() {
        with_lookup(|ctx| {
            let failure = particle_valid(ctx, &element("a", 1, Some(1)), &any("##any", 1, Some(1))).unwrap_err();
            assert_eq!(failure.rule, PARTICLE_RESTRICT);
            let failure = particle_valid(
                ctx,
                &sequence(vec![element("a", 1, Some(1)), element("b", 1, Some(1))]),
                &choice(vec![element("a", 1, Some(1)), element("b", 1, Some(1))]),
            )
            .unwrap_err();
            assert_eq!(failure.rule, PARTICLE_RESTRICT);
        });
    }

    #[test]
    fn test_attribute_restriction_problems() {
        with_lookup(|ctx| {
            let string = builtin(ctx, "string");
            let int = builtin(ctx, "int");
            let attribute = |name: &str, type_id: TypeId, required: bool| AttributeUse {
                name: QName::local(name),
                type_id,
                required,
                default: None,
                fixed: None,
                global: None,
            };
            let mut base = AttributeModel::default();
            base.uses.insert(QName::local("a"), attribute("a", string, true));
            base.uses.insert(QName::local("b"), attribute("b", int, false));

            let mut derived = AttributeModel::default();
            derived.uses.insert(QName::local("b"), attribute("b", string, false));
            derived.uses.insert(QName::local("c"), attribute("c", string, false));

            let problems = attribute_restriction_problems(ctx, &base, &derived);
            assert_eq!(problems.len(), 3, "{:?}", problems);
            assert!(problems.iter().any(|p| p.contains("'b'")));
            assert!(problems.iter().any(|p| p.contains("'c' is not allowed")));
            assert!(problems.iter().any(|p| p.contains("'a' of the base type is missing")));
        });
    }

    proptest! {
        #[test]
        fn element_range_restriction_follows_occurrence_range(
            dmin in 0u32..5, dmax in prop::option::of(0u32..5),
            bmin in 0u32..5, bmax in prop::option::of(0u32..5),
        ) {
            let options = CompileOptions::default();
            let ctx = CompileContext::new(&options, &BuiltinLoader);
            let result = particle_valid(&ctx, &element("a", bmin, bmax), &element("a", dmin, dmax));
            let expected = Occurs::new(dmin, dmax).is_restriction_of(&Occurs::new(bmin, bmax));
            prop_assert_eq!(result.is_ok(), expected);
        }
    }

    fn with_content(id: usize, content: ContentCategory, particle: Option<SchemaParticle>) -> SchemaType {
        let mut ty = degraded_type(TypeId(id));
        ty.content = content;
        ty.particle = particle;
        ty
    }

    #[test]
    fn test_content_category_table() {
        use ContentCategory::{ElementOnly, Empty, Mixed, Simple};

        with_lookup(|ctx| {
            let optional = || Some(sequence(vec![element("a", 0, Some(1))]));
            let required = || Some(sequence(vec![element("a", 1, Some(1))]));
            let ok = |base: SchemaType, derived: SchemaType| content_restriction_ok(ctx, &base, &derived).is_ok();

            let simple = || with_content(101, Simple, None);
            assert!(ok(with_content(100, Simple, None), simple()));
            assert!(ok(with_content(100, Mixed, optional()), simple()));
            assert!(!ok(with_content(100, Mixed, required()), simple()));
            assert!(!ok(with_content(100, ElementOnly, optional()), simple()));

            let empty = || with_content(101, Empty, None);
            assert!(ok(with_content(100, Empty, None), empty()));
            assert!(ok(with_content(100, ElementOnly, optional()), empty()));
            assert!(ok(with_content(100, Mixed, optional()), empty()));
            assert!(!ok(with_content(100, ElementOnly, required()), empty()));
            assert!(!ok(with_content(100, Simple, None), empty()));

            assert!(ok(with_content(100, Mixed, optional()), with_content(101, Mixed, optional())));
            assert!(!ok(with_content(100, ElementOnly, optional()), with_content(101, Mixed, optional())));
            assert!(ok(with_content(100, Mixed, optional()), with_content(101, ElementOnly, optional())));
            assert!(!ok(with_content(100, Empty, None), with_content(101, ElementOnly, optional())));

            let failure = content_restriction_ok(ctx, &with_content(100, Mixed, required()), &simple()).unwrap_err();
            assert_eq!(failure.rule, CONTENT_RESTRICT);
        });
    }

    fn checked<'a>(options: &'a CompileOptions, body: &str) -> CompileContext<'a> {
        let xsd = format!(
            r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema" xmlns:t="urn:t" targetNamespace="urn:t">{}</xs:schema>"#,
            body
        );
        let document = SchemaDocument::parse_str(&xsd, Some("t.xsd")).unwrap();
        let mut ctx = CompileContext::new(options, &BuiltinLoader);
        translate(
            &mut ctx,
            vec![DocumentUnit {
                namespace: document.target_namespace.clone(),
                document,
                chameleon: false,
                redefine: None,
            }],
        );
        resolve(&mut ctx);
        check(&mut ctx);
        ctx
    }

    #[test]
    fn test_inconsistent_member_leaves_substitution_group() {
        let options = CompileOptions::default();
        let ctx = checked(
            &options,
            r#"<xs:element name="head" type="xs:int"/>
               <xs:element name="wrong" type="xs:string" substitutionGroup="t:head"/>
               <xs:element name="right" type="xs:short" substitutionGroup="t:head"/>"#,
        );
        let element = |local: &str| {
            ctx.resolved_element(ctx.element_names[&QName::namespaced("urn:t", local)])
                .unwrap()
        };

        assert_eq!(ctx.errors.len(), 1, "{:?}", ctx.errors);
        assert!(ctx.errors[0].message.contains("inconsistent substitution group member"));

        let head = element("head");
        assert!(!head.substitution_members.contains(&QName::namespaced("urn:t", "wrong")));
        assert!(head.substitution_members.contains(&QName::namespaced("urn:t", "right")));
        assert!(ctx.invalid.contains(&element("wrong").document_type));
        assert!(!ctx.invalid.contains(&element("right").document_type));
    }
}
