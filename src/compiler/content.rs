//! Content model and attribute model translation
//!
//! Turns particle and attribute declarations into resolved [`SchemaParticle`]
//! trees and [`AttributeModel`]s. Named model groups and attribute groups
//! are expanded in place; each group is expanded once per compilation and
//! the result reused, so identity constraints and anonymous types declared
//! inside a group are registered once.

use std::rc::Rc;

use crate::components::{
    AttributeModel, AttributeUse, DerivationSet, ElementParticle, SchemaParticle, TypeId, Wildcard,
    WildcardParticle,
};
use crate::error::ErrorCategory;
use crate::namespaces::QName;
use crate::parsing::{AttributeDecl, AttributesDecl, ParticleDecl, TypeDecl, UseKind, WildcardDecl};
use crate::qnameset::QNameSet;

use super::context::{CompileContext, ExpandedAttributes, Scope};

/// Where a content model is being translated
pub(crate) struct Site<'s> {
    pub scope: &'s Rc<Scope>,
    /// Type owning the content; enclosing type of inline anonymous types
    pub owner: Option<TypeId>,
    /// Component name used in diagnostics
    pub label: &'s str,
    /// Name and original of the model group being redefined, if any
    pub redefined_group: Option<(&'s QName, usize)>,
    /// Name and original of the attribute group being redefined, if any
    pub redefined_attribute_group: Option<(&'s QName, usize)>,
}

impl<'s> Site<'s> {
    pub(crate) fn new(scope: &'s Rc<Scope>, owner: Option<TypeId>, label: &'s str) -> Self {
        Self {
            scope,
            owner,
            label,
            redefined_group: None,
            redefined_attribute_group: None,
        }
    }

    fn component(&self) -> Option<String> {
        Some(self.label.to_string())
    }
}

/// The wildcard a declaration describes, relative to the document's
/// target namespace
pub(crate) fn wildcard_of(decl: &WildcardDecl, scope: &Scope) -> Wildcard {
    Wildcard::new(
        QNameSet::from_wildcard_namespace(&decl.namespace, scope.namespace.as_deref()),
        decl.process,
    )
}

/// Translate a particle declaration; None when it contributes nothing
pub(crate) fn translate_particle(
    ctx: &mut CompileContext<'_>,
    decl: &ParticleDecl,
    site: &Site<'_>,
    anonymous: &mut Vec<TypeId>,
) -> Option<SchemaParticle> {
    if decl.occurs().is_empty() {
        return None;
    }
    match decl {
        ParticleDecl::Group {
            compositor,
            occurs,
            particles,
        } => {
            let children = particles
                .iter()
                .filter_map(|child| translate_particle(ctx, child, site, anonymous))
                .collect();
            Some(SchemaParticle::group(*compositor, *occurs, children))
        }
        ParticleDecl::GroupRef { reference, occurs } => {
            let name = site.scope.qualify(reference);
            let index = match site.redefined_group {
                Some((redefined, original)) if *redefined == name => Some(original),
                _ => ctx.group_names.get(&name).copied(),
            };
            let Some(index) = index else {
                ctx.unresolved("model group", &name, site.scope, site.component());
                return None;
            };
            let particle = expand_group(ctx, index, site.owner, anonymous)?;
            Some(particle.with_occurs(*occurs))
        }
        ParticleDecl::Any { occurs, wildcard } => Some(SchemaParticle::Wildcard(WildcardParticle {
            occurs: *occurs,
            wildcard: wildcard_of(wildcard, site.scope),
        })),
        ParticleDecl::Element(element) => {
            if let Some(reference) = &element.reference {
                let name = site.scope.qualify(reference);
                let Some(id) = ctx.find_element(&name) else {
                    ctx.unresolved("element", &name, site.scope, site.component());
                    return None;
                };
                let mut particle = ctx.resolved_element(id)?.to_particle();
                particle.occurs = element.occurs;
                return Some(SchemaParticle::Element(particle));
            }

            let local = element.name.as_deref()?;
            let scope = site.scope;
            let type_id = match (&element.type_name, &element.inline_type) {
                (Some(type_name), _) => ctx.type_reference(type_name, scope, TypeId::ANY_TYPE, site.label),
                (None, Some(inline)) => {
                    let id = ctx.push_anonymous(inline.clone(), scope, site.owner);
                    anonymous.push(id);
                    id
                }
                (None, None) => TypeId::ANY_TYPE,
            };
            let identity_constraints = element
                .identity_constraints
                .iter()
                .map(|ic| ctx.push_identity(ic, scope))
                .collect();

            Some(SchemaParticle::Element(ElementParticle {
                occurs: element.occurs,
                name: scope.element_name(local, element.qualified),
                type_id,
                nillable: element.nillable,
                default: element.default.clone(),
                fixed: element.fixed.clone(),
                block: element
                    .block
                    .unwrap_or_else(|| scope.block_default.intersect(&DerivationSet::element_block())),
                identity_constraints,
                global: None,
                is_abstract: false,
            }))
        }
    }
}

fn expand_group(
    ctx: &mut CompileContext<'_>,
    index: usize,
    owner: Option<TypeId>,
    anonymous: &mut Vec<TypeId>,
) -> Option<SchemaParticle> {
    if let Some(cached) = ctx.group_cache.get(&index) {
        return cached.clone();
    }
    let (name, particle, scope, original) = {
        let entry = &ctx.groups[index];
        (
            entry.name.clone(),
            entry.decl.particle.clone(),
            Rc::clone(&entry.scope),
            entry.original,
        )
    };
    if ctx.group_stack.contains(&index) {
        ctx.report(
            ErrorCategory::CyclicDependency,
            format!("model group '{}' contains itself", name),
            &scope,
            Some(name.to_string()),
        );
        return None;
    }

    ctx.group_stack.push(index);
    let label = name.to_string();
    let site = Site {
        redefined_group: original.map(|o| (&name, o)),
        ..Site::new(&scope, owner, &label)
    };
    let expanded = particle
        .as_ref()
        .and_then(|p| translate_particle(ctx, p, &site, anonymous));
    ctx.group_stack.pop();

    ctx.group_cache.insert(index, expanded.clone());
    expanded
}

/// Translate the attribute declarations of a type or attribute group
pub(crate) fn translate_attributes(
    ctx: &mut CompileContext<'_>,
    decl: &AttributesDecl,
    site: &Site<'_>,
    anonymous: &mut Vec<TypeId>,
) -> ExpandedAttributes {
    let mut out = ExpandedAttributes::default();

    for attribute in &decl.uses {
        let Some((name, attribute_use)) = attribute_use(ctx, attribute, site, anonymous) else {
            continue;
        };
        if attribute.use_kind == UseKind::Prohibited {
            out.prohibited.push(name);
            continue;
        }
        add_use(ctx, &mut out.model, attribute_use, site);
    }

    let mut group_wildcard: Option<Wildcard> = None;
    for reference in &decl.group_refs {
        let name = site.scope.qualify(reference);
        let index = match site.redefined_attribute_group {
            Some((redefined, original)) if *redefined == name => Some(original),
            _ => ctx.attribute_group_names.get(&name).copied(),
        };
        let Some(index) = index else {
            ctx.unresolved("attribute group", &name, site.scope, site.component());
            continue;
        };
        let expanded = expand_attribute_group(ctx, index, site.owner, anonymous);
        for attribute_use in expanded.model.uses.into_values() {
            add_use(ctx, &mut out.model, attribute_use, site);
        }
        out.prohibited.extend(expanded.prohibited);
        if let Some(wildcard) = expanded.model.wildcard {
            group_wildcard = Some(match group_wildcard {
                Some(existing) => existing.intersect(&wildcard),
                None => wildcard,
            });
        }
    }

    out.model.wildcard = match (decl.wildcard.as_ref(), group_wildcard) {
        (Some(local), Some(groups)) => Some(wildcard_of(local, site.scope).intersect(&groups)),
        (Some(local), None) => Some(wildcard_of(local, site.scope)),
        (None, groups) => groups,
    };
    out
}

fn add_use(ctx: &mut CompileContext<'_>, model: &mut AttributeModel, attribute_use: AttributeUse, site: &Site<'_>) {
    if model.uses.contains_key(&attribute_use.name) {
        ctx.report(
            ErrorCategory::Structure,
            format!("attribute '{}' is declared more than once", attribute_use.name),
            site.scope,
            site.component(),
        );
        return;
    }
    model.uses.insert(attribute_use.name.clone(), attribute_use);
}

fn attribute_use(
    ctx: &mut CompileContext<'_>,
    decl: &AttributeDecl,
    site: &Site<'_>,
    anonymous: &mut Vec<TypeId>,
) -> Option<(QName, AttributeUse)> {
    let required = decl.use_kind == UseKind::Required;

    if let Some(reference) = &decl.reference {
        let name = site.scope.qualify(reference);
        let Some(id) = ctx.find_attribute(&name) else {
            ctx.unresolved("attribute", &name, site.scope, site.component());
            return None;
        };
        let mut attribute_use = ctx.resolved_attribute(id)?.to_use();
        attribute_use.required = required;
        if decl.default.is_some() || decl.fixed.is_some() {
            attribute_use.default = decl.default.clone();
            attribute_use.fixed = decl.fixed.clone();
        }
        return Some((name, attribute_use));
    }

    let local = decl.name.as_deref()?;
    let name = site.scope.attribute_name(local, decl.qualified);
    let type_id = match (&decl.type_name, &decl.inline_type) {
        (Some(type_name), _) => ctx.type_reference(type_name, site.scope, TypeId::ANY_SIMPLE_TYPE, site.label),
        (None, Some(inline)) => {
            let id = ctx.push_anonymous(TypeDecl::Simple(inline.clone()), site.scope, site.owner);
            anonymous.push(id);
            id
        }
        (None, None) => TypeId::ANY_SIMPLE_TYPE,
    };
    Some((
        name.clone(),
        AttributeUse {
            name,
            type_id,
            required,
            default: decl.default.clone(),
            fixed: decl.fixed.clone(),
            global: None,
        },
    ))
}

fn expand_attribute_group(
    ctx: &mut CompileContext<'_>,
    index: usize,
    owner: Option<TypeId>,
    anonymous: &mut Vec<TypeId>,
) -> ExpandedAttributes {
    if let Some(cached) = ctx.attribute_group_cache.get(&index) {
        return cached.clone();
    }
    let (name, attributes, scope, original) = {
        let entry = &ctx.attribute_groups[index];
        (
            entry.name.clone(),
            entry.decl.attributes.clone(),
            Rc::clone(&entry.scope),
            entry.original,
        )
    };
    if ctx.attribute_group_stack.contains(&index) {
        ctx.report(
            ErrorCategory::CyclicDependency,
            format!("attribute group '{}' contains itself", name),
            &scope,
            Some(name.to_string()),
        );
        return ExpandedAttributes::default();
    }

    ctx.attribute_group_stack.push(index);
    let label = name.to_string();
    let site = Site {
        redefined_attribute_group: original.map(|o| (&name, o)),
        ..Site::new(&scope, owner, &label)
    };
    let expanded = translate_attributes(ctx, &attributes, &site, anonymous);
    ctx.attribute_group_stack.pop();

    ctx.attribute_group_cache.insert(index, expanded.clone());
    expanded
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::context::{Slot, TypeBuilder};
    use crate::compiler::importer::DocumentUnit;
    use crate::compiler::translate::translate;
    use crate::compiler::{BuiltinLoader, CompileOptions};
    use crate::components::{Compositor, Occurs, ProcessContents};
    use crate::parsing::{ComplexTypeDecl, SchemaDocument};

    fn context_with<'a>(options: &'a CompileOptions, xsd: &str) -> CompileContext<'a> {
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

    fn content_of(ctx: &mut CompileContext<'_>, type_name: &str) -> Option<SchemaParticle> {
        let id = ctx.type_names[&QName::namespaced("urn:t", type_name)];
        let decl = match &ctx.types[id.index()] {
            Slot::Pending(TypeBuilder::Declared {
                decl: TypeDecl::Complex(c),
                ..
            }) => c.clone(),
            _ => ComplexTypeDecl::implicit(None, None),
        };
        let scope = Rc::new(Scope {
            namespace: Some("urn:t".to_string()),
            ..Scope::default()
        });
        let mut anonymous = Vec::new();
        let site = Site::new(&scope, Some(id), type_name);
        decl.particle
            .as_ref()
            .and_then(|p| translate_particle(ctx, p, &site, &mut anonymous))
            .map(SchemaParticle::normalized)
    }

    #[test]
    fn test_group_reference_expanded_with_occurs() {
        let options = CompileOptions::default();
        let mut ctx = context_with(
            &options,
            r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema" xmlns:t="urn:t" targetNamespace="urn:t">
                <xs:group name="G"><xs:sequence><xs:element name="a"/><xs:element name="b"/></xs:sequence></xs:group>
                <xs:complexType name="T"><xs:sequence><xs:group ref="t:G" maxOccurs="3"/></xs:sequence></xs:complexType>
            </xs:schema>"#,
        );

        let particle = content_of(&mut ctx, "T").unwrap();
        assert_eq!(particle.compositor(), Some(Compositor::Sequence));
        assert_eq!(particle.occurs(), Occurs::new(1, Some(3)));
        assert_eq!(particle.children().len(), 2);
        assert!(ctx.errors.is_empty(), "{:?}", ctx.errors);
    }

    #[test]
    fn test_circular_group_reported() {
        let options = CompileOptions::default();
        let mut ctx = context_with(
            &options,
            r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema" xmlns:t="urn:t" targetNamespace="urn:t">
                <xs:group name="G"><xs:sequence><xs:element name="a"/><xs:group ref="t:G"/></xs:sequence></xs:group>
                <xs:complexType name="T"><xs:group ref="t:G"/></xs:complexType>
            </xs:schema>"#,
        );

        content_of(&mut ctx, "T");
        assert!(ctx
            .errors
            .iter()
            .any(|e| e.category == ErrorCategory::CyclicDependency));
    }

    #[test]
    fn test_attribute_group_wildcards_intersect() {
        let options = CompileOptions::default();
        let mut ctx = context_with(
            &options,
            r###"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema" xmlns:t="urn:t" targetNamespace="urn:t">
                <xs:attributeGroup name="A">
                  <xs:attribute name="x" type="xs:string" use="required"/>
                  <xs:anyAttribute namespace="##other" processContents="lax"/>
                </xs:attributeGroup>
            </xs:schema>"###,
        );
        let scope = Rc::new(Scope {
            namespace: Some("urn:t".to_string()),
            ..Scope::default()
        });
        let decl = AttributesDecl {
            uses: Vec::new(),
            group_refs: vec![QName::namespaced("urn:t", "A")],
            wildcard: Some(WildcardDecl {
                namespace: "##any".to_string(),
                process: ProcessContents::Strict,
            }),
        };
        let mut anonymous = Vec::new();
        let expanded = translate_attributes(&mut ctx, &decl, &Site::new(&scope, None, "T"), &mut anonymous);

        let x = expanded.model.get(&QName::local("x")).unwrap();
        assert!(x.required);
        let wildcard = expanded.model.wildcard.unwrap();
        assert_eq!(wildcard.process, ProcessContents::Strict);
        assert!(!wildcard.names.contains(&QName::namespaced("urn:t", "y")));
        assert!(wildcard.names.contains(&QName::namespaced("urn:o", "y")));
    }

    #[test]
    fn test_unknown_group_reference() {
        let options = CompileOptions::default();
        let mut ctx = context_with(
            &options,
            r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema" xmlns:t="urn:t" targetNamespace="urn:t">
                <xs:complexType name="T"><xs:group ref="t:Missing"/></xs:complexType>
            </xs:schema>"#,
        );

        assert!(content_of(&mut ctx, "T").is_none());
        assert_eq!(ctx.errors.len(), 1);
        assert_eq!(ctx.errors[0].category, ErrorCategory::Reference);
    }
}
