//! Translation of document units into the compilation tables
//!
//! Every top-level declaration of every unit is given a name-table entry
//! and, for types, elements and attributes, a pending arena slot. Nothing
//! is resolved here. Redefinitions replace the component they redefine;
//! the original stays reachable only from the redefinition itself.

use std::collections::HashMap;
use std::rc::Rc;

use tracing::debug;

use crate::components::{AttributeId, DerivationSet, ElementId, TypeId};
use crate::error::ErrorCategory;
use crate::namespaces::QName;
use crate::parsing::{AttributeGroupDecl, GroupDecl, TypeDecl};

use super::context::{
    AttributeEntry, AttributeGroupEntry, CompileContext, ElementEntry, GroupEntry, Scope, Slot,
    TypeBuilder,
};
use super::importer::DocumentUnit;

/// Register the components of every unit
pub(crate) fn translate(ctx: &mut CompileContext<'_>, units: Vec<DocumentUnit>) {
    for unit in units {
        translate_unit(ctx, unit);
    }

    let total = ctx.types.len() + ctx.elements.len() + ctx.attributes.len();
    if let Err(e) = ctx.options.limits.check_components(total) {
        ctx.report(ErrorCategory::Resource, e.to_string(), &Scope::default(), None);
    }
    debug!(
        types = ctx.type_names.len(),
        elements = ctx.element_names.len(),
        attributes = ctx.attribute_names.len(),
        "translation complete"
    );
}

fn translate_unit(ctx: &mut CompileContext<'_>, unit: DocumentUnit) {
    let document = unit.document;
    let scope = Rc::new(Scope {
        namespace: unit.namespace.clone(),
        chameleon: unit.chameleon,
        element_qualified: document.element_form_qualified,
        attribute_qualified: document.attribute_form_qualified,
        block_default: document.block_default,
        final_default: document.final_default,
        location: document.location.clone(),
    });

    // names the redefinition replaces, mapped to the replaced component
    let mut hidden_types: HashMap<QName, TypeId> = HashMap::new();
    let mut hidden_groups: HashMap<QName, usize> = HashMap::new();
    let mut hidden_attribute_groups: HashMap<QName, usize> = HashMap::new();
    let redefined: Vec<QName> = unit
        .redefine
        .iter()
        .flat_map(|r| {
            r.redefine
                .types
                .iter()
                .filter_map(TypeDecl::name)
                .chain(r.redefine.groups.iter().map(|g| g.name.as_str()))
                .chain(r.redefine.attribute_groups.iter().map(|g| g.name.as_str()))
                .map(|name| scope.global_name(name))
                .collect::<Vec<_>>()
        })
        .collect();

    for decl in document.types {
        let Some(local) = decl.name().map(str::to_string) else {
            continue;
        };
        let name = scope.global_name(&local);
        let builder = TypeBuilder::Declared {
            decl,
            scope: Rc::clone(&scope),
            name: Some(name.clone()),
            outer: None,
            original: None,
        };
        if redefined.contains(&name) {
            let id = ctx.push_type(Slot::Pending(builder));
            hidden_types.insert(name, id);
        } else {
            register_type(ctx, name, builder, &scope);
        }
    }

    for decl in document.elements {
        let Some(local) = decl.name.clone() else {
            continue;
        };
        let name = scope.global_name(&local);
        if ctx.element_names.contains_key(&name) {
            duplicate(ctx, "element", &name, &scope);
            continue;
        }
        let id = ElementId(ctx.elements.len());
        ctx.elements.push(Slot::Pending(ElementEntry {
            decl,
            scope: Rc::clone(&scope),
        }));
        ctx.element_names.insert(name, id);
    }

    for decl in document.attributes {
        let Some(local) = decl.name.clone() else {
            continue;
        };
        let name = scope.global_name(&local);
        if ctx.attribute_names.contains_key(&name) {
            duplicate(ctx, "attribute", &name, &scope);
            continue;
        }
        let id = AttributeId(ctx.attributes.len());
        ctx.attributes.push(Slot::Pending(AttributeEntry {
            decl,
            scope: Rc::clone(&scope),
        }));
        ctx.attribute_names.insert(name, id);
    }

    for decl in document.groups {
        let name = scope.global_name(&decl.name);
        let hidden = redefined.contains(&name);
        let index = push_group(ctx, name.clone(), decl, &scope, None, !hidden);
        if hidden {
            hidden_groups.insert(name, index);
        }
    }

    for decl in document.attribute_groups {
        let name = scope.global_name(&decl.name);
        let hidden = redefined.contains(&name);
        let index = push_attribute_group(ctx, name.clone(), decl, &scope, None, !hidden);
        if hidden {
            hidden_attribute_groups.insert(name, index);
        }
    }

    let Some(context) = unit.redefine else {
        return;
    };
    // redefining components are written in the redefining document
    let redefining = Rc::new(Scope {
        namespace: unit.namespace,
        chameleon: false,
        element_qualified: context.element_form_qualified,
        attribute_qualified: context.attribute_form_qualified,
        block_default: DerivationSet::default(),
        final_default: DerivationSet::default(),
        location: context.location,
    });

    for decl in context.redefine.types {
        let Some(local) = decl.name().map(str::to_string) else {
            continue;
        };
        let name = redefining.global_name(&local);
        let Some(original) = hidden_types.remove(&name) else {
            not_redefinable(ctx, "type", &name, &redefining);
            continue;
        };
        let builder = TypeBuilder::Declared {
            decl,
            scope: Rc::clone(&redefining),
            name: Some(name.clone()),
            outer: None,
            original: Some(original),
        };
        register_type(ctx, name, builder, &redefining);
    }

    for decl in context.redefine.groups {
        let name = redefining.global_name(&decl.name);
        let Some(original) = hidden_groups.remove(&name) else {
            not_redefinable(ctx, "group", &name, &redefining);
            continue;
        };
        push_group(ctx, name, decl, &redefining, Some(original), true);
    }

    for decl in context.redefine.attribute_groups {
        let name = redefining.global_name(&decl.name);
        let Some(original) = hidden_attribute_groups.remove(&name) else {
            not_redefinable(ctx, "attribute group", &name, &redefining);
            continue;
        };
        push_attribute_group(ctx, name, decl, &redefining, Some(original), true);
    }
}

fn register_type(ctx: &mut CompileContext<'_>, name: QName, builder: TypeBuilder, scope: &Scope) {
    if ctx.type_names.contains_key(&name) {
        duplicate(ctx, "type", &name, scope);
        return;
    }
    let id = ctx.push_type(Slot::Pending(builder));
    ctx.type_names.insert(name, id);
}

fn push_group(
    ctx: &mut CompileContext<'_>,
    name: QName,
    decl: GroupDecl,
    scope: &Rc<Scope>,
    original: Option<usize>,
    visible: bool,
) -> usize {
    if visible && ctx.group_names.contains_key(&name) {
        duplicate(ctx, "group", &name, scope);
    }
    let index = ctx.groups.len();
    ctx.groups.push(GroupEntry {
        name: name.clone(),
        decl,
        scope: Rc::clone(scope),
        original,
    });
    if visible {
        ctx.group_names.entry(name).or_insert(index);
    }
    index
}

fn push_attribute_group(
    ctx: &mut CompileContext<'_>,
    name: QName,
    decl: AttributeGroupDecl,
    scope: &Rc<Scope>,
    original: Option<usize>,
    visible: bool,
) -> usize {
    if visible && ctx.attribute_group_names.contains_key(&name) {
        duplicate(ctx, "attribute group", &name, scope);
    }
    let index = ctx.attribute_groups.len();
    ctx.attribute_groups.push(AttributeGroupEntry {
        name: name.clone(),
        decl,
        scope: Rc::clone(scope),
        original,
    });
    if visible {
        ctx.attribute_group_names.entry(name).or_insert(index);
    }
    index
}

fn duplicate(ctx: &mut CompileContext<'_>, kind: &str, name: &QName, scope: &Scope) {
    ctx.report(
        ErrorCategory::Structure,
        format!("duplicate global {} '{}'", kind, name),
        scope,
        Some(name.to_string()),
    );
}

fn not_redefinable(ctx: &mut CompileContext<'_>, kind: &str, name: &QName, scope: &Scope) {
    ctx.report(
        ErrorCategory::Reference,
        format!("redefined {} '{}' does not exist in the redefined document", kind, name),
        scope,
        Some(name.to_string()),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::importer::RedefineContext;
    use crate::compiler::{BuiltinLoader, CompileOptions};
    use crate::parsing::{Redefine, SchemaDocument};

    fn unit(xsd: &str, namespace: Option<&str>, chameleon: bool) -> DocumentUnit {
        DocumentUnit {
            document: SchemaDocument::parse_str(xsd, Some("t.xsd")).unwrap(),
            namespace: namespace.map(str::to_string),
            chameleon,
            redefine: None,
        }
    }

    #[test]
    fn test_chameleon_names_take_including_namespace() {
        let options = CompileOptions::default();
        let mut ctx = CompileContext::new(&options, &BuiltinLoader);
        let xsd = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
            <xs:complexType name="T"/><xs:element name="e" type="T"/></xs:schema>"#;

        translate(&mut ctx, vec![unit(xsd, Some("urn:a"), true)]);

        assert!(ctx.type_names.contains_key(&QName::namespaced("urn:a", "T")));
        assert!(ctx.element_names.contains_key(&QName::namespaced("urn:a", "e")));
        assert!(ctx.errors.is_empty());
    }

    #[test]
    fn test_duplicates_are_reported() {
        let options = CompileOptions::default();
        let mut ctx = CompileContext::new(&options, &BuiltinLoader);
        let xsd = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema" targetNamespace="urn:a">
            <xs:complexType name="T"/><xs:simpleType name="T"><xs:restriction base="xs:string"/></xs:simpleType>
            </xs:schema>"#;

        translate(&mut ctx, vec![unit(xsd, Some("urn:a"), false)]);

        assert_eq!(ctx.errors.len(), 1);
        assert!(ctx.errors[0].message.contains("duplicate global type"));
    }

    #[test]
    fn test_redefinition_hides_original() {
        let options = CompileOptions::default();
        let mut ctx = CompileContext::new(&options, &BuiltinLoader);
        let base = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema" targetNamespace="urn:a">
            <xs:complexType name="T"/></xs:schema>"#;
        let redefining = SchemaDocument::parse_str(
            r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema" xmlns:a="urn:a" targetNamespace="urn:a">
              <xs:redefine schemaLocation="t.xsd">
                <xs:complexType name="T"><xs:complexContent><xs:extension base="a:T"/></xs:complexContent></xs:complexType>
              </xs:redefine></xs:schema>"#,
            Some("r.xsd"),
        )
        .unwrap();
        let redefine: Redefine = redefining.redefines[0].clone();

        let mut unit = unit(base, Some("urn:a"), false);
        unit.redefine = Some(RedefineContext {
            redefine,
            location: Some("r.xsd".to_string()),
            element_form_qualified: false,
            attribute_form_qualified: false,
        });
        let before = ctx.types.len();
        translate(&mut ctx, vec![unit]);

        assert!(ctx.errors.is_empty(), "{:?}", ctx.errors);
        assert_eq!(ctx.types.len(), before + 2);
        let visible = ctx.type_names[&QName::namespaced("urn:a", "T")];
        match &ctx.types[visible.index()] {
            Slot::Pending(TypeBuilder::Declared { original, .. }) => {
                assert_eq!(*original, Some(TypeId(before)));
            }
            other => panic!("unexpected slot {:?}", other),
        }
    }
}
