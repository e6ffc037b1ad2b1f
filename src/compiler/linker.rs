//! Name lookup across the compilation and linked type systems
//!
//! A reference is looked up in the compilation's own name tables first
//! (the built-in types are seeded there) and then in the linked loader.
//! A component found in a linked system is copied into the compilation
//! arena on first use, together with everything it refers to; later
//! references reuse the copy.

use crate::components::builtins::BUILTIN_TYPES;
use crate::components::{AttributeId, ElementId, IdentityId, SchemaParticle, TypeId, TypeRole};
use crate::namespaces::QName;

use super::context::{CompileContext, Scope, Slot};
use super::typesystem::SchemaTypeSystem;

impl CompileContext<'_> {
    /// Look up a global type by name
    pub(crate) fn find_type(&mut self, name: &QName) -> Option<TypeId> {
        if let Some(id) = self.type_names.get(name) {
            return Some(*id);
        }
        let linked = self.linked;
        let (system, id) = linked.find_type(name)?;
        Some(self.import_type(system, id))
    }

    /// Look up a global element by name
    pub(crate) fn find_element(&mut self, name: &QName) -> Option<ElementId> {
        if let Some(id) = self.element_names.get(name) {
            return Some(*id);
        }
        let linked = self.linked;
        let (system, id) = linked.find_element(name)?;
        Some(self.import_element(system, id))
    }

    /// Look up a global attribute by name
    pub(crate) fn find_attribute(&mut self, name: &QName) -> Option<AttributeId> {
        if let Some(id) = self.attribute_names.get(name) {
            return Some(*id);
        }
        let linked = self.linked;
        let (system, id) = linked.find_attribute(name)?;
        Some(self.import_attribute(system, id))
    }

    /// Look up an identity constraint by name
    pub(crate) fn find_identity(&mut self, name: &QName) -> Option<IdentityId> {
        if let Some(id) = self.identity_names.get(name) {
            return Some(*id);
        }
        let linked = self.linked;
        let (system, id) = linked.find_identity(name)?;
        Some(self.import_identity(system, id))
    }

    /// Resolve a type reference written in `scope`, degrading to
    /// `fallback` when the name is unknown
    pub(crate) fn type_reference(
        &mut self,
        name: &QName,
        scope: &Scope,
        fallback: TypeId,
        component: &str,
    ) -> TypeId {
        let qualified = scope.qualify(name);
        match self.find_type(&qualified) {
            Some(id) => id,
            None => {
                self.unresolved("type", &qualified, scope, Some(component.to_string()));
                fallback
            }
        }
    }

    fn import_type(&mut self, system: &SchemaTypeSystem, id: TypeId) -> TypeId {
        // every arena starts with the same built-in types
        if id.0 < BUILTIN_TYPES.len() {
            return id;
        }
        let key = (system.system_id(), id);
        if let Some(local) = self.foreign.types.get(&key) {
            return *local;
        }
        let Some(foreign) = system.types.get(id.0) else {
            return TypeId::ANY_TYPE;
        };

        let local = self.push_type(Slot::Resolving);
        self.foreign.types.insert(key, local);
        self.foreign.copied_types.insert(local);

        let mut ty = foreign.clone();
        ty.id = local;
        ty.base = ty.base.map(|base| self.import_type(system, base));
        ty.outer = ty.outer.map(|outer| self.import_type(system, outer));
        ty.role = match ty.role {
            TypeRole::Document(element) => TypeRole::Document(self.import_element(system, element)),
            TypeRole::Attribute(attribute) => TypeRole::Attribute(self.import_attribute(system, attribute)),
            role => role,
        };
        ty.particle = ty.particle.take().map(|p| self.import_particle(system, p));
        for attribute in ty.attributes.uses.values_mut() {
            attribute.type_id = self.import_type(system, attribute.type_id);
            attribute.global = attribute.global.map(|g| self.import_attribute(system, g));
        }
        if let Some(simple) = &mut ty.simple {
            simple.item_type = simple.item_type.map(|item| self.import_type(system, item));
            simple.member_types = simple
                .member_types
                .iter()
                .map(|member| self.import_type(system, *member))
                .collect();
        }
        ty.anonymous_types = ty
            .anonymous_types
            .iter()
            .map(|anonymous| self.import_type(system, *anonymous))
            .collect();

        if !system.is_valid(id) {
            self.invalidate(local);
        }
        self.types[local.0] = Slot::Resolved(ty);
        local
    }

    fn import_particle(&mut self, system: &SchemaTypeSystem, particle: SchemaParticle) -> SchemaParticle {
        match particle {
            SchemaParticle::Element(mut element) => {
                element.type_id = self.import_type(system, element.type_id);
                element.global = element.global.map(|g| self.import_element(system, g));
                element.identity_constraints = element
                    .identity_constraints
                    .iter()
                    .map(|ic| self.import_identity(system, *ic))
                    .collect();
                SchemaParticle::Element(element)
            }
            SchemaParticle::Wildcard(_) => particle,
            group => {
                let compositor = group.compositor().unwrap_or_default();
                let occurs = group.occurs();
                let children = group
                    .children()
                    .iter()
                    .cloned()
                    .map(|child| self.import_particle(system, child))
                    .collect();
                SchemaParticle::group(compositor, occurs, children)
            }
        }
    }

    fn import_element(&mut self, system: &SchemaTypeSystem, id: ElementId) -> ElementId {
        let key = (system.system_id(), id);
        if let Some(local) = self.foreign.elements.get(&key) {
            return *local;
        }
        let local = ElementId(self.elements.len());
        let Some(foreign) = system.elements.get(id.0) else {
            return local;
        };
        self.elements.push(Slot::Resolving);
        self.foreign.elements.insert(key, local);
        self.foreign.copied_elements.insert(local);

        let mut element = foreign.clone();
        element.id = local;
        element.type_id = self.import_type(system, element.type_id);
        element.document_type = self.import_type(system, element.document_type);
        element.substitution_group = element
            .substitution_group
            .map(|head| self.import_element(system, head));
        element.identity_constraints = element
            .identity_constraints
            .iter()
            .map(|ic| self.import_identity(system, *ic))
            .collect();
        self.elements[local.0] = Slot::Resolved(element);
        local
    }

    fn import_attribute(&mut self, system: &SchemaTypeSystem, id: AttributeId) -> AttributeId {
        let key = (system.system_id(), id);
        if let Some(local) = self.foreign.attributes.get(&key) {
            return *local;
        }
        let local = AttributeId(self.attributes.len());
        let Some(foreign) = system.attributes.get(id.0) else {
            return local;
        };
        self.attributes.push(Slot::Resolving);
        self.foreign.attributes.insert(key, local);

        let mut attribute = foreign.clone();
        attribute.id = local;
        attribute.type_id = self.import_type(system, attribute.type_id);
        attribute.attribute_type = self.import_type(system, attribute.attribute_type);
        self.attributes[local.0] = Slot::Resolved(attribute);
        local
    }

    fn import_identity(&mut self, system: &SchemaTypeSystem, id: IdentityId) -> IdentityId {
        let key = (system.system_id(), id);
        if let Some(local) = self.foreign.identities.get(&key) {
            return *local;
        }
        let local = IdentityId(self.identities.len());
        let Some(foreign) = system.identities.get(id.0) else {
            return local;
        };
        self.identities.push(Slot::Resolving);
        self.foreign.identities.insert(key, local);

        let mut identity = foreign.clone();
        identity.id = local;
        identity.referenced = identity.referenced.map(|r| self.import_identity(system, r));
        self.identities[local.0] = Slot::Resolved(identity);
        local
    }
}
