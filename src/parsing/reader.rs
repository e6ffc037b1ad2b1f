//! XSD reader
//!
//! Builds [`SchemaDocument`] nodes from XSD text via the quick-xml element
//! tree in [`crate::documents`].

use sha2::{Digest, Sha256};

use super::*;
use crate::documents::{Document, Element};
use crate::error::{Error, ParseError, Result};
use crate::XSD_NAMESPACE;

/// XSD element local names
mod xsd_elements {
    pub const SCHEMA: &str = "schema";
    pub const ELEMENT: &str = "element";
    pub const COMPLEX_TYPE: &str = "complexType";
    pub const SIMPLE_TYPE: &str = "simpleType";
    pub const ATTRIBUTE: &str = "attribute";
    pub const ATTRIBUTE_GROUP: &str = "attributeGroup";
    pub const GROUP: &str = "group";
    pub const SEQUENCE: &str = "sequence";
    pub const CHOICE: &str = "choice";
    pub const ALL: &str = "all";
    pub const ANNOTATION: &str = "annotation";
    pub const IMPORT: &str = "import";
    pub const INCLUDE: &str = "include";
    pub const REDEFINE: &str = "redefine";
    pub const RESTRICTION: &str = "restriction";
    pub const EXTENSION: &str = "extension";
    pub const LIST: &str = "list";
    pub const UNION: &str = "union";
    pub const COMPLEX_CONTENT: &str = "complexContent";
    pub const SIMPLE_CONTENT: &str = "simpleContent";
    pub const ANY: &str = "any";
    pub const ANY_ATTRIBUTE: &str = "anyAttribute";
    pub const NOTATION: &str = "notation";
    pub const SELECTOR: &str = "selector";
    pub const FIELD: &str = "field";
}

/// XSD attribute names
mod xsd_attrs {
    pub const NAME: &str = "name";
    pub const TYPE: &str = "type";
    pub const REF: &str = "ref";
    pub const TARGET_NAMESPACE: &str = "targetNamespace";
    pub const ELEMENT_FORM_DEFAULT: &str = "elementFormDefault";
    pub const ATTRIBUTE_FORM_DEFAULT: &str = "attributeFormDefault";
    pub const BLOCK_DEFAULT: &str = "blockDefault";
    pub const FINAL_DEFAULT: &str = "finalDefault";
    pub const BLOCK: &str = "block";
    pub const FINAL: &str = "final";
    pub const FORM: &str = "form";
    pub const NILLABLE: &str = "nillable";
    pub const DEFAULT: &str = "default";
    pub const FIXED: &str = "fixed";
    pub const BASE: &str = "base";
    pub const VALUE: &str = "value";
    pub const MIXED: &str = "mixed";
    pub const ABSTRACT: &str = "abstract";
    pub const SUBSTITUTION_GROUP: &str = "substitutionGroup";
    pub const NAMESPACE: &str = "namespace";
    pub const SCHEMA_LOCATION: &str = "schemaLocation";
    pub const ITEM_TYPE: &str = "itemType";
    pub const MEMBER_TYPES: &str = "memberTypes";
    pub const MIN_OCCURS: &str = "minOccurs";
    pub const MAX_OCCURS: &str = "maxOccurs";
    pub const USE: &str = "use";
    pub const PROCESS_CONTENTS: &str = "processContents";
    pub const REFER: &str = "refer";
    pub const XPATH: &str = "xpath";
}

const FACETS: &[&str] = &[
    "length",
    "minLength",
    "maxLength",
    "pattern",
    "enumeration",
    "whiteSpace",
    "maxInclusive",
    "maxExclusive",
    "minInclusive",
    "minExclusive",
    "totalDigits",
    "fractionDigits",
];

/// SHA-256 of document text, hex encoded
pub fn digest(text: &[u8]) -> String {
    hex::encode(Sha256::digest(text))
}

impl SchemaDocument {
    /// Read a schema document from XSD text
    pub fn parse_str(text: &str, location: Option<&str>) -> Result<SchemaDocument> {
        let document = Document::from_string(text).map_err(|e| match e {
            Error::Xml(message) => {
                let err = ParseError::new(message);
                Error::Parse(match location {
                    Some(loc) => err.with_location(loc),
                    None => err,
                })
            }
            other => other,
        })?;
        let reader = Reader { location };
        let root = document
            .root()
            .ok_or_else(|| reader.error("document has no root element"))?;

        let mut schema = reader.read_schema(root)?;
        schema.location = location.map(str::to_string);
        schema.digest = digest(text.as_bytes());
        Ok(schema)
    }
}

struct Reader<'a> {
    location: Option<&'a str>,
}

impl<'a> Reader<'a> {
    fn error(&self, message: impl Into<String>) -> Error {
        let err = ParseError::new(message);
        Error::Parse(match self.location {
            Some(loc) => err.with_location(loc),
            None => err,
        })
    }

    /// XSD children, annotations skipped
    fn children<'e>(&self, elem: &'e Element) -> impl Iterator<Item = &'e Element> {
        elem.children.iter().filter(|c| {
            c.namespace() == Some(XSD_NAMESPACE) && c.local_name() != xsd_elements::ANNOTATION
        })
    }

    fn unexpected(&self, parent: &Element, child: &Element) -> Error {
        self.error(format!(
            "unexpected element '{}' in '{}'",
            child.local_name(),
            parent.local_name()
        ))
    }

    fn required<'e>(&self, elem: &'e Element, attr: &str) -> Result<&'e str> {
        elem.get_attribute(attr).ok_or_else(|| {
            self.error(format!(
                "'{}' is missing the required attribute '{}'",
                elem.local_name(),
                attr
            ))
        })
    }

    fn boolean(&self, elem: &Element, attr: &str) -> Result<bool> {
        match elem.get_attribute(attr).map(str::trim) {
            None | Some("false") | Some("0") => Ok(false),
            Some("true") | Some("1") => Ok(true),
            Some(other) => Err(self.error(format!("invalid boolean '{}' for '{}'", other, attr))),
        }
    }

    fn qname(&self, elem: &Element, value: &str) -> Result<QName> {
        elem.namespaces
            .resolve(value)
            .map_err(|e| self.error(format!("cannot resolve QName '{}': {}", value, e)))
    }

    fn qname_attr(&self, elem: &Element, attr: &str) -> Result<Option<QName>> {
        elem.get_attribute(attr).map(|v| self.qname(elem, v)).transpose()
    }

    fn form(&self, elem: &Element) -> Result<Option<bool>> {
        match elem.get_attribute(xsd_attrs::FORM).map(str::trim) {
            None => Ok(None),
            Some("qualified") => Ok(Some(true)),
            Some("unqualified") => Ok(Some(false)),
            Some(other) => Err(self.error(format!("invalid form '{}'", other))),
        }
    }

    /// Parse minOccurs and maxOccurs attributes into an Occurs
    fn occurs(&self, elem: &Element) -> Result<Occurs> {
        let min = match elem.get_attribute(xsd_attrs::MIN_OCCURS) {
            Some(s) => s
                .trim()
                .parse::<u32>()
                .map_err(|_| self.error(format!("invalid minOccurs '{}'", s)))?,
            None => 1,
        };
        let max = match elem.get_attribute(xsd_attrs::MAX_OCCURS).map(str::trim) {
            Some("unbounded") => None,
            Some(s) => Some(
                s.parse::<u32>()
                    .map_err(|_| self.error(format!("invalid maxOccurs '{}'", s)))?,
            ),
            None => Some(1),
        };
        if let Some(max) = max {
            if min > max {
                return Err(self.error(format!("minOccurs {} exceeds maxOccurs {}", min, max)));
            }
        }
        Ok(Occurs::new(min, max))
    }

    fn derivation_set(elem: &Element, attr: &str, applicable: DerivationSet) -> Option<DerivationSet> {
        elem.get_attribute(attr)
            .map(|v| DerivationSet::from_attr(v, applicable))
    }

    fn read_schema(&self, root: &Element) -> Result<SchemaDocument> {
        if root.namespace() != Some(XSD_NAMESPACE) || root.local_name() != xsd_elements::SCHEMA {
            return Err(self.error(format!("root element '{}' is not xs:schema", root.qname)));
        }

        let mut schema = SchemaDocument::new(root.get_attribute(xsd_attrs::TARGET_NAMESPACE));
        schema.element_form_qualified =
            root.get_attribute(xsd_attrs::ELEMENT_FORM_DEFAULT).map(str::trim) == Some("qualified");
        schema.attribute_form_qualified =
            root.get_attribute(xsd_attrs::ATTRIBUTE_FORM_DEFAULT).map(str::trim) == Some("qualified");
        schema.block_default =
            Self::derivation_set(root, xsd_attrs::BLOCK_DEFAULT, DerivationSet::element_block())
                .unwrap_or_default();
        schema.final_default = Self::derivation_set(
            root,
            xsd_attrs::FINAL_DEFAULT,
            DerivationSet::complex().union_with(&DerivationSet::simple()),
        )
        .unwrap_or_default();

        for child in self.children(root) {
            match child.local_name() {
                xsd_elements::IMPORT => schema.imports.push(Import {
                    namespace: child
                        .get_attribute(xsd_attrs::NAMESPACE)
                        .filter(|ns| !ns.is_empty())
                        .map(str::to_string),
                    schema_location: child.get_attribute(xsd_attrs::SCHEMA_LOCATION).map(str::to_string),
                }),
                xsd_elements::INCLUDE => schema.includes.push(Include {
                    schema_location: self.required(child, xsd_attrs::SCHEMA_LOCATION)?.to_string(),
                }),
                xsd_elements::REDEFINE => schema.redefines.push(self.read_redefine(child)?),
                xsd_elements::SIMPLE_TYPE => {
                    let decl = self.read_simple_type(child, true)?;
                    schema.types.push(TypeDecl::Simple(decl));
                }
                xsd_elements::COMPLEX_TYPE => {
                    let decl = self.read_complex_type(child, true)?;
                    schema.types.push(TypeDecl::Complex(decl));
                }
                xsd_elements::ELEMENT => schema.elements.push(self.read_element(child, true)?),
                xsd_elements::ATTRIBUTE => schema.attributes.push(self.read_attribute(child, true)?),
                xsd_elements::GROUP => schema.groups.push(self.read_group(child)?),
                xsd_elements::ATTRIBUTE_GROUP => {
                    schema.attribute_groups.push(self.read_attribute_group(child)?)
                }
                xsd_elements::NOTATION => {}
                _ => return Err(self.unexpected(root, child)),
            }
        }
        Ok(schema)
    }

    fn read_redefine(&self, elem: &Element) -> Result<Redefine> {
        let mut redefine = Redefine {
            schema_location: self.required(elem, xsd_attrs::SCHEMA_LOCATION)?.to_string(),
            types: Vec::new(),
            groups: Vec::new(),
            attribute_groups: Vec::new(),
        };
        for child in self.children(elem) {
            match child.local_name() {
                xsd_elements::SIMPLE_TYPE => {
                    redefine.types.push(TypeDecl::Simple(self.read_simple_type(child, true)?))
                }
                xsd_elements::COMPLEX_TYPE => {
                    redefine.types.push(TypeDecl::Complex(self.read_complex_type(child, true)?))
                }
                xsd_elements::GROUP => redefine.groups.push(self.read_group(child)?),
                xsd_elements::ATTRIBUTE_GROUP => {
                    redefine.attribute_groups.push(self.read_attribute_group(child)?)
                }
                _ => return Err(self.unexpected(elem, child)),
            }
        }
        Ok(redefine)
    }

    fn read_name(&self, elem: &Element, global: bool) -> Result<Option<String>> {
        match (elem.get_attribute(xsd_attrs::NAME), global) {
            (Some(name), _) => Ok(Some(name.trim().to_string())),
            (None, true) => Err(self.error(format!("global '{}' has no name", elem.local_name()))),
            (None, false) => Ok(None),
        }
    }

    fn read_simple_type(&self, elem: &Element, global: bool) -> Result<SimpleTypeDecl> {
        let name = self.read_name(elem, global)?;
        let final_set = Self::derivation_set(elem, xsd_attrs::FINAL, DerivationSet::simple());
        let body = self
            .children(elem)
            .next()
            .ok_or_else(|| self.error("simpleType has no restriction, list or union"))?;

        let content = match body.local_name() {
            xsd_elements::RESTRICTION => {
                let mut inline_base = None;
                let mut facets = Vec::new();
                for child in self.children(body) {
                    match child.local_name() {
                        xsd_elements::SIMPLE_TYPE => {
                            inline_base = Some(Box::new(self.read_simple_type(child, false)?))
                        }
                        facet if FACETS.contains(&facet) => facets.push(self.read_facet(child)?),
                        _ => return Err(self.unexpected(body, child)),
                    }
                }
                let base = self.qname_attr(body, xsd_attrs::BASE)?;
                if base.is_none() && inline_base.is_none() {
                    return Err(self.error("simpleType restriction has neither base nor inline type"));
                }
                SimpleContentDecl::Restriction {
                    base,
                    inline_base,
                    facets,
                }
            }
            xsd_elements::LIST => {
                let inline_item = self
                    .children(body)
                    .find(|c| c.local_name() == xsd_elements::SIMPLE_TYPE)
                    .map(|c| self.read_simple_type(c, false))
                    .transpose()?
                    .map(Box::new);
                let item_type = self.qname_attr(body, xsd_attrs::ITEM_TYPE)?;
                if item_type.is_none() && inline_item.is_none() {
                    return Err(self.error("list has neither itemType nor inline item type"));
                }
                SimpleContentDecl::List {
                    item_type,
                    inline_item,
                }
            }
            xsd_elements::UNION => {
                let member_types = body
                    .get_attribute(xsd_attrs::MEMBER_TYPES)
                    .map(|v| {
                        v.split_whitespace()
                            .map(|m| self.qname(body, m))
                            .collect::<Result<Vec<_>>>()
                    })
                    .transpose()?
                    .unwrap_or_default();
                let inline_members = self
                    .children(body)
                    .filter(|c| c.local_name() == xsd_elements::SIMPLE_TYPE)
                    .map(|c| self.read_simple_type(c, false))
                    .collect::<Result<Vec<_>>>()?;
                if member_types.is_empty() && inline_members.is_empty() {
                    return Err(self.error("union has no member types"));
                }
                SimpleContentDecl::Union {
                    member_types,
                    inline_members,
                }
            }
            _ => return Err(self.unexpected(elem, body)),
        };

        Ok(SimpleTypeDecl {
            name,
            final_set,
            content,
        })
    }

    fn read_facet(&self, elem: &Element) -> Result<FacetDecl> {
        Ok(FacetDecl {
            name: elem.local_name().to_string(),
            value: self.required(elem, xsd_attrs::VALUE)?.to_string(),
        })
    }

    fn read_complex_type(&self, elem: &Element, global: bool) -> Result<ComplexTypeDecl> {
        let mut decl = ComplexTypeDecl::implicit(self.read_name(elem, global)?.as_deref(), None);
        decl.is_abstract = self.boolean(elem, xsd_attrs::ABSTRACT)?;
        decl.mixed = self.boolean(elem, xsd_attrs::MIXED)?;
        decl.block = Self::derivation_set(elem, xsd_attrs::BLOCK, DerivationSet::complex());
        decl.final_set = Self::derivation_set(elem, xsd_attrs::FINAL, DerivationSet::complex());

        let content = self.children(elem).find(|c| {
            matches!(
                c.local_name(),
                xsd_elements::COMPLEX_CONTENT | xsd_elements::SIMPLE_CONTENT
            )
        });

        match content {
            None => {
                let (particle, attributes) = self.read_content_body(elem)?;
                decl.particle = particle;
                decl.attributes = attributes;
            }
            Some(content) => {
                decl.content_kind = if content.local_name() == xsd_elements::COMPLEX_CONTENT {
                    ContentKind::Complex
                } else {
                    ContentKind::Simple
                };
                if content.get_attribute(xsd_attrs::MIXED).is_some() {
                    decl.mixed = self.boolean(content, xsd_attrs::MIXED)?;
                }
                let derivation = self
                    .children(content)
                    .next()
                    .ok_or_else(|| self.error("content has no restriction or extension"))?;
                decl.derivation = DerivationMethod::parse(derivation.local_name())
                    .ok_or_else(|| self.unexpected(content, derivation))?;
                decl.base = Some(self.qname(derivation, self.required(derivation, xsd_attrs::BASE)?)?);

                if decl.content_kind == ContentKind::Complex {
                    let (particle, attributes) = self.read_content_body(derivation)?;
                    decl.particle = particle;
                    decl.attributes = attributes;
                } else {
                    for child in self.children(derivation) {
                        match child.local_name() {
                            xsd_elements::SIMPLE_TYPE
                                if decl.derivation == DerivationMethod::Restriction =>
                            {
                                decl.inline_simple = Some(Box::new(self.read_simple_type(child, false)?))
                            }
                            facet
                                if FACETS.contains(&facet)
                                    && decl.derivation == DerivationMethod::Restriction =>
                            {
                                decl.facets.push(self.read_facet(child)?)
                            }
                            xsd_elements::ATTRIBUTE
                            | xsd_elements::ATTRIBUTE_GROUP
                            | xsd_elements::ANY_ATTRIBUTE => {}
                            _ => return Err(self.unexpected(derivation, child)),
                        }
                    }
                    decl.attributes = self.read_attributes(derivation)?;
                }
            }
        }
        Ok(decl)
    }

    /// The content model and attributes directly inside `elem`
    fn read_content_body(&self, elem: &Element) -> Result<(Option<ParticleDecl>, AttributesDecl)> {
        let mut particle = None;
        for child in self.children(elem) {
            match child.local_name() {
                xsd_elements::SEQUENCE | xsd_elements::CHOICE | xsd_elements::ALL | xsd_elements::GROUP => {
                    if particle.is_some() {
                        return Err(self.error(format!(
                            "'{}' declares more than one content model",
                            elem.local_name()
                        )));
                    }
                    particle = Some(self.read_particle(child)?);
                }
                xsd_elements::ATTRIBUTE | xsd_elements::ATTRIBUTE_GROUP | xsd_elements::ANY_ATTRIBUTE => {}
                _ => return Err(self.unexpected(elem, child)),
            }
        }
        Ok((particle, self.read_attributes(elem)?))
    }

    fn read_particle(&self, elem: &Element) -> Result<ParticleDecl> {
        let compositor = match elem.local_name() {
            xsd_elements::SEQUENCE => Compositor::Sequence,
            xsd_elements::CHOICE => Compositor::Choice,
            xsd_elements::ALL => Compositor::All,
            xsd_elements::GROUP => {
                let reference = self.qname(elem, self.required(elem, xsd_attrs::REF)?)?;
                return Ok(ParticleDecl::GroupRef {
                    reference,
                    occurs: self.occurs(elem)?,
                });
            }
            xsd_elements::ELEMENT => {
                return Ok(ParticleDecl::Element(Box::new(self.read_element(elem, false)?)))
            }
            xsd_elements::ANY => {
                return Ok(ParticleDecl::Any {
                    occurs: self.occurs(elem)?,
                    wildcard: self.read_wildcard(elem)?,
                })
            }
            _ => return Err(self.error(format!("'{}' is not a particle", elem.local_name()))),
        };

        let mut particles = Vec::new();
        for child in self.children(elem) {
            if compositor == Compositor::All && child.local_name() != xsd_elements::ELEMENT {
                return Err(self.error(format!(
                    "'all' may only contain elements, found '{}'",
                    child.local_name()
                )));
            }
            particles.push(self.read_particle(child)?);
        }
        Ok(ParticleDecl::Group {
            compositor,
            occurs: self.occurs(elem)?,
            particles,
        })
    }

    fn read_wildcard(&self, elem: &Element) -> Result<WildcardDecl> {
        let process = match elem.get_attribute(xsd_attrs::PROCESS_CONTENTS) {
            Some(value) => ProcessContents::parse(value)
                .ok_or_else(|| self.error(format!("invalid processContents '{}'", value)))?,
            None => ProcessContents::Strict,
        };
        Ok(WildcardDecl {
            namespace: elem
                .get_attribute(xsd_attrs::NAMESPACE)
                .unwrap_or("##any")
                .to_string(),
            process,
        })
    }

    fn read_attributes(&self, elem: &Element) -> Result<AttributesDecl> {
        let mut attributes = AttributesDecl::default();
        for child in self.children(elem) {
            match child.local_name() {
                xsd_elements::ATTRIBUTE => attributes.uses.push(self.read_attribute(child, false)?),
                xsd_elements::ATTRIBUTE_GROUP => attributes
                    .group_refs
                    .push(self.qname(child, self.required(child, xsd_attrs::REF)?)?),
                xsd_elements::ANY_ATTRIBUTE => attributes.wildcard = Some(self.read_wildcard(child)?),
                _ => {}
            }
        }
        Ok(attributes)
    }

    fn read_attribute(&self, elem: &Element, global: bool) -> Result<AttributeDecl> {
        let reference = if global {
            None
        } else {
            self.qname_attr(elem, xsd_attrs::REF)?
        };
        let name = if reference.is_some() {
            None
        } else {
            Some(self.required(elem, xsd_attrs::NAME)?.trim().to_string())
        };
        let use_kind = match elem.get_attribute(xsd_attrs::USE).map(str::trim) {
            None | Some("optional") => UseKind::Optional,
            Some("required") => UseKind::Required,
            Some("prohibited") => UseKind::Prohibited,
            Some(other) => return Err(self.error(format!("invalid attribute use '{}'", other))),
        };
        let default = elem.get_attribute(xsd_attrs::DEFAULT).map(str::to_string);
        let fixed = elem.get_attribute(xsd_attrs::FIXED).map(str::to_string);
        if default.is_some() && fixed.is_some() {
            return Err(self.error("attribute has both default and fixed values"));
        }
        if default.is_some() && use_kind == UseKind::Required {
            return Err(self.error("a required attribute cannot have a default value"));
        }
        let inline_type = self
            .children(elem)
            .find(|c| c.local_name() == xsd_elements::SIMPLE_TYPE)
            .map(|c| self.read_simple_type(c, false))
            .transpose()?;

        Ok(AttributeDecl {
            name,
            reference,
            type_name: self.qname_attr(elem, xsd_attrs::TYPE)?,
            inline_type,
            use_kind,
            default,
            fixed,
            qualified: self.form(elem)?,
        })
    }

    fn read_element(&self, elem: &Element, global: bool) -> Result<ElementDecl> {
        let reference = if global {
            None
        } else {
            self.qname_attr(elem, xsd_attrs::REF)?
        };
        let name = match (&reference, elem.get_attribute(xsd_attrs::NAME)) {
            (Some(_), Some(_)) => return Err(self.error("element has both name and ref")),
            (Some(_), None) => None,
            (None, Some(name)) => Some(name.trim().to_string()),
            (None, None) => return Err(self.error("element has neither name nor ref")),
        };

        let mut decl = ElementDecl::named("", self.qname_attr(elem, xsd_attrs::TYPE)?);
        decl.name = name;
        decl.reference = reference;
        decl.occurs = if global { Occurs::once() } else { self.occurs(elem)? };
        decl.substitution_group = if global {
            self.qname_attr(elem, xsd_attrs::SUBSTITUTION_GROUP)?
        } else {
            None
        };
        decl.nillable = self.boolean(elem, xsd_attrs::NILLABLE)?;
        decl.is_abstract = self.boolean(elem, xsd_attrs::ABSTRACT)?;
        decl.default = elem.get_attribute(xsd_attrs::DEFAULT).map(str::to_string);
        decl.fixed = elem.get_attribute(xsd_attrs::FIXED).map(str::to_string);
        if decl.default.is_some() && decl.fixed.is_some() {
            return Err(self.error("element has both default and fixed values"));
        }
        decl.block = Self::derivation_set(elem, xsd_attrs::BLOCK, DerivationSet::element_block());
        decl.final_set = Self::derivation_set(elem, xsd_attrs::FINAL, DerivationSet::complex());
        decl.qualified = self.form(elem)?;

        for child in self.children(elem) {
            match child.local_name() {
                xsd_elements::SIMPLE_TYPE => {
                    decl.inline_type = Some(TypeDecl::Simple(self.read_simple_type(child, false)?))
                }
                xsd_elements::COMPLEX_TYPE => {
                    decl.inline_type = Some(TypeDecl::Complex(self.read_complex_type(child, false)?))
                }
                other => match IdentityCategory::parse(other) {
                    Some(category) => decl
                        .identity_constraints
                        .push(self.read_identity(child, category)?),
                    None => return Err(self.unexpected(elem, child)),
                },
            }
        }
        if decl.inline_type.is_some() && decl.type_name.is_some() {
            return Err(self.error("element has both a type attribute and an inline type"));
        }
        Ok(decl)
    }

    fn read_identity(&self, elem: &Element, category: IdentityCategory) -> Result<IdentityDecl> {
        let name = self.required(elem, xsd_attrs::NAME)?.trim().to_string();
        let mut selector = None;
        let mut fields = Vec::new();
        for child in self.children(elem) {
            match child.local_name() {
                xsd_elements::SELECTOR => {
                    selector = Some(self.required(child, xsd_attrs::XPATH)?.to_string())
                }
                xsd_elements::FIELD => fields.push(self.required(child, xsd_attrs::XPATH)?.to_string()),
                _ => return Err(self.unexpected(elem, child)),
            }
        }
        let selector = selector.ok_or_else(|| self.error(format!("{} '{}' has no selector", category, name)))?;
        if fields.is_empty() {
            return Err(self.error(format!("{} '{}' has no field", category, name)));
        }
        let refer = if category == IdentityCategory::Keyref {
            Some(self.qname(elem, self.required(elem, xsd_attrs::REFER)?)?)
        } else {
            None
        };
        Ok(IdentityDecl {
            name,
            category,
            selector,
            fields,
            refer,
        })
    }

    fn read_group(&self, elem: &Element) -> Result<GroupDecl> {
        let name = self.required(elem, xsd_attrs::NAME)?.trim().to_string();
        let particle = match self.children(elem).next() {
            Some(child)
                if matches!(
                    child.local_name(),
                    xsd_elements::SEQUENCE | xsd_elements::CHOICE | xsd_elements::ALL
                ) =>
            {
                Some(self.read_particle(child)?)
            }
            Some(child) => return Err(self.unexpected(elem, child)),
            None => None,
        };
        Ok(GroupDecl { name, particle })
    }

    fn read_attribute_group(&self, elem: &Element) -> Result<AttributeGroupDecl> {
        Ok(AttributeGroupDecl {
            name: self.required(elem, xsd_attrs::NAME)?.trim().to_string(),
            attributes: self.read_attributes(elem)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const BOOK_XSD: &str = r###"<?xml version="1.0"?>
<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"
           xmlns:b="http://example.com/book"
           targetNamespace="http://example.com/book"
           elementFormDefault="qualified">
  <xs:import namespace="urn:common" schemaLocation="common.xsd"/>
  <xs:include schemaLocation="parts.xsd"/>
  <xs:element name="book" type="b:Book">
    <xs:key name="isbnKey">
      <xs:selector xpath="b:isbn"/>
      <xs:field xpath="."/>
    </xs:key>
  </xs:element>
  <xs:complexType name="Book">
    <xs:sequence>
      <xs:element name="title" type="xs:string"/>
      <xs:element name="isbn" type="b:Isbn" maxOccurs="unbounded"/>
      <xs:any namespace="##other" processContents="lax" minOccurs="0"/>
    </xs:sequence>
    <xs:attribute name="lang" type="xs:language" default="en"/>
    <xs:attributeGroup ref="b:common"/>
  </xs:complexType>
  <xs:simpleType name="Isbn">
    <xs:restriction base="xs:string">
      <xs:pattern value="\d{13}"/>
    </xs:restriction>
  </xs:simpleType>
  <xs:attributeGroup name="common">
    <xs:anyAttribute namespace="##local"/>
  </xs:attributeGroup>
</xs:schema>"###;

    #[test]
    fn test_read_book_schema() {
        let schema = SchemaDocument::parse_str(BOOK_XSD, Some("book.xsd")).unwrap();

        assert_eq!(schema.target_namespace.as_deref(), Some("http://example.com/book"));
        assert!(schema.element_form_qualified);
        assert!(!schema.attribute_form_qualified);
        assert_eq!(schema.location.as_deref(), Some("book.xsd"));
        assert_eq!(schema.digest.len(), 64);

        assert_eq!(
            schema.imports,
            vec![Import {
                namespace: Some("urn:common".to_string()),
                schema_location: Some("common.xsd".to_string()),
            }]
        );
        assert_eq!(schema.includes[0].schema_location, "parts.xsd");
        assert_eq!(schema.component_count(), 4);

        let book = &schema.elements[0];
        assert_eq!(book.type_name, Some(QName::namespaced("http://example.com/book", "Book")));
        assert_eq!(book.identity_constraints.len(), 1);
        assert_eq!(book.identity_constraints[0].category, IdentityCategory::Key);

        let TypeDecl::Complex(book_type) = &schema.types[0] else {
            panic!("expected a complex type");
        };
        assert_eq!(book_type.content_kind, ContentKind::Implicit);
        let Some(ParticleDecl::Group { compositor, particles, .. }) = &book_type.particle else {
            panic!("expected a sequence");
        };
        assert_eq!(*compositor, Compositor::Sequence);
        assert_eq!(particles.len(), 3);
        assert_eq!(particles[1].occurs(), Occurs::new(1, None));
        assert_eq!(book_type.attributes.uses[0].default.as_deref(), Some("en"));
        assert_eq!(book_type.attributes.group_refs.len(), 1);
    }

    #[test]
    fn test_read_derivations() {
        let xsd = r###"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
          <xs:complexType name="Derived" block="#all">
            <xs:complexContent mixed="true">
              <xs:extension base="Base"><xs:choice><xs:element name="x"/></xs:choice></xs:extension>
            </xs:complexContent>
          </xs:complexType>
          <xs:complexType name="Priced">
            <xs:simpleContent>
              <xs:restriction base="Money"><xs:minInclusive value="0"/></xs:restriction>
            </xs:simpleContent>
          </xs:complexType>
          <xs:simpleType name="Sizes"><xs:list itemType="xs:int"/></xs:simpleType>
          <xs:simpleType name="Either"><xs:union memberTypes="xs:int xs:date"/></xs:simpleType>
        </xs:schema>"###;
        let schema = SchemaDocument::parse_str(xsd, None).unwrap();

        let TypeDecl::Complex(derived) = &schema.types[0] else {
            panic!("expected a complex type");
        };
        assert_eq!(derived.derivation, DerivationMethod::Extension);
        assert_eq!(derived.base, Some(QName::local("Base")));
        assert!(derived.mixed);
        assert_eq!(derived.block, Some(DerivationSet::complex()));

        let TypeDecl::Complex(priced) = &schema.types[1] else {
            panic!("expected a complex type");
        };
        assert_eq!(priced.content_kind, ContentKind::Simple);
        assert_eq!(priced.facets[0].name, "minInclusive");

        let TypeDecl::Simple(either) = &schema.types[3] else {
            panic!("expected a simple type");
        };
        assert!(matches!(&either.content, SimpleContentDecl::Union { member_types, .. } if member_types.len() == 2));
    }

    #[test]
    fn test_digest_is_content_based() {
        assert_eq!(digest(b"abc"), digest(b"abc"));
        assert_ne!(digest(b"abc"), digest(b"abd"));
        assert_eq!(
            digest(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_read_errors() {
        assert!(SchemaDocument::parse_str("", None).is_err());
        assert!(SchemaDocument::parse_str("<root/>", None).is_err());

        let bad_occurs = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
          <xs:complexType name="T"><xs:sequence>
            <xs:element name="a" minOccurs="3" maxOccurs="2"/>
          </xs:sequence></xs:complexType></xs:schema>"#;
        let err = SchemaDocument::parse_str(bad_occurs, Some("bad.xsd")).unwrap_err();
        assert!(err.to_string().contains("bad.xsd"));

        let both = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
          <xs:element name="a" default="x" fixed="y"/></xs:schema>"#;
        assert!(SchemaDocument::parse_str(both, None).is_err());

        let keyref = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
          <xs:element name="a"><xs:keyref name="k"><xs:selector xpath="."/><xs:field xpath="@x"/></xs:keyref></xs:element>
          </xs:schema>"#;
        assert!(SchemaDocument::parse_str(keyref, None).is_err());
    }
}
