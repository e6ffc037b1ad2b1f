//! Simple value validation
//!
//! Checks a lexical value against a resolved simple type (or a complex type
//! with simple content): the built-in lexical space, then the effective
//! facets. Used to validate default and fixed values at compile time.

use base64::Engine;

use crate::error::{Error, Result, ValidationError};

use super::builtins::{self, ValueSpace, XSD_ID};
use super::facets::WhiteSpace;
use super::types::{ContentCategory, SimpleVariety};
use super::{ComponentLookup, TypeId};

/// Validate `value` against the type `type_id`
///
/// Types the lookup cannot resolve are not checked.
pub fn validate_value<L: ComponentLookup + ?Sized>(lookup: &L, type_id: TypeId, value: &str) -> Result<()> {
    validate_at_depth(lookup, type_id, value, 0)
}

fn validate_at_depth<L: ComponentLookup + ?Sized>(
    lookup: &L,
    type_id: TypeId,
    value: &str,
    depth: usize,
) -> Result<()> {
    let Some(ty) = lookup.lookup_type(type_id) else {
        return Ok(());
    };
    // unions of unions of ... are bounded by the resolver, but stay safe
    if depth > 64 {
        return Ok(());
    }
    let Some(simple) = &ty.simple else {
        return match ty.content {
            ContentCategory::Mixed => Ok(()),
            _ => Err(Error::Validation(
                ValidationError::new(format!("type {} does not allow character data", ty.display_name()))
                    .with_reason(format!("Actual value: '{}'", value)),
            )),
        };
    };

    match simple.variety {
        SimpleVariety::Atomic => {
            let Some(builtin) = builtins::builtin(simple.builtin) else {
                return Ok(());
            };
            let white_space = simple.facets.white_space.unwrap_or(builtin.white_space);
            let normalized = white_space.normalize(value);
            builtin.validate(&normalized)?;
            let length = measure(&normalized, builtin.value_space);
            simple.facets.validate(&normalized, length, builtin.value_space)
        }
        SimpleVariety::List => {
            let normalized = WhiteSpace::Collapse.normalize(value);
            let items: Vec<&str> = normalized.split(' ').filter(|s| !s.is_empty()).collect();
            if let Some(item_type) = simple.item_type {
                for item in &items {
                    validate_at_depth(lookup, item_type, item, depth + 1)?;
                }
            }
            simple.facets.validate(&normalized, items.len(), ValueSpace::String)
        }
        SimpleVariety::Union => {
            let mut last_error = None;
            for member in &simple.member_types {
                match validate_at_depth(lookup, *member, value, depth + 1) {
                    Ok(()) => {
                        let normalized = WhiteSpace::Collapse.normalize(value);
                        let length = normalized.chars().count();
                        return simple.facets.validate(&normalized, length, ValueSpace::String);
                    }
                    Err(e) => last_error = Some(e),
                }
            }
            Err(Error::Validation(
                ValidationError::new(format!(
                    "value is not valid for any member of union {}",
                    ty.display_name()
                ))
                .with_reason(last_error.map_or_else(|| "union has no members".to_string(), |e| e.to_string())),
            ))
        }
    }
}

/// Length as the length facets measure it
fn measure(value: &str, space: ValueSpace) -> usize {
    match space {
        ValueSpace::HexBinary => value.len() / 2,
        ValueSpace::Base64Binary => {
            let compact: String = value.chars().filter(|c| !c.is_whitespace()).collect();
            base64::engine::general_purpose::STANDARD
                .decode(compact.as_bytes())
                .map(|bytes| bytes.len())
                .unwrap_or(0)
        }
        _ => value.chars().count(),
    }
}

/// Whether the type is xs:ID or an atomic restriction of it
pub fn is_id_type<L: ComponentLookup + ?Sized>(lookup: &L, type_id: TypeId) -> bool {
    lookup
        .lookup_type(type_id)
        .and_then(|t| t.simple.as_ref())
        .map_or(false, |s| s.variety == SimpleVariety::Atomic && s.builtin == XSD_ID)
}
