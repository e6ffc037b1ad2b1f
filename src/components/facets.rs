//! XSD constraining facets
//!
//! A [`FacetSet`] holds the effective facets of one simple type: the facets
//! of every restriction step from the built-in ancestor down, merged. Bound
//! facets keep their lexical form and are compared in the value space of the
//! type's built-in ancestor.

use std::cmp::Ordering;
use std::fmt;

use regex::Regex;

use crate::error::{Error, Result, ValidationError};

use super::builtins::ValueSpace;

/// White space handling modes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum WhiteSpace {
    /// Preserve all white space
    Preserve,
    /// Replace tabs and newlines with spaces
    Replace,
    /// Replace and collapse multiple spaces
    Collapse,
}

impl WhiteSpace {
    /// Parse from string value
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "preserve" => Some(WhiteSpace::Preserve),
            "replace" => Some(WhiteSpace::Replace),
            "collapse" => Some(WhiteSpace::Collapse),
            _ => None,
        }
    }

    /// Normalize a string according to this white space mode
    pub fn normalize(&self, s: &str) -> String {
        match self {
            WhiteSpace::Preserve => s.to_string(),
            WhiteSpace::Replace => s.replace(['\t', '\n', '\r'], " "),
            WhiteSpace::Collapse => s.split_whitespace().collect::<Vec<_>>().join(" "),
        }
    }
}

impl fmt::Display for WhiteSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WhiteSpace::Preserve => write!(f, "preserve"),
            WhiteSpace::Replace => write!(f, "replace"),
            WhiteSpace::Collapse => write!(f, "collapse"),
        }
    }
}

/// Pattern facet using an XSD regular expression
#[derive(Debug, Clone)]
pub struct Pattern {
    /// The pattern as written in the schema
    pub source: String,
    /// Compiled, anchored translation
    regex: Regex,
}

impl Pattern {
    /// Compile an XSD pattern
    pub fn new(pattern: &str) -> Result<Self> {
        let translated = translate_pattern(pattern)?;
        let regex = Regex::new(&format!("^(?:{})$", translated)).map_err(|e| {
            Error::Validation(
                ValidationError::new(format!("unsupported pattern '{}'", pattern))
                    .with_reason(e.to_string()),
            )
        })?;
        Ok(Self {
            source: pattern.to_string(),
            regex,
        })
    }

    /// Whether the whole value matches
    pub fn is_match(&self, value: &str) -> bool {
        self.regex.is_match(value)
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

const NAME_START_CLASS: &str = "_:A-Za-z\\u{C0}-\\u{D6}\\u{D8}-\\u{F6}\\u{F8}-\\u{2FF}\\u{370}-\\u{37D}\\u{37F}-\\u{1FFF}";
const NAME_CHAR_CLASS: &str = "\\-.0-9\\u{B7}_:A-Za-z\\u{C0}-\\u{D6}\\u{D8}-\\u{F6}\\u{F8}-\\u{2FF}\\u{300}-\\u{37D}\\u{37F}-\\u{1FFF}";

/// Rewrite XSD regex syntax into the `regex` crate's dialect: `^` and `$`
/// are literals, `\i`/`\c` are name classes, and `-[...]` is class
/// subtraction
fn translate_pattern(pattern: &str) -> Result<String> {
    let mut out = String::with_capacity(pattern.len() + 8);
    let mut depth = 0usize;
    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                let Some(escaped) = chars.next() else {
                    return Err(Error::Validation(ValidationError::new(format!(
                        "pattern '{}' ends with a lone backslash",
                        pattern
                    ))));
                };
                match (escaped, depth > 0) {
                    ('i', false) => out.push_str(&format!("[{}]", NAME_START_CLASS)),
                    ('i', true) => out.push_str(NAME_START_CLASS),
                    ('c', false) => out.push_str(&format!("[{}]", NAME_CHAR_CLASS)),
                    ('c', true) => out.push_str(NAME_CHAR_CLASS),
                    ('I', false) => out.push_str(&format!("[^{}]", NAME_START_CLASS)),
                    ('C', false) => out.push_str(&format!("[^{}]", NAME_CHAR_CLASS)),
                    ('I', true) | ('C', true) => {
                        return Err(Error::Validation(ValidationError::new(format!(
                            "pattern '{}' negates a name class inside a character class",
                            pattern
                        ))))
                    }
                    (other, _) => {
                        out.push('\\');
                        out.push(other);
                    }
                }
            }
            '[' => {
                if depth > 0 && out.ends_with('-') {
                    out.pop();
                    out.push_str("--[");
                } else {
                    out.push('[');
                    // a leading '^' negates the class
                    if chars.peek() == Some(&'^') {
                        out.push('^');
                        chars.next();
                    }
                }
                depth += 1;
            }
            ']' => {
                depth = depth.saturating_sub(1);
                out.push(']');
            }
            '^' | '$' if depth == 0 => {
                out.push('\\');
                out.push(c);
            }
            '&' | '~' if depth > 0 => {
                out.push('\\');
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    Ok(out)
}

/// The effective facets of a simple type
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FacetSet {
    /// Exact length
    pub length: Option<usize>,
    /// Minimum length
    pub min_length: Option<usize>,
    /// Maximum length
    pub max_length: Option<usize>,
    /// Patterns; one entry per restriction step, alternatives within a step
    pub patterns: Vec<Vec<Pattern>>,
    /// Allowed values
    pub enumeration: Option<Vec<String>>,
    /// White space handling
    pub white_space: Option<WhiteSpace>,
    /// Inclusive lower bound
    pub min_inclusive: Option<String>,
    /// Inclusive upper bound
    pub max_inclusive: Option<String>,
    /// Exclusive lower bound
    pub min_exclusive: Option<String>,
    /// Exclusive upper bound
    pub max_exclusive: Option<String>,
    /// Maximum number of significant digits
    pub total_digits: Option<u32>,
    /// Maximum number of fraction digits
    pub fraction_digits: Option<u32>,
}

impl FacetSet {
    /// Whether no facet is set
    pub fn is_empty(&self) -> bool {
        *self == FacetSet::default()
    }

    /// Facets of a restriction step applied on top of these. Problems with
    /// the step (loosening a base facet) are returned as messages.
    pub fn restrict(&self, step: &FacetSet, space: ValueSpace) -> (FacetSet, Vec<String>) {
        let mut problems = Vec::new();
        let mut merged = self.clone();

        if let (Some(base), Some(derived)) = (self.length, step.length) {
            if base != derived {
                problems.push(format!("length {} differs from the base length {}", derived, base));
            }
        }
        if let (Some(base), Some(derived)) = (self.min_length, step.min_length) {
            if derived < base {
                problems.push(format!("minLength {} is less than the base minLength {}", derived, base));
            }
        }
        if let (Some(base), Some(derived)) = (self.max_length, step.max_length) {
            if derived > base {
                problems.push(format!("maxLength {} exceeds the base maxLength {}", derived, base));
            }
        }
        if let (Some(base), Some(derived)) = (self.total_digits, step.total_digits) {
            if derived > base {
                problems.push(format!("totalDigits {} exceeds the base totalDigits {}", derived, base));
            }
        }
        if let (Some(base), Some(derived)) = (self.white_space, step.white_space) {
            if derived < base {
                problems.push(format!("whiteSpace {} is weaker than the base whiteSpace {}", derived, base));
            }
        }
        // (facet, derived bound, base bound, whether equality is a violation)
        let upper = [
            ("maxInclusive", &step.max_inclusive, &self.max_inclusive, false),
            ("maxExclusive", &step.max_exclusive, &self.max_exclusive, false),
            ("maxInclusive", &step.max_inclusive, &self.max_exclusive, true),
        ];
        for (name, derived, base, strict) in upper {
            if let (Some(d), Some(b)) = (derived, base) {
                match space.compare(d, b) {
                    Some(Ordering::Greater) => {
                        problems.push(format!("{} {} is above the base bound {}", name, d, b))
                    }
                    Some(Ordering::Equal) if strict => {
                        problems.push(format!("{} {} is not below the base bound {}", name, d, b))
                    }
                    _ => {}
                }
            }
        }
        let lower = [
            ("minInclusive", &step.min_inclusive, &self.min_inclusive, false),
            ("minExclusive", &step.min_exclusive, &self.min_exclusive, false),
            ("minInclusive", &step.min_inclusive, &self.min_exclusive, true),
        ];
        for (name, derived, base, strict) in lower {
            if let (Some(d), Some(b)) = (derived, base) {
                match space.compare(d, b) {
                    Some(Ordering::Less) => {
                        problems.push(format!("{} {} is below the base bound {}", name, d, b))
                    }
                    Some(Ordering::Equal) if strict => {
                        problems.push(format!("{} {} is not above the base bound {}", name, d, b))
                    }
                    _ => {}
                }
            }
        }

        macro_rules! take {
            ($($field:ident),*) => {
                $(if step.$field.is_some() {
                    merged.$field = step.$field.clone();
                })*
            };
        }
        take!(
            length,
            min_length,
            max_length,
            enumeration,
            white_space,
            total_digits,
            fraction_digits
        );
        // an inclusive bound replaces an exclusive one on the same side
        if step.max_inclusive.is_some() {
            merged.max_inclusive = step.max_inclusive.clone();
            merged.max_exclusive = None;
        }
        if step.max_exclusive.is_some() {
            merged.max_exclusive = step.max_exclusive.clone();
            merged.max_inclusive = None;
        }
        if step.min_inclusive.is_some() {
            merged.min_inclusive = step.min_inclusive.clone();
            merged.min_exclusive = None;
        }
        if step.min_exclusive.is_some() {
            merged.min_exclusive = step.min_exclusive.clone();
            merged.min_inclusive = None;
        }
        merged.patterns.extend(step.patterns.iter().cloned());

        problems.extend(merged.consistency_problems(space));
        (merged, problems)
    }

    /// Facets that contradict one another
    pub fn consistency_problems(&self, space: ValueSpace) -> Vec<String> {
        let mut problems = Vec::new();
        if let (Some(min), Some(max)) = (self.min_length, self.max_length) {
            if min > max {
                problems.push(format!("minLength {} exceeds maxLength {}", min, max));
            }
        }
        if let Some(length) = self.length {
            if self.min_length.map_or(false, |m| m > length) || self.max_length.map_or(false, |m| m < length) {
                problems.push(format!("length {} conflicts with minLength/maxLength", length));
            }
        }
        if let (Some(total), Some(fraction)) = (self.total_digits, self.fraction_digits) {
            if fraction > total {
                problems.push(format!("fractionDigits {} exceeds totalDigits {}", fraction, total));
            }
        }
        let lower = self.min_inclusive.as_ref().or(self.min_exclusive.as_ref());
        let upper = self.max_inclusive.as_ref().or(self.max_exclusive.as_ref());
        if let (Some(lo), Some(hi)) = (lower, upper) {
            if space.compare(lo, hi) == Some(Ordering::Greater) {
                problems.push(format!("lower bound {} exceeds upper bound {}", lo, hi));
            }
        }
        problems
    }

    /// Validate a whitespace-normalized value
    ///
    /// `length` is the measured length: characters, octets or list items,
    /// as the caller's variety and value space dictate.
    pub fn validate(&self, value: &str, length: usize, space: ValueSpace) -> Result<()> {
        let fail = |message: String| {
            Err(Error::Validation(
                ValidationError::new(message).with_reason(format!("Actual value: '{}'", value)),
            ))
        };

        if let Some(expected) = self.length {
            if length != expected {
                return fail(format!("length must be exactly {}", expected));
            }
        }
        if let Some(min) = self.min_length {
            if length < min {
                return fail(format!("length must be at least {}", min));
            }
        }
        if let Some(max) = self.max_length {
            if length > max {
                return fail(format!("length must be at most {}", max));
            }
        }
        for step in &self.patterns {
            if !step.is_empty() && !step.iter().any(|p| p.is_match(value)) {
                let sources: Vec<&str> = step.iter().map(|p| p.source.as_str()).collect();
                return fail(format!("value does not match pattern '{}'", sources.join("|")));
            }
        }
        if let Some(allowed) = &self.enumeration {
            if !allowed.iter().any(|candidate| space.equal(candidate, value)) {
                return fail(format!("value is not one of {:?}", allowed));
            }
        }
        let bounds = [
            (&self.min_inclusive, "minInclusive", [Ordering::Greater, Ordering::Equal]),
            (&self.min_exclusive, "minExclusive", [Ordering::Greater, Ordering::Greater]),
            (&self.max_inclusive, "maxInclusive", [Ordering::Less, Ordering::Equal]),
            (&self.max_exclusive, "maxExclusive", [Ordering::Less, Ordering::Less]),
        ];
        for (bound, name, accepted) in bounds {
            if let Some(bound) = bound {
                if let Some(ordering) = space.compare(value, bound) {
                    if !accepted.contains(&ordering) {
                        return fail(format!("value violates {} {}", name, bound));
                    }
                }
            }
        }
        if self.total_digits.is_some() || self.fraction_digits.is_some() {
            let (total, fraction) = count_digits(value);
            if let Some(max) = self.total_digits {
                if total > max {
                    return fail(format!("value has more than {} digits", max));
                }
            }
            if let Some(max) = self.fraction_digits {
                if fraction > max {
                    return fail(format!("value has more than {} fraction digits", max));
                }
            }
        }
        Ok(())
    }
}

/// Significant digits and fraction digits of a decimal lexical value
fn count_digits(value: &str) -> (u32, u32) {
    let unsigned = value.trim_start_matches(['+', '-']);
    let (int_part, frac_part) = unsigned.split_once('.').unwrap_or((unsigned, ""));
    let int_part = int_part.trim_start_matches('0');
    let frac_part = frac_part.trim_end_matches('0');
    let total = (int_part.len() + frac_part.len()).max(1) as u32;
    (total, frac_part.len() as u32)
}
