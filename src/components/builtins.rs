//! XSD built-in types
//!
//! The built-in primitive and derived simple types, their place in the type
//! hierarchy, and the lexical checks used to validate default and fixed
//! values. The table is ordered so that every type follows its base; the
//! compiler seeds its arena in this order.

use std::cmp::Ordering;
use std::str::FromStr;

use base64::Engine;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;

use crate::error::{Error, Result, ValidationError};
use crate::names;

use super::facets::WhiteSpace;

/// XSD anyType type name
pub const XSD_ANY_TYPE: &str = "anyType";
/// XSD anySimpleType type name
pub const XSD_ANY_SIMPLE_TYPE: &str = "anySimpleType";
/// XSD ID type name
pub const XSD_ID: &str = "ID";

/// The value space a built-in type's values live in, which decides how
/// values are ordered and compared
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueSpace {
    /// anySimpleType: no ordering
    AnySimple,
    /// string and its derivations
    String,
    /// boolean
    Boolean,
    /// decimal and the integer types
    Decimal,
    /// float
    Float,
    /// double
    Double,
    /// duration
    Duration,
    /// dateTime
    DateTime,
    /// time
    Time,
    /// date
    Date,
    /// gYearMonth, gYear, gMonthDay, gDay, gMonth
    Gregorian,
    /// hexBinary
    HexBinary,
    /// base64Binary
    Base64Binary,
    /// anyURI
    AnyUri,
    /// QName and NOTATION
    QName,
}

impl ValueSpace {
    /// Order two lexical values, when the value space is ordered and both
    /// values parse
    pub fn compare(&self, a: &str, b: &str) -> Option<Ordering> {
        let (a, b) = (a.trim(), b.trim());
        match self {
            ValueSpace::Decimal => {
                let a = Decimal::from_str(a.trim_start_matches('+')).ok()?;
                let b = Decimal::from_str(b.trim_start_matches('+')).ok()?;
                Some(a.cmp(&b))
            }
            ValueSpace::Float | ValueSpace::Double => parse_float(a)?.partial_cmp(&parse_float(b)?),
            ValueSpace::DateTime => {
                let fmt = "%Y-%m-%dT%H:%M:%S%.f";
                let a = NaiveDateTime::parse_from_str(strip_timezone(a), fmt).ok()?;
                let b = NaiveDateTime::parse_from_str(strip_timezone(b), fmt).ok()?;
                Some(a.cmp(&b))
            }
            ValueSpace::Date => {
                let a = NaiveDate::parse_from_str(strip_timezone(a), "%Y-%m-%d").ok()?;
                let b = NaiveDate::parse_from_str(strip_timezone(b), "%Y-%m-%d").ok()?;
                Some(a.cmp(&b))
            }
            ValueSpace::Time => {
                let a = NaiveTime::parse_from_str(strip_timezone(a), "%H:%M:%S%.f").ok()?;
                let b = NaiveTime::parse_from_str(strip_timezone(b), "%H:%M:%S%.f").ok()?;
                Some(a.cmp(&b))
            }
            _ => None,
        }
    }

    /// Whether two lexical values denote the same value
    pub fn equal(&self, a: &str, b: &str) -> bool {
        if let Some(ordering) = self.compare(a, b) {
            return ordering == Ordering::Equal;
        }
        match self {
            ValueSpace::Boolean => parse_boolean(a) == parse_boolean(b),
            ValueSpace::HexBinary => a.trim().eq_ignore_ascii_case(b.trim()),
            _ => a == b,
        }
    }

    /// Whether the value space is ordered, for min/max facets
    pub fn is_ordered(&self) -> bool {
        matches!(
            self,
            ValueSpace::Decimal
                | ValueSpace::Float
                | ValueSpace::Double
                | ValueSpace::DateTime
                | ValueSpace::Date
                | ValueSpace::Time
                | ValueSpace::Duration
                | ValueSpace::Gregorian
        )
    }

    /// Whether length facets count characters (true) or octets (false)
    pub fn is_binary(&self) -> bool {
        matches!(self, ValueSpace::HexBinary | ValueSpace::Base64Binary)
    }
}

/// Definition of a built-in XSD type
#[derive(Debug, Clone)]
pub struct BuiltinType {
    /// Type name (local name without namespace)
    pub name: &'static str,
    /// Base type name; None for anyType
    pub base: Option<&'static str>,
    /// Item type name, for the built-in list types
    pub item: Option<&'static str>,
    /// Value space
    pub value_space: ValueSpace,
    /// White space handling
    pub white_space: WhiteSpace,
    /// Lexical check on the whitespace-normalized value
    validator: fn(&str) -> Result<()>,
}

impl BuiltinType {
    /// Validate a lexical value against this type
    pub fn validate(&self, value: &str) -> Result<()> {
        let normalized = self.white_space.normalize(value);
        (self.validator)(&normalized)
    }

    /// Whether this is anyType or anySimpleType
    pub fn is_special(&self) -> bool {
        matches!(self.name, XSD_ANY_TYPE | XSD_ANY_SIMPLE_TYPE)
    }

    /// Whether this is ID or derived from it
    pub fn is_id(&self) -> bool {
        self.name == XSD_ID
    }
}

macro_rules! builtin {
    ($name:literal, $base:literal, $space:ident, $ws:ident, $validator:expr) => {
        BuiltinType {
            name: $name,
            base: Some($base),
            item: None,
            value_space: ValueSpace::$space,
            white_space: WhiteSpace::$ws,
            validator: $validator,
        }
    };
}

macro_rules! builtin_list {
    ($name:literal, $item:literal) => {
        BuiltinType {
            name: $name,
            base: Some(XSD_ANY_SIMPLE_TYPE),
            item: Some($item),
            value_space: ValueSpace::String,
            white_space: WhiteSpace::Collapse,
            validator: accept,
        }
    };
}

/// Every built-in type, bases first
pub static BUILTIN_TYPES: Lazy<Vec<BuiltinType>> = Lazy::new(|| {
    vec![
        BuiltinType {
            name: XSD_ANY_TYPE,
            base: None,
            item: None,
            value_space: ValueSpace::AnySimple,
            white_space: WhiteSpace::Preserve,
            validator: accept,
        },
        builtin!("anySimpleType", "anyType", AnySimple, Preserve, accept),
        // primitives
        builtin!("string", "anySimpleType", String, Preserve, accept),
        builtin!("boolean", "anySimpleType", Boolean, Collapse, validate_boolean),
        builtin!("decimal", "anySimpleType", Decimal, Collapse, validate_decimal),
        builtin!("float", "anySimpleType", Float, Collapse, validate_float),
        builtin!("double", "anySimpleType", Double, Collapse, validate_float),
        builtin!("duration", "anySimpleType", Duration, Collapse, validate_duration),
        builtin!("dateTime", "anySimpleType", DateTime, Collapse, validate_datetime),
        builtin!("time", "anySimpleType", Time, Collapse, validate_time),
        builtin!("date", "anySimpleType", Date, Collapse, validate_date),
        builtin!("gYearMonth", "anySimpleType", Gregorian, Collapse, validate_gyear_month),
        builtin!("gYear", "anySimpleType", Gregorian, Collapse, validate_gyear),
        builtin!("gMonthDay", "anySimpleType", Gregorian, Collapse, validate_gmonth_day),
        builtin!("gDay", "anySimpleType", Gregorian, Collapse, validate_gday),
        builtin!("gMonth", "anySimpleType", Gregorian, Collapse, validate_gmonth),
        builtin!("hexBinary", "anySimpleType", HexBinary, Collapse, validate_hex_binary),
        builtin!("base64Binary", "anySimpleType", Base64Binary, Collapse, validate_base64_binary),
        builtin!("anyURI", "anySimpleType", AnyUri, Collapse, validate_any_uri),
        builtin!("QName", "anySimpleType", QName, Collapse, validate_qname),
        builtin!("NOTATION", "anySimpleType", QName, Collapse, validate_qname),
        // string derivations
        builtin!("normalizedString", "string", String, Replace, validate_normalized_string),
        builtin!("token", "normalizedString", String, Collapse, validate_token),
        builtin!("language", "token", String, Collapse, validate_language),
        builtin!("NMTOKEN", "token", String, Collapse, validate_nmtoken),
        builtin!("Name", "token", String, Collapse, validate_name),
        builtin!("NCName", "Name", String, Collapse, validate_ncname),
        builtin!("ID", "NCName", String, Collapse, validate_ncname),
        builtin!("IDREF", "NCName", String, Collapse, validate_ncname),
        builtin!("ENTITY", "NCName", String, Collapse, validate_ncname),
        builtin_list!("NMTOKENS", "NMTOKEN"),
        builtin_list!("IDREFS", "IDREF"),
        builtin_list!("ENTITIES", "ENTITY"),
        // integer derivations
        builtin!("integer", "decimal", Decimal, Collapse, validate_integer),
        builtin!("nonPositiveInteger", "integer", Decimal, Collapse, validate_non_positive_integer),
        builtin!("negativeInteger", "nonPositiveInteger", Decimal, Collapse, validate_negative_integer),
        builtin!("long", "integer", Decimal, Collapse, validate_long),
        builtin!("int", "long", Decimal, Collapse, validate_int),
        builtin!("short", "int", Decimal, Collapse, validate_short),
        builtin!("byte", "short", Decimal, Collapse, validate_byte),
        builtin!("nonNegativeInteger", "integer", Decimal, Collapse, validate_non_negative_integer),
        builtin!("unsignedLong", "nonNegativeInteger", Decimal, Collapse, validate_unsigned_long),
        builtin!("unsignedInt", "unsignedLong", Decimal, Collapse, validate_unsigned_int),
        builtin!("unsignedShort", "unsignedInt", Decimal, Collapse, validate_unsigned_short),
        builtin!("unsignedByte", "unsignedShort", Decimal, Collapse, validate_unsigned_byte),
        builtin!("positiveInteger", "nonNegativeInteger", Decimal, Collapse, validate_positive_integer),
    ]
});

/// Look up a built-in type by local name
pub fn builtin(name: &str) -> Option<&'static BuiltinType> {
    BUILTIN_TYPES.iter().find(|t| t.name == name)
}

fn invalid(type_name: &str, value: &str) -> Error {
    Error::Validation(
        ValidationError::new(format!("invalid {} value", type_name))
            .with_reason(format!("Actual value: '{}'", value)),
    )
}

const TIMEZONE: &str = r"(Z|[+-]((0\d|1[0-3]):[0-5]\d|14:00))?";

fn pattern(body: &str) -> Regex {
    Regex::new(&format!("^{}{}$", body, TIMEZONE)).expect("built-in pattern is valid")
}

static DECIMAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[+-]?(\d+(\.\d*)?|\.\d+)$").expect("decimal pattern is valid"));
static INTEGER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[+-]?\d+$").expect("integer pattern is valid"));
static FLOAT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[+-]?(\d+(\.\d*)?|\.\d+)([eE][+-]?\d+)?$").expect("float pattern is valid")
});
static DURATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^-?P(\d+Y)?(\d+M)?(\d+D)?(T(\d+H)?(\d+M)?(\d+(\.\d+)?S)?)?$")
        .expect("duration pattern is valid")
});
static LANGUAGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z]{1,8}(-[a-zA-Z0-9]{1,8})*$").expect("language pattern is valid")
});
static HEX_BINARY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([0-9a-fA-F]{2})*$").expect("hexBinary pattern is valid"));
static DATETIME_TZ: Lazy<Regex> = Lazy::new(|| pattern(r"-?\d{4,}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}(\.\d+)?"));
static DATE_TZ: Lazy<Regex> = Lazy::new(|| pattern(r"-?\d{4,}-\d{2}-\d{2}"));
static TIME_TZ: Lazy<Regex> = Lazy::new(|| pattern(r"\d{2}:\d{2}:\d{2}(\.\d+)?"));
static GYEAR_MONTH: Lazy<Regex> = Lazy::new(|| pattern(r"-?\d{4,}-(0[1-9]|1[0-2])"));
static GYEAR: Lazy<Regex> = Lazy::new(|| pattern(r"-?\d{4,}"));
static GMONTH_DAY: Lazy<Regex> = Lazy::new(|| pattern(r"--(0[1-9]|1[0-2])-(0[1-9]|[12]\d|3[01])"));
static GDAY: Lazy<Regex> = Lazy::new(|| pattern(r"---(0[1-9]|[12]\d|3[01])"));
static GMONTH: Lazy<Regex> = Lazy::new(|| pattern(r"--(0[1-9]|1[0-2])"));

fn strip_timezone(value: &str) -> &str {
    if let Some(stripped) = value.strip_suffix('Z') {
        return stripped;
    }
    // a trailing +hh:mm or -hh:mm, but not the date's own hyphens
    let Some(split) = value.len().checked_sub(6).filter(|&i| i > 0) else {
        return value;
    };
    match (value.get(..split), value.as_bytes().get(split..)) {
        (Some(head), Some([sign, _, _, b':', _, _])) if *sign == b'+' || *sign == b'-' => head,
        _ => value,
    }
}

fn parse_boolean(value: &str) -> Option<bool> {
    match value.trim() {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}

fn parse_float(value: &str) -> Option<f64> {
    match value {
        "INF" | "+INF" => Some(f64::INFINITY),
        "-INF" => Some(f64::NEG_INFINITY),
        "NaN" => Some(f64::NAN),
        v if FLOAT.is_match(v) => v.parse().ok(),
        _ => None,
    }
}

fn accept(_value: &str) -> Result<()> {
    Ok(())
}

fn validate_boolean(value: &str) -> Result<()> {
    parse_boolean(value).map(|_| ()).ok_or_else(|| invalid("boolean", value))
}

fn validate_decimal(value: &str) -> Result<()> {
    if DECIMAL.is_match(value) {
        Ok(())
    } else {
        Err(invalid("decimal", value))
    }
}

fn validate_float(value: &str) -> Result<()> {
    parse_float(value).map(|_| ()).ok_or_else(|| invalid("float", value))
}

/// Check an integer lexical value and its range; values too long for i128
/// are only checked by sign
fn integer_in_range(type_name: &str, value: &str, min: Option<i128>, max: Option<i128>) -> Result<()> {
    if !INTEGER.is_match(value) {
        return Err(invalid(type_name, value));
    }
    let in_range = match value.trim_start_matches('+').parse::<i128>() {
        Ok(n) => min.map_or(true, |m| n >= m) && max.map_or(true, |m| n <= m),
        // too long for i128: beyond any finite bound on its side of zero
        Err(_) => {
            if value.starts_with('-') {
                min.is_none()
            } else {
                max.is_none()
            }
        }
    };
    if in_range {
        Ok(())
    } else {
        Err(Error::Validation(
            ValidationError::new(format!("{} value out of range", type_name))
                .with_reason(format!("Actual value: '{}'", value)),
        ))
    }
}

fn validate_integer(value: &str) -> Result<()> {
    integer_in_range("integer", value, None, None)
}

fn validate_non_positive_integer(value: &str) -> Result<()> {
    integer_in_range("nonPositiveInteger", value, None, Some(0))
}

fn validate_negative_integer(value: &str) -> Result<()> {
    integer_in_range("negativeInteger", value, None, Some(-1))
}

fn validate_long(value: &str) -> Result<()> {
    integer_in_range("long", value, Some(i64::MIN as i128), Some(i64::MAX as i128))
}

fn validate_int(value: &str) -> Result<()> {
    integer_in_range("int", value, Some(i32::MIN as i128), Some(i32::MAX as i128))
}

fn validate_short(value: &str) -> Result<()> {
    integer_in_range("short", value, Some(i16::MIN as i128), Some(i16::MAX as i128))
}

fn validate_byte(value: &str) -> Result<()> {
    integer_in_range("byte", value, Some(i8::MIN as i128), Some(i8::MAX as i128))
}

fn validate_non_negative_integer(value: &str) -> Result<()> {
    integer_in_range("nonNegativeInteger", value, Some(0), None)
}

fn validate_positive_integer(value: &str) -> Result<()> {
    integer_in_range("positiveInteger", value, Some(1), None)
}

fn validate_unsigned_long(value: &str) -> Result<()> {
    integer_in_range("unsignedLong", value, Some(0), Some(u64::MAX as i128))
}

fn validate_unsigned_int(value: &str) -> Result<()> {
    integer_in_range("unsignedInt", value, Some(0), Some(u32::MAX as i128))
}

fn validate_unsigned_short(value: &str) -> Result<()> {
    integer_in_range("unsignedShort", value, Some(0), Some(u16::MAX as i128))
}

fn validate_unsigned_byte(value: &str) -> Result<()> {
    integer_in_range("unsignedByte", value, Some(0), Some(u8::MAX as i128))
}

fn validate_duration(value: &str) -> Result<()> {
    if !DURATION.is_match(value) || value.ends_with('P') || value.ends_with('T') {
        return Err(invalid("duration", value));
    }
    Ok(())
}

fn validate_datetime(value: &str) -> Result<()> {
    if !DATETIME_TZ.is_match(value) {
        return Err(invalid("dateTime", value));
    }
    let naive = strip_timezone(value).trim_start_matches('-');
    if naive.ends_with("T24:00:00") {
        return Ok(());
    }
    NaiveDateTime::parse_from_str(naive, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|_| ())
        .map_err(|_| invalid("dateTime", value))
}

fn validate_date(value: &str) -> Result<()> {
    if !DATE_TZ.is_match(value) {
        return Err(invalid("date", value));
    }
    let naive = strip_timezone(value).trim_start_matches('-');
    NaiveDate::parse_from_str(naive, "%Y-%m-%d")
        .map(|_| ())
        .map_err(|_| invalid("date", value))
}

fn validate_time(value: &str) -> Result<()> {
    if !TIME_TZ.is_match(value) {
        return Err(invalid("time", value));
    }
    let naive = strip_timezone(value);
    if naive == "24:00:00" {
        return Ok(());
    }
    NaiveTime::parse_from_str(naive, "%H:%M:%S%.f")
        .map(|_| ())
        .map_err(|_| invalid("time", value))
}

fn validate_gyear_month(value: &str) -> Result<()> {
    GYEAR_MONTH.is_match(value).then_some(()).ok_or_else(|| invalid("gYearMonth", value))
}

fn validate_gyear(value: &str) -> Result<()> {
    GYEAR.is_match(value).then_some(()).ok_or_else(|| invalid("gYear", value))
}

fn validate_gmonth_day(value: &str) -> Result<()> {
    GMONTH_DAY.is_match(value).then_some(()).ok_or_else(|| invalid("gMonthDay", value))
}

fn validate_gday(value: &str) -> Result<()> {
    GDAY.is_match(value).then_some(()).ok_or_else(|| invalid("gDay", value))
}

fn validate_gmonth(value: &str) -> Result<()> {
    GMONTH.is_match(value).then_some(()).ok_or_else(|| invalid("gMonth", value))
}

fn validate_hex_binary(value: &str) -> Result<()> {
    HEX_BINARY.is_match(value).then_some(()).ok_or_else(|| invalid("hexBinary", value))
}

fn validate_base64_binary(value: &str) -> Result<()> {
    let compact: String = value.chars().filter(|c| !c.is_whitespace()).collect();
    base64::engine::general_purpose::STANDARD
        .decode(compact.as_bytes())
        .map(|_| ())
        .map_err(|_| invalid("base64Binary", value))
}

fn validate_any_uri(value: &str) -> Result<()> {
    if value.contains(['\n', '\r', '\t']) {
        return Err(invalid("anyURI", value));
    }
    Ok(())
}

fn validate_qname(value: &str) -> Result<()> {
    names::validate_qname(value)
}

fn validate_normalized_string(value: &str) -> Result<()> {
    if value.contains(['\r', '\n', '\t']) {
        return Err(invalid("normalizedString", value));
    }
    Ok(())
}

fn validate_token(value: &str) -> Result<()> {
    if value.starts_with(' ') || value.ends_with(' ') || value.contains("  ") {
        return Err(invalid("token", value));
    }
    validate_normalized_string(value)
}

fn validate_language(value: &str) -> Result<()> {
    LANGUAGE.is_match(value).then_some(()).ok_or_else(|| invalid("language", value))
}

fn validate_nmtoken(value: &str) -> Result<()> {
    names::is_valid_nmtoken(value).then_some(()).ok_or_else(|| invalid("NMTOKEN", value))
}

fn validate_name(value: &str) -> Result<()> {
    names::is_valid_name(value).then_some(()).ok_or_else(|| invalid("Name", value))
}

fn validate_ncname(value: &str) -> Result<()> {
    names::validate_ncname(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid(name: &str, value: &str) -> bool {
        builtin(name).unwrap().validate(value).is_ok()
    }

    #[test]
    fn test_table_is_ordered_bases_first() {
        for (i, ty) in BUILTIN_TYPES.iter().enumerate() {
            if let Some(base) = ty.base {
                let base_index = BUILTIN_TYPES.iter().position(|t| t.name == base).unwrap();
                assert!(base_index < i, "{} precedes its base {}", ty.name, base);
            }
            if let Some(item) = ty.item {
                assert!(builtin(item).is_some());
            }
        }
        assert_eq!(BUILTIN_TYPES[0].name, XSD_ANY_TYPE);
        assert_eq!(BUILTIN_TYPES[1].name, XSD_ANY_SIMPLE_TYPE);
    }

    #[test]
    fn test_numeric_types() {
        assert!(valid("decimal", "-12.50"));
        assert!(valid("decimal", ".5"));
        assert!(!valid("decimal", "1e3"));
        assert!(valid("integer", "123456789012345678901234567890"));
        assert!(valid("int", " 42 "));
        assert!(!valid("int", "2147483648"));
        assert!(valid("byte", "-128"));
        assert!(!valid("byte", "128"));
        assert!(valid("nonNegativeInteger", "0"));
        assert!(!valid("positiveInteger", "0"));
        assert!(!valid("nonNegativeInteger", "-99999999999999999999999999999999999999999"));
        assert!(valid("float", "1.5E3"));
        assert!(valid("double", "-INF"));
        assert!(!valid("double", "abc"));
    }

    #[test]
    fn test_date_time_types() {
        assert!(valid("date", "2024-02-29"));
        assert!(!valid("date", "2023-02-29"));
        assert!(valid("date", "2024-01-15Z"));
        assert!(valid("dateTime", "2024-01-15T10:30:00.5+02:00"));
        assert!(!valid("dateTime", "2024-01-15 10:30:00"));
        assert!(valid("time", "23:59:59"));
        assert!(!valid("time", "25:00:00"));
        assert!(valid("duration", "P1Y2M3DT4H5M6.5S"));
        assert!(!valid("duration", "P"));
        assert!(!valid("duration", "P1DT"));
        assert!(valid("gYearMonth", "2024-12"));
        assert!(valid("gMonthDay", "--12-25"));
        assert!(!valid("gMonth", "--13"));
    }

    #[test]
    fn test_string_types() {
        assert!(valid("string", "  anything\tgoes "));
        assert!(valid("token", "  collapsed   to one  "));
        assert!(valid("language", "en-US"));
        assert!(!valid("language", "toolonglanguage"));
        assert!(valid("NCName", "a.b-c"));
        assert!(!valid("NCName", "a:b"));
        assert!(valid("QName", "xs:string"));
        assert!(valid("boolean", "1"));
        assert!(!valid("boolean", "yes"));
    }

    #[test]
    fn test_binary_types() {
        assert!(valid("hexBinary", "0FB7"));
        assert!(!valid("hexBinary", "0FB"));
        assert!(valid("base64Binary", "SGVsbG8="));
        assert!(!valid("base64Binary", "SGVsbG8"));
    }

    #[test]
    fn test_value_space_comparison() {
        assert_eq!(ValueSpace::Decimal.compare("1.0", "1"), Some(Ordering::Equal));
        assert_eq!(ValueSpace::Decimal.compare("+2", "10"), Some(Ordering::Less));
        assert_eq!(ValueSpace::Double.compare("INF", "1e308"), Some(Ordering::Greater));
        assert_eq!(ValueSpace::Date.compare("2024-01-02", "2024-01-01"), Some(Ordering::Greater));
        assert_eq!(ValueSpace::String.compare("a", "b"), None);
        assert!(ValueSpace::Boolean.equal("1", "true"));
        assert!(ValueSpace::Decimal.equal("01.50", "1.5"));
        assert!(!ValueSpace::String.equal("a", "A"));
    }

    #[test]
    fn test_non_ascii_values_are_rejected_not_sliced() {
        assert_eq!(strip_timezone("2024-01-15+02:00"), "2024-01-15");
        assert_eq!(strip_timezone("2024-01-15Z"), "2024-01-15");
        assert_eq!(strip_timezone("aé12345"), "aé12345");
        assert_eq!(strip_timezone("é"), "é");
        assert_eq!(ValueSpace::Date.compare("aé12345", "2020-01-01"), None);
        assert_eq!(ValueSpace::DateTime.compare("2020-01-01T00:00:00", "ééé:éé"), None);
        assert!(!valid("date", "aé12345"));
        assert!(!valid("time", "1é:00:00+0é:00"));
    }
}
