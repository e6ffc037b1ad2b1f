//! Error types for the schema compiler
//!
//! Two families live here. [`Error`] is returned through [`Result`] for
//! operational failures (I/O, malformed XML, precondition violations).
//! [`CompileError`] is a diagnostic recorded by a compilation without
//! stopping it; `compile` hands all of them back to the caller.

use std::fmt;
use thiserror::Error;

/// Result type alias using the compiler [`Error`]
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for operational failures
#[derive(Error, Debug)]
pub enum Error {
    /// Simple value validation error
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Schema document reading error
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// Resource loading error
    #[error("resource error: {0}")]
    Resource(String),

    /// Namespace error
    #[error("namespace error: {0}")]
    Namespace(String),

    /// Name error (invalid XML name)
    #[error("name error: {0}")]
    Name(String),

    /// Limit exceeded error
    #[error("limit exceeded: {0}")]
    LimitExceeded(String),

    /// A required collaborator was not supplied to the compiler
    #[error("precondition violated: {0}")]
    Precondition(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// XML syntax error
    #[error("XML error: {0}")]
    Xml(String),

    /// URL parsing error
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Simple value validation error with context
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// Error message
    pub message: String,
    /// Why the value was rejected
    pub reason: Option<String>,
}

impl ValidationError {
    /// Create a new validation error
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            reason: None,
        }
    }

    /// Set the reason
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;

        if let Some(ref reason) = self.reason {
            write!(f, " ({})", reason)?;
        }

        Ok(())
    }
}

impl std::error::Error for ValidationError {}

/// Schema document reading error
#[derive(Debug, Clone)]
pub struct ParseError {
    /// Error message
    pub message: String,
    /// Location in the schema document
    pub location: Option<String>,
}

impl ParseError {
    /// Create a new parse error
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            location: None,
        }
    }

    /// Set the location
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;

        if let Some(ref loc) = self.location {
            write!(f, " at {}", loc)?;
        }

        Ok(())
    }
}

impl std::error::Error for ParseError {}

/// Severity of a recorded compile diagnostic
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Fails the compilation
    Error,
    /// A problem that partial compilation papered over
    Recoverable,
    /// Informational problem, never fails the compilation
    Warning,
}

impl Severity {
    /// Whether a diagnostic of this severity fails the compilation
    pub fn is_fatal(&self) -> bool {
        matches!(self, Severity::Error)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Recoverable => write!(f, "recoverable"),
            Severity::Warning => write!(f, "warning"),
        }
    }
}

/// What kind of problem a compile diagnostic reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorCategory {
    /// Document not found, not fetchable, malformed, or in the wrong namespace
    Resource,
    /// A type, group or substitution group that depends on itself
    CyclicDependency,
    /// A derivation by restriction that does not restrict its base
    RestrictionInvalid,
    /// A key/keyref/unique problem
    IdentityConstraint,
    /// A default or fixed value that is not valid for its type
    ValueValidity,
    /// A reference to a component that does not exist
    Reference,
    /// Any other structural schema problem
    Structure,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorCategory::Resource => "resource",
            ErrorCategory::CyclicDependency => "cyclic-dependency",
            ErrorCategory::RestrictionInvalid => "restriction-invalid",
            ErrorCategory::IdentityConstraint => "identity-constraint",
            ErrorCategory::ValueValidity => "value-validity",
            ErrorCategory::Reference => "reference",
            ErrorCategory::Structure => "structure",
        };
        write!(f, "{}", s)
    }
}

/// A diagnostic recorded during compilation
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct CompileError {
    /// Severity
    pub severity: Severity,
    /// Category
    pub category: ErrorCategory,
    /// Human readable message
    pub message: String,
    /// Source document location
    pub location: Option<String>,
    /// Offending schema component, when there is one
    pub component: Option<String>,
}

impl CompileError {
    /// Create a new error-severity diagnostic
    pub fn new(category: ErrorCategory, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            category,
            message: message.into(),
            location: None,
            component: None,
        }
    }

    /// Set the severity
    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    /// Set the source location
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Set the offending component
    pub fn with_component(mut self, component: impl Into<String>) -> Self {
        self.component = Some(component.into());
        self
    }

    /// Whether this diagnostic fails the compilation
    pub fn is_fatal(&self) -> bool {
        self.severity.is_fatal()
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]: {}", self.severity, self.category, self.message)?;

        if let Some(ref component) = self.component {
            write!(f, " (in {})", component)?;
        }

        if let Some(ref loc) = self.location {
            write!(f, " at {}", loc)?;
        }

        Ok(())
    }
}

impl std::error::Error for CompileError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_display() {
        let err = ValidationError::new("value is not a valid xs:int")
            .with_reason("Actual value: abc");

        let msg = format!("{}", err);
        assert!(msg.contains("not a valid xs:int"));
        assert!(msg.contains("Actual value: abc"));
    }

    #[test]
    fn test_parse_error_display() {
        let err = ParseError::new("unexpected element 'foo'").with_location("schema.xsd");

        let msg = format!("{}", err);
        assert!(msg.contains("unexpected element"));
        assert!(msg.contains("schema.xsd"));
    }

    #[test]
    fn test_compile_error_display() {
        let err = CompileError::new(ErrorCategory::CyclicDependency, "type 'T' derives from itself")
            .with_component("{urn:a}T")
            .with_location("a.xsd");

        let msg = err.to_string();
        assert!(msg.starts_with("error [cyclic-dependency]"));
        assert!(msg.contains("{urn:a}T"));
        assert!(msg.contains("a.xsd"));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_severity_fatality() {
        assert!(Severity::Error.is_fatal());
        assert!(!Severity::Recoverable.is_fatal());
        assert!(!Severity::Warning.is_fatal());
    }

    #[test]
    fn test_error_conversion() {
        let val_err = ValidationError::new("test");
        let err: Error = val_err.into();
        assert!(matches!(err, Error::Validation(_)));
    }
}
