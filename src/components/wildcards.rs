//! Wildcards (xs:any, xs:anyAttribute)
//!
//! Reference: https://www.w3.org/TR/xmlschema-1/#Wildcards

use std::fmt;

use crate::qnameset::QNameSet;

/// Process contents mode for wildcards
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ProcessContents {
    /// Validate strictly - element/attribute must be declared
    #[default]
    Strict,
    /// Validate if declaration found, otherwise accept
    Lax,
    /// Skip validation entirely
    Skip,
}

impl ProcessContents {
    /// Parse from string value
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "strict" => Some(Self::Strict),
            "lax" => Some(Self::Lax),
            "skip" => Some(Self::Skip),
            _ => None,
        }
    }

    /// Check if this is a valid restriction of another process contents
    pub fn is_restriction_of(&self, other: &Self) -> bool {
        match (self, other) {
            (a, b) if a == b => true,
            (Self::Strict, _) => true,
            (Self::Lax, Self::Skip) => true,
            _ => false,
        }
    }
}

impl fmt::Display for ProcessContents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Strict => write!(f, "strict"),
            Self::Lax => write!(f, "lax"),
            Self::Skip => write!(f, "skip"),
        }
    }
}

/// A wildcard: the names it admits and how their content is processed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Wildcard {
    /// Admitted names
    pub names: QNameSet,
    /// Processing mode
    pub process: ProcessContents,
}

impl Wildcard {
    /// Create a new wildcard
    pub fn new(names: QNameSet, process: ProcessContents) -> Self {
        Self { names, process }
    }

    /// Attribute wildcard union, used when extending a type: the names of
    /// both, processed as the derived wildcard says
    pub fn union(&self, base: &Wildcard) -> Wildcard {
        Wildcard::new(self.names.union(&base.names), self.process)
    }

    /// Attribute wildcard intersection, used for attribute group references
    pub fn intersect(&self, other: &Wildcard) -> Wildcard {
        Wildcard::new(self.names.intersect(&other.names), self.process)
    }

    /// Wildcard Subset: admits fewer names, processes at least as strictly
    pub fn is_restriction_of(&self, base: &Wildcard) -> bool {
        self.names.is_subset_of(&base.names) && self.process.is_restriction_of(&base.process)
    }
}

impl fmt::Display for Wildcard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.names, self.process)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_process_contents_parse() {
        assert_eq!(ProcessContents::parse("strict"), Some(ProcessContents::Strict));
        assert_eq!(ProcessContents::parse("lax"), Some(ProcessContents::Lax));
        assert_eq!(ProcessContents::parse("skip"), Some(ProcessContents::Skip));
        assert_eq!(ProcessContents::parse("invalid"), None);
    }

    #[test]
    fn test_process_contents_restriction() {
        assert!(ProcessContents::Strict.is_restriction_of(&ProcessContents::Lax));
        assert!(ProcessContents::Strict.is_restriction_of(&ProcessContents::Skip));
        assert!(ProcessContents::Lax.is_restriction_of(&ProcessContents::Skip));
        assert!(!ProcessContents::Skip.is_restriction_of(&ProcessContents::Strict));
        assert!(!ProcessContents::Lax.is_restriction_of(&ProcessContents::Strict));
    }

    #[test]
    fn test_wildcard_restriction() {
        let base = Wildcard::new(QNameSet::all(), ProcessContents::Lax);
        let narrower = Wildcard::new(QNameSet::for_namespaces(["urn:a"]), ProcessContents::Strict);
        assert!(narrower.is_restriction_of(&base));
        assert!(!base.is_restriction_of(&narrower));

        let looser = Wildcard::new(QNameSet::for_namespaces(["urn:a"]), ProcessContents::Skip);
        assert!(!looser.is_restriction_of(&base));
    }

    #[test]
    fn test_wildcard_union() {
        let a = Wildcard::new(QNameSet::for_namespaces(["urn:a"]), ProcessContents::Strict);
        let b = Wildcard::new(QNameSet::for_namespaces(["urn:b"]), ProcessContents::Lax);
        let u = a.union(&b);
        assert_eq!(u.process, ProcessContents::Strict);
        assert!(QNameSet::for_namespaces(["urn:a", "urn:b"]).is_subset_of(&u.names));
    }
}
