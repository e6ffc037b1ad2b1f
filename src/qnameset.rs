//! Intensional sets of qualified names
//!
//! A [`QNameSet`] describes a possibly infinite set of names as a namespace
//! set (either the namespaces included, or the namespaces excluded) plus two
//! finite exception lists: names excluded although their namespace is in the
//! set, and names included although their namespace is not. Wildcard
//! namespace constraints (`##any`, `##other`, lists) are all expressible.
//!
//! The empty string stands for "no namespace" throughout.

use crate::namespaces::QName;
use std::collections::BTreeSet;
use std::fmt;

/// An immutable set of qualified names
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QNameSet {
    /// When true, `namespaces` lists the namespaces NOT in the set
    namespaces_excluded: bool,
    namespaces: BTreeSet<String>,
    /// Names whose namespace is in the set but which are not
    excluded_names: BTreeSet<QName>,
    /// Names whose namespace is not in the set but which are
    included_names: BTreeSet<QName>,
}

impl QNameSet {
    fn build(
        namespaces_excluded: bool,
        namespaces: BTreeSet<String>,
        excluded_names: BTreeSet<QName>,
        included_names: BTreeSet<QName>,
    ) -> Self {
        let mut set = Self {
            namespaces_excluded,
            namespaces,
            excluded_names: BTreeSet::new(),
            included_names: BTreeSet::new(),
        };
        // keep the exception lists canonical so that equal sets compare equal
        set.excluded_names = excluded_names
            .into_iter()
            .filter(|q| set.contains_namespace(q.namespace_str()))
            .collect();
        set.included_names = included_names
            .into_iter()
            .filter(|q| !set.contains_namespace(q.namespace_str()))
            .collect();
        set
    }

    /// The set of no names
    pub fn empty() -> Self {
        Self::build(false, BTreeSet::new(), BTreeSet::new(), BTreeSet::new())
    }

    /// The set of every name
    pub fn all() -> Self {
        Self::build(true, BTreeSet::new(), BTreeSet::new(), BTreeSet::new())
    }

    /// Every name in one of the given namespaces
    pub fn for_namespaces<I, S>(namespaces: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let namespaces = namespaces.into_iter().map(Into::into).collect();
        Self::build(false, namespaces, BTreeSet::new(), BTreeSet::new())
    }

    /// Every name in none of the given namespaces
    pub fn excluding_namespaces<I, S>(namespaces: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let namespaces = namespaces.into_iter().map(Into::into).collect();
        Self::build(true, namespaces, BTreeSet::new(), BTreeSet::new())
    }

    /// Exactly one name
    pub fn singleton(name: QName) -> Self {
        Self::build(
            false,
            BTreeSet::new(),
            BTreeSet::new(),
            BTreeSet::from([name]),
        )
    }

    /// Build the set a wildcard's `namespace` attribute admits
    ///
    /// `##other` admits every namespace except the target namespace and the
    /// absent namespace.
    pub fn from_wildcard_namespace(value: &str, target_namespace: Option<&str>) -> Self {
        let tns = target_namespace.unwrap_or("");
        match value.trim() {
            "##any" => Self::all(),
            "##other" => Self::excluding_namespaces([tns.to_string(), String::new()]),
            other => Self::for_namespaces(other.split_whitespace().map(|token| match token {
                "##local" => String::new(),
                "##targetNamespace" => tns.to_string(),
                uri => uri.to_string(),
            })),
        }
    }

    fn contains_namespace(&self, namespace: &str) -> bool {
        self.namespaces.contains(namespace) != self.namespaces_excluded
    }

    /// Whether `name` is in the set
    pub fn contains(&self, name: &QName) -> bool {
        if self.contains_namespace(name.namespace_str()) {
            !self.excluded_names.contains(name)
        } else {
            self.included_names.contains(name)
        }
    }

    /// Whether the set contains no names
    pub fn is_empty(&self) -> bool {
        !self.namespaces_excluded && self.namespaces.is_empty() && self.included_names.is_empty()
    }

    /// Whether the set contains every name
    pub fn is_all(&self) -> bool {
        self.namespaces_excluded && self.namespaces.is_empty() && self.excluded_names.is_empty()
    }

    /// The complement of this set
    pub fn inverse(&self) -> Self {
        Self::build(
            !self.namespaces_excluded,
            self.namespaces.clone(),
            self.included_names.clone(),
            self.excluded_names.clone(),
        )
    }

    /// Names in either set
    pub fn union(&self, other: &QNameSet) -> Self {
        let (namespaces_excluded, namespaces) =
            match (self.namespaces_excluded, other.namespaces_excluded) {
                (false, false) => (false, &self.namespaces | &other.namespaces),
                (true, true) => (true, &self.namespaces & &other.namespaces),
                (true, false) => (true, &self.namespaces - &other.namespaces),
                (false, true) => (true, &other.namespaces - &self.namespaces),
            };
        let excluded_names = self
            .excluded_names
            .union(&other.excluded_names)
            .filter(|q| !self.contains(q) && !other.contains(q))
            .cloned()
            .collect();
        let included_names = self
            .included_names
            .union(&other.included_names)
            .cloned()
            .collect();
        Self::build(namespaces_excluded, namespaces, excluded_names, included_names)
    }

    /// Names in both sets
    pub fn intersect(&self, other: &QNameSet) -> Self {
        self.inverse().union(&other.inverse()).inverse()
    }

    /// Names in this set but not in `other`
    pub fn minus(&self, other: &QNameSet) -> Self {
        self.intersect(&other.inverse())
    }

    /// Whether every name in this set is also in `other`
    pub fn is_subset_of(&self, other: &QNameSet) -> bool {
        self.minus(other).is_empty()
    }

    /// Whether the two sets share no name
    pub fn is_disjoint(&self, other: &QNameSet) -> bool {
        self.intersect(other).is_empty()
    }
}

impl Default for QNameSet {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Display for QNameSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_all() {
            return write!(f, "##any");
        }
        let quoted: Vec<String> = self
            .namespaces
            .iter()
            .map(|ns| if ns.is_empty() { "##local".to_string() } else { ns.clone() })
            .collect();
        if self.namespaces_excluded {
            write!(f, "not({})", quoted.join(" "))?;
        } else {
            write!(f, "({})", quoted.join(" "))?;
        }
        for name in &self.excluded_names {
            write!(f, " -{}", name)?;
        }
        for name in &self.included_names {
            write!(f, " +{}", name)?;
        }
        Ok(())
    }
}
