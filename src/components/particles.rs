//! Content model particles
//!
//! A content model is a tree of [`SchemaParticle`]s: model groups (all,
//! choice, sequence) over element and wildcard leaves, each node carrying
//! occurrence bounds.
//!
//! Reference: https://www.w3.org/TR/xmlschema-1/#cParticles

use std::fmt;

use crate::namespaces::QName;
use crate::qnameset::QNameSet;

use super::types::DerivationSet;
use super::wildcards::Wildcard;
use super::{ElementId, IdentityId, TypeId};

/// Occurrence bounds for a particle (minOccurs, maxOccurs)
/// None for max means unbounded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Occurs {
    /// Minimum number of occurrences (default 1)
    pub min: u32,
    /// Maximum number of occurrences (None = unbounded, default 1)
    pub max: Option<u32>,
}

impl Occurs {
    /// Create new occurrence bounds
    pub fn new(min: u32, max: Option<u32>) -> Self {
        Self { min, max }
    }

    /// Default occurrence (1, 1)
    pub fn once() -> Self {
        Self { min: 1, max: Some(1) }
    }

    /// Optional occurrence (0, 1)
    pub fn optional() -> Self {
        Self { min: 0, max: Some(1) }
    }

    /// Zero or more (0, unbounded)
    pub fn zero_or_more() -> Self {
        Self { min: 0, max: None }
    }

    /// Empty (0, 0)
    pub fn empty() -> Self {
        Self { min: 0, max: Some(0) }
    }

    /// Check if this particle can be absent (minOccurs == 0)
    pub fn is_emptiable(&self) -> bool {
        self.min == 0
    }

    /// Check if this particle can never occur (maxOccurs == 0)
    pub fn is_empty(&self) -> bool {
        self.max == Some(0)
    }

    /// Check if particle has maxOccurs == 1
    pub fn is_single(&self) -> bool {
        self.max == Some(1)
    }

    /// Occurrence Range OK: this range is a valid restriction of `base`
    pub fn is_restriction_of(&self, base: &Occurs) -> bool {
        if self.min < base.min {
            return false;
        }
        match (self.max, base.max) {
            (_, None) => true,
            (None, Some(_)) => false,
            (Some(derived), Some(base)) => derived <= base,
        }
    }

    /// Range scaled by an enclosing particle's range
    pub fn times(&self, outer: Occurs) -> Occurs {
        let min = self.min.saturating_mul(outer.min);
        let max = match (self.max, outer.max) {
            (Some(0), _) | (_, Some(0)) => Some(0),
            (Some(a), Some(b)) => Some(a.saturating_mul(b)),
            _ => None,
        };
        Occurs::new(min, max)
    }
}

impl Default for Occurs {
    fn default() -> Self {
        Self::once()
    }
}

impl fmt::Display for Occurs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.max {
            Some(max) => write!(f, "({}, {})", self.min, max),
            None => write!(f, "({}, unbounded)", self.min),
        }
    }
}

/// Helper for folding child ranges into a group's effective total range
#[derive(Debug, Clone, Copy)]
struct OccursCalculator {
    min_occurs: u32,
    max_occurs: Option<u32>,
}

impl OccursCalculator {
    /// Start at (0, 0)
    fn new() -> Self {
        Self {
            min_occurs: 0,
            max_occurs: Some(0),
        }
    }

    fn occurs(&self) -> Occurs {
        Occurs::new(self.min_occurs, self.max_occurs)
    }

    /// Add another particle's range (for sequence and all)
    fn add(&mut self, other: Occurs) {
        self.min_occurs = self.min_occurs.saturating_add(other.min);
        self.max_occurs = match (self.max_occurs, other.max) {
            (Some(a), Some(b)) => Some(a.saturating_add(b)),
            _ => None,
        };
    }

    /// Fold in a choice branch: min of mins, max of maxes
    fn max_with(&mut self, other: Occurs, first: bool) {
        self.min_occurs = if first {
            other.min
        } else {
            self.min_occurs.min(other.min)
        };
        self.max_occurs = match (self.max_occurs, other.max) {
            (None, _) | (_, None) => None,
            (Some(a), Some(b)) => Some(a.max(b)),
        };
    }
}

/// Model group compositor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Compositor {
    /// Ordered sequence of particles
    #[default]
    Sequence,
    /// One of multiple alternatives
    Choice,
    /// Unordered set of particles
    All,
}

impl fmt::Display for Compositor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sequence => write!(f, "sequence"),
            Self::Choice => write!(f, "choice"),
            Self::All => write!(f, "all"),
        }
    }
}

/// The particle kinds, for dispatch and messages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParticleKind {
    /// xs:all group
    All,
    /// xs:choice group
    Choice,
    /// xs:sequence group
    Sequence,
    /// Element declaration
    Element,
    /// xs:any wildcard
    Wildcard,
}

impl fmt::Display for ParticleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::All => "all",
            Self::Choice => "choice",
            Self::Sequence => "sequence",
            Self::Element => "element",
            Self::Wildcard => "wildcard",
        };
        write!(f, "{}", s)
    }
}

/// A model group's occurrence bounds and children
#[derive(Debug, Clone, PartialEq)]
pub struct ModelGroup {
    /// Occurrence bounds of the group itself
    pub occurs: Occurs,
    /// Child particles in document order
    pub particles: Vec<SchemaParticle>,
}

/// An element declaration used as a particle
#[derive(Debug, Clone, PartialEq)]
pub struct ElementParticle {
    /// Occurrence bounds
    pub occurs: Occurs,
    /// Element name
    pub name: QName,
    /// Declared type
    pub type_id: TypeId,
    /// Whether xsi:nil is allowed
    pub nillable: bool,
    /// Default value
    pub default: Option<String>,
    /// Fixed value
    pub fixed: Option<String>,
    /// Disallowed substitutions
    pub block: DerivationSet,
    /// Identity constraints declared on the element
    pub identity_constraints: Vec<IdentityId>,
    /// The global declaration, when this particle is a reference
    pub global: Option<ElementId>,
    /// Whether the element is abstract
    pub is_abstract: bool,
}

/// A wildcard used as a particle
#[derive(Debug, Clone, PartialEq)]
pub struct WildcardParticle {
    /// Occurrence bounds
    pub occurs: Occurs,
    /// Admitted names and processing mode
    pub wildcard: Wildcard,
}

/// A node of a content model tree
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaParticle {
    /// xs:all group
    All(ModelGroup),
    /// xs:choice group
    Choice(ModelGroup),
    /// xs:sequence group
    Sequence(ModelGroup),
    /// Element leaf
    Element(ElementParticle),
    /// Wildcard leaf
    Wildcard(WildcardParticle),
}

impl SchemaParticle {
    /// Build a model group particle
    pub fn group(compositor: Compositor, occurs: Occurs, particles: Vec<SchemaParticle>) -> Self {
        let group = ModelGroup { occurs, particles };
        match compositor {
            Compositor::All => Self::All(group),
            Compositor::Choice => Self::Choice(group),
            Compositor::Sequence => Self::Sequence(group),
        }
    }

    /// The particle kind
    pub fn kind(&self) -> ParticleKind {
        match self {
            Self::All(_) => ParticleKind::All,
            Self::Choice(_) => ParticleKind::Choice,
            Self::Sequence(_) => ParticleKind::Sequence,
            Self::Element(_) => ParticleKind::Element,
            Self::Wildcard(_) => ParticleKind::Wildcard,
        }
    }

    /// Compositor, for group particles
    pub fn compositor(&self) -> Option<Compositor> {
        match self {
            Self::All(_) => Some(Compositor::All),
            Self::Choice(_) => Some(Compositor::Choice),
            Self::Sequence(_) => Some(Compositor::Sequence),
            Self::Element(_) | Self::Wildcard(_) => None,
        }
    }

    /// The model group, for group particles
    pub fn as_group(&self) -> Option<&ModelGroup> {
        match self {
            Self::All(g) | Self::Choice(g) | Self::Sequence(g) => Some(g),
            Self::Element(_) | Self::Wildcard(_) => None,
        }
    }

    /// Child particles; leaves have none
    pub fn children(&self) -> &[SchemaParticle] {
        self.as_group().map(|g| g.particles.as_slice()).unwrap_or(&[])
    }

    /// Occurrence bounds of this particle
    pub fn occurs(&self) -> Occurs {
        match self {
            Self::All(g) | Self::Choice(g) | Self::Sequence(g) => g.occurs,
            Self::Element(e) => e.occurs,
            Self::Wildcard(w) => w.occurs,
        }
    }

    /// The same particle with different occurrence bounds
    pub fn with_occurs(mut self, occurs: Occurs) -> Self {
        match &mut self {
            Self::All(g) | Self::Choice(g) | Self::Sequence(g) => g.occurs = occurs,
            Self::Element(e) => e.occurs = occurs,
            Self::Wildcard(w) => w.occurs = occurs,
        }
        self
    }

    /// Effective total range: the bounds on how many leaf occurrences this
    /// particle can contribute
    pub fn effective_total_range(&self) -> Occurs {
        match self {
            Self::Element(e) => e.occurs,
            Self::Wildcard(w) => w.occurs,
            Self::All(g) | Self::Sequence(g) => {
                let mut calc = OccursCalculator::new();
                for child in &g.particles {
                    calc.add(child.effective_total_range());
                }
                calc.occurs().times(g.occurs)
            }
            Self::Choice(g) => {
                let mut calc = OccursCalculator::new();
                for (i, child) in g.particles.iter().enumerate() {
                    calc.max_with(child.effective_total_range(), i == 0);
                }
                calc.occurs().times(g.occurs)
            }
        }
    }

    /// Whether the particle can match nothing at all
    pub fn is_emptiable(&self) -> bool {
        self.effective_total_range().min == 0
    }

    /// Whether the particle can never match anything
    pub fn is_empty_content(&self) -> bool {
        self.effective_total_range().max == Some(0)
    }

    /// Remove pointless particles: singleton groups with range (1, 1),
    /// same-compositor nesting with range (1, 1), and empty groups nested
    /// inside other groups
    pub fn normalized(self) -> SchemaParticle {
        match self {
            Self::Element(_) | Self::Wildcard(_) => self,
            Self::All(g) => Self::normalize_group(Compositor::All, g),
            Self::Choice(g) => Self::normalize_group(Compositor::Choice, g),
            Self::Sequence(g) => Self::normalize_group(Compositor::Sequence, g),
        }
    }

    fn normalize_group(compositor: Compositor, group: ModelGroup) -> SchemaParticle {
        let mut particles = Vec::with_capacity(group.particles.len());
        for child in group.particles {
            let child = child.normalized();
            match child.as_group() {
                Some(inner) if inner.particles.is_empty() => {}
                Some(inner)
                    if child.compositor() == Some(compositor)
                        && compositor != Compositor::All
                        && inner.occurs == Occurs::once() =>
                {
                    particles.extend(inner.particles.iter().cloned());
                }
                _ => particles.push(child),
            }
        }
        if particles.len() == 1 && group.occurs == Occurs::once() && compositor != Compositor::All {
            return particles.remove(0);
        }
        SchemaParticle::group(compositor, group.occurs, particles)
    }

    /// Every element and wildcard leaf, depth first
    pub fn leaves(&self) -> Vec<&SchemaParticle> {
        let mut out = Vec::new();
        self.collect_leaves(&mut out);
        out
    }

    fn collect_leaves<'a>(&'a self, out: &mut Vec<&'a SchemaParticle>) {
        match self {
            Self::Element(_) | Self::Wildcard(_) => out.push(self),
            _ => {
                for child in self.children() {
                    child.collect_leaves(out);
                }
            }
        }
    }

    /// Union of the name sets of every wildcard in the content model
    pub fn wildcard_summary(&self) -> Option<QNameSet> {
        self.leaves()
            .into_iter()
            .filter_map(|leaf| match leaf {
                Self::Wildcard(w) => Some(w.wildcard.names.clone()),
                _ => None,
            })
            .reduce(|a, b| a.union(&b))
    }

    /// Short human readable description, for diagnostics
    pub fn describe(&self) -> String {
        match self {
            Self::Element(e) => format!("element '{}' {}", e.name, e.occurs),
            Self::Wildcard(w) => format!("wildcard [{}] {}", w.wildcard.names, w.occurs),
            group => format!(
                "{} of {} particle(s) {}",
                group.kind(),
                group.children().len(),
                group.occurs()
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::wildcards::ProcessContents;
    use proptest::prelude::*;

    pub(crate) fn element(local: &str, occurs: Occurs) -> SchemaParticle {
        SchemaParticle::Element(ElementParticle {
            occurs,
            name: QName::local(local),
            type_id: TypeId(0),
            nillable: false,
            default: None,
            fixed: None,
            block: DerivationSet::default(),
            identity_constraints: Vec::new(),
            global: None,
            is_abstract: false,
        })
    }

    fn any(occurs: Occurs) -> SchemaParticle {
        SchemaParticle::Wildcard(WildcardParticle {
            occurs,
            wildcard: Wildcard::new(QNameSet::all(), ProcessContents::Lax),
        })
    }

    #[test]
    fn test_occurs_restriction() {
        let base = Occurs::new(1, Some(3));

        assert!(Occurs::new(1, Some(3)).is_restriction_of(&base));
        assert!(Occurs::new(2, Some(2)).is_restriction_of(&base));

        assert!(!Occurs::new(0, Some(3)).is_restriction_of(&base));
        assert!(!Occurs::new(1, Some(5)).is_restriction_of(&base));
        assert!(!Occurs::new(1, None).is_restriction_of(&base));

        let unbounded = Occurs::new(1, None);
        assert!(Occurs::new(1, Some(100)).is_restriction_of(&unbounded));
        assert!(Occurs::new(1, None).is_restriction_of(&unbounded));
        assert!(Occurs::empty().is_restriction_of(&Occurs::optional()));
    }

    proptest! {
        #[test]
        fn occurrence_range_ok_matches_definition(
            dmin in 0u32..6, dmax in prop::option::of(0u32..6),
            bmin in 0u32..6, bmax in prop::option::of(0u32..6),
        ) {
            let derived = Occurs::new(dmin, dmax);
            let base = Occurs::new(bmin, bmax);
            let expected = dmin >= bmin
                && match (dmax, bmax) {
                    (_, None) => true,
                    (Some(d), Some(b)) => d <= b,
                    (None, Some(_)) => false,
                };
            prop_assert_eq!(derived.is_restriction_of(&base), expected);
        }

        #[test]
        fn tightening_a_valid_restriction_keeps_it_valid(
            dmin in 0u32..6, dmax in 0u32..6, bmin in 0u32..6, extra in 0u32..3,
        ) {
            let base = Occurs::new(bmin, None);
            let derived = Occurs::new(dmin.max(bmin), Some(dmax.max(dmin.max(bmin))));
            prop_assert!(derived.is_restriction_of(&base));
            let tighter = Occurs::new(derived.min + extra, derived.max.map(|m| m + extra));
            prop_assert!(tighter.is_restriction_of(&base));
        }
    }

    #[test]
    fn test_effective_total_range_sequence() {
        let seq = SchemaParticle::group(
            Compositor::Sequence,
            Occurs::new(1, Some(2)),
            vec![element("a", Occurs::once()), element("b", Occurs::optional())],
        );
        assert_eq!(seq.effective_total_range(), Occurs::new(1, Some(4)));
    }

    #[test]
    fn test_effective_total_range_choice() {
        let choice = SchemaParticle::group(
            Compositor::Choice,
            Occurs::new(2, Some(3)),
            vec![element("a", Occurs::new(1, Some(2))), element("b", Occurs::new(3, Some(3)))],
        );
        assert_eq!(choice.effective_total_range(), Occurs::new(2, Some(9)));

        let unbounded = SchemaParticle::group(
            Compositor::Choice,
            Occurs::once(),
            vec![element("a", Occurs::once()), any(Occurs::zero_or_more())],
        );
        assert_eq!(unbounded.effective_total_range(), Occurs::new(0, None));
        assert!(unbounded.is_emptiable());
    }

    #[test]
    fn test_empty_group_is_empty_content() {
        let seq = SchemaParticle::group(Compositor::Sequence, Occurs::once(), vec![]);
        assert!(seq.is_empty_content());
        assert!(seq.is_emptiable());
        let zero = element("a", Occurs::empty());
        assert!(zero.is_empty_content());
    }

    #[test]
    fn test_normalized_removes_pointless_groups() {
        let nested = SchemaParticle::group(
            Compositor::Sequence,
            Occurs::once(),
            vec![
                SchemaParticle::group(
                    Compositor::Sequence,
                    Occurs::once(),
                    vec![element("a", Occurs::once()), element("b", Occurs::once())],
                ),
                SchemaParticle::group(Compositor::Choice, Occurs::once(), vec![]),
                element("c", Occurs::once()),
            ],
        );
        let normalized = nested.normalized();
        assert_eq!(normalized.kind(), ParticleKind::Sequence);
        assert_eq!(normalized.children().len(), 3);

        let singleton = SchemaParticle::group(
            Compositor::Choice,
            Occurs::once(),
            vec![element("a", Occurs::optional())],
        );
        assert_eq!(singleton.normalized(), element("a", Occurs::optional()));

        let kept = SchemaParticle::group(
            Compositor::Sequence,
            Occurs::optional(),
            vec![element("a", Occurs::once())],
        );
        assert_eq!(kept.clone().normalized(), kept);
    }

    #[test]
    fn test_wildcard_summary() {
        let seq = SchemaParticle::group(
            Compositor::Sequence,
            Occurs::once(),
            vec![element("a", Occurs::once())],
        );
        assert!(seq.wildcard_summary().is_none());

        let with_any = SchemaParticle::group(
            Compositor::Sequence,
            Occurs::once(),
            vec![element("a", Occurs::once()), any(Occurs::once())],
        );
        assert!(with_any.wildcard_summary().unwrap().is_all());
    }
}
