//! An abstract value set over a single scalar filter field (§3 "FilterValueSet"), used by the
//! routing/index optimizer (C5) to decide which shards or index-name suffixes a query can skip.
//!
//! Unlike `TimeSet`, which represents a set of points on a dense timeline, `FilterValueSet` is
//! over a discrete domain (routing-key strings, enum values, etc.) — so the complement of a
//! finite set cannot be enumerated and is instead represented symbolically as
//! `UnboundedWithExclusions`.

use indexmap::IndexSet;
use std::hash::Hash;

/// - `All`: every value is a match (no constraint was derivable).
/// - `Empty`: no value can match (the filter is unsatisfiable for this field).
/// - `Concrete`: exactly the listed values match.
/// - `UnboundedWithExclusions`: every value *except* the listed ones matches (e.g. a `not: {in: [...]}`
///   or a `not_equal_to_any_of` filter).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterValueSet<T: Eq + Hash + Clone> {
    All,
    Empty,
    Concrete(IndexSet<T>),
    UnboundedWithExclusions(IndexSet<T>),
}

impl<T: Eq + Hash + Clone> FilterValueSet<T> {
    pub fn concrete(values: impl IntoIterator<Item = T>) -> Self {
        let set: IndexSet<T> = values.into_iter().collect();
        if set.is_empty() {
            Self::Empty
        } else {
            Self::Concrete(set)
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    pub fn is_all(&self) -> bool {
        matches!(self, Self::All)
    }

    /// The finite set of concrete values this set resolves to, when it is bounded. `None` for
    /// `All` and `UnboundedWithExclusions`, which have no finite enumeration.
    pub fn concrete_values(&self) -> Option<&IndexSet<T>> {
        match self {
            Self::Concrete(values) => Some(values),
            _ => None,
        }
    }

    /// `!(a ∨ b)` threaded through De Morgan's laws (§4.4: "the `negate` flag is threaded through
    /// recursion and flips the reduction operator at every step").
    pub fn negate(&self) -> Self {
        match self {
            Self::All => Self::Empty,
            Self::Empty => Self::All,
            Self::Concrete(values) => Self::UnboundedWithExclusions(values.clone()),
            Self::UnboundedWithExclusions(values) => Self::Concrete(values.clone()),
        }
    }

    pub fn union(&self, other: &Self) -> Self {
        match (self, other) {
            (Self::All, _) | (_, Self::All) => Self::All,
            (Self::Empty, x) | (x, Self::Empty) => x.clone(),
            (Self::Concrete(a), Self::Concrete(b)) => Self::Concrete(a.union(b).cloned().collect()),
            (Self::Concrete(concrete), Self::UnboundedWithExclusions(excluded))
            | (Self::UnboundedWithExclusions(excluded), Self::Concrete(concrete)) => {
                // all except (excluded − concrete): anything excluded that concrete adds back in
                // is no longer excluded from the union.
                Self::UnboundedWithExclusions(excluded.difference(concrete).cloned().collect())
            }
            (Self::UnboundedWithExclusions(a), Self::UnboundedWithExclusions(b)) => {
                // complement(a) ∪ complement(b) = complement(a ∩ b)
                Self::UnboundedWithExclusions(a.intersection(b).cloned().collect())
            }
        }
    }

    pub fn intersection(&self, other: &Self) -> Self {
        match (self, other) {
            (Self::Empty, _) | (_, Self::Empty) => Self::Empty,
            (Self::All, x) | (x, Self::All) => x.clone(),
            (Self::Concrete(a), Self::Concrete(b)) => Self::concrete(a.intersection(b).cloned()),
            (Self::Concrete(concrete), Self::UnboundedWithExclusions(excluded))
            | (Self::UnboundedWithExclusions(excluded), Self::Concrete(concrete)) => {
                Self::concrete(concrete.difference(excluded).cloned())
            }
            (Self::UnboundedWithExclusions(a), Self::UnboundedWithExclusions(b)) => {
                // complement(a) ∩ complement(b) = complement(a ∪ b)
                Self::UnboundedWithExclusions(a.union(b).cloned().collect())
            }
        }
    }

    pub fn contains(&self, value: &T) -> bool {
        match self {
            Self::All => true,
            Self::Empty => false,
            Self::Concrete(values) => values.contains(value),
            Self::UnboundedWithExclusions(excluded) => !excluded.contains(value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c(values: &[&str]) -> FilterValueSet<String> {
        FilterValueSet::concrete(values.iter().map(|s| s.to_string()))
    }

    #[test]
    fn negate_of_all_is_empty_and_vice_versa() {
        assert_eq!(FilterValueSet::<String>::All.negate(), FilterValueSet::Empty);
        assert_eq!(FilterValueSet::<String>::Empty.negate(), FilterValueSet::All);
    }

    #[test]
    fn negate_of_concrete_is_unbounded_with_same_exclusions() {
        let set = c(&["a", "b"]);
        let FilterValueSet::UnboundedWithExclusions(excluded) = set.negate() else {
            panic!("expected unbounded-with-exclusions");
        };
        assert_eq!(excluded, ["a", "b"].into_iter().map(String::from).collect());
    }

    #[test]
    fn union_of_concrete_and_its_negation_is_all() {
        let set = c(&["a", "b"]);
        assert_eq!(set.union(&set.negate()), FilterValueSet::All);
    }

    #[test]
    fn intersection_of_concrete_and_its_negation_is_empty() {
        let set = c(&["a", "b"]);
        assert_eq!(set.intersection(&set.negate()), FilterValueSet::Empty);
    }

    #[test]
    fn union_is_commutative_across_all_variant_pairs() {
        let sets = vec![
            FilterValueSet::All,
            FilterValueSet::Empty,
            c(&["a", "b"]),
            c(&["b", "c"]).negate(),
        ];
        for a in &sets {
            for b in &sets {
                assert_eq!(a.union(b), b.union(a));
            }
        }
    }

    #[test]
    fn concrete_values_returns_none_for_unbounded_variants() {
        assert!(FilterValueSet::<String>::All.concrete_values().is_none());
        assert!(c(&["a"]).negate().concrete_values().is_none());
        assert!(c(&["a"]).concrete_values().is_some());
    }
}
