//! The incomplete-document exclusion proof (§7.1): decides whether the query adapter must AND an
//! extra `{__sources: {equal_to_any_of: [SELF]}}` filter to keep foreign-sourced fields that
//! haven't been populated yet from leaking into a result set.
//!
//! The proof evaluates the user filter against a hypothetical document whose foreign-sourced
//! fields are all absent, using three-valued (Kleene) logic: `True`/`False` when the filter's
//! outcome against that hypothetical document is provable, `Unknown` when it touches something
//! this proof doesn't model (a non-sourced field, an unrecognized construct). "When in doubt,
//! include the filter" means only a provable `False` ever lets us skip the exclusion.

use super::FilterExpression;
use super::LeafOperator;
use serde_json::Value;
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Verdict {
    True,
    False,
    Unknown,
}

impl Verdict {
    fn and(branches: impl IntoIterator<Item = Verdict>) -> Verdict {
        let mut saw_unknown = false;
        for v in branches {
            match v {
                Verdict::False => return Verdict::False,
                Verdict::Unknown => saw_unknown = true,
                Verdict::True => {}
            }
        }
        if saw_unknown {
            Verdict::Unknown
        } else {
            Verdict::True
        }
    }

    fn or(branches: impl IntoIterator<Item = Verdict>) -> Verdict {
        let mut saw_unknown = false;
        for v in branches {
            match v {
                Verdict::True => return Verdict::True,
                Verdict::Unknown => saw_unknown = true,
                Verdict::False => {}
            }
        }
        if saw_unknown {
            Verdict::Unknown
        } else {
            Verdict::False
        }
    }

    fn not(self) -> Verdict {
        match self {
            Verdict::True => Verdict::False,
            Verdict::False => Verdict::True,
            Verdict::Unknown => Verdict::Unknown,
        }
    }
}

/// Returns `true` iff the query adapter must AND the incomplete-document exclusion filter in,
/// i.e. the user filter cannot be proven to already exclude documents missing every field named
/// in `sourced_field_names` (the GraphQL field names, at the current nesting level, backed by a
/// non-self `source`).
pub fn requires_incomplete_doc_exclusion(
    filter: &FilterExpression,
    sourced_field_names: &HashSet<String>,
) -> bool {
    evaluate_and_of_keys(filter, sourced_field_names) != Verdict::False
}

fn evaluate_and_of_keys(filter: &FilterExpression, sourced: &HashSet<String>) -> Verdict {
    Verdict::and(filter.iter().map(|(key, value)| evaluate_entry(key, value, sourced)))
}

fn evaluate_entry(key: &str, value: &Value, sourced: &HashSet<String>) -> Verdict {
    match key {
        "not" => {
            let Value::Object(inner) = value else {
                return Verdict::Unknown;
            };
            evaluate_and_of_keys(inner, sourced).not()
        }
        "any_of" => {
            let Value::Array(branches) = value else {
                return Verdict::Unknown;
            };
            Verdict::or(branches.iter().map(|b| match b {
                Value::Object(m) => evaluate_and_of_keys(m, sourced),
                _ => Verdict::Unknown,
            }))
        }
        "all_of" => {
            let Value::Array(branches) = value else {
                return Verdict::Unknown;
            };
            Verdict::and(branches.iter().map(|b| match b {
                Value::Object(m) => evaluate_and_of_keys(m, sourced),
                _ => Verdict::Unknown,
            }))
        }
        "any_satisfy" | "count" => Verdict::Unknown,
        _ if sourced.contains(key) => {
            let Value::Object(predicate) = value else {
                return Verdict::Unknown;
            };
            evaluate_sourced_field_predicate(predicate)
        }
        _ => {
            // A sub-field that isn't sourced, or whose own nested filter might still touch a
            // sourced field further down (e.g. through a relation) — recurse rather than assume.
            match value {
                Value::Object(inner) => evaluate_and_of_keys(inner, sourced),
                _ => Verdict::Unknown,
            }
        }
    }
}

/// §7.1: combined operators on the *same* sourced field only omit the exclusion when every
/// operator individually excludes incomplete docs — a deliberately stricter combination than the
/// ordinary AND-of-different-fields rule above, per the design notes' explicit rule table.
fn evaluate_sourced_field_predicate(predicate: &FilterExpression) -> Verdict {
    let mut all_false = true;
    let mut any_true = false;
    let mut saw_any = false;
    for (key, value) in predicate {
        saw_any = true;
        let verdict = match LeafOperator::from_key(key) {
            Some(LeafOperator::EqualToAnyOf) => match value.as_array() {
                Some(values) if values.is_empty() => Verdict::False,
                Some(values) => {
                    if values.iter().any(Value::is_null) {
                        Verdict::True
                    } else {
                        Verdict::False
                    }
                }
                None => Verdict::Unknown,
            },
            Some(op) if op.is_range() => Verdict::False,
            Some(LeafOperator::Matches) | Some(LeafOperator::Contains) => Verdict::False,
            None => Verdict::Unknown,
        };
        match verdict {
            Verdict::False => {}
            Verdict::True => {
                any_true = true;
                all_false = false;
            }
            Verdict::Unknown => all_false = false,
        }
    }
    if !saw_any {
        return Verdict::Unknown;
    }
    if any_true {
        Verdict::True
    } else if all_false {
        Verdict::False
    } else {
        Verdict::Unknown
    }
}
