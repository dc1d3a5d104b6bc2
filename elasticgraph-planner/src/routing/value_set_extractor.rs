//! The `FilterValueSetExtractor` (§4.4): walks a filter expression and derives a `FilterValueSet`
//! or `TimeSet` for one target field path, without ever building a boolean-query tree — the
//! routing/index optimizer only needs to know *which values the field could match*, not how to
//! phrase that as an Elasticsearch clause.
//!
//! Mirrors the traversal table in §4.2 (`not`/`any_of`/`all_of`/`sub_field`), but `any_satisfy`
//! and `count` are treated conservatively as unconstrained (`all`): this extractor cannot reason
//! across a nested list's individual elements, so it must not narrow the set.

use crate::filter::FilterExpression;
use crate::value_set::FilterValueSet;
use crate::value_set::Millis;
use crate::value_set::TimeSet;
use indexmap::IndexSet;
use serde_json::Value;

/// Derive the `FilterValueSet<String>` of values a scalar routing field could take, given a
/// filter expression and the field's dotted path (§4.4).
pub fn extract_routing_value_set(filter: &FilterExpression, path: &[String]) -> FilterValueSet<String> {
    extract(filter, path, &leaf_value_set)
}

fn leaf_value_set(ops: &serde_json::Map<String, Value>) -> FilterValueSet<String> {
    let mut acc = FilterValueSet::All;
    for (op, operand) in ops {
        if op == "equal_to_any_of" {
            if let Value::Array(items) = operand {
                let values: IndexSet<String> =
                    items.iter().filter_map(|v| v.as_str().map(str::to_string)).collect();
                acc = acc.intersection(&FilterValueSet::concrete(values));
            }
        }
        // Range operators don't narrow a discrete value set; left as `All` contribution.
    }
    acc
}

/// Derive the `TimeSet` of rollover timestamps a filter could match for the given field path
/// (§4.4: "Index expression is computed analogously using rollover-timestamp filters").
pub fn extract_rollover_time_set(filter: &FilterExpression, path: &[String]) -> TimeSet {
    extract(filter, path, &leaf_time_set)
}

fn leaf_time_set(ops: &serde_json::Map<String, Value>) -> TimeSet {
    let mut acc = TimeSet::all();
    let mut start: Option<Millis> = None;
    let mut end: Option<Millis> = None;
    let mut equal_to_union: Option<TimeSet> = None;

    for (op, operand) in ops {
        match op.as_str() {
            "gt" => start = millis_of(operand).map(|m| m + 1).or(start),
            "gte" => start = millis_of(operand).or(start),
            "lt" => end = millis_of(operand).map(|m| m - 1).or(end),
            "lte" => end = millis_of(operand).or(end),
            "equal_to_any_of" => {
                if let Value::Array(items) = operand {
                    let mut set = TimeSet::empty();
                    for item in items {
                        if let Some(m) = millis_of(item) {
                            set = set.union(&TimeSet::interval(Some(m), Some(m)));
                        }
                    }
                    equal_to_union = Some(set);
                }
            }
            _ => {}
        }
    }

    if start.is_some() || end.is_some() {
        acc = acc.intersection(&TimeSet::interval(start, end));
    }
    if let Some(eq) = equal_to_union {
        acc = acc.intersection(&eq);
    }
    acc
}

fn millis_of(value: &Value) -> Option<Millis> {
    let s = value.as_str()?;
    time::OffsetDateTime::parse(s, &time::format_description::well_known::Rfc3339)
        .ok()
        .map(|dt| (dt.unix_timestamp_nanos() / 1_000_000) as Millis)
}

/// Generic traversal shared by both extractors: `not`/`any_of`/`all_of` are schema-independent
/// connectives, `any_satisfy`/`count` are conservatively unconstrained, a key matching the next
/// path segment descends, anything else is an unrelated predicate (contributes no restriction).
fn extract<S>(filter: &FilterExpression, path: &[String], leaf: &dyn Fn(&serde_json::Map<String, Value>) -> S) -> S
where
    S: SetAlgebra,
{
    if path.is_empty() {
        return leaf(filter);
    }

    let mut acc = S::all();
    for (key, value) in filter {
        let contribution = match key.as_str() {
            "not" => {
                let Value::Object(inner) = value else { continue };
                extract(inner, path, leaf).negate()
            }
            "any_of" => {
                let Value::Array(items) = value else { continue };
                let mut union = S::empty();
                for item in items {
                    if let Value::Object(obj) = item {
                        union = union.union(&extract(obj, path, leaf));
                    }
                }
                union
            }
            "all_of" => {
                let Value::Array(items) = value else { continue };
                let mut intersection = S::all();
                for item in items {
                    if let Value::Object(obj) = item {
                        intersection = intersection.intersection(&extract(obj, path, leaf));
                    }
                }
                intersection
            }
            "any_satisfy" | "count" => S::all(),
            head if head == path[0] => match value {
                Value::Object(inner) => extract(inner, &path[1..], leaf),
                _ => S::all(),
            },
            _ => S::all(),
        };
        acc = acc.intersection(&contribution);
    }
    acc
}

trait SetAlgebra: Sized {
    fn all() -> Self;
    fn empty() -> Self;
    fn union(&self, other: &Self) -> Self;
    fn intersection(&self, other: &Self) -> Self;
    fn negate(&self) -> Self;
}

impl SetAlgebra for TimeSet {
    fn all() -> Self {
        TimeSet::all()
    }
    fn empty() -> Self {
        TimeSet::empty()
    }
    fn union(&self, other: &Self) -> Self {
        TimeSet::union(self, other)
    }
    fn intersection(&self, other: &Self) -> Self {
        TimeSet::intersection(self, other)
    }
    fn negate(&self) -> Self {
        TimeSet::negate(self)
    }
}

impl SetAlgebra for FilterValueSet<String> {
    fn all() -> Self {
        FilterValueSet::All
    }
    fn empty() -> Self {
        FilterValueSet::Empty
    }
    fn union(&self, other: &Self) -> Self {
        FilterValueSet::union(self, other)
    }
    fn intersection(&self, other: &Self) -> Self {
        FilterValueSet::intersection(self, other)
    }
    fn negate(&self) -> Self {
        FilterValueSet::negate(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn filter(value: Value) -> FilterExpression {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected an object"),
        }
    }

    #[test]
    fn equal_to_any_of_produces_a_concrete_routing_value_set() {
        let f = filter(json!({ "workspace_id": { "equal_to_any_of": ["ws-1", "ws-2"] } }));
        let set = extract_routing_value_set(&f, &["workspace_id".to_string()]);
        let values: Vec<&String> = set.concrete_values().unwrap().iter().collect();
        assert_eq!(values, vec!["ws-1", "ws-2"]);
    }

    #[test]
    fn unrelated_field_leaves_routing_value_set_unconstrained() {
        let f = filter(json!({ "name": { "equal_to_any_of": ["a"] } }));
        let set = extract_routing_value_set(&f, &["workspace_id".to_string()]);
        assert!(set.is_all());
    }

    #[test]
    fn negated_equal_to_any_of_becomes_unbounded_with_exclusions() {
        let f = filter(json!({ "not": { "workspace_id": { "equal_to_any_of": ["ws-1"] } } }));
        let set = extract_routing_value_set(&f, &["workspace_id".to_string()]);
        assert!(!set.is_all() && !set.is_empty());
    }

    #[test]
    fn range_operators_bound_a_rollover_time_set() {
        let f = filter(json!({
            "created_at": { "gte": "2020-01-01T00:00:00Z", "lt": "2020-02-01T00:00:00Z" }
        }));
        let set = extract_rollover_time_set(&f, &["created_at".to_string()]);
        assert!(!set.is_all());
        assert!(!set.is_empty());
    }

    #[test]
    fn any_satisfy_is_conservatively_unconstrained() {
        let f = filter(json!({ "tags": { "any_satisfy": { "equal_to_any_of": ["x"] } } }));
        let set = extract_routing_value_set(&f, &["tags".to_string()]);
        assert!(set.is_all());
    }
}
