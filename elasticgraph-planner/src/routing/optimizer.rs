//! The Routing / Index Optimizer (component C5, §4.4): derives the minimal set of shard-routing
//! values and the minimal index-name expression from a set of filters.

use super::value_set_extractor::extract_rollover_time_set;
use super::value_set_extractor::extract_routing_value_set;
use crate::value_set::FilterValueSet;
use crate::value_set::Millis;
use crate::value_set::TimeSet;
use elasticgraph_schema::RolloverInterval;
use elasticgraph_schema::RolloverPolicy;

/// The routing/index optimizer never sees a `BooleanQuery` — it walks the original filter
/// expression forest directly — but callers typically have a `BooleanQuery` from the filter
/// compiler already; `filters` here stands for whatever filter expressions were ANDed into the
/// query (§4.1: "one filter hash merged into the query's filter set").
pub enum RoutingDecision {
    /// Don't restrict shards at all.
    Unrestricted,
    /// Restrict to exactly these routing values, sorted for a stable `routing` header (§4.4).
    Restricted(Vec<String>),
    /// The query can't match anything; bypass the datastore entirely.
    Bypass,
}

/// Reduce a `FilterValueSet` per routing-field path (union across paths, §4.4: "a document need
/// only match one path's routing field to justify searching that shard") down to a dispatch
/// decision.
pub fn resolve_routing(
    filter_expressions: &[crate::filter::FilterExpression],
    routing_field_paths: &[Vec<String>],
    has_aggregations: bool,
) -> RoutingDecision {
    if routing_field_paths.is_empty() {
        return RoutingDecision::Unrestricted;
    }

    let mut union = FilterValueSet::Empty;
    for path in routing_field_paths {
        let mut per_path = FilterValueSet::All;
        for expr in filter_expressions {
            per_path = per_path.intersection(&extract_routing_value_set(expr, path));
        }
        union = union.union(&per_path);
    }

    match union {
        FilterValueSet::All | FilterValueSet::UnboundedWithExclusions(_) => RoutingDecision::Unrestricted,
        FilterValueSet::Concrete(values) => {
            let mut sorted: Vec<String> = values.into_iter().collect();
            sorted.sort();
            RoutingDecision::Restricted(sorted)
        }
        FilterValueSet::Empty => {
            if has_aggregations {
                // §4.4: "fall back to a single arbitrary routing value to ensure at least one
                // shard is searched" — the aggregation response structure requires it.
                RoutingDecision::Restricted(vec!["__elasticgraph_fallback_routing__".to_string()])
            } else {
                RoutingDecision::Bypass
            }
        }
    }
}

pub enum IndexExpressionDecision {
    /// Every backing index of a rollover definition must be searched.
    AllIndices(Vec<String>),
    /// Restrict to these concrete per-period index names.
    Restricted(Vec<String>),
    Bypass,
}

/// One rollover index's policy plus its base name, as the registry exposes it.
pub struct RolloverIndex<'a> {
    pub base_name: &'a str,
    pub timestamp_field_path: Vec<String>,
    pub policy: &'a RolloverPolicy,
}

/// Compute the minimal index-name expression across every rollover-backed index a type uses
/// (§4.4: "union across indices").
pub fn resolve_index_expression(
    filter_expressions: &[crate::filter::FilterExpression],
    indices: &[RolloverIndex<'_>],
    has_aggregations: bool,
) -> IndexExpressionDecision {
    if indices.is_empty() {
        return IndexExpressionDecision::AllIndices(vec![]);
    }

    let mut names: Vec<String> = Vec::new();
    for index in indices {
        let mut time_set = TimeSet::all();
        for expr in filter_expressions {
            time_set = time_set.intersection(&extract_rollover_time_set(expr, &index.timestamp_field_path));
        }
        if time_set.is_all() {
            return IndexExpressionDecision::AllIndices(vec![index.base_name.to_string()]);
        }
        names.extend(expand_to_index_names(&time_set, index.base_name, index.policy));
    }
    names.sort();
    names.dedup();

    if names.is_empty() {
        if has_aggregations {
            let fallback = indices[0].base_name;
            IndexExpressionDecision::Restricted(vec![format!("{fallback}_rollover__*")])
        } else {
            IndexExpressionDecision::Bypass
        }
    } else {
        IndexExpressionDecision::Restricted(names)
    }
}

const MAX_ROLLOVER_PERIODS: usize = 10_000;

/// Expand a `TimeSet` into the concrete `<index>_rollover__<period>` names it overlaps.
fn expand_to_index_names(time_set: &TimeSet, base_name: &str, policy: &RolloverPolicy) -> Vec<String> {
    let mut names = Vec::new();
    for (start, end) in time_set.as_bounds() {
        let (Some(start), Some(end)) = (start, end) else {
            // An unbounded interval under a non-`all` TimeSet only happens when the other side
            // was excluded by intersection already producing a finite set; defensively skip.
            continue;
        };
        let mut cursor = start;
        let mut guard = 0;
        while cursor <= end && guard < MAX_ROLLOVER_PERIODS {
            names.push(format!("{base_name}_rollover__{}", period_suffix(cursor, policy.interval)));
            cursor = next_period_start(cursor, policy.interval);
            guard += 1;
        }
    }
    names
}

fn period_suffix(millis: Millis, interval: RolloverInterval) -> String {
    let date = millis_to_date(millis);
    match interval {
        RolloverInterval::Yearly => format!("{:04}", date.year()),
        RolloverInterval::Monthly => format!("{:04}-{:02}", date.year(), u8::from(date.month())),
        RolloverInterval::Daily => {
            format!("{:04}-{:02}-{:02}", date.year(), u8::from(date.month()), date.day())
        }
    }
}

fn next_period_start(millis: Millis, interval: RolloverInterval) -> Millis {
    let date = millis_to_date(millis);
    let next_date = match interval {
        RolloverInterval::Yearly => time::Date::from_calendar_date(date.year() + 1, time::Month::January, 1),
        RolloverInterval::Monthly => {
            let (year, month) = if date.month() == time::Month::December {
                (date.year() + 1, time::Month::January)
            } else {
                (date.year(), date.month().next())
            };
            time::Date::from_calendar_date(year, month, 1)
        }
        RolloverInterval::Daily => Ok(date.next_day().unwrap_or(date)),
    }
    .expect("rollover period boundaries are always valid calendar dates");
    date_to_millis(next_date)
}

fn millis_to_date(millis: Millis) -> time::Date {
    time::OffsetDateTime::from_unix_timestamp(millis / 1000)
        .expect("rollover timestamps are within time's representable range")
        .date()
}

fn date_to_millis(date: time::Date) -> Millis {
    let midnight = date.with_hms(0, 0, 0).expect("midnight is always a valid time");
    (midnight.assume_utc().unix_timestamp_nanos() / 1_000_000) as Millis
}

/// Whether this decision means the query should be sent to the datastore at all — kept separate
/// from `RoutingDecision`/`IndexExpressionDecision` enums so the query adapter can combine a
/// routing bypass and an index bypass with a simple `||` (either one bypassing is enough).
pub fn is_bypass(routing: &RoutingDecision, index: &IndexExpressionDecision) -> bool {
    matches!(routing, RoutingDecision::Bypass) || matches!(index, IndexExpressionDecision::Bypass)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn expr(value: serde_json::Value) -> crate::filter::FilterExpression {
        match value {
            serde_json::Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn concrete_routing_values_are_sorted() {
        let filters = vec![expr(json!({ "workspace_id": { "equal_to_any_of": ["b", "a"] } }))];
        let decision = resolve_routing(&filters, &[vec!["workspace_id".to_string()]], false);
        let RoutingDecision::Restricted(values) = decision else { panic!("expected restricted") };
        assert_eq!(values, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn empty_routing_set_without_aggregations_bypasses() {
        let filters = vec![expr(json!({
            "workspace_id": { "equal_to_any_of": ["a"] },
            "not": { "workspace_id": { "equal_to_any_of": ["a"] } },
        }))];
        let decision = resolve_routing(&filters, &[vec!["workspace_id".to_string()]], false);
        assert!(matches!(decision, RoutingDecision::Bypass));
    }

    #[test]
    fn empty_routing_set_with_aggregations_falls_back_to_one_value() {
        let filters = vec![expr(json!({
            "workspace_id": { "equal_to_any_of": ["a"] },
            "not": { "workspace_id": { "equal_to_any_of": ["a"] } },
        }))];
        let decision = resolve_routing(&filters, &[vec!["workspace_id".to_string()]], true);
        let RoutingDecision::Restricted(values) = decision else { panic!("expected restricted") };
        assert_eq!(values.len(), 1);
    }

    #[test]
    fn no_routing_paths_is_always_unrestricted() {
        let decision = resolve_routing(&[], &[], false);
        assert!(matches!(decision, RoutingDecision::Unrestricted));
    }

    #[test]
    fn bounded_timestamp_filter_expands_to_yearly_index_names() {
        let filters = vec![expr(json!({
            "created_at": { "gte": "2020-06-01T00:00:00Z", "lt": "2021-06-01T00:00:00Z" }
        }))];
        let policy = RolloverPolicy {
            interval: RolloverInterval::Yearly,
            timestamp_field_name_in_index: "created_at".to_string(),
        };
        let indices = vec![RolloverIndex {
            base_name: "widgets",
            timestamp_field_path: vec!["created_at".to_string()],
            policy: &policy,
        }];
        let decision = resolve_index_expression(&filters, &indices, false);
        let IndexExpressionDecision::Restricted(names) = decision else { panic!("expected restricted") };
        assert_eq!(names, vec!["widgets_rollover__2020".to_string(), "widgets_rollover__2021".to_string()]);
    }

    #[test]
    fn unconstrained_timestamp_filter_means_all_indices() {
        let decision = resolve_index_expression(
            &[],
            &[RolloverIndex {
                base_name: "widgets",
                timestamp_field_path: vec!["created_at".to_string()],
                policy: &RolloverPolicy {
                    interval: RolloverInterval::Daily,
                    timestamp_field_name_in_index: "created_at".to_string(),
                },
            }],
            false,
        );
        assert!(matches!(decision, IndexExpressionDecision::AllIndices(_)));
    }
}
