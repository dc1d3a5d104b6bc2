//! Sub-aggregation wiring shared by both grouping adapters (§4.3).

use super::non_composite::build_non_composite_aggregation;
use super::query::AggregationQuery;
use super::query::GroupingAdapter;
use elasticgraph_error::GatewayError;
use serde_json::json;
use serde_json::Value;

/// Build the `(key, clause)` pairs to merge into a parent aggregation's `aggs` map for every
/// `sub_aggregations` entry, applying nested-path and filter wrapping (§4.3).
pub fn build_sub_aggregations(query: &AggregationQuery) -> Result<Vec<(String, Value)>, GatewayError> {
    let mut result = Vec::with_capacity(query.sub_aggregations.len());
    for sub in query.sub_aggregations.values() {
        let full_key = match &sub.nested_path {
            Some(path) => format!("{}:{}", query.name, path),
            None => format!("{}:{}", query.name, sub.query.name),
        };

        let mut current = build_aggregation_body(&sub.query)?;
        if let Some(filter) = &sub.query.filter {
            current = json!({ "filter": filter.to_json(), "aggs": { full_key.clone(): current } });
        }
        if let Some(path) = &sub.nested_path {
            current = json!({ "nested": { "path": path }, "aggs": { full_key.clone(): current } });
        }
        result.push((full_key, current));
    }
    Ok(result)
}

/// Dispatch to whichever grouping adapter the (sub-)aggregation query is built for.
pub fn build_aggregation_body(query: &AggregationQuery) -> Result<Value, GatewayError> {
    match query.effective_adapter() {
        GroupingAdapter::Composite => super::composite::build_composite_aggregation(query),
        GroupingAdapter::NonComposite => build_non_composite_aggregation(query),
    }
}
