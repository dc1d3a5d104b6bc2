//! The Aggregation Engine (component C4, §4.3): multi-level grouping, nested sub-aggregations,
//! and the two interchangeable grouping adapters.

pub mod composite;
pub mod computation;
pub mod grouping;
pub mod non_composite;
pub mod query;
pub mod sub_aggregation;

pub use computation::AggregationFunction;
pub use computation::Computation;
pub use grouping::CalendarOrFixedInterval;
pub use grouping::DateHistogramDetail;
pub use grouping::Grouping;
pub use grouping::InnerMeta;
pub use grouping::ScriptTermDetail;
pub use non_composite::decode_non_composite_response;
pub use query::AggregationQuery;
pub use query::GroupingAdapter;
pub use query::NestedSubAggregation;
pub use query::Paginator;
pub use sub_aggregation::build_aggregation_body;

use serde_json::Value;

/// The response-decoding counterpart to [`build_aggregation_body`] (§4.3): dispatches to
/// whichever grouping adapter the query was built for. Composite buckets already arrive flat
/// from the datastore (composite's own `size` truncates them), so only the non-composite
/// adapter's nested tree needs walking and sort-truncating.
pub fn decode_aggregation_response(query: &AggregationQuery, raw_response: &Value) -> Vec<Value> {
    match query.effective_adapter() {
        GroupingAdapter::Composite => raw_response
            .get("buckets")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default(),
        GroupingAdapter::NonComposite => decode_non_composite_response(query, raw_response),
    }
}

#[cfg(test)]
mod decode_tests {
    use super::*;
    use crate::aggregation::grouping::Grouping;
    use crate::aggregation::query::Paginator;
    use indexmap::IndexMap;
    use serde_json::json;

    fn query(adapter: GroupingAdapter) -> AggregationQuery {
        AggregationQuery {
            name: "by_color".into(),
            filter: None,
            paginator: Paginator { desired_page_size: 10, after: None },
            groupings: vec![Grouping::FieldTerm { name_in_index: "color".into(), path: vec!["color".into()] }],
            computations: vec![],
            sub_aggregations: IndexMap::new(),
            needs_doc_count: true,
            needs_doc_count_error: false,
            adapter,
        }
    }

    #[test]
    fn composite_responses_read_buckets_directly() {
        let raw = json!({ "after_key": { "color": "red" }, "buckets": [{ "key": { "color": "red" }, "doc_count": 3 }] });
        let decoded = decode_aggregation_response(&query(GroupingAdapter::Composite), &raw);
        assert_eq!(decoded.len(), 1);
    }

    #[test]
    fn non_composite_responses_flatten_the_grouped_and_missing_tree() {
        let raw = json!({
            "grouped": { "buckets": [{ "key": "red", "doc_count": 3 }] },
            "missing": { "doc_count": 0 },
        });
        let decoded = decode_aggregation_response(&query(GroupingAdapter::NonComposite), &raw);
        assert_eq!(decoded.len(), 2);
    }
}
