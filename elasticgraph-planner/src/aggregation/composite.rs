//! The composite adapter (§4.3): used for top-level, paginated aggregations.

use super::query::AggregationQuery;
use super::sub_aggregation::build_sub_aggregations;
use elasticgraph_error::GatewayError;
use elasticgraph_error::SingleGatewayError;
use serde_json::json;
use serde_json::Value;

/// Build `{composite: {size, sources, after?}, aggs: {...}}` for one `AggregationQuery` under
/// the composite adapter.
pub fn build_composite_aggregation(query: &AggregationQuery) -> Result<Value, GatewayError> {
    let after = match &query.paginator.after {
        Some(cursor) => {
            if !cursor.matches_key_count(query.groupings.len()) {
                return Err(SingleGatewayError::InvalidCursorForGroupings {
                    message: format!(
                        "cursor has a different number of sort values than \"{}\" has groupings",
                        query.name
                    ),
                }
                .into());
            }
            cursor.sort_values().map(|values| {
                let mut after_map = serde_json::Map::new();
                for (grouping, value) in query.groupings.iter().zip(values) {
                    after_map.insert(grouping.key(), value.clone());
                }
                Value::Object(after_map)
            })
        }
        None => None,
    };

    let mut sources = Vec::with_capacity(query.groupings.len());
    for grouping in &query.groupings {
        sources.push(grouping.composite_clause());
    }

    let mut composite = serde_json::Map::new();
    composite.insert("size".to_string(), json!(query.paginator.desired_page_size));
    composite.insert("sources".to_string(), Value::Array(sources));
    if let Some(after) = after {
        composite.insert("after".to_string(), after);
    }

    let mut aggs = serde_json::Map::new();
    for computation in &query.computations {
        aggs.insert(computation.agg_name(), computation.clause());
    }
    if query.needs_doc_count_error {
        // composite itself reports no doc_count_error; nothing extra to add here, callers read
        // `doc_count_error_upper_bound` only from non-composite innermost `terms`.
    }
    for (key, clause) in build_sub_aggregations(query)? {
        aggs.insert(key, clause);
    }

    let mut body = serde_json::Map::new();
    body.insert("composite".to_string(), Value::Object(composite));
    if !aggs.is_empty() {
        body.insert("aggs".to_string(), Value::Object(aggs));
    }
    Ok(Value::Object(body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregation::grouping::Grouping;
    use crate::aggregation::query::GroupingAdapter;
    use crate::aggregation::query::Paginator;
    use crate::query::cursor::Cursor;
    use indexmap::IndexMap;
    use serde_json::json;

    fn query_with_one_grouping() -> AggregationQuery {
        AggregationQuery {
            name: "by_color".into(),
            filter: None,
            paginator: Paginator { desired_page_size: 10, after: None },
            groupings: vec![Grouping::FieldTerm {
                name_in_index: "color".into(),
                path: vec!["color".into()],
            }],
            computations: vec![],
            sub_aggregations: IndexMap::new(),
            needs_doc_count: true,
            needs_doc_count_error: false,
            adapter: GroupingAdapter::Composite,
        }
    }

    #[test]
    fn missing_bucket_is_set_on_every_source() {
        let body = build_composite_aggregation(&query_with_one_grouping()).unwrap();
        assert_eq!(body["composite"]["sources"][0]["color"]["terms"]["missing_bucket"], json!(true));
    }

    #[test]
    fn cursor_with_wrong_arity_is_rejected() {
        let mut query = query_with_one_grouping();
        query.paginator.after = Some(Cursor::SortValues(vec![json!("a"), json!("b")]));
        assert!(build_composite_aggregation(&query).is_err());
    }
}
