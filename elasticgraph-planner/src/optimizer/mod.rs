//! The Query Optimizer (component C6, §4.5): groups queries by their non-aggregation "shape",
//! merges aggregations into one combined query per group, and splits responses back afterward.
//!
//! This is the one place in the planner that looks *across* queries rather than building one in
//! isolation, mirroring how `apollo-federation::query_plan::optimize` looks across a whole
//! fetch-dependency graph rather than one fetch at a time.

use crate::query::datastore_query::DatastoreQuery;
use elasticgraph_error::GatewayError;
use elasticgraph_error::SingleGatewayError;
use indexmap::IndexMap;
use serde_json::Value;
use std::collections::BTreeMap;

/// One partition of datastore-equivalent queries, merged into a single `DatastoreQuery` (unless
/// the partition held only one query, in which case no merging — and so no aggregation-name
/// prefixing — ever happened).
pub struct MergeGroup {
    pub merged_query: DatastoreQuery,
    /// Original positions (indices into the slice passed to [`partition_and_merge`]) that were
    /// folded into `merged_query`, in the order their prefixes were assigned.
    original_indices: Vec<usize>,
    /// Whether aggregation names in `merged_query` carry a `"{n}_"` prefix that needs stripping
    /// back out when responses are split (true only when more than one query was merged).
    prefixed: bool,
}

impl MergeGroup {
    pub fn original_indices(&self) -> &[usize] {
        &self.original_indices
    }
}

/// Partition `queries` by [`DatastoreQuery::shape_key`] (§4.5: "the query value with
/// `aggregations` cleared") and merge each partition into one `DatastoreQuery`. Partition order
/// and within-partition order both follow first occurrence in `queries`, so this is deterministic
/// given the same input.
pub fn partition_and_merge(queries: Vec<DatastoreQuery>) -> Vec<MergeGroup> {
    let mut groups: IndexMap<String, Vec<(usize, DatastoreQuery)>> = IndexMap::new();
    for (index, query) in queries.into_iter().enumerate() {
        groups.entry(query.shape_key()).or_default().push((index, query));
    }
    groups.into_values().map(merge_group).collect()
}

fn merge_group(members: Vec<(usize, DatastoreQuery)>) -> MergeGroup {
    if members.len() == 1 {
        let (index, query) = members.into_iter().next().expect("len checked above");
        return MergeGroup { merged_query: query, original_indices: vec![index], prefixed: false };
    }

    let mut original_indices = Vec::with_capacity(members.len());
    let mut merged_aggregations = IndexMap::new();
    let mut representative: Option<DatastoreQuery> = None;

    for (position, (original_index, query)) in members.into_iter().enumerate() {
        // §4.5: "prefix each aggregation name with a unique per-original-query prefix (`"1_"`,
        // `"2_"`, ...) to avoid collisions, union them into one aggregations map".
        let prefix = format!("{}_", position + 1);
        for (name, agg_query) in query.aggregations.clone() {
            let prefixed_name = format!("{prefix}{name}");
            let mut renamed = agg_query;
            // Nested sub-aggregation keys are built from `AggregationQuery::name` (see
            // `sub_aggregation::build_sub_aggregations`), so the prefix must be baked into it too
            // or the response's nested keys won't carry a prefix for us to strip back out.
            renamed.name = prefixed_name.clone();
            merged_aggregations.insert(prefixed_name, renamed);
        }
        original_indices.push(original_index);
        if representative.is_none() {
            representative = Some(query);
        }
    }

    let merged_query = representative
        .expect("members is non-empty")
        .with_aggregations(merged_aggregations);

    MergeGroup { merged_query, original_indices, prefixed: true }
}

/// Split one merged query's datastore response back into one response per original query that
/// was folded into it (§4.5). Returns `(original_index, response)` pairs.
pub fn split_merged_response(
    group: &MergeGroup,
    response: &Value,
) -> Result<Vec<(usize, Value)>, GatewayError> {
    if !group.prefixed {
        let &[only_index] = group.original_indices.as_slice() else {
            return Err(SingleGatewayError::MissingOriginalQueryAfterSplit {
                query_shape: "unmerged group did not contain exactly one original query".into(),
            }
            .into());
        };
        return Ok(vec![(only_index, response.clone())]);
    }

    let aggregations = response.get("aggregations").and_then(Value::as_object);
    let mut result = Vec::with_capacity(group.original_indices.len());
    for (position, &original_index) in group.original_indices.iter().enumerate() {
        let prefix = format!("{}_", position + 1);
        let mut split = response.clone();
        if let Some(aggregations) = aggregations {
            let mut owned = serde_json::Map::new();
            for (key, value) in aggregations {
                if let Some(rest) = key.strip_prefix(prefix.as_str()) {
                    let mut value = value.clone();
                    strip_prefix_recursive(&mut value, &prefix);
                    owned.insert(rest.to_string(), value);
                }
            }
            match split.as_object_mut() {
                Some(obj) if owned.is_empty() => {
                    obj.remove("aggregations");
                }
                Some(obj) => {
                    obj.insert("aggregations".to_string(), Value::Object(owned));
                }
                None => {}
            }
        }
        result.push((original_index, split));
    }
    Ok(result)
}

/// Recursively strip a `"{n}_"` merge prefix from every object key that starts with it,
/// including the `...:filtered` wrapper keys filter-wrapped sub-aggregations produce (§4.5).
fn strip_prefix_recursive(value: &mut Value, prefix: &str) {
    match value {
        Value::Object(map) => {
            let keys: Vec<String> = map.keys().cloned().collect();
            for key in keys {
                let Some(mut child) = map.remove(&key) else { continue };
                strip_prefix_recursive(&mut child, prefix);
                let renamed = key.strip_prefix(prefix).map(str::to_string).unwrap_or(key);
                map.insert(renamed, child);
            }
        }
        Value::Array(items) => {
            for item in items {
                strip_prefix_recursive(item, prefix);
            }
        }
        _ => {}
    }
}

/// Fold every merge group's split-apart responses back into a map keyed by original query index,
/// erroring if any original query never reappears (§4.5: "guards against dataloader-style
/// hangs"). `merged_responses` must be in the same order as the groups returned by
/// [`partition_and_merge`].
pub fn unmerge_responses(
    groups: &[MergeGroup],
    merged_responses: &[Value],
    total_original_queries: usize,
) -> Result<BTreeMap<usize, Value>, GatewayError> {
    let mut result = BTreeMap::new();
    for (group, response) in groups.iter().zip(merged_responses) {
        for (index, split) in split_merged_response(group, response)? {
            result.insert(index, split);
        }
    }
    for index in 0..total_original_queries {
        if !result.contains_key(&index) {
            return Err(SingleGatewayError::MissingOriginalQueryAfterSplit {
                query_shape: format!("original query at index {index}"),
            }
            .into());
        }
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregation::AggregationQuery;
    use crate::aggregation::GroupingAdapter;
    use crate::aggregation::Paginator;
    use crate::query::datastore_query::Pagination;
    use crate::query::datastore_query::SortClause;
    use crate::query::datastore_query::SortOrder;
    use indexmap::IndexSet;
    use serde_json::json;

    fn agg_query(name: &str) -> AggregationQuery {
        AggregationQuery {
            name: name.to_string(),
            filter: None,
            paginator: Paginator { desired_page_size: 10, after: None },
            groupings: vec![],
            computations: vec![],
            sub_aggregations: IndexMap::new(),
            needs_doc_count: true,
            needs_doc_count_error: false,
            adapter: GroupingAdapter::Composite,
        }
    }

    fn query(aggregation_name: &str) -> DatastoreQuery {
        let mut aggregations = IndexMap::new();
        aggregations.insert(aggregation_name.to_string(), agg_query(aggregation_name));
        DatastoreQuery::new(
            vec!["widgets".into()],
            vec![],
            vec![SortClause { field: "id".into(), order: SortOrder::Asc }],
            Pagination::Forward { first: 10, after: None },
            IndexSet::new(),
            aggregations,
            false,
            1_000,
            true,
            None,
            "main".to_string(),
        )
    }

    #[test]
    fn identical_shape_queries_merge_into_one_group_with_prefixed_names() {
        let groups = partition_and_merge(vec![query("by_size"), query("by_color")]);
        assert_eq!(groups.len(), 1);
        let merged = &groups[0].merged_query;
        assert!(merged.aggregations.contains_key("1_by_size"));
        assert!(merged.aggregations.contains_key("2_by_color"));
    }

    #[test]
    fn differently_shaped_queries_do_not_merge() {
        let mut b = query("by_color");
        b.search_index_definitions = vec!["gadgets".into()];
        let groups = partition_and_merge(vec![query("by_size"), b]);
        assert_eq!(groups.len(), 2);
    }

    #[test]
    fn split_merged_response_strips_prefixes_and_assigns_by_original_index() {
        let groups = partition_and_merge(vec![query("by_size"), query("by_color")]);
        let response = json!({
            "aggregations": {
                "1_by_size": { "buckets": [{"key": "small"}] },
                "2_by_color": { "buckets": [{"key": "red"}] },
            }
        });
        let split = split_merged_response(&groups[0], &response).unwrap();
        assert_eq!(split.len(), 2);
        let (idx0, resp0) = &split[0];
        assert_eq!(*idx0, 0);
        assert_eq!(resp0["aggregations"]["by_size"]["buckets"][0]["key"], json!("small"));
        let (idx1, resp1) = &split[1];
        assert_eq!(*idx1, 1);
        assert_eq!(resp1["aggregations"]["by_color"]["buckets"][0]["key"], json!("red"));
    }

    #[test]
    fn strips_prefix_from_nested_filtered_wrapper_keys() {
        let groups = partition_and_merge(vec![query("by_size"), query("by_color")]);
        let response = json!({
            "aggregations": {
                "1_by_size": {
                    "aggs": { "1_by_size:nested:filtered": { "doc_count": 3 } },
                },
                "2_by_color": {},
            }
        });
        let split = split_merged_response(&groups[0], &response).unwrap();
        let (_, resp0) = &split[0];
        assert!(resp0["aggregations"]["by_size"]["aggs"]
            .as_object()
            .unwrap()
            .contains_key("by_size:nested:filtered"));
    }

    #[test]
    fn unmerge_responses_errors_when_an_original_query_goes_missing() {
        let groups = partition_and_merge(vec![query("by_size")]);
        let responses = vec![json!({})];
        let result = unmerge_responses(&groups, &responses, 2);
        assert!(result.is_err());
    }

    #[test]
    fn single_query_partitions_pass_through_without_prefixing() {
        let groups = partition_and_merge(vec![query("solo")]);
        assert!(!groups[0].prefixed);
        let response = json!({ "aggregations": { "solo": { "buckets": [] } } });
        let split = split_merged_response(&groups[0], &response).unwrap();
        assert_eq!(split[0].1, response);
    }
}
