//! The non-composite adapter (§4.3): used for sub-aggregations and whenever composite cannot
//! express the grouping. Builds a nested tree — date-histogram groupings as outer layers, term
//! groupings innermost — with a sibling `missing`-bucket aggregation at every level.

use super::query::AggregationQuery;
use super::sub_aggregation::build_sub_aggregations;
use elasticgraph_error::GatewayError;
use serde_json::json;
use serde_json::Map;
use serde_json::Value;

const DEFAULT_INNER_SIZE: u32 = 10_000;

/// Build the non-composite nested-aggregation body for one `AggregationQuery`.
///
/// §4.3: date-histogram groupings are ordered as outer layers, term groupings as the innermost
/// (so the innermost `terms` agg carries `doc_count_error_upper_bound`); `collect_mode:
/// depth_first` is forced on every `terms` level.
pub fn build_non_composite_aggregation(query: &AggregationQuery) -> Result<Value, GatewayError> {
    let mut groupings = query.groupings.clone();
    groupings.sort_by_key(|g| !g.is_date_histogram()); // stable sort: date histograms first

    let mut leaf_aggs = Map::new();
    for computation in &query.computations {
        leaf_aggs.insert(computation.agg_name(), computation.clause());
    }
    for (key, clause) in build_sub_aggregations(query)? {
        leaf_aggs.insert(key, clause);
    }

    let innermost = build_level(&groupings, 0, leaf_aggs);
    Ok(innermost)
}

fn build_level(groupings: &[super::grouping::Grouping], index: usize, leaf_aggs: Map<String, Value>) -> Value {
    let Some(grouping) = groupings.get(index) else {
        let mut body = Map::new();
        if !leaf_aggs.is_empty() {
            body.insert("aggs".to_string(), Value::Object(leaf_aggs));
        }
        return Value::Object(body);
    };

    // Every term level pulls every candidate bucket; the response side sorts and truncates
    // (§4.3: "sort-truncates by (-doc_count, key_values_as_strings) taking the first size").
    let clause = grouping.non_composite_clause_for(DEFAULT_INNER_SIZE);
    let inner = build_level(groupings, index + 1, leaf_aggs.clone());

    let mut aggs = Map::new();
    aggs.insert("grouped".to_string(), merge_agg_clause(clause.clone(), inner.clone()));

    if let Some(missing_clause) = grouping.missing_bucket_clause() {
        // §4.3: every layer adds a sibling `missing`-bucket aggregation with the same inner aggs.
        aggs.insert("missing".to_string(), merge_agg_clause(missing_clause, inner));
    }

    json!({ "aggs": aggs })
}

fn merge_agg_clause(mut clause: Value, inner: Value) -> Value {
    if let (Some(clause_obj), Value::Object(inner_obj)) = (clause.as_object_mut(), inner) {
        if let Some(Value::Object(nested_aggs)) = inner_obj.get("aggs") {
            if !nested_aggs.is_empty() {
                clause_obj.insert("aggs".to_string(), Value::Object(nested_aggs.clone()));
            }
        }
    }
    clause
}

/// `meta` attached to each grouping level for the response-decoding side to use (§4.3): the
/// grouping path, its `key_path`, anything to splice into a decoded bucket, the page size, and
/// the `buckets_path` string the response walks to find this level's raw buckets.
#[derive(Debug, Clone, PartialEq)]
pub struct LevelMeta {
    pub grouping_fields: Vec<String>,
    pub key_path: Vec<&'static str>,
    pub merge_into_bucket: indexmap::IndexMap<String, Value>,
    pub size: u32,
    pub buckets_path: String,
}

/// Build the `buckets_path`/meta chain for every grouping level, innermost first.
pub fn level_meta(groupings: &[super::grouping::Grouping], size: u32) -> Vec<LevelMeta> {
    let mut ordered = groupings.to_vec();
    ordered.sort_by_key(|g| !g.is_date_histogram());
    let mut path_segments = Vec::new();
    let mut result = Vec::new();
    for grouping in &ordered {
        path_segments.push("grouped".to_string());
        let inner = grouping.inner_meta();
        result.push(LevelMeta {
            grouping_fields: vec![grouping.key()],
            key_path: inner.key_path,
            merge_into_bucket: inner.merge_into_bucket,
            size,
            buckets_path: path_segments.join("."),
        });
    }
    result
}

/// Flatten a nested-tree response into a single bucket list and truncate to `size`, per the
/// ordering rule in §5: `-doc_count, key_values_as_strings`. `raw_buckets` is the first level's
/// combined `grouped`/`missing` buckets; each one is walked recursively through its own nested
/// `grouped`/`missing` sub-aggregations until a level with neither is reached.
pub fn flatten_and_truncate_buckets(
    raw_buckets: &[Value],
    key_paths: &[Vec<&'static str>],
    size: usize,
) -> Vec<Value> {
    let mut flattened = flatten_level(raw_buckets, key_paths, 0, &[]);
    flattened.sort_by(|a, b| {
        let count_a = a.0;
        let count_b = b.0;
        count_b.cmp(&count_a).then_with(|| a.1.cmp(&b.1))
    });
    flattened.truncate(size);
    flattened.into_iter().map(|(_, _, bucket)| bucket).collect()
}

/// Recursively descends into each bucket's own `grouped.buckets`/`missing` sub-aggregations
/// (§4.3's nested tree), prefixing each deeper level's key onto `parent_keys` so the final sort
/// key is the full `key_values_as_strings` tuple, not just the innermost level's key.
fn flatten_level(
    buckets: &[Value],
    key_paths: &[Vec<&'static str>],
    level: usize,
    parent_keys: &[String],
) -> Vec<(i64, Vec<String>, Value)> {
    let mut result = Vec::new();
    for bucket in buckets {
        let doc_count = bucket.get("doc_count").and_then(Value::as_i64).unwrap_or(0);
        let key_string = key_paths
            .get(level)
            .and_then(|path| path.first())
            .and_then(|key| bucket.get(key))
            .map(|v| v.to_string())
            .unwrap_or_default();
        let mut key_values = parent_keys.to_vec();
        key_values.push(key_string);

        let nested_buckets = bucket.get("grouped").and_then(|g| g.get("buckets")).and_then(Value::as_array);
        let nested_missing = bucket.get("missing").filter(|m| m.is_object());

        if nested_buckets.is_none() && nested_missing.is_none() {
            result.push((doc_count, key_values, bucket.clone()));
            continue;
        }

        let mut next_level = Vec::new();
        if let Some(grouped) = nested_buckets {
            next_level.extend(grouped.iter().cloned());
        }
        if let Some(missing) = nested_missing {
            next_level.push(missing.clone());
        }
        result.extend(flatten_level(&next_level, key_paths, level + 1, &key_values));
    }
    result
}

/// The non-composite adapter's response-decoding entry point (§4.3): pulls the first level's
/// `grouped`/`missing` buckets out of the raw aggregation response, flattens every nested level
/// recursively, and sort-truncates to the query's desired page size.
pub fn decode_non_composite_response(query: &AggregationQuery, raw_response: &Value) -> Vec<Value> {
    let metas = level_meta(&query.groupings, query.paginator.desired_page_size);
    if metas.is_empty() {
        return vec![raw_response.clone()];
    }
    let key_paths: Vec<Vec<&'static str>> = metas.iter().map(|m| m.key_path.clone()).collect();

    let mut top_level = Vec::new();
    if let Some(buckets) = raw_response.get("grouped").and_then(|g| g.get("buckets")).and_then(Value::as_array) {
        top_level.extend(buckets.iter().cloned());
    }
    if let Some(missing) = raw_response.get("missing").filter(|m| m.is_object()) {
        top_level.push(missing.clone());
    }

    flatten_and_truncate_buckets(&top_level, &key_paths, query.paginator.desired_page_size as usize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregation::grouping::Grouping;
    use crate::aggregation::query::GroupingAdapter;
    use crate::aggregation::query::Paginator;
    use indexmap::IndexMap;

    fn query_with_groupings(groupings: Vec<Grouping>) -> AggregationQuery {
        AggregationQuery {
            name: "by_color".into(),
            filter: None,
            paginator: Paginator { desired_page_size: 10, after: None },
            groupings,
            computations: vec![],
            sub_aggregations: IndexMap::new(),
            needs_doc_count: true,
            needs_doc_count_error: false,
            adapter: GroupingAdapter::NonComposite,
        }
    }

    #[test]
    fn single_term_grouping_forces_depth_first_collect_mode() {
        let query = query_with_groupings(vec![Grouping::FieldTerm {
            name_in_index: "color".into(),
            path: vec!["color".into()],
        }]);
        let body = build_non_composite_aggregation(&query).unwrap();
        assert_eq!(
            body["aggs"]["grouped"]["terms"]["collect_mode"],
            json!("depth_first")
        );
    }

    #[test]
    fn every_level_gets_a_missing_sibling() {
        let query = query_with_groupings(vec![Grouping::FieldTerm {
            name_in_index: "color".into(),
            path: vec!["color".into()],
        }]);
        let body = build_non_composite_aggregation(&query).unwrap();
        assert!(body["aggs"]["missing"].is_object());
    }

    #[test]
    fn buckets_flatten_and_truncate_by_doc_count_descending() {
        let buckets = vec![
            json!({ "key": "a", "doc_count": 3 }),
            json!({ "key": "b", "doc_count": 9 }),
            json!({ "key": "c", "doc_count": 5 }),
        ];
        let flattened = flatten_and_truncate_buckets(&buckets, &[vec!["key"]], 2);
        assert_eq!(flattened[0]["key"], json!("b"));
        assert_eq!(flattened[1]["key"], json!("c"));
        assert_eq!(flattened.len(), 2);
    }

    #[test]
    fn flatten_descends_into_nested_grouped_and_missing_levels() {
        let raw_buckets = vec![
            json!({
                "key": "red",
                "doc_count": 7,
                "grouped": {
                    "buckets": [
                        { "key": "small", "doc_count": 4 },
                        { "key": "large", "doc_count": 3 },
                    ]
                },
            }),
            json!({
                "key": "blue",
                "doc_count": 2,
                "grouped": { "buckets": [{ "key": "small", "doc_count": 2 }] },
            }),
        ];
        let flattened = flatten_and_truncate_buckets(&raw_buckets, &[vec!["key"], vec!["key"]], 10);
        // The nested "small"/"large" buckets surface, not their color-level parents.
        assert_eq!(flattened.len(), 3);
        assert_eq!(flattened[0]["key"], json!("small"));
        assert_eq!(flattened[0]["doc_count"], json!(4));
        assert_eq!(flattened[1]["key"], json!("large"));
        assert_eq!(flattened[2]["key"], json!("small"));
        assert_eq!(flattened[2]["doc_count"], json!(2));
    }

    #[test]
    fn decode_non_composite_response_walks_two_grouping_levels() {
        let query = query_with_groupings(vec![
            Grouping::FieldTerm { name_in_index: "color".into(), path: vec!["color".into()] },
            Grouping::FieldTerm { name_in_index: "size".into(), path: vec!["size".into()] },
        ]);
        let raw_response = json!({
            "grouped": {
                "buckets": [
                    {
                        "key": "red",
                        "doc_count": 7,
                        "grouped": { "buckets": [{ "key": "small", "doc_count": 5 }] },
                    }
                ]
            },
            "missing": { "doc_count": 0 },
        });
        let decoded = decode_non_composite_response(&query, &raw_response);
        assert_eq!(decoded.len(), 2);
        assert_eq!(decoded[0]["key"], json!("small"));
        assert_eq!(decoded[0]["doc_count"], json!(5));
    }

    #[test]
    fn decode_non_composite_response_with_no_groupings_returns_the_raw_response() {
        let query = query_with_groupings(vec![]);
        let raw_response = json!({ "doc_count": 42 });
        let decoded = decode_non_composite_response(&query, &raw_response);
        assert_eq!(decoded, vec![raw_response]);
    }
}
