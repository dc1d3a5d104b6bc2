//! `DatastoreQuery` (§3): the immutable value the rest of the pipeline passes around.
//!
//! Equality and hash consider every field; the Query Optimizer (C6) additionally uses
//! [`DatastoreQuery::shape_key`], a projection that clears `aggregations`, to detect
//! datastore-equivalent queries worth merging (§4.5). Memoized hash/serialized body (§9: "cache
//! the hash once computed; the value is immutable") use `once_cell::sync::OnceCell` so the value
//! stays `Send + Sync` and safely shareable across the dispatcher's per-cluster tasks.

use crate::aggregation::AggregationQuery;
use crate::filter::BooleanQuery;
use crate::query::cursor::Cursor;
use indexmap::IndexMap;
use indexmap::IndexSet;
use once_cell::sync::OnceCell;
use serde_json::json;
use serde_json::Value;
use std::hash::Hash;
use std::hash::Hasher;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortOrder {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SortClause {
    pub field: String,
    pub order: SortOrder,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Pagination {
    Forward { first: u32, after: Option<Cursor> },
    Backward { last: u32, before: Option<Cursor> },
}

impl Pagination {
    pub fn page_size(&self) -> u32 {
        match self {
            Pagination::Forward { first, .. } => *first,
            Pagination::Backward { last, .. } => *last,
        }
    }

    pub fn after_cursor(&self) -> Option<&Cursor> {
        match self {
            Pagination::Forward { after, .. } => after.as_ref(),
            Pagination::Backward { before, .. } => before.as_ref(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DatastoreQuery {
    pub search_index_definitions: Vec<String>,
    pub filters: Vec<BooleanQuery>,
    /// User-requested sort, with the `id asc` tiebreaker already appended and deduplicated
    /// against any user sort on `id` (§5 ordering guarantees).
    pub sort: Vec<SortClause>,
    pub pagination: Pagination,
    pub requested_source_fields: IndexSet<String>,
    pub aggregations: IndexMap<String, AggregationQuery>,
    pub total_document_count_needed: bool,
    pub monotonic_clock_deadline: i64,
    pub individual_docs_needed: bool,
    pub routing_values: Option<Vec<String>>,
    pub cluster_name: String,

    cached_hash: OnceCell<u64>,
    cached_body: OnceCell<Value>,
}

impl DatastoreQuery {
    pub fn new(
        search_index_definitions: Vec<String>,
        filters: Vec<BooleanQuery>,
        sort: Vec<SortClause>,
        pagination: Pagination,
        requested_source_fields: IndexSet<String>,
        aggregations: IndexMap<String, AggregationQuery>,
        total_document_count_needed: bool,
        monotonic_clock_deadline: i64,
        individual_docs_needed: bool,
        routing_values: Option<Vec<String>>,
        cluster_name: String,
    ) -> Self {
        Self {
            search_index_definitions,
            filters,
            sort,
            pagination,
            requested_source_fields,
            aggregations,
            total_document_count_needed,
            monotonic_clock_deadline,
            individual_docs_needed,
            routing_values,
            cluster_name,
            cached_hash: OnceCell::new(),
            cached_body: OnceCell::new(),
        }
    }

    /// The query value with `aggregations` cleared, used by the Query Optimizer to partition
    /// queries into datastore-equivalent groups (§4.5).
    pub fn shape_key(&self) -> String {
        let body = self.non_aggregation_body();
        serde_json::to_string(&body).expect("shape body is always serializable")
    }

    fn non_aggregation_body(&self) -> Value {
        json!({
            "indices": self.search_index_definitions,
            "filters": self.filters.iter().map(BooleanQuery::to_json).collect::<Vec<_>>(),
            "sort": self.sort.iter().map(|s| json!({ "field": s.field, "order": format!("{:?}", s.order) })).collect::<Vec<_>>(),
            "pagination": format!("{:?}", self.pagination),
            "source_fields": self.requested_source_fields.iter().collect::<Vec<_>>(),
            "deadline": self.monotonic_clock_deadline,
            "cluster": self.cluster_name,
            "routing": self.routing_values,
        })
    }

    /// The `msearch` request body for this query (§6 wire format), computed once and cached.
    pub fn search_body(&self) -> &Value {
        self.cached_body.get_or_init(|| {
            let mut body = serde_json::Map::new();
            if let Some(combined) = self.combined_filter() {
                body.insert("query".to_string(), combined.to_json());
            }
            body.insert(
                "_source".to_string(),
                if self.requested_source_fields.is_empty() && !self.individual_docs_needed {
                    json!(false)
                } else {
                    json!({ "includes": self.requested_source_fields.iter().collect::<Vec<_>>() })
                },
            );
            let mut sort = Vec::new();
            for clause in &self.sort {
                sort.push(json!({ clause.field.clone(): { "order": sort_order_str(clause.order) } }));
            }
            body.insert("sort".to_string(), Value::Array(sort));
            body.insert("size".to_string(), json!(self.pagination.page_size()));
            body.insert("track_total_hits".to_string(), json!(self.total_document_count_needed));
            if !self.aggregations.is_empty() {
                let mut aggs = serde_json::Map::new();
                for (name, query) in &self.aggregations {
                    if !query.should_emit_aggregation() {
                        continue;
                    }
                    if let Ok(clause) = crate::aggregation::build_aggregation_body(query) {
                        aggs.insert(name.clone(), clause);
                    }
                }
                if !aggs.is_empty() {
                    body.insert("aggs".to_string(), Value::Object(aggs));
                }
            }
            Value::Object(body)
        })
    }

    fn combined_filter(&self) -> Option<BooleanQuery> {
        if self.filters.is_empty() {
            return None;
        }
        let mut combined = BooleanQuery::new();
        for filter in &self.filters {
            combined.must.extend(filter.must.iter().cloned());
            combined.filter.extend(filter.filter.iter().cloned());
            combined.should.extend(filter.should.iter().cloned());
            combined.must_not.extend(filter.must_not.iter().cloned());
        }
        Some(combined)
    }

    /// Rebuild this query with a different `aggregations` map, discarding the memoized hash and
    /// search body (both depend on it). Used by the Query Optimizer (C6) to install the
    /// prefix-renamed, unioned aggregations map of a merged query (§4.5).
    pub fn with_aggregations(mut self, aggregations: IndexMap<String, AggregationQuery>) -> Self {
        self.aggregations = aggregations;
        self.cached_hash = OnceCell::new();
        self.cached_body = OnceCell::new();
        self
    }

    pub fn memoized_hash(&self) -> u64 {
        *self.cached_hash.get_or_init(|| {
            use std::collections::hash_map::DefaultHasher;
            let mut hasher = DefaultHasher::new();
            self.non_aggregation_body().to_string().hash(&mut hasher);
            serde_json::to_string(&self.aggregations.keys().collect::<Vec<_>>())
                .unwrap_or_default()
                .hash(&mut hasher);
            hasher.finish()
        })
    }
}

fn sort_order_str(order: SortOrder) -> &'static str {
    match order {
        SortOrder::Asc => "asc",
        SortOrder::Desc => "desc",
    }
}

impl PartialEq for DatastoreQuery {
    fn eq(&self, other: &Self) -> bool {
        self.non_aggregation_body() == other.non_aggregation_body()
            && self.aggregations.keys().eq(other.aggregations.keys())
            && self
                .aggregations
                .values()
                .zip(other.aggregations.values())
                .all(|(a, b)| a == b)
    }
}
impl Eq for DatastoreQuery {}

impl Hash for DatastoreQuery {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.memoized_hash().hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(cluster: &str) -> DatastoreQuery {
        DatastoreQuery::new(
            vec!["widgets".into()],
            vec![],
            vec![SortClause { field: "id".into(), order: SortOrder::Asc }],
            Pagination::Forward { first: 10, after: None },
            IndexSet::new(),
            IndexMap::new(),
            false,
            1_000,
            true,
            None,
            cluster.to_string(),
        )
    }

    #[test]
    fn queries_with_identical_shape_are_equal() {
        assert_eq!(query("main"), query("main"));
    }

    #[test]
    fn queries_on_different_clusters_are_not_equal() {
        assert_ne!(query("main"), query("other"));
    }

    #[test]
    fn search_body_is_memoized_across_calls() {
        let q = query("main");
        let a = q.search_body() as *const Value;
        let b = q.search_body() as *const Value;
        assert_eq!(a, b);
    }
}
