//! `DatastoreQueryStats` — an observability-only companion to a planned `DatastoreQuery`,
//! mirroring `apollo-federation::query_plan::QueryPlan`'s `statistics` field. Nothing in the
//! planner reads this back; it exists purely so embedding code can export planning metrics
//! without re-walking the query tree itself.

use super::datastore_query::DatastoreQuery;
use crate::filter::BooleanQuery;
use crate::filter::Clause;

/// Counts and shape hints about one planned query, computed once after planning and carried
/// alongside it for logging/metrics. Never consulted by the planner or dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DatastoreQueryStats {
    pub filter_node_count: usize,
    pub aggregation_depth: usize,
    /// Set by the Query Optimizer (C6) when this query's response was the result of an
    /// un-merge; `None` for a query that was dispatched on its own.
    pub merged_with: Option<usize>,
}

impl DatastoreQueryStats {
    pub fn compute(query: &DatastoreQuery) -> Self {
        let filter_node_count = query.filters.iter().map(count_nodes).sum();
        let aggregation_depth = query
            .aggregations
            .values()
            .map(aggregation_depth)
            .max()
            .unwrap_or(0);
        Self {
            filter_node_count,
            aggregation_depth,
            merged_with: None,
        }
    }

    pub fn with_merge_count(mut self, merged_with: usize) -> Self {
        self.merged_with = Some(merged_with);
        self
    }
}

fn count_nodes(query: &BooleanQuery) -> usize {
    let mut count = 0;
    for clauses in [&query.must, &query.filter, &query.should, &query.must_not] {
        for clause in clauses {
            count += 1;
            if let Clause::Nested { query, .. } | Clause::Bool(query) = clause {
                count += count_nodes(query);
            }
        }
    }
    count
}

fn aggregation_depth(query: &crate::aggregation::AggregationQuery) -> usize {
    1 + query
        .sub_aggregations
        .values()
        .map(|sub| aggregation_depth(&sub.query))
        .max()
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::datastore_query::Pagination;
    use crate::query::datastore_query::SortClause;
    use crate::query::datastore_query::SortOrder;
    use indexmap::IndexMap;
    use indexmap::IndexSet;

    fn query_with_filters(filters: Vec<BooleanQuery>) -> DatastoreQuery {
        DatastoreQuery::new(
            vec!["widgets".into()],
            filters,
            vec![SortClause { field: "id".into(), order: SortOrder::Asc }],
            Pagination::Forward { first: 10, after: None },
            IndexSet::new(),
            IndexMap::new(),
            false,
            0,
            true,
            None,
            "main".into(),
        )
    }

    #[test]
    fn no_filters_means_zero_node_count() {
        let stats = DatastoreQueryStats::compute(&query_with_filters(vec![]));
        assert_eq!(stats.filter_node_count, 0);
        assert_eq!(stats.aggregation_depth, 0);
    }

    #[test]
    fn counts_one_node_per_leaf_clause() {
        let mut bq = BooleanQuery::new();
        bq.push(
            crate::filter::Occurrence::Filter,
            Clause::Term { field: "a".into(), value: serde_json::json!(1) },
        );
        bq.push(
            crate::filter::Occurrence::Filter,
            Clause::Term { field: "b".into(), value: serde_json::json!(2) },
        );
        let stats = DatastoreQueryStats::compute(&query_with_filters(vec![bq]));
        assert_eq!(stats.filter_node_count, 2);
    }

    #[test]
    fn merged_with_defaults_to_none_until_set() {
        let stats = DatastoreQueryStats::compute(&query_with_filters(vec![]));
        assert_eq!(stats.merged_with, None);
        assert_eq!(stats.with_merge_count(3).merged_with, Some(3));
    }
}
