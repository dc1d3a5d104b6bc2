//! `GatewayPipeline`: the top-level facade gluing the schema registry (C1), query adapter (C2),
//! filter compiler (C3, invoked indirectly through the adapter), routing/index optimizer (C5),
//! dispatcher (C7), and update compiler (C8) into the two entry points an embedder needs —
//! `plan_query`/`execute` for reads, `compile_event` for writes.
//!
//! Modeled on `apollo-federation`'s `Supergraph` facade: a thin struct holding the immutable,
//! process-global registry plus whatever per-process configuration the embedded binary supplied,
//! exposing one method per pipeline stage rather than forcing callers to wire C1-C8 by hand.

use crate::config::GatewayConfig;
use elasticgraph_dispatcher::dispatch;
use elasticgraph_dispatcher::DispatchOutcome;
use elasticgraph_error::GatewayError;
use elasticgraph_error::SingleGatewayError;
use elasticgraph_indexer::compile_event;
use elasticgraph_indexer::Event;
use elasticgraph_indexer::EventCompileError;
use elasticgraph_indexer::Operation;
use elasticgraph_indexer::SchemaVersionRegistry;
use elasticgraph_planner::build_datastore_query;
use elasticgraph_planner::routing::is_bypass;
use elasticgraph_planner::routing::resolve_index_expression;
use elasticgraph_planner::routing::resolve_routing;
use elasticgraph_planner::routing::IndexExpressionDecision;
use elasticgraph_planner::routing::RolloverIndex;
use elasticgraph_planner::routing::RoutingDecision;
use elasticgraph_planner::DatastoreQuery;
use elasticgraph_planner::DatastoreQueryStats;
use elasticgraph_planner::Lookahead;
use elasticgraph_planner::QueryAdapterInput;
use elasticgraph_schema::SchemaRegistry;
use elasticgraph_schema::TypeRef;
use indexmap::IndexMap;
use serde_json::Value;

/// Everything the query-planning half of a request needs, beyond the registry and config that
/// `GatewayPipeline` already holds.
pub struct PlanQueryInput<'a> {
    pub root_field_name: &'a str,
    pub root_type: &'a TypeRef,
    pub selection: &'a dyn Lookahead,
    /// Overrides `GatewayConfig::default_deadline_ms` for this one query, e.g. a
    /// caller-supplied GraphQL request deadline.
    pub deadline_ms: Option<i64>,
}

/// The result of planning one root field: either a fully-built, routing/index-optimized query
/// ready for the dispatcher, or a bypass — the filters provably match nothing, so the datastore
/// is never contacted (§4.4).
pub enum PlannedQuery {
    Query(DatastoreQuery),
    Bypass,
}

impl PlannedQuery {
    pub fn into_query(self) -> Option<DatastoreQuery> {
        match self {
            PlannedQuery::Query(query) => Some(query),
            PlannedQuery::Bypass => None,
        }
    }
}

/// Glues C1 (schema registry), C2 (query adapter), C5 (routing/index optimizer), C6 (query
/// optimizer, inside the dispatcher), C7 (dispatcher) and C8 (update compiler) into one pipeline.
///
/// Immutable and cheap to share: `SchemaRegistry` is already an `Arc` internally, and
/// `GatewayConfig` holds only `Arc`-wrapped collaborators, so `GatewayPipeline` can be held
/// behind an `Arc` itself and shared across concurrent requests the same way the embedding
/// GraphQL server shares its schema.
pub struct GatewayPipeline {
    pub registry: SchemaRegistry,
    pub config: GatewayConfig,
}

impl GatewayPipeline {
    pub fn new(registry: SchemaRegistry, config: GatewayConfig) -> Self {
        Self { registry, config }
    }

    /// Plan one indexed root field's selection into a routing/index-optimized `DatastoreQuery`
    /// (C2 + C5), or a bypass if the Routing/Index Optimizer proves the filters can't match
    /// anything (§4.4).
    #[tracing::instrument(skip(self, input), fields(root_field = input.root_field_name))]
    pub fn plan_query(&self, input: PlanQueryInput<'_>) -> Result<PlannedQuery, GatewayError> {
        let index_defs = self.registry.index_for(input.root_type)?;
        if index_defs.is_empty() {
            return Err(SingleGatewayError::Config {
                message: format!("indexed type \"{}\" has no index definitions", input.root_type),
            }
            .into());
        }
        let cluster_name = index_defs[0].cluster.query_cluster.clone();
        let search_index_definitions: Vec<String> =
            index_defs.iter().map(|d| d.name.clone()).collect();

        let deadline = self.config.clock.now_millis()
            + input.deadline_ms.unwrap_or(self.config.default_deadline_ms);

        let query = build_datastore_query(QueryAdapterInput {
            resolver: &self.registry,
            registry: &self.registry,
            root_field_name: input.root_field_name,
            root_type: input.root_type,
            search_index_definitions,
            selection: input.selection,
            cluster_name,
            monotonic_clock_deadline: deadline,
            options: Default::default(),
        })?;

        self.apply_routing_and_index_optimizer(query, index_defs, input.root_type, input.selection)
    }

    /// C5: derive the minimal routing-value set and index-name expression from the same raw
    /// filter argument the adapter just compiled, and fold the result back into the query. Kept
    /// separate from `build_datastore_query` itself (as §4.4 treats it as its own component),
    /// operating on the raw filter expression rather than the compiled `BooleanQuery` tree — but
    /// first translated to index-side field names (`name_in_index`), since `IndexDefinition`'s
    /// routing/rollover field paths are already in that form while the raw GraphQL filter
    /// argument is keyed by `name_in_graphql`.
    fn apply_routing_and_index_optimizer(
        &self,
        query: DatastoreQuery,
        index_defs: Vec<&elasticgraph_schema::IndexDefinition>,
        root_type: &TypeRef,
        selection: &dyn Lookahead,
    ) -> Result<PlannedQuery, GatewayError> {
        let filter_argument = selection.argument("filter");
        let filter_expression: elasticgraph_planner::filter::FilterExpression = match &filter_argument {
            Some(serde_json::Value::Object(map)) => map.clone(),
            _ => elasticgraph_planner::filter::FilterExpression::new(),
        };
        let filter_expression =
            elasticgraph_planner::filter::translate_filter_to_index_names(&self.registry, root_type, &filter_expression)?;
        let filter_expressions = [filter_expression];

        let routing_field_paths: Vec<Vec<String>> = index_defs
            .iter()
            .filter_map(|d| d.routing_field_path.clone())
            .collect();
        let rollover_indices: Vec<RolloverIndex<'_>> = index_defs
            .iter()
            .filter_map(|d| {
                let policy = d.rollover.as_ref()?;
                Some(RolloverIndex {
                    base_name: &d.name,
                    timestamp_field_path: vec![policy.timestamp_field_name_in_index.clone()],
                    policy,
                })
            })
            .collect();

        let has_aggregations = !query.aggregations.is_empty();
        let routing_decision = resolve_routing(&filter_expressions, &routing_field_paths, has_aggregations);
        let index_decision = resolve_index_expression(&filter_expressions, &rollover_indices, has_aggregations);

        if is_bypass(&routing_decision, &index_decision) {
            return Ok(PlannedQuery::Bypass);
        }

        let routing_values = match routing_decision {
            RoutingDecision::Unrestricted => None,
            RoutingDecision::Restricted(values) => Some(values),
            RoutingDecision::Bypass => unreachable!("handled by is_bypass above"),
        };
        let search_index_definitions = match index_decision {
            IndexExpressionDecision::AllIndices(names) | IndexExpressionDecision::Restricted(names) => names,
            IndexExpressionDecision::Bypass => unreachable!("handled by is_bypass above"),
        };

        let refined = DatastoreQuery::new(
            search_index_definitions,
            query.filters,
            query.sort,
            query.pagination,
            query.requested_source_fields,
            query.aggregations,
            query.total_document_count_needed,
            query.monotonic_clock_deadline,
            query.individual_docs_needed,
            routing_values,
            query.cluster_name,
        );
        Ok(PlannedQuery::Query(refined))
    }

    /// C6 + C7: merge datastore-equivalent queries, fan one multi-search request per cluster out
    /// with a client-enforced deadline, and split the responses back apart.
    pub async fn execute(&self, queries: Vec<DatastoreQuery>) -> Result<DispatchOutcome, GatewayError> {
        dispatch(self.config.client.as_ref(), self.config.clock.as_ref(), queries).await
    }

    /// C8: compile one incoming event into its primary upsert plus zero or more derived-index
    /// scripted updates.
    pub fn compile_event(
        &self,
        schema_versions: &SchemaVersionRegistry,
        event: &Event,
    ) -> Result<Vec<Operation>, EventCompileError> {
        compile_event(&self.registry, schema_versions, event)
    }

    /// Observability-only companion to a planned query (§C of the expanded spec), computed on
    /// demand rather than stored on `DatastoreQuery` itself.
    pub fn stats_for(query: &DatastoreQuery) -> DatastoreQueryStats {
        DatastoreQueryStats::compute(query)
    }

    /// C4's response-decoding counterpart to `query.aggregations`: for every named aggregation on
    /// `query`, pulls its slice out of the raw per-query datastore response (`response.aggregations.<name>`)
    /// and decodes it through whichever grouping adapter built it (§4.3).
    pub fn decode_aggregations(query: &DatastoreQuery, response: &Value) -> IndexMap<String, Vec<Value>> {
        let mut decoded = IndexMap::new();
        for (name, aggregation_query) in &query.aggregations {
            let raw = response
                .get("aggregations")
                .and_then(|aggregations| aggregations.get(name))
                .cloned()
                .unwrap_or(Value::Null);
            decoded.insert(name.clone(), elasticgraph_planner::aggregation::decode_aggregation_response(aggregation_query, &raw));
        }
        decoded
    }
}
