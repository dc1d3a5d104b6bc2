//! The Query Adapter (component C2, §4.1): turns one indexed root field's selection + arguments
//! into a `DatastoreQuery`.

use super::cursor::Cursor;
use super::datastore_query::DatastoreQuery;
use super::datastore_query::Pagination;
use super::datastore_query::SortClause;
use super::datastore_query::SortOrder;
use super::lookahead::Lookahead;
use crate::aggregation::AggregationFunction;
use crate::aggregation::AggregationQuery;
use crate::aggregation::CalendarOrFixedInterval;
use crate::aggregation::Computation;
use crate::aggregation::DateHistogramDetail;
use crate::aggregation::Grouping;
use crate::aggregation::GroupingAdapter;
use crate::aggregation::NestedSubAggregation;
use crate::aggregation::Paginator;
use crate::aggregation::ScriptTermDetail;
use crate::filter::compile_filter;
use crate::filter::requires_incomplete_doc_exclusion;
use crate::filter::BooleanQuery;
use crate::filter::Clause;
use crate::filter::FieldPathResolver;
use crate::filter::FilterExpression;
use crate::filter::Occurrence;
use elasticgraph_error::GatewayError;
use elasticgraph_error::SingleGatewayError;
use elasticgraph_schema::ForeignKeyLocation;
use elasticgraph_schema::SchemaRegistry;
use elasticgraph_schema::TypeRef;
use indexmap::IndexMap;
use indexmap::IndexSet;
use std::collections::HashSet;

const DEFAULT_PAGE_SIZE: u32 = 10;

/// The synthesized index-level meta-field the indexer maintains on every document, recording
/// which sources (self plus any foreign-sourced updates) have contributed to it. Not a schema
/// field — no type ever declares it — so it is emitted directly as a `Clause` rather than routed
/// through `compile_filter`'s `SubField` schema lookup (§7.1).
const SOURCES_META_FIELD: &str = "__sources";

/// The value `__sources` carries for a document's own (non-derived) contribution (§7.1,
/// spec.md Scenario C).
const SELF_SOURCE_VALUE: &str = "__self";

/// Extension point for embedding code, mirroring the shape of a router plugin's already-parsed
/// config. Unread by the adapter today; it exists so a future query-cost/complexity check (the
/// analogue of a cost-calculator plugin) can be added without reworking `QueryAdapterInput` or
/// `DatastoreQuery` itself.
#[non_exhaustive]
#[derive(Debug, Clone, Default)]
pub struct QueryAdapterOptions {}

/// Everything the Query Adapter needs to translate one indexed root field's selection into a
/// `DatastoreQuery` (§4.1). Arguments are read from `selection.argument(...)` directly, matching
/// how the root field itself was invoked (e.g. `widgets(first: 10, filter: {...})`).
pub struct QueryAdapterInput<'a> {
    pub resolver: &'a dyn FieldPathResolver,
    pub registry: &'a SchemaRegistry,
    /// The root query field's own name, e.g. `"widgets"` — used to look up its
    /// `RootFieldCategory` (§4.1: "detected by schema category `indexed_aggregation`").
    pub root_field_name: &'a str,
    pub root_type: &'a TypeRef,
    pub search_index_definitions: Vec<String>,
    pub selection: &'a dyn Lookahead,
    pub cluster_name: String,
    pub monotonic_clock_deadline: i64,
    pub options: QueryAdapterOptions,
}

pub fn build_datastore_query(input: QueryAdapterInput<'_>) -> Result<DatastoreQuery, GatewayError> {
    let QueryAdapterInput {
        resolver,
        registry,
        root_field_name,
        root_type,
        search_index_definitions,
        selection,
        cluster_name,
        monotonic_clock_deadline,
        options: _,
    } = input;

    let nodes_selected = selection.is_selected("nodes");
    let edges_selected = selection.is_selected("edges");
    if nodes_selected && edges_selected {
        return Err(SingleGatewayError::ConflictingGroupingSelections {
            selection_a: "nodes",
            selection_b: "edges",
        }
        .into());
    }

    let individual_docs_needed = individual_docs_needed(selection, nodes_selected, edges_selected);

    let node_selection = if nodes_selected {
        selection.child("nodes")
    } else {
        selection.child("edges").and_then(|edges| edges.child("node"))
    };

    let type_def = registry.type_by(root_type)?;
    let mut requested_source_fields: IndexSet<String> = IndexSet::new();
    if let Some(node_selection) = node_selection.as_deref() {
        collect_requested_source_fields(registry, root_type, node_selection, &mut requested_source_fields)?;
    }
    if type_def.is_abstract() {
        requested_source_fields.insert("__typename".to_string());
    }

    let total_document_count_needed = selection.is_selected("total_edge_count");

    let filter_argument = selection.argument("filter");
    let filter_expression: FilterExpression = match &filter_argument {
        Some(serde_json::Value::Object(map)) => map.clone(),
        _ => FilterExpression::new(),
    };

    let mut filters = Vec::new();
    if let Some(compiled) = compile_filter(resolver, root_type, &filter_expression)? {
        filters.push(compiled);
    }

    if type_def.has_any_foreign_sourced_field() {
        let sourced_field_names: HashSet<String> = type_def
            .fields_with_foreign_source()
            .map(|f| f.name_in_graphql.clone())
            .collect();
        if requires_incomplete_doc_exclusion(&filter_expression, &sourced_field_names) {
            // `__sources` is a synthesized meta-field, not a schema field: build its clause
            // directly instead of round-tripping through `compile_filter`'s `SubField` branch,
            // which would try (and fail) to resolve it against the schema registry.
            let mut exclusion = BooleanQuery::new();
            exclusion.push(
                Occurrence::Filter,
                Clause::Terms {
                    field: SOURCES_META_FIELD.to_string(),
                    values: vec![serde_json::json!(SELF_SOURCE_VALUE)],
                },
            );
            filters.push(exclusion);
        }
    }

    let sort = sort_clauses(selection);
    let pagination = pagination_from(selection)?;

    let mut aggregations = IndexMap::new();
    if registry
        .root_field(root_field_name)
        .map(|f| f.category == elasticgraph_schema::RootFieldCategory::IndexedAggregation)
        .unwrap_or(false)
    {
        if let Some(node_selection) = node_selection.as_deref() {
            let query = build_aggregation_query(resolver, registry, root_type, node_selection, "root")?;
            aggregations.insert("root".to_string(), query);
        }
    }

    Ok(DatastoreQuery::new(
        search_index_definitions,
        filters,
        sort,
        pagination,
        requested_source_fields,
        aggregations,
        total_document_count_needed,
        monotonic_clock_deadline,
        individual_docs_needed,
        None,
        cluster_name,
    ))
}

fn individual_docs_needed(selection: &dyn Lookahead, nodes_selected: bool, edges_selected: bool) -> bool {
    if nodes_selected {
        return true;
    }
    if edges_selected {
        let edges = selection.child("edges").expect("edges_selected implies child present");
        if edges.is_selected("node") || edges.is_selected("cursor") {
            return true;
        }
    }
    if let Some(page_info) = selection.child("page_info") {
        if page_info.is_selected("start_cursor")
            || page_info.is_selected("end_cursor")
            || page_info.is_selected("has_next_page")
            || page_info.is_selected("has_previous_page")
        {
            return true;
        }
    }
    false
}

fn collect_requested_source_fields(
    registry: &SchemaRegistry,
    type_ref: &TypeRef,
    selection: &dyn Lookahead,
    out: &mut IndexSet<String>,
) -> Result<(), GatewayError> {
    let type_def = registry.type_by(type_ref)?;
    for field_name in selection.selected_field_names() {
        if field_name == "__typename" {
            if type_def.is_abstract() {
                out.insert("__typename".to_string());
            }
            continue;
        }
        let Some(field) = type_def.field(&field_name) else {
            continue;
        };
        out.insert(field.name_in_index.clone());

        if let Some(relation) = &field.relation {
            match relation.foreign_key_location {
                ForeignKeyLocation::Parent => {
                    out.insert(field.name_in_index.clone());
                }
                ForeignKeyLocation::Child => {
                    if let Some(id_field) = type_def.field("id") {
                        out.insert(id_field.name_in_index.clone());
                    }
                }
            }
            if relation.self_referential {
                if let Some(id_field) = type_def.field("id") {
                    out.insert(id_field.name_in_index.clone());
                }
            }
        }
    }
    Ok(())
}

fn sort_clauses(selection: &dyn Lookahead) -> Vec<SortClause> {
    let mut sort = Vec::new();
    if let Some(serde_json::Value::Array(values)) = selection.argument("order_by") {
        for value in values {
            if let Some(s) = value.as_str() {
                let (field, order) = match s.strip_suffix("_DESC") {
                    Some(prefix) => (prefix.to_string(), SortOrder::Desc),
                    None => (s.trim_end_matches("_ASC").to_string(), SortOrder::Asc),
                };
                sort.push(SortClause { field: field.to_lowercase(), order });
            }
        }
    }
    // §5 ordering guarantees: append the `id asc` tiebreaker unless the user already sorted on it.
    if !sort.iter().any(|c| c.field == "id") {
        sort.push(SortClause { field: "id".to_string(), order: SortOrder::Asc });
    }
    sort
}

fn pagination_from(selection: &dyn Lookahead) -> Result<Pagination, GatewayError> {
    let decode_cursor = |value: &serde_json::Value| -> Result<Option<Cursor>, GatewayError> {
        match value.as_str() {
            Some(s) => Cursor::decode(s).map(Some),
            None => Ok(None),
        }
    };

    if let Some(last) = selection.argument("last").and_then(|v| v.as_u64()) {
        let before = match selection.argument("before") {
            Some(v) => decode_cursor(&v)?,
            None => None,
        };
        return Ok(Pagination::Backward { last: last as u32, before });
    }

    let first = selection
        .argument("first")
        .and_then(|v| v.as_u64())
        .map(|n| n as u32)
        .unwrap_or(DEFAULT_PAGE_SIZE);
    let after = match selection.argument("after") {
        Some(v) => decode_cursor(&v)?,
        None => None,
    };
    Ok(Pagination::Forward { first, after })
}

/// Build one `AggregationQuery` from an aggregation connection's node-level selection (§4.1).
fn build_aggregation_query(
    resolver: &dyn FieldPathResolver,
    registry: &SchemaRegistry,
    type_ref: &TypeRef,
    selection: &dyn Lookahead,
    name: &str,
) -> Result<AggregationQuery, GatewayError> {
    let groupings = match selection.child("grouped_by") {
        Some(grouped_by) => build_groupings(resolver, type_ref, grouped_by.as_ref())?,
        None => Vec::new(),
    };

    let computations = match selection.child("aggregated_values") {
        Some(values) => build_computations(registry, type_ref, values.as_ref())?,
        None => Vec::new(),
    };

    let needs_doc_count = selection.is_selected("count") || selection.is_selected("count_detail");
    let needs_doc_count_error = selection
        .child("count_detail")
        .map(|cd| cd.is_selected("exact_value") || cd.is_selected("upper_bound"))
        .unwrap_or(false);

    let mut sub_aggregations = IndexMap::new();
    if let Some(subs) = selection.child("sub_aggregations") {
        for sub_name in subs.selected_field_names() {
            let Some(sub_selection) = subs.child(&sub_name) else { continue };
            let nested_path = sub_name.clone();
            let inner =
                build_aggregation_query(resolver, registry, type_ref, sub_selection.as_ref(), &sub_name)?;
            sub_aggregations.insert(
                nested_path.clone(),
                NestedSubAggregation { nested_path: Some(nested_path), query: inner },
            );
        }
    }

    let after = match selection.argument("after") {
        Some(value) => value.as_str().map(Cursor::decode).transpose()?,
        None => None,
    };
    let desired_page_size = selection
        .argument("first")
        .and_then(|v| v.as_u64())
        .map(|n| n as u32)
        .unwrap_or(DEFAULT_PAGE_SIZE);

    Ok(AggregationQuery {
        name: name.to_string(),
        filter: None,
        paginator: Paginator { desired_page_size, after },
        groupings,
        computations,
        sub_aggregations,
        needs_doc_count,
        needs_doc_count_error,
        adapter: GroupingAdapter::Composite,
    })
}

fn build_groupings(
    resolver: &dyn FieldPathResolver,
    type_ref: &TypeRef,
    grouped_by: &dyn Lookahead,
) -> Result<Vec<Grouping>, GatewayError> {
    let mut groupings = Vec::new();
    for field_name in grouped_by.selected_field_names() {
        let resolution = resolver.resolve(type_ref, &field_name)?;
        let path = vec![field_name.clone()];

        let child_selection = grouped_by.child(&field_name);
        let grouping = if field_name == "as_day_of_week" || field_name == "as_time_of_day" {
            let time_zone = child_selection
                .as_ref()
                .and_then(|c| c.argument("time_zone"))
                .and_then(|v| v.as_str().map(str::to_string))
                .unwrap_or_else(|| "UTC".to_string());
            let mut params = IndexMap::new();
            params.insert("time_zone".to_string(), serde_json::json!(time_zone));
            Grouping::ScriptTerm {
                path,
                detail: ScriptTermDetail { script_id: field_name.clone(), params },
            }
        } else if let Some(detail) = date_histogram_detail(&resolution, child_selection.as_deref()) {
            Grouping::DateHistogram { path, detail }
        } else {
            Grouping::FieldTerm { name_in_index: resolution.name_in_index.clone(), path }
        };
        groupings.push(grouping);
    }
    Ok(groupings)
}

fn date_histogram_detail(
    resolution: &crate::filter::FieldPathResolution,
    selection: Option<&dyn Lookahead>,
) -> Option<DateHistogramDetail> {
    let selection = selection?;
    let unit = selection
        .argument("truncation_unit")
        .or_else(|| selection.argument("granularity"))?;
    let unit = unit.as_str()?.to_lowercase();
    let interval_kind = if matches!(unit.as_str(), "year" | "quarter" | "month" | "week") {
        CalendarOrFixedInterval::Calendar
    } else {
        CalendarOrFixedInterval::Fixed
    };
    let interval = match unit.as_str() {
        "year" => "1y".to_string(),
        "quarter" => "1q".to_string(),
        "month" => "1M".to_string(),
        "week" => "1w".to_string(),
        "day" => "1d".to_string(),
        "hour" => "1h".to_string(),
        "minute" => "1m".to_string(),
        "second" => "1s".to_string(),
        other => other.to_string(),
    };
    let offset = match selection.argument("offset") {
        Some(serde_json::Value::Object(offset)) => {
            let amount = offset.get("amount").and_then(|v| v.as_i64()).unwrap_or(0);
            let unit = offset
                .get("unit")
                .and_then(|v| v.as_str())
                .map(offset_unit_suffix)
                .unwrap_or("d");
            if amount == 0 { String::new() } else { format!("{amount}{unit}") }
        }
        _ => String::new(),
    };
    let time_zone = selection
        .argument("time_zone")
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_else(|| "UTC".to_string());

    Some(DateHistogramDetail {
        field: resolution.name_in_index.clone(),
        interval,
        interval_kind,
        time_zone,
        offset,
    })
}

fn offset_unit_suffix(unit: &str) -> &'static str {
    match unit.to_lowercase().as_str() {
        "year" | "years" => "y",
        "month" | "months" => "M",
        "week" | "weeks" => "w",
        "hour" | "hours" => "h",
        "minute" | "minutes" => "m",
        "second" | "seconds" => "s",
        _ => "d",
    }
}

fn build_computations(
    registry: &SchemaRegistry,
    type_ref: &TypeRef,
    selection: &dyn Lookahead,
) -> Result<Vec<Computation>, GatewayError> {
    let type_def = registry.type_by(type_ref)?;
    let mut computations = Vec::new();
    for field_name in selection.selected_field_names() {
        let Some(field) = type_def.field(&field_name) else { continue };
        let Some(detail) = &field.computation else { continue };
        let function = match detail.function {
            elasticgraph_schema::FunctionName::Sum => AggregationFunction::Sum,
            elasticgraph_schema::FunctionName::Avg => AggregationFunction::Avg,
            elasticgraph_schema::FunctionName::Min => AggregationFunction::Min,
            elasticgraph_schema::FunctionName::Max => AggregationFunction::Max,
            elasticgraph_schema::FunctionName::Cardinality => AggregationFunction::Cardinality,
        };
        computations.push(Computation {
            source_field_path: detail.source_field_path.clone(),
            computed_index_field_name: field.name_in_index.clone(),
            function,
            empty_bucket_value: detail.empty_bucket_value.clone(),
        });
    }
    Ok(computations)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::FieldPathResolution;
    use crate::query::lookahead::StaticLookahead;
    use elasticgraph_schema::Field;
    use elasticgraph_schema::FieldSource;
    use elasticgraph_schema::IndexedRootField;
    use elasticgraph_schema::RootFieldCategory;
    use elasticgraph_schema::TypeDef;
    use elasticgraph_schema::TypeKind;

    struct FixtureResolver;
    impl FieldPathResolver for FixtureResolver {
        fn resolve(
            &self,
            _type_ref: &TypeRef,
            graphql_field_name: &str,
        ) -> Result<FieldPathResolution, GatewayError> {
            Ok(FieldPathResolution {
                name_in_index: graphql_field_name.to_string(),
                child_type: TypeRef::new("String"),
                is_list: false,
                is_nested_object: false,
            })
        }

        fn kind_of(&self, _type_ref: &TypeRef) -> Option<TypeKind> {
            Some(TypeKind::Scalar)
        }
    }

    fn widget_registry() -> SchemaRegistry {
        let mut fields = IndexMap::new();
        fields.insert(
            "name".to_string(),
            Field {
                name_in_graphql: "name".into(),
                name_in_index: "name".into(),
                type_ref: TypeRef::new("String"),
                is_list: false,
                is_nested_object_list: false,
                source: FieldSource::SelfSourced,
                computation: None,
                relation: None,
            },
        );
        fields.insert(
            "id".to_string(),
            Field {
                name_in_graphql: "id".into(),
                name_in_index: "id".into(),
                type_ref: TypeRef::new("ID"),
                is_list: false,
                is_nested_object_list: false,
                source: FieldSource::SelfSourced,
                computation: None,
                relation: None,
            },
        );
        let type_def = TypeDef {
            type_ref: TypeRef::new("Widget"),
            kind: TypeKind::Object,
            fields,
            possible_types: vec![],
            index_names: vec!["widgets".to_string()],
        };
        elasticgraph_schema::SchemaRegistry::load(elasticgraph_schema::SchemaArtifacts {
            types: vec![type_def],
            indices: vec![elasticgraph_schema::IndexDefinition {
                name: "widgets".to_string(),
                rollover: None,
                routing_field_path: None,
                cluster: elasticgraph_schema::ClusterAssignment {
                    query_cluster: "main".to_string(),
                    index_clusters: vec!["main".to_string()],
                },
                ignored_routing_values: Default::default(),
            }],
            derived_types: vec![],
            root_fields: vec![IndexedRootField {
                name_in_graphql: "Widget".to_string(),
                on_type: TypeRef::new("Widget"),
                category: RootFieldCategory::IndexedCollection,
            }],
            script_ids: elasticgraph_schema::ScriptIds { index_data_update: "x".into() },
        })
        .unwrap()
    }

    #[test]
    fn nodes_and_edges_both_selected_is_rejected() {
        let selection = StaticLookahead::default()
            .with_field("nodes", StaticLookahead::default())
            .with_field("edges", StaticLookahead::default());
        let registry = widget_registry();
        let resolver = FixtureResolver;
        let result = build_datastore_query(QueryAdapterInput {
            resolver: &resolver,
            registry: &registry,
            root_field_name: "widgets",
            root_type: &TypeRef::new("Widget"),
            search_index_definitions: vec!["widgets".into()],
            selection: &selection,
            cluster_name: "main".into(),
            monotonic_clock_deadline: 0,
            options: Default::default(),
        });
        assert!(result.is_err());
    }

    #[test]
    fn requested_source_fields_come_from_the_node_selection() {
        let selection = StaticLookahead::default().with_field(
            "nodes",
            StaticLookahead::default().with_field("name", StaticLookahead::default()),
        );
        let registry = widget_registry();
        let resolver = FixtureResolver;
        let query = build_datastore_query(QueryAdapterInput {
            resolver: &resolver,
            registry: &registry,
            root_field_name: "widgets",
            root_type: &TypeRef::new("Widget"),
            search_index_definitions: vec!["widgets".into()],
            selection: &selection,
            cluster_name: "main".into(),
            monotonic_clock_deadline: 0,
            options: Default::default(),
        })
        .unwrap();
        assert!(query.requested_source_fields.contains("name"));
        assert!(query.individual_docs_needed);
    }

    #[test]
    fn page_info_only_selection_does_not_need_individual_docs() {
        let selection = StaticLookahead::default().with_field(
            "page_info",
            StaticLookahead::default(),
        );
        let registry = widget_registry();
        let resolver = FixtureResolver;
        let query = build_datastore_query(QueryAdapterInput {
            resolver: &resolver,
            registry: &registry,
            root_field_name: "widgets",
            root_type: &TypeRef::new("Widget"),
            search_index_definitions: vec!["widgets".into()],
            selection: &selection,
            cluster_name: "main".into(),
            monotonic_clock_deadline: 0,
            options: Default::default(),
        })
        .unwrap();
        assert!(!query.individual_docs_needed);
    }

    fn widget_registry_with_foreign_sourced_field() -> SchemaRegistry {
        let mut fields = IndexMap::new();
        fields.insert(
            "name".to_string(),
            Field {
                name_in_graphql: "name".into(),
                name_in_index: "name".into(),
                type_ref: TypeRef::new("String"),
                is_list: false,
                is_nested_object_list: false,
                source: FieldSource::SelfSourced,
                computation: None,
                relation: None,
            },
        );
        fields.insert(
            "ownerName".to_string(),
            Field {
                name_in_graphql: "ownerName".into(),
                name_in_index: "owner_name".into(),
                type_ref: TypeRef::new("String"),
                is_list: false,
                is_nested_object_list: false,
                source: FieldSource::Foreign { source_type: TypeRef::new("Owner") },
                computation: None,
                relation: None,
            },
        );
        let type_def = TypeDef {
            type_ref: TypeRef::new("Widget"),
            kind: TypeKind::Object,
            fields,
            possible_types: vec![],
            index_names: vec!["widgets".to_string()],
        };
        elasticgraph_schema::SchemaRegistry::load(elasticgraph_schema::SchemaArtifacts {
            types: vec![type_def],
            indices: vec![elasticgraph_schema::IndexDefinition {
                name: "widgets".to_string(),
                rollover: None,
                routing_field_path: None,
                cluster: elasticgraph_schema::ClusterAssignment {
                    query_cluster: "main".to_string(),
                    index_clusters: vec!["main".to_string()],
                },
                ignored_routing_values: Default::default(),
            }],
            derived_types: vec![],
            root_fields: vec![IndexedRootField {
                name_in_graphql: "Widget".to_string(),
                on_type: TypeRef::new("Widget"),
                category: RootFieldCategory::IndexedCollection,
            }],
            script_ids: elasticgraph_schema::ScriptIds { index_data_update: "x".into() },
        })
        .unwrap()
    }

    /// spec.md Scenario C: a type with a foreign-sourced field must AND on a `__sources`
    /// exclusion filter, compiled directly (not through the schema field resolver, since
    /// `__sources` is a synthesized meta-field no type ever declares) and matching the
    /// lowercase `__self` constant.
    #[test]
    fn foreign_sourced_field_adds_the_sources_exclusion_filter() {
        let selection = StaticLookahead::default().with_field(
            "nodes",
            StaticLookahead::default().with_field("name", StaticLookahead::default()),
        );
        let registry = widget_registry_with_foreign_sourced_field();
        let resolver = FixtureResolver;
        let query = build_datastore_query(QueryAdapterInput {
            resolver: &resolver,
            registry: &registry,
            root_field_name: "widgets",
            root_type: &TypeRef::new("Widget"),
            search_index_definitions: vec!["widgets".into()],
            selection: &selection,
            cluster_name: "main".into(),
            monotonic_clock_deadline: 0,
            options: Default::default(),
        })
        .unwrap();

        let exclusion = query
            .filters
            .iter()
            .find(|f| {
                f.filter.iter().any(|c| {
                    matches!(
                        c,
                        Clause::Terms { field, values }
                            if field == SOURCES_META_FIELD && values == &vec![serde_json::json!(SELF_SOURCE_VALUE)]
                    )
                })
            })
            .expect("expected a __sources exclusion filter");
        assert!(matches!(
            &exclusion.filter[0],
            Clause::Terms { field, .. } if field == "__sources"
        ));
    }
}
