//! List-count accumulation (§4.7 step 6): a map from each list field's `|`-separated dotted path
//! to its cardinality, maintained so `count` filters are O(1) on the datastore (see glossary,
//! "List-count field (`__counts`)").

use elasticgraph_schema::SchemaRegistry;
use elasticgraph_schema::TypeRef;
use indexmap::IndexMap;
use serde_json::Value;

/// Walk `record` against the shape of `type_ref` and accumulate one entry per list field path.
///
/// Nested object lists (`is_nested_object_list`) contribute only their own count — their
/// descendants maintain counts in their own embedded `__counts` subfield, which this function
/// never touches. Plain object lists contribute their own count *and* the summed counts of every
/// list-valued descendant, flattened into this same map.
pub fn accumulate(registry: &SchemaRegistry, type_ref: &TypeRef, record: &Value) -> IndexMap<String, u64> {
    let mut counts = IndexMap::new();
    walk(registry, type_ref, record, "", &mut counts);
    counts
}

fn walk(registry: &SchemaRegistry, type_ref: &TypeRef, record: &Value, path_prefix: &str, counts: &mut IndexMap<String, u64>) {
    let Ok(type_def) = registry.type_by(type_ref) else { return };
    let Some(object) = record.as_object() else { return };

    for field in type_def.fields.values() {
        let Some(value) = object.get(&field.name_in_index) else { continue };
        let field_path = join_path(path_prefix, &field.name_in_index);

        if field.is_list {
            let items = value.as_array().map(Vec::as_slice).unwrap_or(&[]);
            let non_null_count = items.iter().filter(|item| !item.is_null()).count() as u64;
            *counts.entry(field_path.clone()).or_insert(0) += non_null_count;

            if !field.is_nested_object_list {
                for item in items {
                    if !item.is_null() {
                        walk(registry, &field.type_ref, item, &field_path, counts);
                    }
                }
            }
        } else if value.is_object() {
            walk(registry, &field.type_ref, value, &field_path, counts);
        }
    }
}

fn join_path(prefix: &str, segment: &str) -> String {
    if prefix.is_empty() {
        segment.to_string()
    } else {
        format!("{prefix}|{segment}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use elasticgraph_schema::ClusterAssignment;
    use elasticgraph_schema::Field;
    use elasticgraph_schema::FieldSource;
    use elasticgraph_schema::IndexDefinition;
    use elasticgraph_schema::SchemaArtifacts;
    use elasticgraph_schema::ScriptIds;
    use elasticgraph_schema::TypeDef;
    use elasticgraph_schema::TypeKind;
    use indexmap::IndexMap as Map;
    use serde_json::json;

    fn list_field(name: &str, element_type: &str, is_nested: bool) -> Field {
        Field {
            name_in_graphql: name.to_string(),
            name_in_index: name.to_string(),
            type_ref: TypeRef::new(element_type),
            is_list: true,
            is_nested_object_list: is_nested,
            source: FieldSource::SelfSourced,
            computation: None,
            relation: None,
        }
    }

    fn registry() -> SchemaRegistry {
        let mut widget_fields = Map::new();
        widget_fields.insert("tags".to_string(), list_field("tags", "String", false));
        widget_fields.insert("components".to_string(), list_field("components", "Component", false));
        widget_fields.insert("reviews".to_string(), list_field("reviews", "Review", true));

        let mut component_fields = Map::new();
        component_fields.insert("part_numbers".to_string(), list_field("part_numbers", "String", false));

        let mut review_fields = Map::new();
        review_fields.insert("comments".to_string(), list_field("comments", "String", false));

        SchemaRegistry::load(SchemaArtifacts {
            types: vec![
                TypeDef {
                    type_ref: TypeRef::new("Widget"),
                    kind: TypeKind::Object,
                    fields: widget_fields,
                    possible_types: vec![],
                    index_names: vec!["widgets".to_string()],
                },
                TypeDef {
                    type_ref: TypeRef::new("Component"),
                    kind: TypeKind::Object,
                    fields: component_fields,
                    possible_types: vec![],
                    index_names: vec![],
                },
                TypeDef {
                    type_ref: TypeRef::new("Review"),
                    kind: TypeKind::Object,
                    fields: review_fields,
                    possible_types: vec![],
                    index_names: vec![],
                },
            ],
            indices: vec![IndexDefinition {
                name: "widgets".to_string(),
                rollover: None,
                routing_field_path: None,
                cluster: ClusterAssignment { query_cluster: "main".into(), index_clusters: vec!["main".into()] },
                ignored_routing_values: Default::default(),
            }],
            derived_types: vec![],
            root_fields: vec![],
            script_ids: ScriptIds { index_data_update: "index_data_update".to_string() },
        })
        .unwrap()
    }

    #[test]
    fn scalar_list_is_counted_on_its_own_path() {
        let record = json!({ "tags": ["a", "b", null] });
        let counts = accumulate(&registry(), &TypeRef::new("Widget"), &record);
        assert_eq!(counts.get("tags"), Some(&2));
    }

    #[test]
    fn object_list_sums_descendant_list_counts() {
        let record = json!({
            "components": [
                { "part_numbers": ["p1", "p2"] },
                { "part_numbers": ["p3"] },
            ]
        });
        let counts = accumulate(&registry(), &TypeRef::new("Widget"), &record);
        assert_eq!(counts.get("components"), Some(&2));
        assert_eq!(counts.get("components|part_numbers"), Some(&3));
    }

    #[test]
    fn nested_object_list_does_not_expose_descendant_counts() {
        let record = json!({
            "reviews": [ { "comments": ["nice", "great"] } ]
        });
        let counts = accumulate(&registry(), &TypeRef::new("Widget"), &record);
        assert_eq!(counts.get("reviews"), Some(&1));
        assert!(!counts.contains_key("reviews|comments"));
    }

    #[test]
    fn absent_list_fields_are_not_counted() {
        let counts = accumulate(&registry(), &TypeRef::new("Widget"), &json!({}));
        assert!(counts.is_empty());
    }
}
