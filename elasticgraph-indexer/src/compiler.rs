//! The per-event compilation pipeline (§4.7): schema version resolution, validation, and
//! update-target resolution, producing the primary upsert plus zero or more scripted updates.

use crate::event::Event;
use crate::list_counts;
use crate::operation::Operation;
use crate::operation::PrimaryUpsert;
use crate::operation::ScriptedUpdate;
use crate::schema_version::validate;
use crate::schema_version::SchemaVersionRegistry;
use crate::update_target::resolve;
use crate::update_target::UpdateTarget;
use crate::update_target::UpdateTargetKind;
use elasticgraph_error::FailedEventError;
use elasticgraph_schema::SchemaRegistry;
use elasticgraph_schema::TypeRef;
use indexmap::IndexMap;
use serde_json::Value;

/// Default retry budget for scripted updates, in the absence of any schema-level override.
pub const DEFAULT_RETRY_ON_CONFLICT: u32 = 5;

pub type EventCompileError = FailedEventError<Event, Operation>;

/// Compile one event into the operations it produces (§4.7 steps 1-6).
pub fn compile_event(
    registry: &SchemaRegistry,
    schema_versions: &SchemaVersionRegistry,
    event: &Event,
) -> Result<Vec<Operation>, EventCompileError> {
    let type_ref = TypeRef::new(event.event_type.clone());

    if !event.has_valid_version() {
        return Err(fail(event, vec![], "version is outside the valid external-version range".to_string()));
    }

    // The indexer's own input is already index-shaped (name_in_index keys); the raw-vs-prepared
    // distinction (§4.7) only matters once relation-sourced fields are folded in, which happens
    // upstream of this crate (§1: schema artifact generation is a frozen external input).
    let prepared_record = &event.record;

    let operations = build_operations(registry, event, &type_ref, prepared_record);

    let Some(resolved_version) = schema_versions.resolve_version(&type_ref, event.json_schema_version) else {
        return Err(fail(event, operations, format!("no JSON schema is registered for type \"{type_ref}\"")));
    };
    if !resolved_version.was_exact {
        tracing::warn!(
            event_type = %type_ref,
            requested = event.json_schema_version,
            resolved = resolved_version.version,
            "event requested a JSON schema version with no exact match; using the closest available version",
        );
    }

    let Some(validator) = schema_versions.validator(&type_ref, resolved_version.version) else {
        return Err(fail(event, operations, format!("no compiled validator for type \"{type_ref}\" version {}", resolved_version.version)));
    };
    if let Err(message) = validate(validator, prepared_record) {
        return Err(fail(event, operations, sanitize(&message)));
    }

    Ok(operations)
}

fn build_operations(registry: &SchemaRegistry, event: &Event, type_ref: &TypeRef, prepared_record: &Value) -> Vec<Operation> {
    let list_counts = list_counts::accumulate(registry, type_ref, prepared_record);
    let mut operations = Vec::new();

    if let Ok(indices) = registry.index_for(type_ref) {
        for index in indices {
            let target = UpdateTarget { kind: UpdateTargetKind::Primary, index };
            let Some(resolved) = resolve(&target, prepared_record) else { continue };
            for id in &resolved.ids {
                operations.push(Operation::PrimaryUpsert(PrimaryUpsert {
                    id: id.clone(),
                    index_name: resolved.index_name.clone(),
                    routing: resolved.routing.clone(),
                    version: event.version,
                    prepared_record: prepared_record.clone(),
                    list_counts: list_counts.clone(),
                }));
            }
        }
    }

    for derived in registry.derived_types_for(type_ref) {
        let Ok(indices) = registry.index_for(&derived.derived_type) else { continue };
        for index in indices {
            let target = UpdateTarget { kind: UpdateTargetKind::Derived(derived), index };
            let Some(resolved) = resolve(&target, prepared_record) else { continue };
            for id in &resolved.ids {
                let mut metadata_params = IndexMap::new();
                metadata_params.insert("version".to_string(), Value::from(event.version));
                operations.push(Operation::ScriptedUpdate(ScriptedUpdate {
                    id: id.clone(),
                    index_name: resolved.index_name.clone(),
                    routing: resolved.routing.clone(),
                    retry_on_conflict: DEFAULT_RETRY_ON_CONFLICT,
                    script_id: registry.script_ids().index_data_update.clone(),
                    data: prepared_record.clone(),
                    metadata_params,
                    list_counts: list_counts.clone(),
                }));
            }
        }
    }

    operations
}

fn fail(event: &Event, best_effort_operations: Vec<Operation>, sanitized_message: String) -> EventCompileError {
    FailedEventError {
        event: event.clone(),
        event_id: event.id.clone(),
        event_type: event.event_type.clone(),
        best_effort_operations,
        sanitized_message,
    }
}

/// Strip anything that looks like it could echo a record field value out of a JSON-schema
/// validator's message, keeping only the field-path-and-type-name shape (§7: "never includes
/// record field values").
fn sanitize(message: &str) -> String {
    message
        .split_whitespace()
        .filter(|token| !token.starts_with('\'') && !token.starts_with('"'))
        .collect::<Vec<_>>()
        .join(" ")
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

    fn event(record: Value) -> Event {
        Event {
            op: "upsert".to_string(),
            id: "e1".to_string(),
            event_type: "Widget".to_string(),
            version: 1,
            record,
            json_schema_version: 1,
            latency_timestamps: None,
        }
    }

    fn registry() -> SchemaRegistry {
        let mut fields = Map::new();
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
        SchemaRegistry::load(SchemaArtifacts {
            types: vec![TypeDef {
                type_ref: TypeRef::new("Widget"),
                kind: TypeKind::Object,
                fields,
                possible_types: vec![],
                index_names: vec!["widgets".to_string()],
            }],
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

    fn schema_versions() -> SchemaVersionRegistry {
        let mut by_type = IndexMap::new();
        let mut versions = IndexMap::new();
        let validator = jsonschema::validator_for(&json!({
            "type": "object",
            "required": ["id"],
        }))
        .unwrap();
        versions.insert(1, validator);
        by_type.insert(TypeRef::new("Widget"), crate::schema_version::TypeSchemaVersions::new(versions));
        SchemaVersionRegistry::new(by_type)
    }

    #[test]
    fn valid_event_produces_a_primary_upsert() {
        let ops = compile_event(&registry(), &schema_versions(), &event(json!({ "id": "w1" }))).unwrap();
        assert_eq!(ops.len(), 1);
        assert!(matches!(ops[0], Operation::PrimaryUpsert(_)));
    }

    #[test]
    fn invalid_record_fails_with_best_effort_operations_attached() {
        let err = compile_event(&registry(), &schema_versions(), &event(json!({}))).unwrap_err();
        assert_eq!(err.event_id, "e1");
        assert!(!err.sanitized_message.is_empty());
    }

    #[test]
    fn invalid_version_fails_before_validation() {
        let mut bad = event(json!({ "id": "w1" }));
        bad.version = 0;
        let err = compile_event(&registry(), &schema_versions(), &bad).unwrap_err();
        assert!(err.best_effort_operations.is_empty());
    }
}
