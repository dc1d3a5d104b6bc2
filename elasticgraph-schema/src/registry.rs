use crate::derived::DerivedTypeDefinition;
use crate::derived::ScriptIds;
use crate::index::IndexDefinition;
use crate::index::RolloverPolicy;
use crate::type_def::IndexedRootField;
use crate::type_def::TypeDef;
use crate::type_ref::TypeRef;
use elasticgraph_error::GatewayError;
use elasticgraph_error::SingleGatewayError;
use indexmap::IndexMap;
use serde::Deserialize;
use serde::Serialize;
use std::hash::Hash;
use std::hash::Hasher;
use std::sync::Arc;

/// The "schema artifacts" bundle: frozen input produced by schema-definition-DSL compilation and
/// artifact generation, which is out of scope here (§1) — we only ever read it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaArtifacts {
    pub types: Vec<TypeDef>,
    pub indices: Vec<IndexDefinition>,
    #[serde(default)]
    pub derived_types: Vec<DerivedTypeDefinition>,
    pub root_fields: Vec<IndexedRootField>,
    pub script_ids: ScriptIds,
}

#[derive(Debug)]
struct RegistryData {
    types: IndexMap<TypeRef, TypeDef>,
    indices: IndexMap<String, IndexDefinition>,
    /// Keyed by source type, since that's how the indexer looks them up per incoming event.
    derived_types: IndexMap<TypeRef, Vec<DerivedTypeDefinition>>,
    root_fields: IndexMap<String, IndexedRootField>,
    script_ids: ScriptIds,
}

/// Holds type, field, index, and derived-type metadata; answers `field_by(type, name)`,
/// `index_for(type)`, `routing_field_of(index)` in O(1) (§4.8).
///
/// Loaded once from `SchemaArtifacts` and never mutated afterward: process-global and freely
/// shared behind this cheap-to-clone `Arc` handle, the same way `ValidFederationSchema` is
/// shared across a request's whole query-planning lifetime.
#[derive(Debug, Clone)]
pub struct SchemaRegistry(Arc<RegistryData>);

impl PartialEq for SchemaRegistry {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}
impl Eq for SchemaRegistry {}

impl Hash for SchemaRegistry {
    fn hash<H: Hasher>(&self, state: &mut H) {
        Arc::as_ptr(&self.0).hash(state);
    }
}

impl SchemaRegistry {
    pub fn load(artifacts: SchemaArtifacts) -> Result<Self, GatewayError> {
        let mut types = IndexMap::new();
        for type_def in artifacts.types {
            if types.insert(type_def.type_ref.clone(), type_def.clone()).is_some() {
                return Err(SingleGatewayError::Config {
                    message: format!("duplicate type definition: {}", type_def.type_ref),
                }
                .into());
            }
        }

        let mut indices = IndexMap::new();
        for index in artifacts.indices {
            if indices.insert(index.name.clone(), index.clone()).is_some() {
                return Err(SingleGatewayError::Config {
                    message: format!("duplicate index definition: {}", index.name),
                }
                .into());
            }
        }

        for type_def in types.values().filter(|t| t.is_indexed()) {
            if type_def.index_names.is_empty() {
                return Err(SingleGatewayError::Config {
                    message: format!(
                        "indexed type \"{}\" must have at least one index definition",
                        type_def.type_ref
                    ),
                }
                .into());
            }
            for index_name in &type_def.index_names {
                if !indices.contains_key(index_name) {
                    return Err(SingleGatewayError::Config {
                        message: format!(
                            "type \"{}\" references unknown index \"{index_name}\"",
                            type_def.type_ref
                        ),
                    }
                    .into());
                }
            }
            let routing_paths: std::collections::HashSet<_> = type_def
                .index_names
                .iter()
                .filter_map(|name| indices.get(name))
                .map(|index| index.routing_field_path_joined())
                .collect();
            if routing_paths.len() > 1 {
                tracing::warn!(
                    type_name = %type_def.type_ref,
                    "multi-index type has indices with differing routing-field paths; \
                     the query planner will union routing values across them",
                );
            }
        }

        let mut derived_types: IndexMap<TypeRef, Vec<DerivedTypeDefinition>> = IndexMap::new();
        for derived in artifacts.derived_types {
            derived_types
                .entry(derived.source_type.clone())
                .or_default()
                .push(derived);
        }

        let mut root_fields = IndexMap::new();
        for root_field in artifacts.root_fields {
            root_fields.insert(root_field.name_in_graphql.clone(), root_field);
        }

        Ok(Self(Arc::new(RegistryData {
            types,
            indices,
            derived_types,
            root_fields,
            script_ids: artifacts.script_ids,
        })))
    }

    pub fn type_by(&self, type_ref: &TypeRef) -> Result<&TypeDef, GatewayError> {
        self.0.types.get(type_ref).ok_or_else(|| {
            SingleGatewayError::Internal {
                message: format!("schema has no type \"{type_ref}\""),
            }
            .into()
        })
    }

    pub fn field_by(&self, type_ref: &TypeRef, name: &str) -> Result<&crate::field::Field, GatewayError> {
        let type_def = self.type_by(type_ref)?;
        type_def.field(name).ok_or_else(|| {
            SingleGatewayError::Internal {
                message: format!("type \"{type_ref}\" has no field \"{name}\""),
            }
            .into()
        })
    }

    pub fn indexed_type(&self, type_ref: &TypeRef) -> bool {
        self.0
            .types
            .get(type_ref)
            .is_some_and(TypeDef::is_indexed)
    }

    pub fn index_for(&self, type_ref: &TypeRef) -> Result<Vec<&IndexDefinition>, GatewayError> {
        let type_def = self.type_by(type_ref)?;
        type_def
            .index_names
            .iter()
            .map(|name| self.index_by_name(name))
            .collect()
    }

    pub fn index_by_name(&self, name: &str) -> Result<&IndexDefinition, GatewayError> {
        self.0.indices.get(name).ok_or_else(|| {
            SingleGatewayError::Internal {
                message: format!("schema has no index \"{name}\""),
            }
            .into()
        })
    }

    pub fn routing_field_of(&self, index_name: &str) -> Option<String> {
        self.0
            .indices
            .get(index_name)
            .and_then(IndexDefinition::routing_field_path_joined)
    }

    pub fn routing_field_paths_for(&self, indices: &[&str]) -> Vec<String> {
        let mut paths: Vec<String> = indices
            .iter()
            .filter_map(|name| self.routing_field_of(name))
            .collect();
        paths.dedup();
        paths
    }

    pub fn rollover_policy_for(&self, index_name: &str) -> Option<&RolloverPolicy> {
        self.0
            .indices
            .get(index_name)
            .and_then(|index| index.rollover.as_ref())
    }

    pub fn derived_types_for(&self, source_type: &TypeRef) -> &[DerivedTypeDefinition] {
        self.0
            .derived_types
            .get(source_type)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn root_field(&self, name: &str) -> Result<&IndexedRootField, GatewayError> {
        self.0.root_fields.get(name).ok_or_else(|| {
            SingleGatewayError::Internal {
                message: format!("no indexed root field named \"{name}\""),
            }
            .into()
        })
    }

    pub fn script_ids(&self) -> &ScriptIds {
        &self.0.script_ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::Field;
    use crate::field::FieldSource;
    use crate::index::ClusterAssignment;
    use crate::type_def::TypeKind;
    use indexmap::IndexMap as Map;

    fn artifacts_with_one_indexed_type() -> SchemaArtifacts {
        let mut fields = Map::new();
        fields.insert(
            "description".to_string(),
            Field {
                name_in_graphql: "description".to_string(),
                name_in_index: "description_in_es".to_string(),
                type_ref: TypeRef::new("String"),
                is_list: false,
                is_nested_object_list: false,
                source: FieldSource::SelfSourced,
                computation: None,
                relation: None,
            },
        );
        SchemaArtifacts {
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
                routing_field_path: Some(vec!["workspace_id".to_string()]),
                cluster: ClusterAssignment {
                    query_cluster: "main".to_string(),
                    index_clusters: vec!["main".to_string()],
                },
                ignored_routing_values: Default::default(),
            }],
            derived_types: vec![],
            root_fields: vec![],
            script_ids: ScriptIds {
                index_data_update: "index_data_update".to_string(),
            },
        }
    }

    #[test]
    fn field_by_resolves_name_in_index_mapping() {
        let registry = SchemaRegistry::load(artifacts_with_one_indexed_type()).unwrap();
        let field = registry
            .field_by(&TypeRef::new("Widget"), "description")
            .unwrap();
        assert_eq!(field.name_in_index, "description_in_es");
    }

    #[test]
    fn loading_rejects_indexed_type_with_missing_index() {
        let mut artifacts = artifacts_with_one_indexed_type();
        artifacts.indices.clear();
        let result = SchemaRegistry::load(artifacts);
        assert!(result.is_err());
    }

    #[test]
    fn routing_field_of_reads_the_joined_path() {
        let registry = SchemaRegistry::load(artifacts_with_one_indexed_type()).unwrap();
        assert_eq!(
            registry.routing_field_of("widgets"),
            Some("workspace_id".to_string())
        );
    }
}
