use crate::field::Field;
use crate::type_ref::TypeRef;
use indexmap::IndexMap;
use serde::Deserialize;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum_macros::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TypeKind {
    Object,
    Union,
    Interface,
    Scalar,
    Enum,
}

/// Whether, and how, a root field maps onto the search backend.
///
/// §4.1: "For aggregation fields (detected by schema category `indexed_aggregation`)".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum_macros::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RootFieldCategory {
    IndexedCollection,
    IndexedAggregation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeDef {
    pub type_ref: TypeRef,
    pub kind: TypeKind,
    /// Keyed by `name_in_graphql`.
    #[serde(default)]
    pub fields: IndexMap<String, Field>,
    /// For unions/interfaces: the concrete object types that can appear at runtime.
    #[serde(default)]
    pub possible_types: Vec<TypeRef>,
    /// Names of the index definitions backing this type, if it is an indexed type.
    #[serde(default)]
    pub index_names: Vec<String>,
}

impl TypeDef {
    pub fn is_indexed(&self) -> bool {
        !self.index_names.is_empty()
    }

    pub fn is_abstract(&self) -> bool {
        matches!(self.kind, TypeKind::Union | TypeKind::Interface)
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.get(name)
    }

    pub fn fields_with_foreign_source(&self) -> impl Iterator<Item = &Field> {
        self.fields.values().filter(|f| f.sourced_from())
    }

    pub fn has_any_foreign_sourced_field(&self) -> bool {
        self.fields.values().any(|f| f.sourced_from())
    }
}

/// Metadata for a root query field that the planner can turn into a `DatastoreQuery`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedRootField {
    pub name_in_graphql: String,
    pub on_type: TypeRef,
    pub category: RootFieldCategory,
}
