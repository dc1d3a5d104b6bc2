use crate::type_ref::TypeRef;
use serde::Deserialize;
use serde::Serialize;

/// The numeric function an `*AggregatedValues` field computes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum_macros::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FunctionName {
    Sum,
    Avg,
    Min,
    Max,
    Cardinality,
}

/// Schema-declared detail for a numeric aggregated-value field: which function to apply to which
/// source field, and what an empty bucket should report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComputationDetail {
    pub source_field_path: Vec<String>,
    pub function: FunctionName,
    /// What to report for a bucket with zero matching documents, e.g. `0` for `sum`, `null` for
    /// `min`/`max`.
    pub empty_bucket_value: serde_json::Value,
}

/// Whether a field's value is populated directly from the type's own events, or copied over
/// (via a separate update) from a related entity.
///
/// See the glossary entries "Self-sourced vs foreign-sourced field" and "Derived indexed type".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldSource {
    #[serde(rename = "self")]
    SelfSourced,
    Foreign { source_type: TypeRef },
}

impl Default for FieldSource {
    fn default() -> Self {
        FieldSource::SelfSourced
    }
}

/// A field belonging to a schema type.
///
/// Owned by its parent type; its lifetime is the schema's lifetime (the registry is loaded once
/// and never mutated, so fields are shared by reference — or behind the registry's `Arc` — across
/// every request, never cloned per-request).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name_in_graphql: String,
    pub name_in_index: String,
    pub type_ref: TypeRef,
    /// Whether the GraphQL type is a list of `type_ref` rather than a single value — drives
    /// `any_satisfy`/`count` filter dispatch (§4.2) and list-count accumulation (§4.7).
    #[serde(default)]
    pub is_list: bool,
    /// For `is_list` fields whose `type_ref` is an object type: whether the list is mapped as an
    /// Elasticsearch `nested` type (own count only) rather than a flattened object list (count
    /// includes every list-valued descendant's count too). Meaningless for scalar lists. Defaults
    /// to `true` because flattening a list of objects loses the per-element correlation between
    /// sibling fields, so nested is the safe default mapping (§4.7 "list-count accumulation").
    #[serde(default = "default_is_nested_object_list")]
    pub is_nested_object_list: bool,
    #[serde(default)]
    pub source: FieldSource,
    #[serde(default)]
    pub computation: Option<ComputationDetail>,
    /// For relation fields: which side of the relation carries the foreign key.
    #[serde(default)]
    pub relation: Option<RelationDetail>,
}

fn default_is_nested_object_list() -> bool {
    true
}

impl Field {
    pub fn sourced_from(&self) -> bool {
        !matches!(self.source, FieldSource::SelfSourced)
    }
}

/// Detail needed by the query adapter to know which extra fields a relation traversal requires
/// (see §4.1: "For relation traversals...").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationDetail {
    pub related_type: TypeRef,
    pub foreign_key_location: ForeignKeyLocation,
    pub self_referential: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForeignKeyLocation {
    Parent,
    Child,
}
