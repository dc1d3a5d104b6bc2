use crate::type_ref::TypeRef;
use serde::Deserialize;
use serde::Serialize;

/// How a derived field's value is combined across the events that update it.
///
/// See glossary: "Derived indexed type" — a type whose index is maintained entirely by scripted
/// updates fired from events of a source type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum_macros::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FieldDerivationKind {
    /// Append-only set: new values are unioned in, never removed.
    AppendOnlySet,
    Min,
    Max,
    /// Set once, from the first event that supplies a value; later events cannot change it.
    Immutable,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDerivation {
    pub name_in_index: String,
    pub source_field_path: Vec<String>,
    pub kind: FieldDerivationKind,
}

/// A derived indexed type: its own index, maintained by scripted updates fired from a different
/// type's events rather than its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedTypeDefinition {
    pub derived_type: TypeRef,
    pub source_type: TypeRef,
    /// Field path (in the source event's prepared record) that resolves to the derived
    /// document's id. May resolve to a list, in which case one operation is produced per unique
    /// id (§4.7 step 3).
    pub id_source: Vec<String>,
    #[serde(default)]
    pub routing_value_source: Option<Vec<String>>,
    #[serde(default)]
    pub rollover_timestamp_value_source: Option<Vec<String>>,
    pub field_derivations: Vec<FieldDerivation>,
}

/// Scripted-operation script ids referenced by the update compiler (§6 "Upstream").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptIds {
    pub index_data_update: String,
}
