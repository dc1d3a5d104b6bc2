//! The schema registry (component C1): type, field, index and derived-type metadata, loaded
//! once from a frozen "schema artifacts" bundle and answered in O(1) for the lifetime of the
//! process. GraphQL parsing/validation/introspection and the schema-definition DSL that produces
//! the artifacts bundle are external collaborators (§1) — this crate only consumes the result.

pub mod derived;
pub mod field;
pub mod index;
pub mod registry;
pub mod type_def;
pub mod type_ref;

pub use derived::DerivedTypeDefinition;
pub use derived::FieldDerivation;
pub use derived::FieldDerivationKind;
pub use derived::ScriptIds;
pub use field::ComputationDetail;
pub use field::Field;
pub use field::FieldSource;
pub use field::ForeignKeyLocation;
pub use field::FunctionName;
pub use field::RelationDetail;
pub use index::ClusterAssignment;
pub use index::IndexDefinition;
pub use index::RolloverInterval;
pub use index::RolloverPolicy;
pub use registry::SchemaArtifacts;
pub use registry::SchemaRegistry;
pub use type_def::IndexedRootField;
pub use type_def::RootFieldCategory;
pub use type_def::TypeDef;
pub use type_def::TypeKind;
pub use type_ref::TypeRef;
