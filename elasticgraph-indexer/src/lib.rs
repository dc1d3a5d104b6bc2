//! The indexer's Update-Target Compiler (component C8, §4.7): turns one incoming `Event` into the
//! primary upsert and zero or more derived-index scripted updates it implies, with list-count
//! accumulation and rollover/routing resolution.
//!
//! Unlike the planning pipeline, this crate's inputs and outputs never cross an await point on
//! their own — dispatching the resulting operations back to the datastore reuses
//! `elasticgraph-dispatcher`'s `DatastoreClient` boundary at the call site, not this crate.

pub mod compiler;
pub mod event;
pub mod list_counts;
pub mod operation;
pub mod response;
pub mod schema_version;
pub mod update_target;

pub use compiler::compile_event;
pub use compiler::EventCompileError;
pub use event::Event;
pub use operation::Operation;
pub use operation::PrimaryUpsert;
pub use operation::ScriptedUpdate;
pub use response::categorize;
pub use response::OperationOutcome;
pub use schema_version::SchemaVersionRegistry;
