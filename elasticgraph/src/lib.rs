//! The top-level gateway facade (§1-§2): wires the Schema Registry (C1), Query Adapter (C2),
//! Filter Compiler (C3), Aggregation Engine (C4), Routing/Index Optimizer (C5), Query Optimizer
//! (C6), Dispatcher (C7) and Update Compiler (C8) into the two entry points an embedding GraphQL
//! server and indexer need: [`GatewayPipeline::plan_query`]/[`GatewayPipeline::execute`] for
//! reads, [`GatewayPipeline::compile_event`] for writes.
//!
//! Modeled on `apollo-federation`'s top-level `Supergraph`/`lib.rs` facade: a small crate that
//! owns no planning logic of its own, only the wiring between crates that do.

pub mod config;
pub mod pipeline;

pub use config::GatewayConfig;
pub use pipeline::GatewayPipeline;
pub use pipeline::PlanQueryInput;
pub use pipeline::PlannedQuery;

pub use elasticgraph_dispatcher as dispatcher;
pub use elasticgraph_error as error;
pub use elasticgraph_indexer as indexer;
pub use elasticgraph_planner as planner;
pub use elasticgraph_schema as schema;
