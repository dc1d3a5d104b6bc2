//! The query-planning half of the gateway pipeline: the Query Adapter (C2), Filter Compiler
//! (C3), Aggregation Engine (C4), Routing/Index Optimizer (C5) and Query Optimizer (C6).
//!
//! Modeled on `apollo-federation`'s crate shape — a pure, single-threaded planning layer that
//! hands an immutable value (here, `DatastoreQuery`) down to the next stage (the dispatcher)
//! rather than executing anything itself. As in that crate, every component here builds a tree
//! once per request and never mutates it afterward.

pub mod aggregation;
pub mod filter;
pub mod optimizer;
pub mod query;
pub mod routing;
pub mod value_set;

pub use optimizer::partition_and_merge;
pub use optimizer::split_merged_response;
pub use optimizer::unmerge_responses;
pub use optimizer::MergeGroup;
pub use query::build_datastore_query;
pub use query::DatastoreQuery;
pub use query::DatastoreQueryStats;
pub use query::Lookahead;
pub use query::QueryAdapterInput;
pub use query::QueryAdapterOptions;
pub use query::StaticLookahead;
