//! The Routing / Index Optimizer (component C5, §4.4).

pub mod optimizer;
pub mod value_set_extractor;

pub use optimizer::is_bypass;
pub use optimizer::resolve_index_expression;
pub use optimizer::resolve_routing;
pub use optimizer::IndexExpressionDecision;
pub use optimizer::RolloverIndex;
pub use optimizer::RoutingDecision;
pub use value_set_extractor::extract_rollover_time_set;
pub use value_set_extractor::extract_routing_value_set;
