//! `GatewayConfig`: the already-parsed configuration a `GatewayPipeline` is constructed with.
//!
//! Mirrors how `apollo-router`'s plugins receive configuration that has already been parsed from
//! YAML/env by the embedding binary — loading configuration from disk/env is out of scope here
//! (§1) and left entirely to the caller.

use elasticgraph_dispatcher::Clock;
use elasticgraph_dispatcher::DatastoreClient;
use elasticgraph_dispatcher::SystemClock;
use std::sync::Arc;

/// Default time budget given to a query's `monotonic_clock_deadline` when a caller doesn't
/// supply one of its own (§5: "each query carries a `monotonic_clock_deadline`").
pub const DEFAULT_DEADLINE_MS: i64 = 10_000;

/// Default retry budget for scripted updates (§4.7 step 5), re-exported here so embedders can
/// override it in one place alongside the rest of gateway configuration.
pub use elasticgraph_indexer::compiler::DEFAULT_RETRY_ON_CONFLICT;

/// Configuration a `GatewayPipeline` is built from. Constructing this from YAML/env/CLI flags is
/// the embedder's job (§1 "configuration loading ... assumed available"); this struct only holds
/// the already-resolved values the pipeline needs.
pub struct GatewayConfig {
    pub client: Arc<dyn DatastoreClient>,
    pub clock: Arc<dyn Clock>,
    pub default_deadline_ms: i64,
}

impl GatewayConfig {
    pub fn new(client: Arc<dyn DatastoreClient>) -> Self {
        Self {
            client,
            clock: Arc::new(SystemClock),
            default_deadline_ms: DEFAULT_DEADLINE_MS,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_default_deadline_ms(mut self, deadline_ms: i64) -> Self {
        self.default_deadline_ms = deadline_ms;
        self
    }
}
