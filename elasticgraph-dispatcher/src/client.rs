//! The datastore boundary (§6 "Downstream (datastore)"). The actual HTTP transport to
//! Elasticsearch/OpenSearch is an external collaborator (§1); this crate only ever calls through
//! [`DatastoreClient`], mirroring how `apollo-federation` keeps subgraph fetch behind a trait
//! rather than hardcoding a transport.

use async_trait::async_trait;
use elasticgraph_error::GatewayError;
use serde_json::Value;
use std::time::Duration;

/// The `msearch` header line for one query: `{index, routing?}` only (§4.6).
#[derive(Debug, Clone, PartialEq)]
pub struct MsearchHeader {
    pub index: String,
    pub routing: Option<String>,
}

/// One `(header, body)` pair in a multi-search request.
#[derive(Debug, Clone, PartialEq)]
pub struct MsearchRequest {
    pub header: MsearchHeader,
    pub body: Value,
}

/// The result of one `msearch` call against a single cluster: one response per request, in the
/// same order, plus the datastore-reported `took` for server-duration accounting (§5).
#[derive(Debug, Clone)]
pub struct MsearchOutcome {
    pub responses: Vec<Value>,
    pub took_ms: u64,
}

/// A generic multi-search client (§6). Implementations are expected to apply `timeout` as a
/// per-request client-side timeout header to the datastore call, not just a local future timeout.
#[async_trait]
pub trait DatastoreClient: Send + Sync {
    async fn msearch(
        &self,
        cluster: &str,
        requests: Vec<MsearchRequest>,
        timeout: Duration,
    ) -> Result<MsearchOutcome, GatewayError>;
}
