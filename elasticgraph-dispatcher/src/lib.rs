//! The Dispatcher (component C7, §4.6): the one place in the pipeline that talks to the
//! datastore. Groups datastore-equivalent queries via the Query Optimizer, fans one multi-search
//! request out per cluster, enforces a client-side deadline, classifies failures, and folds
//! responses back into per-original-query order.
//!
//! Modeled on `apollo-federation`'s boundary between planning and execution: this crate never
//! builds a query, it only ever dispatches one ([`elasticgraph_planner::DatastoreQuery`]) that
//! was handed to it already complete.

pub mod classify;
pub mod client;
pub mod clock;

pub use client::DatastoreClient;
pub use client::MsearchHeader;
pub use client::MsearchOutcome;
pub use client::MsearchRequest;
pub use clock::Clock;
pub use clock::SystemClock;

use elasticgraph_error::GatewayError;
use elasticgraph_error::MultipleGatewayErrors;
use elasticgraph_error::SingleGatewayError;
use elasticgraph_planner::partition_and_merge;
use elasticgraph_planner::unmerge_responses;
use elasticgraph_planner::DatastoreQuery;
use elasticgraph_planner::MergeGroup;
use indexmap::IndexMap;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use std::time::Instant;

/// The outcome of dispatching a batch of queries: per-original-query responses plus the timing
/// the spec asks components to record (§5: "record client duration ... and server duration").
pub struct DispatchOutcome {
    pub responses: BTreeMap<usize, Value>,
    pub client_duration: Duration,
    pub max_server_duration: Duration,
}

/// Dispatch `queries` to `client`, merging datastore-equivalent queries first (C6) and splitting
/// their responses back apart afterward. `queries` may be empty, in which case this is a no-op.
pub async fn dispatch(
    client: &dyn DatastoreClient,
    clock: &dyn Clock,
    queries: Vec<DatastoreQuery>,
) -> Result<DispatchOutcome, GatewayError> {
    let total_original = queries.len();
    if total_original == 0 {
        return Ok(DispatchOutcome {
            responses: BTreeMap::new(),
            client_duration: Duration::ZERO,
            max_server_duration: Duration::ZERO,
        });
    }

    let deadline = queries
        .iter()
        .map(|q| q.monotonic_clock_deadline)
        .min()
        .expect("non-empty, checked above");
    let now = clock.now_millis();
    if now >= deadline {
        return Err(SingleGatewayError::RequestExceededDeadline { overrun_ms: now - deadline }.into());
    }
    let per_request_timeout = Duration::from_millis((deadline - now) as u64);

    let groups = partition_and_merge(queries);
    let by_cluster = group_by_cluster(&groups);

    let started = Instant::now();
    let cluster_futures = by_cluster.into_iter().map(|(cluster_name, group_indices)| {
        let requests = build_requests(&groups, &group_indices);
        async move {
            let call = client.msearch(&cluster_name, requests, per_request_timeout);
            let result = tokio::time::timeout(per_request_timeout, call).await;
            (cluster_name, group_indices, result)
        }
    });
    let cluster_results = futures::future::join_all(cluster_futures).await;
    let client_duration = started.elapsed();

    let mut errors = MultipleGatewayErrors::new();
    let mut by_group_index: Vec<Option<Value>> = vec![None; groups.len()];
    let mut max_server_duration = Duration::ZERO;

    for (cluster_name, group_indices, result) in cluster_results {
        let outcome = match result {
            Err(_elapsed) => {
                let overrun_ms = clock.now_millis() - deadline;
                errors.push(SingleGatewayError::RequestExceededDeadline { overrun_ms }.into());
                continue;
            }
            Ok(Err(error)) => {
                errors.push(error);
                continue;
            }
            Ok(Ok(outcome)) => outcome,
        };

        max_server_duration = max_server_duration.max(Duration::from_millis(outcome.took_ms));

        if outcome.responses.len() != group_indices.len() {
            errors.push(
                SingleGatewayError::SearchFailed {
                    message: format!(
                        "cluster \"{cluster_name}\" returned {} responses for {} requests",
                        outcome.responses.len(),
                        group_indices.len()
                    ),
                }
                .into(),
            );
            continue;
        }

        for (group_index, response) in group_indices.into_iter().zip(outcome.responses) {
            if let Err(error) = classify::classify_response(&cluster_name, &response) {
                errors.push(error);
                continue;
            }
            by_group_index[group_index] = Some(response);
        }
    }

    errors.clone().into_result()?;

    let merged_responses: Vec<Value> = by_group_index
        .into_iter()
        .enumerate()
        .map(|(index, response)| {
            response.ok_or_else(|| GatewayError::from(SingleGatewayError::MissingOriginalQueryAfterSplit {
                query_shape: format!("merge group at index {index}"),
            }))
        })
        .collect::<Result<_, _>>()?;

    let responses = unmerge_responses(&groups, &merged_responses, total_original)?;

    Ok(DispatchOutcome { responses, client_duration, max_server_duration })
}

fn group_by_cluster(groups: &[MergeGroup]) -> IndexMap<String, Vec<usize>> {
    let mut by_cluster: IndexMap<String, Vec<usize>> = IndexMap::new();
    for (index, group) in groups.iter().enumerate() {
        by_cluster
            .entry(group.merged_query.cluster_name.clone())
            .or_default()
            .push(index);
    }
    by_cluster
}

fn build_requests(groups: &[MergeGroup], group_indices: &[usize]) -> Vec<MsearchRequest> {
    group_indices
        .iter()
        .map(|&index| {
            let query = &groups[index].merged_query;
            MsearchRequest {
                header: MsearchHeader {
                    index: query.search_index_definitions.join(","),
                    routing: query.routing_values.as_ref().map(|values| values.join(",")),
                },
                body: query.search_body().clone(),
            }
        })
        .collect()
}
