//! Response classification (§4.6): translate datastore-level failures into the gateway's error
//! taxonomy, and log (rather than raise) shard failures on otherwise-successful responses.

use elasticgraph_error::GatewayError;
use elasticgraph_error::SingleGatewayError;
use serde_json::Value;

const TOO_MANY_BUCKETS_EXCEPTION: &str = "too_many_buckets_exception";

/// Inspect one `msearch` response item and either accept it (possibly after logging a shard
/// failure) or turn it into a `GatewayError`.
pub fn classify_response(cluster: &str, response: &Value) -> Result<(), GatewayError> {
    let Some(error) = response.get("error") else {
        warn_on_shard_failures(cluster, response);
        return Ok(());
    };

    let error_type = error.get("type").and_then(Value::as_str).unwrap_or("unknown");
    let reason = error
        .get("reason")
        .and_then(Value::as_str)
        .unwrap_or("the datastore did not provide a reason")
        .to_string();

    if error_type == TOO_MANY_BUCKETS_EXCEPTION {
        let max_buckets = error.get("max_buckets").and_then(Value::as_u64).unwrap_or(0);
        return Err(SingleGatewayError::TooManyBuckets { max_buckets, message: reason }.into());
    }

    // Stripped down to type + reason only; the request body that produced this is never
    // included here, so no record field values can leak through this path (§7).
    Err(SingleGatewayError::SearchFailed { message: format!("cluster \"{cluster}\": {error_type}: {reason}") }.into())
}

fn warn_on_shard_failures(cluster: &str, response: &Value) {
    let failed = response.pointer("/_shards/failed").and_then(Value::as_u64).unwrap_or(0);
    if failed > 0 {
        tracing::warn!(cluster, failed_shards = failed, "datastore reported shard failures on an otherwise successful response");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn plain_success_response_passes() {
        assert!(classify_response("main", &json!({ "hits": { "hits": [] } })).is_ok());
    }

    #[test]
    fn too_many_buckets_is_translated() {
        let response = json!({
            "error": { "type": "too_many_buckets_exception", "reason": "too many", "max_buckets": 10_000 }
        });
        let err = classify_response("main", &response).unwrap_err();
        assert!(err.is_graphql_execution_error());
    }

    #[test]
    fn other_errors_become_search_failed() {
        let response = json!({ "error": { "type": "some_other_exception", "reason": "boom" } });
        let err = classify_response("main", &response).unwrap_err();
        assert!(!err.is_graphql_execution_error());
    }

    #[test]
    fn shard_failures_on_success_do_not_error() {
        let response = json!({ "_shards": { "total": 3, "failed": 1 }, "hits": { "hits": [] } });
        assert!(classify_response("main", &response).is_ok());
    }
}
