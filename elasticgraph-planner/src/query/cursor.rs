//! Opaque pagination cursors (§3, §9 "Cursor opacity").
//!
//! A cursor decodes to an ordered tuple of sort-value atoms. The wire encoding is a base64 blob
//! so callers never depend on its internal shape; a distinguished `SINGLETON` variant represents
//! "the only element of a one-element list" and short-circuits querying entirely (§6).

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use elasticgraph_error::GatewayError;
use elasticgraph_error::SingleGatewayError;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum Cursor {
    SortValues(Vec<Value>),
    Singleton,
}

const SINGLETON_MARKER: &str = "__singleton__";

impl Cursor {
    pub fn encode(&self) -> String {
        match self {
            Cursor::Singleton => SINGLETON_MARKER.to_string(),
            Cursor::SortValues(values) => {
                let json = serde_json::to_vec(values).expect("sort values are always serializable");
                URL_SAFE_NO_PAD.encode(json)
            }
        }
    }

    pub fn decode(encoded: &str) -> Result<Cursor, GatewayError> {
        if encoded == SINGLETON_MARKER {
            return Ok(Cursor::Singleton);
        }
        let bytes = URL_SAFE_NO_PAD.decode(encoded).map_err(|e| SingleGatewayError::InvalidArgumentValue {
            message: format!("cursor is not valid base64: {e}"),
        })?;
        let values: Vec<Value> = serde_json::from_slice(&bytes).map_err(|e| SingleGatewayError::InvalidArgumentValue {
            message: format!("cursor does not decode to a sort-value list: {e}"),
        })?;
        Ok(Cursor::SortValues(values))
    }

    /// A cursor is valid for the current query's groupings/sort keys only when its arity matches
    /// (§4.3: validates that `after` cursor keys equal the grouping keys).
    pub fn matches_key_count(&self, expected: usize) -> bool {
        match self {
            Cursor::Singleton => true,
            Cursor::SortValues(values) => values.len() == expected,
        }
    }

    pub fn sort_values(&self) -> Option<&[Value]> {
        match self {
            Cursor::SortValues(values) => Some(values),
            Cursor::Singleton => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn round_trip_preserves_sort_values() {
        let cursor = Cursor::SortValues(vec![json!("a"), json!(3), json!(null)]);
        let encoded = cursor.encode();
        assert_eq!(Cursor::decode(&encoded).unwrap(), cursor);
    }

    #[test]
    fn singleton_round_trips_through_its_own_marker() {
        let cursor = Cursor::Singleton;
        assert_eq!(Cursor::decode(&cursor.encode()).unwrap(), Cursor::Singleton);
    }

    #[test]
    fn key_count_mismatch_is_detected() {
        let cursor = Cursor::SortValues(vec![json!("a")]);
        assert!(!cursor.matches_key_count(2));
        assert!(cursor.matches_key_count(1));
    }
}
