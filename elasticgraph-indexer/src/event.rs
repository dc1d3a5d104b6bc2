//! `Event` (§3 "Event (indexer input)"): the indexer's input unit.

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

/// The maximum external version a datastore's `version_type: external` comparison accepts.
pub const MAX_VERSION: i64 = (1_i64 << 63) - 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub op: String,
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub version: i64,
    pub record: Value,
    pub json_schema_version: u32,
    #[serde(default)]
    pub latency_timestamps: Option<indexmap::IndexMap<String, String>>,
}

impl Event {
    /// `version` must be in `[1, 2^63-1]` (§3 invariant).
    pub fn has_valid_version(&self) -> bool {
        (1..=MAX_VERSION).contains(&self.version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event(version: i64) -> Event {
        Event {
            op: "upsert".to_string(),
            id: "1".to_string(),
            event_type: "Widget".to_string(),
            version,
            record: json!({}),
            json_schema_version: 1,
            latency_timestamps: None,
        }
    }

    #[test]
    fn version_zero_is_invalid() {
        assert!(!event(0).has_valid_version());
    }

    #[test]
    fn version_one_is_valid() {
        assert!(event(1).has_valid_version());
    }

    #[test]
    fn version_above_the_ceiling_is_invalid() {
        assert!(!event(MAX_VERSION + 1).has_valid_version());
    }
}
