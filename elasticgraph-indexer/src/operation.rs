//! Update operation payloads (§3 "Update operation", §4.7 steps 4-5): primary upserts and
//! scripted updates, each as a `(header, body)` pair matching the datastore bulk API shape the
//! dispatcher's `msearch` wire format mirrors (§6).

use indexmap::IndexMap;
use serde_json::json;
use serde_json::Value;

pub const COUNTS_FIELD: &str = "__counts";

/// A compare-and-swap upsert of the primary (self-sourced) document for an event's type.
#[derive(Debug, Clone)]
pub struct PrimaryUpsert {
    pub id: String,
    pub index_name: String,
    pub routing: Option<String>,
    pub version: i64,
    pub prepared_record: Value,
    pub list_counts: IndexMap<String, u64>,
}

/// A scripted update against a derived-type document, carrying the data needed to merge this
/// event's contribution without clobbering concurrent updates from other source events.
#[derive(Debug, Clone)]
pub struct ScriptedUpdate {
    pub id: String,
    pub index_name: String,
    pub routing: Option<String>,
    pub retry_on_conflict: u32,
    pub script_id: String,
    pub data: Value,
    pub metadata_params: IndexMap<String, Value>,
    pub list_counts: IndexMap<String, u64>,
}

#[derive(Debug, Clone)]
pub enum Operation {
    PrimaryUpsert(PrimaryUpsert),
    ScriptedUpdate(ScriptedUpdate),
}

impl Operation {
    pub fn destination_index(&self) -> &str {
        match self {
            Operation::PrimaryUpsert(op) => &op.index_name,
            Operation::ScriptedUpdate(op) => &op.index_name,
        }
    }

    /// The bulk API `(header, body)` pair for this operation.
    pub fn to_bulk_pair(&self) -> (Value, Value) {
        match self {
            Operation::PrimaryUpsert(op) => {
                let mut header = json!({
                    "_id": op.id,
                    "_index": op.index_name,
                    "version": op.version,
                    "version_type": "external",
                });
                if let Some(routing) = &op.routing {
                    header["routing"] = json!(routing);
                }
                let mut body = op.prepared_record.clone();
                if !op.list_counts.is_empty() {
                    if let Some(object) = body.as_object_mut() {
                        object.insert(COUNTS_FIELD.to_string(), counts_to_json(&op.list_counts));
                    }
                }
                (header, body)
            }
            Operation::ScriptedUpdate(op) => {
                let mut header = json!({
                    "_id": op.id,
                    "_index": op.index_name,
                    "retry_on_conflict": op.retry_on_conflict,
                });
                if let Some(routing) = &op.routing {
                    header["routing"] = json!(routing);
                }

                let mut params = serde_json::Map::new();
                params.insert("data".to_string(), op.data.clone());
                params.insert("id".to_string(), json!(op.id));
                for (key, value) in &op.metadata_params {
                    params.insert(key.clone(), value.clone());
                }
                if !op.list_counts.is_empty() {
                    params.insert(COUNTS_FIELD.to_string(), counts_to_json(&op.list_counts));
                }

                let body = json!({
                    "script": { "id": op.script_id, "params": Value::Object(params) },
                    "scripted_upsert": true,
                    "upsert": {},
                });
                (header, body)
            }
        }
    }
}

fn counts_to_json(counts: &IndexMap<String, u64>) -> Value {
    Value::Object(counts.iter().map(|(path, count)| (path.clone(), json!(count))).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primary_upsert_header_matches_the_documented_shape() {
        let op = Operation::PrimaryUpsert(PrimaryUpsert {
            id: "1".to_string(),
            index_name: "widgets".to_string(),
            routing: Some("w1".to_string()),
            version: 4,
            prepared_record: json!({ "name": "Widget" }),
            list_counts: IndexMap::new(),
        });
        let (header, body) = op.to_bulk_pair();
        assert_eq!(header, json!({ "_id": "1", "_index": "widgets", "routing": "w1", "version": 4, "version_type": "external" }));
        assert_eq!(body, json!({ "name": "Widget" }));
    }

    #[test]
    fn primary_upsert_embeds_list_counts_when_present() {
        let mut counts = IndexMap::new();
        counts.insert("tags".to_string(), 3u64);
        let op = Operation::PrimaryUpsert(PrimaryUpsert {
            id: "1".to_string(),
            index_name: "widgets".to_string(),
            routing: None,
            version: 1,
            prepared_record: json!({ "name": "Widget" }),
            list_counts: counts,
        });
        let (_, body) = op.to_bulk_pair();
        assert_eq!(body["__counts"]["tags"], json!(3));
    }

    #[test]
    fn scripted_update_body_matches_the_documented_shape() {
        let op = Operation::ScriptedUpdate(ScriptedUpdate {
            id: "1".to_string(),
            index_name: "widget_owners".to_string(),
            routing: None,
            retry_on_conflict: 5,
            script_id: "index_data_update".to_string(),
            data: json!({ "owner_name": "Alice" }),
            metadata_params: IndexMap::new(),
            list_counts: IndexMap::new(),
        });
        let (header, body) = op.to_bulk_pair();
        assert_eq!(header["retry_on_conflict"], json!(5));
        assert_eq!(body["script"]["id"], json!("index_data_update"));
        assert_eq!(body["script"]["params"]["data"], json!({ "owner_name": "Alice" }));
        assert_eq!(body["scripted_upsert"], json!(true));
    }
}
