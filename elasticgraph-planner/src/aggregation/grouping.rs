//! `Grouping` variants (§3): the three ways a bucket key can be computed, each knowing how to
//! render itself for both aggregation adapters (§4.3).

use indexmap::IndexMap;
use serde_json::json;
use serde_json::Value;
use std::fmt;

/// Hints the response-decoding side needs to pull a grouping's value back out of a bucket.
#[derive(Debug, Clone, PartialEq)]
pub struct InnerMeta {
    /// `["key"]` for ordinary terms/histograms, `["key_as_string"]` for date histograms rendered
    /// with a format string.
    pub key_path: Vec<&'static str>,
    /// Fields to copy verbatim from the raw bucket into the decoded bucket, e.g.
    /// `{"doc_count_error_upper_bound": 0}` for date-histogram groupings that don't report one.
    pub merge_into_bucket: IndexMap<String, Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalendarOrFixedInterval {
    Calendar,
    Fixed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DateHistogramDetail {
    pub field: String,
    pub interval: String,
    pub interval_kind: CalendarOrFixedInterval,
    pub time_zone: String,
    /// e.g. `"3d"`; empty when no offset was requested.
    pub offset: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScriptTermDetail {
    pub script_id: String,
    pub params: IndexMap<String, Value>,
}

/// One level of bucket grouping (§3 "Grouping").
#[derive(Debug, Clone, PartialEq)]
pub enum Grouping {
    FieldTerm { name_in_index: String, path: Vec<String> },
    ScriptTerm { path: Vec<String>, detail: ScriptTermDetail },
    DateHistogram { path: Vec<String>, detail: DateHistogramDetail },
}

impl Grouping {
    /// The grouping's key, as the dotted path the GraphQL selection named it with (§3:
    /// "exposes `key()` (path joined by `.`)").
    pub fn key(&self) -> String {
        match self {
            Grouping::FieldTerm { path, .. }
            | Grouping::ScriptTerm { path, .. }
            | Grouping::DateHistogram { path, .. } => path.join("."),
        }
    }

    /// This grouping's `composite` `sources` entry, always with `missing_bucket: true` (§4.3).
    pub fn composite_clause(&self) -> Value {
        let key = self.key();
        match self {
            Grouping::FieldTerm { name_in_index, .. } => json!({
                key: { "terms": { "field": name_in_index, "missing_bucket": true } }
            }),
            Grouping::ScriptTerm { detail, .. } => json!({
                key: {
                    "terms": {
                        "script": { "id": detail.script_id, "params": detail.params },
                        "missing_bucket": true,
                    }
                }
            }),
            Grouping::DateHistogram { detail, .. } => json!({
                key: {
                    "date_histogram": date_histogram_body(detail),
                    "missing_bucket": true,
                }
            }),
        }
    }

    /// This grouping's clause for the non-composite adapter's nested tree (§4.3: date-histogram
    /// groupings form outer layers, term groupings the innermost).
    pub fn non_composite_clause_for(&self, size: u32) -> Value {
        match self {
            Grouping::FieldTerm { name_in_index, .. } => json!({
                "terms": {
                    "field": name_in_index,
                    "size": size,
                    "collect_mode": "depth_first",
                }
            }),
            Grouping::ScriptTerm { detail, .. } => json!({
                "terms": {
                    "script": { "id": detail.script_id, "params": detail.params },
                    "size": size,
                    "collect_mode": "depth_first",
                }
            }),
            Grouping::DateHistogram { detail, .. } => json!({
                "date_histogram": date_histogram_body(detail),
            }),
        }
    }

    /// A sibling `missing` aggregation sharing this grouping's field, used at every level of the
    /// non-composite adapter's nested tree so null-grouped documents still produce a bucket.
    pub fn missing_bucket_clause(&self) -> Option<Value> {
        match self {
            Grouping::FieldTerm { name_in_index, .. } => {
                Some(json!({ "missing": { "field": name_in_index } }))
            }
            Grouping::DateHistogram { detail, .. } => {
                Some(json!({ "missing": { "field": detail.field } }))
            }
            // Script-term groupings have no backing field to test for absence.
            Grouping::ScriptTerm { .. } => None,
        }
    }

    pub fn inner_meta(&self) -> InnerMeta {
        match self {
            Grouping::FieldTerm { .. } | Grouping::ScriptTerm { .. } => InnerMeta {
                key_path: vec!["key"],
                merge_into_bucket: IndexMap::new(),
            },
            Grouping::DateHistogram { .. } => {
                let mut merge = IndexMap::new();
                merge.insert("doc_count_error_upper_bound".to_string(), json!(0));
                InnerMeta {
                    key_path: vec!["key_as_string"],
                    merge_into_bucket: merge,
                }
            }
        }
    }

    pub fn is_date_histogram(&self) -> bool {
        matches!(self, Grouping::DateHistogram { .. })
    }
}

fn date_histogram_body(detail: &DateHistogramDetail) -> Value {
    let interval_key = match detail.interval_kind {
        CalendarOrFixedInterval::Calendar => "calendar_interval",
        CalendarOrFixedInterval::Fixed => "fixed_interval",
    };
    let mut body = serde_json::Map::new();
    body.insert("field".to_string(), json!(detail.field));
    body.insert(interval_key.to_string(), json!(detail.interval));
    body.insert("time_zone".to_string(), json!(detail.time_zone));
    body.insert("format".to_string(), json!("date_time"));
    if !detail.offset.is_empty() {
        body.insert("offset".to_string(), json!(detail.offset));
    }
    Value::Object(body)
}

/// Legible one-line rendering for debug logs and test failures, not the wire clause.
impl fmt::Display for Grouping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Grouping::FieldTerm { name_in_index, .. } => write!(f, "term({name_in_index})"),
            Grouping::ScriptTerm { detail, .. } => write!(f, "script_term({})", detail.script_id),
            Grouping::DateHistogram { detail, .. } => {
                write!(f, "date_histogram({}, {})", detail.field, detail.interval)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_renders_the_grouping_kind_and_key_field() {
        let grouping = Grouping::FieldTerm {
            name_in_index: "color".into(),
            path: vec!["color".into()],
        };
        assert_eq!(grouping.to_string(), "term(color)");
    }

    #[test]
    fn field_term_composite_clause_sets_missing_bucket() {
        let grouping = Grouping::FieldTerm {
            name_in_index: "color".into(),
            path: vec!["color".into()],
        };
        let clause = grouping.composite_clause();
        assert_eq!(clause["color"]["terms"]["missing_bucket"], json!(true));
    }

    #[test]
    fn date_histogram_inner_meta_reads_key_as_string_and_zeroes_doc_count_error() {
        let grouping = Grouping::DateHistogram {
            path: vec!["createdAt".into()],
            detail: DateHistogramDetail {
                field: "created_at".into(),
                interval: "1d".into(),
                interval_kind: CalendarOrFixedInterval::Calendar,
                time_zone: "UTC".into(),
                offset: "3d".into(),
            },
        };
        let meta = grouping.inner_meta();
        assert_eq!(meta.key_path, vec!["key_as_string"]);
        assert_eq!(meta.merge_into_bucket["doc_count_error_upper_bound"], json!(0));
    }

    #[test]
    fn script_term_grouping_has_no_missing_bucket_sibling() {
        let grouping = Grouping::ScriptTerm {
            path: vec!["dayOfWeek".into()],
            detail: ScriptTermDetail {
                script_id: "as_day_of_week".into(),
                params: IndexMap::new(),
            },
        };
        assert!(grouping.missing_bucket_clause().is_none());
    }
}
