//! Update-target resolution (§4.7 step 3): the self-target plus one per derived type, each with
//! its own `id_source`, `routing_value_source`, and `rollover_timestamp_value_source`.

use elasticgraph_schema::DerivedTypeDefinition;
use elasticgraph_schema::IndexDefinition;
use elasticgraph_schema::RolloverInterval;
use serde_json::Value;

/// One destination this event's prepared record should produce an operation for.
pub enum UpdateTargetKind<'a> {
    /// The event's own type and index — produces the primary upsert.
    Primary,
    /// A derived type fed by this event's type — produces a scripted update.
    Derived(&'a DerivedTypeDefinition),
}

pub struct UpdateTarget<'a> {
    pub kind: UpdateTargetKind<'a>,
    pub index: &'a IndexDefinition,
}

impl<'a> UpdateTarget<'a> {
    fn id_source(&self) -> Vec<String> {
        match self.kind {
            UpdateTargetKind::Primary => vec!["id".to_string()],
            UpdateTargetKind::Derived(definition) => definition.id_source.clone(),
        }
    }

    fn routing_value_source(&self) -> Option<Vec<String>> {
        match self.kind {
            UpdateTargetKind::Primary => self.index.routing_field_path.clone(),
            UpdateTargetKind::Derived(definition) => definition
                .routing_value_source
                .clone()
                .or_else(|| self.index.routing_field_path.clone()),
        }
    }

    fn rollover_timestamp_value_source(&self) -> Option<Vec<String>> {
        let from_index = self
            .index
            .rollover
            .as_ref()
            .map(|policy| vec![policy.timestamp_field_name_in_index.clone()]);
        match self.kind {
            UpdateTargetKind::Primary => from_index,
            UpdateTargetKind::Derived(definition) => {
                definition.rollover_timestamp_value_source.clone().or(from_index)
            }
        }
    }
}

/// One fully-resolved destination for an operation: the ids to emit one operation per (§4.7 step
/// 3: "if `id_source` resolves to a list, emit one operation per unique id"), plus the shared
/// routing value and destination index name.
pub struct ResolvedTarget {
    pub ids: Vec<String>,
    pub routing: Option<String>,
    pub index_name: String,
}

/// Resolve `target` against `prepared_record` (§4.7: "using the *prepared*, not raw, record").
/// Returns `None` if the id source is missing, empty, or whitespace-only (step 3: "skip this
/// target").
pub fn resolve(target: &UpdateTarget<'_>, prepared_record: &Value) -> Option<ResolvedTarget> {
    let id_value = resolve_path(prepared_record, &target.id_source())?;
    let ids = unique_non_blank_ids(&id_value);
    if ids.is_empty() {
        return None;
    }

    let mut routing = target
        .routing_value_source()
        .and_then(|path| resolve_path(prepared_record, &path))
        .and_then(|value| value.as_str().map(str::to_string));
    if let Some(value) = &routing {
        if target.index.ignored_routing_values.contains(value) {
            routing = None;
        }
    }
    // §4.7 step 3: "if the routing value is in the index's ignored-routing-values set, fall back
    // to the id" — and a target with no routing source at all simply has no routing header.
    let routing = routing.or_else(|| {
        if target.routing_value_source().is_some() {
            ids.first().cloned()
        } else {
            None
        }
    });

    let index_name = target
        .rollover_timestamp_value_source()
        .and_then(|path| resolve_path(prepared_record, &path))
        .and_then(|value| value.as_str().map(str::to_string))
        .and_then(|timestamp| target.index.rollover.as_ref().map(|policy| (timestamp, policy)))
        .and_then(|(timestamp, policy)| rollover_index_name(&target.index.name, &timestamp, policy.interval))
        .unwrap_or_else(|| target.index.name.clone());

    Some(ResolvedTarget { ids, routing, index_name })
}

fn resolve_path(record: &Value, path: &[String]) -> Option<Value> {
    let mut current = record.clone();
    for segment in path {
        current = current.get(segment)?.clone();
    }
    Some(current)
}

fn unique_non_blank_ids(value: &Value) -> Vec<String> {
    let candidates: Vec<&Value> = match value {
        Value::Array(items) => items.iter().collect(),
        other => vec![other],
    };
    let mut seen = indexmap::IndexSet::new();
    for candidate in candidates {
        if let Some(s) = candidate.as_str() {
            if !s.trim().is_empty() {
                seen.insert(s.to_string());
            }
        } else if let Some(n) = candidate.as_i64() {
            seen.insert(n.to_string());
        }
    }
    seen.into_iter().collect()
}

fn rollover_index_name(base_name: &str, timestamp: &str, interval: RolloverInterval) -> Option<String> {
    let parsed = time::OffsetDateTime::parse(timestamp, &time::format_description::well_known::Rfc3339).ok()?;
    let date = parsed.date();
    let suffix = match interval {
        RolloverInterval::Yearly => format!("{:04}", date.year()),
        RolloverInterval::Monthly => format!("{:04}-{:02}", date.year(), u8::from(date.month())),
        RolloverInterval::Daily => format!("{:04}-{:02}-{:02}", date.year(), u8::from(date.month()), date.day()),
    };
    Some(format!("{base_name}_rollover__{suffix}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use elasticgraph_schema::ClusterAssignment;
    use elasticgraph_schema::RolloverPolicy;
    use indexmap::IndexSet;
    use serde_json::json;

    fn widgets_index() -> IndexDefinition {
        IndexDefinition {
            name: "widgets".to_string(),
            rollover: Some(RolloverPolicy { interval: RolloverInterval::Yearly, timestamp_field_name_in_index: "created_at".to_string() }),
            routing_field_path: Some(vec!["workspace_id".to_string()]),
            cluster: ClusterAssignment { query_cluster: "main".into(), index_clusters: vec!["main".into()] },
            ignored_routing_values: IndexSet::from(["W1".to_string()]),
        }
    }

    #[test]
    fn primary_target_resolves_rollover_and_routing_fallback() {
        let index = widgets_index();
        let target = UpdateTarget { kind: UpdateTargetKind::Primary, index: &index };
        let record = json!({ "id": "abc", "workspace_id": "W1", "created_at": "1995-04-23T00:23:45Z" });
        let resolved = resolve(&target, &record).unwrap();
        assert_eq!(resolved.ids, vec!["abc".to_string()]);
        assert_eq!(resolved.routing, Some("abc".to_string()));
        assert_eq!(resolved.index_name, "widgets_rollover__1995");
    }

    #[test]
    fn missing_id_source_skips_the_target() {
        let index = widgets_index();
        let target = UpdateTarget { kind: UpdateTargetKind::Primary, index: &index };
        assert!(resolve(&target, &json!({})).is_none());
    }

    #[test]
    fn whitespace_only_id_is_treated_as_missing() {
        let index = widgets_index();
        let target = UpdateTarget { kind: UpdateTargetKind::Primary, index: &index };
        assert!(resolve(&target, &json!({ "id": "   " })).is_none());
    }

    #[test]
    fn list_valued_id_source_produces_one_id_per_unique_value() {
        let mut index = widgets_index();
        index.rollover = None;
        let derived = DerivedTypeDefinition {
            derived_type: elasticgraph_schema::TypeRef::new("WidgetOwner"),
            source_type: elasticgraph_schema::TypeRef::new("Widget"),
            id_source: vec!["owner_ids".to_string()],
            routing_value_source: None,
            rollover_timestamp_value_source: None,
            field_derivations: vec![],
        };
        let target = UpdateTarget { kind: UpdateTargetKind::Derived(&derived), index: &index };
        let record = json!({ "owner_ids": ["a", "b", "a"] });
        let resolved = resolve(&target, &record).unwrap();
        assert_eq!(resolved.ids, vec!["a".to_string(), "b".to_string()]);
    }
}
