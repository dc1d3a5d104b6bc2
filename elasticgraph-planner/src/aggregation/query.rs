//! `AggregationQuery` (§3) and the sub-aggregation wiring rules in §4.3.

use super::computation::Computation;
use super::grouping::Grouping;
use crate::filter::BooleanQuery;
use crate::query::cursor::Cursor;
use indexmap::IndexMap;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub struct Paginator {
    pub desired_page_size: u32,
    pub after: Option<Cursor>,
}

/// A nested aggregation under a `sub_aggregations` selection (§4.1). `nested_path` is the schema
/// path being descended into (empty when the sub-aggregation is on the same nesting level).
#[derive(Debug, Clone, PartialEq)]
pub struct NestedSubAggregation {
    pub nested_path: Option<String>,
    pub query: AggregationQuery,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum GroupingAdapter {
    #[default]
    Composite,
    NonComposite,
}

/// Immutable: name, filter, paginator, groupings, computations, sub-aggregations (§3).
#[derive(Debug, Clone, PartialEq)]
pub struct AggregationQuery {
    pub name: String,
    pub filter: Option<BooleanQuery>,
    pub paginator: Paginator,
    pub groupings: Vec<Grouping>,
    pub computations: Vec<Computation>,
    /// Keyed by nested path (possibly empty string for same-level sub-aggs).
    pub sub_aggregations: IndexMap<String, NestedSubAggregation>,
    pub needs_doc_count: bool,
    pub needs_doc_count_error: bool,
    pub adapter: GroupingAdapter,
}

impl AggregationQuery {
    /// §4.3 edge-case policies: a zero page size or a singleton-cursor pagination state needs no
    /// aggregation body at all — the empty response is synthesized instead of querying.
    pub fn should_emit_aggregation(&self) -> bool {
        if self.paginator.desired_page_size == 0 {
            return false;
        }
        if matches!(self.paginator.after, Some(Cursor::Singleton)) {
            return false;
        }
        true
    }

    /// Whichever grouping adapter applies cannot express a composite aggregation when there are
    /// no groupings at all (composite requires ≥1 `sources` entry) — falls back to non-composite,
    /// which with zero groupings degenerates to a bare `filter`+computations aggregation.
    pub fn effective_adapter(&self) -> GroupingAdapter {
        if self.groupings.is_empty() {
            GroupingAdapter::NonComposite
        } else {
            self.adapter.clone()
        }
    }
}

/// Indented tree rendering for debug logs and test failures, mirroring the teacher's
/// `query_plan::display` — not the wire `aggs` clause.
impl fmt::Display for AggregationQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_indented(f, 0)
    }
}

impl AggregationQuery {
    fn write_indented(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        let pad = "  ".repeat(depth);
        write!(f, "{pad}{} [{:?}]", self.name, self.adapter)?;
        if let Some(filter) = &self.filter {
            write!(f, " filter: {filter}")?;
        }
        if !self.groupings.is_empty() {
            let groupings = self.groupings.iter().map(Grouping::to_string).collect::<Vec<_>>().join(", ");
            write!(f, " by: [{groupings}]")?;
        }
        for computation in &self.computations {
            write!(f, " {}({})", computation.function, computation.computed_index_field_name)?;
        }
        for (path, sub) in &self.sub_aggregations {
            writeln!(f)?;
            write!(f, "{pad}  -> {path}:")?;
            writeln!(f)?;
            sub.query.write_indented(f, depth + 2)?;
        }
        Ok(())
    }
}
