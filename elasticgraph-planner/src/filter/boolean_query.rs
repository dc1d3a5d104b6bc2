//! The boolean-query tree that the filter compiler (C3) produces (§3 "Boolean query node").
//!
//! Invariants upheld by construction, never by a caller after the fact:
//! - a `should` clause with no `must`/`filter` sibling implicitly requires one match, so we
//!   always set `minimum_should_match = Some(1)` whenever `should` is non-empty;
//! - `filter: [MatchNone]` is the canonical always-false filter.

use serde_json::json;
use serde_json::Value;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Copy)]
pub enum Occurrence {
    Must,
    Filter,
    Should,
    MustNot,
}

/// One side of a coalesced range clause (§4.2: "Range operators on the same field coalesce").
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RangeBounds {
    pub gt: Option<Value>,
    pub gte: Option<Value>,
    pub lt: Option<Value>,
    pub lte: Option<Value>,
}

impl RangeBounds {
    pub fn is_empty(&self) -> bool {
        self.gt.is_none() && self.gte.is_none() && self.lt.is_none() && self.lte.is_none()
    }

    /// Deep-merge another bound's constraints into this one. A later, tighter bound on the same
    /// side simply overwrites — callers that need the tightest-of-both semantics compute that
    /// before merging, since the wire format allows only one value per side.
    pub fn merge(&mut self, other: RangeBounds) {
        if other.gt.is_some() {
            self.gt = other.gt;
        }
        if other.gte.is_some() {
            self.gte = other.gte;
        }
        if other.lt.is_some() {
            self.lt = other.lt;
        }
        if other.lte.is_some() {
            self.lte = other.lte;
        }
    }

    fn to_json(&self) -> Value {
        let mut map = serde_json::Map::new();
        if let Some(v) = &self.gt {
            map.insert("gt".to_string(), v.clone());
        }
        if let Some(v) = &self.gte {
            map.insert("gte".to_string(), v.clone());
        }
        if let Some(v) = &self.lt {
            map.insert("lt".to_string(), v.clone());
        }
        if let Some(v) = &self.lte {
            map.insert("lte".to_string(), v.clone());
        }
        Value::Object(map)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Clause {
    Term { field: String, value: Value },
    Terms { field: String, values: Vec<Value> },
    Range { field: String, bounds: RangeBounds },
    Exists { field: String },
    /// The `matches` leaf operator: phrase match against an analyzed text field.
    Matches { field: String, value: Value },
    /// The `contains` leaf operator: substring match against an analyzed text field.
    Contains { field: String, value: Value },
    Nested { path: String, query: Box<BooleanQuery> },
    Bool(Box<BooleanQuery>),
    /// The always-false filter (§3 invariant: `filter: [match_none]`).
    MatchNone,
}

impl Clause {
    pub fn to_json(&self) -> Value {
        match self {
            Clause::Term { field, value } => json!({ "term": { field.clone(): value } }),
            Clause::Terms { field, values } => json!({ "terms": { field.clone(): values } }),
            Clause::Range { field, bounds } => {
                json!({ "range": { field.clone(): bounds.to_json() } })
            }
            Clause::Exists { field } => json!({ "exists": { "field": field } }),
            Clause::Matches { field, value } => json!({ "match": { field.clone(): value } }),
            Clause::Contains { field, value } => json!({ "match_phrase": { field.clone(): value } }),
            Clause::Nested { path, query } => {
                json!({ "nested": { "path": path, "query": query.to_json() } })
            }
            Clause::Bool(inner) => inner.to_json(),
            Clause::MatchNone => json!({ "match_none": {} }),
        }
    }

    /// The field path this clause constrains, when it constrains exactly one (used by range
    /// coalescing and the `FilterValueSetExtractor`).
    pub fn field_path(&self) -> Option<&str> {
        match self {
            Clause::Term { field, .. }
            | Clause::Terms { field, .. }
            | Clause::Range { field, .. }
            | Clause::Matches { field, .. }
            | Clause::Contains { field, .. }
            | Clause::Exists { field } => Some(field),
            _ => None,
        }
    }
}

/// A mapping from occurrence to a list of leaf clauses, plus an optional `minimum_should_match`
/// (§3 "Boolean query node").
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BooleanQuery {
    pub must: Vec<Clause>,
    pub filter: Vec<Clause>,
    pub should: Vec<Clause>,
    pub must_not: Vec<Clause>,
    pub minimum_should_match: Option<u32>,
}

impl BooleanQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.must.is_empty()
            && self.filter.is_empty()
            && self.should.is_empty()
            && self.must_not.is_empty()
    }

    pub fn always_false() -> Self {
        Self {
            filter: vec![Clause::MatchNone],
            ..Default::default()
        }
    }

    pub fn is_always_false(&self) -> bool {
        self.filter.len() == 1
            && matches!(self.filter[0], Clause::MatchNone)
            && self.must.is_empty()
            && self.should.is_empty()
            && self.must_not.is_empty()
    }

    pub fn push(&mut self, occurrence: Occurrence, clause: Clause) {
        match occurrence {
            Occurrence::Must => self.must.push(clause),
            Occurrence::Filter => self.filter.push(clause),
            Occurrence::Should => self.should.push(clause),
            Occurrence::MustNot => self.must_not.push(clause),
        }
        self.reconcile_minimum_should_match();
    }

    pub fn extend(&mut self, occurrence: Occurrence, clauses: impl IntoIterator<Item = Clause>) {
        match occurrence {
            Occurrence::Must => self.must.extend(clauses),
            Occurrence::Filter => self.filter.extend(clauses),
            Occurrence::Should => self.should.extend(clauses),
            Occurrence::MustNot => self.must_not.extend(clauses),
        }
        self.reconcile_minimum_should_match();
    }

    /// §3 invariant: "we always set `minimum_should_match=1` explicitly when any `should` is
    /// present".
    fn reconcile_minimum_should_match(&mut self) {
        self.minimum_should_match = if self.should.is_empty() { None } else { Some(1) };
    }

    /// Merge a newly-derived range bound for `field` into any existing range clause on that
    /// field, preserving `any_satisfy` correctness on list fields (§4.2).
    pub fn merge_range(&mut self, occurrence: Occurrence, field: &str, bounds: RangeBounds) {
        let clauses = match occurrence {
            Occurrence::Must => &mut self.must,
            Occurrence::Filter => &mut self.filter,
            Occurrence::Should => &mut self.should,
            Occurrence::MustNot => &mut self.must_not,
        };
        if let Some(Clause::Range {
            bounds: existing, ..
        }) = clauses.iter_mut().find(
            |c| matches!(c, Clause::Range { field: f, .. } if f == field),
        ) {
            existing.merge(bounds);
        } else {
            clauses.push(Clause::Range {
                field: field.to_string(),
                bounds,
            });
        }
        self.reconcile_minimum_should_match();
    }

    /// The number of clauses that *must* match for a document to pass: every `must`/`filter`
    /// clause counts as one, and `should` clauses beyond `minimum_should_match` do not (§4.2:
    /// the `any_satisfy`-on-scalar-list rejection rule counts exactly this).
    pub fn required_matching_clause_count(&self) -> usize {
        let should_required = self.minimum_should_match.unwrap_or(0) as usize;
        self.must.len() + self.filter.len() + should_required.min(self.should.len())
    }

    pub fn to_json(&self) -> Value {
        let mut inner = serde_json::Map::new();
        if !self.must.is_empty() {
            inner.insert(
                "must".to_string(),
                Value::Array(self.must.iter().map(Clause::to_json).collect()),
            );
        }
        if !self.filter.is_empty() {
            inner.insert(
                "filter".to_string(),
                Value::Array(self.filter.iter().map(Clause::to_json).collect()),
            );
        }
        if !self.should.is_empty() {
            inner.insert(
                "should".to_string(),
                Value::Array(self.should.iter().map(Clause::to_json).collect()),
            );
        }
        if !self.must_not.is_empty() {
            inner.insert(
                "must_not".to_string(),
                Value::Array(self.must_not.iter().map(Clause::to_json).collect()),
            );
        }
        if let Some(msm) = self.minimum_should_match {
            inner.insert("minimum_should_match".to_string(), json!(msm));
        }
        json!({ "bool": inner })
    }
}

/// Legible one-line rendering of a clause, for test failures and debug logs — mirrors the
/// teacher's `query_plan::display` rather than the wire-format `to_json`.
impl fmt::Display for Clause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Clause::Term { field, value } => write!(f, "{field} = {value}"),
            Clause::Terms { field, values } => write!(f, "{field} in {values:?}"),
            Clause::Range { field, bounds } => write!(f, "{field} {}", bounds.to_json()),
            Clause::Exists { field } => write!(f, "exists({field})"),
            Clause::Matches { field, value } => write!(f, "{field} matches {value}"),
            Clause::Contains { field, value } => write!(f, "{field} contains {value}"),
            Clause::Nested { path, query } => write!(f, "nested({path}) {{ {query} }}"),
            Clause::Bool(inner) => write!(f, "{inner}"),
            Clause::MatchNone => write!(f, "<match_none>"),
        }
    }
}

impl fmt::Display for BooleanQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bool {{")?;
        let mut wrote_any = false;
        for (label, clauses) in [
            ("must", &self.must),
            ("filter", &self.filter),
            ("should", &self.should),
            ("must_not", &self.must_not),
        ] {
            if clauses.is_empty() {
                continue;
            }
            if wrote_any {
                write!(f, ",")?;
            }
            write!(f, " {label}: [")?;
            for (i, clause) in clauses.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{clause}")?;
            }
            write!(f, "]")?;
            wrote_any = true;
        }
        if let Some(msm) = self.minimum_should_match {
            write!(f, ", minimum_should_match: {msm}")?;
        }
        write!(f, " }}")
    }
}
