//! Translates a GraphQL filter expression into a datastore boolean-query tree (component C3,
//! §4.2), plus the incomplete-document exclusion proof (§7.1) that decides whether the query
//! adapter needs to AND on an extra `__sources` filter.

pub mod boolean_query;
pub mod compiler;
pub mod incomplete_docs;

pub use boolean_query::BooleanQuery;
pub use boolean_query::Clause;
pub use boolean_query::Occurrence;
pub use boolean_query::RangeBounds;
pub use compiler::compile_filter;
pub use compiler::translate_filter_to_index_names;
pub use compiler::FieldPathResolver;
pub use compiler::FieldPathResolution;
pub use incomplete_docs::requires_incomplete_doc_exclusion;

use serde_json::Value;

/// A filter expression as deserialized from GraphQL filter arguments: a recursive mapping where
/// each key is a sub-field name, a logical connective, a list predicate, or a leaf operator (§3).
pub type FilterExpression = serde_json::Map<String, Value>;

/// The seven leaf operators named in §3: `equal_to_any_of`, `gt`, `gte`, `lt`, `lte`, `matches`,
/// `contains`. Unknown operators are logged and ignored for forward compatibility (§7 propagation
/// policy), never rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
#[strum(serialize_all = "snake_case")]
pub enum LeafOperator {
    EqualToAnyOf,
    Gt,
    Gte,
    Lt,
    Lte,
    Matches,
    Contains,
}

impl LeafOperator {
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "equal_to_any_of" => Some(Self::EqualToAnyOf),
            "gt" => Some(Self::Gt),
            "gte" => Some(Self::Gte),
            "lt" => Some(Self::Lt),
            "lte" => Some(Self::Lte),
            "matches" => Some(Self::Matches),
            "contains" => Some(Self::Contains),
            _ => None,
        }
    }

    pub fn is_range(self) -> bool {
        matches!(self, Self::Gt | Self::Gte | Self::Lt | Self::Lte)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Classification<'a> {
    /// `nil` or `{}` — treated as true, contributes nothing.
    Empty,
    Not,
    AnyOf,
    AllOf,
    AnySatisfy,
    Count,
    Operator(LeafOperator),
    SubField(&'a str),
}

pub(crate) fn classify(key: &str, value: &Value) -> Classification<'_> {
    if value.is_null() || matches!(value, Value::Object(m) if m.is_empty()) {
        return Classification::Empty;
    }
    match key {
        "not" => Classification::Not,
        "any_of" => Classification::AnyOf,
        "all_of" => Classification::AllOf,
        "any_satisfy" => Classification::AnySatisfy,
        "count" => Classification::Count,
        _ => match LeafOperator::from_key(key) {
            Some(op) => Classification::Operator(op),
            None => Classification::SubField(key),
        },
    }
}
