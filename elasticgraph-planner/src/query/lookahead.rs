//! The `Lookahead` abstraction (§4.1): a GraphQL selection tree, consumed as an external
//! interface so the Query Adapter never depends on a concrete GraphQL execution engine's AST —
//! mirroring how `apollo-federation`'s operation-building code is written against
//! `apollo_compiler::executable::SelectionSet` rather than a parser-specific tree.

use serde_json::Value;

/// One level of a GraphQL selection, plus its arguments.
///
/// Implementors wrap whatever selection-tree type a concrete GraphQL server crate exposes (e.g.
/// `async-graphql`'s own `Lookahead`); this crate only ever reads through the trait.
pub trait Lookahead: std::fmt::Debug {
    /// Names of the fields selected directly under this node (not recursive).
    fn selected_field_names(&self) -> Vec<String>;

    fn is_selected(&self, name: &str) -> bool {
        self.selected_field_names().iter().any(|f| f == name)
    }

    /// The selection rooted at a child field, if that field was selected.
    fn child(&self, name: &str) -> Option<Box<dyn Lookahead>>;

    /// A GraphQL argument's value on this field, if supplied.
    fn argument(&self, name: &str) -> Option<Value>;
}

/// An in-memory `Lookahead` used by tests and any caller that already has the selection shaped
/// as a tree (e.g. decoded from a request trace) rather than live GraphQL execution state.
#[derive(Debug, Clone, Default)]
pub struct StaticLookahead {
    pub fields: std::collections::HashMap<String, StaticLookahead>,
    pub arguments: std::collections::HashMap<String, Value>,
}

impl StaticLookahead {
    pub fn with_field(mut self, name: &str, child: StaticLookahead) -> Self {
        self.fields.insert(name.to_string(), child);
        self
    }

    pub fn with_argument(mut self, name: &str, value: Value) -> Self {
        self.arguments.insert(name.to_string(), value);
        self
    }

    pub fn leaf(name: &str) -> (String, StaticLookahead) {
        (name.to_string(), StaticLookahead::default())
    }
}

impl Lookahead for StaticLookahead {
    fn selected_field_names(&self) -> Vec<String> {
        self.fields.keys().cloned().collect()
    }

    fn child(&self, name: &str) -> Option<Box<dyn Lookahead>> {
        self.fields.get(name).map(|child| Box::new(child.clone()) as Box<dyn Lookahead>)
    }

    fn argument(&self, name: &str) -> Option<Value> {
        self.arguments.get(name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_lookahead_reports_selected_children() {
        let lookahead = StaticLookahead::default()
            .with_field("nodes", StaticLookahead::default())
            .with_argument("first", Value::from(10));
        assert!(lookahead.is_selected("nodes"));
        assert!(!lookahead.is_selected("edges"));
        assert_eq!(lookahead.argument("first"), Some(Value::from(10)));
    }
}
