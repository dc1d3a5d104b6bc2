use std::fmt;
use std::fmt::Display;

/// A canonical, comparable name for a schema type: an object, union, interface, scalar, or enum.
///
/// Equality and hashing are by the underlying string, matching how the original schema artifacts
/// identify types — this is an immutable value with process-wide lifetime, never mutated after
/// the registry is loaded.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub struct TypeRef(String);

impl TypeRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `WidgetAggregation`
    pub fn aggregation(&self) -> TypeRef {
        TypeRef(format!("{}Aggregation", self.0))
    }

    /// `WidgetGroupedBy`
    pub fn grouped_by(&self) -> TypeRef {
        TypeRef(format!("{}GroupedBy", self.0))
    }

    /// `WidgetAggregatedValues`
    pub fn aggregated_values(&self) -> TypeRef {
        TypeRef(format!("{}AggregatedValues", self.0))
    }

    /// `WidgetFilterInput`
    pub fn filter_input(&self) -> TypeRef {
        TypeRef(format!("{}FilterInput", self.0))
    }

    /// `WidgetSubAggregation`
    pub fn sub_aggregation(&self) -> TypeRef {
        TypeRef(format!("{}SubAggregation", self.0))
    }
}

impl Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TypeRef {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for TypeRef {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_names_append_the_expected_suffix() {
        let widget = TypeRef::new("Widget");
        assert_eq!(widget.aggregation().as_str(), "WidgetAggregation");
        assert_eq!(widget.grouped_by().as_str(), "WidgetGroupedBy");
        assert_eq!(widget.aggregated_values().as_str(), "WidgetAggregatedValues");
        assert_eq!(widget.filter_input().as_str(), "WidgetFilterInput");
        assert_eq!(widget.sub_aggregation().as_str(), "WidgetSubAggregation");
    }

    #[test]
    fn equality_is_by_string() {
        assert_eq!(TypeRef::new("Widget"), TypeRef::new("Widget"));
        assert_ne!(TypeRef::new("Widget"), TypeRef::new("Gadget"));
    }
}
