//! `Computation` (§3): a single numeric aggregated-value field.

use serde_json::json;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
#[strum(serialize_all = "snake_case")]
pub enum AggregationFunction {
    Sum,
    Avg,
    Min,
    Max,
    Cardinality,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Computation {
    pub source_field_path: Vec<String>,
    pub computed_index_field_name: String,
    pub function: AggregationFunction,
    pub empty_bucket_value: Value,
}

impl Computation {
    pub fn agg_name(&self) -> String {
        self.computed_index_field_name.clone()
    }

    pub fn clause(&self) -> Value {
        let field = self.source_field_path.join(".");
        match self.function {
            AggregationFunction::Sum => json!({ "sum": { "field": field } }),
            AggregationFunction::Avg => json!({ "avg": { "field": field } }),
            AggregationFunction::Min => json!({ "min": { "field": field } }),
            AggregationFunction::Max => json!({ "max": { "field": field } }),
            AggregationFunction::Cardinality => json!({ "cardinality": { "field": field } }),
        }
    }
}
