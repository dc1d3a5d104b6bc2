use indexmap::IndexSet;
use serde::Deserialize;
use serde::Serialize;

/// How often a rollover index's backing indices are split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum_macros::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RolloverInterval {
    Daily,
    Monthly,
    Yearly,
}

impl RolloverInterval {
    /// The `strftime`-style format used to compute `<index>_rollover__<period>` suffixes.
    pub fn period_format(&self) -> &'static str {
        match self {
            RolloverInterval::Daily => "%Y-%m-%d",
            RolloverInterval::Monthly => "%Y-%m",
            RolloverInterval::Yearly => "%Y",
        }
    }
}

/// A rollover index's split policy: which field carries the timestamp and how often to split.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RolloverPolicy {
    pub interval: RolloverInterval,
    pub timestamp_field_name_in_index: String,
}

/// Which cluster a query should be sent to, and which cluster(s) indexing writes to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterAssignment {
    pub query_cluster: String,
    pub index_clusters: Vec<String>,
}

/// A schema index definition (§3 "Index definition").
///
/// Invariant upheld by the registry loader: every indexed type has at least one index
/// definition; multi-index types must either share a routing-field path or have their routing
/// values unioned by the query planner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDefinition {
    pub name: String,
    #[serde(default)]
    pub rollover: Option<RolloverPolicy>,
    #[serde(default)]
    pub routing_field_path: Option<Vec<String>>,
    pub cluster: ClusterAssignment,
    #[serde(default)]
    pub ignored_routing_values: IndexSet<String>,
}

impl IndexDefinition {
    pub fn is_rollover(&self) -> bool {
        self.rollover.is_some()
    }

    pub fn routing_field_path_joined(&self) -> Option<String> {
        self.routing_field_path.as_ref().map(|path| path.join("."))
    }
}
