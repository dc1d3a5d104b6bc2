//! The error taxonomy shared by the query-planning and dispatch pipeline.
//!
//! Mirrors the split used throughout this crate family: a closed enum of leaf error kinds
//! (`SingleGatewayError`), a collector for reporting several at once (`MultipleGatewayErrors`),
//! and a `Clone`-able top-level wrapper (`GatewayError`) that every fallible operation in the
//! planner, dispatcher and indexer returns.

use std::fmt::Display;
use std::fmt::Formatter;
use std::fmt::Write as _;

/// Create an internal error.
///
/// Use this for precondition violations that indicate a bug in this crate family rather than
/// bad user input — e.g. a `DatastoreQuery` merge that disagrees on `search_index_definitions`.
#[macro_export]
macro_rules! internal_error {
    ( $( $arg:tt )+ ) => {
        $crate::GatewayError::internal(format!( $( $arg )+ ))
    }
}

/// Break out of the current function, returning an internal error.
#[macro_export]
macro_rules! bail {
    ( $( $arg:tt )+ ) => {
        return Err($crate::internal_error!( $( $arg )+ ))
    }
}

/// An assertion that panics in debug builds and returns an internal error in release builds.
///
/// Use only for conditions that should never happen in normal operation.
#[macro_export]
macro_rules! ensure {
    ( $expr:expr, $( $arg:tt )+ ) => {
        #[cfg(debug_assertions)]
        {
            assert!($expr, $( $arg )+);
        }
        #[cfg(not(debug_assertions))]
        if !$expr {
            $crate::bail!( $( $arg )+ );
        }
    }
}

/// Where an error should surface once it leaves this crate family, per §7 of the design.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Bad schema or missing index; surfaced at startup, before any query is served.
    Config,
    /// Internal precondition violation. Never a result of user input.
    Internal,
    /// User-facing: belongs in the GraphQL response's `errors` array.
    GraphQlExecution,
    /// Client-side deadline was already past when the request would have been dispatched.
    RequestExceededDeadline,
    /// The datastore reported a failure we don't have a specific translation for.
    SearchFailed,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum SingleGatewayError {
    #[error("An internal error has occurred, please report this bug.\n\nDetails: {message}")]
    Internal { message: String },

    #[error("configuration error: {message}")]
    Config { message: String },

    #[error("invalid argument value: {message}")]
    InvalidArgumentValue { message: String },

    #[error("cannot merge queries that disagree on {field}: {message}")]
    InvalidMerge { field: &'static str, message: String },

    #[error("the supplied cursor does not match the current query's groupings: {message}")]
    InvalidCursorForGroupings { message: String },

    #[error(
        "any_satisfy on \"{field_path}\" would require a single list element to satisfy more \
         than one predicate, which Elasticsearch cannot guarantee: {message}"
    )]
    AnySatisfyRequiresSingleMatch { field_path: String, message: String },

    #[error(
        "\"{selection_a}\" and \"{selection_b}\" cannot both be selected on the same connection"
    )]
    ConflictingGroupingSelections {
        selection_a: &'static str,
        selection_b: &'static str,
    },

    #[error(
        "query exceeded the maximum number of aggregation buckets ({max_buckets}): {message}"
    )]
    TooManyBuckets { max_buckets: u64, message: String },

    #[error("request exceeded its deadline before it was dispatched ({overrun_ms}ms past deadline)")]
    RequestExceededDeadline { overrun_ms: i64 },

    #[error("datastore search failed: {message}")]
    SearchFailed { message: String },

    #[error("query optimizer lost an original query while splitting responses: {query_shape}")]
    MissingOriginalQueryAfterSplit { query_shape: String },
}

impl SingleGatewayError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Internal { .. } => ErrorCategory::Internal,
            Self::Config { .. } => ErrorCategory::Config,
            Self::InvalidArgumentValue { .. } | Self::InvalidMerge { .. } => {
                ErrorCategory::Internal
            }
            Self::InvalidCursorForGroupings { .. }
            | Self::AnySatisfyRequiresSingleMatch { .. }
            | Self::ConflictingGroupingSelections { .. }
            | Self::TooManyBuckets { .. } => ErrorCategory::GraphQlExecution,
            Self::RequestExceededDeadline { .. } => ErrorCategory::RequestExceededDeadline,
            Self::SearchFailed { .. } | Self::MissingOriginalQueryAfterSplit { .. } => {
                ErrorCategory::SearchFailed
            }
        }
    }
}

#[derive(Debug, Clone, thiserror::Error, Default)]
pub struct MultipleGatewayErrors {
    pub errors: Vec<SingleGatewayError>,
}

impl MultipleGatewayErrors {
    pub fn new() -> Self {
        Self { errors: vec![] }
    }

    pub fn push(&mut self, error: GatewayError) {
        match error {
            GatewayError::Single(error) => self.errors.push(error),
            GatewayError::Multiple(errors) => self.errors.extend(errors.errors),
        }
    }

    pub fn into_result(self) -> Result<(), GatewayError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self.into())
        }
    }
}

impl Display for MultipleGatewayErrors {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "The following errors occurred:")?;
        for error in &self.errors {
            write!(f, "\n  - ")?;
            for c in error.to_string().chars() {
                if c == '\n' {
                    write!(f, "\n    ")?;
                } else {
                    f.write_char(c)?;
                }
            }
        }
        Ok(())
    }
}

impl FromIterator<SingleGatewayError> for MultipleGatewayErrors {
    fn from_iter<T: IntoIterator<Item = SingleGatewayError>>(iter: T) -> Self {
        Self {
            errors: iter.into_iter().collect(),
        }
    }
}

#[derive(Clone, thiserror::Error)]
pub enum GatewayError {
    #[error(transparent)]
    Single(#[from] SingleGatewayError),
    #[error(transparent)]
    Multiple(#[from] MultipleGatewayErrors),
}

impl std::fmt::Debug for GatewayError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Single(inner) => std::fmt::Debug::fmt(inner, f),
            Self::Multiple(inner) => std::fmt::Debug::fmt(inner, f),
        }
    }
}

impl GatewayError {
    pub fn internal(message: impl Into<String>) -> Self {
        SingleGatewayError::Internal {
            message: message.into(),
        }
        .into()
    }

    pub fn merge(self, other: Self) -> Self {
        let mut result = MultipleGatewayErrors::new();
        result.push(self);
        result.push(other);
        result.into()
    }

    pub fn into_errors(self) -> Vec<SingleGatewayError> {
        match self {
            Self::Single(e) => vec![e],
            Self::Multiple(e) => e.errors,
        }
    }

    pub fn errors(&self) -> Vec<&SingleGatewayError> {
        match self {
            Self::Single(e) => vec![e],
            Self::Multiple(e) => e.errors.iter().collect(),
        }
    }

    /// True if every leaf error is user-facing (belongs in the GraphQL `errors` array) rather
    /// than an internal bug or infrastructure failure.
    pub fn is_graphql_execution_error(&self) -> bool {
        self.errors()
            .into_iter()
            .all(|e| e.category() == ErrorCategory::GraphQlExecution)
    }
}

/// An event (see `elasticgraph_schema::Event`) that the indexer could not apply.
///
/// Kept distinct from [`GatewayError`] because it must carry the event and the best-effort list
/// of operations that would have been produced, never just a message — callers route it to a
/// dead-letter-equivalent channel rather than failing the whole batch.
#[derive(Debug, Clone, thiserror::Error)]
#[error("failed to process event {event_id} (type {event_type}): {sanitized_message}")]
pub struct FailedEventError<Event, Operation> {
    pub event: Event,
    pub event_id: String,
    pub event_type: String,
    /// The operations that would have been produced had validation succeeded.
    pub best_effort_operations: Vec<Operation>,
    /// Never includes record field values — only field paths and type names.
    pub sanitized_message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multiple_errors_collapse_single_into_flat_list() {
        let mut multi = MultipleGatewayErrors::new();
        multi.push(GatewayError::internal("first"));
        multi.push(GatewayError::internal("second"));
        assert_eq!(multi.errors.len(), 2);
    }

    #[test]
    fn merge_of_two_singles_is_flat() {
        let a = GatewayError::internal("a");
        let b = GatewayError::internal("b");
        let merged = a.merge(b);
        assert_eq!(merged.into_errors().len(), 2);
    }

    #[test]
    fn graphql_execution_category_is_user_facing() {
        let err: GatewayError = SingleGatewayError::TooManyBuckets {
            max_buckets: 10_000,
            message: "terms aggregation exceeded".to_string(),
        }
        .into();
        assert!(err.is_graphql_execution_error());

        let internal: GatewayError = GatewayError::internal("boom");
        assert!(!internal.is_graphql_execution_error());
    }
}
