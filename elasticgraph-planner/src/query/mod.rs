//! The Query Adapter (component C2, §4.1) and the `DatastoreQuery` value it produces.

pub mod adapter;
pub mod cursor;
pub mod datastore_query;
pub mod lookahead;
pub mod stats;

pub use adapter::build_datastore_query;
pub use adapter::QueryAdapterInput;
pub use adapter::QueryAdapterOptions;
pub use cursor::Cursor;
pub use datastore_query::DatastoreQuery;
pub use datastore_query::Pagination;
pub use datastore_query::SortClause;
pub use datastore_query::SortOrder;
pub use lookahead::Lookahead;
pub use lookahead::StaticLookahead;
pub use stats::DatastoreQueryStats;
