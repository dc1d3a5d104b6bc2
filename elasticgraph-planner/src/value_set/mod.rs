//! Abstract value-set algebra used by the routing/index optimizer (C5) to reason about which
//! shards or index names a query's filter can possibly touch, without re-deriving the full
//! boolean query (§3, §4.4).

pub mod filter_value_set;
pub mod time_set;

pub use filter_value_set::FilterValueSet;
pub use time_set::Millis;
pub use time_set::TimeSet;
