//! Event-sourced water polo statistics. Raw in-match actions are the source
//! of truth; per-player, per-team, and per-play aggregates are derived rows
//! that can always be recomputed from the action log.

pub mod actions;
pub mod aggregate;
pub mod catalog;
pub mod db;
pub mod error;
pub mod locks;
pub mod query;
pub mod store;

pub use actions::{ActionLog, NewAction};
pub use aggregate::{AggregationEngine, DefensiveSuccessRule, MatchAggregation, SuccessPolicy};
pub use catalog::{Catalog, NewMatch};
pub use db::Database;
pub use error::{ConsistencyWarning, Error, Result};
pub use query::{QueryService, StatName};
pub use store::Storage;
