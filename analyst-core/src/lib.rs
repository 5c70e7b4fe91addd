//! Core model for the business analyst system.
//!
//! Leaf crate: the insight/severity model, the error taxonomy, industry
//! business contexts, and the generic in-memory table every analysis run
//! operates on. No pipeline logic lives here.

pub mod context;
pub mod error;
pub mod insight;
pub mod table;

pub use context::{BusinessContext, ColumnType, ContextBuilder, ContextRegistry};
pub use error::{AnalystError, AnalystResult};
pub use insight::{Insight, InsightType, MetricValue, Severity};
pub use table::{Row, Table, Value};
