//! Analyst checks.
//!
//! A check is one unit of analysis: it consumes the feature bundle and the
//! business context and produces zero or more insights. New checks plug into
//! the registry without touching the engine.

use analyst_core::{AnalystResult, BusinessContext, Insight};

use crate::extractor::FeatureBundle;

pub mod registry;
pub mod stockout_risk;

pub use registry::CheckRegistry;
pub use stockout_risk::StockOutRiskCheck;

/// Capability interface for one analyst check.
pub trait AnalystCheck: Send + Sync {
    /// Stable name for registry lookup, logging, and insight attribution.
    fn name(&self) -> &str;

    /// One-line description of what this check looks for.
    fn description(&self) -> &str;

    /// Decide if this check should run for the given context.
    fn is_applicable(&self, _context: &BusinessContext) -> bool {
        true
    }

    /// Run the analysis. An error here is isolated by the engine: it is
    /// reported as a diagnostic and the remaining checks still run.
    fn execute(
        &self,
        features: &FeatureBundle,
        context: &BusinessContext,
    ) -> AnalystResult<Vec<Insight>>;
}
