//! Insight prioritization.
//!
//! Deterministic ordering: severity weight descending, then timestamp
//! descending. The sort is stable, so insights of equal severity and equal
//! timestamp keep their insertion order rather than depending on wall-clock
//! resolution.

use analyst_core::{Insight, Severity};

pub struct InsightPrioritizer;

impl InsightPrioritizer {
    /// Total-order a list of insights, most important first.
    pub fn prioritize(&self, insights: Vec<Insight>) -> Vec<Insight> {
        let mut sorted = insights;
        sorted.sort_by(|a, b| {
            b.severity
                .weight()
                .cmp(&a.severity.weight())
                .then_with(|| b.timestamp.cmp(&a.timestamp))
        });
        sorted
    }

    /// Only the critical insights.
    pub fn critical<'a>(&self, insights: &'a [Insight]) -> Vec<&'a Insight> {
        insights
            .iter()
            .filter(|i| i.severity == Severity::Critical)
            .collect()
    }

    /// Insights at or above a minimum severity.
    pub fn at_or_above<'a>(
        &self,
        insights: &'a [Insight],
        min_severity: Severity,
    ) -> Vec<&'a Insight> {
        insights
            .iter()
            .filter(|i| i.severity.weight() >= min_severity.weight())
            .collect()
    }
}
