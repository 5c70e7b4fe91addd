//! Report generation.
//!
//! Renders a prioritized insight list into the weekly text report: header,
//! executive summary focused on what needs attention, detailed insights with
//! reader-facing severity labels, footer. Explanations are deterministic
//! templates; insights are already decided before this layer runs.

use chrono::Utc;

use analyst_core::{Insight, MetricValue, Severity};

use crate::prioritizer::InsightPrioritizer;

const RULE: &str = "============================================================";

/// Deterministic template rendering of one insight.
pub struct ExplanationGenerator;

impl ExplanationGenerator {
    pub fn explain(&self, insight: &Insight) -> String {
        let mut parts: Vec<String> = vec![
            format!("**{}**", insight.title),
            String::new(),
            insight.description.clone(),
        ];

        if let Some(recommendation) = &insight.recommendation {
            parts.push(String::new());
            parts.push("**Recommendation:**".into());
            parts.push(recommendation.clone());
        }

        if !insight.metrics.is_empty() {
            parts.push(String::new());
            parts.push("**Key Metrics:**".into());
            for (key, value) in &insight.metrics {
                if key.starts_with('_') {
                    continue;
                }
                parts.push(format!("- {}: {}", key, value));
            }
        }

        parts.join("\n")
    }

    pub fn explain_all(&self, insights: &[Insight]) -> Vec<String> {
        insights.iter().map(|i| self.explain(i)).collect()
    }
}

/// Generates weekly business analyst reports.
pub struct ReportGenerator {
    explainer: ExplanationGenerator,
    prioritizer: InsightPrioritizer,
}

impl ReportGenerator {
    pub fn new() -> Self {
        Self {
            explainer: ExplanationGenerator,
            prioritizer: InsightPrioritizer,
        }
    }

    /// Generate the full report for a business.
    pub fn generate(&self, insights: &[Insight], business_name: &str) -> String {
        let prioritized = self.prioritizer.prioritize(insights.to_vec());

        let sections = vec![
            self.header(business_name),
            self.summary(&prioritized),
            self.insights_section(&prioritized),
            self.footer(),
        ];

        sections.join("\n\n")
    }

    fn header(&self, business_name: &str) -> String {
        format!(
            "{}\nWEEKLY BUSINESS ANALYST REPORT\n{}\nGenerated: {}\n{}",
            RULE,
            business_name,
            Utc::now().format("%Y-%m-%d %H:%M:%S"),
            RULE
        )
    }

    /// Executive summary framed around actionable items rather than raw
    /// severity counts. Only the most urgent tiers surface here.
    fn summary(&self, insights: &[Insight]) -> String {
        let mut parts: Vec<String> = vec!["## Executive Summary".into(), String::new()];

        if insights.is_empty() {
            parts.push(
                "**No issues found.** Your business operations look healthy this week.".into(),
            );
            return parts.join("\n");
        }

        let critical: Vec<&Insight> = insights
            .iter()
            .filter(|i| i.severity == Severity::Critical)
            .collect();
        let high: Vec<&Insight> = insights
            .iter()
            .filter(|i| i.severity == Severity::High)
            .collect();

        let mut attention_items: Vec<String> = Vec::new();

        // Pull product counts out of stock-out insights so the summary names
        // the same items the detailed section does.
        for insight in insights.iter().filter(|i| i.check_name == "stockout_risk") {
            let critical_count = match insight.metric("critical_count") {
                Some(MetricValue::Int(count)) => *count,
                _ => 0,
            };
            if critical_count == 1 {
                attention_items.push("1 product needs immediate attention".into());
            } else if critical_count > 1 {
                attention_items.push(format!(
                    "{} products need immediate attention",
                    critical_count
                ));
            }
        }

        let other_critical = critical
            .iter()
            .filter(|i| i.check_name != "stockout_risk")
            .count();
        let other_high = high
            .iter()
            .filter(|i| i.check_name != "stockout_risk")
            .count();
        if other_critical > 0 {
            attention_items.push(format!(
                "{} critical issue{} requiring immediate attention",
                other_critical,
                if other_critical > 1 { "s" } else { "" }
            ));
        }
        if other_high > 0 {
            attention_items.push(format!(
                "{} high-priority item{} to address",
                other_high,
                if other_high > 1 { "s" } else { "" }
            ));
        }

        if !attention_items.is_empty() {
            parts.push("**What needs attention this week:**".into());
            for item in attention_items {
                parts.push(format!("- {}", item));
            }
        } else if !critical.is_empty() {
            parts.push("**What needs attention this week:**".into());
            parts.push(format!(
                "- {} item{} requiring immediate attention",
                critical.len(),
                if critical.len() > 1 { "s" } else { "" }
            ));
        }

        let non_critical = insights.len() - critical.len();
        if non_critical > 0 {
            parts.push(String::new());
            parts.push(format!("Additional items to review: {}", non_critical));
        }

        parts.join("\n")
    }

    fn insights_section(&self, insights: &[Insight]) -> String {
        if insights.is_empty() {
            return "## Insights\n\nNo insights to report.".into();
        }

        let mut sections: Vec<String> = vec!["## Detailed Insights".into(), String::new()];
        for (index, insight) in insights.iter().enumerate() {
            sections.push(format!("### {}. {}", index + 1, insight.title));
            sections.push(format!("**Priority:** {}", insight.severity.label()));
            sections.push(String::new());
            sections.push(self.explainer.explain(insight));
            sections.push(String::new());
            sections.push("---".into());
            sections.push(String::new());
        }

        sections.join("\n")
    }

    fn footer(&self) -> String {
        format!(
            "{}\nReport generated by Business Analyst System\n\
             For questions or support, contact your system administrator\n{}",
            RULE, RULE
        )
    }
}

impl Default for ReportGenerator {
    fn default() -> Self {
        Self::new()
    }
}
