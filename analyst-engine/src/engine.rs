//! The analytics engine orchestrator.
//!
//! One analysis call is a straight-line sequence: validate, extract features,
//! run each applicable check, prioritize. A failing check never aborts the
//! run; its failure lands in the diagnostics list alongside whatever the
//! other checks produced.

use serde::Serialize;

use analyst_core::{AnalystResult, BusinessContext, Insight, Table};

use crate::checks::CheckRegistry;
use crate::extractor::FeatureExtractor;
use crate::prioritizer::InsightPrioritizer;
use crate::report::ReportGenerator;
use crate::source::DataSource;
use crate::validator::SchemaValidator;
use crate::velocity::DEFAULT_LOOKBACK_DAYS;

/// A check that failed during a run, reported alongside the insights rather
/// than swallowed.
#[derive(Clone, Debug, Serialize)]
pub struct CheckFailure {
    pub check: String,
    pub reason: String,
}

/// Everything one analysis call returns.
#[derive(Clone, Debug)]
pub struct AnalysisRun {
    /// Prioritized insights, most important first.
    pub insights: Vec<Insight>,
    /// Per-check failures. Empty on a fully clean run.
    pub diagnostics: Vec<CheckFailure>,
}

/// Main orchestrator: a fresh engine/context pairing per logical request.
pub struct AnalyticsEngine {
    context: BusinessContext,
    registry: CheckRegistry,
    validator: SchemaValidator,
    extractor: FeatureExtractor,
    prioritizer: InsightPrioritizer,
    report_generator: ReportGenerator,
}

impl AnalyticsEngine {
    pub fn new(context: BusinessContext, registry: CheckRegistry) -> Self {
        let validator = SchemaValidator::from_context(&context);
        let lookback =
            context.threshold_or("sales_lookback_days", DEFAULT_LOOKBACK_DAYS as f64) as i64;
        Self {
            validator,
            extractor: FeatureExtractor::with_lookback(lookback),
            prioritizer: InsightPrioritizer,
            report_generator: ReportGenerator::new(),
            context,
            registry,
        }
    }

    pub fn context(&self) -> &BusinessContext {
        &self.context
    }

    /// Analyze an in-memory table (plus an optional legacy sales table).
    pub fn analyze(&self, table: &Table, sales: Option<&Table>) -> AnalystResult<AnalysisRun> {
        self.validator.validate(table)?;
        self.run_checks(table, sales)
    }

    /// Analyze from data sources. Failure to load the optional sales source
    /// is non-fatal: the run proceeds without sales velocity and the reduced
    /// coverage shows up in the insights instead.
    pub fn analyze_source(
        &self,
        source: &dyn DataSource,
        sales_source: Option<&dyn DataSource>,
    ) -> AnalystResult<AnalysisRun> {
        let table = source.load()?;
        self.validator.validate(&table)?;

        let sales = match sales_source {
            Some(sales_source) => match sales_source.load() {
                Ok(sales_table) => Some(sales_table),
                Err(err) => {
                    log::warn!(
                        "could not load sales data from '{}': {}",
                        sales_source.describe(),
                        err
                    );
                    None
                }
            },
            None => None,
        };

        self.run_checks(&table, sales.as_ref())
    }

    fn run_checks(&self, table: &Table, sales: Option<&Table>) -> AnalystResult<AnalysisRun> {
        let features = self.extractor.extract(table, sales)?;

        let mut insights: Vec<Insight> = Vec::new();
        let mut diagnostics: Vec<CheckFailure> = Vec::new();
        for check in self.registry.get_applicable(&self.context) {
            match check.execute(&features, &self.context) {
                Ok(mut produced) => insights.append(&mut produced),
                Err(err) => {
                    log::warn!("check '{}' failed: {}", check.name(), err);
                    diagnostics.push(CheckFailure {
                        check: check.name().to_string(),
                        reason: err.to_string(),
                    });
                }
            }
        }

        Ok(AnalysisRun {
            insights: self.prioritizer.prioritize(insights),
            diagnostics,
        })
    }

    /// Render a formatted report from previously produced insights.
    pub fn generate_report(&self, insights: &[Insight], business_name: &str) -> String {
        self.report_generator.generate(insights, business_name)
    }

    /// Analyze and render in one call.
    pub fn analyze_and_report(
        &self,
        source: &dyn DataSource,
        business_name: &str,
        sales_source: Option<&dyn DataSource>,
    ) -> AnalystResult<String> {
        let run = self.analyze_source(source, sales_source)?;
        Ok(self.generate_report(&run.insights, business_name))
    }
}
