//! Analytics pipeline for the business analyst system.
//!
//! Turns a point-in-time inventory snapshot plus subsequent sales events into
//! prioritized, explainable stock-out risk insights. The pipeline is a
//! one-way flow: raw table, validated table, feature bundle, insight list,
//! prioritized insight list. Everything runs synchronously over bounded,
//! memory-resident input.

pub mod checks;
pub mod engine;
pub mod extractor;
pub mod prioritizer;
pub mod report;
pub mod source;
pub mod validator;
pub mod velocity;

pub use checks::{AnalystCheck, CheckRegistry, StockOutRiskCheck};
pub use engine::{AnalysisRun, AnalyticsEngine, CheckFailure};
pub use extractor::{DataFormat, FeatureBundle, FeatureExtractor};
pub use prioritizer::InsightPrioritizer;
pub use report::{ExplanationGenerator, ReportGenerator};
pub use source::{CsvSource, DataSource};
pub use validator::SchemaValidator;
pub use velocity::{compute_velocity, SalesEvent};
