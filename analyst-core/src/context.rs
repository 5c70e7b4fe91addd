//! Industry business contexts.
//!
//! A `BusinessContext` bundles the thresholds, norms, and expected input
//! schema for one industry. It is immutable for the lifetime of an analysis
//! run. Contexts come from an explicit `ContextRegistry` constructed at
//! process start; nothing is registered implicitly at import time.

use std::collections::HashMap;
use std::fmt;

use crate::error::{AnalystError, AnalystResult};

/// Declared type for a legacy-schema column.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColumnType {
    Text,
    Integer,
    Float,
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnType::Text => write!(f, "text"),
            ColumnType::Integer => write!(f, "integer"),
            ColumnType::Float => write!(f, "float"),
        }
    }
}

/// Thresholds, norms, and expected schema for one industry.
#[derive(Clone, Debug)]
pub struct BusinessContext {
    industry: String,
    thresholds: HashMap<String, f64>,
    norms: HashMap<String, f64>,
    required_columns: Vec<String>,
    column_types: Vec<(String, ColumnType)>,
}

impl BusinessContext {
    pub fn new(
        industry: impl Into<String>,
        thresholds: HashMap<String, f64>,
        norms: HashMap<String, f64>,
        required_columns: Vec<String>,
        column_types: Vec<(String, ColumnType)>,
    ) -> Self {
        Self {
            industry: industry.into(),
            thresholds,
            norms,
            required_columns,
            column_types,
        }
    }

    /// The retail context: thresholds and norms for small retail shops.
    pub fn retail() -> Self {
        let thresholds = HashMap::from([
            ("low_stock_ratio".to_string(), 0.2),
            ("high_stock_ratio".to_string(), 2.0),
            ("slow_moving_days".to_string(), 30.0),
            ("fast_moving_threshold".to_string(), 5.0),
            ("reorder_point_multiplier".to_string(), 1.5),
            // Days-of-stock thresholds for stock-out risk.
            ("critical_days_of_stock".to_string(), 7.0),
            ("medium_days_of_stock".to_string(), 14.0),
            // Top 30% by revenue proxy count as top sellers.
            ("top_seller_revenue_percentile".to_string(), 0.3),
            ("sales_lookback_days".to_string(), 30.0),
            ("min_sales_days_required".to_string(), 7.0),
        ]);

        let norms = HashMap::from([
            // Stock turns per year.
            ("typical_stock_turnover".to_string(), 12.0),
            ("typical_margin".to_string(), 0.30),
            ("seasonal_variation_factor".to_string(), 1.5),
            ("weekend_sales_boost".to_string(), 1.2),
        ]);

        let required_columns = vec![
            "product_id".to_string(),
            "product_name".to_string(),
            "quantity".to_string(),
            "price".to_string(),
        ];

        let column_types = vec![
            ("product_id".to_string(), ColumnType::Text),
            ("product_name".to_string(), ColumnType::Text),
            ("quantity".to_string(), ColumnType::Integer),
            ("price".to_string(), ColumnType::Float),
        ];

        Self::new("retail", thresholds, norms, required_columns, column_types)
    }

    pub fn industry(&self) -> &str {
        &self.industry
    }

    /// Look up a threshold. Missing keys are a context error, surfaced as a
    /// check failure when a check requires the key.
    pub fn threshold(&self, name: &str) -> AnalystResult<f64> {
        self.thresholds.get(name).copied().ok_or_else(|| {
            AnalystError::Context(format!(
                "threshold '{}' not found in {} context",
                name, self.industry
            ))
        })
    }

    /// Look up a threshold, falling back to a default for optional keys.
    pub fn threshold_or(&self, name: &str, default: f64) -> f64 {
        self.thresholds.get(name).copied().unwrap_or(default)
    }

    pub fn norm(&self, name: &str) -> AnalystResult<f64> {
        self.norms.get(name).copied().ok_or_else(|| {
            AnalystError::Context(format!(
                "norm '{}' not found in {} context",
                name, self.industry
            ))
        })
    }

    pub fn norm_or(&self, name: &str, default: f64) -> f64 {
        self.norms.get(name).copied().unwrap_or(default)
    }

    pub fn has_threshold(&self, name: &str) -> bool {
        self.thresholds.contains_key(name)
    }

    pub fn has_norm(&self, name: &str) -> bool {
        self.norms.contains_key(name)
    }

    pub fn required_columns(&self) -> &[String] {
        &self.required_columns
    }

    pub fn column_types(&self) -> &[(String, ColumnType)] {
        &self.column_types
    }
}

/// Builder function producing a fresh context for an industry.
pub type ContextBuilder = Box<dyn Fn() -> BusinessContext + Send + Sync>;

/// Explicit factory map from industry key to context builder.
///
/// Owned by the caller and passed down; constructed once at process start.
pub struct ContextRegistry {
    builders: HashMap<String, ContextBuilder>,
}

impl ContextRegistry {
    /// An empty registry with no industries.
    pub fn empty() -> Self {
        Self {
            builders: HashMap::new(),
        }
    }

    /// Registry with the built-in industries registered.
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register("retail", Box::new(BusinessContext::retail));
        registry
    }

    /// Register an industry. Keys are case-insensitive; later registrations
    /// replace earlier ones.
    pub fn register(&mut self, industry: &str, builder: ContextBuilder) {
        self.builders.insert(industry.to_lowercase(), builder);
    }

    /// Create a context for the given industry.
    pub fn create(&self, industry: &str) -> AnalystResult<BusinessContext> {
        match self.builders.get(&industry.to_lowercase()) {
            Some(builder) => Ok(builder()),
            None => {
                let mut available: Vec<&str> =
                    self.builders.keys().map(String::as_str).collect();
                available.sort_unstable();
                Err(AnalystError::Context(format!(
                    "industry '{}' not supported; available industries: {}",
                    industry,
                    available.join(", ")
                )))
            }
        }
    }

    /// All registered industry keys, sorted.
    pub fn industries(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.builders.keys().cloned().collect();
        keys.sort_unstable();
        keys
    }
}

impl Default for ContextRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
