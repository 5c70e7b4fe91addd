//! The insight model: what an analysis run produces.
//!
//! An `Insight` is immutable once created. Metrics and metadata are ordered
//! key/value lists so repeated runs serialize identically; both render as
//! JSON objects.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

// ---------------------------------------------------------------------------
// Severity
// ---------------------------------------------------------------------------

/// Severity of a finding. Ordered: `Critical > High > Medium > Low > Info`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Prioritization weight. Higher sorts first.
    pub fn weight(self) -> u32 {
        match self {
            Severity::Critical => 100,
            Severity::High => 75,
            Severity::Medium => 50,
            Severity::Low => 25,
            Severity::Info => 10,
        }
    }

    /// Reader-facing priority label used in reports.
    pub fn label(self) -> &'static str {
        match self {
            Severity::Critical => "Immediate attention",
            Severity::High => "Action needed soon",
            Severity::Medium => "Monitor",
            Severity::Low | Severity::Info => "Informational",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Critical => write!(f, "critical"),
            Severity::High => write!(f, "high"),
            Severity::Medium => write!(f, "medium"),
            Severity::Low => write!(f, "low"),
            Severity::Info => write!(f, "info"),
        }
    }
}

// ---------------------------------------------------------------------------
// Insight type
// ---------------------------------------------------------------------------

/// The kind of finding an insight represents.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InsightType {
    Risk,
    Anomaly,
    Opportunity,
}

impl fmt::Display for InsightType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InsightType::Risk => write!(f, "risk"),
            InsightType::Anomaly => write!(f, "anomaly"),
            InsightType::Opportunity => write!(f, "opportunity"),
        }
    }
}

// ---------------------------------------------------------------------------
// Metric values
// ---------------------------------------------------------------------------

/// A single metric value attached to an insight.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MetricValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(String),
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricValue::Int(v) => write!(f, "{}", v),
            MetricValue::Float(v) => write!(f, "{:.2}", v),
            MetricValue::Bool(v) => write!(f, "{}", v),
            MetricValue::Text(v) => write!(f, "{}", v),
        }
    }
}

impl From<i64> for MetricValue {
    fn from(v: i64) -> Self {
        MetricValue::Int(v)
    }
}

impl From<usize> for MetricValue {
    fn from(v: usize) -> Self {
        MetricValue::Int(v as i64)
    }
}

impl From<f64> for MetricValue {
    fn from(v: f64) -> Self {
        MetricValue::Float(v)
    }
}

impl From<bool> for MetricValue {
    fn from(v: bool) -> Self {
        MetricValue::Bool(v)
    }
}

impl From<&str> for MetricValue {
    fn from(v: &str) -> Self {
        MetricValue::Text(v.to_string())
    }
}

// ---------------------------------------------------------------------------
// Insight
// ---------------------------------------------------------------------------

/// A single prioritizable finding produced by a check.
#[derive(Clone, Debug, Serialize)]
pub struct Insight {
    /// Stable name of the check that produced this insight.
    pub check_name: String,
    pub title: String,
    pub description: String,
    pub severity: Severity,
    pub insight_type: InsightType,
    /// Ordered metric map. Insertion order is preserved in serialized output.
    #[serde(serialize_with = "pairs_as_map")]
    pub metrics: Vec<(String, MetricValue)>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommendation: Option<String>,
    /// Ordered metadata map for machine consumers (product id lists, flags).
    #[serde(serialize_with = "pairs_as_map")]
    pub metadata: Vec<(String, serde_json::Value)>,
    pub timestamp: DateTime<Utc>,
}

impl Insight {
    /// Look up a metric by name.
    pub fn metric(&self, name: &str) -> Option<&MetricValue> {
        self.metrics.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    /// Look up a metadata entry by name.
    pub fn metadata_value(&self, name: &str) -> Option<&serde_json::Value> {
        self.metadata.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }
}

/// Serialize an ordered pair list as a JSON object.
fn pairs_as_map<S, V>(pairs: &[(String, V)], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
    V: Serialize,
{
    let mut map = serializer.serialize_map(Some(pairs.len()))?;
    for (key, value) in pairs {
        map.serialize_entry(key, value)?;
    }
    map.end()
}
