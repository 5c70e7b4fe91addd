use chrono::{Duration, Utc};

use analyst_core::{
    AnalystError, AnalystResult, BusinessContext, ContextRegistry, Insight, InsightType,
    MetricValue, Row, Severity, Table, Value,
};
use analyst_engine::checks::{AnalystCheck, CheckRegistry};
use analyst_engine::engine::AnalyticsEngine;
use analyst_engine::extractor::FeatureBundle;
use analyst_engine::source::DataSource;

// ---------------------------------------------------------------------------
// Test data fixtures
// ---------------------------------------------------------------------------

const UNIFIED_COLUMNS: [&str; 7] = [
    "as_of_date",
    "product_id",
    "product_name",
    "price",
    "starting_quantity",
    "date",
    "units_sold",
];

fn unified_table() -> Table {
    Table::new(UNIFIED_COLUMNS.iter().map(|s| s.to_string()).collect())
}

fn inventory_row(product_id: &str, name: &str, price: f64, quantity: f64) -> Row {
    let mut row = Row::new();
    row.set("as_of_date", Value::Text("2024-01-01".into()));
    row.set("product_id", Value::Text(product_id.into()));
    row.set("product_name", Value::Text(name.into()));
    row.set("price", Value::Number(price));
    row.set("starting_quantity", Value::Number(quantity));
    row
}

fn sales_row(product_id: &str, date: &str, units: f64) -> Row {
    let mut row = Row::new();
    row.set("product_id", Value::Text(product_id.into()));
    row.set("date", Value::Text(date.into()));
    row.set("units_sold", Value::Number(units));
    row
}

fn engine() -> AnalyticsEngine {
    AnalyticsEngine::new(BusinessContext::retail(), CheckRegistry::with_defaults())
}

fn metric_int(insight: &Insight, name: &str) -> i64 {
    match insight.metric(name) {
        Some(MetricValue::Int(v)) => *v,
        other => panic!("metric '{}' missing or not an int: {:?}", name, other),
    }
}

fn metric_float(insight: &Insight, name: &str) -> f64 {
    match insight.metric(name) {
        Some(MetricValue::Float(v)) => *v,
        other => panic!("metric '{}' missing or not a float: {:?}", name, other),
    }
}

// ---------------------------------------------------------------------------
// Scenario: one product with actual sales
// ---------------------------------------------------------------------------

#[test]
fn single_product_with_sales_is_high_risk() {
    let mut table = unified_table();
    table.push(inventory_row("P1", "Widget", 10.0, 20.0));
    table.push(sales_row("P1", "2024-01-02", 5.0));

    let run = engine().analyze(&table, None).unwrap();

    // Full sales coverage: no sufficiency insight, one risk insight.
    assert_eq!(run.insights.len(), 1, "expected exactly one insight");
    assert!(run.diagnostics.is_empty());

    let risk = &run.insights[0];
    assert_eq!(risk.check_name, "stockout_risk");
    assert_eq!(risk.insight_type, InsightType::Risk);
    // 20 units at 5/day = 4 days of stock; alone, so no top-seller elevation.
    assert_eq!(risk.severity, Severity::High);
    assert_eq!(metric_int(risk, "at_risk_count"), 1);
    assert_eq!(metric_int(risk, "high_count"), 1);
    assert!((metric_float(risk, "min_days_of_stock") - 4.0).abs() < 1e-9);
    assert!(risk.title.contains("1 product needs action soon"));
    assert!(risk.description.contains("Widget"));
    // 4 days left: the per-product phrase tightens to "this week" even at
    // HIGH severity, while the tier recommendation keeps the 1-2 week frame.
    assert!(risk.description.contains("may run out this week"));
    assert!(risk
        .recommendation
        .as_deref()
        .unwrap()
        .contains("in the next 1\u{2013}2 weeks"));
    assert!(risk.description.contains("based on recent sales"));
}

// ---------------------------------------------------------------------------
// Scenario: no sales data, estimate only
// ---------------------------------------------------------------------------

#[test]
fn no_sales_data_emits_only_a_sufficiency_insight() {
    let mut table = unified_table();
    table.push(inventory_row("P1", "Widget", 10.0, 100.0));

    let run = engine().analyze(&table, None).unwrap();

    // Estimated velocity: 100 / (365 / 12) = 3.29/day, so about 30.4 days of
    // stock. Not at risk, but the data gap itself must be reported.
    assert_eq!(run.insights.len(), 1);
    let sufficiency = &run.insights[0];
    assert_eq!(sufficiency.severity, Severity::Info);
    assert_eq!(sufficiency.insight_type, InsightType::Anomaly);
    assert_eq!(
        sufficiency.metric("has_sales_data"),
        Some(&MetricValue::Bool(false))
    );
    assert!(sufficiency
        .description
        .contains("Sales data was not provided"));
}

// ---------------------------------------------------------------------------
// Scenario: top-seller elevation
// ---------------------------------------------------------------------------

#[test]
fn top_seller_is_elevated_to_critical() {
    let mut table = unified_table();
    // P1 carries 100x the revenue proxy of P2; both sit at 3 days of stock.
    table.push(inventory_row("P1", "Best Seller", 100.0, 30.0));
    table.push(inventory_row("P2", "Slow Mover", 1.0, 30.0));
    table.push(sales_row("P1", "2024-01-02", 10.0));
    table.push(sales_row("P2", "2024-01-02", 10.0));

    let run = engine().analyze(&table, None).unwrap();

    assert_eq!(run.insights.len(), 1);
    let risk = &run.insights[0];
    assert_eq!(risk.severity, Severity::Critical, "overall severity is the highest tier");
    assert_eq!(metric_int(risk, "critical_count"), 1);
    assert_eq!(metric_int(risk, "high_count"), 1);
    assert_eq!(metric_int(risk, "top_sellers_at_risk"), 1);
    assert!(risk.title.contains("1 product needs immediate attention"));
    assert!(risk.description.contains("**Immediate attention:**"));
    assert!(risk.description.contains("Best Seller"));
    assert!(risk.description.contains("**Action needed soon:**"));
    assert!(risk.description.contains("Slow Mover"));

    let critical_ids = risk.metadata_value("critical_product_ids").unwrap();
    assert_eq!(critical_ids, &serde_json::json!(["P1"]));
}

// ---------------------------------------------------------------------------
// Temporal alignment
// ---------------------------------------------------------------------------

#[test]
fn sales_on_the_snapshot_date_do_not_count() {
    let mut table = unified_table();
    table.push(inventory_row("P1", "Widget", 10.0, 20.0));
    // Dated exactly at the snapshot: must be excluded from velocity.
    table.push(sales_row("P1", "2024-01-01", 100.0));
    table.push(sales_row("P1", "2024-01-02", 5.0));

    let run = engine().analyze(&table, None).unwrap();

    let risk = run
        .insights
        .iter()
        .find(|i| i.insight_type == InsightType::Risk)
        .expect("risk insight");
    // Velocity is 5/day (not 52.5/day): 4 days of stock.
    assert!((metric_float(risk, "min_days_of_stock") - 4.0).abs() < 1e-9);
}

// ---------------------------------------------------------------------------
// Floor property
// ---------------------------------------------------------------------------

#[test]
fn zero_sales_velocity_never_divides_by_zero() {
    let mut table = unified_table();
    table.push(inventory_row("P1", "Widget", 10.0, 20.0));
    table.push(sales_row("P1", "2024-01-02", 0.0));

    let run = engine().analyze(&table, None).unwrap();

    // Velocity floors at 0.01: 2,000 days of stock, far above any risk
    // threshold, and full coverage means no sufficiency insight either.
    assert!(run.insights.is_empty());
    assert!(run.diagnostics.is_empty());
}

// ---------------------------------------------------------------------------
// Coverage gating
// ---------------------------------------------------------------------------

#[test]
fn partial_coverage_emits_a_sufficiency_insight() {
    let mut table = unified_table();
    table.push(inventory_row("P1", "Covered", 10.0, 100.0));
    table.push(inventory_row("P2", "Uncovered A", 10.0, 100.0));
    table.push(inventory_row("P3", "Uncovered B", 10.0, 100.0));
    // 2 units/day over 50 days of stock: not at risk, just covered.
    table.push(sales_row("P1", "2024-01-02", 2.0));

    let run = engine().analyze(&table, None).unwrap();

    assert_eq!(run.insights.len(), 1);
    let sufficiency = &run.insights[0];
    assert_eq!(sufficiency.severity, Severity::Info);
    assert!(sufficiency.description.contains("only 1 of 3 products"));
    assert_eq!(
        sufficiency.metric("products_with_sales_data"),
        Some(&MetricValue::Int(1))
    );
}

#[test]
fn majority_coverage_emits_no_sufficiency_insight() {
    let mut table = unified_table();
    table.push(inventory_row("P1", "A", 10.0, 100.0));
    table.push(inventory_row("P2", "B", 10.0, 100.0));
    table.push(sales_row("P1", "2024-01-02", 2.0));
    table.push(sales_row("P2", "2024-01-02", 2.0));

    let run = engine().analyze(&table, None).unwrap();
    assert!(
        run.insights
            .iter()
            .all(|i| i.insight_type != InsightType::Anomaly),
        "full coverage must not produce a sufficiency insight"
    );
}

// ---------------------------------------------------------------------------
// Prioritization
// ---------------------------------------------------------------------------

#[test]
fn insights_come_back_sorted_by_severity_then_recency() {
    let mut table = unified_table();
    table.push(inventory_row("P1", "Best Seller", 100.0, 30.0));
    table.push(inventory_row("P2", "No Data A", 1.0, 500.0));
    table.push(inventory_row("P3", "No Data B", 1.0, 500.0));
    table.push(sales_row("P1", "2024-01-02", 10.0));

    let run = engine().analyze(&table, None).unwrap();

    // One CRITICAL risk insight (P1 is the runaway top seller at 3 days) and
    // one INFO sufficiency insight (1 of 3 covered). Severity sorts first.
    assert_eq!(run.insights.len(), 2);
    assert_eq!(run.insights[0].severity, Severity::Critical);
    assert_eq!(run.insights[1].severity, Severity::Info);

    let weights: Vec<u32> = run.insights.iter().map(|i| i.severity.weight()).collect();
    for pair in weights.windows(2) {
        assert!(pair[0] >= pair[1], "severity weights must be non-increasing");
    }
}

// ---------------------------------------------------------------------------
// Determinism
// ---------------------------------------------------------------------------

#[test]
fn repeated_runs_produce_identical_insights() {
    let mut table = unified_table();
    table.push(inventory_row("P1", "Best Seller", 100.0, 30.0));
    table.push(inventory_row("P2", "Slow Mover", 1.0, 30.0));
    table.push(inventory_row("P3", "Deep Stock", 5.0, 1000.0));
    table.push(sales_row("P1", "2024-01-02", 10.0));
    table.push(sales_row("P2", "2024-01-03", 10.0));

    let engine = engine();
    let first = engine.analyze(&table, None).unwrap();
    let second = engine.analyze(&table, None).unwrap();

    assert_eq!(first.insights.len(), second.insights.len());
    for (a, b) in first.insights.iter().zip(second.insights.iter()) {
        assert_eq!(a.title, b.title);
        assert_eq!(a.severity, b.severity);
        assert_eq!(a.description, b.description);
        assert_eq!(a.metrics, b.metrics);
        assert_eq!(a.metadata, b.metadata);
    }
}

// ---------------------------------------------------------------------------
// Legacy format
// ---------------------------------------------------------------------------

fn legacy_inventory() -> Table {
    let mut table = Table::new(vec![
        "product_id".into(),
        "product_name".into(),
        "quantity".into(),
        "price".into(),
    ]);
    let mut row = Row::new();
    row.set("product_id", Value::Text("P1".into()));
    row.set("product_name", Value::Text("Widget".into()));
    row.set("quantity", Value::Number(20.0));
    row.set("price", Value::Number(10.0));
    table.push(row);
    table
}

#[test]
fn legacy_inventory_with_separate_sales_table_uses_actual_velocity() {
    let inventory = legacy_inventory();

    // No as-of date in legacy mode, so the lookback is anchored to today.
    let yesterday = (Utc::now().date_naive() - Duration::days(1))
        .format("%Y-%m-%d")
        .to_string();
    let mut sales = Table::new(vec![
        "date".into(),
        "product_id".into(),
        "units_sold".into(),
    ]);
    sales.push(sales_row("P1", &yesterday, 5.0));

    let run = engine().analyze(&inventory, Some(&sales)).unwrap();

    let risk = run
        .insights
        .iter()
        .find(|i| i.insight_type == InsightType::Risk)
        .expect("risk insight");
    assert_eq!(risk.severity, Severity::High);
    assert!((metric_float(risk, "min_days_of_stock") - 4.0).abs() < 1e-9);
}

#[test]
fn legacy_inventory_alone_falls_back_to_estimation() {
    let run = engine().analyze(&legacy_inventory(), None).unwrap();

    // 20 units estimated at 20 / (365 / 12) = 0.66/day: 30.4 days of stock.
    // No risk insight; the sufficiency insight carries the gap.
    assert_eq!(run.insights.len(), 1);
    assert_eq!(run.insights[0].severity, Severity::Info);
    let estimated = run.insights[0].metadata_value("data_quality_issue").unwrap();
    assert_eq!(estimated, &serde_json::json!(true));
}

// ---------------------------------------------------------------------------
// Failure isolation and fatal errors
// ---------------------------------------------------------------------------

struct ExplodingCheck;

impl AnalystCheck for ExplodingCheck {
    fn name(&self) -> &str {
        "exploding"
    }

    fn description(&self) -> &str {
        "always fails"
    }

    fn execute(
        &self,
        _features: &FeatureBundle,
        _context: &BusinessContext,
    ) -> AnalystResult<Vec<Insight>> {
        Err(AnalystError::CheckExecution {
            check: "exploding".into(),
            reason: "synthetic failure".into(),
        })
    }
}

#[test]
fn a_failing_check_is_isolated_and_reported() {
    let mut registry = CheckRegistry::with_defaults();
    registry.register(Box::new(ExplodingCheck));
    let engine = AnalyticsEngine::new(BusinessContext::retail(), registry);

    let mut table = unified_table();
    table.push(inventory_row("P1", "Widget", 10.0, 20.0));
    table.push(sales_row("P1", "2024-01-02", 5.0));

    let run = engine.analyze(&table, None).unwrap();

    // The stock-out check still produced its insight.
    assert_eq!(run.insights.len(), 1);
    assert_eq!(run.diagnostics.len(), 1);
    assert_eq!(run.diagnostics[0].check, "exploding");
    assert!(run.diagnostics[0].reason.contains("synthetic failure"));
}

#[test]
fn empty_table_fails_validation() {
    let table = unified_table();
    let err = engine().analyze(&table, None).unwrap_err();
    assert!(matches!(err, AnalystError::DataValidation(_)));
}

#[test]
fn unknown_industry_fails_at_context_creation() {
    let registry = ContextRegistry::with_defaults();
    let err = registry.create("space mining").unwrap_err();
    assert!(matches!(err, AnalystError::Context(_)));
}

struct BrokenSource;

impl DataSource for BrokenSource {
    fn load(&self) -> AnalystResult<Table> {
        Err(AnalystError::DataValidation("unreadable".into()))
    }

    fn describe(&self) -> String {
        "broken://sales".into()
    }
}

struct TableSource(Table);

impl DataSource for TableSource {
    fn load(&self) -> AnalystResult<Table> {
        Ok(self.0.clone())
    }

    fn describe(&self) -> String {
        "memory://inventory".into()
    }
}

#[test]
fn failing_sales_source_degrades_to_estimation() {
    let run = engine()
        .analyze_source(&TableSource(legacy_inventory()), Some(&BrokenSource))
        .unwrap();

    // The run proceeds without velocity; the gap surfaces as reduced
    // coverage, never as a silent all-clear.
    assert_eq!(run.insights.len(), 1);
    assert_eq!(run.insights[0].severity, Severity::Info);
}

// ---------------------------------------------------------------------------
// Report generation
// ---------------------------------------------------------------------------

#[test]
fn report_renders_prioritized_insights() {
    let mut table = unified_table();
    table.push(inventory_row("P1", "Best Seller", 100.0, 30.0));
    table.push(inventory_row("P2", "Slow Mover", 1.0, 30.0));
    table.push(sales_row("P1", "2024-01-02", 10.0));
    table.push(sales_row("P2", "2024-01-02", 10.0));

    let engine = engine();
    let run = engine.analyze(&table, None).unwrap();
    let report = engine.generate_report(&run.insights, "Corner Shop");

    assert!(report.contains("WEEKLY BUSINESS ANALYST REPORT"));
    assert!(report.contains("Corner Shop"));
    assert!(report.contains("1 product needs immediate attention"));
    assert!(report.contains("**Priority:** Immediate attention"));
    assert!(report.contains("Best Seller"));
}
