//! Stock-out risk analyst check.
//!
//! Identifies products at risk of running out of stock using a days-of-stock
//! calculation over sales velocity. Severity is contextual: top sellers get
//! elevated severity at the same stock level because a stock-out there costs
//! more revenue.

use chrono::Utc;
use serde_json::json;

use analyst_core::{AnalystResult, BusinessContext, Insight, InsightType, Severity};

use crate::extractor::{FeatureBundle, DAILY_SALES_COLUMN};

use super::AnalystCheck;

/// Floor applied to every daily-sales figure before division.
const MIN_DAILY_SALES: f64 = 0.01;
/// Annual stock-turnover fallback when the context norm is absent.
const DEFAULT_ANNUAL_TURNOVER: f64 = 12.0;
/// Fallback share of products counted as top sellers.
const DEFAULT_TOP_SELLER_PERCENTILE: f64 = 0.3;
/// Cap on at-risk product ids carried in insight metadata.
const MAX_LISTED_PRODUCT_IDS: usize = 20;

/// Where a product's daily-sales figure came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VelocitySource {
    /// Computed from actual sales events.
    ActualSales,
    /// Estimated from the industry stock-turnover norm.
    Estimated,
    /// Taken from an explicit daily/weekly sales column in the input.
    Provided,
}

impl VelocitySource {
    pub fn as_str(self) -> &'static str {
        match self {
            VelocitySource::ActualSales => "actual_sales",
            VelocitySource::Estimated => "estimated",
            VelocitySource::Provided => "provided",
        }
    }
}

/// Confidence in a product's days-of-stock figure.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConfidenceLevel {
    High,
    Low,
}

/// One product's assessed stock position.
#[derive(Clone, Debug)]
struct ProductAssessment {
    product_id: String,
    display_name: String,
    days_of_stock: f64,
    source: VelocitySource,
    #[allow(dead_code)]
    confidence: ConfidenceLevel,
    /// Quantity x price, when both are available.
    revenue_proxy: Option<f64>,
    is_top_seller: bool,
}

/// An at-risk product with its assigned severity.
#[derive(Clone, Debug)]
struct AtRiskProduct {
    assessment: ProductAssessment,
    severity: Severity,
}

pub struct StockOutRiskCheck;

impl AnalystCheck for StockOutRiskCheck {
    fn name(&self) -> &str {
        "stockout_risk"
    }

    fn description(&self) -> &str {
        "Identifies products at risk of running out of stock based on days of cover"
    }

    fn execute(
        &self,
        features: &FeatureBundle,
        context: &BusinessContext,
    ) -> AnalystResult<Vec<Insight>> {
        let table = features.table();

        // Support both the unified name and the legacy name for quantity.
        let quantity_column = if table.has_column("starting_quantity") {
            "starting_quantity"
        } else if table.has_column("quantity") {
            "quantity"
        } else {
            return Ok(Vec::new());
        };
        if !table.has_column("product_id") {
            return Ok(Vec::new());
        }

        let mut insights = Vec::new();

        let has_sales_data = features.has_sales_data;
        let products_with_sales = features.products_with_sales_data;
        let total_products = table.len();

        // A context without this key cannot run this check at all.
        let _min_sales_days = context.threshold("min_sales_days_required")?;

        if !has_sales_data || (products_with_sales as f64) < (total_products as f64) * 0.5 {
            insights.push(self.insufficient_data_insight(
                has_sales_data,
                products_with_sales,
                total_products,
            ));
        }

        let mut assessments = self.assess_products(features, context, quantity_column);
        self.mark_top_sellers(context, &mut assessments);

        let critical_threshold = context.threshold("critical_days_of_stock")?;
        let medium_threshold = context.threshold("medium_days_of_stock")?;

        let at_risk: Vec<AtRiskProduct> = assessments
            .into_iter()
            .filter(|a| a.days_of_stock < medium_threshold)
            .map(|assessment| {
                let severity = determine_severity(
                    assessment.days_of_stock,
                    assessment.is_top_seller,
                    critical_threshold,
                    medium_threshold,
                );
                AtRiskProduct {
                    assessment,
                    severity,
                }
            })
            .collect();

        if at_risk.is_empty() {
            return Ok(insights);
        }

        insights.push(self.risk_insight(&at_risk, total_products));
        Ok(insights)
    }
}

impl StockOutRiskCheck {
    /// Compute days-of-stock for every product row, tagging each with its
    /// velocity source and confidence. Precedence: merged actual velocity,
    /// then an explicit daily-sales column, then weekly columns, then the
    /// industry-norm estimate.
    fn assess_products(
        &self,
        features: &FeatureBundle,
        context: &BusinessContext,
        quantity_column: &str,
    ) -> Vec<ProductAssessment> {
        let table = features.table();
        let name_column = if table.has_column("product_name") {
            "product_name"
        } else {
            "product_id"
        };

        let has_daily = table.has_column(DAILY_SALES_COLUMN);
        let has_per_day = table.has_column("sales_per_day");
        let has_price = table.has_column("price");
        let weekly_column = ["weekly_sales", "sales_per_week"]
            .into_iter()
            .find(|c| table.has_column(c));

        let mut assessments = Vec::with_capacity(table.len());
        for row in table.rows() {
            let product_id = match row.display_string("product_id") {
                Some(id) => id,
                None => continue,
            };
            let display_name = row
                .display_string(name_column)
                .unwrap_or_else(|| product_id.clone());
            let quantity = row.number(quantity_column).unwrap_or(f64::NAN);

            let (days_of_stock, source, confidence) = if has_daily {
                match row.number(DAILY_SALES_COLUMN) {
                    Some(daily_sales) => (
                        quantity / daily_sales.max(MIN_DAILY_SALES),
                        VelocitySource::ActualSales,
                        ConfidenceLevel::High,
                    ),
                    None => (
                        quantity / self.estimate_daily_sales(quantity, context),
                        VelocitySource::Estimated,
                        ConfidenceLevel::Low,
                    ),
                }
            } else if has_per_day {
                let days = match row.number("sales_per_day") {
                    Some(per_day) => quantity / per_day.max(MIN_DAILY_SALES),
                    None => f64::NAN,
                };
                (days, VelocitySource::Provided, ConfidenceLevel::High)
            } else if let Some(weekly) = weekly_column {
                let days = match row.number(weekly) {
                    Some(per_week) => (quantity / per_week.max(MIN_DAILY_SALES)) * 7.0,
                    None => f64::NAN,
                };
                (days, VelocitySource::Provided, ConfidenceLevel::High)
            } else {
                (
                    quantity / self.estimate_daily_sales(quantity, context),
                    VelocitySource::Estimated,
                    ConfidenceLevel::Low,
                )
            };

            let revenue_proxy = if has_price {
                match (row.number(quantity_column), row.number("price")) {
                    (Some(quantity), Some(price)) => Some(quantity * price),
                    _ => None,
                }
            } else {
                None
            };

            assessments.push(ProductAssessment {
                product_id,
                display_name,
                days_of_stock,
                source,
                confidence,
                revenue_proxy,
                is_top_seller: false,
            });
        }
        assessments
    }

    /// Estimate average daily sales from the industry stock-turnover norm:
    /// stock turning over N times a year sells roughly quantity / (365 / N)
    /// units per day. Floored so later division is always defined.
    fn estimate_daily_sales(&self, quantity: f64, context: &BusinessContext) -> f64 {
        let annual_turnover =
            context.norm_or("typical_stock_turnover", DEFAULT_ANNUAL_TURNOVER);
        (quantity / (365.0 / annual_turnover)).max(MIN_DAILY_SALES)
    }

    /// Mark products whose revenue proxy (quantity x price) sits in the top
    /// percentile. Current stock stands in for typical stock; historical
    /// sales revenue would be better but is not always available. With fewer
    /// than two priced products there are no peers to rank against, so
    /// nothing is marked.
    fn mark_top_sellers(&self, context: &BusinessContext, assessments: &mut [ProductAssessment]) {
        let mut sorted: Vec<f64> = assessments
            .iter()
            .filter_map(|a| a.revenue_proxy)
            .collect();
        if sorted.len() < 2 {
            return;
        }
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        let percentile = context
            .threshold_or("top_seller_revenue_percentile", DEFAULT_TOP_SELLER_PERCENTILE);
        let threshold = quantile_linear(&sorted, 1.0 - percentile);

        for assessment in assessments.iter_mut() {
            if let Some(revenue) = assessment.revenue_proxy {
                assessment.is_top_seller = revenue >= threshold;
            }
        }
    }

    /// Insight emitted when sales data is missing or covers too few products,
    /// so the run never silently claims "no issues" on thin data.
    fn insufficient_data_insight(
        &self,
        has_sales_data: bool,
        products_with_sales: usize,
        total_products: usize,
    ) -> Insight {
        let coverage_percentage = if total_products > 0 {
            (products_with_sales as f64 / total_products as f64) * 100.0
        } else {
            0.0
        };

        let (description, recommendation) = if !has_sales_data {
            (
                "Sales data was not provided in your file. Stock-out risk assessments are \
                 based on estimated sales patterns rather than your actual sales history. \
                 This reduces the accuracy of timing predictions. \
                 To improve accuracy, include sales rows (with date and units_sold) in your CSV file."
                    .to_string(),
                "Add sales rows to your CSV file with date, product_id, and units_sold columns. \
                 This allows the system to calculate actual sales rates for more precise \
                 stock-out predictions. Sales should represent activity after your inventory snapshot date."
                    .to_string(),
            )
        } else {
            (
                format!(
                    "Sales data is available for only {} of {} products ({:.0}% coverage). \
                     Stock-out assessments for products without sales data rely on industry \
                     estimates and may be less accurate.",
                    products_with_sales, total_products, coverage_percentage
                ),
                "Consider adding sales rows for all products in your CSV file. \
                 More complete sales data improves the accuracy of stock-out predictions."
                    .to_string(),
            )
        };

        Insight {
            check_name: self.name().to_string(),
            title: "Data Coverage: Sales History Missing".to_string(),
            description,
            severity: Severity::Info,
            insight_type: InsightType::Anomaly,
            metrics: vec![
                ("has_sales_data".into(), has_sales_data.into()),
                (
                    "products_with_sales_data".into(),
                    products_with_sales.into(),
                ),
                ("total_products".into(), total_products.into()),
                ("coverage_percentage".into(), coverage_percentage.into()),
            ],
            recommendation: Some(recommendation),
            metadata: vec![
                ("data_quality_issue".into(), json!(true)),
                ("data_coverage".into(), json!("incomplete")),
            ],
            timestamp: Utc::now(),
        }
    }

    /// Synthesize the single risk insight for the at-risk set: a tiered
    /// narrative, an action-oriented recommendation, a data-confidence note,
    /// and the metrics/metadata machine consumers need.
    fn risk_insight(&self, at_risk: &[AtRiskProduct], total_products: usize) -> Insight {
        let mut critical = tier(at_risk, Severity::Critical);
        let mut high = tier(at_risk, Severity::High);
        let mut medium = tier(at_risk, Severity::Medium);
        sort_by_days(&mut critical);
        sort_by_days(&mut high);
        sort_by_days(&mut medium);

        let overall_severity = if !critical.is_empty() {
            Severity::Critical
        } else if !high.is_empty() {
            Severity::High
        } else if !medium.is_empty() {
            Severity::Medium
        } else {
            Severity::Low
        };

        let top_sellers_at_risk = at_risk
            .iter()
            .filter(|p| p.assessment.is_top_seller)
            .count();

        // Tiered narrative, most urgent first.
        let mut parts: Vec<String> = Vec::new();
        if !critical.is_empty() {
            parts.push("**Immediate attention:**".into());
            parts.push(product_phrases(&critical, Severity::Critical).join(", "));
            parts.push(String::new());
            parts.push(
                "These products may run out this week at the current rate of sales. \
                 This could result in missed sales and customer dissatisfaction."
                    .into(),
            );
            parts.push(String::new());
        }
        if !high.is_empty() {
            parts.push("**Action needed soon:**".into());
            parts.push(product_phrases(&high, Severity::High).join(", "));
            parts.push(String::new());
            parts.push("These products should be reordered soon to avoid future shortages.".into());
            parts.push(String::new());
        }
        if !medium.is_empty() {
            parts.push("**Monitor:**".into());
            parts.push(
                medium
                    .iter()
                    .map(|p| p.assessment.display_name.clone())
                    .collect::<Vec<_>>()
                    .join(", "),
            );
            parts.push(String::new());
            parts.push("Stock levels should be monitored for these products.".into());
            parts.push(String::new());
        }
        let description = parts.join("\n").trim().to_string();

        // Action-oriented recommendation by urgency.
        let mut recommendation = String::new();
        if !critical.is_empty() {
            recommendation.push_str(
                "Prioritize reordering items that may run out this week at the current rate of sales. ",
            );
        }
        if !high.is_empty() {
            recommendation.push_str(
                "Plan reorders soon for products that may run out in the next 1\u{2013}2 weeks \
                 at the current rate of sales. ",
            );
        }
        if !medium.is_empty() && critical.is_empty() && high.is_empty() {
            recommendation.push_str(
                "Monitor stock levels and plan reorders before products reach critical levels. ",
            );
        }
        if top_sellers_at_risk > 0 {
            recommendation
                .push_str("Pay special attention to top-selling products to avoid revenue loss.");
        }
        let recommendation = recommendation.trim().to_string();

        let confidence_note = confidence_note(at_risk);

        let title = match (critical.len(), high.len(), medium.len()) {
            (1, _, _) => "Stock-Out Risk: 1 product needs immediate attention".to_string(),
            (c, _, _) if c > 1 => {
                format!("Stock-Out Risk: {} products need immediate attention", c)
            }
            (_, 1, _) => "Stock-Out Risk: 1 product needs action soon".to_string(),
            (_, h, _) if h > 1 => format!("Stock-Out Risk: {} products need action soon", h),
            (_, _, 1) => "Stock-Out Risk: 1 product to monitor".to_string(),
            (_, _, m) if m > 1 => format!("Stock-Out Risk: {} products to monitor", m),
            _ => {
                if at_risk.len() == 1 {
                    "Stock-Out Risk: 1 product needs attention".to_string()
                } else {
                    format!("Stock-Out Risk: {} products need attention", at_risk.len())
                }
            }
        };

        let min_days = at_risk
            .iter()
            .map(|p| p.assessment.days_of_stock)
            .fold(f64::INFINITY, f64::min);
        let avg_days = at_risk
            .iter()
            .map(|p| p.assessment.days_of_stock)
            .sum::<f64>()
            / at_risk.len() as f64;

        let at_risk_ids: Vec<&str> = at_risk
            .iter()
            .take(MAX_LISTED_PRODUCT_IDS)
            .map(|p| p.assessment.product_id.as_str())
            .collect();
        let critical_ids: Vec<&str> = critical
            .iter()
            .map(|p| p.assessment.product_id.as_str())
            .collect();
        let has_estimated = at_risk
            .iter()
            .any(|p| p.assessment.source == VelocitySource::Estimated);

        Insight {
            check_name: self.name().to_string(),
            title,
            description: format!("{}\n\n{}", description, confidence_note),
            severity: overall_severity,
            insight_type: InsightType::Risk,
            metrics: vec![
                ("at_risk_count".into(), at_risk.len().into()),
                ("critical_count".into(), critical.len().into()),
                ("high_count".into(), high.len().into()),
                ("medium_count".into(), medium.len().into()),
                ("top_sellers_at_risk".into(), top_sellers_at_risk.into()),
                ("min_days_of_stock".into(), min_days.into()),
                ("avg_days_of_stock".into(), avg_days.into()),
                ("total_products".into(), total_products.into()),
            ],
            recommendation: Some(recommendation),
            metadata: vec![
                ("at_risk_product_ids".into(), json!(at_risk_ids)),
                ("sales_velocity_estimated".into(), json!(has_estimated)),
                ("critical_product_ids".into(), json!(critical_ids)),
            ],
            timestamp: Utc::now(),
        }
    }
}

/// Severity as a pure function of days-of-stock and product importance.
///
/// | days_of_stock        | not top seller | top seller |
/// |----------------------|----------------|------------|
/// | < critical           | High           | Critical   |
/// | critical..medium     | Medium         | High       |
/// | >= medium            | Low            | Medium     |
fn determine_severity(
    days_of_stock: f64,
    is_top_seller: bool,
    critical_threshold: f64,
    medium_threshold: f64,
) -> Severity {
    if days_of_stock < critical_threshold {
        if is_top_seller {
            Severity::Critical
        } else {
            Severity::High
        }
    } else if days_of_stock < medium_threshold {
        if is_top_seller {
            Severity::High
        } else {
            Severity::Medium
        }
    } else if is_top_seller {
        Severity::Medium
    } else {
        Severity::Low
    }
}

/// Time-window phrase aligned with the severity tiers.
fn time_window(days: f64, severity: Severity) -> &'static str {
    if severity == Severity::Critical || days < 7.0 {
        "this week"
    } else if severity == Severity::High || days < 14.0 {
        "in the next 1\u{2013}2 weeks"
    } else {
        "in the next few weeks"
    }
}

fn tier(at_risk: &[AtRiskProduct], severity: Severity) -> Vec<&AtRiskProduct> {
    at_risk.iter().filter(|p| p.severity == severity).collect()
}

fn sort_by_days(products: &mut [&AtRiskProduct]) {
    products.sort_by(|a, b| {
        a.assessment
            .days_of_stock
            .partial_cmp(&b.assessment.days_of_stock)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}

fn product_phrases(products: &[&AtRiskProduct], severity: Severity) -> Vec<String> {
    products
        .iter()
        .map(|p| {
            format!(
                "{} (may run out {} at the current rate of sales)",
                p.assessment.display_name,
                time_window(p.assessment.days_of_stock, severity)
            )
        })
        .collect()
}

/// Trailing data-confidence sentence: all-actual, mixed, or all-estimated.
fn confidence_note(at_risk: &[AtRiskProduct]) -> String {
    let has_actual = at_risk
        .iter()
        .any(|p| p.assessment.source == VelocitySource::ActualSales);
    let estimated_count = at_risk
        .iter()
        .filter(|p| p.assessment.source == VelocitySource::Estimated)
        .count();

    if has_actual && estimated_count == 0 {
        "This assessment is based on recent sales at the current rate of sales and may change \
         if demand shifts."
            .to_string()
    } else if has_actual {
        format!(
            "This assessment uses actual sales data where available. For {} product{} without \
             sales history, estimates are based on typical industry patterns at the current \
             rate of sales and may be less accurate.",
            estimated_count,
            if estimated_count > 1 { "s" } else { "" }
        )
    } else {
        "This assessment is based on estimated sales patterns at the current rate of sales. \
         Providing actual sales data will significantly improve accuracy. Stock-out timing \
         may vary if demand changes."
            .to_string()
    }
}

/// Linear-interpolation quantile over a sorted sample, `q` in [0, 1].
/// The method matters at the small sample sizes this check sees: with two
/// products the 0.7-quantile lands strictly between them.
fn quantile_linear(sorted: &[f64], q: f64) -> f64 {
    let n = sorted.len();
    if n == 1 {
        return sorted[0];
    }
    let position = q.clamp(0.0, 1.0) * (n as f64 - 1.0);
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let fraction = position - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * fraction
}
