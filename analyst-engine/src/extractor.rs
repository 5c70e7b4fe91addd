//! Feature extraction from validated tables.
//!
//! Detects the input format, splits a unified table into an inventory
//! snapshot and a sales-event set, computes descriptive column statistics,
//! and merges per-product sales velocity onto the working table. The
//! resulting `FeatureBundle` is everything a check is allowed to see.

use std::collections::{HashMap, HashSet};

use chrono::NaiveDate;

use analyst_core::{AnalystError, AnalystResult, Table, Value};

use crate::velocity::{compute_velocity, SalesEvent, DEFAULT_LOOKBACK_DAYS};

/// Columns whose simultaneous presence marks a table as unified format.
pub const UNIFIED_MARKER_COLUMNS: [&str; 4] =
    ["as_of_date", "starting_quantity", "date", "units_sold"];

/// Column name the merged sales velocity is written to.
pub const DAILY_SALES_COLUMN: &str = "daily_sales";

/// Detected shape of the input table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DataFormat {
    /// Single table carrying both an inventory snapshot and sales events.
    Unified,
    /// Inventory-only table, optionally paired with a separate sales table.
    Legacy,
}

impl std::fmt::Display for DataFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataFormat::Unified => write!(f, "unified"),
            DataFormat::Legacy => write!(f, "legacy"),
        }
    }
}

/// A table is unified iff it carries all four marker columns at once.
pub fn detect_format(table: &Table) -> DataFormat {
    if UNIFIED_MARKER_COLUMNS.iter().all(|c| table.has_column(c)) {
        DataFormat::Unified
    } else {
        DataFormat::Legacy
    }
}

// ---------------------------------------------------------------------------
// Column statistics
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq)]
pub struct NumericStats {
    pub sum: f64,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    /// Sample standard deviation; 0.0 for a single observation.
    pub std: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CategoricalStats {
    pub unique_count: usize,
    /// Value counts, most frequent first; ties broken by value for
    /// deterministic output.
    pub value_counts: Vec<(String, usize)>,
}

/// Descriptive statistics over the working table's columns.
#[derive(Clone, Debug, Default)]
pub struct ColumnStats {
    pub numeric: Vec<(String, NumericStats)>,
    pub categorical: Vec<(String, CategoricalStats)>,
}

impl ColumnStats {
    pub fn numeric(&self, column: &str) -> Option<&NumericStats> {
        self.numeric.iter().find(|(c, _)| c == column).map(|(_, s)| s)
    }

    pub fn categorical(&self, column: &str) -> Option<&CategoricalStats> {
        self.categorical
            .iter()
            .find(|(c, _)| c == column)
            .map(|(_, s)| s)
    }
}

// ---------------------------------------------------------------------------
// Feature bundle
// ---------------------------------------------------------------------------

/// Immutable output of one extraction pass, handed to checks by reference.
#[derive(Clone, Debug)]
pub struct FeatureBundle {
    pub format: DataFormat,
    pub as_of_date: Option<NaiveDate>,
    pub row_count: usize,
    pub column_stats: ColumnStats,
    pub has_sales_data: bool,
    pub products_with_sales_data: usize,
    /// Retained when optional sales processing failed non-fatally.
    pub sales_processing_error: Option<String>,
    table: Table,
}

impl FeatureBundle {
    /// The working table: the inventory snapshot, with `daily_sales` merged
    /// on when sales velocity could be computed.
    pub fn table(&self) -> &Table {
        &self.table
    }
}

// ---------------------------------------------------------------------------
// Extractor
// ---------------------------------------------------------------------------

pub struct FeatureExtractor {
    lookback_days: i64,
}

impl FeatureExtractor {
    pub fn new() -> Self {
        Self {
            lookback_days: DEFAULT_LOOKBACK_DAYS,
        }
    }

    /// Override the velocity lookback window (an industry norm).
    pub fn with_lookback(lookback_days: i64) -> Self {
        Self { lookback_days }
    }

    /// Extract a feature bundle from a validated table.
    ///
    /// For unified input the table is split into snapshot and events. For
    /// legacy input the table is the snapshot and `legacy_sales` optionally
    /// supplies events; a failure reading those events is non-fatal and the
    /// bundle records it instead.
    pub fn extract(
        &self,
        table: &Table,
        legacy_sales: Option<&Table>,
    ) -> AnalystResult<FeatureBundle> {
        let format = detect_format(table);

        let (mut inventory, events, as_of_date, sales_error) = match format {
            DataFormat::Unified => {
                let (inventory, events, as_of_date) = split_unified(table)?;
                (inventory, events, as_of_date, None)
            }
            DataFormat::Legacy => match legacy_sales {
                Some(sales_table) => match build_legacy_events(sales_table) {
                    Ok(events) => (table.clone(), events, None, None),
                    Err(err) => (table.clone(), Vec::new(), None, Some(err.to_string())),
                },
                None => (table.clone(), Vec::new(), None, None),
            },
        };

        let column_stats = compute_column_stats(&inventory);

        let mut has_sales_data = false;
        let mut products_with_sales_data = 0;
        if !events.is_empty() && inventory.has_column("product_id") {
            let velocity = compute_velocity(&events, as_of_date, self.lookback_days);
            products_with_sales_data = merge_velocity(&mut inventory, &velocity);
            has_sales_data = true;
        }

        Ok(FeatureBundle {
            format,
            as_of_date,
            row_count: inventory.len(),
            column_stats,
            has_sales_data,
            products_with_sales_data,
            sales_processing_error: sales_error,
            table: inventory,
        })
    }
}

impl Default for FeatureExtractor {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Format split
// ---------------------------------------------------------------------------

/// Split a unified table into the inventory snapshot and the sales events.
///
/// Inventory rows are those with a non-null starting quantity; the first
/// occurrence wins when a product appears twice. Sales rows are those with
/// both a date and a units-sold value. The snapshot gains a `quantity`
/// column aliasing `starting_quantity` so downstream code sees one name.
fn split_unified(table: &Table) -> AnalystResult<(Table, Vec<SalesEvent>, Option<NaiveDate>)> {
    let mut inventory = Table::new(table.columns().to_vec());
    let mut seen: HashSet<String> = HashSet::new();

    for row in table.rows() {
        if row.is_null("starting_quantity") {
            continue;
        }
        let product_id = row.display_string("product_id").ok_or_else(|| {
            AnalystError::FeatureExtraction("inventory row has no product_id".into())
        })?;
        if seen.insert(product_id) {
            inventory.push(row.clone());
        }
    }

    inventory.add_column("quantity");
    for row in inventory.rows_mut() {
        let quantity = row.get("starting_quantity").clone();
        row.set("quantity", quantity);
    }

    let as_of_date = match inventory.rows().first() {
        Some(row) => parse_date_cell(row.get("as_of_date"))?,
        None => None,
    };

    let mut events = Vec::new();
    for row in table.rows() {
        if row.is_null("date") || row.is_null("units_sold") {
            continue;
        }
        let product_id = row
            .display_string("product_id")
            .ok_or_else(|| AnalystError::FeatureExtraction("sales row has no product_id".into()))?;
        let date = parse_date_cell(row.get("date"))?.ok_or_else(|| {
            AnalystError::FeatureExtraction("sales row has no parsable date".into())
        })?;
        let units_sold = row.number("units_sold").ok_or_else(|| {
            AnalystError::FeatureExtraction(format!(
                "units_sold for product '{}' is not numeric",
                product_id
            ))
        })?;
        events.push(SalesEvent {
            product_id,
            date,
            units_sold,
        });
    }

    Ok((inventory, events, as_of_date))
}

/// Build events from a separate legacy sales table (`date, product_id,
/// units_sold`). Unlike the unified path, callers treat failure here as
/// non-fatal. Rows missing a product or units contribute nothing and are
/// skipped; an unparsable date poisons the whole table.
fn build_legacy_events(sales_table: &Table) -> AnalystResult<Vec<SalesEvent>> {
    let mut events = Vec::new();
    for row in sales_table.rows() {
        let product_id = match row.display_string("product_id") {
            Some(id) => id,
            None => continue,
        };
        let date_cell = row.get("date");
        if date_cell.is_null() {
            continue;
        }
        let date = parse_date_cell(date_cell)?.ok_or_else(|| {
            AnalystError::FeatureExtraction("sales table has no parsable date".into())
        })?;
        let units_sold = match row.number("units_sold") {
            Some(units) => units,
            None => continue,
        };
        events.push(SalesEvent {
            product_id,
            date,
            units_sold,
        });
    }
    Ok(events)
}

/// Merge a velocity map onto the snapshot as a `daily_sales` column.
/// Returns how many products matched; the rest stay null and are flagged
/// downstream as needing estimation.
fn merge_velocity(inventory: &mut Table, velocity: &HashMap<String, f64>) -> usize {
    inventory.add_column(DAILY_SALES_COLUMN);
    let mut matched = 0;
    for row in inventory.rows_mut() {
        if let Some(product_id) = row.display_string("product_id") {
            if let Some(daily_sales) = velocity.get(&product_id) {
                row.set(DAILY_SALES_COLUMN, Value::Number(*daily_sales));
                matched += 1;
            }
        }
    }
    matched
}

// ---------------------------------------------------------------------------
// Dates
// ---------------------------------------------------------------------------

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];

/// Parse a date string in the formats upload files actually contain.
/// Timestamp strings are accepted by their date prefix.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, format) {
            return Some(date);
        }
    }
    if let Some(prefix) = trimmed.get(..10) {
        if let Ok(date) = NaiveDate::parse_from_str(prefix, "%Y-%m-%d") {
            return Some(date);
        }
    }
    None
}

/// Null cells parse to `None`; non-null cells must be parsable date text.
fn parse_date_cell(value: &Value) -> AnalystResult<Option<NaiveDate>> {
    match value {
        Value::Null => Ok(None),
        Value::Text(s) => parse_date(s).map(Some).ok_or_else(|| {
            AnalystError::FeatureExtraction(format!("unparsable date '{}'", s))
        }),
        Value::Number(n) => Err(AnalystError::FeatureExtraction(format!(
            "expected a date string, got numeric value {}",
            n
        ))),
    }
}

// ---------------------------------------------------------------------------
// Statistics passes
// ---------------------------------------------------------------------------

/// Date-like columns excluded from both numeric and categorical statistics.
const STATS_EXCLUDED_COLUMNS: [&str; 2] = ["as_of_date", "date"];

fn compute_column_stats(table: &Table) -> ColumnStats {
    let mut stats = ColumnStats::default();

    for column in table.columns() {
        if STATS_EXCLUDED_COLUMNS.contains(&column.as_str()) {
            continue;
        }

        let non_null: Vec<&Value> = table
            .rows()
            .iter()
            .map(|row| row.get(column))
            .filter(|v| !v.is_null())
            .collect();
        if non_null.is_empty() {
            continue;
        }

        let numbers: Vec<f64> = non_null.iter().filter_map(|v| v.as_number()).collect();
        if numbers.len() == non_null.len() {
            stats
                .numeric
                .push((column.clone(), numeric_stats(&numbers)));
        } else {
            let values: Vec<String> = non_null
                .iter()
                .filter_map(|v| v.display_string())
                .collect();
            stats
                .categorical
                .push((column.clone(), categorical_stats(&values)));
        }
    }

    stats
}

fn numeric_stats(values: &[f64]) -> NumericStats {
    let n = values.len() as f64;
    let sum: f64 = values.iter().sum();
    let mean = sum / n;
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let std = if values.len() > 1 {
        let variance: f64 =
            values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
        variance.sqrt()
    } else {
        0.0
    };
    NumericStats {
        sum,
        mean,
        min,
        max,
        std,
    }
}

fn categorical_stats(values: &[String]) -> CategoricalStats {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for value in values {
        *counts.entry(value.as_str()).or_insert(0) += 1;
    }
    let unique_count = counts.len();
    let mut value_counts: Vec<(String, usize)> = counts
        .into_iter()
        .map(|(value, count)| (value.to_string(), count))
        .collect();
    value_counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    CategoricalStats {
        unique_count,
        value_counts,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use analyst_core::Row;

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

    #[test]
    fn detects_unified_and_legacy_formats() {
        assert_eq!(detect_format(&unified_table()), DataFormat::Unified);
        let legacy = Table::new(vec![
            "product_id".into(),
            "product_name".into(),
            "quantity".into(),
            "price".into(),
        ]);
        assert_eq!(detect_format(&legacy), DataFormat::Legacy);
    }

    #[test]
    fn unified_split_takes_first_occurrence_per_product() {
        let mut table = unified_table();
        table.push(inventory_row("P1", "First", 10.0, 20.0));
        table.push(inventory_row("P1", "Duplicate", 99.0, 5.0));
        table.push(sales_row("P1", "2024-01-02", 5.0));

        let bundle = FeatureExtractor::new().extract(&table, None).unwrap();
        assert_eq!(bundle.row_count, 1);
        let row = &bundle.table().rows()[0];
        assert_eq!(row.text("product_name"), Some("First"));
        // starting_quantity is aliased to quantity
        assert_eq!(row.number("quantity"), Some(20.0));
    }

    #[test]
    fn unified_extraction_merges_velocity() {
        let mut table = unified_table();
        table.push(inventory_row("P1", "Widget", 10.0, 20.0));
        table.push(inventory_row("P2", "Gadget", 5.0, 50.0));
        table.push(sales_row("P1", "2024-01-02", 5.0));

        let bundle = FeatureExtractor::new().extract(&table, None).unwrap();
        assert_eq!(bundle.format, DataFormat::Unified);
        assert!(bundle.has_sales_data);
        assert_eq!(bundle.products_with_sales_data, 1);
        assert_eq!(
            bundle.as_of_date,
            Some(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap())
        );

        let p1 = &bundle.table().rows()[0];
        assert_eq!(p1.number(DAILY_SALES_COLUMN), Some(5.0));
        let p2 = &bundle.table().rows()[1];
        assert!(p2.is_null(DAILY_SALES_COLUMN));
    }

    #[test]
    fn unified_without_sales_rows_has_no_sales_data() {
        let mut table = unified_table();
        table.push(inventory_row("P1", "Widget", 10.0, 100.0));

        let bundle = FeatureExtractor::new().extract(&table, None).unwrap();
        assert!(!bundle.has_sales_data);
        assert_eq!(bundle.products_with_sales_data, 0);
        assert!(!bundle.table().has_column(DAILY_SALES_COLUMN));
    }

    #[test]
    fn unified_bad_sales_date_is_fatal() {
        let mut table = unified_table();
        table.push(inventory_row("P1", "Widget", 10.0, 100.0));
        table.push(sales_row("P1", "not-a-date", 5.0));

        let err = FeatureExtractor::new().extract(&table, None).unwrap_err();
        assert!(matches!(err, AnalystError::FeatureExtraction(_)));
    }

    #[test]
    fn legacy_bad_sales_table_is_non_fatal() {
        let inventory = {
            let mut t = Table::new(vec![
                "product_id".into(),
                "product_name".into(),
                "quantity".into(),
                "price".into(),
            ]);
            let mut row = Row::new();
            row.set("product_id", Value::Text("P1".into()));
            row.set("product_name", Value::Text("Widget".into()));
            row.set("quantity", Value::Number(10.0));
            row.set("price", Value::Number(3.0));
            t.push(row);
            t
        };
        let sales = {
            let mut t = Table::new(vec![
                "date".into(),
                "product_id".into(),
                "units_sold".into(),
            ]);
            t.push(sales_row("P1", "garbage", 5.0));
            t
        };

        let bundle = FeatureExtractor::new()
            .extract(&inventory, Some(&sales))
            .unwrap();
        assert!(!bundle.has_sales_data);
        assert!(bundle.sales_processing_error.is_some());
    }

    #[test]
    fn column_stats_cover_numeric_and_categorical() {
        let mut table = unified_table();
        table.push(inventory_row("P1", "Widget", 10.0, 20.0));
        table.push(inventory_row("P2", "Widget", 30.0, 40.0));

        let bundle = FeatureExtractor::new().extract(&table, None).unwrap();
        let price = bundle.column_stats.numeric("price").unwrap();
        assert!((price.sum - 40.0).abs() < 1e-9);
        assert!((price.mean - 20.0).abs() < 1e-9);
        assert!((price.min - 10.0).abs() < 1e-9);
        assert!((price.max - 30.0).abs() < 1e-9);
        // sample std of {10, 30}
        assert!((price.std - 14.142135623730951).abs() < 1e-9);

        let names = bundle.column_stats.categorical("product_name").unwrap();
        assert_eq!(names.unique_count, 1);
        assert_eq!(names.value_counts, vec![("Widget".to_string(), 2)]);
    }

    #[test]
    fn parse_date_accepts_common_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap();
        assert_eq!(parse_date("2024-01-31"), Some(expected));
        assert_eq!(parse_date("2024/01/31"), Some(expected));
        assert_eq!(parse_date("01/31/2024"), Some(expected));
        assert_eq!(parse_date("2024-01-31T08:30:00Z"), Some(expected));
        assert_eq!(parse_date("yesterday"), None);
    }
}
