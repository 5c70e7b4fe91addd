//! Schema validation.
//!
//! Confirms a raw table matches one of the two supported shapes before any
//! computation runs. Validation failures are fatal for the whole analysis.

use analyst_core::{AnalystError, AnalystResult, BusinessContext, ColumnType, Table, Value};

use crate::extractor::{detect_format, DataFormat};

/// Validates incoming tables against the expected schema and constraints.
pub struct SchemaValidator {
    required_columns: Vec<String>,
    column_types: Vec<(String, ColumnType)>,
}

impl SchemaValidator {
    pub fn new(required_columns: Vec<String>, column_types: Vec<(String, ColumnType)>) -> Self {
        Self {
            required_columns,
            column_types,
        }
    }

    /// Build a validator from the context's declared legacy schema.
    pub fn from_context(context: &BusinessContext) -> Self {
        Self::new(
            context.required_columns().to_vec(),
            context.column_types().to_vec(),
        )
    }

    /// Validate table structure and content for whichever format is detected.
    pub fn validate(&self, table: &Table) -> AnalystResult<()> {
        if table.is_empty() {
            return Err(AnalystError::DataValidation("input table is empty".into()));
        }

        match detect_format(table) {
            DataFormat::Unified => self.validate_unified(table),
            DataFormat::Legacy => self.validate_legacy(table),
        }
    }

    fn validate_unified(&self, table: &Table) -> AnalystResult<()> {
        let required = ["as_of_date", "product_id", "starting_quantity"];
        let missing: Vec<&str> = required
            .iter()
            .filter(|c| !table.has_column(c))
            .copied()
            .collect();
        if !missing.is_empty() {
            return Err(AnalystError::DataValidation(format!(
                "unified format missing required columns: {}",
                missing.join(", ")
            )));
        }

        let mut has_inventory_row = false;
        for row in table.rows() {
            let is_inventory = !row.is_null("starting_quantity");
            let is_sales = !row.is_null("date") && !row.is_null("units_sold");

            if is_inventory {
                has_inventory_row = true;
                if row.is_null("product_id") {
                    return Err(AnalystError::DataValidation(
                        "all inventory rows must have a product_id".into(),
                    ));
                }
            }
            if is_sales && row.is_null("product_id") {
                return Err(AnalystError::DataValidation(
                    "all sales rows must have a product_id".into(),
                ));
            }
        }

        if !has_inventory_row {
            return Err(AnalystError::DataValidation(
                "unified format must have at least one row with starting_quantity \
                 (inventory snapshot)"
                    .into(),
            ));
        }

        Ok(())
    }

    fn validate_legacy(&self, table: &Table) -> AnalystResult<()> {
        let missing: Vec<&str> = self
            .required_columns
            .iter()
            .filter(|c| !table.has_column(c))
            .map(String::as_str)
            .collect();
        if !missing.is_empty() {
            return Err(AnalystError::DataValidation(format!(
                "missing required columns: {}",
                missing.join(", ")
            )));
        }

        for (column, expected) in &self.column_types {
            if !table.has_column(column) {
                continue;
            }
            for row in table.rows() {
                let value = row.get(column);
                if value.is_null() {
                    continue;
                }
                if !coercible(value, *expected) {
                    return Err(AnalystError::DataValidation(format!(
                        "column '{}' has incorrect type: expected {}, got '{}'",
                        column,
                        expected,
                        value.display_string().unwrap_or_default()
                    )));
                }
            }
        }

        let with_nulls: Vec<&str> = self
            .required_columns
            .iter()
            .filter(|column| table.rows().iter().any(|row| row.is_null(column)))
            .map(String::as_str)
            .collect();
        if !with_nulls.is_empty() {
            return Err(AnalystError::DataValidation(format!(
                "required columns contain null values: {}",
                with_nulls.join(", ")
            )));
        }

        Ok(())
    }
}

/// Whether a non-null cell can be coerced to the declared column type.
/// Numeric cells coerce to integer by truncation, matching how typed
/// ingestion has always treated them.
fn coercible(value: &Value, expected: ColumnType) -> bool {
    match expected {
        ColumnType::Text => true,
        ColumnType::Float => match value {
            Value::Number(_) => true,
            Value::Text(s) => s.trim().parse::<f64>().is_ok(),
            Value::Null => true,
        },
        ColumnType::Integer => match value {
            Value::Number(n) => n.is_finite(),
            Value::Text(s) => s.trim().parse::<i64>().is_ok(),
            Value::Null => true,
        },
    }
}
