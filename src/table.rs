use polars::prelude::*;

use crate::error::InsightError;
use crate::schema::common;

/// Fail fast when any of `required` is absent from `df`.
pub fn require_columns(df: &DataFrame, table: &str, required: &[&str]) -> Result<(), InsightError> {
    let schema = df.schema();
    for &col_name in required {
        if !schema.contains(col_name) {
            return Err(InsightError::missing_column(table, col_name));
        }
    }
    Ok(())
}

/// Cell text with surrounding whitespace removed.
pub(crate) fn trimmed(column: &str) -> Expr {
    col(column)
        .cast(DataType::String)
        .str()
        .strip_chars(lit(" \t\r\n"))
}

/// Read a column as strings whatever its stored dtype.
pub fn string_column(
    df: &DataFrame,
    table: &str,
    column: &str,
) -> Result<StringChunked, InsightError> {
    let c = df
        .column(column)
        .map_err(|_| InsightError::missing_column(table, column))?;
    let c = c.cast(&DataType::String)?;
    Ok(c.str()?.clone())
}

/// Lenient numeric parse for hand-typed survey answers: trims whitespace and
/// accepts a decimal comma. Non-finite results are rejected.
pub fn parse_number(raw: &str) -> Option<f64> {
    let cleaned = raw.trim().replace(',', ".");
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Distinct non-null, non-blank volunteer ids of a table.
pub fn distinct_volunteers(
    df: &DataFrame,
    table: &str,
) -> Result<std::collections::HashSet<String>, InsightError> {
    let ids = string_column(df, table, common::VOLUNTEER_ID)?;
    Ok(ids
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect())
}
