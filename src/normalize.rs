use polars::prelude::*;
use serde_json::Value;
use tracing::debug;

use crate::error::InsightError;
use crate::schema::common;

/// Re-serialize cells that hold a JSON object into canonical compact JSON
/// (sorted keys, no whitespace). Anything that is not a JSON object, or does
/// not parse, is left untouched. Never fails on cell content.
pub fn flatten_structured_cells(df: &DataFrame) -> Result<DataFrame, InsightError> {
    let mut columns: Vec<Column> = Vec::with_capacity(df.width());
    let mut flattened = 0usize;

    for column in df.get_columns() {
        if column.dtype() != &DataType::String {
            columns.push(column.clone());
            continue;
        }
        let values: Vec<Option<String>> = column
            .str()?
            .into_iter()
            .map(|cell| {
                cell.map(|raw| match canonical_object(raw) {
                    Some(json) => {
                        flattened += 1;
                        json
                    }
                    None => raw.to_string(),
                })
            })
            .collect();
        columns.push(Column::new(column.name().clone(), values));
    }

    if flattened > 0 {
        debug!(cells = flattened, "flattened structured cells");
    }
    Ok(DataFrame::new(columns)?)
}

fn canonical_object(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if !trimmed.starts_with('{') {
        return None;
    }
    match serde_json::from_str::<Value>(trimmed) {
        Ok(value @ Value::Object(_)) => serde_json::to_string(&value).ok(),
        _ => None,
    }
}

/// Keep only the trailing four characters of the birth year. Purely lexical,
/// so prefixes left by manual entry (`"né en 1984"`, `"01/01/1984"`) collapse
/// to the year. Tables without the column are returned unchanged.
pub fn truncate_birth_year(df: &DataFrame) -> Result<DataFrame, InsightError> {
    let Ok(column) = df.column(common::BIRTH_YEAR) else {
        return Ok(df.clone());
    };
    let as_text = column.cast(&DataType::String)?;
    let values: Vec<Option<String>> = as_text
        .str()?
        .into_iter()
        .map(|cell| cell.map(last_four))
        .collect();

    let mut out = df.clone();
    out.with_column(Column::new(common::BIRTH_YEAR.into(), values))?;
    Ok(out)
}

fn last_four(raw: &str) -> String {
    let chars: Vec<char> = raw.chars().collect();
    let start = chars.len().saturating_sub(4);
    chars[start..].iter().collect()
}

/// Full normalization pass applied once per loaded table.
pub fn normalize_table(df: &DataFrame) -> Result<DataFrame, InsightError> {
    let df = flatten_structured_cells(df)?;
    truncate_birth_year(&df)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn strings(df: &DataFrame, name: &str) -> Vec<Option<String>> {
        df.column(name)
            .unwrap()
            .str()
            .unwrap()
            .into_iter()
            .map(|v| v.map(str::to_string))
            .collect()
    }

    #[test]
    fn json_objects_are_canonicalized() {
        let df = DataFrame::new(vec![Column::new(
            "answer".into(),
            &[
                Some(r#"{ "b": 1, "a": "x" }"#),
                Some("plain text"),
                Some("{not json"),
                Some("[1, 2]"),
                None,
            ],
        )])
        .unwrap();

        let out = flatten_structured_cells(&df).unwrap();
        assert_eq!(
            strings(&out, "answer"),
            vec![
                Some(r#"{"a":"x","b":1}"#.to_string()),
                Some("plain text".to_string()),
                Some("{not json".to_string()),
                Some("[1, 2]".to_string()),
                None,
            ]
        );
    }

    #[test]
    fn non_string_columns_pass_through() {
        let df = DataFrame::new(vec![Column::new("n".into(), &[1i64, 2, 3])]).unwrap();
        let out = flatten_structured_cells(&df).unwrap();
        assert_eq!(out.column("n").unwrap().dtype(), &DataType::Int64);
    }

    #[test]
    fn birth_year_keeps_last_four_characters() {
        let df = DataFrame::new(vec![Column::new(
            common::BIRTH_YEAR.into(),
            &[Some("1984"), Some("né en 1990"), Some("01/02/1975"), Some("75"), None],
        )])
        .unwrap();

        let out = truncate_birth_year(&df).unwrap();
        assert_eq!(
            strings(&out, common::BIRTH_YEAR),
            vec![
                Some("1984".to_string()),
                Some("1990".to_string()),
                Some("1975".to_string()),
                Some("75".to_string()),
                None,
            ]
        );
    }

    #[test]
    fn numeric_birth_year_is_cast_to_text() {
        let df = DataFrame::new(vec![Column::new(common::BIRTH_YEAR.into(), &[1984i64, 2001])])
            .unwrap();
        let out = truncate_birth_year(&df).unwrap();
        assert_eq!(
            strings(&out, common::BIRTH_YEAR),
            vec![Some("1984".to_string()), Some("2001".to_string())]
        );
    }

    #[test]
    fn table_without_birth_year_is_unchanged() {
        let df = DataFrame::new(vec![Column::new("x".into(), &["a"])]).unwrap();
        let out = normalize_table(&df).unwrap();
        assert_eq!(out.shape(), (1, 1));
    }
}
