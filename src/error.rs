#[cfg(feature = "python")]
use pyo3::exceptions::PyRuntimeError;
#[cfg(feature = "python")]
use pyo3::PyErr;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum InsightError {
    #[error("Missing input files: {}", .0.join(", "))]
    MissingInput(Vec<String>),

    #[error("Missing column '{column}' in table '{table}'")]
    MissingColumn { table: String, column: String },

    #[error("Cannot parse '{value}' in column '{column}'")]
    Parse { column: String, value: String },

    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Spreadsheet error: {0}")]
    Spreadsheet(String),

    #[error("Validation: {0}")]
    Validation(String),
}

impl InsightError {
    pub fn missing_column(table: &str, column: &str) -> Self {
        InsightError::MissingColumn {
            table: table.to_string(),
            column: column.to_string(),
        }
    }
}

impl From<calamine::XlsxError> for InsightError {
    fn from(err: calamine::XlsxError) -> Self {
        InsightError::Spreadsheet(err.to_string())
    }
}

#[cfg(feature = "python")]
impl From<InsightError> for PyErr {
    fn from(err: InsightError) -> PyErr {
        PyRuntimeError::new_err(err.to_string())
    }
}
