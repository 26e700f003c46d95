use std::collections::HashSet;
use std::io::Cursor;
use std::path::Path;

use calamine::{Data, DataType as _, Reader, Xlsx};
use polars::prelude::*;
use tracing::info;

use crate::error::InsightError;
use crate::table::trimmed;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Xlsx,
    Csv,
}

impl SourceFormat {
    pub fn from_name(name: &str) -> Result<Self, InsightError> {
        let extension = Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match extension.as_deref() {
            Some("xlsx") => Ok(SourceFormat::Xlsx),
            Some("csv") => Ok(SourceFormat::Csv),
            _ => Err(InsightError::Validation(format!(
                "unsupported file '{name}', expected .xlsx or .csv"
            ))),
        }
    }
}

/// An uploaded file: its original name and raw content.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl SourceFile {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, InsightError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self { name, bytes })
    }
}

/// Load a file into a DataFrame with every column as String dtype.
/// Header names and cells are trimmed; empty cells become null.
pub fn load_table(file: &SourceFile) -> Result<DataFrame, InsightError> {
    let df = match SourceFormat::from_name(&file.name)? {
        SourceFormat::Xlsx => {
            let (header, rows) = read_xlsx(file)?;
            to_frame(&file.name, header, rows)?
        }
        SourceFormat::Csv => read_csv(file)?,
    };
    info!(file = %file.name, rows = df.height(), columns = df.width(), "loaded table");
    Ok(df)
}

type Cells = (Vec<Option<String>>, Vec<Vec<Option<String>>>);

fn read_xlsx(file: &SourceFile) -> Result<Cells, InsightError> {
    let mut workbook: Xlsx<_> = Xlsx::new(Cursor::new(file.bytes.as_slice()))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| InsightError::Spreadsheet(format!("{}: no worksheet found", file.name)))??;

    let mut rows = range.rows();
    let header = rows
        .next()
        .map(|r| r.iter().map(cell_text).collect())
        .unwrap_or_default();
    let body: Vec<Vec<Option<String>>> =
        rows.map(|r| r.iter().map(cell_text).collect()).collect();
    Ok((header, body))
}

/// Spreadsheet dates are rendered day-first so they share the text parser.
fn cell_text(cell: &Data) -> Option<String> {
    if cell.is_empty() {
        return None;
    }
    if cell.is_datetime() {
        if let Some(dt) = cell.as_datetime() {
            let format = if dt.time() == chrono::NaiveTime::MIN {
                "%d/%m/%Y"
            } else {
                "%d/%m/%Y %H:%M:%S"
            };
            return Some(dt.format(format).to_string());
        }
    }
    let text = cell.as_string().unwrap_or_else(|| cell.to_string());
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

/// The header row is read as data so that duplicate names reach
/// [`column_names`] unchanged.
fn read_csv(file: &SourceFile) -> Result<DataFrame, InsightError> {
    let raw = CsvReadOptions::default()
        .with_has_header(false)
        .with_infer_schema_length(Some(0))
        .with_parse_options(
            CsvParseOptions::default()
                .with_separator(sniff_delimiter(&file.bytes))
                .with_truncate_ragged_lines(true),
        )
        .into_reader_with_file_handle(Cursor::new(file.bytes.as_slice()))
        .finish()?;

    let mut header = Vec::with_capacity(raw.width());
    for column in raw.get_columns() {
        header.push(column.str()?.get(0).map(str::to_string));
    }
    let names = column_names(&file.name, header)?;

    let cells: Vec<Expr> = raw
        .get_column_names_str()
        .into_iter()
        .zip(&names)
        .map(|(raw_name, name)| {
            when(trimmed(raw_name).eq(lit("")))
                .then(lit(NULL).cast(DataType::String))
                .otherwise(trimmed(raw_name))
                .alias(name.as_str())
        })
        .collect();
    Ok(raw.slice(1, raw.height()).lazy().select(cells).collect()?)
}

/// Spreadsheet exports in French locales use `;`. Only the header record is
/// inspected, and separators inside quoted names are not counted.
fn sniff_delimiter(bytes: &[u8]) -> u8 {
    let (mut semicolons, mut commas) = (0usize, 0usize);
    let mut quoted = false;
    for &b in bytes {
        match b {
            b'"' => quoted = !quoted,
            b'\n' if !quoted => break,
            b';' if !quoted => semicolons += 1,
            b',' if !quoted => commas += 1,
            _ => {}
        }
    }
    if semicolons > commas {
        b';'
    } else {
        b','
    }
}

/// Trimmed header names. Blank names become `column_N` (1-based, as polars
/// names them); duplicates after trimming are rejected.
fn column_names(file_name: &str, header: Vec<Option<String>>) -> Result<Vec<String>, InsightError> {
    let names: Vec<String> = header
        .into_iter()
        .enumerate()
        .map(|(i, h)| {
            let h = h.unwrap_or_default();
            let h = h.trim_matches(|c: char| c.is_whitespace() || c == '\u{feff}');
            if h.is_empty() {
                format!("column_{}", i + 1)
            } else {
                h.to_string()
            }
        })
        .collect();

    let mut seen = HashSet::new();
    for n in &names {
        if !seen.insert(n.as_str()) {
            return Err(InsightError::Validation(format!(
                "{file_name}: duplicate column '{n}'"
            )));
        }
    }
    Ok(names)
}

fn to_frame(
    name: &str,
    header: Vec<Option<String>>,
    rows: Vec<Vec<Option<String>>>,
) -> Result<DataFrame, InsightError> {
    let names = column_names(name, header)?;
    let columns: Vec<Column> = names
        .iter()
        .enumerate()
        .map(|(i, n)| {
            let values: Vec<Option<&str>> = rows
                .iter()
                .map(|r| r.get(i).and_then(|v| v.as_deref()))
                .collect();
            Column::new(n.as_str().into(), &values)
        })
        .collect();
    Ok(DataFrame::new(columns)?)
}
