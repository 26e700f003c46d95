use std::collections::HashMap;

use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use pyo3::types::PyModule;
use pyo3_polars::PyDataFrame;

use crate::bucketize::bucketize_column;
use crate::config::PipelineConfig;
use crate::join::join_on_volunteer;
use crate::loader::SourceFile;
use crate::report::{DroppedRows, Report};
use crate::schema;
use crate::session::{SessionCache, Uploads};
use crate::temporal::aggregate_monthly;

/// Session object held by the dashboard: four upload slots, the parse cache
/// and the pipeline settings.
#[pyclass(name = "AccidentInsights")]
pub struct PyInsights {
    config: PipelineConfig,
    uploads: Uploads,
    cache: SessionCache,
    last_dropped: Vec<DroppedRows>,
}

#[pymethods]
impl PyInsights {
    #[new]
    #[pyo3(signature = (other_ratio=0.01, other_label="Autres", bmi_cutoff=60.0, reference_year=None))]
    fn new(
        other_ratio: f64,
        other_label: &str,
        bmi_cutoff: f64,
        reference_year: Option<i32>,
    ) -> PyResult<Self> {
        let mut config = PipelineConfig::default()
            .with_other_ratio(other_ratio)
            .with_bmi_cutoff(bmi_cutoff);
        config.other_label = other_label.to_string();
        if let Some(year) = reference_year {
            config = config.with_reference_year(year);
        }
        config.validate()?;
        Ok(Self {
            config,
            uploads: Uploads::default(),
            cache: SessionCache::new(),
            last_dropped: Vec::new(),
        })
    }

    // ── Uploads ─────────────────────────────────────────────────────────────

    /// Fill one slot ("inscription", "foyer", "individu" or "accident") with
    /// the raw content of an uploaded .xlsx or .csv file.
    fn upload(&mut self, slot: &str, filename: &str, content: &[u8]) -> PyResult<()> {
        let file = Some(SourceFile::new(filename, content.to_vec()));
        match slot {
            schema::table::REGISTRATION => self.uploads.registration = file,
            schema::table::HOUSEHOLD => self.uploads.household = file,
            schema::table::INDIVIDUAL => self.uploads.individual = file,
            schema::table::ACCIDENT => self.uploads.accident = file,
            _ => {
                return Err(PyValueError::new_err(format!(
                    "Invalid slot: '{}'. Must be one of {:?}",
                    slot,
                    schema::table::ALL
                )))
            }
        }
        Ok(())
    }

    /// Slots still waiting for a file.
    fn missing(&self) -> Vec<String> {
        self.uploads.missing()
    }

    fn is_ready(&self) -> bool {
        self.uploads.missing().is_empty()
    }

    fn invalidate(&mut self) {
        self.cache.invalidate();
    }

    // ── Report ──────────────────────────────────────────────────────────────

    /// All report tables keyed by name, or None while an upload is missing.
    fn report(&mut self) -> PyResult<Option<HashMap<String, PyDataFrame>>> {
        if !self.is_ready() {
            return Ok(None);
        }
        let dataset = self.cache.load(&self.uploads)?;
        let report = Report::assemble(&dataset, &self.config)?;
        self.last_dropped = report.dropped().to_vec();
        Ok(Some(
            report
                .tables()
                .iter()
                .map(|t| (t.name.to_string(), PyDataFrame(t.frame.clone())))
                .collect(),
        ))
    }

    /// Rows excluded per stage by the last report, as {stage: rows}.
    fn dropped_rows(&self) -> HashMap<String, usize> {
        self.last_dropped
            .iter()
            .map(|d| (d.stage.to_string(), d.rows))
            .collect()
    }

    // ── Standalone transforms ───────────────────────────────────────────────

    #[staticmethod]
    #[pyo3(signature = (df, column, label_name, count_name, other_ratio=0.01, other_label="Autres"))]
    fn bucketize(
        df: PyDataFrame,
        column: &str,
        label_name: &str,
        count_name: &str,
        other_ratio: f64,
        other_label: &str,
    ) -> PyResult<PyDataFrame> {
        let out = bucketize_column(
            &df.0,
            "dataframe",
            column,
            other_ratio,
            other_label,
            label_name,
            count_name,
        )?;
        Ok(PyDataFrame(out))
    }

    #[staticmethod]
    #[pyo3(signature = (df, date_column, count_name, weight_column=None))]
    fn monthly_counts(
        df: PyDataFrame,
        date_column: &str,
        count_name: &str,
        weight_column: Option<&str>,
    ) -> PyResult<PyDataFrame> {
        let out = aggregate_monthly(
            &df.0,
            "dataframe",
            date_column,
            weight_column,
            schema::report::DATE,
            count_name,
        )?;
        Ok(PyDataFrame(out.table))
    }

    #[staticmethod]
    fn join_on_volunteer(left: PyDataFrame, right: PyDataFrame) -> PyResult<PyDataFrame> {
        let out = join_on_volunteer(&left.0, "left", &right.0, "right")?;
        Ok(PyDataFrame(out))
    }
}

/// Export column-name constants as Python submodules
fn add_schema_exports(m: &Bound<'_, PyModule>) -> PyResult<()> {
    let table = PyModule::new(m.py(), "table")?;
    table.add("REGISTRATION", schema::table::REGISTRATION)?;
    table.add("HOUSEHOLD", schema::table::HOUSEHOLD)?;
    table.add("INDIVIDUAL", schema::table::INDIVIDUAL)?;
    table.add("ACCIDENT", schema::table::ACCIDENT)?;
    m.add_submodule(&table)?;

    let accident = PyModule::new(m.py(), "accident")?;
    accident.add("KIND", schema::accident::KIND)?;
    accident.add("LOCATION", schema::accident::LOCATION)?;
    accident.add("DATE", schema::accident::DATE)?;
    accident.add(
        "HOSPITALIZATION_DAYS",
        schema::accident::HOSPITALIZATION_DAYS,
    )?;
    m.add_submodule(&accident)?;

    let report = PyModule::new(m.py(), "report")?;
    report.add("ACCIDENT_TYPE", schema::report::ACCIDENT_TYPE)?;
    report.add("ACCIDENT_LOCATION", schema::report::ACCIDENT_LOCATION)?;
    report.add("ACCIDENT_COUNT", schema::report::ACCIDENT_COUNT)?;
    report.add("INDIVIDUAL_COUNT", schema::report::INDIVIDUAL_COUNT)?;
    report.add("DATE", schema::report::DATE)?;
    report.add("CATEGORY", schema::report::CATEGORY)?;
    report.add("LEVEL", schema::report::LEVEL)?;
    m.add_submodule(&report)?;

    Ok(())
}

#[pymodule]
fn _core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyInsights>()?;
    add_schema_exports(m)?;
    Ok(())
}
