use std::fs::File;
use std::path::Path;

use polars::prelude::*;
use tracing::{debug, info, warn};

use crate::bucketize::{bucketize_column, cross_tabulate, relabel_column};
use crate::config::PipelineConfig;
use crate::error::InsightError;
use crate::join::join_on_volunteer;
use crate::metrics::{
    age_band_distribution, health_ratings, DerivedTable, ordinal_distribution, participation_rate,
    regular_response_rate, severity_distribution, with_age_bands, with_bmi, with_ordinal,
    with_severity, CONSUMPTION_FREQUENCY,
};
use crate::schema::report as cols;
use crate::schema::{accident, common, derived, household, individual, registration, table};
use crate::session::Dataset;
use crate::table::distinct_volunteers;
use crate::temporal::aggregate_monthly;

/// Stable identifiers of the report tables.
pub mod names {
    pub const ACCIDENT_TYPES: &str = "accident_types";
    pub const ACCIDENT_LOCATIONS: &str = "accident_locations";
    pub const ACCIDENTS_BY_MONTH: &str = "accidents_by_month";
    pub const SEVERITY: &str = "severity";
    pub const HOUSING_BY_ACCIDENT_TYPE: &str = "housing_by_accident_type";
    pub const PARTICIPATION: &str = "participation";
    pub const REGISTRATIONS_BY_MONTH: &str = "registrations_by_month";
    pub const AGE_BANDS: &str = "age_bands";
    pub const BMI: &str = "bmi";
    pub const HEALTH_RATINGS: &str = "health_ratings";
    pub const SEX: &str = "sex";
    pub const GENDER: &str = "gender";
    pub const EDUCATION: &str = "education";
    pub const PHYSICAL_ACTIVITY: &str = "physical_activity";
    pub const HAD_ACCIDENT: &str = "had_accident";
    pub const ALCOHOL: &str = "alcohol";
    pub const TOBACCO: &str = "tobacco";
    pub const CANNABIS: &str = "cannabis";
}

#[derive(Debug, Clone)]
pub struct NamedTable {
    pub name: &'static str,
    pub frame: DataFrame,
}

/// Rows a stage excluded under its drop-and-continue policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DroppedRows {
    pub stage: &'static str,
    pub rows: usize,
}

/// Every table the dashboard renders, in display order.
#[derive(Debug, Clone)]
pub struct Report {
    tables: Vec<NamedTable>,
    dropped: Vec<DroppedRows>,
}

impl Report {
    /// Run every derivation over `dataset` and collect the results. The
    /// dataset is never mutated; each stage returns a new table.
    pub fn assemble(dataset: &Dataset, config: &PipelineConfig) -> Result<Self, InsightError> {
        config.validate()?;
        let mut out = Report {
            tables: Vec::new(),
            dropped: Vec::new(),
        };
        let ratio = config.other_ratio;
        let other = config.other_label.as_str();

        // ── Accidents ──
        out.push(
            names::ACCIDENT_TYPES,
            bucketize_column(
                &dataset.accident,
                table::ACCIDENT,
                accident::KIND,
                ratio,
                other,
                cols::ACCIDENT_TYPE,
                cols::ACCIDENT_COUNT,
            )?,
        );
        out.push(
            names::ACCIDENT_LOCATIONS,
            bucketize_column(
                &dataset.accident,
                table::ACCIDENT,
                accident::LOCATION,
                ratio,
                other,
                cols::ACCIDENT_LOCATION,
                cols::ACCIDENT_COUNT,
            )?,
        );

        let monthly = aggregate_monthly(
            &dataset.accident,
            table::ACCIDENT,
            accident::DATE,
            None,
            cols::DATE,
            cols::ACCIDENT_COUNT,
        )?;
        out.push_dropped(names::ACCIDENTS_BY_MONTH, monthly.dropped);
        out.push(names::ACCIDENTS_BY_MONTH, monthly.table);

        let severity = with_severity(&dataset.accident)?;
        out.push_dropped(names::SEVERITY, severity.dropped);
        out.push(names::SEVERITY, severity_distribution(&severity.table)?);

        let accidents = relabel_column(&dataset.accident, table::ACCIDENT, accident::KIND, ratio, other)?;
        let joined = join_on_volunteer(&dataset.household, table::HOUSEHOLD, &accidents, table::ACCIDENT)?;
        out.push(
            names::HOUSING_BY_ACCIDENT_TYPE,
            cross_tabulate(
                &joined,
                "foyer ⋈ accident",
                household::HOUSING_TYPE,
                accident::KIND,
                [cols::HOUSING_TYPE, cols::ACCIDENT_TYPE, cols::ACCIDENT_COUNT],
            )?,
        );

        // ── Participation ──
        let participation = participation(dataset)?;
        out.push_dropped(names::PARTICIPATION, participation.dropped);
        out.push(names::PARTICIPATION, participation.table);

        let enrollments = aggregate_monthly(
            &dataset.registration,
            table::REGISTRATION,
            registration::ENROLLMENT_DATE,
            None,
            cols::DATE,
            cols::REGISTRATION_COUNT,
        )?;
        out.push_dropped(names::REGISTRATIONS_BY_MONTH, enrollments.dropped);
        out.push(names::REGISTRATIONS_BY_MONTH, enrollments.table);

        // ── Individuals (BMI-filtered from here on) ──
        let filtered = with_bmi(&dataset.individual, config.bmi_cutoff)?;
        out.push_dropped(names::BMI, filtered.dropped);
        let individuals = with_age_bands(&filtered.table, config)?;

        out.push(
            names::AGE_BANDS,
            age_band_distribution(&individuals, &config.age_labels)?,
        );
        out.push(
            names::BMI,
            individuals.select([common::VOLUNTEER_ID, derived::BMI])?,
        );

        let ratings = health_ratings(&individuals)?;
        out.push_dropped(names::HEALTH_RATINGS, ratings.dropped);
        out.push(names::HEALTH_RATINGS, ratings.table);

        for (name, column) in [
            (names::SEX, individual::SEX),
            (names::GENDER, individual::GENDER),
            (names::EDUCATION, individual::EDUCATION),
            (names::PHYSICAL_ACTIVITY, individual::PHYSICAL_ACTIVITY),
            (names::HAD_ACCIDENT, individual::HAD_ACCIDENT),
        ] {
            out.push(
                name,
                bucketize_column(
                    &individuals,
                    table::INDIVIDUAL,
                    column,
                    ratio,
                    other,
                    cols::CATEGORY,
                    cols::INDIVIDUAL_COUNT,
                )?,
            );
        }

        for (name, source, target) in [
            (names::ALCOHOL, individual::ALCOHOL, derived::ALCOHOL_LEVEL),
            (names::TOBACCO, individual::TOBACCO, derived::TOBACCO_LEVEL),
            (names::CANNABIS, individual::CANNABIS, derived::CANNABIS_LEVEL),
        ] {
            let levels = with_ordinal(
                &individuals,
                table::INDIVIDUAL,
                source,
                target,
                &CONSUMPTION_FREQUENCY,
            )?;
            out.push(
                name,
                ordinal_distribution(&levels, table::INDIVIDUAL, target)?,
            );
        }

        info!(tables = out.tables.len(), "report assembled");
        Ok(out)
    }

    fn push(&mut self, name: &'static str, frame: DataFrame) {
        debug!(table = name, rows = frame.height(), "report table");
        self.tables.push(NamedTable { name, frame });
    }

    fn push_dropped(&mut self, stage: &'static str, rows: usize) {
        if rows > 0 {
            self.dropped.push(DroppedRows { stage, rows });
        }
    }

    pub fn tables(&self) -> &[NamedTable] {
        &self.tables
    }

    pub fn table(&self, name: &str) -> Option<&DataFrame> {
        self.tables
            .iter()
            .find(|t| t.name == name)
            .map(|t| &t.frame)
    }

    pub fn dropped(&self) -> &[DroppedRows] {
        &self.dropped
    }

    /// Write each table to `<dir>/<name>.csv`.
    pub fn write_csv_dir(&self, dir: &Path) -> Result<(), InsightError> {
        std::fs::create_dir_all(dir)?;
        for t in &self.tables {
            let mut file = File::create(dir.join(format!("{}.csv", t.name)))?;
            let mut frame = t.frame.clone();
            CsvWriter::new(&mut file).finish(&mut frame)?;
        }
        Ok(())
    }
}

/// Participation per downstream table plus the regular-response rate.
/// Without any registered volunteer every rate is null and all four rows
/// are reported as dropped.
fn participation(dataset: &Dataset) -> Result<DerivedTable, InsightError> {
    let registered = distinct_volunteers(&dataset.registration, table::REGISTRATION)?.len();
    let labels = [
        table::HOUSEHOLD,
        table::INDIVIDUAL,
        table::ACCIDENT,
        cols::REGULAR_RESPONSE,
    ];

    let (rates, dropped): (Vec<Option<f64>>, usize) = if registered == 0 {
        warn!(table = table::REGISTRATION, "no registered volunteers, participation is undefined");
        (vec![None; labels.len()], labels.len())
    } else {
        let household = distinct_volunteers(&dataset.household, table::HOUSEHOLD)?.len();
        let individual = distinct_volunteers(&dataset.individual, table::INDIVIDUAL)?.len();
        let rates = vec![
            Some(participation_rate(&dataset.household, table::HOUSEHOLD, registered)?),
            Some(participation_rate(&dataset.individual, table::INDIVIDUAL, registered)?),
            Some(participation_rate(&dataset.accident, table::ACCIDENT, registered)?),
            Some(regular_response_rate(household, individual, registered)?),
        ];
        (rates, 0)
    };
    let table = DataFrame::new(vec![
        Column::new(cols::TABLE.into(), &labels),
        Column::new(cols::PARTICIPATION_RATE.into(), &rates),
    ])?;
    Ok(DerivedTable { table, dropped })
}
