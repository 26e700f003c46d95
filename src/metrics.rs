//! Derived metrics over the individual and accident tables.
//!
//! Every function takes an immutable table and returns a new one. Parse
//! failures follow a drop-and-continue policy: the offending rows are
//! excluded from the derived table and counted in [`DerivedTable::dropped`].

use polars::prelude::*;
use tracing::warn;

use crate::bucketize::count_over_labels;
use crate::config::PipelineConfig;
use crate::error::InsightError;
use crate::schema::table::{ACCIDENT, INDIVIDUAL};
use crate::schema::{accident, common, derived, individual, report};
use crate::table::{distinct_volunteers, parse_number, require_columns, string_column};

/// A derived table together with the number of source rows it excludes.
#[derive(Debug, Clone)]
pub struct DerivedTable {
    pub table: DataFrame,
    pub dropped: usize,
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

// ── Participation ───────────────────────────────────────────────────────────

/// Share of registered volunteers that appear in `target`, in percent with
/// two decimals.
pub fn participation_rate(
    target: &DataFrame,
    table: &str,
    registered: usize,
) -> Result<f64, InsightError> {
    if registered == 0 {
        return Err(InsightError::Validation(
            "no registered volunteers, participation is undefined".to_string(),
        ));
    }
    let present = distinct_volunteers(target, table)?.len();
    Ok(round2(present as f64 / registered as f64 * 100.0))
}

/// Mean participation over the household and individual questionnaires:
/// `(household + individual) / (2 * registered) * 100`.
pub fn regular_response_rate(
    household_volunteers: usize,
    individual_volunteers: usize,
    registered: usize,
) -> Result<f64, InsightError> {
    if registered == 0 {
        return Err(InsightError::Validation(
            "no registered volunteers, participation is undefined".to_string(),
        ));
    }
    let answered = (household_volunteers + individual_volunteers) as f64;
    Ok(round2(answered / (2.0 * registered as f64) * 100.0))
}

// ── BMI ─────────────────────────────────────────────────────────────────────

/// weight (kg) / height (m)². `None` unless both weight and height are
/// positive.
pub fn bmi(weight_kg: f64, height_cm: f64) -> Option<f64> {
    if height_cm <= 0.0 || weight_kg <= 0.0 {
        return None;
    }
    let height_m = height_cm / 100.0;
    Some(weight_kg / (height_m * height_m))
}

/// Add the BMI column and keep only rows with a BMI strictly below `cutoff`.
/// Rows whose weight or height cannot be parsed are dropped as well.
pub fn with_bmi(individuals: &DataFrame, cutoff: f64) -> Result<DerivedTable, InsightError> {
    let weights = string_column(individuals, INDIVIDUAL, individual::WEIGHT_KG)?;
    let heights = string_column(individuals, INDIVIDUAL, individual::HEIGHT_CM)?;

    let values: Vec<Option<f64>> = weights
        .into_iter()
        .zip(heights.into_iter())
        .map(|(w, h)| match (w.and_then(parse_number), h.and_then(parse_number)) {
            (Some(w), Some(h)) => bmi(w, h),
            _ => None,
        })
        .collect();
    let keep: Vec<bool> = values
        .iter()
        .map(|v| matches!(v, Some(b) if *b < cutoff))
        .collect();
    let dropped = keep.iter().filter(|k| !**k).count();

    let mut enriched = individuals.clone();
    enriched.with_column(Column::new(derived::BMI.into(), values))?;
    let mask = Series::new("keep".into(), &keep);
    let table = enriched.filter(mask.bool()?)?;

    if dropped > 0 {
        warn!(dropped, cutoff, "dropped individuals with missing or implausible BMI");
    }
    Ok(DerivedTable { table, dropped })
}

// ── Age bands ───────────────────────────────────────────────────────────────

/// Band label for `age` with left-inclusive bins. Ages outside
/// `[bins[0], bins[last])` have no band.
pub fn age_band<'a>(age: i32, bins: &[u32], labels: &'a [String]) -> Option<&'a str> {
    if age < 0 {
        return None;
    }
    let age = age as u32;
    bins.windows(2)
        .position(|w| w[0] <= age && age < w[1])
        .and_then(|i| labels.get(i))
        .map(String::as_str)
}

/// Add the age and age-band columns computed from the (truncated) birth year.
pub fn with_age_bands(
    individuals: &DataFrame,
    config: &PipelineConfig,
) -> Result<DataFrame, InsightError> {
    let years = string_column(individuals, INDIVIDUAL, common::BIRTH_YEAR)?;

    let ages: Vec<Option<i32>> = years
        .into_iter()
        .map(|y| {
            y.and_then(|y| y.trim().parse::<i32>().ok())
                .map(|y| config.reference_year - y)
        })
        .collect();
    let bands: Vec<Option<&str>> = ages
        .iter()
        .map(|a| a.and_then(|a| age_band(a, &config.age_bins, &config.age_labels)))
        .collect();

    let mut out = individuals.clone();
    out.with_column(Column::new(derived::AGE.into(), &ages))?;
    out.with_column(Column::new(derived::AGE_BAND.into(), &bands))?;
    Ok(out)
}

/// Individuals per age band, every band listed in bin order.
pub fn age_band_distribution(
    individuals: &DataFrame,
    labels: &[String],
) -> Result<DataFrame, InsightError> {
    let labels: Vec<&str> = labels.iter().map(String::as_str).collect();
    count_over_labels(
        individuals,
        INDIVIDUAL,
        derived::AGE_BAND,
        &labels,
        report::AGE_BAND,
        report::INDIVIDUAL_COUNT,
    )
}

// ── Severity ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Grave,
    Leger,
}

impl Severity {
    pub const ALL: [Severity; 2] = [Severity::Grave, Severity::Leger];

    /// Classify from the hospitalization duration in days. Missing,
    /// non-numeric and negative durations are rejected.
    pub fn classify(raw: Option<&str>) -> Result<Severity, InsightError> {
        let value = raw.unwrap_or_default();
        match parse_number(value) {
            Some(days) if days > 0.0 => Ok(Severity::Grave),
            Some(days) if days == 0.0 => Ok(Severity::Leger),
            _ => Err(InsightError::Parse {
                column: accident::HOSPITALIZATION_DAYS.to_string(),
                value: value.to_string(),
            }),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Severity::Grave => "Grave",
            Severity::Leger => "Léger",
        }
    }
}

/// Add the severity column. Rejected rows keep a null severity and are
/// counted in `dropped`; they take no part in severity aggregates.
pub fn with_severity(accidents: &DataFrame) -> Result<DerivedTable, InsightError> {
    let days = string_column(accidents, ACCIDENT, accident::HOSPITALIZATION_DAYS)?;

    let mut dropped = 0usize;
    let labels: Vec<Option<&str>> = days
        .into_iter()
        .map(|d| match Severity::classify(d) {
            Ok(s) => Some(s.label()),
            Err(_) => {
                dropped += 1;
                None
            }
        })
        .collect();

    let mut table = accidents.clone();
    table.with_column(Column::new(derived::SEVERITY.into(), &labels))?;
    if dropped > 0 {
        warn!(dropped, "accidents without a usable hospitalization duration");
    }
    Ok(DerivedTable { table, dropped })
}

/// Accidents per severity, `Grave` first.
pub fn severity_distribution(accidents: &DataFrame) -> Result<DataFrame, InsightError> {
    let labels: Vec<&str> = Severity::ALL.iter().map(Severity::label).collect();
    count_over_labels(
        accidents,
        ACCIDENT,
        derived::SEVERITY,
        &labels,
        report::SEVERITY,
        report::ACCIDENT_COUNT,
    )
}

// ── Ordinal lifestyle scales ────────────────────────────────────────────────

/// Stored for answers that are present but absent from the scale.
pub const UNMAPPED: i32 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ordinal {
    Level(i32),
    Unmapped,
}

impl Ordinal {
    pub fn code(self) -> i32 {
        match self {
            Ordinal::Level(level) => level,
            Ordinal::Unmapped => UNMAPPED,
        }
    }
}

/// Fixed answer → level lookup.
#[derive(Debug, Clone, Copy)]
pub struct OrdinalScale {
    entries: &'static [(&'static str, i32)],
}

/// Consumption frequency, shared by the alcohol, tobacco and cannabis questions.
pub const CONSUMPTION_FREQUENCY: OrdinalScale = OrdinalScale {
    entries: &[
        ("Jamais", 0),
        ("Moins d'une fois par mois", 1),
        ("Une fois par mois", 2),
        ("2 à 4 fois par mois", 3),
        ("2 à 3 fois par semaine", 4),
        ("4 fois ou plus par semaine", 5),
        ("Tous les jours", 6),
    ],
};

impl OrdinalScale {
    pub const fn new(entries: &'static [(&'static str, i32)]) -> Self {
        Self { entries }
    }

    /// Case, surrounding whitespace and apostrophe style are ignored.
    pub fn lookup(&self, answer: &str) -> Ordinal {
        let key = fold(answer);
        self.entries
            .iter()
            .find(|(label, _)| fold(label) == key)
            .map(|&(_, level)| Ordinal::Level(level))
            .unwrap_or(Ordinal::Unmapped)
    }
}

fn fold(s: &str) -> String {
    s.trim().replace('’', "'").to_lowercase()
}

/// Add `target` holding the ordinal code of `source`. Missing answers stay
/// null; unknown answers get [`UNMAPPED`].
pub fn with_ordinal(
    df: &DataFrame,
    table: &str,
    source: &str,
    target: &str,
    scale: &OrdinalScale,
) -> Result<DataFrame, InsightError> {
    let answers = string_column(df, table, source)?;
    let mut unmapped = 0usize;
    let codes: Vec<Option<i32>> = answers
        .into_iter()
        .map(|a| {
            let a = a.filter(|a| !a.trim().is_empty())?;
            let ordinal = scale.lookup(a);
            if ordinal == Ordinal::Unmapped {
                unmapped += 1;
            }
            Some(ordinal.code())
        })
        .collect();

    if unmapped > 0 {
        warn!(column = source, unmapped, "answers outside the ordinal scale");
    }
    let mut out = df.clone();
    out.with_column(Column::new(target.into(), &codes))?;
    Ok(out)
}

/// Individuals per ordinal level, ascending (so [`UNMAPPED`] comes first).
pub fn ordinal_distribution(
    df: &DataFrame,
    table: &str,
    column: &str,
) -> Result<DataFrame, InsightError> {
    require_columns(df, table, &[column])?;
    let out = df
        .clone()
        .lazy()
        .select([col(column).cast(DataType::Int32).alias(report::LEVEL)])
        .filter(col(report::LEVEL).is_not_null())
        .group_by([col(report::LEVEL)])
        .agg([len().cast(DataType::UInt32).alias(report::INDIVIDUAL_COUNT)])
        .sort_by_exprs([col(report::LEVEL)], SortMultipleOptions::default())
        .collect()?;
    Ok(out)
}

// ── Self-rated health ───────────────────────────────────────────────────────

/// Physical vs. mental self-rating pairs. Rows where either rating is missing
/// or outside 1..=10 are dropped.
pub fn health_ratings(individuals: &DataFrame) -> Result<DerivedTable, InsightError> {
    let physical = string_column(individuals, INDIVIDUAL, individual::PHYSICAL_RATING)?;
    let mental = string_column(individuals, INDIVIDUAL, individual::MENTAL_RATING)?;

    let rating = |raw: Option<&str>| raw.and_then(parse_number).filter(|v| (1.0..=10.0).contains(v));
    let mut phys = Vec::new();
    let mut ment = Vec::new();
    for (p, m) in physical.into_iter().zip(mental.into_iter()) {
        if let (Some(p), Some(m)) = (rating(p), rating(m)) {
            phys.push(p);
            ment.push(m);
        }
    }
    let dropped = individuals.height() - phys.len();

    let table = DataFrame::new(vec![
        Column::new(report::PHYSICAL_RATING.into(), &phys),
        Column::new(report::MENTAL_RATING.into(), &ment),
    ])?;
    Ok(DerivedTable { table, dropped })
}
