use chrono::Datelike;

use crate::error::InsightError;

/// Fixed age-band boundaries, left-inclusive: `[lo, hi)`.
pub const AGE_BINS: [u32; 8] = [0, 18, 30, 45, 60, 75, 90, 100];
pub const AGE_LABELS: [&str; 7] = ["0-18", "19-30", "31-45", "46-60", "61-75", "76-90", "91+"];

/// Knobs for one pipeline run. Defaults reproduce the dashboard's behaviour.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Categories below `other_ratio * max_count` are folded into `other_label`.
    pub other_ratio: f64,
    pub other_label: String,
    /// Rows with a BMI at or above this value are treated as measurement errors.
    pub bmi_cutoff: f64,
    pub age_bins: Vec<u32>,
    pub age_labels: Vec<String>,
    /// Ages are computed as `reference_year - birth_year`.
    pub reference_year: i32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            other_ratio: 0.01,
            other_label: "Autres".to_string(),
            bmi_cutoff: 60.0,
            age_bins: AGE_BINS.to_vec(),
            age_labels: AGE_LABELS.iter().map(|s| s.to_string()).collect(),
            reference_year: chrono::Local::now().year(),
        }
    }
}

impl PipelineConfig {
    pub fn with_reference_year(mut self, year: i32) -> Self {
        self.reference_year = year;
        self
    }

    pub fn with_other_ratio(mut self, ratio: f64) -> Self {
        self.other_ratio = ratio;
        self
    }

    pub fn with_bmi_cutoff(mut self, cutoff: f64) -> Self {
        self.bmi_cutoff = cutoff;
        self
    }

    pub fn validate(&self) -> Result<(), InsightError> {
        if !(0.0..=1.0).contains(&self.other_ratio) {
            return Err(InsightError::Validation(format!(
                "other_ratio must be within [0, 1], got {}",
                self.other_ratio
            )));
        }
        if !self.bmi_cutoff.is_finite() || self.bmi_cutoff <= 0.0 {
            return Err(InsightError::Validation(format!(
                "bmi_cutoff must be a positive number, got {}",
                self.bmi_cutoff
            )));
        }
        if self.age_bins.windows(2).any(|w| w[0] >= w[1]) {
            return Err(InsightError::Validation(
                "age_bins must be strictly increasing".to_string(),
            ));
        }
        if self.age_bins.len() != self.age_labels.len() + 1 {
            return Err(InsightError::Validation(format!(
                "{} age bins need {} labels, got {}",
                self.age_bins.len(),
                self.age_bins.len().saturating_sub(1),
                self.age_labels.len()
            )));
        }
        Ok(())
    }
}
