use std::sync::Arc;

use polars::prelude::*;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::error::InsightError;
use crate::loader::{load_table, SourceFile};
use crate::normalize::normalize_table;
use crate::schema::{accident, household, individual, registration, table};
use crate::table::require_columns;

/// The four upload slots of a session. Computation starts only once every
/// slot is filled.
#[derive(Debug, Clone, Default)]
pub struct Uploads {
    pub registration: Option<SourceFile>,
    pub household: Option<SourceFile>,
    pub individual: Option<SourceFile>,
    pub accident: Option<SourceFile>,
}

impl Uploads {
    fn slots(&self) -> [(&'static str, Option<&SourceFile>); 4] {
        [
            (table::REGISTRATION, self.registration.as_ref()),
            (table::HOUSEHOLD, self.household.as_ref()),
            (table::INDIVIDUAL, self.individual.as_ref()),
            (table::ACCIDENT, self.accident.as_ref()),
        ]
    }

    /// Names of the empty slots, in slot order.
    pub fn missing(&self) -> Vec<String> {
        self.slots()
            .into_iter()
            .filter(|(_, file)| file.is_none())
            .map(|(name, _)| name.to_string())
            .collect()
    }

    /// All four files in slot order, or a single missing-input error.
    pub fn require_all(&self) -> Result<[&SourceFile; 4], InsightError> {
        match (
            &self.registration,
            &self.household,
            &self.individual,
            &self.accident,
        ) {
            (Some(r), Some(h), Some(i), Some(a)) => Ok([r, h, i, a]),
            _ => Err(InsightError::MissingInput(self.missing())),
        }
    }
}

/// The four normalized survey tables of one session.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub registration: DataFrame,
    pub household: DataFrame,
    pub individual: DataFrame,
    pub accident: DataFrame,
}

impl Dataset {
    /// Check each table's required columns, then normalize it.
    pub fn from_tables(
        registration: DataFrame,
        household: DataFrame,
        individual: DataFrame,
        accident: DataFrame,
    ) -> Result<Self, InsightError> {
        require_columns(&registration, table::REGISTRATION, &registration::REQUIRED)?;
        require_columns(&household, table::HOUSEHOLD, &household::REQUIRED)?;
        require_columns(&individual, table::INDIVIDUAL, &individual::REQUIRED)?;
        require_columns(&accident, table::ACCIDENT, &accident::REQUIRED)?;

        Ok(Self {
            registration: normalize_table(&registration)?,
            household: normalize_table(&household)?,
            individual: normalize_table(&individual)?,
            accident: normalize_table(&accident)?,
        })
    }

    pub fn load(uploads: &Uploads) -> Result<Self, InsightError> {
        let [r, h, i, a] = uploads.require_all()?;
        Self::from_tables(load_table(r)?, load_table(h)?, load_table(i)?, load_table(a)?)
    }
}

/// Content hash of an upload set. File names take part so that swapping two
/// slots' files changes the fingerprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    pub fn of(files: &[&SourceFile]) -> Self {
        let mut hasher = Sha256::new();
        for file in files {
            hasher.update((file.name.len() as u64).to_le_bytes());
            hasher.update(file.name.as_bytes());
            hasher.update((file.bytes.len() as u64).to_le_bytes());
            hasher.update(&file.bytes);
        }
        Self(hasher.finalize().into())
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

/// Memoizes load-and-normalize for the latest upload set. Derived metrics
/// are recomputed by callers on every interaction; only parsing is cached.
#[derive(Debug, Default)]
pub struct SessionCache {
    entry: Option<(Fingerprint, Arc<Dataset>)>,
    loads: usize,
}

impl SessionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached dataset when the uploads are unchanged, otherwise
    /// parse them and replace the cache entry.
    pub fn load(&mut self, uploads: &Uploads) -> Result<Arc<Dataset>, InsightError> {
        let files = uploads.require_all()?;
        let fingerprint = Fingerprint::of(&files);

        if let Some((cached, dataset)) = &self.entry {
            if *cached == fingerprint {
                debug!(fingerprint = %fingerprint.to_hex(), "session cache hit");
                return Ok(Arc::clone(dataset));
            }
        }

        let dataset = Arc::new(Dataset::load(uploads)?);
        self.loads += 1;
        info!(fingerprint = %fingerprint.to_hex(), "loaded upload set");
        self.entry = Some((fingerprint, Arc::clone(&dataset)));
        Ok(dataset)
    }

    pub fn is_cached(&self, uploads: &Uploads) -> bool {
        match (&self.entry, uploads.require_all()) {
            (Some((cached, _)), Ok(files)) => *cached == Fingerprint::of(&files),
            _ => false,
        }
    }

    /// Drop the cached dataset, e.g. when a new file is uploaded.
    pub fn invalidate(&mut self) {
        self.entry = None;
    }

    /// Number of times files were actually parsed.
    pub fn loads(&self) -> usize {
        self.loads
    }
}
