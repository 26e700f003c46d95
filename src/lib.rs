//! Risk-analysis pipeline for the accident survey dashboard.
//!
//! Four survey tables (registration, household, individual, accident) are
//! loaded once per upload set, normalized, and turned into the tidy tables
//! the dashboard renders. See [`report::Report::assemble`].

pub mod bucketize;
pub mod config;
pub mod error;
pub mod join;
pub mod loader;
pub mod metrics;
pub mod normalize;
pub mod report;
pub mod schema;
pub mod session;
pub mod table;
pub mod temporal;

#[cfg(feature = "python")]
mod python;

pub use config::PipelineConfig;
pub use error::InsightError;
pub use loader::{load_table, SourceFile};
pub use report::Report;
pub use session::{Dataset, SessionCache, Uploads};
