//! accident-insights - build the dashboard tables from the four survey exports
//!
//! Prints every report table (or only `--table <name>`) to stdout, and
//! optionally writes them as CSV files to `--out-dir`.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use accident_insights::{Dataset, PipelineConfig, Report, SourceFile, Uploads};

#[derive(Parser)]
#[command(name = "accident-insights")]
#[command(version)]
#[command(about = "Risk-analysis tables from the accident survey exports", long_about = None)]
struct Cli {
    /// Registration export (.xlsx or .csv)
    #[arg(long)]
    registration: Option<PathBuf>,

    /// Household export (.xlsx or .csv)
    #[arg(long)]
    household: Option<PathBuf>,

    /// Individual export (.xlsx or .csv)
    #[arg(long)]
    individual: Option<PathBuf>,

    /// Accident export (.xlsx or .csv)
    #[arg(long)]
    accident: Option<PathBuf>,

    /// Categories below this share of the most frequent one become "Autres"
    #[arg(long, default_value = "0.01")]
    other_ratio: f64,

    /// BMI values at or above this are treated as measurement errors
    #[arg(long, default_value = "60")]
    bmi_cutoff: f64,

    /// Year ages are computed against (defaults to the current year)
    #[arg(long)]
    reference_year: Option<i32>,

    /// Only print this table
    #[arg(long)]
    table: Option<String>,

    /// Write every table as <name>.csv into this directory
    #[arg(long)]
    out_dir: Option<PathBuf>,
}

fn main() -> ExitCode {
    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")));
    tracing_subscriber::registry().with(stderr_layer).init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), accident_insights::InsightError> {
    let load = |path: Option<PathBuf>| path.map(SourceFile::from_path).transpose();
    let uploads = Uploads {
        registration: load(cli.registration)?,
        household: load(cli.household)?,
        individual: load(cli.individual)?,
        accident: load(cli.accident)?,
    };

    let missing = uploads.missing();
    if !missing.is_empty() {
        warn!(
            "Veuillez télécharger tous les fichiers nécessaires pour commencer l'analyse (manquants : {}).",
            missing.join(", ")
        );
        return Ok(());
    }

    let mut config = PipelineConfig::default()
        .with_other_ratio(cli.other_ratio)
        .with_bmi_cutoff(cli.bmi_cutoff);
    if let Some(year) = cli.reference_year {
        config = config.with_reference_year(year);
    }

    let dataset = Dataset::load(&uploads)?;
    let report = Report::assemble(&dataset, &config)?;

    for dropped in report.dropped() {
        warn!(stage = dropped.stage, rows = dropped.rows, "rows excluded");
    }

    match cli.table.as_deref() {
        Some(name) => match report.table(name) {
            Some(frame) => println!("{name}\n{frame}"),
            None => {
                let known: Vec<&str> = report.tables().iter().map(|t| t.name).collect();
                return Err(accident_insights::InsightError::Validation(format!(
                    "unknown table '{name}', expected one of: {}",
                    known.join(", ")
                )));
            }
        },
        None => {
            for t in report.tables() {
                println!("{}\n{}\n", t.name, t.frame);
            }
        }
    }

    if let Some(dir) = cli.out_dir {
        report.write_csv_dir(&dir)?;
    }
    Ok(())
}
