use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use chbmit_annotate::{annotate_dataset, AdvancePolicy, AnnotateConfig};
use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

#[derive(Clone, Copy, ValueEnum)]
enum Advance {
    Single,
    Exhaustive,
}

impl From<Advance> for AdvancePolicy {
    fn from(advance: Advance) -> Self {
        match advance {
            Advance::Single => AdvancePolicy::Single,
            Advance::Exhaustive => AdvancePolicy::Exhaustive,
        }
    }
}

#[derive(Parser)]
#[command(name = "annotate-chbmit", version, about = "Cut CHB-MIT recordings into labeled seizure-prediction windows")]
struct Args {
    /// Directory holding one sub-directory per patient (chb01, chb02, ...)
    data_dir: PathBuf,

    /// Threads writing windows
    #[arg(long, default_value_t = 4)]
    n_jobs: usize,

    /// Interictal/preictal window length in seconds
    #[arg(long, default_value_t = 30)]
    window_size: u32,

    /// Interictal/preictal window stride in seconds
    #[arg(long, default_value_t = 15)]
    window_stride: u32,

    /// Seizure onset period in minutes
    #[arg(long, default_value_t = 30)]
    sop: u32,

    /// Seizure prediction horizon in minutes
    #[arg(long, default_value_t = 5)]
    sph: u32,

    /// Hours kept clear of seizures around interictal intervals
    #[arg(long, default_value_t = 4)]
    interictal_hour: u32,

    /// How allowed intervals are matched to recordings
    #[arg(long, value_enum, default_value_t = Advance::Exhaustive)]
    advance: Advance,

    /// Only these patients (comma-separated)
    #[arg(long, value_delimiter = ',')]
    patients: Option<Vec<String>>,
}

fn main() -> Result<ExitCode> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let config = AnnotateConfig {
        window_size: args.window_size,
        window_stride: args.window_stride,
        sop: args.sop,
        sph: args.sph,
        interictal_hour: args.interictal_hour,
        n_jobs: args.n_jobs,
        advance: args.advance.into(),
        patients: args.patients,
    };

    let report = annotate_dataset(&args.data_dir, &config)
        .with_context(|| format!("annotating {}", args.data_dir.display()))?;

    println!(
        "Annotated {} patients, {} windows",
        report.patients.len(),
        report.total_windows()
    );
    for (patient, error) in &report.failures {
        eprintln!("{}: {}", patient, error);
    }

    Ok(if report.is_success() { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}
