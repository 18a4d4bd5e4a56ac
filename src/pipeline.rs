//! Patient and dataset level annotation runs.
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::allocate::allocate;
use crate::config::AnnotateConfig;
use crate::error::{AnnotateError, Result};
use crate::manifest::{label_counts, write_manifest, MANIFEST_FILE_NAME};
use crate::reconcile::reconcile_dates;
use crate::segment::{EdfSink, SegmentSink, SegmentWriter};
use crate::signal::{EdfSource, SignalSource};
use crate::summary::{summary_path, Summary};
use crate::types::Label;

pub const CONFIG_SNAPSHOT_FILE_NAME: &str = "annotate_config.json";

/// Outcome of one patient's run.
#[derive(Debug, Clone)]
pub struct PatientReport {
    pub patient: String,
    /// `<patient_dir>/interictal_preictal_...`
    pub output_dir: PathBuf,
    pub manifest: PathBuf,
    pub windows: usize,
    pub label_counts: BTreeMap<Label, usize>,
}

/// Outcome of a dataset run. A failed patient does not stop the others.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub patients: Vec<PatientReport>,
    pub failures: Vec<(String, AnnotateError)>,
}

impl BatchReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn total_windows(&self) -> usize {
        self.patients.iter().map(|p| p.windows).sum()
    }
}

/// Runs the whole annotation chain with one worker pool.
pub struct Annotator<'a> {
    config: &'a AnnotateConfig,
    writer: SegmentWriter<'a>,
}

impl<'a> Annotator<'a> {
    pub fn new(config: &'a AnnotateConfig, source: &'a dyn SignalSource, sink: &'a dyn SegmentSink) -> Result<Self> {
        config.validate()?;
        Ok(Annotator { config, writer: SegmentWriter::new(config, source, sink)? })
    }

    /// Annotates the patient whose recordings and `<name>-summary.txt` live
    /// in `patient_dir`.
    pub fn annotate_patient(&self, patient_dir: &Path) -> Result<PatientReport> {
        let patient = patient_name(patient_dir)?;
        tracing::info!(patient = %patient, "annotating");

        let summary = Summary::from_file(&summary_path(patient_dir, &patient))?;
        if let Some(rate) = summary.sampling_rate {
            tracing::debug!(patient = %patient, rate, "summary sampling rate");
        }
        let mut session = summary.into_session(&patient, patient_dir);
        reconcile_dates(&mut session.recordings);
        allocate(&mut session, self.config);

        let output_dir = patient_dir.join(self.config.output_dir_name());
        fs::create_dir_all(&output_dir)?;

        let mut saved = Vec::new();
        for recording in &session.recordings {
            let save_dir = output_dir.join(recording.stem());
            saved.extend(self.writer.write_recording(recording, &save_dir)?);
        }

        let manifest = output_dir.join(MANIFEST_FILE_NAME);
        write_manifest(&manifest, &saved)?;
        let mut snapshot = BufWriter::new(File::create(output_dir.join(CONFIG_SNAPSHOT_FILE_NAME))?);
        serde_json::to_writer_pretty(&mut snapshot, self.config)?;
        snapshot.flush()?;

        let counts = label_counts(&saved);
        for label in Label::ALL {
            tracing::info!(
                patient = %patient,
                label = %label,
                windows = counts.get(&label).copied().unwrap_or(0),
                "label count"
            );
        }
        tracing::info!(patient = %patient, windows = saved.len(), manifest = %manifest.display(), "patient done");

        Ok(PatientReport {
            patient,
            output_dir,
            manifest,
            windows: saved.len(),
            label_counts: counts,
        })
    }

    /// Annotates every selected patient under `data_dir`, in name order.
    ///
    /// `data_dir` is resolved to an absolute path first, so manifests list
    /// windows that load from any working directory.
    pub fn annotate_dataset(&self, data_dir: &Path) -> Result<BatchReport> {
        let data_dir = data_dir
            .canonicalize()
            .map_err(|e| AnnotateError::FileNotFound(format!("{}: {}", data_dir.display(), e)))?;
        let mut report = BatchReport::default();

        for patient_dir in discover_patients(&data_dir)? {
            let patient = patient_name(&patient_dir)?;
            if !self.config.selects(&patient) {
                continue;
            }
            match self.annotate_patient(&patient_dir) {
                Ok(done) => report.patients.push(done),
                Err(e) => {
                    tracing::error!(patient = %patient, error = %e, "patient failed");
                    report.failures.push((patient, e));
                }
            }
        }

        if let Some(wanted) = &self.config.patients {
            let missing: Vec<&String> = wanted
                .iter()
                .filter(|p| !report.patients.iter().any(|r| &r.patient == *p))
                .filter(|p| !report.failures.iter().any(|(f, _)| f == *p))
                .collect();
            if !missing.is_empty() {
                tracing::warn!(?missing, "requested patients not found");
            }
        }

        Ok(report)
    }
}

/// Annotates `data_dir` reading and writing EDF files.
pub fn annotate_dataset(data_dir: &Path, config: &AnnotateConfig) -> Result<BatchReport> {
    let source = EdfSource;
    let sink = EdfSink;
    Annotator::new(config, &source, &sink)?.annotate_dataset(data_dir)
}

/// Sub-directories of `data_dir` holding a `<name>-summary.txt`, sorted.
pub fn discover_patients(data_dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(data_dir)
        .map_err(|e| AnnotateError::FileNotFound(format!("{}: {}", data_dir.display(), e)))?;

    let mut dirs = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if !path.is_dir() {
            continue;
        }
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            if summary_path(&path, name).is_file() {
                dirs.push(path);
            }
        }
    }
    dirs.sort();
    Ok(dirs)
}

fn patient_name(patient_dir: &Path) -> Result<String> {
    patient_dir
        .file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .ok_or_else(|| AnnotateError::InvalidConfig(format!("no patient name in {}", patient_dir.display())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discovers_only_dirs_with_summary() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["chb02", "chb01", "notes"] {
            fs::create_dir(dir.path().join(name)).unwrap();
        }
        fs::write(dir.path().join("chb01/chb01-summary.txt"), "").unwrap();
        fs::write(dir.path().join("chb02/chb02-summary.txt"), "").unwrap();
        fs::write(dir.path().join("RECORDS"), "").unwrap();

        let found = discover_patients(dir.path()).unwrap();
        assert_eq!(found, vec![dir.path().join("chb01"), dir.path().join("chb02")]);
    }

    #[test]
    fn test_bad_summary_fails_only_that_patient() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("chb01")).unwrap();
        fs::write(
            dir.path().join("chb01/chb01-summary.txt"),
            "File Name: chb01_01.edf\nNumber of Seizures in File: 0\n",
        ).unwrap();
        fs::create_dir(dir.path().join("chb02")).unwrap();
        fs::write(dir.path().join("chb02/chb02-summary.txt"), "").unwrap();

        let report = annotate_dataset(dir.path(), &AnnotateConfig::default()).unwrap();
        assert!(!report.is_success());
        assert_eq!(report.failures[0].0, "chb01");
        assert_eq!(report.patients.len(), 1);
        assert_eq!(report.patients[0].windows, 0);
        assert!(report.patients[0].manifest.is_file());
    }

    #[test]
    fn test_missing_data_dir_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(annotate_dataset(&dir.path().join("absent"), &AnnotateConfig::default()).is_err());
    }
}
