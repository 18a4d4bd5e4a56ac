//! Parser for the per-patient `chbXX-summary.txt` seizure log.
//!
//! The log is a sequence of blank-line separated blocks. Only blocks opened by
//! `File Name:` describe recordings; channel listings, sampling-rate headers
//! and "Channels changed" notices are skipped.
use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveTime;

use crate::error::{AnnotateError, Result};
use crate::recording::{PatientSession, Recording};
use crate::utils::parse_clock_time;

/// One `File Name:` block of the log.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryRecord {
    pub file_name: String,
    pub start: NaiveTime,
    pub end: NaiveTime,
    /// `(start, end)` offsets in seconds from the file start.
    pub seizures: Vec<(i64, i64)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    /// From `Data Sampling Rate: N Hz`, when the log states one.
    pub sampling_rate: Option<u32>,
    pub records: Vec<SummaryRecord>,
}

#[derive(Default)]
struct PendingRecord {
    file_name: String,
    line: usize,
    start: Option<NaiveTime>,
    end: Option<NaiveTime>,
    declared_seizures: Option<usize>,
    seizure_starts: Vec<i64>,
    seizure_ends: Vec<i64>,
}

impl Summary {
    pub fn from_file(path: &Path) -> Result<Summary> {
        let text = fs::read_to_string(path)
            .map_err(|e| AnnotateError::summary(path, format!("cannot read log: {}", e)))?;
        Summary::parse(&text, path)
    }

    /// Parses log text. `path` only labels errors.
    ///
    /// ```
    /// use chbmit_annotate::summary::Summary;
    /// use std::path::Path;
    ///
    /// let text = "Data Sampling Rate: 256 Hz\n\n\
    ///             File Name: chb01_03.edf\n\
    ///             File Start Time: 13:43:04\n\
    ///             File End Time: 14:43:04\n\
    ///             Number of Seizures in File: 1\n\
    ///             Seizure Start Time: 2996 seconds\n\
    ///             Seizure End Time: 3036 seconds\n";
    /// let summary = Summary::parse(text, Path::new("chb01-summary.txt")).unwrap();
    /// assert_eq!(summary.sampling_rate, Some(256));
    /// assert_eq!(summary.records[0].seizures, vec![(2996, 3036)]);
    /// ```
    pub fn parse(text: &str, path: &Path) -> Result<Summary> {
        let mut sampling_rate = None;
        let mut records = Vec::new();
        let mut pending: Option<PendingRecord> = None;

        for (idx, raw) in text.lines().enumerate() {
            let line_no = idx + 1;
            let Some((key, value)) = raw.split_once(':') else {
                continue;
            };
            let key = key.trim();
            let value = value.trim();
            let fail = |reason: String| AnnotateError::summary(path, format!("line {}: {}", line_no, reason));

            if key == "File Name" {
                if let Some(done) = pending.take() {
                    records.push(done.finish(path)?);
                }
                pending = Some(PendingRecord {
                    file_name: value.to_string(),
                    line: line_no,
                    ..PendingRecord::default()
                });
                continue;
            }

            if key == "Data Sampling Rate" {
                let hz = value.trim_end_matches("Hz").trim();
                sampling_rate = Some(hz.parse::<u32>().map_err(|_| fail(format!("bad sampling rate '{}'", value)))?);
                continue;
            }

            let Some(record) = pending.as_mut() else {
                continue;
            };

            if key == "File Start Time" {
                record.start = Some(parse_clock_time(value).map_err(|e| fail(e.to_string()))?);
            } else if key == "File End Time" {
                record.end = Some(parse_clock_time(value).map_err(|e| fail(e.to_string()))?);
            } else if key == "Number of Seizures in File" {
                let n = value.parse::<usize>().map_err(|_| fail(format!("bad seizure count '{}'", value)))?;
                record.declared_seizures = Some(n);
            } else if key.starts_with("Seizure") && key.ends_with("Start Time") {
                record.seizure_starts.push(parse_seconds(value).ok_or_else(|| fail(format!("bad seizure start '{}'", value)))?);
            } else if key.starts_with("Seizure") && key.ends_with("End Time") {
                record.seizure_ends.push(parse_seconds(value).ok_or_else(|| fail(format!("bad seizure end '{}'", value)))?);
            }
        }

        if let Some(done) = pending.take() {
            records.push(done.finish(path)?);
        }

        Ok(Summary { sampling_rate, records })
    }

    /// Builds the patient's undated recordings, in log order.
    pub fn into_session(self, patient: &str, patient_dir: &Path) -> PatientSession {
        let recordings = self.records
            .into_iter()
            .map(|record| {
                let mut recording = Recording::new(
                    patient_dir.join(&record.file_name),
                    record.start,
                    record.end,
                    record.seizures.len(),
                );
                for (start, end) in record.seizures {
                    recording.add_ictal_section(start, end);
                }
                recording
            })
            .collect();

        PatientSession::new(patient, recordings)
    }
}

impl PendingRecord {
    fn finish(self, path: &Path) -> Result<SummaryRecord> {
        let fail = |reason: String| {
            AnnotateError::summary(path, format!("record '{}' at line {}: {}", self.file_name, self.line, reason))
        };

        let start = self.start.ok_or_else(|| fail("missing File Start Time".to_string()))?;
        let end = self.end.ok_or_else(|| fail("missing File End Time".to_string()))?;
        let declared = self.declared_seizures.ok_or_else(|| fail("missing seizure count".to_string()))?;

        if self.seizure_starts.len() != declared || self.seizure_ends.len() != declared {
            return Err(fail(format!(
                "declares {} seizures but lists {} starts and {} ends",
                declared,
                self.seizure_starts.len(),
                self.seizure_ends.len()
            )));
        }

        let seizures: Vec<(i64, i64)> = self.seizure_starts
            .iter()
            .copied()
            .zip(self.seizure_ends.iter().copied())
            .collect();
        for &(s, e) in &seizures {
            if s == 0 {
                return Err(fail("seizure starts at offset 0".to_string()));
            }
            if s >= e {
                return Err(fail(format!("seizure start {} s is not before end {} s", s, e)));
            }
        }

        Ok(SummaryRecord { file_name: self.file_name, start, end, seizures })
    }
}

/// `"2996 seconds"` or `"2996"` to seconds.
fn parse_seconds(value: &str) -> Option<i64> {
    value.trim_end_matches("seconds").trim().parse().ok()
}

/// Conventional location of a patient's log: `<dir>/<patient>-summary.txt`.
pub fn summary_path(patient_dir: &Path, patient: &str) -> PathBuf {
    patient_dir.join(format!("{}-summary.txt", patient))
}
