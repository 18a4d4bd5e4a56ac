//! In-memory EEG signal and the loader seam.
//!
//! [`Eeg`] holds a whole recording as a `[channels, samples]` matrix.
//! Windows are cut from it as [`EegView`]s borrowing the same buffer.
use std::ops::Range;
use std::path::Path;

use ndarray::{s, Array2, ArrayView2, Axis};

use crate::error::{AnnotateError, Result};
use crate::reader::EdfReader;
use crate::types::SignalParam;

/// A loaded multi-channel recording.
#[derive(Debug, Clone)]
pub struct Eeg {
    pub sample_rate: u32,
    /// Channel labels, in file order.
    pub channels: Vec<String>,
    /// Calibration of each channel, reused when windows are written back.
    pub signals: Vec<SignalParam>,
    /// `[channels, samples]`
    pub values: Array2<f64>,
    pub len_sec: f64,
}

impl Eeg {
    pub fn n_channels(&self) -> usize {
        self.values.nrows()
    }

    pub fn n_samples(&self) -> usize {
        self.values.ncols()
    }

    /// Borrows samples `range` of every channel, clamped to the buffer.
    pub fn view(&self, range: Range<usize>) -> EegView<'_> {
        let end = range.end.min(self.n_samples());
        let start = range.start.min(end);
        EegView {
            sample_rate: self.sample_rate,
            channels: &self.channels,
            signals: &self.signals,
            values: self.values.slice(s![.., start..end]),
        }
    }

    /// Concatenates recordings along time. All parts must share channel
    /// count and sample rate.
    pub fn concat(parts: &[Eeg]) -> Result<Eeg> {
        let first = parts.first()
            .ok_or_else(|| AnnotateError::InvalidFormat("nothing to concatenate".to_string()))?;
        if let Some(bad) = parts.iter().find(|p| p.sample_rate != first.sample_rate) {
            return Err(AnnotateError::MixedSampleRates(vec![first.sample_rate as i32, bad.sample_rate as i32]));
        }
        let views: Vec<ArrayView2<f64>> = parts.iter().map(|p| p.values.view()).collect();
        let values = ndarray::concatenate(Axis(1), &views)
            .map_err(|e| AnnotateError::InvalidFormat(format!("cannot concatenate windows: {}", e)))?;

        Ok(Eeg {
            sample_rate: first.sample_rate,
            channels: first.channels.clone(),
            signals: first.signals.clone(),
            len_sec: parts.iter().map(|p| p.len_sec).sum(),
            values,
        })
    }
}

/// Zero-copy slice of an [`Eeg`].
#[derive(Debug, Clone)]
pub struct EegView<'a> {
    pub sample_rate: u32,
    pub channels: &'a [String],
    pub signals: &'a [SignalParam],
    pub values: ArrayView2<'a, f64>,
}

impl<'a> EegView<'a> {
    pub fn n_samples(&self) -> usize {
        self.values.ncols()
    }

    pub fn len_sec(&self) -> f64 {
        self.n_samples() as f64 / self.sample_rate as f64
    }

    /// Narrower view over `range`, relative to this view's first sample.
    pub fn slice(&self, range: Range<usize>) -> EegView<'a> {
        let end = range.end.min(self.n_samples());
        let start = range.start.min(end);
        EegView {
            sample_rate: self.sample_rate,
            channels: self.channels,
            signals: self.signals,
            values: self.values.slice_move(s![.., start..end]),
        }
    }

    /// Deep copy into an owned [`Eeg`].
    pub fn to_owned(&self) -> Eeg {
        Eeg {
            sample_rate: self.sample_rate,
            channels: self.channels.to_vec(),
            signals: self.signals.to_vec(),
            values: self.values.to_owned(),
            len_sec: self.len_sec(),
        }
    }
}

/// Loads a recording's signal from storage.
pub trait SignalSource: Send + Sync {
    fn load(&self, path: &Path) -> Result<Eeg>;
}

/// Loads EDF and EDF+ files with [`EdfReader`].
#[derive(Debug, Clone, Copy, Default)]
pub struct EdfSource;

impl SignalSource for EdfSource {
    fn load(&self, path: &Path) -> Result<Eeg> {
        let mut reader = EdfReader::open(path)?;
        let header = reader.header();
        if header.signals.is_empty() {
            return Err(AnnotateError::InvalidFormat(format!("{} has no data signals", path.display())));
        }

        let record_secs = header.datarecord_duration as f64 / crate::EDFLIB_TIME_DIMENSION as f64;
        let mut rates: Vec<i32> = header.signals.iter().map(|s| s.samples_per_record).collect();
        rates.dedup();
        if rates.len() > 1 {
            return Err(AnnotateError::MixedSampleRates(rates));
        }
        let sample_rate = (rates[0] as f64 / record_secs).round() as u32;

        let signals = header.signals.clone();
        let channels = signals.iter().map(|s| s.label.clone()).collect();
        let data = reader.read_all_physical()?;

        let n_samples = data.first().map_or(0, Vec::len);
        let flat: Vec<f64> = data.into_iter().flatten().collect();
        let values = Array2::from_shape_vec((signals.len(), n_samples), flat)
            .map_err(|e| AnnotateError::InvalidFormat(format!("{}: {}", path.display(), e)))?;

        tracing::debug!(path = %path.display(), channels = signals.len(), n_samples, sample_rate, "loaded EDF");

        Ok(Eeg {
            sample_rate,
            channels,
            signals,
            len_sec: n_samples as f64 / sample_rate.max(1) as f64,
            values,
        })
    }
}
