//! Cuts labeled intervals into fixed-size windows and persists them.
use std::fs;
use std::ops::Range;
use std::path::{Path, PathBuf};

use chrono::{Duration, NaiveDateTime};
use ndarray::s;
use rayon::prelude::*;

use crate::config::AnnotateConfig;
use crate::error::{AnnotateError, Result};
use crate::recording::Recording;
use crate::signal::{EegView, SignalSource};
use crate::types::{Label, SignalParam};
use crate::writer::EdfWriter;

/// One window ready to be persisted.
#[derive(Debug, Clone)]
pub struct Segment<'a> {
    pub view: EegView<'a>,
    pub label: Label,
    /// Absolute timestamp of the first sample.
    pub start: NaiveDateTime,
    /// Sample indices relative to the recording start.
    pub samples: Range<usize>,
}

/// Stores windows. Implementations must tolerate concurrent calls for
/// distinct paths.
pub trait SegmentSink: Send + Sync {
    /// File extension of persisted windows, without the dot.
    fn extension(&self) -> &str;

    fn persist(&self, segment: &Segment<'_>, path: &Path) -> Result<()>;
}

/// Writes each window as an EDF+ file with 1 s data records and one
/// annotation naming its label.
#[derive(Debug, Clone, Copy, Default)]
pub struct EdfSink;

impl SegmentSink for EdfSink {
    fn extension(&self) -> &str {
        "edf"
    }

    fn persist(&self, segment: &Segment<'_>, path: &Path) -> Result<()> {
        let view = &segment.view;
        let rate = view.sample_rate as usize;
        if rate == 0 || view.n_samples() == 0 || view.n_samples() % rate != 0 {
            return Err(AnnotateError::InvalidFormat(format!(
                "window of {} samples at {} Hz is not a whole number of seconds",
                view.n_samples(),
                view.sample_rate
            )));
        }

        let mut writer = EdfWriter::create(path)?;
        writer.set_start_datetime(segment.start)?;
        for channel in 0..view.values.nrows() {
            writer.add_signal(channel_param(view, channel))?;
        }
        writer.add_annotation(0.0, Some(view.len_sec()), segment.label.as_str())?;

        for record in 0..view.n_samples() / rate {
            let samples: Vec<Vec<f64>> = view.values
                .outer_iter()
                .map(|row| row.slice(s![record * rate..(record + 1) * rate]).to_vec())
                .collect();
            writer.write_samples(&samples)?;
        }
        writer.finalize()
    }
}

/// Calibration for `channel`, from the source file when known, otherwise
/// fitted to the window's own range.
fn channel_param(view: &EegView<'_>, channel: usize) -> SignalParam {
    let mut param = view.signals.get(channel).cloned().unwrap_or_else(|| {
        let (lo, hi) = view.values
            .row(channel)
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
        let (lo, hi) = if lo < hi { (lo, hi) } else { (lo - 1.0, lo + 1.0) };
        SignalParam {
            label: view.channels.get(channel).cloned().unwrap_or_else(|| format!("CH{}", channel + 1)),
            samples_in_file: 0,
            physical_max: hi,
            physical_min: lo,
            digital_max: 32767,
            digital_min: -32768,
            samples_per_record: 0,
            physical_dimension: "uV".to_string(),
            prefilter: String::new(),
            transducer: String::new(),
        }
    });
    param.samples_per_record = view.sample_rate as i32;
    param.samples_in_file = 0;
    param
}

/// Window offsets `[k * stride, k * stride + window)` that fit entirely in
/// `n_samples`. Trailing samples are dropped, never padded.
///
/// ```
/// use chbmit_annotate::segment::window_ranges;
///
/// let windows: Vec<_> = window_ranges(90 * 256, 30 * 256, 30 * 256).collect();
/// assert_eq!(windows.len(), 3);
/// assert_eq!(windows[2], 15360..23040);
/// ```
pub fn window_ranges(n_samples: usize, window: usize, stride: usize) -> impl Iterator<Item = Range<usize>> {
    let count = if window == 0 || stride == 0 || n_samples < window {
        0
    } else {
        (n_samples - window) / stride + 1
    };
    (0..count).map(move |k| k * stride..k * stride + window)
}

struct WindowJob {
    label: Label,
    samples: Range<usize>,
    start: NaiveDateTime,
}

/// Persists every labeled window of a recording on a bounded worker pool.
pub struct SegmentWriter<'a> {
    config: &'a AnnotateConfig,
    source: &'a dyn SignalSource,
    sink: &'a dyn SegmentSink,
    pool: rayon::ThreadPool,
}

impl<'a> SegmentWriter<'a> {
    pub fn new(config: &'a AnnotateConfig, source: &'a dyn SignalSource, sink: &'a dyn SegmentSink) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.n_jobs)
            .thread_name(|i| format!("segment-writer-{}", i))
            .build()?;
        Ok(SegmentWriter { config, source, sink, pool })
    }

    /// Writes the recording's windows under `save_dir` and returns their
    /// paths, interictal first, then preictal, then ictal.
    ///
    /// A recording whose signal cannot be loaded yields no windows; any
    /// failure while writing is returned.
    pub fn write_recording(&self, recording: &Recording, save_dir: &Path) -> Result<Vec<PathBuf>> {
        if Label::ALL.iter().all(|label| recording.intervals(*label).is_empty()) {
            tracing::debug!(file = %recording.file_path().display(), "no labeled intervals, signal not loaded");
            return Ok(Vec::new());
        }

        let eeg = match self.source.load(recording.file_path()) {
            Ok(eeg) => eeg,
            Err(e) => {
                tracing::error!(file = %recording.file_path().display(), error = %e, "cannot load signal, skipping recording");
                return Ok(Vec::new());
            }
        };

        let jobs = self.plan(recording, eeg.sample_rate, eeg.n_samples());
        if jobs.is_empty() {
            return Ok(Vec::new());
        }
        fs::create_dir_all(save_dir)?;

        let extension = self.sink.extension();
        let paths = self.pool.install(|| {
            jobs.par_iter()
                .map(|job| {
                    let segment = Segment {
                        view: eeg.view(job.samples.clone()),
                        label: job.label,
                        start: job.start,
                        samples: job.samples.clone(),
                    };
                    let path = save_dir.join(format!(
                        "{}_{}_{}.{}",
                        job.samples.start, job.samples.end, job.label, extension
                    ));
                    self.sink.persist(&segment, &path)?;
                    Ok(path)
                })
                .collect::<Result<Vec<PathBuf>>>()
        })?;

        tracing::debug!(file = %recording.file_path().display(), windows = paths.len(), "recording written");
        Ok(paths)
    }

    fn plan(&self, recording: &Recording, sample_rate: u32, n_samples: usize) -> Vec<WindowJob> {
        let rate = sample_rate as usize;
        let mut jobs = Vec::new();

        for label in Label::ALL {
            let (window, stride) = self.config.window_for(label);
            for interval in recording.intervals(label) {
                let range = match recording.interval_to_sample_range(interval, sample_rate) {
                    Ok(range) => range.start.min(n_samples)..range.end.min(n_samples),
                    Err(e) => {
                        tracing::warn!(file = %recording.file_path().display(), error = %e, "skipping interval");
                        continue;
                    }
                };

                for window_range in window_ranges(range.len(), window as usize * rate, stride as usize * rate) {
                    let samples = range.start + window_range.start..range.start + window_range.end;
                    let offset = Duration::seconds((samples.start / rate.max(1)) as i64);
                    jobs.push(WindowJob { label, start: recording.start + offset, samples });
                }
            }
        }
        jobs
    }
}
