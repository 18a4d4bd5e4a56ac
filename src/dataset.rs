//! Manifest-backed training samples.
//!
//! A sample is `n_use` consecutive manifest windows sharing one label,
//! concatenated along time when loaded.
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{AnnotateError, Result};
use crate::manifest::{label_from_path, read_manifest};
use crate::signal::{Eeg, SignalSource};
use crate::types::Label;

#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub paths: Vec<PathBuf>,
    pub label: Label,
}

/// A sample loaded by [`ManifestDataset::get`].
#[derive(Debug, Clone)]
pub struct LoadedSample {
    /// Index actually loaded, which is past the requested one when samples
    /// were skipped.
    pub index: usize,
    pub eeg: Eeg,
    pub label: Label,
}

#[derive(Debug, Clone)]
pub struct ManifestDataset {
    samples: Vec<Sample>,
}

impl ManifestDataset {
    pub fn from_manifest(manifest: &Path, n_use: usize) -> Result<Self> {
        Self::from_paths(read_manifest(manifest)?, n_use)
    }

    /// Groups `paths` into samples of `n_use` windows. Paths without a label
    /// suffix are ignored; trailing windows that do not fill a group and
    /// groups mixing labels are dropped.
    pub fn from_paths(paths: Vec<PathBuf>, n_use: usize) -> Result<Self> {
        if n_use == 0 {
            return Err(AnnotateError::InvalidConfig("n_use must be positive".to_string()));
        }

        let labeled: Vec<(PathBuf, Label)> = paths
            .into_iter()
            .filter_map(|path| match label_from_path(&path) {
                Some(label) => Some((path, label)),
                None => {
                    tracing::warn!(path = %path.display(), "manifest entry has no label, ignored");
                    None
                }
            })
            .collect();

        let samples = labeled
            .chunks_exact(n_use)
            .filter(|group| group.iter().all(|(_, label)| *label == group[0].1))
            .map(|group| Sample {
                paths: group.iter().map(|(path, _)| path.clone()).collect(),
                label: group[0].1,
            })
            .collect();

        Ok(ManifestDataset { samples })
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn labels(&self) -> Vec<Label> {
        self.samples.iter().map(|s| s.label).collect()
    }

    pub fn label_counts(&self) -> BTreeMap<Label, usize> {
        let mut counts = BTreeMap::new();
        for sample in &self.samples {
            *counts.entry(sample.label).or_insert(0) += 1;
        }
        counts
    }

    /// `1 / count` for every label present, for class-balanced sampling.
    pub fn class_weights(&self) -> BTreeMap<Label, f64> {
        self.label_counts()
            .into_iter()
            .map(|(label, count)| (label, 1.0 / count as f64))
            .collect()
    }

    /// Per-sample weight of its class, in sample order.
    pub fn sample_weights(&self) -> Vec<f64> {
        let weights = self.class_weights();
        self.samples.iter().map(|s| weights[&s.label]).collect()
    }

    /// Loads sample `index`, moving on to the next one whenever a window
    /// fails to load or holds non-finite values. `None` once the end is
    /// reached.
    pub fn get(&self, index: usize, source: &dyn SignalSource) -> Option<LoadedSample> {
        (index..self.samples.len()).find_map(|i| {
            let sample = &self.samples[i];
            match load_sample(sample, source) {
                Ok(eeg) => Some(LoadedSample { index: i, eeg, label: sample.label }),
                Err(e) => {
                    tracing::warn!(index = i, error = %e, "skipping unusable sample");
                    None
                }
            }
        })
    }
}

fn load_sample(sample: &Sample, source: &dyn SignalSource) -> Result<Eeg> {
    let parts = sample.paths
        .iter()
        .map(|path| source.load(path))
        .collect::<Result<Vec<Eeg>>>()?;
    let eeg = Eeg::concat(&parts)?;
    if !eeg.values.iter().all(|v| v.is_finite()) {
        return Err(AnnotateError::InvalidFormat("sample holds non-finite values".to_string()));
    }
    Ok(eeg)
}
