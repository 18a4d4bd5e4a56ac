//! Annotation run configuration.
//!
//! [`AnnotateConfig`] carries every tunable of a run. The defaults match the
//! settings the CHB-MIT windows are usually prepared with; the effective
//! config is saved next to each manifest as `annotate_config.json`.
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{AnnotateError, Result};

/// Ictal windows are always this long, with the same stride.
pub const ICTAL_WINDOW_SECS: u32 = 30;

/// Minimum seizure-free gap, in minutes, before a seizure gets a preictal
/// interval.
pub const PREICTAL_MIN_GAP_MINUTES: i64 = 30;

/// How the distribution pass moves its pointer over the allowed intervals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdvancePolicy {
    /// Step past at most one allowed interval per recording.
    Single,
    /// Step past every allowed interval that ends before the recording.
    #[default]
    Exhaustive,
}

impl fmt::Display for AdvancePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AdvancePolicy::Single => "single",
            AdvancePolicy::Exhaustive => "exhaustive",
        })
    }
}

impl FromStr for AdvancePolicy {
    type Err = AnnotateError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "single" => Ok(AdvancePolicy::Single),
            "exhaustive" => Ok(AdvancePolicy::Exhaustive),
            other => Err(AnnotateError::InvalidConfig(format!("unknown advance policy '{}'", other))),
        }
    }
}

/// Configuration of an annotation run.
///
/// ```
/// use chbmit_annotate::AnnotateConfig;
///
/// let cfg = AnnotateConfig { window_size: 10, window_stride: 5, ..AnnotateConfig::default() };
/// assert_eq!(cfg.output_dir_name(), "interictal_preictal_30_5_10_5");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnotateConfig {
    /// Interictal/preictal window length in seconds.
    pub window_size: u32,
    /// Interictal/preictal window stride in seconds.
    pub window_stride: u32,
    /// Seizure onset period in minutes: longest preictal interval.
    pub sop: u32,
    /// Seizure prediction horizon in minutes: gap between preictal and ictal.
    pub sph: u32,
    /// Hours kept clear of seizures on both sides of interictal intervals.
    pub interictal_hour: u32,
    /// Threads writing windows.
    pub n_jobs: usize,
    pub advance: AdvancePolicy,
    /// Patients to process; all discovered patients when `None`.
    pub patients: Option<Vec<String>>,
}

impl Default for AnnotateConfig {
    fn default() -> Self {
        AnnotateConfig {
            window_size: 30,
            window_stride: 15,
            sop: 30,
            sph: 5,
            interictal_hour: 4,
            n_jobs: 4,
            advance: AdvancePolicy::Exhaustive,
            patients: None,
        }
    }
}

impl AnnotateConfig {
    pub fn validate(&self) -> Result<()> {
        if self.window_size == 0 {
            return Err(AnnotateError::InvalidConfig("window size must be positive".to_string()));
        }
        if self.window_stride == 0 {
            return Err(AnnotateError::InvalidConfig("window stride must be positive".to_string()));
        }
        if self.n_jobs == 0 {
            return Err(AnnotateError::InvalidConfig("n_jobs must be positive".to_string()));
        }
        if self.interictal_hour == 0 {
            return Err(AnnotateError::InvalidConfig("interictal hour must be positive".to_string()));
        }
        // interictal and preictal stretches would overlap otherwise
        if u64::from(self.interictal_hour) * 60 < u64::from(self.sop) + u64::from(self.sph) {
            return Err(AnnotateError::InvalidConfig(format!(
                "interictal margin of {} h is shorter than sop + sph ({} min)",
                self.interictal_hour,
                u64::from(self.sop) + u64::from(self.sph)
            )));
        }
        Ok(())
    }

    /// Per-patient output directory for this configuration.
    pub fn output_dir_name(&self) -> String {
        format!(
            "interictal_preictal_{}_{}_{}_{}",
            self.sop, self.sph, self.window_size, self.window_stride
        )
    }

    /// `(window, stride)` in seconds for `label`.
    pub fn window_for(&self, label: crate::Label) -> (u32, u32) {
        match label {
            crate::Label::Ictal => (ICTAL_WINDOW_SECS, ICTAL_WINDOW_SECS),
            _ => (self.window_size, self.window_stride),
        }
    }

    /// Whether `patient` passes the patient filter.
    pub fn selects(&self, patient: &str) -> bool {
        self.patients
            .as_ref()
            .map_or(true, |list| list.iter().any(|p| p == patient))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Label;

    #[test]
    fn test_defaults() {
        let cfg = AnnotateConfig::default();
        assert_eq!(cfg.output_dir_name(), "interictal_preictal_30_5_30_15");
        assert_eq!(cfg.advance, AdvancePolicy::Exhaustive);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_ictal_windows_are_fixed() {
        let cfg = AnnotateConfig { window_size: 10, window_stride: 2, ..AnnotateConfig::default() };
        assert_eq!(cfg.window_for(Label::Ictal), (30, 30));
        assert_eq!(cfg.window_for(Label::Preictal), (10, 2));
    }

    #[test]
    fn test_rejects_zero_sizes() {
        assert!(AnnotateConfig { window_stride: 0, ..AnnotateConfig::default() }.validate().is_err());
        assert!(AnnotateConfig { n_jobs: 0, ..AnnotateConfig::default() }.validate().is_err());
        assert!(AnnotateConfig { interictal_hour: 1, sop: 60, sph: 5, ..AnnotateConfig::default() }.validate().is_err());
    }

    #[test]
    fn test_huge_values_do_not_overflow() {
        let huge = AnnotateConfig { interictal_hour: 80_000_000, ..AnnotateConfig::default() };
        assert!(huge.validate().is_ok());

        let cfg = AnnotateConfig { interictal_hour: 1, sop: u32::MAX, sph: u32::MAX, ..AnnotateConfig::default() };
        assert!(matches!(cfg.validate(), Err(AnnotateError::InvalidConfig(_))));
    }

    #[test]
    fn test_json_snapshot_round_trips() {
        let cfg = AnnotateConfig {
            advance: AdvancePolicy::Single,
            patients: Some(vec!["chb01".to_string()]),
            ..AnnotateConfig::default()
        };
        let json = serde_json::to_string(&cfg).unwrap();
        assert!(json.contains("\"advance\":\"single\""));
        assert_eq!(serde_json::from_str::<AnnotateConfig>(&json).unwrap(), cfg);

        let partial: AnnotateConfig = serde_json::from_str(r#"{"sop": 60}"#).unwrap();
        assert_eq!(partial.sop, 60);
        assert_eq!(partial.window_size, 30);
    }

    #[test]
    fn test_patient_filter() {
        let cfg = AnnotateConfig { patients: Some(vec!["chb02".to_string()]), ..AnnotateConfig::default() };
        assert!(cfg.selects("chb02"));
        assert!(!cfg.selects("chb01"));
        assert!(AnnotateConfig::default().selects("chb01"));
    }

    #[test]
    fn test_advance_policy_names() {
        assert_eq!("Single".parse::<AdvancePolicy>().unwrap(), AdvancePolicy::Single);
        assert_eq!(AdvancePolicy::Exhaustive.to_string(), "exhaustive");
        assert!("greedy".parse::<AdvancePolicy>().is_err());
    }
}
