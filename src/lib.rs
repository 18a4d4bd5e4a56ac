//! # CHB-MIT seizure annotation
//!
//! Turns the CHB-MIT scalp EEG recordings into labeled, fixed-size windows
//! for seizure prediction models.
//!
//! For every patient the summary log is parsed into [`Recording`]s, their
//! wall-clock times are placed on a continuous timeline, interictal and
//! preictal intervals are derived from the seizure times, and each
//! recording's signal is cut into windows that are written as EDF+ files
//! together with a manifest.
//!
//! ## Quick Start
//!
//! ### Annotating a dataset
//!
//! ```rust,no_run
//! use chbmit_annotate::{annotate_dataset, AnnotateConfig, Result};
//! use std::path::Path;
//!
//! fn main() -> Result<()> {
//!     let config = AnnotateConfig { sop: 60, ..AnnotateConfig::default() };
//!     let report = annotate_dataset(Path::new("chb-mit/"), &config)?;
//!     for patient in &report.patients {
//!         println!("{}: {} windows -> {}", patient.patient, patient.windows, patient.manifest.display());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ### The timeline steps on their own
//!
//! ```rust
//! use chbmit_annotate::{allocate, reconcile, AnnotateConfig, PatientSession, Recording};
//! use chrono::NaiveTime;
//!
//! let t = |h| NaiveTime::from_hms_opt(h, 0, 0).unwrap();
//! let mut night = Recording::new("chb01_10.edf", t(22), t(2), 1);
//! night.add_ictal_section(7_200, 7_260); // 00:00 to 00:01 the next day
//! let mut session = PatientSession::new("chb01", vec![
//!     Recording::new("chb01_09.edf", t(18), t(22), 0),
//!     night,
//! ]);
//!
//! reconcile::reconcile_dates(&mut session.recordings);
//! let allowed = allocate::allocate(&mut session, &AnnotateConfig::default());
//!
//! // 23:25 to 23:55, sph minutes before the seizure
//! assert_eq!(allowed.preictal.len(), 1);
//! assert_eq!(session.recordings[1].preictal[0].end.time(), NaiveTime::from_hms_opt(23, 55, 0).unwrap());
//! ```
//!
//! ### Reading a window back
//!
//! ```rust
//! use chbmit_annotate::{EdfReader, Result};
//! # use chbmit_annotate::doctest_utils::create_window_file;
//!
//! fn main() -> Result<()> {
//!     # let dir = tempfile::tempdir()?;
//!     # let path = dir.path().join("0_7680_ictal.edf");
//!     # create_window_file(&path, "ictal", 30)?;
//!     let reader = EdfReader::open(&path)?;
//!     assert_eq!(reader.header().duration_secs(), 30);
//!     assert_eq!(reader.annotations()[0].description, "ictal");
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod types;
pub mod utils;
pub mod reader;
pub mod writer;
pub mod signal;
pub mod recording;
pub mod summary;
pub mod reconcile;
pub mod allocate;
pub mod segment;
pub mod manifest;
pub mod config;
pub mod pipeline;
pub mod dataset;

#[doc(hidden)]
pub mod doctest_utils;

pub use error::{AnnotateError, Result};
pub use types::{Annotation, EdfHeader, Interval, Label, SignalParam};
pub use reader::EdfReader;
pub use writer::EdfWriter;
pub use signal::{EdfSource, Eeg, EegView, SignalSource};
pub use recording::{PatientSession, Recording};
pub use segment::{EdfSink, Segment, SegmentSink, SegmentWriter};
pub use config::{AdvancePolicy, AnnotateConfig};
pub use pipeline::{annotate_dataset, Annotator, BatchReport, PatientReport};
pub use dataset::ManifestDataset;

pub const EDFLIB_TIME_DIMENSION: i64 = 10_000_000; // 100 nanoseconds unit
pub const EDFLIB_MAXSIGNALS: usize = 4096;

/// Library version
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!version().is_empty());
    }
}
