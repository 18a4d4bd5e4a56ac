use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use crate::error::AnnotateError;

#[derive(Debug, Clone, PartialEq)]
pub enum FileType {
    Edf,
    EdfPlus,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SignalParam {
    pub label: String,
    pub samples_in_file: i64,
    pub physical_max: f64,
    pub physical_min: f64,
    pub digital_max: i32,
    pub digital_min: i32,
    pub samples_per_record: i32,
    pub physical_dimension: String,
    pub prefilter: String,
    pub transducer: String,
}

impl SignalParam {
    /// Physical units per digital step.
    pub fn bit_value(&self) -> f64 {
        (self.physical_max - self.physical_min) /
        (self.digital_max - self.digital_min) as f64
    }

    pub fn offset(&self) -> f64 {
        self.physical_max / self.bit_value() - self.digital_max as f64
    }

    pub fn to_physical(&self, digital_value: i32) -> f64 {
        self.bit_value() * (self.offset() + digital_value as f64)
    }

    /// Converts a physical value back to the digital range, clamped to
    /// `[digital_min, digital_max]`.
    pub fn to_digital(&self, physical_value: f64) -> i32 {
        let digital = (physical_value / self.bit_value()) - self.offset();
        (digital.round() as i32).max(self.digital_min).min(self.digital_max)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    pub onset: i64,           // 100 ns units
    pub duration: i64,        // 100 ns units, -1 when unknown
    pub description: String,
}

#[derive(Debug)]
pub struct EdfHeader {
    pub file_type: FileType,
    pub signals: Vec<SignalParam>,
    pub file_duration: i64,           // 100 ns units
    pub start_date: NaiveDate,
    pub start_time: NaiveTime,
    pub datarecords_in_file: i64,
    pub datarecord_duration: i64,     // 100 ns units
    pub patient_field: String,
    pub recording_field: String,
}

impl EdfHeader {
    /// Recording length in whole seconds.
    pub fn duration_secs(&self) -> i64 {
        self.file_duration / crate::EDFLIB_TIME_DIMENSION
    }
}

/// A time range between two absolute timestamps.
///
/// Intervals are only meaningful when `end > start`; producers drop
/// anything else. Ordering is chronological by `start`, then `end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Interval {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl Interval {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Interval { start, end }
    }

    /// `Some` only when the range is non-empty.
    pub fn checked(start: NaiveDateTime, end: NaiveDateTime) -> Option<Self> {
        (start < end).then_some(Interval { start, end })
    }

    pub fn duration(&self) -> chrono::Duration {
        self.end - self.start
    }

    pub fn overlaps(&self, other: &Interval) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn contains(&self, other: &Interval) -> bool {
        self.start <= other.start && other.end <= self.end
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.start, self.end)
    }
}

/// Class assigned to a stretch of EEG.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Label {
    Interictal,
    Preictal,
    Ictal,
}

impl Label {
    /// Processing order used by the segment writer and the manifest.
    pub const ALL: [Label; 3] = [Label::Interictal, Label::Preictal, Label::Ictal];

    pub fn as_str(&self) -> &'static str {
        match self {
            Label::Interictal => "interictal",
            Label::Preictal => "preictal",
            Label::Ictal => "ictal",
        }
    }

    pub fn index(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Label {
    type Err = AnnotateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "interictal" => Ok(Label::Interictal),
            "preictal" => Ok(Label::Preictal),
            "ictal" => Ok(Label::Ictal),
            other => Err(AnnotateError::InvalidFormat(format!("unknown label '{}'", other))),
        }
    }
}
