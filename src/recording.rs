//! One EDF file's place in a patient's timeline.

use std::ops::Range;
use std::path::{Path, PathBuf};

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};

use crate::error::{AnnotateError, Result};
use crate::types::{Interval, Label};

/// Placeholder day carried by timestamps before the date reconciler runs.
///
/// Summary logs only give wall-clock times; until dates are assigned only
/// the time-of-day part of a [`Recording`]'s timestamps is meaningful.
pub const UNDATED: NaiveDate = match NaiveDate::from_ymd_opt(1900, 1, 1) {
    Some(date) => date,
    None => panic!("invalid placeholder date"),
};

/// Metadata of one EDF file and the labeled intervals inside it.
#[derive(Debug, Clone, PartialEq)]
pub struct Recording {
    pub file_path: PathBuf,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub seizure_count: usize,
    pub ictal: Vec<Interval>,
    pub interictal: Vec<Interval>,
    pub preictal: Vec<Interval>,
}

impl Recording {
    /// An undated recording spanning the wall-clock times `start..end`.
    pub fn new(file_path: impl Into<PathBuf>, start: NaiveTime, end: NaiveTime, seizure_count: usize) -> Self {
        Recording {
            file_path: file_path.into(),
            start: UNDATED.and_time(start),
            end: UNDATED.and_time(end),
            seizure_count,
            ictal: Vec::new(),
            interictal: Vec::new(),
            preictal: Vec::new(),
        }
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    /// File name without its extension, e.g. `chb01_03`.
    pub fn stem(&self) -> String {
        self.file_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn span(&self) -> Interval {
        Interval::new(self.start, self.end)
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// Records a seizure given as offsets in seconds from the file start.
    ///
    /// This is wall-clock arithmetic on the recording's own day: a seizure
    /// that happens after midnight in a file started the evening before
    /// reads as an early-morning time on the same placeholder day, and one
    /// that straddles midnight gets `end < start`. The date reconciler
    /// resolves both cases.
    ///
    /// ```
    /// use chbmit_annotate::Recording;
    /// use chrono::NaiveTime;
    ///
    /// let t = |h, m, s| NaiveTime::from_hms_opt(h, m, s).unwrap();
    /// let mut rec = Recording::new("chb01_03.edf", t(1, 0, 0), t(5, 0, 0), 1);
    /// rec.add_ictal_section(120, 180);
    /// assert_eq!(rec.ictal[0].start.time(), t(1, 2, 0));
    /// assert_eq!(rec.ictal[0].end.time(), t(1, 3, 0));
    /// ```
    pub fn add_ictal_section(&mut self, start_offset_secs: i64, end_offset_secs: i64) {
        let at = |offset: i64| {
            let (time, _) = self.start.time().overflowing_add_signed(Duration::seconds(offset));
            self.start.date().and_time(time)
        };
        let section = Interval::new(at(start_offset_secs), at(end_offset_secs));
        self.ictal.push(section);
    }

    /// Converts an interval inside this recording to a half-open sample
    /// range.
    ///
    /// The offset from the recording start is truncated to whole seconds
    /// before it is scaled by the sample rate, so sub-second parts never
    /// move a boundary.
    ///
    /// ```
    /// use chbmit_annotate::{Interval, Recording};
    /// use chrono::{Duration, NaiveTime};
    ///
    /// let t0 = NaiveTime::from_hms_opt(1, 0, 0).unwrap();
    /// let rec = Recording::new("chb01_01.edf", t0, NaiveTime::from_hms_opt(2, 0, 0).unwrap(), 0);
    /// let interval = Interval::new(rec.start + Duration::seconds(10), rec.start + Duration::seconds(40));
    /// assert_eq!(rec.interval_to_sample_range(&interval, 256).unwrap(), 2560..10240);
    /// ```
    pub fn interval_to_sample_range(&self, interval: &Interval, sample_rate: u32) -> Result<Range<usize>> {
        let to_index = |at: NaiveDateTime| -> Result<usize> {
            let seconds = (at - self.start).num_seconds();
            usize::try_from(seconds)
                .map(|s| s * sample_rate as usize)
                .map_err(|_| AnnotateError::IntervalOutOfRecording(interval.to_string()))
        };
        let start = to_index(interval.start)?;
        let end = to_index(interval.end)?;
        if end < start {
            return Err(AnnotateError::IntervalOutOfRecording(interval.to_string()));
        }
        Ok(start..end)
    }

    /// Interval list for `label`.
    pub fn intervals(&self, label: Label) -> &[Interval] {
        match label {
            Label::Interictal => &self.interictal,
            Label::Preictal => &self.preictal,
            Label::Ictal => &self.ictal,
        }
    }

    pub fn intervals_mut(&mut self, label: Label) -> &mut Vec<Interval> {
        match label {
            Label::Interictal => &mut self.interictal,
            Label::Preictal => &mut self.preictal,
            Label::Ictal => &mut self.ictal,
        }
    }

    /// Shifts the recording and its seizures forward by whole days.
    pub(crate) fn shift_days(&mut self, days: i64) {
        let shift = Duration::days(days);
        self.start += shift;
        self.end += shift;
        for section in &mut self.ictal {
            section.start += shift;
            section.end += shift;
        }
    }
}

/// All recordings of one patient, in summary-log order.
#[derive(Debug, Clone, PartialEq)]
pub struct PatientSession {
    pub patient: String,
    pub recordings: Vec<Recording>,
}

impl PatientSession {
    pub fn new(patient: impl Into<String>, recordings: Vec<Recording>) -> Self {
        PatientSession { patient: patient.into(), recordings }
    }

    pub fn start(&self) -> Option<NaiveDateTime> {
        self.recordings.first().map(|r| r.start)
    }

    pub fn end(&self) -> Option<NaiveDateTime> {
        self.recordings.last().map(|r| r.end)
    }

    /// Every seizure of the patient, ordered by start.
    pub fn ictal_intervals(&self) -> Vec<Interval> {
        let mut sections: Vec<Interval> = self.recordings
            .iter()
            .flat_map(|r| r.ictal.iter().copied())
            .collect();
        if !sections.windows(2).all(|w| w[0].start <= w[1].start) {
            tracing::warn!(patient = %self.patient, "seizures out of order after date reconciliation, sorting");
            sections.sort();
        }
        sections
    }

    pub fn seizure_count(&self) -> usize {
        self.recordings.iter().map(|r| r.ictal.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32, s: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, s).unwrap()
    }

    #[test]
    fn test_add_ictal_section_wraps_past_midnight() {
        let mut rec = Recording::new("chb02_16+.edf", t(23, 0, 0), t(1, 0, 0), 2);
        rec.add_ictal_section(3_700, 3_760);
        rec.add_ictal_section(3_550, 3_650);

        // stays on the placeholder day, reconciler assigns the date
        assert_eq!(rec.ictal[0].start, UNDATED.and_time(t(0, 1, 40)));
        assert_eq!(rec.ictal[1].start, UNDATED.and_time(t(23, 59, 10)));
        assert!(rec.ictal[1].end < rec.ictal[1].start);
    }

    #[test]
    fn test_sample_range_truncates_seconds() {
        let rec = Recording::new("chb01_01.edf", t(1, 0, 0), t(2, 0, 0), 0);
        let interval = Interval::new(
            rec.start + Duration::milliseconds(10_900),
            rec.start + Duration::milliseconds(40_999),
        );
        assert_eq!(rec.interval_to_sample_range(&interval, 256).unwrap(), 2560..10240);
    }

    #[test]
    fn test_sample_range_rejects_interval_before_start() {
        let rec = Recording::new("chb01_01.edf", t(1, 0, 0), t(2, 0, 0), 0);
        let interval = Interval::new(rec.start - Duration::seconds(5), rec.start + Duration::seconds(5));
        assert!(rec.interval_to_sample_range(&interval, 256).is_err());
    }

    #[test]
    fn test_label_lookup_table() {
        let mut rec = Recording::new("chb01_01.edf", t(1, 0, 0), t(2, 0, 0), 0);
        let span = rec.span();
        rec.intervals_mut(Label::Preictal).push(span);
        assert_eq!(rec.intervals(Label::Preictal), &[span]);
        assert!(rec.intervals(Label::Interictal).is_empty());
        assert!(rec.intervals(Label::Ictal).is_empty());
    }

    #[test]
    fn test_stem() {
        let rec = Recording::new("data/chb01/chb01_03.edf", t(1, 0, 0), t(2, 0, 0), 0);
        assert_eq!(rec.stem(), "chb01_03");
    }
}
