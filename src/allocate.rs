//! Interictal and preictal interval allocation.
//!
//! Allocation runs in two steps per label. First the patient-wide *allowed*
//! intervals are derived from the seizure timeline alone; then a single
//! pointer walks the allowed list alongside the recordings and clips each
//! recording against the allowed interval it currently points at.
use chrono::{Duration, NaiveDateTime};

use crate::config::{AdvancePolicy, AnnotateConfig, PREICTAL_MIN_GAP_MINUTES};
use crate::recording::{PatientSession, Recording};
use crate::types::{Interval, Label};

/// Allowed intervals computed for one patient.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Allocation {
    pub interictal: Vec<Interval>,
    pub preictal: Vec<Interval>,
}

/// Seizure-free stretches at least `hours` away from every seizure.
///
/// `ictal` must be sorted by start. Without seizures the whole session is
/// interictal.
pub fn allowed_interictal(
    session_start: NaiveDateTime,
    session_end: NaiveDateTime,
    ictal: &[Interval],
    hours: u32,
) -> Vec<Interval> {
    let margin = Duration::hours(hours as i64);

    let Some(last) = ictal.last() else {
        return Interval::checked(session_start, session_end).into_iter().collect();
    };

    let mut allowed = Vec::new();
    let mut prev_end = session_start - margin;
    for seizure in ictal {
        if seizure.start - prev_end > margin * 2 {
            allowed.push(Interval::new(prev_end + margin, seizure.start - margin));
        }
        prev_end = seizure.end;
    }

    if session_end - last.end > margin {
        allowed.push(Interval::new(last.end + margin, session_end));
    }
    allowed
}

/// Stretches of at most `sop` minutes ending `sph` minutes before each
/// seizure that follows a gap of more than 30 minutes.
///
/// A candidate never starts before the previous seizure ended (or before the
/// session start); candidates left empty by that clip are dropped.
pub fn allowed_preictal(
    session_start: NaiveDateTime,
    ictal: &[Interval],
    sop: u32,
    sph: u32,
) -> Vec<Interval> {
    let horizon = Duration::minutes(sph as i64);
    let mut allowed = Vec::new();
    let mut prev_end = session_start;

    for seizure in ictal {
        let gap = seizure.start - prev_end;
        if gap > Duration::minutes(PREICTAL_MIN_GAP_MINUTES) {
            let duration = gap.num_seconds().min(sop as i64 * 60);
            let start = (seizure.start - Duration::seconds(duration) - horizon).max(prev_end);
            if let Some(interval) = Interval::checked(start, seizure.start - horizon) {
                allowed.push(interval);
            }
        }
        prev_end = seizure.end;
    }
    allowed
}

/// Clips each recording against the allowed interval the pointer is on and
/// appends the overlap to the recording's `label` list.
///
/// Recordings and `allowed` must both be chronological. Each recording gets
/// at most one interval. Stops once the allowed list is exhausted.
pub fn distribute(recordings: &mut [Recording], allowed: &[Interval], label: Label, policy: AdvancePolicy) {
    let mut pointer = 0;

    for recording in recordings.iter_mut() {
        match policy {
            AdvancePolicy::Single => {
                if allowed.get(pointer).is_some_and(|a| recording.start > a.end) {
                    pointer += 1;
                }
            }
            AdvancePolicy::Exhaustive => {
                while allowed.get(pointer).is_some_and(|a| recording.start > a.end) {
                    pointer += 1;
                }
            }
        }

        let Some(current) = allowed.get(pointer) else {
            break;
        };

        let start = recording.start.max(current.start);
        let end = recording.end.min(current.end);
        if let Some(interval) = Interval::checked(start, end) {
            recording.intervals_mut(label).push(interval);
        }
    }
}

/// Fills every recording's interictal and preictal lists. The session must
/// already be date-reconciled.
pub fn allocate(session: &mut PatientSession, config: &AnnotateConfig) -> Allocation {
    let (Some(start), Some(end)) = (session.start(), session.end()) else {
        return Allocation::default();
    };
    let ictal = session.ictal_intervals();

    let allocation = Allocation {
        interictal: allowed_interictal(start, end, &ictal, config.interictal_hour),
        preictal: allowed_preictal(start, &ictal, config.sop, config.sph),
    };
    tracing::debug!(
        patient = %session.patient,
        seizures = ictal.len(),
        interictal = allocation.interictal.len(),
        preictal = allocation.preictal.len(),
        "allowed intervals"
    );

    distribute(&mut session.recordings, &allocation.interictal, Label::Interictal, config.advance);
    distribute(&mut session.recordings, &allocation.preictal, Label::Preictal, config.advance);
    allocation
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcile::reconcile_dates;
    use chrono::{NaiveDate, NaiveTime};

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2010, 6, 1).unwrap().and_hms_opt(0, 0, 0).unwrap()
            + Duration::hours(h as i64)
            + Duration::minutes(m as i64)
    }

    fn iv(a: NaiveDateTime, b: NaiveDateTime) -> Interval {
        Interval::new(a, b)
    }

    fn dated(path: &str, start: NaiveDateTime, end: NaiveDateTime) -> Recording {
        let mut rec = Recording::new(path, start.time(), end.time(), 0);
        rec.start = start;
        rec.end = end;
        rec
    }

    #[test]
    fn test_interictal_keeps_margin_from_every_seizure() {
        let ictal = vec![iv(at(10, 0), at(10, 2)), iv(at(20, 0), at(20, 1)), iv(at(22, 0), at(22, 1))];
        let allowed = allowed_interictal(at(0, 0), at(40, 0), &ictal, 4);

        assert_eq!(allowed, vec![
            iv(at(0, 0), at(6, 0)),
            iv(at(14, 2), at(16, 0)),
            iv(at(26, 1), at(40, 0)),
        ]);
        let margin = Duration::hours(4);
        for a in &allowed {
            for s in &ictal {
                assert!(a.end <= s.start - margin || a.start >= s.end + margin);
            }
        }
    }

    #[test]
    fn test_interictal_without_seizures_is_whole_session() {
        assert_eq!(allowed_interictal(at(1, 0), at(9, 0), &[], 4), vec![iv(at(1, 0), at(9, 0))]);
    }

    #[test]
    fn test_preictal_ends_sph_before_onset_and_lasts_at_most_sop() {
        let ictal = vec![iv(at(3, 0), at(3, 1)), iv(at(3, 20), at(3, 21)), iv(at(5, 0), at(5, 1))];
        let allowed = allowed_preictal(at(0, 0), &ictal, 30, 5);

        // the second seizure follows too closely to get one
        assert_eq!(allowed, vec![iv(at(2, 25), at(2, 55)), iv(at(4, 25), at(4, 55))]);
        for a in &allowed {
            assert!(a.duration() <= Duration::minutes(30));
        }
    }

    #[test]
    fn test_preictal_is_clipped_to_previous_seizure() {
        // 40 min gap, sop 60: candidate would start before the first seizure ended
        let ictal = vec![iv(at(2, 0), at(2, 10)), iv(at(2, 50), at(2, 51))];
        let allowed = allowed_preictal(at(0, 0), &ictal, 60, 5);
        assert_eq!(allowed[1], iv(at(2, 10), at(2, 45)));
    }

    #[test]
    fn test_preictal_longer_horizon_than_gap_is_dropped() {
        let ictal = vec![iv(at(1, 0), at(1, 1)), iv(at(1, 40), at(1, 41))];
        let allowed = allowed_preictal(at(0, 0), &ictal, 30, 45);
        assert_eq!(allowed, vec![iv(at(0, 0), at(0, 15))]);
    }

    fn skipping_fixture() -> (Vec<Recording>, Vec<Interval>) {
        let recs = vec![dated("r1.edf", at(0, 30), at(1, 30)), dated("r2.edf", at(5, 30), at(6, 30))];
        let allowed = vec![iv(at(0, 0), at(1, 0)), iv(at(2, 0), at(3, 0)), iv(at(5, 0), at(6, 0))];
        (recs, allowed)
    }

    #[test]
    fn test_exhaustive_advance_reaches_matching_interval() {
        let (mut recs, allowed) = skipping_fixture();
        distribute(&mut recs, &allowed, Label::Interictal, AdvancePolicy::Exhaustive);
        assert_eq!(recs[0].interictal, vec![iv(at(0, 30), at(1, 0))]);
        assert_eq!(recs[1].interictal, vec![iv(at(5, 30), at(6, 0))]);
    }

    #[test]
    fn test_single_advance_steps_once() {
        let (mut recs, allowed) = skipping_fixture();
        distribute(&mut recs, &allowed, Label::Interictal, AdvancePolicy::Single);
        assert_eq!(recs[0].interictal, vec![iv(at(0, 30), at(1, 0))]);
        // pointer lands on 02:00-03:00 which does not overlap 05:30-06:30
        assert!(recs[1].interictal.is_empty());
    }

    #[test]
    fn test_distribute_stops_when_allowed_is_exhausted() {
        let mut recs = vec![dated("r1.edf", at(0, 0), at(1, 0)), dated("r2.edf", at(8, 0), at(9, 0))];
        distribute(&mut recs, &[iv(at(0, 30), at(2, 0))], Label::Preictal, AdvancePolicy::Single);
        assert_eq!(recs[0].preictal, vec![iv(at(0, 30), at(1, 0))]);
        assert!(recs[1].preictal.is_empty());

        let mut recs = vec![dated("r1.edf", at(0, 0), at(1, 0))];
        distribute(&mut recs, &[], Label::Preictal, AdvancePolicy::Exhaustive);
        assert!(recs[0].preictal.is_empty());
    }

    #[test]
    fn test_single_short_recording_gets_nothing_but_its_seizure() {
        let t = |h| NaiveTime::from_hms_opt(h, 0, 0).unwrap();
        let mut rec = Recording::new("chb01_03.edf", t(1), t(5), 1);
        rec.add_ictal_section(120, 180);
        let mut session = PatientSession::new("chb01", vec![rec]);
        reconcile_dates(&mut session.recordings);

        let allocation = allocate(&mut session, &AnnotateConfig::default());

        let rec = &session.recordings[0];
        assert_eq!(rec.ictal[0].start.time(), NaiveTime::from_hms_opt(1, 2, 0).unwrap());
        assert_eq!(rec.ictal[0].end.time(), NaiveTime::from_hms_opt(1, 3, 0).unwrap());
        assert!(allocation.interictal.is_empty());
        assert!(allocation.preictal.is_empty());
        assert!(rec.interictal.is_empty());
        assert!(rec.preictal.is_empty());
    }

    #[test]
    fn test_allocated_intervals_stay_inside_recordings_and_off_seizures() {
        let t = |h, m| NaiveTime::from_hms_opt(h, m, 0).unwrap();
        let mut recs = vec![
            Recording::new("a.edf", t(8, 0), t(12, 0), 0),
            Recording::new("b.edf", t(12, 0), t(16, 0), 0),
            Recording::new("c.edf", t(16, 0), t(20, 0), 1),
            Recording::new("d.edf", t(20, 0), t(0, 0), 0),
            Recording::new("e.edf", t(0, 0), t(4, 0), 0),
            Recording::new("f.edf", t(4, 0), t(8, 0), 0),
        ];
        recs[2].add_ictal_section(3_600, 3_700);
        let mut session = PatientSession::new("chb99", recs);
        reconcile_dates(&mut session.recordings);
        allocate(&mut session, &AnnotateConfig::default());

        let seizures = session.ictal_intervals();
        for rec in &session.recordings {
            for label in [Label::Interictal, Label::Preictal] {
                for interval in rec.intervals(label) {
                    assert!(interval.start < interval.end);
                    assert!(rec.span().contains(interval));
                    assert!(seizures.iter().all(|s| !s.overlaps(interval)));
                }
            }
        }
        assert!(!session.recordings[0].interictal.is_empty());
        assert_eq!(session.recordings[2].preictal.len(), 1);
    }
}
