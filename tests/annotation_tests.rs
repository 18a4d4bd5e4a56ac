use chbmit_annotate::allocate::{allocate, Allocation};
use chbmit_annotate::doctest_utils::{summary_text, SummaryEntry};
use chbmit_annotate::reconcile::reconcile_dates;
use chbmit_annotate::summary::Summary;
use chbmit_annotate::{AdvancePolicy, AnnotateConfig, Label, PatientSession};
use chrono::{Duration, NaiveTime};
use std::path::Path;

// Three days of recordings; the fourth file crosses midnight with seizures
// before, across and after it.
fn multi_day_summary() -> String {
    summary_text(256, &[
        SummaryEntry { file_name: "chb90_01.edf", start: "10:00:00", end: "14:00:00", seizures: &[] },
        SummaryEntry { file_name: "chb90_02.edf", start: "14:00:00", end: "18:00:00", seizures: &[] },
        SummaryEntry { file_name: "chb90_03.edf", start: "18:00:00", end: "22:00:00", seizures: &[(3000, 3060)] },
        SummaryEntry {
            file_name: "chb90_04.edf",
            start: "22:00:00",
            end: "26:00:00",
            seizures: &[(7000, 7100), (7150, 7250), (10000, 10050)],
        },
        SummaryEntry { file_name: "chb90_05.edf", start: "26:00:00", end: "30:00:00", seizures: &[] },
        SummaryEntry { file_name: "chb90_06.edf", start: "09:00:00", end: "13:00:00", seizures: &[] },
        SummaryEntry { file_name: "chb90_07.edf", start: "08:00:00", end: "12:00:00", seizures: &[(5000, 5040)] },
        SummaryEntry { file_name: "chb90_08.edf", start: "12:00:00", end: "16:00:00", seizures: &[] },
    ])
}

fn annotated_session(config: &AnnotateConfig) -> (PatientSession, Allocation) {
    let summary = Summary::parse(&multi_day_summary(), Path::new("chb90-summary.txt")).unwrap();
    let mut session = summary.into_session("chb90", Path::new("/data/chb90"));
    reconcile_dates(&mut session.recordings);
    let allocation = allocate(&mut session, config);
    (session, allocation)
}

fn check_invariants(session: &PatientSession, allocation: &Allocation, config: &AnnotateConfig) {
    let seizures = session.ictal_intervals();
    let margin = Duration::hours(config.interictal_hour as i64);
    let horizon = Duration::minutes(config.sph as i64);

    assert!(session.recordings.windows(2).all(|w| w[0].start <= w[1].start));

    for rec in &session.recordings {
        for label in Label::ALL {
            for interval in rec.intervals(label) {
                assert!(interval.start < interval.end, "{} {} in {}", label, interval, rec.stem());
                assert!(rec.span().contains(interval), "{} {} outside {}", label, interval, rec.stem());
            }
        }
        for a in rec.intervals(Label::Interictal) {
            assert!(rec.intervals(Label::Preictal).iter().all(|b| !a.overlaps(b)));
        }
        for seizure in &rec.ictal {
            assert!(rec.intervals(Label::Interictal).iter().all(|b| !seizure.overlaps(b)));
            assert!(rec.intervals(Label::Preictal).iter().all(|b| !seizure.overlaps(b)));
        }
    }

    for interval in &allocation.interictal {
        for seizure in &seizures {
            assert!(interval.end <= seizure.start - margin || interval.start >= seizure.end + margin);
        }
    }
    for interval in &allocation.preictal {
        assert!(interval.duration() <= Duration::minutes(config.sop as i64));
        assert!(seizures.iter().any(|s| s.start - horizon == interval.end));
    }
}

#[test]
fn test_reconciled_timeline() {
    let (session, _) = annotated_session(&AnnotateConfig::default());
    let recs = &session.recordings;
    let day0 = recs[0].start.date();
    let t = |h, m, s| NaiveTime::from_hms_opt(h, m, s).unwrap();

    assert_eq!(recs[3].start.date(), day0);
    assert_eq!(recs[3].end.date(), day0.succ_opt().unwrap());
    assert_eq!(recs[4].start.date(), day0.succ_opt().unwrap());
    assert_eq!(recs[5].start.date(), day0.succ_opt().unwrap());
    assert_eq!(recs[6].start.date(), day0 + chrono::Days::new(2));

    let wrapping = &recs[3].ictal;
    assert_eq!((wrapping[0].start.date(), wrapping[0].start.time()), (day0, t(23, 56, 40)));
    assert_eq!((wrapping[1].start.date(), wrapping[1].end.time()), (day0, t(0, 0, 50)));
    assert_eq!(wrapping[1].end.date(), day0.succ_opt().unwrap());
    assert_eq!(wrapping[2].start.date(), day0.succ_opt().unwrap());

    assert_eq!(session.seizure_count(), 5);
}

#[test]
fn test_allowed_intervals() {
    let config = AnnotateConfig::default();
    let (session, allocation) = annotated_session(&config);
    let seizures = session.ictal_intervals();

    // 10:00 start minus 4 h is 06:00, 18:50 is far enough for one interval
    assert_eq!(allocation.interictal[0].start, session.start().unwrap());
    assert_eq!(allocation.interictal[0].end, seizures[0].start - Duration::hours(4));

    // the seizure straddling midnight follows its predecessor within 30 minutes
    assert_eq!(allocation.preictal.len(), 4);
    assert_eq!(allocation.preictal[2].end, seizures[3].start - Duration::minutes(5));
    assert_eq!(allocation.preictal[2].duration(), Duration::minutes(30));

    check_invariants(&session, &allocation, &config);
}

#[test]
fn test_invariants_hold_for_both_policies() {
    for advance in [AdvancePolicy::Single, AdvancePolicy::Exhaustive] {
        for (sop, sph, hours) in [(30, 5, 4), (60, 10, 2), (15, 1, 1)] {
            let config = AnnotateConfig { sop, sph, interictal_hour: hours, advance, ..AnnotateConfig::default() };
            let (session, allocation) = annotated_session(&config);
            check_invariants(&session, &allocation, &config);
        }
    }
}

#[test]
fn test_exhaustive_fills_at_least_as_much_as_single() {
    let total = |advance| {
        let config = AnnotateConfig { interictal_hour: 1, advance, ..AnnotateConfig::default() };
        let (session, _) = annotated_session(&config);
        session.recordings
            .iter()
            .flat_map(|r| r.interictal.iter().chain(r.preictal.iter()))
            .map(|i| i.duration())
            .fold(Duration::zero(), |a, b| a + b)
    };
    assert!(total(AdvancePolicy::Exhaustive) >= total(AdvancePolicy::Single));
}

#[test]
fn test_single_recording_scenario() {
    let text = summary_text(256, &[SummaryEntry {
        file_name: "chb91_01.edf",
        start: "01:00:00",
        end: "05:00:00",
        seizures: &[(120, 180)],
    }]);
    let summary = Summary::parse(&text, Path::new("chb91-summary.txt")).unwrap();
    let mut session = summary.into_session("chb91", Path::new("chb91"));
    reconcile_dates(&mut session.recordings);
    let allocation = allocate(&mut session, &AnnotateConfig::default());

    let rec = &session.recordings[0];
    assert_eq!(rec.ictal[0].start.time(), NaiveTime::from_hms_opt(1, 2, 0).unwrap());
    assert_eq!(rec.ictal[0].end.time(), NaiveTime::from_hms_opt(1, 3, 0).unwrap());
    assert!(allocation.interictal.is_empty());
    assert!(allocation.preictal.is_empty());
    assert!(rec.interictal.is_empty() && rec.preictal.is_empty());
}
