//! Assigns calendar days to a patient's wall-clock timestamps.
//!
//! Summary logs give only times of day. Recordings are consecutive, so a day
//! boundary is crossed whenever a file ends earlier in the day than it starts,
//! or starts earlier in the day than the previous file ended. Files are
//! assumed to last at most about five hours, which is what lets a seizure's
//! own clock time tell on which side of midnight it happened.
use chrono::{Duration, NaiveTime, Timelike};

use crate::recording::Recording;

/// Shifts every recording and its seizures by the whole days elapsed since
/// the first file. Recordings must be in log order and undated.
///
/// ```
/// use chbmit_annotate::{reconcile::reconcile_dates, Recording};
/// use chrono::NaiveTime;
///
/// let t = |h| NaiveTime::from_hms_opt(h, 0, 0).unwrap();
/// let mut recs = vec![
///     Recording::new("a.edf", t(22), t(23), 0),
///     Recording::new("b.edf", t(1), t(2), 0),
/// ];
/// reconcile_dates(&mut recs);
/// assert_eq!((recs[1].start - recs[0].start).num_hours(), 3);
/// ```
pub fn reconcile_dates(recordings: &mut [Recording]) {
    recordings.iter_mut().fold((0i64, NaiveTime::MIN), |(days_passed, prev_end), recording| {
        let days_passed = if recording.end.time() < recording.start.time() {
            reconcile_wrapping(recording, days_passed)
        } else {
            let days_passed = if recording.start.time() < prev_end {
                days_passed + 1
            } else {
                days_passed
            };
            recording.shift_days(days_passed);
            days_passed
        };
        (days_passed, recording.end.time())
    });
}

/// A file crossing midnight: start stays on the current day, end moves to
/// the next, and each seizure is placed by its own clock time.
fn reconcile_wrapping(recording: &mut Recording, days_passed: i64) -> i64 {
    let before_midnight = Duration::days(days_passed);
    let after_midnight = Duration::days(days_passed + 1);

    recording.start += before_midnight;
    recording.end += after_midnight;

    for section in &mut recording.ictal {
        if section.end < section.start {
            section.start += before_midnight;
            section.end += after_midnight;
        } else if (20..24).contains(&section.end.hour()) {
            section.start += before_midnight;
            section.end += before_midnight;
        } else if section.end.hour() < 5 {
            section.start += after_midnight;
            section.end += after_midnight;
        } else {
            tracing::warn!(
                file = %recording.file_path.display(),
                seizure = %section,
                "seizure clock time fits neither side of midnight, left undated"
            );
        }
    }

    days_passed + 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::UNDATED;
    use chrono::NaiveDateTime;

    fn t(h: u32, m: u32, s: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, s).unwrap()
    }

    fn day(n: u64, time: NaiveTime) -> NaiveDateTime {
        (UNDATED + chrono::Days::new(n)).and_time(time)
    }

    #[test]
    fn test_same_day_files_keep_their_day() {
        let mut recs = vec![
            Recording::new("a.edf", t(11, 42, 54), t(12, 42, 54), 0),
            Recording::new("b.edf", t(12, 42, 57), t(13, 42, 57), 0),
        ];
        reconcile_dates(&mut recs);
        assert_eq!(recs[0].start, day(0, t(11, 42, 54)));
        assert_eq!(recs[1].end, day(0, t(13, 42, 57)));
    }

    #[test]
    fn test_gap_across_midnight_advances_day() {
        let mut recs = vec![
            Recording::new("a.edf", t(21, 0, 0), t(22, 0, 0), 0),
            Recording::new("b.edf", t(2, 0, 0), t(3, 0, 0), 1),
        ];
        recs[1].add_ictal_section(600, 660);
        reconcile_dates(&mut recs);

        assert_eq!(recs[1].start, day(1, t(2, 0, 0)));
        assert_eq!(recs[1].ictal[0].start, day(1, t(2, 10, 0)));
        assert_eq!(recs[1].ictal[0].end, day(1, t(2, 11, 0)));
    }

    #[test]
    fn test_wrapping_file_places_seizures_by_clock_time() {
        let mut recs = vec![
            Recording::new("a.edf", t(20, 0, 0), t(22, 30, 0), 0),
            Recording::new("b.edf", t(22, 30, 5), t(2, 30, 5), 3),
            Recording::new("c.edf", t(2, 30, 10), t(3, 30, 10), 0),
        ];
        // before midnight, straddling midnight, after midnight
        recs[1].add_ictal_section(1_800, 1_860);
        recs[1].add_ictal_section(5_300, 5_500);
        recs[1].add_ictal_section(9_000, 9_060);
        reconcile_dates(&mut recs);

        let b = &recs[1];
        assert_eq!(b.start, day(0, t(22, 30, 5)));
        assert_eq!(b.end, day(1, t(2, 30, 5)));
        assert_eq!(b.ictal[0].start, day(0, t(23, 0, 5)));
        assert_eq!(b.ictal[1].start, day(0, t(23, 58, 25)));
        assert_eq!(b.ictal[1].end, day(1, t(0, 1, 45)));
        assert_eq!(b.ictal[2].start, day(1, t(1, 0, 5)));

        assert_eq!(recs[2].start, day(1, t(2, 30, 10)));

        for rec in &recs {
            for section in &rec.ictal {
                assert!(section.start < section.end);
                assert!(rec.start <= section.start && section.end <= rec.end);
            }
        }
    }

    #[test]
    fn test_starts_are_monotonic_over_several_days() {
        let mut recs = vec![
            Recording::new("1.edf", t(10, 0, 0), t(14, 0, 0), 0),
            Recording::new("2.edf", t(14, 0, 0), t(18, 0, 0), 0),
            Recording::new("3.edf", t(22, 0, 0), t(2, 0, 0), 0),
            Recording::new("4.edf", t(2, 0, 0), t(6, 0, 0), 0),
            Recording::new("5.edf", t(9, 0, 0), t(13, 0, 0), 0),
            Recording::new("6.edf", t(8, 0, 0), t(9, 0, 0), 0),
        ];
        reconcile_dates(&mut recs);

        assert!(recs.windows(2).all(|w| w[0].start <= w[1].start));
        assert!(recs.iter().all(|r| r.start < r.end));
        assert_eq!(recs[5].start, day(2, t(8, 0, 0)));
    }

    #[test]
    fn test_implausible_seizure_time_is_left_alone() {
        // a 12:00 seizure cannot happen inside a 23:00-01:00 file
        let mut recs = vec![Recording::new("odd.edf", t(23, 0, 0), t(1, 0, 0), 1)];
        recs[0].add_ictal_section(13 * 3600, 13 * 3600 + 60);
        reconcile_dates(&mut recs);
        assert_eq!(recs[0].ictal[0].start, day(0, t(12, 0, 0)));
    }
}
