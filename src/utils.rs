use chrono::NaiveTime;

use crate::error::{AnnotateError, Result};

/// Parses an EDF seconds field (`"1"`, `"0.5"`, `"-2.5"`) into 100 ns units.
pub fn parse_edf_time(s: &str) -> Result<i64> {
    let s = s.trim();

    if s.is_empty() {
        return Err(AnnotateError::InvalidFormat("Empty time string".to_string()));
    }

    let (negative, s) = if let Some(rest) = s.strip_prefix('-') {
        (true, rest)
    } else if let Some(rest) = s.strip_prefix('+') {
        (false, rest)
    } else {
        (false, s)
    };

    let mut value = 0i64;

    if let Some((integer_part, decimal_part)) = s.split_once('.') {
        if !integer_part.is_empty() {
            value += integer_part.parse::<i64>()
                .map_err(|_| AnnotateError::InvalidFormat("Invalid integer part".to_string()))?
                * crate::EDFLIB_TIME_DIMENSION;
        }

        // at most 7 digits of precision
        if !decimal_part.is_empty() {
            let decimal_str = if decimal_part.len() > 7 {
                &decimal_part[..7]
            } else {
                decimal_part
            };

            let decimal_value = decimal_str.parse::<i64>()
                .map_err(|_| AnnotateError::InvalidFormat("Invalid decimal part".to_string()))?;

            let scale = 10i64.pow(7 - decimal_str.len() as u32);
            value += decimal_value * scale;
        }
    } else {
        value = s.parse::<i64>()
            .map_err(|_| AnnotateError::InvalidFormat("Invalid integer".to_string()))?
            * crate::EDFLIB_TIME_DIMENSION;
    }

    if negative {
        value = -value;
    }

    Ok(value)
}

/// Formats seconds the way TAL onsets are written: no trailing zeros.
pub fn format_tal_seconds(seconds: f64) -> String {
    if seconds.fract() == 0.0 {
        format!("{}", seconds as i64)
    } else {
        format!("{:.7}", seconds).trim_end_matches('0').trim_end_matches('.').to_string()
    }
}

/// Locale-independent integer parsing; blank or garbage fields read as 0.
pub fn atoi_nonlocalized(s: &str) -> i32 {
    let s = s.trim();
    if s.is_empty() {
        return 0;
    }

    s.parse().unwrap_or(0)
}

pub fn atof_nonlocalized(s: &str) -> f64 {
    let s = s.trim();
    if s.is_empty() {
        return 0.0;
    }

    s.parse().unwrap_or(0.0)
}

/// Parses a summary-log clock time `HH:MM:SS` into a time of day.
///
/// Hours of 24 or more mean "past midnight" and wrap back into `[0, 24)`,
/// so `25:10:00` reads as `01:10:00`. The day itself is recovered later by
/// the date reconciler.
///
/// ```
/// use chbmit_annotate::utils::parse_clock_time;
/// use chrono::NaiveTime;
///
/// assert_eq!(parse_clock_time("25:10:00").unwrap(),
///            NaiveTime::from_hms_opt(1, 10, 0).unwrap());
/// ```
pub fn parse_clock_time(s: &str) -> Result<NaiveTime> {
    let invalid = || AnnotateError::InvalidFormat(format!("invalid clock time '{}'", s.trim()));

    let mut parts = s.trim().split(':');
    let mut field = || -> Result<u32> {
        parts.next()
            .and_then(|p| p.trim().parse::<u32>().ok())
            .ok_or_else(invalid)
    };
    let hour = field()?;
    let minute = field()?;
    let second = field()?;
    if parts.next().is_some() {
        return Err(invalid());
    }

    NaiveTime::from_hms_opt(hour % 24, minute, second).ok_or_else(invalid)
}
