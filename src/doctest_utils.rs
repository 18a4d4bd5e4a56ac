// Synthetic CHB-MIT style data for doctests and integration tests.

use std::fmt::Write as _;
use std::path::Path;

use chrono::NaiveTime;

use crate::recording::UNDATED;
use crate::{EdfWriter, Result, SignalParam};

pub const CHANNELS: [&str; 2] = ["FP1-F7", "F7-T7"];

fn channel(label: &str, sample_rate: i32) -> SignalParam {
    SignalParam {
        label: label.to_string(),
        samples_in_file: 0,
        physical_max: 3200.0,
        physical_min: -3200.0,
        digital_max: 32767,
        digital_min: -32768,
        samples_per_record: sample_rate,
        physical_dimension: "uV".to_string(),
        prefilter: String::new(),
        transducer: String::new(),
    }
}

/// Writes a two-channel recording of `seconds` at `sample_rate`, starting at
/// `start`. Channel `c` carries a 1 Hz sine of amplitude `50 * (c + 1)` uV.
pub fn create_recording_file<P: AsRef<Path>>(
    path: P,
    start: NaiveTime,
    seconds: usize,
    sample_rate: i32,
) -> Result<()> {
    let mut writer = EdfWriter::create(&path)?;
    writer.set_patient_info("chb00", "F", "X", "X")?;
    writer.set_start_datetime(UNDATED.and_time(start))?;
    for label in CHANNELS {
        writer.add_signal(channel(label, sample_rate))?;
    }

    let rate = sample_rate as usize;
    for _ in 0..seconds {
        let record: Vec<Vec<f64>> = (0..CHANNELS.len())
            .map(|c| {
                (0..rate)
                    .map(|i| {
                        let t = i as f64 / rate as f64;
                        50.0 * (c + 1) as f64 * (2.0 * std::f64::consts::PI * t).sin()
                    })
                    .collect()
            })
            .collect();
        writer.write_samples(&record)?;
    }
    writer.finalize()
}

/// Writes a 256 Hz window file annotated with `label`, like the segment
/// writer produces.
pub fn create_window_file<P: AsRef<Path>>(path: P, label: &str, seconds: usize) -> Result<()> {
    let mut writer = EdfWriter::create(&path)?;
    for name in CHANNELS {
        writer.add_signal(channel(name, 256))?;
    }
    writer.add_annotation(0.0, Some(seconds as f64), label)?;
    for _ in 0..seconds {
        writer.write_samples(&[vec![10.0; 256], vec![-10.0; 256]])?;
    }
    writer.finalize()
}

/// One `File Name:` block of a summary log.
pub struct SummaryEntry<'a> {
    pub file_name: &'a str,
    pub start: &'a str,
    pub end: &'a str,
    pub seizures: &'a [(i64, i64)],
}

/// Renders a summary log in the layout of the CHB-MIT `*-summary.txt` files.
pub fn summary_text(sampling_rate: u32, entries: &[SummaryEntry<'_>]) -> String {
    let mut text = format!("Data Sampling Rate: {} Hz\n*************************\n\n", sampling_rate);
    text.push_str("Channels in EDF Files:\n**********************\n");
    for (i, name) in CHANNELS.iter().enumerate() {
        let _ = writeln!(text, "Channel {}: {}", i + 1, name);
    }

    for entry in entries {
        let _ = write!(
            text,
            "\nFile Name: {}\nFile Start Time: {}\nFile End Time: {}\nNumber of Seizures in File: {}\n",
            entry.file_name,
            entry.start,
            entry.end,
            entry.seizures.len()
        );
        for (k, (start, end)) in entry.seizures.iter().enumerate() {
            let _ = writeln!(text, "Seizure {} Start Time: {} seconds", k + 1, start);
            let _ = writeln!(text, "Seizure {} End Time: {} seconds", k + 1, end);
        }
    }
    text
}
