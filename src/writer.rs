use std::fs::File;
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::Path;
use chrono::{Datelike, NaiveDateTime, Timelike};

use crate::types::{Annotation, SignalParam};
use crate::error::{AnnotateError, Result};
use crate::utils::format_tal_seconds;
use crate::EDFLIB_TIME_DIMENSION;

/// TAL bytes reserved for the annotation signal in each data record.
const EDFLIB_ANNOTATION_BYTES: usize = 120;

/// Longest description that still fits the TAL buffer next to its timing.
const EDFLIB_WRITE_MAX_ANNOTATION_LEN: usize = 40;

/// Sequential EDF+ writer.
///
/// Used to persist window artifacts: each window becomes one EDF+C file with
/// the source channels' calibration and a trailing `EDF Annotations` signal.
///
/// # File Creation Workflow
///
/// 1. Create writer with `EdfWriter::create()`
/// 2. Set patient info, start timestamp and annotations
/// 3. Add signal definitions with `add_signal()`
/// 4. Write one data record at a time with `write_samples()`
/// 5. Finalize the file with `finalize()`
///
/// Annotations must be added before the data records covering their onset
/// are written; later additions for an already written record are lost.
///
/// # Examples
///
/// ```rust,no_run
/// use chbmit_annotate::{EdfWriter, SignalParam};
///
/// let mut writer = EdfWriter::create("window.edf")?;
/// writer.set_patient_info("chb01", "X", "X", "X")?;
/// writer.add_signal(SignalParam {
///     label: "FP1-F7".to_string(),
///     samples_in_file: 0,
///     physical_max: 3200.0,
///     physical_min: -3200.0,
///     digital_max: 32767,
///     digital_min: -32768,
///     samples_per_record: 256,
///     physical_dimension: "uV".to_string(),
///     prefilter: String::new(),
///     transducer: String::new(),
/// })?;
/// writer.add_annotation(0.0, Some(1.0), "ictal")?;
/// writer.write_samples(&[vec![0.0; 256]])?;
/// writer.finalize()?;
/// # Ok::<(), chbmit_annotate::AnnotateError>(())
/// ```
pub struct EdfWriter {
    file: BufWriter<File>,
    signals: Vec<SignalParam>,
    start: NaiveDateTime,
    datarecord_duration: i64,
    records_written: usize,
    header_written: bool,
    patient_code: String,
    sex: String,
    birthdate: String,
    patient_name: String,
    annotations: Vec<Annotation>,
}

impl EdfWriter {
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::create(&path)
            .map_err(|e| AnnotateError::FileNotFound(format!("{}: {}", path.as_ref().display(), e)))?;

        Ok(EdfWriter {
            file: BufWriter::new(file),
            signals: Vec::new(),
            start: crate::recording::UNDATED.and_time(chrono::NaiveTime::MIN),
            datarecord_duration: EDFLIB_TIME_DIMENSION,
            records_written: 0,
            header_written: false,
            patient_code: "X".to_string(),
            sex: "X".to_string(),
            birthdate: "X".to_string(),
            patient_name: "X".to_string(),
            annotations: Vec::new(),
        })
    }

    pub fn add_signal(&mut self, mut signal: SignalParam) -> Result<()> {
        self.ensure_header_pending("add signal")?;

        // encode with the extrema a reader will see in the header
        signal.physical_min = format_physical(signal.physical_min).parse().unwrap_or(signal.physical_min);
        signal.physical_max = format_physical(signal.physical_max).parse().unwrap_or(signal.physical_max);

        if signal.physical_min == signal.physical_max {
            return Err(AnnotateError::PhysicalMinEqualsMax);
        }
        if signal.digital_min == signal.digital_max {
            return Err(AnnotateError::DigitalMinEqualsMax);
        }
        if signal.samples_per_record < 1 {
            return Err(AnnotateError::InvalidFormat("Signal needs at least one sample per record".to_string()));
        }

        self.signals.push(signal);
        Ok(())
    }

    pub fn set_patient_info(&mut self, code: &str, sex: &str, birthdate: &str, name: &str) -> Result<()> {
        self.ensure_header_pending("modify patient info")?;

        self.patient_code = code.to_string();
        self.sex = sex.to_string();
        self.birthdate = birthdate.to_string();
        self.patient_name = name.to_string();
        Ok(())
    }

    /// Start date and time written to the header (second precision).
    pub fn set_start_datetime(&mut self, start: NaiveDateTime) -> Result<()> {
        self.ensure_header_pending("modify start time")?;
        self.start = start;
        Ok(())
    }

    /// Queues an annotation; it is written with the data record covering
    /// `onset_seconds`.
    pub fn add_annotation(&mut self, onset_seconds: f64, duration_seconds: Option<f64>, description: &str) -> Result<()> {
        if onset_seconds < 0.0 {
            return Err(AnnotateError::InvalidFormat("Annotation onset cannot be negative".to_string()));
        }
        if duration_seconds.is_some_and(|d| d < 0.0) {
            return Err(AnnotateError::InvalidFormat("Annotation duration cannot be negative".to_string()));
        }
        if description.is_empty() {
            return Err(AnnotateError::InvalidFormat("Annotation description cannot be empty".to_string()));
        }

        self.annotations.push(Annotation {
            onset: (onset_seconds * EDFLIB_TIME_DIMENSION as f64) as i64,
            duration: duration_seconds
                .map(|d| (d * EDFLIB_TIME_DIMENSION as f64) as i64)
                .unwrap_or(-1),
            description: description.to_string(),
        });
        Ok(())
    }

    /// Writes one data record: `samples[i]` must hold exactly
    /// `samples_per_record` physical values for signal `i`.
    pub fn write_samples(&mut self, samples: &[Vec<f64>]) -> Result<()> {
        if samples.len() != self.signals.len() {
            return Err(AnnotateError::InvalidFormat("Sample count must match signal count".to_string()));
        }

        for (i, signal_samples) in samples.iter().enumerate() {
            let expected_samples = self.signals[i].samples_per_record as usize;
            if signal_samples.len() != expected_samples {
                return Err(AnnotateError::InvalidFormat(
                    format!("Signal {} expected {} samples per record, got {}",
                           i, expected_samples, signal_samples.len())
                ));
            }
        }

        if !self.header_written {
            // record count is patched in finalize()
            self.write_header(1)?;
        }

        let mut record = Vec::new();
        for (signal, signal_samples) in self.signals.iter().zip(samples) {
            for &physical_value in signal_samples {
                let digital_value = signal.to_digital(physical_value) as i16;
                record.extend_from_slice(&digital_value.to_le_bytes());
            }
        }
        record.extend_from_slice(&self.annotation_tal(self.records_written));
        self.file.write_all(&record)?;

        self.records_written += 1;
        Ok(())
    }

    pub fn finalize(mut self) -> Result<()> {
        self.file.flush()?;

        if self.header_written && self.records_written > 1 {
            let mut file = self.file.into_inner().map_err(|e| e.into_error())?;
            file.seek(SeekFrom::Start(236))?;
            file.write_all(format!("{:<8}", self.records_written).as_bytes())?;
            file.flush()?;
        }
        Ok(())
    }

    fn ensure_header_pending(&self, action: &str) -> Result<()> {
        if self.header_written {
            return Err(AnnotateError::InvalidFormat(format!("Cannot {} after writing header", action)));
        }
        Ok(())
    }

    fn write_header(&mut self, total_datarecords: i64) -> Result<()> {
        let annotation_signal = SignalParam {
            label: "EDF Annotations".to_string(),
            samples_in_file: total_datarecords * (EDFLIB_ANNOTATION_BYTES / 2) as i64,
            physical_max: 1.0,
            physical_min: -1.0,
            digital_max: 32767,
            digital_min: -32768,
            samples_per_record: (EDFLIB_ANNOTATION_BYTES / 2) as i32,
            physical_dimension: String::new(),
            prefilter: String::new(),
            transducer: String::new(),
        };

        let total_signals = self.signals.len() + 1;
        let header_size = (total_signals + 1) * 256;

        let mut main_header = vec![b' '; 256];
        main_header[0..8].copy_from_slice(b"0       ");

        let patient_field = format!(
            "{} {} {} {}",
            to_ascii(&self.patient_code),
            to_ascii(&self.sex),
            to_ascii(&self.birthdate),
            to_ascii(&self.patient_name),
        );
        put_field(&mut main_header[8..88], &patient_field);

        let recording_field = format!(
            "Startdate {:02}-{}-{:04} X X X",
            self.start.day(),
            self.start.format("%b").to_string().to_uppercase(),
            self.start.year(),
        );
        put_field(&mut main_header[88..168], &recording_field);

        let date_str = format!("{:02}.{:02}.{:02}",
            self.start.day(), self.start.month(), self.start.year() % 100);
        main_header[168..176].copy_from_slice(date_str.as_bytes());

        let time_str = format!("{:02}.{:02}.{:02}",
            self.start.hour(), self.start.minute(), self.start.second());
        main_header[176..184].copy_from_slice(time_str.as_bytes());

        put_field(&mut main_header[184..192], &header_size.to_string());
        main_header[192..197].copy_from_slice(b"EDF+C");
        put_field(&mut main_header[236..244], &total_datarecords.to_string());

        let duration_seconds = self.datarecord_duration as f64 / EDFLIB_TIME_DIMENSION as f64;
        put_field(&mut main_header[244..252], &format_tal_seconds(duration_seconds));
        put_field(&mut main_header[252..256], &total_signals.to_string());

        self.file.write_all(&main_header)?;

        let mut all_signals = self.signals.clone();
        all_signals.push(annotation_signal);
        self.write_signal_headers(&all_signals)?;

        self.header_written = true;
        Ok(())
    }

    fn write_signal_headers(&mut self, all_signals: &[SignalParam]) -> Result<()> {
        let columns: [(usize, fn(&SignalParam) -> String); 10] = [
            (16, |s| s.label.clone()),
            (80, |s| s.transducer.clone()),
            (8, |s| s.physical_dimension.clone()),
            (8, |s| format_physical(s.physical_min)),
            (8, |s| format_physical(s.physical_max)),
            (8, |s| s.digital_min.to_string()),
            (8, |s| s.digital_max.to_string()),
            (80, |s| s.prefilter.clone()),
            (8, |s| s.samples_per_record.to_string()),
            (32, |_| String::new()),
        ];

        for (width, value) in columns {
            for signal in all_signals {
                let mut field_data = vec![b' '; width];
                put_field(&mut field_data, &to_ascii(&value(signal)));
                self.file.write_all(&field_data)?;
            }
        }

        Ok(())
    }

    fn annotation_tal(&self, data_record_index: usize) -> Vec<u8> {
        let record_seconds = self.datarecord_duration as f64 / EDFLIB_TIME_DIMENSION as f64;
        let record_start = data_record_index as f64 * record_seconds;
        let record_end = record_start + record_seconds;

        // timekeeping TAL
        let mut tal_data = Vec::with_capacity(EDFLIB_ANNOTATION_BYTES);
        tal_data.push(b'+');
        tal_data.extend_from_slice(format_tal_seconds(record_start).as_bytes());
        tal_data.extend_from_slice(&[0x14, 0x14, 0x00]);

        for annotation in &self.annotations {
            let onset = annotation.onset as f64 / EDFLIB_TIME_DIMENSION as f64;
            if onset < record_start || onset >= record_end {
                continue;
            }

            let mut entry = vec![b'+'];
            entry.extend_from_slice(format_tal_seconds(onset).as_bytes());
            if annotation.duration >= 0 {
                entry.push(0x15);
                let duration = annotation.duration as f64 / EDFLIB_TIME_DIMENSION as f64;
                entry.extend_from_slice(format_tal_seconds(duration).as_bytes());
            }
            entry.push(0x14);

            // room for the closing 0x14 and 0x00
            let room = EDFLIB_ANNOTATION_BYTES.saturating_sub(tal_data.len() + entry.len() + 2);
            if room == 0 {
                break;
            }
            let description = annotation.description.as_bytes();
            let desc_len = description.len().min(EDFLIB_WRITE_MAX_ANNOTATION_LEN).min(room);
            entry.extend_from_slice(&description[..desc_len]);
            entry.extend_from_slice(&[0x14, 0x00]);
            tal_data.extend_from_slice(&entry);
        }

        tal_data.resize(EDFLIB_ANNOTATION_BYTES, 0x00);
        tal_data
    }
}

/// Left-aligns `value` in a space-padded header field, truncating overflow.
fn put_field(field: &mut [u8], value: &str) {
    let bytes = value.as_bytes();
    let len = bytes.len().min(field.len());
    field[..len].copy_from_slice(&bytes[..len]);
}

/// Physical extrema must fit in 8 characters; keeps as many decimals as fit.
fn format_physical(value: f64) -> String {
    (0..=7usize).rev()
        .map(|precision| {
            let s = format!("{:.*}", precision, value);
            if s.contains('.') {
                s.trim_end_matches('0').trim_end_matches('.').to_string()
            } else {
                s
            }
        })
        .find(|s| s.len() <= 8)
        .unwrap_or_else(|| format!("{:.1e}", value))
}

/// Replaces non-ASCII characters with '_'; EDF headers are 7-bit ASCII.
fn to_ascii(s: &str) -> String {
    s.chars()
        .map(|c| if c.is_ascii() && !c.is_ascii_control() { c } else { '_' })
        .collect()
}
