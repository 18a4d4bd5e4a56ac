use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;
use chrono::{NaiveDate, NaiveTime};

use crate::types::{EdfHeader, FileType, SignalParam, Annotation};
use crate::error::{AnnotateError, Result};
use crate::utils::{atoi_nonlocalized, atof_nonlocalized, parse_edf_time};
use crate::EDFLIB_TIME_DIMENSION;

/// Reader for EDF and EDF+ recordings.
///
/// CHB-MIT ships plain EDF files; window artifacts written by
/// [`EdfWriter`](crate::EdfWriter) are EDF+ with one annotation signal.
/// Both load through this type. Annotation signals are hidden from
/// [`EdfHeader::signals`] and their TALs are decoded into
/// [`annotations`](EdfReader::annotations).
///
/// # Examples
///
/// ```rust,no_run
/// use chbmit_annotate::EdfReader;
///
/// let mut reader = EdfReader::open("chb01/chb01_03.edf")?;
/// let header = reader.header();
/// println!("{} signals, {} s", header.signals.len(), header.duration_secs());
///
/// // Every data signal, one Vec per channel
/// let channels = reader.read_all_physical()?;
/// println!("{} samples in channel 0", channels[0].len());
/// # Ok::<(), chbmit_annotate::AnnotateError>(())
/// ```
pub struct EdfReader {
    file: BufReader<File>,
    header: EdfHeader,
    /// Byte layout of each data signal inside a data record
    signal_info: Vec<SignalInfo>,
    /// Per-signal read cursor, in samples
    sample_positions: Vec<i64>,
    header_size: usize,
    /// Bytes per data record, all signals included
    record_size: usize,
    annotations: Vec<Annotation>,
}

#[derive(Debug, Clone)]
struct SignalInfo {
    buffer_offset: usize,
    samples_per_record: i32,
}

impl EdfReader {
    /// Opens an EDF or EDF+ file and parses its header.
    ///
    /// For EDF+ files every data record is scanned once to collect the
    /// annotations; plain EDF files carry none.
    ///
    /// # Errors
    ///
    /// * `AnnotateError::FileNotFound` - file doesn't exist or can't be opened
    /// * `AnnotateError::UnsupportedFileType` - not EDF, or discontinuous EDF+
    /// * `AnnotateError::InvalidHeader` - header size field inconsistent
    /// * `AnnotateError::InvalidSignalCount` - invalid number of signals
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(&path)
            .map_err(|e| AnnotateError::FileNotFound(format!("{}: {}", path.as_ref().display(), e)))?;

        let mut reader = BufReader::new(file);

        let (header, signal_info, annotation_offsets, record_size) = Self::parse_header(&mut reader)?;
        let header_size = (signal_info.len() + annotation_offsets.len() + 1) * 256;
        let sample_positions = vec![0i64; header.signals.len()];

        let mut edf = EdfReader {
            file: reader,
            header,
            signal_info,
            sample_positions,
            header_size,
            record_size,
            annotations: Vec::new(),
        };

        if !annotation_offsets.is_empty() {
            edf.annotations = edf.read_annotations(&annotation_offsets)?;
        }

        Ok(edf)
    }

    pub fn header(&self) -> &EdfHeader {
        &self.header
    }

    /// Annotations decoded from the EDF+ TALs, timekeeping entries excluded.
    pub fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    /// Reads `count` physical samples from `signal`, advancing its cursor.
    pub fn read_physical_samples(&mut self, signal: usize, count: usize) -> Result<Vec<f64>> {
        let digital_samples = self.read_digital_samples(signal, count)?;

        let signal_param = &self.header.signals[signal];
        let physical_samples = digital_samples
            .into_iter()
            .map(|d| signal_param.to_physical(d))
            .collect();

        Ok(physical_samples)
    }

    /// Reads `count` raw digital samples from `signal`, advancing its cursor.
    ///
    /// Reads stop at the end of the file, so fewer than `count` samples may
    /// be returned.
    pub fn read_digital_samples(&mut self, signal: usize, count: usize) -> Result<Vec<i32>> {
        if signal >= self.header.signals.len() {
            return Err(AnnotateError::InvalidSignalIndex(signal));
        }

        if count == 0 {
            return Ok(Vec::new());
        }

        let info = self.signal_info[signal].clone();
        let signal_param = &self.header.signals[signal];
        let (digital_min, digital_max) = (signal_param.digital_min, signal_param.digital_max);
        let per_record = info.samples_per_record as i64;

        let samples_in_file = per_record * self.header.datarecords_in_file;
        let available_samples = (samples_in_file - self.sample_positions[signal]).max(0) as usize;
        let actual_count = count.min(available_samples);

        let mut samples = Vec::with_capacity(actual_count);

        while samples.len() < actual_count {
            let current_pos = self.sample_positions[signal];
            let record_index = current_pos / per_record;
            let sample_in_record = current_pos % per_record;

            let file_offset = self.header_size as u64
                + record_index as u64 * self.record_size as u64
                + info.buffer_offset as u64
                + sample_in_record as u64 * 2;

            self.file.seek(SeekFrom::Start(file_offset))?;

            let samples_in_current_record = (per_record - sample_in_record) as usize;
            let samples_to_read = (actual_count - samples.len()).min(samples_in_current_record);

            let mut buf = vec![0u8; samples_to_read * 2];
            self.file.read_exact(&mut buf)?;
            samples.extend(buf.chunks_exact(2).map(|b| {
                (i16::from_le_bytes([b[0], b[1]]) as i32).max(digital_min).min(digital_max)
            }));

            self.sample_positions[signal] = current_pos + samples_to_read as i64;
        }

        Ok(samples)
    }

    /// Reads every data signal in full, one physical `Vec` per signal.
    ///
    /// Walks the data records sequentially instead of seeking per signal,
    /// which is what whole-recording loads want. Cursors are left untouched.
    pub fn read_all_physical(&mut self) -> Result<Vec<Vec<f64>>> {
        let records = self.header.datarecords_in_file.max(0) as usize;
        let mut channels: Vec<Vec<f64>> = self.signal_info
            .iter()
            .map(|info| Vec::with_capacity(info.samples_per_record as usize * records))
            .collect();

        self.file.seek(SeekFrom::Start(self.header_size as u64))?;
        let mut record = vec![0u8; self.record_size];

        for _ in 0..records {
            self.file.read_exact(&mut record)?;
            for (channel, (info, param)) in channels
                .iter_mut()
                .zip(self.signal_info.iter().zip(&self.header.signals))
            {
                let start = info.buffer_offset;
                let end = start + info.samples_per_record as usize * 2;
                channel.extend(record[start..end].chunks_exact(2).map(|b| {
                    let digital = (i16::from_le_bytes([b[0], b[1]]) as i32)
                        .max(param.digital_min)
                        .min(param.digital_max);
                    param.to_physical(digital)
                }));
            }
        }

        Ok(channels)
    }

    /// Moves the cursor of `signal`, clamped to the file's sample range.
    pub fn seek(&mut self, signal: usize, position: i64) -> Result<i64> {
        let info = self.signal_info.get(signal).ok_or(AnnotateError::InvalidSignalIndex(signal))?;
        let max_position = info.samples_per_record as i64 * self.header.datarecords_in_file;

        let new_position = position.min(max_position).max(0);
        self.sample_positions[signal] = new_position;

        Ok(new_position)
    }

    fn read_annotations(&mut self, annotation_offsets: &[(usize, usize)]) -> Result<Vec<Annotation>> {
        let mut annotations = Vec::new();
        let records = self.header.datarecords_in_file.max(0) as usize;

        self.file.seek(SeekFrom::Start(self.header_size as u64))?;
        let mut record = vec![0u8; self.record_size];

        for _ in 0..records {
            self.file.read_exact(&mut record)?;
            for &(offset, len) in annotation_offsets {
                parse_tal_block(&record[offset..offset + len], &mut annotations)?;
            }
        }

        Ok(annotations)
    }

    #[allow(clippy::type_complexity)]
    fn parse_header(
        reader: &mut BufReader<File>,
    ) -> Result<(EdfHeader, Vec<SignalInfo>, Vec<(usize, usize)>, usize)> {
        reader.seek(SeekFrom::Start(0))?;
        let mut main_header = vec![0u8; 256];
        reader.read_exact(&mut main_header)?;

        let version = String::from_utf8_lossy(&main_header[0..8]);
        if !version.trim().starts_with('0') {
            return Err(AnnotateError::UnsupportedFileType(format!("Not an EDF file: {}", version)));
        }

        let signals_str = String::from_utf8_lossy(&main_header[252..256]);
        let total_signal_count = atoi_nonlocalized(&signals_str);
        if total_signal_count < 1 || total_signal_count > crate::EDFLIB_MAXSIGNALS as i32 {
            return Err(AnnotateError::InvalidSignalCount(total_signal_count));
        }

        let header_size_str = String::from_utf8_lossy(&main_header[184..192]);
        let expected_header_size = (total_signal_count + 1) * 256;
        if atoi_nonlocalized(&header_size_str) != expected_header_size {
            return Err(AnnotateError::InvalidHeader);
        }

        let reserved = String::from_utf8_lossy(&main_header[192..236]);
        let file_type = if reserved.starts_with("EDF+C") {
            FileType::EdfPlus
        } else if reserved.starts_with("EDF+D") {
            return Err(AnnotateError::UnsupportedFileType("Discontinuous EDF+ files are not supported".to_string()));
        } else {
            FileType::Edf
        };

        let patient_field = String::from_utf8_lossy(&main_header[8..88]).trim().to_string();
        let recording_field = String::from_utf8_lossy(&main_header[88..168]).trim().to_string();

        let date_str = String::from_utf8_lossy(&main_header[168..176]);
        let time_str = String::from_utf8_lossy(&main_header[176..184]);
        let (start_date, start_time) = Self::parse_datetime(&date_str, &time_str)?;

        let datarecords_str = String::from_utf8_lossy(&main_header[236..244]);
        let datarecords = atoi_nonlocalized(&datarecords_str) as i64;

        let duration_str = String::from_utf8_lossy(&main_header[244..252]);
        let datarecord_duration = if duration_str.trim() == "1" {
            EDFLIB_TIME_DIMENSION
        } else {
            parse_edf_time(&duration_str)?
        };

        let signal_header_size = total_signal_count as usize * 256;
        let mut signal_header = vec![0u8; signal_header_size];
        reader.read_exact(&mut signal_header)?;

        let (signals, signal_info, annotation_offsets, record_size) = Self::parse_signals(
            &signal_header,
            total_signal_count as usize,
            datarecords,
            file_type == FileType::EdfPlus,
        )?;

        let header = EdfHeader {
            file_type,
            signals,
            file_duration: datarecord_duration * datarecords,
            start_date,
            start_time,
            datarecords_in_file: datarecords,
            datarecord_duration,
            patient_field,
            recording_field,
        };

        Ok((header, signal_info, annotation_offsets, record_size))
    }

    fn parse_datetime(date_str: &str, time_str: &str) -> Result<(NaiveDate, NaiveTime)> {
        // "dd.mm.yy"
        let date_parts: Vec<&str> = date_str.split('.').collect();
        if date_parts.len() != 3 {
            return Err(AnnotateError::FormatError);
        }

        let day = atoi_nonlocalized(date_parts[0]);
        let month = atoi_nonlocalized(date_parts[1]);
        let year = {
            let yy = atoi_nonlocalized(date_parts[2]);
            if yy > 84 { 1900 + yy } else { 2000 + yy }
        };

        let start_date = NaiveDate::from_ymd_opt(year, month as u32, day as u32)
            .ok_or(AnnotateError::FormatError)?;

        // "hh.mm.ss"
        let time_parts: Vec<&str> = time_str.split('.').collect();
        if time_parts.len() != 3 {
            return Err(AnnotateError::FormatError);
        }

        let hour = atoi_nonlocalized(time_parts[0]);
        let minute = atoi_nonlocalized(time_parts[1]);
        let second = atoi_nonlocalized(time_parts[2]);

        let start_time = NaiveTime::from_hms_opt(hour as u32, minute as u32, second as u32)
            .ok_or(AnnotateError::FormatError)?;

        Ok((start_date, start_time))
    }

    #[allow(clippy::type_complexity)]
    fn parse_signals(
        signal_header: &[u8],
        total_signal_count: usize,
        datarecords: i64,
        edfplus: bool,
    ) -> Result<(Vec<SignalParam>, Vec<SignalInfo>, Vec<(usize, usize)>, usize)> {
        let mut signals = Vec::new();
        let mut signal_info = Vec::new();
        let mut annotation_offsets = Vec::new();
        let mut buffer_offset = 0;

        // Fields are stored column-wise: every signal's label, then every
        // signal's transducer, and so on.
        let field = |offset: usize, width: usize, i: usize| -> String {
            let start = total_signal_count * offset + i * width;
            String::from_utf8_lossy(&signal_header[start..start + width]).trim().to_string()
        };

        for i in 0..total_signal_count {
            let label = field(0, 16, i);
            let transducer = field(16, 80, i);
            let physical_dimension = field(96, 8, i);
            let physical_min = atof_nonlocalized(&field(104, 8, i));
            let physical_max = atof_nonlocalized(&field(112, 8, i));
            let digital_min = atoi_nonlocalized(&field(120, 8, i));
            let digital_max = atoi_nonlocalized(&field(128, 8, i));
            let prefilter = field(136, 80, i);
            let samples_per_record = atoi_nonlocalized(&field(216, 8, i));

            if samples_per_record < 1 {
                return Err(AnnotateError::InvalidFormat(format!(
                    "signal {} has {} samples per record", i, samples_per_record
                )));
            }
            let record_bytes = samples_per_record as usize * 2;

            if edfplus && label == "EDF Annotations" {
                annotation_offsets.push((buffer_offset, record_bytes));
            } else {
                if physical_min == physical_max {
                    return Err(AnnotateError::PhysicalMinEqualsMax);
                }
                if digital_min == digital_max {
                    return Err(AnnotateError::DigitalMinEqualsMax);
                }

                signals.push(SignalParam {
                    label,
                    samples_in_file: samples_per_record as i64 * datarecords,
                    physical_max,
                    physical_min,
                    digital_max,
                    digital_min,
                    samples_per_record,
                    physical_dimension,
                    prefilter,
                    transducer,
                });
                signal_info.push(SignalInfo { buffer_offset, samples_per_record });
            }

            buffer_offset += record_bytes;
        }

        Ok((signals, signal_info, annotation_offsets, buffer_offset))
    }
}

/// Decodes one annotation signal's bytes from a single data record.
///
/// Each TAL is `+onset[\x15duration]\x14desc\x14[desc\x14...]\0`. A TAL with
/// no description is the record's timekeeping stamp and is skipped.
fn parse_tal_block(bytes: &[u8], out: &mut Vec<Annotation>) -> Result<()> {
    for tal in bytes.split(|&b| b == 0x00).filter(|t| !t.is_empty()) {
        let mut parts = tal.split(|&b| b == 0x14);
        let timing = parts.next().unwrap_or_default();
        let timing = String::from_utf8_lossy(timing);

        let (onset_str, duration_str) = match timing.split_once('\u{15}') {
            Some((onset, duration)) => (onset.to_string(), Some(duration.to_string())),
            None => (timing.to_string(), None),
        };
        if !onset_str.starts_with('+') && !onset_str.starts_with('-') {
            return Err(AnnotateError::InvalidFormat(format!("TAL onset '{}' lacks a sign", onset_str)));
        }

        let onset = parse_edf_time(&onset_str)?;
        let duration = match duration_str {
            Some(d) if !d.is_empty() => parse_edf_time(&d)?,
            _ => -1,
        };

        for description in parts.filter(|d| !d.is_empty()) {
            out.push(Annotation {
                onset,
                duration,
                description: String::from_utf8_lossy(description).to_string(),
            });
        }
    }

    Ok(())
}
