//! Per-patient manifest: one window path per line, no header.
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, WriterBuilder};

use crate::error::Result;
use crate::types::Label;

pub const MANIFEST_FILE_NAME: &str = "manifest.csv";

pub fn write_manifest(path: &Path, entries: &[PathBuf]) -> Result<()> {
    let mut writer = WriterBuilder::new().has_headers(false).from_path(path)?;
    for entry in entries {
        let field = entry.to_string_lossy();
        writer.write_record([field.as_bytes()])?;
    }
    writer.flush()?;
    Ok(())
}

pub fn read_manifest(path: &Path) -> Result<Vec<PathBuf>> {
    let mut reader = ReaderBuilder::new().has_headers(false).from_path(path)?;
    let mut entries = Vec::new();
    for record in reader.records() {
        let record = record?;
        if let Some(field) = record.get(0).filter(|f| !f.is_empty()) {
            entries.push(PathBuf::from(field));
        }
    }
    Ok(entries)
}

/// Label encoded in a window file name, `<start>_<end>_<label>.<ext>`.
///
/// ```
/// use chbmit_annotate::{manifest::label_from_path, Label};
/// use std::path::Path;
///
/// assert_eq!(label_from_path(Path::new("out/chb01_03/400_520_ictal.edf")), Some(Label::Ictal));
/// assert_eq!(label_from_path(Path::new("notes.txt")), None);
/// ```
pub fn label_from_path(path: &Path) -> Option<Label> {
    path.file_stem()?
        .to_str()?
        .rsplit('_')
        .next()?
        .parse()
        .ok()
}

/// Windows per label; paths without a recognizable label are ignored.
pub fn label_counts<P: AsRef<Path>>(entries: &[P]) -> BTreeMap<Label, usize> {
    let mut counts = BTreeMap::new();
    for entry in entries {
        if let Some(label) = label_from_path(entry.as_ref()) {
            *counts.entry(label).or_insert(0) += 1;
        }
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_has_no_header_and_keeps_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(MANIFEST_FILE_NAME);
        let entries = vec![
            PathBuf::from("/data/chb01/out/chb01_01/0_7680_interictal.edf"),
            PathBuf::from("/data/chb01/out/chb01_03/766976_774656_ictal.edf"),
        ];
        write_manifest(&path, &entries).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().next(), Some("/data/chb01/out/chb01_01/0_7680_interictal.edf"));
        assert_eq!(read_manifest(&path).unwrap(), entries);
    }

    #[test]
    fn test_empty_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(MANIFEST_FILE_NAME);
        write_manifest(&path, &[]).unwrap();
        assert!(read_manifest(&path).unwrap().is_empty());
    }

    #[test]
    fn test_counts_by_label_suffix() {
        let entries = ["a/0_10_interictal.edf", "a/5_15_interictal.edf", "b/0_30_ictal.edf", "b/readme"];
        let counts = label_counts(&entries);
        assert_eq!(counts.get(&Label::Interictal), Some(&2));
        assert_eq!(counts.get(&Label::Ictal), Some(&1));
        assert_eq!(counts.get(&Label::Preictal), None);
    }
}
