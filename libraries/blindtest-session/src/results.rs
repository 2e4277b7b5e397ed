//! Result log - the listener's answers across trials
//!
//! Persisted as JSON lines: one `ResultRecord` object per line, so runs can
//! append without rewriting the file.

use blindtest_core::{Result, ResultRecord};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use tracing::{debug, warn};

/// Ordered list of trial results
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultLog {
    records: Vec<ResultRecord>,
}

impl ResultLog {
    /// Create an empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record
    pub fn append(&mut self, record: ResultRecord) {
        self.records.push(record);
    }

    /// Remove all records
    pub fn reset(&mut self) {
        self.records.clear();
    }

    /// Records in the order they were appended
    pub fn records(&self) -> &[ResultRecord] {
        &self.records
    }

    /// Iterate over records
    pub fn iter(&self) -> impl Iterator<Item = &ResultRecord> {
        self.records.iter()
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if the log is empty
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of trials where the listener found the HQ slot
    pub fn passes(&self) -> usize {
        self.records.iter().filter(|r| r.is_correct()).count()
    }

    /// Write every record to `path`, replacing its contents
    pub fn save(&self, path: &Path) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        for record in &self.records {
            serde_json::to_writer(&mut writer, record)?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;
        debug!("Saved {} results to {}", self.records.len(), path.display());
        Ok(())
    }

    /// Append one record to `path`, creating the file if needed
    pub fn append_to_file(path: &Path, record: &ResultRecord) -> Result<()> {
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');
        file.write_all(&line)?;
        Ok(())
    }

    /// Read a log written by `save` or `append_to_file`
    ///
    /// Blank lines are skipped; a malformed line is an error.
    pub fn load(path: &Path) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let mut records = Vec::new();

        for (number, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let record = serde_json::from_str(&line).map_err(|e| {
                warn!("Malformed result on line {} of {}", number + 1, path.display());
                e
            })?;
            records.push(record);
        }

        Ok(Self { records })
    }
}

impl Extend<ResultRecord> for ResultLog {
    fn extend<T: IntoIterator<Item = ResultRecord>>(&mut self, iter: T) {
        self.records.extend(iter);
    }
}

impl<'a> IntoIterator for &'a ResultLog {
    type Item = &'a ResultRecord;
    type IntoIter = std::slice::Iter<'a, ResultRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blindtest_core::{BlindTestError, QualityFactor, Slot, TestType};

    fn record(chosen: Slot) -> ResultRecord {
        ResultRecord {
            filename: "song.flac".to_string(),
            test_type: TestType::SamplingRate,
            hq_factor: QualityFactor(96_000),
            lq_factor: QualityFactor(48_000),
            better_slot: Slot::First,
            chosen_slot: chosen,
            memo: String::new(),
        }
    }

    #[test]
    fn append_and_reset() {
        let mut log = ResultLog::new();
        log.append(record(Slot::First));
        log.append(record(Slot::Second));

        assert_eq!(log.len(), 2);
        assert_eq!(log.passes(), 1);
        assert_eq!(log.records()[1].chosen_slot, Slot::Second);

        log.reset();
        assert!(log.is_empty());
    }

    #[test]
    fn save_then_load_preserves_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.jsonl");

        let mut log = ResultLog::new();
        log.extend([record(Slot::Second), record(Slot::First)]);
        log.save(&path).unwrap();

        let loaded = ResultLog::load(&path).unwrap();
        assert_eq!(loaded, log);
    }

    #[test]
    fn append_to_file_accumulates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.jsonl");

        ResultLog::append_to_file(&path, &record(Slot::First)).unwrap();
        ResultLog::append_to_file(&path, &record(Slot::Second)).unwrap();

        let loaded = ResultLog::load(&path).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.passes(), 1);
    }

    #[test]
    fn malformed_line_is_serialization_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.jsonl");
        std::fs::write(&path, "{\"filename\": 3}\n").unwrap();

        assert!(matches!(
            ResultLog::load(&path),
            Err(BlindTestError::Serialization(_))
        ));
    }

    #[test]
    fn missing_file_is_io_error() {
        let result = ResultLog::load(Path::new("/nonexistent/results.jsonl"));
        assert!(matches!(result, Err(BlindTestError::Io(_))));
    }
}
