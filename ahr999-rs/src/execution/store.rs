//! Append-only execution record stores

use crate::error::{DcaError, Result};
use crate::execution::ExecutionRecord;
use chrono::NaiveDate;
use std::fs::{self, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, warn};

/// Durable log of execution records; the only state shared between runs
pub trait RecordStore: Send + Sync {
    /// Append one record; must be atomic with respect to readers
    fn append(&self, record: &ExecutionRecord) -> Result<()>;

    /// Every record, oldest first
    fn all(&self) -> Result<Vec<ExecutionRecord>>;

    fn records_for(&self, date: NaiveDate) -> Result<Vec<ExecutionRecord>> {
        Ok(self.all()?.into_iter().filter(|r| r.date == date).collect())
    }

    /// The newest `limit` records, oldest first
    fn latest(&self, limit: usize) -> Result<Vec<ExecutionRecord>> {
        let mut records = self.all()?;
        let start = records.len().saturating_sub(limit);
        Ok(records.split_off(start))
    }
}

/// One JSON object per line; each append is a single write followed by fsync
pub struct JsonlRecordStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonlRecordStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        Ok(Self {
            path,
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RecordStore for JsonlRecordStore {
    fn append(&self, record: &ExecutionRecord) -> Result<()> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| DcaError::Store("record store lock poisoned".to_string()))?;

        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&self.path)?;

        // A torn previous write leaves no trailing newline; start on a fresh line
        if file.metadata()?.len() > 0 {
            let mut last = [0u8; 1];
            file.seek(SeekFrom::End(-1))?;
            file.read_exact(&mut last)?;
            if last[0] != b'\n' {
                line.insert(0, '\n');
            }
        }

        file.write_all(line.as_bytes())?;
        file.sync_data()?;
        debug!("appended {} record for {} on {}", record.status, record.venue, record.date);
        Ok(())
    }

    fn all(&self) -> Result<Vec<ExecutionRecord>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut records = Vec::new();
        for (number, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<ExecutionRecord>(line) {
                Ok(record) => records.push(record),
                Err(e) => warn!(
                    "⚠️ Skipping unreadable record at {}:{}: {}",
                    self.path.display(),
                    number + 1,
                    e
                ),
            }
        }
        Ok(records)
    }
}

/// Process-local store for tests and one-shot inspection
#[derive(Default)]
pub struct MemoryRecordStore {
    records: Mutex<Vec<ExecutionRecord>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RecordStore for MemoryRecordStore {
    fn append(&self, record: &ExecutionRecord) -> Result<()> {
        self.records
            .lock()
            .map_err(|_| DcaError::Store("record store lock poisoned".to_string()))?
            .push(record.clone());
        Ok(())
    }

    fn all(&self) -> Result<Vec<ExecutionRecord>> {
        Ok(self
            .records
            .lock()
            .map_err(|_| DcaError::Store("record store lock poisoned".to_string()))?
            .clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::TradingPair;
    use crate::execution::RecordContext;
    use tempfile::TempDir;

    fn record(day: u32, venue: &str) -> ExecutionRecord {
        let pair = TradingPair::new("BTC", "USDT");
        RecordContext {
            date: NaiveDate::from_ymd_opt(2024, 5, day).unwrap(),
            venue,
            pair: &pair,
            snapshot: None,
            dry_run: false,
        }
        .skipped("hold")
    }

    #[test]
    fn test_jsonl_roundtrip_and_filter() {
        let dir = TempDir::new().unwrap();
        let store = JsonlRecordStore::open(dir.path().join("nested/records.jsonl")).unwrap();
        assert!(store.all().unwrap().is_empty());

        store.append(&record(1, "binance")).unwrap();
        store.append(&record(2, "binance")).unwrap();
        store.append(&record(2, "okx")).unwrap();

        let reopened = JsonlRecordStore::open(store.path()).unwrap();
        assert_eq!(reopened.all().unwrap().len(), 3);
        assert_eq!(reopened.records_for(NaiveDate::from_ymd_opt(2024, 5, 2).unwrap()).unwrap().len(), 2);
        assert_eq!(reopened.latest(1).unwrap()[0].venue, "okx");
    }

    #[test]
    fn test_torn_tail_is_skipped_and_isolated() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("records.jsonl");
        let store = JsonlRecordStore::open(&path).unwrap();
        store.append(&record(1, "binance")).unwrap();

        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(b"{\"date\":\"2024-05-0").unwrap();
        drop(file);

        assert_eq!(store.all().unwrap().len(), 1);
        store.append(&record(3, "binance")).unwrap();
        let records = store.all().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].date, NaiveDate::from_ymd_opt(2024, 5, 3).unwrap());
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryRecordStore::new();
        assert!(store.is_empty());
        store.append(&record(1, "bitget")).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.all().unwrap()[0].venue, "bitget");
    }
}
