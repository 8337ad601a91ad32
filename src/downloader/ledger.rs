// Persisted download status ledger

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{error, info, warn};

use super::models::{DownloadRecord, DownloadStatus};

/// Persistence collaborator for the ledger. Only ever called by
/// [`StatusLedger`], inside its mutex.
pub trait LedgerStore: Send + Sync {
    fn load(&self) -> std::io::Result<Vec<DownloadRecord>>;
    fn save(&self, records: &[DownloadRecord]) -> std::io::Result<()>;
}

/// JSON-array file store. Saving writes to a temp file in the target
/// directory and renames it over the destination, so readers never see a
/// torn collection.
pub struct JsonLedgerStore {
    path: PathBuf,
}

impl JsonLedgerStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LedgerStore for JsonLedgerStore {
    fn load(&self) -> std::io::Result<Vec<DownloadRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let content = std::fs::read_to_string(&self.path)?;
        match serde_json::from_str(&content) {
            Ok(records) => Ok(records),
            Err(e) => {
                // A corrupt ledger should not take the engine down.
                error!(path = %self.path.display(), error = %e, "unreadable ledger, starting empty");
                Ok(Vec::new())
            }
        }
    }

    fn save(&self, records: &[DownloadRecord]) -> std::io::Result<()> {
        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(dir)?;

        let json = serde_json::to_string_pretty(records)?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(json.as_bytes())?;
        tmp.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }
}

/// Thread-safe download ledger.
///
/// Every mutation holds one mutex across the full load, mutate, save cycle,
/// so concurrent workers can only ever interleave whole cycles.
pub struct StatusLedger {
    store: Box<dyn LedgerStore>,
    lock: Mutex<()>,
}

impl StatusLedger {
    pub fn new(store: Box<dyn LedgerStore>) -> Self {
        Self {
            store,
            lock: Mutex::new(()),
        }
    }

    /// Open a ledger backed by a JSON file.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self::new(Box::new(JsonLedgerStore::new(path)))
    }

    /// Register an item as pending. A record already keyed by `url` is
    /// reconciled back to `Pending` instead of duplicated.
    pub fn add_pending(&self, title: &str, url: &str) {
        let _guard = self.lock.lock().unwrap();
        let mut records = self.load_or_empty();

        if let Some(existing) = records.iter_mut().find(|r| r.url == url) {
            if existing.status != DownloadStatus::Pending {
                info!(url, from = ?existing.status, "re-queueing existing record");
                existing.status = DownloadStatus::Pending;
                existing.error_message = None;
                self.save_or_log(&records);
            }
            return;
        }

        records.push(DownloadRecord::pending(title, url));
        self.save_or_log(&records);
    }

    /// Overwrite the status (and optionally path/error) of the record keyed
    /// by `url`. An unknown url is a warning, never an implicit insert.
    pub fn update_status(
        &self,
        url: &str,
        status: DownloadStatus,
        file_path: Option<&str>,
        error_message: Option<&str>,
    ) {
        let _guard = self.lock.lock().unwrap();
        let mut records = self.load_or_empty();

        match records.iter_mut().find(|r| r.url == url) {
            Some(record) => {
                record.status = status;
                if let Some(path) = file_path {
                    record.file_path = Some(path.to_string());
                }
                if let Some(msg) = error_message {
                    record.error_message = Some(msg.to_string());
                }
            }
            None => {
                warn!(url, ?status, "status update for unknown url ignored");
                return;
            }
        }

        self.save_or_log(&records);
    }

    /// Snapshot of all records, for polling consumers.
    pub fn records(&self) -> Vec<DownloadRecord> {
        let _guard = self.lock.lock().unwrap();
        self.load_or_empty()
    }

    pub fn remove_completed(&self) -> Vec<DownloadRecord> {
        self.retain(|r| r.status != DownloadStatus::Completed)
    }

    pub fn remove_failed(&self) -> Vec<DownloadRecord> {
        self.retain(|r| r.status != DownloadStatus::Failed)
    }

    pub fn remove_all(&self) -> Vec<DownloadRecord> {
        self.retain(|_| false)
    }

    fn retain(&self, keep: impl Fn(&DownloadRecord) -> bool) -> Vec<DownloadRecord> {
        let _guard = self.lock.lock().unwrap();
        let mut records = self.load_or_empty();
        let before = records.len();
        records.retain(|r| keep(r));
        info!(removed = before - records.len(), kept = records.len(), "ledger pruned");
        self.save_or_log(&records);
        records
    }

    fn load_or_empty(&self) -> Vec<DownloadRecord> {
        self.store.load().unwrap_or_else(|e| {
            error!(error = %e, "ledger load failed");
            Vec::new()
        })
    }

    fn save_or_log(&self, records: &[DownloadRecord]) {
        if let Err(e) = self.store.save(records) {
            error!(error = %e, "ledger save failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_ledger() -> (tempfile::TempDir, StatusLedger) {
        let dir = tempfile::TempDir::new().unwrap();
        let ledger = StatusLedger::open(dir.path().join("downloads_history.json"));
        (dir, ledger)
    }

    #[test]
    fn add_pending_twice_keeps_one_record() {
        let (_dir, ledger) = temp_ledger();
        ledger.add_pending("Song A", "https://example.com/a");
        ledger.add_pending("Song A", "https://example.com/a");

        let records = ledger.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, DownloadStatus::Pending);
    }

    #[test]
    fn add_pending_requeues_a_failed_record() {
        let (_dir, ledger) = temp_ledger();
        ledger.add_pending("Song A", "https://example.com/a");
        ledger.update_status(
            "https://example.com/a",
            DownloadStatus::Failed,
            None,
            Some("boom"),
        );

        ledger.add_pending("Song A", "https://example.com/a");
        let records = ledger.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, DownloadStatus::Pending);
        assert!(records[0].error_message.is_none());
    }

    #[test]
    fn update_sets_path_and_error_independently() {
        let (_dir, ledger) = temp_ledger();
        ledger.add_pending("Song A", "https://example.com/a");

        ledger.update_status(
            "https://example.com/a",
            DownloadStatus::Completed,
            Some("/out/a.mp3"),
            None,
        );
        let record = &ledger.records()[0];
        assert_eq!(record.status, DownloadStatus::Completed);
        assert_eq!(record.file_path.as_deref(), Some("/out/a.mp3"));
        assert!(record.error_message.is_none());
    }

    #[test]
    fn update_for_unknown_url_is_a_no_op() {
        let (_dir, ledger) = temp_ledger();
        ledger.add_pending("Song A", "https://example.com/a");
        ledger.update_status(
            "https://example.com/ghost",
            DownloadStatus::Completed,
            None,
            None,
        );

        let records = ledger.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].url, "https://example.com/a");
        assert_eq!(records[0].status, DownloadStatus::Pending);
    }

    #[test]
    fn removals_filter_by_status() {
        let (_dir, ledger) = temp_ledger();
        for (title, url) in [("a", "u:a"), ("b", "u:b"), ("c", "u:c")] {
            ledger.add_pending(title, url);
        }
        ledger.update_status("u:a", DownloadStatus::Completed, None, None);
        ledger.update_status("u:b", DownloadStatus::Failed, None, Some("x"));

        let after_completed = ledger.remove_completed();
        assert_eq!(after_completed.len(), 2);

        let after_failed = ledger.remove_failed();
        assert_eq!(after_failed.len(), 1);
        assert_eq!(after_failed[0].url, "u:c");

        assert!(ledger.remove_all().is_empty());
        assert!(ledger.records().is_empty());
    }

    #[test]
    fn store_survives_reopening() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("downloads_history.json");
        {
            let ledger = StatusLedger::open(&path);
            ledger.add_pending("Song A", "https://example.com/a");
            ledger.update_status(
                "https://example.com/a",
                DownloadStatus::Downloading,
                None,
                None,
            );
        }

        let reopened = StatusLedger::open(&path);
        let records = reopened.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, DownloadStatus::Downloading);
    }

    #[test]
    fn corrupt_file_loads_as_empty() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("downloads_history.json");
        std::fs::write(&path, b"{ not json").unwrap();

        let ledger = StatusLedger::open(&path);
        assert!(ledger.records().is_empty());
    }

    #[test]
    fn saved_file_is_a_valid_json_array() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("downloads_history.json");
        let ledger = StatusLedger::open(&path);
        ledger.add_pending("Song A", "https://example.com/a");

        let content = std::fs::read_to_string(&path).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert!(parsed.is_array());
    }
}
