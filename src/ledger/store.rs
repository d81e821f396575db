/// Append-only per-user ledger store
///
/// One CSV file per user under the ledger directory. Current state is always
/// a fold over the log (see `positions`); the store itself never mutates or
/// deletes rows.
///
/// Concurrency: every mutation for a user must run under that user's keyed
/// async lock. The settlement engine holds the guard across its whole
/// resolve -> compute -> append sequence so a second message from the same
/// user cannot interleave.
use super::entry::{LedgerEntry, TIMESTAMP_FORMAT};
use crate::arguments::is_debug_ledger_enabled;
use crate::errors::{BotError, BotResult};
use crate::logger::{self, LogTag};
use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

const HEADER: &str = "timestamp,source,category,stock_code,stock_name,shares,price,amount,profit_loss";

pub struct LedgerStore {
    dir: PathBuf,
    /// Per-user mutation locks, created on first use
    locks: RwLock<HashMap<String, Arc<Mutex<()>>>>,
    /// System-wide exclusive archival phase; appends are rejected while set
    archiving: AtomicBool,
}

impl LedgerStore {
    pub fn new<P: AsRef<Path>>(dir: P) -> BotResult<Self> {
        std::fs::create_dir_all(dir.as_ref())?;
        Ok(Self {
            dir: dir.as_ref().to_path_buf(),
            locks: RwLock::new(HashMap::new()),
            archiving: AtomicBool::new(false),
        })
    }

    /// Whether the exclusive archival phase is active
    pub fn is_archiving(&self) -> bool {
        self.archiving.load(Ordering::SeqCst)
    }

    pub(crate) fn set_archiving(&self, active: bool) {
        self.archiving.store(active, Ordering::SeqCst);
    }

    pub fn user_file(&self, user_id: &str) -> PathBuf {
        self.dir.join(format!("{}.csv", user_id))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Acquire the mutation lock for one user
    ///
    /// Hold the guard for the full read-modify-append sequence. Locks for
    /// different users are independent.
    pub async fn lock_user(&self, user_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.write().await;
            locks
                .entry(user_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };

        let guard = lock.lock_owned().await;
        if is_debug_ledger_enabled() {
            logger::debug(LogTag::Ledger, &format!("Acquired ledger lock for user {}", user_id));
        }
        guard
    }

    /// Read a user's full log in file (append) order
    ///
    /// A missing file is an empty log, not an error.
    pub fn read_log(&self, user_id: &str) -> BotResult<Vec<LedgerEntry>> {
        let path = self.user_file(user_id);
        if !path.exists() {
            return Ok(Vec::new());
        }

        let mut reader = csv::Reader::from_path(&path)?;
        let mut entries = Vec::new();
        for row in reader.deserialize() {
            let mut entry: LedgerEntry = row?;
            entry.user_id = user_id.to_string();
            entries.push(entry);
        }
        Ok(entries)
    }

    /// Append a batch of entries for one user as a single atomic write
    ///
    /// All rows are serialized into a buffer first; only a fully serialized
    /// batch reaches the file, in one write + flush. Rejected with SystemBusy
    /// while the monthly archival phase is active.
    ///
    /// The caller must hold the user's lock (`lock_user`).
    pub fn append_batch(&self, user_id: &str, entries: &[LedgerEntry]) -> BotResult<()> {
        if self.is_archiving() {
            return Err(BotError::SystemBusy);
        }
        if entries.is_empty() {
            return Ok(());
        }

        let path = self.user_file(user_id);
        let is_new = !path.exists();

        // Serialize the whole batch before touching the file
        let mut buffer = Vec::new();
        if is_new {
            buffer.extend_from_slice(HEADER.as_bytes());
            buffer.push(b'\n');
        }
        {
            let mut writer = csv::WriterBuilder::new()
                .has_headers(false)
                .from_writer(&mut buffer);
            for entry in entries {
                writer.serialize(entry)?;
            }
            writer.flush()?;
        }

        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        file.write_all(&buffer)?;
        file.flush()?;

        if is_debug_ledger_enabled() {
            logger::debug(
                LogTag::Ledger,
                &format!("Appended {} row(s) for user {}", entries.len(), user_id),
            );
        }
        Ok(())
    }

    /// All user ids that currently have a ledger file
    pub fn list_users(&self) -> BotResult<Vec<String>> {
        let mut users = Vec::new();
        for dir_entry in std::fs::read_dir(&self.dir)? {
            let path = dir_entry?.path();
            if path.extension().and_then(|e| e.to_str()) == Some("csv") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    users.push(stem.to_string());
                }
            }
        }
        users.sort();
        Ok(users)
    }

    /// Current timestamp in ledger precision (whole seconds)
    pub fn now() -> chrono::NaiveDateTime {
        let now = chrono::Local::now().naive_local();
        // Truncate to the precision the file format round-trips
        chrono::NaiveDateTime::parse_from_str(
            &now.format(TIMESTAMP_FORMAT).to_string(),
            TIMESTAMP_FORMAT,
        )
        .unwrap_or(now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::entry::EntryCategory;
    use tempfile::TempDir;

    fn entry(source: &str, category: EntryCategory, shares: i64, amount: f64) -> LedgerEntry {
        LedgerEntry::new(
            "7",
            LedgerStore::now(),
            source,
            category,
            "2330",
            "TSMC",
            shares,
            50.0,
            amount,
        )
    }

    #[test]
    fn test_read_missing_log_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = LedgerStore::new(dir.path()).unwrap();
        assert!(store.read_log("nobody").unwrap().is_empty());
    }

    #[test]
    fn test_append_then_read_round_trips() {
        let dir = TempDir::new().unwrap();
        let store = LedgerStore::new(dir.path()).unwrap();

        let batch = vec![
            entry("!buy", EntryCategory::Inventory, 100, 5035.0),
            entry("!buy", EntryCategory::Operation, 100, 5035.0),
        ];
        store.append_batch("7", &batch).unwrap();

        let log = store.read_log("7").unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].category, EntryCategory::Inventory);
        assert_eq!(log[0].shares, 100);
        assert_eq!(log[0].amount, 5035.0);
        assert_eq!(log[1].category, EntryCategory::Operation);
    }

    #[test]
    fn test_appends_accumulate_in_file_order() {
        let dir = TempDir::new().unwrap();
        let store = LedgerStore::new(dir.path()).unwrap();

        store
            .append_batch("7", &[entry("!buy", EntryCategory::Inventory, 100, 5035.0)])
            .unwrap();
        store
            .append_batch("7", &[entry("!sell", EntryCategory::Inventory, -40, -2014.0)])
            .unwrap();

        let log = store.read_log("7").unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].source, "!buy");
        assert_eq!(log[1].source, "!sell");
    }

    #[test]
    fn test_users_are_isolated() {
        let dir = TempDir::new().unwrap();
        let store = LedgerStore::new(dir.path()).unwrap();

        store
            .append_batch("1", &[entry("!buy", EntryCategory::Inventory, 10, 500.0)])
            .unwrap();

        assert_eq!(store.read_log("1").unwrap().len(), 1);
        assert!(store.read_log("2").unwrap().is_empty());
        assert_eq!(store.list_users().unwrap(), vec!["1".to_string()]);
    }
}
