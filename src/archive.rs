/// Monthly ledger archival with a system-wide exclusive phase
///
/// While the archival phase is active every trade-mutating operation is
/// rejected with a retryable SystemBusy instead of being queued. The flag
/// lives on the shared LedgerStore; the store checks it on every append.
use crate::config::with_config;
use crate::ledger::LedgerStore;
use crate::logger::{self, LogTag};
use chrono::{Datelike, Local, Timelike};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// RAII guard for the archival phase; clears the flag on drop so a panic in
/// the archive job can never leave trading rejected forever
pub struct ArchivalPhase<'a> {
    store: &'a LedgerStore,
}

impl<'a> ArchivalPhase<'a> {
    pub fn begin(store: &'a LedgerStore) -> Self {
        store.set_archiving(true);
        logger::info(LogTag::Archive, "Archival phase started, trading paused");
        ArchivalPhase { store }
    }
}

impl Drop for ArchivalPhase<'_> {
    fn drop(&mut self) {
        self.store.set_archiving(false);
        logger::info(LogTag::Archive, "Archival phase ended, trading resumed");
    }
}

/// Move every user ledger into archive/<YYYY-MM>/ under the exclusive phase
///
/// The archive month is the month that just ended.
pub fn run_monthly_archive(store: &LedgerStore, archive_dir: &Path) -> std::io::Result<usize> {
    let _phase = ArchivalPhase::begin(store);

    let now = Local::now();
    let (year, month) = if now.month() == 1 {
        (now.year() - 1, 12)
    } else {
        (now.year(), now.month() - 1)
    };
    let target = archive_dir.join(format!("{:04}-{:02}", year, month));
    std::fs::create_dir_all(&target)?;

    let users = store
        .list_users()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;

    let mut moved = 0;
    for user_id in users {
        let from = store.user_file(&user_id);
        let to = target.join(format!("{}.csv", user_id));
        match std::fs::rename(&from, &to) {
            Ok(()) => moved += 1,
            Err(e) => logger::error(
                LogTag::Archive,
                &format!("Failed to archive ledger for user {}: {}", user_id, e),
            ),
        }
    }

    logger::info(
        LogTag::Archive,
        &format!("Archived {} user ledger(s) into {}", moved, target.display()),
    );
    Ok(moved)
}

/// Background service: checks hourly, runs the archive in the first hour of
/// the first day of each month
pub fn start_archive_service(store: Arc<LedgerStore>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut last_run_month: Option<(i32, u32)> = None;
        loop {
            let now = Local::now();
            let due = now.day() == 1 && now.hour() == 0;
            let this_month = (now.year(), now.month());

            if due && last_run_month != Some(this_month) {
                let archive_dir =
                    std::path::PathBuf::from(with_config(|c| c.data.archive_dir.clone()));
                if let Err(e) = run_monthly_archive(&store, &archive_dir) {
                    logger::error(LogTag::Archive, &format!("Monthly archive failed: {}", e));
                }
                last_run_month = Some(this_month);
            }

            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::BotError;
    use crate::ledger::{EntryCategory, LedgerEntry};
    use tempfile::TempDir;

    fn buy_row() -> LedgerEntry {
        LedgerEntry::new(
            "7",
            LedgerStore::now(),
            "!buy",
            EntryCategory::Inventory,
            "2330",
            "TSMC",
            100,
            50.0,
            5035.0,
        )
    }

    #[test]
    fn test_appends_rejected_while_archiving() {
        let dir = TempDir::new().unwrap();
        let store = LedgerStore::new(dir.path()).unwrap();

        {
            let _phase = ArchivalPhase::begin(&store);
            assert!(store.is_archiving());
            let err = store.append_batch("7", &[buy_row()]).unwrap_err();
            assert_eq!(err, BotError::SystemBusy);
        }

        // Guard dropped: trading resumes
        assert!(!store.is_archiving());
        store.append_batch("7", &[buy_row()]).unwrap();
        assert_eq!(store.read_log("7").unwrap().len(), 1);
    }

    #[test]
    fn test_monthly_archive_moves_ledgers() {
        let data = TempDir::new().unwrap();
        let archive = TempDir::new().unwrap();
        let store = LedgerStore::new(data.path()).unwrap();

        store.append_batch("11", &[buy_row()]).unwrap();
        store.append_batch("22", &[buy_row()]).unwrap();

        let moved = run_monthly_archive(&store, archive.path()).unwrap();
        assert_eq!(moved, 2);
        assert!(store.list_users().unwrap().is_empty());
        assert!(!store.is_archiving());

        // The archived month directory holds both files
        let month_dir = std::fs::read_dir(archive.path())
            .unwrap()
            .next()
            .unwrap()
            .unwrap()
            .path();
        let mut archived: Vec<_> = std::fs::read_dir(&month_dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        archived.sort();
        assert_eq!(archived, vec!["11.csv", "22.csv"]);
    }
}
