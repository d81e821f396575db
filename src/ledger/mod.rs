// Ledger module - append-only per-user transaction log
pub mod entry;
pub mod store;

pub use entry::{EntryCategory, LedgerEntry, MONKEY_COOLDOWN_CODE, SYSTEM_CODE, TIMESTAMP_FORMAT};
pub use store::LedgerStore;
