/// Ledger entry types
///
/// One CSV row per entry. Entries are immutable once written; corrections are
/// always new rows (zero-share INVENTORY adjustments, negated PROFIT_LOSS
/// sums), never in-place edits.
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Timestamp format used in ledger files: `2025-08-25 14:30:00`
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Row category, controlling which aggregations see the entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntryCategory {
    /// Position aggregation rows: signed shares and cost-basis deltas
    #[serde(rename = "INVENTORY")]
    Inventory,
    /// Human-readable trade history: signed shares, cash flow
    #[serde(rename = "OPERATION")]
    Operation,
    /// Realized P/L tracking rows
    #[serde(rename = "PROFIT_LOSS")]
    ProfitLoss,
    /// Bookkeeping markers (cooldown stamps etc.), sentinel stock codes
    #[serde(rename = "SYSTEM_RECORD")]
    SystemRecord,
}

/// Sentinel stock code for monkey cooldown SYSTEM_RECORD rows
pub const MONKEY_COOLDOWN_CODE: &str = "MONKEY_CD";
/// Sentinel stock code for profit-clear rows
pub const SYSTEM_CODE: &str = "SYSTEM";

/// One immutable ledger row
///
/// `user_id` lives in the file path (one CSV per user), not in the row, so it
/// is skipped during (de)serialization and filled back in by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    #[serde(skip, default)]
    pub user_id: String,
    #[serde(with = "ts_format")]
    pub timestamp: NaiveDateTime,
    /// Originating command tag, e.g. "!buy", "!monkey"
    pub source: String,
    pub category: EntryCategory,
    pub stock_code: String,
    pub stock_name: String,
    /// Signed quantity: positive = acquired, negative = disposed, zero for
    /// adjustments and system records
    pub shares: i64,
    /// Price per share at entry time (0 for non-trade rows)
    pub price: f64,
    /// Signed cash amount: cost-basis delta for INVENTORY, net cash flow for
    /// OPERATION
    pub amount: f64,
    /// Realized P/L delta, populated only on PROFIT_LOSS rows
    #[serde(default)]
    pub profit_loss: f64,
}

impl LedgerEntry {
    pub fn new(
        user_id: &str,
        timestamp: NaiveDateTime,
        source: &str,
        category: EntryCategory,
        stock_code: &str,
        stock_name: &str,
        shares: i64,
        price: f64,
        amount: f64,
    ) -> Self {
        Self {
            user_id: user_id.to_string(),
            timestamp,
            source: source.to_string(),
            category,
            stock_code: stock_code.to_string(),
            stock_name: stock_name.to_string(),
            shares,
            price,
            amount,
            profit_loss: 0.0,
        }
    }

    pub fn with_profit_loss(mut self, profit_loss: f64) -> Self {
        self.profit_loss = profit_loss;
        self
    }
}

/// Serde helper for the fixed ledger timestamp format
mod ts_format {
    use super::TIMESTAMP_FORMAT;
    use chrono::NaiveDateTime;
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(ts: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&ts.format(TIMESTAMP_FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<NaiveDateTime, D::Error> {
        let s = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(&s, TIMESTAMP_FORMAT).map_err(serde::de::Error::custom)
    }
}
