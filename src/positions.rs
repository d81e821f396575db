//! Derived position state
//!
//! Positions are never stored; they are always a fold over the user's
//! INVENTORY rows in file order. O(n) per query is fine at chat-bot scale;
//! if that ever changes, add a rebuilt snapshot with the fold as the source
//! of truth for rebuilds, never the reverse.

use crate::errors::{BotError, BotResult};
use crate::fees::round2;
use crate::ledger::{EntryCategory, LedgerEntry};
use std::collections::BTreeMap;

/// A user's current holding in one instrument
#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub stock_code: String,
    pub stock_name: String,
    /// Sum of INVENTORY shares
    pub total_shares: i64,
    /// Sum of INVENTORY amounts (cost basis)
    pub total_cost: f64,
}

impl Position {
    /// Weighted average cost per share
    pub fn average_cost(&self) -> f64 {
        if self.total_shares > 0 {
            self.total_cost / self.total_shares as f64
        } else {
            0.0
        }
    }
}

/// Fold INVENTORY rows into per-stock positions
///
/// Entries are processed in log (append) order, which is the deterministic
/// aggregation order; rows for stocks that net to zero or negative shares are
/// dropped from the result. BTreeMap keeps display ordering stable.
pub fn fold_positions(log: &[LedgerEntry]) -> BTreeMap<String, Position> {
    let mut positions: BTreeMap<String, Position> = BTreeMap::new();

    for entry in log {
        if entry.category != EntryCategory::Inventory {
            continue;
        }
        let position = positions
            .entry(entry.stock_code.clone())
            .or_insert_with(|| Position {
                stock_code: entry.stock_code.clone(),
                stock_name: entry.stock_name.clone(),
                total_shares: 0,
                total_cost: 0.0,
            });
        position.total_shares += entry.shares;
        position.total_cost = round2(position.total_cost + entry.amount);
        // The latest row wins the display name
        if !entry.stock_name.is_empty() {
            position.stock_name = entry.stock_name.clone();
        }
    }

    positions.retain(|_, p| p.total_shares > 0);
    positions
}

/// Resolve a user-supplied identifier (code or display name) against held
/// positions
pub fn resolve<'a>(
    positions: &'a BTreeMap<String, Position>,
    identifier: &str,
) -> BotResult<&'a Position> {
    if let Some(position) = positions.get(identifier) {
        return Ok(position);
    }
    positions
        .values()
        .find(|p| p.stock_name == identifier)
        .ok_or_else(|| BotError::NotFound(identifier.to_string()))
}

/// Check a sell request against the held quantity
pub fn validate_sell(position: &Position, shares_requested: i64) -> BotResult<()> {
    if shares_requested <= 0 {
        return Err(BotError::Validation(
            "shares must be a positive number".to_string(),
        ));
    }
    if shares_requested > position.total_shares {
        return Err(BotError::InsufficientShares {
            requested: shares_requested,
            held: position.total_shares,
        });
    }
    Ok(())
}
