//! Settlement engine
//!
//! Executes one trade as one logical unit: resolve the current position,
//! compute amounts, append the trade's ledger rows as a single batch. The
//! whole sequence runs under the user's ledger lock so concurrent messages
//! from the same user serialize; either every row of a trade lands or none
//! do.

use crate::arguments::is_debug_trading_enabled;
use crate::config::with_config;
use crate::errors::{BotError, BotResult};
use crate::fees;
use crate::ledger::{EntryCategory, LedgerEntry, LedgerStore, SYSTEM_CODE};
use crate::logger::{self, LogTag};
use crate::positions::{self, Position};
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeSide {
    Buy,
    Sell,
}

/// Result record returned to the presentation layer
#[derive(Debug, Clone, PartialEq)]
pub struct TradeResult {
    pub side: TradeSide,
    pub stock_code: String,
    pub stock_name: String,
    pub shares: i64,
    pub price: f64,
    /// Cash amount: total outlay for a buy, net proceeds for a sell
    pub amount: f64,
    /// Realized P/L, sells only
    pub profit_loss: Option<f64>,
    /// Average cost after the trade (buy) or the cost basis sold against (sell)
    pub average_cost: f64,
}

pub struct SettlementEngine {
    store: Arc<LedgerStore>,
}

impl SettlementEngine {
    pub fn new(store: Arc<LedgerStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<LedgerStore> {
        &self.store
    }

    /// Current positions for a user (pure fold over the log)
    pub fn get_positions(&self, user_id: &str) -> BotResult<BTreeMap<String, Position>> {
        Ok(positions::fold_positions(&self.store.read_log(user_id)?))
    }

    /// Execute one buy or sell against a quoted price
    pub async fn execute_trade(
        &self,
        user_id: &str,
        source: &str,
        stock_code: &str,
        stock_name: &str,
        shares: i64,
        price: f64,
        side: TradeSide,
    ) -> BotResult<TradeResult> {
        if shares <= 0 {
            return Err(BotError::Validation(
                "shares must be a positive number".to_string(),
            ));
        }
        if !price.is_finite() || price <= 0.0 {
            return Err(BotError::Validation(
                "price must be a positive number".to_string(),
            ));
        }
        if self.store.is_archiving() {
            return Err(BotError::SystemBusy);
        }

        let _guard = self.store.lock_user(user_id).await;
        match side {
            TradeSide::Buy => self.settle_buy(user_id, source, stock_code, stock_name, shares, price),
            TradeSide::Sell => {
                self.settle_sell(user_id, source, stock_code, stock_name, shares, price)
            }
        }
    }

    fn settle_buy(
        &self,
        user_id: &str,
        source: &str,
        stock_code: &str,
        stock_name: &str,
        shares: i64,
        price: f64,
    ) -> BotResult<TradeResult> {
        let (fee_rate, tax_rate, minimum_fee) = rates();
        let buy_amount = fees::compute_buy_amount(shares, price, fee_rate, tax_rate, minimum_fee);

        let held = positions::fold_positions(&self.store.read_log(user_id)?);
        let (prior_shares, prior_cost) = held
            .get(stock_code)
            .map(|p| (p.total_shares, p.total_cost))
            .unwrap_or((0, 0.0));

        let now = LedgerStore::now();
        let batch = vec![
            LedgerEntry::new(
                user_id,
                now,
                source,
                EntryCategory::Inventory,
                stock_code,
                stock_name,
                shares,
                price,
                buy_amount,
            ),
            LedgerEntry::new(
                user_id,
                now,
                source,
                EntryCategory::Operation,
                stock_code,
                stock_name,
                shares,
                price,
                buy_amount,
            ),
        ];
        self.store.append_batch(user_id, &batch)?;

        let average_cost = (prior_cost + buy_amount) / (prior_shares + shares) as f64;
        if is_debug_trading_enabled() {
            logger::debug(
                LogTag::Trading,
                &format!(
                    "Buy settled: user={} {}x{} @ {} cost {}",
                    user_id, shares, stock_code, price, buy_amount
                ),
            );
        }

        Ok(TradeResult {
            side: TradeSide::Buy,
            stock_code: stock_code.to_string(),
            stock_name: stock_name.to_string(),
            shares,
            price,
            amount: buy_amount,
            profit_loss: None,
            average_cost,
        })
    }

    fn settle_sell(
        &self,
        user_id: &str,
        source: &str,
        stock_code: &str,
        stock_name: &str,
        shares: i64,
        price: f64,
    ) -> BotResult<TradeResult> {
        let held = positions::fold_positions(&self.store.read_log(user_id)?);
        let position = held
            .get(stock_code)
            .ok_or_else(|| BotError::NotFound(stock_code.to_string()))?;
        positions::validate_sell(position, shares)?;

        let (fee_rate, tax_rate, minimum_fee) = rates();
        let average_cost = position.average_cost();
        let sell_amount = fees::compute_sell_amount(shares, price, fee_rate, tax_rate, minimum_fee);
        let profit_loss = fees::realized_profit_loss(sell_amount, average_cost, shares);
        // Cost basis leaving the position; keeps the remaining average intact
        let cost_removed = fees::round2(average_cost * shares as f64);

        let now = LedgerStore::now();
        let batch = vec![
            LedgerEntry::new(
                user_id,
                now,
                source,
                EntryCategory::Inventory,
                stock_code,
                stock_name,
                -shares,
                price,
                -cost_removed,
            ),
            LedgerEntry::new(
                user_id,
                now,
                source,
                EntryCategory::Operation,
                stock_code,
                stock_name,
                -shares,
                price,
                sell_amount,
            ),
            LedgerEntry::new(
                user_id,
                now,
                source,
                EntryCategory::ProfitLoss,
                stock_code,
                stock_name,
                shares,
                price,
                sell_amount,
            )
            .with_profit_loss(profit_loss),
        ];
        self.store.append_batch(user_id, &batch)?;

        if is_debug_trading_enabled() {
            logger::debug(
                LogTag::Trading,
                &format!(
                    "Sell settled: user={} {}x{} @ {} proceeds {} P/L {}",
                    user_id, shares, stock_code, price, sell_amount, profit_loss
                ),
            );
        }

        Ok(TradeResult {
            side: TradeSide::Sell,
            stock_code: stock_code.to_string(),
            stock_name: stock_name.to_string(),
            shares,
            price,
            amount: sell_amount,
            profit_loss: Some(profit_loss),
            average_cost,
        })
    }

    /// Rewrite a held stock's average cost via a zero-share INVENTORY delta
    pub async fn adjust_cost(
        &self,
        user_id: &str,
        source: &str,
        stock_code: &str,
        stock_name: &str,
        new_cost: f64,
    ) -> BotResult<f64> {
        if !new_cost.is_finite() || new_cost <= 0.0 {
            return Err(BotError::Validation(
                "new cost must be a positive number".to_string(),
            ));
        }

        let _guard = self.store.lock_user(user_id).await;
        let held = positions::fold_positions(&self.store.read_log(user_id)?);
        let position = held
            .get(stock_code)
            .ok_or_else(|| BotError::NotFound(stock_code.to_string()))?;

        let adjustment =
            fees::round2(new_cost * position.total_shares as f64 - position.total_cost);
        let row = LedgerEntry::new(
            user_id,
            LedgerStore::now(),
            source,
            EntryCategory::Inventory,
            stock_code,
            stock_name,
            0,
            0.0,
            adjustment,
        );
        self.store.append_batch(user_id, &[row])?;
        Ok(adjustment)
    }

    /// Cumulative realized P/L (sum of PROFIT_LOSS rows)
    pub fn realized_profit(&self, user_id: &str) -> BotResult<f64> {
        let log = self.store.read_log(user_id)?;
        let total = log
            .iter()
            .filter(|e| e.category == EntryCategory::ProfitLoss)
            .map(|e| e.profit_loss)
            .sum::<f64>();
        Ok(fees::round2(total))
    }

    /// Zero the cumulative P/L with a balancing PROFIT_LOSS row
    ///
    /// Returns the amount that was cleared; `None` when there was nothing to
    /// clear (no P/L rows, or already zero).
    pub async fn clear_profit(&self, user_id: &str, source: &str) -> BotResult<Option<f64>> {
        let _guard = self.store.lock_user(user_id).await;

        let log = self.store.read_log(user_id)?;
        let has_rows = log
            .iter()
            .any(|e| e.category == EntryCategory::ProfitLoss);
        if !has_rows {
            return Ok(None);
        }
        let total = fees::round2(
            log.iter()
                .filter(|e| e.category == EntryCategory::ProfitLoss)
                .map(|e| e.profit_loss)
                .sum::<f64>(),
        );
        if total == 0.0 {
            return Ok(None);
        }

        let row = LedgerEntry::new(
            user_id,
            LedgerStore::now(),
            source,
            EntryCategory::ProfitLoss,
            SYSTEM_CODE,
            "profit reset",
            0,
            0.0,
            0.0,
        )
        .with_profit_loss(-total);
        self.store.append_batch(user_id, &[row])?;
        Ok(Some(total))
    }

    /// Append a SYSTEM_RECORD bookkeeping row (cooldown stamps etc.)
    pub async fn write_system_record(
        &self,
        user_id: &str,
        source: &str,
        stock_code: &str,
        stock_name: &str,
    ) -> BotResult<()> {
        let _guard = self.store.lock_user(user_id).await;
        let row = LedgerEntry::new(
            user_id,
            LedgerStore::now(),
            source,
            EntryCategory::SystemRecord,
            stock_code,
            stock_name,
            0,
            0.0,
            0.0,
        );
        self.store.append_batch(user_id, &[row])
    }
}

fn rates() -> (f64, f64, f64) {
    with_config(|c| (c.fees.fee_rate, c.fees.tax_rate, c.fees.minimum_fee))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn engine(dir: &TempDir) -> SettlementEngine {
        SettlementEngine::new(Arc::new(LedgerStore::new(dir.path()).unwrap()))
    }

    #[tokio::test]
    async fn test_buy_writes_two_rows_and_position() {
        let dir = TempDir::new().unwrap();
        let engine = engine(&dir);

        let result = engine
            .execute_trade("7", "!buy", "2330", "TSMC", 100, 50.0, TradeSide::Buy)
            .await
            .unwrap();
        assert_eq!(result.amount, 5035.0);
        assert!(result.profit_loss.is_none());

        let log = engine.store().read_log("7").unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].category, EntryCategory::Inventory);
        assert_eq!(log[1].category, EntryCategory::Operation);
        assert_eq!(log[0].amount, 5035.0);

        let positions = engine.get_positions("7").unwrap();
        assert_eq!(positions["2330"].total_shares, 100);
        assert_eq!(positions["2330"].total_cost, 5035.0);
    }

    #[tokio::test]
    async fn test_sell_writes_three_rows_with_profit_loss() {
        let dir = TempDir::new().unwrap();
        let engine = engine(&dir);

        engine
            .execute_trade("7", "!buy", "2330", "TSMC", 100, 50.0, TradeSide::Buy)
            .await
            .unwrap();
        let result = engine
            .execute_trade("7", "!sell", "2330", "TSMC", 40, 60.0, TradeSide::Sell)
            .await
            .unwrap();

        let expected_proceeds = fees::compute_sell_amount(40, 60.0, 0.001425, 0.003, 20.0);
        assert_eq!(result.amount, expected_proceeds);
        let expected_pl = fees::realized_profit_loss(expected_proceeds, 50.35, 40);
        assert_eq!(result.profit_loss, Some(expected_pl));

        let log = engine.store().read_log("7").unwrap();
        assert_eq!(log.len(), 5);
        assert_eq!(log[2].category, EntryCategory::Inventory);
        assert_eq!(log[2].shares, -40);
        assert_eq!(log[4].category, EntryCategory::ProfitLoss);
        assert_eq!(log[4].profit_loss, expected_pl);

        // Remaining position keeps its average cost
        let positions = engine.get_positions("7").unwrap();
        assert_eq!(positions["2330"].total_shares, 60);
        assert!((positions["2330"].average_cost() - 50.35).abs() < 0.01);
    }

    #[tokio::test]
    async fn test_oversell_rejected_without_ledger_writes() {
        let dir = TempDir::new().unwrap();
        let engine = engine(&dir);

        engine
            .execute_trade("7", "!buy", "2330", "TSMC", 100, 50.0, TradeSide::Buy)
            .await
            .unwrap();
        engine
            .execute_trade("7", "!sell", "2330", "TSMC", 60, 55.0, TradeSide::Sell)
            .await
            .unwrap();
        engine
            .execute_trade("7", "!sell", "2330", "TSMC", 30, 55.0, TradeSide::Sell)
            .await
            .unwrap();

        let len_before = engine.store().read_log("7").unwrap().len();
        let err = engine
            .execute_trade("7", "!sell", "2330", "TSMC", 20, 55.0, TradeSide::Sell)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            BotError::InsufficientShares {
                requested: 20,
                held: 10
            }
        );
        assert_eq!(engine.store().read_log("7").unwrap().len(), len_before);

        // Holdings decreased monotonically, never below zero
        let positions = engine.get_positions("7").unwrap();
        assert_eq!(positions["2330"].total_shares, 10);
    }

    #[tokio::test]
    async fn test_sell_unknown_stock_is_not_found() {
        let dir = TempDir::new().unwrap();
        let engine = engine(&dir);

        let err = engine
            .execute_trade("7", "!sell", "9999", "Ghost", 10, 10.0, TradeSide::Sell)
            .await
            .unwrap_err();
        assert_eq!(err, BotError::NotFound("9999".to_string()));
        assert!(engine.store().read_log("7").unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_inputs_rejected() {
        let dir = TempDir::new().unwrap();
        let engine = engine(&dir);

        assert!(matches!(
            engine
                .execute_trade("7", "!buy", "2330", "TSMC", 0, 50.0, TradeSide::Buy)
                .await
                .unwrap_err(),
            BotError::Validation(_)
        ));
        assert!(matches!(
            engine
                .execute_trade("7", "!buy", "2330", "TSMC", 10, -1.0, TradeSide::Buy)
                .await
                .unwrap_err(),
            BotError::Validation(_)
        ));
    }

    #[tokio::test]
    async fn test_non_finite_prices_never_reach_the_ledger() {
        let dir = TempDir::new().unwrap();
        let engine = engine(&dir);

        engine
            .execute_trade("7", "!buy", "2330", "TSMC", 100, 50.0, TradeSide::Buy)
            .await
            .unwrap();

        for bad in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let err = engine
                .execute_trade("7", "!sell", "2330", "TSMC", 40, bad, TradeSide::Sell)
                .await
                .unwrap_err();
            assert!(matches!(err, BotError::Validation(_)), "price {}", bad);

            let err = engine
                .execute_trade("7", "!buy", "2330", "TSMC", 10, bad, TradeSide::Buy)
                .await
                .unwrap_err();
            assert!(matches!(err, BotError::Validation(_)), "price {}", bad);
        }
        assert!(matches!(
            engine
                .adjust_cost("7", "!adjust_cost", "2330", "TSMC", f64::NAN)
                .await
                .unwrap_err(),
            BotError::Validation(_)
        ));

        // Only the original buy rows exist
        assert_eq!(engine.store().read_log("7").unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_adjust_cost_rewrites_average() {
        let dir = TempDir::new().unwrap();
        let engine = engine(&dir);

        engine
            .execute_trade("7", "!buy", "2330", "TSMC", 100, 50.0, TradeSide::Buy)
            .await
            .unwrap();
        engine
            .adjust_cost("7", "!adjust_cost", "2330", "TSMC", 60.0)
            .await
            .unwrap();

        let positions = engine.get_positions("7").unwrap();
        assert_eq!(positions["2330"].total_shares, 100);
        assert_eq!(positions["2330"].average_cost(), 60.0);
    }

    #[tokio::test]
    async fn test_profit_clear_balances_to_zero() {
        let dir = TempDir::new().unwrap();
        let engine = engine(&dir);

        engine
            .execute_trade("7", "!buy", "2330", "TSMC", 100, 50.0, TradeSide::Buy)
            .await
            .unwrap();
        engine
            .execute_trade("7", "!sell", "2330", "TSMC", 50, 70.0, TradeSide::Sell)
            .await
            .unwrap();

        let total = engine.realized_profit("7").unwrap();
        assert!(total != 0.0);

        let cleared = engine.clear_profit("7", "!profitclear").await.unwrap();
        assert_eq!(cleared, Some(total));
        assert_eq!(engine.realized_profit("7").unwrap(), 0.0);

        // Clearing again is a no-op
        assert_eq!(engine.clear_profit("7", "!profitclear").await.unwrap(), None);
    }
}
