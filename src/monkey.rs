//! Monkey auto-trader
//!
//! Single-shot random trade cycle: the monkey picks buy, hold, or sell. Buys
//! fill immediately against the quoted price with a random budget. Sells need
//! a human-confirmed price, so the cycle parks an AwaitingSellPrice pending
//! state and finishes when the user types one.
//!
//! Cooldown is a configurable policy (one run per calendar day when enabled,
//! disabled by default). The MONKEY_CD SYSTEM_RECORD stamp is written on
//! every completed cycle either way so the policy can be turned on against
//! existing ledgers.

use crate::arguments::is_debug_monkey_enabled;
use crate::config::with_config;
use crate::errors::{BotError, BotResult};
use crate::ledger::{EntryCategory, LedgerEntry, MONKEY_COOLDOWN_CODE};
use crate::logger::{self, LogTag};
use crate::market::{PriceSource, StockCatalog};
use crate::pending::{PendingTrade, PendingTrades};
use crate::settlement::{SettlementEngine, TradeResult, TradeSide};
use chrono::NaiveDate;
use rand::seq::IteratorRandom;
use rand::Rng;
use std::time::Duration;

const SOURCE: &str = "!monkey";

/// What the monkey did this cycle
#[derive(Debug)]
pub enum MonkeyOutcome {
    /// Bought and settled immediately
    Bought(TradeResult),
    /// Decided to sit on its hands
    Held,
    /// Wanted to buy but the budget could not afford one share
    TooExpensive { stock_name: String, budget: i64 },
    /// Sell decided; waiting for the user to type a price
    SellPrompted {
        stock_code: String,
        stock_name: String,
        shares_to_sell: i64,
        market_price: Option<f64>,
        timeout_secs: u64,
    },
    /// Cooldown policy blocked the run
    CoolingDown,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum MonkeyAction {
    Buy,
    Hold,
    Sell,
}

/// Run one monkey cycle for a user
pub async fn run_monkey(
    engine: &SettlementEngine,
    pending: &PendingTrades,
    catalog: &dyn StockCatalog,
    prices: &dyn PriceSource,
    user_id: &str,
    channel_id: u64,
) -> BotResult<MonkeyOutcome> {
    if pending.has_pending(user_id).await {
        return Err(BotError::AlreadyPending);
    }

    let cooldown_enabled = with_config(|c| c.monkey.cooldown_enabled);
    if cooldown_enabled {
        let log = engine.store().read_log(user_id)?;
        let today = chrono::Local::now().date_naive();
        if cooldown_active(&log, today) {
            return Ok(MonkeyOutcome::CoolingDown);
        }
    }

    let positions = engine.get_positions(user_id)?;
    let action = choose_action(!positions.is_empty(), &mut rand::thread_rng());
    if is_debug_monkey_enabled() {
        logger::debug(
            LogTag::Monkey,
            &format!("Monkey chose {:?} for user {}", action, user_id),
        );
    }

    let outcome = match action {
        MonkeyAction::Buy => monkey_buy(engine, catalog, prices, user_id).await?,
        MonkeyAction::Hold => MonkeyOutcome::Held,
        MonkeyAction::Sell => {
            monkey_sell(engine, pending, prices, user_id, channel_id).await?
        }
    };

    // Completed cycle: stamp the cooldown record
    engine
        .write_system_record(user_id, SOURCE, MONKEY_COOLDOWN_CODE, "monkey cooldown")
        .await?;
    Ok(outcome)
}

/// Latest MONKEY_CD stamp falls on `today`
fn cooldown_active(log: &[LedgerEntry], today: NaiveDate) -> bool {
    log.iter()
        .rev()
        .find(|e| {
            e.category == EntryCategory::SystemRecord && e.stock_code == MONKEY_COOLDOWN_CODE
        })
        .map(|e| e.timestamp.date() == today)
        .unwrap_or(false)
}

/// Weighted action pick; sells need something to sell
fn choose_action<R: Rng>(has_holdings: bool, rng: &mut R) -> MonkeyAction {
    let roll: u32 = rng.gen_range(0..100);
    if has_holdings {
        match roll {
            0..=39 => MonkeyAction::Buy,
            40..=79 => MonkeyAction::Sell,
            _ => MonkeyAction::Hold,
        }
    } else if roll < 70 {
        MonkeyAction::Buy
    } else {
        MonkeyAction::Hold
    }
}

async fn monkey_buy(
    engine: &SettlementEngine,
    catalog: &dyn StockCatalog,
    prices: &dyn PriceSource,
    user_id: &str,
) -> BotResult<MonkeyOutcome> {
    let listings = catalog.get_catalog();
    let (stock_code, stock_name) = listings
        .into_iter()
        .choose(&mut rand::thread_rng())
        .ok_or_else(|| BotError::NotFound("stock catalog is empty".to_string()))?;

    let price = prices
        .get_price(&stock_code)
        .filter(|p| *p > 0.0)
        .ok_or(BotError::PriceUnavailable(stock_code.clone()))?;

    let budget = random_budget(&mut rand::thread_rng());
    let shares = (budget as f64 / price).floor() as i64;
    if shares == 0 {
        return Ok(MonkeyOutcome::TooExpensive { stock_name, budget });
    }

    let result = engine
        .execute_trade(
            user_id,
            SOURCE,
            &stock_code,
            &stock_name,
            shares,
            price,
            TradeSide::Buy,
        )
        .await?;
    Ok(MonkeyOutcome::Bought(result))
}

/// Random budget between the configured bounds, in steps of 1000
pub(crate) fn random_budget<R: Rng>(rng: &mut R) -> i64 {
    let (min, max) = with_config(|c| (c.monkey.min_amount, c.monkey.max_amount));
    let steps = (max - min) / 1000;
    min + rng.gen_range(0..=steps) * 1000
}

async fn monkey_sell(
    engine: &SettlementEngine,
    pending: &PendingTrades,
    prices: &dyn PriceSource,
    user_id: &str,
    channel_id: u64,
) -> BotResult<MonkeyOutcome> {
    let positions = engine.get_positions(user_id)?;
    let position = positions
        .values()
        .choose(&mut rand::thread_rng())
        .ok_or_else(|| BotError::NotFound("no holdings to sell".to_string()))?
        .clone();

    let shares_to_sell = rand::thread_rng().gen_range(1..=position.total_shares);
    let market_price = prices.get_price(&position.stock_code).filter(|p| *p > 0.0);
    let timeout_secs = with_config(|c| c.pending.sell_price_timeout_secs);

    pending
        .begin(
            user_id,
            PendingTrade::AwaitingSellPrice {
                stock_code: position.stock_code.clone(),
                stock_name: position.stock_name.clone(),
                shares_to_sell,
                average_cost: position.average_cost(),
                channel_id,
            },
            Duration::from_secs(timeout_secs),
        )
        .await?;

    Ok(MonkeyOutcome::SellPrompted {
        stock_code: position.stock_code,
        stock_name: position.stock_name,
        shares_to_sell,
        market_price,
        timeout_secs,
    })
}
