//! Trading commands: buy, sell, random trade proposal/confirmation, monkey
//!
//! Handlers resolve identifiers, fetch quotes, call the settlement engine and
//! return the rendered chat reply. Typed errors bubble to the dispatcher,
//! which maps them to user messages.

use crate::config::with_config;
use crate::errors::{BotError, BotResult};
use crate::market::{PriceSource, StockCatalog};
use crate::monkey::{self, MonkeyOutcome};
use crate::pending::{PendingTrade, PendingTrades, TradeProposal};
use crate::positions;
use crate::settlement::{SettlementEngine, TradeResult, TradeSide};
use rand::seq::IteratorRandom;
use std::time::Duration;

/// Handle !buy <stock> <shares>
pub async fn handle_buy(
    engine: &SettlementEngine,
    catalog: &dyn StockCatalog,
    prices: &dyn PriceSource,
    user_id: &str,
    identifier: &str,
    shares: i64,
) -> BotResult<String> {
    let (stock_code, stock_name) = catalog
        .lookup(identifier)
        .ok_or_else(|| BotError::NotFound(identifier.to_string()))?;
    let price = prices
        .get_price(&stock_code)
        .filter(|p| *p > 0.0)
        .ok_or(BotError::PriceUnavailable(stock_code.clone()))?;

    let result = engine
        .execute_trade(
            user_id,
            "!buy",
            &stock_code,
            &stock_name,
            shares,
            price,
            TradeSide::Buy,
        )
        .await?;
    Ok(format_buy_result(&result))
}

/// Handle !sell <stock> <shares> [price]
///
/// Without an explicit price the current quote is used. The identifier is
/// resolved against held positions, not the whole catalog.
pub async fn handle_sell(
    engine: &SettlementEngine,
    prices: &dyn PriceSource,
    user_id: &str,
    identifier: &str,
    shares: i64,
    price: Option<f64>,
) -> BotResult<String> {
    let held = engine.get_positions(user_id)?;
    let position = positions::resolve(&held, identifier)?.clone();

    let (sell_price, price_note) = match price {
        Some(p) => (p, "(your price)"),
        None => (
            prices
                .get_price(&position.stock_code)
                .filter(|p| *p > 0.0)
                .ok_or(BotError::PriceUnavailable(position.stock_code.clone()))?,
            "(market price)",
        ),
    };

    let result = engine
        .execute_trade(
            user_id,
            "!sell",
            &position.stock_code,
            &position.stock_name,
            shares,
            sell_price,
            TradeSide::Sell,
        )
        .await?;
    Ok(format_sell_result(&result, price_note))
}

/// Handle !random - propose a random pick awaiting !ry / !rn
pub async fn handle_random(
    pending: &PendingTrades,
    catalog: &dyn StockCatalog,
    prices: &dyn PriceSource,
    user_id: &str,
    channel_id: u64,
) -> BotResult<String> {
    let (stock_code, stock_name) = catalog
        .get_catalog()
        .into_iter()
        .choose(&mut rand::thread_rng())
        .ok_or_else(|| BotError::NotFound("stock catalog is empty".to_string()))?;
    let price = prices
        .get_price(&stock_code)
        .filter(|p| *p > 0.0)
        .ok_or(BotError::PriceUnavailable(stock_code.clone()))?;

    let budget = monkey::random_budget(&mut rand::thread_rng());
    let shares = (budget as f64 / price).floor() as i64;
    if shares == 0 {
        return Ok(format!(
            "🎲 The dice landed on {}({}) at ${:.2}, but a ${} budget cannot afford one share. Try again!",
            stock_name, stock_code, price, budget
        ));
    }

    let proposal = TradeProposal {
        side: TradeSide::Buy,
        stock_code: stock_code.clone(),
        stock_name: stock_name.clone(),
        shares,
        price,
    };
    let timeout = with_config(|c| c.pending.confirmation_timeout_secs);
    pending
        .begin(
            user_id,
            PendingTrade::AwaitingConfirmation {
                proposal,
                channel_id,
            },
            Duration::from_secs(timeout),
        )
        .await?;

    Ok(format!(
        "🎲 Random pick: buy {} shares of {}({}) at ${:.2} (~${:.2}).\nReply !ry to accept or !rn to pass ({}s).",
        shares,
        stock_name,
        stock_code,
        price,
        shares as f64 * price,
        timeout
    ))
}

/// Handle !ry / !rn while a confirmation is pending
pub async fn handle_confirmation_reply(
    engine: &SettlementEngine,
    pending: &PendingTrades,
    user_id: &str,
    accept: bool,
) -> BotResult<String> {
    let Some(state) = pending.take(user_id).await else {
        return Ok("No random trade is waiting for your reply.".to_string());
    };
    let PendingTrade::AwaitingConfirmation { proposal, .. } = state else {
        // Wrong flow kind; restore nothing, surface a generic nudge
        return Ok("No random trade is waiting for your reply.".to_string());
    };

    if !accept {
        return Ok(format!(
            "👌 Passed on {}({}). Nothing was traded.",
            proposal.stock_name, proposal.stock_code
        ));
    }

    let result = engine
        .execute_trade(
            user_id,
            "!random",
            &proposal.stock_code,
            &proposal.stock_name,
            proposal.shares,
            proposal.price,
            proposal.side,
        )
        .await?;
    Ok(format_buy_result(&result))
}

/// Handle !monkey - one automated trade cycle
pub async fn handle_monkey(
    engine: &SettlementEngine,
    pending: &PendingTrades,
    catalog: &dyn StockCatalog,
    prices: &dyn PriceSource,
    user_id: &str,
    channel_id: u64,
) -> BotResult<String> {
    let outcome = monkey::run_monkey(engine, pending, catalog, prices, user_id, channel_id).await?;
    Ok(match outcome {
        MonkeyOutcome::Bought(result) => format!(
            "🐵 Bought! The monkey grabbed {} shares of {}({}) at ${:.2}, total ${:.2}!",
            result.shares, result.stock_name, result.stock_code, result.price, result.amount
        ),
        MonkeyOutcome::Held => {
            "🙉 Hold! The monkey is sitting on its hands today.".to_string()
        }
        MonkeyOutcome::TooExpensive { stock_name, budget } => format!(
            "🙊 The monkey wanted {} with about ${}, but could not afford one share.",
            stock_name, budget
        ),
        MonkeyOutcome::SellPrompted {
            stock_code,
            stock_name,
            shares_to_sell,
            market_price,
            timeout_secs,
        } => {
            let quote = match market_price {
                Some(p) => format!("currently ${:.2}", p),
                None => "no current quote".to_string(),
            };
            format!(
                "🐒 The monkey wants to sell {} shares of {}({}) ({}). Type your sell price (a plain number) within {} seconds:",
                shares_to_sell, stock_name, stock_code, quote, timeout_secs
            )
        }
        MonkeyOutcome::CoolingDown => {
            "🐵 The monkey already worked today. Come back tomorrow!".to_string()
        }
    })
}

/// Settle a typed sell price against a parked AwaitingSellPrice state
pub async fn settle_pending_sell(
    engine: &SettlementEngine,
    user_id: &str,
    stock_code: &str,
    stock_name: &str,
    shares_to_sell: i64,
    price: f64,
) -> BotResult<String> {
    let result = engine
        .execute_trade(
            user_id,
            "!monkey",
            stock_code,
            stock_name,
            shares_to_sell,
            price,
            TradeSide::Sell,
        )
        .await?;
    Ok(format!(
        "🙈 Sold! The monkey sold {}({}) as instructed. Proceeds ${:.2}, realized P/L ${:+.2}.",
        result.stock_name,
        result.stock_code,
        result.amount,
        result.profit_loss.unwrap_or(0.0)
    ))
}

fn format_buy_result(result: &TradeResult) -> String {
    format!(
        "✅ Bought {} shares of {}({}) at ${:.2}. Total cost ${:.2}, average cost now ${:.2}.",
        result.shares,
        result.stock_name,
        result.stock_code,
        result.price,
        result.amount,
        result.average_cost
    )
}

fn format_sell_result(result: &TradeResult, price_note: &str) -> String {
    format!(
        "✅ Sold {} shares of {}({}) at ${:.2} {}. Proceeds ${:.2}, average cost ${:.2}, P/L ${:+.2}.",
        result.shares,
        result.stock_name,
        result.stock_code,
        result.price,
        price_note,
        result.amount,
        result.average_cost,
        result.profit_loss.unwrap_or(0.0)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::LedgerStore;
    use crate::market::{StaticCatalog, StaticPrices};
    use std::sync::Arc;
    use tempfile::TempDir;

    fn engine(dir: &TempDir) -> SettlementEngine {
        SettlementEngine::new(Arc::new(LedgerStore::new(dir.path()).unwrap()))
    }

    #[tokio::test]
    async fn test_buy_by_name_uses_quote() {
        let dir = TempDir::new().unwrap();
        let engine = engine(&dir);
        let catalog = StaticCatalog::new(&[("2330", "TSMC")]);
        let prices = StaticPrices::new(&[("2330", 50.0)]);

        let text = handle_buy(&engine, &catalog, &prices, "7", "TSMC", 100)
            .await
            .unwrap();
        assert!(text.contains("100 shares"));
        assert!(text.contains("5035.00"));
    }

    #[tokio::test]
    async fn test_buy_unknown_stock() {
        let dir = TempDir::new().unwrap();
        let engine = engine(&dir);
        let catalog = StaticCatalog::new(&[("2330", "TSMC")]);
        let prices = StaticPrices::new(&[("2330", 50.0)]);

        let err = handle_buy(&engine, &catalog, &prices, "7", "9999", 10)
            .await
            .unwrap_err();
        assert_eq!(err, BotError::NotFound("9999".to_string()));
    }

    #[tokio::test]
    async fn test_sell_uses_market_price_when_omitted() {
        let dir = TempDir::new().unwrap();
        let engine = engine(&dir);
        let catalog = StaticCatalog::new(&[("2330", "TSMC")]);
        let prices = StaticPrices::new(&[("2330", 50.0)]);

        handle_buy(&engine, &catalog, &prices, "7", "2330", 100)
            .await
            .unwrap();
        let text = handle_sell(&engine, &prices, "7", "2330", 40, None)
            .await
            .unwrap();
        assert!(text.contains("(market price)"));

        let text = handle_sell(&engine, &prices, "7", "2330", 10, Some(62.5))
            .await
            .unwrap();
        assert!(text.contains("(your price)"));
        assert!(text.contains("62.50"));
    }

    #[tokio::test]
    async fn test_random_parks_confirmation_and_ry_settles() {
        let dir = TempDir::new().unwrap();
        let engine = engine(&dir);
        let (pending, _rx) = PendingTrades::new();
        let catalog = StaticCatalog::new(&[("2330", "TSMC")]);
        let prices = StaticPrices::new(&[("2330", 50.0)]);

        let text = handle_random(&pending, &catalog, &prices, "7", 1)
            .await
            .unwrap();
        assert!(text.contains("!ry"));
        assert!(pending.has_pending("7").await);

        let text = handle_confirmation_reply(&engine, &pending, "7", true)
            .await
            .unwrap();
        assert!(text.contains("Bought"));
        assert!(!pending.has_pending("7").await);
        assert!(!engine.get_positions("7").unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rn_rejects_without_trading() {
        let dir = TempDir::new().unwrap();
        let engine = engine(&dir);
        let (pending, _rx) = PendingTrades::new();
        let catalog = StaticCatalog::new(&[("2330", "TSMC")]);
        let prices = StaticPrices::new(&[("2330", 50.0)]);

        handle_random(&pending, &catalog, &prices, "7", 1)
            .await
            .unwrap();
        let text = handle_confirmation_reply(&engine, &pending, "7", false)
            .await
            .unwrap();
        assert!(text.contains("Passed"));
        assert!(engine.store().read_log("7").unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_confirmation_reply_without_pending() {
        let dir = TempDir::new().unwrap();
        let engine = engine(&dir);
        let (pending, _rx) = PendingTrades::new();
        let text = handle_confirmation_reply(&engine, &pending, "7", true)
            .await
            .unwrap();
        assert!(text.contains("No random trade"));
    }
}
