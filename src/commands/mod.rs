//! Command dispatch
//!
//! Message intake order, matching the interactive flow rules:
//! 1. Archival phase: mutating traffic is answered with a retryable notice.
//! 2. Pending AwaitingSellPrice: the raw message is read as a price.
//! 3. Pending AwaitingConfirmation: only !ry / !rn are accepted.
//! 4. Otherwise: normal command dispatch.
//!
//! Handlers return rendered strings; delivery goes through the OutboundSink
//! trait so the chat transport stays an external collaborator.

pub mod portfolio;
pub mod trading;

use crate::errors::BotError;
use crate::logger::{self, LogTag};
use crate::market::{PriceSource, StockCatalog};
use crate::pending::{PendingTimeout, PendingTrade, PendingTrades};
use crate::settlement::SettlementEngine;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Delivery seam toward the chat transport
pub trait OutboundSink: Send + Sync {
    fn send(&self, channel_id: u64, text: &str);
}

/// One inbound chat message, already stripped of transport details
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    pub user_id: String,
    pub channel_id: u64,
    pub text: String,
}

pub struct Dispatcher {
    engine: Arc<SettlementEngine>,
    pending: PendingTrades,
    catalog: Arc<dyn StockCatalog>,
    prices: Arc<dyn PriceSource>,
    sink: Arc<dyn OutboundSink>,
}

impl Dispatcher {
    pub fn new(
        engine: Arc<SettlementEngine>,
        pending: PendingTrades,
        catalog: Arc<dyn StockCatalog>,
        prices: Arc<dyn PriceSource>,
        sink: Arc<dyn OutboundSink>,
    ) -> Self {
        Self {
            engine,
            pending,
            catalog,
            prices,
            sink,
        }
    }

    pub fn pending(&self) -> &PendingTrades {
        &self.pending
    }

    /// Process one inbound message end to end
    pub async fn handle_message(&self, msg: &IncomingMessage) {
        let is_command = msg.text.trim_start().starts_with('!');
        let has_pending = self.pending.has_pending(&msg.user_id).await;

        if self.engine.store().is_archiving() && (is_command || has_pending) {
            self.sink.send(
                msg.channel_id,
                "⏳ Monthly data archival is running, please try again shortly.",
            );
            return;
        }

        // Pending flows intercept raw input ahead of normal dispatch
        match self.pending.peek(&msg.user_id).await {
            Some(PendingTrade::AwaitingSellPrice { .. }) => {
                self.handle_pending_price(msg).await;
                return;
            }
            Some(PendingTrade::AwaitingConfirmation { .. }) => {
                let trimmed = msg.text.trim();
                if trimmed != "!ry" && trimmed != "!rn" {
                    self.sink.send(
                        msg.channel_id,
                        "⚠️ You have a random trade waiting. Reply !ry or !rn first.",
                    );
                    return;
                }
                let accept = trimmed == "!ry";
                let reply = trading::handle_confirmation_reply(
                    &self.engine,
                    &self.pending,
                    &msg.user_id,
                    accept,
                )
                .await;
                self.deliver(msg, reply).await;
                return;
            }
            None => {}
        }

        if is_command {
            self.dispatch_command(msg).await;
        }
    }

    /// A message from a user in AWAITING_SELL_PRICE: read it as a price
    ///
    /// Invalid input re-prompts and keeps the state (the timeout window is
    /// not reset). A valid price resolves the state before settling so an
    /// error during settlement can never leave the user stuck.
    async fn handle_pending_price(&self, msg: &IncomingMessage) {
        let price: f64 = match msg.text.trim().parse() {
            Ok(p) => p,
            Err(_) => {
                self.sink.send(
                    msg.channel_id,
                    "Invalid format, please type a plain numeric price:",
                );
                return;
            }
        };
        // NaN and infinity must never reach the ledger
        if !price.is_finite() || price <= 0.0 {
            self.sink.send(
                msg.channel_id,
                "The price must be positive, please type it again:",
            );
            return;
        }

        let Some(PendingTrade::AwaitingSellPrice {
            stock_code,
            stock_name,
            shares_to_sell,
            ..
        }) = self.pending.take(&msg.user_id).await
        else {
            // Timed out between peek and take
            self.sink.send(
                msg.channel_id,
                "⌛ That trade already expired. Start a new one.",
            );
            return;
        };

        let reply = trading::settle_pending_sell(
            &self.engine,
            &msg.user_id,
            &stock_code,
            &stock_name,
            shares_to_sell,
            price,
        )
        .await;
        self.deliver(msg, reply).await;
    }

    async fn dispatch_command(&self, msg: &IncomingMessage) {
        let parts: Vec<&str> = msg.text.split_whitespace().collect();
        let Some(&command) = parts.first() else {
            return;
        };

        let reply = match command {
            "!buy" => match parse_stock_and_shares(&parts) {
                Ok((identifier, shares)) => {
                    trading::handle_buy(
                        &self.engine,
                        self.catalog.as_ref(),
                        self.prices.as_ref(),
                        &msg.user_id,
                        identifier,
                        shares,
                    )
                    .await
                }
                Err(e) => Err(e),
            },
            "!sell" => match parse_sell_args(&parts) {
                Ok((identifier, shares, price)) => {
                    trading::handle_sell(
                        &self.engine,
                        self.prices.as_ref(),
                        &msg.user_id,
                        identifier,
                        shares,
                        price,
                    )
                    .await
                }
                Err(e) => Err(e),
            },
            "!random" => {
                trading::handle_random(
                    &self.pending,
                    self.catalog.as_ref(),
                    self.prices.as_ref(),
                    &msg.user_id,
                    msg.channel_id,
                )
                .await
            }
            "!ry" | "!rn" => Ok("No random trade is waiting for your reply.".to_string()),
            "!monkey" => {
                trading::handle_monkey(
                    &self.engine,
                    &self.pending,
                    self.catalog.as_ref(),
                    self.prices.as_ref(),
                    &msg.user_id,
                    msg.channel_id,
                )
                .await
            }
            "!summary" => portfolio::handle_summary(&self.engine, self.prices.as_ref(), &msg.user_id),
            "!adjust_cost" => match parse_stock_and_cost(&parts) {
                Ok((identifier, cost)) => {
                    portfolio::handle_adjust_cost(&self.engine, &msg.user_id, identifier, cost)
                        .await
                }
                Err(e) => Err(e),
            },
            "!profit" => portfolio::handle_profit(&self.engine, &msg.user_id),
            "!profitclear" => portfolio::handle_profit_clear(&self.engine, &msg.user_id).await,
            "!bothelp" => Ok(help_text()),
            // Unknown commands are ignored, like any other chatter
            _ => return,
        };

        self.deliver(msg, reply).await;
    }

    /// Send a handler result, mapping errors to user messages
    ///
    /// Any error that surfaces while a pending flow exists clears that flow:
    /// a user must never be left stuck mid-conversation.
    async fn deliver(&self, msg: &IncomingMessage, reply: Result<String, BotError>) {
        match reply {
            Ok(text) => self.sink.send(msg.channel_id, &text),
            Err(err) => {
                self.pending.clear(&msg.user_id).await;
                if let BotError::Ledger(ref detail) = err {
                    logger::error(
                        LogTag::Commands,
                        &format!("Ledger failure for user {}: {}", msg.user_id, detail),
                    );
                }
                self.sink.send(msg.channel_id, &user_message(&err));
            }
        }
    }
}

/// Background task forwarding pending-flow timeouts to the chat
pub fn start_timeout_notifier(
    mut timeouts: mpsc::UnboundedReceiver<PendingTimeout>,
    sink: Arc<dyn OutboundSink>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = timeouts.recv().await {
            let channel_id = event.trade.channel_id();
            let text = match event.trade {
                PendingTrade::AwaitingSellPrice { stock_name, .. } => format!(
                    "⌛ Time is up! The monkey gave up selling {}. The trade was discarded.",
                    stock_name
                ),
                PendingTrade::AwaitingConfirmation { proposal, .. } => format!(
                    "⌛ The random pick of {}({}) expired without a reply.",
                    proposal.stock_name, proposal.stock_code
                ),
            };
            sink.send(channel_id, &text);
        }
    })
}

/// Map a core error to the chat message the user sees
pub fn user_message(err: &BotError) -> String {
    match err {
        BotError::Validation(msg) => format!("❌ {}.", msg),
        BotError::NotFound(what) => format!("❌ Could not find `{}` to trade.", what),
        BotError::InsufficientShares { requested, held } => format!(
            "❌ You tried to sell {} shares but only hold {}.",
            requested, held
        ),
        BotError::SystemBusy => {
            "⏳ Monthly data archival is running, please try again shortly.".to_string()
        }
        BotError::PriceUnavailable(code) => {
            format!("❌ No quote available for `{}`, trade abandoned.", code)
        }
        BotError::AlreadyPending => {
            "⚠️ You already have a trade waiting for your input. Finish that one first.".to_string()
        }
        BotError::Ledger(_) => "❌ Something went wrong recording the trade. Nothing was written."
            .to_string(),
    }
}

fn help_text() -> String {
    "🤖 PaperBot commands\n\
     !buy <stock> <shares> - buy at the market price\n\
     !sell <stock> <shares> [price] - sell holdings\n\
     !random - let the dice propose a trade (!ry / !rn to answer)\n\
     !monkey - one fully automated monkey trade\n\
     !summary - portfolio overview\n\
     !adjust_cost <stock> <cost> - rewrite a position's average cost\n\
     !profit - total realized P/L\n\
     !profitclear - zero the realized P/L"
        .to_string()
}

fn parse_stock_and_shares<'a>(parts: &[&'a str]) -> Result<(&'a str, i64), BotError> {
    if parts.len() != 3 {
        return Err(BotError::Validation(
            "usage: !buy <stock> <shares>".to_string(),
        ));
    }
    let shares = parse_shares(parts[2])?;
    Ok((parts[1], shares))
}

fn parse_sell_args<'a>(parts: &[&'a str]) -> Result<(&'a str, i64, Option<f64>), BotError> {
    if parts.len() != 3 && parts.len() != 4 {
        return Err(BotError::Validation(
            "usage: !sell <stock> <shares> [price]".to_string(),
        ));
    }
    let shares = parse_shares(parts[2])?;
    let price = match parts.get(3) {
        Some(raw) => Some(parse_price(raw)?),
        None => None,
    };
    Ok((parts[1], shares, price))
}

fn parse_stock_and_cost<'a>(parts: &[&'a str]) -> Result<(&'a str, f64), BotError> {
    if parts.len() != 3 {
        return Err(BotError::Validation(
            "usage: !adjust_cost <stock> <cost>".to_string(),
        ));
    }
    Ok((parts[1], parse_price(parts[2])?))
}

fn parse_shares(raw: &str) -> Result<i64, BotError> {
    let shares: i64 = raw
        .parse()
        .map_err(|_| BotError::Validation(format!("`{}` is not a whole number of shares", raw)))?;
    if shares <= 0 {
        return Err(BotError::Validation(
            "shares must be a positive number".to_string(),
        ));
    }
    Ok(shares)
}

fn parse_price(raw: &str) -> Result<f64, BotError> {
    let price: f64 = raw
        .parse()
        .map_err(|_| BotError::Validation(format!("`{}` is not a numeric price", raw)))?;
    if !price.is_finite() || price <= 0.0 {
        return Err(BotError::Validation(
            "price must be a positive number".to_string(),
        ));
    }
    Ok(price)
}
