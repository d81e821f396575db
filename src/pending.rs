//! Interactive trade state machine
//!
//! Some flows need a second message from the user: the monkey's sell asks for
//! a typed price, a random trade proposal asks for !ry / !rn. This module
//! owns the per-user pending-state table the message-intake path consults
//! before normal command dispatch.
//!
//! States are per user and orthogonal across users: IDLE (no slot),
//! AWAITING_SELL_PRICE, AWAITING_CONFIRMATION. Exactly one pending flow per
//! user; starting a second fails with AlreadyPending instead of overwriting.
//!
//! Every slot carries a first-class timeout timer (a spawned task holding the
//! slot's generation token). The timer is aborted when the state resolves;
//! an invalid price retry does NOT re-arm it, the window is fixed at state
//! creation. State lives in process memory only: a restart drops in-flight
//! flows, which is acceptable because the chat transport cannot resume
//! mid-flow.

use crate::arguments::is_debug_pending_enabled;
use crate::errors::{BotError, BotResult};
use crate::logger::{self, LogTag};
use crate::settlement::TradeSide;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::AbortHandle;

/// A randomly proposed trade awaiting an accept/reject reply
#[derive(Debug, Clone, PartialEq)]
pub struct TradeProposal {
    pub side: TradeSide,
    pub stock_code: String,
    pub stock_name: String,
    pub shares: i64,
    pub price: f64,
}

/// One pending interactive flow
#[derive(Debug, Clone, PartialEq)]
pub enum PendingTrade {
    /// Automated sell decided; waiting for the user to type a price
    AwaitingSellPrice {
        stock_code: String,
        stock_name: String,
        shares_to_sell: i64,
        average_cost: f64,
        channel_id: u64,
    },
    /// Random pick waiting for !ry / !rn
    AwaitingConfirmation {
        proposal: TradeProposal,
        channel_id: u64,
    },
}

impl PendingTrade {
    pub fn channel_id(&self) -> u64 {
        match self {
            PendingTrade::AwaitingSellPrice { channel_id, .. } => *channel_id,
            PendingTrade::AwaitingConfirmation { channel_id, .. } => *channel_id,
        }
    }
}

/// Emitted when a pending flow times out (state already removed)
#[derive(Debug)]
pub struct PendingTimeout {
    pub user_id: String,
    pub trade: PendingTrade,
}

struct Slot {
    trade: PendingTrade,
    /// Generation token; guards the timer against resolving a newer flow
    token: u64,
    timer: Option<AbortHandle>,
}

/// Per-user pending trade table
///
/// Owned by the dispatcher and passed by handle into the flows that need it;
/// no ambient globals.
#[derive(Clone)]
pub struct PendingTrades {
    slots: Arc<Mutex<HashMap<String, Slot>>>,
    timeouts: mpsc::UnboundedSender<PendingTimeout>,
    next_token: Arc<AtomicU64>,
}

impl PendingTrades {
    /// Create the table plus the receiver timeout notifications arrive on
    pub fn new() -> (Self, mpsc::UnboundedReceiver<PendingTimeout>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                slots: Arc::new(Mutex::new(HashMap::new())),
                timeouts: tx,
                next_token: Arc::new(AtomicU64::new(1)),
            },
            rx,
        )
    }

    /// Park a pending flow for a user and arm its timeout timer
    pub async fn begin(
        &self,
        user_id: &str,
        trade: PendingTrade,
        timeout: Duration,
    ) -> BotResult<()> {
        let mut slots = self.slots.lock().await;
        if slots.contains_key(user_id) {
            return Err(BotError::AlreadyPending);
        }

        let token = self.next_token.fetch_add(1, Ordering::SeqCst);
        let timer = self.spawn_timer(user_id.to_string(), token, timeout);
        slots.insert(
            user_id.to_string(),
            Slot {
                trade,
                token,
                timer: Some(timer),
            },
        );

        if is_debug_pending_enabled() {
            logger::debug(
                LogTag::Pending,
                &format!(
                    "Pending flow parked for user {} (timeout {}s)",
                    user_id,
                    timeout.as_secs()
                ),
            );
        }
        Ok(())
    }

    fn spawn_timer(&self, user_id: String, token: u64, timeout: Duration) -> AbortHandle {
        let slots = self.slots.clone();
        let timeouts = self.timeouts.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;

            let removed = {
                let mut slots = slots.lock().await;
                match slots.get(&user_id) {
                    Some(slot) if slot.token == token => slots.remove(&user_id),
                    _ => None,
                }
            };

            if let Some(slot) = removed {
                logger::info(
                    LogTag::Pending,
                    &format!("Pending flow for user {} timed out", user_id),
                );
                let _ = timeouts.send(PendingTimeout {
                    user_id,
                    trade: slot.trade,
                });
            }
        });
        handle.abort_handle()
    }

    /// Whether a user has a pending flow (message intake checks this first)
    pub async fn has_pending(&self, user_id: &str) -> bool {
        self.slots.lock().await.contains_key(user_id)
    }

    /// Snapshot of a user's pending flow without resolving it
    pub async fn peek(&self, user_id: &str) -> Option<PendingTrade> {
        self.slots.lock().await.get(user_id).map(|s| s.trade.clone())
    }

    /// Resolve and remove a user's pending flow, cancelling its timer
    pub async fn take(&self, user_id: &str) -> Option<PendingTrade> {
        let mut slots = self.slots.lock().await;
        let slot = slots.remove(user_id)?;
        if let Some(timer) = slot.timer {
            timer.abort();
        }
        if is_debug_pending_enabled() {
            logger::debug(
                LogTag::Pending,
                &format!("Pending flow resolved for user {}", user_id),
            );
        }
        Some(slot.trade)
    }

    /// Drop a user's pending flow if any (fail-safe cleanup on errors)
    pub async fn clear(&self, user_id: &str) {
        let _ = self.take(user_id).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sell_state(channel_id: u64) -> PendingTrade {
        PendingTrade::AwaitingSellPrice {
            stock_code: "2330".to_string(),
            stock_name: "TSMC".to_string(),
            shares_to_sell: 40,
            average_cost: 50.35,
            channel_id,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_pending_flow_per_user() {
        let (table, _rx) = PendingTrades::new();
        table
            .begin("7", sell_state(1), Duration::from_secs(120))
            .await
            .unwrap();

        let err = table
            .begin("7", sell_state(1), Duration::from_secs(120))
            .await
            .unwrap_err();
        assert_eq!(err, BotError::AlreadyPending);

        // Other users are unaffected
        table
            .begin("8", sell_state(2), Duration::from_secs(120))
            .await
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_clears_state_and_notifies() {
        let (table, mut rx) = PendingTrades::new();
        table
            .begin("7", sell_state(9), Duration::from_secs(120))
            .await
            .unwrap();

        tokio::time::advance(Duration::from_secs(121)).await;
        // Let the timer task run
        tokio::task::yield_now().await;

        let event = rx.recv().await.unwrap();
        assert_eq!(event.user_id, "7");
        assert_eq!(event.trade.channel_id(), 9);
        assert!(!table.has_pending("7").await);

        // The next flow can start fresh
        table
            .begin("7", sell_state(9), Duration::from_secs(120))
            .await
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_resolution_cancels_timer() {
        let (table, mut rx) = PendingTrades::new();
        table
            .begin("7", sell_state(3), Duration::from_secs(120))
            .await
            .unwrap();

        let taken = table.take("7").await.unwrap();
        assert_eq!(taken.channel_id(), 3);

        tokio::time::advance(Duration::from_secs(300)).await;
        tokio::task::yield_now().await;
        assert!(rx.try_recv().is_err(), "aborted timer must not fire");
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_timer_cannot_kill_a_newer_flow() {
        let (table, mut rx) = PendingTrades::new();
        table
            .begin("7", sell_state(1), Duration::from_secs(120))
            .await
            .unwrap();
        table.clear("7").await;

        // New flow with a longer window; the first timer is gone
        table
            .begin("7", sell_state(2), Duration::from_secs(600))
            .await
            .unwrap();
        tokio::time::advance(Duration::from_secs(130)).await;
        tokio::task::yield_now().await;

        assert!(table.has_pending("7").await);
        assert!(rx.try_recv().is_err());
    }
}
