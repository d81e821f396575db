//! Service wiring and the console chat loop
//!
//! Builds the ledger store, settlement engine and pending-trade table, starts
//! the background services (archive scheduler, timeout notifier) and drives a
//! line-based console session until Ctrl-C. The console stands in for a chat
//! transport; anything implementing `OutboundSink` plus a feed of
//! `IncomingMessage`s can replace it.

use crate::commands::{self, Dispatcher, IncomingMessage, OutboundSink};
use crate::config::with_config;
use crate::ledger::LedgerStore;
use crate::logger::{self, LogTag};
use crate::market::{CsvCatalog, CsvQuotes, StaticCatalog, StockCatalog};
use crate::pending::PendingTrades;
use crate::settlement::SettlementEngine;
use anyhow::{Context, Result};
use std::fs;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Prints replies straight to the console session
struct ConsoleSink;

impl OutboundSink for ConsoleSink {
    fn send(&self, _channel_id: u64, text: &str) {
        println!("{}", text);
    }
}

/// Create the data directories named in the config
pub fn ensure_data_directories() -> Result<()> {
    let (ledger_dir, archive_dir) =
        with_config(|c| (c.data.ledger_dir.clone(), c.data.archive_dir.clone()));
    fs::create_dir_all(&ledger_dir)
        .with_context(|| format!("failed to create ledger directory {}", ledger_dir))?;
    fs::create_dir_all(&archive_dir)
        .with_context(|| format!("failed to create archive directory {}", archive_dir))?;
    Ok(())
}

fn load_catalog() -> Arc<dyn StockCatalog> {
    let path = with_config(|c| c.data.catalog_path.clone());
    match CsvCatalog::load(&path) {
        Ok(catalog) => {
            logger::info(
                LogTag::Market,
                &format!("Loaded {} listed stocks from {}", catalog.len(), path),
            );
            Arc::new(catalog)
        }
        Err(e) => {
            logger::warning(
                LogTag::Market,
                &format!("No stock catalog at {} ({}); starting with an empty one", path, e),
            );
            Arc::new(StaticCatalog::new(&[]))
        }
    }
}

/// Full bot lifecycle: wiring, background services, console loop
pub async fn run_bot() -> Result<()> {
    ensure_data_directories()?;

    let (ledger_dir, quotes_path) =
        with_config(|c| (c.data.ledger_dir.clone(), c.data.quotes_path.clone()));

    let store = Arc::new(LedgerStore::new(&ledger_dir)?);
    let engine = Arc::new(SettlementEngine::new(store.clone()));
    let (pending, timeouts) = PendingTrades::new();
    let catalog = load_catalog();
    let prices = Arc::new(CsvQuotes::new(&quotes_path));
    let sink: Arc<dyn OutboundSink> = Arc::new(ConsoleSink);

    let archive_task = crate::archive::start_archive_service(store.clone());
    let notifier_task = commands::start_timeout_notifier(timeouts, sink.clone());

    let dispatcher = Dispatcher::new(engine, pending, catalog, prices, sink);

    logger::info(
        LogTag::System,
        "Console session ready. Type commands (!bothelp for a list), Ctrl-C to quit.",
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line? {
                    Some(text) => {
                        let text = text.trim().to_string();
                        if text.is_empty() {
                            continue;
                        }
                        logger::verbose(LogTag::Commands, &format!("Incoming: {}", text));
                        let msg = IncomingMessage {
                            user_id: "console".to_string(),
                            channel_id: 0,
                            text,
                        };
                        dispatcher.handle_message(&msg).await;
                    }
                    None => break, // stdin closed
                }
            }
            _ = tokio::signal::ctrl_c() => {
                logger::info(LogTag::System, "Shutdown signal received");
                break;
            }
        }
    }

    archive_task.abort();
    notifier_task.abort();
    logger::info(LogTag::System, "PaperBot stopped");
    Ok(())
}
