//! Portfolio commands: summary, adjust_cost, profit, profitclear
//!
//! Handlers return rendered text; the dispatcher forwards it to the outbound
//! sink. The summary is a text table; fancier rendering (images) belongs to
//! the presentation collaborator.

use crate::config::with_config;
use crate::errors::BotResult;
use crate::fees;
use crate::market::PriceSource;
use crate::positions;
use crate::settlement::SettlementEngine;
use comfy_table::{Cell, CellAlignment, Table};

/// Handle !summary - render current holdings with market values
pub fn handle_summary(
    engine: &SettlementEngine,
    prices: &dyn PriceSource,
    user_id: &str,
) -> BotResult<String> {
    let held = engine.get_positions(user_id)?;
    if held.is_empty() {
        return Ok("Your portfolio is empty.".to_string());
    }

    let (fee_rate, tax_rate, minimum_fee) =
        with_config(|c| (c.fees.fee_rate, c.fees.tax_rate, c.fees.minimum_fee));

    let mut table = Table::new();
    table.set_header(vec![
        "Stock", "Shares", "Avg Cost", "Price", "Value", "P/L", "Return",
    ]);

    let mut total_shares = 0i64;
    let mut total_cost = 0.0;
    let mut total_value = 0.0;
    let mut total_profit = 0.0;

    for position in held.values() {
        let label = format!("{}({})", position.stock_name, position.stock_code);
        total_shares += position.total_shares;
        total_cost += position.total_cost;

        match prices.get_price(&position.stock_code).filter(|p| *p > 0.0) {
            Some(price) => {
                let value = position.total_shares as f64 * price;
                let profit = fees::unrealized_profit_loss(
                    value,
                    position.total_cost,
                    fee_rate,
                    tax_rate,
                    minimum_fee,
                );
                let pct = profit / position.total_cost * 100.0;
                total_value += value;
                total_profit += profit;

                table.add_row(vec![
                    Cell::new(label),
                    number_cell(format!("{}", position.total_shares)),
                    number_cell(format!("{:.2}", position.average_cost())),
                    number_cell(format!("{:.2}", price)),
                    number_cell(format!("{:.2}", value)),
                    number_cell(format!("{:+.2}", profit)),
                    number_cell(format!("{:+.2}%", pct)),
                ]);
            }
            None => {
                table.add_row(vec![
                    Cell::new(label),
                    number_cell(format!("{}", position.total_shares)),
                    number_cell(format!("{:.2}", position.average_cost())),
                    number_cell("N/A".to_string()),
                    number_cell("N/A".to_string()),
                    number_cell("N/A".to_string()),
                    number_cell("N/A".to_string()),
                ]);
            }
        }
    }

    let mut text = format!("📊 Portfolio summary\n{}", table);
    if total_cost > 0.0 {
        let pct = total_profit / total_cost * 100.0;
        text.push_str(&format!(
            "\nTotal  shares: {}  value: ${:.2}  P/L: ${:+.2}  return: {:+.2}%",
            total_shares, total_value, total_profit, pct
        ));
    }
    Ok(text)
}

fn number_cell(text: String) -> Cell {
    Cell::new(text).set_alignment(CellAlignment::Right)
}

/// Handle !adjust_cost <stock> <new_cost>
pub async fn handle_adjust_cost(
    engine: &SettlementEngine,
    user_id: &str,
    identifier: &str,
    new_cost: f64,
) -> BotResult<String> {
    let held = engine.get_positions(user_id)?;
    let position = positions::resolve(&held, identifier)?.clone();

    engine
        .adjust_cost(
            user_id,
            "!adjust_cost",
            &position.stock_code,
            &position.stock_name,
            new_cost,
        )
        .await?;

    Ok(format!(
        "✅ Average cost of {}({}) adjusted to ${:.2}.",
        position.stock_name, position.stock_code, new_cost
    ))
}

/// Handle !profit - cumulative realized P/L
pub fn handle_profit(engine: &SettlementEngine, user_id: &str) -> BotResult<String> {
    use crate::ledger::EntryCategory;

    let log = engine.store().read_log(user_id)?;
    if !log.iter().any(|e| e.category == EntryCategory::ProfitLoss) {
        return Ok("No realized profit/loss recorded yet.".to_string());
    }
    let total = engine.realized_profit(user_id)?;
    let emoji = if total >= 0.0 { "📈" } else { "📉" };
    Ok(format!("{} Total realized P/L: ${:+.2}", emoji, total))
}

/// Handle !profitclear - zero the cumulative P/L with a balancing row
pub async fn handle_profit_clear(engine: &SettlementEngine, user_id: &str) -> BotResult<String> {
    match engine.clear_profit(user_id, "!profitclear").await? {
        Some(total) => Ok(format!(
            "✅ Profit cleared! A balancing record of ${:+.2} was added.",
            -total
        )),
        None => Ok("Your total P/L is already zero, nothing to clear.".to_string()),
    }
}
