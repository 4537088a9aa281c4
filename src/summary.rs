use std::collections::BTreeMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use serde::Serialize;
use tracing::{info, warn};

use crate::plan_log::PlanLog;
use crate::position_store::{PaperPosition, PositionStore};

/// End-of-day roll-up: decision counts by outcome plus a best-effort PnL
/// estimate over the paper positions closed that day.
#[derive(Debug, Clone, Serialize)]
pub struct DailySummary {
    pub date: NaiveDate,
    pub outcomes: BTreeMap<String, u32>,
    pub executed: u32,
    pub closed_positions: usize,
    pub realized_pnl_estimate: Option<Decimal>,
}

pub fn build_daily_summary(
    day: NaiveDate,
    plan_log: &PlanLog,
    positions: &PositionStore,
) -> DailySummary {
    let mut outcomes: BTreeMap<String, u32> = BTreeMap::new();
    match plan_log.entries_for_day(day) {
        Ok(entries) => {
            for entry in entries {
                *outcomes.entry(entry.outcome).or_insert(0) += 1;
            }
        }
        Err(e) => warn!("Could not read plan ledger for summary: {}", e),
    }
    let executed = outcomes.get("executed").copied().unwrap_or(0);

    let closed = positions.closed_on(day);
    let realized_pnl_estimate = estimate_pnl(&closed);

    DailySummary {
        date: day,
        outcomes,
        executed,
        closed_positions: closed.len(),
        realized_pnl_estimate,
    }
}

/// Sum of per-position estimates; positions without both fill prices are
/// skipped. Returns None when nothing could be estimated.
fn estimate_pnl(closed: &[PaperPosition]) -> Option<Decimal> {
    let mut total = Decimal::ZERO;
    let mut estimated_any = false;

    for position in closed {
        let Some(open_fill) = fill_price_of(&position.open_intent) else {
            continue;
        };
        let Some(close_fill) = position.close_intent.as_ref().and_then(fill_price_of) else {
            continue;
        };

        let quantity = Decimal::from(position.quantity);
        let multiplier = position.instrument.multiplier();

        // A position opened for a credit profits when bought back cheaper.
        let opened_short = position
            .open_intent
            .get("action")
            .and_then(|a| a.as_str())
            .is_some_and(|a| a.starts_with("SELL"));

        let per_unit = if opened_short {
            open_fill - close_fill
        } else {
            close_fill - open_fill
        };

        total += per_unit * quantity * multiplier;
        estimated_any = true;
    }

    estimated_any.then_some(total)
}

fn fill_price_of(intent_snapshot: &serde_json::Value) -> Option<Decimal> {
    intent_snapshot
        .get("fill_price")
        .and_then(|v| v.as_f64())
        .and_then(Decimal::from_f64)
}

pub fn emit_daily_summary(summary: &DailySummary) {
    info!(
        date = %summary.date,
        executed = summary.executed,
        closed_positions = summary.closed_positions,
        pnl_estimate = ?summary.realized_pnl_estimate,
        outcomes = ?summary.outcomes,
        "📊 Daily summary"
    );
}
