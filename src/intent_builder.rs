use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

use crate::context::ExecutionContext;
use crate::model::{
    ExecutionMode, InstrumentKind, LegSide, OptionLeg, OrderType, SignalContext, TradeAction,
    TradeIntent,
};
use crate::position_store::{PaperPosition, PositionStore};
use crate::risk_rules::is_index_underlying;
use crate::signal::{LimitKind, ParsedSignal, SignalType};

const EXIT_KEYWORDS: [&str; 6] = [
    "exit",
    "close",
    "take profit",
    "cut position",
    "selling to close",
    "buy to close",
];

const CREDIT_KEYWORDS: [&str; 7] = [
    "credit spread",
    "credit",
    "sold",
    "sell to open",
    "iron condor",
    "put credit",
    "call credit",
];

#[derive(Error, Debug, PartialEq)]
pub enum IntentError {
    #[error("Signal has no ticker")]
    MissingTicker,
    #[error("Leg {index} has no expiration")]
    LegMissingExpiration { index: usize },
    #[error("No matching open position for {0}")]
    NoMatchingPosition(String),
}

/// Convert a parsed signal into a broker-agnostic TradeIntent.
pub fn build_trade_intent(
    parsed: &ParsedSignal,
    signal_id: &str,
    signal_type: SignalType,
    mode: ExecutionMode,
    ctx: &ExecutionContext,
) -> Result<TradeIntent, IntentError> {
    let ticker = parsed.ticker.trim().to_uppercase();
    if ticker.is_empty() {
        return Err(IntentError::MissingTicker);
    }

    let is_exit = signal_type == SignalType::Exit || looks_like_exit(parsed);
    let action = determine_action(parsed, is_exit);
    let instrument = determine_instrument(parsed, &ticker);
    let order_type = determine_order_type(parsed);
    let limit_price = determine_limit_price(parsed, is_exit);
    let legs = build_intent_legs(parsed)?;

    let context = if is_exit {
        SignalContext::Exit {
            source_signal_id: signal_id.to_string(),
            matched_position_id: None,
        }
    } else {
        SignalContext::Entry {
            source_signal_id: signal_id.to_string(),
        }
    };

    Ok(TradeIntent {
        id: ctx.id.new_id(),
        created_at: ctx.time.now(),
        execution_mode: mode,
        instrument,
        underlying: ticker,
        action,
        order_type,
        limit_price,
        limit_min: parsed.limit_min.filter(|p| *p > Decimal::ZERO),
        limit_max: parsed.limit_max.filter(|p| *p > Decimal::ZERO),
        stop_price: None,
        quantity: parsed.quantity.max(1),
        risk_pct: parsed.size_pct,
        legs,
        context,
        raw_signal: (!parsed.raw_text.is_empty()).then(|| parsed.raw_text.clone()),
        metadata: Some(serde_json::json!({
            "strategy": parsed.strategy,
            "limit_kind": parsed.limit_kind,
            "source": "classified_signal",
        })),
    })
}

/// Resolve an EXIT signal with incomplete leg detail against the open
/// paper positions. The resulting intent closes the matched position: its
/// legs are the position's legs with sides flipped.
pub fn resolve_exit_intent(
    parsed: &ParsedSignal,
    signal_id: &str,
    mode: ExecutionMode,
    positions: &PositionStore,
    ctx: &ExecutionContext,
) -> Result<(TradeIntent, Uuid), IntentError> {
    let ticker = parsed.ticker.trim().to_uppercase();
    if ticker.is_empty() {
        return Err(IntentError::MissingTicker);
    }

    let position = positions
        .find_open_for_exit(parsed)
        .ok_or_else(|| IntentError::NoMatchingPosition(ticker.clone()))?;

    let action = closing_action(&position);
    let legs: Vec<OptionLeg> = position
        .legs
        .iter()
        .map(|leg| OptionLeg {
            side: flip(leg.side),
            ..leg.clone()
        })
        .collect();

    let limit_price = determine_limit_price(parsed, true);

    let intent = TradeIntent {
        id: ctx.id.new_id(),
        created_at: ctx.time.now(),
        execution_mode: mode,
        instrument: position.instrument,
        underlying: position.underlying.clone(),
        action,
        order_type: determine_order_type(parsed),
        limit_price,
        limit_min: parsed.limit_min.filter(|p| *p > Decimal::ZERO),
        limit_max: parsed.limit_max.filter(|p| *p > Decimal::ZERO),
        stop_price: None,
        quantity: position.quantity,
        risk_pct: None,
        legs,
        context: SignalContext::Exit {
            source_signal_id: signal_id.to_string(),
            matched_position_id: Some(position.position_id),
        },
        raw_signal: (!parsed.raw_text.is_empty()).then(|| parsed.raw_text.clone()),
        metadata: Some(serde_json::json!({
            "strategy": parsed.strategy,
            "source": "classified_signal",
            "resolved_from_position": position.position_id,
        })),
    };

    Ok((intent, position.position_id))
}

fn looks_like_exit(parsed: &ParsedSignal) -> bool {
    if parsed.strategy.eq_ignore_ascii_case("EXIT") {
        return true;
    }
    let raw = parsed.raw_text.to_lowercase();
    EXIT_KEYWORDS.iter().any(|kw| raw.contains(kw))
}

/// Infer the action from strategy and alert wording. Credit positions
/// (sold to open) must be bought back to close; debit positions are sold.
fn determine_action(parsed: &ParsedSignal, is_exit: bool) -> TradeAction {
    let strategy = parsed.strategy.to_uppercase();
    let raw = parsed.raw_text.to_lowercase();

    if is_exit {
        if raw.contains("buy to close") {
            return TradeAction::BuyToClose;
        }
        if raw.contains("sell to close") || raw.contains("selling to close") {
            return TradeAction::SellToClose;
        }
        if CREDIT_KEYWORDS.iter().any(|kw| raw.contains(kw)) {
            return TradeAction::BuyToClose;
        }
        return TradeAction::SellToClose;
    }

    if strategy.contains("CREDIT") {
        return TradeAction::SellToOpen;
    }
    // LONG_STOCK, LONG_OPTION, debit spreads and anything unrecognized
    // default to opening long.
    TradeAction::BuyToOpen
}

fn determine_instrument(parsed: &ParsedSignal, ticker: &str) -> InstrumentKind {
    let strategy = parsed.strategy.to_uppercase();

    if strategy == "LONG_STOCK" {
        return InstrumentKind::Stock;
    }

    let option_kind = if is_index_underlying(ticker) {
        InstrumentKind::IndexOption
    } else {
        InstrumentKind::Option
    };

    if parsed.legs.len() >= 2 {
        return InstrumentKind::Spread;
    }
    if parsed.legs.len() == 1 || strategy == "LONG_OPTION" || strategy == "EXIT" {
        return option_kind;
    }
    if strategy.contains("SPREAD") {
        return InstrumentKind::Spread;
    }
    if ["CALL", "PUT", "OPTION"].iter().any(|kw| strategy.contains(kw)) {
        return option_kind;
    }

    InstrumentKind::Stock
}

fn determine_order_type(parsed: &ParsedSignal) -> OrderType {
    let has_bound = parsed.limit_min.is_some_and(|p| p > Decimal::ZERO)
        || parsed.limit_max.is_some_and(|p| p > Decimal::ZERO);
    if has_bound {
        OrderType::Limit
    } else {
        OrderType::Market
    }
}

/// For debit orders use the range max (worst price to pay); for credit
/// orders the range min (minimum credit to receive); exits prefer min.
fn determine_limit_price(parsed: &ParsedSignal, is_exit: bool) -> Option<Decimal> {
    let min = parsed.limit_min.filter(|p| *p > Decimal::ZERO);
    let max = parsed.limit_max.filter(|p| *p > Decimal::ZERO);

    if is_exit {
        return min.or(max);
    }

    match parsed.limit_kind {
        LimitKind::Debit => max.or(min),
        LimitKind::Credit => min.or(max),
    }
}

fn build_intent_legs(parsed: &ParsedSignal) -> Result<Vec<OptionLeg>, IntentError> {
    parsed
        .legs
        .iter()
        .enumerate()
        .map(|(index, leg)| {
            let expiration = leg
                .expiration
                .or(parsed.expiration)
                .ok_or(IntentError::LegMissingExpiration { index })?;
            Ok(OptionLeg {
                side: leg.side,
                quantity: leg.quantity.max(1),
                strike: leg.strike,
                option_type: leg.option_type,
                expiration,
            })
        })
        .collect()
}

/// A position opened with a net-sell (credit) is bought back; anything
/// else is sold to close.
fn closing_action(position: &PaperPosition) -> TradeAction {
    let sells = position
        .legs
        .iter()
        .filter(|l| l.side == LegSide::Sell)
        .count();
    let buys = position.legs.len() - sells;
    if sells > buys {
        TradeAction::BuyToClose
    } else {
        TradeAction::SellToClose
    }
}

fn flip(side: LegSide) -> LegSide {
    match side {
        LegSide::Buy => LegSide::Sell,
        LegSide::Sell => LegSide::Buy,
    }
}
