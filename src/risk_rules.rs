use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::model::{InstrumentKind, TradeIntent};

/// Index underlyings subject to the same-day-expiry guard.
pub const INDEX_UNDERLYINGS: [&str; 2] = ["SPX", "SPXW"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskMode {
    #[serde(rename = "conservative")]
    Conservative,
    #[serde(rename = "balanced")]
    Balanced,
    #[serde(rename = "aggressive")]
    Aggressive,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskModeCaps {
    pub max_risk_pct_per_trade: Decimal,
    pub max_trades_per_hour: u32,
}

impl RiskMode {
    pub fn caps(&self) -> RiskModeCaps {
        match self {
            RiskMode::Conservative => RiskModeCaps {
                max_risk_pct_per_trade: Decimal::new(1, 2), // 1%
                max_trades_per_hour: 1,
            },
            RiskMode::Balanced => RiskModeCaps {
                max_risk_pct_per_trade: Decimal::new(2, 2), // 2%
                max_trades_per_hour: 3,
            },
            RiskMode::Aggressive => RiskModeCaps {
                max_risk_pct_per_trade: Decimal::new(5, 2), // 5%
                max_trades_per_hour: 5,
            },
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            RiskMode::Conservative => {
                "Defined-risk entries only (spreads), 1% max risk, 1 trade/hour"
            }
            RiskMode::Balanced => "Spreads and long stock, 2% max risk, 3 trades/hour",
            RiskMode::Aggressive => "All trade shapes, 5% max risk, 5 trades/hour",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeShape {
    Exit,
    LongStock,
    SingleLegOption,
    Spread,
}

impl TradeShape {
    fn label(&self) -> &'static str {
        match self {
            TradeShape::Exit => "exit",
            TradeShape::LongStock => "long stock",
            TradeShape::SingleLegOption => "single-leg option",
            TradeShape::Spread => "spread",
        }
    }
}

pub fn classify(intent: &TradeIntent) -> TradeShape {
    if intent.context.is_exit() || intent.action.is_closing() {
        return TradeShape::Exit;
    }
    match intent.instrument {
        InstrumentKind::Stock => TradeShape::LongStock,
        InstrumentKind::Spread => TradeShape::Spread,
        InstrumentKind::Option | InstrumentKind::IndexOption => {
            if intent.legs.len() >= 2 {
                TradeShape::Spread
            } else {
                TradeShape::SingleLegOption
            }
        }
    }
}

pub fn is_index_underlying(symbol: &str) -> bool {
    let symbol = symbol.trim_start_matches('$').to_uppercase();
    INDEX_UNDERLYINGS.contains(&symbol.as_str())
}

/// True when any leg of an index trade expires on `today`.
pub fn is_index_0dte(intent: &TradeIntent, today: NaiveDate) -> bool {
    is_index_underlying(&intent.underlying)
        && intent.legs.iter().any(|leg| leg.expiration == today)
}

/// Whether the active risk mode permits this intent.
///
/// Exits always pass: reducing risk is allowed in every mode. Entries are
/// gated by trade shape, and same-day index entries additionally require the
/// explicit allow flag regardless of mode.
pub fn check_allows(
    mode: RiskMode,
    intent: &TradeIntent,
    allow_0dte_index: bool,
    today: NaiveDate,
) -> Result<(), String> {
    let shape = classify(intent);
    if shape == TradeShape::Exit {
        return Ok(());
    }

    if is_index_0dte(intent, today) && !allow_0dte_index {
        return Err("0DTE index entry requires ALLOW_0DTE_INDEX=true".to_string());
    }

    let allowed = match mode {
        RiskMode::Conservative => matches!(shape, TradeShape::Spread),
        RiskMode::Balanced => matches!(shape, TradeShape::Spread | TradeShape::LongStock),
        RiskMode::Aggressive => true,
    };

    if allowed {
        Ok(())
    } else {
        Err(format!(
            "{} entries not permitted in {:?} risk mode",
            shape.label(),
            mode
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        ExecutionMode, LegSide, OptionLeg, OptionType, OrderType, SignalContext, TradeAction,
    };
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn option_entry(underlying: &str, legs: Vec<OptionLeg>) -> TradeIntent {
        TradeIntent {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            execution_mode: ExecutionMode::Paper,
            instrument: if is_index_underlying(underlying) {
                InstrumentKind::IndexOption
            } else {
                InstrumentKind::Option
            },
            underlying: underlying.to_string(),
            action: TradeAction::BuyToOpen,
            order_type: OrderType::Market,
            limit_price: None,
            limit_min: None,
            limit_max: None,
            stop_price: None,
            quantity: 1,
            risk_pct: None,
            legs,
            context: SignalContext::Entry {
                source_signal_id: "sig-1".to_string(),
            },
            raw_signal: None,
            metadata: None,
        }
    }

    fn leg(expiration: NaiveDate) -> OptionLeg {
        OptionLeg {
            side: LegSide::Buy,
            quantity: 1,
            strike: dec!(5000),
            option_type: OptionType::Call,
            expiration,
        }
    }

    #[test]
    fn exits_pass_in_every_mode() {
        let mut intent = option_entry("SPY", vec![]);
        intent.action = TradeAction::SellToClose;
        intent.context = SignalContext::Exit {
            source_signal_id: "sig-1".to_string(),
            matched_position_id: None,
        };
        let today = Utc::now().date_naive();
        for mode in [RiskMode::Conservative, RiskMode::Balanced, RiskMode::Aggressive] {
            assert!(check_allows(mode, &intent, false, today).is_ok());
        }
    }

    #[test]
    fn conservative_blocks_single_leg_entries() {
        let today = Utc::now().date_naive();
        let exp = today + chrono::Duration::days(30);
        let intent = option_entry("SPY", vec![leg(exp)]);

        assert!(check_allows(RiskMode::Conservative, &intent, false, today).is_err());
        assert!(check_allows(RiskMode::Balanced, &intent, false, today).is_err());
        assert!(check_allows(RiskMode::Aggressive, &intent, false, today).is_ok());
    }

    #[test]
    fn spreads_allowed_in_conservative() {
        let today = Utc::now().date_naive();
        let exp = today + chrono::Duration::days(7);
        let intent = option_entry("SPY", vec![leg(exp), leg(exp)]);
        assert_eq!(classify(&intent), TradeShape::Spread);
        assert!(check_allows(RiskMode::Conservative, &intent, false, today).is_ok());
    }

    #[test]
    fn same_day_index_entry_needs_explicit_allow() {
        let today = Utc::now().date_naive();
        let intent = option_entry("SPX", vec![leg(today), leg(today)]);

        let err = check_allows(RiskMode::Aggressive, &intent, false, today).unwrap_err();
        assert!(err.contains("0DTE"));
        assert!(check_allows(RiskMode::Aggressive, &intent, true, today).is_ok());
    }
}
