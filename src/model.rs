use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExecutionMode {
    #[serde(rename = "PAPER")]
    Paper,
    #[serde(rename = "LIVE")]
    Live,
    #[serde(rename = "HISTORICAL")]
    Historical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InstrumentKind {
    #[serde(rename = "STOCK")]
    Stock,
    #[serde(rename = "OPTION")]
    Option,
    #[serde(rename = "INDEX_OPTION")]
    IndexOption,
    #[serde(rename = "SPREAD")]
    Spread,
}

impl InstrumentKind {
    /// Contract multiplier used for notional and PnL arithmetic.
    pub fn multiplier(&self) -> Decimal {
        match self {
            InstrumentKind::Stock => Decimal::ONE,
            _ => Decimal::from(100),
        }
    }

    pub fn is_option_like(&self) -> bool {
        !matches!(self, InstrumentKind::Stock)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeAction {
    #[serde(rename = "BUY")]
    Buy,
    #[serde(rename = "SELL")]
    Sell,
    #[serde(rename = "BUY_TO_OPEN")]
    BuyToOpen,
    #[serde(rename = "BUY_TO_CLOSE")]
    BuyToClose,
    #[serde(rename = "SELL_TO_OPEN")]
    SellToOpen,
    #[serde(rename = "SELL_TO_CLOSE")]
    SellToClose,
}

impl TradeAction {
    pub fn is_closing(&self) -> bool {
        matches!(self, TradeAction::BuyToClose | TradeAction::SellToClose)
    }

    pub fn is_opening(&self) -> bool {
        matches!(
            self,
            TradeAction::Buy | TradeAction::BuyToOpen | TradeAction::SellToOpen
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderType {
    #[serde(rename = "MARKET")]
    Market,
    #[serde(rename = "LIMIT")]
    Limit,
    #[serde(rename = "STOP")]
    Stop,
    #[serde(rename = "STOP_LIMIT")]
    StopLimit,
}

impl OrderType {
    pub fn requires_limit_price(&self) -> bool {
        matches!(self, OrderType::Limit | OrderType::StopLimit)
    }

    pub fn requires_stop_price(&self) -> bool {
        matches!(self, OrderType::Stop | OrderType::StopLimit)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LegSide {
    #[serde(rename = "BUY")]
    Buy,
    #[serde(rename = "SELL")]
    Sell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum OptionType {
    #[serde(rename = "CALL")]
    Call,
    #[serde(rename = "PUT")]
    Put,
}

/// One leg of an options order. Quantity is always positive; direction lives
/// in `side`, never in sign.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionLeg {
    pub side: LegSide,
    pub quantity: u32,
    pub strike: Decimal,
    pub option_type: OptionType,
    pub expiration: NaiveDate,
}

/// Typed provenance of an intent: which signal produced it and, for exits,
/// which open paper position it was resolved against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "signal_type")]
pub enum SignalContext {
    #[serde(rename = "ENTRY")]
    Entry { source_signal_id: String },
    #[serde(rename = "EXIT")]
    Exit {
        source_signal_id: String,
        matched_position_id: Option<Uuid>,
    },
}

impl SignalContext {
    pub fn source_signal_id(&self) -> &str {
        match self {
            SignalContext::Entry { source_signal_id }
            | SignalContext::Exit {
                source_signal_id, ..
            } => source_signal_id,
        }
    }

    pub fn matched_position_id(&self) -> Option<Uuid> {
        match self {
            SignalContext::Exit {
                matched_position_id,
                ..
            } => *matched_position_id,
            SignalContext::Entry { .. } => None,
        }
    }

    pub fn is_exit(&self) -> bool {
        matches!(self, SignalContext::Exit { .. })
    }
}

/// Broker-agnostic representation of a requested trade. Created once per
/// signal-execution attempt and immutable afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeIntent {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,

    pub execution_mode: ExecutionMode,
    pub instrument: InstrumentKind,

    /// Underlying symbol, e.g. SPY, SPX, AAPL.
    pub underlying: String,

    pub action: TradeAction,
    pub order_type: OrderType,

    pub limit_price: Option<Decimal>,
    pub limit_min: Option<Decimal>,
    pub limit_max: Option<Decimal>,
    pub stop_price: Option<Decimal>,

    pub quantity: u32,
    #[serde(default)]
    pub risk_pct: Option<Decimal>,

    #[serde(default)]
    pub legs: Vec<OptionLeg>,

    pub context: SignalContext,

    #[serde(default)]
    pub raw_signal: Option<String>,
    /// Pass-through annotations only; routing decisions never read this.
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

impl TradeIntent {
    /// The price to use for order submission.
    ///
    /// Precedence: explicit limit, then range max (worst debit to pay), then
    /// range min (minimum credit to receive).
    pub fn effective_limit_price(&self) -> Option<Decimal> {
        self.limit_price.or(self.limit_max).or(self.limit_min)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResultStatus {
    #[serde(rename = "FILLED")]
    Filled,
    #[serde(rename = "SUBMITTED")]
    Submitted,
    #[serde(rename = "REJECTED")]
    Rejected,
    #[serde(rename = "SIMULATED")]
    Simulated,
    #[serde(rename = "ERROR")]
    Error,
}

impl ResultStatus {
    /// SUBMITTED and FILLED claim a broker accepted the order, so they must
    /// carry a broker order id.
    pub fn requires_order_id(&self) -> bool {
        matches!(self, ResultStatus::Submitted | ResultStatus::Filled)
    }
}

/// Outcome of attempting to execute one TradeIntent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub intent_id: Uuid,
    pub status: ResultStatus,

    pub broker: String,
    pub order_id: Option<String>,

    pub message: Option<String>,

    pub fill_price: Option<Decimal>,
    pub filled_quantity: Option<u32>,

    pub submitted_at: DateTime<Utc>,
    pub filled_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub submitted_payload: Option<serde_json::Value>,
}

impl ExecutionResult {
    pub fn rejected(intent_id: Uuid, broker: &str, message: impl Into<String>) -> Self {
        Self {
            intent_id,
            status: ResultStatus::Rejected,
            broker: broker.to_string(),
            order_id: None,
            message: Some(message.into()),
            fill_price: None,
            filled_quantity: None,
            submitted_at: Utc::now(),
            filled_at: None,
            submitted_payload: None,
        }
    }

    pub fn error(intent_id: Uuid, broker: &str, message: impl Into<String>) -> Self {
        Self {
            status: ResultStatus::Error,
            ..Self::rejected(intent_id, broker, message)
        }
    }

    pub fn is_executed(&self) -> bool {
        matches!(
            self.status,
            ResultStatus::Filled | ResultStatus::Submitted | ResultStatus::Simulated
        )
    }

    /// False exactly when the status claims broker acceptance without an
    /// order id. Violations are reported, never silently corrected.
    pub fn order_id_consistent(&self) -> bool {
        if self.status.requires_order_id() {
            self.order_id.as_deref().is_some_and(|id| !id.is_empty())
        } else {
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn stock_intent() -> TradeIntent {
        TradeIntent {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            execution_mode: ExecutionMode::Paper,
            instrument: InstrumentKind::Stock,
            underlying: "SPY".to_string(),
            action: TradeAction::BuyToOpen,
            order_type: OrderType::Market,
            limit_price: None,
            limit_min: None,
            limit_max: None,
            stop_price: None,
            quantity: 10,
            risk_pct: None,
            legs: vec![],
            context: SignalContext::Entry {
                source_signal_id: "sig-1".to_string(),
            },
            raw_signal: None,
            metadata: None,
        }
    }

    #[test]
    fn effective_limit_price_prefers_explicit_limit() {
        let mut intent = stock_intent();
        intent.limit_price = Some(dec!(1.25));
        intent.limit_min = Some(dec!(1.00));
        intent.limit_max = Some(dec!(1.50));
        assert_eq!(intent.effective_limit_price(), Some(dec!(1.25)));
    }

    #[test]
    fn effective_limit_price_falls_back_max_then_min() {
        let mut intent = stock_intent();
        intent.limit_min = Some(dec!(1.00));
        intent.limit_max = Some(dec!(1.50));
        assert_eq!(intent.effective_limit_price(), Some(dec!(1.50)));

        intent.limit_max = None;
        assert_eq!(intent.effective_limit_price(), Some(dec!(1.00)));

        intent.limit_min = None;
        assert_eq!(intent.effective_limit_price(), None);
    }

    #[test]
    fn submitted_without_order_id_is_inconsistent() {
        let intent = stock_intent();
        let mut result = ExecutionResult::rejected(intent.id, "broker", "x");
        result.status = ResultStatus::Submitted;
        assert!(!result.order_id_consistent());

        result.order_id = Some("ord-1".to_string());
        assert!(result.order_id_consistent());
    }

    #[test]
    fn simulated_does_not_require_order_id() {
        let intent = stock_intent();
        let mut result = ExecutionResult::rejected(intent.id, "paper", "x");
        result.status = ResultStatus::Simulated;
        assert!(result.order_id_consistent());
    }
}
