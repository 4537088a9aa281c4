pub mod broker;
pub mod historical;
pub mod paper;

use async_trait::async_trait;
use thiserror::Error;

use crate::model::{ExecutionResult, OrderType, TradeIntent};

#[derive(Error, Debug, PartialEq)]
pub enum ValidationError {
    #[error("underlying symbol is required")]
    MissingUnderlying,
    #[error("quantity must be positive")]
    NonPositiveQuantity,
    #[error("leg {0} quantity must be positive")]
    NonPositiveLegQuantity(usize),
    #[error("limit_price required for {0:?} orders")]
    MissingLimitPrice(OrderType),
    #[error("stop_price required for {0:?} orders")]
    MissingStopPrice(OrderType),
}

/// Shared pre-submission validation. Every executor calls this first and
/// returns REJECTED without side effects on failure.
pub fn validate_intent(intent: &TradeIntent) -> Result<(), ValidationError> {
    if intent.underlying.trim().is_empty() {
        return Err(ValidationError::MissingUnderlying);
    }
    if intent.quantity == 0 {
        return Err(ValidationError::NonPositiveQuantity);
    }
    for (i, leg) in intent.legs.iter().enumerate() {
        if leg.quantity == 0 {
            return Err(ValidationError::NonPositiveLegQuantity(i + 1));
        }
    }
    if intent.order_type.requires_limit_price() && intent.effective_limit_price().is_none() {
        return Err(ValidationError::MissingLimitPrice(intent.order_type));
    }
    if intent.order_type.requires_stop_price() && intent.stop_price.is_none() {
        return Err(ValidationError::MissingStopPrice(intent.order_type));
    }
    Ok(())
}

/// Snapshot of what was (or would be) sent to a broker, for audit trails.
pub fn submitted_payload(intent: &TradeIntent) -> serde_json::Value {
    serde_json::json!({
        "intent_id": intent.id,
        "underlying": intent.underlying,
        "action": intent.action,
        "quantity": intent.quantity,
        "order_type": intent.order_type,
        "limit_price": intent.effective_limit_price(),
        "instrument": intent.instrument,
        "execution_mode": intent.execution_mode,
        "legs": intent.legs,
    })
}

/// A closed set of execution backends: paper simulation, the live broker,
/// and historical replay.
#[async_trait]
pub trait Executor: Send + Sync {
    fn broker_name(&self) -> &str;

    async fn execute(&self, intent: &TradeIntent) -> ExecutionResult;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        ExecutionMode, InstrumentKind, SignalContext, TradeAction,
    };
    use chrono::Utc;
    use uuid::Uuid;

    fn intent(order_type: OrderType) -> TradeIntent {
        TradeIntent {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            execution_mode: ExecutionMode::Paper,
            instrument: InstrumentKind::Stock,
            underlying: "SPY".to_string(),
            action: TradeAction::BuyToOpen,
            order_type,
            limit_price: None,
            limit_min: None,
            limit_max: None,
            stop_price: None,
            quantity: 1,
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
    fn market_order_passes_with_no_prices() {
        assert!(validate_intent(&intent(OrderType::Market)).is_ok());
    }

    #[test]
    fn limit_order_requires_a_price() {
        let mut i = intent(OrderType::Limit);
        assert_eq!(
            validate_intent(&i),
            Err(ValidationError::MissingLimitPrice(OrderType::Limit))
        );
        i.limit_max = Some(rust_decimal_macros::dec!(1.50));
        assert!(validate_intent(&i).is_ok());
    }

    #[test]
    fn stop_limit_requires_both_prices() {
        let mut i = intent(OrderType::StopLimit);
        i.limit_price = Some(rust_decimal_macros::dec!(10));
        assert_eq!(
            validate_intent(&i),
            Err(ValidationError::MissingStopPrice(OrderType::StopLimit))
        );
        i.stop_price = Some(rust_decimal_macros::dec!(9.50));
        assert!(validate_intent(&i).is_ok());
    }

    #[test]
    fn zero_quantity_is_rejected() {
        let mut i = intent(OrderType::Market);
        i.quantity = 0;
        assert_eq!(
            validate_intent(&i),
            Err(ValidationError::NonPositiveQuantity)
        );
    }
}
