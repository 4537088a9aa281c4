use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info};

use crate::broker_client::{BrokerClient, OptionOrderRequest, OrderAck, StockOrderRequest};
use crate::executor::{Executor, submitted_payload, validate_intent};
use crate::model::{
    ExecutionResult, InstrumentKind, OrderType, ResultStatus, TradeAction, TradeIntent,
};

/// Live executor: translates intents into the broker's order vocabulary and
/// submits through the broker client. Presence of a broker order id is the
/// sole truth of submission success — the SUBMITTED/ERROR split is made
/// structurally here, not by convention downstream.
pub struct LiveBrokerExecutor {
    client: Arc<dyn BrokerClient>,
}

impl LiveBrokerExecutor {
    pub fn new(client: Arc<dyn BrokerClient>) -> Self {
        Self { client }
    }

    fn stock_side(action: TradeAction) -> &'static str {
        match action {
            TradeAction::Buy | TradeAction::BuyToOpen | TradeAction::BuyToClose => "buy",
            TradeAction::Sell | TradeAction::SellToClose => "sell",
            TradeAction::SellToOpen => "sell_short",
        }
    }

    fn option_side(action: TradeAction) -> &'static str {
        match action {
            TradeAction::Buy | TradeAction::BuyToOpen => "buy_to_open",
            TradeAction::BuyToClose => "buy_to_close",
            TradeAction::SellToOpen => "sell_to_open",
            TradeAction::Sell | TradeAction::SellToClose => "sell_to_close",
        }
    }

    fn wire_order_type(order_type: OrderType) -> &'static str {
        match order_type {
            OrderType::Market => "market",
            OrderType::Limit => "limit",
            OrderType::Stop => "stop",
            OrderType::StopLimit => "stop_limit",
        }
    }

    fn result_from_ack(&self, intent: &TradeIntent, ack: OrderAck) -> ExecutionResult {
        let order_id = ack.id.filter(|id| !id.is_empty());
        let status = if order_id.is_some() {
            ResultStatus::Submitted
        } else {
            ResultStatus::Error
        };

        if status == ResultStatus::Submitted {
            info!(
                intent_id = %intent.id,
                order_id = ?order_id,
                broker = %self.client.name(),
                "✅ Order submitted"
            );
        } else {
            error!(
                intent_id = %intent.id,
                broker = %self.client.name(),
                "Broker acknowledged without an order id"
            );
        }

        ExecutionResult {
            intent_id: intent.id,
            status,
            broker: self.client.name().to_string(),
            order_id,
            message: Some(format!("Order status: {}", ack.status)),
            fill_price: None,
            filled_quantity: None,
            submitted_at: chrono::Utc::now(),
            filled_at: None,
            submitted_payload: Some(submitted_payload(intent)),
        }
    }

    async fn execute_stock(&self, intent: &TradeIntent) -> ExecutionResult {
        let request = StockOrderRequest {
            symbol: intent.underlying.clone(),
            side: Self::stock_side(intent.action).to_string(),
            quantity: intent.quantity,
            order_type: Self::wire_order_type(intent.order_type).to_string(),
            limit_price: intent.effective_limit_price(),
            stop_price: intent.stop_price,
        };

        match self.client.place_stock_order(&request).await {
            Ok(ack) => self.result_from_ack(intent, ack),
            Err(e) => {
                error!(intent_id = %intent.id, "❌ Broker error: {}", e);
                ExecutionResult::error(intent.id, self.client.name(), e.to_string())
            }
        }
    }

    async fn execute_option(&self, intent: &TradeIntent) -> ExecutionResult {
        let Some(leg) = intent.legs.first() else {
            return ExecutionResult::rejected(
                intent.id,
                self.client.name(),
                "Option order requires at least one leg",
            );
        };

        if intent.order_type.requires_stop_price() {
            return ExecutionResult::rejected(
                intent.id,
                self.client.name(),
                format!("{:?} orders not supported for options", intent.order_type),
            );
        }

        let request = OptionOrderRequest {
            underlying: intent.underlying.clone(),
            expiration: leg.expiration,
            strike: leg.strike,
            option_type: leg.option_type,
            side: Self::option_side(intent.action).to_string(),
            quantity: intent.quantity,
            order_type: Self::wire_order_type(intent.order_type).to_string(),
            limit_price: intent.effective_limit_price(),
        };

        match self.client.place_option_order(&request).await {
            Ok(ack) => self.result_from_ack(intent, ack),
            Err(e) => {
                error!(intent_id = %intent.id, "❌ Broker error: {}", e);
                ExecutionResult::error(intent.id, self.client.name(), e.to_string())
            }
        }
    }
}

#[async_trait]
impl Executor for LiveBrokerExecutor {
    fn broker_name(&self) -> &str {
        self.client.name()
    }

    async fn execute(&self, intent: &TradeIntent) -> ExecutionResult {
        if let Err(e) = validate_intent(intent) {
            return ExecutionResult::rejected(
                intent.id,
                self.client.name(),
                format!("Validation failed: {}", e),
            );
        }

        match intent.instrument {
            InstrumentKind::Stock => self.execute_stock(intent).await,
            InstrumentKind::Option | InstrumentKind::IndexOption => {
                if intent.legs.len() > 1 {
                    ExecutionResult::rejected(
                        intent.id,
                        self.client.name(),
                        "Multi-leg submission not supported; single-leg orders only",
                    )
                } else {
                    self.execute_option(intent).await
                }
            }
            InstrumentKind::Spread => ExecutionResult::rejected(
                intent.id,
                self.client.name(),
                "Multi-leg submission not supported; single-leg orders only",
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker_client::{BrokerError, MarketClock};
    use crate::model::{ExecutionMode, LegSide, OptionLeg, OptionType, SignalContext};
    use chrono::Utc;
    use parking_lot::Mutex;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    /// Scripted broker double: returns the configured ack or error and
    /// records the side it was asked to submit.
    struct ScriptedBroker {
        ack: Result<OrderAck, &'static str>,
        seen_sides: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl BrokerClient for ScriptedBroker {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn place_stock_order(
            &self,
            order: &StockOrderRequest,
        ) -> Result<OrderAck, BrokerError> {
            self.seen_sides.lock().push(order.side.clone());
            self.ack
                .clone()
                .map_err(|m| BrokerError::Api { status: 400, message: m.to_string() })
        }

        async fn place_option_order(
            &self,
            order: &OptionOrderRequest,
        ) -> Result<OrderAck, BrokerError> {
            self.seen_sides.lock().push(order.side.clone());
            self.ack
                .clone()
                .map_err(|m| BrokerError::Api { status: 400, message: m.to_string() })
        }

        async fn market_clock(&self) -> Result<MarketClock, BrokerError> {
            Ok(MarketClock { is_open: true, next_open: None, next_close: None })
        }
    }

    fn option_intent(action: TradeAction) -> TradeIntent {
        TradeIntent {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            execution_mode: ExecutionMode::Live,
            instrument: InstrumentKind::Option,
            underlying: "SPY".to_string(),
            action,
            order_type: OrderType::Limit,
            limit_price: Some(dec!(2.10)),
            limit_min: None,
            limit_max: None,
            stop_price: None,
            quantity: 1,
            risk_pct: None,
            legs: vec![OptionLeg {
                side: LegSide::Buy,
                quantity: 1,
                strike: dec!(450),
                option_type: OptionType::Call,
                expiration: Utc::now().date_naive() + chrono::Duration::days(14),
            }],
            context: SignalContext::Entry {
                source_signal_id: "sig-1".to_string(),
            },
            raw_signal: None,
            metadata: None,
        }
    }

    #[tokio::test]
    async fn ack_with_id_is_submitted() {
        let broker = Arc::new(ScriptedBroker {
            ack: Ok(OrderAck { id: Some("ord-7".into()), status: "ok".into() }),
            seen_sides: Mutex::new(vec![]),
        });
        let executor = LiveBrokerExecutor::new(broker.clone());

        let result = executor.execute(&option_intent(TradeAction::BuyToOpen)).await;
        assert_eq!(result.status, ResultStatus::Submitted);
        assert_eq!(result.order_id.as_deref(), Some("ord-7"));
        assert!(result.order_id_consistent());
        assert_eq!(broker.seen_sides.lock().as_slice(), ["buy_to_open"]);
    }

    #[tokio::test]
    async fn ack_without_id_is_error_not_submitted() {
        let broker = Arc::new(ScriptedBroker {
            ack: Ok(OrderAck { id: None, status: "pending".into() }),
            seen_sides: Mutex::new(vec![]),
        });
        let executor = LiveBrokerExecutor::new(broker);

        let result = executor.execute(&option_intent(TradeAction::BuyToOpen)).await;
        assert_eq!(result.status, ResultStatus::Error);
        assert!(result.order_id_consistent());
    }

    #[tokio::test]
    async fn broker_error_maps_to_error_result() {
        let broker = Arc::new(ScriptedBroker {
            ack: Err("insufficient buying power"),
            seen_sides: Mutex::new(vec![]),
        });
        let executor = LiveBrokerExecutor::new(broker);

        let result = executor.execute(&option_intent(TradeAction::BuyToOpen)).await;
        assert_eq!(result.status, ResultStatus::Error);
        assert!(result.message.unwrap().contains("insufficient buying power"));
    }

    #[tokio::test]
    async fn spreads_are_rejected_before_submission() {
        let broker = Arc::new(ScriptedBroker {
            ack: Ok(OrderAck { id: Some("ord-1".into()), status: "ok".into() }),
            seen_sides: Mutex::new(vec![]),
        });
        let executor = LiveBrokerExecutor::new(broker.clone());

        let mut intent = option_intent(TradeAction::BuyToOpen);
        intent.instrument = InstrumentKind::Spread;
        let result = executor.execute(&intent).await;
        assert_eq!(result.status, ResultStatus::Rejected);
        assert!(broker.seen_sides.lock().is_empty());
    }

    #[tokio::test]
    async fn close_actions_map_to_closing_sides() {
        let broker = Arc::new(ScriptedBroker {
            ack: Ok(OrderAck { id: Some("ord-2".into()), status: "ok".into() }),
            seen_sides: Mutex::new(vec![]),
        });
        let executor = LiveBrokerExecutor::new(broker.clone());

        executor.execute(&option_intent(TradeAction::BuyToClose)).await;
        executor.execute(&option_intent(TradeAction::SellToClose)).await;
        assert_eq!(
            broker.seen_sides.lock().as_slice(),
            ["buy_to_close", "sell_to_close"]
        );
    }
}
