use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use tracing::{info, warn};

use crate::context::ExecutionContext;
use crate::executor::{Executor, submitted_payload, validate_intent};
use crate::model::{ExecutionResult, InstrumentKind, OrderType, ResultStatus, TradeIntent};
use crate::position_store::{PaperPosition, PositionStatus, PositionStore};

/// Simulated executor. Never touches a broker: fills are assumed at signal
/// time and prices are annotations, never blockers. Owns the paper position
/// lifecycle: entries open positions, resolved exits close them.
pub struct PaperExecutor {
    positions: Arc<PositionStore>,
    ctx: ExecutionContext,
}

impl PaperExecutor {
    pub fn new(positions: Arc<PositionStore>, ctx: ExecutionContext) -> Self {
        Self { positions, ctx }
    }

    /// Fill price annotation. Precedence: explicit limit, range midpoint,
    /// range endpoint, then a per-instrument assumption. Never blocks.
    fn calculate_fill_price(&self, intent: &TradeIntent) -> Decimal {
        if intent.order_type == OrderType::Limit
            && let Some(price) = intent.limit_price
        {
            return price;
        }

        match (intent.limit_min, intent.limit_max) {
            (Some(min), Some(max)) if min > Decimal::ZERO && max > Decimal::ZERO => {
                return (min + max) / Decimal::from(2);
            }
            (_, Some(max)) if max > Decimal::ZERO => return max,
            (Some(min), _) if min > Decimal::ZERO => return min,
            _ => {}
        }

        match intent.instrument {
            InstrumentKind::Stock => Decimal::from(100),
            InstrumentKind::Spread => Decimal::new(150, 2),
            _ => Decimal::new(250, 2),
        }
    }

    fn open_position(&self, intent: &TradeIntent, fill_price: Decimal) -> Option<PaperPosition> {
        let open_intent = serde_json::json!({
            "id": intent.id,
            "action": intent.action,
            "order_type": intent.order_type,
            "limit_price": intent.limit_price,
            "fill_price": fill_price,
            "legs": intent.legs,
        });

        let position = PaperPosition {
            position_id: self.ctx.id.new_id(),
            status: PositionStatus::Open,
            opened_at: self.ctx.time.now(),
            closed_at: None,
            source_signal_id: intent.context.source_signal_id().to_string(),
            underlying: intent.underlying.clone(),
            instrument: intent.instrument,
            legs: intent.legs.clone(),
            quantity: intent.quantity,
            open_intent,
            close_intent: None,
        };

        match self.positions.append_open(position.clone()) {
            Ok(()) => Some(position),
            Err(e) => {
                warn!("Could not record open position: {}", e);
                None
            }
        }
    }

    fn close_position(&self, intent: &TradeIntent, fill_price: Decimal) -> bool {
        let Some(position_id) = intent.context.matched_position_id() else {
            return false;
        };

        let close_intent = serde_json::json!({
            "id": intent.id,
            "action": intent.action,
            "order_type": intent.order_type,
            "limit_price": intent.limit_price,
            "fill_price": fill_price,
            "legs": intent.legs,
        });

        match self.positions.mark_closed(position_id, close_intent) {
            Ok(closed) => closed,
            Err(e) => {
                warn!("Could not close position: {}", e);
                false
            }
        }
    }
}

#[async_trait]
impl Executor for PaperExecutor {
    fn broker_name(&self) -> &str {
        "paper"
    }

    async fn execute(&self, intent: &TradeIntent) -> ExecutionResult {
        if let Err(e) = validate_intent(intent) {
            return ExecutionResult::rejected(
                intent.id,
                self.broker_name(),
                format!("Validation failed: {}", e),
            );
        }

        let fill_time = self.ctx.time.now();
        let fill_price = self.calculate_fill_price(intent);
        let order_id = format!("paper-{}", self.ctx.id.new_id().simple());

        let mut message = format!(
            "Simulated fill at signal time: {:?} {}x {} @ ${:.2} (assumed)",
            intent.action, intent.quantity, intent.underlying, fill_price
        );

        if intent.context.is_exit() || intent.action.is_closing() {
            if self.close_position(intent, fill_price) {
                message.push_str(" [position closed]");
            }
        } else if let Some(position) = self.open_position(intent, fill_price) {
            message.push_str(&format!(" [position {}]", position.position_id));
        }

        info!(
            intent_id = %intent.id,
            underlying = %intent.underlying,
            fill_price = %fill_price,
            "📄 Paper fill"
        );

        ExecutionResult {
            intent_id: intent.id,
            status: ResultStatus::Simulated,
            broker: self.broker_name().to_string(),
            order_id: Some(order_id),
            message: Some(message),
            fill_price: Some(fill_price),
            filled_quantity: Some(intent.quantity),
            submitted_at: fill_time,
            filled_at: Some(fill_time),
            submitted_payload: Some(submitted_payload(intent)),
        }
    }
}
