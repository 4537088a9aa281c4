use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;
use rust_decimal::Decimal;
use tracing::info;

use crate::context::ExecutionContext;
use crate::executor::{Executor, submitted_payload, validate_intent};
use crate::model::{ExecutionResult, ResultStatus, TradeIntent};

/// Replay executor: same contract as paper, but fills come from a
/// caller-supplied price table, falling back to the intent's limit price,
/// then a fixed default.
pub struct HistoricalExecutor {
    prices: RwLock<HashMap<String, Decimal>>,
    order_counter: AtomicU64,
    ctx: ExecutionContext,
}

impl HistoricalExecutor {
    pub fn new(ctx: ExecutionContext) -> Self {
        Self {
            prices: RwLock::new(HashMap::new()),
            order_counter: AtomicU64::new(0),
            ctx,
        }
    }

    pub fn with_prices(prices: HashMap<String, Decimal>, ctx: ExecutionContext) -> Self {
        Self {
            prices: RwLock::new(prices),
            order_counter: AtomicU64::new(0),
            ctx,
        }
    }

    pub fn set_price(&self, symbol: &str, price: Decimal) {
        self.prices.write().insert(symbol.to_uppercase(), price);
    }

    fn fill_price(&self, intent: &TradeIntent) -> Decimal {
        if let Some(price) = self.prices.read().get(&intent.underlying.to_uppercase()) {
            return *price;
        }
        intent
            .effective_limit_price()
            .unwrap_or_else(|| Decimal::from(100))
    }
}

#[async_trait]
impl Executor for HistoricalExecutor {
    fn broker_name(&self) -> &str {
        "historical"
    }

    async fn execute(&self, intent: &TradeIntent) -> ExecutionResult {
        if let Err(e) = validate_intent(intent) {
            return ExecutionResult::rejected(
                intent.id,
                self.broker_name(),
                format!("Validation failed: {}", e),
            );
        }

        let seq = self.order_counter.fetch_add(1, Ordering::SeqCst) + 1;
        let order_id = format!("HIST-{:06}", seq);
        let fill_price = self.fill_price(intent);
        let now = self.ctx.time.now();

        info!(
            intent_id = %intent.id,
            underlying = %intent.underlying,
            fill_price = %fill_price,
            "Historical replay fill"
        );

        ExecutionResult {
            intent_id: intent.id,
            status: ResultStatus::Simulated,
            broker: self.broker_name().to_string(),
            order_id: Some(order_id),
            message: Some(format!("Historical replay - filled at ${:.2}", fill_price)),
            fill_price: Some(fill_price),
            filled_quantity: Some(intent.quantity),
            submitted_at: now,
            filled_at: Some(now),
            submitted_payload: Some(submitted_payload(intent)),
        }
    }
}
