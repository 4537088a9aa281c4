use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{error, info, warn};

use crate::broker_client::BrokerClient;
use crate::config::SafetyFlags;
use crate::context::ExecutionContext;
use crate::executor::broker::LiveBrokerExecutor;
use crate::executor::historical::HistoricalExecutor;
use crate::executor::paper::PaperExecutor;
use crate::executor::Executor;
use crate::metrics;
use crate::model::{ExecutionMode, ExecutionResult, ResultStatus, TradeIntent};
use crate::position_store::PositionStore;

/// Selects an executor for an intent and normalizes the outcome.
///
/// Routing precedence: dry-run short-circuits everything to the paper
/// executor; a single-broker-only override sends everything to the live
/// broker (its sandbox in practice); otherwise the intent's mode maps
/// directly, with LIVE downgraded to PAPER while the live-trading flag is
/// off. Executors are built lazily and cached for the process lifetime.
pub struct ExecutionRouter {
    executors: RwLock<HashMap<ExecutionMode, Arc<dyn Executor>>>,
    positions: Arc<PositionStore>,
    broker: Arc<dyn BrokerClient>,
    ctx: ExecutionContext,
}

impl ExecutionRouter {
    pub fn new(
        positions: Arc<PositionStore>,
        broker: Arc<dyn BrokerClient>,
        ctx: ExecutionContext,
    ) -> Self {
        Self {
            executors: RwLock::new(HashMap::new()),
            positions,
            broker,
            ctx,
        }
    }

    fn executor_for(&self, mode: ExecutionMode) -> Arc<dyn Executor> {
        if let Some(executor) = self.executors.read().get(&mode) {
            return executor.clone();
        }

        let executor: Arc<dyn Executor> = match mode {
            ExecutionMode::Paper => {
                Arc::new(PaperExecutor::new(self.positions.clone(), self.ctx.clone()))
            }
            ExecutionMode::Live => Arc::new(LiveBrokerExecutor::new(self.broker.clone())),
            ExecutionMode::Historical => Arc::new(HistoricalExecutor::new(self.ctx.clone())),
        };

        let mut map = self.executors.write();
        map.entry(mode).or_insert_with(|| executor).clone()
    }

    /// Resolve the executor for this intent under the current flags.
    pub fn route(&self, intent: &TradeIntent, flags: &SafetyFlags) -> (ExecutionMode, Arc<dyn Executor>) {
        if flags.dry_run {
            return (ExecutionMode::Paper, self.executor_for(ExecutionMode::Paper));
        }

        if flags.single_broker_only {
            return (ExecutionMode::Live, self.executor_for(ExecutionMode::Live));
        }

        let mode = match intent.execution_mode {
            ExecutionMode::Live if !flags.live_trading => {
                warn!(
                    intent_id = %intent.id,
                    "LIVE requested but LIVE_TRADING is disabled; downgrading to PAPER"
                );
                ExecutionMode::Paper
            }
            mode => mode,
        };

        (mode, self.executor_for(mode))
    }

    pub async fn execute(&self, intent: &TradeIntent, flags: &SafetyFlags) -> ExecutionResult {
        let (mode, executor) = self.route(intent, flags);

        info!(
            intent_id = %intent.id,
            broker = %executor.broker_name(),
            mode = ?mode,
            "🚀 Routing {:?} {} {} ({:?})",
            intent.action,
            intent.quantity,
            intent.underlying,
            intent.instrument
        );

        let result = executor.execute(intent).await;

        match result.status {
            ResultStatus::Submitted | ResultStatus::Filled => {
                info!(
                    intent_id = %intent.id,
                    order_id = ?result.order_id,
                    broker = %result.broker,
                    "Execution accepted by broker"
                );
            }
            ResultStatus::Simulated => {
                info!(
                    intent_id = %intent.id,
                    broker = %result.broker,
                    "Execution simulated"
                );
            }
            ResultStatus::Rejected => {
                warn!(
                    intent_id = %intent.id,
                    broker = %result.broker,
                    "Execution rejected: {:?}",
                    result.message
                );
            }
            ResultStatus::Error => {
                metrics::inc_broker_errors();
                error!(
                    intent_id = %intent.id,
                    broker = %result.broker,
                    "Execution failed: {:?}",
                    result.message
                );
            }
        }

        if !result.order_id_consistent() {
            metrics::inc_consistency_errors();
            error!(
                intent_id = %intent.id,
                status = ?result.status,
                broker = %result.broker,
                "CONSISTENCY ERROR: {:?} result without a broker order id",
                result.status
            );
        }

        result
    }
}
