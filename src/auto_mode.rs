use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, NaiveDate, Utc};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::{SafetyFlags, SettingsStore};
use crate::context::ExecutionContext;
use crate::dedupe_store::{DedupeRecord, DedupeStore};
use crate::intent_builder::{self, IntentError};
use crate::jsonl::{self, StoreError};
use crate::market_window::{SessionOracle, WindowStatus};
use crate::metrics;
use crate::mode_manager::{self, EffectiveModeDecision};
use crate::model::{ExecutionResult, ResultStatus, TradeIntent};
use crate::plan_log::{ExecutionPlan, PlanLog};
use crate::position_store::PositionStore;
use crate::preflight;
use crate::router::ExecutionRouter;
use crate::signal::{Classification, SignalFeed, SignalRecord, SignalType};
use crate::summary;

/// Rolling counters, persisted as one JSON document. The controller is the
/// only writer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Counters {
    pub trades_today: u32,
    pub trades_this_hour: u32,
    pub notional_today: Decimal,
    pub last_trade_date: Option<NaiveDate>,
    pub last_trade_hour: Option<String>,
    pub last_tick_time: Option<DateTime<Utc>>,
    pub last_action: Option<String>,
    pub last_summary_date: Option<NaiveDate>,
    /// Last calendar day on which a tick saw the market open; drives the
    /// market-close summary transition.
    pub market_open_seen: Option<NaiveDate>,
}

impl Default for Counters {
    fn default() -> Self {
        Self {
            trades_today: 0,
            trades_this_hour: 0,
            notional_today: Decimal::ZERO,
            last_trade_date: None,
            last_trade_hour: None,
            last_tick_time: None,
            last_action: None,
            last_summary_date: None,
            market_open_seen: None,
        }
    }
}

fn hour_bucket(now: DateTime<Utc>) -> String {
    now.format("%Y-%m-%d-%H").to_string()
}

impl Counters {
    /// Zero the day/hour buckets when their key rolls over.
    fn reset_if_rolled_over(&mut self, now: DateTime<Utc>) {
        let today = now.date_naive();
        if self.last_trade_date != Some(today) {
            self.trades_today = 0;
            self.notional_today = Decimal::ZERO;
            self.last_trade_date = Some(today);
        }

        let bucket = hour_bucket(now);
        if self.last_trade_hour.as_deref() != Some(bucket.as_str()) {
            self.trades_this_hour = 0;
            self.last_trade_hour = Some(bucket);
        }
    }
}

/// Counters document with coarse read-modify-write persistence. Acceptable
/// for the single-writer controller.
pub struct CountersStore {
    path: PathBuf,
    state: Mutex<Counters>,
}

impl CountersStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let counters = jsonl::read_document(&path)?.unwrap_or_default();
        Ok(Self {
            path,
            state: Mutex::new(counters),
        })
    }

    pub fn snapshot(&self) -> Counters {
        self.state.lock().clone()
    }

    pub fn update(&self, apply: impl FnOnce(&mut Counters)) -> Counters {
        let mut state = self.state.lock();
        apply(&mut state);
        if let Err(e) = jsonl::write_document(&self.path, &*state) {
            warn!("Could not persist counters: {}", e);
        }
        state.clone()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TickOutcome {
    #[serde(rename = "skip")]
    Skip,
    #[serde(rename = "pause")]
    Pause,
    #[serde(rename = "limit")]
    Limit,
    #[serde(rename = "blocked")]
    Blocked,
    #[serde(rename = "idle")]
    Idle,
    #[serde(rename = "executed")]
    Executed,
    #[serde(rename = "failed")]
    Failed,
    #[serde(rename = "error")]
    Error,
}

impl TickOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            TickOutcome::Skip => "skip",
            TickOutcome::Pause => "pause",
            TickOutcome::Limit => "limit",
            TickOutcome::Blocked => "blocked",
            TickOutcome::Idle => "idle",
            TickOutcome::Executed => "executed",
            TickOutcome::Failed => "failed",
            TickOutcome::Error => "error",
        }
    }
}

/// What one tick decided, with enough context for audit.
#[derive(Debug, Clone, Serialize)]
pub struct TickReport {
    pub outcome: TickOutcome,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ticker: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signal_id: Option<String>,
}

impl TickReport {
    fn bare(outcome: TickOutcome, reason: impl Into<String>) -> Self {
        Self {
            outcome,
            reason: reason.into(),
            ticker: None,
            signal_id: None,
        }
    }

    fn for_signal(
        outcome: TickOutcome,
        reason: impl Into<String>,
        record: &SignalRecord,
    ) -> Self {
        Self {
            outcome,
            reason: reason.into(),
            ticker: Some(record.ticker.clone()),
            signal_id: Some(record.signal_id.clone()),
        }
    }
}

/// Read-only status snapshot for the control surface.
#[derive(Debug, Clone, Serialize)]
pub struct AutoStatus {
    pub enabled: bool,
    pub worker_alive: bool,
    pub window: WindowStatus,
    pub trades_today: u32,
    pub trades_this_hour: u32,
    pub notional_today: Decimal,
    pub max_daily: u32,
    pub max_hourly: u32,
    pub max_notional_daily: Decimal,
    pub poll_seconds: u64,
    pub last_tick_time: Option<DateTime<Utc>>,
    pub last_action: Option<String>,
}

struct Worker {
    stop_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Timer-driven control loop: each tick re-validates the global safety
/// invariants, enforces the trade/notional ceilings, selects one executable
/// signal and drives it through intent -> preflight -> router -> dedupe ->
/// position update. Fail-closed: any safety invariant failure disables the
/// controller.
pub struct AutoModeController {
    enabled: AtomicBool,
    feed: Arc<dyn SignalFeed>,
    dedupe: Arc<DedupeStore>,
    positions: Arc<PositionStore>,
    router: Arc<ExecutionRouter>,
    plan_log: Arc<PlanLog>,
    counters: CountersStore,
    oracle: Arc<dyn SessionOracle>,
    settings: Arc<SettingsStore>,
    ctx: ExecutionContext,
    worker: Mutex<Option<Worker>>,
}

impl AutoModeController {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        feed: Arc<dyn SignalFeed>,
        dedupe: Arc<DedupeStore>,
        positions: Arc<PositionStore>,
        router: Arc<ExecutionRouter>,
        plan_log: Arc<PlanLog>,
        counters: CountersStore,
        oracle: Arc<dyn SessionOracle>,
        settings: Arc<SettingsStore>,
        ctx: ExecutionContext,
    ) -> Self {
        Self {
            enabled: AtomicBool::new(false),
            feed,
            dedupe,
            positions,
            router,
            plan_log,
            counters,
            oracle,
            settings,
            ctx,
            worker: Mutex::new(None),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Enable the controller and make sure the worker task is running.
    pub fn enable(self: &Arc<Self>) {
        self.enabled.store(true, Ordering::SeqCst);
        metrics::set_controller_enabled(true);
        info!("🟢 Auto mode enabled");
        self.spawn_worker_if_needed();
    }

    /// Disable the controller and stop the worker. The worker drains its
    /// current cycle and emits a final summary before exiting.
    pub async fn disable(&self) {
        self.enabled.store(false, Ordering::SeqCst);
        metrics::set_controller_enabled(false);
        info!("🔴 Auto mode disabled");

        let worker = self.worker.lock().take();
        if let Some(worker) = worker {
            let _ = worker.stop_tx.send(true);
            if let Err(e) = worker.handle.await {
                warn!("Auto worker join error: {}", e);
            }
        }
    }

    pub fn worker_alive(&self) -> bool {
        self.worker
            .lock()
            .as_ref()
            .is_some_and(|w| !w.handle.is_finished())
    }

    fn spawn_worker_if_needed(self: &Arc<Self>) {
        let mut slot = self.worker.lock();
        if slot.as_ref().is_some_and(|w| !w.handle.is_finished()) {
            return;
        }

        let (stop_tx, mut stop_rx) = watch::channel(false);
        let controller = self.clone();

        let handle = tokio::spawn(async move {
            info!("Auto worker started");
            loop {
                let poll_seconds = controller.settings.current().auto_poll_seconds.max(1);
                tokio::select! {
                    changed = stop_rx.changed() => {
                        if changed.is_err() || *stop_rx.borrow() {
                            break;
                        }
                    }
                    _ = tokio::time::sleep(std::time::Duration::from_secs(poll_seconds)) => {
                        let flags = SafetyFlags::snapshot();
                        if controller.is_enabled() || flags.auto_mode_enabled {
                            let report = controller.tick().await;
                            debug!(outcome = ?report.outcome, reason = %report.reason, "Tick complete");
                        }
                    }
                }
            }

            // Final best-effort summary before the worker exits.
            let today = controller.ctx.time.now().date_naive();
            let s = summary::build_daily_summary(
                today,
                &controller.plan_log,
                &controller.positions,
            );
            summary::emit_daily_summary(&s);
            info!("Auto worker stopped");
        });

        *slot = Some(Worker { stop_tx, handle });
    }

    /// The fail-closed invariants re-validated on every tick. Automated
    /// execution runs paper-only: dry-run on, live trading off, everything
    /// funneled through the single sandbox broker, kill switch clear.
    fn check_safety(flags: &SafetyFlags) -> Result<(), String> {
        if flags.kill_switch {
            return Err("kill switch is active".to_string());
        }
        if !flags.dry_run {
            return Err("dry-run flag is off".to_string());
        }
        if flags.live_trading {
            return Err("live-trading flag is on".to_string());
        }
        if !flags.single_broker_only {
            return Err("single-broker-only mode is not active".to_string());
        }
        Ok(())
    }

    fn record_action(&self, now: DateTime<Utc>, action: String) {
        self.counters.update(|c| {
            c.last_tick_time = Some(now);
            c.last_action = Some(action);
        });
    }

    fn disable_on_safety_failure(&self, reason: &str) {
        self.enabled.store(false, Ordering::SeqCst);
        metrics::set_controller_enabled(false);
        metrics::inc_safety_disables();
        error!(
            "🚨 SAFETY INVARIANT FAILED: {} - auto mode disabled (fail-closed)",
            reason
        );
    }

    /// Emit the daily summary exactly once per calendar day, on the first
    /// tick after the market-close (or day-boundary) transition.
    fn maybe_emit_summary(&self, now: DateTime<Utc>, window: &WindowStatus) {
        let today = now.date_naive();
        let counters = self.counters.snapshot();

        // Day boundary with a missed close: cover the previous session
        // before anything else, open or not.
        if let Some(seen) = counters.market_open_seen
            && seen < today
            && counters.last_summary_date != Some(seen)
        {
            let s = summary::build_daily_summary(seen, &self.plan_log, &self.positions);
            summary::emit_daily_summary(&s);
            self.counters.update(|c| c.last_summary_date = Some(seen));
        }

        if window.is_market_open {
            if counters.market_open_seen != Some(today) {
                self.counters.update(|c| c.market_open_seen = Some(today));
            }
            return;
        }

        // Close transition for today.
        if counters.market_open_seen == Some(today)
            && counters.last_summary_date != Some(today)
        {
            let s = summary::build_daily_summary(today, &self.plan_log, &self.positions);
            summary::emit_daily_summary(&s);
            self.counters.update(|c| c.last_summary_date = Some(today));
        }
    }

    /// One pass of the control loop.
    pub async fn tick(&self) -> TickReport {
        metrics::inc_auto_ticks();
        let now = self.ctx.time.now();
        self.counters.update(|c| c.reset_if_rolled_over(now));

        let flags = SafetyFlags::snapshot();

        if !self.is_enabled() && !flags.auto_mode_enabled {
            self.record_action(now, "SKIP: Auto mode disabled".to_string());
            return TickReport::bare(TickOutcome::Skip, "Auto mode disabled");
        }

        if let Err(reason) = Self::check_safety(&flags) {
            self.disable_on_safety_failure(&reason);
            self.record_action(now, format!("DISABLED: {}", reason));
            return TickReport::bare(TickOutcome::Error, reason);
        }

        let window = self.oracle.check().await;
        self.maybe_emit_summary(now, &window);

        if !window.within_window {
            self.record_action(now, format!("PAUSE: {}", window.reason));
            return TickReport::bare(TickOutcome::Pause, window.reason);
        }

        if let Some(report) = self.check_rate_limits(now) {
            return report;
        }

        let Some(selected) = self.select_signal() else {
            self.record_action(now, "IDLE: No executable signals".to_string());
            return TickReport::bare(TickOutcome::Idle, "No executable signals");
        };

        // Independent checkpoint ahead of preflight's dedupe check.
        if self.dedupe.is_executed(&selected.signal_id) {
            metrics::inc_dedupe_hits();
            self.record_action(
                now,
                format!("SKIP: {} already executed (dedupe)", selected.ticker),
            );
            return TickReport::for_signal(
                TickOutcome::Skip,
                "Already executed (dedupe)",
                &selected,
            );
        }

        let settings = self.settings.current();
        let decision = mode_manager::effective_mode(settings.requested_mode, &flags, true);
        let report = self
            .execute_signal(&selected, &decision, &flags, true)
            .await;
        self.record_action(
            now,
            format!(
                "{}: {} - {}",
                report.outcome.label().to_uppercase(),
                selected.ticker,
                report.reason
            ),
        );
        report
    }

    fn check_rate_limits(&self, now: DateTime<Utc>) -> Option<TickReport> {
        let settings = self.settings.current();
        let counters = self.counters.snapshot();

        let max_daily = settings.auto_max_trades_per_day;
        let max_hourly = settings
            .auto_max_trades_per_hour
            .min(settings.risk_mode.caps().max_trades_per_hour);
        let max_notional = settings.auto_max_notional_per_day;

        let reason = if counters.trades_today >= max_daily {
            Some(format!("Daily trade limit reached ({})", max_daily))
        } else if counters.trades_this_hour >= max_hourly {
            Some(format!("Hourly trade limit reached ({})", max_hourly))
        } else if counters.notional_today >= max_notional {
            Some(format!(
                "Daily notional limit reached (${})",
                max_notional
            ))
        } else {
            None
        };

        let reason = reason?;
        metrics::inc_rate_limited_ticks();
        self.record_action(now, format!("LIMIT: {}", reason));
        Some(TickReport::bare(TickOutcome::Limit, reason))
    }

    /// Newest unexecuted ENTRY first; failing that, the newest EXIT that
    /// either carries complete leg detail or can resolve to an open
    /// position.
    fn select_signal(&self) -> Option<SignalRecord> {
        let signals = match self.feed.recent(50) {
            Ok(signals) => signals,
            Err(e) => {
                warn!("Signal feed unavailable: {}", e);
                return None;
            }
        };

        let mut exit_candidate: Option<SignalRecord> = None;

        for record in signals {
            if record.classification != Classification::Signal {
                continue;
            }
            if self.dedupe.is_executed(&record.signal_id) {
                continue;
            }

            match record.effective_signal_type() {
                SignalType::Entry => return Some(record),
                SignalType::Exit if exit_candidate.is_none() => {
                    let resolvable = record.parsed.as_ref().is_some_and(|p| {
                        p.has_complete_leg_details()
                            || self.positions.find_open_for_exit(p).is_some()
                    });
                    if resolvable {
                        exit_candidate = Some(record);
                    }
                }
                _ => {}
            }
        }

        exit_candidate
    }

    fn build_intent(
        &self,
        record: &SignalRecord,
        decision: &EffectiveModeDecision,
    ) -> Result<TradeIntent, IntentError> {
        let parsed = record.parsed.as_ref().ok_or(IntentError::MissingTicker)?;
        let mode = decision.effective.to_execution_mode();
        let signal_type = record.effective_signal_type();

        if signal_type == SignalType::Exit && !parsed.has_complete_leg_details() {
            let (intent, _matched) = intent_builder::resolve_exit_intent(
                parsed,
                &record.signal_id,
                mode,
                &self.positions,
                &self.ctx,
            )?;
            Ok(intent)
        } else {
            intent_builder::build_trade_intent(
                parsed,
                &record.signal_id,
                signal_type,
                mode,
                &self.ctx,
            )
        }
    }

    /// Shared execution pipeline for the automatic loop and manual
    /// approval: build -> preflight -> route/execute -> mark executed ->
    /// counters. Counters are only bumped for the automatic path.
    pub async fn execute_signal(
        &self,
        record: &SignalRecord,
        decision: &EffectiveModeDecision,
        flags: &SafetyFlags,
        bump_counters: bool,
    ) -> TickReport {
        let today = self.ctx.time.now().date_naive();
        let settings = self.settings.current();

        let intent = match self.build_intent(record, decision) {
            Ok(intent) => intent,
            Err(e) => {
                let reason = e.to_string();
                self.append_plan(ExecutionPlan::skipped(
                    &record.signal_id,
                    TickOutcome::Skip.label(),
                    reason.clone(),
                ));
                return TickReport::for_signal(TickOutcome::Skip, reason, record);
            }
        };

        let report = preflight::preflight_check(
            &intent,
            record.parsed.as_ref(),
            decision.effective,
            Some(&record.signal_id),
            &self.dedupe,
            &settings,
            flags,
            today,
        );
        for warning in &report.warnings {
            warn!(signal_id = %record.signal_id, "Preflight warning: {}", warning);
        }
        if !report.ok {
            let reason = report
                .blocked_reason
                .unwrap_or_else(|| "Preflight failed".to_string());
            metrics::inc_blocked_signals();
            self.append_plan(ExecutionPlan::skipped(
                &record.signal_id,
                TickOutcome::Blocked.label(),
                reason.clone(),
            ));
            return TickReport::for_signal(TickOutcome::Blocked, reason, record);
        }

        let result = self.router.execute(&intent, flags).await;

        if result.is_executed() {
            self.commit_execution(record, decision, &intent, &result, bump_counters);
            return TickReport::for_signal(
                TickOutcome::Executed,
                format!("{:?}", result.status),
                record,
            );
        }

        let reason = result
            .message
            .clone()
            .unwrap_or_else(|| format!("{:?}", result.status));
        let outcome = match result.status {
            ResultStatus::Error => TickOutcome::Error,
            _ => TickOutcome::Failed,
        };
        self.append_plan(ExecutionPlan::placed(
            &record.signal_id,
            outcome.label(),
            &intent,
            &result,
        ));
        TickReport::for_signal(outcome, reason, record)
    }

    fn commit_execution(
        &self,
        record: &SignalRecord,
        decision: &EffectiveModeDecision,
        intent: &TradeIntent,
        result: &ExecutionResult,
        bump_counters: bool,
    ) {
        let marked = self.dedupe.mark_if_absent(DedupeRecord {
            signal_id: record.signal_id.clone(),
            executed_at: self.ctx.time.now(),
            execution_mode: decision.effective,
            intent_id: intent.id,
            result_status: result.status,
            underlying: Some(intent.underlying.clone()),
            action: Some(intent.action),
        });
        match marked {
            Ok(true) => {}
            Ok(false) => {
                metrics::inc_dedupe_hits();
                warn!(
                    signal_id = %record.signal_id,
                    "Signal was marked executed concurrently; ledger kept the first record"
                );
            }
            Err(e) => error!(
                signal_id = %record.signal_id,
                "Could not write dedupe record: {}",
                e
            ),
        }

        let notional = result
            .fill_price
            .or_else(|| intent.effective_limit_price())
            .unwrap_or(Decimal::ZERO)
            * Decimal::from(intent.quantity)
            * intent.instrument.multiplier();

        if bump_counters {
            let counters = self.counters.update(|c| {
                c.trades_today += 1;
                c.trades_this_hour += 1;
                c.notional_today += notional;
            });
            use rust_decimal::prelude::ToPrimitive;
            metrics::set_notional_today(counters.notional_today.to_f64().unwrap_or(0.0));
        }

        metrics::inc_executed_trades();
        metrics::set_open_positions(self.positions.open_positions().len() as i64);

        self.append_plan(ExecutionPlan::placed(
            &record.signal_id,
            TickOutcome::Executed.label(),
            intent,
            result,
        ));

        info!(
            signal_id = %record.signal_id,
            intent_id = %intent.id,
            ticker = %intent.underlying,
            status = ?result.status,
            notional = %notional,
            "✅ Signal executed"
        );
    }

    fn append_plan(&self, entry: ExecutionPlan) {
        if let Err(e) = self.plan_log.append(&entry) {
            warn!("Could not append execution plan entry: {}", e);
        }
    }

    pub async fn status(&self) -> AutoStatus {
        let settings = self.settings.current();
        let counters = self.counters.snapshot();
        let window = self.oracle.check().await;

        AutoStatus {
            enabled: self.is_enabled(),
            worker_alive: self.worker_alive(),
            window,
            trades_today: counters.trades_today,
            trades_this_hour: counters.trades_this_hour,
            notional_today: counters.notional_today,
            max_daily: settings.auto_max_trades_per_day,
            max_hourly: settings
                .auto_max_trades_per_hour
                .min(settings.risk_mode.caps().max_trades_per_hour),
            max_notional_daily: settings.auto_max_notional_per_day,
            poll_seconds: settings.auto_poll_seconds,
            last_tick_time: counters.last_tick_time,
            last_action: counters.last_action,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn counters_reset_on_day_rollover() {
        let mut counters = Counters {
            trades_today: 5,
            trades_this_hour: 2,
            notional_today: Decimal::from(1000),
            last_trade_date: Some(NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()),
            last_trade_hour: Some("2026-03-02-15".to_string()),
            ..Counters::default()
        };

        let next_day = Utc.with_ymd_and_hms(2026, 3, 3, 14, 0, 0).unwrap();
        counters.reset_if_rolled_over(next_day);
        assert_eq!(counters.trades_today, 0);
        assert_eq!(counters.trades_this_hour, 0);
        assert_eq!(counters.notional_today, Decimal::ZERO);
    }

    #[test]
    fn counters_reset_hourly_bucket_only() {
        let mut counters = Counters {
            trades_today: 5,
            trades_this_hour: 2,
            notional_today: Decimal::from(1000),
            last_trade_date: Some(NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()),
            last_trade_hour: Some("2026-03-02-15".to_string()),
            ..Counters::default()
        };

        let next_hour = Utc.with_ymd_and_hms(2026, 3, 2, 16, 5, 0).unwrap();
        counters.reset_if_rolled_over(next_hour);
        assert_eq!(counters.trades_today, 5);
        assert_eq!(counters.trades_this_hour, 0);
        assert_eq!(counters.notional_today, Decimal::from(1000));
    }

    #[test]
    fn safety_requires_all_four_invariants() {
        let mut flags = SafetyFlags::paper_defaults();
        assert!(AutoModeController::check_safety(&flags).is_ok());

        flags.kill_switch = true;
        assert_eq!(
            AutoModeController::check_safety(&flags).unwrap_err(),
            "kill switch is active"
        );

        flags = SafetyFlags::paper_defaults();
        flags.dry_run = false;
        assert!(AutoModeController::check_safety(&flags).is_err());

        flags = SafetyFlags::paper_defaults();
        flags.live_trading = true;
        assert!(AutoModeController::check_safety(&flags).is_err());

        flags = SafetyFlags::paper_defaults();
        flags.single_broker_only = false;
        assert!(AutoModeController::check_safety(&flags).is_err());
    }

    #[test]
    fn counters_store_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("counters.json");

        {
            let store = CountersStore::open(&path).unwrap();
            store.update(|c| {
                c.trades_today = 3;
                c.last_action = Some("EXECUTED: SPY".to_string());
            });
        }

        let reopened = CountersStore::open(&path).unwrap();
        let counters = reopened.snapshot();
        assert_eq!(counters.trades_today, 3);
        assert_eq!(counters.last_action.as_deref(), Some("EXECUTED: SPY"));
    }
}
