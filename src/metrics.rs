use once_cell::sync::Lazy;
use prometheus::{Gauge, IntCounter, IntGauge, register_gauge, register_int_counter, register_int_gauge};

pub static AUTO_TICKS: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "vigil_execution_auto_ticks_total",
        "Total controller ticks performed"
    )
    .expect("auto_ticks counter")
});

pub static EXECUTED_TRADES: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "vigil_execution_executed_trades_total",
        "Total signals executed (paper or live)"
    )
    .expect("executed_trades counter")
});

pub static BLOCKED_SIGNALS: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "vigil_execution_blocked_signals_total",
        "Total signals blocked by preflight"
    )
    .expect("blocked_signals counter")
});

pub static DEDUPE_HITS: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "vigil_execution_dedupe_hits_total",
        "Total execution attempts refused by the dedupe ledger"
    )
    .expect("dedupe_hits counter")
});

pub static RATE_LIMITED_TICKS: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "vigil_execution_rate_limited_ticks_total",
        "Total ticks rejected by trade/notional ceilings"
    )
    .expect("rate_limited_ticks counter")
});

pub static CONSISTENCY_ERRORS: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "vigil_execution_consistency_errors_total",
        "Results claiming submission without a broker order id"
    )
    .expect("consistency_errors counter")
});

pub static BROKER_ERRORS: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "vigil_execution_broker_errors_total",
        "Total broker API/network failures"
    )
    .expect("broker_errors counter")
});

pub static SAFETY_DISABLES: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "vigil_execution_safety_disables_total",
        "Times the controller disabled itself on a safety invariant"
    )
    .expect("safety_disables counter")
});

pub static OPEN_POSITIONS: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "vigil_execution_open_positions",
        "Currently open paper positions"
    )
    .expect("open_positions gauge")
});

pub static CONTROLLER_ENABLED: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "vigil_execution_controller_enabled",
        "Whether the auto controller is enabled (1) or not (0)"
    )
    .expect("controller_enabled gauge")
});

pub static NOTIONAL_TODAY: Lazy<Gauge> = Lazy::new(|| {
    register_gauge!(
        "vigil_execution_notional_today_dollars",
        "Cumulative notional executed today"
    )
    .expect("notional_today gauge")
});

pub fn inc_auto_ticks() {
    AUTO_TICKS.inc();
}

pub fn inc_executed_trades() {
    EXECUTED_TRADES.inc();
}

pub fn inc_blocked_signals() {
    BLOCKED_SIGNALS.inc();
}

pub fn inc_dedupe_hits() {
    DEDUPE_HITS.inc();
}

pub fn inc_rate_limited_ticks() {
    RATE_LIMITED_TICKS.inc();
}

pub fn inc_consistency_errors() {
    CONSISTENCY_ERRORS.inc();
}

pub fn inc_broker_errors() {
    BROKER_ERRORS.inc();
}

pub fn inc_safety_disables() {
    SAFETY_DISABLES.inc();
}

pub fn set_open_positions(count: i64) {
    OPEN_POSITIONS.set(count);
}

pub fn set_controller_enabled(enabled: bool) {
    CONTROLLER_ENABLED.set(if enabled { 1 } else { 0 });
}

pub fn set_notional_today(notional: f64) {
    NOTIONAL_TODAY.set(notional);
}
