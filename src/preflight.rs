use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::config::{SafetyFlags, Settings};
use crate::dedupe_store::DedupeStore;
use crate::mode_manager::RequestedMode;
use crate::model::{InstrumentKind, TradeIntent};
use crate::risk_rules;
use crate::signal::ParsedSignal;

/// Symbols rejected outright: crypto and futures-style roots the brokers
/// in scope cannot trade.
const UNSUPPORTED_ASSETS: [&str; 8] = ["BTC", "ETH", "DOGE", "SOL", "/ES", "/NQ", "/CL", "/GC"];

#[derive(Debug, Clone, Serialize)]
pub struct CheckResult {
    pub name: &'static str,
    pub ok: bool,
    pub summary: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PreflightReport {
    pub ok: bool,
    pub checks: Vec<CheckResult>,
    pub blocked_reason: Option<String>,
    pub warnings: Vec<String>,
}

/// Run every preflight check, in order, against an intent. All checks are
/// recorded; the blocked reason is the first failure. Pure function of its
/// inputs plus dedupe-store reads — no side effects.
pub fn preflight_check(
    intent: &TradeIntent,
    signal: Option<&ParsedSignal>,
    mode: RequestedMode,
    signal_id: Option<&str>,
    dedupe: &DedupeStore,
    settings: &Settings,
    flags: &SafetyFlags,
    today: NaiveDate,
) -> PreflightReport {
    let mut checks = Vec::new();
    let mut warnings = Vec::new();

    check_completeness(intent, &mut checks);
    check_supported_asset(intent, &mut checks);
    check_risk_mode(intent, settings, today, &mut checks);
    check_risk_per_trade(intent, signal, settings, &mut checks, &mut warnings);
    check_dte_guard(intent, settings, today, &mut checks);
    check_mode_guard(mode, flags, &mut checks);
    check_dedupe(signal_id, dedupe, &mut checks);

    let ok = checks.iter().all(|c| c.ok);
    let blocked_reason = checks
        .iter()
        .find(|c| !c.ok)
        .map(|c| c.summary.clone());

    PreflightReport {
        ok,
        checks,
        blocked_reason,
        warnings,
    }
}

fn push(checks: &mut Vec<CheckResult>, name: &'static str, ok: bool, summary: String) {
    checks.push(CheckResult { name, ok, summary });
}

fn check_completeness(intent: &TradeIntent, checks: &mut Vec<CheckResult>) {
    const NAME: &str = "completeness";

    if intent.underlying.trim().is_empty() {
        push(checks, NAME, false, "Missing underlying symbol".to_string());
        return;
    }

    match intent.instrument {
        InstrumentKind::Stock => {
            if intent.quantity < 1 {
                push(
                    checks,
                    NAME,
                    false,
                    format!("Invalid quantity ({}) for stock order", intent.quantity),
                );
            } else {
                push(
                    checks,
                    NAME,
                    true,
                    format!("Stock order complete: {} x{}", intent.underlying, intent.quantity),
                );
            }
        }
        InstrumentKind::Option | InstrumentKind::IndexOption | InstrumentKind::Spread => {
            if intent.legs.is_empty() {
                // An exit resolved against an open position carries its
                // legs implicitly; anything else with zero legs is
                // incomplete only when it is an unresolved exit.
                if intent.context.is_exit() && intent.context.matched_position_id().is_none() {
                    push(
                        checks,
                        NAME,
                        false,
                        "EXIT signal has no legs and no matched position".to_string(),
                    );
                    return;
                }
            }

            for (i, leg) in intent.legs.iter().enumerate() {
                if leg.strike <= Decimal::ZERO {
                    push(checks, NAME, false, format!("Leg {} missing strike", i + 1));
                    return;
                }
                if leg.quantity < 1 {
                    push(
                        checks,
                        NAME,
                        false,
                        format!("Leg {} has invalid quantity", i + 1),
                    );
                    return;
                }
            }

            push(
                checks,
                NAME,
                true,
                format!(
                    "Option order complete: {} with {} leg(s)",
                    intent.underlying,
                    intent.legs.len()
                ),
            );
        }
    }
}

fn check_supported_asset(intent: &TradeIntent, checks: &mut Vec<CheckResult>) {
    const NAME: &str = "supported_asset";
    let underlying = intent.underlying.to_uppercase();

    if intent.instrument == InstrumentKind::IndexOption
        && !risk_rules::is_index_underlying(&underlying)
    {
        push(
            checks,
            NAME,
            false,
            format!("Only SPX index options supported, got: {}", underlying),
        );
        return;
    }

    if UNSUPPORTED_ASSETS.contains(&underlying.as_str()) || underlying.starts_with('/') {
        push(
            checks,
            NAME,
            false,
            format!("Asset not supported: {} (crypto/futures)", underlying),
        );
        return;
    }

    push(
        checks,
        NAME,
        true,
        format!("Asset supported: {} ({:?})", underlying, intent.instrument),
    );
}

fn check_risk_mode(
    intent: &TradeIntent,
    settings: &Settings,
    today: NaiveDate,
    checks: &mut Vec<CheckResult>,
) {
    const NAME: &str = "risk_mode";
    match risk_rules::check_allows(settings.risk_mode, intent, settings.allow_0dte_index, today) {
        Ok(()) => push(
            checks,
            NAME,
            true,
            format!("{:?} risk mode permits this trade", settings.risk_mode),
        ),
        Err(reason) => push(checks, NAME, false, reason),
    }
}

fn check_risk_per_trade(
    intent: &TradeIntent,
    signal: Option<&ParsedSignal>,
    settings: &Settings,
    checks: &mut Vec<CheckResult>,
    warnings: &mut Vec<String>,
) {
    const NAME: &str = "risk_per_trade";

    let mode_cap = settings.risk_mode.caps().max_risk_pct_per_trade;
    let cap = settings.max_risk_pct_per_trade.min(mode_cap);

    let declared = intent
        .risk_pct
        .or_else(|| signal.and_then(|s| s.size_pct));

    let size_pct = match declared {
        Some(pct) => pct,
        None => {
            warnings.push(format!(
                "No position size in signal, assuming the {:.1}% cap",
                cap * Decimal::from(100)
            ));
            cap
        }
    };

    if size_pct > cap {
        push(
            checks,
            NAME,
            false,
            format!(
                "Trade risk {:.1}% exceeds max {:.1}%",
                size_pct * Decimal::from(100),
                cap * Decimal::from(100)
            ),
        );
    } else {
        push(
            checks,
            NAME,
            true,
            format!(
                "Trade risk {:.1}% within limit ({:.1}% max)",
                size_pct * Decimal::from(100),
                cap * Decimal::from(100)
            ),
        );
    }
}

fn check_dte_guard(
    intent: &TradeIntent,
    settings: &Settings,
    today: NaiveDate,
    checks: &mut Vec<CheckResult>,
) {
    const NAME: &str = "dte_guard";

    if !risk_rules::is_index_underlying(&intent.underlying) {
        push(
            checks,
            NAME,
            true,
            "DTE guard not applicable (non-index underlying)".to_string(),
        );
        return;
    }

    if intent.legs.is_empty() {
        push(checks, NAME, true, "DTE guard: no legs to check".to_string());
        return;
    }

    for (i, leg) in intent.legs.iter().enumerate() {
        if leg.expiration == today && !settings.allow_0dte_index {
            push(
                checks,
                NAME,
                false,
                format!("0DTE index trade not allowed (leg {} expires today)", i + 1),
            );
            return;
        }
    }

    push(checks, NAME, true, "DTE guard passed".to_string());
}

fn check_mode_guard(mode: RequestedMode, flags: &SafetyFlags, checks: &mut Vec<CheckResult>) {
    const NAME: &str = "mode_guard";

    match mode {
        RequestedMode::Paper => push(checks, NAME, true, "Paper trading mode".to_string()),
        RequestedMode::Live => {
            if flags.live_trading {
                push(checks, NAME, true, "Live trading is enabled".to_string());
            } else {
                push(
                    checks,
                    NAME,
                    false,
                    "LIVE_TRADING disabled - set LIVE_TRADING=true to enable".to_string(),
                );
            }
        }
        RequestedMode::Dual => {
            if !flags.live_trading {
                push(
                    checks,
                    NAME,
                    false,
                    "LIVE_TRADING disabled - set LIVE_TRADING=true to enable".to_string(),
                );
            } else if !flags.dual_mode_allowed {
                push(
                    checks,
                    NAME,
                    false,
                    "Dual mode requires ALLOW_DUAL_MODE=true".to_string(),
                );
            } else {
                push(checks, NAME, true, "Dual mode is enabled".to_string());
            }
        }
    }
}

fn check_dedupe(signal_id: Option<&str>, dedupe: &DedupeStore, checks: &mut Vec<CheckResult>) {
    const NAME: &str = "dedupe";

    let Some(signal_id) = signal_id.filter(|id| !id.is_empty()) else {
        push(checks, NAME, true, "No signal id to dedupe".to_string());
        return;
    };

    if dedupe.is_executed(signal_id) {
        let shown: String = signal_id.chars().take(20).collect();
        push(
            checks,
            NAME,
            false,
            format!("Signal already executed (id: {}...)", shown),
        );
    } else {
        push(
            checks,
            NAME,
            true,
            "Signal not previously executed".to_string(),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dedupe_store::DedupeRecord;
    use crate::model::{
        ExecutionMode, LegSide, OptionLeg, OptionType, OrderType, ResultStatus, SignalContext,
        TradeAction,
    };
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn settings() -> Settings {
        Settings::from_env()
    }

    fn flags() -> SafetyFlags {
        SafetyFlags::paper_defaults()
    }

    fn temp_dedupe() -> (tempfile::TempDir, DedupeStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = DedupeStore::open(dir.path().join("executed.jsonl")).unwrap();
        (dir, store)
    }

    fn option_entry(legs: Vec<OptionLeg>) -> TradeIntent {
        TradeIntent {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            execution_mode: ExecutionMode::Paper,
            instrument: InstrumentKind::Spread,
            underlying: "SPY".to_string(),
            action: TradeAction::BuyToOpen,
            order_type: OrderType::Limit,
            limit_price: Some(dec!(1.20)),
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

    fn good_legs() -> Vec<OptionLeg> {
        let exp = Utc::now().date_naive() + chrono::Duration::days(14);
        vec![
            OptionLeg {
                side: LegSide::Buy,
                quantity: 1,
                strike: dec!(450),
                option_type: OptionType::Call,
                expiration: exp,
            },
            OptionLeg {
                side: LegSide::Sell,
                quantity: 1,
                strike: dec!(455),
                option_type: OptionType::Call,
                expiration: exp,
            },
        ]
    }

    #[test]
    fn all_checks_pass_for_complete_spread() {
        let (_dir, dedupe) = temp_dedupe();
        let intent = option_entry(good_legs());
        let report = preflight_check(
            &intent,
            None,
            RequestedMode::Paper,
            Some("sig-1"),
            &dedupe,
            &settings(),
            &flags(),
            Utc::now().date_naive(),
        );
        assert!(report.ok, "{:?}", report.blocked_reason);
        assert_eq!(report.checks.len(), 7);
        // Missing size defaults to the cap as a warning, not a failure.
        assert_eq!(report.warnings.len(), 1);
    }

    #[test]
    fn missing_strike_fails_completeness_first() {
        let (_dir, dedupe) = temp_dedupe();
        let mut legs = good_legs();
        legs[0].strike = Decimal::ZERO;
        let intent = option_entry(legs);

        let report = preflight_check(
            &intent,
            None,
            RequestedMode::Paper,
            Some("sig-1"),
            &dedupe,
            &settings(),
            &flags(),
            Utc::now().date_naive(),
        );
        assert!(!report.ok);
        let first_failure = report.checks.iter().find(|c| !c.ok).unwrap();
        assert_eq!(first_failure.name, "completeness");
        assert_eq!(
            report.blocked_reason.as_deref(),
            Some("Leg 1 missing strike")
        );
    }

    #[test]
    fn resolved_exit_with_no_legs_is_complete() {
        let (_dir, dedupe) = temp_dedupe();
        let mut intent = option_entry(vec![]);
        intent.action = TradeAction::SellToClose;
        intent.context = SignalContext::Exit {
            source_signal_id: "sig-1".to_string(),
            matched_position_id: Some(Uuid::new_v4()),
        };

        let report = preflight_check(
            &intent,
            None,
            RequestedMode::Paper,
            Some("sig-1"),
            &dedupe,
            &settings(),
            &flags(),
            Utc::now().date_naive(),
        );
        assert!(report.ok, "{:?}", report.blocked_reason);
    }

    #[test]
    fn unresolved_exit_with_no_legs_is_incomplete() {
        let (_dir, dedupe) = temp_dedupe();
        let mut intent = option_entry(vec![]);
        intent.action = TradeAction::SellToClose;
        intent.context = SignalContext::Exit {
            source_signal_id: "sig-1".to_string(),
            matched_position_id: None,
        };

        let report = preflight_check(
            &intent,
            None,
            RequestedMode::Paper,
            Some("sig-1"),
            &dedupe,
            &settings(),
            &flags(),
            Utc::now().date_naive(),
        );
        assert!(!report.ok);
        assert_eq!(
            report.blocked_reason.as_deref(),
            Some("EXIT signal has no legs and no matched position")
        );
    }

    #[test]
    fn crypto_symbols_are_rejected() {
        let (_dir, dedupe) = temp_dedupe();
        let mut intent = option_entry(good_legs());
        intent.underlying = "BTC".to_string();

        let report = preflight_check(
            &intent,
            None,
            RequestedMode::Paper,
            Some("sig-1"),
            &dedupe,
            &settings(),
            &flags(),
            Utc::now().date_naive(),
        );
        let failed = report.checks.iter().find(|c| !c.ok).unwrap();
        assert_eq!(failed.name, "supported_asset");
    }

    #[test]
    fn live_mode_blocked_without_flag() {
        let (_dir, dedupe) = temp_dedupe();
        let intent = option_entry(good_legs());

        let report = preflight_check(
            &intent,
            None,
            RequestedMode::Live,
            Some("sig-1"),
            &dedupe,
            &settings(),
            &flags(),
            Utc::now().date_naive(),
        );
        assert!(!report.ok);
        let failed = report.checks.iter().find(|c| !c.ok).unwrap();
        assert_eq!(failed.name, "mode_guard");
    }

    #[test]
    fn executed_signal_fails_dedupe() {
        let (_dir, dedupe) = temp_dedupe();
        dedupe
            .mark_if_absent(DedupeRecord {
                signal_id: "sig-1".to_string(),
                executed_at: Utc::now(),
                execution_mode: RequestedMode::Paper,
                intent_id: Uuid::new_v4(),
                result_status: ResultStatus::Simulated,
                underlying: None,
                action: None,
            })
            .unwrap();

        let intent = option_entry(good_legs());
        let report = preflight_check(
            &intent,
            None,
            RequestedMode::Paper,
            Some("sig-1"),
            &dedupe,
            &settings(),
            &flags(),
            Utc::now().date_naive(),
        );
        assert!(!report.ok);
        let failed = report.checks.iter().find(|c| !c.ok).unwrap();
        assert_eq!(failed.name, "dedupe");
    }
}
