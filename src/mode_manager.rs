use serde::{Deserialize, Serialize};

use crate::config::SafetyFlags;
use crate::model::ExecutionMode;

/// The three user-facing execution modes. `Dual` runs live on the primary
/// broker with a paper mirror for verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestedMode {
    #[serde(rename = "paper")]
    Paper,
    #[serde(rename = "live")]
    Live,
    #[serde(rename = "dual")]
    Dual,
}

impl RequestedMode {
    /// The intent-level execution mode of the primary leg.
    pub fn to_execution_mode(self) -> ExecutionMode {
        match self {
            RequestedMode::Paper => ExecutionMode::Paper,
            RequestedMode::Live | RequestedMode::Dual => ExecutionMode::Live,
        }
    }

    pub fn involves_real_money(self) -> bool {
        matches!(self, RequestedMode::Live | RequestedMode::Dual)
    }
}

/// Result of resolving a requested mode against the environment safety
/// flags. Recomputed on demand; never persisted as the source of truth.
#[derive(Debug, Clone, Serialize)]
pub struct EffectiveModeDecision {
    pub requested: RequestedMode,
    pub effective: RequestedMode,
    pub live_allowed: bool,
    pub dual_allowed: bool,
    pub auto_live_enabled: bool,
    pub primary_broker: String,
    pub message: String,
}

pub fn primary_live_broker() -> String {
    std::env::var("PRIMARY_LIVE_BROKER")
        .unwrap_or_else(|_| "tradier".to_string())
        .to_lowercase()
}

/// Resolve the effective execution mode.
///
/// UI-submitted state can only request a mode; unlocking live trading takes
/// the environment flags. The automatic controller is additionally forced to
/// paper unless auto-live is explicitly enabled. A missing confirmation
/// always degrades toward paper, never errors.
pub fn effective_mode(
    requested: RequestedMode,
    flags: &SafetyFlags,
    for_auto: bool,
) -> EffectiveModeDecision {
    let live_allowed = flags.live_allowed();
    let dual_allowed = flags.dual_allowed();
    let auto_live_enabled = flags.auto_live_enabled;
    let primary_broker = primary_live_broker();

    let (effective, message) = if for_auto && !auto_live_enabled {
        let message = if requested.involves_real_money() {
            "Auto mode restricted to paper trading. Set AUTO_LIVE_ENABLED=true for live auto trading.".to_string()
        } else {
            "Auto mode using paper trading.".to_string()
        };
        (RequestedMode::Paper, message)
    } else {
        match requested {
            RequestedMode::Dual if dual_allowed => (
                RequestedMode::Dual,
                format!(
                    "Dual mode active: live trades on {}, paper mirror for verification.",
                    primary_broker
                ),
            ),
            RequestedMode::Dual if live_allowed => (
                RequestedMode::Live,
                "Dual mode not allowed. Set ALLOW_DUAL_MODE=true. Falling back to live only."
                    .to_string(),
            ),
            RequestedMode::Dual => (
                RequestedMode::Paper,
                "Live trading not enabled. Set LIVE_TRADING=true and DRY_RUN=false.".to_string(),
            ),
            RequestedMode::Live if live_allowed => (
                RequestedMode::Live,
                format!("Live trading active on {}.", primary_broker),
            ),
            RequestedMode::Live => (
                RequestedMode::Paper,
                "Live trading not enabled. Set LIVE_TRADING=true and DRY_RUN=false.".to_string(),
            ),
            RequestedMode::Paper => (
                RequestedMode::Paper,
                "Paper trading mode active.".to_string(),
            ),
        }
    };

    EffectiveModeDecision {
        requested,
        effective,
        live_allowed,
        dual_allowed,
        auto_live_enabled,
        primary_broker,
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flags() -> SafetyFlags {
        SafetyFlags::paper_defaults()
    }

    #[test]
    fn live_request_without_flag_degrades_to_paper() {
        let decision = effective_mode(RequestedMode::Live, &flags(), false);
        assert_eq!(decision.effective, RequestedMode::Paper);
        assert!(!decision.live_allowed);
    }

    #[test]
    fn live_flag_alone_is_not_enough_under_dry_run() {
        let mut f = flags();
        f.live_trading = true;
        // dry_run still true -> two independent confirmations missing one
        let decision = effective_mode(RequestedMode::Live, &f, false);
        assert_eq!(decision.effective, RequestedMode::Paper);
    }

    #[test]
    fn dual_without_dual_flag_never_yields_dual() {
        let mut f = flags();
        f.live_trading = true;
        f.dry_run = false;
        let decision = effective_mode(RequestedMode::Dual, &f, false);
        assert_eq!(decision.effective, RequestedMode::Live);

        f.dual_mode_allowed = true;
        let decision = effective_mode(RequestedMode::Dual, &f, false);
        assert_eq!(decision.effective, RequestedMode::Dual);
    }

    #[test]
    fn auto_is_forced_to_paper_without_auto_live() {
        let mut f = flags();
        f.live_trading = true;
        f.dry_run = false;
        f.dual_mode_allowed = true;

        let decision = effective_mode(RequestedMode::Dual, &f, true);
        assert_eq!(decision.effective, RequestedMode::Paper);

        f.auto_live_enabled = true;
        let decision = effective_mode(RequestedMode::Dual, &f, true);
        assert_eq!(decision.effective, RequestedMode::Dual);
    }
}
