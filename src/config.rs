use std::env;
use std::path::{Path, PathBuf};

use config::{Config, ConfigError, Environment, File};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::jsonl::{self, StoreError};
use crate::mode_manager::RequestedMode;
use crate::risk_rules::RiskMode;

/// Static service configuration: files layered under env overrides,
/// e.g. VIGIL_BROKER__ACCESS_TOKEN.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    pub server: Option<ServerConfig>,
    pub broker: Option<BrokerConfig>,
    pub paths: Option<PathsConfig>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ServerConfig {
    pub port: Option<u16>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct BrokerConfig {
    pub name: Option<String>,
    pub base_url: Option<String>,
    pub access_token: Option<String>,
    pub account_id: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct PathsConfig {
    pub data_dir: Option<String>,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let home = env::var("HOME").unwrap_or_else(|_| ".".into());

        let s = Config::builder()
            .add_source(File::with_name(&format!("{}/.vigil/config", home)).required(false))
            .add_source(File::with_name("config/config").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(Environment::with_prefix("VIGIL").separator("__"))
            .build()?;

        s.try_deserialize()
    }

    pub fn port(&self) -> u16 {
        self.server.as_ref().and_then(|s| s.port).unwrap_or(8090)
    }

    pub fn data_dir(&self) -> PathBuf {
        self.paths
            .as_ref()
            .and_then(|p| p.data_dir.clone())
            .unwrap_or_else(|| "data".to_string())
            .into()
    }
}

fn env_bool(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(val) if !val.is_empty() => {
            matches!(val.to_lowercase().as_str(), "true" | "1" | "yes" | "on")
        }
        _ => default,
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Environment-level safety flags. Read fresh on every evaluation — never
/// cached beyond a tick — so flipping an env var takes effect on the next
/// decision. These flags, not any UI or settings-file state, are the sole
/// authority for unlocking live trading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SafetyFlags {
    pub dry_run: bool,
    pub live_trading: bool,
    pub single_broker_only: bool,
    pub kill_switch: bool,
    pub auto_live_enabled: bool,
    pub dual_mode_allowed: bool,
    pub auto_mode_enabled: bool,
}

impl SafetyFlags {
    pub fn snapshot() -> Self {
        Self {
            dry_run: env_bool("DRY_RUN", true),
            live_trading: env_bool("LIVE_TRADING", false),
            single_broker_only: env_bool("SINGLE_BROKER_ONLY", true),
            kill_switch: env_bool("KILL_SWITCH", false),
            auto_live_enabled: env_bool("AUTO_LIVE_ENABLED", false),
            dual_mode_allowed: env_bool("ALLOW_DUAL_MODE", false),
            auto_mode_enabled: env_bool("AUTO_MODE_ENABLED", false),
        }
    }

    /// Live trading requires the explicit flag AND dry-run off.
    pub fn live_allowed(&self) -> bool {
        self.live_trading && !self.dry_run
    }

    /// Dual mode additionally requires its own flag.
    pub fn dual_allowed(&self) -> bool {
        self.live_allowed() && self.dual_mode_allowed
    }
}

#[cfg(test)]
impl SafetyFlags {
    /// All-safe defaults for tests: paper-only, auto allowed to run.
    pub fn paper_defaults() -> Self {
        Self {
            dry_run: true,
            live_trading: false,
            single_broker_only: true,
            kill_switch: false,
            auto_live_enabled: false,
            dual_mode_allowed: false,
            auto_mode_enabled: true,
        }
    }
}

/// User-adjustable settings, persisted as one JSON document and merged over
/// environment-variable defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub requested_mode: RequestedMode,
    pub risk_mode: RiskMode,
    pub auto_poll_seconds: u64,
    pub auto_window_buffer_minutes: i64,
    pub max_risk_pct_per_trade: Decimal,
    pub allow_0dte_index: bool,
    pub auto_max_trades_per_day: u32,
    pub auto_max_trades_per_hour: u32,
    pub auto_max_notional_per_day: Decimal,
}

impl Settings {
    /// Environment-variable defaults, used when the settings document is
    /// missing or a field is absent from it.
    pub fn from_env() -> Self {
        Self {
            requested_mode: RequestedMode::Paper,
            risk_mode: RiskMode::Balanced,
            auto_poll_seconds: env_parse("AUTO_POLL_SECONDS", 30),
            auto_window_buffer_minutes: env_parse("AUTO_WINDOW_BUFFER_MINUTES", 60),
            max_risk_pct_per_trade: env_parse(
                "MAX_RISK_PCT_PER_TRADE",
                Decimal::new(2, 2), // 0.02
            ),
            allow_0dte_index: env_bool("ALLOW_0DTE_INDEX", false),
            auto_max_trades_per_day: env_parse("AUTO_MAX_TRADES_PER_DAY", 10),
            auto_max_trades_per_hour: env_parse("AUTO_MAX_TRADES_PER_HOUR", 3),
            auto_max_notional_per_day: env_parse(
                "AUTO_MAX_NOTIONAL_PER_DAY",
                Decimal::from(25_000),
            ),
        }
    }
}

/// Per-field overlay read from the settings document; absent fields fall
/// back to the env defaults.
#[derive(Debug, Default, Deserialize)]
struct SettingsOverlay {
    requested_mode: Option<RequestedMode>,
    risk_mode: Option<RiskMode>,
    auto_poll_seconds: Option<u64>,
    auto_window_buffer_minutes: Option<i64>,
    max_risk_pct_per_trade: Option<Decimal>,
    allow_0dte_index: Option<bool>,
    auto_max_trades_per_day: Option<u32>,
    auto_max_trades_per_hour: Option<u32>,
    auto_max_notional_per_day: Option<Decimal>,
}

impl SettingsOverlay {
    fn apply(self, base: &mut Settings) {
        if let Some(v) = self.requested_mode {
            base.requested_mode = v;
        }
        if let Some(v) = self.risk_mode {
            base.risk_mode = v;
        }
        if let Some(v) = self.auto_poll_seconds {
            base.auto_poll_seconds = v;
        }
        if let Some(v) = self.auto_window_buffer_minutes {
            base.auto_window_buffer_minutes = v;
        }
        if let Some(v) = self.max_risk_pct_per_trade {
            base.max_risk_pct_per_trade = v;
        }
        if let Some(v) = self.allow_0dte_index {
            base.allow_0dte_index = v;
        }
        if let Some(v) = self.auto_max_trades_per_day {
            base.auto_max_trades_per_day = v;
        }
        if let Some(v) = self.auto_max_trades_per_hour {
            base.auto_max_trades_per_hour = v;
        }
        if let Some(v) = self.auto_max_notional_per_day {
            base.auto_max_notional_per_day = v;
        }
    }
}

pub struct SettingsStore {
    path: PathBuf,
    cache: RwLock<Settings>,
}

impl SettingsStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let settings = Self::load_from(&path)?;
        Ok(Self {
            path,
            cache: RwLock::new(settings),
        })
    }

    fn load_from(path: &Path) -> Result<Settings, StoreError> {
        let mut settings = Settings::from_env();
        if let Some(overlay) = jsonl::read_document::<SettingsOverlay>(path)? {
            overlay.apply(&mut settings);
        }
        Ok(settings)
    }

    pub fn current(&self) -> Settings {
        self.cache.read().clone()
    }

    pub fn update(&self, apply: impl FnOnce(&mut Settings)) -> Result<Settings, StoreError> {
        let mut cache = self.cache.write();
        apply(&mut cache);
        jsonl::write_document(&self.path, &*cache)?;
        Ok(cache.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn settings_document_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"requested_mode": "live", "auto_max_trades_per_day": 4}"#,
        )
        .unwrap();

        let store = SettingsStore::open(&path).unwrap();
        let settings = store.current();
        assert_eq!(settings.requested_mode, RequestedMode::Live);
        assert_eq!(settings.auto_max_trades_per_day, 4);
        // Untouched fields keep their defaults.
        assert_eq!(settings.auto_max_trades_per_hour, 3);
    }

    #[test]
    fn update_persists_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");

        let store = SettingsStore::open(&path).unwrap();
        store
            .update(|s| s.max_risk_pct_per_trade = dec!(0.05))
            .unwrap();

        let reopened = SettingsStore::open(&path).unwrap();
        assert_eq!(reopened.current().max_risk_pct_per_trade, dec!(0.05));
    }
}
