use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::warn;

use crate::broker_client::BrokerClient;
use crate::config::SettingsStore;

#[derive(Debug, Clone, Serialize)]
pub struct WindowStatus {
    pub within_window: bool,
    pub is_market_open: bool,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub window_start: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub window_end: Option<DateTime<Utc>>,
}

impl WindowStatus {
    pub fn closed(reason: impl Into<String>) -> Self {
        Self {
            within_window: false,
            is_market_open: false,
            reason: reason.into(),
            window_start: None,
            window_end: None,
        }
    }

    pub fn open(reason: impl Into<String>) -> Self {
        Self {
            within_window: true,
            is_market_open: true,
            reason: reason.into(),
            window_start: None,
            window_end: None,
        }
    }
}

/// Answers "is automated trading allowed right now". Calendar internals
/// live behind this interface.
#[async_trait]
pub trait SessionOracle: Send + Sync {
    async fn check(&self) -> WindowStatus;
}

/// Oracle deriving the auto window from the broker market clock:
/// next_open − buffer through next_close + buffer. A clock fetch failure
/// fails closed — no window, no trading.
pub struct ClockSessionOracle {
    client: Arc<dyn BrokerClient>,
    settings: Arc<SettingsStore>,
}

impl ClockSessionOracle {
    pub fn new(client: Arc<dyn BrokerClient>, settings: Arc<SettingsStore>) -> Self {
        Self { client, settings }
    }
}

#[async_trait]
impl SessionOracle for ClockSessionOracle {
    async fn check(&self) -> WindowStatus {
        let buffer = Duration::minutes(self.settings.current().auto_window_buffer_minutes);
        let now = Utc::now();

        let clock = match self.client.market_clock().await {
            Ok(clock) => clock,
            Err(e) => {
                warn!("Market clock unavailable, failing closed: {}", e);
                return WindowStatus::closed(format!(
                    "Failed to fetch market clock - failing closed for safety: {}",
                    e
                ));
            }
        };

        if clock.is_open {
            let window_end = clock.next_close.map(|close| close + buffer);
            return WindowStatus {
                within_window: true,
                is_market_open: true,
                reason: "Within trading window".to_string(),
                window_start: None,
                window_end,
            };
        }

        // Market closed: still inside the window during the pre-open buffer
        // or shortly after the close.
        if let Some(next_open) = clock.next_open {
            let window_start = next_open - buffer;
            if now >= window_start {
                return WindowStatus {
                    within_window: true,
                    is_market_open: false,
                    reason: "Within pre-open buffer".to_string(),
                    window_start: Some(window_start),
                    window_end: None,
                };
            }
            return WindowStatus {
                within_window: false,
                is_market_open: false,
                reason: format!(
                    "Outside window (opens {})",
                    window_start.format("%Y-%m-%d %H:%M UTC")
                ),
                window_start: Some(window_start),
                window_end: None,
            };
        }

        WindowStatus::closed("Market closed, no next open published")
    }
}

/// Fixed-answer oracle for tests and replay.
pub struct StaticSessionOracle {
    status: WindowStatus,
}

impl StaticSessionOracle {
    pub fn new(status: WindowStatus) -> Self {
        Self { status }
    }

    pub fn always_open() -> Self {
        Self::new(WindowStatus::open("static oracle: open"))
    }

    pub fn always_closed() -> Self {
        Self::new(WindowStatus::closed("static oracle: closed"))
    }
}

#[async_trait]
impl SessionOracle for StaticSessionOracle {
    async fn check(&self) -> WindowStatus {
        self.status.clone()
    }
}
