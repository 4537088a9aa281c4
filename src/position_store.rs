use std::path::PathBuf;

use chrono::{DateTime, NaiveDate, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::jsonl::{self, StoreError};
use crate::model::{InstrumentKind, OptionLeg};
use crate::signal::ParsedSignal;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PositionStatus {
    #[serde(rename = "OPEN")]
    Open,
    #[serde(rename = "CLOSED")]
    Closed,
}

/// A simulated position. Created when an entry executes; transitions
/// OPEN -> CLOSED exactly once; never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaperPosition {
    pub position_id: Uuid,
    pub status: PositionStatus,
    pub opened_at: DateTime<Utc>,
    #[serde(default)]
    pub closed_at: Option<DateTime<Utc>>,
    pub source_signal_id: String,
    pub underlying: String,
    pub instrument: InstrumentKind,
    #[serde(default)]
    pub legs: Vec<OptionLeg>,
    pub quantity: u32,
    /// Snapshot of the intent that opened the position.
    pub open_intent: serde_json::Value,
    /// Snapshot of the intent that closed it, once closed.
    #[serde(default)]
    pub close_intent: Option<serde_json::Value>,
}

/// Ledger of simulated positions: appends on open, rewrites on close.
/// Single-writer by convention (executor paths).
pub struct PositionStore {
    path: PathBuf,
    cache: Mutex<Vec<PaperPosition>>,
}

impl PositionStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let positions = jsonl::read_records(&path)?;
        Ok(Self {
            path,
            cache: Mutex::new(positions),
        })
    }

    pub fn append_open(&self, position: PaperPosition) -> Result<(), StoreError> {
        let mut cache = self.cache.lock();
        jsonl::append_record(&self.path, &position)?;
        info!(
            position_id = %position.position_id,
            underlying = %position.underlying,
            "Opened paper position"
        );
        cache.push(position);
        Ok(())
    }

    /// Transition a position OPEN -> CLOSED. Closing an already-closed or
    /// unknown id reports failure instead of erroring.
    pub fn mark_closed(
        &self,
        position_id: Uuid,
        close_intent: serde_json::Value,
    ) -> Result<bool, StoreError> {
        let mut cache = self.cache.lock();

        let Some(position) = cache
            .iter_mut()
            .find(|p| p.position_id == position_id && p.status == PositionStatus::Open)
        else {
            warn!(%position_id, "Position not found or already closed");
            return Ok(false);
        };

        position.status = PositionStatus::Closed;
        position.closed_at = Some(Utc::now());
        position.close_intent = Some(close_intent);
        let underlying = position.underlying.clone();

        jsonl::rewrite_records(&self.path, &cache)?;
        info!(%position_id, %underlying, "Closed paper position");
        Ok(true)
    }

    pub fn open_positions(&self) -> Vec<PaperPosition> {
        self.cache
            .lock()
            .iter()
            .filter(|p| p.status == PositionStatus::Open)
            .cloned()
            .collect()
    }

    pub fn open_for_underlying(&self, ticker: &str) -> Vec<PaperPosition> {
        let mut positions: Vec<PaperPosition> = self
            .cache
            .lock()
            .iter()
            .filter(|p| {
                p.status == PositionStatus::Open && p.underlying.eq_ignore_ascii_case(ticker)
            })
            .cloned()
            .collect();
        // Most recently opened first.
        positions.sort_by(|a, b| b.opened_at.cmp(&a.opened_at));
        positions
    }

    /// Resolve an exit signal with incomplete leg detail to an open
    /// position: prefer an exact leg-signature match (expiration, strike,
    /// option type — order-independent), else the most recently opened
    /// position for the underlying.
    pub fn find_open_for_exit(&self, signal: &ParsedSignal) -> Option<PaperPosition> {
        let ticker = signal.ticker.trim();
        if ticker.is_empty() {
            return None;
        }

        let candidates = self.open_for_underlying(ticker);
        if candidates.is_empty() {
            return None;
        }

        if !signal.legs.is_empty() {
            let wanted = signal_leg_signature(signal);
            if let Some(hit) = candidates
                .iter()
                .find(|p| position_leg_signature(&p.legs) == wanted)
            {
                return Some(hit.clone());
            }
        }

        candidates.into_iter().next()
    }

    pub fn closed_on(&self, day: NaiveDate) -> Vec<PaperPosition> {
        self.cache
            .lock()
            .iter()
            .filter(|p| {
                p.status == PositionStatus::Closed
                    && p.closed_at.is_some_and(|t| t.date_naive() == day)
            })
            .cloned()
            .collect()
    }

    pub fn all(&self) -> Vec<PaperPosition> {
        self.cache.lock().clone()
    }
}

type LegSignature = Vec<(Option<NaiveDate>, rust_decimal::Decimal, crate::model::OptionType)>;

fn position_leg_signature(legs: &[OptionLeg]) -> LegSignature {
    let mut sig: LegSignature = legs
        .iter()
        .map(|l| (Some(l.expiration), l.strike, l.option_type))
        .collect();
    sig.sort();
    sig
}

fn signal_leg_signature(signal: &ParsedSignal) -> LegSignature {
    let mut sig: LegSignature = signal
        .legs
        .iter()
        .map(|l| (l.expiration.or(signal.expiration), l.strike, l.option_type))
        .collect();
    sig.sort();
    sig
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{LegSide, OptionType};
    use crate::signal::{LimitKind, SignalLeg};
    use rust_decimal_macros::dec;

    fn leg(strike: rust_decimal::Decimal, exp: NaiveDate) -> OptionLeg {
        OptionLeg {
            side: LegSide::Buy,
            quantity: 1,
            strike,
            option_type: OptionType::Call,
            expiration: exp,
        }
    }

    fn position(underlying: &str, legs: Vec<OptionLeg>) -> PaperPosition {
        PaperPosition {
            position_id: Uuid::new_v4(),
            status: PositionStatus::Open,
            opened_at: Utc::now(),
            closed_at: None,
            source_signal_id: "sig-open".to_string(),
            underlying: underlying.to_string(),
            instrument: InstrumentKind::Option,
            legs,
            quantity: 1,
            open_intent: serde_json::json!({}),
            close_intent: None,
        }
    }

    fn exit_signal(ticker: &str, legs: Vec<SignalLeg>) -> ParsedSignal {
        ParsedSignal {
            ticker: ticker.to_string(),
            strategy: "EXIT".to_string(),
            expiration: None,
            legs,
            limit_min: None,
            limit_max: None,
            limit_kind: LimitKind::Debit,
            size_pct: None,
            quantity: 1,
            raw_text: String::new(),
        }
    }

    #[test]
    fn close_transitions_exactly_once() {
        let dir = tempfile::tempdir().unwrap();
        let store = PositionStore::open(dir.path().join("positions.jsonl")).unwrap();

        let pos = position("SPY", vec![]);
        let id = pos.position_id;
        store.append_open(pos).unwrap();

        assert!(store.mark_closed(id, serde_json::json!({})).unwrap());
        assert!(!store.mark_closed(id, serde_json::json!({})).unwrap());
        assert!(store.open_positions().is_empty());
    }

    #[test]
    fn closing_unknown_id_reports_failure() {
        let dir = tempfile::tempdir().unwrap();
        let store = PositionStore::open(dir.path().join("positions.jsonl")).unwrap();
        assert!(!store
            .mark_closed(Uuid::new_v4(), serde_json::json!({}))
            .unwrap());
    }

    #[test]
    fn exit_matching_prefers_exact_leg_signature() {
        let dir = tempfile::tempdir().unwrap();
        let store = PositionStore::open(dir.path().join("positions.jsonl")).unwrap();
        let exp = NaiveDate::from_ymd_opt(2026, 9, 18).unwrap();

        let older = position("SPY", vec![leg(dec!(440), exp)]);
        let older_id = older.position_id;
        store.append_open(older).unwrap();

        let mut newer = position("SPY", vec![leg(dec!(450), exp)]);
        newer.opened_at = Utc::now() + chrono::Duration::seconds(5);
        store.append_open(newer).unwrap();

        // Exact strike match wins over recency.
        let signal = exit_signal(
            "spy",
            vec![SignalLeg {
                side: LegSide::Sell,
                quantity: 1,
                strike: dec!(440),
                option_type: OptionType::Call,
                expiration: Some(exp),
            }],
        );
        let matched = store.find_open_for_exit(&signal).unwrap();
        assert_eq!(matched.position_id, older_id);
    }

    #[test]
    fn exit_without_legs_falls_back_to_most_recent() {
        let dir = tempfile::tempdir().unwrap();
        let store = PositionStore::open(dir.path().join("positions.jsonl")).unwrap();
        let exp = NaiveDate::from_ymd_opt(2026, 9, 18).unwrap();

        store.append_open(position("SPY", vec![leg(dec!(440), exp)])).unwrap();
        let mut newer = position("SPY", vec![leg(dec!(450), exp)]);
        newer.opened_at = Utc::now() + chrono::Duration::seconds(5);
        let newer_id = newer.position_id;
        store.append_open(newer).unwrap();

        let matched = store.find_open_for_exit(&exit_signal("SPY", vec![])).unwrap();
        assert_eq!(matched.position_id, newer_id);
    }

    #[test]
    fn exit_never_matches_another_ticker() {
        let dir = tempfile::tempdir().unwrap();
        let store = PositionStore::open(dir.path().join("positions.jsonl")).unwrap();
        store.append_open(position("QQQ", vec![])).unwrap();

        assert!(store.find_open_for_exit(&exit_signal("SPY", vec![])).is_none());
    }

    #[test]
    fn positions_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("positions.jsonl");

        let id = {
            let store = PositionStore::open(&path).unwrap();
            let pos = position("SPY", vec![]);
            let id = pos.position_id;
            store.append_open(pos).unwrap();
            store.mark_closed(id, serde_json::json!({"x": 1})).unwrap();
            id
        };

        let reopened = PositionStore::open(&path).unwrap();
        let all = reopened.all();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].position_id, id);
        assert_eq!(all[0].status, PositionStatus::Closed);
        assert!(all[0].close_intent.is_some());
    }
}
