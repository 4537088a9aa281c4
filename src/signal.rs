use std::path::PathBuf;

use chrono::{DateTime, NaiveDate, Utc};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::jsonl::{self, StoreError};
use crate::model::{LegSide, OptionType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Classification {
    #[serde(rename = "SIGNAL")]
    Signal,
    #[serde(rename = "NON_SIGNAL")]
    NonSignal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignalType {
    #[serde(rename = "ENTRY")]
    Entry,
    #[serde(rename = "EXIT")]
    Exit,
    #[serde(rename = "UNKNOWN")]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LimitKind {
    #[serde(rename = "DEBIT")]
    #[default]
    Debit,
    #[serde(rename = "CREDIT")]
    Credit,
}

/// One leg as extracted by the upstream classifier. Expiration may be
/// missing on the leg and supplied signal-wide instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalLeg {
    pub side: LegSide,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
    pub strike: Decimal,
    pub option_type: OptionType,
    #[serde(default)]
    pub expiration: Option<NaiveDate>,
}

fn default_quantity() -> u32 {
    1
}

/// Structured fields extracted from one alert by the upstream parser.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedSignal {
    pub ticker: String,
    pub strategy: String,
    #[serde(default)]
    pub expiration: Option<NaiveDate>,
    #[serde(default)]
    pub legs: Vec<SignalLeg>,
    #[serde(default)]
    pub limit_min: Option<Decimal>,
    #[serde(default)]
    pub limit_max: Option<Decimal>,
    #[serde(default)]
    pub limit_kind: LimitKind,
    #[serde(default)]
    pub size_pct: Option<Decimal>,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
    #[serde(default)]
    pub raw_text: String,
}

impl ParsedSignal {
    /// Whether an EXIT carries enough leg detail to execute without
    /// resolving against an open position: at least one leg, each with a
    /// positive strike and an expiration from the leg or the signal.
    pub fn has_complete_leg_details(&self) -> bool {
        !self.legs.is_empty()
            && self.legs.iter().all(|leg| {
                leg.strike > Decimal::ZERO
                    && (leg.expiration.is_some() || self.expiration.is_some())
            })
    }
}

/// One classified alert as consumed by the controller and manual review.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalRecord {
    pub signal_id: String,
    pub ticker: String,
    pub classification: Classification,
    pub signal_type: SignalType,
    pub received_at: DateTime<Utc>,
    #[serde(default)]
    pub parsed: Option<ParsedSignal>,
}

impl SignalRecord {
    /// The classifier's signal type, falling back to the parsed strategy
    /// when the classifier could not decide.
    pub fn effective_signal_type(&self) -> SignalType {
        if self.signal_type != SignalType::Unknown {
            return self.signal_type;
        }
        match &self.parsed {
            Some(parsed) if parsed.strategy.eq_ignore_ascii_case("EXIT") => SignalType::Exit,
            Some(_) => SignalType::Entry,
            None => SignalType::Unknown,
        }
    }
}

/// Source of classified signals, newest first.
pub trait SignalFeed: Send + Sync {
    fn recent(&self, limit: usize) -> Result<Vec<SignalRecord>, StoreError>;

    fn find(&self, signal_id: &str) -> Result<Option<SignalRecord>, StoreError> {
        Ok(self
            .recent(usize::MAX)?
            .into_iter()
            .find(|r| r.signal_id == signal_id))
    }
}

/// Feed backed by the classifier's newline-delimited JSON output.
pub struct JsonlSignalFeed {
    path: PathBuf,
}

impl JsonlSignalFeed {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl SignalFeed for JsonlSignalFeed {
    fn recent(&self, limit: usize) -> Result<Vec<SignalRecord>, StoreError> {
        let mut records: Vec<SignalRecord> = jsonl::read_records(&self.path)?;
        records.sort_by(|a, b| b.received_at.cmp(&a.received_at));
        records.truncate(limit);
        Ok(records)
    }
}

/// In-memory feed for tests and replay harnesses.
#[derive(Default)]
pub struct StaticSignalFeed {
    records: RwLock<Vec<SignalRecord>>,
}

impl StaticSignalFeed {
    pub fn new(records: Vec<SignalRecord>) -> Self {
        Self {
            records: RwLock::new(records),
        }
    }

    pub fn push(&self, record: SignalRecord) {
        self.records.write().push(record);
    }
}

impl SignalFeed for StaticSignalFeed {
    fn recent(&self, limit: usize) -> Result<Vec<SignalRecord>, StoreError> {
        let mut records = self.records.read().clone();
        records.sort_by(|a, b| b.received_at.cmp(&a.received_at));
        records.truncate(limit);
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn leg(strike: Decimal, expiration: Option<NaiveDate>) -> SignalLeg {
        SignalLeg {
            side: LegSide::Buy,
            quantity: 1,
            strike,
            option_type: OptionType::Call,
            expiration,
        }
    }

    #[test]
    fn complete_legs_require_strike_and_expiration() {
        let exp = NaiveDate::from_ymd_opt(2026, 9, 18);
        let mut parsed = ParsedSignal {
            ticker: "SPY".into(),
            strategy: "LONG_OPTION".into(),
            expiration: None,
            legs: vec![leg(dec!(450), exp)],
            limit_min: None,
            limit_max: None,
            limit_kind: LimitKind::Debit,
            size_pct: None,
            quantity: 1,
            raw_text: String::new(),
        };
        assert!(parsed.has_complete_leg_details());

        parsed.legs = vec![leg(dec!(450), None)];
        assert!(!parsed.has_complete_leg_details());

        // Signal-wide expiration fills the gap.
        parsed.expiration = exp;
        assert!(parsed.has_complete_leg_details());

        parsed.legs = vec![];
        assert!(!parsed.has_complete_leg_details());
    }

    #[test]
    fn unknown_signal_type_falls_back_to_strategy() {
        let record = SignalRecord {
            signal_id: "sig-1".into(),
            ticker: "SPY".into(),
            classification: Classification::Signal,
            signal_type: SignalType::Unknown,
            received_at: Utc::now(),
            parsed: Some(ParsedSignal {
                ticker: "SPY".into(),
                strategy: "EXIT".into(),
                expiration: None,
                legs: vec![],
                limit_min: None,
                limit_max: None,
                limit_kind: LimitKind::Debit,
                size_pct: None,
                quantity: 1,
                raw_text: String::new(),
            }),
        };
        assert_eq!(record.effective_signal_type(), SignalType::Exit);
    }
}
