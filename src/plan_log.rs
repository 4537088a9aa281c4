use std::path::PathBuf;

use chrono::{DateTime, NaiveDate, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::jsonl::{self, StoreError};
use crate::model::{ExecutionResult, TradeIntent};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlanAction {
    #[serde(rename = "PLACE_ORDER")]
    PlaceOrder,
    #[serde(rename = "SKIP")]
    Skip,
}

/// One audit entry per execution decision, appended to the plan ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionPlan {
    pub ts: DateTime<Utc>,
    pub signal_id: String,
    pub action: PlanAction,
    /// Decision outcome label (executed, blocked, skip, ...).
    pub outcome: String,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub intent: Option<serde_json::Value>,
    #[serde(default)]
    pub result: Option<serde_json::Value>,
}

impl ExecutionPlan {
    pub fn placed(
        signal_id: &str,
        outcome: &str,
        intent: &TradeIntent,
        result: &ExecutionResult,
    ) -> Self {
        Self {
            ts: Utc::now(),
            signal_id: signal_id.to_string(),
            action: PlanAction::PlaceOrder,
            outcome: outcome.to_string(),
            reason: None,
            intent: serde_json::to_value(intent).ok(),
            result: serde_json::to_value(result).ok(),
        }
    }

    pub fn skipped(signal_id: &str, outcome: &str, reason: impl Into<String>) -> Self {
        Self {
            ts: Utc::now(),
            signal_id: signal_id.to_string(),
            action: PlanAction::Skip,
            outcome: outcome.to_string(),
            reason: Some(reason.into()),
            intent: None,
            result: None,
        }
    }
}

/// Append-only JSONL audit ledger of execution plans.
pub struct PlanLog {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl PlanLog {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn append(&self, entry: &ExecutionPlan) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock();
        jsonl::append_record(&self.path, entry)
    }

    pub fn entries_for_day(&self, day: NaiveDate) -> Result<Vec<ExecutionPlan>, StoreError> {
        let entries: Vec<ExecutionPlan> = jsonl::read_records(&self.path)?;
        Ok(entries
            .into_iter()
            .filter(|e| e.ts.date_naive() == day)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appends_and_filters_by_day() {
        let dir = tempfile::tempdir().unwrap();
        let log = PlanLog::open(dir.path().join("execution_plan.jsonl"));

        log.append(&ExecutionPlan::skipped("sig-1", "blocked", "preflight failed"))
            .unwrap();
        log.append(&ExecutionPlan::skipped("sig-2", "idle", "no signals"))
            .unwrap();

        let today = Utc::now().date_naive();
        let entries = log.entries_for_day(today).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].action, PlanAction::Skip);
        assert_eq!(entries[0].outcome, "blocked");

        let yesterday = today - chrono::Duration::days(1);
        assert!(log.entries_for_day(yesterday).unwrap().is_empty());
    }
}
