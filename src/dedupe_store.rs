use std::collections::HashSet;
use std::path::PathBuf;

use chrono::{DateTime, NaiveDate, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::jsonl::{self, StoreError};
use crate::model::{ResultStatus, TradeAction};
use crate::mode_manager::RequestedMode;

/// One executed-signal entry. Written once, read-only afterwards; the
/// existence of a record for a signal id is the sole authority for
/// "already executed".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DedupeRecord {
    pub signal_id: String,
    pub executed_at: DateTime<Utc>,
    pub execution_mode: RequestedMode,
    pub intent_id: Uuid,
    pub result_status: ResultStatus,
    #[serde(default)]
    pub underlying: Option<String>,
    #[serde(default)]
    pub action: Option<TradeAction>,
}

struct DedupeState {
    ids: HashSet<String>,
    records: Vec<DedupeRecord>,
}

/// Append-only ledger of executed signals.
///
/// The controller checks it before building an intent and preflight checks
/// it again; the commit point is `mark_if_absent`, which holds the store
/// lock across check and append so the automatic loop and a racing manual
/// approval cannot both mark the same signal.
pub struct DedupeStore {
    path: PathBuf,
    state: Mutex<DedupeState>,
}

impl DedupeStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let records: Vec<DedupeRecord> = jsonl::read_records(&path)?;
        let ids = records.iter().map(|r| r.signal_id.clone()).collect();
        Ok(Self {
            path,
            state: Mutex::new(DedupeState { ids, records }),
        })
    }

    pub fn is_executed(&self, signal_id: &str) -> bool {
        if signal_id.is_empty() {
            return false;
        }
        self.state.lock().ids.contains(signal_id)
    }

    /// Write the record unless the signal id is already present. Returns
    /// true if this call wrote the record, false on a dedupe hit.
    pub fn mark_if_absent(&self, record: DedupeRecord) -> Result<bool, StoreError> {
        if record.signal_id.is_empty() {
            return Ok(false);
        }

        let mut state = self.state.lock();
        if state.ids.contains(&record.signal_id) {
            return Ok(false);
        }

        jsonl::append_record(&self.path, &record)?;
        info!(
            signal_id = %record.signal_id,
            intent_id = %record.intent_id,
            mode = ?record.execution_mode,
            "Signal marked executed"
        );
        state.ids.insert(record.signal_id.clone());
        state.records.push(record);
        Ok(true)
    }

    pub fn record_for(&self, signal_id: &str) -> Option<DedupeRecord> {
        self.state
            .lock()
            .records
            .iter()
            .find(|r| r.signal_id == signal_id)
            .cloned()
    }

    pub fn executed_count_for_day(&self, day: NaiveDate) -> usize {
        self.state
            .lock()
            .records
            .iter()
            .filter(|r| r.executed_at.date_naive() == day)
            .count()
    }

    pub fn all(&self) -> Vec<DedupeRecord> {
        self.state.lock().records.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(signal_id: &str) -> DedupeRecord {
        DedupeRecord {
            signal_id: signal_id.to_string(),
            executed_at: Utc::now(),
            execution_mode: RequestedMode::Paper,
            intent_id: Uuid::new_v4(),
            result_status: ResultStatus::Simulated,
            underlying: Some("SPY".to_string()),
            action: None,
        }
    }

    #[test]
    fn mark_if_absent_writes_once() {
        let dir = tempfile::tempdir().unwrap();
        let store = DedupeStore::open(dir.path().join("executed.jsonl")).unwrap();

        assert!(!store.is_executed("sig-1"));
        assert!(store.mark_if_absent(record("sig-1")).unwrap());
        assert!(store.is_executed("sig-1"));

        // Second mark for the same signal is refused.
        assert!(!store.mark_if_absent(record("sig-1")).unwrap());
        assert_eq!(store.all().len(), 1);
    }

    #[test]
    fn records_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("executed.jsonl");

        {
            let store = DedupeStore::open(&path).unwrap();
            store.mark_if_absent(record("sig-1")).unwrap();
            store.mark_if_absent(record("sig-2")).unwrap();
        }

        let reopened = DedupeStore::open(&path).unwrap();
        assert!(reopened.is_executed("sig-1"));
        assert!(reopened.is_executed("sig-2"));
        assert_eq!(reopened.all().len(), 2);
    }

    #[test]
    fn empty_signal_id_is_never_executed() {
        let dir = tempfile::tempdir().unwrap();
        let store = DedupeStore::open(dir.path().join("executed.jsonl")).unwrap();
        assert!(!store.mark_if_absent(record("")).unwrap());
        assert!(!store.is_executed(""));
    }

    #[test]
    fn counts_by_calendar_day() {
        let dir = tempfile::tempdir().unwrap();
        let store = DedupeStore::open(dir.path().join("executed.jsonl")).unwrap();
        store.mark_if_absent(record("sig-1")).unwrap();

        let today = Utc::now().date_naive();
        assert_eq!(store.executed_count_for_day(today), 1);
        assert_eq!(
            store.executed_count_for_day(today - chrono::Duration::days(1)),
            0
        );
    }
}
