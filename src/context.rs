use chrono::{DateTime, TimeZone, Utc};
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// Provides the current time. Decouples the control loop and executors from
/// `Utc::now()` so historical replay and tests are deterministic.
pub trait TimeProvider: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Provides unique ids for intents, positions and synthesized order ids.
pub trait IdProvider: Send + Sync {
    fn new_id(&self) -> Uuid;
}

#[derive(Clone)]
pub struct ExecutionContext {
    pub time: Arc<dyn TimeProvider>,
    pub id: Arc<dyn IdProvider>,
}

impl ExecutionContext {
    pub fn new_system() -> Self {
        Self {
            time: Arc::new(SystemTimeProvider),
            id: Arc::new(RandomIdProvider),
        }
    }

    pub fn new_simulated(start: DateTime<Utc>) -> Self {
        Self {
            time: Arc::new(SimulatedTimeProvider::new(start)),
            id: Arc::new(SequentialIdProvider::new()),
        }
    }
}

pub struct SystemTimeProvider;

impl TimeProvider for SystemTimeProvider {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

pub struct RandomIdProvider;

impl IdProvider for RandomIdProvider {
    fn new_id(&self) -> Uuid {
        Uuid::new_v4()
    }
}

pub struct SimulatedTimeProvider {
    current_millis: AtomicI64,
}

impl SimulatedTimeProvider {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            current_millis: AtomicI64::new(start.timestamp_millis()),
        }
    }

    pub fn set(&self, time: DateTime<Utc>) {
        self.current_millis
            .store(time.timestamp_millis(), Ordering::SeqCst);
    }

    pub fn advance_millis(&self, millis: i64) {
        self.current_millis.fetch_add(millis, Ordering::SeqCst);
    }
}

impl TimeProvider for SimulatedTimeProvider {
    fn now(&self) -> DateTime<Utc> {
        let ms = self.current_millis.load(Ordering::SeqCst);
        Utc.timestamp_millis_opt(ms).unwrap()
    }
}

pub struct SequentialIdProvider {
    counter: AtomicU64,
}

impl SequentialIdProvider {
    pub fn new() -> Self {
        Self {
            counter: AtomicU64::new(0),
        }
    }
}

impl Default for SequentialIdProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl IdProvider for SequentialIdProvider {
    fn new_id(&self) -> Uuid {
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        Uuid::from_u128(n as u128)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequential_ids_are_stable() {
        let ids = SequentialIdProvider::new();
        let a = ids.new_id();
        let b = ids.new_id();
        assert_ne!(a, b);
        assert_eq!(a, Uuid::from_u128(1));
    }

    #[test]
    fn simulated_time_advances() {
        let start = Utc.with_ymd_and_hms(2026, 3, 2, 14, 30, 0).unwrap();
        let time = SimulatedTimeProvider::new(start);
        time.advance_millis(60_000);
        assert_eq!(time.now(), start + chrono::Duration::minutes(1));
    }
}
