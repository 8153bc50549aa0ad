// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::collections::HashMap;
use std::time::Duration;

use parking_lot::Mutex;
use tick::Clock;

use super::state::Breaker;
use super::{BreakerSnapshot, BreakerState};
use crate::OperationKey;

/// Result of asking a breaker whether a call may pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Admission {
    Admitted,
    Rejected { retry_after: Duration },
}

/// Circuit breakers keyed by operation.
#[derive(Debug)]
pub(crate) struct BreakerRegistry {
    breakers: Mutex<HashMap<OperationKey, Breaker>>,
    clock: Clock,
}

impl BreakerRegistry {
    pub(crate) fn new(clock: Clock) -> Self {
        Self {
            breakers: Mutex::new(HashMap::new()),
            clock,
        }
    }

    /// Checks whether a call for `key` may pass, moving an expired open breaker to half-open.
    pub(crate) fn admit(&self, key: &OperationKey, reset_timeout: Duration) -> Admission {
        // read the clock before taking the lock
        let now = self.clock.instant();

        let mut breakers = self.breakers.lock();
        match breakers.get_mut(key).and_then(|breaker| breaker.admit(now, reset_timeout)) {
            Some(retry_after) => Admission::Rejected { retry_after },
            None => Admission::Admitted,
        }
    }

    /// Returns the remaining rejection time of `key` without changing any state.
    pub(crate) fn peek(&self, key: &OperationKey, reset_timeout: Duration) -> Option<Duration> {
        let now = self.clock.instant();
        self.breakers.lock().get(key).and_then(|breaker| breaker.peek(now, reset_timeout))
    }

    /// Records a failure for `key` and returns `true` if it opened the breaker.
    pub(crate) fn record_failure(&self, key: &OperationKey, threshold: u32) -> bool {
        let now = self.clock.instant();
        let now_at = self.clock.system_time();

        self.breakers
            .lock()
            .entry(key.clone())
            .or_insert_with(|| Breaker::new(now, now_at))
            .fail(now, now_at, threshold)
    }

    pub(crate) fn record_success(&self, key: &OperationKey) {
        if let Some(breaker) = self.breakers.lock().get_mut(key) {
            breaker.succeed();
        }
    }

    pub(crate) fn reset(&self, key: &OperationKey) {
        self.record_success(key);
    }

    pub(crate) fn snapshot(&self, key: &OperationKey) -> Option<BreakerSnapshot> {
        self.breakers.lock().get(key).map(Breaker::snapshot)
    }

    pub(crate) fn open_keys(&self) -> Vec<OperationKey> {
        let mut keys: Vec<_> = self
            .breakers
            .lock()
            .iter()
            .filter(|(_, breaker)| breaker.state == BreakerState::Open)
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort();
        keys
    }

    /// Drops breakers whose last failure is older than `idle` and returns how many were dropped.
    pub(crate) fn sweep_idle(&self, idle: Duration) -> usize {
        let now = self.clock.instant();

        let mut breakers = self.breakers.lock();
        let before = breakers.len();
        breakers.retain(|_, breaker| now.saturating_duration_since(breaker.last_failure) <= idle);
        before - breakers.len()
    }

    pub(crate) fn clear(&self) {
        self.breakers.lock().clear();
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.breakers.lock().len()
    }
}
