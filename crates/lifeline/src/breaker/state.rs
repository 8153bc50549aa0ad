// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::{Duration, Instant, SystemTime};

use serde::{Deserialize, Serialize};

/// The state of a circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakerState {
    /// Calls pass through.
    Closed,
    /// Calls are rejected.
    Open,
    /// A single trial call has been admitted.
    HalfOpen,
}

/// A point-in-time copy of one breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakerSnapshot {
    pub(super) state: BreakerState,
    pub(super) failure_count: u32,
    pub(super) reset_attempts: u32,
    pub(super) last_failure: Instant,
    pub(super) last_failure_at: SystemTime,
}

impl BreakerSnapshot {
    /// Returns the breaker state.
    #[must_use]
    pub fn state(&self) -> BreakerState {
        self.state
    }

    /// Returns the number of failures since the breaker last closed.
    #[must_use]
    pub fn failure_count(&self) -> u32 {
        self.failure_count
    }

    /// Returns how many trial calls the breaker has admitted.
    #[must_use]
    pub fn reset_attempts(&self) -> u32 {
        self.reset_attempts
    }

    /// Returns the monotonic time of the last failure.
    #[must_use]
    pub fn last_failure(&self) -> Instant {
        self.last_failure
    }

    /// Returns the wall-clock time of the last failure.
    #[must_use]
    pub fn last_failure_at(&self) -> SystemTime {
        self.last_failure_at
    }
}

#[derive(Debug)]
pub(super) struct Breaker {
    pub state: BreakerState,
    pub failure_count: u32,
    pub reset_attempts: u32,
    pub last_failure: Instant,
    pub last_failure_at: SystemTime,
    pub trial_started: Option<Instant>,
}

impl Breaker {
    pub fn new(now: Instant, now_at: SystemTime) -> Self {
        Self {
            state: BreakerState::Closed,
            failure_count: 0,
            reset_attempts: 0,
            last_failure: now,
            last_failure_at: now_at,
            trial_started: None,
        }
    }

    /// Returns the remaining rejection time, or `None` if the call may pass.
    pub fn admit(&mut self, now: Instant, reset_timeout: Duration) -> Option<Duration> {
        match self.state {
            BreakerState::Closed => None,
            BreakerState::Open => {
                let elapsed = now.saturating_duration_since(self.last_failure);
                if elapsed > reset_timeout {
                    self.state = BreakerState::HalfOpen;
                    self.start_trial(now);
                    None
                } else {
                    Some(reset_timeout.saturating_sub(elapsed))
                }
            }
            BreakerState::HalfOpen => {
                let started = self.trial_started.unwrap_or(self.last_failure);
                let elapsed = now.saturating_duration_since(started);
                if elapsed > reset_timeout {
                    // the previous trial never reported back
                    self.start_trial(now);
                    None
                } else {
                    Some(reset_timeout.saturating_sub(elapsed))
                }
            }
        }
    }

    /// Like [`Self::admit`] but never starts a trial.
    pub fn peek(&self, now: Instant, reset_timeout: Duration) -> Option<Duration> {
        let since = match self.state {
            BreakerState::Closed => return None,
            BreakerState::Open => self.last_failure,
            BreakerState::HalfOpen => self.trial_started.unwrap_or(self.last_failure),
        };

        let elapsed = now.saturating_duration_since(since);
        (elapsed <= reset_timeout).then(|| reset_timeout.saturating_sub(elapsed))
    }

    /// Records a failure and returns `true` if it opened the breaker.
    pub fn fail(&mut self, now: Instant, now_at: SystemTime, threshold: u32) -> bool {
        self.failure_count = self.failure_count.saturating_add(1);
        self.last_failure = now;
        self.last_failure_at = now_at;
        self.trial_started = None;

        let tripped = self.failure_count >= threshold.max(1);
        match self.state {
            BreakerState::Closed | BreakerState::HalfOpen if tripped => {
                self.state = BreakerState::Open;
                true
            }
            BreakerState::HalfOpen => {
                self.state = BreakerState::Closed;
                false
            }
            BreakerState::Closed | BreakerState::Open => false,
        }
    }

    pub fn succeed(&mut self) {
        self.state = BreakerState::Closed;
        self.failure_count = 0;
        self.trial_started = None;
    }

    pub fn snapshot(&self) -> BreakerSnapshot {
        BreakerSnapshot {
            state: self.state,
            failure_count: self.failure_count,
            reset_attempts: self.reset_attempts,
            last_failure: self.last_failure,
            last_failure_at: self.last_failure_at,
        }
    }

    fn start_trial(&mut self, now: Instant) {
        self.reset_attempts = self.reset_attempts.saturating_add(1);
        self.trial_started = Some(now);
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use super::*;

    const RESET: Duration = Duration::from_secs(300);

    fn open_breaker(now: Instant) -> Breaker {
        let mut breaker = Breaker::new(now, SystemTime::UNIX_EPOCH);
        for _ in 0..5 {
            breaker.fail(now, SystemTime::UNIX_EPOCH, 5);
        }
        breaker
    }

    #[test]
    fn opens_at_threshold() {
        let now = Instant::now();
        let mut breaker = Breaker::new(now, SystemTime::UNIX_EPOCH);

        for _ in 0..4 {
            assert!(!breaker.fail(now, SystemTime::UNIX_EPOCH, 5));
        }
        assert_eq!(breaker.state, BreakerState::Closed);

        assert!(breaker.fail(now, SystemTime::UNIX_EPOCH, 5));
        assert_eq!(breaker.state, BreakerState::Open);
        assert!(!breaker.fail(now, SystemTime::UNIX_EPOCH, 5));
    }

    #[test]
    fn open_rejects_until_timeout_elapsed() {
        let now = Instant::now();
        let mut breaker = open_breaker(now);

        assert_eq!(breaker.admit(now, RESET), Some(RESET));
        assert_eq!(breaker.admit(now + RESET, RESET), Some(Duration::ZERO));
        assert_eq!(breaker.state, BreakerState::Open);
        assert_eq!(breaker.reset_attempts, 0);

        assert_eq!(breaker.admit(now + RESET + Duration::from_millis(1), RESET), None);
        assert_eq!(breaker.state, BreakerState::HalfOpen);
        assert_eq!(breaker.reset_attempts, 1);
    }

    #[test]
    fn half_open_admits_single_trial() {
        let now = Instant::now();
        let mut breaker = open_breaker(now);
        let trial = now + RESET + Duration::from_secs(1);

        assert_eq!(breaker.admit(trial, RESET), None);
        assert_eq!(breaker.admit(trial, RESET), Some(RESET));
        assert_eq!(breaker.admit(trial + RESET, RESET), Some(Duration::ZERO));

        // abandoned trial
        assert_eq!(breaker.admit(trial + RESET + Duration::from_secs(1), RESET), None);
        assert_eq!(breaker.reset_attempts, 2);
    }

    #[test]
    fn peek_matches_admit_without_side_effects() {
        let now = Instant::now();
        let mut breaker = open_breaker(now);
        let later = now + RESET + Duration::from_secs(1);

        assert_eq!(breaker.peek(now, RESET), Some(RESET));
        assert_eq!(breaker.peek(later, RESET), None);
        assert_eq!(breaker.state, BreakerState::Open);

        breaker.admit(later, RESET);
        assert_eq!(breaker.peek(later, RESET), Some(RESET));
    }

    #[test]
    fn half_open_failure_reopens() {
        let now = Instant::now();
        let mut breaker = open_breaker(now);
        let trial = now + RESET + Duration::from_secs(1);
        breaker.admit(trial, RESET);

        assert!(breaker.fail(trial, SystemTime::UNIX_EPOCH, 5));
        assert_eq!(breaker.state, BreakerState::Open);
        assert_eq!(breaker.failure_count, 6);
        assert!(breaker.admit(trial, RESET).is_some());
    }

    #[test]
    fn half_open_failure_below_raised_threshold_closes() {
        let now = Instant::now();
        let mut breaker = open_breaker(now);
        breaker.admit(now + RESET + Duration::from_secs(1), RESET);

        assert!(!breaker.fail(now, SystemTime::UNIX_EPOCH, 10));
        assert_eq!(breaker.state, BreakerState::Closed);
    }

    #[test]
    fn success_resets() {
        let now = Instant::now();
        let mut breaker = open_breaker(now);

        breaker.succeed();

        let snapshot = breaker.snapshot();
        assert_eq!(snapshot.state(), BreakerState::Closed);
        assert_eq!(snapshot.failure_count(), 0);
        assert_eq!(breaker.admit(now, RESET), None);
    }
}
