// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Bounded record of failed operations.
//!
//! Every call that ends without success (retries exhausted or vetoed) appends one
//! [`FailedAttempt`]. The log is capped: once it grows past its capacity only the most recent
//! entries are kept. [`FailureStats`] and [`HealthReport`] are derived views over it.

mod stats;

use std::collections::VecDeque;
use std::time::{Duration, SystemTime};

use parking_lot::Mutex;
pub use stats::{FailureStats, HealthReport, HealthStatus};

use crate::{Attachment, ErrorCategory, OperationContext, OperationKey};

/// One operation call that ended without success.
#[derive(Debug, Clone)]
pub struct FailedAttempt {
    pub(crate) category: ErrorCategory,
    pub(crate) error_message: String,
    pub(crate) attempts: u32,
    pub(crate) timestamp: SystemTime,
    pub(crate) context: OperationContext,
    pub(crate) recovery_attempted: bool,
}

impl FailedAttempt {
    /// Returns the operation name.
    #[must_use]
    pub fn operation_name(&self) -> &str {
        self.context.operation_name()
    }

    /// Returns the index of the work item the operation acted on.
    #[must_use]
    pub fn work_item_index(&self) -> usize {
        self.context.work_item_index()
    }

    /// Returns the work item attached to the operation's context.
    #[must_use]
    pub fn work_item(&self) -> Option<&Attachment> {
        self.context.work_item_attachment()
    }

    /// Returns the breaker key of the operation.
    #[must_use]
    pub fn key(&self) -> OperationKey {
        self.context.key()
    }

    /// Returns the message of the last failure.
    #[must_use]
    pub fn error_message(&self) -> &str {
        &self.error_message
    }

    /// Returns the category of the last failure.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        self.category
    }

    /// Returns how many attempts were made.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Returns when the call gave up.
    #[must_use]
    pub fn timestamp(&self) -> SystemTime {
        self.timestamp
    }

    /// Returns the context the operation ran with.
    #[must_use]
    pub fn context(&self) -> &OperationContext {
        &self.context
    }

    /// Returns `true` if at least one retry was made before giving up.
    #[must_use]
    pub fn recovery_attempted(&self) -> bool {
        self.recovery_attempted
    }
}

/// Append-only, self-trimming log of failed calls.
#[derive(Debug, Default)]
pub(crate) struct FailureHistory {
    entries: Mutex<VecDeque<FailedAttempt>>,
}

impl FailureHistory {
    /// Appends `attempt`; when the log grows past `capacity` only the newest `retain` entries stay.
    pub(crate) fn record(&self, attempt: FailedAttempt, capacity: usize, retain: usize) {
        let mut entries = self.entries.lock();
        entries.push_back(attempt);

        if entries.len() > capacity {
            let keep = retain.min(capacity);
            let excess = entries.len() - keep;
            entries.drain(..excess);
        }
    }

    /// Drops all but the newest `retain` entries.
    pub(crate) fn trim(&self, retain: usize) -> usize {
        let mut entries = self.entries.lock();
        let excess = entries.len().saturating_sub(retain);
        entries.drain(..excess);
        excess
    }

    pub(crate) fn stats(&self, now: SystemTime, window: Duration, limit: usize, open_breakers: Vec<OperationKey>) -> FailureStats {
        FailureStats::collect(self.entries.lock().iter(), now, window, limit, open_breakers)
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub(crate) fn clear(&self) {
        self.entries.lock().clear();
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::failed_attempt;

    #[test]
    fn static_assertions() {
        static_assertions::assert_impl_all!(FailedAttempt: Send, Sync, Clone);
        static_assertions::assert_impl_all!(FailureHistory: Send, Sync);
    }

    #[test]
    fn accessors_read_through_context() {
        let attempt = failed_attempt("navigate", 4, "tab crashed", SystemTime::UNIX_EPOCH);

        assert_eq!(attempt.operation_name(), "navigate");
        assert_eq!(attempt.work_item_index(), 4);
        assert_eq!(attempt.key().as_str(), "navigate_4");
        assert_eq!(attempt.category(), ErrorCategory::NavigationFailed);
        assert_eq!(attempt.error_message(), "tab crashed");
        assert!(attempt.work_item().is_none());
    }

    #[test]
    fn never_exceeds_capacity_and_keeps_newest() {
        let history = FailureHistory::default();

        for index in 0..500 {
            history.record(failed_attempt("op", index, "boom", SystemTime::UNIX_EPOCH), 500, 250);
        }
        assert_eq!(history.len(), 500);

        history.record(failed_attempt("op", 500, "boom", SystemTime::UNIX_EPOCH), 500, 250);
        assert_eq!(history.len(), 250);

        let oldest = history.entries.lock().front().map(FailedAttempt::work_item_index);
        let newest = history.entries.lock().back().map(FailedAttempt::work_item_index);
        assert_eq!(oldest, Some(251));
        assert_eq!(newest, Some(500));

        history.record(failed_attempt("op", 501, "boom", SystemTime::UNIX_EPOCH), 500, 250);
        assert_eq!(history.len(), 251);
    }

    #[test]
    fn retain_is_clamped_to_capacity() {
        let history = FailureHistory::default();

        for index in 0..4 {
            history.record(failed_attempt("op", index, "boom", SystemTime::UNIX_EPOCH), 3, 10);
        }

        assert_eq!(history.len(), 3);
    }

    #[test]
    fn trim_and_clear() {
        let history = FailureHistory::default();
        for index in 0..10 {
            history.record(failed_attempt("op", index, "boom", SystemTime::UNIX_EPOCH), 500, 250);
        }

        assert_eq!(history.trim(4), 6);
        assert_eq!(history.len(), 4);
        assert_eq!(history.trim(4), 0);

        history.clear();
        assert_eq!(history.len(), 0);
    }
}
