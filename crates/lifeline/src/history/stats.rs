// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::collections::BTreeMap;
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};

use super::FailedAttempt;
use crate::{ErrorCategory, OperationKey};

/// Aggregated view over the failure history.
#[derive(Debug, Clone)]
pub struct FailureStats {
    total_failures: usize,
    by_category: BTreeMap<ErrorCategory, usize>,
    by_operation: BTreeMap<String, usize>,
    recent: Vec<FailedAttempt>,
    recent_count: usize,
    open_breakers: Vec<OperationKey>,
}

impl FailureStats {
    pub(super) fn collect<'a, I>(entries: I, now: SystemTime, window: Duration, limit: usize, open_breakers: Vec<OperationKey>) -> Self
    where
        I: DoubleEndedIterator<Item = &'a FailedAttempt> + Clone,
    {
        // entries stamped after `now` count as recent
        let is_recent = |entry: &FailedAttempt| now.duration_since(entry.timestamp).unwrap_or_default() <= window;

        let mut stats = Self {
            total_failures: 0,
            by_category: BTreeMap::new(),
            by_operation: BTreeMap::new(),
            recent: Vec::new(),
            recent_count: 0,
            open_breakers,
        };

        for entry in entries.clone() {
            stats.total_failures += 1;
            *stats.by_category.entry(entry.category).or_default() += 1;
            *stats.by_operation.entry(entry.operation_name().to_string()).or_default() += 1;
            stats.recent_count += usize::from(is_recent(entry));
        }

        stats.recent = entries.rev().filter(|entry| is_recent(*entry)).take(limit).cloned().collect();
        stats.recent.reverse();
        stats
    }

    /// Returns the number of failures in the history.
    #[must_use]
    pub fn total_failures(&self) -> usize {
        self.total_failures
    }

    /// Returns failure counts per category.
    #[must_use]
    pub fn by_category(&self) -> &BTreeMap<ErrorCategory, usize> {
        &self.by_category
    }

    /// Returns failure counts per operation name.
    #[must_use]
    pub fn by_operation(&self) -> &BTreeMap<String, usize> {
        &self.by_operation
    }

    /// Returns the newest failures inside the recent window, oldest first.
    ///
    /// The list is capped; see [`RecoveryConfig::recent_limit`][crate::RecoveryConfig::recent_limit].
    #[must_use]
    pub fn recent(&self) -> &[FailedAttempt] {
        &self.recent
    }

    /// Returns the keys of all open circuit breakers.
    #[must_use]
    pub fn open_breakers(&self) -> &[OperationKey] {
        &self.open_breakers
    }

    /// Summarizes the statistics into a health report.
    #[must_use]
    pub fn health(&self) -> HealthReport {
        let status = if !self.open_breakers.is_empty() {
            HealthStatus::Unhealthy
        } else if self.recent_count > 0 {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        };

        HealthReport {
            status,
            recent_failures: self.recent_count,
            open_breakers: self.open_breakers.len(),
        }
    }
}

/// Coarse health of the recovery engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    /// No open breakers and no recent failures.
    Healthy,
    /// Failures happened within the recent window.
    Degraded,
    /// At least one circuit breaker is open.
    Unhealthy,
}

/// Health summary suitable for status endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthReport {
    /// The overall status.
    pub status: HealthStatus,
    /// Failures within the recent window.
    pub recent_failures: usize,
    /// Number of open circuit breakers.
    pub open_breakers: usize,
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::failed_attempt;

    const WINDOW: Duration = Duration::from_secs(300);

    fn at(secs: u64) -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_secs(secs)
    }

    #[test]
    fn counts_by_category_and_operation() {
        let entries = [
            failed_attempt("navigate", 0, "tab crashed", at(0)),
            failed_attempt("navigate", 1, "navigation aborted", at(0)),
            failed_attempt("extract-data", 0, "permission denied", at(0)),
        ];

        let stats = FailureStats::collect(entries.iter(), at(10_000), WINDOW, 10, Vec::new());

        assert_eq!(stats.total_failures(), 3);
        assert_eq!(stats.by_category().get(&ErrorCategory::NavigationFailed), Some(&2));
        assert_eq!(stats.by_category().get(&ErrorCategory::PermissionDenied), Some(&1));
        assert_eq!(stats.by_operation().get("navigate"), Some(&2));
        assert_eq!(stats.by_operation().get("extract-data"), Some(&1));
        assert!(stats.recent().is_empty());
        assert_eq!(stats.health().status, HealthStatus::Healthy);
    }

    #[test]
    fn recent_is_windowed_and_limited() {
        let entries: Vec<_> = (0..15).map(|index| failed_attempt("op", index, "boom", at(1000 + index as u64))).collect();
        let old = failed_attempt("op", 99, "boom", at(0));

        let stats = FailureStats::collect(std::iter::once(&old).chain(entries.iter()), at(1100), WINDOW, 10, Vec::new());

        assert_eq!(stats.recent().len(), 10);
        assert_eq!(stats.recent().first().map(FailedAttempt::work_item_index), Some(5));
        assert_eq!(stats.recent().last().map(FailedAttempt::work_item_index), Some(14));

        let health = stats.health();
        assert_eq!(health.status, HealthStatus::Degraded);
        assert_eq!(health.recent_failures, 15);
    }

    #[test]
    fn zero_limit_still_counts_recent_failures() {
        let entries: Vec<_> = (0..3).map(|index| failed_attempt("op", index, "boom", at(1000))).collect();

        let stats = FailureStats::collect(entries.iter(), at(1000), WINDOW, 0, Vec::new());

        assert!(stats.recent().is_empty());
        assert_eq!(stats.health().recent_failures, 3);
        assert_eq!(stats.total_failures(), 3);
    }

    #[test]
    fn open_breaker_is_unhealthy() {
        let stats = FailureStats::collect(std::iter::empty(), at(0), WINDOW, 10, vec![OperationKey::from("op_1")]);

        assert_eq!(
            stats.health(),
            HealthReport {
                status: HealthStatus::Unhealthy,
                recent_failures: 0,
                open_breakers: 1,
            }
        );
        assert_eq!(stats.open_breakers(), &[OperationKey::from("op_1")]);
    }

    #[test]
    fn health_serializes_snake_case() {
        let json = serde_json::to_value(HealthReport {
            status: HealthStatus::Degraded,
            recent_failures: 2,
            open_breakers: 0,
        })
        .unwrap();

        assert_eq!(json["status"], "degraded");
    }
}
