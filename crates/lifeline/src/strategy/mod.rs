// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Per-category recovery policies.

mod defaults;
mod overrides;
mod registry;

use std::borrow::Cow;
use std::time::Duration;

pub(crate) use defaults::default_strategy;
pub use overrides::StrategyOverride;
pub(crate) use registry::StrategyRegistry;
use serde::{Deserialize, Serialize};

use crate::config::millis;
use crate::{Backoff, ErrorCategory};

/// The pure, context-free part of a retry decision.
///
/// # Examples
///
/// ```rust
/// use lifeline::RetryRule;
///
/// let rule = RetryRule::unless_message_contains("permanent");
///
/// assert!(rule.permits("connection timeout"));
/// assert!(!rule.permits("Permanent timeout, giving up"));
/// assert!(!RetryRule::Never.permits("anything"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryRule {
    /// Every failure may be retried.
    Always,
    /// No failure is retried.
    Never,
    /// Failures are retried unless their message contains the phrase (case-insensitive).
    UnlessMessageContains(Cow<'static, str>),
}

impl RetryRule {
    /// Creates a rule that vetoes retries of messages containing `phrase`.
    pub fn unless_message_contains(phrase: impl Into<Cow<'static, str>>) -> Self {
        Self::UnlessMessageContains(phrase.into())
    }

    /// Returns `true` if the rule allows retrying a failure with the given message.
    #[must_use]
    pub fn permits(&self, message: &str) -> bool {
        match self {
            Self::Always => true,
            Self::Never => false,
            Self::UnlessMessageContains(phrase) => !message.to_lowercase().contains(&phrase.to_lowercase()),
        }
    }
}

/// How failures of one [`ErrorCategory`] are recovered.
///
/// A strategy is plain data: it decides how often to retry, how long to wait in between and
/// how long the category's environment hook may run. Context-aware callbacks are registered
/// separately on the [`RecoveryEngineBuilder`][crate::RecoveryEngineBuilder].
///
/// # Examples
///
/// ```rust
/// use std::time::Duration;
///
/// use lifeline::{Backoff, ErrorCategory, RecoveryStrategy, RetryRule};
///
/// let strategy = RecoveryStrategy::new(ErrorCategory::NavigationFailed)
///     .with_max_retries(4)
///     .with_backoff(Backoff::Fibonacci)
///     .with_recovery_timeout(Duration::from_secs(10))
///     .with_retry_rule(RetryRule::unless_message_contains("closed"));
///
/// assert!(strategy.permits(4, "tab navigation failed"));
/// assert!(!strategy.permits(5, "tab navigation failed"));
/// assert!(!strategy.permits(1, "tab closed"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveryStrategy {
    category: ErrorCategory,
    max_retries: u32,
    backoff: Backoff,
    #[serde(with = "millis")]
    recovery_timeout: Duration,
    retry_rule: RetryRule,
}

impl RecoveryStrategy {
    /// Creates a strategy with a single retry, exponential backoff, a `15s` recovery timeout and
    /// [`RetryRule::Always`].
    #[must_use]
    pub fn new(category: ErrorCategory) -> Self {
        Self {
            category,
            max_retries: 1,
            backoff: Backoff::Exponential,
            recovery_timeout: Duration::from_secs(15),
            retry_rule: RetryRule::Always,
        }
    }

    /// Sets the highest attempt number that may still be retried.
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Sets the backoff shape.
    #[must_use]
    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Sets how long the environment hook may run after each backoff wait.
    #[must_use]
    pub fn with_recovery_timeout(mut self, recovery_timeout: Duration) -> Self {
        self.recovery_timeout = recovery_timeout;
        self
    }

    /// Sets the pure retry rule.
    #[must_use]
    pub fn with_retry_rule(mut self, retry_rule: RetryRule) -> Self {
        self.retry_rule = retry_rule;
        self
    }

    /// Returns the category this strategy applies to.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        self.category
    }

    /// Returns the highest attempt number that may still be retried.
    #[must_use]
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Returns the backoff shape.
    #[must_use]
    pub fn backoff(&self) -> Backoff {
        self.backoff
    }

    /// Returns how long the environment hook may run.
    #[must_use]
    pub fn recovery_timeout(&self) -> Duration {
        self.recovery_timeout
    }

    /// Returns the pure retry rule.
    #[must_use]
    pub fn retry_rule(&self) -> &RetryRule {
        &self.retry_rule
    }

    /// Returns `true` if a failure of the given 1-based attempt with the given message may be
    /// retried.
    #[must_use]
    pub fn permits(&self, attempt: u32, message: &str) -> bool {
        attempt <= self.max_retries && self.retry_rule.permits(message)
    }

    pub(crate) fn set_category(&mut self, category: ErrorCategory) {
        self.category = category;
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_assertions() {
        static_assertions::assert_impl_all!(RecoveryStrategy: Send, Sync, Clone);
        static_assertions::assert_impl_all!(RetryRule: Send, Sync, Clone);
    }

    #[test]
    fn veto_phrase_is_case_insensitive() {
        let rule = RetryRule::unless_message_contains("No Data Available");

        assert!(!rule.permits("extraction failed: no data available"));
        assert!(!rule.permits("NO DATA AVAILABLE"));
        assert!(rule.permits("field missing"));
    }

    #[test]
    fn permits_respects_retry_ceiling() {
        let strategy = RecoveryStrategy::new(ErrorCategory::Unknown).with_max_retries(2);

        assert!(strategy.permits(1, "boom"));
        assert!(strategy.permits(2, "boom"));
        assert!(!strategy.permits(3, "boom"));
    }

    #[test]
    fn never_rule_blocks_first_attempt() {
        let strategy = RecoveryStrategy::new(ErrorCategory::PermissionDenied)
            .with_max_retries(10)
            .with_retry_rule(RetryRule::Never);

        assert!(!strategy.permits(1, "permission denied"));
    }

    #[test]
    fn serde_shape() {
        let strategy = RecoveryStrategy::new(ErrorCategory::NetworkTimeout)
            .with_max_retries(3)
            .with_recovery_timeout(Duration::from_secs(30))
            .with_retry_rule(RetryRule::unless_message_contains("permanent"));

        let json = serde_json::to_value(&strategy).unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "category": "network_timeout",
                "max_retries": 3,
                "backoff": "exponential",
                "recovery_timeout": 30000,
                "retry_rule": { "unless_message_contains": "permanent" },
            })
        );
        assert_eq!(serde_json::from_value::<RecoveryStrategy>(json).unwrap(), strategy);
    }
}
