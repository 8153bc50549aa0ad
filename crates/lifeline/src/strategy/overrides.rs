// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::Duration;

use super::{RecoveryStrategy, RetryRule};
use crate::engine::{FallbackAction, ShouldRetry};
use crate::{Backoff, BoxError, FallbackArgs, Failure, OperationContext};

/// Adjusts the strategy of a single [`execute_with_override`][crate::RecoveryEngine::execute_with_override]
/// call.
///
/// Every field is optional; fields left unset keep the value of the category's registered
/// strategy. Overrides apply to whichever category the failures of that call classify as.
///
/// # Examples
///
/// ```rust
/// use lifeline::{Backoff, RetryRule, StrategyOverride};
///
/// let overrides = StrategyOverride::new()
///     .max_retries(1)
///     .backoff(Backoff::Fixed)
///     .should_retry(|failure, _attempt, _context| !failure.message().contains("fatal"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct StrategyOverride {
    max_retries: Option<u32>,
    backoff: Option<Backoff>,
    recovery_timeout: Option<Duration>,
    retry_rule: Option<RetryRule>,
    should_retry: Option<ShouldRetry>,
    fallback_action: Option<FallbackAction>,
}

impl StrategyOverride {
    /// Creates an override that changes nothing.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the highest attempt number that may still be retried.
    #[must_use]
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    /// Overrides the backoff shape.
    #[must_use]
    pub fn backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = Some(backoff);
        self
    }

    /// Overrides how long the environment hook may run.
    #[must_use]
    pub fn recovery_timeout(mut self, recovery_timeout: Duration) -> Self {
        self.recovery_timeout = Some(recovery_timeout);
        self
    }

    /// Overrides the pure retry rule.
    #[must_use]
    pub fn retry_rule(mut self, retry_rule: RetryRule) -> Self {
        self.retry_rule = Some(retry_rule);
        self
    }

    /// Replaces the context-aware retry veto registered for the category.
    #[must_use]
    pub fn should_retry(mut self, should_retry: impl Fn(&Failure, u32, &OperationContext) -> bool + Send + Sync + 'static) -> Self {
        self.should_retry = Some(ShouldRetry::new(should_retry));
        self
    }

    /// Replaces the fallback action registered for the category.
    #[must_use]
    pub fn fallback_action(
        mut self,
        fallback_action: impl Fn(FallbackArgs<'_>) -> Result<(), BoxError> + Send + Sync + 'static,
    ) -> Self {
        self.fallback_action = Some(FallbackAction::new(fallback_action));
        self
    }

    pub(crate) fn apply(&self, mut strategy: RecoveryStrategy) -> RecoveryStrategy {
        if let Some(max_retries) = self.max_retries {
            strategy.max_retries = max_retries;
        }
        if let Some(backoff) = self.backoff {
            strategy.backoff = backoff;
        }
        if let Some(recovery_timeout) = self.recovery_timeout {
            strategy.recovery_timeout = recovery_timeout;
        }
        if let Some(retry_rule) = &self.retry_rule {
            strategy.retry_rule = retry_rule.clone();
        }
        strategy
    }

    pub(crate) fn should_retry_callback(&self) -> Option<&ShouldRetry> {
        self.should_retry.as_ref()
    }

    pub(crate) fn fallback_callback(&self) -> Option<&FallbackAction> {
        self.fallback_action.as_ref()
    }
}
