// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::Duration;

use crate::{ErrorCategory, Failure, OperationContext, OperationKey};

/// Arguments for a fallback action.
///
/// Fallback actions run synchronously after a failure was judged retryable and before the
/// backoff wait starts.
#[derive(Debug)]
pub struct FallbackArgs<'a> {
    pub(super) failure: &'a Failure,
    pub(super) attempt: u32,
    pub(super) context: &'a OperationContext,
}

impl FallbackArgs<'_> {
    /// Returns the failure that triggered the retry.
    #[must_use]
    pub fn failure(&self) -> &Failure {
        self.failure
    }

    /// Returns the 1-based number of the attempt that failed.
    #[must_use]
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Returns the operation's context.
    #[must_use]
    pub fn context(&self) -> &OperationContext {
        self.context
    }
}

/// Arguments for an environment hook.
///
/// Hooks run asynchronously after the backoff wait, so the arguments own their data.
#[derive(Debug, Clone)]
pub struct HookArgs {
    pub(super) category: ErrorCategory,
    pub(super) attempt: u32,
    pub(super) message: String,
    pub(super) context: OperationContext,
}

impl HookArgs {
    /// Returns the category of the failure being recovered from.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        self.category
    }

    /// Returns the 1-based number of the attempt that failed.
    #[must_use]
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Returns the failure message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the operation's context.
    #[must_use]
    pub fn context(&self) -> &OperationContext {
        &self.context
    }
}

/// Arguments for the [`on_retry`][crate::RecoveryEngineBuilder::on_retry] observer.
#[derive(Debug)]
pub struct RetryNotice<'a> {
    pub(super) key: &'a OperationKey,
    pub(super) failure: &'a Failure,
    pub(super) attempt: u32,
    pub(super) delay: Duration,
    pub(super) context: &'a OperationContext,
}

impl RetryNotice<'_> {
    /// Returns the breaker key of the operation.
    #[must_use]
    pub fn key(&self) -> &OperationKey {
        self.key
    }

    /// Returns the failure that is being retried.
    #[must_use]
    pub fn failure(&self) -> &Failure {
        self.failure
    }

    /// Returns the 1-based number of the attempt that failed.
    #[must_use]
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Returns how long the engine waits before the next attempt.
    #[must_use]
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Returns the operation's context.
    #[must_use]
    pub fn context(&self) -> &OperationContext {
        self.context
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_args() {
        let failure = Failure::new("element not found");
        let context = OperationContext::new("extract-data", 1);
        let args = FallbackArgs {
            failure: &failure,
            attempt: 2,
            context: &context,
        };

        assert_eq!(args.failure().category(), ErrorCategory::DomNotFound);
        assert_eq!(args.attempt(), 2);
        assert_eq!(args.context().work_item_index(), 1);
    }

    #[test]
    fn hook_args() {
        let args = HookArgs {
            category: ErrorCategory::MemoryLimit,
            attempt: 1,
            message: "heap exhausted".to_string(),
            context: OperationContext::new("ai-review", 0),
        };

        assert_eq!(args.category(), ErrorCategory::MemoryLimit);
        assert_eq!(args.attempt(), 1);
        assert_eq!(args.message(), "heap exhausted");
        assert_eq!(args.clone().context().operation_name(), "ai-review");
    }

    #[test]
    fn retry_notice() {
        let key = OperationKey::from("navigate_3");
        let failure = Failure::new("navigation aborted");
        let context = OperationContext::new("navigate", 3);
        let notice = RetryNotice {
            key: &key,
            failure: &failure,
            attempt: 1,
            delay: Duration::from_secs(1),
            context: &context,
        };

        assert_eq!(notice.key(), &key);
        assert_eq!(notice.failure().message(), "navigation aborted");
        assert_eq!(notice.attempt(), 1);
        assert_eq!(notice.delay(), Duration::from_secs(1));
        assert_eq!(notice.context().operation_name(), "navigate");
    }
}
