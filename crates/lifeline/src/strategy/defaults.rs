// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::borrow::Cow;
use std::time::Duration;

use super::{RecoveryStrategy, RetryRule};
use crate::{Backoff, ErrorCategory};

const fn unless(phrase: &'static str) -> RetryRule {
    RetryRule::UnlessMessageContains(Cow::Borrowed(phrase))
}

/// Returns the built-in strategy of a category.
pub(crate) fn default_strategy(category: ErrorCategory) -> RecoveryStrategy {
    let (max_retries, backoff, timeout_secs, retry_rule) = match category {
        ErrorCategory::NetworkTimeout => (3, Backoff::Exponential, 30, unless("permanent")),
        ErrorCategory::DomNotFound => (5, Backoff::Linear, 20, RetryRule::Always),
        ErrorCategory::ContentScriptUnresponsive => (2, Backoff::Fixed, 15, RetryRule::Always),
        ErrorCategory::ExtractionFailed => (4, Backoff::Fibonacci, 25, unless("no data available")),
        ErrorCategory::AiProcessingFailed => (2, Backoff::Exponential, 60, unless("model unavailable")),
        ErrorCategory::NavigationFailed => (3, Backoff::Linear, 20, RetryRule::Always),
        ErrorCategory::PermissionDenied => (1, Backoff::Fixed, 5, RetryRule::Never),
        ErrorCategory::MemoryLimit => (1, Backoff::Fixed, 10, RetryRule::Always),
        ErrorCategory::Unknown => (2, Backoff::Exponential, 15, RetryRule::Always),
    };

    RecoveryStrategy {
        category,
        max_retries,
        backoff,
        recovery_timeout: Duration::from_secs(timeout_secs),
        retry_rule,
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(ErrorCategory::NetworkTimeout, 3, Backoff::Exponential, 30)]
    #[case(ErrorCategory::DomNotFound, 5, Backoff::Linear, 20)]
    #[case(ErrorCategory::ContentScriptUnresponsive, 2, Backoff::Fixed, 15)]
    #[case(ErrorCategory::ExtractionFailed, 4, Backoff::Fibonacci, 25)]
    #[case(ErrorCategory::AiProcessingFailed, 2, Backoff::Exponential, 60)]
    #[case(ErrorCategory::NavigationFailed, 3, Backoff::Linear, 20)]
    #[case(ErrorCategory::PermissionDenied, 1, Backoff::Fixed, 5)]
    #[case(ErrorCategory::MemoryLimit, 1, Backoff::Fixed, 10)]
    #[case(ErrorCategory::Unknown, 2, Backoff::Exponential, 15)]
    fn default_table(#[case] category: ErrorCategory, #[case] max_retries: u32, #[case] backoff: Backoff, #[case] timeout: u64) {
        let strategy = default_strategy(category);

        assert_eq!(strategy.category(), category);
        assert_eq!(strategy.max_retries(), max_retries);
        assert_eq!(strategy.backoff(), backoff);
        assert_eq!(strategy.recovery_timeout(), Duration::from_secs(timeout));
    }

    #[rstest]
    #[case(ErrorCategory::NetworkTimeout, "permanent network timeout")]
    #[case(ErrorCategory::ExtractionFailed, "extraction failed: no data available")]
    #[case(ErrorCategory::AiProcessingFailed, "model unavailable")]
    #[case(ErrorCategory::PermissionDenied, "permission denied")]
    fn vetoed_messages(#[case] category: ErrorCategory, #[case] message: &str) {
        assert!(!default_strategy(category).permits(1, message));
    }

    #[test]
    fn memory_limit_retries_first_attempt_only() {
        let strategy = default_strategy(ErrorCategory::MemoryLimit);

        assert!(strategy.permits(1, "out of memory"));
        assert!(!strategy.permits(2, "out of memory"));
    }
}
