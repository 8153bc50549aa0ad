// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::Duration;

use recoverable::{Recovery, RecoveryInfo};

use crate::{ErrorCategory, OperationKey, classify};

/// A type-erased error returned by an operation.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A classified operation failure.
///
/// Every error an operation returns is wrapped into a `Failure` before any recovery decision
/// is made. The category is derived from the error's [`Display`][std::fmt::Display] text.
#[derive(Debug, thiserror::Error)]
#[error("{category}: {message}")]
pub struct Failure {
    category: ErrorCategory,
    message: String,
    #[source]
    source: BoxError,
}

impl Failure {
    /// Classifies the given error.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use lifeline::{ErrorCategory, Failure};
    ///
    /// let failure = Failure::new("selector #vitals not found");
    /// assert_eq!(failure.category(), ErrorCategory::DomNotFound);
    /// assert_eq!(failure.message(), "selector #vitals not found");
    /// ```
    pub fn new(error: impl Into<BoxError>) -> Self {
        let source = error.into();
        let message = source.to_string();

        Self {
            category: classify(&message),
            message,
            source,
        }
    }

    /// Returns the category assigned at classification time.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        self.category
    }

    /// Returns the error message the category was derived from.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the original error.
    #[must_use]
    pub fn error(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
        &*self.source
    }

    pub(crate) fn into_source(self) -> BoxError {
        self.source
    }
}

/// The terminal error of a recoverable operation.
///
/// Callers can tell the three outcomes apart: the circuit breaker refused the call, the
/// operation kept failing until the engine gave up, or the caller cancelled it.
///
/// `RecoveryError` implements [`Recovery`] so that outer resilience layers know not to retry
/// it right away: a rejected call reports [`RecoveryInfo::unavailable`], anything else
/// reports [`RecoveryInfo::never`] because the retry budget is already spent.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum RecoveryError {
    /// The circuit breaker of the operation key is open; the operation was not invoked.
    #[error("circuit breaker open for operation '{operation}' ({key}), retry after {retry_after:?}")]
    CircuitOpen {
        /// The operation name.
        operation: String,
        /// The breaker key that is open.
        key: OperationKey,
        /// The remaining time until the breaker admits a trial call.
        retry_after: Duration,
    },

    /// The operation failed and the engine stopped retrying it.
    #[error("operation '{operation}' ({key}) failed after {attempts} attempt(s) [{category}]: {message}")]
    Exhausted {
        /// The operation name.
        operation: String,
        /// The breaker key of the operation.
        key: OperationKey,
        /// The number of attempts made.
        attempts: u32,
        /// The category of the last failure.
        category: ErrorCategory,
        /// The message of the last failure.
        message: String,
        /// The last error returned by the operation.
        #[source]
        source: BoxError,
    },

    /// The caller cancelled the operation.
    #[error("operation '{operation}' ({key}) cancelled after {attempts} attempt(s)")]
    Cancelled {
        /// The operation name.
        operation: String,
        /// The breaker key of the operation.
        key: OperationKey,
        /// The number of attempts started before cancellation was observed.
        attempts: u32,
    },
}

impl RecoveryError {
    /// Returns the operation name.
    #[must_use]
    pub fn operation(&self) -> &str {
        match self {
            Self::CircuitOpen { operation, .. } | Self::Exhausted { operation, .. } | Self::Cancelled { operation, .. } => {
                operation
            }
        }
    }

    /// Returns the breaker key of the operation.
    #[must_use]
    pub fn key(&self) -> &OperationKey {
        match self {
            Self::CircuitOpen { key, .. } | Self::Exhausted { key, .. } | Self::Cancelled { key, .. } => key,
        }
    }

    /// Returns the number of attempts made; `0` when the breaker rejected the call.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        match self {
            Self::CircuitOpen { .. } => 0,
            Self::Exhausted { attempts, .. } | Self::Cancelled { attempts, .. } => *attempts,
        }
    }

    /// Returns the category of the last failure, if the operation failed.
    #[must_use]
    pub fn category(&self) -> Option<ErrorCategory> {
        match self {
            Self::Exhausted { category, .. } => Some(*category),
            Self::CircuitOpen { .. } | Self::Cancelled { .. } => None,
        }
    }

    /// Returns `true` if the circuit breaker rejected the call.
    #[must_use]
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, Self::CircuitOpen { .. })
    }

    /// Returns `true` if the caller cancelled the operation.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

impl Recovery for RecoveryError {
    fn recovery(&self) -> RecoveryInfo {
        match self {
            Self::CircuitOpen { .. } => RecoveryInfo::unavailable(),
            Self::Exhausted { .. } | Self::Cancelled { .. } => RecoveryInfo::never(),
        }
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use std::error::Error as _;

    use recoverable::RecoveryKind;

    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("javascript heap out of memory")]
    struct HeapError;

    #[test]
    fn static_assertions() {
        static_assertions::assert_impl_all!(RecoveryError: Send, Sync, std::error::Error);
        static_assertions::assert_impl_all!(Failure: Send, Sync, std::error::Error);
    }

    #[test]
    fn failure_classifies_typed_error() {
        let failure = Failure::new(HeapError);

        assert_eq!(failure.category(), ErrorCategory::MemoryLimit);
        assert_eq!(failure.message(), "javascript heap out of memory");
        assert_eq!(failure.to_string(), "memory_limit: javascript heap out of memory");
        assert!(failure.error().is::<HeapError>());
    }

    #[test]
    fn exhausted_exposes_source() {
        let failure = Failure::new("tab crashed");
        let error = RecoveryError::Exhausted {
            operation: "navigate".to_string(),
            key: OperationKey::from("navigate_1"),
            attempts: 3,
            category: failure.category(),
            message: failure.message().to_string(),
            source: failure.into_source(),
        };

        assert_eq!(error.operation(), "navigate");
        assert_eq!(error.key().as_str(), "navigate_1");
        assert_eq!(error.attempts(), 3);
        assert_eq!(error.category(), Some(ErrorCategory::NavigationFailed));
        assert_eq!(error.source().map(ToString::to_string), Some("tab crashed".to_string()));
        assert_eq!(
            error.to_string(),
            "operation 'navigate' (navigate_1) failed after 3 attempt(s) [navigation_failed]: tab crashed"
        );
        assert_eq!(error.recovery().kind(), RecoveryKind::Never);
    }

    #[test]
    fn circuit_open_is_unavailable() {
        let error = RecoveryError::CircuitOpen {
            operation: "ai-review".to_string(),
            key: OperationKey::from("ai-review_0"),
            retry_after: Duration::from_secs(60),
        };

        assert!(error.is_circuit_open());
        assert!(!error.is_cancelled());
        assert_eq!(error.attempts(), 0);
        assert_eq!(error.category(), None);
        assert_eq!(error.recovery().kind(), RecoveryKind::Unavailable);
    }

    #[test]
    fn cancelled_never_recovers() {
        let error = RecoveryError::Cancelled {
            operation: "extract-data".to_string(),
            key: OperationKey::from("extract-data_4"),
            attempts: 2,
        };

        assert!(error.is_cancelled());
        assert_eq!(error.attempts(), 2);
        assert_eq!(error.recovery().kind(), RecoveryKind::Never);
        assert_eq!(error.to_string(), "operation 'extract-data' (extract-data_4) cancelled after 2 attempt(s)");
    }
}
