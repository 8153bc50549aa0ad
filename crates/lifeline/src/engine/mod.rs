// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

mod args;
mod builder;
mod callbacks;
mod execute;
mod race;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

pub use args::{FallbackArgs, HookArgs, RetryNotice};
pub use builder::RecoveryEngineBuilder;
pub(crate) use callbacks::{EnvironmentHook, FallbackAction, OnRetry, ShouldRetry};
use parking_lot::RwLock;
use tick::Clock;

use crate::breaker::{BreakerRegistry, BreakerSnapshot};
use crate::degradation::DegradationProviders;
use crate::history::{FailureHistory, FailureStats, HealthReport};
use crate::strategy::StrategyRegistry;
use crate::{
    BoxError, ConfigUpdate, Degraded, ErrorCategory, OperationContext, OperationKey, RecoveryConfig, RecoveryError, RecoveryStrategy,
    StrategyOverride,
};

/// The outcome of a recoverable operation that did not fail hard.
#[derive(Debug, Clone, PartialEq)]
pub enum Recovered<T> {
    /// The operation succeeded.
    Completed(T),
    /// The operation failed and a degradation provider supplied a reduced-fidelity result.
    Degraded(Degraded),
}

impl<T> Recovered<T> {
    /// Returns `true` if the result is degraded.
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded(_))
    }

    /// Returns the operation's output if it completed.
    #[must_use]
    pub fn completed(self) -> Option<T> {
        match self {
            Self::Completed(value) => Some(value),
            Self::Degraded(_) => None,
        }
    }

    /// Returns the degraded result, if any.
    #[must_use]
    pub fn degraded(&self) -> Option<&Degraded> {
        match self {
            Self::Completed(_) => None,
            Self::Degraded(degraded) => Some(degraded),
        }
    }

    /// Maps the completed value, leaving a degraded result untouched.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Recovered<U> {
        match self {
            Self::Completed(value) => Recovered::Completed(f(value)),
            Self::Degraded(degraded) => Recovered::Degraded(degraded),
        }
    }
}

/// Runs operations with classification-driven retries, circuit breaking and graceful
/// degradation.
///
/// The engine is cheap to clone; clones share strategies, breakers, history and
/// configuration.
///
/// # Examples
///
/// ```rust
/// # use tick::Clock;
/// use lifeline::{ErrorCategory, OperationContext, RecoveryEngine, RecoveryError};
///
/// # async fn example(clock: Clock) {
/// let engine = RecoveryEngine::builder(&clock)
///     .environment_hook(ErrorCategory::NavigationFailed, |args| async move {
///         println!("reloading tab for {}", args.context().key());
///         Ok(())
///     })
///     .build();
///
/// let context = OperationContext::new("navigate", 0);
/// let result = engine
///     .execute_with_recovery(|| async { Err::<(), _>("permission denied") }, &context)
///     .await;
///
/// assert!(matches!(result, Err(RecoveryError::Exhausted { attempts: 1, .. })));
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct RecoveryEngine {
    shared: Arc<EngineShared>,
}

#[derive(Debug)]
struct EngineShared {
    clock: Clock,
    config: RwLock<Arc<RecoveryConfig>>,
    strategies: StrategyRegistry,
    breakers: BreakerRegistry,
    history: FailureHistory,
    should_retry: HashMap<ErrorCategory, ShouldRetry>,
    fallbacks: HashMap<ErrorCategory, FallbackAction>,
    hooks: HashMap<ErrorCategory, EnvironmentHook>,
    degradation: DegradationProviders,
    on_retry: Option<OnRetry>,
}

impl RecoveryEngine {
    /// Creates an engine with the default configuration and no callbacks.
    #[must_use]
    pub fn new(clock: &Clock) -> Self {
        Self::builder(clock).build()
    }

    /// Starts building an engine that reads time from `clock`.
    #[must_use]
    pub fn builder(clock: &Clock) -> RecoveryEngineBuilder {
        RecoveryEngineBuilder::new(clock)
    }

    /// Runs `operation` until it succeeds, its failures stop being retryable or its attempt
    /// ceiling is reached.
    ///
    /// The operation is invoked afresh for every attempt. On success the operation key's
    /// breaker is closed. When the engine gives up it records one breaker failure and one
    /// history entry, then returns a [`Recovered::Degraded`] result if a degradation provider
    /// exists for the operation name and graceful degradation is enabled.
    ///
    /// # Errors
    ///
    /// - [`RecoveryError::CircuitOpen`] if the operation key's breaker rejects the call; the
    ///   operation is not invoked.
    /// - [`RecoveryError::Exhausted`] if the operation failed and no degraded result is
    ///   available.
    /// - [`RecoveryError::Cancelled`] if the context's cancellation token fired.
    pub async fn execute_with_recovery<T, E, F, Fut>(
        &self,
        operation: F,
        context: &OperationContext,
    ) -> Result<Recovered<T>, RecoveryError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Into<BoxError>,
    {
        self.shared.execute(operation, context, None).await
    }

    /// Like [`execute_with_recovery`][Self::execute_with_recovery], with `overrides` merged over
    /// the registered strategy for this call only.
    ///
    /// # Errors
    ///
    /// Same as [`execute_with_recovery`][Self::execute_with_recovery].
    pub async fn execute_with_override<T, E, F, Fut>(
        &self,
        operation: F,
        context: &OperationContext,
        overrides: &StrategyOverride,
    ) -> Result<Recovered<T>, RecoveryError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Into<BoxError>,
    {
        self.shared.execute(operation, context, Some(overrides)).await
    }

    /// Answers whether the category strategy of `error_message` permits a retry after the
    /// given 1-based attempt.
    ///
    /// This is the stateless policy check only. The attempt ceiling derived from the operation
    /// name, context-aware callbacks and breaker state are not consulted, so the operation name
    /// does not affect the answer.
    #[must_use]
    pub fn should_retry_operation(&self, _operation_name: &str, error_message: &str, attempt: u32) -> bool {
        self.shared
            .strategies
            .get(crate::classify(error_message))
            .permits(attempt, error_message)
    }

    /// Returns the backoff delay the engine waits after the given 1-based attempt failed with
    /// `category`.
    #[must_use]
    pub fn retry_delay(&self, category: ErrorCategory, attempt: u32) -> Duration {
        let base = self.shared.config().base_delay;
        self.shared.strategies.get(category).backoff().delay(attempt, base)
    }

    /// Closes the breaker of `key` and resets its failure count.
    pub fn reset_circuit_breaker(&self, key: &OperationKey) {
        self.shared.breakers.reset(key);
        tracing::event!(
            name: "lifeline.circuit_reset",
            tracing::Level::INFO,
            operation.key = %key,
        );
    }

    /// Returns whether calls for `key` are currently rejected.
    ///
    /// Unlike a call, this check never moves an expired breaker to half-open.
    #[must_use]
    pub fn is_circuit_open(&self, key: &OperationKey) -> bool {
        let reset_timeout = self.shared.config().reset_timeout;
        self.shared.breakers.peek(key, reset_timeout).is_some()
    }

    /// Returns a snapshot of the breaker of `key`, if one exists.
    #[must_use]
    pub fn breaker_snapshot(&self, key: &OperationKey) -> Option<BreakerSnapshot> {
        self.shared.breakers.snapshot(key)
    }

    /// Drops breakers that have not failed within the configured idle timeout.
    ///
    /// Returns the number of dropped breakers.
    pub fn sweep_idle_breakers(&self) -> usize {
        let idle = self.shared.config().breaker_idle_timeout;
        self.shared.breakers.sweep_idle(idle)
    }

    /// Returns statistics over the failure history.
    #[must_use]
    pub fn failure_stats(&self) -> FailureStats {
        self.shared.stats()
    }

    /// Returns the engine's health.
    #[must_use]
    pub fn health(&self) -> HealthReport {
        self.shared.stats().health()
    }

    /// Forgets all recorded failures and all circuit breakers.
    pub fn clear_history(&self) {
        self.shared.history.clear();
        self.shared.breakers.clear();
    }

    /// Enables or disables per-attempt debug events.
    pub fn set_debug_logging(&self, enabled: bool) {
        self.update_config(ConfigUpdate {
            debug_logging: Some(enabled),
            ..ConfigUpdate::default()
        });
    }

    /// Applies a partial configuration update. Calls already in flight keep the configuration
    /// they started with.
    pub fn update_config(&self, update: ConfigUpdate) {
        let mut config = self.shared.config.write();
        let mut next = RecoveryConfig::clone(&config);
        update.apply_to(&mut next);
        *config = Arc::new(next);
    }

    /// Returns the current configuration.
    #[must_use]
    pub fn config(&self) -> Arc<RecoveryConfig> {
        self.shared.config()
    }

    /// Replaces the strategy used for `category`.
    pub fn add_custom_strategy(&self, category: ErrorCategory, strategy: RecoveryStrategy) {
        self.shared.strategies.put(category, strategy);
    }

    /// Returns the strategy currently used for `category`.
    #[must_use]
    pub fn strategy(&self, category: ErrorCategory) -> RecoveryStrategy {
        self.shared.strategies.get(category)
    }

    /// Classifies a failure message; see [`classify`][crate::classify].
    #[must_use]
    pub fn classify(&self, message: &str) -> ErrorCategory {
        crate::classify(message)
    }
}

impl EngineShared {
    fn config(&self) -> Arc<RecoveryConfig> {
        Arc::clone(&self.config.read())
    }

    fn stats(&self) -> FailureStats {
        let config = self.config();
        self.history.stats(
            self.clock.system_time(),
            config.recent_window,
            config.recent_limit,
            self.breakers.open_keys(),
        )
    }
}
