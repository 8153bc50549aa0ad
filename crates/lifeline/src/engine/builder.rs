// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::Arc;

use futures_util::FutureExt;
use parking_lot::RwLock;
use serde_json::Value;
use tick::Clock;

use super::{EngineShared, EnvironmentHook, FallbackAction, FallbackArgs, HookArgs, OnRetry, RecoveryEngine, RetryNotice, ShouldRetry};
use crate::breaker::BreakerRegistry;
use crate::degradation::{DegradationProvider, DegradationProviders};
use crate::history::FailureHistory;
use crate::strategy::StrategyRegistry;
use crate::{BoxError, ErrorCategory, Failure, OperationContext, RecoveryConfig, RecoveryStrategy};

/// Builds a [`RecoveryEngine`].
///
/// Context-aware callbacks are registered per [`ErrorCategory`]; registering a second callback
/// of the same kind for a category replaces the first.
///
/// # Examples
///
/// ```rust
/// # use tick::Clock;
/// use std::time::Duration;
///
/// use lifeline::{ErrorCategory, RecoveryConfig, RecoveryEngine};
/// use serde_json::json;
///
/// # fn example(clock: &Clock) {
/// let engine = RecoveryEngine::builder(clock)
///     .config(RecoveryConfig {
///         base_delay: Duration::from_millis(200),
///         ..RecoveryConfig::default()
///     })
///     .should_retry(ErrorCategory::DomNotFound, |_failure, _attempt, context| context.previous_attempts() < 3)
///     .fallback_action(ErrorCategory::ContentScriptUnresponsive, |args| {
///         println!("re-injecting script for {}", args.context().key());
///         Ok(())
///     })
///     .degradation("navigate", |_context, failure| Some(json!({ "skipped": failure.message() })))
///     .on_retry(|notice| println!("retrying in {:?}", notice.delay()))
///     .build();
/// # }
/// ```
#[derive(Debug)]
pub struct RecoveryEngineBuilder {
    clock: Clock,
    config: RecoveryConfig,
    strategies: Vec<(ErrorCategory, RecoveryStrategy)>,
    should_retry: HashMap<ErrorCategory, ShouldRetry>,
    fallbacks: HashMap<ErrorCategory, FallbackAction>,
    hooks: HashMap<ErrorCategory, EnvironmentHook>,
    degradation: DegradationProviders,
    on_retry: Option<OnRetry>,
}

impl RecoveryEngineBuilder {
    pub(super) fn new(clock: &Clock) -> Self {
        Self {
            clock: clock.clone(),
            config: RecoveryConfig::default(),
            strategies: Vec::new(),
            should_retry: HashMap::new(),
            fallbacks: HashMap::new(),
            hooks: HashMap::new(),
            degradation: DegradationProviders::default(),
            on_retry: None,
        }
    }

    /// Sets the engine configuration.
    ///
    /// **Default**: [`RecoveryConfig::default`]
    #[must_use]
    pub fn config(mut self, config: RecoveryConfig) -> Self {
        self.config = config;
        self
    }

    /// Replaces the built-in strategy of `category`.
    #[must_use]
    pub fn strategy(mut self, category: ErrorCategory, strategy: RecoveryStrategy) -> Self {
        self.strategies.push((category, strategy));
        self
    }

    /// Registers a context-aware retry veto for `category`.
    ///
    /// The callback runs after the strategy's pure [`RetryRule`][crate::RetryRule] allowed a
    /// retry; returning `false` stops retrying.
    #[must_use]
    pub fn should_retry(
        mut self,
        category: ErrorCategory,
        should_retry: impl Fn(&Failure, u32, &OperationContext) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.should_retry.insert(category, ShouldRetry::new(should_retry));
        self
    }

    /// Registers a fallback action for `category`.
    ///
    /// The action runs before each backoff wait. Errors are logged and otherwise ignored.
    #[must_use]
    pub fn fallback_action(
        mut self,
        category: ErrorCategory,
        fallback_action: impl Fn(FallbackArgs<'_>) -> Result<(), BoxError> + Send + Sync + 'static,
    ) -> Self {
        self.fallbacks.insert(category, FallbackAction::new(fallback_action));
        self
    }

    /// Registers an asynchronous environment hook for `category`.
    ///
    /// The hook runs after each backoff wait and may take at most the strategy's
    /// [`recovery_timeout`][RecoveryStrategy::recovery_timeout]. Errors and timeouts are logged
    /// and otherwise ignored.
    #[must_use]
    pub fn environment_hook<F, Fut>(mut self, category: ErrorCategory, hook: F) -> Self
    where
        F: Fn(HookArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        self.hooks
            .insert(category, EnvironmentHook::new(move |args| hook(args).boxed()));
        self
    }

    /// Registers a degradation provider for the operation named exactly `operation_name`.
    ///
    /// Providers for `extract-data` and `ai-review` are built in and can be replaced. A provider
    /// that returns `None` declines, and the call fails with
    /// [`RecoveryError::Exhausted`][crate::RecoveryError::Exhausted].
    #[must_use]
    pub fn degradation(
        mut self,
        operation_name: impl Into<Cow<'static, str>>,
        provider: impl Fn(&OperationContext, &Failure) -> Option<Value> + Send + Sync + 'static,
    ) -> Self {
        self.degradation.insert(operation_name, DegradationProvider::new(provider));
        self
    }

    /// Registers an observer invoked before every backoff wait.
    #[must_use]
    pub fn on_retry(mut self, on_retry: impl Fn(RetryNotice<'_>) + Send + Sync + 'static) -> Self {
        self.on_retry = Some(OnRetry::new(on_retry));
        self
    }

    /// Builds the engine.
    #[must_use]
    pub fn build(self) -> RecoveryEngine {
        let strategies = StrategyRegistry::default();
        for (category, strategy) in self.strategies {
            strategies.put(category, strategy);
        }

        RecoveryEngine {
            shared: Arc::new(EngineShared {
                breakers: BreakerRegistry::new(self.clock.clone()),
                clock: self.clock,
                config: RwLock::new(Arc::new(self.config)),
                strategies,
                history: FailureHistory::default(),
                should_retry: self.should_retry,
                fallbacks: self.fallbacks,
                hooks: self.hooks,
                degradation: self.degradation,
                on_retry: self.on_retry,
            }),
        }
    }
}
