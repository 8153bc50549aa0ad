// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::ops::ControlFlow;
use std::time::Duration;

use tick::FutureExt;

use super::race::or_cancel;
use super::{EngineShared, FallbackArgs, HookArgs, Recovered, RetryNotice};
use crate::breaker::Admission;
use crate::history::FailedAttempt;
use crate::{
    BoxError, ErrorCategory, Failure, OperationContext, OperationKey, RecoveryConfig, RecoveryError, RecoveryStrategy, StrategyOverride,
};

impl EngineShared {
    pub(super) async fn execute<T, E, F, Fut>(
        &self,
        mut operation: F,
        context: &OperationContext,
        overrides: Option<&StrategyOverride>,
    ) -> Result<Recovered<T>, RecoveryError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Into<BoxError>,
    {
        let config = self.config();
        let key = context.key();
        let token = context.cancellation();

        if context.is_cancelled() {
            return Err(cancelled(context, key, 0));
        }

        if let Admission::Rejected { retry_after } = self.breakers.admit(&key, config.reset_timeout) {
            tracing::event!(
                name: "lifeline.circuit_open",
                tracing::Level::WARN,
                operation.name = context.operation_name(),
                operation.key = %key,
                circuit.retry_after = retry_after.as_secs_f32(),
            );

            return Err(RecoveryError::CircuitOpen {
                operation: context.operation_name().to_string(),
                key,
                retry_after,
            });
        }

        let max_attempts = config.max_attempts_for(context.operation_name());
        let mut attempt = 1;

        let failure = loop {
            if config.debug_logging {
                tracing::event!(
                    name: "lifeline.attempt",
                    tracing::Level::DEBUG,
                    operation.name = context.operation_name(),
                    operation.key = %key,
                    recovery.attempt = attempt,
                    recovery.max_attempts = max_attempts,
                );
            }

            let Some(result) = or_cancel(operation(), token).await else {
                return Err(cancelled(context, key, attempt));
            };

            let failure = match result {
                Ok(value) => {
                    self.breakers.record_success(&key);
                    if config.debug_logging {
                        tracing::event!(
                            name: "lifeline.success",
                            tracing::Level::DEBUG,
                            operation.name = context.operation_name(),
                            operation.key = %key,
                            recovery.attempt = attempt,
                        );
                    }
                    return Ok(Recovered::Completed(value));
                }
                Err(error) => Failure::new(error),
            };

            let strategy = match self.evaluate(&failure, attempt, max_attempts, context, overrides) {
                ControlFlow::Continue(strategy) => strategy,
                ControlFlow::Break(()) => break failure,
            };

            let delay = strategy.backoff().delay(attempt, config.base_delay);
            self.notify_retry(&key, &failure, attempt, delay, context);
            self.run_fallback(&failure, attempt, context, overrides);

            if or_cancel(self.clock.delay(delay), token).await.is_none() {
                return Err(cancelled(context, key, attempt));
            }

            if failure.category() == ErrorCategory::MemoryLimit {
                self.release_memory(&config);
            }

            if self.run_hook(&strategy, &failure, attempt, context).await.is_break() {
                return Err(cancelled(context, key, attempt));
            }

            attempt += 1;
        };

        self.give_up(failure, attempt, context, key, &config)
    }

    /// Decides whether a failed attempt is retried; continues with the effective strategy.
    fn evaluate(
        &self,
        failure: &Failure,
        attempt: u32,
        max_attempts: u32,
        context: &OperationContext,
        overrides: Option<&StrategyOverride>,
    ) -> ControlFlow<(), RecoveryStrategy> {
        let category = failure.category();
        let mut strategy = self.strategies.get(category);
        if let Some(overrides) = overrides {
            strategy = overrides.apply(strategy);
        }

        if !strategy.permits(attempt, failure.message()) {
            return ControlFlow::Break(());
        }

        let should_retry = overrides
            .and_then(StrategyOverride::should_retry_callback)
            .or_else(|| self.should_retry.get(&category));
        if should_retry.is_some_and(|should_retry| !should_retry.call(failure, attempt, context)) {
            return ControlFlow::Break(());
        }

        if attempt >= max_attempts {
            return ControlFlow::Break(());
        }

        ControlFlow::Continue(strategy)
    }

    fn notify_retry(&self, key: &OperationKey, failure: &Failure, attempt: u32, delay: Duration, context: &OperationContext) {
        tracing::event!(
            name: "lifeline.retry",
            tracing::Level::WARN,
            operation.name = context.operation_name(),
            operation.key = %key,
            recovery.attempt = attempt,
            recovery.category = failure.category().as_str(),
            recovery.delay = delay.as_secs_f32(),
            error.message = failure.message(),
        );

        if let Some(on_retry) = &self.on_retry {
            on_retry.call(RetryNotice {
                key,
                failure,
                attempt,
                delay,
                context,
            });
        }
    }

    fn run_fallback(&self, failure: &Failure, attempt: u32, context: &OperationContext, overrides: Option<&StrategyOverride>) {
        let fallback = overrides
            .and_then(StrategyOverride::fallback_callback)
            .or_else(|| self.fallbacks.get(&failure.category()));
        let Some(fallback) = fallback else {
            return;
        };

        if let Err(error) = fallback.call(FallbackArgs { failure, attempt, context }) {
            tracing::event!(
                name: "lifeline.fallback_failed",
                tracing::Level::WARN,
                operation.name = context.operation_name(),
                recovery.attempt = attempt,
                recovery.category = failure.category().as_str(),
                error.message = %error,
            );
        }
    }

    /// Runs the category's environment hook; breaks if the caller cancelled meanwhile.
    async fn run_hook(&self, strategy: &RecoveryStrategy, failure: &Failure, attempt: u32, context: &OperationContext) -> ControlFlow<()> {
        let Some(hook) = self.hooks.get(&failure.category()) else {
            return ControlFlow::Continue(());
        };

        let args = HookArgs {
            category: failure.category(),
            attempt,
            message: failure.message().to_string(),
            context: context.clone(),
        };
        let timeout = strategy.recovery_timeout();

        let Some(outcome) = or_cancel(hook.call(args).timeout(&self.clock, timeout), context.cancellation()).await else {
            return ControlFlow::Break(());
        };

        let problem = match outcome {
            Ok(Ok(())) => return ControlFlow::Continue(()),
            Ok(Err(error)) => error.to_string(),
            Err(_timeout) => format!("timed out after {timeout:?}"),
        };

        tracing::event!(
            name: "lifeline.hook_failed",
            tracing::Level::WARN,
            operation.name = context.operation_name(),
            recovery.attempt = attempt,
            recovery.category = failure.category().as_str(),
            error.message = %problem,
        );

        ControlFlow::Continue(())
    }

    fn release_memory(&self, config: &RecoveryConfig) {
        let breakers = self.breakers.sweep_idle(config.breaker_idle_timeout);
        let entries = self.history.trim(config.history_retain);

        tracing::event!(
            name: "lifeline.memory_released",
            tracing::Level::INFO,
            breakers.dropped = breakers,
            history.dropped = entries,
        );
    }

    fn give_up<T>(
        &self,
        failure: Failure,
        attempts: u32,
        context: &OperationContext,
        key: OperationKey,
        config: &RecoveryConfig,
    ) -> Result<Recovered<T>, RecoveryError> {
        if self.breakers.record_failure(&key, config.failure_threshold) {
            tracing::event!(
                name: "lifeline.circuit_opened",
                tracing::Level::WARN,
                operation.name = context.operation_name(),
                operation.key = %key,
                circuit.failure_threshold = config.failure_threshold,
            );
        }

        self.history.record(
            FailedAttempt {
                category: failure.category(),
                error_message: failure.message().to_string(),
                attempts,
                timestamp: self.clock.system_time(),
                context: context.clone(),
                recovery_attempted: attempts > 1,
            },
            config.history_capacity,
            config.history_retain,
        );

        tracing::event!(
            name: "lifeline.exhausted",
            tracing::Level::ERROR,
            operation.name = context.operation_name(),
            operation.key = %key,
            recovery.attempt = attempts,
            recovery.category = failure.category().as_str(),
            error.message = failure.message(),
        );

        if config.graceful_degradation
            && let Some(degraded) = self.degradation.degrade(context, &failure)
        {
            tracing::event!(
                name: "lifeline.degraded",
                tracing::Level::WARN,
                operation.name = context.operation_name(),
                operation.key = %key,
                recovery.category = failure.category().as_str(),
            );
            return Ok(Recovered::Degraded(degraded));
        }

        Err(RecoveryError::Exhausted {
            operation: context.operation_name().to_string(),
            key,
            attempts,
            category: failure.category(),
            message: failure.message().to_string(),
            source: failure.into_source(),
        })
    }
}

fn cancelled(context: &OperationContext, key: OperationKey, attempts: u32) -> RecoveryError {
    tracing::event!(
        name: "lifeline.cancelled",
        tracing::Level::INFO,
        operation.name = context.operation_name(),
        operation.key = %key,
        recovery.attempt = attempts,
    );

    RecoveryError::Cancelled {
        operation: context.operation_name().to_string(),
        key,
        attempts,
    }
}
