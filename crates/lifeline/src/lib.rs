// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::arithmetic_side_effects,
        reason = "allow these lints in tests to improve the readability of the tests"
    )
)]

//! Error recovery for fallible, context-bound operations.
//!
//! `lifeline` wraps an asynchronous unit of work (an *operation*) and keeps it alive through
//! transient trouble. Every failure is classified into a closed [`ErrorCategory`] taxonomy,
//! the category selects a [`RecoveryStrategy`] (retry budget, [`Backoff`] shape, retry rule),
//! a per-operation circuit breaker stops hammering operations that keep failing, and once the
//! retry budget is spent the engine can hand back a clearly flagged [`Degraded`] result instead
//! of a hard error.
//!
//! # Quick Start
//!
//! ```rust
//! # use tick::Clock;
//! use lifeline::{OperationContext, Recovered, RecoveryEngine};
//!
//! # async fn example(clock: Clock) -> Result<(), lifeline::RecoveryError> {
//! let engine = RecoveryEngine::new(&clock);
//! let context = OperationContext::new("extract-data", 3);
//!
//! let outcome = engine
//!     .execute_with_recovery(|| async { Ok::<_, &str>("vitals") }, &context)
//!     .await?;
//!
//! match outcome {
//!     Recovered::Completed(value) => assert_eq!(value, "vitals"),
//!     Recovered::Degraded(degraded) => println!("manual review needed: {}", degraded.cause()),
//! }
//! # Ok(())
//! # }
//! ```
//!
//! > **Note**: All timing (backoff waits, breaker windows, history timestamps) goes through the
//! > [`Clock`][tick::Clock] from the [`tick`] crate, so tests can drive time with
//! > `tick::ClockControl` instead of sleeping.
//!
//! # Core Types
//!
//! - [`RecoveryEngine`]: Owns the strategy table, breaker registry and failure history, and runs
//!   the retry loop. Build one per host and share it by reference or clone.
//! - [`OperationContext`]: Caller-supplied business context. Its operation name and work item
//!   index form the [`OperationKey`] used to bucket circuit breakers.
//! - [`RecoveryError`]: Terminal failure. Distinguishes breaker rejection, exhaustion and
//!   cancellation, and implements [`Recovery`] so upstream resilience layers can react to it.
//! - [`classify`]: The pure message classifier behind every decision.
//!
//! # Cancellation
//!
//! Attach a [`CancellationToken`][tokio_util::sync::CancellationToken] to the context with
//! [`OperationContext::with_cancellation`]. The engine races the operation, every backoff wait
//! and every environment hook against the token, and never starts another attempt once
//! cancellation is observed.
//!
//! # Concurrency
//!
//! The engine is safe to use concurrently for different operation keys. Calls that share a key
//! are not serialized; callers that need at most one in-flight call per key must serialize them.

#[doc(inline)]
pub use recoverable::{Recovery, RecoveryInfo, RecoveryKind};

mod fn_wrapper;
pub(crate) use fn_wrapper::define_fn_wrapper;

mod backoff;
mod category;
mod classifier;
mod config;
mod context;
mod degradation;
mod engine;
mod error;
mod strategy;

pub mod breaker;
pub mod history;

pub use backoff::Backoff;
pub use category::ErrorCategory;
pub use classifier::{KEYWORD_TABLE, classify};
pub use config::{AttemptLimit, ConfigUpdate, RecoveryConfig};
pub use context::{Attachment, OperationContext, OperationKey};
pub use degradation::Degraded;
pub use engine::{FallbackArgs, HookArgs, Recovered, RecoveryEngine, RecoveryEngineBuilder, RetryNotice};
pub use error::{BoxError, Failure, RecoveryError};
pub use strategy::{RecoveryStrategy, RetryRule, StrategyOverride};

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
pub(crate) mod testing;
