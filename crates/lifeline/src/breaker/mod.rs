// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Per-operation circuit breakers.
//!
//! Each [`OperationKey`][crate::OperationKey] owns one breaker, created lazily on its first
//! recorded failure. The breaker counts *calls that exhausted their recovery*, not individual
//! attempts, and moves through three states:
//!
//! - **Closed**: calls pass. Reaching the failure threshold opens the breaker.
//! - **Open**: calls are rejected with [`RecoveryError::CircuitOpen`][crate::RecoveryError::CircuitOpen]
//!   until the reset timeout has passed since the last failure.
//! - **Half-open**: a single trial call is admitted. Its success closes the breaker, its
//!   failure opens it again. A trial that never reports back is abandoned after another reset
//!   timeout and a new trial is admitted.
//!
//! Breaker state is inspected with [`RecoveryEngine::breaker_snapshot`][crate::RecoveryEngine::breaker_snapshot].

mod registry;
mod state;

pub(crate) use registry::{Admission, BreakerRegistry};
pub use state::{BreakerSnapshot, BreakerState};
