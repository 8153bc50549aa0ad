// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::cmp::min;
use std::time::Duration;

use serde::{Deserialize, Serialize};

const EXPONENTIAL_CAP: Duration = Duration::from_secs(30);
const LINEAR_CAP: Duration = Duration::from_secs(20);
const FIBONACCI_CAP: Duration = Duration::from_secs(25);

/// Defines how the wait between two attempts grows.
///
/// Delays are a pure function of the 1-based attempt number and a base delay. Every shape
/// except [`Backoff::Fixed`] is capped, and all arithmetic saturates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backoff {
    /// Doubles the delay with each attempt, capped at `30s`.
    ///
    /// **Example with `1s` base delay:** `1s, 2s, 4s, 8s, 16s, 30s, 30s, ...`
    Exponential,

    /// Grows the delay proportionally with the attempt number, capped at `20s`.
    ///
    /// **Example with `1s` base delay:** `1s, 2s, 3s, 4s, 5s, ...`
    Linear,

    /// Follows the Fibonacci sequence `1, 2, 3, 5, 8, ...`, capped at `25s`.
    ///
    /// **Example with `1s` base delay:** `1s, 2s, 3s, 5s, 8s, 13s, 21s, 25s, ...`
    Fibonacci,

    /// Waits the base delay every time.
    ///
    /// **Example with `1s` base delay:** `1s, 1s, 1s, ...`
    Fixed,
}

impl Backoff {
    /// Computes the delay before retrying after the given 1-based attempt.
    ///
    /// Attempt `0` is treated as attempt `1`.
    #[must_use]
    pub fn delay(self, attempt: u32, base: Duration) -> Duration {
        let attempt = attempt.max(1);

        match self {
            Self::Exponential => {
                let factor = 2_u32.checked_pow(attempt - 1).unwrap_or(u32::MAX);
                min(base.saturating_mul(factor), EXPONENTIAL_CAP)
            }
            Self::Linear => min(base.saturating_mul(attempt), LINEAR_CAP),
            Self::Fibonacci => min(base.saturating_mul(fibonacci(attempt)), FIBONACCI_CAP),
            Self::Fixed => base,
        }
    }

    /// Returns the largest delay this shape produces, or `None` when it is uncapped.
    #[must_use]
    pub const fn cap(self) -> Option<Duration> {
        match self {
            Self::Exponential => Some(EXPONENTIAL_CAP),
            Self::Linear => Some(LINEAR_CAP),
            Self::Fibonacci => Some(FIBONACCI_CAP),
            Self::Fixed => None,
        }
    }
}

// fib(1) = 1, fib(2) = 2, fib(n) = fib(n - 1) + fib(n - 2)
fn fibonacci(n: u32) -> u32 {
    let (mut prev, mut current) = (1_u32, 2_u32);
    for _ in 1..n {
        if prev == u32::MAX {
            break;
        }
        (prev, current) = (current, prev.saturating_add(current));
    }
    prev
}
