// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::pin::pin;

use futures_util::future::{Either, select};
use tokio_util::sync::CancellationToken;

/// Runs `future` to completion unless `token` is cancelled first.
///
/// Returns `None` on cancellation. A token that is already cancelled prevents `future` from
/// being polled at all.
pub(super) async fn or_cancel<F: Future>(future: F, token: Option<&CancellationToken>) -> Option<F::Output> {
    let Some(token) = token else {
        return Some(future.await);
    };

    if token.is_cancelled() {
        return None;
    }

    let future = pin!(future);
    let cancelled = pin!(token.cancelled());
    match select(future, cancelled).await {
        Either::Left((output, _)) => Some(output),
        Either::Right(((), _)) => None,
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use std::future::{pending, ready};

    use super::*;

    #[tokio::test]
    async fn without_token_runs_to_completion() {
        assert_eq!(or_cancel(ready(7), None).await, Some(7));
    }

    #[tokio::test]
    async fn cancelled_token_skips_future() {
        let token = CancellationToken::new();
        token.cancel();

        let result = or_cancel(async { unreachable!("must not be polled") }, Some(&token)).await;

        assert_eq!(result, None::<()>);
    }

    #[tokio::test]
    async fn cancellation_interrupts_pending_future() {
        let token = CancellationToken::new();
        let canceller = token.clone();

        let result = or_cancel(
            async move {
                canceller.cancel();
                pending::<u32>().await
            },
            Some(&token),
        )
        .await;

        assert_eq!(result, None);
    }

    #[tokio::test]
    async fn live_token_lets_future_finish() {
        let token = CancellationToken::new();

        assert_eq!(or_cancel(ready("done"), Some(&token)).await, Some("done"));
    }
}
