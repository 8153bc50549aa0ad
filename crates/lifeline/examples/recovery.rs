// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Runs a few flaky work items through a recovery engine and prints how each one ended.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use lifeline::{BoxError, ErrorCategory, OperationContext, Recovered, RecoveryConfig, RecoveryEngine};
use tick::Clock;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::fmt().with_max_level(tracing::Level::INFO).init();

    let clock = Clock::new_tokio();
    let engine = RecoveryEngine::builder(&clock)
        .config(RecoveryConfig {
            base_delay: Duration::from_millis(50),
            ..RecoveryConfig::default()
        })
        .fallback_action(ErrorCategory::DomNotFound, |args| {
            println!("waiting for the page of item {} to settle", args.context().work_item_index());
            Ok(())
        })
        .on_retry(|notice| println!("{} failed ({}), retrying in {:?}", notice.key(), notice.failure(), notice.delay()))
        .build();

    let failures = [("element not found", 2), ("permission denied", u32::MAX), ("data field missing", u32::MAX)];

    for (index, (message, failing_calls)) in failures.into_iter().enumerate() {
        let calls = Arc::new(AtomicU32::new(0));
        let context = OperationContext::new("extract-data", index).with_work_item(format!("patient-{index}"));

        let result = engine
            .execute_with_recovery(
                || {
                    let calls = Arc::clone(&calls);
                    async move {
                        if calls.fetch_add(1, Ordering::SeqCst) < failing_calls {
                            Err::<_, BoxError>(message.into())
                        } else {
                            Ok(format!("record {index}"))
                        }
                    }
                },
                &context,
            )
            .await;

        match result {
            Ok(Recovered::Completed(record)) => println!("{}: extracted {record}", context.key()),
            Ok(Recovered::Degraded(degraded)) => println!("{}: degraded, payload {}", context.key(), degraded.payload()),
            Err(error) => println!("{}: {error}", context.key()),
        }
    }

    let stats = engine.failure_stats();
    println!("failures recorded: {}, health: {:?}", stats.total_failures(), engine.health().status);
}
