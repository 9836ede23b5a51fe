// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Bounded retry with a fixed delay.

use std::future::Future;
use std::time::Duration;

/// How many extra attempts to make and how long to sleep between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts after the first one.
    pub retries: u32,
    pub interval: Duration,
}

impl RetryPolicy {
    pub const fn new(retries: u32, interval: Duration) -> Self {
        Self { retries, interval }
    }

    /// A single attempt, no retries.
    pub const fn once() -> Self {
        Self::new(0, Duration::ZERO)
    }
}

/// Run `op` until `done` accepts its output or the retries run out.
///
/// Returns the last output either way.
pub async fn retry_until<T, F, Fut, P>(policy: RetryPolicy, mut op: F, done: P) -> T
where
    F: FnMut() -> Fut,
    Fut: Future<Output = T>,
    P: Fn(&T) -> bool,
{
    let mut value = op().await;
    let mut remaining = policy.retries;
    while remaining > 0 && !done(&value) {
        tokio::time::sleep(policy.interval).await;
        value = op().await;
        remaining -= 1;
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_stops_when_done() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);

        let value = retry_until(
            RetryPolicy::new(4, Duration::from_millis(1)),
            || {
                let counter = Arc::clone(&counter);
                async move { counter.fetch_add(1, Ordering::SeqCst) + 1 }
            },
            |v| *v >= 3,
        )
        .await;

        assert_eq!(value, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_retries() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);

        let value: Option<u32> = retry_until(
            RetryPolicy::new(4, Duration::from_millis(1)),
            || {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    None
                }
            },
            Option::is_some,
        )
        .await;

        assert!(value.is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn test_once_runs_single_attempt() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        retry_until(
            RetryPolicy::once(),
            || {
                let counter = Arc::clone(&counter);
                async move { counter.fetch_add(1, Ordering::SeqCst) }
            },
            |_| false,
        )
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
