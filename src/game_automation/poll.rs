//! Polling helpers shared by every step.
//!
//! Both check the cancel token before each probe, so a stop request is
//! seen within one delay/interval.

use super::cancel::CancelToken;
use super::clock::Clock;
use std::future::Future;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome<T> {
    Found(T),
    Exhausted,
    Cancelled,
}

/// Probe up to `attempts` times, sleeping `delay` between failed attempts
/// (not after the last one).
pub async fn poll_bounded<C, T, F, Fut>(
    clock: &C,
    cancel: &CancelToken,
    attempts: u32,
    delay: Duration,
    mut probe: F,
) -> PollOutcome<T>
where
    C: Clock,
    F: FnMut() -> Fut,
    Fut: Future<Output = Option<T>>,
{
    for attempt in 1..=attempts {
        if cancel.is_cancelled() {
            return PollOutcome::Cancelled;
        }
        if let Some(found) = probe().await {
            return PollOutcome::Found(found);
        }
        if attempt < attempts {
            clock.sleep(delay).await;
        }
    }
    PollOutcome::Exhausted
}

/// Probe every `interval` until something is found or the run is cancelled.
pub async fn poll_until<C, T, F, Fut>(
    clock: &C,
    cancel: &CancelToken,
    interval: Duration,
    mut probe: F,
) -> PollOutcome<T>
where
    C: Clock,
    F: FnMut() -> Fut,
    Fut: Future<Output = Option<T>>,
{
    loop {
        if cancel.is_cancelled() {
            return PollOutcome::Cancelled;
        }
        if let Some(found) = probe().await {
            return PollOutcome::Found(found);
        }
        clock.sleep(interval).await;
    }
}
