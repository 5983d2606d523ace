// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! A generic self-refreshing value.
//!
//! [Refreshable] holds a value that a background task re-computes on a
//! schedule. Readers get the most recently stored value in constant time,
//! without blocking. The background task retries failed refreshes with
//! bounded backoff and stops when the [Refreshable] is dropped.
//!
//! The token cache is the main consumer, but nothing in this module is
//! specific to tokens.

use crate::Result;
use crate::errors::CredentialsError;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior, interval_at, sleep};
use tokio_util::sync::{CancellationToken, DropGuard};

/// When the background task re-evaluates the refresh function.
pub enum RefreshSchedule<A> {
    /// Fixed-rate ticks: the cadence does not drift by the duration of the
    /// refresh itself. Ticks backlogged behind a slow refresh coalesce into
    /// one, so at most one refresh runs at a time.
    Interval(Duration),

    /// The delay until the next refresh is computed from the most recently
    /// stored value. Used by the token cache to refresh just before a token
    /// expires.
    AfterEach(Arc<dyn Fn(&A) -> Duration + Send + Sync>),
}

impl<A> Clone for RefreshSchedule<A> {
    fn clone(&self) -> Self {
        match self {
            Self::Interval(d) => Self::Interval(*d),
            Self::AfterEach(f) => Self::AfterEach(f.clone()),
        }
    }
}

impl<A> std::fmt::Debug for RefreshSchedule<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Interval(d) => f.debug_tuple("Interval").field(d).finish(),
            Self::AfterEach(_) => f.debug_tuple("AfterEach").finish_non_exhaustive(),
        }
    }
}

/// Bounds the retries within one scheduled refresh.
pub struct RetryOptions {
    /// The delay before the first retry.
    pub delay: Duration,
    /// Produces each subsequent delay from the previous one.
    pub next_delay: Arc<dyn Fn(Duration) -> Duration + Send + Sync>,
    /// Total number of attempts per scheduled refresh, including the first.
    pub max_attempts: u32,
}

impl Clone for RetryOptions {
    fn clone(&self) -> Self {
        Self {
            delay: self.delay,
            next_delay: self.next_delay.clone(),
            max_attempts: self.max_attempts,
        }
    }
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(1),
            next_delay: Arc::new(|d| d * 2),
            max_attempts: 5,
        }
    }
}

impl std::fmt::Debug for RetryOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryOptions")
            .field("delay", &self.delay)
            .field("max_attempts", &self.max_attempts)
            .finish_non_exhaustive()
    }
}

/// Side-effect callbacks observed by the background task.
///
/// Absent callbacks are no-ops.
#[derive(Clone, Default)]
pub struct RefreshHooks {
    /// Runs after each successful refresh.
    pub on_refresh_success: Option<Arc<dyn Fn() + Send + Sync>>,
    /// Runs on each failed refresh attempt, before the retry machinery
    /// decides whether to try again.
    pub on_refresh_error: Option<Arc<dyn Fn(&CredentialsError) + Send + Sync>>,
    /// Runs when a scheduled refresh exhausted its attempts. The error is
    /// then swallowed; the next scheduled refresh starts over.
    pub on_retries_exhausted: Option<Arc<dyn Fn(&CredentialsError) + Send + Sync>>,
}

impl std::fmt::Debug for RefreshHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshHooks")
            .field("on_refresh_success", &self.on_refresh_success.is_some())
            .field("on_refresh_error", &self.on_refresh_error.is_some())
            .field("on_retries_exhausted", &self.on_retries_exhausted.is_some())
            .finish()
    }
}

/// A value kept fresh by a background task.
///
/// Constructing a [Refreshable] evaluates the refresh function once; a
/// failure there fails the construction, so a live cell always holds a
/// value. Dropping the cell cancels the background task, interrupting any
/// in-flight sleep or refresh.
pub struct Refreshable<A> {
    rx: watch::Receiver<A>,
    _cancel: DropGuard,
}

impl<A> std::fmt::Debug for Refreshable<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Refreshable").finish_non_exhaustive()
    }
}

impl<A> Refreshable<A>
where
    A: Clone + Send + Sync + 'static,
{
    /// Evaluates `refresh` once to seed the cell, then spawns the background
    /// refresh task.
    pub async fn new<F, Fut>(
        refresh: F,
        schedule: RefreshSchedule<A>,
        retry: RetryOptions,
        hooks: RefreshHooks,
    ) -> Result<Self>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<A>> + Send + 'static,
    {
        let seed = refresh().await?;
        let (tx, rx) = watch::channel(seed);
        let cancel = CancellationToken::new();
        // The fixed-rate cadence is anchored here, not at the first poll of
        // the background task.
        let started = Instant::now();
        tokio::spawn(refresh_task(
            refresh,
            schedule,
            retry,
            hooks,
            tx,
            cancel.clone(),
            started,
        ));
        Ok(Self {
            rx,
            _cancel: cancel.drop_guard(),
        })
    }

    /// Returns the most recently stored value.
    ///
    /// Constant time, never blocks, and never observes the cell empty.
    pub fn value(&self) -> A {
        self.rx.borrow().clone()
    }
}

async fn refresh_task<A, F, Fut>(
    refresh: F,
    schedule: RefreshSchedule<A>,
    retry: RetryOptions,
    hooks: RefreshHooks,
    tx: watch::Sender<A>,
    cancel: CancellationToken,
    started: Instant,
) where
    A: Clone + Send + Sync + 'static,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<A>> + Send + 'static,
{
    match schedule {
        RefreshSchedule::Interval(period) => {
            let mut ticker = interval_at(started + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    _ = ticker.tick() => {}
                }
                refresh_with_retry(&refresh, &retry, &hooks, &tx, &cancel).await;
            }
        }
        RefreshSchedule::AfterEach(next) => loop {
            let delay = next(&tx.borrow());
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = sleep(delay) => {}
            }
            refresh_with_retry(&refresh, &retry, &hooks, &tx, &cancel).await;
        },
    }
}

// One scheduled refresh: the first attempt plus bounded retries. On success
// the new value is published atomically; on exhaustion the error is
// swallowed so the next scheduled refresh gets another try.
async fn refresh_with_retry<A, F, Fut>(
    refresh: &F,
    retry: &RetryOptions,
    hooks: &RefreshHooks,
    tx: &watch::Sender<A>,
    cancel: &CancellationToken,
) where
    A: Clone + Send + Sync + 'static,
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<A>> + Send,
{
    let mut delay = retry.delay;
    let mut attempt = 0_u32;
    loop {
        attempt += 1;
        let result = tokio::select! {
            _ = cancel.cancelled() => return,
            r = refresh() => r,
        };
        match result {
            Ok(value) => {
                // Receivers may all be gone while the owning scope is
                // shutting down; nothing to do about it here.
                let _ = tx.send(value);
                if let Some(hook) = &hooks.on_refresh_success {
                    hook();
                }
                return;
            }
            Err(e) => {
                if let Some(hook) = &hooks.on_refresh_error {
                    hook(&e);
                }
                if attempt >= retry.max_attempts.max(1) {
                    tracing::warn!("refresh failed after {attempt} attempts: {e}");
                    if let Some(hook) = &hooks.on_retries_exhausted {
                        hook(&e);
                    }
                    return;
                }
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    _ = sleep(delay) => {}
                }
                delay = (retry.next_delay)(delay);
            }
        }
    }
}
