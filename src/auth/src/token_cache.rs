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

//! A self-refreshing token cache.

use crate::Result;
use crate::refresh::{RefreshHooks, RefreshSchedule, Refreshable, RetryOptions};
use crate::token::{Token, TokenProvider};
use async_trait::async_trait;
use std::cmp::max;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

// Most metadata service backends refresh tokens 5 minutes before expiry,
// except for Serverless which refreshes 4 minutes before expiry. Use 4
// minutes as the staleness limit for our refresh logic too.
const DEFAULT_SAFETY_PERIOD: Duration = Duration::from_secs(240);
const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(30 * 60);

/// Controls when the [TokenCache] refreshes its token and how token fetch
/// failures are retried.
#[derive(Clone, Debug, Default)]
pub struct TokenRefreshOptions {
    refresh_interval: Option<Duration>,
    safety_period: Option<Duration>,
    retry: RetryOptions,
    hooks: RefreshHooks,
}

impl TokenRefreshOptions {
    /// Sets the refresh cadence for tokens that do not report an expiry.
    ///
    /// Tokens that do report an expiry refresh `safety_period` before it
    /// instead.
    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = Some(interval);
        self
    }

    /// Sets how long before its expiry a token is considered stale.
    pub fn with_safety_period(mut self, safety_period: Duration) -> Self {
        self.safety_period = Some(safety_period);
        self
    }

    /// Sets the delay before the first retry of a failed refresh.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry.delay = delay;
        self
    }

    /// Sets the function producing each subsequent retry delay.
    pub fn with_retry_next_delay<F>(mut self, next_delay: F) -> Self
    where
        F: Fn(Duration) -> Duration + Send + Sync + 'static,
    {
        self.retry.next_delay = Arc::new(next_delay);
        self
    }

    /// Sets the total number of attempts per scheduled refresh.
    pub fn with_retry_max_attempts(mut self, max_attempts: u32) -> Self {
        self.retry.max_attempts = max_attempts;
        self
    }

    /// Sets a callback invoked after each successful refresh.
    pub fn with_on_refresh_success<F>(mut self, hook: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.hooks.on_refresh_success = Some(Arc::new(hook));
        self
    }

    /// Sets a callback invoked on each failed refresh attempt.
    pub fn with_on_refresh_error<F>(mut self, hook: F) -> Self
    where
        F: Fn(&crate::errors::CredentialsError) + Send + Sync + 'static,
    {
        self.hooks.on_refresh_error = Some(Arc::new(hook));
        self
    }

    /// Sets a callback invoked when a scheduled refresh exhausts its retries.
    pub fn with_on_retries_exhausted<F>(mut self, hook: F) -> Self
    where
        F: Fn(&crate::errors::CredentialsError) + Send + Sync + 'static,
    {
        self.hooks.on_retries_exhausted = Some(Arc::new(hook));
        self
    }

    fn refresh_interval(&self) -> Duration {
        self.refresh_interval.unwrap_or(DEFAULT_REFRESH_INTERVAL)
    }

    fn safety_period(&self) -> Duration {
        self.safety_period.unwrap_or(DEFAULT_SAFETY_PERIOD)
    }
}

/// Caches the token of another [TokenProvider], refreshing it in the
/// background before it expires.
///
/// After a successful refresh the next attempt is scheduled at
/// `max(retry_delay, expires_in - safety_period)`: a token already within
/// the safety period of its expiry is used as-is, and the retry machinery
/// handles its eventual failure. Reads are constant-time and monotonic; a
/// read after a successful refresh never returns a strictly older token.
#[derive(Debug)]
pub struct TokenCache {
    cell: Refreshable<Token>,
}

impl TokenCache {
    /// Fetches the initial token from `inner` and starts the refresh task.
    ///
    /// Fails when the initial fetch fails.
    pub async fn new<T>(inner: T, options: TokenRefreshOptions) -> Result<Self>
    where
        T: TokenProvider + 'static,
    {
        let inner = Arc::new(inner);
        let refresh = move || {
            let inner = inner.clone();
            async move { inner.token().await }
        };
        let floor = options.retry.delay;
        let safety_period = options.safety_period();
        let fallback = options.refresh_interval();
        let schedule = RefreshSchedule::AfterEach(Arc::new(move |token: &Token| {
            next_refresh_delay(token, safety_period, floor, fallback)
        }));
        let cell = Refreshable::new(refresh, schedule, options.retry, options.hooks).await?;
        Ok(Self { cell })
    }
}

fn next_refresh_delay(
    token: &Token,
    safety_period: Duration,
    floor: Duration,
    fallback: Duration,
) -> Duration {
    match token.expires_at {
        None => fallback,
        Some(expires_at) => {
            let remaining = expires_at
                .checked_duration_since(Instant::now())
                .unwrap_or_default();
            max(floor, remaining.saturating_sub(safety_period))
        }
    }
}

#[async_trait]
impl TokenProvider for TokenCache {
    async fn token(&self) -> Result<Token> {
        Ok(self.cell.value())
    }
}
