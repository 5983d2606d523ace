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

//! Configuration for the publisher and subscriber.

use std::time::Duration;

pub use auth::token_cache::TokenRefreshOptions;

const DEFAULT_HOST: &str = "pubsub.googleapis.com";
const DEFAULT_PORT: u16 = 443;
const DEFAULT_READ_MAX_MESSAGES: i32 = 100;
const DEFAULT_READ_CONCURRENCY: usize = 1;
const DEFAULT_ACKNOWLEDGE_BATCH_SIZE: usize = 100;
const DEFAULT_ACKNOWLEDGE_BATCH_LATENCY: Duration = Duration::from_secs(1);

/// Where access tokens come from.
///
/// Ignored in emulator mode, where requests are unauthenticated.
#[derive(Clone, Default)]
pub enum CredentialSource {
    /// Fetch tokens from the GCE instance metadata service.
    #[default]
    InstanceMetadata,
    /// Sign JWT bearer assertions with this [service account key] and
    /// exchange them for tokens.
    ///
    /// [service account key]: https://cloud.google.com/iam/docs/keys-create-delete#creating
    ServiceAccountKey(serde_json::Value),
}

impl std::fmt::Debug for CredentialSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InstanceMetadata => f.write_str("InstanceMetadata"),
            // The key JSON contains the private key.
            Self::ServiceAccountKey(_) => f.write_str("ServiceAccountKey([censored])"),
        }
    }
}

/// Configuration for a [Publisher][crate::publisher::Publisher].
#[derive(Clone, Debug)]
pub struct PublisherConfig {
    pub(crate) host: String,
    pub(crate) port: u16,
    pub(crate) is_emulator: bool,
    pub(crate) credentials: CredentialSource,
    pub(crate) token: TokenRefreshOptions,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            is_emulator: false,
            credentials: CredentialSource::default(),
            token: TokenRefreshOptions::default(),
        }
    }
}

impl PublisherConfig {
    /// Sets the host of the Pub/Sub service.
    pub fn with_host<S: Into<String>>(mut self, host: S) -> Self {
        self.host = host.into();
        self
    }

    /// Sets the port of the Pub/Sub service.
    ///
    /// The client uses HTTPS exactly when the port is 443, plain HTTP
    /// otherwise.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Targets a local [emulator]: no credentials are acquired and no
    /// `Authorization` header is sent.
    ///
    /// [emulator]: https://cloud.google.com/pubsub/docs/emulator
    pub fn with_emulator(mut self, is_emulator: bool) -> Self {
        self.is_emulator = is_emulator;
        self
    }

    /// Sets where access tokens come from.
    pub fn with_credentials(mut self, credentials: CredentialSource) -> Self {
        self.credentials = credentials;
        self
    }

    /// Sets the token refresh and retry behavior.
    pub fn with_token_options(mut self, token: TokenRefreshOptions) -> Self {
        self.token = token;
        self
    }
}

/// Configuration for a [Subscriber][crate::subscriber::Subscriber].
#[derive(Clone, Debug)]
pub struct SubscriberConfig {
    pub(crate) host: String,
    pub(crate) port: u16,
    pub(crate) is_emulator: bool,
    pub(crate) credentials: CredentialSource,
    pub(crate) token: TokenRefreshOptions,
    pub(crate) read_max_messages: i32,
    pub(crate) read_return_immediately: bool,
    pub(crate) read_concurrency: usize,
    pub(crate) acknowledge_batch_size: usize,
    pub(crate) acknowledge_batch_latency: Duration,
}

impl Default for SubscriberConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            is_emulator: false,
            credentials: CredentialSource::default(),
            token: TokenRefreshOptions::default(),
            read_max_messages: DEFAULT_READ_MAX_MESSAGES,
            read_return_immediately: false,
            read_concurrency: DEFAULT_READ_CONCURRENCY,
            acknowledge_batch_size: DEFAULT_ACKNOWLEDGE_BATCH_SIZE,
            acknowledge_batch_latency: DEFAULT_ACKNOWLEDGE_BATCH_LATENCY,
        }
    }
}

impl SubscriberConfig {
    /// Sets the host of the Pub/Sub service.
    pub fn with_host<S: Into<String>>(mut self, host: S) -> Self {
        self.host = host.into();
        self
    }

    /// Sets the port of the Pub/Sub service.
    ///
    /// The client uses HTTPS exactly when the port is 443, plain HTTP
    /// otherwise.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Targets a local [emulator]: no credentials are acquired and no
    /// `Authorization` header is sent.
    ///
    /// [emulator]: https://cloud.google.com/pubsub/docs/emulator
    pub fn with_emulator(mut self, is_emulator: bool) -> Self {
        self.is_emulator = is_emulator;
        self
    }

    /// Sets where access tokens come from.
    pub fn with_credentials(mut self, credentials: CredentialSource) -> Self {
        self.credentials = credentials;
        self
    }

    /// Sets the token refresh and retry behavior.
    pub fn with_token_options(mut self, token: TokenRefreshOptions) -> Self {
        self.token = token;
        self
    }

    /// Sets the maximum number of messages requested per pull.
    pub fn with_read_max_messages(mut self, read_max_messages: i32) -> Self {
        self.read_max_messages = read_max_messages;
        self
    }

    /// When set, pulls return immediately even when no messages are
    /// available, instead of waiting for some to arrive.
    pub fn with_read_return_immediately(mut self, read_return_immediately: bool) -> Self {
        self.read_return_immediately = read_return_immediately;
        self
    }

    /// Sets the number of concurrent pulls.
    ///
    /// With more than one, the order of messages across pulls is
    /// unspecified.
    pub fn with_read_concurrency(mut self, read_concurrency: usize) -> Self {
        self.read_concurrency = read_concurrency.max(1);
        self
    }

    /// Sets how many ack ids an acknowledge batch carries at most.
    pub fn with_acknowledge_batch_size(mut self, acknowledge_batch_size: usize) -> Self {
        self.acknowledge_batch_size = acknowledge_batch_size.max(1);
        self
    }

    /// Sets how long a batch may wait for more ack ids after its first one.
    pub fn with_acknowledge_batch_latency(mut self, acknowledge_batch_latency: Duration) -> Self {
        self.acknowledge_batch_latency = acknowledge_batch_latency;
        self
    }
}
