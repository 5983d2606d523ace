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

//! An HTTP client for [Google Cloud Pub/Sub].
//!
//! This crate speaks the Pub/Sub [REST API (v1)]: a [Publisher] that
//! encodes, bundles and publishes records, and a [Subscriber] that pulls
//! messages, yields them as a stream, and batches acknowledgements back to
//! the service in the background.
//!
//! Authentication uses OAuth2 service-account JWTs or GCE instance-metadata
//! tokens, refreshed proactively before expiry. Against the [emulator] the
//! client sends unauthenticated requests over plain HTTP.
//!
//! # Example: publish a message
//! ```no_run
//! # use pubsub_http::model::{ProjectId, Topic};
//! # use pubsub_http::options::PublisherConfig;
//! # use pubsub_http::publisher::Publisher;
//! # use std::collections::HashMap;
//! # tokio_test::block_on(async {
//! let config = PublisherConfig::default();
//! let publisher = Publisher::new(
//!     config,
//!     ProjectId::new("my-project")?,
//!     Topic::new("my-topic")?,
//!     pubsub_http::codec::StringEncoder,
//! )
//! .await?;
//! let id = publisher
//!     .produce("hello".to_string(), HashMap::new(), "unique-1")
//!     .await?;
//! println!("published with server id {id}");
//! # Ok::<(), pubsub_http::Error>(())
//! # });
//! ```
//!
//! # Example: consume messages
//! ```no_run
//! # use pubsub_http::model::{ProjectId, Subscription};
//! # use pubsub_http::options::SubscriberConfig;
//! # use pubsub_http::subscriber::Subscriber;
//! # tokio_test::block_on(async {
//! let subscriber = Subscriber::new(
//!     SubscriberConfig::default(),
//!     ProjectId::new("my-project")?,
//!     Subscription::new("my-subscription")?,
//! )
//! .await?;
//! let mut stream = subscriber.subscribe();
//! while let Some(record) = stream.recv().await {
//!     let record = record?;
//!     println!("received {:?}", record.message());
//!     record.ack();
//! }
//! # Ok::<(), pubsub_http::Error>(())
//! # });
//! ```
//!
//! [emulator]: https://cloud.google.com/pubsub/docs/emulator
//! [Google Cloud Pub/Sub]: https://cloud.google.com/pubsub
//! [Publisher]: crate::publisher::Publisher
//! [REST API (v1)]: https://cloud.google.com/pubsub/docs/reference/rest
//! [Subscriber]: crate::subscriber::Subscriber

pub mod codec;
mod credentials;
mod endpoint;
pub mod error;
pub mod model;
pub mod options;
pub mod publisher;
pub mod subscriber;

pub use error::Error;

/// The result type used by this crate.
pub type Result<T> = std::result::Result<T, Error>;
