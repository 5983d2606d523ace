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

//! Authentication for the HTTP Google Cloud Pub/Sub client.
//!
//! This crate provides the credential pipeline used by the [pubsub-http]
//! client: token providers backed by [service account keys] or the
//! [GCE metadata service], a self-refreshing token cache, and a request
//! authorizer that decorates outgoing HTTP requests with a bearer token.
//!
//! Most applications do not use this crate directly. The Pub/Sub publisher
//! and subscriber construct the right provider from their configuration.
//!
//! [GCE metadata service]: https://cloud.google.com/compute/docs/metadata/overview
//! [pubsub-http]: https://crates.io/crates/pubsub-http
//! [service account keys]: https://cloud.google.com/iam/docs/keys-create-delete

pub mod anonymous;
pub mod errors;
pub mod headers;
mod jws;
pub mod metadata;
pub mod refresh;
pub mod service_account;
pub mod token;
pub mod token_cache;

/// The result type used by this crate.
pub type Result<T> = std::result::Result<T, errors::CredentialsError>;
