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

//! The JSON shapes of the Pub/Sub [REST API (v1)] and the identifier types
//! used to address it.
//!
//! [REST API (v1)]: https://cloud.google.com/pubsub/docs/reference/rest

use crate::error::Error;
use std::collections::HashMap;
use time::OffsetDateTime;

macro_rules! identifier {
    ($name:ident, $what:literal) => {
        /// An opaque, non-empty identifier used as a REST path segment.
        #[derive(Clone, Debug, PartialEq, Eq, Hash)]
        pub struct $name(String);

        impl $name {
            #[doc = concat!("Creates a new ", $what, ".")]
            ///
            /// # Errors
            ///
            /// Fails on an empty string.
            pub fn new<S: Into<String>>(value: S) -> crate::Result<Self> {
                let value = value.into();
                if value.is_empty() {
                    return Err(Error::InvalidArgument(format!(
                        "a {} must not be empty",
                        $what
                    )));
                }
                Ok(Self(value))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

identifier!(ProjectId, "project id");
identifier!(Topic, "topic name");
identifier!(Subscription, "subscription name");

/// A message as delivered by the service.
///
/// The `data` field is base64 on the wire and decoded here.
#[serde_with::serde_as]
#[derive(Clone, Debug, Default, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PubsubMessage {
    #[serde_as(as = "serde_with::base64::Base64")]
    #[serde(default)]
    pub data: bytes::Bytes,
    #[serde(default)]
    pub attributes: HashMap<String, String>,
    #[serde(default)]
    pub message_id: String,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub publish_time: Option<OffsetDateTime>,
    /// Surfaced as the service returns it; this client does not interpret
    /// ordering keys.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ordering_key: Option<String>,
}

/// A message paired with the ack id of this delivery.
#[derive(Clone, Debug, Default, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceivedMessage {
    pub ack_id: String,
    #[serde(default)]
    pub message: PubsubMessage,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PullRequest {
    pub return_immediately: bool,
    pub max_messages: i32,
}

#[derive(Clone, Debug, Default, PartialEq, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PullResponse {
    #[serde(default)]
    pub received_messages: Vec<ReceivedMessage>,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AcknowledgeRequest {
    pub ack_ids: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ModifyAckDeadlineRequest {
    pub ack_ids: Vec<String>,
    pub ack_deadline_seconds: i32,
}

// The outgoing side keeps `data` as the base64 string it is on the wire;
// the publisher encodes payloads before building the request.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct OutgoingMessage {
    pub data: String,
    pub message_id: String,
    pub attributes: HashMap<String, String>,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PublishRequest {
    pub messages: Vec<OutgoingMessage>,
}

#[derive(Clone, Debug, Default, PartialEq, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PublishResponse {
    #[serde(default)]
    pub message_ids: Vec<String>,
}

/// The error body returned on 4xx/5xx responses.
#[derive(Clone, Debug, Default, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Clone, Debug, Default, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct ErrorDetail {
    pub message: String,
    pub status: String,
    pub code: i32,
}
