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

//! Errors for the HTTP Pub/Sub client.

use crate::model::{ErrorDetail, ErrorResponse};

/// An arbitrary caller-supplied error, e.g. from a message encoder.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

// The service reports an empty `ackIds` list with this exact message.
const NO_ACK_IDS_MESSAGE: &str = "No ack ids specified.";

/// The errors produced by the Pub/Sub publisher and subscriber.
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// The service rejected an acknowledge request with an empty ackId list.
    ///
    /// The batchers never dispatch empty groups, so this indicates a bug in
    /// the batching machinery.
    #[error("the service rejected an acknowledge request without ack ids")]
    NoAckIds,

    /// The service returned an error body this client has no special
    /// handling for.
    #[error("service error: {} (status: {}, code: {})", .0.message, .0.status, .0.code)]
    Unknown(ErrorDetail),

    /// The service returned a failing status with a body that is not in the
    /// standard error shape.
    #[error("unparseable error body: {0}")]
    UnparseableBody(String),

    /// A publish request failed.
    #[error("request failed with HTTP status {status}: {body}")]
    FailedRequest {
        /// The HTTP status code of the response.
        status: u16,
        /// The raw response body.
        body: String,
    },

    /// The request could not be sent, or the response not received.
    #[error("transport error")]
    Transport(#[source] reqwest::Error),

    /// The request could not be authorized.
    #[error("authentication error")]
    Auth(#[source] auth::errors::CredentialsError),

    /// The caller-supplied encoder rejected an outgoing payload.
    #[error("cannot encode message payload")]
    Encode(#[source] BoxError),

    /// A successful response carried a body this client cannot decode.
    #[error("cannot decode response body: {body}")]
    Decode {
        /// The raw response body.
        body: String,
    },

    /// A configuration or argument value is not usable.
    #[error("{0}")]
    InvalidArgument(String),
}

/// Classifies the body of a non-2xx subscriber response.
pub(crate) fn classify_error_body(body: &[u8]) -> Error {
    match serde_json::from_slice::<ErrorResponse>(body) {
        Ok(parsed) if parsed.error.message == NO_ACK_IDS_MESSAGE => Error::NoAckIds,
        Ok(parsed) => Error::Unknown(parsed.error),
        Err(_) => Error::UnparseableBody(String::from_utf8_lossy(body).into_owned()),
    }
}
