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

//! Error types for the credential pipeline.

use std::error::Error;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::sync::Arc;

type ArcError = Arc<dyn Error + Send + Sync>;

/// Represents a failure to acquire or refresh a credential.
///
/// These failures may happen even after a service account key was
/// successfully loaded and parsed, e.g. a temporary failure to exchange a
/// JWT assertion for an access token. Transient errors may succeed on a
/// future attempt; the token cache retries them.
#[derive(Clone, Debug)]
pub struct CredentialsError {
    is_transient: bool,
    message: Option<String>,
    source: Option<ArcError>,
}

impl CredentialsError {
    /// Creates a new `CredentialsError` from an underlying error.
    ///
    /// # Parameters
    /// * `is_transient` - if true, the operation may succeed in future attempts.
    /// * `source` - the underlying error that caused the auth failure.
    pub fn from_source<T: Error + Send + Sync + 'static>(is_transient: bool, source: T) -> Self {
        CredentialsError {
            is_transient,
            message: None,
            source: Some(Arc::new(source)),
        }
    }

    /// Creates a new `CredentialsError` from a message.
    pub fn from_msg<T: Into<String>>(is_transient: bool, message: T) -> Self {
        CredentialsError {
            is_transient,
            message: Some(message.into()),
            source: None,
        }
    }

    /// Creates a new `CredentialsError` with a message and a source.
    pub fn new<M, S>(is_transient: bool, message: M, source: S) -> Self
    where
        M: Into<String>,
        S: Error + Send + Sync + 'static,
    {
        CredentialsError {
            is_transient,
            message: Some(message.into()),
            source: Some(Arc::new(source)),
        }
    }

    /// Returns true if the error may succeed in future attempts.
    pub fn is_transient(&self) -> bool {
        self.is_transient
    }
}

impl Error for CredentialsError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.source
            .as_ref()
            .map(|arc| arc.as_ref() as &(dyn Error + 'static))
    }
}

const TRANSIENT_MSG: &str = "but future attempts may succeed";
const PERMANENT_MSG: &str = "and future attempts will not succeed";

impl Display for CredentialsError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let msg = if self.is_transient {
            TRANSIENT_MSG
        } else {
            PERMANENT_MSG
        };
        match &self.message {
            None => write!(f, "cannot acquire an auth token {msg}"),
            Some(m) => write!(f, "{m} {msg}"),
        }
    }
}

pub(crate) fn non_retryable<T: Error + Send + Sync + 'static>(source: T) -> CredentialsError {
    CredentialsError::from_source(false, source)
}

pub(crate) fn non_retryable_from_str<T: Into<String>>(message: T) -> CredentialsError {
    CredentialsError::from_msg(false, message)
}

/// Maps errors from `reqwest::RequestBuilder::send` to a `CredentialsError`.
///
/// Failures to connect, or timeouts, may succeed on a future attempt.
/// Everything else (building the request, TLS negotiation) will not.
pub(crate) fn from_http_error(err: reqwest::Error, message: &str) -> CredentialsError {
    let is_transient = err.is_connect() || err.is_timeout();
    CredentialsError::new(is_transient, message, err)
}

/// Maps a non-2xx response from a token endpoint to a `CredentialsError`.
pub(crate) async fn from_http_response(
    response: reqwest::Response,
    message: &str,
) -> CredentialsError {
    let status = response.status();
    // 408 (request timeout), 429 (too many requests) and 5xx may all clear
    // up on a future attempt.
    let is_transient = status == http::StatusCode::REQUEST_TIMEOUT
        || status == http::StatusCode::TOO_MANY_REQUESTS
        || status.is_server_error();
    let body = response.text().await.unwrap_or_default();
    CredentialsError::from_msg(
        is_transient,
        format!("{message}: HTTP status {status}, body: {body}"),
    )
}
