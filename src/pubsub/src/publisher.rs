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

//! Publish messages to a Pub/Sub topic over HTTP.

use crate::Result;
use crate::codec::MessageEncoder;
use crate::endpoint::Endpoint;
use crate::error::Error;
use crate::model::{OutgoingMessage, ProjectId, PublishRequest, PublishResponse, Topic};
use auth::headers::RequestAuthorizer;
use base64::prelude::{BASE64_STANDARD, Engine as _};
use std::collections::HashMap;
use std::sync::Arc;

/// An outgoing record.
#[derive(Clone, Debug)]
pub struct Record<A> {
    /// The payload, encoded to bytes by the publisher's
    /// [MessageEncoder].
    pub data: A,
    /// Attributes published alongside the payload.
    pub attributes: HashMap<String, String>,
    /// A client-chosen correlator, sent as the wire `messageId`. The
    /// service assigns its own message id on the response.
    pub unique_id: String,
}

impl<A> Record<A> {
    pub fn new<S: Into<String>>(data: A, unique_id: S) -> Self {
        Self {
            data,
            attributes: HashMap::new(),
            unique_id: unique_id.into(),
        }
    }

    pub fn with_attributes(mut self, attributes: HashMap<String, String>) -> Self {
        self.attributes = attributes;
        self
    }
}

/// Publishes records to one topic.
///
/// Publishing is request-scoped: there are no background tasks beyond the
/// token refresh of the credential cache. Retrying a publish with the same
/// `unique_id` is safe at the wire layer but may still yield duplicates at
/// the service (at-least-once publish semantics).
pub struct Publisher<A, E>
where
    E: MessageEncoder<A>,
{
    client: reqwest::Client,
    base_url: String,
    authorizer: Arc<dyn RequestAuthorizer>,
    encoder: E,
    _payload: std::marker::PhantomData<fn(A)>,
}

impl<A, E> std::fmt::Debug for Publisher<A, E>
where
    E: MessageEncoder<A>,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Publisher")
            .field("base_url", &self.base_url)
            .field("authorizer", &self.authorizer)
            .finish_non_exhaustive()
    }
}

impl<A, E> Publisher<A, E>
where
    E: MessageEncoder<A>,
{
    /// Creates a publisher for `topic`.
    ///
    /// Unless the configuration targets an emulator this acquires the
    /// initial access token, and fails when that fails.
    pub async fn new(
        config: crate::options::PublisherConfig,
        project: ProjectId,
        topic: Topic,
        encoder: E,
    ) -> Result<Self> {
        let authorizer =
            crate::credentials::authorizer(config.is_emulator, &config.credentials, config.token)
                .await?;
        let endpoint = Endpoint::new(config.host, config.port);
        Ok(Self {
            client: reqwest::Client::new(),
            base_url: endpoint.topic_url(&project, &topic),
            authorizer,
            encoder,
            _payload: std::marker::PhantomData,
        })
    }

    /// Publishes one record, returning the server-assigned message id.
    pub async fn produce<S: Into<String>>(
        &self,
        data: A,
        attributes: HashMap<String, String>,
        unique_id: S,
    ) -> Result<String> {
        let ids = self
            .produce_many(vec![Record::new(data, unique_id).with_attributes(attributes)])
            .await?;
        ids.into_iter().next().ok_or_else(|| Error::Decode {
            body: "the publish response carried no message ids".to_string(),
        })
    }

    /// Publishes a bundle of records in one request, returning the
    /// server-assigned message ids in the order of the records.
    ///
    /// An encoder failure on any record aborts the bundle before any
    /// request is made.
    pub async fn produce_many(&self, records: Vec<Record<A>>) -> Result<Vec<String>> {
        let messages = records
            .iter()
            .map(|record| {
                let bytes = self.encoder.encode(&record.data).map_err(Error::Encode)?;
                Ok(OutgoingMessage {
                    data: BASE64_STANDARD.encode(bytes),
                    message_id: record.unique_id.clone(),
                    attributes: record.attributes.clone(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let builder = self
            .client
            .post(format!("{}:publish", self.base_url))
            .json(&PublishRequest { messages });
        let builder = self.authorizer.authorize(builder).await.map_err(Error::Auth)?;
        let response = builder.send().await.map_err(Error::Transport)?;

        let status = response.status();
        let body = response.text().await.map_err(Error::Transport)?;
        if !status.is_success() {
            return Err(Error::FailedRequest {
                status: status.as_u16(),
                body,
            });
        }
        match serde_json::from_str::<PublishResponse>(&body) {
            Ok(parsed) => Ok(parsed.message_ids),
            Err(e) => {
                tracing::error!("cannot decode the publish response ({e}), raw body: {body}");
                Err(Error::Decode { body })
            }
        }
    }
}
