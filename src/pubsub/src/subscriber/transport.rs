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

use super::stub::SubscriptionStub;
use crate::Result;
use crate::error::{Error, classify_error_body};
use crate::model::{
    AcknowledgeRequest, ModifyAckDeadlineRequest, PullRequest, PullResponse, ReceivedMessage,
};
use auth::headers::RequestAuthorizer;
use std::sync::Arc;
use std::time::Duration;

/// The HTTP implementation of the subscription operations.
///
/// Each operation is one POST with a JSON body, against
/// `{base}/v1/projects/{project}/subscriptions/{subscription}`.
pub(crate) struct HttpSubscriptionStub {
    client: reqwest::Client,
    base_url: String,
    authorizer: Arc<dyn RequestAuthorizer>,
    pull_request: PullRequest,
}

impl std::fmt::Debug for HttpSubscriptionStub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpSubscriptionStub")
            .field("base_url", &self.base_url)
            .field("pull_request", &self.pull_request)
            .finish_non_exhaustive()
    }
}

impl HttpSubscriptionStub {
    pub(crate) fn new(
        base_url: String,
        authorizer: Arc<dyn RequestAuthorizer>,
        return_immediately: bool,
        max_messages: i32,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
            authorizer,
            pull_request: PullRequest {
                return_immediately,
                max_messages,
            },
        }
    }

    // Sends one POST, returning the body of a 2xx response and classifying
    // everything else.
    async fn execute<B: serde::Serialize>(&self, verb: &str, body: &B) -> Result<bytes::Bytes> {
        let builder = self
            .client
            .post(format!("{}:{verb}", self.base_url))
            .json(body);
        let builder = self.authorizer.authorize(builder).await.map_err(Error::Auth)?;
        let response = builder.send().await.map_err(Error::Transport)?;
        let status = response.status();
        let body = response.bytes().await.map_err(Error::Transport)?;
        if !status.is_success() {
            return Err(classify_error_body(&body));
        }
        Ok(body)
    }
}

#[async_trait::async_trait]
impl SubscriptionStub for HttpSubscriptionStub {
    async fn pull(&self) -> Result<Vec<ReceivedMessage>> {
        let body = self.execute("pull", &self.pull_request).await?;
        match serde_json::from_slice::<PullResponse>(&body) {
            Ok(response) => Ok(response.received_messages),
            Err(e) => {
                let body = String::from_utf8_lossy(&body).into_owned();
                tracing::error!("cannot decode the pull response ({e}), raw body: {body}");
                Err(Error::Decode { body })
            }
        }
    }

    async fn acknowledge(&self, ack_ids: Vec<String>) -> Result<()> {
        if ack_ids.is_empty() {
            // The service would reject this anyway, without the round trip.
            return Err(Error::NoAckIds);
        }
        self.execute("acknowledge", &AcknowledgeRequest { ack_ids })
            .await?;
        Ok(())
    }

    async fn modify_ack_deadline(&self, ack_ids: Vec<String>, deadline: Duration) -> Result<()> {
        if ack_ids.is_empty() {
            return Err(Error::NoAckIds);
        }
        let request = ModifyAckDeadlineRequest {
            ack_ids,
            ack_deadline_seconds: deadline.as_secs() as i32,
        };
        self.execute("modifyAckDeadline", &request).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use auth::headers::NoAuthorizer;
    use httptest::{
        Expectation, Server, ServerBuilder,
        matchers::{all_of, eq, json_decoded, request},
        responders::*,
    };
    use serde_json::json;

    type TestResult = std::result::Result<(), Box<dyn std::error::Error>>;

    // httptest's default bind prefers IPv6 loopback, whose address formats
    // as `::1` without brackets; pin to IPv4 loopback so the `host:port`
    // strings built below stay valid URLs.
    fn test_server() -> Server {
        ServerBuilder::new()
            .bind_addr(([127, 0, 0, 1], 0).into())
            .run()
            .unwrap()
    }

    fn stub_for(server: &Server) -> HttpSubscriptionStub {
        let addr = server.addr();
        HttpSubscriptionStub::new(
            format!("http://{}:{}/v1/projects/p/subscriptions/s", addr.ip(), addr.port()),
            Arc::new(NoAuthorizer),
            true,
            10,
        )
    }

    #[tokio::test]
    async fn pull_decodes_messages() -> TestResult {
        let server = test_server();
        server.expect(
            Expectation::matching(all_of![
                request::method("POST"),
                request::path("/v1/projects/p/subscriptions/s:pull"),
                request::body(json_decoded(eq(json!({
                    "returnImmediately": true,
                    "maxMessages": 10,
                })))),
            ])
            .respond_with(json_encoded(json!({
                "receivedMessages": [
                    {"ackId": "a-1", "message": {"data": "AQI=", "messageId": "m-1"}},
                    {"ackId": "a-2", "message": {"data": "", "messageId": "m-2"}},
                ]
            }))),
        );

        let got = stub_for(&server).pull().await?;
        assert_eq!(got.len(), 2);
        assert_eq!(got[0].ack_id, "a-1");
        assert_eq!(got[0].message.data.as_ref(), &[0x01, 0x02]);
        assert_eq!(got[1].ack_id, "a-2");
        Ok(())
    }

    #[tokio::test]
    async fn pull_empty_response() -> TestResult {
        let server = test_server();
        server.expect(
            Expectation::matching(request::method("POST"))
                .respond_with(json_encoded(json!({}))),
        );

        let got = stub_for(&server).pull().await?;
        assert!(got.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn pull_undecodable_success_body() -> TestResult {
        let server = test_server();
        server.expect(
            Expectation::matching(request::method("POST"))
                .respond_with(status_code(200).body("<html>")),
        );

        let err = stub_for(&server).pull().await.unwrap_err();
        match err {
            Error::Decode { body } => assert_eq!(body, "<html>"),
            other => panic!("expected Decode, got {other:?}"),
        }
        Ok(())
    }

    #[tokio::test]
    async fn acknowledge_posts_ack_ids() -> TestResult {
        let server = test_server();
        server.expect(
            Expectation::matching(all_of![
                request::method("POST"),
                request::path("/v1/projects/p/subscriptions/s:acknowledge"),
                request::body(json_decoded(eq(json!({"ackIds": ["a-1", "a-2"]})))),
            ])
            .respond_with(json_encoded(json!({}))),
        );

        stub_for(&server)
            .acknowledge(vec!["a-1".into(), "a-2".into()])
            .await?;
        Ok(())
    }

    #[tokio::test]
    async fn nack_is_modify_with_zero_deadline() -> TestResult {
        let server = test_server();
        server.expect(
            Expectation::matching(all_of![
                request::method("POST"),
                request::path("/v1/projects/p/subscriptions/s:modifyAckDeadline"),
                request::body(json_decoded(eq(json!({
                    "ackIds": ["a-1"],
                    "ackDeadlineSeconds": 0,
                })))),
            ])
            .respond_with(json_encoded(json!({}))),
        );

        stub_for(&server).nack(vec!["a-1".into()]).await?;
        Ok(())
    }

    #[tokio::test]
    async fn modify_ack_deadline_posts_seconds() -> TestResult {
        let server = test_server();
        server.expect(
            Expectation::matching(all_of![
                request::method("POST"),
                request::path("/v1/projects/p/subscriptions/s:modifyAckDeadline"),
                request::body(json_decoded(eq(json!({
                    "ackIds": ["a-1"],
                    "ackDeadlineSeconds": 30,
                })))),
            ])
            .respond_with(json_encoded(json!({}))),
        );

        stub_for(&server)
            .modify_ack_deadline(vec!["a-1".into()], Duration::from_secs(30))
            .await?;
        Ok(())
    }

    #[tokio::test]
    async fn empty_batches_rejected_without_request() -> TestResult {
        let server = test_server();
        // No expectation: any request to the server fails the test.
        let stub = stub_for(&server);
        assert!(matches!(stub.acknowledge(vec![]).await, Err(Error::NoAckIds)));
        assert!(matches!(
            stub.modify_ack_deadline(vec![], Duration::ZERO).await,
            Err(Error::NoAckIds)
        ));
        Ok(())
    }

    #[tokio::test]
    async fn error_classification() -> TestResult {
        let server = test_server();
        server.expect(
            Expectation::matching(request::path("/v1/projects/p/subscriptions/s:acknowledge"))
                .respond_with(
                    status_code(400).body(
                        json!({
                            "error": {
                                "message": "No ack ids specified.",
                                "status": "INVALID_ARGUMENT",
                                "code": 400,
                            }
                        })
                        .to_string(),
                    ),
                ),
        );
        server.expect(
            Expectation::matching(request::path("/v1/projects/p/subscriptions/s:pull"))
                .respond_with(status_code(500).body("stream closed")),
        );

        let stub = stub_for(&server);
        // The service decides the classification, not the local batch; an
        // empty list never reaches it, so send a non-empty one.
        let err = stub.acknowledge(vec!["a-1".into()]).await.unwrap_err();
        assert!(matches!(err, Error::NoAckIds), "{err:?}");

        let err = stub.pull().await.unwrap_err();
        match err {
            Error::UnparseableBody(raw) => assert_eq!(raw, "stream closed"),
            other => panic!("expected UnparseableBody, got {other:?}"),
        }
        Ok(())
    }
}
