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

//! Consume messages from a Pub/Sub subscription over HTTP.
//!
//! A [Subscriber] opens a [MessageStream]: one or more background tasks
//! pull messages and forward them downstream, while two more tasks batch
//! acknowledgements and negative acknowledgements back to the service.
//! Dropping the stream cancels all of them; acknowledgements still queued
//! at that point are dropped, and the service redelivers after the ack
//! deadline (at-least-once semantics).

mod batcher;
mod stub;
mod transport;

use crate::Result;
use crate::endpoint::Endpoint;
use crate::model::{ProjectId, PubsubMessage, Subscription};
use crate::options::SubscriberConfig;
use batcher::BatchingOptions;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use stub::SubscriptionStub;
use tokio::sync::mpsc;
use tokio_util::sync::{CancellationToken, DropGuard};

/// A client for one Pub/Sub subscription.
#[derive(Debug)]
pub struct Subscriber {
    stub: Arc<dyn SubscriptionStub>,
    config: SubscriberConfig,
}

impl Subscriber {
    /// Creates a subscriber for `subscription`.
    ///
    /// Unless the configuration targets an emulator this acquires the
    /// initial access token, and fails when that fails.
    pub async fn new(
        config: SubscriberConfig,
        project: ProjectId,
        subscription: Subscription,
    ) -> Result<Self> {
        let authorizer = crate::credentials::authorizer(
            config.is_emulator,
            &config.credentials,
            config.token.clone(),
        )
        .await?;
        let endpoint = Endpoint::new(config.host.clone(), config.port);
        let stub = transport::HttpSubscriptionStub::new(
            endpoint.subscription_url(&project, &subscription),
            authorizer,
            config.read_return_immediately,
            config.read_max_messages,
        );
        Ok(Self::from_stub(Arc::new(stub), config))
    }

    fn from_stub(stub: Arc<dyn SubscriptionStub>, config: SubscriberConfig) -> Self {
        Self { stub, config }
    }

    /// Opens the message stream and starts the background pipelines.
    pub fn subscribe(&self) -> MessageStream {
        let cancel = CancellationToken::new();
        // Pull tasks get their own child token: a fatal pull failure stops
        // all pulling but leaves the batchers draining until the stream is
        // dropped, so already-yielded messages can still be settled.
        let pull_cancel = cancel.child_token();

        let capacity = (self.config.read_max_messages.max(1) as usize)
            * self.config.read_concurrency;
        let (record_tx, record_rx) = mpsc::channel(capacity);
        let (ack_tx, ack_rx) = mpsc::unbounded_channel();
        let (nack_tx, nack_rx) = mpsc::unbounded_channel();

        let batching = BatchingOptions {
            batch_size: self.config.acknowledge_batch_size,
            batch_latency: self.config.acknowledge_batch_latency,
        };
        let ack_stub = self.stub.clone();
        tokio::spawn(batcher::drain(
            ack_rx,
            batching,
            move |ids| {
                let stub = ack_stub.clone();
                async move { stub.acknowledge(ids).await }
            },
            cancel.clone(),
            "acknowledge",
        ));
        let nack_stub = self.stub.clone();
        tokio::spawn(batcher::drain(
            nack_rx,
            batching,
            move |ids| {
                let stub = nack_stub.clone();
                async move { stub.nack(ids).await }
            },
            cancel.clone(),
            "nack",
        ));

        for _ in 0..self.config.read_concurrency {
            tokio::spawn(pull_loop(
                self.stub.clone(),
                record_tx.clone(),
                ack_tx.clone(),
                nack_tx.clone(),
                pull_cancel.clone(),
            ));
        }

        MessageStream {
            records: record_rx,
            _cancel: cancel.drop_guard(),
        }
    }
}

// One pull loop. With `read_concurrency > 1` several of these run against
// the same channel and the order of messages across pulls is unspecified;
// within one pull response the order is preserved.
async fn pull_loop(
    stub: Arc<dyn SubscriptionStub>,
    record_tx: mpsc::Sender<Result<AckableMessage>>,
    ack_tx: mpsc::UnboundedSender<String>,
    nack_tx: mpsc::UnboundedSender<String>,
    cancel: CancellationToken,
) {
    loop {
        let pulled = tokio::select! {
            _ = cancel.cancelled() => return,
            result = stub.pull() => result,
        };
        match pulled {
            Ok(messages) => {
                for received in messages {
                    let record = AckableMessage {
                        message: received.message,
                        ack_id: received.ack_id,
                        ack_tx: ack_tx.clone(),
                        nack_tx: nack_tx.clone(),
                        stub: stub.clone(),
                    };
                    let sent = tokio::select! {
                        _ = cancel.cancelled() => return,
                        sent = record_tx.send(Ok(record)) => sent,
                    };
                    if sent.is_err() {
                        // Downstream is gone.
                        return;
                    }
                }
            }
            Err(e) => {
                // A fatal pull failure terminates the stream: surface the
                // error and stop every pull task.
                let _ = record_tx.send(Err(e)).await;
                cancel.cancel();
                return;
            }
        }
    }
}

/// The stream of messages of one [Subscriber::subscribe] call.
///
/// Implements [futures::Stream]. Dropping it cancels the pull tasks and the
/// acknowledgement batchers.
pub struct MessageStream {
    records: mpsc::Receiver<Result<AckableMessage>>,
    _cancel: DropGuard,
}

impl MessageStream {
    /// Receives the next message.
    ///
    /// Returns `None` after a fatal pull failure was yielded, once the
    /// error itself has been consumed.
    pub async fn recv(&mut self) -> Option<Result<AckableMessage>> {
        self.records.recv().await
    }
}

impl futures::Stream for MessageStream {
    type Item = Result<AckableMessage>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.records.poll_recv(cx)
    }
}

impl std::fmt::Debug for MessageStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageStream").finish_non_exhaustive()
    }
}

/// One delivered message and the operations to settle it.
///
/// [ack][AckableMessage::ack] and [nack][AckableMessage::nack] consume the
/// record, so a delivery cannot be settled both ways through it. They only
/// enqueue the ack id; the batchers dispatch it within the configured batch
/// latency. Requests to extend the deadline go out immediately.
pub struct AckableMessage {
    message: PubsubMessage,
    ack_id: String,
    ack_tx: mpsc::UnboundedSender<String>,
    nack_tx: mpsc::UnboundedSender<String>,
    stub: Arc<dyn SubscriptionStub>,
}

impl AckableMessage {
    /// The delivered message.
    pub fn message(&self) -> &PubsubMessage {
        &self.message
    }

    /// The message, giving up the ability to settle this delivery.
    pub fn into_message(self) -> PubsubMessage {
        self.message
    }

    /// The ack id of this delivery.
    pub fn ack_id(&self) -> &str {
        &self.ack_id
    }

    /// Acknowledges this delivery. Never blocks.
    pub fn ack(self) {
        // Failure means the stream was dropped; the service redelivers.
        let _ = self.ack_tx.send(self.ack_id);
    }

    /// Makes this delivery immediately eligible for redelivery. Never
    /// blocks.
    pub fn nack(self) {
        let _ = self.nack_tx.send(self.ack_id);
    }

    /// Asks the service to wait `deadline` longer for the acknowledgement
    /// of this delivery. Not batched.
    pub async fn extend_deadline(&self, deadline: Duration) -> Result<()> {
        self.stub
            .modify_ack_deadline(vec![self.ack_id.clone()], deadline)
            .await
    }
}

impl std::fmt::Debug for AckableMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AckableMessage")
            .field("message", &self.message)
            .field("ack_id", &self.ack_id)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::model::ReceivedMessage;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::advance;

    type TestResult = std::result::Result<(), Box<dyn std::error::Error>>;

    // A scripted stand-in for the HTTP transport. Pulls pop the front of
    // the script; an exhausted script pends forever, like a pull with no
    // traffic and `returnImmediately` off.
    #[derive(Debug, Default)]
    struct FakeStub {
        pulls: Mutex<VecDeque<Result<Vec<ReceivedMessage>>>>,
        ack_results: Mutex<VecDeque<Result<()>>>,
        pull_count: AtomicUsize,
        acks: Mutex<Vec<Vec<String>>>,
        modifies: Mutex<Vec<(Vec<String>, Duration)>>,
    }

    impl FakeStub {
        fn with_pulls(pulls: Vec<Result<Vec<ReceivedMessage>>>) -> Arc<Self> {
            Arc::new(Self {
                pulls: Mutex::new(pulls.into()),
                ..Default::default()
            })
        }
    }

    #[async_trait::async_trait]
    impl SubscriptionStub for FakeStub {
        async fn pull(&self) -> Result<Vec<ReceivedMessage>> {
            self.pull_count.fetch_add(1, Ordering::SeqCst);
            let next = self.pulls.lock().unwrap().pop_front();
            match next {
                Some(result) => result,
                None => futures::future::pending().await,
            }
        }

        async fn acknowledge(&self, ack_ids: Vec<String>) -> Result<()> {
            self.acks.lock().unwrap().push(ack_ids);
            self.ack_results
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Ok(()))
        }

        async fn modify_ack_deadline(
            &self,
            ack_ids: Vec<String>,
            deadline: Duration,
        ) -> Result<()> {
            self.modifies.lock().unwrap().push((ack_ids, deadline));
            Ok(())
        }
    }

    fn message(ack_id: &str) -> ReceivedMessage {
        ReceivedMessage {
            ack_id: ack_id.to_string(),
            message: PubsubMessage {
                data: bytes::Bytes::from_static(b"payload"),
                message_id: format!("m-{ack_id}"),
                ..Default::default()
            },
        }
    }

    fn subscriber(stub: Arc<FakeStub>, config: SubscriberConfig) -> Subscriber {
        Subscriber::from_stub(stub, config)
    }

    fn test_config() -> SubscriberConfig {
        SubscriberConfig::default()
            .with_acknowledge_batch_size(100)
            .with_acknowledge_batch_latency(Duration::from_millis(50))
    }

    #[tokio::test(start_paused = true)]
    async fn empty_pull_yields_nothing_and_pulls_again() -> TestResult {
        let stub = FakeStub::with_pulls(vec![Ok(vec![]), Ok(vec![message("a-1")])]);
        let mut stream = subscriber(stub.clone(), test_config()).subscribe();

        let record = stream.recv().await.unwrap()?;
        assert_eq!(record.ack_id(), "a-1");
        // The empty response did not stall the loop; a second pull ran.
        assert!(stub.pull_count.load(Ordering::SeqCst) >= 2);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn messages_yield_in_response_order() -> TestResult {
        let stub = FakeStub::with_pulls(vec![Ok(vec![
            message("a-1"),
            message("a-2"),
            message("a-3"),
        ])]);
        let mut stream = subscriber(stub, test_config()).subscribe();

        for want in ["a-1", "a-2", "a-3"] {
            let record = stream.recv().await.unwrap()?;
            assert_eq!(record.ack_id(), want);
            assert_eq!(record.message().data.as_ref(), b"payload");
        }
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn acks_batch_within_latency_in_enqueue_order() -> TestResult {
        let stub = FakeStub::with_pulls(vec![Ok(vec![
            message("a-1"),
            message("a-2"),
            message("a-3"),
        ])]);
        let mut stream = subscriber(stub.clone(), test_config()).subscribe();

        // Ack at t=0, t=10ms, t=20ms.
        stream.recv().await.unwrap()?.ack();
        // Let the batcher open the latency window at t=0.
        tokio::task::yield_now().await;
        advance(Duration::from_millis(10)).await;
        stream.recv().await.unwrap()?.ack();
        advance(Duration::from_millis(10)).await;
        stream.recv().await.unwrap()?.ack();

        advance(Duration::from_millis(29)).await;
        assert!(stub.acks.lock().unwrap().is_empty());

        // One POST, 50ms after the first ack, carrying all three in order.
        advance(Duration::from_millis(1)).await;
        let acks = stub.acks.lock().unwrap();
        assert_eq!(acks.len(), 1, "{acks:?}");
        assert_eq!(acks[0], vec!["a-1", "a-2", "a-3"]);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn batch_size_closes_batches_early() -> TestResult {
        let stub = FakeStub::with_pulls(vec![Ok(vec![
            message("a-1"),
            message("a-2"),
            message("a-3"),
        ])]);
        let config = test_config().with_acknowledge_batch_size(2);
        let mut stream = subscriber(stub.clone(), config).subscribe();

        for _ in 0..3 {
            stream.recv().await.unwrap()?.ack();
        }
        tokio::task::yield_now().await;

        advance(Duration::from_millis(60)).await;
        let acks = stub.acks.lock().unwrap();
        assert_eq!(acks.len(), 2, "{acks:?}");
        assert_eq!(acks[0], vec!["a-1", "a-2"]);
        assert_eq!(acks[1], vec!["a-3"]);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn ack_error_does_not_stop_the_stream() -> TestResult {
        let stub = FakeStub::with_pulls(vec![
            Ok(vec![message("a-1")]),
            Ok(vec![message("a-2")]),
        ]);
        // The service rejects the first ack batch the way it does an empty
        // ackIds list.
        stub.ack_results.lock().unwrap().push_back(Err(Error::NoAckIds));

        let mut stream = subscriber(stub.clone(), test_config()).subscribe();
        stream.recv().await.unwrap()?.ack();
        tokio::task::yield_now().await;
        advance(Duration::from_millis(60)).await;
        assert_eq!(stub.acks.lock().unwrap().len(), 1);

        // The failure was logged and swallowed; the stream keeps yielding
        // and later acks keep flowing.
        let record = stream.recv().await.unwrap()?;
        assert_eq!(record.ack_id(), "a-2");
        record.ack();
        tokio::task::yield_now().await;
        advance(Duration::from_millis(60)).await;
        let acks = stub.acks.lock().unwrap();
        assert_eq!(acks.len(), 2, "{acks:?}");
        assert_eq!(acks[1], vec!["a-2"]);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn nack_goes_through_modify_with_zero_deadline() -> TestResult {
        let stub = FakeStub::with_pulls(vec![Ok(vec![message("a-1")])]);
        let mut stream = subscriber(stub.clone(), test_config()).subscribe();

        stream.recv().await.unwrap()?.nack();
        tokio::task::yield_now().await;
        advance(Duration::from_millis(60)).await;

        let modifies = stub.modifies.lock().unwrap();
        assert_eq!(modifies.len(), 1, "{modifies:?}");
        assert_eq!(modifies[0].0, vec!["a-1"]);
        assert_eq!(modifies[0].1, Duration::ZERO);
        // Nothing went down the ack path.
        assert!(stub.acks.lock().unwrap().is_empty());
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn extend_deadline_is_immediate_and_unbatched() -> TestResult {
        let stub = FakeStub::with_pulls(vec![Ok(vec![message("a-1")])]);
        let mut stream = subscriber(stub.clone(), test_config()).subscribe();

        let record = stream.recv().await.unwrap()?;
        record.extend_deadline(Duration::from_secs(30)).await?;

        // No timer advanced; the request already went out.
        let modifies = stub.modifies.lock().unwrap();
        assert_eq!(modifies.len(), 1);
        assert_eq!(modifies[0].0, vec!["a-1"]);
        assert_eq!(modifies[0].1, Duration::from_secs(30));
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn pull_failure_terminates_the_stream() -> TestResult {
        let stub = FakeStub::with_pulls(vec![
            Ok(vec![message("a-1")]),
            Err(Error::UnparseableBody("stream closed".into())),
        ]);
        let mut stream = subscriber(stub, test_config()).subscribe();

        let record = stream.recv().await.unwrap()?;
        assert_eq!(record.ack_id(), "a-1");

        let err = stream.recv().await.unwrap().unwrap_err();
        assert!(matches!(err, Error::UnparseableBody(_)), "{err:?}");

        // All pull tasks are done; the channel closes.
        assert!(stream.recv().await.is_none());
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn settling_still_works_after_pull_failure() -> TestResult {
        let stub = FakeStub::with_pulls(vec![
            Ok(vec![message("a-1")]),
            Err(Error::UnparseableBody("stream closed".into())),
        ]);
        let mut stream = subscriber(stub.clone(), test_config()).subscribe();

        let record = stream.recv().await.unwrap()?;
        assert!(stream.recv().await.unwrap().is_err());

        // The batchers outlive the pull loop; the buffered record can still
        // be acknowledged.
        record.ack();
        tokio::task::yield_now().await;
        advance(Duration::from_millis(60)).await;
        assert_eq!(stub.acks.lock().unwrap().len(), 1);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn drop_cancels_pipelines_and_drops_pending_acks() -> TestResult {
        let stub = FakeStub::with_pulls(vec![Ok(vec![message("a-1")])]);
        let mut stream = subscriber(stub.clone(), test_config()).subscribe();

        let record = stream.recv().await.unwrap()?;
        record.ack();
        drop(stream);

        // The enqueued ack is dropped with the batcher; the service's own
        // deadline will redeliver.
        advance(Duration::from_secs(5)).await;
        assert!(stub.acks.lock().unwrap().is_empty());

        let pulls_after_drop = stub.pull_count.load(Ordering::SeqCst);
        advance(Duration::from_secs(5)).await;
        assert_eq!(stub.pull_count.load(Ordering::SeqCst), pulls_after_drop);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_pulls_merge_unordered() -> TestResult {
        let stub = FakeStub::with_pulls(vec![
            Ok(vec![message("a-1"), message("a-2")]),
            Ok(vec![message("b-1")]),
        ]);
        let config = test_config().with_read_concurrency(2);
        let mut stream = subscriber(stub.clone(), config).subscribe();

        let mut got = Vec::new();
        for _ in 0..3 {
            got.push(stream.recv().await.unwrap()?.ack_id().to_string());
        }
        got.sort();
        assert_eq!(got, vec!["a-1", "a-2", "b-1"]);
        // Both loops pulled at least once, and kept pulling after.
        assert!(stub.pull_count.load(Ordering::SeqCst) >= 2);
        Ok(())
    }
}
