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

use crate::Result;
use crate::error::Error;
use std::future::Future;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

#[derive(Clone, Copy, Debug)]
pub(crate) struct BatchingOptions {
    pub batch_size: usize,
    pub batch_latency: Duration,
}

/// Drains a queue of ack ids into dispatched groups.
///
/// A group closes when it reaches `batch_size` elements, or `batch_latency`
/// after its first element, whichever comes first. Groups preserve enqueue
/// order and dispatch in closing order. Dispatch failures are handed to the
/// error handler and never propagate; the pipeline keeps going.
///
/// The task ends when the queue closes or `cancel` fires. Cancellation also
/// interrupts an in-flight dispatch; remaining enqueued ids are dropped and
/// the service's own ack deadline takes over.
pub(crate) async fn drain<F, Fut>(
    mut queue: mpsc::UnboundedReceiver<String>,
    options: BatchingOptions,
    dispatch: F,
    cancel: CancellationToken,
    context: &'static str,
) where
    F: Fn(Vec<String>) -> Fut,
    Fut: Future<Output = Result<()>>,
{
    loop {
        let first = tokio::select! {
            _ = cancel.cancelled() => return,
            item = queue.recv() => match item {
                Some(item) => item,
                None => return,
            },
        };

        let mut batch = vec![first];
        let deadline = sleep(options.batch_latency);
        tokio::pin!(deadline);
        let mut closed = false;
        while batch.len() < options.batch_size && !closed {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = &mut deadline => break,
                item = queue.recv() => match item {
                    Some(item) => batch.push(item),
                    None => closed = true,
                },
            }
        }

        tokio::select! {
            _ = cancel.cancelled() => return,
            result = dispatch(batch) => {
                if let Err(e) = result {
                    handle_batch_error(context, &e);
                }
            }
        }
        if closed {
            return;
        }
    }
}

// Batch failures are logged, never propagated; the main message stream must
// not fail because an acknowledgement did.
fn handle_batch_error(context: &'static str, error: &Error) {
    match error {
        // An empty group escaped the batcher, which accumulates at least
        // one element per group.
        Error::NoAckIds => tracing::warn!("{context}: {error}"),
        Error::Unknown(_) | Error::UnparseableBody(_) => {
            tracing::error!("{context} failed: {error}")
        }
        _ => tracing::error!("{context} failed: {error:?}"),
    }
}
