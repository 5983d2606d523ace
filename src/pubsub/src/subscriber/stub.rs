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
use crate::model::ReceivedMessage;
use std::time::Duration;

/// The subscription operations the session is built on.
///
/// One implementation speaks HTTP to the service; tests substitute their
/// own.
#[async_trait::async_trait]
pub(crate) trait SubscriptionStub: std::fmt::Debug + Send + Sync {
    /// One unary pull. May return an empty list.
    async fn pull(&self) -> Result<Vec<ReceivedMessage>>;

    /// Acknowledges the given deliveries.
    async fn acknowledge(&self, ack_ids: Vec<String>) -> Result<()>;

    /// Extends (or with zero, voids) the ack deadline of the given
    /// deliveries.
    async fn modify_ack_deadline(&self, ack_ids: Vec<String>, deadline: Duration) -> Result<()>;

    /// Makes the deliveries immediately eligible for redelivery.
    async fn nack(&self, ack_ids: Vec<String>) -> Result<()> {
        self.modify_ack_deadline(ack_ids, Duration::ZERO).await
    }
}
