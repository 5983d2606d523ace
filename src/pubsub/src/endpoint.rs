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

use crate::model::{ProjectId, Subscription, Topic};

/// Builds the base URLs for topic and subscription operations.
///
/// The scheme is HTTPS exactly when the port is 443; everything else is
/// plain HTTP, which is what the emulator speaks.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Endpoint {
    host: String,
    port: u16,
}

impl Endpoint {
    pub fn new<S: Into<String>>(host: S, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    fn scheme(&self) -> &'static str {
        if self.port == 443 { "https" } else { "http" }
    }

    fn base(&self, project: &ProjectId, collection: &str, name: &str) -> String {
        format!(
            "{}://{}:{}/v1/projects/{}/{collection}/{name}",
            self.scheme(),
            self.host,
            self.port,
            project
        )
    }

    pub fn topic_url(&self, project: &ProjectId, topic: &Topic) -> String {
        self.base(project, "topics", topic.as_str())
    }

    pub fn subscription_url(&self, project: &ProjectId, subscription: &Subscription) -> String {
        self.base(project, "subscriptions", subscription.as_str())
    }
}
