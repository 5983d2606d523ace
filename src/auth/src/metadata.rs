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

//! [Metadata Service] token provider.
//!
//! Google Cloud environments such as [Google Compute Engine (GCE)][gce-link],
//! [Google Kubernetes Engine (GKE)][gke-link], or [Cloud Run] provide a
//! metadata service. This is a local service to the VM (or pod) which
//! provides access tokens associated with the [default service account] of
//! the corresponding VM. Applications running on these environments can
//! authenticate without downloading secrets or other credentials.
//!
//! [Cloud Run]: https://cloud.google.com/run
//! [default service account]: https://cloud.google.com/iam/docs/service-account-types#default
//! [gce-link]: https://cloud.google.com/products/compute
//! [gke-link]: https://cloud.google.com/kubernetes-engine
//! [Metadata Service]: https://cloud.google.com/compute/docs/metadata/overview

use crate::Result;
use crate::errors::{self, CredentialsError};
use crate::token::{Token, TokenProvider, TokenResponse};
use async_trait::async_trait;
use http::HeaderValue;

const METADATA_FLAVOR_VALUE: &str = "Google";
const METADATA_FLAVOR: &str = "metadata-flavor";
const METADATA_ROOT: &str = "http://metadata.google.internal";
const MDS_DEFAULT_URI: &str = "/computeMetadata/v1/instance/service-accounts/default";

/// A builder for metadata-service token providers.
#[derive(Debug, Default)]
pub struct Builder {
    endpoint: Option<String>,
}

impl Builder {
    /// Sets the endpoint of the metadata service.
    ///
    /// Specify the base URL without a trailing slash. If not set, the
    /// provider uses `http://metadata.google.internal`.
    pub fn with_endpoint<S: Into<String>>(mut self, endpoint: S) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Returns a [MetadataTokenProvider] with the configured settings.
    pub fn build(self) -> MetadataTokenProvider {
        MetadataTokenProvider {
            endpoint: self.endpoint.unwrap_or_else(|| METADATA_ROOT.to_string()),
            client: reqwest::Client::new(),
        }
    }
}

/// Obtains access tokens for the default service account from the instance
/// metadata service.
#[derive(Clone, Debug)]
pub struct MetadataTokenProvider {
    endpoint: String,
    client: reqwest::Client,
}

#[async_trait]
impl TokenProvider for MetadataTokenProvider {
    async fn token(&self) -> Result<Token> {
        let request = self
            .client
            .get(format!("{}{}/token", self.endpoint, MDS_DEFAULT_URI))
            .header(
                METADATA_FLAVOR,
                HeaderValue::from_static(METADATA_FLAVOR_VALUE),
            );

        // If the connection to the metadata service was not successful, it is
        // useful to retry when really running on an environment with a
        // metadata service, and not useful if there is none.
        let response = request
            .send()
            .await
            .map_err(|e| errors::from_http_error(e, "failed to fetch token"))?;
        if !response.status().is_success() {
            return Err(errors::from_http_response(response, "failed to fetch token").await);
        }
        let response = response.json::<TokenResponse>().await.map_err(|e| {
            // Decoding errors are not transient. Typically they indicate a
            // badly configured metadata endpoint, or DNS redirecting the
            // request to a random server, e.g., ISPs that redirect unknown
            // services to HTTP.
            CredentialsError::from_source(!e.is_decode(), e)
        })?;
        Ok(Token::from(response))
    }
}
