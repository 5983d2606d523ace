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
use crate::options::CredentialSource;
use auth::headers::{BearerTokenAuthorizer, NoAuthorizer, RequestAuthorizer};
use auth::token_cache::{TokenCache, TokenRefreshOptions};
use std::sync::Arc;

/// Builds the request authorizer for a publisher or subscriber.
///
/// In emulator mode no token provider is constructed at all. Otherwise the
/// configured source is wrapped in a [TokenCache], which fetches the initial
/// token here; a failure to do so fails the construction of the client.
pub(crate) async fn authorizer(
    is_emulator: bool,
    credentials: &CredentialSource,
    token_options: TokenRefreshOptions,
) -> Result<Arc<dyn RequestAuthorizer>> {
    if is_emulator {
        return Ok(Arc::new(NoAuthorizer));
    }
    let cache = match credentials {
        CredentialSource::InstanceMetadata => {
            let provider = auth::metadata::Builder::default().build();
            TokenCache::new(provider, token_options).await
        }
        CredentialSource::ServiceAccountKey(key) => {
            let provider = auth::service_account::Builder::new(key.clone())
                .build()
                .map_err(Error::Auth)?;
            TokenCache::new(provider, token_options).await
        }
    }
    .map_err(Error::Auth)?;
    Ok(Arc::new(BearerTokenAuthorizer::new(cache)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn emulator_skips_token_provider() {
        // Must not reach out to any metadata service.
        let got = authorizer(
            true,
            &CredentialSource::InstanceMetadata,
            TokenRefreshOptions::default(),
        )
        .await;
        assert!(got.is_ok());
    }

    #[tokio::test]
    async fn malformed_service_account_key_fails() {
        let got = authorizer(
            false,
            &CredentialSource::ServiceAccountKey(serde_json::Value::from(" ")),
            TokenRefreshOptions::default(),
        )
        .await;
        assert!(matches!(got, Err(Error::Auth(_))));
    }
}
