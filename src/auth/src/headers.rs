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

//! Decorating outgoing requests with credentials.

use crate::Result;
use crate::errors;
use crate::token::TokenProvider;
use async_trait::async_trait;
use http::HeaderMap;
use http::header::{AUTHORIZATION, HeaderValue};

/// Attaches credentials to an outgoing request.
#[async_trait]
pub trait RequestAuthorizer: std::fmt::Debug + Send + Sync {
    /// Returns the builder decorated with the credentials of this authorizer.
    async fn authorize(&self, builder: reqwest::RequestBuilder) -> Result<reqwest::RequestBuilder>;
}

/// Authorizes requests with a `Authorization: Bearer <token>` header.
///
/// Each request gets a token from the wrapped [TokenProvider]; use a
/// [TokenCache][crate::token_cache::TokenCache] to avoid a token fetch per
/// request. Exactly one `Authorization` header is attached, replacing any
/// existing value.
#[derive(Debug)]
pub struct BearerTokenAuthorizer<T> {
    provider: T,
}

impl<T> BearerTokenAuthorizer<T>
where
    T: TokenProvider,
{
    pub fn new(provider: T) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl<T> RequestAuthorizer for BearerTokenAuthorizer<T>
where
    T: TokenProvider,
{
    async fn authorize(&self, builder: reqwest::RequestBuilder) -> Result<reqwest::RequestBuilder> {
        let token = self.provider.token().await?;
        let mut value = HeaderValue::from_str(&format!("{} {}", token.token_type, token.token))
            .map_err(errors::non_retryable)?;
        value.set_sensitive(true);
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, value);
        // `RequestBuilder::headers` replaces existing values for the keys it
        // carries, where `RequestBuilder::header` would append a second one.
        Ok(builder.headers(headers))
    }
}

/// Leaves requests unchanged. Used in emulator mode.
#[derive(Clone, Debug, Default)]
pub struct NoAuthorizer;

#[async_trait]
impl RequestAuthorizer for NoAuthorizer {
    async fn authorize(&self, builder: reqwest::RequestBuilder) -> Result<reqwest::RequestBuilder> {
        Ok(builder)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::Token;
    use crate::token::tests::MockTokenProvider;

    type TestResult = std::result::Result<(), Box<dyn std::error::Error>>;

    fn test_builder() -> reqwest::RequestBuilder {
        reqwest::Client::new().post("https://pubsub.googleapis.com/v1/test")
    }

    #[tokio::test]
    async fn bearer_token_attached() -> TestResult {
        let mut mock = MockTokenProvider::new();
        mock.expect_token().times(1).return_once(|| {
            Ok(Token {
                token: "test-token".into(),
                token_type: "Bearer".into(),
                expires_at: None,
            })
        });

        let authorizer = BearerTokenAuthorizer::new(mock);
        let request = authorizer.authorize(test_builder()).await?.build()?;
        let values = request
            .headers()
            .get_all(AUTHORIZATION)
            .iter()
            .collect::<Vec<_>>();
        assert_eq!(values.len(), 1);
        assert_eq!(values[0], HeaderValue::from_static("Bearer test-token"));
        assert!(values[0].is_sensitive());
        Ok(())
    }

    #[tokio::test]
    async fn bearer_token_replaces_existing() -> TestResult {
        let mut mock = MockTokenProvider::new();
        mock.expect_token().times(1).return_once(|| {
            Ok(Token {
                token: "fresh-token".into(),
                token_type: "Bearer".into(),
                expires_at: None,
            })
        });

        let authorizer = BearerTokenAuthorizer::new(mock);
        let builder = test_builder().header(AUTHORIZATION, "Bearer stale-token");
        let request = authorizer.authorize(builder).await?.build()?;
        let values = request
            .headers()
            .get_all(AUTHORIZATION)
            .iter()
            .collect::<Vec<_>>();
        assert_eq!(values.len(), 1);
        assert_eq!(values[0], HeaderValue::from_static("Bearer fresh-token"));
        Ok(())
    }

    #[tokio::test]
    async fn bearer_token_provider_failure() {
        let mut mock = MockTokenProvider::new();
        mock.expect_token()
            .times(1)
            .return_once(|| Err(crate::errors::non_retryable_from_str("fail")));

        let authorizer = BearerTokenAuthorizer::new(mock);
        assert!(authorizer.authorize(test_builder()).await.is_err());
    }

    #[tokio::test]
    async fn no_authorizer_leaves_request_unchanged() -> TestResult {
        let request = NoAuthorizer.authorize(test_builder()).await?.build()?;
        assert!(request.headers().get(AUTHORIZATION).is_none());
        Ok(())
    }
}
