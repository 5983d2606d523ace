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

//! Anonymous token provider.
//!
//! This provider does not carry any authentication information. It is
//! useful for servers that accept unauthenticated traffic, such as the
//! Pub/Sub emulator.

use crate::Result;
use crate::token::{Token, TokenProvider};
use async_trait::async_trait;

/// Returns a sentinel token with an empty value.
///
/// The token never expires, so a cache wrapping this provider never
/// refreshes.
#[derive(Clone, Debug, Default)]
pub struct AnonymousTokenProvider;

#[async_trait]
impl TokenProvider for AnonymousTokenProvider {
    async fn token(&self) -> Result<Token> {
        Ok(Token {
            token: String::new(),
            token_type: "Bearer".to_string(),
            expires_at: None,
        })
    }
}
