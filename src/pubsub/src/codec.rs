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

//! Caller-supplied payload encoders.
//!
//! The publisher is generic over how record payloads become bytes. Received
//! messages surface their raw bytes; decoding them is equally the caller's
//! concern.

use crate::error::BoxError;

/// Encodes an outgoing payload to the bytes published to the service.
///
/// An encoding failure aborts the publish batch before any request is made.
/// Any `Fn(&A) -> Result<Vec<u8>, BoxError>` closure is an encoder.
pub trait MessageEncoder<A>: Send + Sync {
    fn encode(&self, value: &A) -> Result<Vec<u8>, BoxError>;
}

impl<A, F> MessageEncoder<A> for F
where
    F: Fn(&A) -> Result<Vec<u8>, BoxError> + Send + Sync,
{
    fn encode(&self, value: &A) -> Result<Vec<u8>, BoxError> {
        self(value)
    }
}

/// Publishes byte payloads as-is.
#[derive(Clone, Copy, Debug, Default)]
pub struct BytesEncoder;

impl MessageEncoder<Vec<u8>> for BytesEncoder {
    fn encode(&self, value: &Vec<u8>) -> Result<Vec<u8>, BoxError> {
        Ok(value.clone())
    }
}

/// Publishes strings as their UTF-8 bytes.
#[derive(Clone, Copy, Debug, Default)]
pub struct StringEncoder;

impl MessageEncoder<String> for StringEncoder {
    fn encode(&self, value: &String) -> Result<Vec<u8>, BoxError> {
        Ok(value.as_bytes().to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn built_in_encoders() {
        let got = BytesEncoder.encode(&vec![1_u8, 2, 3]).unwrap();
        assert_eq!(got, vec![1, 2, 3]);

        let got = StringEncoder.encode(&"hi".to_string()).unwrap();
        assert_eq!(got, b"hi".to_vec());
    }

    #[test]
    fn closures_are_encoders() {
        let encoder = |value: &u32| -> Result<Vec<u8>, BoxError> { Ok(value.to_be_bytes().to_vec()) };
        assert_eq!(encoder.encode(&258).unwrap(), vec![0, 0, 1, 2]);

        let failing = |_: &u32| -> Result<Vec<u8>, BoxError> { Err("nope".into()) };
        assert!(failing.encode(&0).is_err());
    }
}
