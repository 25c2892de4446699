//
// Copyright 2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! Postcard message serializer.
//!
//! Postcard is a compact, non self-describing binary format. Both sides
//! must agree on the message layout, which they do as long as they run
//! the same build of this crate.

use crate::message::CommMessage;
use crate::protocol::ProtocolError;
use crate::serialization::MessageSerializer;

/// Serializes messages with the compact postcard format.
///
/// # Examples
///
/// ```rust
/// use commlink::message::{CommMessage, Value};
/// use commlink::serialization::{MessageSerializer, PostcardSerializer};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let serializer = PostcardSerializer::new().with_max_size(1024);
/// let message = CommMessage::request("store", Value::from(vec![0u8; 16]));
/// let bytes = serializer.encode(&message)?;
/// assert_eq!(serializer.decode(&bytes)?, message);
///
/// let tiny = PostcardSerializer::new().with_max_size(4);
/// assert!(tiny.encode(&message).is_err());
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug, Default)]
pub struct PostcardSerializer {
    max_size: Option<usize>,
}

impl PostcardSerializer {
    /// A serializer without a size limit.
    pub fn new() -> Self {
        Self { max_size: None }
    }

    /// Rejects encoded messages larger than `max_size` bytes.
    pub fn with_max_size(mut self, max_size: usize) -> Self {
        self.max_size = Some(max_size);
        self
    }

    /// Fails with [`ProtocolError::FrameTooLarge`] past the configured limit.
    fn check_size(&self, size: usize) -> Result<(), ProtocolError> {
        match self.max_size {
            Some(max) if size > max => Err(ProtocolError::FrameTooLarge { size, max }),
            _ => Ok(()),
        }
    }
}

impl MessageSerializer for PostcardSerializer {
    fn name(&self) -> &'static str {
        "postcard"
    }

    fn encode(&self, message: &CommMessage) -> Result<Vec<u8>, ProtocolError> {
        let bytes = postcard::to_allocvec(message).map_err(|e| ProtocolError::Encode {
            format: "postcard",
            source: Box::new(e),
        })?;
        self.check_size(bytes.len())?;
        Ok(bytes)
    }

    fn decode(&self, bytes: &[u8]) -> Result<CommMessage, ProtocolError> {
        self.check_size(bytes.len())?;
        postcard::from_bytes(bytes).map_err(|e| ProtocolError::Decode {
            format: "postcard",
            source: Box::new(e),
        })
    }
}
