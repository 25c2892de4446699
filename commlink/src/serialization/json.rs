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

//! JSON message serializer.

use crate::message::CommMessage;
use crate::protocol::ProtocolError;
use crate::serialization::MessageSerializer;

/// Serializes messages as JSON documents.
#[derive(Clone, Debug, Default)]
pub struct JsonSerializer {
    pretty: bool,
}

impl JsonSerializer {
    /// Compact output.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use commlink::message::CommMessage;
    /// use commlink::serialization::{JsonSerializer, MessageSerializer};
    /// use commlink::Value;
    ///
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let serializer = JsonSerializer::new();
    /// let message = CommMessage::request("sum", Value::new().with_child("x", 1));
    /// let bytes = serializer.encode(&message)?;
    /// assert_eq!(serializer.decode(&bytes)?, message);
    /// # Ok(())
    /// # }
    /// ```
    pub fn new() -> Self {
        Self { pretty: false }
    }

    /// Indented output, for logs and debugging.
    pub fn with_pretty_print(mut self) -> Self {
        self.pretty = true;
        self
    }
}

impl MessageSerializer for JsonSerializer {
    fn name(&self) -> &'static str {
        "json"
    }

    fn encode(&self, message: &CommMessage) -> Result<Vec<u8>, ProtocolError> {
        let encoded = if self.pretty {
            serde_json::to_vec_pretty(message)
        } else {
            serde_json::to_vec(message)
        };
        encoded.map_err(|e| ProtocolError::Encode {
            format: "json",
            source: Box::new(e),
        })
    }

    fn decode(&self, bytes: &[u8]) -> Result<CommMessage, ProtocolError> {
        serde_json::from_slice(bytes).map_err(|e| ProtocolError::Decode {
            format: "json",
            source: Box::new(e),
        })
    }
}
