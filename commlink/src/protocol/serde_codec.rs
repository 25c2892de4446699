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

//! Codecs carrying serde encodings inside length-prefixed frames.

use super::{Duplex, Protocol, ProtocolError, ProtocolParams};
use crate::message::CommMessage;
use crate::serialization::framing::{read_frame, write_frame, MAX_FRAME_SIZE};
use crate::serialization::{JsonSerializer, MessageSerializer, PostcardSerializer};
use async_trait::async_trait;

/// Frames each message produced by a [`MessageSerializer`].
#[derive(Debug, Clone)]
pub struct SerdeProtocol<S> {
    serializer: S,
    params: ProtocolParams,
    max_frame_size: usize,
}

impl<S: MessageSerializer> SerdeProtocol<S> {
    /// Creates the codec. `maxFrameSize` in `params` caps the frame length.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use commlink::protocol::{JsonProtocol, Protocol, ProtocolParams};
    /// use commlink::serialization::JsonSerializer;
    ///
    /// let codec = JsonProtocol::new(JsonSerializer::new(), ProtocolParams::empty());
    /// assert_eq!(codec.name(), "json");
    /// ```
    pub fn new(serializer: S, params: ProtocolParams) -> Self {
        let max_frame_size = params
            .int("maxFrameSize", MAX_FRAME_SIZE as i64)
            .try_into()
            .unwrap_or(MAX_FRAME_SIZE);
        Self {
            serializer,
            params,
            max_frame_size,
        }
    }

    /// The serializer turning messages into frame payloads.
    pub fn serializer(&self) -> &S {
        &self.serializer
    }
}

/// JSON over length frames.
pub type JsonProtocol = SerdeProtocol<JsonSerializer>;

/// Postcard over length frames.
pub type PostcardProtocol = SerdeProtocol<PostcardSerializer>;

#[async_trait]
impl<S: MessageSerializer> Protocol for SerdeProtocol<S> {
    fn name(&self) -> String {
        self.serializer.name().to_string()
    }

    fn is_thread_safe(&self) -> bool {
        true
    }

    fn params(&self) -> &ProtocolParams {
        &self.params
    }

    async fn send(
        &self,
        stream: &mut dyn Duplex,
        message: &CommMessage,
    ) -> Result<(), ProtocolError> {
        let payload = self.serializer.encode(message)?;
        write_frame(stream, &payload, self.max_frame_size).await
    }

    async fn recv(&self, stream: &mut dyn Duplex) -> Result<CommMessage, ProtocolError> {
        let payload = read_frame(stream, self.max_frame_size).await?;
        self.serializer.decode(&payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Value;
    use crate::protocol::BufferDuplex;

    #[tokio::test]
    async fn test_json_protocol_round_trip() {
        let codec = JsonProtocol::new(JsonSerializer::new(), ProtocolParams::empty());
        let message = CommMessage::request_at("greet", "/hello", Value::from("world"));

        let mut duplex = BufferDuplex::default();
        codec.send(&mut duplex, &message).await.unwrap();
        let bytes = duplex.take_output();
        assert_eq!(&bytes[..4], &((bytes.len() - 4) as u32).to_be_bytes());

        let decoded = codec.recv(&mut BufferDuplex::new(bytes)).await.unwrap();
        assert_eq!(decoded, message);
        assert_eq!(codec.name(), "json");
    }

    #[tokio::test]
    async fn test_postcard_protocol_several_messages() {
        let codec = PostcardProtocol::new(PostcardSerializer::new(), ProtocolParams::empty());
        let first = CommMessage::request("a", Value::from(1));
        let second = CommMessage::request("b", Value::from(2));

        let mut duplex = BufferDuplex::default();
        codec.send(&mut duplex, &first).await.unwrap();
        codec.send(&mut duplex, &second).await.unwrap();

        let mut reader = BufferDuplex::new(duplex.take_output());
        assert_eq!(codec.recv(&mut reader).await.unwrap(), first);
        assert_eq!(codec.recv(&mut reader).await.unwrap(), second);
    }

    #[tokio::test]
    async fn test_max_frame_size_parameter() {
        let params = ProtocolParams::new(Value::new().with_child("maxFrameSize", 8));
        let codec = JsonProtocol::new(JsonSerializer::new(), params);
        let message = CommMessage::request("too-long-for-eight-bytes", Value::new());

        let result = codec.send(&mut BufferDuplex::default(), &message).await;
        assert!(matches!(result, Err(ProtocolError::FrameTooLarge { max: 8, .. })));
    }
}
