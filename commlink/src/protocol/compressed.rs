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

//! Gzip wrapper codec.
//!
//! Stream transports use [`Protocol::send`] and [`Protocol::recv`], which
//! compress one message at a time. Event-driven transports go through the
//! pipeline instead, where a framing stage and a [`GzipStage`] do the same
//! work chunk by chunk.

use super::pipeline::{gzip_compress, gzip_decompress, GzipStage, LengthFramingStage};
use super::{BufferDuplex, Duplex, Pipeline, Protocol, ProtocolError, ProtocolParams};
use crate::message::CommMessage;
use crate::serialization::framing::{read_frame, write_frame, MAX_FRAME_SIZE};
use async_trait::async_trait;

/// Compresses each message produced by an inner codec.
///
/// On the wire every message is one length frame holding the gzip stream of
/// the inner codec's bytes. The name is the inner name followed by `z`.
///
/// # Examples
///
/// ```rust
/// use commlink::message::{CommMessage, Value};
/// use commlink::protocol::{BufferDuplex, CompressedProtocol, Protocol, ProtocolParams, SodepProtocol};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let codec = CompressedProtocol::new(Box::new(SodepProtocol::new(ProtocolParams::empty())));
/// assert_eq!(codec.name(), "sodepz");
///
/// let message = CommMessage::request("upload", Value::from("a".repeat(4096)));
/// let mut wire = BufferDuplex::default();
/// codec.send(&mut wire, &message).await?;
/// let bytes = wire.take_output();
/// assert!(bytes.len() < 4096);
///
/// assert_eq!(codec.recv(&mut BufferDuplex::new(bytes)).await?, message);
/// # Ok(())
/// # }
/// ```
pub struct CompressedProtocol {
    inner: Box<dyn Protocol>,
    level: i32,
    max_frame_size: usize,
}

impl CompressedProtocol {
    /// Wraps `inner`. Reads `compressionLevel` (0 to 9, default 6) and
    /// `maxFrameSize` from the inner codec's parameters.
    pub fn new(inner: Box<dyn Protocol>) -> Self {
        let params = inner.params();
        let level = params.int("compressionLevel", 6).clamp(0, 9) as i32;
        let max_frame_size = params
            .int("maxFrameSize", MAX_FRAME_SIZE as i64)
            .try_into()
            .unwrap_or(MAX_FRAME_SIZE);
        Self {
            inner,
            level,
            max_frame_size,
        }
    }

    /// The wrapped codec.
    pub fn inner(&self) -> &dyn Protocol {
        self.inner.as_ref()
    }
}

#[async_trait]
impl Protocol for CompressedProtocol {
    fn name(&self) -> String {
        format!("{}z", self.inner.name())
    }

    fn is_thread_safe(&self) -> bool {
        self.inner.is_thread_safe()
    }

    fn params(&self) -> &ProtocolParams {
        self.inner.params()
    }

    async fn send(
        &self,
        stream: &mut dyn Duplex,
        message: &CommMessage,
    ) -> Result<(), ProtocolError> {
        let mut plain = BufferDuplex::default();
        self.inner.send(&mut plain, message).await?;
        let compressed = gzip_compress(&plain.take_output(), self.level).await?;
        write_frame(stream, &compressed, self.max_frame_size).await
    }

    async fn recv(&self, stream: &mut dyn Duplex) -> Result<CommMessage, ProtocolError> {
        let compressed = read_frame(stream, self.max_frame_size).await?;
        let plain = gzip_decompress(&compressed, self.max_frame_size).await?;
        let mut reader = BufferDuplex::new(plain);
        self.inner.recv(&mut reader).await.map_err(|e| {
            // The whole message was in the frame; running short means corruption.
            if e.is_incomplete() {
                ProtocolError::Malformed {
                    protocol: "gzip",
                    reason: "compressed frame ended inside a message".to_string(),
                }
            } else {
                e
            }
        })
    }

    fn setup_pipeline(&self, pipeline: &mut Pipeline) {
        pipeline.add_last(LengthFramingStage::new(self.max_frame_size));
        pipeline.add_last(GzipStage::new(self.level, self.max_frame_size));
        self.inner.setup_pipeline(pipeline);
    }

    fn pipeline_codec(&self) -> Option<&dyn Protocol> {
        Some(self.inner.pipeline_codec().unwrap_or(self.inner.as_ref()))
    }

    fn keep_alive(&self) -> bool {
        self.inner.keep_alive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Value;
    use crate::protocol::SodepProtocol;

    fn codec() -> CompressedProtocol {
        CompressedProtocol::new(Box::new(SodepProtocol::new(ProtocolParams::empty())))
    }

    #[tokio::test]
    async fn test_compressed_stream_round_trip() {
        let codec = codec();
        let message = CommMessage::request("bulk", Value::from("x".repeat(2048)));

        let mut duplex = BufferDuplex::default();
        codec.send(&mut duplex, &message).await.unwrap();
        let bytes = duplex.take_output();
        assert!(bytes.len() < 2048);

        let decoded = codec.recv(&mut BufferDuplex::new(bytes)).await.unwrap();
        assert_eq!(decoded, message);
    }

    #[tokio::test]
    async fn test_pipeline_path_matches_stream_path() {
        let codec = codec();
        let message = CommMessage::request("bulk", Value::from(7));

        let mut duplex = BufferDuplex::default();
        codec.send(&mut duplex, &message).await.unwrap();

        let mut pipeline = Pipeline::new();
        codec.setup_pipeline(&mut pipeline);
        let units = pipeline.inbound(duplex.take_output()).await.unwrap();
        assert_eq!(units.len(), 1);

        let decoder = codec.pipeline_codec().unwrap();
        assert_eq!(decoder.name(), "sodep");
        let decoded = decoder
            .recv(&mut BufferDuplex::new(units[0].clone()))
            .await
            .unwrap();
        assert_eq!(decoded, message);
    }

    #[test]
    fn test_name_appends_marker() {
        assert_eq!(codec().name(), "sodepz");
        assert!(codec().is_thread_safe());
    }
}
