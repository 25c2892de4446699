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

//! Byte-level transform stages for event-driven transports.
//!
//! Streaming transports hand a codec the raw stream. Event-driven transports
//! deliver arbitrary chunks instead, so a codec declares the stages needed to
//! turn those chunks back into units it can decode (see
//! [`Protocol::setup_pipeline`](super::Protocol::setup_pipeline)).
//!
//! Stage `0` sits nearest the wire. Inbound chunks run through the stages in
//! order; outbound units run through them in reverse.

use super::ProtocolError;
use crate::serialization::framing::{encode_frame, FrameDecoder};
use async_compression::tokio::bufread::GzipDecoder;
use async_compression::tokio::write::GzipEncoder;
use async_compression::Level;
use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// One transform step of a [`Pipeline`].
#[async_trait]
pub trait PipelineStage: Send {
    fn name(&self) -> &'static str;

    /// Transforms a chunk travelling towards the codec. A stage may buffer
    /// input and emit zero or several units.
    async fn inbound(&mut self, chunk: Vec<u8>) -> Result<Vec<Vec<u8>>, ProtocolError>;

    /// Transforms a unit travelling towards the wire.
    async fn outbound(&mut self, unit: Vec<u8>) -> Result<Vec<u8>, ProtocolError>;
}

/// Ordered chain of [`PipelineStage`]s.
#[derive(Default)]
pub struct Pipeline {
    stages: Vec<Box<dyn PipelineStage>>,
}

impl Pipeline {
    /// Creates an empty pipeline, which passes chunks through unchanged.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use commlink::protocol::{GzipStage, LengthFramingStage, Pipeline};
    ///
    /// let mut pipeline = Pipeline::new();
    /// pipeline.add_last(LengthFramingStage::new(1 << 20));
    /// pipeline.add_last(GzipStage::new(6, 1 << 20));
    /// assert_eq!(pipeline.stage_names(), ["length-framing", "gzip"]);
    /// ```
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a stage on the codec side of the chain.
    pub fn add_last(&mut self, stage: impl PipelineStage + 'static) {
        self.stages.push(Box::new(stage));
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Number of stages.
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Stage names from the wire side to the codec side.
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|stage| stage.name()).collect()
    }

    /// Runs a wire chunk through every stage, returning the units that reach
    /// the codec.
    pub async fn inbound(&mut self, chunk: Vec<u8>) -> Result<Vec<Vec<u8>>, ProtocolError> {
        let mut units = vec![chunk];
        for stage in &mut self.stages {
            let mut next = Vec::new();
            for unit in units {
                next.extend(stage.inbound(unit).await?);
            }
            if next.is_empty() {
                return Ok(next);
            }
            units = next;
        }
        Ok(units)
    }

    /// Runs a codec unit through every stage in reverse, returning wire bytes.
    pub async fn outbound(&mut self, unit: Vec<u8>) -> Result<Vec<u8>, ProtocolError> {
        let mut unit = unit;
        for stage in self.stages.iter_mut().rev() {
            unit = stage.outbound(unit).await?;
        }
        Ok(unit)
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("stages", &self.stage_names())
            .finish()
    }
}

/// Splits chunks into length-prefixed frames and frames outbound units.
#[derive(Debug)]
pub struct LengthFramingStage {
    decoder: FrameDecoder,
    max: usize,
}

impl LengthFramingStage {
    /// Creates a stage rejecting frames longer than `max` bytes.
    pub fn new(max: usize) -> Self {
        Self {
            decoder: FrameDecoder::new(max),
            max,
        }
    }
}

#[async_trait]
impl PipelineStage for LengthFramingStage {
    fn name(&self) -> &'static str {
        "length-framing"
    }

    async fn inbound(&mut self, chunk: Vec<u8>) -> Result<Vec<Vec<u8>>, ProtocolError> {
        self.decoder.push(&chunk)
    }

    async fn outbound(&mut self, unit: Vec<u8>) -> Result<Vec<u8>, ProtocolError> {
        encode_frame(&unit, self.max)
    }
}

/// Gzip-compresses outbound units and decompresses inbound ones.
#[derive(Debug)]
pub struct GzipStage {
    level: i32,
    max: usize,
}

impl GzipStage {
    /// Creates a stage compressing at `level` (0 to 9). Decompressed units
    /// longer than `max` bytes are rejected.
    pub fn new(level: i32, max: usize) -> Self {
        Self { level, max }
    }
}

#[async_trait]
impl PipelineStage for GzipStage {
    fn name(&self) -> &'static str {
        "gzip"
    }

    async fn inbound(&mut self, chunk: Vec<u8>) -> Result<Vec<Vec<u8>>, ProtocolError> {
        Ok(vec![gzip_decompress(&chunk, self.max).await?])
    }

    async fn outbound(&mut self, unit: Vec<u8>) -> Result<Vec<u8>, ProtocolError> {
        gzip_compress(&unit, self.level).await
    }
}

pub(crate) async fn gzip_compress(data: &[u8], level: i32) -> Result<Vec<u8>, ProtocolError> {
    let mut encoder = GzipEncoder::with_quality(Vec::new(), Level::Precise(level));
    encoder.write_all(data).await?;
    encoder.shutdown().await?;
    Ok(encoder.into_inner())
}

/// Inflates `data`, refusing output larger than `max`.
pub(crate) async fn gzip_decompress(data: &[u8], max: usize) -> Result<Vec<u8>, ProtocolError> {
    let mut decoded = Vec::new();
    GzipDecoder::new(data)
        .take(max as u64 + 1)
        .read_to_end(&mut decoded)
        .await
        .map_err(|e| ProtocolError::Decode {
            format: "gzip",
            source: Box::new(e),
        })?;

    if decoded.len() > max {
        return Err(ProtocolError::FrameTooLarge {
            size: decoded.len(),
            max,
        });
    }
    Ok(decoded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serialization::framing::MAX_FRAME_SIZE;

    fn framed_gzip() -> Pipeline {
        let mut pipeline = Pipeline::new();
        pipeline.add_last(LengthFramingStage::new(MAX_FRAME_SIZE));
        pipeline.add_last(GzipStage::new(6, MAX_FRAME_SIZE));
        pipeline
    }

    #[tokio::test]
    async fn test_outbound_then_inbound_in_pieces() {
        let mut sender = framed_gzip();
        let mut receiver = framed_gzip();
        let payload = b"repetitive payload ".repeat(64);

        let wire = sender.outbound(payload.clone()).await.unwrap();
        assert!(wire.len() < payload.len());

        let mut units = Vec::new();
        for chunk in wire.chunks(7) {
            units.extend(receiver.inbound(chunk.to_vec()).await.unwrap());
        }
        assert_eq!(units, vec![payload]);
    }

    #[tokio::test]
    async fn test_partial_frame_yields_nothing() {
        let mut pipeline = framed_gzip();
        let units = pipeline.inbound(vec![0, 0, 0, 9, 1]).await.unwrap();
        assert!(units.is_empty());
    }

    #[tokio::test]
    async fn test_decompress_rejects_garbage() {
        let result = gzip_decompress(b"definitely not gzip", 1024).await;
        assert!(matches!(result, Err(ProtocolError::Decode { format: "gzip", .. })));
    }

    #[tokio::test]
    async fn test_decompress_enforces_limit() {
        let compressed = gzip_compress(&[0u8; 4096], 6).await.unwrap();
        let result = gzip_decompress(&compressed, 100).await;
        assert!(matches!(result, Err(ProtocolError::FrameTooLarge { max: 100, .. })));
    }

    #[test]
    fn test_stage_names_in_order() {
        assert_eq!(framed_gzip().stage_names(), vec!["length-framing", "gzip"]);
    }
}
