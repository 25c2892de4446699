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

//! Length-prefixed message framing.
//!
//! Each frame is a 4-byte big-endian length followed by that many payload
//! bytes.
//!
//! ```text
//! +------------------+-------------------+
//! | Length (4 bytes) | Payload (N bytes) |
//! +------------------+-------------------+
//! ```
//!
//! # Examples
//!
//! ```rust
//! use commlink::serialization::framing::{read_frame, write_frame, MAX_FRAME_SIZE};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut buffer = Vec::new();
//! write_frame(&mut buffer, b"Hello", MAX_FRAME_SIZE).await?;
//!
//! let mut reader = &buffer[..];
//! let payload = read_frame(&mut reader, MAX_FRAME_SIZE).await?;
//! assert_eq!(payload, b"Hello");
//! # Ok(())
//! # }
//! ```

use crate::protocol::ProtocolError;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Default cap on a single frame payload (16 MiB).
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Size of the length prefix.
pub const FRAME_HEADER_SIZE: usize = 4;

/// Writes `payload` as one frame and flushes the writer.
pub async fn write_frame<W>(writer: &mut W, payload: &[u8], max: usize) -> Result<(), ProtocolError>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let header = frame_header(payload.len(), max)?;
    writer.write_all(&header).await?;
    writer.write_all(payload).await?;
    writer.flush().await?;
    Ok(())
}

/// Reads one frame payload.
///
/// End of input before a complete frame surfaces as an `UnexpectedEof`
/// I/O error so callers can tell "need more bytes" apart from corruption.
pub async fn read_frame<R>(reader: &mut R, max: usize) -> Result<Vec<u8>, ProtocolError>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut header = [0u8; FRAME_HEADER_SIZE];
    reader.read_exact(&mut header).await?;

    let len = u32::from_be_bytes(header) as usize;
    if len > max {
        return Err(ProtocolError::FrameTooLarge { size: len, max });
    }

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await?;
    Ok(payload)
}

/// Encodes `payload` as a frame in memory.
pub fn encode_frame(payload: &[u8], max: usize) -> Result<Vec<u8>, ProtocolError> {
    let header = frame_header(payload.len(), max)?;
    let mut frame = Vec::with_capacity(FRAME_HEADER_SIZE + payload.len());
    frame.extend_from_slice(&header);
    frame.extend_from_slice(payload);
    Ok(frame)
}

/// The big-endian length header for a payload of `len` bytes.
fn frame_header(len: usize, max: usize) -> Result<[u8; FRAME_HEADER_SIZE], ProtocolError> {
    if len > max || len > u32::MAX as usize {
        return Err(ProtocolError::FrameTooLarge { size: len, max });
    }
    Ok((len as u32).to_be_bytes())
}

/// Incremental frame reassembly over arbitrarily split input.
#[derive(Debug)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
    max: usize,
}

impl FrameDecoder {
    /// Creates a decoder rejecting frames longer than `max` bytes.
    pub fn new(max: usize) -> Self {
        Self {
            buffer: Vec::new(),
            max,
        }
    }

    /// Appends `bytes` and returns every frame payload completed by them.
    pub fn push(&mut self, bytes: &[u8]) -> Result<Vec<Vec<u8>>, ProtocolError> {
        self.buffer.extend_from_slice(bytes);

        let mut frames = Vec::new();
        let mut offset = 0;
        while self.buffer.len() - offset >= FRAME_HEADER_SIZE {
            let mut header = [0u8; FRAME_HEADER_SIZE];
            header.copy_from_slice(&self.buffer[offset..offset + FRAME_HEADER_SIZE]);
            let len = u32::from_be_bytes(header) as usize;
            if len > self.max {
                return Err(ProtocolError::FrameTooLarge {
                    size: len,
                    max: self.max,
                });
            }

            let end = offset + FRAME_HEADER_SIZE + len;
            if self.buffer.len() < end {
                break;
            }
            frames.push(self.buffer[offset + FRAME_HEADER_SIZE..end].to_vec());
            offset = end;
        }
        self.buffer.drain(..offset);
        Ok(frames)
    }

    /// Number of buffered bytes not yet part of a complete frame.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_then_read_frame() {
        let mut buffer = Vec::new();
        write_frame(&mut buffer, b"first", MAX_FRAME_SIZE).await.unwrap();
        write_frame(&mut buffer, b"", MAX_FRAME_SIZE).await.unwrap();

        let mut reader = &buffer[..];
        assert_eq!(read_frame(&mut reader, MAX_FRAME_SIZE).await.unwrap(), b"first");
        assert!(read_frame(&mut reader, MAX_FRAME_SIZE).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_read_frame_truncated_is_incomplete() {
        let frame = encode_frame(b"payload", MAX_FRAME_SIZE).unwrap();
        let mut reader = &frame[..frame.len() - 2];
        let error = read_frame(&mut reader, MAX_FRAME_SIZE).await.unwrap_err();
        assert!(error.is_incomplete());
    }

    #[tokio::test]
    async fn test_read_frame_rejects_oversized_length() {
        let bytes = 1024u32.to_be_bytes();
        let mut reader = &bytes[..];
        let error = read_frame(&mut reader, 16).await.unwrap_err();
        assert!(matches!(error, ProtocolError::FrameTooLarge { size: 1024, max: 16 }));
    }

    #[tokio::test]
    async fn test_write_frame_rejects_oversized_payload() {
        let mut buffer = Vec::new();
        let result = write_frame(&mut buffer, &[0u8; 32], 16).await;
        assert!(result.is_err());
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_decoder_reassembles_split_frames() {
        let mut stream = encode_frame(b"alpha", MAX_FRAME_SIZE).unwrap();
        stream.extend(encode_frame(b"beta", MAX_FRAME_SIZE).unwrap());

        let mut decoder = FrameDecoder::new(MAX_FRAME_SIZE);
        let mut frames = Vec::new();
        for chunk in stream.chunks(3) {
            frames.extend(decoder.push(chunk).unwrap());
        }

        assert_eq!(frames, vec![b"alpha".to_vec(), b"beta".to_vec()]);
        assert_eq!(decoder.buffered(), 0);
    }
}
