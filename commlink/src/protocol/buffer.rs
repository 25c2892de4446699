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

//! In-memory duplex used to run stream codecs over byte buffers.

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

/// Reads from a fixed input buffer and collects everything written.
///
/// Event-driven channels receive bytes in chunks rather than as a stream;
/// decoding over a `BufferDuplex` reports `UnexpectedEof` when the chunk is
/// not yet a whole message.
#[derive(Debug, Default)]
pub struct BufferDuplex {
    input: Vec<u8>,
    position: usize,
    output: Vec<u8>,
}

impl BufferDuplex {
    /// Wraps `input` for reading. The output starts empty.
    pub fn new(input: Vec<u8>) -> Self {
        Self {
            input,
            position: 0,
            output: Vec::new(),
        }
    }

    /// Bytes of input read so far.
    pub fn consumed(&self) -> usize {
        self.position
    }

    /// Returns the input buffer, including the bytes already read.
    pub fn into_input(self) -> Vec<u8> {
        self.input
    }

    /// Takes everything written so far, leaving the output empty.
    pub fn take_output(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.output)
    }
}

impl AsyncRead for BufferDuplex {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let remaining = &self.input[self.position..];
        let n = remaining.len().min(buf.remaining());
        buf.put_slice(&remaining[..n]);
        self.position += n;
        Poll::Ready(Ok(()))
    }
}

impl AsyncWrite for BufferDuplex {
    fn poll_write(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        self.output.extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn test_reads_input_then_eof() {
        let mut duplex = BufferDuplex::new(b"abc".to_vec());
        let mut out = [0u8; 2];
        duplex.read_exact(&mut out).await.unwrap();
        assert_eq!(&out, b"ab");
        assert_eq!(duplex.consumed(), 2);

        let error = duplex.read_exact(&mut out).await.unwrap_err();
        assert_eq!(error.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[tokio::test]
    async fn test_into_input_returns_whole_buffer() {
        let mut duplex = BufferDuplex::new(b"abcd".to_vec());
        let mut out = [0u8; 3];
        duplex.read_exact(&mut out).await.unwrap();
        assert_eq!(duplex.consumed(), 3);
        assert_eq!(duplex.into_input(), b"abcd");
    }

    #[tokio::test]
    async fn test_collects_output() {
        let mut duplex = BufferDuplex::default();
        duplex.write_all(b"hello").await.unwrap();
        duplex.write_all(b" world").await.unwrap();
        assert_eq!(duplex.take_output(), b"hello world");
        assert!(duplex.take_output().is_empty());
    }
}
