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

//! In-memory transport.
//!
//! Connected pairs backed by `tokio::io::duplex`, for running channels and
//! codecs without sockets.

use crate::transport::{Transport, TransportMetadata};
use tokio::io::DuplexStream;

const DEFAULT_BUFFER_SIZE: usize = 64 * 1024;

/// One end of an in-memory pipe.
///
/// Dropping one end makes reads on the other end return EOF and writes
/// fail with `BrokenPipe`, the same as a closed socket.
///
/// # Examples
///
/// ```rust
/// use commlink::transport::{MemoryTransport, Transport};
///
/// let (client, server) = MemoryTransport::pair_default();
/// assert_eq!(client.metadata().scheme, "memory");
/// assert_ne!(client.metadata().id, server.metadata().id);
/// ```
pub struct MemoryTransport {
    stream: DuplexStream,
    metadata: TransportMetadata,
}

impl MemoryTransport {
    /// Creates a connected pair; each direction buffers up to `buffer_size`
    /// bytes before writers wait.
    pub fn pair(buffer_size: usize) -> (Self, Self) {
        let (a, b) = tokio::io::duplex(buffer_size);
        (Self::wrap(a), Self::wrap(b))
    }

    /// Like [`pair`](Self::pair) with a 64 KiB buffer per direction.
    pub fn pair_default() -> (Self, Self) {
        Self::pair(DEFAULT_BUFFER_SIZE)
    }

    /// Gives one end of the duplex its own metadata.
    fn wrap(stream: DuplexStream) -> Self {
        Self {
            stream,
            metadata: TransportMetadata::new("memory"),
        }
    }
}

impl Transport for MemoryTransport {
    fn metadata(&self) -> &TransportMetadata {
        &self.metadata
    }
}

forward_stream_io!(MemoryTransport);

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn test_pair_carries_both_directions() {
        let (mut left, mut right) = MemoryTransport::pair(8);
        assert_ne!(left.metadata().id, right.metadata().id);

        left.write_all(b"ping").await.unwrap();
        let mut buffer = [0u8; 4];
        right.read_exact(&mut buffer).await.unwrap();
        assert_eq!(&buffer, b"ping");

        right.write_all(b"pong").await.unwrap();
        left.read_exact(&mut buffer).await.unwrap();
        assert_eq!(&buffer, b"pong");
    }

    #[tokio::test]
    async fn test_dropped_peer_reads_as_end_of_stream() {
        let (left, mut right) = MemoryTransport::pair_default();
        drop(left);
        let mut buffer = Vec::new();
        assert_eq!(right.read_to_end(&mut buffer).await.unwrap(), 0);
    }
}
