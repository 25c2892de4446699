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

//! Transport layer abstractions.
//!
//! A [`Transport`] is a bidirectional byte stream bound to exactly one
//! resource: a TCP connection, a local socket, or an in-memory pipe. Channels
//! own one transport each and never share it. Acceptors implement
//! [`TransportListener`] so a single accept loop serves every scheme.
//!
//! - [`TcpTransport`] / [`TcpAcceptor`]: the `socket` scheme
//! - [`LocalSocketTransport`] / [`LocalSocketAcceptor`]: the `localsocket`
//!   scheme (Unix only)
//! - [`MemoryTransport`]: connected in-memory pairs
//!
//! # Examples
//!
//! ```rust
//! use commlink::transport::MemoryTransport;
//! use tokio::io::{AsyncReadExt, AsyncWriteExt};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let (mut client, mut server) = MemoryTransport::pair(1024);
//! client.write_all(b"Hello").await?;
//!
//! let mut buffer = vec![0u8; 5];
//! server.read_exact(&mut buffer).await?;
//! assert_eq!(&buffer, b"Hello");
//! # Ok(())
//! # }
//! ```

/// Implements `AsyncRead` and `AsyncWrite` for a transport by forwarding to
/// its `stream` field.
macro_rules! forward_stream_io {
    ($transport:ty) => {
        impl tokio::io::AsyncRead for $transport {
            fn poll_read(
                mut self: std::pin::Pin<&mut Self>,
                cx: &mut std::task::Context<'_>,
                buf: &mut tokio::io::ReadBuf<'_>,
            ) -> std::task::Poll<std::io::Result<()>> {
                tokio::io::AsyncRead::poll_read(std::pin::Pin::new(&mut self.stream), cx, buf)
            }
        }

        impl tokio::io::AsyncWrite for $transport {
            fn poll_write(
                mut self: std::pin::Pin<&mut Self>,
                cx: &mut std::task::Context<'_>,
                buf: &[u8],
            ) -> std::task::Poll<std::io::Result<usize>> {
                tokio::io::AsyncWrite::poll_write(std::pin::Pin::new(&mut self.stream), cx, buf)
            }

            fn poll_flush(
                mut self: std::pin::Pin<&mut Self>,
                cx: &mut std::task::Context<'_>,
            ) -> std::task::Poll<std::io::Result<()>> {
                tokio::io::AsyncWrite::poll_flush(std::pin::Pin::new(&mut self.stream), cx)
            }

            fn poll_shutdown(
                mut self: std::pin::Pin<&mut Self>,
                cx: &mut std::task::Context<'_>,
            ) -> std::task::Poll<std::io::Result<()>> {
                tokio::io::AsyncWrite::poll_shutdown(std::pin::Pin::new(&mut self.stream), cx)
            }
        }
    };
}

mod error;
#[cfg(unix)]
mod local;
mod memory;
mod tcp;
mod traits;
mod types;

pub use error::TransportError;
pub(crate) use error::is_gone_kind;
#[cfg(unix)]
pub use local::{LocalSocketAcceptor, LocalSocketAddress, LocalSocketTransport};
pub use memory::MemoryTransport;
pub use tcp::{TcpAcceptor, TcpTransport};
pub use traits::{Transport, TransportListener};
pub use types::{TransportAddr, TransportId, TransportMetadata};
