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

//! TCP transport, backing the `socket` scheme.
//!
//! Both ends of a connection are [`TcpTransport`]s: the client side is made
//! by [`TcpTransport::connect`], the server side by [`TcpAcceptor`]. Nagle's
//! algorithm is turned off on every stream, since request/response traffic
//! is dominated by small writes.

use crate::transport::{Transport, TransportAddr, TransportError, TransportListener, TransportMetadata};
use std::io;
use std::net::SocketAddr;
use tokio::net::{lookup_host, TcpListener, TcpStream};
use tracing::{debug, info, instrument, warn};

/// A connected TCP stream with Nagle's algorithm disabled.
///
/// # Examples
///
/// ```rust,no_run
/// use commlink::transport::{TcpTransport, Transport};
/// use tokio::io::{AsyncReadExt, AsyncWriteExt};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let mut transport = TcpTransport::connect("127.0.0.1:9000").await?;
/// println!("connected to {}", transport.metadata().peer_addr);
///
/// transport.write_all(b"ping").await?;
/// let mut reply = [0u8; 4];
/// transport.read_exact(&mut reply).await?;
/// # Ok(())
/// # }
/// ```
pub struct TcpTransport {
    stream: TcpStream,
    metadata: TransportMetadata,
}

impl TcpTransport {
    /// Adopts a connected stream and records both of its addresses.
    fn from_stream(stream: TcpStream) -> io::Result<Self> {
        stream.set_nodelay(true)?;
        let metadata = TransportMetadata::new("socket")
            .with_local_addr(stream.local_addr()?)
            .with_peer_addr(stream.peer_addr()?);
        Ok(Self { stream, metadata })
    }

    /// Connects to `address` (`host:port`).
    ///
    /// Every address the host resolves to is tried in turn; the error of the
    /// last attempt is reported when none accepts.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::ConnectionFailed`] when the name does not
    /// resolve or no resolved address accepts the connection.
    #[instrument]
    pub async fn connect(address: &str) -> Result<Self, TransportError> {
        let failed = |source| TransportError::ConnectionFailed {
            address: address.to_string(),
            source,
        };
        let candidates: Vec<SocketAddr> = lookup_host(address).await.map_err(failed)?.collect();

        let mut last_error = io::Error::new(io::ErrorKind::NotFound, "host resolved to no address");
        for candidate in candidates {
            match TcpStream::connect(candidate).await {
                Ok(stream) => {
                    let transport = Self::from_stream(stream).map_err(failed)?;
                    debug!(transport = %transport.metadata.id, peer = %candidate, "connected");
                    return Ok(transport);
                }
                Err(error) => {
                    debug!(%candidate, %error, "connect attempt failed");
                    last_error = error;
                }
            }
        }
        warn!(error = %last_error, "could not connect");
        Err(failed(last_error))
    }
}

impl Transport for TcpTransport {
    fn metadata(&self) -> &TransportMetadata {
        &self.metadata
    }
}

forward_stream_io!(TcpTransport);

/// A bound TCP acceptor.
///
/// # Examples
///
/// ```rust,no_run
/// use commlink::transport::{TcpAcceptor, TransportListener};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let acceptor = TcpAcceptor::bind("127.0.0.1:0").await?;
/// println!("listening on {}", acceptor.local_addr()?);
/// let transport = acceptor.accept().await?;
/// # Ok(())
/// # }
/// ```
pub struct TcpAcceptor {
    listener: TcpListener,
}

impl TcpAcceptor {
    /// Binds to `address` (`host:port`). Port 0 picks a free port.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::BindFailed`] when the address is in use,
    /// not local, or not an address at all.
    #[instrument]
    pub async fn bind(address: &str) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(address)
            .await
            .map_err(|source| TransportError::BindFailed {
                address: address.to_string(),
                source,
            })?;
        info!(bound = ?listener.local_addr().ok(), "TCP acceptor bound");
        Ok(Self { listener })
    }
}

#[async_trait::async_trait]
impl TransportListener for TcpAcceptor {
    type Transport = TcpTransport;

    async fn accept(&self) -> Result<TcpTransport, TransportError> {
        let (stream, peer) = self
            .listener
            .accept()
            .await
            .map_err(|source| TransportError::AcceptFailed { source })?;
        debug!(%peer, "accepted TCP connection");
        Ok(TcpTransport::from_stream(stream)?)
    }

    fn local_addr(&self) -> Result<TransportAddr, TransportError> {
        Ok(TransportAddr::Inet(self.listener.local_addr()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    async fn bound() -> (TcpAcceptor, SocketAddr) {
        let acceptor = TcpAcceptor::bind("127.0.0.1:0").await.unwrap();
        let addr = acceptor.local_addr().unwrap().as_socket_addr().unwrap();
        (acceptor, addr)
    }

    #[tokio::test]
    async fn test_connect_by_host_name_and_echo() {
        let (acceptor, addr) = bound().await;
        let server = tokio::spawn(async move {
            let mut transport = acceptor.accept().await.unwrap();
            let mut buffer = [0u8; 4];
            transport.read_exact(&mut buffer).await.unwrap();
            transport.write_all(&buffer).await.unwrap();
            transport.metadata().peer_addr.clone()
        });

        let mut client = TcpTransport::connect(&format!("localhost:{}", addr.port()))
            .await
            .unwrap();
        assert_eq!(client.metadata().scheme, "socket");
        assert_eq!(client.metadata().peer_addr, TransportAddr::Inet(addr));

        client.write_all(b"ping").await.unwrap();
        let mut reply = [0u8; 4];
        client.read_exact(&mut reply).await.unwrap();
        assert_eq!(&reply, b"ping");
        assert_eq!(server.await.unwrap(), client.metadata().local_addr);
    }

    #[tokio::test]
    async fn test_connection_refused() {
        match TcpTransport::connect("127.0.0.1:1").await {
            Err(TransportError::ConnectionFailed { address, .. }) => assert_eq!(address, "127.0.0.1:1"),
            other => panic!("expected ConnectionFailed, got {:?}", other.err()),
        }
    }

    #[tokio::test]
    async fn test_bind_conflict() {
        let (_acceptor, addr) = bound().await;
        assert!(matches!(
            TcpAcceptor::bind(&addr.to_string()).await,
            Err(TransportError::BindFailed { .. })
        ));
    }
}
