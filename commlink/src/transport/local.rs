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

//! Local (same-host) socket transport.
//!
//! Backs the `localsocket` scheme with Unix domain stream sockets. A socket
//! is either filesystem-backed, in which case the acceptor removes the socket
//! node when it is released, or lives in the Linux abstract namespace and
//! leaves nothing behind.

use crate::transport::{Transport, TransportAddr, TransportError, TransportListener, TransportMetadata};
use std::io;
use std::path::PathBuf;
use tokio::net::{UnixListener, UnixStream};
use tracing::{debug, info, instrument, warn};

/// Address of a local socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalSocketAddress {
    /// A socket node on the filesystem.
    Path(PathBuf),
    /// A name in the abstract namespace.
    Abstract(String),
}

impl LocalSocketAddress {
    /// True for names in the abstract namespace.
    pub fn is_abstract(&self) -> bool {
        matches!(self, Self::Abstract(_))
    }

    fn transport_addr(&self) -> TransportAddr {
        match self {
            Self::Path(path) => TransportAddr::Path(path.display().to_string()),
            Self::Abstract(name) => TransportAddr::Abstract(name.clone()),
        }
    }
}

impl std::fmt::Display for LocalSocketAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.transport_addr())
    }
}

/// A connected local socket stream.
///
/// # Examples
///
/// ```rust,no_run
/// use commlink::transport::{LocalSocketAddress, LocalSocketTransport};
/// use tokio::io::AsyncWriteExt;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let address = LocalSocketAddress::Path("/tmp/commlink.sock".into());
/// let mut transport = LocalSocketTransport::connect(&address).await?;
/// transport.write_all(b"ping").await?;
/// # Ok(())
/// # }
/// ```
pub struct LocalSocketTransport {
    stream: UnixStream,
    metadata: TransportMetadata,
}

impl LocalSocketTransport {
    /// Unix peers rarely have a name, so the caller supplies both addresses.
    fn from_stream(stream: UnixStream, local: TransportAddr, peer: TransportAddr) -> Self {
        let metadata = TransportMetadata::new("localsocket")
            .with_local_addr(local)
            .with_peer_addr(peer);
        Self { stream, metadata }
    }

    /// Connects to the socket at `address`.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::ConnectionFailed`] when nothing listens at
    /// the address, and on platforms without an abstract namespace.
    #[instrument(skip(address), fields(address = %address))]
    pub async fn connect(address: &LocalSocketAddress) -> Result<Self, TransportError> {
        let stream = match address {
            LocalSocketAddress::Path(path) => UnixStream::connect(path).await,
            LocalSocketAddress::Abstract(name) => connect_abstract(name),
        }
        .map_err(|e| TransportError::ConnectionFailed {
            address: address.to_string(),
            source: e,
        })?;
        debug!("local socket connected");

        Ok(Self::from_stream(
            stream,
            TransportAddr::Unnamed,
            address.transport_addr(),
        ))
    }
}

impl Transport for LocalSocketTransport {
    fn metadata(&self) -> &TransportMetadata {
        &self.metadata
    }
}

forward_stream_io!(LocalSocketTransport);

/// A bound local socket acceptor.
///
/// A filesystem socket node stays in place until
/// [`release`](TransportListener::release) removes it. Binding a path whose
/// node already exists fails, so a stale node from a crashed process must
/// be removed first.
pub struct LocalSocketAcceptor {
    listener: UnixListener,
    address: LocalSocketAddress,
}

impl LocalSocketAcceptor {
    /// Binds a listening socket at `address`.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::BindFailed`] when the node exists or its
    /// directory is not writable, and on platforms without an abstract
    /// namespace.
    #[instrument(skip(address), fields(address = %address))]
    pub fn bind(address: LocalSocketAddress) -> Result<Self, TransportError> {
        let listener = match &address {
            LocalSocketAddress::Path(path) => UnixListener::bind(path),
            LocalSocketAddress::Abstract(name) => bind_abstract(name),
        }
        .map_err(|e| TransportError::BindFailed {
            address: address.to_string(),
            source: e,
        })?;
        info!("local socket acceptor bound");
        Ok(Self { listener, address })
    }

    /// The address this acceptor is bound to.
    pub fn address(&self) -> &LocalSocketAddress {
        &self.address
    }
}

#[async_trait::async_trait]
impl TransportListener for LocalSocketAcceptor {
    type Transport = LocalSocketTransport;

    async fn accept(&self) -> Result<LocalSocketTransport, TransportError> {
        let (stream, _) = self
            .listener
            .accept()
            .await
            .map_err(|e| TransportError::AcceptFailed { source: e })?;
        Ok(LocalSocketTransport::from_stream(
            stream,
            self.address.transport_addr(),
            TransportAddr::Unnamed,
        ))
    }

    fn local_addr(&self) -> Result<TransportAddr, TransportError> {
        Ok(self.address.transport_addr())
    }

    fn release(&self) -> Result<(), TransportError> {
        match &self.address {
            LocalSocketAddress::Abstract(_) => Ok(()),
            LocalSocketAddress::Path(path) => match std::fs::remove_file(path) {
                Ok(()) => {
                    debug!(path = %path.display(), "removed local socket node");
                    Ok(())
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
                Err(e) => {
                    warn!(path = %path.display(), "failed to remove local socket node: {}", e);
                    Err(TransportError::Io { source: e })
                }
            },
        }
    }
}

/// Abstract names never touch the filesystem, so there is nothing to clean up.
#[cfg(target_os = "linux")]
fn bind_abstract(name: &str) -> io::Result<UnixListener> {
    use std::os::linux::net::SocketAddrExt;

    let addr = std::os::unix::net::SocketAddr::from_abstract_name(name.as_bytes())?;
    let listener = std::os::unix::net::UnixListener::bind_addr(&addr)?;
    listener.set_nonblocking(true)?;
    UnixListener::from_std(listener)
}

#[cfg(target_os = "linux")]
fn connect_abstract(name: &str) -> io::Result<UnixStream> {
    use std::os::linux::net::SocketAddrExt;

    let addr = std::os::unix::net::SocketAddr::from_abstract_name(name.as_bytes())?;
    let stream = std::os::unix::net::UnixStream::connect_addr(&addr)?;
    stream.set_nonblocking(true)?;
    UnixStream::from_std(stream)
}

#[cfg(not(target_os = "linux"))]
fn bind_abstract(_name: &str) -> io::Result<UnixListener> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "abstract socket addresses are only available on Linux",
    ))
}

#[cfg(not(target_os = "linux"))]
fn connect_abstract(_name: &str) -> io::Result<UnixStream> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "abstract socket addresses are only available on Linux",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn test_path_socket_echo_and_release() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("echo.sock");
        let address = LocalSocketAddress::Path(path.clone());

        let acceptor = LocalSocketAcceptor::bind(address.clone()).unwrap();
        assert!(path.exists());

        let client = tokio::spawn({
            let address = address.clone();
            async move {
                let mut transport = LocalSocketTransport::connect(&address).await.unwrap();
                transport.write_all(b"ping").await.unwrap();
                let mut reply = [0u8; 4];
                transport.read_exact(&mut reply).await.unwrap();
                reply
            }
        });

        let mut server = acceptor.accept().await.unwrap();
        let mut buffer = [0u8; 4];
        server.read_exact(&mut buffer).await.unwrap();
        server.write_all(&buffer).await.unwrap();
        assert_eq!(&client.await.unwrap(), b"ping");

        drop(server);
        acceptor.release().unwrap();
        assert!(!path.exists());
        // A second release finds nothing to remove and still succeeds.
        acceptor.release().unwrap();
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_abstract_socket_leaves_no_node() {
        let name = format!("commlink-test-{}", std::process::id());
        let address = LocalSocketAddress::Abstract(name);
        assert!(address.is_abstract());

        let acceptor = LocalSocketAcceptor::bind(address.clone()).unwrap();
        let connect = tokio::spawn(async move { LocalSocketTransport::connect(&address).await });
        let accepted = acceptor.accept().await;
        assert!(accepted.is_ok());
        assert!(connect.await.unwrap().is_ok());
        acceptor.release().unwrap();
    }
}
