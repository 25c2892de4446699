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

//! Transport identity and metadata.
//!
//! Every transport carries a [`TransportMetadata`] naming it and both of
//! its ends. Channels copy it at creation and attach the id to their log
//! lines, so one connection can be followed through the logs.

use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

/// Source of [`TransportId`]s. Zero is never handed out.
static NEXT_TRANSPORT_ID: AtomicU64 = AtomicU64::new(1);

/// Process-wide identifier of a transport, used to tie log lines together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransportId(u64);

impl TransportId {
    /// Allocates the next id.
    pub fn next() -> Self {
        Self(NEXT_TRANSPORT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// The raw id.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TransportId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Address of one side of a transport.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TransportAddr {
    /// An IP socket address.
    Inet(SocketAddr),
    /// A filesystem-backed Unix socket path.
    Path(String),
    /// A Linux abstract-namespace socket name.
    Abstract(String),
    /// An unnamed or in-memory endpoint.
    Unnamed,
}

impl TransportAddr {
    /// The IP address, for `Inet` addresses only.
    pub fn as_socket_addr(&self) -> Option<SocketAddr> {
        match self {
            Self::Inet(addr) => Some(*addr),
            _ => None,
        }
    }
}

impl fmt::Display for TransportAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inet(addr) => write!(f, "{}", addr),
            Self::Path(path) => f.write_str(path),
            Self::Abstract(name) => write!(f, "@{}", name),
            Self::Unnamed => f.write_str("<unnamed>"),
        }
    }
}

impl From<SocketAddr> for TransportAddr {
    fn from(addr: SocketAddr) -> Self {
        Self::Inet(addr)
    }
}

/// Who is on either end of a transport, and which scheme carries it.
///
/// # Examples
///
/// ```rust
/// use commlink::transport::{TransportAddr, TransportMetadata};
///
/// let metadata = TransportMetadata::new("socket")
///     .with_peer_addr("10.0.0.7:9000".parse::<std::net::SocketAddr>().unwrap());
/// assert_eq!(metadata.peer_addr.to_string(), "10.0.0.7:9000");
/// assert_eq!(metadata.local_addr, TransportAddr::Unnamed);
/// ```
#[derive(Debug, Clone)]
pub struct TransportMetadata {
    /// Unique id of the transport.
    pub id: TransportId,
    /// Scheme carrying the transport, such as `socket`.
    pub scheme: &'static str,
    /// This side's address.
    pub local_addr: TransportAddr,
    /// The other side's address.
    pub peer_addr: TransportAddr,
}

impl TransportMetadata {
    /// Metadata for a fresh transport with both addresses unnamed.
    pub fn new(scheme: &'static str) -> Self {
        Self {
            id: TransportId::next(),
            scheme,
            local_addr: TransportAddr::Unnamed,
            peer_addr: TransportAddr::Unnamed,
        }
    }

    /// Sets this side's address.
    #[must_use]
    pub fn with_local_addr(mut self, addr: impl Into<TransportAddr>) -> Self {
        self.local_addr = addr.into();
        self
    }

    /// Sets the other side's address.
    #[must_use]
    pub fn with_peer_addr(mut self, addr: impl Into<TransportAddr>) -> Self {
        self.peer_addr = addr.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_increase() {
        let first = TransportId::next();
        let second = TransportId::next();
        assert!(second.as_u64() > first.as_u64());
        assert_eq!(format!("{}", TransportId(7)), "#7");
    }

    #[test]
    fn test_metadata_addresses() {
        let local: SocketAddr = "127.0.0.1:8080".parse().unwrap();
        let metadata = TransportMetadata::new("socket")
            .with_local_addr(local)
            .with_peer_addr(TransportAddr::Path("/tmp/x.sock".to_string()));

        assert_eq!(metadata.scheme, "socket");
        assert_eq!(metadata.local_addr.as_socket_addr(), Some(local));
        assert_eq!(metadata.peer_addr.to_string(), "/tmp/x.sock");
        assert_eq!(TransportMetadata::new("memory").peer_addr, TransportAddr::Unnamed);
    }

    #[test]
    fn test_abstract_addr_display() {
        assert_eq!(TransportAddr::Abstract("svc".into()).to_string(), "@svc");
        assert_eq!(TransportAddr::Unnamed.to_string(), "<unnamed>");
    }
}
