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

//! Transport layer error types.
//!
//! Transport errors are the lowest layer of the error hierarchy: connecting,
//! binding, accepting, and raw byte I/O. A channel whose transport fails
//! becomes unusable, but closing it must still succeed.

use std::io;
use thiserror::Error;

/// Failure of a transport operation.
#[derive(Debug, Error)]
pub enum TransportError {
    /// An outbound connection could not be established.
    #[error("failed to connect to {address}: {source}")]
    ConnectionFailed {
        address: String,
        #[source]
        source: io::Error,
    },

    /// An acceptor could not bind its address.
    #[error("failed to bind to {address}: {source}")]
    BindFailed {
        address: String,
        #[source]
        source: io::Error,
    },

    /// Accepting a connection failed. The acceptor stays usable.
    #[error("failed to accept connection: {source}")]
    AcceptFailed {
        #[source]
        source: io::Error,
    },

    /// The transport was already closed.
    #[error("transport is closed")]
    Closed,

    /// Reading or writing failed.
    #[error("I/O error: {source}")]
    Io {
        #[source]
        source: io::Error,
    },
}

impl TransportError {
    /// Returns true when the error says the resource is already gone.
    ///
    /// Closing a channel whose transport failed this way counts as success.
    pub fn is_already_gone(&self) -> bool {
        match self {
            Self::Closed => true,
            Self::Io { source } => is_gone_kind(source.kind()),
            _ => false,
        }
    }
}

pub(crate) fn is_gone_kind(kind: io::ErrorKind) -> bool {
    matches!(
        kind,
        io::ErrorKind::NotConnected
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::UnexpectedEof
    )
}

impl From<io::Error> for TransportError {
    fn from(error: io::Error) -> Self {
        Self::Io { source: error }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refused_connection_is_not_gone() {
        let error = TransportError::ConnectionFailed {
            address: "127.0.0.1:8080".to_string(),
            source: io::Error::new(io::ErrorKind::ConnectionRefused, "refused"),
        };
        assert!(!error.is_already_gone());
        assert!(error.to_string().contains("127.0.0.1:8080"));
    }

    #[test]
    fn test_reset_and_closed_are_gone() {
        for kind in [io::ErrorKind::BrokenPipe, io::ErrorKind::ConnectionReset] {
            assert!(TransportError::from(io::Error::from(kind)).is_already_gone());
        }
        assert!(TransportError::Closed.is_already_gone());
        assert!(!TransportError::from(io::Error::from(io::ErrorKind::PermissionDenied)).is_already_gone());
    }
}
