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

//! Top-level error types.
//!
//! Errors are layered the same way the crate is:
//!
//! 1. **Configuration**: [`ConfigError`], fatal at construction and never
//!    retried (unsupported scheme, malformed location, missing key material)
//! 2. **Transport**: [`TransportError`], connection-level failures
//! 3. **Protocol**: [`ProtocolError`], codec, framing and handshake failures
//! 4. **Channel**: [`ChannelError`], lifecycle failures of a channel
//!
//! [`CommError`] composes the layers. Outside the crate every failure can be
//! flattened into a single `std::io::Error` kind.
//!
//! Correlation anomalies (a release for an unknown id, a stale notification)
//! are not errors at all: they are logged with `tracing::warn!` and dropped.
//!
//! # Examples
//!
//! ```rust
//! use commlink::error::{CommError, ConfigError};
//!
//! let error: CommError = ConfigError::UnsupportedScheme { scheme: "foo".into() }.into();
//! assert!(error.is_configuration_error());
//! assert!(error.to_string().contains("foo"));
//! ```

use crate::channel::ChannelError;
use crate::protocol::ProtocolError;
use crate::transport::TransportError;
use std::error::Error as StdError;
use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Invalid or incomplete configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No channel or listener factory is registered for the scheme.
    #[error("unsupported scheme: {scheme}")]
    UnsupportedScheme { scheme: String },

    /// No codec factory is registered under the name, or the codec cannot run on the chosen channel.
    #[error("unsupported protocol: {name}")]
    UnsupportedProtocol { name: String },

    /// The location cannot be parsed, or an indirection chain is too deep.
    #[error("malformed location {location}: {reason}")]
    MalformedLocation { location: String, reason: String },

    /// An `auto:` location resolved to the in-process `local` keyword.
    #[error("{location}: auto channels do not support local locations")]
    LocalLocationUnsupported { location: String },

    /// A parameter the component cannot work without is absent, such as a server `ssl.keyStore`.
    #[error("missing required parameter {name}")]
    MissingParameter { name: String },

    /// A parameter is present but its value is not accepted.
    #[error("invalid value for parameter {name}: {reason}")]
    InvalidParameter { name: String, reason: String },

    /// A referenced file could not be read.
    #[error("failed to read {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// An `ini:` location names a section or key the file does not contain.
    #[error("ini lookup failed for {section}/{key} in {path}")]
    IniEntryMissing {
        path: PathBuf,
        section: String,
        key: String,
    },

    /// A key or trust store holds no usable certificates or keys.
    #[error("invalid key material in {path}: {reason}")]
    KeyMaterial { path: PathBuf, reason: String },

    /// rustls refused the assembled client or server configuration.
    #[error("TLS configuration rejected: {0}")]
    Tls(#[from] rustls::Error),
}

/// The crate-wide error type.
///
/// Lower layers convert into it with `?`. Channel errors that wrap a
/// transport or codec failure are flattened into the matching variant, and
/// codec configuration failures become [`CommError::Configuration`].
#[derive(Debug)]
pub enum CommError {
    /// Invalid configuration; fatal and never retried.
    Configuration(ConfigError),
    /// Connecting, accepting or raw I/O failed.
    Transport(TransportError),
    /// A codec failed to encode, decode or negotiate.
    Protocol(ProtocolError),
    /// The channel was closed, cancelled or asked for something it cannot do.
    Channel(ChannelError),
}

impl CommError {
    /// Returns true for [`CommError::Configuration`].
    #[must_use]
    pub const fn is_configuration_error(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }

    /// Returns true for [`CommError::Transport`].
    #[must_use]
    pub const fn is_transport_error(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    /// Returns true for [`CommError::Protocol`].
    #[must_use]
    pub const fn is_protocol_error(&self) -> bool {
        matches!(self, Self::Protocol(_))
    }

    /// Returns true for [`CommError::Channel`].
    #[must_use]
    pub const fn is_channel_error(&self) -> bool {
        matches!(self, Self::Channel(_))
    }

    fn io_kind(&self) -> io::ErrorKind {
        match self {
            Self::Configuration(_) => io::ErrorKind::InvalidInput,
            Self::Transport(TransportError::Io { source }) => source.kind(),
            Self::Transport(TransportError::ConnectionFailed { source, .. }) => source.kind(),
            Self::Transport(_) => io::ErrorKind::Other,
            Self::Protocol(ProtocolError::Io(e)) => e.kind(),
            Self::Protocol(_) => io::ErrorKind::InvalidData,
            Self::Channel(e) if e.is_closed() => io::ErrorKind::NotConnected,
            Self::Channel(_) => io::ErrorKind::Other,
        }
    }
}

impl fmt::Display for CommError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration(e) => write!(f, "configuration error: {}", e),
            Self::Transport(e) => write!(f, "transport error: {}", e),
            Self::Protocol(e) => write!(f, "protocol error: {}", e),
            Self::Channel(e) => write!(f, "channel error: {}", e),
        }
    }
}

impl StdError for CommError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::Configuration(e) => Some(e),
            Self::Transport(e) => Some(e),
            Self::Protocol(e) => Some(e),
            Self::Channel(e) => Some(e),
        }
    }
}

impl From<ConfigError> for CommError {
    fn from(error: ConfigError) -> Self {
        Self::Configuration(error)
    }
}

impl From<TransportError> for CommError {
    fn from(error: TransportError) -> Self {
        Self::Transport(error)
    }
}

impl From<ProtocolError> for CommError {
    fn from(error: ProtocolError) -> Self {
        match error {
            ProtocolError::Configuration(e) => Self::Configuration(e),
            other => Self::Protocol(other),
        }
    }
}

impl From<ChannelError> for CommError {
    fn from(error: ChannelError) -> Self {
        match error {
            ChannelError::Transport(e) => Self::Transport(e),
            ChannelError::Protocol(e) => Self::from(e),
            other => Self::Channel(other),
        }
    }
}

impl From<CommError> for io::Error {
    fn from(error: CommError) -> Self {
        match error {
            CommError::Transport(TransportError::Io { source }) => source,
            CommError::Protocol(ProtocolError::Io(source)) => source,
            other => io::Error::new(other.io_kind(), other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_scheme_names_scheme() {
        let error = CommError::from(ConfigError::UnsupportedScheme {
            scheme: "foo".to_string(),
        });
        assert!(error.is_configuration_error());
        assert!(!error.is_transport_error());
        assert_eq!(error.to_string(), "configuration error: unsupported scheme: foo");
    }

    #[test]
    fn test_protocol_configuration_is_lifted() {
        let inner = ProtocolError::Configuration(ConfigError::MissingParameter {
            name: "ssl.keyStore".to_string(),
        });
        let error = CommError::from(inner);
        assert!(error.is_configuration_error());
    }

    #[test]
    fn test_channel_transport_is_lifted() {
        let error = CommError::from(ChannelError::Transport(TransportError::Closed));
        assert!(error.is_transport_error());
    }

    #[test]
    fn test_into_io_error_keeps_kind() {
        let error = CommError::Transport(TransportError::Io {
            source: io::Error::new(io::ErrorKind::ConnectionReset, "reset"),
        });
        let io_error: io::Error = error.into();
        assert_eq!(io_error.kind(), io::ErrorKind::ConnectionReset);

        let config: io::Error = CommError::from(ConfigError::MissingParameter {
            name: "x".to_string(),
        })
        .into();
        assert_eq!(config.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn test_local_location_message() {
        let error = ConfigError::LocalLocationUnsupported {
            location: "auto:ini:/Net/Endpoint:file:///cfg.ini".to_string(),
        };
        assert!(error.to_string().contains("does not support local locations"));
    }
}
