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

//! Codec error types.
//!
//! Everything a codec can fail with: raw I/O, malformed input, oversized
//! frames, serializer failures and TLS negotiation. At channel boundaries a
//! [`ProtocolError`] converts into a plain `std::io::Error`.

use crate::error::ConfigError;
use std::io;
use thiserror::Error;

/// Errors raised while encoding or decoding messages.
///
/// # Examples
///
/// ```rust
/// use commlink::protocol::ProtocolError;
/// use std::io;
///
/// let eof = ProtocolError::from(io::Error::from(io::ErrorKind::UnexpectedEof));
/// assert!(eof.is_incomplete());
///
/// let oversized = ProtocolError::FrameTooLarge { size: 10, max: 4 };
/// assert_eq!(io::Error::from(oversized).kind(), io::ErrorKind::InvalidData);
/// ```
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The stream failed, or ended before a message was complete.
    #[error("I/O error: {0}")]
    Io(#[source] io::Error),

    /// The bytes do not form a valid message.
    #[error("malformed {protocol} data: {reason}")]
    Malformed {
        /// Codec that rejected the input.
        protocol: &'static str,
        /// What was wrong with it.
        reason: String,
    },

    /// A frame or field is longer than the configured limit.
    #[error("frame size {size} exceeds maximum allowed size {max}")]
    FrameTooLarge {
        /// Length found or requested.
        size: usize,
        /// Largest length allowed.
        max: usize,
    },

    /// A serializer could not encode a message.
    #[error("{format} encoding failed: {source}")]
    Encode {
        /// Name of the serializer.
        format: &'static str,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A serializer could not decode a frame.
    #[error("{format} decoding failed: {source}")]
    Decode {
        /// Name of the serializer.
        format: &'static str,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The TLS session could not be established or broke down.
    #[error("TLS handshake failed: {reason}")]
    Handshake { reason: String },

    /// rustls rejected a record or certificate.
    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    /// The codec's settings are unusable.
    #[error(transparent)]
    Configuration(#[from] ConfigError),
}

impl ProtocolError {
    /// Shorthand for [`ProtocolError::Malformed`].
    pub(crate) fn malformed(protocol: &'static str, reason: impl Into<String>) -> Self {
        Self::Malformed {
            protocol,
            reason: reason.into(),
        }
    }

    /// Returns true when decoding stopped because the input ended early.
    ///
    /// Event-driven transports use this to wait for more bytes instead of
    /// failing.
    pub fn is_incomplete(&self) -> bool {
        matches!(self, Self::Io(e) if e.kind() == io::ErrorKind::UnexpectedEof)
    }

    /// Returns true when the underlying stream is already gone.
    pub fn is_already_gone(&self) -> bool {
        matches!(self, Self::Io(e) if crate::transport::is_gone_kind(e.kind()))
    }

    /// Kind used when this error has to travel as an `io::Error`.
    fn io_kind(&self) -> io::ErrorKind {
        match self {
            Self::Io(e) => e.kind(),
            Self::Configuration(_) => io::ErrorKind::InvalidInput,
            _ => io::ErrorKind::InvalidData,
        }
    }
}

impl From<io::Error> for ProtocolError {
    fn from(error: io::Error) -> Self {
        // Errors raised inside adapter streams travel as io::Error; unwrap them.
        if error
            .get_ref()
            .is_some_and(|inner| inner.is::<ProtocolError>())
        {
            let kind = error.kind();
            return match error.into_inner().map(|inner| inner.downcast::<ProtocolError>()) {
                Some(Ok(protocol)) => *protocol,
                Some(Err(other)) => ProtocolError::Io(io::Error::new(kind, other)),
                None => ProtocolError::Io(io::Error::from(kind)),
            };
        }
        ProtocolError::Io(error)
    }
}

impl From<ProtocolError> for io::Error {
    fn from(error: ProtocolError) -> Self {
        match error {
            ProtocolError::Io(e) => e,
            other => io::Error::new(other.io_kind(), other),
        }
    }
}
