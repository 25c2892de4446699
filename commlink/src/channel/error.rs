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

//! Error types for the channel layer.
//!
//! [`ChannelError`] wraps transport and codec failures and adds the
//! failures that only exist at channel level: closed channels, cancelled
//! waits, duplicate request ids. It converts into `std::io::Error` so that
//! adapter streams can carry it through `AsyncRead` and `AsyncWrite`.

use crate::protocol::ProtocolError;
use crate::transport::TransportError;
use std::error::Error;
use std::fmt;
use std::io;

/// Errors that can occur in the channel layer.
///
/// # Examples
///
/// ```rust
/// use commlink::channel::ChannelError;
/// use commlink::transport::TransportError;
///
/// let closed = ChannelError::Closed { location: "socket://localhost:9000".into() };
/// assert!(closed.is_closed());
/// assert!(closed.is_already_gone());
///
/// let broken = ChannelError::from(TransportError::Closed);
/// assert!(broken.is_already_gone());
/// assert!(!broken.is_closed());
/// ```
#[derive(Debug)]
pub enum ChannelError {
    /// The channel is closed and cannot send or receive messages.
    ///
    /// Channels close monotonically; once this is returned the channel never
    /// becomes usable again.
    Closed {
        /// Location the channel was bound to.
        location: String,
    },

    /// The channel kind does not implement the requested operation.
    Unsupported {
        /// The operation that was attempted.
        operation: &'static str,
        /// The kind of channel it was attempted on.
        channel: &'static str,
    },

    /// A wait for a response ended before the response arrived.
    Cancelled {
        /// Id of the request whose response was awaited.
        message_id: u64,
    },

    /// A response slot for this id is already registered.
    DuplicateRequest {
        /// The duplicated message id.
        message_id: u64,
    },

    /// A channel was offered to the poll scheduler but cannot be polled.
    NotPollable,

    /// The underlying transport failed.
    Transport(TransportError),

    /// The codec failed to encode or decode a message.
    Protocol(ProtocolError),

    /// An internal error occurred.
    Internal {
        /// A description of the internal error.
        message: String,
    },
}

impl ChannelError {
    /// Returns true if this error indicates the channel is closed.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        matches!(self, Self::Closed { .. })
    }

    /// Returns true if the resource behind the channel is already gone.
    ///
    /// Closing a channel whose peer already hung up is not a failure.
    #[must_use]
    pub fn is_already_gone(&self) -> bool {
        match self {
            Self::Closed { .. } => true,
            Self::Transport(e) => e.is_already_gone(),
            Self::Protocol(e) => e.is_already_gone(),
            _ => false,
        }
    }

    /// Returns true if the peer ended the stream cleanly between messages.
    #[must_use]
    pub fn is_end_of_stream(&self) -> bool {
        match self {
            Self::Protocol(e) => e.is_incomplete(),
            Self::Transport(TransportError::Io { source }) => {
                source.kind() == io::ErrorKind::UnexpectedEof
            }
            _ => false,
        }
    }
}

impl fmt::Display for ChannelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed { location } => {
                write!(f, "channel to {} is closed", location)
            }
            Self::Unsupported { operation, channel } => {
                write!(f, "{} is not supported by {} channels", operation, channel)
            }
            Self::Cancelled { message_id } => {
                write!(f, "wait for response to message {} was cancelled", message_id)
            }
            Self::DuplicateRequest { message_id } => {
                write!(f, "a response to message {} is already awaited", message_id)
            }
            Self::NotPollable => {
                write!(f, "channel does not support polling")
            }
            Self::Transport(e) => {
                write!(f, "transport failure: {}", e)
            }
            Self::Protocol(e) => {
                write!(f, "protocol failure: {}", e)
            }
            Self::Internal { message } => {
                write!(f, "internal channel error: {}", message)
            }
        }
    }
}

impl Error for ChannelError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Transport(e) => Some(e),
            Self::Protocol(e) => Some(e),
            _ => None,
        }
    }
}

impl From<TransportError> for ChannelError {
    fn from(error: TransportError) -> Self {
        Self::Transport(error)
    }
}

impl From<ProtocolError> for ChannelError {
    fn from(error: ProtocolError) -> Self {
        Self::Protocol(error)
    }
}

impl From<io::Error> for ChannelError {
    fn from(error: io::Error) -> Self {
        Self::Protocol(ProtocolError::from(error))
    }
}

impl From<ChannelError> for io::Error {
    fn from(error: ChannelError) -> Self {
        match error {
            ChannelError::Protocol(e) => e.into(),
            ChannelError::Transport(TransportError::Io { source }) => source,
            closed @ ChannelError::Closed { .. } => io::Error::new(io::ErrorKind::NotConnected, closed),
            other => io::Error::other(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let closed = ChannelError::Closed {
            location: "socket://localhost:9000".to_string(),
        };
        assert_eq!(closed.to_string(), "channel to socket://localhost:9000 is closed");

        let unsupported = ChannelError::Unsupported {
            operation: "recv",
            channel: "forwarding",
        };
        assert_eq!(unsupported.to_string(), "recv is not supported by forwarding channels");
    }

    #[test]
    fn test_already_gone() {
        let reset = ChannelError::from(io::Error::new(io::ErrorKind::ConnectionReset, "reset"));
        assert!(reset.is_already_gone());
        assert!(ChannelError::Closed { location: "local".into() }.is_already_gone());
        assert!(!ChannelError::NotPollable.is_already_gone());
    }

    #[test]
    fn test_end_of_stream() {
        let eof = ChannelError::from(io::Error::new(io::ErrorKind::UnexpectedEof, "eof"));
        assert!(eof.is_end_of_stream());
        assert!(!ChannelError::Cancelled { message_id: 1 }.is_end_of_stream());
    }

    #[test]
    fn test_into_io_error() {
        let error: io::Error = ChannelError::Closed { location: "x".into() }.into();
        assert_eq!(error.kind(), io::ErrorKind::NotConnected);
    }
}
