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

//! Events that end or move observations.
//!
//! The set of events is closed. Handlers declare what they handle by
//! implementing the matching capability trait and registering with an
//! [`EventDispatcher`], which matches on the event variant.

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::trace;

/// Token naming one observation with a remote endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Token(Vec<u8>);

impl Token {
    /// Wraps the raw token bytes.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// The raw token bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

impl From<&[u8]> for Token {
    fn from(bytes: &[u8]) -> Self {
        Self::new(bytes)
    }
}

/// Something that happened to an observation.
///
/// # Examples
///
/// ```rust
/// use commlink::observation::{ObservationEvent, Token};
///
/// let event = ObservationEvent::TokenReleased {
///     remote: "127.0.0.1:5683".parse().unwrap(),
///     token: Token::new(vec![0x0a, 0x0b]),
/// };
/// assert_eq!(event.kind(), "token released");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObservationEvent {
    /// The token is free for reuse; anything keyed by it is stale.
    TokenReleased { remote: SocketAddr, token: Token },
    /// The remote endpoint now talks from a different address.
    RemoteSocketChanged {
        previous: SocketAddr,
        current: SocketAddr,
    },
    /// The observation was cancelled by either side.
    ObservationCancelled { remote: SocketAddr, token: Token },
}

impl ObservationEvent {
    /// Short name of the event kind, used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::TokenReleased { .. } => "token released",
            Self::RemoteSocketChanged { .. } => "remote socket changed",
            Self::ObservationCancelled { .. } => "observation cancelled",
        }
    }
}

/// Handles [`ObservationEvent::TokenReleased`].
pub trait TokenReleaseHandler: Send + Sync {
    /// `token` may be reused with `remote`.
    fn on_token_released(&self, remote: SocketAddr, token: &Token);
}

/// Handles [`ObservationEvent::RemoteSocketChanged`].
pub trait RemoteSocketChangeHandler: Send + Sync {
    /// The endpoint known as `previous` is now reached at `current`.
    fn on_remote_socket_changed(&self, previous: SocketAddr, current: SocketAddr);
}

/// Handles [`ObservationEvent::ObservationCancelled`].
pub trait ObservationCancelHandler: Send + Sync {
    /// The observation `(remote, token)` ended.
    fn on_observation_cancelled(&self, remote: SocketAddr, token: &Token);
}

/// Routes each event to the handlers registered for its kind.
#[derive(Default, Clone)]
pub struct EventDispatcher {
    token_released: Vec<Arc<dyn TokenReleaseHandler>>,
    socket_changed: Vec<Arc<dyn RemoteSocketChangeHandler>>,
    cancelled: Vec<Arc<dyn ObservationCancelHandler>>,
}

impl EventDispatcher {
    /// Creates a dispatcher with no handlers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler for released tokens.
    pub fn on_token_released(&mut self, handler: Arc<dyn TokenReleaseHandler>) -> &mut Self {
        self.token_released.push(handler);
        self
    }

    /// Registers a handler for remote address changes.
    pub fn on_remote_socket_changed(
        &mut self,
        handler: Arc<dyn RemoteSocketChangeHandler>,
    ) -> &mut Self {
        self.socket_changed.push(handler);
        self
    }

    /// Registers a handler for cancelled observations.
    pub fn on_observation_cancelled(
        &mut self,
        handler: Arc<dyn ObservationCancelHandler>,
    ) -> &mut Self {
        self.cancelled.push(handler);
        self
    }

    /// Delivers `event`. Returns how many handlers saw it.
    pub fn dispatch(&self, event: &ObservationEvent) -> usize {
        let delivered = match event {
            ObservationEvent::TokenReleased { remote, token } => {
                for handler in &self.token_released {
                    handler.on_token_released(*remote, token);
                }
                self.token_released.len()
            }
            ObservationEvent::RemoteSocketChanged { previous, current } => {
                for handler in &self.socket_changed {
                    handler.on_remote_socket_changed(*previous, *current);
                }
                self.socket_changed.len()
            }
            ObservationEvent::ObservationCancelled { remote, token } => {
                for handler in &self.cancelled {
                    handler.on_observation_cancelled(*remote, token);
                }
                self.cancelled.len()
            }
        };
        trace!(kind = event.kind(), delivered, "dispatched observation event");
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Log(Mutex<Vec<String>>);

    impl TokenReleaseHandler for Log {
        fn on_token_released(&self, _remote: SocketAddr, token: &Token) {
            self.0.lock().push(format!("released {token}"));
        }
    }

    impl ObservationCancelHandler for Log {
        fn on_observation_cancelled(&self, _remote: SocketAddr, token: &Token) {
            self.0.lock().push(format!("cancelled {token}"));
        }
    }

    #[test]
    fn test_dispatch_by_variant() {
        let log = Arc::new(Log::default());
        let mut dispatcher = EventDispatcher::new();
        dispatcher
            .on_token_released(log.clone())
            .on_observation_cancelled(log.clone());
        let remote: SocketAddr = "127.0.0.1:5683".parse().unwrap();

        let released = ObservationEvent::TokenReleased {
            remote,
            token: Token::new(vec![0xab, 0x01]),
        };
        assert_eq!(dispatcher.dispatch(&released), 1);
        let moved = ObservationEvent::RemoteSocketChanged {
            previous: remote,
            current: "127.0.0.1:5684".parse().unwrap(),
        };
        assert_eq!(dispatcher.dispatch(&moved), 0);
        let cancelled = ObservationEvent::ObservationCancelled {
            remote,
            token: Token::new(vec![0x02]),
        };
        assert_eq!(dispatcher.dispatch(&cancelled), 1);

        assert_eq!(*log.0.lock(), vec!["released ab01", "cancelled 02"]);
    }
}
