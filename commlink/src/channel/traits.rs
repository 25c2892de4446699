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

//! The channel contract.
//!
//! [`CommChannel`] splits every operation into a provided method holding
//! the shared lifecycle rules and an `_impl` hook holding the transport
//! specific work. Implementations never check whether they are closed
//! themselves; the provided methods do that before calling the hook.

use super::{ChannelError, ChannelState, ResponseHandle};
use crate::error::CommError;
use crate::message::CommMessage;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// A duplex conversational endpoint bound to one transport and one codec.
///
/// Implementations supply the `*_impl` hooks; the provided methods add the
/// lifecycle rules every channel shares:
///
/// - `send`/`recv` fail with [`ChannelError::Closed`] once closed, and any
///   failure marks the channel to be closed on release
/// - `close` runs `close_impl` once; later calls succeed without effect, and
///   a resource that is already gone counts as closed
/// - `release` closes a to-be-closed channel and otherwise leaves the
///   transport open for reuse
///
/// # Examples
///
/// ```rust,no_run
/// use commlink::channel::CommChannel;
/// use commlink::message::{CommMessage, Value};
///
/// # async fn example(channel: &dyn CommChannel) -> Result<(), commlink::channel::ChannelError> {
/// let request = CommMessage::request("ping", Value::new());
/// let response = channel.request(&request).await?;
/// assert_eq!(response.id(), request.id());
/// channel.release().await?;
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait CommChannel: Send + Sync {
    /// Lifecycle flags, location and parent port.
    fn state(&self) -> &ChannelState;

    /// Short name of the channel kind, used in errors and logs.
    fn kind(&self) -> &'static str;

    /// Writes one message. Only called while the channel is open.
    async fn send_impl(&self, message: &CommMessage) -> Result<(), ChannelError>;

    /// Reads the next message no response waiter claimed. Only called while
    /// the channel is open.
    async fn recv_impl(&self) -> Result<CommMessage, ChannelError>;

    /// Releases the transport. Called at most once. Must wake every task
    /// blocked in a send, receive or response wait on this channel.
    async fn close_impl(&self) -> Result<(), ChannelError>;

    /// Returns a handle resolving to the response for `request`.
    ///
    /// The response slot is registered before this returns. Dropping the
    /// handle abandons the wait without disturbing other requests.
    fn recv_response_for<'a>(&'a self, request: &CommMessage) -> ResponseHandle<'a>;

    /// Hands a keep-alive channel back for reuse.
    async fn release_impl(&self) -> Result<(), ChannelError> {
        Ok(())
    }

    /// Opens a new channel with the same configuration and its own transport.
    async fn create_duplicate(&self) -> Result<Arc<dyn CommChannel>, CommError> {
        Err(ChannelError::Unsupported {
            operation: "create_duplicate",
            channel: self.kind(),
        }
        .into())
    }

    /// Creates a channel with this one's configuration bound to `other`.
    fn create_with_side_channel(
        &self,
        _other: Arc<dyn CommChannel>,
    ) -> Result<Arc<dyn CommChannel>, ChannelError> {
        Err(ChannelError::Unsupported {
            operation: "create_with_side_channel",
            channel: self.kind(),
        })
    }

    /// The polling view of this channel, if it supports polling.
    fn as_pollable(&self) -> Option<&dyn PollableChannel> {
        None
    }

    /// The location this channel was opened for.
    fn location(&self) -> &str {
        self.state().location()
    }

    /// False once [`close`](Self::close) was called.
    fn is_open(&self) -> bool {
        self.state().is_open()
    }

    /// The error reported by operations on a closed channel.
    fn closed_error(&self) -> ChannelError {
        ChannelError::Closed {
            location: self.location().to_string(),
        }
    }

    /// Sends `message`.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::Closed`] on a closed channel and passes on
    /// codec and transport failures, which also mark the channel to be
    /// closed on release.
    async fn send(&self, message: &CommMessage) -> Result<(), ChannelError> {
        if !self.is_open() {
            return Err(self.closed_error());
        }
        self.send_impl(message).await.inspect_err(|_| {
            self.state().set_to_be_closed(true);
        })
    }

    /// Receives the next message that is not a response someone waits for.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::Closed`] on a closed channel, an end-of-stream
    /// error once the peer hung up, and passes on codec and transport
    /// failures. Any failure marks the channel to be closed on release.
    async fn recv(&self) -> Result<CommMessage, ChannelError> {
        if !self.is_open() {
            return Err(self.closed_error());
        }
        self.recv_impl().await.inspect_err(|_| {
            self.state().set_to_be_closed(true);
        })
    }

    /// Sends `request` and waits for its response.
    ///
    /// # Errors
    ///
    /// Fails like [`send`](Self::send), with [`ChannelError::DuplicateRequest`]
    /// when a response to the same id is already awaited, and with
    /// [`ChannelError::Closed`] when the channel closes during the wait.
    async fn request(&self, request: &CommMessage) -> Result<CommMessage, ChannelError> {
        let response = self.recv_response_for(request);
        self.send(request).await?;
        response.await
    }

    /// Closes the channel. Idempotent.
    ///
    /// # Errors
    ///
    /// Passes on a failure of the underlying close, except when the
    /// resource was already gone.
    async fn close(&self) -> Result<(), ChannelError> {
        if !self.state().mark_closed() {
            return Ok(());
        }
        match self.close_impl().await {
            Err(error) if error.is_already_gone() => {
                debug!(location = %self.location(), %error, "channel resource already gone");
                Ok(())
            }
            other => other,
        }
    }

    /// Ends a conversation: closes a to-be-closed channel, or keeps a
    /// keep-alive channel open for the next one.
    ///
    /// # Errors
    ///
    /// Fails like [`close`](Self::close) when the channel is closed.
    async fn release(&self) -> Result<(), ChannelError> {
        if self.state().to_be_closed() {
            self.close().await
        } else {
            self.release_impl().await
        }
    }
}

/// A channel whose inbound readiness is checked without blocking.
pub trait PollableChannel: CommChannel {
    /// True when a `recv` would find data.
    ///
    /// Calling this repeatedly has no effect beyond buffering at most one
    /// unit of inbound data.
    fn is_ready(&self) -> Result<bool, ChannelError>;
}

/// Opens new channels to a fixed destination.
///
/// Channels that support [`CommChannel::create_duplicate`] hold one of these.
#[async_trait]
pub trait ChannelOpener: Send + Sync {
    /// Opens a fresh channel.
    ///
    /// # Errors
    ///
    /// Fails like the original open: unresolvable location, unknown scheme
    /// or codec, or a transport that cannot connect.
    async fn open(&self) -> Result<Arc<dyn CommChannel>, CommError>;
}
