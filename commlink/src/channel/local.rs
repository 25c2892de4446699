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

//! In-process loopback channels.
//!
//! A `local` location needs no transport at all. Each request sent on a
//! [`LocalChannel`] travels to the local listener inside a one-shot peer
//! channel; the response the handler writes to that peer is routed straight
//! into the sender's pending responses.

use super::{
    ChannelError, ChannelState, CommChannel, PendingResponses, PollableChannel, ResponseHandle,
};
use crate::error::CommError;
use crate::listener::LocalListener;
use crate::message::CommMessage;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use tracing::{debug, trace};

/// Location keyword of the in-process transport.
pub const LOCAL_LOCATION: &str = "local";

/// Client side of an in-process conversation. Keep-alive by default.
pub struct LocalChannel {
    state: ChannelState,
    listener: Arc<LocalListener>,
    pending: Arc<PendingResponses>,
}

impl LocalChannel {
    /// Creates a channel that delivers every request to `listener`.
    ///
    /// Requests never touch a socket: each one is wrapped in a one-shot peer
    /// channel and scheduled like an accepted connection, and the handler's
    /// response is routed back by message id.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use commlink::channel::{CommChannel, InputPort, LocalChannel};
    /// use commlink::listener::{LocalListener, MessageHandler, TaskScheduler};
    /// use commlink::message::{CommMessage, Value};
    /// use std::sync::Arc;
    ///
    /// # async fn example(handler: Arc<dyn MessageHandler>) -> Result<(), Box<dyn std::error::Error>> {
    /// let port = Arc::new(InputPort::new("self", "local", "sodep"));
    /// let listener = LocalListener::new(port, Arc::new(TaskScheduler::new(handler)));
    /// let channel = LocalChannel::new(listener);
    ///
    /// let request = CommMessage::request("status", Value::new());
    /// let response = channel.request(&request).await?;
    /// assert_eq!(response.id(), request.id());
    /// # Ok(())
    /// # }
    /// ```
    pub fn new(listener: Arc<LocalListener>) -> Self {
        Self {
            state: ChannelState::new(LOCAL_LOCATION).with_to_be_closed(false),
            listener,
            pending: Arc::new(PendingResponses::new()),
        }
    }
}

#[async_trait]
impl CommChannel for LocalChannel {
    fn state(&self) -> &ChannelState {
        &self.state
    }

    fn kind(&self) -> &'static str {
        "local"
    }

    /// Hands `message` to the listener inside a fresh peer channel.
    async fn send_impl(&self, message: &CommMessage) -> Result<(), ChannelError> {
        trace!(message_id = message.id(), operation = message.operation(), "local send");
        let peer = Arc::new(LocalPeerChannel::new(
            message.clone(),
            Arc::downgrade(&self.pending),
        ));
        self.listener.deliver(peer)
    }

    /// Nothing arrives unasked on a local channel; only responses do.
    async fn recv_impl(&self) -> Result<CommMessage, ChannelError> {
        Err(ChannelError::Unsupported {
            operation: "recv",
            channel: self.kind(),
        })
    }

    fn recv_response_for<'a>(&'a self, request: &CommMessage) -> ResponseHandle<'a> {
        if !self.is_open() {
            return ResponseHandle::failed(self.closed_error());
        }
        match self.pending.register(request.id()) {
            Ok(mut slot) => ResponseHandle::new(async move { slot.wait().await }),
            Err(error) => ResponseHandle::failed(error),
        }
    }

    async fn close_impl(&self) -> Result<(), ChannelError> {
        self.pending.fail_all();
        Ok(())
    }

    /// A new channel to the same listener, with its own pending responses.
    async fn create_duplicate(&self) -> Result<Arc<dyn CommChannel>, CommError> {
        Ok(Arc::new(LocalChannel::new(self.listener.clone())))
    }
}

/// Server side of one in-process request.
///
/// Yields its single request once, then reports end of stream. Whatever is
/// sent on it completes the originating channel's pending response.
pub struct LocalPeerChannel {
    state: ChannelState,
    /// The request, until it is received.
    request: Mutex<Option<CommMessage>>,
    /// Pending responses of the client channel, if it still exists.
    origin: Weak<PendingResponses>,
}

impl LocalPeerChannel {
    /// A peer holding `request`, answering into `origin`.
    fn new(request: CommMessage, origin: Weak<PendingResponses>) -> Self {
        Self {
            state: ChannelState::new(LOCAL_LOCATION),
            request: Mutex::new(Some(request)),
            origin,
        }
    }
}

#[async_trait]
impl CommChannel for LocalPeerChannel {
    fn state(&self) -> &ChannelState {
        &self.state
    }

    fn kind(&self) -> &'static str {
        "local peer"
    }

    /// Completes the client's waiter. A response nobody waits for is
    /// dropped without error.
    async fn send_impl(&self, message: &CommMessage) -> Result<(), ChannelError> {
        match self.origin.upgrade() {
            Some(pending) => {
                let outcome = pending.complete(message.clone());
                trace!(message_id = message.id(), ?outcome, "local response");
            }
            None => debug!(message_id = message.id(), "local origin gone, dropping response"),
        }
        Ok(())
    }

    async fn recv_impl(&self) -> Result<CommMessage, ChannelError> {
        self.request
            .lock()
            .take()
            .ok_or_else(|| self.closed_error())
    }

    fn recv_response_for<'a>(&'a self, _request: &CommMessage) -> ResponseHandle<'a> {
        ResponseHandle::failed(ChannelError::Unsupported {
            operation: "recv_response_for",
            channel: self.kind(),
        })
    }

    async fn close_impl(&self) -> Result<(), ChannelError> {
        self.request.lock().take();
        Ok(())
    }

    fn as_pollable(&self) -> Option<&dyn PollableChannel> {
        Some(self)
    }
}

impl PollableChannel for LocalPeerChannel {
    fn is_ready(&self) -> Result<bool, ChannelError> {
        Ok(self.request.lock().is_some())
    }
}
