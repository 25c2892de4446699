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

//! Publish/subscribe forwarding.
//!
//! A [`ForwardingChannel`] hands each outgoing message to an inner channel and
//! then holds the sender until the message is explicitly released through
//! [`ForwardingChannel::send_release`]. The release signal is local only; it
//! never reaches the wire.

use super::{ChannelError, ChannelState, CommChannel, ResponseHandle};
use crate::message::CommMessage;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{trace, warn};

/// Forwards sends to an inner channel and blocks each one until released.
///
/// Each channel keeps its own release map, so side channels created with
/// [`CommChannel::create_with_side_channel`] never cross-correlate.
///
/// # Examples
///
/// ```rust
/// use commlink::channel::{CommChannel, ForwardingChannel};
/// use std::sync::Arc;
///
/// # async fn example(inner: Arc<dyn CommChannel>, message: commlink::message::CommMessage) {
/// let channel = Arc::new(ForwardingChannel::new(inner));
/// let id = message.id();
/// let publisher = {
///     let channel = Arc::clone(&channel);
///     tokio::spawn(async move { channel.send(&message).await })
/// };
///
/// // Later, once the subscriber acknowledged the message:
/// channel.send_release(id);
/// publisher.await.unwrap().unwrap();
/// # }
/// ```
pub struct ForwardingChannel {
    state: ChannelState,
    inner: Arc<dyn CommChannel>,
    releases: Mutex<HashMap<u64, oneshot::Sender<()>>>,
}

/// One send's claim on its release entry.
///
/// Dropping it, whether the send failed or its caller gave up, removes the
/// entry unless a later send with the same id has replaced it.
struct AwaitingRelease<'a> {
    releases: &'a Mutex<HashMap<u64, oneshot::Sender<()>>>,
    id: u64,
    rx: oneshot::Receiver<()>,
}

impl Drop for AwaitingRelease<'_> {
    fn drop(&mut self) {
        self.rx.close();
        let mut releases = self.releases.lock();
        if releases.get(&self.id).is_some_and(|release| release.is_closed()) {
            releases.remove(&self.id);
        }
    }
}

impl ForwardingChannel {
    /// Forwards through `inner`, taking over its location.
    pub fn new(inner: Arc<dyn CommChannel>) -> Self {
        Self {
            state: ChannelState::new(inner.location().to_string()),
            inner,
            releases: Mutex::new(HashMap::new()),
        }
    }

    /// The channel messages are forwarded through.
    pub fn inner(&self) -> &Arc<dyn CommChannel> {
        &self.inner
    }

    /// Releases the sender blocked on message `id`.
    ///
    /// Returns false, after logging a warning, when no send waits for `id`.
    /// Unknown and repeated releases are peer ordering issues and never fail.
    pub fn send_release(&self, id: u64) -> bool {
        match self.releases.lock().remove(&id) {
            Some(release) => {
                // The sender may have been cancelled in the meantime.
                let _ = release.send(());
                true
            }
            None => {
                warn!(message_id = id, "release for unknown or already released message");
                false
            }
        }
    }

    /// Number of sends currently waiting for their release.
    pub fn awaiting_release(&self) -> usize {
        self.releases.lock().len()
    }
}

#[async_trait]
impl CommChannel for ForwardingChannel {
    fn state(&self) -> &ChannelState {
        &self.state
    }

    fn kind(&self) -> &'static str {
        "forwarding"
    }

    async fn send_impl(&self, message: &CommMessage) -> Result<(), ChannelError> {
        let id = message.id();
        let (tx, rx) = oneshot::channel();
        if self.releases.lock().insert(id, tx).is_some() {
            warn!(message_id = id, "message forwarded twice, replacing earlier release");
        }
        let mut awaiting = AwaitingRelease {
            releases: &self.releases,
            id,
            rx,
        };

        self.inner.send(message).await?;
        trace!(message_id = id, "forwarded, awaiting release");
        (&mut awaiting.rx)
            .await
            .map_err(|_| ChannelError::Cancelled { message_id: id })
    }

    /// Forwarding channels only carry outbound traffic.
    async fn recv_impl(&self) -> Result<CommMessage, ChannelError> {
        Err(ChannelError::Unsupported {
            operation: "recv",
            channel: self.kind(),
        })
    }

    fn recv_response_for<'a>(&'a self, request: &CommMessage) -> ResponseHandle<'a> {
        self.inner.recv_response_for(request)
    }

    async fn close_impl(&self) -> Result<(), ChannelError> {
        // Dropping the senders wakes every blocked send with a cancellation.
        self.releases.lock().clear();
        self.inner.close().await
    }

    async fn release_impl(&self) -> Result<(), ChannelError> {
        self.inner.release().await
    }

    /// A fresh forwarding channel over `other`, with its own release
    /// tracking.
    fn create_with_side_channel(
        &self,
        other: Arc<dyn CommChannel>,
    ) -> Result<Arc<dyn CommChannel>, ChannelError> {
        Ok(Arc::new(ForwardingChannel::new(other)))
    }
}
