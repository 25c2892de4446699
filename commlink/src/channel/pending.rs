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

//! Tracking of requests awaiting responses.
//!
//! Every outstanding request owns one slot keyed by its message id. A
//! response that arrives before anyone waits for it is stashed so the later
//! registration still receives it.

use super::ChannelError;
use crate::message::CommMessage;
use futures_util::future::BoxFuture;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::oneshot;
use tracing::{debug, warn};

/// Default number of early responses kept before the oldest is discarded.
pub const DEFAULT_STASH_LIMIT: usize = 1024;

/// What happened to a response handed to [`PendingResponses::complete`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// A registered waiter received it.
    Delivered,
    /// Nobody waits yet; it was kept for a later registration.
    Stashed,
    /// The waiter had gone away; the response was discarded.
    Dropped,
}

#[derive(Default)]
struct Slots {
    /// Registered waiters by request id.
    waiting: HashMap<u64, oneshot::Sender<CommMessage>>,
    /// Responses that arrived before anyone waited for them.
    early: HashMap<u64, CommMessage>,
    /// Ids in `early`, oldest first, for eviction.
    early_order: VecDeque<u64>,
}

/// Map from message id to a not-yet-delivered response.
///
/// All operations take a short synchronous lock; none of them wait. At most
/// one slot exists per id.
///
/// # Examples
///
/// ```rust
/// use commlink::channel::PendingResponses;
/// use commlink::message::{CommMessage, Value};
/// use std::sync::Arc;
///
/// # async fn example() {
/// let pending = Arc::new(PendingResponses::new());
/// let request = CommMessage::request("op", Value::new());
///
/// let mut slot = pending.register(request.id()).unwrap();
/// pending.complete(CommMessage::response_for(&request, Value::from(1)));
///
/// let response = slot.wait().await.unwrap();
/// assert_eq!(response.id(), request.id());
/// # }
/// ```
pub struct PendingResponses {
    slots: Mutex<Slots>,
    stash_limit: usize,
}

impl PendingResponses {
    /// Creates an empty map that stashes up to [`DEFAULT_STASH_LIMIT`] early responses.
    #[must_use]
    pub fn new() -> Self {
        Self::with_stash_limit(DEFAULT_STASH_LIMIT)
    }

    /// Creates an empty map that stashes up to `stash_limit` early responses.
    ///
    /// A limit of zero is raised to one.
    #[must_use]
    pub fn with_stash_limit(stash_limit: usize) -> Self {
        Self {
            slots: Mutex::new(Slots::default()),
            stash_limit: stash_limit.max(1),
        }
    }

    /// Registers interest in the response to message `id`.
    ///
    /// A response stashed earlier is delivered to the new slot immediately.
    pub fn register(self: &Arc<Self>, id: u64) -> Result<PendingSlot, ChannelError> {
        let (tx, rx) = oneshot::channel();
        let mut slots = self.slots.lock();
        if slots.waiting.contains_key(&id) {
            return Err(ChannelError::DuplicateRequest { message_id: id });
        }
        match slots.early.remove(&id) {
            Some(response) => {
                slots.early_order.retain(|early| *early != id);
                let _ = tx.send(response);
            }
            None => {
                slots.waiting.insert(id, tx);
            }
        }
        Ok(PendingSlot {
            id,
            rx,
            owner: Arc::clone(self),
        })
    }

    /// Routes `response` to the slot registered for its id.
    pub fn complete(&self, response: CommMessage) -> Completion {
        let id = response.id();
        let mut slots = self.slots.lock();
        if let Some(tx) = slots.waiting.remove(&id) {
            return match tx.send(response) {
                Ok(()) => Completion::Delivered,
                Err(_) => {
                    debug!(message_id = id, "response arrived after its waiter left");
                    Completion::Dropped
                }
            };
        }

        if slots.early.len() >= self.stash_limit {
            if let Some(oldest) = slots.early_order.pop_front() {
                slots.early.remove(&oldest);
                warn!(message_id = oldest, "discarding unclaimed response");
            }
        }
        if slots.early.insert(id, response).is_none() {
            slots.early_order.push_back(id);
        }
        Completion::Stashed
    }

    /// Routes `response` to a registered waiter without stashing it.
    ///
    /// # Errors
    ///
    /// Gives the message back when no slot is registered for its id, so the
    /// caller can treat it as an inbound request instead.
    pub fn deliver(&self, response: CommMessage) -> Result<(), CommMessage> {
        let id = response.id();
        let Some(tx) = self.slots.lock().waiting.remove(&id) else {
            return Err(response);
        };
        if tx.send(response).is_err() {
            debug!(message_id = id, "response arrived after its waiter left");
        }
        Ok(())
    }

    /// Removes the slot for `id`. Returns true if one was registered.
    pub fn cancel(&self, id: u64) -> bool {
        self.slots.lock().waiting.remove(&id).is_some()
    }

    /// Drops every slot and stashed response. Waiters observe a cancellation.
    pub fn fail_all(&self) {
        let mut slots = self.slots.lock();
        let waiting = slots.waiting.len();
        slots.waiting.clear();
        slots.early.clear();
        slots.early_order.clear();
        if waiting > 0 {
            debug!(waiting, "cancelled pending responses");
        }
    }

    /// Number of registered slots.
    pub fn len(&self) -> usize {
        self.slots.lock().waiting.len()
    }

    /// Returns true when no slot is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of stashed early responses.
    pub fn stashed(&self) -> usize {
        self.slots.lock().early.len()
    }
}

impl Default for PendingResponses {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for PendingResponses {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slots = self.slots.lock();
        f.debug_struct("PendingResponses")
            .field("waiting", &slots.waiting.len())
            .field("stashed", &slots.early.len())
            .finish()
    }
}

/// A registered interest in one response. Dropping it removes the slot.
pub struct PendingSlot {
    id: u64,
    rx: oneshot::Receiver<CommMessage>,
    owner: Arc<PendingResponses>,
}

impl PendingSlot {
    /// The message id this slot waits for.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Returns the response if it has already been delivered.
    pub fn try_take(&mut self) -> Option<CommMessage> {
        self.rx.try_recv().ok()
    }

    /// Waits for the response. Cancel-safe.
    pub async fn wait(&mut self) -> Result<CommMessage, ChannelError> {
        (&mut self.rx)
            .await
            .map_err(|_| ChannelError::Cancelled {
                message_id: self.id,
            })
    }
}

impl Drop for PendingSlot {
    fn drop(&mut self) {
        self.owner.cancel(self.id);
    }
}

impl fmt::Debug for PendingSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingSlot").field("id", &self.id).finish()
    }
}

/// Future resolving to the response of one request.
///
/// The response slot is registered when the handle is created, so a
/// response arriving before the handle is first polled is not lost.
/// Dropping the handle abandons the wait and frees the slot.
#[must_use = "a response handle does nothing unless awaited"]
pub struct ResponseHandle<'a> {
    inner: BoxFuture<'a, Result<CommMessage, ChannelError>>,
}

impl<'a> ResponseHandle<'a> {
    /// Wraps the future a channel uses to produce the response.
    ///
    /// The future should already own its registered slot, so that nothing
    /// is lost between creating the handle and first polling it.
    pub fn new(
        future: impl Future<Output = Result<CommMessage, ChannelError>> + Send + 'a,
    ) -> Self {
        Self {
            inner: Box::pin(future),
        }
    }

    /// A handle that fails immediately.
    pub fn failed(error: ChannelError) -> Self {
        Self::new(async move { Err(error) })
    }
}

impl Future for ResponseHandle<'_> {
    type Output = Result<CommMessage, ChannelError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.inner.as_mut().poll(cx)
    }
}

impl fmt::Debug for ResponseHandle<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseHandle").finish_non_exhaustive()
    }
}
