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

//! Channels over byte-stream transports.
//!
//! A [`StreamingChannel`] splits its transport into halves guarded by
//! separate locks. Writes happen on the caller's task. Reads happen on a
//! short-lived task owned by the channel, so that a caller that stops
//! waiting never leaves half a message behind on the stream.

use super::{
    ChannelError, ChannelOpener, ChannelState, CommChannel, PendingResponses, ResponseHandle,
    DEFAULT_STASH_LIMIT,
};
use crate::error::CommError;
use crate::message::CommMessage;
use crate::protocol::Protocol;
use crate::transport::{Transport, TransportError, TransportMetadata};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, ReadBuf, ReadHalf, WriteHalf};
use tokio::sync::{watch, Mutex, MutexGuard};
use tracing::{debug, trace, warn};

/// Upper bound on the graceful part of a close.
const CLOSE_GRACE: Duration = Duration::from_secs(2);

/// Messages kept for [`CommChannel::recv`] before the oldest is discarded.
const INBOUND_LIMIT: usize = DEFAULT_STASH_LIMIT;

/// Outcome of the reads performed so far.
#[derive(Default)]
struct Reads {
    /// A read task is running.
    in_flight: bool,
    /// Messages no response waiter claimed, in arrival order.
    inbound: VecDeque<CommMessage>,
    /// The error that broke the stream, until one reader reports it.
    failure: Option<ChannelError>,
    /// Set by the first failed read; no read is started afterwards.
    broken: bool,
}

/// Stream state shared between a channel and its read task.
struct StreamIo<T> {
    protocol: Box<dyn Protocol>,
    reader: Mutex<ReadHalf<T>>,
    writer: Mutex<WriteHalf<T>>,
    /// Serializes every operation for codecs that are not thread safe.
    exclusive: Option<Mutex<()>>,
    /// Waiters for responses, by request id.
    pending: Arc<PendingResponses>,
    /// Flips to true once, when the channel starts closing or is dropped.
    closing: watch::Sender<bool>,
    reads: parking_lot::Mutex<Reads>,
    /// Bumped each time a read finishes.
    finished: watch::Sender<u64>,
}

impl<T: Transport> StreamIo<T> {
    /// Acquires the stream halves an operation needs.
    ///
    /// Locks are always taken in the order exclusive, reader, writer.
    async fn lock_io(&self, read: bool, write: bool) -> ChannelDuplex<'_, T> {
        let exclusive = match &self.exclusive {
            Some(lock) => Some(lock.lock().await),
            None => None,
        };
        let both = exclusive.is_some();
        let reader = if read || both {
            Some(self.reader.lock().await)
        } else {
            None
        };
        let writer = if write || both {
            Some(self.writer.lock().await)
        } else {
            None
        };
        ChannelDuplex {
            _exclusive: exclusive,
            reader,
            writer,
        }
    }

    /// Resolves once the channel starts closing.
    async fn until_closed(&self) {
        let mut closing = self.closing.subscribe();
        let _ = closing.wait_for(|closing| *closing).await;
    }

    /// Starts a read task unless one is running.
    ///
    /// The task owns the partially read message, so a waiter that gives up
    /// mid-frame leaves the stream in sync for everyone else.
    fn start_read(self: &Arc<Self>) {
        if *self.closing.borrow() {
            return;
        }
        {
            let mut reads = self.reads.lock();
            if reads.in_flight || reads.broken {
                return;
            }
            reads.in_flight = true;
        }
        tokio::spawn(Arc::clone(self).read_one());
    }

    /// Reads one message and routes it to its waiter or the inbound queue.
    /// A failure is recorded for the next reader to report.
    async fn read_one(self: Arc<Self>) {
        let outcome = tokio::select! {
            _ = self.until_closed() => None,
            result = async {
                let mut io = self.lock_io(true, false).await;
                self.protocol.recv(&mut io).await
            } => Some(result),
        };

        {
            let mut reads = self.reads.lock();
            reads.in_flight = false;
            match outcome {
                None => {}
                Some(Ok(message)) => {
                    trace!(message_id = message.id(), "read message");
                    if let Err(message) = self.pending.deliver(message) {
                        if reads.inbound.len() >= INBOUND_LIMIT {
                            if let Some(oldest) = reads.inbound.pop_front() {
                                warn!(message_id = oldest.id(), "discarding unclaimed message");
                            }
                        }
                        reads.inbound.push_back(message);
                    }
                }
                Some(Err(error)) => {
                    reads.broken = true;
                    reads.failure = Some(error.into());
                }
            }
        }
        self.finished.send_modify(|count| *count = count.wrapping_add(1));
    }

    /// The oldest message no waiter claimed.
    fn next_inbound(&self) -> Option<CommMessage> {
        self.reads.lock().inbound.pop_front()
    }

    /// The error that broke the stream. Only the first caller sees the
    /// original error; later ones see the transport as closed.
    fn take_failure(&self) -> Option<ChannelError> {
        let mut reads = self.reads.lock();
        match reads.failure.take() {
            Some(error) => Some(error),
            None => reads
                .broken
                .then_some(ChannelError::Transport(TransportError::Closed)),
        }
    }
}

/// A channel speaking one codec over one [`Transport`].
///
/// Thread-safe codecs get independent read and write locks, so a response
/// can be written while another task waits for the next request. Codecs
/// that are not thread safe run every operation under one exclusive lock.
///
/// Reads run on a task spawned on demand, one message at a time. A message
/// whose id has a registered waiter goes to that waiter; anything else is
/// queued for [`CommChannel::recv`]. Dropping the channel stops the task.
///
/// # Examples
///
/// ```rust
/// use commlink::channel::{CommChannel, StreamingChannel};
/// use commlink::message::{CommMessage, Value};
/// use commlink::protocol::{ProtocolParams, SodepProtocol};
/// use commlink::transport::MemoryTransport;
///
/// # async fn example() {
/// let (a, b) = MemoryTransport::pair_default();
/// let codec = || Box::new(SodepProtocol::new(ProtocolParams::empty()));
/// let client = StreamingChannel::new(a, codec(), "memory:client");
/// let server = StreamingChannel::new(b, codec(), "memory:server");
///
/// let request = CommMessage::request("ping", Value::new());
/// let response = client.recv_response_for(&request);
/// client.send(&request).await.unwrap();
///
/// let received = server.recv().await.unwrap();
/// server.send(&CommMessage::response_for(&received, Value::from("pong"))).await.unwrap();
/// assert_eq!(response.await.unwrap().value().str_value(), "pong");
/// # }
/// ```
pub struct StreamingChannel<T: Transport> {
    state: ChannelState,
    metadata: TransportMetadata,
    io: Arc<StreamIo<T>>,
    opener: Option<Arc<dyn ChannelOpener>>,
}

impl<T: Transport> StreamingChannel<T> {
    /// Binds `protocol` to `transport`.
    ///
    /// The channel is marked to be closed after use unless the codec asks
    /// for keep-alive.
    pub fn new(transport: T, protocol: Box<dyn Protocol>, location: impl Into<String>) -> Self {
        let metadata = transport.metadata().clone();
        debug!(
            transport = %metadata.id,
            scheme = metadata.scheme,
            peer = %metadata.peer_addr,
            codec = %protocol.name(),
            "streaming channel created"
        );
        let (reader, writer) = tokio::io::split(transport);
        let exclusive = (!protocol.is_thread_safe()).then(|| Mutex::new(()));
        let state = ChannelState::new(location).with_to_be_closed(!protocol.keep_alive());
        let (closing, _) = watch::channel(false);
        let (finished, _) = watch::channel(0);
        Self {
            state,
            metadata,
            io: Arc::new(StreamIo {
                protocol,
                reader: Mutex::new(reader),
                writer: Mutex::new(writer),
                exclusive,
                pending: Arc::new(PendingResponses::new()),
                closing,
                reads: parking_lot::Mutex::new(Reads::default()),
                finished,
            }),
            opener: None,
        }
    }

    /// Lets [`CommChannel::create_duplicate`] open fresh connections.
    #[must_use]
    pub fn with_opener(mut self, opener: Arc<dyn ChannelOpener>) -> Self {
        self.opener = Some(opener);
        self
    }

    /// The codec this channel speaks.
    pub fn protocol(&self) -> &dyn Protocol {
        self.io.protocol.as_ref()
    }

    /// Identity and addresses of the underlying transport.
    pub fn metadata(&self) -> &TransportMetadata {
        &self.metadata
    }
}

impl<T: Transport> Drop for StreamingChannel<T> {
    fn drop(&mut self) {
        self.io.closing.send_replace(true);
    }
}

#[async_trait]
impl<T: Transport> CommChannel for StreamingChannel<T> {
    fn state(&self) -> &ChannelState {
        &self.state
    }

    fn kind(&self) -> &'static str {
        "streaming"
    }

    async fn send_impl(&self, message: &CommMessage) -> Result<(), ChannelError> {
        trace!(message_id = message.id(), operation = message.operation(), "sending");
        tokio::select! {
            _ = self.io.until_closed() => Err(self.closed_error()),
            result = async {
                let mut io = self.io.lock_io(false, true).await;
                self.io.protocol.send(&mut io, message).await
            } => Ok(result?),
        }
    }

    async fn recv_impl(&self) -> Result<CommMessage, ChannelError> {
        let mut finished = self.io.finished.subscribe();
        loop {
            if let Some(message) = self.io.next_inbound() {
                return Ok(message);
            }
            if let Some(error) = self.io.take_failure() {
                return Err(error);
            }
            self.io.start_read();
            tokio::select! {
                _ = self.io.until_closed() => return Err(self.closed_error()),
                _ = finished.changed() => {}
            }
        }
    }

    // Responses are routed by the read task, so waiting never touches the
    // stream itself.
    fn recv_response_for<'a>(&'a self, request: &CommMessage) -> ResponseHandle<'a> {
        if !self.is_open() {
            return ResponseHandle::failed(self.closed_error());
        }
        let mut slot = match self.io.pending.register(request.id()) {
            Ok(slot) => slot,
            Err(error) => return ResponseHandle::failed(error),
        };

        ResponseHandle::new(async move {
            let mut finished = self.io.finished.subscribe();
            loop {
                if let Some(response) = slot.try_take() {
                    return Ok(response);
                }
                if let Some(error) = self.io.take_failure() {
                    self.state.set_to_be_closed(true);
                    return Err(error);
                }
                self.io.start_read();
                tokio::select! {
                    biased;
                    response = slot.wait() => return response,
                    _ = self.io.until_closed() => return Err(self.closed_error()),
                    _ = finished.changed() => {}
                }
            }
        })
    }

    /// Wakes every reader and waiter, then lets the codec say goodbye and
    /// shuts the write half down, within [`CLOSE_GRACE`].
    async fn close_impl(&self) -> Result<(), ChannelError> {
        self.io.closing.send_replace(true);
        self.io.pending.fail_all();

        let graceful = async {
            let mut io = self.io.lock_io(false, true).await;
            if let Err(error) = self.io.protocol.close(&mut io).await {
                debug!(%error, "codec close failed");
            }
            match io.writer.as_mut() {
                Some(writer) => writer.shutdown().await,
                None => Ok(()),
            }
        };
        match tokio::time::timeout(CLOSE_GRACE, graceful).await {
            Ok(result) => Ok(result?),
            Err(_) => {
                warn!(location = %self.state.location(), "channel close timed out");
                Ok(())
            }
        }
    }

    async fn create_duplicate(&self) -> Result<Arc<dyn CommChannel>, CommError> {
        match &self.opener {
            Some(opener) => opener.open().await,
            None => Err(ChannelError::Unsupported {
                operation: "create_duplicate",
                channel: self.kind(),
            }
            .into()),
        }
    }
}

/// The locked stream halves handed to a codec.
///
/// A half that was not locked fails every call on it.
struct ChannelDuplex<'g, T> {
    _exclusive: Option<MutexGuard<'g, ()>>,
    reader: Option<MutexGuard<'g, ReadHalf<T>>>,
    writer: Option<MutexGuard<'g, WriteHalf<T>>>,
}

/// Error for I/O on a half the current guard does not own.
fn half_not_held(half: &str) -> io::Error {
    io::Error::other(format!("channel {half} half is not held by this operation"))
}

impl<T: AsyncRead> AsyncRead for ChannelDuplex<'_, T> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.reader.as_mut() {
            Some(reader) => Pin::new(&mut **reader).poll_read(cx, buf),
            None => Poll::Ready(Err(half_not_held("read"))),
        }
    }
}

impl<T: AsyncWrite> AsyncWrite for ChannelDuplex<'_, T> {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.writer.as_mut() {
            Some(writer) => Pin::new(&mut **writer).poll_write(cx, buf),
            None => Poll::Ready(Err(half_not_held("write"))),
        }
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.writer.as_mut() {
            Some(writer) => Pin::new(&mut **writer).poll_flush(cx),
            None => Poll::Ready(Err(half_not_held("write"))),
        }
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.writer.as_mut() {
            Some(writer) => Pin::new(&mut **writer).poll_shutdown(cx),
            None => Poll::Ready(Err(half_not_held("write"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Value;
    use crate::protocol::{ProtocolParams, SodepProtocol};
    use crate::transport::MemoryTransport;

    fn sodep() -> Box<dyn Protocol> {
        Box::new(SodepProtocol::new(ProtocolParams::empty()))
    }

    fn pair() -> (
        Arc<StreamingChannel<MemoryTransport>>,
        Arc<StreamingChannel<MemoryTransport>>,
    ) {
        let (a, b) = MemoryTransport::pair_default();
        (
            Arc::new(StreamingChannel::new(a, sodep(), "memory:client")),
            Arc::new(StreamingChannel::new(b, sodep(), "memory:server")),
        )
    }

    #[tokio::test]
    async fn test_request_response() {
        let (client, server) = pair();
        let responder = tokio::spawn(async move {
            let request = server.recv().await.unwrap();
            server
                .send(&CommMessage::response_for(&request, Value::from("pong")))
                .await
                .unwrap();
        });

        let request = CommMessage::request("ping", Value::new());
        let response = client.request(&request).await.unwrap();
        assert_eq!(response.id(), request.id());
        assert_eq!(response.value().str_value(), "pong");
        responder.await.unwrap();
    }

    #[tokio::test]
    async fn test_out_of_order_responses_reach_their_waiters() {
        let (client, server) = pair();
        let first = CommMessage::request("a", Value::from(1));
        let second = CommMessage::request("b", Value::from(2));

        let wait_first = client.recv_response_for(&first);
        let wait_second = client.recv_response_for(&second);
        client.send(&first).await.unwrap();
        client.send(&second).await.unwrap();

        let a = server.recv().await.unwrap();
        let b = server.recv().await.unwrap();
        server.send(&CommMessage::response_for(&b, Value::from("second"))).await.unwrap();
        server.send(&CommMessage::response_for(&a, Value::from("first"))).await.unwrap();

        let (r1, r2) = tokio::join!(wait_first, wait_second);
        assert_eq!(r1.unwrap().value().str_value(), "first");
        assert_eq!(r2.unwrap().value().str_value(), "second");
    }

    #[tokio::test]
    async fn test_abandoned_wait_frees_slot() {
        let (client, _server) = pair();
        let request = CommMessage::request("op", Value::new());
        let handle = client.recv_response_for(&request);
        assert_eq!(client.io.pending.len(), 1);
        drop(handle);
        assert!(client.io.pending.is_empty());
    }

    #[tokio::test]
    async fn test_wait_abandoned_mid_frame_keeps_stream_in_sync() {
        let (transport, mut peer) = MemoryTransport::pair_default();
        let client = StreamingChannel::new(transport, sodep(), "memory:client");
        let first = CommMessage::request("a", Value::from(1));
        let second = CommMessage::request("b", Value::from(2));

        let codec = SodepProtocol::new(ProtocolParams::empty());
        let first_reply = codec
            .encode(&CommMessage::response_for(&first, Value::from("x".repeat(1000))))
            .unwrap();
        let second_reply = codec
            .encode(&CommMessage::response_for(&second, Value::from("second")))
            .unwrap();
        let (head, tail) = first_reply.split_at(first_reply.len() / 2);

        let wait_second = client.recv_response_for(&second);
        peer.write_all(head).await.unwrap();
        let abandoned =
            tokio::time::timeout(Duration::from_millis(50), client.recv_response_for(&first)).await;
        assert!(abandoned.is_err());

        peer.write_all(tail).await.unwrap();
        peer.write_all(&second_reply).await.unwrap();
        let response = wait_second.await.unwrap();
        assert_eq!(response.id(), second.id());
        assert_eq!(response.value().str_value(), "second");

        // Nobody waits for the late reply any more, so it is queued for recv.
        assert_eq!(client.recv().await.unwrap().id(), first.id());
    }

    #[tokio::test]
    async fn test_close_wakes_response_waiter() {
        let (client, _server) = pair();
        let waiter = {
            let client = client.clone();
            tokio::spawn(async move {
                let request = CommMessage::request("op", Value::new());
                client.recv_response_for(&request).await
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        client.close().await.unwrap();
        let result = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter still blocked after close")
            .unwrap();
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_read_failure_reaches_waiter() {
        let (client, server) = pair();
        let request = CommMessage::request("op", Value::new());
        let handle = client.recv_response_for(&request);
        server.close().await.unwrap();

        assert!(handle.await.unwrap_err().is_end_of_stream());
        assert!(client.state().to_be_closed());
        assert!(client.recv().await.is_err());
    }

    #[tokio::test]
    async fn test_close_is_idempotent_and_unblocks_readers() {
        let (client, _server) = pair();
        let reader = {
            let client = client.clone();
            tokio::spawn(async move { client.recv().await })
        };
        tokio::task::yield_now().await;

        client.close().await.unwrap();
        client.close().await.unwrap();
        assert!(!client.is_open());
        assert!(reader.await.unwrap().is_err());

        let error = client.send(&CommMessage::request("op", Value::new())).await.unwrap_err();
        assert!(error.is_closed());
    }

    #[tokio::test]
    async fn test_peer_close_surfaces_end_of_stream() {
        let (client, server) = pair();
        client.close().await.unwrap();
        let error = server.recv().await.unwrap_err();
        assert!(error.is_end_of_stream());
        assert!(server.state().to_be_closed());
        server.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_release_keeps_keep_alive_channel_open() {
        let (client, _server) = pair();
        assert!(!client.state().to_be_closed());
        client.release().await.unwrap();
        assert!(client.is_open());

        client.state().set_to_be_closed(true);
        client.release().await.unwrap();
        assert!(!client.is_open());
    }

    #[tokio::test]
    async fn test_duplicate_without_opener_is_unsupported() {
        let (client, _server) = pair();
        let error = match client.create_duplicate().await {
            Err(error) => error,
            Ok(_) => panic!("duplicate should not be supported"),
        };
        assert!(error.is_channel_error());
    }
}
