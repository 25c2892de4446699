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

//! Channels over chunk bridges.
//!
//! A bridge moves opaque byte chunks between two parties through bounded
//! queues, for example across a remote-procedure bridge or an embedded
//! script host. Nothing blocks on a socket: inbound data is discovered by
//! polling [`PollableChannel::is_ready`], which buffers at most one chunk.
//!
//! The codec's pipeline stages run on every chunk. Decoding then uses the
//! codec that remains once the stages are applied, reading from an in-memory
//! buffer and waiting for more chunks while a message is still incomplete.

use super::{
    ChannelError, ChannelState, CommChannel, PendingResponses, PollableChannel, ResponseHandle,
};
use crate::error::{CommError, ConfigError};
use crate::message::CommMessage;
use crate::protocol::{BufferDuplex, Pipeline, Protocol};
use async_trait::async_trait;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TryRecvError};
use tokio::sync::{watch, Mutex};
use tracing::{debug, trace, warn};

/// Default number of chunks a bridge queue holds before senders wait.
pub const DEFAULT_BRIDGE_DEPTH: usize = 64;

/// Upper bound on waiting for the queue locks during a close.
const CLOSE_GRACE: Duration = Duration::from_secs(2);

/// Sending half. `tx` is dropped on close.
struct Outbound {
    tx: Option<mpsc::Sender<Vec<u8>>>,
    pipeline: Pipeline,
}

/// Receiving half, held by whoever is reading.
struct Inbound {
    rx: mpsc::Receiver<Vec<u8>>,
    /// Chunk taken off the queue by a readiness poll.
    lookahead: Option<Vec<u8>>,
    pipeline: Pipeline,
    /// Bytes produced by the pipeline that the codec has not consumed yet.
    undecoded: Vec<u8>,
}

/// A pollable channel exchanging chunks through a pair of queues.
///
/// # Examples
///
/// ```rust,no_run
/// use commlink::channel::{BridgeChannel, CommChannel};
/// use commlink::message::{CommMessage, Value};
/// use commlink::protocol::{ProtocolParams, SodepProtocol};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let (client, server) = BridgeChannel::pair(
///     Box::new(SodepProtocol::new(ProtocolParams::empty())),
///     Box::new(SodepProtocol::new(ProtocolParams::empty())),
///     16,
///     "bridge:demo",
/// )?;
/// client.send(&CommMessage::request("ping", Value::from(1))).await?;
/// let request = server.recv().await?;
/// assert_eq!(request.operation(), "ping");
/// # Ok(())
/// # }
/// ```
pub struct BridgeChannel {
    state: ChannelState,
    protocol: Box<dyn Protocol>,
    outbound: Mutex<Outbound>,
    inbound: Mutex<Inbound>,
    pending: Arc<PendingResponses>,
    closing: watch::Sender<bool>,
}

impl BridgeChannel {
    /// Binds `protocol` to an existing pair of chunk queues.
    ///
    /// Codecs that are not thread safe keep per-connection session state
    /// that cannot be replayed from buffered chunks, and are rejected.
    pub fn new(
        protocol: Box<dyn Protocol>,
        tx: mpsc::Sender<Vec<u8>>,
        rx: mpsc::Receiver<Vec<u8>>,
        location: impl Into<String>,
    ) -> Result<Self, CommError> {
        if !protocol.is_thread_safe() {
            return Err(ConfigError::UnsupportedProtocol {
                name: protocol.name(),
            }
            .into());
        }
        let mut outbound_pipeline = Pipeline::new();
        protocol.setup_pipeline(&mut outbound_pipeline);
        let mut inbound_pipeline = Pipeline::new();
        protocol.setup_pipeline(&mut inbound_pipeline);
        debug!(
            protocol = %protocol.name(),
            stages = ?inbound_pipeline.stage_names(),
            "bridge pipeline ready"
        );

        let state = ChannelState::new(location).with_to_be_closed(!protocol.keep_alive());
        let (closing, _) = watch::channel(false);
        Ok(Self {
            state,
            protocol,
            outbound: Mutex::new(Outbound {
                tx: Some(tx),
                pipeline: outbound_pipeline,
            }),
            inbound: Mutex::new(Inbound {
                rx,
                lookahead: None,
                pipeline: inbound_pipeline,
                undecoded: Vec::new(),
            }),
            pending: Arc::new(PendingResponses::new()),
            closing,
        })
    }

    /// Creates two bridge channels wired to each other.
    pub fn pair(
        first: Box<dyn Protocol>,
        second: Box<dyn Protocol>,
        depth: usize,
        location: &str,
    ) -> Result<(Self, Self), CommError> {
        let (a_tx, b_rx) = mpsc::channel(depth.max(1));
        let (b_tx, a_rx) = mpsc::channel(depth.max(1));
        Ok((
            Self::new(first, a_tx, a_rx, location)?,
            Self::new(second, b_tx, b_rx, location)?,
        ))
    }

    /// The codec that decodes pipeline output.
    fn codec(&self) -> &dyn Protocol {
        self.protocol
            .pipeline_codec()
            .unwrap_or(self.protocol.as_ref())
    }

    /// Resolves once [`close`](CommChannel::close) has started.
    async fn until_closed(&self) {
        let mut closing = self.closing.subscribe();
        let _ = closing.wait_for(|closing| *closing).await;
    }

    /// Decodes one message from the undecoded bytes, if a whole one is there.
    ///
    /// A [`BufferDuplex`] never returns `Pending`, so the decode finishes in
    /// the poll that starts it and the taken bytes are always put back.
    async fn try_decode(&self, inbound: &mut Inbound) -> Result<Option<CommMessage>, ChannelError> {
        if inbound.undecoded.is_empty() {
            return Ok(None);
        }
        let mut buffer = BufferDuplex::new(std::mem::take(&mut inbound.undecoded));
        let decoded = self.codec().recv(&mut buffer).await;
        let consumed = buffer.consumed();
        inbound.undecoded = buffer.into_input();
        match decoded {
            Ok(message) => {
                inbound.undecoded.drain(..consumed);
                Ok(Some(message))
            }
            Err(error) if error.is_incomplete() => Ok(None),
            Err(error) => Err(error.into()),
        }
    }

    /// Decodes the next message, pulling chunks through the pipeline until
    /// one is complete. A closed queue reads as end of stream.
    async fn read_message(&self, inbound: &mut Inbound) -> Result<CommMessage, ChannelError> {
        loop {
            if let Some(message) = self.try_decode(inbound).await? {
                return Ok(message);
            }
            let chunk = match inbound.lookahead.take() {
                Some(chunk) => chunk,
                None => match inbound.rx.recv().await {
                    Some(chunk) => chunk,
                    None => return Err(io::Error::from(io::ErrorKind::UnexpectedEof).into()),
                },
            };
            trace!(size = chunk.len(), "bridge chunk");
            for unit in inbound.pipeline.inbound(chunk).await? {
                inbound.undecoded.extend_from_slice(&unit);
            }
        }
    }
}

#[async_trait]
impl CommChannel for BridgeChannel {
    fn state(&self) -> &ChannelState {
        &self.state
    }

    fn kind(&self) -> &'static str {
        "bridge"
    }

    async fn send_impl(&self, message: &CommMessage) -> Result<(), ChannelError> {
        let mut buffer = BufferDuplex::default();
        self.codec().send(&mut buffer, message).await?;
        let unit = buffer.take_output();

        tokio::select! {
            _ = self.until_closed() => Err(self.closed_error()),
            result = async {
                let mut outbound = self.outbound.lock().await;
                let chunk = outbound.pipeline.outbound(unit).await?;
                match &outbound.tx {
                    Some(tx) => tx.send(chunk).await.map_err(|_| self.closed_error()),
                    None => Err(self.closed_error()),
                }
            } => result,
        }
    }

    async fn recv_impl(&self) -> Result<CommMessage, ChannelError> {
        tokio::select! {
            _ = self.until_closed() => Err(self.closed_error()),
            result = async {
                let mut inbound = self.inbound.lock().await;
                self.read_message(&mut inbound).await
            } => result,
        }
    }

    // The waiter that finds no reader active reads the side until its own
    // response shows up, routing the others through `pending`.
    fn recv_response_for<'a>(&'a self, request: &CommMessage) -> ResponseHandle<'a> {
        if !self.is_open() {
            return ResponseHandle::failed(self.closed_error());
        }
        let mut slot = match self.pending.register(request.id()) {
            Ok(slot) => slot,
            Err(error) => return ResponseHandle::failed(error),
        };

        ResponseHandle::new(async move {
            loop {
                if let Some(response) = slot.try_take() {
                    return Ok(response);
                }
                // The read races the slot and the close signal, so whoever
                // wins leaves no reader holding the inbound lock.
                let read = tokio::select! {
                    biased;
                    response = slot.wait() => return response,
                    _ = self.until_closed() => return Err(self.closed_error()),
                    read = async {
                        let mut inbound = self.inbound.lock().await;
                        self.read_message(&mut inbound).await
                    } => read,
                };
                let message = match read {
                    Ok(message) => message,
                    Err(error) => {
                        self.state.set_to_be_closed(true);
                        return Err(error);
                    }
                };

                if message.id() == slot.id() {
                    return Ok(message);
                }
                let id = message.id();
                let outcome = self.pending.complete(message);
                debug!(message_id = id, ?outcome, "routed bridge response");
            }
        })
    }

    async fn close_impl(&self) -> Result<(), ChannelError> {
        // Readers and senders race this signal and release their locks.
        self.closing.send_replace(true);
        self.pending.fail_all();

        let release = async {
            // Dropping the sender ends the peer's inbound stream.
            self.outbound.lock().await.tx = None;
            self.inbound.lock().await.rx.close();
        };
        if tokio::time::timeout(CLOSE_GRACE, release).await.is_err() {
            warn!(location = %self.state.location(), "bridge close timed out");
        }
        Ok(())
    }

    fn as_pollable(&self) -> Option<&dyn PollableChannel> {
        Some(self)
    }
}

impl PollableChannel for BridgeChannel {
    fn is_ready(&self) -> Result<bool, ChannelError> {
        if !self.is_open() {
            return Err(self.closed_error());
        }
        // Someone is already receiving.
        let Ok(mut inbound) = self.inbound.try_lock() else {
            return Ok(false);
        };
        if inbound.lookahead.is_some() || !inbound.undecoded.is_empty() {
            return Ok(true);
        }
        match inbound.rx.try_recv() {
            Ok(chunk) => {
                inbound.lookahead = Some(chunk);
                Ok(true)
            }
            Err(TryRecvError::Empty) => Ok(false),
            // A receive reports the end of stream.
            Err(TryRecvError::Disconnected) => Ok(true),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Value;
    use crate::protocol::{CompressedProtocol, ProtocolParams, SodepProtocol, TlsProtocol};
    use crate::protocol::tls::EngineMode;

    fn sodep() -> Box<dyn Protocol> {
        Box::new(SodepProtocol::new(ProtocolParams::empty()))
    }

    fn sodepz() -> Box<dyn Protocol> {
        Box::new(CompressedProtocol::new(sodep()))
    }

    #[tokio::test]
    async fn test_request_response_over_bridge() {
        let (client, server) = BridgeChannel::pair(sodep(), sodep(), 4, "bridge").unwrap();
        let request = CommMessage::request("echo", Value::from("hi"));

        let server = tokio::spawn(async move {
            let request = server.recv().await.unwrap();
            let response = CommMessage::response_for(&request, request.value().clone());
            server.send(&response).await.unwrap();
            server
        });
        let response = client.request(&request).await.unwrap();
        assert_eq!(response.id(), request.id());
        assert_eq!(response.value().str_value(), "hi");
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_compressed_pipeline_over_bridge() {
        let (client, server) = BridgeChannel::pair(sodepz(), sodepz(), 4, "bridge").unwrap();
        let payload = "x".repeat(10_000);
        client
            .send(&CommMessage::request("big", Value::from(payload.as_str())))
            .await
            .unwrap();
        let received = server.recv().await.unwrap();
        assert_eq!(received.value().str_value(), payload);
    }

    #[tokio::test]
    async fn test_message_split_across_chunks() {
        let (tx, rx) = mpsc::channel(8);
        let (peer_tx, _peer_rx) = mpsc::channel(8);
        let channel = BridgeChannel::new(sodep(), peer_tx, rx, "bridge").unwrap();

        let message = CommMessage::request("op", Value::from(7));
        let bytes = SodepProtocol::new(ProtocolParams::empty())
            .encode(&message)
            .unwrap();
        let (head, tail) = bytes.split_at(bytes.len() / 2);
        tx.send(head.to_vec()).await.unwrap();

        let pollable = channel.as_pollable().unwrap();
        assert!(pollable.is_ready().unwrap());
        // Polling again buffers nothing more.
        assert!(pollable.is_ready().unwrap());

        tx.send(tail.to_vec()).await.unwrap();
        let received = channel.recv().await.unwrap();
        assert_eq!(received.id(), message.id());
        assert!(!pollable.is_ready().unwrap());
    }

    #[tokio::test]
    async fn test_is_ready_without_data() {
        let (client, _server) = BridgeChannel::pair(sodep(), sodep(), 4, "bridge").unwrap();
        assert!(!client.as_pollable().unwrap().is_ready().unwrap());
    }

    #[tokio::test]
    async fn test_peer_close_ends_stream() {
        let (client, server) = BridgeChannel::pair(sodep(), sodep(), 4, "bridge").unwrap();
        client.close().await.unwrap();
        client.close().await.unwrap();
        assert!(server.as_pollable().unwrap().is_ready().unwrap());
        assert!(server.recv().await.unwrap_err().is_end_of_stream());
        assert!(client.as_pollable().unwrap().is_ready().unwrap_err().is_closed());
    }

    #[tokio::test]
    async fn test_close_with_blocked_response_waiter() {
        let (client, _server) = BridgeChannel::pair(sodep(), sodep(), 4, "bridge").unwrap();
        let client = Arc::new(client);
        let waiter = {
            let client = Arc::clone(&client);
            tokio::spawn(async move {
                let request = CommMessage::request("op", Value::new());
                client.recv_response_for(&request).await
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        tokio::time::timeout(Duration::from_secs(1), client.close())
            .await
            .expect("close blocked by a waiting reader")
            .unwrap();
        client.close().await.unwrap();
        assert!(waiter.await.unwrap().is_err());
    }

    #[tokio::test]
    async fn test_message_spread_over_many_chunks() {
        let (tx, rx) = mpsc::channel(256);
        let (peer_tx, _peer_rx) = mpsc::channel(1);
        let channel = BridgeChannel::new(sodep(), peer_tx, rx, "bridge").unwrap();

        let message = CommMessage::request("op", Value::from("y".repeat(4096)));
        let bytes = SodepProtocol::new(ProtocolParams::empty())
            .encode(&message)
            .unwrap();
        for chunk in bytes.chunks(64) {
            tx.send(chunk.to_vec()).await.unwrap();
        }
        let received = channel.recv().await.unwrap();
        assert_eq!(received.id(), message.id());
        assert_eq!(received.value().str_value().len(), 4096);
    }

    #[tokio::test]
    async fn test_rejects_session_codecs() {
        let (tx, rx) = mpsc::channel(1);
        let tls = Box::new(TlsProtocol::new(sodep(), EngineMode::Client, None));
        let error = BridgeChannel::new(tls, tx, rx, "bridge").err().unwrap();
        assert!(error.is_configuration_error());
    }
}
