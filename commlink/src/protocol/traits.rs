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

//! Codec trait definitions.

use super::{Pipeline, ProtocolError, ProtocolParams};
use crate::message::CommMessage;
use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};

/// A bidirectional byte stream a codec reads from and writes to.
///
/// Wrapping codecs hand their inner codec an adapter implementing this
/// trait, so the inner codec never learns whether it talks to the transport
/// directly.
pub trait Duplex: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: ?Sized + AsyncRead + AsyncWrite + Send + Unpin> Duplex for T {}

/// Converts between [`CommMessage`]s and bytes on a [`Duplex`] stream.
///
/// One codec instance is bound to one channel. Codecs that keep per-stream
/// state (a TLS session, for example) report `false` from
/// [`Protocol::is_thread_safe`] and the channel serializes every send and
/// receive through a single lock.
#[async_trait]
pub trait Protocol: Send + Sync {
    /// Codec name. Wrappers append a marker to the inner codec's name.
    fn name(&self) -> String;

    /// Whether `send` and `recv` may run concurrently on one instance.
    fn is_thread_safe(&self) -> bool;

    /// The parameters the codec was created with. Wrappers return their
    /// inner codec's.
    fn params(&self) -> &ProtocolParams;

    /// Writes `message` to `stream` and flushes it.
    ///
    /// # Errors
    ///
    /// Fails when the message cannot be encoded within the codec's limits
    /// or the stream fails.
    async fn send(&self, stream: &mut dyn Duplex, message: &CommMessage)
        -> Result<(), ProtocolError>;

    /// Reads exactly one message from `stream`.
    ///
    /// # Errors
    ///
    /// Fails with an error for which [`ProtocolError::is_incomplete`] holds
    /// when the stream ends early, and with other errors for malformed or
    /// oversized input.
    async fn recv(&self, stream: &mut dyn Duplex) -> Result<CommMessage, ProtocolError>;

    /// Declares the byte-level stages event-driven transports must apply
    /// before this codec sees the bytes.
    fn setup_pipeline(&self, _pipeline: &mut Pipeline) {}

    /// The codec that decodes the output of [`Protocol::setup_pipeline`].
    ///
    /// `None` means this codec itself. Wrappers whose work is done entirely
    /// by pipeline stages return their inner codec.
    fn pipeline_codec(&self) -> Option<&dyn Protocol> {
        None
    }

    /// Whether the channel stays open after a request completes.
    fn keep_alive(&self) -> bool {
        self.params().bool("keepAlive", true)
    }

    /// Signals end of stream to the peer, where the wire format has a way to.
    async fn close(&self, _stream: &mut dyn Duplex) -> Result<(), ProtocolError> {
        Ok(())
    }
}
