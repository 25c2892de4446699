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

//! The buffer-oriented crypto engine abstraction.
//!
//! An engine never touches the network. Callers feed it ciphertext with
//! [`CryptoEngine::unwrap`], take ciphertext out of it with
//! [`CryptoEngine::wrap`], and drive the handshake by following
//! [`CryptoEngine::handshake_status`].

use crate::protocol::ProtocolError;

/// Outcome of one `wrap` or `unwrap` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineStatus {
    Ok,
    /// The destination buffer was too small. Grow it and retry.
    BufferOverflow,
    /// More input bytes are required before anything can be produced.
    BufferUnderflow,
    /// The engine has been closed by either side.
    Closed,
}

/// What the engine needs next to make handshake progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeStatus {
    NeedWrap,
    NeedUnwrap,
    NeedTask,
    NotHandshaking,
    Finished,
}

impl HandshakeStatus {
    /// True once application data may flow.
    pub fn is_done(self) -> bool {
        matches!(self, Self::NotHandshaking | Self::Finished)
    }
}

/// Outcome of one `wrap` or `unwrap` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineResult {
    /// What the caller should do next.
    pub status: EngineStatus,
    /// Bytes taken from the source buffer.
    pub consumed: usize,
    /// Bytes written into the destination buffer.
    pub produced: usize,
}

impl EngineResult {
    /// Bundles a status with the byte counts of the call.
    pub fn new(status: EngineStatus, consumed: usize, produced: usize) -> Self {
        Self {
            status,
            consumed,
            produced,
        }
    }
}

/// Blocking work the engine wants run before it can continue.
pub type DelegatedTask = Box<dyn FnOnce() + Send>;

/// A TLS state machine operating on in-memory buffers.
pub trait CryptoEngine: Send {
    /// Starts the handshake. Called once before the first `wrap`.
    ///
    /// # Errors
    ///
    /// Fails when the engine cannot start, for example after it was closed.
    fn begin_handshake(&mut self) -> Result<(), ProtocolError>;

    /// What the engine needs next to make handshake progress.
    fn handshake_status(&self) -> HandshakeStatus;

    /// Takes the next pending task, if the status is `NeedTask`.
    fn delegated_task(&mut self) -> Option<DelegatedTask>;

    /// Encrypts `src` into `dst`. An empty `src` produces handshake or close
    /// records only.
    fn wrap(&mut self, src: &[u8], dst: &mut [u8]) -> Result<EngineResult, ProtocolError>;

    /// Decrypts ciphertext from `src` into `dst`.
    fn unwrap(&mut self, src: &[u8], dst: &mut [u8]) -> Result<EngineResult, ProtocolError>;

    /// Largest plaintext unit one record can carry.
    fn application_buffer_size(&self) -> usize;

    /// Largest ciphertext record the engine emits or accepts.
    fn packet_buffer_size(&self) -> usize;

    /// Queues a close notification. The next `wrap` emits it.
    fn close_outbound(&mut self);

    /// True once the peer's close notification was processed.
    fn is_inbound_done(&self) -> bool;
}

/// Which side of the handshake an engine plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineMode {
    Client,
    Server,
}

/// Builds engines for a TLS codec.
pub trait EngineFactory: Send + Sync {
    /// Creates an engine. `server_name` is the peer host for client mode.
    fn create_engine(
        &self,
        mode: EngineMode,
        server_name: &str,
    ) -> Result<Box<dyn CryptoEngine>, ProtocolError>;
}
