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

//! [`CryptoEngine`] backed by a `rustls` connection.
//!
//! rustls already works on caller-supplied buffers, so the engine mostly
//! translates its `read_tls`/`write_tls` calls into the status codes of
//! [`EngineStatus`]. The handshake never needs delegated work.

use super::engine::{
    CryptoEngine, DelegatedTask, EngineFactory, EngineMode, EngineResult, EngineStatus,
    HandshakeStatus,
};
use super::settings::TlsSettings;
use crate::error::ConfigError;
use crate::protocol::{ProtocolError, ProtocolParams};
use parking_lot::Mutex;
use rustls::crypto::{ring, CryptoProvider};
use rustls::pki_types::ServerName;
use rustls::{ClientConfig, ClientConnection, Connection, ServerConfig, ServerConnection};
use std::io::{Read, Write};
use std::sync::Arc;
use tracing::debug;

/// Largest plaintext fragment of one TLS record.
pub const APPLICATION_BUFFER_SIZE: usize = 16 * 1024;

/// Largest TLS record including header, padding and tag.
pub const PACKET_BUFFER_SIZE: usize = APPLICATION_BUFFER_SIZE + 2048;

/// A rustls connection driven through in-memory buffers.
///
/// Ciphertext rustls produces is staged in `outgoing` until `wrap` gets a
/// destination large enough for it; what does not fit is reported as
/// [`EngineStatus::BufferOverflow`] and handed out on the next call.
pub struct RustlsEngine {
    conn: Connection,
    outgoing: Vec<u8>,
    outbound_closed: bool,
    inbound_done: bool,
}

impl RustlsEngine {
    /// Drives `conn`, a client or server connection not yet handshaking.
    pub fn new(conn: impl Into<Connection>) -> Self {
        let mut conn = conn.into();
        // Plaintext written before the handshake ends is queued, never refused.
        conn.set_buffer_limit(None);
        Self {
            conn,
            outgoing: Vec::new(),
            outbound_closed: false,
            inbound_done: false,
        }
    }

    /// Processes buffered records. On failure the alert for the peer is
    /// still queued so the next `wrap` can send it.
    fn process(&mut self) -> Result<rustls::IoState, ProtocolError> {
        match self.conn.process_new_packets() {
            Ok(state) => Ok(state),
            Err(error) => {
                // Queue the alert describing the failure for the peer.
                let _ = self.conn.write_tls(&mut self.outgoing);
                Err(error.into())
            }
        }
    }

    /// Snapshot used to tell whether an `unwrap` advanced the handshake.
    fn progress_marker(&self) -> (bool, bool) {
        (self.conn.is_handshaking(), self.conn.wants_write())
    }
}

impl CryptoEngine for RustlsEngine {
    fn begin_handshake(&mut self) -> Result<(), ProtocolError> {
        // Clients queue their hello on construction; servers wait for it.
        Ok(())
    }

    fn handshake_status(&self) -> HandshakeStatus {
        if self.conn.wants_write() || !self.outgoing.is_empty() {
            HandshakeStatus::NeedWrap
        } else if self.conn.is_handshaking() {
            HandshakeStatus::NeedUnwrap
        } else {
            HandshakeStatus::NotHandshaking
        }
    }

    fn delegated_task(&mut self) -> Option<DelegatedTask> {
        None
    }

    fn wrap(&mut self, src: &[u8], dst: &mut [u8]) -> Result<EngineResult, ProtocolError> {
        if !src.is_empty() {
            if self.outbound_closed {
                return Ok(EngineResult::new(EngineStatus::Closed, 0, 0));
            }
            self.conn.writer().write_all(src)?;
        }
        while self.conn.wants_write() {
            self.conn.write_tls(&mut self.outgoing)?;
        }

        let produced = self.outgoing.len().min(dst.len());
        dst[..produced].copy_from_slice(&self.outgoing[..produced]);
        self.outgoing.drain(..produced);

        let status = if !self.outgoing.is_empty() {
            EngineStatus::BufferOverflow
        } else if self.outbound_closed {
            EngineStatus::Closed
        } else {
            EngineStatus::Ok
        };
        Ok(EngineResult::new(status, src.len(), produced))
    }

    fn unwrap(&mut self, src: &[u8], dst: &mut [u8]) -> Result<EngineResult, ProtocolError> {
        let before = self.progress_marker();
        let mut consumed = 0;
        while consumed < src.len() {
            let mut remaining = &src[consumed..];
            match self.conn.read_tls(&mut remaining) {
                Ok(0) => break,
                Ok(n) => {
                    consumed += n;
                    self.process()?;
                }
                // rustls refuses input while its plaintext buffer is full.
                Err(_) if consumed > 0 => break,
                Err(error) => {
                    if self.process()?.plaintext_bytes_to_read() == 0 {
                        return Err(error.into());
                    }
                    break;
                }
            }
        }

        let state = self.process()?;
        let pending = state.plaintext_bytes_to_read();
        if pending > 0 {
            if dst.is_empty() {
                return Ok(EngineResult::new(EngineStatus::BufferOverflow, consumed, 0));
            }
            let produced = self.conn.reader().read(dst)?;
            let status = if produced < pending {
                EngineStatus::BufferOverflow
            } else {
                EngineStatus::Ok
            };
            return Ok(EngineResult::new(status, consumed, produced));
        }

        if state.peer_has_closed() {
            self.inbound_done = true;
            return Ok(EngineResult::new(EngineStatus::Closed, consumed, 0));
        }

        let status = if self.progress_marker() != before {
            EngineStatus::Ok
        } else {
            EngineStatus::BufferUnderflow
        };
        Ok(EngineResult::new(status, consumed, 0))
    }

    fn application_buffer_size(&self) -> usize {
        APPLICATION_BUFFER_SIZE
    }

    fn packet_buffer_size(&self) -> usize {
        PACKET_BUFFER_SIZE
    }

    fn close_outbound(&mut self) {
        if !self.outbound_closed {
            self.conn.send_close_notify();
            self.outbound_closed = true;
        }
    }

    fn is_inbound_done(&self) -> bool {
        self.inbound_done
    }
}

/// Builds [`RustlsEngine`]s from [`TlsSettings`], on the `ring` provider.
///
/// # Examples
///
/// ```rust,no_run
/// use commlink::message::Value;
/// use commlink::protocol::tls::{EngineFactory, EngineMode, RustlsEngineFactory};
/// use commlink::protocol::ProtocolParams;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let params = ProtocolParams::new(Value::new().with_child(
///     "ssl",
///     Value::new()
///         .with_child("protocol", "TLSv1.3")
///         .with_child("trustStore", "/etc/commlink/ca.pem"),
/// ));
/// let factory = RustlsEngineFactory::from_params(&params)?;
/// let engine = factory.create_engine(EngineMode::Client, "example.com")?;
/// # Ok(())
/// # }
/// ```
///
/// Client and server configurations are built on first use and then shared
/// by every engine the factory creates.
pub struct RustlsEngineFactory {
    settings: TlsSettings,
    provider: Arc<CryptoProvider>,
    client: Mutex<Option<Arc<ClientConfig>>>,
    server: Mutex<Option<Arc<ServerConfig>>>,
}

impl RustlsEngineFactory {
    /// Creates a factory using the ring crypto provider.
    pub fn new(settings: TlsSettings) -> Self {
        Self {
            settings,
            provider: Arc::new(ring::default_provider()),
            client: Mutex::new(None),
            server: Mutex::new(None),
        }
    }

    /// Builds the factory from the `ssl` child of `params`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the options are malformed. Missing or
    /// unreadable stores are only detected when the first engine is built.
    pub fn from_params(params: &ProtocolParams) -> Result<Self, ConfigError> {
        Ok(Self::new(TlsSettings::from_params(params)?))
    }

    /// The settings every engine is built from.
    pub fn settings(&self) -> &TlsSettings {
        &self.settings
    }

    /// The shared client configuration, built on first use.
    fn client_config(&self) -> Result<Arc<ClientConfig>, ConfigError> {
        let mut slot = self.client.lock();
        if let Some(config) = slot.as_ref() {
            return Ok(config.clone());
        }
        let config = Arc::new(self.settings.client_config(self.provider.clone())?);
        *slot = Some(config.clone());
        Ok(config)
    }

    /// The shared server configuration, built on first use.
    fn server_config(&self) -> Result<Arc<ServerConfig>, ConfigError> {
        let mut slot = self.server.lock();
        if let Some(config) = slot.as_ref() {
            return Ok(config.clone());
        }
        let config = Arc::new(self.settings.server_config(self.provider.clone())?);
        *slot = Some(config.clone());
        Ok(config)
    }
}

impl EngineFactory for RustlsEngineFactory {
    fn create_engine(
        &self,
        mode: EngineMode,
        server_name: &str,
    ) -> Result<Box<dyn CryptoEngine>, ProtocolError> {
        debug!(?mode, server_name, version = ?self.settings.version, "creating TLS engine");
        let engine = match mode {
            EngineMode::Client => {
                let name = ServerName::try_from(server_name.to_string()).map_err(|e| {
                    ConfigError::InvalidParameter {
                        name: "host".to_string(),
                        reason: e.to_string(),
                    }
                })?;
                RustlsEngine::new(ClientConnection::new(self.client_config()?, name)?)
            }
            EngineMode::Server => RustlsEngine::new(ServerConnection::new(self.server_config()?)?),
        };
        Ok(Box::new(engine))
    }
}
