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

//! The TLS wrapper codec.
//!
//! [`TlsProtocol`] keeps one engine and one set of buffers per channel. Each
//! send or receive wraps the transport in a [`TlsStream`] for the length of
//! the call and lets the inner codec work on the cleartext side, so the
//! inner codec needs no knowledge of TLS at all.

use super::engine::{CryptoEngine, EngineFactory, EngineMode};
use super::rustls_engine::RustlsEngineFactory;
use super::stream::{TlsBuffers, TlsStream, DEFAULT_WRITE_CAPACITY};
use crate::protocol::{Duplex, Protocol, ProtocolError, ProtocolParams};
use crate::message::CommMessage;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Server name used when the location carries no host.
pub const DEFAULT_SERVER_NAME: &str = "localhost";

/// Lifecycle of the lazily built engine.
enum InitState {
    Uninitialized,
    /// Construction started but has not finished.
    Initializing,
    Ready(Box<dyn CryptoEngine>),
}

/// Engine plus the buffers that carry partial records between calls.
struct TlsSession {
    state: InitState,
    buffers: TlsBuffers,
}

/// Encrypts the byte stream of an inner codec.
///
/// The engine is built on first use, since key material may only be
/// resolvable once the surrounding port is fully configured. The inner codec
/// only ever sees the cleartext side of a [`TlsStream`]. The session state
/// is shared by sends and receives, so the codec is not thread safe.
///
/// # Examples
///
/// ```rust,no_run
/// use commlink::message::{CommMessage, Value};
/// use commlink::protocol::tls::{EngineMode, TlsProtocol};
/// use commlink::protocol::{Protocol, ProtocolParams, SodepProtocol};
/// use commlink::transport::TcpTransport;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let params = ProtocolParams::new(Value::new().with_child(
///     "ssl",
///     Value::new().with_child("trustStore", "/etc/commlink/ca.pem"),
/// ));
/// let inner = Box::new(SodepProtocol::new(params));
/// let codec = TlsProtocol::new(inner, EngineMode::Client, Some("example.com"));
/// assert_eq!(codec.name(), "sodeps");
///
/// let mut transport = TcpTransport::connect("example.com:8443").await?;
/// codec.send(&mut transport, &CommMessage::request("ping", Value::new())).await?;
/// let reply = codec.recv(&mut transport).await?;
/// # Ok(())
/// # }
/// ```
pub struct TlsProtocol {
    inner: Box<dyn Protocol>,
    mode: EngineMode,
    server_name: String,
    engines: Option<Arc<dyn EngineFactory>>,
    session: Mutex<TlsSession>,
}

impl TlsProtocol {
    /// Wraps `inner`. `host` is the peer host name for client mode.
    pub fn new(inner: Box<dyn Protocol>, mode: EngineMode, host: Option<&str>) -> Self {
        let server_name = match host {
            Some(host) if !host.is_empty() => host.to_string(),
            _ => DEFAULT_SERVER_NAME.to_string(),
        };
        let capacity = inner
            .params()
            .child("ssl")
            .int("writeBufferSize", DEFAULT_WRITE_CAPACITY as i64)
            .try_into()
            .unwrap_or(DEFAULT_WRITE_CAPACITY);
        Self {
            inner,
            mode,
            server_name,
            engines: None,
            session: Mutex::new(TlsSession {
                state: InitState::Uninitialized,
                buffers: TlsBuffers::new(capacity),
            }),
        }
    }

    /// Uses `factory` instead of building rustls engines from parameters.
    #[must_use]
    pub fn with_engine_factory(mut self, factory: Arc<dyn EngineFactory>) -> Self {
        self.engines = Some(factory);
        self
    }

    /// Whether this side acts as the TLS client or server.
    pub fn mode(&self) -> EngineMode {
        self.mode
    }

    /// Name sent for SNI and checked against the server certificate.
    pub fn server_name(&self) -> &str {
        &self.server_name
    }

    /// Creates the engine and starts its handshake.
    fn build_engine(&self) -> Result<Box<dyn CryptoEngine>, ProtocolError> {
        let mut engine = match &self.engines {
            Some(factory) => factory.create_engine(self.mode, &self.server_name)?,
            None => RustlsEngineFactory::from_params(self.inner.params())?
                .create_engine(self.mode, &self.server_name)?,
        };
        engine.begin_handshake()?;
        Ok(engine)
    }

    /// Builds the engine on first use. A failed build leaves the session
    /// uninitialized, so the next call tries again.
    fn ensure_engine<'s>(
        &self,
        session: &'s mut TlsSession,
    ) -> Result<(&'s mut dyn CryptoEngine, &'s mut TlsBuffers), ProtocolError> {
        if !matches!(session.state, InitState::Ready(_)) {
            session.state = InitState::Initializing;
            match self.build_engine() {
                Ok(engine) => {
                    debug!(protocol = %self.name(), mode = ?self.mode, "TLS engine ready");
                    session.state = InitState::Ready(engine);
                }
                Err(error) => {
                    session.state = InitState::Uninitialized;
                    return Err(error);
                }
            }
        }
        match &mut session.state {
            InitState::Ready(engine) => Ok((engine.as_mut(), &mut session.buffers)),
            InitState::Uninitialized | InitState::Initializing => Err(ProtocolError::Handshake {
                reason: "TLS engine unavailable".to_string(),
            }),
        }
    }
}

#[async_trait]
impl Protocol for TlsProtocol {
    fn name(&self) -> String {
        format!("{}s", self.inner.name())
    }

    fn is_thread_safe(&self) -> bool {
        false
    }

    fn params(&self) -> &ProtocolParams {
        self.inner.params()
    }

    async fn send(
        &self,
        stream: &mut dyn Duplex,
        message: &CommMessage,
    ) -> Result<(), ProtocolError> {
        let mut session = self.session.lock().await;
        let (engine, buffers) = self.ensure_engine(&mut session)?;
        let mut tls = TlsStream::new(stream, engine, buffers);
        self.inner.send(&mut tls, message).await?;
        tls.flush().await?;
        Ok(())
    }

    async fn recv(&self, stream: &mut dyn Duplex) -> Result<CommMessage, ProtocolError> {
        let mut session = self.session.lock().await;
        let (engine, buffers) = self.ensure_engine(&mut session)?;
        let mut tls = TlsStream::new(stream, engine, buffers);
        self.inner.recv(&mut tls).await
    }

    fn keep_alive(&self) -> bool {
        self.inner.keep_alive()
    }

    async fn close(&self, stream: &mut dyn Duplex) -> Result<(), ProtocolError> {
        let mut guard = self.session.lock().await;
        let session = &mut *guard;
        if let InitState::Ready(engine) = &mut session.state {
            let mut tls = TlsStream::new(stream, engine.as_mut(), &mut session.buffers);
            if let Err(error) = tls.close_notify().await {
                warn!(protocol = %self.name(), %error, "failed to send TLS close notification");
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for TlsProtocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsProtocol")
            .field("inner", &self.inner.name())
            .field("mode", &self.mode)
            .field("server_name", &self.server_name)
            .finish()
    }
}
