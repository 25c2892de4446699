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

//! Factories for the built-in schemes and codecs.

use super::Location;
use crate::channel::{ChannelOpener, CommChannel, InputPort, LocalChannel, StreamingChannel};
use crate::config::CommConfig;
use crate::error::{CommError, ConfigError};
use crate::listener::{InboundScheduler, Listener, LocalListener, SocketListener};
use crate::protocol::tls::{EngineFactory, EngineMode, TlsSettings};
use crate::protocol::{
    CompressedProtocol, JsonProtocol, PostcardProtocol, Protocol, ProtocolParams, SodepProtocol,
    TlsProtocol,
};
use crate::serialization::{JsonSerializer, PostcardSerializer};
use crate::transport::{TcpAcceptor, TcpTransport};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::debug;

#[cfg(unix)]
use crate::listener::LocalSocketListener;
#[cfg(unix)]
use crate::transport::{LocalSocketAcceptor, LocalSocketAddress, LocalSocketTransport};

/// Creates codec instances for one protocol name.
///
/// Every channel gets its own instance, since codecs such as TLS keep
/// per-connection state.
pub trait ProtocolFactory: Send + Sync {
    /// A codec for a channel accepted on an input port.
    fn create_input_protocol(&self, params: &ProtocolParams)
        -> Result<Box<dyn Protocol>, CommError>;

    /// A codec for an outbound channel to `location`.
    fn create_output_protocol(
        &self,
        params: &ProtocolParams,
        location: &Location,
    ) -> Result<Box<dyn Protocol>, CommError>;
}

/// What a [`ChannelFactory`] needs to open a channel.
pub struct ChannelRequest<'a> {
    /// Where to connect.
    pub location: &'a Location,
    /// Codec for the new channel.
    pub protocol: Box<dyn Protocol>,
    /// Reopens the same destination for duplicates.
    pub opener: Arc<dyn ChannelOpener>,
    /// Runtime settings such as timeouts and keep-alive.
    pub config: &'a CommConfig,
}

/// Opens outbound channels for one scheme.
#[async_trait]
pub trait ChannelFactory: Send + Sync {
    /// Opens a channel to `request.location`.
    ///
    /// # Errors
    ///
    /// Fails when the location is malformed for this scheme or the transport
    /// cannot connect.
    async fn create_channel(
        &self,
        request: ChannelRequest<'_>,
    ) -> Result<Arc<dyn CommChannel>, CommError>;

    /// Opens an inbound-only channel. Few schemes support this.
    async fn create_input_channel(
        &self,
        _location: &Location,
        _port: &Arc<InputPort>,
    ) -> Result<Arc<dyn CommChannel>, CommError> {
        Err(crate::channel::ChannelError::Unsupported {
            operation: "create_input_channel",
            channel: "this scheme's",
        }
        .into())
    }
}

/// What a [`ListenerFactory`] needs to serve an input port.
pub struct ListenerRequest<'a> {
    /// The port the listener serves.
    pub port: Arc<InputPort>,
    /// Where to listen.
    pub location: &'a Location,
    /// Creates one codec per accepted channel.
    pub protocols: Arc<dyn ProtocolFactory>,
    /// Runs the port's handler for each inbound message.
    pub scheduler: Arc<dyn InboundScheduler>,
    /// Runtime settings.
    pub config: &'a CommConfig,
}

/// Creates listeners for one scheme.
#[async_trait]
pub trait ListenerFactory: Send + Sync {
    /// Binds a listener for `request.port`.
    ///
    /// # Errors
    ///
    /// Fails when the location is malformed for this scheme or cannot be bound.
    async fn create_listener(
        &self,
        request: ListenerRequest<'_>,
    ) -> Result<Arc<dyn Listener>, CommError>;
}

/// The `sodep` codec.
///
/// # Examples
///
/// ```rust
/// use commlink::protocol::{Protocol, ProtocolParams};
/// use commlink::registry::{ProtocolFactory, SodepProtocolFactory};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let codec = SodepProtocolFactory.create_input_protocol(&ProtocolParams::empty())?;
/// assert_eq!(codec.name(), "sodep");
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct SodepProtocolFactory;

impl ProtocolFactory for SodepProtocolFactory {
    fn create_input_protocol(
        &self,
        params: &ProtocolParams,
    ) -> Result<Box<dyn Protocol>, CommError> {
        Ok(Box::new(SodepProtocol::new(params.clone())))
    }

    fn create_output_protocol(
        &self,
        params: &ProtocolParams,
        _location: &Location,
    ) -> Result<Box<dyn Protocol>, CommError> {
        Ok(Box::new(SodepProtocol::new(params.clone())))
    }
}

/// The `json` codec.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonProtocolFactory;

impl ProtocolFactory for JsonProtocolFactory {
    fn create_input_protocol(
        &self,
        params: &ProtocolParams,
    ) -> Result<Box<dyn Protocol>, CommError> {
        Ok(Box::new(JsonProtocol::new(JsonSerializer::default(), params.clone())))
    }

    fn create_output_protocol(
        &self,
        params: &ProtocolParams,
        _location: &Location,
    ) -> Result<Box<dyn Protocol>, CommError> {
        self.create_input_protocol(params)
    }
}

/// The `postcard` codec.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostcardProtocolFactory;

impl ProtocolFactory for PostcardProtocolFactory {
    fn create_input_protocol(
        &self,
        params: &ProtocolParams,
    ) -> Result<Box<dyn Protocol>, CommError> {
        Ok(Box::new(PostcardProtocol::new(
            PostcardSerializer::default(),
            params.clone(),
        )))
    }

    fn create_output_protocol(
        &self,
        params: &ProtocolParams,
        _location: &Location,
    ) -> Result<Box<dyn Protocol>, CommError> {
        self.create_input_protocol(params)
    }
}

/// Wraps another factory's codecs in TLS.
///
/// Accepted channels run the server side of the handshake; outbound
/// channels run the client side and verify the location's host.
///
/// # Examples
///
/// ```rust
/// use commlink::protocol::{Protocol, ProtocolParams};
/// use commlink::registry::{Location, ProtocolFactory, SodepProtocolFactory, TlsProtocolFactory};
/// use std::sync::Arc;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let sodeps = TlsProtocolFactory::new(Arc::new(SodepProtocolFactory));
/// let location = Location::parse("socket://example.com:8000")?;
/// let codec = sodeps.create_output_protocol(&ProtocolParams::empty(), &location)?;
/// assert_eq!(codec.name(), "sodeps");
///
/// // A server codec needs a key store.
/// assert!(sodeps.create_input_protocol(&ProtocolParams::empty()).is_err());
/// # Ok(())
/// # }
/// ```
pub struct TlsProtocolFactory {
    inner: Arc<dyn ProtocolFactory>,
    engines: Option<Arc<dyn EngineFactory>>,
}

impl TlsProtocolFactory {
    /// Wraps the codecs `inner` creates.
    pub fn new(inner: Arc<dyn ProtocolFactory>) -> Self {
        Self {
            inner,
            engines: None,
        }
    }

    /// Builds engines with `engines` instead of from each port's parameters.
    #[must_use]
    pub fn with_engine_factory(mut self, engines: Arc<dyn EngineFactory>) -> Self {
        self.engines = Some(engines);
        self
    }

    fn wrap(&self, inner: Box<dyn Protocol>, mode: EngineMode, host: Option<&str>) -> Box<dyn Protocol> {
        let protocol = TlsProtocol::new(inner, mode, host);
        match &self.engines {
            Some(engines) => Box::new(protocol.with_engine_factory(Arc::clone(engines))),
            None => Box::new(protocol),
        }
    }
}

impl ProtocolFactory for TlsProtocolFactory {
    /// # Errors
    ///
    /// Fails with a configuration error when the `ssl` options are invalid
    /// or name no `keyStore`, unless an engine factory was supplied.
    fn create_input_protocol(
        &self,
        params: &ProtocolParams,
    ) -> Result<Box<dyn Protocol>, CommError> {
        if self.engines.is_none() {
            let settings = TlsSettings::from_params(params)?;
            if settings.key_store.is_none() {
                return Err(ConfigError::MissingParameter {
                    name: "ssl.keyStore".to_string(),
                }
                .into());
            }
        }
        let inner = self.inner.create_input_protocol(params)?;
        Ok(self.wrap(inner, EngineMode::Server, None))
    }

    /// # Errors
    ///
    /// Fails with a configuration error when the `ssl` options are invalid.
    fn create_output_protocol(
        &self,
        params: &ProtocolParams,
        location: &Location,
    ) -> Result<Box<dyn Protocol>, CommError> {
        if self.engines.is_none() {
            TlsSettings::from_params(params)?;
        }
        let inner = self.inner.create_output_protocol(params, location)?;
        Ok(self.wrap(inner, EngineMode::Client, location.host()))
    }
}

/// Wraps another factory's codecs in gzip compression.
///
/// # Examples
///
/// ```rust
/// use commlink::protocol::{Protocol, ProtocolParams};
/// use commlink::registry::{CompressedProtocolFactory, ProtocolFactory, SodepProtocolFactory};
/// use std::sync::Arc;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let sodepz = CompressedProtocolFactory::new(Arc::new(SodepProtocolFactory));
/// let codec = sodepz.create_input_protocol(&ProtocolParams::empty())?;
/// assert_eq!(codec.name(), "sodepz");
/// # Ok(())
/// # }
/// ```
pub struct CompressedProtocolFactory {
    inner: Arc<dyn ProtocolFactory>,
}

impl CompressedProtocolFactory {
    /// Wraps the codecs `inner` creates.
    pub fn new(inner: Arc<dyn ProtocolFactory>) -> Self {
        Self { inner }
    }
}

impl ProtocolFactory for CompressedProtocolFactory {
    fn create_input_protocol(
        &self,
        params: &ProtocolParams,
    ) -> Result<Box<dyn Protocol>, CommError> {
        Ok(Box::new(CompressedProtocol::new(
            self.inner.create_input_protocol(params)?,
        )))
    }

    fn create_output_protocol(
        &self,
        params: &ProtocolParams,
        location: &Location,
    ) -> Result<Box<dyn Protocol>, CommError> {
        Ok(Box::new(CompressedProtocol::new(
            self.inner.create_output_protocol(params, location)?,
        )))
    }
}

/// The `socket` scheme: TCP.
#[derive(Debug, Clone, Copy, Default)]
pub struct SocketFactory;

#[async_trait]
impl ChannelFactory for SocketFactory {
    async fn create_channel(
        &self,
        request: ChannelRequest<'_>,
    ) -> Result<Arc<dyn CommChannel>, CommError> {
        let address = request.location.socket_address()?;
        let transport = TcpTransport::connect(&address).await?;
        let channel = StreamingChannel::new(transport, request.protocol, request.location.as_str())
            .with_opener(request.opener);
        Ok(Arc::new(channel))
    }
}

#[async_trait]
impl ListenerFactory for SocketFactory {
    async fn create_listener(
        &self,
        request: ListenerRequest<'_>,
    ) -> Result<Arc<dyn Listener>, CommError> {
        let acceptor = TcpAcceptor::bind(&request.location.socket_address()?).await?;
        Ok(Arc::new(SocketListener::new(
            request.port,
            acceptor,
            request.protocols,
            request.scheduler,
        )))
    }
}

/// Maps a `localsocket` location to a socket address.
///
/// The host `abs` selects the abstract namespace; the path without its
/// leading `/` is the name. Otherwise the path is a filesystem node.
#[cfg(unix)]
pub fn local_socket_address(location: &Location) -> Result<LocalSocketAddress, ConfigError> {
    let malformed = |reason: &str| ConfigError::MalformedLocation {
        location: location.to_string(),
        reason: reason.to_string(),
    };
    match location.host() {
        Some("abs") => {
            let name = location.path().trim_start_matches('/');
            if name.is_empty() {
                return Err(malformed("missing abstract socket name"));
            }
            Ok(LocalSocketAddress::Abstract(name.to_string()))
        }
        Some(_) => Err(malformed("only the abs host marker is allowed")),
        None if location.path().is_empty() => Err(malformed("missing socket path")),
        None => Ok(LocalSocketAddress::Path(location.path().into())),
    }
}

/// The `localsocket` scheme: Unix domain sockets, keep-alive by default.
#[cfg(unix)]
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalSocketFactory;

#[cfg(unix)]
#[async_trait]
impl ChannelFactory for LocalSocketFactory {
    async fn create_channel(
        &self,
        request: ChannelRequest<'_>,
    ) -> Result<Arc<dyn CommChannel>, CommError> {
        let address = local_socket_address(request.location)?;
        let transport = LocalSocketTransport::connect(&address).await?;
        let channel = StreamingChannel::new(transport, request.protocol, request.location.as_str())
            .with_opener(request.opener);
        if request.config.local_socket_keep_alive {
            channel.state().set_to_be_closed(false);
        }
        Ok(Arc::new(channel))
    }
}

#[cfg(unix)]
#[async_trait]
impl ListenerFactory for LocalSocketFactory {
    async fn create_listener(
        &self,
        request: ListenerRequest<'_>,
    ) -> Result<Arc<dyn Listener>, CommError> {
        let acceptor = LocalSocketAcceptor::bind(local_socket_address(request.location)?)?;
        let mut listener = LocalSocketListener::new(
            request.port,
            acceptor,
            request.protocols,
            request.scheduler,
        );
        if request.config.local_socket_keep_alive {
            listener = listener.with_keep_alive(true);
        }
        Ok(Arc::new(listener))
    }
}

/// The `local` scheme: in-process loopback to the local input port.
#[derive(Default)]
pub struct LocalFactory {
    listener: RwLock<Option<Arc<LocalListener>>>,
}

impl LocalFactory {
    /// Creates the factory with no local listener yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// The listener serving the local input port, once one was created.
    pub fn listener(&self) -> Option<Arc<LocalListener>> {
        self.listener.read().clone()
    }
}

#[async_trait]
impl ChannelFactory for LocalFactory {
    async fn create_channel(
        &self,
        request: ChannelRequest<'_>,
    ) -> Result<Arc<dyn CommChannel>, CommError> {
        match self.listener() {
            Some(listener) if listener.is_running() => Ok(Arc::new(LocalChannel::new(listener))),
            _ => Err(crate::channel::ChannelError::Closed {
                location: request.location.to_string(),
            }
            .into()),
        }
    }
}

#[async_trait]
impl ListenerFactory for LocalFactory {
    async fn create_listener(
        &self,
        request: ListenerRequest<'_>,
    ) -> Result<Arc<dyn Listener>, CommError> {
        let listener = LocalListener::new(request.port, request.scheduler);
        if self.listener.write().replace(Arc::clone(&listener)).is_some() {
            debug!("replacing the local listener");
        }
        Ok(listener)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Value;

    fn location(raw: &str) -> Location {
        Location::parse(raw).unwrap()
    }

    #[test]
    fn test_wrapped_protocol_names() {
        let params = ProtocolParams::new(
            Value::new().with_child("ssl", Value::new().with_child("keyStore", "server.pem")),
        );
        let sodep: Arc<dyn ProtocolFactory> = Arc::new(SodepProtocolFactory);
        let tls = TlsProtocolFactory::new(sodep.clone());
        let zipped = CompressedProtocolFactory::new(sodep);
        let target = location("socket://example.org:1");

        assert_eq!(tls.create_output_protocol(&params, &target).unwrap().name(), "sodeps");
        assert_eq!(tls.create_input_protocol(&params).unwrap().name(), "sodeps");
        assert_eq!(zipped.create_input_protocol(&params).unwrap().name(), "sodepz");
        assert!(!tls.create_input_protocol(&params).unwrap().is_thread_safe());
    }

    #[test]
    fn test_tls_server_codec_requires_key_store() {
        let tls = TlsProtocolFactory::new(Arc::new(SodepProtocolFactory));
        let error = tls.create_input_protocol(&ProtocolParams::empty()).err().unwrap();
        assert!(matches!(
            error,
            CommError::Configuration(ConfigError::MissingParameter { ref name }) if name == "ssl.keyStore"
        ));

        let bad_version = ProtocolParams::new(
            Value::new().with_child("ssl", Value::new().with_child("protocol", "SSLv3")),
        );
        let target = location("socket://example.org:1");
        assert!(tls
            .create_output_protocol(&bad_version, &target)
            .err()
            .unwrap()
            .is_configuration_error());
        // Clients fall back to the system roots.
        assert!(tls.create_output_protocol(&ProtocolParams::empty(), &target).is_ok());
    }

    #[test]
    fn test_serde_factories() {
        let params = ProtocolParams::new(Value::new().with_child("maxFrameSize", 1024));
        assert_eq!(JsonProtocolFactory.create_input_protocol(&params).unwrap().name(), "json");
        assert_eq!(
            PostcardProtocolFactory.create_input_protocol(&params).unwrap().name(),
            "postcard"
        );
    }

    #[tokio::test]
    async fn test_input_channels_are_unsupported() {
        let port = Arc::new(InputPort::new("in", "socket://localhost:9000", "sodep"));
        let error = SocketFactory
            .create_input_channel(&location("socket://localhost:9000"), &port)
            .await
            .err()
            .unwrap();
        assert!(matches!(
            error,
            CommError::Channel(crate::channel::ChannelError::Unsupported {
                operation: "create_input_channel",
                ..
            })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_local_socket_addresses() {
        assert_eq!(
            local_socket_address(&location("localsocket:///tmp/a.sock")).unwrap(),
            LocalSocketAddress::Path("/tmp/a.sock".into())
        );
        assert_eq!(
            local_socket_address(&location("localsocket://abs/svc")).unwrap(),
            LocalSocketAddress::Abstract("svc".to_string())
        );
        for bad in ["localsocket://abs/", "localsocket://other/x", "localsocket:"] {
            assert!(local_socket_address(&location(bad)).is_err(), "{bad}");
        }
    }
}
