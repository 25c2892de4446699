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

//! Scheme and protocol lookup.

use super::factories::{
    ChannelFactory, ChannelRequest, CompressedProtocolFactory, JsonProtocolFactory,
    ListenerFactory, ListenerRequest, LocalFactory, PostcardProtocolFactory, ProtocolFactory,
    SocketFactory, SodepProtocolFactory, TlsProtocolFactory,
};
use super::{IniReference, Location};
use crate::channel::{ChannelOpener, CommChannel, InputPort, OutputPort};
use crate::config::CommConfig;
use crate::error::{CommError, ConfigError};
use crate::listener::{InboundScheduler, Listener};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Scheme prefix for outbound channels whose location is looked up.
pub const AUTO_SCHEME: &str = "auto";

/// Scheme of ini-indirected locations.
pub const INI_SCHEME: &str = "ini";

/// Deepest chain of `ini:` indirections followed.
const MAX_INDIRECTIONS: usize = 8;

/// Maps schemes to channel and listener factories, and protocol names to
/// codec factories.
///
/// A registry is plain state: create one, register factories, and share it
/// by `Arc` with everything that opens channels or listeners.
///
/// # Examples
///
/// ```rust
/// use commlink::registry::FactoryRegistry;
///
/// let registry = FactoryRegistry::with_defaults();
/// assert!(registry.channel_factory("socket").is_ok());
/// assert!(registry.protocol_factory("sodeps").is_ok());
///
/// let error = registry.channel_factory("foo").err().unwrap();
/// assert_eq!(error.to_string(), "unsupported scheme: foo");
/// ```
#[derive(Default)]
pub struct FactoryRegistry {
    channels: RwLock<HashMap<String, Arc<dyn ChannelFactory>>>,
    listeners: RwLock<HashMap<String, Arc<dyn ListenerFactory>>>,
    protocols: RwLock<HashMap<String, Arc<dyn ProtocolFactory>>>,
}

impl FactoryRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with every built-in scheme and codec.
    ///
    /// Schemes: `socket`, `localsocket` (Unix only), `local`. Codecs:
    /// `sodep`, `sodeps`, `sodepz`, `json`, `jsons`, `postcard`.
    pub fn with_defaults() -> Self {
        let registry = Self::new();

        let socket = Arc::new(SocketFactory);
        registry.register_channel_factory("socket", socket.clone());
        registry.register_listener_factory("socket", socket);

        #[cfg(unix)]
        {
            let local_socket = Arc::new(super::LocalSocketFactory);
            registry.register_channel_factory("localsocket", local_socket.clone());
            registry.register_listener_factory("localsocket", local_socket);
        }

        let local = Arc::new(LocalFactory::new());
        registry.register_channel_factory("local", local.clone());
        registry.register_listener_factory("local", local);

        let sodep: Arc<dyn ProtocolFactory> = Arc::new(SodepProtocolFactory);
        let json: Arc<dyn ProtocolFactory> = Arc::new(JsonProtocolFactory);
        registry.register_protocol_factory("sodep", sodep.clone());
        registry.register_protocol_factory("sodeps", Arc::new(TlsProtocolFactory::new(sodep.clone())));
        registry.register_protocol_factory("sodepz", Arc::new(CompressedProtocolFactory::new(sodep)));
        registry.register_protocol_factory("json", json.clone());
        registry.register_protocol_factory("jsons", Arc::new(TlsProtocolFactory::new(json)));
        registry.register_protocol_factory("postcard", Arc::new(PostcardProtocolFactory));
        registry
    }

    /// Registers `factory` for `scheme`, replacing any earlier one. Schemes are case-insensitive.
    pub fn register_channel_factory(&self, scheme: &str, factory: Arc<dyn ChannelFactory>) {
        self.channels
            .write()
            .insert(scheme.to_ascii_lowercase(), factory);
    }

    /// Registers `factory` for `scheme`, replacing any earlier one. Schemes are case-insensitive.
    pub fn register_listener_factory(&self, scheme: &str, factory: Arc<dyn ListenerFactory>) {
        self.listeners
            .write()
            .insert(scheme.to_ascii_lowercase(), factory);
    }

    /// Registers `factory` for the codec `name`, replacing any earlier one.
    pub fn register_protocol_factory(&self, name: &str, factory: Arc<dyn ProtocolFactory>) {
        self.protocols.write().insert(name.to_string(), factory);
    }

    /// The channel factory for `scheme`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnsupportedScheme`] when none is registered.
    pub fn channel_factory(&self, scheme: &str) -> Result<Arc<dyn ChannelFactory>, ConfigError> {
        self.channels
            .read()
            .get(scheme)
            .cloned()
            .ok_or_else(|| ConfigError::UnsupportedScheme {
                scheme: scheme.to_string(),
            })
    }

    /// The listener factory for `scheme`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnsupportedScheme`] when none is registered.
    pub fn listener_factory(&self, scheme: &str) -> Result<Arc<dyn ListenerFactory>, ConfigError> {
        self.listeners
            .read()
            .get(scheme)
            .cloned()
            .ok_or_else(|| ConfigError::UnsupportedScheme {
                scheme: scheme.to_string(),
            })
    }

    /// The codec factory for `name`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnsupportedProtocol`] when none is registered.
    pub fn protocol_factory(&self, name: &str) -> Result<Arc<dyn ProtocolFactory>, ConfigError> {
        self.protocols
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| ConfigError::UnsupportedProtocol {
                name: name.to_string(),
            })
    }

    /// Parses `raw`, following `ini:` indirections and `auto:` prefixes.
    ///
    /// An `auto:` location that resolves to `local` is rejected: auto
    /// channels only reach remote endpoints.
    ///
    /// # Errors
    ///
    /// Fails when a location in the chain does not parse, an ini document
    /// cannot be read or lacks the entry, indirections nest more than
    /// eight deep, or an `auto:` chain ends at `local`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use commlink::registry::FactoryRegistry;
    ///
    /// let registry = FactoryRegistry::with_defaults();
    /// let location = registry.resolve_location("auto:socket://db.internal:5432").unwrap();
    /// assert_eq!(location.host(), Some("db.internal"));
    /// assert!(registry.resolve_location("auto:local").is_err());
    /// ```
    pub fn resolve_location(&self, raw: &str) -> Result<Location, ConfigError> {
        resolve(raw, 0)
    }

    /// Opens an outbound channel to `location` speaking `port`'s protocol.
    ///
    /// The channel can reopen the same destination for
    /// [`CommChannel::create_duplicate`].
    ///
    /// # Errors
    ///
    /// Fails when the location does not resolve, its scheme or the port's
    /// codec is not registered, or the transport cannot connect.
    #[instrument(skip(self, port, config), fields(port = %port.name()))]
    pub async fn open_channel(
        self: &Arc<Self>,
        location: &str,
        port: &Arc<OutputPort>,
        config: &CommConfig,
    ) -> Result<Arc<dyn CommChannel>, CommError> {
        let resolved = self.resolve_location(location)?;
        let factory = self.channel_factory(resolved.scheme())?;
        let params = config.apply_defaults(port.params());
        let protocol = self
            .protocol_factory(port.protocol())?
            .create_output_protocol(&params, &resolved)?;
        let opener = Arc::new(RegistryOpener {
            registry: Arc::clone(self),
            location: location.to_string(),
            port: Arc::clone(port),
            config: config.clone(),
        });

        let channel = factory
            .create_channel(ChannelRequest {
                location: &resolved,
                protocol,
                opener,
                config,
            })
            .await?;
        channel.state().set_parent_output_port(port);
        debug!(location = %resolved, kind = channel.kind(), "channel opened");
        Ok(channel)
    }

    /// Creates the listener serving `port`.
    ///
    /// One codec is built right away so that bad settings, such as a TLS
    /// server port without a key store, fail here.
    ///
    /// # Errors
    ///
    /// Fails when the location does not resolve, its scheme or the port's
    /// codec is not registered, the codec settings are invalid, or the
    /// location cannot be bound.
    pub async fn create_listener(
        &self,
        port: Arc<InputPort>,
        scheduler: Arc<dyn InboundScheduler>,
        config: &CommConfig,
    ) -> Result<Arc<dyn Listener>, CommError> {
        let location = self.resolve_location(port.location())?;
        let factory = self.listener_factory(location.scheme())?;
        let protocols = self.protocol_factory(port.protocol())?;
        // Bad codec settings fail here instead of on every accepted connection.
        protocols.create_input_protocol(port.params())?;
        factory
            .create_listener(ListenerRequest {
                port,
                location: &location,
                protocols,
                scheduler,
                config,
            })
            .await
    }
}

/// Follows `ini:` and `auto:` prefixes, `depth` levels in so far.
fn resolve(raw: &str, depth: usize) -> Result<Location, ConfigError> {
    if depth > MAX_INDIRECTIONS {
        return Err(ConfigError::MalformedLocation {
            location: raw.to_string(),
            reason: "too many indirections".to_string(),
        });
    }
    let location = Location::parse(raw)?;
    match location.scheme() {
        INI_SCHEME => {
            let target = IniReference::parse(location.scheme_specific())?.resolve()?;
            resolve(&target, depth + 1)
        }
        AUTO_SCHEME => {
            let target = resolve(location.scheme_specific(), depth + 1)?;
            if target.is_local() {
                return Err(ConfigError::LocalLocationUnsupported {
                    location: raw.to_string(),
                });
            }
            Ok(target)
        }
        _ => Ok(location),
    }
}

/// Reopens a destination through the registry.
struct RegistryOpener {
    registry: Arc<FactoryRegistry>,
    location: String,
    port: Arc<OutputPort>,
    config: CommConfig,
}

#[async_trait]
impl ChannelOpener for RegistryOpener {
    async fn open(&self) -> Result<Arc<dyn CommChannel>, CommError> {
        self.registry
            .open_channel(&self.location, &self.port, &self.config)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_unsupported_scheme_names_it() {
        let registry = FactoryRegistry::with_defaults();
        let location = registry.resolve_location("foo://bar").unwrap();
        match registry.channel_factory(location.scheme()) {
            Err(ConfigError::UnsupportedScheme { scheme }) => assert_eq!(scheme, "foo"),
            other => panic!("unexpected {:?}", other.map(|_| ())),
        }
        assert!(registry.listener_factory("foo").is_err());
    }

    #[test]
    fn test_unknown_protocol() {
        let registry = FactoryRegistry::with_defaults();
        assert!(matches!(
            registry.protocol_factory("soap"),
            Err(ConfigError::UnsupportedProtocol { name }) if name == "soap"
        ));
    }

    #[test]
    fn test_default_registrations() {
        let registry = FactoryRegistry::with_defaults();
        for scheme in ["socket", "local"] {
            assert!(registry.channel_factory(scheme).is_ok());
            assert!(registry.listener_factory(scheme).is_ok());
        }
        #[cfg(unix)]
        assert!(registry.channel_factory("localsocket").is_ok());
        for name in ["sodep", "sodeps", "sodepz", "json", "jsons", "postcard"] {
            assert!(registry.protocol_factory(name).is_ok(), "{name}");
        }
    }

    #[test]
    fn test_ini_and_auto_resolution() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[Net]\nRemote = socket://example.org:7000\nSelf = local").unwrap();
        let path = file.path().display().to_string();
        let registry = FactoryRegistry::new();

        let remote = registry
            .resolve_location(&format!("ini:/Net/Remote:file://{path}"))
            .unwrap();
        assert_eq!(remote.port(), Some(7000));

        let auto = registry
            .resolve_location(&format!("auto:ini:/Net/Remote:file://{path}"))
            .unwrap();
        assert_eq!(auto.host(), Some("example.org"));

        let raw = format!("auto:ini:/Net/Self:file://{path}");
        assert!(matches!(
            registry.resolve_location(&raw),
            Err(ConfigError::LocalLocationUnsupported { location }) if location == raw
        ));
        // Without the auto prefix, local is a valid target.
        assert!(registry
            .resolve_location(&format!("ini:/Net/Self:file://{path}"))
            .unwrap()
            .is_local());
    }

    #[test]
    fn test_indirection_loop_is_bounded() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let path = file.path().display().to_string();
        writeln!(file, "[Loop]\nMe = ini:/Loop/Me:file://{path}").unwrap();
        let registry = FactoryRegistry::new();
        assert!(matches!(
            registry.resolve_location(&format!("ini:/Loop/Me:file://{path}")),
            Err(ConfigError::MalformedLocation { .. })
        ));
    }
}
