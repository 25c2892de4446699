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

//! TLS options read from the `ssl` protocol parameters.
//!
//! Only PEM stores are understood. A key store is one PEM file holding the
//! certificate chain followed by the private key; a trust store is a PEM
//! file of CA certificates. Without a trust store the system roots are
//! used.

use crate::error::ConfigError;
use crate::protocol::ProtocolParams;
use rustls::crypto::CryptoProvider;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::server::WebPkiClientVerifier;
use rustls::{ClientConfig, RootCertStore, ServerConfig, SupportedProtocolVersion};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// The only key and trust store format understood.
pub const PEM_FORMAT: &str = "PEM";

/// Protocol version selection for the `protocol` option.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsVersion {
    /// TLS 1.2 only.
    Tls12,
    /// TLS 1.3 only.
    Tls13,
    /// Any version the provider supports.
    Any,
}

impl TlsVersion {
    /// Parses `TLSv1.2`, `TLSv1.3` or `TLS`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidParameter`] for any other name.
    pub fn parse(name: &str) -> Result<Self, ConfigError> {
        match name {
            "TLSv1.2" => Ok(Self::Tls12),
            "TLSv1.3" => Ok(Self::Tls13),
            "TLS" => Ok(Self::Any),
            other => Err(ConfigError::InvalidParameter {
                name: "protocol".to_string(),
                reason: format!("unsupported TLS protocol {other}"),
            }),
        }
    }

    /// The rustls versions enabled by this selection.
    pub fn versions(self) -> &'static [&'static SupportedProtocolVersion] {
        static TLS12: &[&SupportedProtocolVersion] = &[&rustls::version::TLS12];
        static TLS13: &[&SupportedProtocolVersion] = &[&rustls::version::TLS13];
        match self {
            Self::Tls12 => TLS12,
            Self::Tls13 => TLS13,
            Self::Any => rustls::ALL_VERSIONS,
        }
    }
}

/// Parsed TLS configuration.
///
/// | option | default |
/// |---|---|
/// | `protocol` | `TLSv1.3` |
/// | `keyStore` | none, required for servers |
/// | `keyStorePassword` | ignored, PEM keys are unencrypted |
/// | `keyStoreFormat` | `PEM` |
/// | `trustStore` | system roots |
/// | `trustStorePassword` | ignored |
/// | `trustStoreFormat` | `PEM` |
/// | `wantClientAuth` | `1` |
///
/// # Examples
///
/// ```rust
/// use commlink::message::Value;
/// use commlink::protocol::tls::{TlsSettings, TlsVersion};
/// use commlink::protocol::ProtocolParams;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let params = ProtocolParams::new(Value::new().with_child(
///     "ssl",
///     Value::new()
///         .with_child("protocol", "TLSv1.2")
///         .with_child("keyStore", "/etc/commlink/server.pem"),
/// ));
/// let settings = TlsSettings::from_params(&params)?;
/// assert_eq!(settings.version, TlsVersion::Tls12);
/// assert!(settings.key_store.is_some());
/// assert!(settings.want_client_auth);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsSettings {
    /// Protocol versions to offer or accept.
    pub version: TlsVersion,
    /// Certificate chain and key, as one PEM file.
    pub key_store: Option<PathBuf>,
    /// CA certificates; the system roots when unset.
    pub trust_store: Option<PathBuf>,
    /// Servers ask clients for a certificate but accept connections without.
    pub want_client_auth: bool,
}

impl Default for TlsSettings {
    fn default() -> Self {
        Self {
            version: TlsVersion::Tls13,
            key_store: None,
            trust_store: None,
            want_client_auth: true,
        }
    }
}

impl TlsSettings {
    /// Reads the `ssl` child of a codec's parameters.
    ///
    /// No file is opened here; stores are read when a configuration is built.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidParameter`] for an unknown protocol or a
    /// store format other than PEM.
    pub fn from_params(params: &ProtocolParams) -> Result<Self, ConfigError> {
        let ssl = params.child("ssl");
        check_format(&ssl, "keyStoreFormat")?;
        check_format(&ssl, "trustStoreFormat")?;

        let path = |name: &str| ssl.has(name).then(|| PathBuf::from(ssl.string(name, "")));
        Ok(Self {
            version: TlsVersion::parse(&ssl.string("protocol", "TLSv1.3"))?,
            key_store: path("keyStore"),
            trust_store: path("trustStore"),
            want_client_auth: ssl.int("wantClientAuth", 1) != 0,
        })
    }

    /// Builds a client configuration. The key store, when set, is used for
    /// client authentication.
    ///
    /// # Errors
    ///
    /// Fails when a store cannot be read or rustls rejects the combination.
    pub fn client_config(&self, provider: Arc<CryptoProvider>) -> Result<ClientConfig, ConfigError> {
        let builder = ClientConfig::builder_with_provider(provider)
            .with_protocol_versions(self.version.versions())?
            .with_root_certificates(self.trust_roots()?);

        match &self.key_store {
            Some(path) => {
                let (certs, key) = load_key_store(path)?;
                Ok(builder.with_client_auth_cert(certs, key)?)
            }
            None => Ok(builder.with_no_client_auth()),
        }
    }

    /// Builds a server configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingParameter`] without a key store, and fails
    /// when a store cannot be read or rustls rejects the combination.
    pub fn server_config(&self, provider: Arc<CryptoProvider>) -> Result<ServerConfig, ConfigError> {
        let path = self
            .key_store
            .as_deref()
            .ok_or_else(|| ConfigError::MissingParameter {
                name: "ssl.keyStore".to_string(),
            })?;
        let (certs, key) = load_key_store(path)?;

        let builder = ServerConfig::builder_with_provider(provider.clone())
            .with_protocol_versions(self.version.versions())?;

        let builder = match (&self.trust_store, self.want_client_auth) {
            (Some(_), true) => {
                let roots = Arc::new(self.trust_roots()?);
                let verifier = WebPkiClientVerifier::builder_with_provider(roots, provider)
                    .allow_unauthenticated()
                    .build()
                    .map_err(|e| ConfigError::InvalidParameter {
                        name: "trustStore".to_string(),
                        reason: e.to_string(),
                    })?;
                builder.with_client_cert_verifier(verifier)
            }
            _ => builder.with_no_client_auth(),
        };
        Ok(builder.with_single_cert(certs, key)?)
    }

    /// CA certificates from the trust store, or the system roots.
    fn trust_roots(&self) -> Result<RootCertStore, ConfigError> {
        let mut roots = RootCertStore::empty();
        match &self.trust_store {
            Some(path) => {
                for cert in read_certificates(path)? {
                    roots.add(cert)?;
                }
            }
            None => {
                let native = rustls_native_certs::load_native_certs().map_err(|source| {
                    ConfigError::Unreadable {
                        path: PathBuf::from("<system trust store>"),
                        source,
                    }
                })?;
                let (added, ignored) = roots.add_parsable_certificates(native);
                if ignored > 0 {
                    warn!(added, ignored, "skipped unparsable system certificates");
                }
                debug!(added, "loaded system trust roots");
            }
        }
        if roots.is_empty() {
            return Err(ConfigError::KeyMaterial {
                path: self.trust_store.clone().unwrap_or_default(),
                reason: "no trusted certificates found".to_string(),
            });
        }
        Ok(roots)
    }
}

/// Fails unless the store format option is PEM, ignoring case.
fn check_format(ssl: &ProtocolParams, name: &str) -> Result<(), ConfigError> {
    let format = ssl.string(name, PEM_FORMAT);
    if format.eq_ignore_ascii_case(PEM_FORMAT) {
        Ok(())
    } else {
        Err(ConfigError::InvalidParameter {
            name: name.to_string(),
            reason: format!("unsupported store format {format}, expected {PEM_FORMAT}"),
        })
    }
}

fn open(path: &Path) -> Result<BufReader<File>, ConfigError> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|source| ConfigError::Unreadable {
            path: path.to_path_buf(),
            source,
        })
}

/// Every certificate in a PEM file. An empty file is an error.
fn read_certificates(path: &Path) -> Result<Vec<CertificateDer<'static>>, ConfigError> {
    let certs = rustls_pemfile::certs(&mut open(path)?)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|source| ConfigError::Unreadable {
            path: path.to_path_buf(),
            source,
        })?;
    if certs.is_empty() {
        return Err(ConfigError::KeyMaterial {
            path: path.to_path_buf(),
            reason: "no certificates found".to_string(),
        });
    }
    Ok(certs)
}

/// Loads a certificate chain and private key from one PEM file.
///
/// # Errors
///
/// Returns [`ConfigError::Unreadable`] when the file cannot be read and
/// [`ConfigError::KeyMaterial`] when it holds no certificate or no key.
pub fn load_key_store(
    path: &Path,
) -> Result<(Vec<CertificateDer<'static>>, PrivateKeyDer<'static>), ConfigError> {
    let certs = read_certificates(path)?;
    let key = rustls_pemfile::private_key(&mut open(path)?)
        .map_err(|source| ConfigError::Unreadable {
            path: path.to_path_buf(),
            source,
        })?
        .ok_or_else(|| ConfigError::KeyMaterial {
            path: path.to_path_buf(),
            reason: "no private key found".to_string(),
        })?;
    Ok((certs, key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Value;
    use rustls::crypto::ring::default_provider;
    use std::io::Write;

    fn ssl(options: Value) -> ProtocolParams {
        ProtocolParams::new(Value::new().with_child("ssl", options))
    }

    fn key_store_file() -> tempfile::NamedTempFile {
        let cert = rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(cert.serialize_pem().unwrap().as_bytes()).unwrap();
        file.write_all(cert.serialize_private_key_pem().as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults() {
        let settings = TlsSettings::from_params(&ProtocolParams::empty()).unwrap();
        assert_eq!(settings, TlsSettings::default());
        assert_eq!(settings.version, TlsVersion::Tls13);
        assert!(settings.want_client_auth);
    }

    #[test]
    fn test_parses_options() {
        let settings = TlsSettings::from_params(&ssl(
            Value::new()
                .with_child("protocol", "TLSv1.2")
                .with_child("keyStore", "/etc/keys.pem")
                .with_child("keyStorePassword", "secret")
                .with_child("wantClientAuth", "0"),
        ))
        .unwrap();
        assert_eq!(settings.version, TlsVersion::Tls12);
        assert_eq!(settings.key_store, Some(PathBuf::from("/etc/keys.pem")));
        assert!(!settings.want_client_auth);
    }

    #[test]
    fn test_unknown_protocol_rejected() {
        let result = TlsSettings::from_params(&ssl(Value::new().with_child("protocol", "SSLv3")));
        assert!(matches!(result, Err(ConfigError::InvalidParameter { name, .. }) if name == "protocol"));
    }

    #[test]
    fn test_non_pem_store_rejected() {
        let result =
            TlsSettings::from_params(&ssl(Value::new().with_child("keyStoreFormat", "JKS")));
        assert!(matches!(result, Err(ConfigError::InvalidParameter { .. })));
    }

    #[test]
    fn test_server_requires_key_store() {
        let settings = TlsSettings::default();
        let result = settings.server_config(Arc::new(default_provider()));
        assert!(matches!(result, Err(ConfigError::MissingParameter { .. })));
    }

    #[test]
    fn test_server_config_from_pem() {
        let file = key_store_file();
        let settings = TlsSettings {
            key_store: Some(file.path().to_path_buf()),
            ..TlsSettings::default()
        };
        assert!(settings.server_config(Arc::new(default_provider())).is_ok());
    }

    #[test]
    fn test_client_trusts_pem_store() {
        let file = key_store_file();
        let settings = TlsSettings {
            trust_store: Some(file.path().to_path_buf()),
            ..TlsSettings::default()
        };
        assert!(settings.client_config(Arc::new(default_provider())).is_ok());
    }

    #[test]
    fn test_missing_file_is_unreadable() {
        let result = load_key_store(Path::new("/nonexistent/keys.pem"));
        assert!(matches!(result, Err(ConfigError::Unreadable { .. })));
    }
}
