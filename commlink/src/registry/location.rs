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

//! Endpoint locations.
//!
//! A location is `scheme:scheme-specific-part`. When the scheme-specific
//! part starts with `//` it carries an authority (`host[:port]`) followed by
//! a path, as in `socket://localhost:8000` or `localsocket:///tmp/app.sock`.
//! The bare keyword `local` names the in-process transport.

use crate::channel::LOCAL_LOCATION;
use crate::error::ConfigError;
use std::fmt;
use std::str::FromStr;

/// A parsed endpoint location.
///
/// # Examples
///
/// ```rust
/// use commlink::registry::Location;
///
/// let location: Location = "socket://localhost:8000/api".parse().unwrap();
/// assert_eq!(location.scheme(), "socket");
/// assert_eq!(location.host(), Some("localhost"));
/// assert_eq!(location.port(), Some(8000));
/// assert_eq!(location.path(), "/api");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    raw: String,
    scheme: String,
    scheme_specific: String,
    host: Option<String>,
    port: Option<u16>,
    path: String,
}

/// A [`ConfigError::MalformedLocation`] for `raw`.
fn malformed(raw: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::MalformedLocation {
        location: raw.to_string(),
        reason: reason.into(),
    }
}

/// A letter followed by letters, digits, `+`, `-` or `.`.
fn is_valid_scheme(scheme: &str) -> bool {
    let mut chars = scheme.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

impl Location {
    /// Parses `raw`, which is either `local` or `scheme:rest`. A `rest` of
    /// `//host:port/path` is split into its parts.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MalformedLocation`] for a missing or invalid
    /// scheme, or a port that is not a number.
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let raw = raw.trim();
        if raw == LOCAL_LOCATION {
            return Ok(Self {
                raw: raw.to_string(),
                scheme: LOCAL_LOCATION.to_string(),
                scheme_specific: String::new(),
                host: None,
                port: None,
                path: String::new(),
            });
        }

        let (scheme, rest) = raw
            .split_once(':')
            .ok_or_else(|| malformed(raw, "missing scheme"))?;
        if !is_valid_scheme(scheme) {
            return Err(malformed(raw, format!("invalid scheme {scheme:?}")));
        }

        let mut location = Self {
            raw: raw.to_string(),
            scheme: scheme.to_ascii_lowercase(),
            scheme_specific: rest.to_string(),
            host: None,
            port: None,
            path: rest.to_string(),
        };
        if let Some(hierarchical) = rest.strip_prefix("//") {
            let (authority, path) = match hierarchical.find('/') {
                Some(index) => hierarchical.split_at(index),
                None => (hierarchical, ""),
            };
            let (host, port) = parse_authority(raw, authority)?;
            location.host = host;
            location.port = port;
            location.path = path.to_string();
        }
        Ok(location)
    }

    /// The location as given, trimmed.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// The scheme, lowercased.
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// Everything after the first `:`.
    pub fn scheme_specific(&self) -> &str {
        &self.scheme_specific
    }

    /// The host of a `//host:port` location.
    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    /// The port of a `//host:port` location.
    pub fn port(&self) -> Option<u16> {
        self.port
    }

    /// The path after the authority, or the whole scheme-specific part of a
    /// location without one.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// True for the in-process `local` location.
    pub fn is_local(&self) -> bool {
        self.scheme == LOCAL_LOCATION
    }

    /// `host:port`, as needed to connect or bind.
    pub fn socket_address(&self) -> Result<String, ConfigError> {
        match (self.host(), self.port) {
            (Some(host), Some(port)) if host.contains(':') => Ok(format!("[{host}]:{port}")),
            (Some(host), Some(port)) => Ok(format!("{host}:{port}")),
            _ => Err(malformed(&self.raw, "expected //host:port")),
        }
    }
}

/// Splits `host:port`, with the host optionally in brackets for IPv6.
/// Both parts may be missing.
fn parse_authority(raw: &str, authority: &str) -> Result<(Option<String>, Option<u16>), ConfigError> {
    if authority.is_empty() {
        return Ok((None, None));
    }
    let (host, port) = if let Some(bracketed) = authority.strip_prefix('[') {
        let (host, after) = bracketed
            .split_once(']')
            .ok_or_else(|| malformed(raw, "unterminated IPv6 address"))?;
        match after {
            "" => (host, None),
            _ => match after.strip_prefix(':') {
                Some(port) => (host, Some(port)),
                None => return Err(malformed(raw, "unexpected text after IPv6 address")),
            },
        }
    } else {
        match authority.rsplit_once(':') {
            Some((host, port)) => (host, Some(port)),
            None => (authority, None),
        }
    };
    let port = port
        .map(|port| {
            port.parse::<u16>()
                .map_err(|_| malformed(raw, format!("invalid port {port:?}")))
        })
        .transpose()?;
    let host = (!host.is_empty()).then(|| host.to_string());
    Ok((host, port))
}

impl FromStr for Location {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
