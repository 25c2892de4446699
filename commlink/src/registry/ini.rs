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

//! Locations stored in ini documents.
//!
//! `ini:/Section/Key:URL` names the value of `Key` in `[Section]` of the ini
//! document at `URL` (a `file:` URL or a plain path). The value is itself a
//! location.

use crate::error::ConfigError;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// A parsed ini document.
///
/// # Examples
///
/// ```rust
/// use commlink::registry::IniDocument;
///
/// let document = IniDocument::parse(
///     "; deployment\n[Services]\nbilling = \"socket://billing:9000\"\n",
/// );
/// assert_eq!(document.get("Services", "billing"), Some("socket://billing:9000"));
/// assert_eq!(document.get("Services", "missing"), None);
/// ```
#[derive(Debug, Clone, Default)]
pub struct IniDocument {
    sections: HashMap<String, HashMap<String, String>>,
}

impl IniDocument {
    /// Parses ini text. Keys before the first section header belong to the
    /// section named `""`. Lines starting with `;` or `#` are comments.
    pub fn parse(text: &str) -> Self {
        let mut document = Self::default();
        let mut section = String::new();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
                continue;
            }
            if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
                section = name.trim().to_string();
                continue;
            }
            if let Some((key, value)) = line.split_once('=') {
                document
                    .sections
                    .entry(section.clone())
                    .or_default()
                    .insert(key.trim().to_string(), unquote(value.trim()).to_string());
            }
        }
        document
    }

    /// Reads and parses the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Unreadable`] when the file cannot be read.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Unreadable {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::parse(&text))
    }

    /// The value of `key` in `section`. Keys before any header live in section `""`.
    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        self.sections
            .get(section)
            .and_then(|entries| entries.get(key))
            .map(String::as_str)
    }
}

/// Strips one pair of surrounding double quotes.
fn unquote(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
}

/// The scheme-specific part of an `ini:` location.
///
/// # Examples
///
/// ```rust
/// use commlink::registry::IniReference;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let reference = IniReference::parse("/Services/billing:file:///etc/app.ini")?;
/// assert_eq!(reference.section, "Services");
/// assert_eq!(reference.key, "billing");
/// assert_eq!(reference.path.to_str(), Some("/etc/app.ini"));
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IniReference {
    /// Section holding the location.
    pub section: String,
    /// Key whose value is the location.
    pub key: String,
    /// The ini file.
    pub path: PathBuf,
}

impl IniReference {
    /// Parses `/Section/Key:path`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MalformedLocation`] when a part is missing.
    pub fn parse(scheme_specific: &str) -> Result<Self, ConfigError> {
        let malformed = |reason: &str| ConfigError::MalformedLocation {
            location: format!("ini:{scheme_specific}"),
            reason: reason.to_string(),
        };
        let rest = scheme_specific
            .strip_prefix('/')
            .ok_or_else(|| malformed("expected /Section/Key:URL"))?;
        let (section, rest) = rest
            .split_once('/')
            .ok_or_else(|| malformed("missing key"))?;
        let (key, url) = rest
            .split_once(':')
            .ok_or_else(|| malformed("missing document URL"))?;
        if section.is_empty() || key.is_empty() || url.is_empty() {
            return Err(malformed("empty section, key or URL"));
        }
        let path = url
            .strip_prefix("file://")
            .or_else(|| url.strip_prefix("file:"))
            .unwrap_or(url);
        Ok(Self {
            section: section.to_string(),
            key: key.to_string(),
            path: PathBuf::from(path),
        })
    }

    /// Reads the referenced document and returns the stored location.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Unreadable`] when the file cannot be read and
    /// [`ConfigError::IniEntryMissing`] when it has no such entry.
    pub fn resolve(&self) -> Result<String, ConfigError> {
        let document = IniDocument::load(&self.path)?;
        let value = document
            .get(&self.section, &self.key)
            .ok_or_else(|| ConfigError::IniEntryMissing {
                path: self.path.clone(),
                section: self.section.clone(),
                key: self.key.clone(),
            })?;
        debug!(section = %self.section, key = %self.key, location = value, "resolved ini location");
        Ok(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_document() {
        let document = IniDocument::parse(
            "top = 1\n; comment\n[Net]\nEndpoint = \"socket://localhost:9000\"\n# more\n[Other]\nx=y\n",
        );
        assert_eq!(document.get("", "top"), Some("1"));
        assert_eq!(document.get("Net", "Endpoint"), Some("socket://localhost:9000"));
        assert_eq!(document.get("Other", "x"), Some("y"));
        assert_eq!(document.get("Net", "x"), None);
    }

    #[test]
    fn test_parse_reference_forms() {
        let reference = IniReference::parse("/Net/Endpoint:file:///etc/app.ini").unwrap();
        assert_eq!(reference.section, "Net");
        assert_eq!(reference.key, "Endpoint");
        assert_eq!(reference.path, PathBuf::from("/etc/app.ini"));

        let plain = IniReference::parse("/A/B:relative.ini").unwrap();
        assert_eq!(plain.path, PathBuf::from("relative.ini"));

        for bad in ["Net/Endpoint:x", "/Net:x", "/Net/Endpoint", "/Net/:x"] {
            assert!(IniReference::parse(bad).is_err(), "{bad}");
        }
    }

    #[test]
    fn test_resolve_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[Net]\nEndpoint = local").unwrap();
        let raw = format!("/Net/Endpoint:file://{}", file.path().display());
        assert_eq!(IniReference::parse(&raw).unwrap().resolve().unwrap(), "local");

        let missing = format!("/Net/Nope:{}", file.path().display());
        assert!(matches!(
            IniReference::parse(&missing).unwrap().resolve(),
            Err(ConfigError::IniEntryMissing { .. })
        ));
    }

    #[test]
    fn test_unreadable_document() {
        let reference = IniReference::parse("/Net/Endpoint:/nonexistent/dir/app.ini").unwrap();
        assert!(matches!(reference.resolve(), Err(ConfigError::Unreadable { .. })));
    }
}
