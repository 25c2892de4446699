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

//! First-value parameter lookup over a [`Value`] tree.

use crate::message::Value;
use std::sync::Arc;

/// Read-only view of codec configuration.
///
/// Each parameter is a named child of the root value; only the first value
/// of a vector is consulted. Lookups never fail: a missing or unparsable
/// parameter yields the supplied default.
///
/// # Examples
///
/// ```rust
/// use commlink::message::Value;
/// use commlink::protocol::ProtocolParams;
///
/// let params = ProtocolParams::new(
///     Value::new()
///         .with_child("keepAlive", "0")
///         .with_child("ssl", Value::new().with_child("protocol", "TLSv1.2")),
/// );
/// assert!(!params.bool("keepAlive", true));
/// assert_eq!(params.child("ssl").string("protocol", "TLSv1.3"), "TLSv1.2");
/// assert_eq!(params.int("missing", 7), 7);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ProtocolParams {
    root: Arc<Value>,
}

impl ProtocolParams {
    /// Wraps `root`, whose named children are the parameters.
    pub fn new(root: Value) -> Self {
        Self {
            root: Arc::new(root),
        }
    }

    /// Parameters with nothing set; every lookup returns its default.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The underlying value tree.
    pub fn root(&self) -> &Value {
        &self.root
    }

    /// Returns the first value stored under `name`.
    pub fn first(&self, name: &str) -> Option<&Value> {
        self.root.first_child(name)
    }

    /// Returns true when `name` is present and carries a scalar.
    pub fn has(&self, name: &str) -> bool {
        self.first(name).is_some_and(Value::is_defined)
    }

    /// The parameter as a string, or `default` when it is missing or undefined.
    pub fn string(&self, name: &str, default: &str) -> String {
        match self.first(name) {
            Some(value) if value.is_defined() => value.str_value(),
            _ => default.to_string(),
        }
    }

    /// The parameter as an integer, or `default` when it is missing or not a number.
    pub fn int(&self, name: &str, default: i64) -> i64 {
        self.first(name)
            .and_then(Value::int_value)
            .unwrap_or(default)
    }

    /// The parameter as a flag, or `default`. Accepts booleans, numbers
    /// (non-zero is true) and the strings `true` and `false`.
    pub fn bool(&self, name: &str, default: bool) -> bool {
        self.first(name)
            .and_then(Value::bool_value)
            .unwrap_or(default)
    }

    /// Returns the parameters nested under `name`, or an empty view.
    pub fn child(&self, name: &str) -> ProtocolParams {
        self.first(name)
            .map(|value| ProtocolParams::new(value.clone()))
            .unwrap_or_default()
    }

    /// Returns a copy with `name` set to `value`, replacing earlier values.
    #[must_use]
    pub fn with(&self, name: &str, value: impl Into<Value>) -> ProtocolParams {
        let mut root = (*self.root).clone();
        root.children_mut().insert(name.to_string(), vec![value.into()]);
        ProtocolParams::new(root)
    }
}

impl From<Value> for ProtocolParams {
    fn from(value: Value) -> Self {
        Self::new(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_parameters_use_defaults() {
        let params = ProtocolParams::empty();
        assert_eq!(params.string("protocol", "TLSv1.3"), "TLSv1.3");
        assert_eq!(params.int("size", 5), 5);
        assert!(params.bool("keepAlive", true));
        assert!(!params.has("keyStore"));
    }

    #[test]
    fn test_first_value_wins() {
        let params = ProtocolParams::new(
            Value::new()
                .with_child("host", "a")
                .with_child("host", "b"),
        );
        assert_eq!(params.string("host", ""), "a");
    }

    #[test]
    fn test_undefined_value_is_missing() {
        let params = ProtocolParams::new(Value::new().with_child("keyStore", Value::new()));
        assert!(!params.has("keyStore"));
        assert_eq!(params.string("keyStore", "none"), "none");
    }

    #[test]
    fn test_unparsable_int_falls_back() {
        let params = ProtocolParams::new(Value::new().with_child("size", "large"));
        assert_eq!(params.int("size", 9), 9);
    }

    #[test]
    fn test_with_replaces_value() {
        let params = ProtocolParams::new(Value::new().with_child("keepAlive", 1));
        let updated = params.with("keepAlive", 0);
        assert!(params.bool("keepAlive", false));
        assert!(!updated.bool("keepAlive", true));
    }
}
