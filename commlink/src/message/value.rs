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

//! Structured payload values.
//!
//! A [`Value`] is a recursive tree: every node carries an optional scalar and
//! an ordered map from child name to a vector of child values. Protocol
//! parameters, message payloads and fault details all use this shape.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// The scalar held by a single [`Value`] node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Scalar {
    /// UTF-8 text.
    String(String),
    /// 32-bit integer.
    Int(i32),
    /// 64-bit integer.
    Long(i64),
    /// Double precision float.
    Double(f64),
    /// Boolean flag.
    Bool(bool),
    /// Raw bytes, shown by length only.
    Bytes(Vec<u8>),
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => f.write_str(s),
            Self::Int(i) => write!(f, "{}", i),
            Self::Long(l) => write!(f, "{}", l),
            Self::Double(d) => write!(f, "{}", d),
            Self::Bool(b) => write!(f, "{}", b),
            Self::Bytes(b) => write!(f, "<{} bytes>", b.len()),
        }
    }
}

/// A node of a structured value tree.
///
/// Every node holds an optional scalar and any number of named child
/// vectors. A node without a scalar is undefined, which is different from
/// holding an empty string. Children are kept in name order so that
/// encodings are deterministic.
///
/// # Examples
///
/// ```rust
/// use commlink::message::Value;
///
/// let mut value = Value::new();
/// value.child_or_insert("protocol").set_scalar("TLSv1.2");
/// assert_eq!(value.first_child("protocol").map(Value::str_value).as_deref(), Some("TLSv1.2"));
///
/// let point = Value::new().with_child("x", 3).with_child("x", 4);
/// assert_eq!(point.children()["x"].len(), 2);
/// assert!(!point.is_defined());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Value {
    scalar: Option<Scalar>,
    children: BTreeMap<String, Vec<Value>>,
}

impl Value {
    /// Creates an undefined value with no children.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The scalar of this node, if it has one.
    pub fn scalar(&self) -> Option<&Scalar> {
        self.scalar.as_ref()
    }

    /// Replaces the scalar of this node. Children are kept.
    pub fn set_scalar(&mut self, scalar: impl Into<Scalar>) {
        self.scalar = Some(scalar.into());
    }

    /// Removes the scalar, leaving the node undefined. Children are kept.
    pub fn clear_scalar(&mut self) {
        self.scalar = None;
    }

    /// Returns true when the node carries a scalar.
    pub fn is_defined(&self) -> bool {
        self.scalar.is_some()
    }

    /// Child vectors by name, in name order.
    pub fn children(&self) -> &BTreeMap<String, Vec<Value>> {
        &self.children
    }

    /// Mutable access to the child vectors.
    pub fn children_mut(&mut self) -> &mut BTreeMap<String, Vec<Value>> {
        &mut self.children
    }

    /// Returns true when at least one value is stored under `name`.
    pub fn has_children(&self, name: &str) -> bool {
        self.children.get(name).is_some_and(|v| !v.is_empty())
    }

    /// Returns the first value stored under `name`, if any.
    pub fn first_child(&self, name: &str) -> Option<&Value> {
        self.children.get(name).and_then(|v| v.first())
    }

    /// Returns the first value stored under `name`, creating it when missing.
    pub fn child_or_insert(&mut self, name: &str) -> &mut Value {
        let vector = self.children.entry(name.to_string()).or_default();
        if vector.is_empty() {
            vector.push(Value::new());
        }
        &mut vector[0]
    }

    /// Appends `value` to the vector stored under `name`.
    pub fn add_child(&mut self, name: impl Into<String>, value: Value) {
        self.children.entry(name.into()).or_default().push(value);
    }

    /// Builder form of [`Value::add_child`].
    #[must_use]
    pub fn with_child(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.add_child(name, value.into());
        self
    }

    /// Renders the scalar as a string, or the empty string when undefined.
    pub fn str_value(&self) -> String {
        self.scalar
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_default()
    }

    /// Interprets the scalar as an integer where a lossless-enough reading exists.
    pub fn int_value(&self) -> Option<i64> {
        match self.scalar.as_ref()? {
            Scalar::Int(i) => Some(i64::from(*i)),
            Scalar::Long(l) => Some(*l),
            Scalar::Double(d) => Some(*d as i64),
            Scalar::Bool(b) => Some(i64::from(*b)),
            Scalar::String(s) => s.trim().parse().ok(),
            Scalar::Bytes(_) => None,
        }
    }

    /// Interprets the scalar as a boolean. Integers are true when non-zero.
    pub fn bool_value(&self) -> Option<bool> {
        match self.scalar.as_ref()? {
            Scalar::Bool(b) => Some(*b),
            Scalar::Int(i) => Some(*i != 0),
            Scalar::Long(l) => Some(*l != 0),
            Scalar::Double(d) => Some(*d != 0.0),
            Scalar::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" => Some(true),
                "false" => Some(false),
                other => other.parse::<i64>().ok().map(|i| i != 0),
            },
            Scalar::Bytes(_) => None,
        }
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<i32> for Scalar {
    fn from(value: i32) -> Self {
        Self::Int(value)
    }
}

impl From<i64> for Scalar {
    fn from(value: i64) -> Self {
        Self::Long(value)
    }
}

impl From<f64> for Scalar {
    fn from(value: f64) -> Self {
        Self::Double(value)
    }
}

impl From<bool> for Scalar {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<Vec<u8>> for Scalar {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

impl From<Scalar> for Value {
    fn from(scalar: Scalar) -> Self {
        Self {
            scalar: Some(scalar),
            children: BTreeMap::new(),
        }
    }
}

macro_rules! value_from_scalar {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Value {
                fn from(value: $ty) -> Self {
                    Self::from(Scalar::from(value))
                }
            }
        )*
    };
}

value_from_scalar!(&str, String, i32, i64, f64, bool, Vec<u8>);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_default_is_undefined() {
        let value = Value::new();
        assert!(!value.is_defined());
        assert_eq!(value.str_value(), "");
        assert!(value.children().is_empty());
    }

    #[test]
    fn test_child_or_insert_reuses_first() {
        let mut value = Value::new();
        value.child_or_insert("a").set_scalar(1);
        value.child_or_insert("a").set_scalar(2);
        assert_eq!(value.children()["a"].len(), 1);
        assert_eq!(value.first_child("a").and_then(Value::int_value), Some(2));
    }

    #[test]
    fn test_add_child_appends() {
        let value = Value::new()
            .with_child("item", "x")
            .with_child("item", "y");
        assert_eq!(value.children()["item"].len(), 2);
        assert_eq!(value.first_child("item").map(Value::str_value).as_deref(), Some("x"));
        assert!(value.has_children("item"));
        assert!(!value.has_children("missing"));
    }

    #[test]
    fn test_int_value_conversions() {
        assert_eq!(Value::from("42").int_value(), Some(42));
        assert_eq!(Value::from(7i64).int_value(), Some(7));
        assert_eq!(Value::from(true).int_value(), Some(1));
        assert_eq!(Value::from("nope").int_value(), None);
        assert_eq!(Value::from(vec![1u8]).int_value(), None);
    }

    #[test]
    fn test_bool_value_conversions() {
        assert_eq!(Value::from("true").bool_value(), Some(true));
        assert_eq!(Value::from("FALSE").bool_value(), Some(false));
        assert_eq!(Value::from("0").bool_value(), Some(false));
        assert_eq!(Value::from(3).bool_value(), Some(true));
        assert_eq!(Value::new().bool_value(), None);
    }

    #[test]
    fn test_str_value_renders_scalars() {
        assert_eq!(Value::from(12).str_value(), "12");
        assert_eq!(Value::from(1.5).str_value(), "1.5");
        assert_eq!(Value::from(vec![0u8; 3]).str_value(), "<3 bytes>");
    }
}
