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

//! The correlation-bearing message envelope.

use super::Value;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Resource path used when a message does not name one.
pub const DEFAULT_RESOURCE_PATH: &str = "/";

/// Next id handed out by [`next_message_id`].
static NEXT_MESSAGE_ID: AtomicU64 = AtomicU64::new(1);

/// Returns a fresh message id, unique within this process.
///
/// Responses never call this; they copy the id of their request.
pub fn next_message_id() -> u64 {
    NEXT_MESSAGE_ID.fetch_add(1, Ordering::Relaxed)
}

/// An application-level fault carried inside a message.
///
/// Faults travel through channels untouched; they are never treated as
/// transport failures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fault {
    name: String,
    value: Value,
}

impl Fault {
    /// Creates a fault named `name` carrying `value` as its details.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use commlink::message::{CommMessage, Fault, Value};
    ///
    /// let request = CommMessage::request("divide", Value::from(0));
    /// let fault = Fault::new("DivisionByZero", Value::from("denominator is 0"));
    /// let response = CommMessage::fault_response_for(&request, fault);
    /// assert!(response.is_fault());
    /// assert_eq!(response.fault().map(Fault::name), Some("DivisionByZero"));
    /// ```
    pub fn new(name: impl Into<String>, value: Value) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }

    /// The fault name, matched by the receiving side.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Additional details of the fault.
    pub fn value(&self) -> &Value {
        &self.value
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fault {}", self.name)?;
        if self.value.is_defined() {
            write!(f, ": {}", self.value.str_value())?;
        }
        Ok(())
    }
}

/// A message exchanged over a channel.
///
/// The id correlates a response with the request it answers: every response
/// built through [`CommMessage::response_for`] or
/// [`CommMessage::fault_response_for`] reuses the request id.
///
/// # Examples
///
/// ```rust
/// use commlink::message::{CommMessage, Value};
///
/// let request = CommMessage::request("echo", Value::from("ping"));
/// let response = CommMessage::response_for(&request, Value::from("pong"));
/// assert_eq!(request.id(), response.id());
/// assert_eq!(request.resource_path(), "/");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommMessage {
    id: u64,
    operation: String,
    resource_path: String,
    value: Value,
    fault: Option<Fault>,
}

impl CommMessage {
    /// Creates a message from all of its parts.
    ///
    /// An empty `resource_path` becomes [`DEFAULT_RESOURCE_PATH`]. Codecs use
    /// this when decoding; applications normally call
    /// [`CommMessage::request`] or [`CommMessage::response_for`] instead.
    pub fn new(
        id: u64,
        operation: impl Into<String>,
        resource_path: impl Into<String>,
        value: Value,
        fault: Option<Fault>,
    ) -> Self {
        let resource_path = resource_path.into();
        Self {
            id,
            operation: operation.into(),
            resource_path: if resource_path.is_empty() {
                DEFAULT_RESOURCE_PATH.to_string()
            } else {
                resource_path
            },
            value,
            fault,
        }
    }

    /// Creates a request with a fresh id and the default resource path.
    pub fn request(operation: impl Into<String>, value: Value) -> Self {
        Self::new(
            next_message_id(),
            operation,
            DEFAULT_RESOURCE_PATH,
            value,
            None,
        )
    }

    /// Creates a request with a fresh id aimed at `resource_path`.
    pub fn request_at(
        operation: impl Into<String>,
        resource_path: impl Into<String>,
        value: Value,
    ) -> Self {
        Self::new(next_message_id(), operation, resource_path, value, None)
    }

    /// Creates the response answering `request`.
    pub fn response_for(request: &CommMessage, value: Value) -> Self {
        Self::new(
            request.id,
            request.operation.clone(),
            request.resource_path.clone(),
            value,
            None,
        )
    }

    /// Creates a fault response answering `request`.
    pub fn fault_response_for(request: &CommMessage, fault: Fault) -> Self {
        Self::new(
            request.id,
            request.operation.clone(),
            request.resource_path.clone(),
            Value::new(),
            Some(fault),
        )
    }

    /// The correlation id shared by a request and its response.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// The operation this message invokes or answers.
    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// The resource the operation is aimed at, `/` by default.
    pub fn resource_path(&self) -> &str {
        &self.resource_path
    }

    /// The payload.
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// The fault carried by a fault response.
    pub fn fault(&self) -> Option<&Fault> {
        self.fault.as_ref()
    }

    /// Returns true for fault responses.
    pub fn is_fault(&self) -> bool {
        self.fault.is_some()
    }

    /// Consumes the message and returns its payload.
    pub fn into_value(self) -> Value {
        self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_ids_are_unique() {
        let a = CommMessage::request("op", Value::new());
        let b = CommMessage::request("op", Value::new());
        assert_ne!(a.id(), b.id());
        assert_ne!(a.id(), 0);
    }

    #[tokio::test]
    async fn test_ids_unique_across_tasks() {
        let tasks: Vec<_> = (0..4)
            .map(|_| tokio::spawn(async { (0..250).map(|_| next_message_id()).collect::<Vec<_>>() }))
            .collect();
        let mut seen = std::collections::HashSet::new();
        for task in tasks {
            for id in task.await.unwrap() {
                assert!(seen.insert(id), "duplicate id {id}");
            }
        }
    }

    #[test]
    fn test_empty_resource_path_defaults() {
        let message = CommMessage::new(1, "op", "", Value::new(), None);
        assert_eq!(message.resource_path(), DEFAULT_RESOURCE_PATH);
    }

    #[test]
    fn test_fault_response_keeps_id() {
        let request = CommMessage::request_at("op", "/svc", Value::from(1));
        let response =
            CommMessage::fault_response_for(&request, Fault::new("TypeMismatch", Value::new()));
        assert_eq!(response.id(), request.id());
        assert_eq!(response.resource_path(), "/svc");
        assert!(response.is_fault());
        assert_eq!(response.fault().map(Fault::name), Some("TypeMismatch"));
    }

    #[test]
    fn test_fault_display() {
        let fault = Fault::new("IOException", Value::from("broken pipe"));
        assert_eq!(fault.to_string(), "fault IOException: broken pipe");
        assert_eq!(Fault::new("X", Value::new()).to_string(), "fault X");
    }
}
