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

//! Port descriptors.
//!
//! A port names an endpoint together with the protocol spoken there. Input
//! ports are served by listeners; output ports are used to open outbound
//! channels. Channels keep only a weak back-reference to their port.

use crate::protocol::ProtocolParams;

/// An endpoint this process listens on.
#[derive(Debug, Clone)]
pub struct InputPort {
    name: String,
    location: String,
    protocol: String,
    params: ProtocolParams,
}

impl InputPort {
    /// Creates an input port named `name` that listens on `location` and
    /// speaks `protocol`.
    ///
    /// The location is resolved through the registry when the port is added
    /// to a [`CommCore`](crate::CommCore), so `ini:` and `auto:` indirections
    /// are accepted here unchanged.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use commlink::channel::InputPort;
    /// use commlink::message::Value;
    /// use commlink::protocol::ProtocolParams;
    ///
    /// let port = InputPort::new("api", "socket://0.0.0.0:9000", "sodeps").with_params(
    ///     ProtocolParams::new(
    ///         Value::new().with_child("ssl", Value::new().with_child("keyStore", "server.pem")),
    ///     ),
    /// );
    /// assert_eq!(port.protocol(), "sodeps");
    /// assert!(port.params().child("ssl").has("keyStore"));
    /// ```
    pub fn new(
        name: impl Into<String>,
        location: impl Into<String>,
        protocol: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            location: location.into(),
            protocol: protocol.into(),
            params: ProtocolParams::empty(),
        }
    }

    /// Replaces the codec parameters handed to every channel of this port.
    #[must_use]
    pub fn with_params(mut self, params: ProtocolParams) -> Self {
        self.params = params;
        self
    }

    /// The port name, used in logs and by message handlers.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The location as configured, before resolution.
    pub fn location(&self) -> &str {
        &self.location
    }

    /// Name of the codec factory serving this port.
    pub fn protocol(&self) -> &str {
        &self.protocol
    }

    /// Parameters handed to the codec of every accepted channel.
    pub fn params(&self) -> &ProtocolParams {
        &self.params
    }
}

/// An endpoint this process sends to.
#[derive(Debug, Clone)]
pub struct OutputPort {
    name: String,
    location: String,
    protocol: String,
    params: ProtocolParams,
}

impl OutputPort {
    /// Creates an output port named `name` that sends to `location` with
    /// `protocol`.
    ///
    /// The location may be overridden per call with
    /// [`OutputPort::with_location`]; the protocol and its parameters stay.
    pub fn new(
        name: impl Into<String>,
        location: impl Into<String>,
        protocol: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            location: location.into(),
            protocol: protocol.into(),
            params: ProtocolParams::empty(),
        }
    }

    /// Replaces the codec parameters used for outbound channels.
    #[must_use]
    pub fn with_params(mut self, params: ProtocolParams) -> Self {
        self.params = params;
        self
    }

    /// Returns a copy bound to another location.
    #[must_use]
    pub fn with_location(&self, location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            ..self.clone()
        }
    }

    /// The port name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The default destination of this port.
    pub fn location(&self) -> &str {
        &self.location
    }

    /// Name of the codec factory used for outbound channels.
    pub fn protocol(&self) -> &str {
        &self.protocol
    }

    /// Parameters handed to the codec of every outbound channel.
    pub fn params(&self) -> &ProtocolParams {
        &self.params
    }
}
