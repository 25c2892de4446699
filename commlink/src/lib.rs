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

#![allow(clippy::module_inception)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

//! # commlink - Transport Agnostic Communication Channels
//!
//! commlink runs one message-exchange API over many transports. A channel
//! sends and receives structured [`CommMessage`]s and correlates each
//! response with its request, whether the bytes travel over TCP, a local
//! socket, an in-process loopback, or a polled chunk bridge. Wire encoding
//! comes from protocol codecs that compose: a base codec can be wrapped in
//! TLS or in compression without knowing it.
//!
//! ## Architecture
//!
//! - **[`message`]**: messages, faults and structured values
//! - **[`transport`]**: byte streams (TCP, local sockets, memory pairs)
//! - **[`serialization`]**: serde encodings and length framing
//! - **[`protocol`]**: codecs (`sodep`, `json`, `postcard`) and wrappers
//!   (TLS, gzip)
//! - **[`channel`]**: the channel contract and its adapters
//! - **[`listener`]**: accept loops and inbound scheduling
//! - **[`registry`]**: scheme, listener and codec factories; locations
//! - **[`observation`]**: freshness of observed resource notifications
//! - **[`runtime`]**: the context that ties them together
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use commlink::channel::{CommChannel, OutputPort};
//! use commlink::config::CommConfig;
//! use commlink::message::{CommMessage, Value};
//! use commlink::registry::FactoryRegistry;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), commlink::CommError> {
//! let registry = Arc::new(FactoryRegistry::with_defaults());
//! let port = Arc::new(OutputPort::new("server", "socket://localhost:8000", "sodeps"));
//!
//! let channel = registry
//!     .open_channel(port.location(), &port, &CommConfig::default())
//!     .await?;
//! let request = CommMessage::request("status", Value::new());
//! let response = channel.request(&request).await?;
//! assert_eq!(response.id(), request.id());
//! channel.release().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! Each layer has its own error type, composed by [`CommError`]. Every error
//! converts into `std::io::Error` for callers that want one failure kind.
//! See the [`error`] module.
//!
//! ## Logging
//!
//! All diagnostics go through `tracing`. Install any subscriber to see
//! them; peer ordering anomalies are reported as warnings.

pub mod channel;
pub mod config;
pub mod error;
pub mod listener;
pub mod message;
pub mod observation;
pub mod protocol;
pub mod registry;
pub mod runtime;
pub mod serialization;
pub mod transport;

pub use channel::{ChannelError, CommChannel};
pub use config::CommConfig;
pub use error::{CommError, ConfigError};
pub use message::{CommMessage, Value};
pub use protocol::{Protocol, ProtocolError};
pub use registry::FactoryRegistry;
pub use runtime::CommCore;
pub use transport::{Transport, TransportError};
