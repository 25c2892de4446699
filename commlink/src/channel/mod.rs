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

//! Channel layer.
//!
//! A channel is a conversational endpoint bound to exactly one transport
//! resource and one codec. It sends and receives [`CommMessage`]s and
//! correlates each response with its request by message id.
//!
//! # Architecture
//!
//! - [`CommChannel`]: the contract, with the shared open/close/release rules
//!   implemented once as provided methods
//! - [`ChannelState`]: open and to-be-closed flags plus weak port references
//! - [`PendingResponses`]: id-keyed response slots with an early-arrival stash
//! - [`ResponseHandle`]: the future returned by
//!   [`CommChannel::recv_response_for`]; dropping it abandons the wait
//!
//! # Adapters
//!
//! | Channel | Transport | Receive model |
//! |---------|-----------|---------------|
//! | [`StreamingChannel`] | sockets, local sockets, memory pairs | blocking task |
//! | [`LocalChannel`] | in-process loopback | scheduled per request |
//! | [`ForwardingChannel`] | an inner channel | outbound only |
//! | [`BridgeChannel`] | chunk queues | polled |
//!
//! # Examples
//!
//! ```rust
//! use commlink::channel::{CommChannel, StreamingChannel};
//! use commlink::message::{CommMessage, Value};
//! use commlink::protocol::{ProtocolParams, SodepProtocol};
//! use commlink::transport::MemoryTransport;
//!
//! # async fn example() -> Result<(), commlink::channel::ChannelError> {
//! let (a, b) = MemoryTransport::pair_default();
//! let client = StreamingChannel::new(a, Box::new(SodepProtocol::new(ProtocolParams::empty())), "memory");
//! let server = StreamingChannel::new(b, Box::new(SodepProtocol::new(ProtocolParams::empty())), "memory");
//!
//! let request = CommMessage::request("ping", Value::new());
//! client.send(&request).await?;
//! let received = server.recv().await?;
//! server.send(&CommMessage::response_for(&received, Value::from("pong"))).await?;
//! # Ok(())
//! # }
//! ```
//!
//! [`CommMessage`]: crate::message::CommMessage

mod bridge;
mod error;
mod forwarding;
mod local;
mod pending;
mod port;
mod state;
mod streaming;
mod traits;

pub use bridge::{BridgeChannel, DEFAULT_BRIDGE_DEPTH};
pub use error::ChannelError;
pub use forwarding::ForwardingChannel;
pub use local::{LocalChannel, LocalPeerChannel, LOCAL_LOCATION};
pub use pending::{Completion, PendingResponses, PendingSlot, ResponseHandle, DEFAULT_STASH_LIMIT};
pub use port::{InputPort, OutputPort};
pub use state::ChannelState;
pub use streaming::StreamingChannel;
pub use traits::{ChannelOpener, CommChannel, PollableChannel};
