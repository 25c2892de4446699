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

//! Protocol codecs.
//!
//! A codec turns [`CommMessage`](crate::message::CommMessage)s into bytes on
//! a [`Duplex`] stream and back. Codecs compose: a wrapper holds an inner
//! codec and hands it an adapter stream, so the inner codec never knows it
//! is not writing to the transport directly.
//!
//! | name | codec |
//! |---|---|
//! | `sodep` | [`SodepProtocol`], tagged binary values |
//! | `json`, `postcard` | [`SerdeProtocol`] over length frames |
//! | `<inner>s` | [`TlsProtocol`] around `<inner>` |
//! | `<inner>z` | [`CompressedProtocol`] around `<inner>` |
//!
//! # Examples
//!
//! ```rust
//! use commlink::message::{CommMessage, Value};
//! use commlink::protocol::{BufferDuplex, Protocol, ProtocolParams, SodepProtocol};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let codec = SodepProtocol::new(ProtocolParams::empty());
//! let message = CommMessage::request("ping", Value::from(1));
//!
//! let mut wire = BufferDuplex::default();
//! codec.send(&mut wire, &message).await?;
//!
//! let mut reader = BufferDuplex::new(wire.take_output());
//! assert_eq!(codec.recv(&mut reader).await?, message);
//! # Ok(())
//! # }
//! ```

mod buffer;
mod compressed;
mod error;
mod params;
pub mod pipeline;
mod serde_codec;
mod sodep;
pub mod tls;
mod traits;

pub use buffer::BufferDuplex;
pub use compressed::CompressedProtocol;
pub use error::ProtocolError;
pub use params::ProtocolParams;
pub use pipeline::{GzipStage, LengthFramingStage, Pipeline, PipelineStage};
pub use serde_codec::{JsonProtocol, PostcardProtocol, SerdeProtocol};
pub use sodep::{SodepProtocol, MAX_VALUE_DEPTH};
pub use tls::TlsProtocol;
pub use traits::{Duplex, Protocol};
