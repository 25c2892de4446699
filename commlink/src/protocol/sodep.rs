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

//! The `sodep` binary codec.
//!
//! All integers are big-endian.
//!
//! ```text
//! message := id:i64 resource:string operation:string faulted:u8 [fault] value
//! fault   := name:string value
//! value   := tag:u8 scalar count:i32 { name:string size:i32 value* }*
//! string  := len:i32 utf8[len]
//! ```
//!
//! Scalar tags: `0` none, `1` string, `2` i32, `3` f64, `4` bytes
//! (`len:i32` + raw), `5` bool (one byte), `6` i64.

use super::{Duplex, Protocol, ProtocolError, ProtocolParams};
use crate::message::{CommMessage, Fault, Scalar, Value};
use crate::serialization::framing::MAX_FRAME_SIZE;
use async_trait::async_trait;
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

const NAME: &str = "sodep";

/// Deepest value nesting accepted on decode.
pub const MAX_VALUE_DEPTH: usize = 128;

// Value type tags on the wire.
const TAG_NULL: u8 = 0;
const TAG_STRING: u8 = 1;
const TAG_INT: u8 = 2;
const TAG_DOUBLE: u8 = 3;
const TAG_BYTES: u8 = 4;
const TAG_BOOL: u8 = 5;
const TAG_LONG: u8 = 6;

/// Binary codec for [`CommMessage`]s. Stateless, hence thread safe.
///
/// Messages are not length-prefixed: the decoder reads field by field, so a
/// stream that ends early surfaces as an incomplete-input error rather than
/// a malformed message.
///
/// # Examples
///
/// ```rust
/// use commlink::message::{CommMessage, Value};
/// use commlink::protocol::{BufferDuplex, Protocol, ProtocolParams, SodepProtocol};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let codec = SodepProtocol::new(ProtocolParams::empty());
/// let message = CommMessage::request("sum", Value::new().with_child("x", 1).with_child("y", 2));
/// let bytes = codec.encode(&message)?;
///
/// // Half a message is not an error yet, only incomplete.
/// let mut partial = BufferDuplex::new(bytes[..bytes.len() / 2].to_vec());
/// assert!(codec.recv(&mut partial).await.unwrap_err().is_incomplete());
///
/// assert_eq!(codec.recv(&mut BufferDuplex::new(bytes)).await?, message);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct SodepProtocol {
    params: ProtocolParams,
    max_length: usize,
}

impl SodepProtocol {
    /// Creates the codec. `maxFrameSize` in `params` caps string and byte
    /// fields, 8 MiB by default.
    pub fn new(params: ProtocolParams) -> Self {
        let max_length = params
            .int("maxFrameSize", MAX_FRAME_SIZE as i64)
            .try_into()
            .unwrap_or(MAX_FRAME_SIZE);
        Self { params, max_length }
    }

    /// Caps every string and byte field accepted on decode.
    #[must_use]
    pub fn with_max_length(mut self, max_length: usize) -> Self {
        self.max_length = max_length;
        self
    }

    /// Encodes `message` into a standalone buffer.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::FrameTooLarge`] when a string, byte array or
    /// child list is longer than the configured maximum.
    pub fn encode(&self, message: &CommMessage) -> Result<Vec<u8>, ProtocolError> {
        let mut out = Vec::with_capacity(64);
        out.extend_from_slice(&(message.id() as i64).to_be_bytes());
        self.put_string(&mut out, message.resource_path())?;
        self.put_string(&mut out, message.operation())?;
        match message.fault() {
            Some(fault) => {
                out.push(1);
                self.put_string(&mut out, fault.name())?;
                self.put_value(&mut out, fault.value())?;
            }
            None => out.push(0),
        }
        self.put_value(&mut out, message.value())?;
        Ok(out)
    }

    /// Writes a big-endian `i32` length after checking it against the limit.
    fn put_length(&self, out: &mut Vec<u8>, len: usize) -> Result<(), ProtocolError> {
        if len > self.max_length || len > i32::MAX as usize {
            return Err(ProtocolError::FrameTooLarge {
                size: len,
                max: self.max_length,
            });
        }
        out.extend_from_slice(&(len as i32).to_be_bytes());
        Ok(())
    }

    fn put_string(&self, out: &mut Vec<u8>, s: &str) -> Result<(), ProtocolError> {
        self.put_length(out, s.len())?;
        out.extend_from_slice(s.as_bytes());
        Ok(())
    }

    /// Writes the scalar tag and payload, then every child vector in name
    /// order.
    fn put_value(&self, out: &mut Vec<u8>, value: &Value) -> Result<(), ProtocolError> {
        match value.scalar() {
            None => out.push(TAG_NULL),
            Some(Scalar::String(s)) => {
                out.push(TAG_STRING);
                self.put_string(out, s)?;
            }
            Some(Scalar::Int(i)) => {
                out.push(TAG_INT);
                out.extend_from_slice(&i.to_be_bytes());
            }
            Some(Scalar::Double(d)) => {
                out.push(TAG_DOUBLE);
                out.extend_from_slice(&d.to_be_bytes());
            }
            Some(Scalar::Bytes(b)) => {
                out.push(TAG_BYTES);
                self.put_length(out, b.len())?;
                out.extend_from_slice(b);
            }
            Some(Scalar::Bool(b)) => {
                out.push(TAG_BOOL);
                out.push(u8::from(*b));
            }
            Some(Scalar::Long(l)) => {
                out.push(TAG_LONG);
                out.extend_from_slice(&l.to_be_bytes());
            }
        }

        self.put_length(out, value.children().len())?;
        for (name, vector) in value.children() {
            self.put_string(out, name)?;
            self.put_length(out, vector.len())?;
            for child in vector {
                self.put_value(out, child)?;
            }
        }
        Ok(())
    }

    /// Reads a length, rejecting negative values and values over the limit
    /// before anything is allocated.
    async fn read_length(&self, stream: &mut dyn Duplex) -> Result<usize, ProtocolError> {
        let len = stream.read_i32().await?;
        if len < 0 {
            return Err(ProtocolError::malformed(NAME, format!("negative length {len}")));
        }
        let len = len as usize;
        if len > self.max_length {
            return Err(ProtocolError::FrameTooLarge {
                size: len,
                max: self.max_length,
            });
        }
        Ok(len)
    }

    async fn read_bytes(&self, stream: &mut dyn Duplex) -> Result<Vec<u8>, ProtocolError> {
        let len = self.read_length(stream).await?;
        let mut bytes = vec![0u8; len];
        stream.read_exact(&mut bytes).await?;
        Ok(bytes)
    }

    async fn read_string(&self, stream: &mut dyn Duplex) -> Result<String, ProtocolError> {
        let bytes = self.read_bytes(stream).await?;
        String::from_utf8(bytes)
            .map_err(|e| ProtocolError::malformed(NAME, format!("invalid UTF-8 string: {e}")))
    }

    /// Reads one value and its subtree. Boxed because it recurses.
    fn read_value<'a>(
        &'a self,
        stream: &'a mut dyn Duplex,
        depth: usize,
    ) -> BoxFuture<'a, Result<Value, ProtocolError>> {
        async move {
            if depth > MAX_VALUE_DEPTH {
                return Err(ProtocolError::malformed(
                    NAME,
                    format!("value nesting exceeds {MAX_VALUE_DEPTH}"),
                ));
            }

            let mut value = Value::new();
            match stream.read_u8().await? {
                TAG_NULL => {}
                TAG_STRING => value.set_scalar(self.read_string(stream).await?),
                TAG_INT => value.set_scalar(stream.read_i32().await?),
                TAG_DOUBLE => value.set_scalar(stream.read_f64().await?),
                TAG_BYTES => value.set_scalar(self.read_bytes(stream).await?),
                TAG_BOOL => value.set_scalar(stream.read_u8().await? != 0),
                TAG_LONG => value.set_scalar(stream.read_i64().await?),
                tag => {
                    return Err(ProtocolError::malformed(NAME, format!("unknown value tag {tag}")))
                }
            }

            let children = self.read_length(stream).await?;
            for _ in 0..children {
                let name = self.read_string(stream).await?;
                let size = self.read_length(stream).await?;
                for _ in 0..size {
                    let child = self.read_value(stream, depth + 1).await?;
                    value.add_child(name.clone(), child);
                }
            }
            Ok(value)
        }
        .boxed()
    }
}

#[async_trait]
impl Protocol for SodepProtocol {
    fn name(&self) -> String {
        NAME.to_string()
    }

    fn is_thread_safe(&self) -> bool {
        true
    }

    fn params(&self) -> &ProtocolParams {
        &self.params
    }

    async fn send(
        &self,
        stream: &mut dyn Duplex,
        message: &CommMessage,
    ) -> Result<(), ProtocolError> {
        let bytes = self.encode(message)?;
        stream.write_all(&bytes).await?;
        stream.flush().await?;
        Ok(())
    }

    async fn recv(&self, stream: &mut dyn Duplex) -> Result<CommMessage, ProtocolError> {
        let id = stream.read_i64().await? as u64;
        let resource_path = self.read_string(stream).await?;
        let operation = self.read_string(stream).await?;
        let fault = if stream.read_u8().await? != 0 {
            let name = self.read_string(stream).await?;
            let value = self.read_value(stream, 0).await?;
            Some(Fault::new(name, value))
        } else {
            None
        };
        let value = self.read_value(stream, 0).await?;
        Ok(CommMessage::new(id, operation, resource_path, value, fault))
    }
}
