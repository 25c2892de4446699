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

//! Serialization trait definitions.

use crate::message::CommMessage;
use crate::protocol::ProtocolError;

/// Encodes and decodes whole messages.
///
/// Implementations must be stateless with respect to individual messages so
/// one instance can serve concurrent senders.
pub trait MessageSerializer: Send + Sync + 'static {
    /// Short format name; also used as the codec name.
    fn name(&self) -> &'static str;

    /// Serializes `message` into a standalone byte buffer.
    fn encode(&self, message: &CommMessage) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes a message from exactly `bytes`.
    fn decode(&self, bytes: &[u8]) -> Result<CommMessage, ProtocolError>;
}
