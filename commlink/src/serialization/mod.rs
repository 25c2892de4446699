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

//! Serde-backed message serialization.
//!
//! A [`MessageSerializer`] turns a [`CommMessage`](crate::message::CommMessage)
//! into bytes and back. The serde codecs in [`crate::protocol`] combine a
//! serializer with length-prefixed [`framing`].
//!
//! - [`JsonSerializer`]: human readable, handy while debugging
//! - [`PostcardSerializer`]: compact binary

pub mod framing;
mod json;
mod postcard;
mod traits;

pub use json::JsonSerializer;
pub use postcard::PostcardSerializer;
pub use traits::MessageSerializer;
