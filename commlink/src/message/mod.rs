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

//! Messages and structured values.
//!
//! [`CommMessage`] is the envelope every channel carries. Its payload is a
//! [`Value`] tree and it may hold a [`Fault`] instead of a regular result.

#[allow(clippy::module_inception)]
mod message;
mod value;

pub use message::{next_message_id, CommMessage, Fault, DEFAULT_RESOURCE_PATH};
pub use value::{Scalar, Value};
