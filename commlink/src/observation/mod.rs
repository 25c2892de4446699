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

//! Tracking of observed remote resources.
//!
//! Observed resources push notifications that may arrive out of order. The
//! [`ObservationTracker`] keeps the latest accepted status per remote
//! endpoint and token and discards stale notifications using
//! [`is_received_status_newer`].

mod events;
mod status;
mod tracker;

pub use events::{
    EventDispatcher, ObservationCancelHandler, ObservationEvent, RemoteSocketChangeHandler,
    Token, TokenReleaseHandler,
};
pub use status::{
    is_received_status_newer, ResourceStatusAge, SEQUENCE_HALF, SEQUENCE_MODULUS,
    STALENESS_WINDOW_MS,
};
pub use tracker::{now_millis, ObservationTracker};
