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

//! Listeners and inbound scheduling.
//!
//! A [`Listener`] serves one input port: it accepts connections, builds a
//! channel with a fresh codec for each, and passes the channel to an
//! [`InboundScheduler`]. Channels that cannot block on a read are driven by
//! the [`PollScheduler`] instead.

mod local;
mod poller;
mod scheduler;
mod stream;
mod traits;

pub use local::LocalListener;
pub use poller::PollScheduler;
pub use scheduler::{InboundScheduler, MessageHandler, TaskScheduler};
#[cfg(unix)]
pub use stream::LocalSocketListener;
pub use stream::{SocketListener, StreamListener};
pub use traits::Listener;
