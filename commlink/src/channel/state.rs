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

//! State shared by every channel implementation.

use super::{InputPort, OutputPort};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

/// Lifecycle flags and back-references of a channel.
///
/// `open` only ever goes from true to false. `to_be_closed` defaults to
/// true; keep-alive transports clear it so that `release` leaves the
/// transport open for reuse.
#[derive(Debug)]
pub struct ChannelState {
    location: String,
    open: AtomicBool,
    to_be_closed: AtomicBool,
    parent_input_port: RwLock<Weak<InputPort>>,
    parent_output_port: RwLock<Weak<OutputPort>>,
}

impl ChannelState {
    /// Creates the state of an open channel bound to `location`, marked to be
    /// closed after use and without parent ports.
    pub fn new(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            open: AtomicBool::new(true),
            to_be_closed: AtomicBool::new(true),
            parent_input_port: RwLock::new(Weak::new()),
            parent_output_port: RwLock::new(Weak::new()),
        }
    }

    /// Builder form of [`ChannelState::set_to_be_closed`].
    #[must_use]
    pub fn with_to_be_closed(self, to_be_closed: bool) -> Self {
        self.set_to_be_closed(to_be_closed);
        self
    }

    /// The location the channel was opened for.
    pub fn location(&self) -> &str {
        &self.location
    }

    /// Returns true until the channel is closed.
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    /// Marks the channel closed. Returns true for the first caller only.
    pub fn mark_closed(&self) -> bool {
        self.open.swap(false, Ordering::AcqRel)
    }

    /// Returns true when a release should close the channel instead of
    /// keeping it for reuse.
    pub fn to_be_closed(&self) -> bool {
        self.to_be_closed.load(Ordering::Acquire)
    }

    /// Sets whether a release closes the channel.
    ///
    /// Failed operations set this so the broken channel is not reused.
    pub fn set_to_be_closed(&self, to_be_closed: bool) {
        self.to_be_closed.store(to_be_closed, Ordering::Release);
    }

    /// The input port that accepted this channel, if it is still alive.
    pub fn parent_input_port(&self) -> Option<Arc<InputPort>> {
        self.parent_input_port.read().upgrade()
    }

    /// Points back at the input port that accepted this channel.
    pub fn set_parent_input_port(&self, port: &Arc<InputPort>) {
        *self.parent_input_port.write() = Arc::downgrade(port);
    }

    /// The output port this channel was opened for, if it is still alive.
    pub fn parent_output_port(&self) -> Option<Arc<OutputPort>> {
        self.parent_output_port.read().upgrade()
    }

    /// Points back at the output port this channel was opened for.
    pub fn set_parent_output_port(&self, port: &Arc<OutputPort>) {
        *self.parent_output_port.write() = Arc::downgrade(port);
    }
}
