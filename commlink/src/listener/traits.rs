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

//! The listener contract.

use crate::channel::InputPort;
use crate::error::CommError;
use crate::transport::TransportAddr;
use async_trait::async_trait;
use std::sync::Arc;

/// Accepts inbound connections for one input port.
///
/// `run` blocks in an accept loop until `shutdown` is called, handing each
/// accepted channel to the inbound scheduler. `shutdown` may be called at
/// any time, any number of times; the bound resource is released once.
#[async_trait]
pub trait Listener: Send + Sync {
    /// The port this listener serves.
    fn input_port(&self) -> &Arc<InputPort>;

    /// The bound address, for listeners bound to one.
    fn local_addr(&self) -> Option<TransportAddr> {
        None
    }

    /// Runs the accept loop until [`Listener::shutdown`] is called.
    ///
    /// A failed accept is logged and the loop continues; one bad connection
    /// never stops the listener.
    ///
    /// # Errors
    ///
    /// Returns an error only when the loop cannot start at all.
    async fn run(&self) -> Result<(), CommError>;

    /// Stops the accept loop and releases the bound resource.
    ///
    /// Safe before `run`, while it runs and after it returned. Filesystem
    /// socket nodes are removed exactly once.
    async fn shutdown(&self) -> Result<(), CommError>;
}
