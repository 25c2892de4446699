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

//! The in-process acceptor for `local` locations.
//!
//! A `local` input port has no socket behind it. Each client request opens
//! a fresh channel pair, and the server end goes to the scheduler exactly
//! as an accepted socket connection would.

use super::{InboundScheduler, Listener};
use crate::channel::{ChannelError, CommChannel, InputPort, LocalChannel, LOCAL_LOCATION};
use crate::error::CommError;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info};

/// Accepts in-process conversations for an input port.
///
/// There is nothing to bind: [`LocalChannel`]s deliver their requests
/// straight to [`LocalListener::deliver`]. `run` only waits for shutdown.
pub struct LocalListener {
    port: Arc<InputPort>,
    scheduler: Arc<dyn InboundScheduler>,
    shutdown: watch::Sender<bool>,
}

impl LocalListener {
    /// Creates a running listener for `port` that hands every delivered
    /// conversation to `scheduler`.
    ///
    /// The listener is returned in an `Arc` because each [`LocalChannel`]
    /// keeps a reference to it.
    pub fn new(port: Arc<InputPort>, scheduler: Arc<dyn InboundScheduler>) -> Arc<Self> {
        let (shutdown, _) = watch::channel(false);
        Arc::new(Self {
            port,
            scheduler,
            shutdown,
        })
    }

    /// Opens a client channel to this listener.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use commlink::channel::{CommChannel, InputPort};
    /// use commlink::listener::{LocalListener, MessageHandler, TaskScheduler};
    /// use commlink::message::{CommMessage, Value};
    /// use std::sync::Arc;
    ///
    /// struct Echo;
    ///
    /// #[async_trait::async_trait]
    /// impl MessageHandler for Echo {
    ///     async fn handle(&self, request: CommMessage, _: &dyn CommChannel) -> Option<CommMessage> {
    ///         Some(CommMessage::response_for(&request, request.value().clone()))
    ///     }
    /// }
    ///
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let port = Arc::new(InputPort::new("main", "local", "sodep"));
    /// let listener = LocalListener::new(port, Arc::new(TaskScheduler::new(Arc::new(Echo))));
    /// let channel = listener.connect();
    /// let response = channel.request(&CommMessage::request("echo", Value::from(7))).await?;
    /// assert_eq!(response.value().int_value(), Some(7));
    /// # Ok(())
    /// # }
    /// ```
    pub fn connect(self: &Arc<Self>) -> LocalChannel {
        LocalChannel::new(Arc::clone(self))
    }

    /// Returns false once [`Listener::shutdown`] was called.
    pub fn is_running(&self) -> bool {
        !*self.shutdown.borrow()
    }

    /// Hands a server-side channel to the inbound scheduler.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::Closed`] once the listener was shut down.
    pub fn deliver(&self, channel: Arc<dyn CommChannel>) -> Result<(), ChannelError> {
        if !self.is_running() {
            return Err(ChannelError::Closed {
                location: LOCAL_LOCATION.to_string(),
            });
        }
        channel.state().set_parent_input_port(&self.port);
        self.scheduler.schedule_receive(channel);
        Ok(())
    }
}

#[async_trait]
impl Listener for LocalListener {
    fn input_port(&self) -> &Arc<InputPort> {
        &self.port
    }

    async fn run(&self) -> Result<(), CommError> {
        info!(port = self.port.name(), "serving local requests");
        let mut shutdown = self.shutdown.subscribe();
        let _ = shutdown.wait_for(|stop| *stop).await;
        debug!(port = self.port.name(), "local listener stopped");
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), CommError> {
        self.shutdown.send_replace(true);
        Ok(())
    }
}
