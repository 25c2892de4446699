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

//! Dispatch of inbound messages.
//!
//! Listeners hand accepted channels to an [`InboundScheduler`]. The
//! [`TaskScheduler`] spawns one receive task per channel; each message is
//! passed to a [`MessageHandler`] and its response, if any, is sent back on
//! the same channel.

use crate::channel::{ChannelError, CommChannel};
use crate::message::CommMessage;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Application logic invoked for each inbound request.
///
/// # Examples
///
/// ```rust
/// use commlink::channel::CommChannel;
/// use commlink::listener::MessageHandler;
/// use commlink::message::{CommMessage, Fault, Value};
///
/// struct Divide;
///
/// #[async_trait::async_trait]
/// impl MessageHandler for Divide {
///     async fn handle(&self, request: CommMessage, _: &dyn CommChannel) -> Option<CommMessage> {
///         let x = request.value().first_child("x")?.int_value()?;
///         let y = request.value().first_child("y")?.int_value()?;
///         Some(match x.checked_div(y) {
///             Some(q) => CommMessage::response_for(&request, Value::from(q)),
///             None => CommMessage::fault_response_for(
///                 &request,
///                 Fault::new("DivisionByZero", Value::new()),
///             ),
///         })
///     }
/// }
/// ```
#[async_trait]
pub trait MessageHandler: Send + Sync {
    /// Handles `request`. A returned message is sent back as the response.
    async fn handle(&self, request: CommMessage, channel: &dyn CommChannel)
        -> Option<CommMessage>;
}

/// Receives from channels on behalf of the runtime.
#[async_trait]
pub trait InboundScheduler: Send + Sync {
    /// Serves every message `channel` delivers until it ends.
    fn schedule_receive(&self, channel: Arc<dyn CommChannel>);

    /// Serves exactly one message. Used for polled channels.
    async fn receive_once(&self, channel: &dyn CommChannel) -> Result<(), ChannelError>;
}

/// Spawns a tokio task per channel.
///
/// The task serves messages until the channel ends or is no longer open,
/// then closes it. A response is sent before the next message is read, so
/// responses leave in request order.
#[derive(Clone)]
pub struct TaskScheduler {
    handler: Arc<dyn MessageHandler>,
}

impl TaskScheduler {
    /// Creates a scheduler that passes every inbound message to `handler`.
    pub fn new(handler: Arc<dyn MessageHandler>) -> Self {
        Self { handler }
    }
}

/// Receives one message, runs the handler and sends its response back.
async fn serve_one(
    handler: &dyn MessageHandler,
    channel: &dyn CommChannel,
) -> Result<(), ChannelError> {
    let request = channel.recv().await?;
    trace!(message_id = request.id(), operation = request.operation(), "dispatching");
    if let Some(response) = handler.handle(request, channel).await {
        channel.send(&response).await?;
        channel.release().await?;
    }
    Ok(())
}

#[async_trait]
impl InboundScheduler for TaskScheduler {
    fn schedule_receive(&self, channel: Arc<dyn CommChannel>) {
        let handler = Arc::clone(&self.handler);
        tokio::spawn(async move {
            loop {
                match serve_one(handler.as_ref(), channel.as_ref()).await {
                    Ok(()) if channel.is_open() => {}
                    Ok(()) => break,
                    Err(error) if error.is_end_of_stream() || error.is_closed() => {
                        debug!(location = %channel.location(), "inbound channel ended");
                        break;
                    }
                    Err(error) => {
                        warn!(location = %channel.location(), %error, "inbound channel failed");
                        break;
                    }
                }
            }
            if let Err(error) = channel.close().await {
                debug!(%error, "closing inbound channel");
            }
        });
    }

    async fn receive_once(&self, channel: &dyn CommChannel) -> Result<(), ChannelError> {
        serve_one(self.handler.as_ref(), channel).await
    }
}
