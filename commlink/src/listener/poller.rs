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

//! Polling of channels that cannot block on a read.
//!
//! A single task wakes every poll interval, asks each registered channel
//! whether a receive would find data, and hands the ready ones to the
//! inbound scheduler for exactly one message. A channel is out of the
//! rotation while its message is served and rejoins afterwards if still open.

use super::InboundScheduler;
use crate::channel::{ChannelError, CommChannel};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

/// State shared by the poll loop and the dispatch tasks it spawns.
struct Shared {
    /// Channels waiting for data. A dispatched channel is out of the set
    /// until its message was served.
    channels: Mutex<Vec<Arc<dyn CommChannel>>>,
    scheduler: Arc<dyn InboundScheduler>,
}

impl Shared {
    /// Removes and returns the channels with data waiting.
    fn take_ready(&self) -> Vec<Arc<dyn CommChannel>> {
        let mut channels = self.channels.lock();
        let mut ready = Vec::new();
        channels.retain(|channel| {
            let Some(pollable) = channel.as_pollable() else {
                return false;
            };
            match pollable.is_ready() {
                Ok(true) => {
                    ready.push(Arc::clone(channel));
                    false
                }
                Ok(false) => true,
                Err(error) => {
                    debug!(location = %channel.location(), %error, "dropping channel from poll set");
                    false
                }
            }
        });
        ready
    }

    /// Serves one message from `channel` on a new task, then puts the
    /// channel back in the set if it is still open.
    fn dispatch(self: &Arc<Self>, channel: Arc<dyn CommChannel>) {
        let shared = Arc::clone(self);
        tokio::spawn(async move {
            let outcome = shared.scheduler.receive_once(channel.as_ref()).await;
            match outcome {
                Ok(()) if channel.is_open() => shared.channels.lock().push(channel),
                Ok(()) => {}
                Err(error) => {
                    if error.is_end_of_stream() || error.is_closed() {
                        debug!(location = %channel.location(), "polled channel ended");
                    } else {
                        warn!(location = %channel.location(), %error, "polled channel failed");
                    }
                    if let Err(error) = channel.close().await {
                        debug!(%error, "closing polled channel");
                    }
                }
            }
        });
    }
}

/// The single poll loop shared by every pollable channel.
pub struct PollScheduler {
    shared: Arc<Shared>,
    interval: Duration,
    shutdown: watch::Sender<bool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl PollScheduler {
    /// Creates a stopped poll loop that checks its channels every `interval`
    /// and serves ready ones through `scheduler`.
    ///
    /// Call [`PollScheduler::start`] to begin polling; channels may be
    /// registered before that.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use commlink::listener::{MessageHandler, PollScheduler, TaskScheduler};
    /// use std::sync::Arc;
    /// use std::time::Duration;
    ///
    /// # async fn example(handler: Arc<dyn MessageHandler>) {
    /// let poller = PollScheduler::new(
    ///     Arc::new(TaskScheduler::new(handler)),
    ///     Duration::from_millis(20),
    /// );
    /// poller.start();
    /// assert!(poller.is_empty());
    /// poller.shutdown().await;
    /// # }
    /// ```
    pub fn new(scheduler: Arc<dyn InboundScheduler>, interval: Duration) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            shared: Arc::new(Shared {
                channels: Mutex::new(Vec::new()),
                scheduler,
            }),
            interval,
            shutdown,
            task: Mutex::new(None),
        }
    }

    /// Adds `channel` to the poll set.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::NotPollable`] for channels without a readiness
    /// check and a closed error for channels that are already closed.
    pub fn register(&self, channel: Arc<dyn CommChannel>) -> Result<(), ChannelError> {
        if channel.as_pollable().is_none() {
            return Err(ChannelError::NotPollable);
        }
        if !channel.is_open() {
            return Err(channel.closed_error());
        }
        self.shared.channels.lock().push(channel);
        Ok(())
    }

    /// Number of channels waiting for data.
    pub fn len(&self) -> usize {
        self.shared.channels.lock().len()
    }

    /// Returns true when no channel waits for data.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Starts the poll loop. Later calls have no effect.
    pub fn start(&self) {
        let mut task = self.task.lock();
        if task.is_some() || *self.shutdown.borrow() {
            return;
        }
        let shared = Arc::clone(&self.shared);
        let mut shutdown = self.shutdown.subscribe();
        let mut ticks = tokio::time::interval(self.interval);
        ticks.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        *task = Some(tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.wait_for(|stop| *stop) => break,
                    _ = ticks.tick() => {
                        let ready = shared.take_ready();
                        if !ready.is_empty() {
                            trace!(ready = ready.len(), "dispatching polled channels");
                        }
                        for channel in ready {
                            shared.dispatch(channel);
                        }
                    }
                }
            }
        }));
    }

    /// Stops the poll loop and closes every channel still registered.
    pub async fn shutdown(&self) {
        self.shutdown.send_replace(true);
        let task = self.task.lock().take();
        if let Some(task) = task {
            if let Err(error) = task.await {
                warn!(%error, "poll loop ended abnormally");
            }
        }
        let channels = std::mem::take(&mut *self.shared.channels.lock());
        for channel in channels {
            if let Err(error) = channel.close().await {
                debug!(%error, "closing polled channel");
            }
        }
    }
}
