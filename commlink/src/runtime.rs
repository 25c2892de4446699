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

//! The process-scoped communication context.
//!
//! A [`CommCore`] owns the factory registry, the configuration, the inbound
//! and poll schedulers, and every listener. It is started and shut down
//! explicitly; nothing here lives in global state.

use crate::channel::{BridgeChannel, ChannelError, CommChannel, InputPort, OutputPort};
use crate::config::CommConfig;
use crate::error::CommError;
use crate::listener::{InboundScheduler, Listener, MessageHandler, PollScheduler, TaskScheduler};
use crate::registry::{FactoryRegistry, Location};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// A listener the core owns, with its accept loop once started.
struct ServedListener {
    listener: Arc<dyn Listener>,
    task: Option<JoinHandle<()>>,
}

/// The runtime's communication context.
///
/// # Examples
///
/// ```rust,no_run
/// use commlink::channel::{CommChannel, InputPort, OutputPort};
/// use commlink::config::CommConfig;
/// use commlink::listener::MessageHandler;
/// use commlink::message::{CommMessage, Value};
/// use commlink::registry::FactoryRegistry;
/// use commlink::runtime::CommCore;
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
/// # async fn example() -> Result<(), commlink::CommError> {
/// let core = CommCore::new(
///     CommConfig::default(),
///     Arc::new(FactoryRegistry::with_defaults()),
///     Arc::new(Echo),
/// );
/// core.add_input_port(InputPort::new("main", "socket://127.0.0.1:9000", "sodep")).await?;
/// core.start();
///
/// let port = Arc::new(OutputPort::new("client", "socket://127.0.0.1:9000", "sodep"));
/// let channel = core.create_channel("socket://127.0.0.1:9000", &port).await?;
/// let response = channel.request(&CommMessage::request("echo", Value::from(1))).await?;
/// core.shutdown().await;
/// # Ok(())
/// # }
/// ```
pub struct CommCore {
    config: CommConfig,
    registry: Arc<FactoryRegistry>,
    scheduler: Arc<dyn InboundScheduler>,
    poller: PollScheduler,
    listeners: Mutex<Vec<ServedListener>>,
    started: AtomicBool,
    stopped: AtomicBool,
}

impl CommCore {
    /// Serves inbound messages with `handler`, one task per channel.
    pub fn new(
        config: CommConfig,
        registry: Arc<FactoryRegistry>,
        handler: Arc<dyn MessageHandler>,
    ) -> Self {
        Self::with_scheduler(config, registry, Arc::new(TaskScheduler::new(handler)))
    }

    /// Like [`new`](Self::new), but inbound messages go to `scheduler`.
    pub fn with_scheduler(
        config: CommConfig,
        registry: Arc<FactoryRegistry>,
        scheduler: Arc<dyn InboundScheduler>,
    ) -> Self {
        let poller = PollScheduler::new(Arc::clone(&scheduler), config.poll_interval);
        Self {
            config,
            registry,
            scheduler,
            poller,
            listeners: Mutex::new(Vec::new()),
            started: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
        }
    }

    /// The settings this context was created with.
    pub fn config(&self) -> &CommConfig {
        &self.config
    }

    /// The factories resolving schemes and codecs.
    pub fn registry(&self) -> &Arc<FactoryRegistry> {
        &self.registry
    }

    /// The scheduler polling event-driven channels.
    pub fn poller(&self) -> &PollScheduler {
        &self.poller
    }

    /// True between [`start`](Self::start) and [`shutdown`](Self::shutdown).
    pub fn is_running(&self) -> bool {
        self.started.load(Ordering::Acquire) && !self.stopped.load(Ordering::Acquire)
    }

    /// Fails with [`ChannelError::Closed`] once shut down.
    fn ensure_not_stopped(&self) -> Result<(), CommError> {
        if self.stopped.load(Ordering::Acquire) {
            return Err(ChannelError::Closed {
                location: "runtime".to_string(),
            }
            .into());
        }
        Ok(())
    }

    /// Runs the listener's accept loop on a new task, logging its failure.
    fn spawn_run(listener: &Arc<dyn Listener>) -> JoinHandle<()> {
        let listener = Arc::clone(listener);
        tokio::spawn(async move {
            if let Err(error) = listener.run().await {
                warn!(port = listener.input_port().name(), %error, "listener failed");
            }
        })
    }

    /// Binds a listener for `port`. It starts accepting once the context
    /// is started, or immediately if it already is.
    ///
    /// # Errors
    ///
    /// Fails after [`shutdown`](Self::shutdown), when the scheme or codec is
    /// not registered, when the codec settings are invalid, or when the
    /// location cannot be bound.
    pub async fn add_input_port(&self, port: InputPort) -> Result<Arc<dyn Listener>, CommError> {
        self.ensure_not_stopped()?;
        let params = self.config.apply_defaults(port.params());
        let port = Arc::new(port.with_params(params));
        let listener = self
            .registry
            .create_listener(Arc::clone(&port), Arc::clone(&self.scheduler), &self.config)
            .await?;
        info!(port = port.name(), location = port.location(), "input port added");

        let task = self.is_running().then(|| Self::spawn_run(&listener));
        self.listeners.lock().push(ServedListener {
            listener: Arc::clone(&listener),
            task,
        });
        Ok(listener)
    }

    /// Opens an outbound channel to `location` with `port`'s protocol.
    ///
    /// # Errors
    ///
    /// Fails after [`shutdown`](Self::shutdown), when the location cannot be
    /// resolved, or when the transport cannot connect.
    pub async fn create_channel(
        &self,
        location: &str,
        port: &Arc<OutputPort>,
    ) -> Result<Arc<dyn CommChannel>, CommError> {
        self.ensure_not_stopped()?;
        self.registry.open_channel(location, port, &self.config).await
    }

    /// Hands a pollable channel to the poll scheduler.
    ///
    /// # Errors
    ///
    /// Fails after [`shutdown`](Self::shutdown), for channels that cannot be
    /// polled, and for channels already closed.
    pub fn register_for_polling(&self, channel: Arc<dyn CommChannel>) -> Result<(), CommError> {
        self.ensure_not_stopped()?;
        Ok(self.poller.register(channel)?)
    }

    /// Connects a new chunk bridge to `port`.
    ///
    /// The serving end is polled and dispatched like any accepted channel;
    /// the returned end belongs to the caller.
    ///
    /// # Errors
    ///
    /// Fails after [`shutdown`](Self::shutdown), when the port's codec is
    /// unknown, or when its location does not parse.
    pub fn connect_bridge(&self, port: &Arc<InputPort>) -> Result<Arc<BridgeChannel>, CommError> {
        self.ensure_not_stopped()?;
        let protocols = self.registry.protocol_factory(port.protocol())?;
        let params = self.config.apply_defaults(port.params());
        let location = Location::parse(port.location())?;
        let (client, server) = BridgeChannel::pair(
            protocols.create_output_protocol(&params, &location)?,
            protocols.create_input_protocol(&params)?,
            self.config.bridge_depth,
            port.location(),
        )?;
        server.state().set_parent_input_port(port);
        self.poller.register(Arc::new(server))?;
        Ok(Arc::new(client))
    }

    /// Starts every listener and the poll scheduler. Later calls have no
    /// effect.
    pub fn start(&self) {
        if self.stopped.load(Ordering::Acquire) || self.started.swap(true, Ordering::AcqRel) {
            return;
        }
        for served in self.listeners.lock().iter_mut() {
            if served.task.is_none() {
                served.task = Some(Self::spawn_run(&served.listener));
            }
        }
        self.poller.start();
        info!("communication core started");
    }

    /// Stops every listener and the poll scheduler. Idempotent.
    pub async fn shutdown(&self) {
        if self.stopped.swap(true, Ordering::AcqRel) {
            return;
        }
        let listeners = std::mem::take(&mut *self.listeners.lock());
        for served in listeners {
            if let Err(error) = served.listener.shutdown().await {
                warn!(port = served.listener.input_port().name(), %error, "listener shutdown failed");
            }
            if let Some(task) = served.task {
                if let Err(error) = task.await {
                    debug!(%error, "listener task ended abnormally");
                }
            }
        }
        self.poller.shutdown().await;
        info!("communication core stopped");
    }
}
