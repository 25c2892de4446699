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

//! Accept loops over byte-stream acceptors.
//!
//! One generic [`StreamListener`] serves every stream scheme. A failed
//! accept is logged and retried after a short pause; only shutdown ends
//! the loop.

use super::{InboundScheduler, Listener};
use crate::channel::{CommChannel, InputPort, StreamingChannel};
use crate::error::CommError;
use crate::registry::ProtocolFactory;
use crate::transport::{TcpAcceptor, TransportAddr, TransportListener};
use async_trait::async_trait;
use futures_util::FutureExt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, instrument, warn};

#[cfg(unix)]
use crate::transport::LocalSocketAcceptor;

/// Pause after a failed accept before trying again.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Listener for the `socket` scheme.
pub type SocketListener = StreamListener<TcpAcceptor>;

/// Listener for the `localsocket` scheme.
#[cfg(unix)]
pub type LocalSocketListener = StreamListener<LocalSocketAcceptor>;

/// Serves one input port from a [`TransportListener`].
///
/// Every accepted transport gets its own codec instance from the port's
/// protocol factory, becomes a [`StreamingChannel`] pointing back at the
/// port, and is handed to the inbound scheduler.
///
/// # Examples
///
/// ```rust,no_run
/// use commlink::channel::{CommChannel, InputPort};
/// use commlink::listener::{Listener, MessageHandler, SocketListener, TaskScheduler};
/// use commlink::message::CommMessage;
/// use commlink::registry::SodepProtocolFactory;
/// use commlink::transport::TcpAcceptor;
/// use std::sync::Arc;
///
/// struct Ignore;
///
/// #[async_trait::async_trait]
/// impl MessageHandler for Ignore {
///     async fn handle(&self, _: CommMessage, _: &dyn CommChannel) -> Option<CommMessage> {
///         None
///     }
/// }
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let port = Arc::new(InputPort::new("main", "socket://127.0.0.1:9000", "sodep"));
/// let listener = SocketListener::new(
///     port,
///     TcpAcceptor::bind("127.0.0.1:9000").await?,
///     Arc::new(SodepProtocolFactory),
///     Arc::new(TaskScheduler::new(Arc::new(Ignore))),
/// );
/// listener.run().await?;
/// # Ok(())
/// # }
/// ```
pub struct StreamListener<A: TransportListener> {
    port: Arc<InputPort>,
    local_addr: Option<TransportAddr>,
    acceptor: Mutex<Option<A>>,
    protocols: Arc<dyn ProtocolFactory>,
    scheduler: Arc<dyn InboundScheduler>,
    keep_alive: Option<bool>,
    shutdown: watch::Sender<bool>,
    released: AtomicBool,
}

impl<A: TransportListener> StreamListener<A> {
    /// Serves `port` from `acceptor`. Nothing is accepted until
    /// [`Listener::run`] is called.
    pub fn new(
        port: Arc<InputPort>,
        acceptor: A,
        protocols: Arc<dyn ProtocolFactory>,
        scheduler: Arc<dyn InboundScheduler>,
    ) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            port,
            local_addr: acceptor.local_addr().ok(),
            acceptor: Mutex::new(Some(acceptor)),
            protocols,
            scheduler,
            keep_alive: None,
            shutdown,
            released: AtomicBool::new(false),
        }
    }

    /// Overrides the codec's keep-alive choice for accepted channels.
    #[must_use]
    pub fn with_keep_alive(mut self, keep_alive: bool) -> Self {
        self.keep_alive = Some(keep_alive);
        self
    }

    /// Releases the acceptor's resource unless that already happened.
    fn release(&self, acceptor: &A) {
        if self.released.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Err(error) = acceptor.release() {
            warn!(port = self.port.name(), %error, "failed to release acceptor");
        }
    }

    /// Wraps an accepted transport in a channel and schedules it.
    fn accept_transport(&self, transport: A::Transport) -> Result<(), CommError> {
        let protocol = self.protocols.create_input_protocol(self.port.params())?;
        let channel = StreamingChannel::new(transport, protocol, self.port.location());
        if let Some(keep_alive) = self.keep_alive {
            channel.state().set_to_be_closed(!keep_alive);
        }
        channel.state().set_parent_input_port(&self.port);
        self.scheduler.schedule_receive(Arc::new(channel));
        Ok(())
    }
}

#[async_trait]
impl<A: TransportListener> Listener for StreamListener<A> {
    fn input_port(&self) -> &Arc<InputPort> {
        &self.port
    }

    fn local_addr(&self) -> Option<TransportAddr> {
        self.local_addr.clone()
    }

    #[instrument(skip(self), fields(port = %self.port.name(), location = %self.port.location()))]
    async fn run(&self) -> Result<(), CommError> {
        let mut slot = self.acceptor.lock().await;
        let Some(acceptor) = slot.as_ref() else {
            debug!("listener already stopped");
            return Ok(());
        };
        let mut shutdown = self.shutdown.subscribe();
        info!("accepting connections");

        loop {
            tokio::select! {
                _ = shutdown.wait_for(|stop| *stop).map(|_| ()) => break,
                accepted = acceptor.accept() => match accepted {
                    Ok(transport) => {
                        if let Err(error) = self.accept_transport(transport) {
                            warn!(%error, "dropping accepted connection");
                        }
                    }
                    Err(error) => {
                        warn!(%error, "accept failed");
                        // Persistent failures such as descriptor exhaustion
                        // would otherwise spin.
                        let mut stop = self.shutdown.subscribe();
                        tokio::select! {
                            _ = stop.wait_for(|stop| *stop).map(|_| ()) => break,
                            _ = tokio::time::sleep(ACCEPT_BACKOFF) => {}
                        }
                    }
                },
            }
        }

        self.release(acceptor);
        *slot = None;
        info!("listener stopped");
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), CommError> {
        self.shutdown.send_replace(true);
        // Waits for a running accept loop to let go of the acceptor.
        let mut slot = self.acceptor.lock().await;
        if let Some(acceptor) = slot.take() {
            self.release(&acceptor);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listener::{MessageHandler, TaskScheduler};
    use crate::message::{CommMessage, Value};
    use crate::protocol::{ProtocolParams, SodepProtocol};
    use crate::registry::SodepProtocolFactory;
    use crate::transport::{MemoryTransport, TcpTransport, TransportError};
    use std::io;
    use std::sync::atomic::AtomicUsize;

    struct Echo;

    #[async_trait]
    impl MessageHandler for Echo {
        async fn handle(
            &self,
            request: CommMessage,
            channel: &dyn CommChannel,
        ) -> Option<CommMessage> {
            let port = channel
                .state()
                .parent_input_port()
                .map(|port| port.name().to_string())
                .unwrap_or_default();
            Some(CommMessage::response_for(&request, Value::from(port)))
        }
    }

    #[tokio::test]
    async fn test_socket_listener_accepts_and_stops() {
        let acceptor = TcpAcceptor::bind("127.0.0.1:0").await.unwrap();
        let addr = acceptor.local_addr().unwrap().to_string();
        let port = Arc::new(InputPort::new("main", format!("socket://{addr}"), "sodep"));
        let listener = Arc::new(SocketListener::new(
            port,
            acceptor,
            Arc::new(SodepProtocolFactory),
            Arc::new(TaskScheduler::new(Arc::new(Echo))),
        ));
        let running = {
            let listener = listener.clone();
            tokio::spawn(async move { listener.run().await })
        };

        for _ in 0..2 {
            let transport = TcpTransport::connect(&addr).await.unwrap();
            let channel = StreamingChannel::new(
                transport,
                Box::new(SodepProtocol::new(ProtocolParams::empty())),
                "socket",
            );
            let request = CommMessage::request("who", Value::new());
            let response = channel.request(&request).await.unwrap();
            assert_eq!(response.value().str_value(), "main");
            channel.close().await.unwrap();
        }

        listener.shutdown().await.unwrap();
        listener.shutdown().await.unwrap();
        running.await.unwrap().unwrap();
        assert!(TcpTransport::connect(&addr).await.is_err());
    }

    #[tokio::test]
    async fn test_shutdown_before_run() {
        let acceptor = TcpAcceptor::bind("127.0.0.1:0").await.unwrap();
        let port = Arc::new(InputPort::new("idle", "socket://localhost:0", "sodep"));
        let listener = SocketListener::new(
            port,
            acceptor,
            Arc::new(SodepProtocolFactory),
            Arc::new(TaskScheduler::new(Arc::new(Echo))),
        );
        listener.shutdown().await.unwrap();
        listener.run().await.unwrap();
    }

    /// Fails every accept, counting the attempts.
    struct FailingAcceptor {
        attempts: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl TransportListener for FailingAcceptor {
        type Transport = MemoryTransport;

        async fn accept(&self) -> Result<MemoryTransport, TransportError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            Err(TransportError::AcceptFailed {
                source: io::Error::other("too many open files"),
            })
        }

        fn local_addr(&self) -> Result<TransportAddr, TransportError> {
            Ok(TransportAddr::Unnamed)
        }
    }

    #[tokio::test]
    async fn test_failing_accepts_back_off() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let port = Arc::new(InputPort::new("flaky", "socket://localhost:0", "sodep"));
        let listener = Arc::new(StreamListener::new(
            port,
            FailingAcceptor {
                attempts: attempts.clone(),
            },
            Arc::new(SodepProtocolFactory),
            Arc::new(TaskScheduler::new(Arc::new(Echo))),
        ));
        let running = {
            let listener = listener.clone();
            tokio::spawn(async move { listener.run().await })
        };

        tokio::time::sleep(Duration::from_millis(150)).await;
        listener.shutdown().await.unwrap();
        running.await.unwrap().unwrap();

        let attempts = attempts.load(Ordering::SeqCst);
        assert!((1..=3).contains(&attempts), "{attempts} accept attempts");
    }
}
