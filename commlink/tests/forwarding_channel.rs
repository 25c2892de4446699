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

//! Integration tests for publish/subscribe forwarding over a socket.
//!
//! A subscriber process side is simulated by a listener whose handler
//! reports every delivered message id. The publisher holds each send until
//! the subscriber's acknowledgement is turned into a release.

use async_trait::async_trait;
use commlink::channel::{CommChannel, ForwardingChannel, InputPort, OutputPort};
use commlink::listener::MessageHandler;
use commlink::message::{CommMessage, Value};
use commlink::{ChannelError, CommConfig, CommCore, FactoryRegistry};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Reports delivered message ids and never answers.
struct Subscriber {
    delivered: mpsc::UnboundedSender<(u64, String)>,
}

#[async_trait]
impl MessageHandler for Subscriber {
    async fn handle(&self, message: CommMessage, _channel: &dyn CommChannel) -> Option<CommMessage> {
        let _ = self.delivered.send((message.id(), message.value().str_value()));
        None
    }
}

async fn publisher() -> (CommCore, Arc<ForwardingChannel>, mpsc::UnboundedReceiver<(u64, String)>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let core = CommCore::new(
        CommConfig::default(),
        Arc::new(FactoryRegistry::with_defaults()),
        Arc::new(Subscriber { delivered: tx }),
    );
    let listener = core
        .add_input_port(InputPort::new("events", "socket://127.0.0.1:0", "sodep"))
        .await
        .unwrap();
    core.start();

    let location = format!("socket://{}", listener.local_addr().unwrap());
    let port = Arc::new(OutputPort::new("events", location.as_str(), "sodep"));
    let inner = core.create_channel(&location, &port).await.unwrap();
    (core, Arc::new(ForwardingChannel::new(inner)), rx)
}

#[tokio::test]
async fn test_publish_waits_for_subscriber_release() {
    let (core, forwarding, mut delivered) = publisher().await;

    let event = CommMessage::request("notify", Value::from("temperature=21"));
    let send = tokio::spawn({
        let forwarding = forwarding.clone();
        let event = event.clone();
        async move { forwarding.send(&event).await }
    });

    let (id, body) = delivered.recv().await.unwrap();
    assert_eq!(id, event.id());
    assert_eq!(body, "temperature=21");
    assert!(!send.is_finished());
    assert_eq!(forwarding.awaiting_release(), 1);

    assert!(forwarding.send_release(id));
    send.await.unwrap().unwrap();
    assert_eq!(forwarding.awaiting_release(), 0);
    core.shutdown().await;
}

#[tokio::test]
async fn test_releases_arrive_out_of_order() {
    let (core, forwarding, mut delivered) = publisher().await;

    let events: Vec<_> = (0..3)
        .map(|i| CommMessage::request("notify", Value::from(format!("event-{i}"))))
        .collect();
    let sends: Vec<_> = events
        .iter()
        .cloned()
        .map(|event| {
            let forwarding = forwarding.clone();
            tokio::spawn(async move { forwarding.send(&event).await })
        })
        .collect();

    let mut ids = Vec::new();
    for _ in 0..3 {
        ids.push(delivered.recv().await.unwrap().0);
    }
    ids.sort_unstable();

    for id in ids.iter().rev() {
        assert!(forwarding.send_release(*id));
    }
    for send in sends {
        send.await.unwrap().unwrap();
    }
    // A late duplicate acknowledgement is ignored.
    assert!(!forwarding.send_release(ids[0]));
    core.shutdown().await;
}

#[tokio::test]
async fn test_close_cancels_pending_publish() {
    let (core, forwarding, mut delivered) = publisher().await;

    let event = CommMessage::request("notify", Value::from("lost"));
    let send = tokio::spawn({
        let forwarding = forwarding.clone();
        async move { forwarding.send(&event).await }
    });
    delivered.recv().await.unwrap();

    forwarding.close().await.unwrap();
    let outcome = tokio::time::timeout(Duration::from_secs(5), send)
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(outcome, Err(ChannelError::Cancelled { .. })));
    assert!(!forwarding.inner().is_open());
    core.shutdown().await;
}

#[tokio::test]
async fn test_side_channel_forwards_independently() {
    let (core, forwarding, mut delivered) = publisher().await;

    let duplicate = forwarding.inner().create_duplicate().await.unwrap();
    let side = forwarding.create_with_side_channel(duplicate).unwrap();

    let event = CommMessage::request("notify", Value::from("via side"));
    let send = tokio::spawn({
        let side = side.clone();
        let event = event.clone();
        async move { side.send(&event).await }
    });
    let (id, body) = delivered.recv().await.unwrap();
    assert_eq!(body, "via side");

    // The original forwarder knows nothing about the side channel's sends.
    assert!(!forwarding.send_release(id));
    assert_eq!(forwarding.awaiting_release(), 0);
    side.close().await.unwrap();
    assert!(send.await.unwrap().is_err());
    core.shutdown().await;
}
