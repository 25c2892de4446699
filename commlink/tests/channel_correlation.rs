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

//! Integration tests for request/response correlation over real sockets.
//!
//! These tests verify that:
//! - concurrent requests on one channel each receive their own response
//! - a response read by one waiter is routed to the waiter it belongs to
//! - an abandoned wait does not disturb the others
//! - closing twice is harmless

use async_trait::async_trait;
use commlink::channel::{CommChannel, InputPort, OutputPort};
use commlink::listener::MessageHandler;
use commlink::message::{CommMessage, Value};
use commlink::{CommConfig, CommCore, FactoryRegistry};
use std::sync::Arc;
use std::time::Duration;

/// Answers `value * 10` after the delay named by the request.
struct Delayed;

#[async_trait]
impl MessageHandler for Delayed {
    async fn handle(&self, request: CommMessage, _channel: &dyn CommChannel) -> Option<CommMessage> {
        let delay = request.value().first_child("delay").and_then(Value::int_value).unwrap_or(0);
        tokio::time::sleep(Duration::from_millis(delay as u64)).await;
        let n = request.value().int_value().unwrap_or(-1);
        Some(CommMessage::response_for(&request, Value::from(n * 10)))
    }
}

async fn serve(protocol: &str) -> (CommCore, String) {
    init_tracing();
    let core = CommCore::new(
        CommConfig::default(),
        Arc::new(FactoryRegistry::with_defaults()),
        Arc::new(Delayed),
    );
    let listener = core
        .add_input_port(InputPort::new("calc", "socket://127.0.0.1:0", protocol))
        .await
        .unwrap();
    core.start();
    let addr = listener.local_addr().unwrap();
    (core, format!("socket://{addr}"))
}

fn request(n: i64, delay: i64) -> CommMessage {
    let mut value = Value::from(n);
    value.child_or_insert("delay").set_scalar(delay);
    CommMessage::request("times_ten", value)
}

/// Routes crate logs to the test harness. Set `RUST_LOG` to see them.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[tokio::test]
async fn test_sequential_requests_on_one_channel() {
    for protocol in ["sodep", "sodepz", "json", "postcard"] {
        let (core, location) = serve(protocol).await;
        let port = Arc::new(OutputPort::new("client", location.as_str(), protocol));
        let channel = core.create_channel(&location, &port).await.unwrap();

        for n in 0..20 {
            let req = request(n, 0);
            let response = channel.request(&req).await.unwrap();
            assert_eq!(response.id(), req.id(), "{protocol}");
            assert_eq!(response.value().int_value(), Some(n * 10), "{protocol}");
        }
        channel.close().await.unwrap();
        channel.close().await.unwrap();
        core.shutdown().await;
    }
}

#[tokio::test]
async fn test_concurrent_requests_share_a_channel() {
    let (core, location) = serve("sodep").await;
    let port = Arc::new(OutputPort::new("client", location.as_str(), "sodep"));
    let channel = core.create_channel(&location, &port).await.unwrap();

    let tasks: Vec<_> = (0..32)
        .map(|n| {
            let channel = channel.clone();
            tokio::spawn(async move {
                let req = request(n, 0);
                let response = channel.request(&req).await.unwrap();
                assert_eq!(response.id(), req.id());
                assert_eq!(response.value().int_value(), Some(n * 10));
            })
        })
        .collect();
    for task in tasks {
        task.await.unwrap();
    }
    core.shutdown().await;
}

#[tokio::test]
async fn test_responses_routed_when_read_by_another_waiter() {
    let (core, location) = serve("sodep").await;
    let port = Arc::new(OutputPort::new("client", location.as_str(), "sodep"));
    let channel = core.create_channel(&location, &port).await.unwrap();

    // Both requests go out before either response is awaited.
    let first = request(1, 50);
    let second = request(2, 0);
    let first_handle = channel.recv_response_for(&first);
    let second_handle = channel.recv_response_for(&second);
    channel.send(&first).await.unwrap();
    channel.send(&second).await.unwrap();

    // Awaiting the second reads the first response off the wire and
    // routes it to the other waiter.
    let fast_response = second_handle.await.unwrap();
    let slow_response = first_handle.await.unwrap();
    assert_eq!(slow_response.id(), first.id());
    assert_eq!(slow_response.value().int_value(), Some(10));
    assert_eq!(fast_response.id(), second.id());
    assert_eq!(fast_response.value().int_value(), Some(20));
    core.shutdown().await;
}

#[tokio::test]
async fn test_abandoned_wait_leaves_others_intact() {
    let (core, location) = serve("sodep").await;
    let port = Arc::new(OutputPort::new("client", location.as_str(), "sodep"));
    let channel = core.create_channel(&location, &port).await.unwrap();

    let abandoned = request(7, 200);
    let timed_out = tokio::time::timeout(Duration::from_millis(20), channel.request(&abandoned)).await;
    assert!(timed_out.is_err());

    // The late response to the abandoned request is discarded, and the
    // next request still gets its own answer.
    let next = request(8, 0);
    let response = channel.request(&next).await.unwrap();
    assert_eq!(response.id(), next.id());
    assert_eq!(response.value().int_value(), Some(80));
    core.shutdown().await;
}

#[tokio::test]
async fn test_closed_channel_rejects_requests() {
    let (core, location) = serve("sodep").await;
    let port = Arc::new(OutputPort::new("client", location.as_str(), "sodep"));
    let channel = core.create_channel(&location, &port).await.unwrap();
    channel.close().await.unwrap();
    let error = channel.request(&request(1, 0)).await.unwrap_err();
    assert!(error.is_closed());
    core.shutdown().await;
}

#[tokio::test]
async fn test_duplicate_opens_a_second_connection() {
    let (core, location) = serve("sodep").await;
    let port = Arc::new(OutputPort::new("client", location.as_str(), "sodep"));
    let channel = core.create_channel(&location, &port).await.unwrap();
    let duplicate = channel.create_duplicate().await.unwrap();

    channel.close().await.unwrap();
    let req = request(4, 0);
    assert_eq!(duplicate.request(&req).await.unwrap().value().int_value(), Some(40));
    core.shutdown().await;
}
