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

//! Integration tests for the `sodeps` protocol over TCP.
//!
//! A self-signed certificate is generated per test and written as a PEM
//! key store. The client trusts the same file and connects by host name so
//! that certificate verification runs for real.

use async_trait::async_trait;
use commlink::channel::{CommChannel, InputPort, OutputPort};
use commlink::listener::MessageHandler;
use commlink::message::{CommMessage, Value};
use commlink::protocol::ProtocolParams;
use commlink::{CommConfig, CommCore, FactoryRegistry};
use std::io::Write;
use std::sync::Arc;
use tempfile::NamedTempFile;

struct Echo;

#[async_trait]
impl MessageHandler for Echo {
    async fn handle(&self, request: CommMessage, _channel: &dyn CommChannel) -> Option<CommMessage> {
        let value = request.value().clone();
        Some(CommMessage::response_for(&request, value))
    }
}

fn key_store() -> NamedTempFile {
    let cert = rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(cert.serialize_pem().unwrap().as_bytes()).unwrap();
    file.write_all(cert.serialize_private_key_pem().as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

fn ssl(name: &str, path: &NamedTempFile, version: &str) -> ProtocolParams {
    let path = path.path().to_string_lossy().into_owned();
    ProtocolParams::new(Value::new().with_child(
        "ssl",
        Value::new().with_child(name, path).with_child("protocol", version),
    ))
}

async fn serve(store: &NamedTempFile, version: &str) -> (CommCore, u16) {
    let core = CommCore::new(
        CommConfig::default(),
        Arc::new(FactoryRegistry::with_defaults()),
        Arc::new(Echo),
    );
    let port = InputPort::new("secure", "socket://127.0.0.1:0", "sodeps")
        .with_params(ssl("keyStore", store, version));
    let listener = core.add_input_port(port).await.unwrap();
    core.start();
    let addr = listener.local_addr().and_then(|a| a.as_socket_addr()).unwrap();
    (core, addr.port())
}

fn client(store: &NamedTempFile, port: u16, version: &str) -> (String, Arc<OutputPort>) {
    let location = format!("socket://localhost:{port}");
    let output = OutputPort::new("secure", location.as_str(), "sodeps")
        .with_params(ssl("trustStore", store, version));
    (location, Arc::new(output))
}

#[tokio::test]
async fn test_payloads_of_various_sizes() {
    let store = key_store();
    let (core, port) = serve(&store, "TLSv1.3").await;
    let (location, output) = client(&store, port, "TLSv1.3");
    let channel = core.create_channel(&location, &output).await.unwrap();

    // Sizes straddle the TLS record limit.
    for size in [0usize, 1, 100, 16 * 1024, 16 * 1024 + 1, 200 * 1024] {
        let payload: Vec<u8> = (0..size).map(|i| (i % 251) as u8).collect();
        let request = CommMessage::request("echo", Value::from(payload.clone()));
        let response = channel.request(&request).await.unwrap();
        assert_eq!(response.id(), request.id());
        assert_eq!(response.value(), &Value::from(payload), "size {size}");
    }

    channel.close().await.unwrap();
    core.shutdown().await;
}

#[tokio::test]
async fn test_tls12_round_trip() {
    let store = key_store();
    let (core, port) = serve(&store, "TLSv1.2").await;
    let (location, output) = client(&store, port, "TLSv1.2");
    let channel = core.create_channel(&location, &output).await.unwrap();

    let request = CommMessage::request("echo", Value::from("over tls 1.2"));
    let response = channel.request(&request).await.unwrap();
    assert_eq!(response.value().str_value(), "over tls 1.2");
    core.shutdown().await;
}

#[tokio::test]
async fn test_many_requests_on_one_session() {
    let store = key_store();
    let (core, port) = serve(&store, "TLSv1.3").await;
    let (location, output) = client(&store, port, "TLSv1.3");
    let channel = core.create_channel(&location, &output).await.unwrap();

    for i in 0..50i64 {
        let request = CommMessage::request("echo", Value::from(i));
        let response = channel.request(&request).await.unwrap();
        assert_eq!(response.value().int_value(), Some(i));
    }
    core.shutdown().await;
}

#[tokio::test]
async fn test_untrusted_server_fails_request() {
    let store = key_store();
    let other = key_store();
    let (core, port) = serve(&store, "TLSv1.3").await;
    let (location, output) = client(&other, port, "TLSv1.3");

    // The handshake runs lazily, so the failure surfaces on first use.
    let outcome = match core.create_channel(&location, &output).await {
        Ok(channel) => channel
            .request(&CommMessage::request("echo", Value::from(1)))
            .await
            .map(|_| ()),
        Err(_) => return core.shutdown().await,
    };
    assert!(outcome.is_err());
    core.shutdown().await;
}

#[tokio::test]
async fn test_bad_server_settings_rejected_when_port_is_added() {
    let core = CommCore::new(
        CommConfig::default(),
        Arc::new(FactoryRegistry::with_defaults()),
        Arc::new(Echo),
    );
    let missing = InputPort::new("secure", "socket://127.0.0.1:0", "sodeps");
    let error = core.add_input_port(missing).await.err().unwrap();
    assert!(error.is_configuration_error(), "{error}");

    let store = key_store();
    let old_version = InputPort::new("secure", "socket://127.0.0.1:0", "sodeps")
        .with_params(ssl("keyStore", &store, "SSLv3"));
    let error = core.add_input_port(old_version).await.err().unwrap();
    assert!(error.is_configuration_error(), "{error}");
    core.shutdown().await;
}
