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

//! TLS security adapter.
//!
//! [`TlsProtocol`] wraps any other codec and secures its byte stream. The
//! record layer is driven through the buffer-oriented [`CryptoEngine`]
//! abstraction, so the handshake and record processing run over whatever
//! partial bytes the transport delivers:
//!
//! - [`engine`]: the engine contract and its status codes
//! - [`RustlsEngine`]: the engine implemented on `rustls`
//! - [`TlsStream`]: the cleartext adapter stream the inner codec talks to
//! - [`TlsSettings`]: the `ssl.*` protocol parameters
//!
//! # Configuration
//!
//! ```text
//! ssl.protocol          TLSv1.3 | TLSv1.2 | TLS
//! ssl.keyStore          PEM file with certificate chain and private key
//! ssl.trustStore        PEM file with trusted certificates
//! ssl.wantClientAuth    1 | 0
//! ```
//!
//! The registry's `sodeps` factory rejects a server port without
//! `ssl.keyStore` when the port is added. A [`TlsProtocol`] built by hand
//! reports the same configuration error on first use.

pub mod engine;
mod protocol;
mod rustls_engine;
mod settings;
mod stream;

pub use engine::{
    CryptoEngine, DelegatedTask, EngineFactory, EngineMode, EngineResult, EngineStatus,
    HandshakeStatus,
};
pub use protocol::{TlsProtocol, DEFAULT_SERVER_NAME};
pub use rustls_engine::{
    RustlsEngine, RustlsEngineFactory, APPLICATION_BUFFER_SIZE, PACKET_BUFFER_SIZE,
};
pub use settings::{load_key_store, TlsSettings, TlsVersion, PEM_FORMAT};
pub use stream::{TlsBuffers, TlsStream, DEFAULT_WRITE_CAPACITY};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{CommMessage, Value};
    use crate::protocol::{Protocol, ProtocolError, ProtocolParams, SodepProtocol};
    use crate::transport::MemoryTransport;
    use std::io::Write;

    fn key_store() -> tempfile::NamedTempFile {
        let cert = rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(cert.serialize_pem().unwrap().as_bytes()).unwrap();
        file.write_all(cert.serialize_private_key_pem().as_bytes()).unwrap();
        file
    }

    fn params(ssl: Value) -> ProtocolParams {
        ProtocolParams::new(Value::new().with_child("ssl", ssl))
    }

    fn sodeps(ssl: Value, mode: EngineMode) -> TlsProtocol {
        let inner = SodepProtocol::new(params(ssl));
        TlsProtocol::new(Box::new(inner), mode, Some("localhost"))
    }

    #[tokio::test]
    async fn test_request_response_over_rustls() {
        let file = key_store();
        let path = file.path().to_string_lossy().to_string();
        for version in ["TLSv1.3", "TLSv1.2"] {
            let server = sodeps(
                Value::new()
                    .with_child("protocol", version)
                    .with_child("keyStore", path.as_str()),
                EngineMode::Server,
            );
            let client = sodeps(
                Value::new()
                    .with_child("protocol", version)
                    .with_child("trustStore", path.as_str()),
                EngineMode::Client,
            );
            assert_eq!(client.name(), "sodeps");

            let (mut client_io, mut server_io) = MemoryTransport::pair_default();
            let request = CommMessage::request("echo", Value::from("x".repeat(40_000)));

            let (sent, received) = tokio::join!(
                client.send(&mut client_io, &request),
                server.recv(&mut server_io)
            );
            sent.unwrap();
            let received = received.unwrap();
            assert_eq!(received, request);

            let response = CommMessage::response_for(&received, Value::from("done"));
            let (sent, answer) = tokio::join!(
                server.send(&mut server_io, &response),
                client.recv(&mut client_io)
            );
            sent.unwrap();
            assert_eq!(answer.unwrap().id(), request.id());

            client.close(&mut client_io).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_server_without_key_store_fails_on_first_use() {
        let server = sodeps(Value::new(), EngineMode::Server);
        let (_client_io, mut server_io) = MemoryTransport::pair_default();

        let error = server.recv(&mut server_io).await.unwrap_err();
        assert!(matches!(error, ProtocolError::Configuration(_)));

        // A failed build leaves the codec uninitialized rather than wedged.
        let again = server.recv(&mut server_io).await.unwrap_err();
        assert!(matches!(again, ProtocolError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_untrusted_server_fails_handshake() {
        let server_keys = key_store();
        let other_keys = key_store();
        let server = sodeps(
            Value::new().with_child("keyStore", server_keys.path().to_string_lossy().as_ref()),
            EngineMode::Server,
        );
        let client = sodeps(
            Value::new().with_child("trustStore", other_keys.path().to_string_lossy().as_ref()),
            EngineMode::Client,
        );

        let (mut client_io, mut server_io) = MemoryTransport::pair_default();
        let request = CommMessage::request("echo", Value::new());
        let client_side = async {
            let mut io = client_io;
            let result = client.send(&mut io, &request).await;
            // Release the transport so the server sees the peer go away.
            drop(io);
            result
        };
        let (sent, received) = tokio::join!(client_side, server.recv(&mut server_io));
        assert!(sent.is_err());
        assert!(received.is_err());
    }

    #[test]
    fn test_server_name_defaults_to_localhost() {
        let codec = TlsProtocol::new(
            Box::new(SodepProtocol::new(ProtocolParams::empty())),
            EngineMode::Client,
            None,
        );
        assert_eq!(codec.server_name(), DEFAULT_SERVER_NAME);
        assert!(!codec.is_thread_safe());
    }
}
