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

//! Runtime configuration.

use crate::channel::DEFAULT_BRIDGE_DEPTH;
use crate::protocol::tls::DEFAULT_WRITE_CAPACITY;
use crate::protocol::ProtocolParams;
use crate::serialization::framing::MAX_FRAME_SIZE;
use std::time::Duration;

/// Configuration for a [`CommCore`](crate::runtime::CommCore).
///
/// # Examples
///
/// ```rust
/// use commlink::config::CommConfig;
/// use std::time::Duration;
///
/// let config = CommConfig::new()
///     .with_poll_interval(Duration::from_millis(10))
///     .with_max_frame_size(1024 * 1024);
/// assert_eq!(config.bridge_depth, 64);
/// ```
#[derive(Debug, Clone)]
pub struct CommConfig {
    /// How often the poll scheduler checks pollable channels.
    ///
    /// Default: 50 ms
    pub poll_interval: Duration,

    /// Chunks a bridge queue holds before the sender waits.
    ///
    /// Default: 64
    pub bridge_depth: usize,

    /// Largest frame or field a codec accepts, unless a port sets
    /// `maxFrameSize` itself.
    ///
    /// Default: 16 MB
    pub max_frame_size: usize,

    /// Whether channels accepted on local sockets stay open between
    /// requests regardless of the codec's `keepAlive` parameter.
    ///
    /// Default: true
    pub local_socket_keep_alive: bool,

    /// Capacity of the TLS clear-text write buffer, unless a port sets
    /// `ssl.writeBufferSize` itself.
    ///
    /// Default: 8192
    pub tls_write_buffer: usize,
}

impl Default for CommConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(50),
            bridge_depth: DEFAULT_BRIDGE_DEPTH,
            max_frame_size: MAX_FRAME_SIZE,
            local_socket_keep_alive: true,
            tls_write_buffer: DEFAULT_WRITE_CAPACITY,
        }
    }
}

impl CommConfig {
    /// Creates a configuration with every default.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets [`CommConfig::poll_interval`].
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Sets [`CommConfig::bridge_depth`]. Zero is raised to one.
    pub fn with_bridge_depth(mut self, depth: usize) -> Self {
        self.bridge_depth = depth.max(1);
        self
    }

    /// Sets [`CommConfig::max_frame_size`].
    pub fn with_max_frame_size(mut self, size: usize) -> Self {
        self.max_frame_size = size;
        self
    }

    /// Sets [`CommConfig::local_socket_keep_alive`].
    pub fn with_local_socket_keep_alive(mut self, keep_alive: bool) -> Self {
        self.local_socket_keep_alive = keep_alive;
        self
    }

    /// Sets [`CommConfig::tls_write_buffer`].
    pub fn with_tls_write_buffer(mut self, capacity: usize) -> Self {
        self.tls_write_buffer = capacity;
        self
    }

    /// Fills in the defaults this configuration owns where `params` leaves
    /// them unset.
    pub fn apply_defaults(&self, params: &ProtocolParams) -> ProtocolParams {
        let mut params = params.clone();
        if !params.has("maxFrameSize") {
            params = params.with("maxFrameSize", self.max_frame_size as i64);
        }
        let ssl = params.child("ssl");
        if !ssl.has("writeBufferSize") {
            let mut ssl = ssl.root().clone();
            ssl.child_or_insert("writeBufferSize")
                .set_scalar(self.tls_write_buffer as i64);
            params = params.with("ssl", ssl);
        }
        params
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Value;

    #[test]
    fn test_defaults() {
        let config = CommConfig::default();
        assert_eq!(config.poll_interval, Duration::from_millis(50));
        assert_eq!(config.max_frame_size, 16 * 1024 * 1024);
        assert!(config.local_socket_keep_alive);
        assert_eq!(config.tls_write_buffer, 8192);
    }

    #[test]
    fn test_builders() {
        let config = CommConfig::new()
            .with_bridge_depth(0)
            .with_local_socket_keep_alive(false)
            .with_tls_write_buffer(1024);
        assert_eq!(config.bridge_depth, 1);
        assert!(!config.local_socket_keep_alive);
        assert_eq!(config.tls_write_buffer, 1024);
    }

    #[test]
    fn test_apply_defaults_keeps_explicit_values() {
        let mut root = Value::new().with_child("maxFrameSize", 10);
        root.child_or_insert("ssl").child_or_insert("protocol").set_scalar("TLSv1.2");
        let params = CommConfig::new()
            .with_tls_write_buffer(4096)
            .apply_defaults(&ProtocolParams::new(root));

        assert_eq!(params.int("maxFrameSize", 0), 10);
        assert_eq!(params.child("ssl").int("writeBufferSize", 0), 4096);
        assert_eq!(params.child("ssl").string("protocol", ""), "TLSv1.2");
    }
}
