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

//! Core transport traits.

use crate::transport::{TransportAddr, TransportError, TransportMetadata};
use tokio::io::{AsyncRead, AsyncWrite};

/// A bidirectional byte stream bound to one transport resource.
///
/// A channel owns exactly one transport, splits it into halves, and hands
/// those to its codec as a plain duplex stream.
pub trait Transport: AsyncRead + AsyncWrite + Send + Sync + Unpin + 'static {
    fn metadata(&self) -> &TransportMetadata;
}

/// An acceptor producing transports from inbound connections.
#[async_trait::async_trait]
pub trait TransportListener: Send + Sync + 'static {
    type Transport: Transport;

    /// Waits for the next inbound connection.
    async fn accept(&self) -> Result<Self::Transport, TransportError>;

    /// Returns the address the acceptor is bound to.
    #[allow(clippy::result_large_err)]
    fn local_addr(&self) -> Result<TransportAddr, TransportError>;

    /// Removes whatever the acceptor leaves behind, such as a filesystem
    /// socket node. Safe to call more than once.
    fn release(&self) -> Result<(), TransportError> {
        Ok(())
    }
}
