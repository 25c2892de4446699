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

//! Scheme, listener and codec factories.
//!
//! The [`FactoryRegistry`] turns a location and a protocol name into a
//! channel or a listener. Locations may be stored indirectly in ini
//! documents (`ini:/Section/Key:URL`); the `auto:` prefix marks outbound
//! channels whose location is looked up that way.

mod factories;
mod ini;
mod location;
#[allow(clippy::module_inception)]
mod registry;

#[cfg(unix)]
pub use factories::{local_socket_address, LocalSocketFactory};
pub use factories::{
    ChannelFactory, ChannelRequest, CompressedProtocolFactory, JsonProtocolFactory,
    ListenerFactory, ListenerRequest, LocalFactory, PostcardProtocolFactory, ProtocolFactory,
    SocketFactory, SodepProtocolFactory, TlsProtocolFactory,
};
pub use ini::{IniDocument, IniReference};
pub use location::Location;
pub use registry::{FactoryRegistry, AUTO_SCHEME, INI_SCHEME};
