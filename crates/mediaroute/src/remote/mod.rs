// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Out-of-process providers: wire protocol, framing, transports and the
//! client-side proxy.

pub mod codec;
mod connection;
pub mod link;
pub mod memory;
pub mod protocol;
pub mod proxy;
pub mod tcp;

pub use link::{ClientSink, LinkEvent, LinkEventHandler, MessageLink, ServiceConnector};
pub use memory::MemoryConnector;
pub use protocol::{ClientMessage, ClientOp, ServiceMessage, ServiceOp};
pub use proxy::{RemoteProviderProxy, RemoteRouteController};
pub use tcp::TcpConnector;
