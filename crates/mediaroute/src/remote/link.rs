// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Transport abstraction between a proxy and a provider service.

use super::protocol::{ClientMessage, ServiceMessage};
use crate::error::LinkError;
use crate::runtime::{LinkEventSender, LinkId};
use std::fmt;

/// Outbound half of a bound link, owned by the control thread.
pub trait MessageLink: Send {
    fn send(&mut self, msg: &ClientMessage) -> Result<(), LinkError>;

    /// Close the link. Must be idempotent.
    fn close(&mut self);
}

/// Events a transport reports for one link.
pub enum LinkEvent {
    /// Bind succeeded; the link is ready for outbound messages.
    Connected(Box<dyn MessageLink>),
    /// Bind failed; no further events follow.
    BindFailed(String),
    /// Inbound message from the service.
    Message(ServiceMessage),
    /// Peer died or the transport broke; no further events follow.
    Down,
}

impl fmt::Debug for LinkEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkEvent::Connected(_) => f.write_str("Connected"),
            LinkEvent::BindFailed(reason) => f.debug_tuple("BindFailed").field(reason).finish(),
            LinkEvent::Message(msg) => f.debug_tuple("Message").field(&msg.op).finish(),
            LinkEvent::Down => f.write_str("Down"),
        }
    }
}

/// Establishes links to service endpoints.
///
/// `bind` must not block on I/O: it reports the outcome and every later event
/// through `events`, from any thread.
pub trait ServiceConnector {
    fn bind(&self, endpoint: &str, events: LinkEventSender) -> Result<(), LinkError>;
}

/// Receiver of link events on the control thread.
pub trait LinkEventHandler {
    fn on_link_event(&self, link: LinkId, event: LinkEvent);
}

/// Outbound half of a client connection, seen from the service side.
pub trait ClientSink: Send {
    /// Queue a message for the client. Returns `false` if the client is gone.
    fn send(&self, msg: ServiceMessage) -> bool;
}
