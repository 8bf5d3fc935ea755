// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! TCP transport.
//!
//! Each bind spawns one reader thread that connects, reports the link, and
//! posts every inbound frame into the control queue until the stream ends.
//! Outbound frames go through a bounded queue to a writer thread, so a peer
//! that stops reading never blocks the control thread. When the queue
//! overflows or a write fails the socket is shut down and the reader reports
//! the link down.

use super::codec::{encode_frame, read_frame};
use super::link::{LinkEvent, MessageLink, ServiceConnector};
use super::protocol::{ClientMessage, ServiceMessage};
use crate::config::RemoteConfig;
use crate::error::LinkError;
use crate::runtime::LinkEventSender;
use crossbeam::channel::{self, Sender, TrySendError};
use std::io::Write;
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

/// Connector for `host:port` endpoints served over TCP.
#[derive(Debug, Clone)]
pub struct TcpConnector {
    connect_timeout: Duration,
    max_message_size: usize,
}

/// Frames queued for the writer thread before the link is considered stuck.
pub const OUTBOUND_QUEUE_LEN: usize = 64;

/// A single blocked write longer than this kills the link.
const WRITE_TIMEOUT: Duration = Duration::from_secs(10);

impl TcpConnector {
    pub fn new(connect_timeout: Duration, max_message_size: usize) -> Self {
        Self {
            connect_timeout,
            max_message_size,
        }
    }

    /// Connector honoring the frame cap of `config`.
    pub fn from_config(config: &RemoteConfig) -> Self {
        Self::new(Duration::from_secs(5), config.max_message_size)
    }

    pub fn max_message_size(&self) -> usize {
        self.max_message_size
    }
}

impl Default for TcpConnector {
    fn default() -> Self {
        Self::new(
            Duration::from_secs(5),
            super::codec::DEFAULT_MAX_MESSAGE_SIZE,
        )
    }
}

fn resolve(endpoint: &str) -> std::io::Result<SocketAddr> {
    endpoint.to_socket_addrs()?.next().ok_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("no address for {}", endpoint),
        )
    })
}

impl ServiceConnector for TcpConnector {
    fn bind(&self, endpoint: &str, events: LinkEventSender) -> Result<(), LinkError> {
        let endpoint = endpoint.to_string();
        let timeout = self.connect_timeout;
        let max = self.max_message_size;
        thread::Builder::new()
            .name(format!("mediaroute-{}", events.link_id()))
            .spawn(move || run_link(&endpoint, timeout, max, events))?;
        Ok(())
    }
}

fn run_link(endpoint: &str, timeout: Duration, max: usize, events: LinkEventSender) {
    let stream = match resolve(endpoint).and_then(|addr| TcpStream::connect_timeout(&addr, timeout)) {
        Ok(stream) => stream,
        Err(e) => {
            events.send(LinkEvent::BindFailed(e.to_string()));
            return;
        }
    };
    stream.set_nodelay(true).ok();
    let link = match TcpLink::spawn(&stream, max, &format!("{}", events.link_id())) {
        Ok(link) => link,
        Err(e) => {
            events.send(LinkEvent::BindFailed(e.to_string()));
            return;
        }
    };
    debug!("{} connected to {}", events.link_id(), endpoint);
    if !events.send(LinkEvent::Connected(Box::new(link))) {
        return;
    }

    let mut reader = stream;
    loop {
        match read_frame::<_, ServiceMessage>(&mut reader, max) {
            Ok(Some(msg)) => {
                if !events.send(LinkEvent::Message(msg)) {
                    break;
                }
            }
            Ok(None) => {
                debug!("{} closed by peer", events.link_id());
                break;
            }
            Err(e) => {
                warn!("{} read error: {}", events.link_id(), e);
                break;
            }
        }
    }
    reader.shutdown(Shutdown::Both).ok();
    events.send(LinkEvent::Down);
}

struct TcpLink {
    stream: TcpStream,
    queue: Option<Sender<Vec<u8>>>,
    max_message_size: usize,
}

impl TcpLink {
    /// Start the writer thread for `stream`.
    fn spawn(stream: &TcpStream, max_message_size: usize, name: &str) -> std::io::Result<Self> {
        let mut writer = stream.try_clone()?;
        writer.set_write_timeout(Some(WRITE_TIMEOUT))?;
        let (queue, frames) = channel::bounded::<Vec<u8>>(OUTBOUND_QUEUE_LEN);
        let label = name.to_string();
        thread::Builder::new()
            .name(format!("mediaroute-{}-tx", name))
            .spawn(move || {
                for frame in frames {
                    if let Err(e) = writer.write_all(&frame).and_then(|_| writer.flush()) {
                        warn!("{} write error: {}", label, e);
                        break;
                    }
                }
                // Queue closed or write failed: the reader sees EOF and reports down.
                writer.shutdown(Shutdown::Both).ok();
            })?;
        Ok(Self {
            stream: stream.try_clone()?,
            queue: Some(queue),
            max_message_size,
        })
    }
}

impl MessageLink for TcpLink {
    fn send(&mut self, msg: &ClientMessage) -> Result<(), LinkError> {
        let Some(queue) = &self.queue else {
            return Err(LinkError::Closed);
        };
        let frame = encode_frame(msg, self.max_message_size)?;
        match queue.try_send(frame) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                warn!("Peer is not reading, dropping link");
                self.queue = None;
                self.stream.shutdown(Shutdown::Both).ok();
                Err(LinkError::Backlog(OUTBOUND_QUEUE_LEN))
            }
            Err(TrySendError::Disconnected(_)) => {
                self.queue = None;
                Err(LinkError::Closed)
            }
        }
    }

    fn close(&mut self) {
        // Dropping the queue lets the writer flush what is pending, then shut down.
        self.queue = None;
    }
}

impl Drop for TcpLink {
    fn drop(&mut self) {
        self.close();
    }
}
