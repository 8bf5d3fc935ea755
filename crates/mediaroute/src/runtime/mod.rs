// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Control loop plumbing.
//!
//! All registry state lives on one control thread. Other threads talk to it
//! exclusively through the context's inbound queue:
//!
//! - providers post "descriptor changed" notices through their
//!   [`DescriptorListener`](crate::provider::DescriptorListener),
//! - transports post link events (connected, bind failed, message, down)
//!   through a [`LinkEventSender`],
//! - applications post commands through a [`ControlHandle`].
//!
//! The context also owns a timer queue for rebind backoff and reply
//! watchdogs. [`ControlContext`] is reference-counted with `Rc` and therefore
//! cannot leave the thread that created it.

mod timer;

pub use timer::TimerId;

use crate::registry::{ProviderId, Registry};
use crate::remote::link::{LinkEvent, LinkEventHandler};
use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};
use std::time::{Duration, Instant};
use timer::TimerQueue;
use tracing::trace;

/// Identifier of one bind attempt / message link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LinkId(u64);

impl fmt::Display for LinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "link#{}", self.0)
    }
}

type Command = Box<dyn FnOnce(&mut Registry) + Send>;

/// Messages drained by the control loop.
pub(crate) enum ControlMessage {
    ProviderChanged(ProviderId),
    Link { link: LinkId, event: LinkEvent },
    Command(Command),
}

/// Thread-safe handle for posting work onto the control thread.
#[derive(Clone)]
pub struct ControlHandle {
    tx: Sender<ControlMessage>,
}

impl ControlHandle {
    /// Run `f` on the control thread during the next drain.
    ///
    /// Returns `false` if the control loop is gone.
    pub fn post<F>(&self, f: F) -> bool
    where
        F: FnOnce(&mut Registry) + Send + 'static,
    {
        self.tx.send(ControlMessage::Command(Box::new(f))).is_ok()
    }

    pub(crate) fn notify_provider_changed(&self, provider: ProviderId) -> bool {
        self.tx
            .send(ControlMessage::ProviderChanged(provider))
            .is_ok()
    }
}

impl fmt::Debug for ControlHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ControlHandle")
    }
}

/// Sink a transport uses to report events for one link.
#[derive(Clone)]
pub struct LinkEventSender {
    link: LinkId,
    tx: Sender<ControlMessage>,
}

impl LinkEventSender {
    pub fn link_id(&self) -> LinkId {
        self.link
    }

    /// Post an event. Returns `false` if the control loop is gone.
    pub fn send(&self, event: LinkEvent) -> bool {
        self.tx
            .send(ControlMessage::Link {
                link: self.link,
                event,
            })
            .is_ok()
    }
}

impl fmt::Debug for LinkEventSender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LinkEventSender")
            .field("link", &self.link)
            .finish()
    }
}

struct ContextInner {
    tx: Sender<ControlMessage>,
    rx: Receiver<ControlMessage>,
    links: RefCell<HashMap<LinkId, Weak<dyn LinkEventHandler>>>,
    next_link: Cell<u64>,
    timers: RefCell<TimerQueue>,
}

/// Control-thread context shared by the registry and remote proxies.
#[derive(Clone)]
pub struct ControlContext {
    inner: Rc<ContextInner>,
}

impl ControlContext {
    pub(crate) fn new() -> Self {
        let (tx, rx) = channel::unbounded();
        Self {
            inner: Rc::new(ContextInner {
                tx,
                rx,
                links: RefCell::new(HashMap::new()),
                next_link: Cell::new(0),
                timers: RefCell::new(TimerQueue::default()),
            }),
        }
    }

    pub fn handle(&self) -> ControlHandle {
        ControlHandle {
            tx: self.inner.tx.clone(),
        }
    }

    /// Allocate a link id whose events are routed to `handler`.
    pub(crate) fn register_link(&self, handler: Weak<dyn LinkEventHandler>) -> LinkEventSender {
        let id = self.inner.next_link.get() + 1;
        self.inner.next_link.set(id);
        let link = LinkId(id);
        self.inner.links.borrow_mut().insert(link, handler);
        LinkEventSender {
            link,
            tx: self.inner.tx.clone(),
        }
    }

    /// Forget a link; its late events are dropped.
    pub(crate) fn unregister_link(&self, link: LinkId) {
        self.inner.links.borrow_mut().remove(&link);
    }

    pub(crate) fn dispatch_link_event(&self, link: LinkId, event: LinkEvent) {
        let handler = self
            .inner
            .links
            .borrow()
            .get(&link)
            .and_then(Weak::upgrade);
        match handler {
            Some(handler) => handler.on_link_event(link, event),
            None => {
                trace!("Dropping {:?} for stale {}", event, link);
                if let LinkEvent::Connected(mut orphan) = event {
                    orphan.close();
                }
            }
        }
    }

    pub(crate) fn schedule<F>(&self, delay: Duration, task: F) -> TimerId
    where
        F: FnOnce() + 'static,
    {
        self.inner.timers.borrow_mut().schedule(delay, Box::new(task))
    }

    pub(crate) fn cancel_timer(&self, id: TimerId) -> bool {
        self.inner.timers.borrow_mut().cancel(id)
    }

    /// Run every timer that is due. Tasks run with the queue unborrowed so
    /// they may schedule further timers.
    pub(crate) fn run_due_timers(&self) -> usize {
        let now = Instant::now();
        let mut ran = 0;
        loop {
            let task = self.inner.timers.borrow_mut().pop_due(now);
            match task {
                Some(task) => {
                    task();
                    ran += 1;
                }
                None => return ran,
            }
        }
    }

    pub(crate) fn next_timer_deadline(&self) -> Option<Instant> {
        self.inner.timers.borrow_mut().next_deadline()
    }

    pub(crate) fn try_recv(&self) -> Option<ControlMessage> {
        self.inner.rx.try_recv().ok()
    }

    /// Block until a message arrives, the next timer is due, or `timeout`.
    pub(crate) fn wait(&self, timeout: Duration) -> Option<ControlMessage> {
        let wait = match self.next_timer_deadline() {
            Some(deadline) => deadline
                .saturating_duration_since(Instant::now())
                .min(timeout),
            None => timeout,
        };
        match self.inner.rx.recv_timeout(wait) {
            Ok(msg) => Some(msg),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }
}

impl fmt::Debug for ControlContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControlContext")
            .field("links", &self.inner.links.borrow().len())
            .field("timers", &self.inner.timers.borrow().len())
            .finish()
    }
}
