// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Route controllers.
//!
//! A controller is bound to exactly one route and follows the lifecycle
//! `created -> selected -> (control requests)* -> unselected -> released`.
//! The registry (or the service dispatcher on the provider side) drives that
//! lifecycle; implementations only react to it.

use crate::descriptor::{ControlRequest, Extras};
use crate::error::RouterError;
use std::fmt;

/// Why a route was unselected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum UnselectReason {
    #[default]
    Unknown,
    /// The user disconnected the route.
    Disconnected,
    /// The user stopped casting.
    Stopped,
    /// Another route was selected.
    RouteChanged,
}

impl UnselectReason {
    /// Wire code of the reason.
    pub fn code(self) -> i32 {
        match self {
            UnselectReason::Unknown => 0,
            UnselectReason::Disconnected => 1,
            UnselectReason::Stopped => 2,
            UnselectReason::RouteChanged => 3,
        }
    }
}

impl TryFrom<i32> for UnselectReason {
    type Error = RouterError;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(UnselectReason::Unknown),
            1 => Ok(UnselectReason::Disconnected),
            2 => Ok(UnselectReason::Stopped),
            3 => Ok(UnselectReason::RouteChanged),
            other => Err(RouterError::InvalidUnselectReason(other)),
        }
    }
}

impl fmt::Display for UnselectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            UnselectReason::Unknown => "unknown",
            UnselectReason::Disconnected => "disconnected",
            UnselectReason::Stopped => "stopped",
            UnselectReason::RouteChanged => "route-changed",
        };
        f.write_str(s)
    }
}

/// Failure payload of a control request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ControlRequestError {
    /// Optional human-readable message.
    pub message: Option<String>,
    /// Optional provider-specific payload.
    pub data: Option<Extras>,
}

impl ControlRequestError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            data: None,
        }
    }

    /// Failure with neither a message nor a payload.
    pub fn unknown() -> Self {
        Self::default()
    }
}

impl fmt::Display for ControlRequestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.message {
            Some(message) => write!(f, "Control request failed: {}", message),
            None => write!(f, "Control request failed"),
        }
    }
}

impl std::error::Error for ControlRequestError {}

/// Outcome of a control request: optional result payload or an error.
pub type ControlResult = Result<Option<Extras>, ControlRequestError>;

/// One-shot completion for a control request.
///
/// Completing consumes the callback, so a result is delivered at most once.
/// Dropping an uncompleted callback delivers nothing.
pub struct ControlRequestCallback {
    inner: Option<Box<dyn FnOnce(ControlResult) + Send>>,
}

impl ControlRequestCallback {
    pub fn new<F>(f: F) -> Self
    where
        F: FnOnce(ControlResult) + Send + 'static,
    {
        Self {
            inner: Some(Box::new(f)),
        }
    }

    /// A callback that discards the result.
    pub fn none() -> Self {
        Self { inner: None }
    }

    pub fn is_none(&self) -> bool {
        self.inner.is_none()
    }

    pub fn complete(mut self, result: ControlResult) {
        if let Some(f) = self.inner.take() {
            f(result);
        }
    }

    pub fn succeed(self, data: Option<Extras>) {
        self.complete(Ok(data));
    }

    pub fn fail(self, error: ControlRequestError) {
        self.complete(Err(error));
    }
}

impl fmt::Debug for ControlRequestCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControlRequestCallback")
            .field("armed", &self.inner.is_some())
            .finish()
    }
}

/// Per-route controller supplied by a provider.
///
/// All methods have no-op defaults. Control requests are rejected unless
/// overridden.
pub trait RouteController {
    fn on_select(&mut self) {}

    fn on_unselect(&mut self, _reason: UnselectReason) {}

    /// Last call a controller receives.
    fn on_release(&mut self) {}

    fn on_set_volume(&mut self, _volume: i32) {}

    fn on_update_volume(&mut self, _delta: i32) {}

    /// Handle a control request.
    ///
    /// Return `Ok(())` when the request is accepted; the controller then owns
    /// the callback and must complete it once. Returning the callback in
    /// `Err` rejects the request and hands the callback back to the caller.
    fn on_control_request(
        &mut self,
        _request: &ControlRequest,
        callback: ControlRequestCallback,
    ) -> Result<(), ControlRequestCallback> {
        Err(callback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[test]
    fn test_unselect_reason_codes() {
        for reason in [
            UnselectReason::Unknown,
            UnselectReason::Disconnected,
            UnselectReason::Stopped,
            UnselectReason::RouteChanged,
        ] {
            assert_eq!(UnselectReason::try_from(reason.code()), Ok(reason));
        }
        assert_eq!(
            UnselectReason::try_from(7),
            Err(RouterError::InvalidUnselectReason(7))
        );
    }

    #[test]
    fn test_callback_completes_once() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let cb = ControlRequestCallback::new(move |r| sink.lock().push(r));
        cb.fail(ControlRequestError::unknown());
        assert_eq!(seen.lock().len(), 1);
        assert_eq!(
            seen.lock()[0],
            Err(ControlRequestError::default())
        );
    }

    #[test]
    fn test_default_controller_rejects() {
        struct Noop;
        impl RouteController for Noop {}

        let mut c = Noop;
        let rejected = c.on_control_request(&ControlRequest::new("play"), ControlRequestCallback::none());
        assert!(rejected.is_err());
    }
}
