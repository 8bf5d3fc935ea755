// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Error types.

use thiserror::Error;

/// Misuse of the registry by the application.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RouterError {
    #[error("No default route has been published yet")]
    NotReady,

    #[error("Route is not tracked: {0}")]
    UntrackedRoute(String),

    #[error("Route is disabled: {0}")]
    DisabledRoute(String),

    #[error("Invalid unselect reason code: {0}")]
    InvalidUnselectReason(i32),

    #[error("Unknown router handle: {0}")]
    UnknownRouter(u64),

    #[error("Unknown callback registration: {0}")]
    UnknownCallback(u64),

    #[error("Unknown provider: {0}")]
    UnknownProvider(u64),

    #[error("No unique id left for {identity}:{descriptor_id} after {attempts} attempts")]
    UniqueIdExhausted {
        identity: String,
        descriptor_id: String,
        attempts: u32,
    },

    #[error("Invalid selector: {0}")]
    InvalidSelector(String),
}

/// Descriptor wire-form decode or encode failure.
#[derive(Debug, Error)]
pub enum DescriptorError {
    #[error("Malformed bundle: {0}")]
    Json(#[from] serde_json::Error),
}

/// Protocol-level failures on a connection.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: usize, max: usize },

    #[error("Truncated frame: need {needed} bytes, have {available}")]
    Truncated { needed: usize, available: usize },

    #[error("Malformed message: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unsupported protocol version: {0}")]
    UnsupportedVersion(i32),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure to send on a message link.
#[derive(Debug, Error)]
pub enum LinkError {
    #[error("Link closed")]
    Closed,

    #[error("Outbound queue full ({0} frames)")]
    Backlog(usize),

    #[error("Link I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

/// Result type for registry operations.
pub type Result<T> = std::result::Result<T, RouterError>;
