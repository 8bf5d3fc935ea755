// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Wire messages between a provider proxy and a provider service.
//!
//! Every message carries a request id and an integer argument. A request id of
//! 0 means no reply is expected; any other id is answered exactly once. The
//! argument holds the client version for `register` and the controller id for
//! controller operations.
//!
//! Descriptors and discovery requests travel in their bundle (JSON value) form
//! so a malformed payload fails one message, not the whole frame.
//! Extras have no envelope field: control requests carry them inside the
//! request and replies carry them as `data`.

use crate::descriptor::{ControlRequest, Extras};
use serde::{Deserialize, Serialize};

/// First client protocol version.
pub const CLIENT_VERSION_1: i32 = 1;
/// Adds the group route id on controller creation.
pub const CLIENT_VERSION_2: i32 = 2;
pub const CLIENT_VERSION_CURRENT: i32 = CLIENT_VERSION_2;

/// First service protocol version.
pub const SERVICE_VERSION_1: i32 = 1;
/// Filters descriptors by the client version window.
pub const SERVICE_VERSION_2: i32 = 2;
pub const SERVICE_VERSION_CURRENT: i32 = SERVICE_VERSION_2;

/// Client -> service message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientMessage {
    pub request_id: u32,
    #[serde(default)]
    pub arg: i32,
    pub op: ClientOp,
}

/// Client -> service operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientOp {
    Register,
    Unregister,
    CreateController {
        route_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        group_route_id: Option<String>,
    },
    ReleaseController,
    Select,
    Unselect {
        reason: i32,
    },
    SetVolume {
        volume: i32,
    },
    UpdateVolume {
        delta: i32,
    },
    ControlRequest {
        request: ControlRequest,
    },
    SetDiscoveryRequest {
        #[serde(default)]
        request: Option<serde_json::Value>,
    },
}

impl ClientOp {
    pub fn name(&self) -> &'static str {
        match self {
            ClientOp::Register => "REGISTER",
            ClientOp::Unregister => "UNREGISTER",
            ClientOp::CreateController { .. } => "CREATE_CONTROLLER",
            ClientOp::ReleaseController => "RELEASE_CONTROLLER",
            ClientOp::Select => "SELECT",
            ClientOp::Unselect { .. } => "UNSELECT",
            ClientOp::SetVolume { .. } => "SET_VOLUME",
            ClientOp::UpdateVolume { .. } => "UPDATE_VOLUME",
            ClientOp::ControlRequest { .. } => "CONTROL_REQUEST",
            ClientOp::SetDiscoveryRequest { .. } => "SET_DISCOVERY_REQUEST",
        }
    }
}

/// Service -> client message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceMessage {
    pub request_id: u32,
    #[serde(default)]
    pub arg: i32,
    pub op: ServiceOp,
}

/// Service -> client operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceOp {
    GenericSuccess,
    GenericFailure,
    Registered {
        service_version: i32,
        #[serde(default)]
        descriptor: Option<serde_json::Value>,
    },
    DescriptorChanged {
        #[serde(default)]
        descriptor: Option<serde_json::Value>,
    },
    ControlRequestSucceeded {
        #[serde(default)]
        data: Option<Extras>,
    },
    ControlRequestFailed {
        #[serde(default)]
        error: Option<String>,
        #[serde(default)]
        data: Option<Extras>,
    },
}

impl ServiceMessage {
    pub fn generic_success(request_id: u32) -> Self {
        Self {
            request_id,
            arg: 0,
            op: ServiceOp::GenericSuccess,
        }
    }

    pub fn generic_failure(request_id: u32) -> Self {
        Self {
            request_id,
            arg: 0,
            op: ServiceOp::GenericFailure,
        }
    }
}
