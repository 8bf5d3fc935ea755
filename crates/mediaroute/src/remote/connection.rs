// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Client side of one registered service connection.
//!
//! Request ids and controller ids are allocated locally and increase
//! monotonically for the lifetime of the connection, both starting at 1.

use super::link::MessageLink;
use super::protocol::{ClientMessage, ClientOp, ServiceMessage, ServiceOp, SERVICE_VERSION_1};
use crate::descriptor::{ControlRequest, DiscoveryRequest, ProviderDescriptor};
use crate::error::LinkError;
use crate::provider::{ControlRequestCallback, ControlRequestError, ControlResult, UnselectReason};
use crate::runtime::LinkId;
use std::collections::HashMap;
use tracing::{debug, trace, warn};

/// What the proxy must do after an inbound message.
pub(crate) enum ConnectionNotice {
    /// Registration accepted; adopt the descriptor and attach controllers.
    Ready(Option<ProviderDescriptor>),
    DescriptorChanged(Option<ProviderDescriptor>),
    RegistrationFailed,
    /// A pending control request finished; complete outside any borrow.
    Completed(ControlRequestCallback, ControlResult),
}

pub(crate) struct Connection {
    link: Box<dyn MessageLink>,
    link_id: LinkId,
    client_version: i32,
    service_version: i32,
    next_request_id: u32,
    next_controller_id: i32,
    pending_register: u32,
    pending_callbacks: HashMap<u32, ControlRequestCallback>,
}

impl Connection {
    pub fn new(link: Box<dyn MessageLink>, link_id: LinkId, client_version: i32) -> Self {
        Self {
            link,
            link_id,
            client_version,
            service_version: 0,
            next_request_id: 1,
            next_controller_id: 1,
            pending_register: 0,
            pending_callbacks: HashMap::new(),
        }
    }

    pub fn link_id(&self) -> LinkId {
        self.link_id
    }

    pub fn service_version(&self) -> i32 {
        self.service_version
    }

    pub fn is_registered(&self) -> bool {
        self.service_version != 0
    }

    fn allocate_request_id(&mut self) -> u32 {
        let id = self.next_request_id;
        self.next_request_id = self.next_request_id.wrapping_add(1).max(1);
        id
    }

    fn send(&mut self, request_id: u32, arg: i32, op: ClientOp) -> Result<u32, LinkError> {
        trace!("{} -> {} req={} arg={}", self.link_id, op.name(), request_id, arg);
        let msg = ClientMessage {
            request_id,
            arg,
            op,
        };
        self.link.send(&msg).map(|()| request_id).map_err(|e| {
            warn!("{} send failed: {}", self.link_id, e);
            e
        })
    }

    fn send_request(&mut self, arg: i32, op: ClientOp) -> Result<u32, LinkError> {
        let request_id = self.allocate_request_id();
        self.send(request_id, arg, op)
    }

    /// Send REGISTER carrying the client version.
    pub fn register(&mut self) -> Result<(), LinkError> {
        let request_id = self.allocate_request_id();
        self.pending_register = request_id;
        self.send(request_id, self.client_version, ClientOp::Register)?;
        Ok(())
    }

    /// Tear down: best-effort UNREGISTER, close the link, and hand back every
    /// pending callback so the caller can fail them.
    pub fn dispose(mut self) -> Vec<ControlRequestCallback> {
        if self.is_registered() {
            let _ = self.send(0, 0, ClientOp::Unregister);
        }
        self.link.close();
        self.pending_callbacks.drain().map(|(_, cb)| cb).collect()
    }

    pub fn create_route_controller(&mut self, route_id: &str, group_route_id: Option<&str>) -> i32 {
        let controller_id = self.next_controller_id;
        self.next_controller_id += 1;
        let _ = self.send_request(
            controller_id,
            ClientOp::CreateController {
                route_id: route_id.to_string(),
                group_route_id: group_route_id.map(str::to_string),
            },
        );
        controller_id
    }

    pub fn release_route_controller(&mut self, controller_id: i32) {
        let _ = self.send_request(controller_id, ClientOp::ReleaseController);
    }

    pub fn select_route(&mut self, controller_id: i32) {
        let _ = self.send_request(controller_id, ClientOp::Select);
    }

    pub fn unselect_route(&mut self, controller_id: i32, reason: UnselectReason) {
        let _ = self.send_request(
            controller_id,
            ClientOp::Unselect {
                reason: reason.code(),
            },
        );
    }

    pub fn set_volume(&mut self, controller_id: i32, volume: i32) {
        let _ = self.send_request(controller_id, ClientOp::SetVolume { volume });
    }

    pub fn update_volume(&mut self, controller_id: i32, delta: i32) {
        let _ = self.send_request(controller_id, ClientOp::UpdateVolume { delta });
    }

    /// Send a control request; on success the callback waits for its reply.
    pub fn send_control_request(
        &mut self,
        controller_id: i32,
        request: &ControlRequest,
        callback: ControlRequestCallback,
    ) -> Result<u32, ControlRequestCallback> {
        let op = ClientOp::ControlRequest {
            request: request.clone(),
        };
        match self.send_request(controller_id, op) {
            Ok(request_id) => {
                if !callback.is_none() {
                    self.pending_callbacks.insert(request_id, callback);
                }
                Ok(request_id)
            }
            Err(_) => Err(callback),
        }
    }

    pub fn set_discovery_request(&mut self, request: Option<&DiscoveryRequest>) {
        let bundle = match request.map(DiscoveryRequest::as_bundle).transpose() {
            Ok(bundle) => bundle,
            Err(e) => {
                warn!("{} cannot encode discovery request: {}", self.link_id, e);
                return;
            }
        };
        let _ = self.send_request(0, ClientOp::SetDiscoveryRequest { request: bundle });
    }

    /// Remove a pending callback, e.g. when its reply deadline passed.
    pub fn take_pending(&mut self, request_id: u32) -> Option<ControlRequestCallback> {
        self.pending_callbacks.remove(&request_id)
    }

    pub fn pending_count(&self) -> usize {
        self.pending_callbacks.len()
    }

    pub fn handle_message(&mut self, msg: ServiceMessage) -> Option<ConnectionNotice> {
        let request_id = msg.request_id;
        match msg.op {
            ServiceOp::GenericSuccess => {
                trace!("{} generic success req={}", self.link_id, request_id);
                None
            }
            ServiceOp::GenericFailure => {
                if request_id != 0 && request_id == self.pending_register {
                    self.pending_register = 0;
                    return Some(ConnectionNotice::RegistrationFailed);
                }
                match self.pending_callbacks.remove(&request_id) {
                    Some(cb) => Some(ConnectionNotice::Completed(
                        cb,
                        Err(ControlRequestError::unknown()),
                    )),
                    None => {
                        debug!("{} generic failure req={}", self.link_id, request_id);
                        None
                    }
                }
            }
            ServiceOp::Registered {
                service_version,
                descriptor,
            } => {
                if self.service_version != 0
                    || request_id != self.pending_register
                    || service_version < SERVICE_VERSION_1
                {
                    debug!(
                        "{} ignoring unexpected REGISTERED req={} version={}",
                        self.link_id, request_id, service_version
                    );
                    return None;
                }
                self.pending_register = 0;
                self.service_version = service_version;
                Some(ConnectionNotice::Ready(self.decode_descriptor(descriptor)))
            }
            ServiceOp::DescriptorChanged { descriptor } => {
                if !self.is_registered() {
                    debug!("{} DESCRIPTOR_CHANGED before registration", self.link_id);
                    return None;
                }
                Some(ConnectionNotice::DescriptorChanged(
                    self.decode_descriptor(descriptor),
                ))
            }
            ServiceOp::ControlRequestSucceeded { data } => {
                match self.pending_callbacks.remove(&request_id) {
                    Some(cb) => Some(ConnectionNotice::Completed(cb, Ok(data))),
                    None => {
                        debug!("{} stale control reply req={}", self.link_id, request_id);
                        None
                    }
                }
            }
            ServiceOp::ControlRequestFailed { error, data } => {
                match self.pending_callbacks.remove(&request_id) {
                    Some(cb) => Some(ConnectionNotice::Completed(
                        cb,
                        Err(ControlRequestError {
                            message: error,
                            data,
                        }),
                    )),
                    None => {
                        debug!("{} stale control failure req={}", self.link_id, request_id);
                        None
                    }
                }
            }
        }
    }

    fn decode_descriptor(&self, bundle: Option<serde_json::Value>) -> Option<ProviderDescriptor> {
        let bundle = bundle?;
        match ProviderDescriptor::from_bundle(&bundle) {
            Ok(descriptor) => Some(descriptor),
            Err(e) => {
                warn!("{} malformed provider descriptor: {}", self.link_id, e);
                None
            }
        }
    }
}
