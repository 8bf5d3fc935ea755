// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # mediaroute
//!
//! Discovery and selection of media routes: the destinations (speakers,
//! displays, cast receivers, bluetooth sinks) that an application can send
//! audio or video to.
//!
//! Providers publish descriptors of the routes they know about. The
//! [`Registry`] merges them into one route table, keeps a default, bluetooth
//! and selected route at all times, fans out change events to router
//! callbacks, and forwards volume and control requests to per-route
//! controllers. Providers may live in-process ([`provider::LocalProvider`]) or
//! behind a message link ([`remote::RemoteProviderProxy`] on the client side,
//! [`service::ProviderService`] on the provider side).
//!
//! ## Quick Start
//!
//! ```rust
//! use mediaroute::descriptor::{ControlFilter, ProviderDescriptor, RouteDescriptor};
//! use mediaroute::descriptor::{CATEGORY_LIVE_AUDIO, DEFAULT_ROUTE_ID};
//! use mediaroute::provider::{
//!     DescriptorPublisher, LocalProvider, LocalRouteHandler, ProviderMetadata, RouteController,
//! };
//! use mediaroute::{Registry, RouterConfig};
//!
//! struct Speaker;
//! struct SpeakerController;
//! impl RouteController for SpeakerController {}
//!
//! impl LocalRouteHandler for Speaker {
//!     fn create_route_controller(
//!         &mut self,
//!         _route_id: &str,
//!         _group_route_id: Option<&str>,
//!     ) -> Option<Box<dyn RouteController>> {
//!         Some(Box::new(SpeakerController))
//!     }
//! }
//!
//! let mut registry = Registry::new(RouterConfig::default());
//! let publisher = DescriptorPublisher::with_descriptor(ProviderDescriptor::new(vec![
//!     RouteDescriptor::builder(DEFAULT_ROUTE_ID, "Phone speaker")
//!         .add_control_filter(ControlFilter::new().with_category(CATEGORY_LIVE_AUDIO))
//!         .build(),
//! ]));
//! registry.add_provider(Box::new(LocalProvider::new(
//!     ProviderMetadata::system("system"),
//!     publisher,
//!     Box::new(Speaker),
//! )));
//!
//! assert_eq!(registry.selected_route()?.name(), "Phone speaker");
//! # Ok::<(), mediaroute::RouterError>(())
//! ```
//!
//! ## Threading
//!
//! The registry and everything attached to it run on a single control
//! thread. Other threads reach it through a [`ControlHandle`]; the registry
//! itself cannot be moved to another thread:
//!
//! ```compile_fail
//! let registry = mediaroute::Registry::default();
//! std::thread::spawn(move || drop(registry));
//! ```

pub mod config;
pub mod descriptor;
pub mod error;
pub mod provider;
pub mod registry;
pub mod remote;
pub mod runtime;
pub mod service;

pub use config::{ConfigError, RemoteConfig, RouterConfig};
pub use error::{DescriptorError, LinkError, ProtocolError, Result, RouterError};
pub use registry::{
    AvailabilityFlags, CallbackFlags, CallbackId, ChangeFlags, PlaybackInfo, ProviderId, Registry,
    RouteInfo, RouterCallback, RouterId,
};
pub use runtime::{ControlContext, ControlHandle};
