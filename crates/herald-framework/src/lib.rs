//! # Herald Framework
//!
//! Subscriber metadata, delegate cache and event dispatch.
//!
//! This layer provides:
//! - Subscriber traits ([`EventSubscriber`], [`CommandEventSubscriber`]) and
//!   explicit registration records ([`SubscriberDescriptor`])
//! - Per-subscriber metadata and the per-event registry built from it
//! - The [`MetadataProvider`], which owns the registry and the compiled
//!   delegate cache
//! - The [`EventDispatcher`], which resolves subscribers through a
//!   [`ServiceProvider`](herald_core::ServiceProvider) and invokes them
//!   sequentially or in parallel
//!
//! Modules contributed by other crates are collected at link time through
//! [`SUBSCRIBER_MODULES`]:
//!
//! ```rust,ignore
//! use herald_framework::{SUBSCRIBER_MODULES, SubscriberModule, linkme::distributed_slice};
//!
//! #[distributed_slice(SUBSCRIBER_MODULES)]
//! static MODERATION: SubscriberModule = SubscriberModule::new("moderation", || {
//!     vec![SubscriberDescriptor::of::<SpamFilter>().event::<MessageCreated>().build()]
//! });
//! ```

pub mod config;
pub mod delegate;
pub mod dispatcher;
pub mod error;
pub mod metadata;
pub mod provider;
pub mod registry;
pub mod subscriber;

#[cfg(test)]
mod testing;

pub use config::{DispatchConfig, DispatchScope, DispatchStrategy};
pub use delegate::{DelegateCache, DelegateService, Invocation, SubscriberDelegate, SubscriberDelegateKey};
pub use dispatcher::EventDispatcher;
pub use error::{DispatchError, DispatchResult, MetadataError, MetadataResult};
pub use metadata::{InterfaceInfo, SubscriberKind, SubscriberMetadata};
pub use provider::{MetadataProvider, SUBSCRIBER_MODULES, SubscriberModule};
pub use registry::EventMetadata;
pub use subscriber::{
    CommandEventSubscriber, DEFAULT_ORDER, EventSubscriber, HandlerEntry, ResolveStrategy,
    Subscriber, SubscriberDescriptor, SubscriberDescriptorBuilder, SubscriberFactory,
    SubscriberResult, interface_of,
};

pub use async_trait::async_trait;
pub use linkme;
pub use tokio_util::sync::CancellationToken;

/// Everything needed to write and register subscribers.
pub mod prelude {
    pub use crate::{
        CommandEventSubscriber, DispatchConfig, DispatchScope, DispatchStrategy, EventDispatcher,
        EventSubscriber, MetadataProvider, ResolveStrategy, Subscriber, SubscriberDescriptor,
        SubscriberModule, SubscriberResult, async_trait,
    };
    pub use herald_core::model::*;
    pub use herald_core::{
        BoxedEventArgs, BoxedSender, Injectable, ResolveResult, ServiceScope, TypeKey,
    };
}
