//! # Herald Core
//!
//! Foundation types shared by every Herald crate.
//!
//! This crate defines:
//! - [`TypeKey`], the stable identity used for events, subscribers, senders and services
//! - The [`EventArgs`] marker trait, [`EventCategory`] and the [`EventCatalog`] of known events
//! - Type-erased carriers for senders and event payloads ([`BoxedSender`], [`BoxedEventArgs`])
//! - The platform object model the dispatcher observes ([`model`])
//! - The resolution contract consumed by the dispatcher ([`ServiceProvider`], [`ServiceScope`])
//!
//! Nothing here knows how subscribers are discovered or dispatched; that lives in
//! `herald-framework`.

pub mod error;
pub mod event;
pub mod key;
pub mod model;
pub mod service;

pub use error::{BoxError, ResolveError, ResolveResult};
pub use event::{BoxedEventArgs, BoxedSender, EventArgs, EventCatalog, EventCatalogBuilder, EventCategory};
pub use key::TypeKey;
pub use model::{CommandsExtension, DiscordClient};
pub use service::{Injectable, ServiceArc, ServiceKey, ServiceProvider, ServiceScope};
