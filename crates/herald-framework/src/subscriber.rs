//! Subscriber traits and descriptors.
//!
//! Application code handles events by implementing [`EventSubscriber`] (basic
//! events, sent by a [`DiscordClient`]) or [`CommandEventSubscriber`] (command
//! events, sent by a [`CommandsExtension`]). Both are sugar over the generic
//! [`Subscriber<S, E>`] contract the delegate cache invokes.
//!
//! A [`SubscriberDescriptor`] is the explicit registration record for one
//! implementation: every event it handles, together with a pre-built delegate
//! for each, plus its dispatch order and resolve strategy.
//!
//! # Example
//!
//! ```rust,ignore
//! use herald_framework::prelude::*;
//!
//! struct Greeter;
//!
//! impl Injectable for Greeter {
//!     fn inject(_: &dyn ServiceScope) -> ResolveResult<Self> {
//!         Ok(Greeter)
//!     }
//! }
//!
//! #[async_trait]
//! impl EventSubscriber<GuildMemberAdded> for Greeter {
//!     async fn on_event(&self, _: &DiscordClient, event: &GuildMemberAdded) -> SubscriberResult {
//!         tracing::info!(user = event.user_id, "welcome");
//!         Ok(())
//!     }
//! }
//!
//! let descriptor = SubscriberDescriptor::of::<Greeter>()
//!     .event::<GuildMemberAdded>()
//!     .order(10)
//!     .build();
//! ```

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::delegate::{DelegateService, SubscriberDelegate};
use herald_core::{
    BoxError, CommandsExtension, DiscordClient, EventArgs, Injectable, ResolveResult, ServiceArc,
    ServiceScope, TypeKey,
};

/// Order assigned to subscribers that do not declare one. They run last.
pub const DEFAULT_ORDER: i32 = i32::MAX;

/// Result returned by subscriber handlers.
pub type SubscriberResult = Result<(), BoxError>;

/// Builds a type-erased subscriber instance from a scope.
pub type SubscriberFactory = fn(&dyn ServiceScope) -> ResolveResult<ServiceArc>;

// =============================================================================
// Subscriber traits
// =============================================================================

/// Handles events of type `E` raised by senders of type `S`.
///
/// Prefer implementing [`EventSubscriber`] or [`CommandEventSubscriber`]; this
/// trait is implemented for them automatically.
#[async_trait]
pub trait Subscriber<S, E>: Send + Sync + 'static
where
    S: Send + Sync + 'static,
    E: EventArgs,
{
    async fn handle(&self, sender: &S, event: &E) -> SubscriberResult;
}

/// Handles a basic event raised by the client connection.
#[async_trait]
pub trait EventSubscriber<E: EventArgs>: Send + Sync + 'static {
    async fn on_event(&self, client: &DiscordClient, event: &E) -> SubscriberResult;
}

/// Handles a command event raised by the command extension.
#[async_trait]
pub trait CommandEventSubscriber<E: EventArgs>: Send + Sync + 'static {
    async fn on_event(&self, commands: &CommandsExtension, event: &E) -> SubscriberResult;
}

#[async_trait]
impl<T, E> Subscriber<DiscordClient, E> for T
where
    T: EventSubscriber<E>,
    E: EventArgs,
{
    async fn handle(&self, sender: &DiscordClient, event: &E) -> SubscriberResult {
        EventSubscriber::on_event(self, sender, event).await
    }
}

#[async_trait]
impl<T, E> Subscriber<CommandsExtension, E> for T
where
    T: CommandEventSubscriber<E>,
    E: EventArgs,
{
    async fn handle(&self, sender: &CommandsExtension, event: &E) -> SubscriberResult {
        CommandEventSubscriber::on_event(self, sender, event).await
    }
}

/// The interface identity of `Subscriber<S, E>`.
pub fn interface_of<S, E>() -> TypeKey
where
    S: Send + Sync + 'static,
    E: EventArgs,
{
    TypeKey::of::<dyn Subscriber<S, E>>()
}

// =============================================================================
// ResolveStrategy
// =============================================================================

/// How a subscriber instance is obtained from a resolution scope.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolveStrategy {
    /// Resolve by the concrete implementation type.
    #[default]
    Implementation,
    /// Resolve the handled interface, keyed by the implementation.
    KeyedInterface,
}

// =============================================================================
// SubscriberDescriptor
// =============================================================================

/// One implemented `Subscriber<S, E>` with its compiled delegate.
#[derive(Clone)]
pub struct HandlerEntry {
    interface: TypeKey,
    sender: TypeKey,
    event: TypeKey,
    delegate: SubscriberDelegate,
}

impl HandlerEntry {
    /// Identity of the implemented interface.
    pub fn interface(&self) -> TypeKey {
        self.interface
    }

    /// The sender type the handler accepts.
    pub fn sender(&self) -> TypeKey {
        self.sender
    }

    /// The event type the handler accepts.
    pub fn event(&self) -> TypeKey {
        self.event
    }

    /// The cast-and-invoke delegate for this handler.
    pub fn delegate(&self) -> &SubscriberDelegate {
        &self.delegate
    }
}

impl fmt::Debug for HandlerEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerEntry")
            .field("sender", &self.sender)
            .field("event", &self.event)
            .finish_non_exhaustive()
    }
}

/// Registration record for one subscriber implementation.
#[derive(Clone)]
pub struct SubscriberDescriptor {
    implementation: TypeKey,
    handlers: Vec<HandlerEntry>,
    resolve_strategy: Option<ResolveStrategy>,
    order: Option<i32>,
    factory: SubscriberFactory,
}

impl SubscriberDescriptor {
    /// Starts a descriptor for the implementation `T`.
    pub fn of<T: Injectable>() -> SubscriberDescriptorBuilder<T> {
        SubscriberDescriptorBuilder {
            descriptor: SubscriberDescriptor {
                implementation: TypeKey::of::<T>(),
                handlers: Vec::new(),
                resolve_strategy: None,
                order: None,
                factory: inject_erased::<T>,
            },
            _marker: std::marker::PhantomData,
        }
    }

    /// The implementation type.
    pub fn implementation(&self) -> TypeKey {
        self.implementation
    }

    /// Every handler declared for the implementation, in declaration order.
    pub fn handlers(&self) -> &[HandlerEntry] {
        &self.handlers
    }

    /// Finds the handler for an exact sender and event pair.
    pub fn handler_for(&self, sender: TypeKey, event: TypeKey) -> Option<&HandlerEntry> {
        self.handlers
            .iter()
            .find(|h| h.sender == sender && h.event == event)
    }

    /// Finds the handler implementing `interface`.
    pub fn handler_by_interface(&self, interface: TypeKey) -> Option<&HandlerEntry> {
        self.handlers.iter().find(|h| h.interface == interface)
    }

    /// The declared resolve strategy, if any.
    pub fn resolve_strategy(&self) -> Option<ResolveStrategy> {
        self.resolve_strategy
    }

    /// The declared dispatch order, if any.
    pub fn order(&self) -> Option<i32> {
        self.order
    }

    /// The factory building the implementation from a scope.
    pub fn factory(&self) -> SubscriberFactory {
        self.factory
    }
}

impl fmt::Debug for SubscriberDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriberDescriptor")
            .field("implementation", &self.implementation)
            .field("handlers", &self.handlers)
            .field("resolve_strategy", &self.resolve_strategy)
            .field("order", &self.order)
            .finish()
    }
}

fn inject_erased<T: Injectable>(scope: &dyn ServiceScope) -> ResolveResult<ServiceArc> {
    Ok(Arc::new(T::inject(scope)?))
}

/// Builder returned by [`SubscriberDescriptor::of`].
pub struct SubscriberDescriptorBuilder<T> {
    descriptor: SubscriberDescriptor,
    _marker: std::marker::PhantomData<fn() -> T>,
}

impl<T: Injectable> SubscriberDescriptorBuilder<T> {
    /// Declares that `T` implements `Subscriber<S, E>`.
    ///
    /// Declaring the same pair twice has no effect.
    pub fn handles<S, E>(mut self) -> Self
    where
        T: Subscriber<S, E>,
        S: Send + Sync + 'static,
        E: EventArgs,
    {
        let interface = interface_of::<S, E>();
        if self.descriptor.handler_by_interface(interface).is_none() {
            self.descriptor.handlers.push(HandlerEntry {
                interface,
                sender: TypeKey::of::<S>(),
                event: TypeKey::of::<E>(),
                delegate: SubscriberDelegate::new(DelegateService::<T, S, E>::new()),
            });
        }
        self
    }

    /// Declares a basic event handled through [`EventSubscriber`].
    pub fn event<E: EventArgs>(self) -> Self
    where
        T: EventSubscriber<E>,
    {
        self.handles::<DiscordClient, E>()
    }

    /// Declares a command event handled through [`CommandEventSubscriber`].
    pub fn command_event<E: EventArgs>(self) -> Self
    where
        T: CommandEventSubscriber<E>,
    {
        self.handles::<CommandsExtension, E>()
    }

    /// Sets the dispatch order. Lower values run first.
    pub fn order(mut self, order: i32) -> Self {
        self.descriptor.order = Some(order);
        self
    }

    /// Sets how instances are resolved.
    pub fn resolved_by(mut self, strategy: ResolveStrategy) -> Self {
        self.descriptor.resolve_strategy = Some(strategy);
        self
    }

    /// Finishes the descriptor.
    pub fn build(self) -> SubscriberDescriptor {
        self.descriptor
    }
}

impl<T: Injectable> From<SubscriberDescriptorBuilder<T>> for SubscriberDescriptor {
    fn from(builder: SubscriberDescriptorBuilder<T>) -> Self {
        builder.build()
    }
}
