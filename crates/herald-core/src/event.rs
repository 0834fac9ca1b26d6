//! Event payloads, categories and the catalog of known events.
//!
//! Every payload type implements [`EventArgs`]. Whether a payload is a *basic*
//! event (raised by the client connection) or a *command* event (raised by the
//! command extension) is decided by membership in an [`EventCatalog`], not by
//! the type itself, so applications can extend the catalog with their own
//! payloads.
//!
//! # Example
//!
//! ```rust,ignore
//! use herald_core::{EventCatalog, EventCategory};
//! use herald_core::model::MessageCreated;
//!
//! let catalog = EventCatalog::builder()
//!     .with_discord()
//!     .basic::<MyCustomEvent>()
//!     .build();
//!
//! assert_eq!(catalog.category_of_type::<MessageCreated>(), Some(EventCategory::Basic));
//! ```

use std::any::Any;
use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, LazyLock};

use serde::{Deserialize, Serialize};

use crate::key::TypeKey;
use crate::model::{self, CommandsExtension, DiscordClient};

/// Marker trait for event payloads.
pub trait EventArgs: Any + Send + Sync + 'static {}

// =============================================================================
// EventCategory
// =============================================================================

/// Which family an event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventCategory {
    /// Raised directly by the client connection.
    Basic,
    /// Raised by the command extension.
    Command,
}

impl EventCategory {
    /// The sender type that accompanies events of this category.
    pub fn sender_type(self) -> TypeKey {
        match self {
            Self::Basic => TypeKey::of::<DiscordClient>(),
            Self::Command => TypeKey::of::<CommandsExtension>(),
        }
    }

    /// Returns the category name as a string.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::Command => "command",
        }
    }
}

impl fmt::Display for EventCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// EventCatalog
// =============================================================================

static DISCORD_CATALOG: LazyLock<Arc<EventCatalog>> =
    LazyLock::new(|| Arc::new(EventCatalog::builder().with_discord().build()));

/// Immutable sets of known basic and command event types.
#[derive(Debug, Clone, Default)]
pub struct EventCatalog {
    basic: HashSet<TypeKey>,
    command: HashSet<TypeKey>,
}

impl EventCatalog {
    /// Returns a builder for a custom catalog.
    pub fn builder() -> EventCatalogBuilder {
        EventCatalogBuilder::default()
    }

    /// The catalog of built-in Discord events, built once per process.
    pub fn discord() -> Arc<EventCatalog> {
        Arc::clone(&DISCORD_CATALOG)
    }

    /// Classifies an event type. The basic set is consulted first.
    pub fn category_of(&self, event: TypeKey) -> Option<EventCategory> {
        if self.basic.contains(&event) {
            Some(EventCategory::Basic)
        } else if self.command.contains(&event) {
            Some(EventCategory::Command)
        } else {
            None
        }
    }

    /// Classifies `E`.
    pub fn category_of_type<E: EventArgs>(&self) -> Option<EventCategory> {
        self.category_of(TypeKey::of::<E>())
    }

    /// Returns `true` if `event` is a known basic event.
    pub fn is_basic(&self, event: TypeKey) -> bool {
        self.basic.contains(&event)
    }

    /// Returns `true` if `event` is a known command event.
    pub fn is_command(&self, event: TypeKey) -> bool {
        self.command.contains(&event)
    }

    /// Known basic event types, in no particular order.
    pub fn basic_events(&self) -> impl Iterator<Item = TypeKey> + '_ {
        self.basic.iter().copied()
    }

    /// Known command event types, in no particular order.
    pub fn command_events(&self) -> impl Iterator<Item = TypeKey> + '_ {
        self.command.iter().copied()
    }

    /// Total number of known event types.
    pub fn len(&self) -> usize {
        self.basic.len() + self.command.len()
    }

    /// Returns `true` if the catalog knows no events.
    pub fn is_empty(&self) -> bool {
        self.basic.is_empty() && self.command.is_empty()
    }
}

/// Builder for [`EventCatalog`].
#[derive(Debug, Default)]
pub struct EventCatalogBuilder {
    basic: HashSet<TypeKey>,
    command: HashSet<TypeKey>,
}

impl EventCatalogBuilder {
    /// Adds every built-in Discord basic and command event.
    pub fn with_discord(mut self) -> Self {
        self.basic.extend(model::basic_event_types());
        self.command.extend(model::command_event_types());
        self
    }

    /// Registers `E` as a basic event.
    pub fn basic<E: EventArgs>(mut self) -> Self {
        self.basic.insert(TypeKey::of::<E>());
        self
    }

    /// Registers `E` as a command event.
    pub fn command<E: EventArgs>(mut self) -> Self {
        self.command.insert(TypeKey::of::<E>());
        self
    }

    /// Finishes the catalog.
    pub fn build(self) -> EventCatalog {
        EventCatalog {
            basic: self.basic,
            command: self.command,
        }
    }
}

// =============================================================================
// Type-erased carriers
// =============================================================================

/// A shared, type-erased event payload tagged with its concrete type.
#[derive(Clone)]
pub struct BoxedEventArgs {
    inner: Arc<dyn Any + Send + Sync>,
    key: TypeKey,
}

impl BoxedEventArgs {
    /// Wraps an event payload.
    pub fn new<E: EventArgs>(args: E) -> Self {
        Self::from_arc(Arc::new(args))
    }

    /// Wraps an already shared event payload.
    pub fn from_arc<E: EventArgs>(args: Arc<E>) -> Self {
        Self {
            inner: args,
            key: TypeKey::of::<E>(),
        }
    }

    /// The concrete payload type.
    pub fn type_key(&self) -> TypeKey {
        self.key
    }

    /// Borrows the payload as `E`, if that is its concrete type.
    pub fn downcast_ref<E: EventArgs>(&self) -> Option<&E> {
        self.inner.downcast_ref::<E>()
    }

    /// Returns a shared handle to the payload as `E`.
    pub fn downcast_arc<E: EventArgs>(&self) -> Option<Arc<E>> {
        Arc::clone(&self.inner).downcast::<E>().ok()
    }
}

impl fmt::Debug for BoxedEventArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoxedEventArgs")
            .field("type", &self.key)
            .finish_non_exhaustive()
    }
}

/// A shared, type-erased event sender tagged with its concrete type.
#[derive(Clone)]
pub struct BoxedSender {
    inner: Arc<dyn Any + Send + Sync>,
    key: TypeKey,
}

impl BoxedSender {
    /// Wraps a sender.
    pub fn new<S: Any + Send + Sync>(sender: S) -> Self {
        Self::from_arc(Arc::new(sender))
    }

    /// Wraps an already shared sender.
    pub fn from_arc<S: Any + Send + Sync>(sender: Arc<S>) -> Self {
        Self {
            inner: sender,
            key: TypeKey::of::<S>(),
        }
    }

    /// The concrete sender type.
    pub fn type_key(&self) -> TypeKey {
        self.key
    }

    /// Borrows the sender as `S`, if that is its concrete type.
    pub fn downcast_ref<S: Any + Send + Sync>(&self) -> Option<&S> {
        self.inner.downcast_ref::<S>()
    }
}

impl fmt::Debug for BoxedSender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoxedSender")
            .field("type", &self.key)
            .finish_non_exhaustive()
    }
}
