//! Immutable per-subscriber metadata.

use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use crate::error::{MetadataError, MetadataResult};
use crate::subscriber::{DEFAULT_ORDER, HandlerEntry, ResolveStrategy, SubscriberDescriptor};
use herald_core::{EventCatalog, EventCategory, TypeKey};

/// Classification of a subscriber interface.
pub type SubscriberKind = EventCategory;

/// The interface through which a subscriber handles one event type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterfaceInfo {
    pub interface: TypeKey,
    pub kind: SubscriberKind,
}

/// Describes one subscriber implementation.
///
/// Built once per implementation type and never mutated. Two metadata values
/// are equal when they describe the same implementation.
#[derive(Debug, Clone)]
pub struct SubscriberMetadata {
    resolve_strategy: ResolveStrategy,
    implementation: TypeKey,
    interfaces: HashMap<TypeKey, InterfaceInfo>,
    event_types: Vec<TypeKey>,
    is_command_event_subscriber: bool,
    is_basic_event_subscriber: bool,
    order: i32,
}

impl SubscriberMetadata {
    /// Builds metadata covering every handler declared by `descriptor`.
    pub fn create(descriptor: &SubscriberDescriptor, catalog: &EventCatalog) -> MetadataResult<Self> {
        Self::from_handlers(descriptor, descriptor.handlers().iter(), catalog)
    }

    /// Builds metadata restricted to the single `interface`.
    pub fn create_for(
        descriptor: &SubscriberDescriptor,
        interface: TypeKey,
        catalog: &EventCatalog,
    ) -> MetadataResult<Self> {
        let handler = descriptor.handler_by_interface(interface).ok_or(
            MetadataError::InterfaceNotImplemented {
                subscriber: descriptor.implementation(),
                interface,
            },
        )?;
        Self::from_handlers(descriptor, std::iter::once(handler), catalog)
    }

    fn from_handlers<'a>(
        descriptor: &SubscriberDescriptor,
        handlers: impl Iterator<Item = &'a HandlerEntry>,
        catalog: &EventCatalog,
    ) -> MetadataResult<Self> {
        let implementation = descriptor.implementation();
        let mut interfaces = HashMap::new();
        let mut event_types = Vec::new();

        for handler in handlers {
            let event = handler.event();
            let kind = catalog
                .category_of(event)
                .ok_or(MetadataError::UnrecognizedEventType {
                    subscriber: implementation,
                    event,
                })?;

            let info = InterfaceInfo {
                interface: handler.interface(),
                kind,
            };
            if interfaces.insert(event, info).is_some() {
                return Err(MetadataError::AmbiguousInterface {
                    subscriber: implementation,
                    event,
                });
            }
            event_types.push(event);
        }

        if event_types.is_empty() {
            return Err(MetadataError::NoQualifyingInterface {
                subscriber: implementation,
            });
        }

        let kinds = || interfaces.values().map(|info| info.kind);
        let is_command_event_subscriber = kinds().any(|k| k == EventCategory::Command);
        let is_basic_event_subscriber = kinds().any(|k| k == EventCategory::Basic);

        Ok(Self {
            resolve_strategy: descriptor.resolve_strategy().unwrap_or_default(),
            implementation,
            interfaces,
            event_types,
            is_command_event_subscriber,
            is_basic_event_subscriber,
            order: descriptor.order().unwrap_or(DEFAULT_ORDER),
        })
    }

    pub fn resolve_strategy(&self) -> ResolveStrategy {
        self.resolve_strategy
    }

    pub fn implementation(&self) -> TypeKey {
        self.implementation
    }

    /// Event type to implemented interface.
    pub fn interfaces(&self) -> &HashMap<TypeKey, InterfaceInfo> {
        &self.interfaces
    }

    /// The interface handling `event`, if any.
    pub fn interface_for(&self, event: TypeKey) -> Option<&InterfaceInfo> {
        self.interfaces.get(&event)
    }

    /// Handled event types in declaration order.
    pub fn event_types(&self) -> &[TypeKey] {
        &self.event_types
    }

    pub fn handles(&self, event: TypeKey) -> bool {
        self.interfaces.contains_key(&event)
    }

    pub fn is_command_event_subscriber(&self) -> bool {
        self.is_command_event_subscriber
    }

    pub fn is_basic_event_subscriber(&self) -> bool {
        self.is_basic_event_subscriber
    }

    /// Dispatch priority; lower runs first.
    pub fn order(&self) -> i32 {
        self.order
    }
}

impl PartialEq for SubscriberMetadata {
    fn eq(&self, other: &Self) -> bool {
        self.implementation == other.implementation
    }
}

impl Eq for SubscriberMetadata {}

impl Hash for SubscriberMetadata {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.implementation.hash(state);
    }
}
