//! Per-event registry entries.

use std::sync::Arc;

use indexmap::IndexMap;
use indexmap::map::Entry;

use crate::metadata::SubscriberMetadata;
use herald_core::{EventCategory, TypeKey};

/// Every subscriber registered for one event type.
///
/// Entries are created the first time a subscriber for the event is
/// appended and only ever grow. The map keeps registration order so that
/// subscribers sharing an `order` keep a deterministic relative position.
#[derive(Debug, Clone)]
pub struct EventMetadata {
    event: TypeKey,
    category: EventCategory,
    subscribers: IndexMap<TypeKey, Arc<SubscriberMetadata>>,
}

impl EventMetadata {
    pub fn new(event: TypeKey, category: EventCategory) -> Self {
        Self {
            event,
            category,
            subscribers: IndexMap::new(),
        }
    }

    pub fn event(&self) -> TypeKey {
        self.event
    }

    pub fn category(&self) -> EventCategory {
        self.category
    }

    /// Adds `subscriber` unless its implementation is already present.
    ///
    /// Returns `true` if it was added.
    pub fn try_add(&mut self, subscriber: Arc<SubscriberMetadata>) -> bool {
        debug_assert!(
            subscriber.handles(self.event),
            "{} does not handle {}",
            subscriber.implementation(),
            self.event
        );

        match self.subscribers.entry(subscriber.implementation()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(subscriber);
                true
            }
        }
    }

    pub fn get(&self, implementation: TypeKey) -> Option<&Arc<SubscriberMetadata>> {
        self.subscribers.get(&implementation)
    }

    pub fn contains(&self, implementation: TypeKey) -> bool {
        self.subscribers.contains_key(&implementation)
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    /// Subscribers in registration order.
    pub fn subscribers(&self) -> impl Iterator<Item = &Arc<SubscriberMetadata>> {
        self.subscribers.values()
    }

    /// Subscribers sorted by ascending order, ties kept in registration order.
    pub fn ordered(&self) -> Vec<Arc<SubscriberMetadata>> {
        let mut subscribers: Vec<_> = self.subscribers().cloned().collect();
        subscribers.sort_by_key(|s| s.order());
        subscribers
    }
}
