//! The metadata provider: registry of subscribers per event plus the
//! delegate cache.
//!
//! A [`MetadataProvider`] is populated during startup through `&mut self`
//! calls and then shared read-only (typically as `Arc<MetadataProvider>`) with
//! the dispatcher.
//!
//! # Scanning modules
//!
//! Crates can contribute subscribers without a central registration list by
//! adding a [`SubscriberModule`] to the [`SUBSCRIBER_MODULES`] distributed
//! slice. `append_modules(None)` then picks up every module linked into the
//! binary.
//!
//! ```rust,ignore
//! use herald_framework::linkme::distributed_slice;
//! use herald_framework::{SUBSCRIBER_MODULES, SubscriberModule};
//!
//! #[distributed_slice(SUBSCRIBER_MODULES)]
//! #[linkme(crate = herald_framework::linkme)]
//! static GREETINGS: SubscriberModule = SubscriberModule::new("greetings", || {
//!     vec![SubscriberDescriptor::of::<Greeter>().event::<GuildMemberAdded>().build()]
//! });
//!
//! let mut provider = MetadataProvider::new();
//! provider.append_modules(None)?;
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use linkme::distributed_slice;
use tracing::{debug, info, trace};

use crate::delegate::{DelegateCache, SubscriberDelegate, SubscriberDelegateKey};
use crate::error::{MetadataError, MetadataResult};
use crate::metadata::SubscriberMetadata;
use crate::registry::EventMetadata;
use crate::subscriber::SubscriberDescriptor;
use herald_core::{EventCatalog, EventCategory, TypeKey};

// =============================================================================
// Subscriber modules (linkme distributed slice)
// =============================================================================

/// A named group of subscriber descriptors, typically one per crate or feature.
pub struct SubscriberModule {
    name: &'static str,
    descriptors: fn() -> Vec<SubscriberDescriptor>,
}

impl SubscriberModule {
    pub const fn new(name: &'static str, descriptors: fn() -> Vec<SubscriberDescriptor>) -> Self {
        Self { name, descriptors }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn descriptors(&self) -> Vec<SubscriberDescriptor> {
        (self.descriptors)()
    }
}

impl std::fmt::Debug for SubscriberModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriberModule")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Every subscriber module linked into the binary.
#[distributed_slice]
pub static SUBSCRIBER_MODULES: [SubscriberModule];

// =============================================================================
// MetadataProvider
// =============================================================================

/// Owns the event registry and the delegate cache.
pub struct MetadataProvider {
    catalog: Arc<EventCatalog>,
    descriptors: HashMap<TypeKey, SubscriberDescriptor>,
    events: HashMap<TypeKey, EventMetadata>,
    delegates: DelegateCache,
}

impl Default for MetadataProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MetadataProvider {
    /// Creates an empty provider classifying events with the built-in catalog.
    pub fn new() -> Self {
        Self::with_catalog(EventCatalog::discord())
    }

    /// Creates an empty provider classifying events with `catalog`.
    pub fn with_catalog(catalog: Arc<EventCatalog>) -> Self {
        Self {
            catalog,
            descriptors: HashMap::new(),
            events: HashMap::new(),
            delegates: DelegateCache::new(),
        }
    }

    /// Registers subscriber implementations.
    ///
    /// Implementations that are already known are skipped, so appending is
    /// idempotent per type. The call is atomic: if any descriptor is invalid,
    /// nothing from this batch is registered.
    pub fn append_types<I>(&mut self, descriptors: I) -> MetadataResult<&mut Self>
    where
        I: IntoIterator<Item = SubscriberDescriptor>,
    {
        let mut seen = HashSet::new();
        let mut staged = Vec::new();

        for descriptor in descriptors {
            let implementation = descriptor.implementation();
            if self.descriptors.contains_key(&implementation) || !seen.insert(implementation) {
                trace!(subscriber = %implementation, "Subscriber already registered, skipping");
                continue;
            }

            let metadata = SubscriberMetadata::create(&descriptor, &self.catalog)?;
            staged.push((descriptor, Arc::new(metadata)));
        }

        let mut delegates = Vec::new();
        for (descriptor, metadata) in &staged {
            delegates.extend(self.compile_delegates(descriptor, metadata)?);
        }

        let added = staged.len();
        for (descriptor, metadata) in staged {
            self.register(&metadata);
            self.descriptors.insert(descriptor.implementation(), descriptor);
        }
        for (key, delegate) in delegates {
            self.delegates.insert_if_absent(key, delegate);
        }

        info!(
            added,
            subscribers = self.descriptors.len(),
            events = self.events.len(),
            delegates = self.delegates.len(),
            "Subscriber metadata appended"
        );

        Ok(self)
    }

    /// Registers every subscriber of the given modules, or of every linked
    /// module when `modules` is `None`.
    pub fn append_modules(
        &mut self,
        modules: Option<&[SubscriberModule]>,
    ) -> MetadataResult<&mut Self> {
        let modules: &[SubscriberModule] = match modules {
            Some(modules) => modules,
            None => &SUBSCRIBER_MODULES,
        };

        let mut descriptors = Vec::new();
        for module in modules {
            let found = module.descriptors();
            debug!(module = module.name(), subscribers = found.len(), "Scanning subscriber module");
            descriptors.extend(found);
        }

        self.append_types(descriptors)
    }

    /// Builds delegates for every event of `metadata` that is not cached yet.
    fn compile_delegates(
        &self,
        descriptor: &SubscriberDescriptor,
        metadata: &SubscriberMetadata,
    ) -> MetadataResult<Vec<(SubscriberDelegateKey, SubscriberDelegate)>> {
        let mut compiled = Vec::new();

        for (&event, info) in metadata.interfaces() {
            let key = SubscriberDelegateKey::new(metadata.implementation(), event);
            if self.delegates.contains(&key) {
                continue;
            }

            let sender = info.kind.sender_type();
            let handler = descriptor.handler_for(sender, event).ok_or(
                MetadataError::HandlerNotFound {
                    subscriber: metadata.implementation(),
                    event,
                    sender,
                },
            )?;
            compiled.push((key, handler.delegate().clone()));
        }

        Ok(compiled)
    }

    fn register(&mut self, metadata: &Arc<SubscriberMetadata>) {
        for &event in metadata.event_types() {
            let Some(info) = metadata.interface_for(event) else {
                continue;
            };
            let entry = self
                .events
                .entry(event)
                .or_insert_with(|| EventMetadata::new(event, info.kind));
            if entry.try_add(Arc::clone(metadata)) {
                debug!(
                    subscriber = %metadata.implementation(),
                    event = %event,
                    category = %info.kind,
                    order = metadata.order(),
                    "Registered event subscriber"
                );
            }
        }
    }

    // ─── Read API ────────────────────────────────────────────────────────────

    /// The catalog used to classify events.
    pub fn catalog(&self) -> &Arc<EventCatalog> {
        &self.catalog
    }

    /// Every registry entry, basic and command.
    pub fn event_data(&self) -> &HashMap<TypeKey, EventMetadata> {
        &self.events
    }

    /// Registry entries for basic events.
    pub fn basic_event_data(&self) -> impl Iterator<Item = &EventMetadata> {
        self.events_in(EventCategory::Basic)
    }

    /// Registry entries for command events.
    pub fn command_event_data(&self) -> impl Iterator<Item = &EventMetadata> {
        self.events_in(EventCategory::Command)
    }

    fn events_in(&self, category: EventCategory) -> impl Iterator<Item = &EventMetadata> {
        self.events.values().filter(move |e| e.category() == category)
    }

    /// The registry entry for `event`, if any subscriber handles it.
    pub fn event(&self, event: TypeKey) -> Option<&EventMetadata> {
        self.events.get(&event)
    }

    /// The registry entry for `event` if it is a basic event.
    pub fn basic_event(&self, event: TypeKey) -> Option<&EventMetadata> {
        self.event(event)
            .filter(|e| e.category() == EventCategory::Basic)
    }

    /// The registry entry for `event` if it is a command event.
    pub fn command_event(&self, event: TypeKey) -> Option<&EventMetadata> {
        self.event(event)
            .filter(|e| e.category() == EventCategory::Command)
    }

    /// The cached delegate for `implementation` handling `event`.
    pub fn subscriber_delegate(
        &self,
        implementation: TypeKey,
        event: TypeKey,
    ) -> Option<&SubscriberDelegate> {
        self.delegates
            .get(&SubscriberDelegateKey::new(implementation, event))
    }

    pub fn delegates(&self) -> &DelegateCache {
        &self.delegates
    }

    /// The descriptor registered for `implementation`.
    pub fn descriptor(&self, implementation: TypeKey) -> Option<&SubscriberDescriptor> {
        self.descriptors.get(&implementation)
    }

    /// Every registered descriptor, in no particular order.
    pub fn descriptors(&self) -> impl Iterator<Item = &SubscriberDescriptor> {
        self.descriptors.values()
    }

    /// The metadata of `implementation`, looked up through any event it handles.
    pub fn subscriber(&self, implementation: TypeKey) -> Option<&Arc<SubscriberMetadata>> {
        self.events.values().find_map(|e| e.get(implementation))
    }
}

impl std::fmt::Debug for MetadataProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetadataProvider")
            .field("subscribers", &self.descriptors.len())
            .field("events", &self.events.len())
            .field("delegates", &self.delegates)
            .finish()
    }
}
