//! Service registrations for event subscribers.
//!
//! A subscriber implementation is registered as a scoped service built by its
//! descriptor factory. Each interface it implements gets two forwarding
//! registrations, one plain and one keyed by the implementation, that resolve
//! to that same scoped instance. The dispatcher can then resolve it either by
//! implementation or through the keyed interface.

use std::sync::Arc;

use tracing::{debug, info};

use crate::container::{Lifetime, ServiceCollection, ServiceDescriptor, ServiceFactory};
use herald_core::{EventCatalog, ServiceKey, ServiceScope, TypeKey};
use herald_framework::{
    MetadataProvider, MetadataResult, SubscriberDescriptor, SubscriberKind, SubscriberMetadata,
};

fn forward_to(implementation: TypeKey) -> ServiceFactory {
    Arc::new(move |scope: &dyn ServiceScope| scope.resolve(implementation))
}

impl ServiceCollection {
    /// Registers one subscriber implementation and its interfaces.
    ///
    /// Existing registrations are kept.
    pub fn add_event_subscriber(
        &mut self,
        descriptor: &SubscriberDescriptor,
        metadata: &SubscriberMetadata,
    ) -> &mut Self {
        let implementation = descriptor.implementation();
        self.try_add(ServiceDescriptor::new(
            implementation,
            Lifetime::Scoped,
            Arc::new(descriptor.factory()),
        ));

        for interface in metadata.interfaces().values().map(|info| info.interface) {
            self.try_add(ServiceDescriptor::new(
                interface,
                Lifetime::Transient,
                forward_to(implementation),
            ));
            self.try_add_keyed(
                interface,
                ServiceKey::from(implementation),
                Lifetime::Transient,
                forward_to(implementation),
            );
        }

        debug!(
            subscriber = %implementation,
            interfaces = metadata.interfaces().len(),
            "Registered event subscriber"
        );
        self
    }

    /// Registers one subscriber implementation for a single `interface`.
    ///
    /// Only that interface gets forwarding registrations. Fails if the
    /// descriptor does not declare `interface`.
    pub fn add_event_subscriber_for(
        &mut self,
        descriptor: &SubscriberDescriptor,
        interface: TypeKey,
        catalog: &EventCatalog,
    ) -> MetadataResult<&mut Self> {
        let metadata = SubscriberMetadata::create_for(descriptor, interface, catalog)?;
        Ok(self.add_event_subscriber(descriptor, &metadata))
    }

    /// Registers every subscriber known to `provider`, optionally only those
    /// handling events of `kind`.
    pub fn add_event_subscribers(
        &mut self,
        provider: &MetadataProvider,
        kind: Option<SubscriberKind>,
    ) -> &mut Self {
        let mut registered = 0;
        for descriptor in provider.descriptors() {
            let Some(metadata) = provider.subscriber(descriptor.implementation()) else {
                continue;
            };
            let included = match kind {
                None => true,
                Some(SubscriberKind::Basic) => metadata.is_basic_event_subscriber(),
                Some(SubscriberKind::Command) => metadata.is_command_event_subscriber(),
            };
            if included {
                self.add_event_subscriber(descriptor, metadata);
                registered += 1;
            }
        }

        info!(subscribers = registered, kind = ?kind, "Registered event subscribers");
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use herald_core::model::{CommandExecuted, MessageCreated, MessageDeleted};
    use herald_core::{CommandsExtension, DiscordClient, Injectable, ResolveResult};
    use herald_framework::{
        CommandEventSubscriber, EventSubscriber, MetadataError, SubscriberResult, interface_of,
    };

    struct Audit;

    impl Injectable for Audit {
        fn inject(_: &dyn ServiceScope) -> ResolveResult<Self> {
            Ok(Audit)
        }
    }

    #[async_trait]
    impl EventSubscriber<MessageCreated> for Audit {
        async fn on_event(&self, _: &DiscordClient, _: &MessageCreated) -> SubscriberResult {
            Ok(())
        }
    }

    #[async_trait]
    impl EventSubscriber<MessageDeleted> for Audit {
        async fn on_event(&self, _: &DiscordClient, _: &MessageDeleted) -> SubscriberResult {
            Ok(())
        }
    }

    struct Usage;

    impl Injectable for Usage {
        fn inject(_: &dyn ServiceScope) -> ResolveResult<Self> {
            Ok(Usage)
        }
    }

    #[async_trait]
    impl CommandEventSubscriber<CommandExecuted> for Usage {
        async fn on_event(&self, _: &CommandsExtension, _: &CommandExecuted) -> SubscriberResult {
            Ok(())
        }
    }

    fn provider() -> MetadataProvider {
        let mut provider = MetadataProvider::new();
        provider
            .append_types([
                SubscriberDescriptor::of::<Audit>()
                    .event::<MessageCreated>()
                    .build(),
                SubscriberDescriptor::of::<Usage>()
                    .command_event::<CommandExecuted>()
                    .build(),
            ])
            .unwrap();
        provider
    }

    #[test]
    fn test_interfaces_forward_to_scoped_instance() {
        let mut services = ServiceCollection::new();
        services.add_event_subscribers(&provider(), None);

        let interface = interface_of::<DiscordClient, MessageCreated>();
        let implementation = TypeKey::of::<Audit>();
        assert!(services.contains(implementation));
        assert!(services.contains(interface));
        assert!(services.contains_keyed(interface, ServiceKey::from(implementation)));

        let container = services.build();
        let scope = container.scope();
        let direct = scope.resolve(implementation).unwrap();
        let plain = scope.resolve(interface).unwrap();
        let keyed = scope
            .resolve_keyed(interface, ServiceKey::from(implementation))
            .unwrap();

        assert!(Arc::ptr_eq(&direct, &plain));
        assert!(Arc::ptr_eq(&direct, &keyed));
    }

    #[test]
    fn test_filter_by_kind() {
        let provider = provider();

        let mut services = ServiceCollection::new();
        services.add_event_subscribers(&provider, Some(SubscriberKind::Command));

        assert!(services.contains(TypeKey::of::<Usage>()));
        assert!(!services.contains(TypeKey::of::<Audit>()));
    }

    #[test]
    fn test_register_single_interface() {
        let descriptor = SubscriberDescriptor::of::<Audit>()
            .event::<MessageCreated>()
            .event::<MessageDeleted>()
            .build();
        let created = interface_of::<DiscordClient, MessageCreated>();
        let deleted = interface_of::<DiscordClient, MessageDeleted>();
        let implementation = TypeKey::of::<Audit>();

        let mut services = ServiceCollection::new();
        services
            .add_event_subscriber_for(&descriptor, deleted, &EventCatalog::discord())
            .unwrap();

        assert!(services.contains(implementation));
        assert!(services.contains(deleted));
        assert!(services.contains_keyed(deleted, ServiceKey::from(implementation)));
        assert!(!services.contains(created));
        assert!(!services.contains_keyed(created, ServiceKey::from(implementation)));
    }

    #[test]
    fn test_register_undeclared_interface() {
        let descriptor = SubscriberDescriptor::of::<Audit>()
            .event::<MessageCreated>()
            .build();
        let deleted = interface_of::<DiscordClient, MessageDeleted>();

        let mut services = ServiceCollection::new();
        let result = services.add_event_subscriber_for(&descriptor, deleted, &EventCatalog::discord());

        assert!(matches!(
            result,
            Err(MetadataError::InterfaceNotImplemented { interface, .. }) if interface == deleted
        ));
        assert!(!services.contains(TypeKey::of::<Audit>()));
    }
}
