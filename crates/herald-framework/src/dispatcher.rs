//! The event dispatcher.
//!
//! [`EventDispatcher`] receives `(event type, sender, payload)` triples from
//! an inbound adapter, looks up the registered subscribers and invokes their
//! cached delegates under the configured policy:
//!
//! | Strategy × scope | Behaviour |
//! |------------------|-----------|
//! | sequential × per subscriber | one scope per subscriber, all resolved up front, invoked in `order` |
//! | sequential × per event | one shared scope, invoked in `order` |
//! | parallel × per subscriber | each subscriber resolves, runs and disposes in its own scope concurrently |
//! | parallel × per event | one shared scope, resolved in `order`, invoked concurrently |
//!
//! Every scope opened for an occurrence is disposed exactly once, whether the
//! occurrence succeeds or fails. Subscriber errors are never swallowed: a
//! sequential dispatch stops at the first failure, a parallel one waits for
//! every subscriber and reports all failures.
//!
//! The dispatcher starts **stopped**; calls made while stopped are dropped.
//!
//! ```rust,ignore
//! let dispatcher = EventDispatcher::new(Arc::new(provider), services, DispatchConfig::default());
//! dispatcher.start();
//! dispatcher
//!     .publish(BoxedSender::new(client), MessageCreated { content: "hi".into(), ..Default::default() })
//!     .await?;
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::{StreamExt, stream};
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;
use tracing::{Instrument, debug, debug_span, error, trace};
use uuid::Uuid;

use crate::config::{DispatchConfig, DispatchScope, DispatchStrategy};
use crate::delegate::Invocation;
use crate::error::{DispatchError, DispatchResult};
use crate::metadata::SubscriberMetadata;
use crate::provider::MetadataProvider;
use crate::registry::EventMetadata;
use crate::subscriber::ResolveStrategy;
use herald_core::{
    BoxedEventArgs, BoxedSender, EventArgs, ResolveError, ServiceArc, ServiceKey, ServiceProvider,
    ServiceScope, TypeKey,
};

/// One event occurrence being dispatched.
struct Occurrence {
    event: TypeKey,
    sender: BoxedSender,
    args: BoxedEventArgs,
    cancel: CancellationToken,
}

impl Occurrence {
    fn ensure_active(&self) -> DispatchResult {
        if self.cancel.is_cancelled() {
            Err(DispatchError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Folds the results of a parallel run into one.
    ///
    /// Subscribers skipped by cancellation only surface as `Cancelled` when
    /// nothing else failed.
    fn finish(&self, results: Vec<DispatchResult>) -> DispatchResult {
        let mut cancelled = false;
        let errors: Vec<_> = results
            .into_iter()
            .filter_map(Result::err)
            .filter(|e| {
                let skipped = matches!(e, DispatchError::Cancelled);
                cancelled |= skipped;
                !skipped
            })
            .collect();

        match DispatchError::collect(errors) {
            Some(err) => Err(err),
            None if cancelled => Err(DispatchError::Cancelled),
            None => Ok(()),
        }
    }
}

/// Dispatches events to registered subscribers.
pub struct EventDispatcher {
    metadata: Arc<MetadataProvider>,
    services: Arc<dyn ServiceProvider>,
    config: DispatchConfig,
    enabled: AtomicBool,
}

impl EventDispatcher {
    /// Creates a stopped dispatcher.
    pub fn new(
        metadata: Arc<MetadataProvider>,
        services: Arc<dyn ServiceProvider>,
        config: DispatchConfig,
    ) -> Self {
        Self {
            metadata,
            services,
            config,
            enabled: AtomicBool::new(false),
        }
    }

    pub fn metadata(&self) -> &Arc<MetadataProvider> {
        &self.metadata
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Starts accepting dispatch calls.
    pub fn start(&self) {
        if !self.enabled.swap(true, Ordering::SeqCst) {
            debug!("Event dispatcher started");
        }
    }

    /// Stops accepting dispatch calls. Dispatches already in flight run to
    /// completion.
    pub fn stop(&self) {
        if self.enabled.swap(false, Ordering::SeqCst) {
            debug!("Event dispatcher stopped");
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    // =========================================================================
    // Entry points
    // =========================================================================

    /// Invokes a single subscriber for an event in its own scope.
    ///
    /// A subscriber that is not registered for `event`, or that the service
    /// provider has no registration for, is logged and ignored.
    pub async fn dispatch_single(
        &self,
        implementation: TypeKey,
        event: TypeKey,
        sender: BoxedSender,
        args: BoxedEventArgs,
    ) -> DispatchResult {
        if !self.is_enabled() {
            trace!(event = %event, "Dispatcher stopped, dropping event");
            return Ok(());
        }

        debug!(subscriber = %implementation, event = %event, "Executing single subscriber");

        let Some(data) = self.metadata.event(event) else {
            return Ok(());
        };
        let Some(subscriber) = data.get(implementation) else {
            error!(subscriber = %implementation, event = %event, "Subscriber not found for event");
            return Ok(());
        };

        let occurrence = Occurrence {
            event,
            sender,
            args,
            cancel: CancellationToken::new(),
        };
        let scope = self.services.create_scope();
        let result = self
            .resolve_and_invoke(scope.as_ref(), subscriber, &occurrence)
            .await;
        scope.dispose().await;

        match result {
            Err(DispatchError::Resolve {
                subscriber,
                source:
                    source @ (ResolveError::NotRegistered { .. }
                    | ResolveError::KeyedNotRegistered { .. }),
            }) => {
                error!(
                    subscriber = %subscriber,
                    event = %event,
                    error = %source,
                    "Subscriber is not registered with the service provider"
                );
                Ok(())
            }
            other => other,
        }
    }

    /// Dispatches an event to every registered subscriber.
    pub async fn dispatch(
        &self,
        event: TypeKey,
        sender: BoxedSender,
        args: BoxedEventArgs,
    ) -> DispatchResult {
        self.dispatch_with_cancellation(event, sender, args, CancellationToken::new())
            .await
    }

    /// Dispatches a typed event to every registered subscriber.
    pub async fn publish<E: EventArgs>(&self, sender: BoxedSender, args: E) -> DispatchResult {
        self.dispatch(TypeKey::of::<E>(), sender, BoxedEventArgs::new(args))
            .await
    }

    /// Dispatches an event, skipping subscribers that have not started when
    /// `cancel` fires.
    ///
    /// Subscribers already running are not interrupted. If any subscriber was
    /// skipped and none failed, the result is [`DispatchError::Cancelled`].
    pub async fn dispatch_with_cancellation(
        &self,
        event: TypeKey,
        sender: BoxedSender,
        args: BoxedEventArgs,
        cancel: CancellationToken,
    ) -> DispatchResult {
        if !self.is_enabled() {
            trace!(event = %event, "Dispatcher stopped, dropping event");
            return Ok(());
        }

        let data = match self.metadata.event(event) {
            Some(data) if !data.is_empty() => data,
            _ => {
                debug!(event = %event, "No subscribers registered for event");
                return Ok(());
            }
        };

        let category = data.category();
        let strategy = self.config.strategy(category);
        let scope = self.config.scope(category);
        let limit = self
            .config
            .max_parallelism(category)
            .unwrap_or(data.len())
            .max(1);

        let dispatch_id = Uuid::new_v4();
        let span = debug_span!("dispatch", event = %event, dispatch_id = %dispatch_id);
        let occurrence = Occurrence {
            event,
            sender,
            args,
            cancel,
        };

        async {
            debug!(
                subscribers = data.len(),
                ?strategy,
                ?scope,
                "Dispatching event"
            );

            let result = match (strategy, scope) {
                (DispatchStrategy::Sequential, DispatchScope::PerSubscriber) => {
                    self.sequential_per_subscriber(data, &occurrence).await
                }
                (DispatchStrategy::Sequential, DispatchScope::PerEvent) => {
                    self.sequential_per_event(data, &occurrence).await
                }
                (DispatchStrategy::Parallel, DispatchScope::PerSubscriber) => {
                    self.parallel_per_subscriber(data, &occurrence, limit).await
                }
                (DispatchStrategy::Parallel, DispatchScope::PerEvent) => {
                    self.parallel_per_event(data, &occurrence, limit).await
                }
            };

            match &result {
                Ok(()) => debug!("Dispatch completed"),
                Err(err) => debug!(error = %err, "Dispatch failed"),
            }
            result
        }
        .instrument(span)
        .await
    }

    // =========================================================================
    // Pipes
    // =========================================================================

    async fn sequential_per_subscriber(
        &self,
        data: &EventMetadata,
        occurrence: &Occurrence,
    ) -> DispatchResult {
        let mut scopes = Vec::with_capacity(data.len());
        let result = self
            .run_sequential_isolated(data, occurrence, &mut scopes)
            .await;
        dispose_all(scopes).await;
        result
    }

    async fn run_sequential_isolated(
        &self,
        data: &EventMetadata,
        occurrence: &Occurrence,
        scopes: &mut Vec<Box<dyn ServiceScope>>,
    ) -> DispatchResult {
        let mut resolved = Vec::with_capacity(data.len());
        for subscriber in data.subscribers() {
            let scope = self.services.create_scope();
            let instance = resolve(scope.as_ref(), subscriber, occurrence.event);
            scopes.push(scope);
            resolved.push((subscriber, instance?));
        }

        resolved.sort_by_key(|(subscriber, _)| subscriber.order());

        for (subscriber, instance) in resolved {
            occurrence.ensure_active()?;
            self.invoke(subscriber, instance, occurrence).await?;
        }
        Ok(())
    }

    async fn sequential_per_event(
        &self,
        data: &EventMetadata,
        occurrence: &Occurrence,
    ) -> DispatchResult {
        let scope = self.services.create_scope();
        let result = self
            .run_sequential_shared(scope.as_ref(), data, occurrence)
            .await;
        scope.dispose().await;
        result
    }

    async fn run_sequential_shared(
        &self,
        scope: &dyn ServiceScope,
        data: &EventMetadata,
        occurrence: &Occurrence,
    ) -> DispatchResult {
        let mut resolved = Vec::with_capacity(data.len());
        for subscriber in data.ordered() {
            let instance = resolve(scope, &subscriber, occurrence.event)?;
            resolved.push((subscriber, instance));
        }

        for (subscriber, instance) in resolved {
            occurrence.ensure_active()?;
            self.invoke(&subscriber, instance, occurrence).await?;
        }
        Ok(())
    }

    async fn parallel_per_subscriber(
        &self,
        data: &EventMetadata,
        occurrence: &Occurrence,
        limit: usize,
    ) -> DispatchResult {
        let runs: Vec<_> = data
            .subscribers()
            .map(|subscriber| self.run_isolated(subscriber, occurrence))
            .collect();

        let results: Vec<DispatchResult> =
            stream::iter(runs).buffer_unordered(limit).collect().await;
        occurrence.finish(results)
    }

    async fn run_isolated(
        &self,
        subscriber: &SubscriberMetadata,
        occurrence: &Occurrence,
    ) -> DispatchResult {
        occurrence.ensure_active()?;

        let scope = self.services.create_scope();
        let result = self
            .resolve_and_invoke(scope.as_ref(), subscriber, occurrence)
            .await;
        scope.dispose().await;
        result
    }

    async fn parallel_per_event(
        &self,
        data: &EventMetadata,
        occurrence: &Occurrence,
        limit: usize,
    ) -> DispatchResult {
        let scope = self.services.create_scope();
        let result = self
            .run_parallel_shared(scope.as_ref(), data, occurrence, limit)
            .await;
        scope.dispose().await;
        result
    }

    async fn run_parallel_shared(
        &self,
        scope: &dyn ServiceScope,
        data: &EventMetadata,
        occurrence: &Occurrence,
        limit: usize,
    ) -> DispatchResult {
        let mut resolved = Vec::with_capacity(data.len());
        for subscriber in data.ordered() {
            let instance = resolve(scope, &subscriber, occurrence.event)?;
            resolved.push((subscriber, instance));
        }

        let runs: Vec<_> = resolved
            .into_iter()
            .map(|(subscriber, instance)| async move {
                occurrence.ensure_active()?;
                self.invoke(&subscriber, instance, occurrence).await
            })
            .collect();

        let results: Vec<DispatchResult> =
            stream::iter(runs).buffer_unordered(limit).collect().await;
        occurrence.finish(results)
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    async fn resolve_and_invoke(
        &self,
        scope: &dyn ServiceScope,
        subscriber: &SubscriberMetadata,
        occurrence: &Occurrence,
    ) -> DispatchResult {
        let instance = resolve(scope, subscriber, occurrence.event)?;
        self.invoke(subscriber, instance, occurrence).await
    }

    async fn invoke(
        &self,
        subscriber: &SubscriberMetadata,
        instance: ServiceArc,
        occurrence: &Occurrence,
    ) -> DispatchResult {
        let implementation = subscriber.implementation();
        let delegate = self
            .metadata
            .subscriber_delegate(implementation, occurrence.event)
            .ok_or(DispatchError::MissingDelegate {
                subscriber: implementation,
                event: occurrence.event,
            })?
            .clone();

        trace!(subscriber = %implementation, order = subscriber.order(), "Invoking subscriber");

        delegate
            .oneshot(Invocation {
                subscriber: instance,
                sender: occurrence.sender.clone(),
                args: occurrence.args.clone(),
            })
            .await
    }
}

impl std::fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("metadata", &self.metadata)
            .field("config", &self.config)
            .field("enabled", &self.is_enabled())
            .finish_non_exhaustive()
    }
}

/// Resolves `subscriber` from `scope` according to its resolve strategy.
fn resolve(
    scope: &dyn ServiceScope,
    subscriber: &SubscriberMetadata,
    event: TypeKey,
) -> DispatchResult<ServiceArc> {
    let implementation = subscriber.implementation();
    let resolved = match subscriber.resolve_strategy() {
        ResolveStrategy::Implementation => scope.resolve(implementation),
        ResolveStrategy::KeyedInterface => {
            let info = subscriber
                .interface_for(event)
                .ok_or(DispatchError::MissingDelegate {
                    subscriber: implementation,
                    event,
                })?;
            scope.resolve_keyed(info.interface, ServiceKey::from(implementation))
        }
    };

    resolved.map_err(|source| DispatchError::Resolve {
        subscriber: implementation,
        source,
    })
}

async fn dispose_all(scopes: Vec<Box<dyn ServiceScope>>) {
    for scope in scopes {
        scope.dispose().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use async_trait::async_trait;
    use parking_lot::Mutex;
    use tokio_test::{assert_err, assert_ok};

    use crate::subscriber::{
        CommandEventSubscriber, EventSubscriber, SubscriberDescriptor, SubscriberResult,
        interface_of,
    };
    use crate::testing::{MockServices, ScopeStats};
    use herald_core::model::{CommandExecuted, SessionCreated, Zombied};
    use herald_core::{CommandsExtension, DiscordClient, Injectable, ResolveError, ResolveResult};

    /// Records invocation order and peak concurrency.
    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<&'static str>>,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    impl Recorder {
        async fn record(&self, name: &'static str) {
            self.calls.lock().push(name);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(5)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
        }

        fn calls(&self) -> Vec<&'static str> {
            self.calls.lock().clone()
        }
    }

    macro_rules! ready_subscribers {
        ($($name:ident),*) => {$(
            struct $name(Arc<Recorder>);

            impl Injectable for $name {
                fn inject(scope: &dyn ServiceScope) -> ResolveResult<Self> {
                    Ok($name(scope.get::<Recorder>()?))
                }
            }

            #[async_trait]
            impl EventSubscriber<SessionCreated> for $name {
                async fn on_event(&self, _: &DiscordClient, _: &SessionCreated) -> SubscriberResult {
                    self.0.record(stringify!($name)).await;
                    Ok(())
                }
            }
        )*};
    }

    macro_rules! failing_subscribers {
        ($($name:ident),*) => {$(
            struct $name;

            impl Injectable for $name {
                fn inject(_: &dyn ServiceScope) -> ResolveResult<Self> {
                    Ok($name)
                }
            }

            #[async_trait]
            impl EventSubscriber<SessionCreated> for $name {
                async fn on_event(&self, _: &DiscordClient, _: &SessionCreated) -> SubscriberResult {
                    Err(concat!(stringify!($name), " failed").into())
                }
            }
        )*};
    }

    macro_rules! command_subscribers {
        ($($name:ident),*) => {$(
            struct $name(Arc<Recorder>);

            impl Injectable for $name {
                fn inject(scope: &dyn ServiceScope) -> ResolveResult<Self> {
                    Ok($name(scope.get::<Recorder>()?))
                }
            }

            #[async_trait]
            impl CommandEventSubscriber<CommandExecuted> for $name {
                async fn on_event(&self, _: &CommandsExtension, _: &CommandExecuted) -> SubscriberResult {
                    self.0.record(stringify!($name)).await;
                    Ok(())
                }
            }
        )*};
    }

    ready_subscribers!(A, B, C, D);
    failing_subscribers!(Broken, AlsoBroken);
    command_subscribers!(C1, C2, C3, C4, C5);

    fn client() -> BoxedSender {
        BoxedSender::new(DiscordClient::new(0, 1))
    }

    fn session() -> BoxedEventArgs {
        BoxedEventArgs::new(SessionCreated::default())
    }

    fn ready_event() -> TypeKey {
        TypeKey::of::<SessionCreated>()
    }

    struct Harness {
        dispatcher: EventDispatcher,
        recorder: Arc<Recorder>,
        stats: Arc<ScopeStats>,
    }

    /// Registers `descriptors` and every test subscriber instance.
    fn harness(descriptors: Vec<SubscriberDescriptor>, config: DispatchConfig) -> Harness {
        let recorder = Arc::new(Recorder::default());
        let services = MockServices::new()
            .with(Arc::new(A(recorder.clone())))
            .with(Arc::new(B(recorder.clone())))
            .with(Arc::new(C(recorder.clone())))
            .with(Arc::new(D(recorder.clone())))
            .with(Arc::new(Broken))
            .with(Arc::new(AlsoBroken))
            .with(Arc::new(C1(recorder.clone())))
            .with(Arc::new(C2(recorder.clone())))
            .with(Arc::new(C3(recorder.clone())))
            .with(Arc::new(C4(recorder.clone())))
            .with(Arc::new(C5(recorder.clone())));
        let stats = services.stats();

        let mut provider = MetadataProvider::new();
        provider.append_types(descriptors).unwrap();

        let dispatcher = EventDispatcher::new(Arc::new(provider), Arc::new(services), config);
        dispatcher.start();

        Harness {
            dispatcher,
            recorder,
            stats,
        }
    }

    fn sequential(scope: DispatchScope) -> DispatchConfig {
        DispatchConfig::uniform(DispatchStrategy::Sequential, scope)
    }

    fn parallel(scope: DispatchScope) -> DispatchConfig {
        DispatchConfig::uniform(DispatchStrategy::Parallel, scope)
    }

    #[tokio::test]
    async fn test_sequential_follows_order() {
        let h = harness(
            vec![
                SubscriberDescriptor::of::<C>().event::<SessionCreated>().build(),
                SubscriberDescriptor::of::<B>().event::<SessionCreated>().order(2).build(),
                SubscriberDescriptor::of::<D>().event::<SessionCreated>().build(),
                SubscriberDescriptor::of::<A>().event::<SessionCreated>().order(1).build(),
            ],
            sequential(DispatchScope::PerSubscriber),
        );

        assert_ok!(h.dispatcher.dispatch(ready_event(), client(), session()).await);

        assert_eq!(h.recorder.calls(), vec!["A", "B", "C", "D"]);
        assert_eq!(h.recorder.peak.load(Ordering::SeqCst), 1);
        assert_eq!(h.stats.created(), 4);
        assert_eq!(h.stats.disposed(), 4);
    }

    #[tokio::test]
    async fn test_sequential_per_event_shares_one_scope() {
        let h = harness(
            vec![
                SubscriberDescriptor::of::<C>().event::<SessionCreated>().build(),
                SubscriberDescriptor::of::<A>().event::<SessionCreated>().order(1).build(),
            ],
            sequential(DispatchScope::PerEvent),
        );

        assert_ok!(h.dispatcher.dispatch(ready_event(), client(), session()).await);

        assert_eq!(h.recorder.calls(), vec!["A", "C"]);
        assert_eq!(h.stats.created(), 1);
        assert_eq!(h.stats.disposed(), 1);
    }

    #[tokio::test]
    async fn test_sequential_failure_stops_and_disposes() {
        let h = harness(
            vec![
                SubscriberDescriptor::of::<Broken>().event::<SessionCreated>().order(1).build(),
                SubscriberDescriptor::of::<A>().event::<SessionCreated>().order(2).build(),
            ],
            sequential(DispatchScope::PerSubscriber),
        );

        let err = assert_err!(h.dispatcher.dispatch(ready_event(), client(), session()).await);

        assert!(matches!(err, DispatchError::Subscriber { .. }));
        assert!(h.recorder.calls().is_empty());
        assert_eq!(h.stats.created(), 2);
        assert_eq!(h.stats.disposed(), 2);
    }

    #[tokio::test]
    async fn test_parallel_invokes_everyone_and_collects_failures() {
        let h = harness(
            vec![
                SubscriberDescriptor::of::<Broken>().event::<SessionCreated>().build(),
                SubscriberDescriptor::of::<A>().event::<SessionCreated>().build(),
                SubscriberDescriptor::of::<AlsoBroken>().event::<SessionCreated>().build(),
                SubscriberDescriptor::of::<B>().event::<SessionCreated>().build(),
            ],
            parallel(DispatchScope::PerSubscriber),
        );

        let err = assert_err!(h.dispatcher.dispatch(ready_event(), client(), session()).await);

        assert_eq!(err.failures().len(), 2);
        let mut calls = h.recorder.calls();
        calls.sort();
        assert_eq!(calls, vec!["A", "B"]);
        assert_eq!(h.stats.created(), 4);
        assert_eq!(h.stats.disposed(), 4);
    }

    #[tokio::test]
    async fn test_parallel_single_failure_is_not_wrapped() {
        let h = harness(
            vec![
                SubscriberDescriptor::of::<Broken>().event::<SessionCreated>().build(),
                SubscriberDescriptor::of::<A>().event::<SessionCreated>().build(),
            ],
            parallel(DispatchScope::PerSubscriber),
        );

        let err = assert_err!(h.dispatcher.dispatch(ready_event(), client(), session()).await);
        assert!(matches!(err, DispatchError::Subscriber { .. }));
        assert_eq!(h.recorder.calls(), vec!["A"]);
    }

    #[tokio::test]
    async fn test_parallel_respects_command_parallelism() {
        let config = DispatchConfig {
            command_dispatch_strategy: DispatchStrategy::Parallel,
            max_command_event_parallelism: Some(2),
            ..Default::default()
        };
        let h = harness(
            vec![
                SubscriberDescriptor::of::<C1>().command_event::<CommandExecuted>().build(),
                SubscriberDescriptor::of::<C2>().command_event::<CommandExecuted>().build(),
                SubscriberDescriptor::of::<C3>().command_event::<CommandExecuted>().build(),
                SubscriberDescriptor::of::<C4>().command_event::<CommandExecuted>().build(),
                SubscriberDescriptor::of::<C5>().command_event::<CommandExecuted>().build(),
            ],
            config,
        );

        let sender = BoxedSender::new(CommandsExtension::default());
        assert_ok!(
            h.dispatcher
                .publish(sender, CommandExecuted::default())
                .await
        );

        let mut calls = h.recorder.calls();
        calls.sort();
        assert_eq!(calls, vec!["C1", "C2", "C3", "C4", "C5"]);
        assert_eq!(h.recorder.peak.load(Ordering::SeqCst), 2);
        assert_eq!(h.stats.created(), 5);
        assert_eq!(h.stats.disposed(), 5);
    }

    #[tokio::test]
    async fn test_parallel_per_event_shares_one_scope() {
        let h = harness(
            vec![
                SubscriberDescriptor::of::<A>().event::<SessionCreated>().build(),
                SubscriberDescriptor::of::<B>().event::<SessionCreated>().build(),
                SubscriberDescriptor::of::<Broken>().event::<SessionCreated>().build(),
            ],
            parallel(DispatchScope::PerEvent),
        );

        assert_err!(h.dispatcher.dispatch(ready_event(), client(), session()).await);

        assert_eq!(h.recorder.calls().len(), 2);
        assert_eq!(h.recorder.peak.load(Ordering::SeqCst), 2);
        assert_eq!(h.stats.created(), 1);
        assert_eq!(h.stats.disposed(), 1);
    }

    #[tokio::test]
    async fn test_no_subscribers_opens_no_scope() {
        let h = harness(
            vec![SubscriberDescriptor::of::<A>().event::<SessionCreated>().build()],
            DispatchConfig::default(),
        );

        assert_ok!(
            h.dispatcher
                .publish(client(), Zombied::default())
                .await
        );
        assert_eq!(h.stats.created(), 0);
    }

    #[tokio::test]
    async fn test_stopped_dispatcher_drops_events() {
        let h = harness(
            vec![SubscriberDescriptor::of::<A>().event::<SessionCreated>().build()],
            DispatchConfig::default(),
        );
        h.dispatcher.stop();
        assert!(!h.dispatcher.is_enabled());

        assert_ok!(h.dispatcher.dispatch(ready_event(), client(), session()).await);
        assert_ok!(
            h.dispatcher
                .dispatch_single(TypeKey::of::<A>(), ready_event(), client(), session())
                .await
        );

        assert!(h.recorder.calls().is_empty());
        assert_eq!(h.stats.created(), 0);

        h.dispatcher.start();
        assert_ok!(h.dispatcher.dispatch(ready_event(), client(), session()).await);
        assert_eq!(h.recorder.calls(), vec!["A"]);
    }

    #[tokio::test]
    async fn test_dispatch_single() {
        let h = harness(
            vec![
                SubscriberDescriptor::of::<A>().event::<SessionCreated>().build(),
                SubscriberDescriptor::of::<B>().event::<SessionCreated>().build(),
            ],
            DispatchConfig::default(),
        );

        assert_ok!(
            h.dispatcher
                .dispatch_single(TypeKey::of::<B>(), ready_event(), client(), session())
                .await
        );

        assert_eq!(h.recorder.calls(), vec!["B"]);
        assert_eq!(h.stats.created(), 1);
        assert_eq!(h.stats.disposed(), 1);
    }

    #[tokio::test]
    async fn test_dispatch_single_unknown_subscriber_is_ignored() {
        let h = harness(
            vec![SubscriberDescriptor::of::<A>().event::<SessionCreated>().build()],
            DispatchConfig::default(),
        );

        assert_ok!(
            h.dispatcher
                .dispatch_single(TypeKey::of::<C>(), ready_event(), client(), session())
                .await
        );

        assert!(h.recorder.calls().is_empty());
        assert_eq!(h.stats.created(), 0);
    }

    #[tokio::test]
    async fn test_keyed_interface_resolution() {
        let recorder = Arc::new(Recorder::default());
        let services = MockServices::new().with_keyed(
            interface_of::<DiscordClient, SessionCreated>(),
            Arc::new(A(recorder.clone())),
        );
        let stats = services.stats();
        let mut provider = MetadataProvider::new();
        provider
            .append_types([
                SubscriberDescriptor::of::<A>()
                    .event::<SessionCreated>()
                    .resolved_by(ResolveStrategy::KeyedInterface)
                    .build(),
                SubscriberDescriptor::of::<B>()
                    .event::<SessionCreated>()
                    .build(),
            ])
            .unwrap();
        let dispatcher = EventDispatcher::new(
            Arc::new(provider),
            Arc::new(services),
            sequential(DispatchScope::PerSubscriber),
        );
        dispatcher.start();

        assert_ok!(
            dispatcher
                .dispatch_single(TypeKey::of::<A>(), ready_event(), client(), session())
                .await
        );
        assert_eq!(recorder.calls(), vec!["A"]);

        // B resolves by implementation, which the services do not know.
        assert_ok!(
            dispatcher
                .dispatch_single(TypeKey::of::<B>(), ready_event(), client(), session())
                .await
        );
        assert_eq!(recorder.calls(), vec!["A"]);
        assert_eq!(stats.created(), 2);
        assert_eq!(stats.disposed(), 2);

        let err = assert_err!(dispatcher.dispatch(ready_event(), client(), session()).await);
        assert!(matches!(
            err,
            DispatchError::Resolve {
                source: ResolveError::NotRegistered { .. },
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_cancelled_dispatch_skips_subscribers() {
        for config in [
            sequential(DispatchScope::PerSubscriber),
            sequential(DispatchScope::PerEvent),
            parallel(DispatchScope::PerSubscriber),
            parallel(DispatchScope::PerEvent),
        ] {
            let h = harness(
                vec![
                    SubscriberDescriptor::of::<A>().event::<SessionCreated>().build(),
                    SubscriberDescriptor::of::<B>().event::<SessionCreated>().build(),
                ],
                config,
            );
            let cancel = CancellationToken::new();
            cancel.cancel();

            let err = assert_err!(
                h.dispatcher
                    .dispatch_with_cancellation(ready_event(), client(), session(), cancel)
                    .await
            );

            assert!(matches!(err, DispatchError::Cancelled));
            assert!(h.recorder.calls().is_empty());
            assert_eq!(h.stats.created(), h.stats.disposed());
        }
    }

    #[tokio::test]
    async fn test_wrong_sender_is_reported() {
        let h = harness(
            vec![SubscriberDescriptor::of::<A>().event::<SessionCreated>().build()],
            DispatchConfig::default(),
        );

        let sender = BoxedSender::new(CommandsExtension::default());
        let err = assert_err!(h.dispatcher.dispatch(ready_event(), sender, session()).await);

        assert!(matches!(
            err,
            DispatchError::ArgumentMismatch {
                parameter: "sender",
                ..
            }
        ));
        assert_eq!(h.stats.disposed(), 1);
    }
}
