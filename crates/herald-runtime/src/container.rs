//! A small service container implementing the resolution contract.
//!
//! Services are registered on a [`ServiceCollection`] with one of three
//! lifetimes and resolved from a [`ContainerScope`] created by the built
//! [`ServiceContainer`]:
//!
//! | Lifetime | Instance shared by |
//! |----------|--------------------|
//! | [`Lifetime::Singleton`] | the whole container |
//! | [`Lifetime::Scoped`] | one scope |
//! | [`Lifetime::Transient`] | nobody; built on every resolve |
//!
//! Registrations are either plain (looked up by service type) or keyed by a
//! [`ServiceKey`]. A scope may be resolved from concurrently. Disposing a scope
//! drops its scoped instances, and later resolves fail with
//! [`ResolveError::ScopeDisposed`].
//!
//! ```rust,ignore
//! let mut services = ServiceCollection::new();
//! services
//!     .add_instance(Arc::new(Database::connect(url)?))
//!     .add_scoped(|scope| Ok(UnitOfWork::new(scope.get::<Database>()?)));
//!
//! let container = services.build();
//! let scope = container.create_scope();
//! let work = scope.get::<UnitOfWork>()?;
//! scope.dispose().await;
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{debug, trace};

use herald_core::{
    Injectable, ResolveError, ResolveResult, ServiceArc, ServiceKey, ServiceProvider,
    ServiceScope, TypeKey,
};

/// How long a resolved instance lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lifetime {
    Singleton,
    Scoped,
    Transient,
}

/// Type-erased constructor. Receives the scope the resolve started from.
pub type ServiceFactory = Arc<dyn Fn(&dyn ServiceScope) -> ResolveResult<ServiceArc> + Send + Sync>;

/// Identifies one registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct Slot {
    service: TypeKey,
    key: Option<ServiceKey>,
}

impl Slot {
    fn not_registered(self) -> ResolveError {
        match self.key {
            Some(key) => ResolveError::KeyedNotRegistered {
                service: self.service,
                key,
            },
            None => ResolveError::NotRegistered {
                service: self.service,
            },
        }
    }
}

/// One registered service.
#[derive(Clone)]
pub struct ServiceDescriptor {
    service: TypeKey,
    key: Option<ServiceKey>,
    lifetime: Lifetime,
    factory: ServiceFactory,
}

impl ServiceDescriptor {
    /// A plain registration for `service`.
    pub fn new(service: TypeKey, lifetime: Lifetime, factory: ServiceFactory) -> Self {
        Self {
            service,
            key: None,
            lifetime,
            factory,
        }
    }

    /// A registration for `service` under `key`.
    pub fn keyed(
        service: TypeKey,
        key: ServiceKey,
        lifetime: Lifetime,
        factory: ServiceFactory,
    ) -> Self {
        Self {
            service,
            key: Some(key),
            lifetime,
            factory,
        }
    }

    pub fn service(&self) -> TypeKey {
        self.service
    }

    pub fn key(&self) -> Option<ServiceKey> {
        self.key
    }

    pub fn lifetime(&self) -> Lifetime {
        self.lifetime
    }

    fn slot(&self) -> Slot {
        Slot {
            service: self.service,
            key: self.key,
        }
    }
}

impl fmt::Debug for ServiceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceDescriptor")
            .field("service", &self.service)
            .field("key", &self.key)
            .field("lifetime", &self.lifetime)
            .finish_non_exhaustive()
    }
}

fn erase<T, F>(factory: F) -> ServiceFactory
where
    T: Send + Sync + 'static,
    F: Fn(&dyn ServiceScope) -> ResolveResult<T> + Send + Sync + 'static,
{
    Arc::new(move |scope: &dyn ServiceScope| -> ResolveResult<ServiceArc> {
        Ok(Arc::new(factory(scope)?))
    })
}

// =============================================================================
// ServiceCollection
// =============================================================================

/// Mutable set of registrations, turned into a [`ServiceContainer`] by
/// [`build`](Self::build).
#[derive(Debug, Default, Clone)]
pub struct ServiceCollection {
    registrations: HashMap<Slot, ServiceDescriptor>,
}

impl ServiceCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `descriptor`, replacing any registration for the same slot.
    pub fn add(&mut self, descriptor: ServiceDescriptor) -> &mut Self {
        if let Some(previous) = self.registrations.insert(descriptor.slot(), descriptor) {
            trace!(service = %previous.service, "Replaced service registration");
        }
        self
    }

    /// Registers `descriptor` unless its slot is taken. Returns whether it
    /// was added.
    pub fn try_add(&mut self, descriptor: ServiceDescriptor) -> bool {
        let slot = descriptor.slot();
        if self.registrations.contains_key(&slot) {
            return false;
        }
        self.registrations.insert(slot, descriptor);
        true
    }

    /// Keyed variant of [`try_add`](Self::try_add).
    pub fn try_add_keyed(
        &mut self,
        service: TypeKey,
        key: ServiceKey,
        lifetime: Lifetime,
        factory: ServiceFactory,
    ) -> bool {
        self.try_add(ServiceDescriptor::keyed(service, key, lifetime, factory))
    }

    pub fn add_singleton<T, F>(&mut self, factory: F) -> &mut Self
    where
        T: Send + Sync + 'static,
        F: Fn(&dyn ServiceScope) -> ResolveResult<T> + Send + Sync + 'static,
    {
        self.add(ServiceDescriptor::new(
            TypeKey::of::<T>(),
            Lifetime::Singleton,
            erase(factory),
        ))
    }

    pub fn add_scoped<T, F>(&mut self, factory: F) -> &mut Self
    where
        T: Send + Sync + 'static,
        F: Fn(&dyn ServiceScope) -> ResolveResult<T> + Send + Sync + 'static,
    {
        self.add(ServiceDescriptor::new(
            TypeKey::of::<T>(),
            Lifetime::Scoped,
            erase(factory),
        ))
    }

    pub fn add_transient<T, F>(&mut self, factory: F) -> &mut Self
    where
        T: Send + Sync + 'static,
        F: Fn(&dyn ServiceScope) -> ResolveResult<T> + Send + Sync + 'static,
    {
        self.add(ServiceDescriptor::new(
            TypeKey::of::<T>(),
            Lifetime::Transient,
            erase(factory),
        ))
    }

    /// Registers an existing instance as a singleton.
    pub fn add_instance<T: Send + Sync + 'static>(&mut self, instance: Arc<T>) -> &mut Self {
        let factory: ServiceFactory =
            Arc::new(move |_: &dyn ServiceScope| -> ResolveResult<ServiceArc> {
                Ok(instance.clone())
            });
        self.add(ServiceDescriptor::new(
            TypeKey::of::<T>(),
            Lifetime::Singleton,
            factory,
        ))
    }

    /// Registers `T` built through [`Injectable`].
    pub fn add_injectable<T: Injectable>(&mut self, lifetime: Lifetime) -> &mut Self {
        self.add(ServiceDescriptor::new(
            TypeKey::of::<T>(),
            lifetime,
            erase(T::inject),
        ))
    }

    pub fn contains(&self, service: TypeKey) -> bool {
        self.registrations.contains_key(&Slot { service, key: None })
    }

    pub fn contains_keyed(&self, service: TypeKey, key: ServiceKey) -> bool {
        self.registrations.contains_key(&Slot {
            service,
            key: Some(key),
        })
    }

    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }

    /// Freezes the registrations into a container.
    pub fn build(self) -> ServiceContainer {
        debug!(registrations = self.registrations.len(), "Service container built");
        ServiceContainer {
            inner: Arc::new(ContainerInner {
                registrations: self.registrations,
                singletons: Mutex::new(HashMap::new()),
                scopes_created: AtomicUsize::new(0),
                scopes_disposed: AtomicUsize::new(0),
            }),
        }
    }
}

// =============================================================================
// ServiceContainer
// =============================================================================

struct ContainerInner {
    registrations: HashMap<Slot, ServiceDescriptor>,
    singletons: Mutex<HashMap<Slot, ServiceArc>>,
    scopes_created: AtomicUsize,
    scopes_disposed: AtomicUsize,
}

impl ContainerInner {
    fn descriptor(&self, slot: Slot) -> ResolveResult<&ServiceDescriptor> {
        self.registrations
            .get(&slot)
            .ok_or_else(|| slot.not_registered())
    }

    /// Singletons are always built against the root, never against the scope
    /// that happened to ask first.
    fn singleton(&self, slot: Slot, descriptor: &ServiceDescriptor) -> ResolveResult<ServiceArc> {
        cached(&self.singletons, slot, descriptor, &RootScope { root: self })
    }
}

/// Returns the cached instance for `slot`, building it on first use.
///
/// The lock is not held while the factory runs, so factories may resolve
/// other services. When two resolves race, the first stored instance wins
/// and both callers receive it.
fn cached(
    cache: &Mutex<HashMap<Slot, ServiceArc>>,
    slot: Slot,
    descriptor: &ServiceDescriptor,
    resolver: &dyn ServiceScope,
) -> ResolveResult<ServiceArc> {
    if let Some(instance) = cache.lock().get(&slot) {
        return Ok(instance.clone());
    }

    let built = (descriptor.factory)(resolver)?;
    Ok(cache.lock().entry(slot).or_insert(built).clone())
}

/// Resolver handed to singleton factories. Scoped services are refused.
struct RootScope<'a> {
    root: &'a ContainerInner,
}

impl<'a> RootScope<'a> {
    fn resolve_slot(&self, slot: Slot) -> ResolveResult<ServiceArc> {
        let descriptor = self.root.descriptor(slot)?;
        match descriptor.lifetime {
            Lifetime::Transient => (descriptor.factory)(self as &dyn ServiceScope),
            Lifetime::Scoped => Err(ResolveError::ScopedFromRoot {
                service: slot.service,
            }),
            Lifetime::Singleton => self.root.singleton(slot, descriptor),
        }
    }
}

#[async_trait]
impl<'a> ServiceScope for RootScope<'a> {
    fn resolve(&self, service: TypeKey) -> ResolveResult<ServiceArc> {
        self.resolve_slot(Slot { service, key: None })
    }

    fn resolve_keyed(&self, service: TypeKey, key: ServiceKey) -> ResolveResult<ServiceArc> {
        self.resolve_slot(Slot {
            service,
            key: Some(key),
        })
    }

    async fn dispose(&self) {}
}

/// Snapshot of container counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContainerStats {
    pub registrations: usize,
    pub singletons: usize,
    pub scopes_created: usize,
    pub scopes_disposed: usize,
}

impl ContainerStats {
    /// Scopes created and not yet disposed.
    pub fn open_scopes(&self) -> usize {
        self.scopes_created.saturating_sub(self.scopes_disposed)
    }
}

/// The root container. Cheap to clone.
#[derive(Clone)]
pub struct ServiceContainer {
    inner: Arc<ContainerInner>,
}

impl ServiceContainer {
    /// Opens a new scope.
    pub fn scope(&self) -> ContainerScope {
        let created = self.inner.scopes_created.fetch_add(1, Ordering::SeqCst) + 1;
        trace!(scopes_created = created, "Scope created");
        ContainerScope {
            root: Arc::clone(&self.inner),
            scoped: Mutex::new(HashMap::new()),
            disposed: AtomicBool::new(false),
        }
    }

    pub fn stats(&self) -> ContainerStats {
        ContainerStats {
            registrations: self.inner.registrations.len(),
            singletons: self.inner.singletons.lock().len(),
            scopes_created: self.inner.scopes_created.load(Ordering::SeqCst),
            scopes_disposed: self.inner.scopes_disposed.load(Ordering::SeqCst),
        }
    }
}

impl ServiceProvider for ServiceContainer {
    fn create_scope(&self) -> Box<dyn ServiceScope> {
        Box::new(self.scope())
    }
}

impl fmt::Debug for ServiceContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceContainer")
            .field("stats", &self.stats())
            .finish()
    }
}

// =============================================================================
// ContainerScope
// =============================================================================

/// A resolution scope owning its scoped instances.
pub struct ContainerScope {
    root: Arc<ContainerInner>,
    scoped: Mutex<HashMap<Slot, ServiceArc>>,
    disposed: AtomicBool,
}

impl ContainerScope {
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    fn resolve_slot(&self, slot: Slot) -> ResolveResult<ServiceArc> {
        if self.is_disposed() {
            return Err(ResolveError::ScopeDisposed);
        }

        let descriptor = self.root.descriptor(slot)?;
        match descriptor.lifetime {
            Lifetime::Transient => (descriptor.factory)(self as &dyn ServiceScope),
            Lifetime::Scoped => cached(&self.scoped, slot, descriptor, self),
            Lifetime::Singleton => self.root.singleton(slot, descriptor),
        }
    }
}

#[async_trait]
impl ServiceScope for ContainerScope {
    fn resolve(&self, service: TypeKey) -> ResolveResult<ServiceArc> {
        self.resolve_slot(Slot { service, key: None })
    }

    fn resolve_keyed(&self, service: TypeKey, key: ServiceKey) -> ResolveResult<ServiceArc> {
        self.resolve_slot(Slot {
            service,
            key: Some(key),
        })
    }

    async fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        let released = std::mem::take(&mut *self.scoped.lock());
        let disposed = self.root.scopes_disposed.fetch_add(1, Ordering::SeqCst) + 1;
        trace!(instances = released.len(), scopes_disposed = disposed, "Scope disposed");
    }
}

impl fmt::Debug for ContainerScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContainerScope")
            .field("instances", &self.scoped.lock().len())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    #[derive(Debug)]
    struct Counter(u32);

    struct Clock;

    struct Report {
        counter: Arc<Counter>,
    }

    impl Injectable for Report {
        fn inject(scope: &dyn ServiceScope) -> ResolveResult<Self> {
            Ok(Report {
                counter: scope.get::<Counter>()?,
            })
        }
    }

    fn counting_collection(lifetime: Lifetime) -> ServiceCollection {
        let next = Arc::new(AtomicU32::new(0));
        let mut services = ServiceCollection::new();
        services.add(ServiceDescriptor::new(
            TypeKey::of::<Counter>(),
            lifetime,
            erase(move |_| Ok(Counter(next.fetch_add(1, Ordering::SeqCst)))),
        ));
        services
    }

    fn get<T: Send + Sync + 'static>(scope: &ContainerScope) -> Arc<T> {
        let scope: &dyn ServiceScope = scope;
        scope.get::<T>().unwrap()
    }

    #[test]
    fn test_lifetimes() {
        let container = counting_collection(Lifetime::Scoped).build();
        let first = container.scope();
        let second = container.scope();
        assert_eq!(get::<Counter>(&first).0, get::<Counter>(&first).0);
        assert_ne!(get::<Counter>(&first).0, get::<Counter>(&second).0);

        let container = counting_collection(Lifetime::Singleton).build();
        assert_eq!(
            get::<Counter>(&container.scope()).0,
            get::<Counter>(&container.scope()).0
        );
        assert_eq!(container.stats().singletons, 1);

        let container = counting_collection(Lifetime::Transient).build();
        let scope = container.scope();
        assert_ne!(get::<Counter>(&scope).0, get::<Counter>(&scope).0);
    }

    #[test]
    fn test_injectable_resolves_dependencies() {
        let mut services = counting_collection(Lifetime::Scoped);
        services.add_injectable::<Report>(Lifetime::Transient);
        let container = services.build();
        let scope = container.scope();

        let report = get::<Report>(&scope);
        assert!(Arc::ptr_eq(&report.counter, &get::<Counter>(&scope)));
    }

    #[test]
    fn test_missing_registrations() {
        let container = ServiceCollection::new().build();
        let scope = container.scope();

        assert!(matches!(
            scope.resolve(TypeKey::of::<Clock>()),
            Err(ResolveError::NotRegistered { .. })
        ));
        assert!(matches!(
            scope.resolve_keyed(TypeKey::of::<Clock>(), ServiceKey::of::<Counter>()),
            Err(ResolveError::KeyedNotRegistered { .. })
        ));
    }

    #[test]
    fn test_try_add_keeps_first() {
        let mut services = ServiceCollection::new();
        services.add_instance(Arc::new(Counter(1)));
        let added = services.try_add(ServiceDescriptor::new(
            TypeKey::of::<Counter>(),
            Lifetime::Singleton,
            erase(|_| Ok(Counter(2))),
        ));
        assert!(!added);

        let key = ServiceKey::of::<Clock>();
        assert!(services.try_add_keyed(
            TypeKey::of::<Counter>(),
            key,
            Lifetime::Transient,
            erase(|_| Ok(Counter(3))),
        ));
        assert!(services.contains_keyed(TypeKey::of::<Counter>(), key));
        assert_eq!(services.len(), 2);

        let container = services.build();
        let scope = container.scope();
        assert_eq!(get::<Counter>(&scope).0, 1);

        let keyed = scope
            .resolve_keyed(TypeKey::of::<Counter>(), key)
            .unwrap()
            .downcast::<Counter>()
            .unwrap();
        assert_eq!(keyed.0, 3);
    }

    #[tokio::test]
    async fn test_dispose() {
        let container = counting_collection(Lifetime::Scoped).build();
        let scope = container.scope();
        let counter = get::<Counter>(&scope);

        scope.dispose().await;
        scope.dispose().await;

        assert!(scope.is_disposed());
        assert_eq!(Arc::strong_count(&counter), 1);
        assert!(matches!(
            scope.resolve(TypeKey::of::<Counter>()),
            Err(ResolveError::ScopeDisposed)
        ));

        let stats = container.stats();
        assert_eq!(stats.scopes_created, 1);
        assert_eq!(stats.scopes_disposed, 1);
        assert_eq!(stats.open_scopes(), 0);
    }

    #[tokio::test]
    async fn test_singletons_never_capture_scoped_instances() {
        struct Cache {
            counter: Arc<Counter>,
        }

        let mut services = counting_collection(Lifetime::Scoped);
        services.add_singleton(|scope| {
            Ok(Cache {
                counter: scope.get::<Counter>()?,
            })
        });
        let container = services.build();

        let first = container.scope();
        let scoped = get::<Counter>(&first);
        assert!(matches!(
            first.resolve(TypeKey::of::<Cache>()),
            Err(ResolveError::ScopedFromRoot { service }) if service == TypeKey::of::<Counter>()
        ));
        first.dispose().await;
        assert_eq!(Arc::strong_count(&scoped), 1);

        let second = container.scope();
        assert!(second.resolve(TypeKey::of::<Cache>()).is_err());
        assert_eq!(container.stats().singletons, 0);
    }

    #[test]
    fn test_singleton_dependencies_resolve_from_root() {
        let mut services = counting_collection(Lifetime::Singleton);
        services.add_injectable::<Report>(Lifetime::Singleton);
        let container = services.build();

        let first = get::<Report>(&container.scope());
        let second = get::<Report>(&container.scope());
        assert!(Arc::ptr_eq(&first, &second));
        assert!(Arc::ptr_eq(&first.counter, &get::<Counter>(&container.scope())));
        assert_eq!(container.stats().singletons, 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_scoped_resolves_share_instance() {
        let container = counting_collection(Lifetime::Scoped).build();
        let scope = Arc::new(container.scope());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let scope = Arc::clone(&scope);
                tokio::spawn(async move { get::<Counter>(&scope).0 })
            })
            .collect();

        let mut seen = Vec::new();
        for handle in handles {
            seen.push(handle.await.unwrap());
        }
        seen.dedup();
        assert_eq!(seen.len(), 1);
    }
}
