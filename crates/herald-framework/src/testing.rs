//! In-memory resolution mechanism used by the unit tests.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;

use herald_core::{
    ResolveError, ResolveResult, ServiceArc, ServiceKey, ServiceProvider, ServiceScope, TypeKey,
};

#[derive(Debug, Default)]
pub(crate) struct ScopeStats {
    pub created: AtomicUsize,
    pub disposed: AtomicUsize,
}

impl ScopeStats {
    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn disposed(&self) -> usize {
        self.disposed.load(Ordering::SeqCst)
    }
}

/// Resolves pre-built instances and counts scopes.
#[derive(Default)]
pub(crate) struct MockServices {
    instances: HashMap<TypeKey, ServiceArc>,
    keyed: HashMap<(TypeKey, ServiceKey), ServiceArc>,
    stats: Arc<ScopeStats>,
}

impl MockServices {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<T: Send + Sync + 'static>(mut self, instance: Arc<T>) -> Self {
        self.instances.insert(TypeKey::of::<T>(), instance);
        self
    }

    pub fn with_keyed<T: Send + Sync + 'static>(
        mut self,
        service: TypeKey,
        instance: Arc<T>,
    ) -> Self {
        self.keyed
            .insert((service, ServiceKey::of::<T>()), instance);
        self
    }

    pub fn stats(&self) -> Arc<ScopeStats> {
        Arc::clone(&self.stats)
    }
}

impl ServiceProvider for MockServices {
    fn create_scope(&self) -> Box<dyn ServiceScope> {
        self.stats.created.fetch_add(1, Ordering::SeqCst);
        Box::new(MockScope {
            instances: self.instances.clone(),
            keyed: self.keyed.clone(),
            stats: Arc::clone(&self.stats),
            disposed: AtomicBool::new(false),
        })
    }
}

struct MockScope {
    instances: HashMap<TypeKey, ServiceArc>,
    keyed: HashMap<(TypeKey, ServiceKey), ServiceArc>,
    stats: Arc<ScopeStats>,
    disposed: AtomicBool,
}

#[async_trait]
impl ServiceScope for MockScope {
    fn resolve(&self, service: TypeKey) -> ResolveResult<ServiceArc> {
        if self.disposed.load(Ordering::SeqCst) {
            return Err(ResolveError::ScopeDisposed);
        }
        self.instances
            .get(&service)
            .cloned()
            .ok_or(ResolveError::NotRegistered { service })
    }

    fn resolve_keyed(&self, service: TypeKey, key: ServiceKey) -> ResolveResult<ServiceArc> {
        if self.disposed.load(Ordering::SeqCst) {
            return Err(ResolveError::ScopeDisposed);
        }
        self.keyed
            .get(&(service, key))
            .cloned()
            .ok_or(ResolveError::KeyedNotRegistered { service, key })
    }

    async fn dispose(&self) {
        if !self.disposed.swap(true, Ordering::SeqCst) {
            self.stats.disposed.fetch_add(1, Ordering::SeqCst);
        }
    }
}
