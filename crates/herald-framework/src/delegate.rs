//! Cached cast-and-invoke delegates.
//!
//! For every `(implementation, event)` pair the metadata provider stores one
//! [`SubscriberDelegate`]: a type-erased tower service that takes the three
//! erased dispatch parameters, downcasts each to its concrete type and awaits
//! the subscriber's handler. The downcast targets are fixed when the delegate
//! is built, so dispatch never inspects types beyond a `TypeId` comparison.

use std::collections::HashMap;
use std::marker::PhantomData;
use std::task::{Context, Poll};

use futures::FutureExt;
use futures::future::BoxFuture;
use tower::Service;
use tower::util::BoxCloneSyncService;

use crate::error::{DispatchError, DispatchResult};
use crate::subscriber::Subscriber;
use herald_core::{BoxedEventArgs, BoxedSender, EventArgs, ServiceArc, TypeKey};

/// The erased parameters of one subscriber invocation.
#[derive(Clone)]
pub struct Invocation {
    /// The resolved subscriber instance.
    pub subscriber: ServiceArc,
    /// The event sender.
    pub sender: BoxedSender,
    /// The event payload.
    pub args: BoxedEventArgs,
}

/// A type-erased, `Clone + Send + Sync` invocation thunk.
pub type SubscriberDelegate = BoxCloneSyncService<Invocation, (), DispatchError>;

// ============================================================================
// DelegateService
// ============================================================================

/// Tower service invoking `T`'s `Subscriber<S, E>` handler.
pub struct DelegateService<T, S, E> {
    _marker: PhantomData<fn() -> (T, S, E)>,
}

impl<T, S, E> DelegateService<T, S, E> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T, S, E> Default for DelegateService<T, S, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, S, E> Clone for DelegateService<T, S, E> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<T, S, E> Service<Invocation> for DelegateService<T, S, E>
where
    T: Subscriber<S, E>,
    S: Send + Sync + 'static,
    E: EventArgs,
{
    type Response = ();
    type Error = DispatchError;
    type Future = BoxFuture<'static, DispatchResult>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, invocation: Invocation) -> Self::Future {
        async move {
            let implementation = TypeKey::of::<T>();
            let mismatch = |parameter, expected| DispatchError::ArgumentMismatch {
                subscriber: implementation,
                parameter,
                expected,
            };

            let subscriber = invocation
                .subscriber
                .downcast::<T>()
                .map_err(|_| mismatch("subscriber", implementation))?;
            let sender = invocation
                .sender
                .downcast_ref::<S>()
                .ok_or_else(|| mismatch("sender", TypeKey::of::<S>()))?;
            let args = invocation
                .args
                .downcast_ref::<E>()
                .ok_or_else(|| mismatch("event", TypeKey::of::<E>()))?;

            subscriber
                .handle(sender, args)
                .await
                .map_err(|source| DispatchError::Subscriber {
                    subscriber: implementation,
                    event: TypeKey::of::<E>(),
                    source,
                })
        }
        .boxed()
    }
}

// ============================================================================
// DelegateCache
// ============================================================================

/// Cache key: one subscriber implementation handling one event type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberDelegateKey {
    pub implementation: TypeKey,
    pub event: TypeKey,
}

impl SubscriberDelegateKey {
    pub fn new(implementation: TypeKey, event: TypeKey) -> Self {
        Self {
            implementation,
            event,
        }
    }
}

/// Compiled delegates keyed by `(implementation, event)`.
///
/// Filled while subscribers are appended and read-only afterwards.
#[derive(Clone, Default)]
pub struct DelegateCache {
    entries: HashMap<SubscriberDelegateKey, SubscriberDelegate>,
}

impl DelegateCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &SubscriberDelegateKey) -> Option<&SubscriberDelegate> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &SubscriberDelegateKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &SubscriberDelegateKey> {
        self.entries.keys()
    }

    /// Inserts `delegate` unless the key is already cached.
    pub(crate) fn insert_if_absent(&mut self, key: SubscriberDelegateKey, delegate: SubscriberDelegate) {
        self.entries.entry(key).or_insert(delegate);
    }
}

impl std::fmt::Debug for DelegateCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DelegateCache")
            .field("entries", &self.entries.len())
            .finish()
    }
}
