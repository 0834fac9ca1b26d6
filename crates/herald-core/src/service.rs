//! The resolution contract the dispatcher consumes.
//!
//! The dispatcher only ever needs three things from a dependency container:
//! open an isolated scope, resolve a component by type (optionally keyed), and
//! dispose the scope. [`ServiceProvider`] and [`ServiceScope`] capture exactly
//! that; `herald-runtime` ships a container implementing them.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{ResolveError, ResolveResult};
use crate::key::TypeKey;

/// A shared, type-erased component instance.
pub type ServiceArc = Arc<dyn Any + Send + Sync>;

/// Key for keyed registrations.
///
/// Keys are derived from types rather than names, so renaming a subscriber
/// can never make two registrations collide.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ServiceKey(TypeKey);

impl ServiceKey {
    /// The key for `T`.
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self(TypeKey::of::<T>())
    }

    /// The type this key was derived from.
    pub fn type_key(&self) -> TypeKey {
        self.0
    }
}

impl From<TypeKey> for ServiceKey {
    fn from(key: TypeKey) -> Self {
        Self(key)
    }
}

impl fmt::Debug for ServiceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ServiceKey({})", self.0)
    }
}

impl fmt::Display for ServiceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Root of a dependency container: a factory for resolution scopes.
pub trait ServiceProvider: Send + Sync {
    /// Opens a new, isolated resolution scope.
    fn create_scope(&self) -> Box<dyn ServiceScope>;
}

/// An isolated resolution context.
///
/// Implementations must allow concurrent `resolve` calls through a shared
/// reference.
#[async_trait]
pub trait ServiceScope: Send + Sync {
    /// Resolves the component registered for `service`.
    fn resolve(&self, service: TypeKey) -> ResolveResult<ServiceArc>;

    /// Resolves the component registered for `service` under `key`.
    fn resolve_keyed(&self, service: TypeKey, key: ServiceKey) -> ResolveResult<ServiceArc>;

    /// Releases every instance owned by this scope. Resolving afterwards fails
    /// with [`ResolveError::ScopeDisposed`].
    async fn dispose(&self);
}

impl dyn ServiceScope + '_ {
    /// Resolves and downcasts a component registered under its own type.
    pub fn get<T: Any + Send + Sync>(&self) -> ResolveResult<Arc<T>> {
        self.resolve(TypeKey::of::<T>())?
            .downcast::<T>()
            .map_err(|_| ResolveError::TypeMismatch {
                expected: TypeKey::of::<T>(),
            })
    }
}

/// A component that can build itself from a resolution scope.
///
/// Subscribers implement this so containers can construct them without
/// reflection.
///
/// # Example
///
/// ```rust,ignore
/// struct Greeter {
///     store: Arc<GreetingStore>,
/// }
///
/// impl Injectable for Greeter {
///     fn inject(scope: &dyn ServiceScope) -> ResolveResult<Self> {
///         Ok(Self { store: scope.get::<GreetingStore>()? })
///     }
/// }
/// ```
pub trait Injectable: Sized + Send + Sync + 'static {
    fn inject(scope: &dyn ServiceScope) -> ResolveResult<Self>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(ServiceArc);

    #[async_trait]
    impl ServiceScope for Fixed {
        fn resolve(&self, _service: TypeKey) -> ResolveResult<ServiceArc> {
            Ok(Arc::clone(&self.0))
        }

        fn resolve_keyed(&self, service: TypeKey, key: ServiceKey) -> ResolveResult<ServiceArc> {
            Err(ResolveError::KeyedNotRegistered { service, key })
        }

        async fn dispose(&self) {}
    }

    #[test]
    fn test_get_downcasts() {
        let scope: Box<dyn ServiceScope> = Box::new(Fixed(Arc::new(42u32)));
        assert_eq!(*scope.get::<u32>().unwrap(), 42);
        assert!(matches!(
            scope.get::<String>(),
            Err(ResolveError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_service_key_display() {
        assert_eq!(ServiceKey::of::<u32>().to_string(), "u32");
        assert_eq!(ServiceKey::from(TypeKey::of::<u32>()), ServiceKey::of::<u32>());
    }
}
