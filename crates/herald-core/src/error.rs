//! Error types for the resolution contract.

use thiserror::Error;

use crate::key::TypeKey;
use crate::service::ServiceKey;

/// Boxed error returned by subscriber code and factories.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors raised while resolving a component from a [`ServiceScope`](crate::ServiceScope).
#[derive(Debug, Error)]
pub enum ResolveError {
    /// No registration exists for the requested type.
    #[error("no service registered for {service}")]
    NotRegistered {
        /// The requested service type.
        service: TypeKey,
    },

    /// No keyed registration exists for the requested type and key.
    #[error("no service registered for {service} with key {key}")]
    KeyedNotRegistered {
        /// The requested service type.
        service: TypeKey,
        /// The requested key.
        key: ServiceKey,
    },

    /// A registration produced an instance of an unexpected concrete type.
    #[error("resolved instance is not a {expected}")]
    TypeMismatch {
        /// The type the caller asked for.
        expected: TypeKey,
    },

    /// A scoped service was requested while building a singleton.
    #[error("scoped service {service} cannot be resolved from the root container")]
    ScopedFromRoot {
        /// The scoped service type.
        service: TypeKey,
    },

    /// The scope was already disposed.
    #[error("resolution scope has been disposed")]
    ScopeDisposed,

    /// A factory failed while constructing the instance.
    #[error("failed to construct {service}: {source}")]
    Construction {
        /// The service being constructed.
        service: TypeKey,
        /// The underlying failure.
        #[source]
        source: BoxError,
    },
}

impl ResolveError {
    /// Creates a [`ResolveError::NotRegistered`] for `service`.
    pub fn not_registered(service: TypeKey) -> Self {
        Self::NotRegistered { service }
    }

    /// Creates a [`ResolveError::Construction`] wrapping `source`.
    pub fn construction(service: TypeKey, source: impl Into<BoxError>) -> Self {
        Self::Construction {
            service,
            source: source.into(),
        }
    }
}

/// Result type for resolution operations.
pub type ResolveResult<T> = Result<T, ResolveError>;
