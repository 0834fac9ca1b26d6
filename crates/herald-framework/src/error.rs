//! Error types for metadata construction and dispatch.
//!
//! [`MetadataError`] covers configuration problems found while registering
//! subscribers. These are raised at startup and are not meant to be recovered
//! from. [`DispatchError`] covers failures observed while an event is being
//! delivered.

use thiserror::Error;

use herald_core::{BoxError, ResolveError, TypeKey};

// =============================================================================
// Metadata Errors
// =============================================================================

/// A subscriber could not be registered.
#[derive(Debug, Clone, Error)]
pub enum MetadataError {
    /// The subscriber handles an event type the catalog does not know.
    #[error("{subscriber} handles unrecognized event type {event}")]
    UnrecognizedEventType {
        /// The subscriber implementation.
        subscriber: TypeKey,
        /// The unknown event type.
        event: TypeKey,
    },

    /// The subscriber declares no event handlers at all.
    #[error("no qualifying subscriber interface found on {subscriber}")]
    NoQualifyingInterface {
        /// The subscriber implementation.
        subscriber: TypeKey,
    },

    /// An explicit interface was requested that the subscriber does not implement.
    #[error("{subscriber} does not implement {interface}")]
    InterfaceNotImplemented {
        /// The subscriber implementation.
        subscriber: TypeKey,
        /// The requested interface.
        interface: TypeKey,
    },

    /// Two handlers of the same subscriber target the same event type.
    #[error("{subscriber} declares more than one handler for {event}")]
    AmbiguousInterface {
        /// The subscriber implementation.
        subscriber: TypeKey,
        /// The event type handled twice.
        event: TypeKey,
    },

    /// No handler with the sender expected by the event's category exists.
    #[error("{subscriber} has no handler for {event} sent by {sender}")]
    HandlerNotFound {
        /// The subscriber implementation.
        subscriber: TypeKey,
        /// The event type.
        event: TypeKey,
        /// The sender type expected for the event's category.
        sender: TypeKey,
    },
}

// =============================================================================
// Dispatch Errors
// =============================================================================

/// An event could not be delivered to every subscriber.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The subscriber instance could not be resolved.
    #[error("failed to resolve subscriber {subscriber}: {source}")]
    Resolve {
        /// The subscriber implementation.
        subscriber: TypeKey,
        /// The resolution failure.
        #[source]
        source: ResolveError,
    },

    /// A delegate received a value of the wrong concrete type.
    #[error("argument mismatch invoking {subscriber}: {parameter} is not a {expected}")]
    ArgumentMismatch {
        /// The subscriber implementation.
        subscriber: TypeKey,
        /// Which parameter was wrong (`subscriber`, `sender` or `event`).
        parameter: &'static str,
        /// The expected type.
        expected: TypeKey,
    },

    /// The delegate cache has no entry for a registered subscriber.
    #[error("no delegate cached for {subscriber} handling {event}")]
    MissingDelegate {
        /// The subscriber implementation.
        subscriber: TypeKey,
        /// The event type.
        event: TypeKey,
    },

    /// Subscriber code returned an error.
    #[error("subscriber {subscriber} failed handling {event}: {source}")]
    Subscriber {
        /// The subscriber implementation.
        subscriber: TypeKey,
        /// The event type.
        event: TypeKey,
        /// The error returned by the subscriber.
        #[source]
        source: BoxError,
    },

    /// The dispatch was cancelled before every subscriber started.
    #[error("dispatch cancelled")]
    Cancelled,

    /// Several subscribers failed during one parallel dispatch.
    #[error("{} subscribers failed", .0.len())]
    Multiple(Vec<DispatchError>),
}

impl DispatchError {
    /// Folds a list of failures into a single error.
    ///
    /// Returns `None` for an empty list and the error itself for a single one.
    pub fn collect(mut errors: Vec<DispatchError>) -> Option<DispatchError> {
        match errors.len() {
            0 => None,
            1 => errors.pop(),
            _ => Some(Self::Multiple(errors)),
        }
    }

    /// Iterates over the individual failures, flattening [`DispatchError::Multiple`].
    pub fn failures(&self) -> Vec<&DispatchError> {
        match self {
            Self::Multiple(errors) => errors.iter().flat_map(|e| e.failures()).collect(),
            other => vec![other],
        }
    }
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for metadata operations.
pub type MetadataResult<T> = Result<T, MetadataError>;

/// Result type for dispatch operations.
pub type DispatchResult<T = ()> = Result<T, DispatchError>;
