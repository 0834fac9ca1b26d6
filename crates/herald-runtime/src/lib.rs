//! Herald Runtime - hosting layer for Herald applications.
//!
//! This crate provides:
//! - Configuration loading and validation (`HeraldConfig`, `ConfigLoader`)
//! - Logging setup (`LoggingBuilder`)
//! - A service container implementing the resolution contract
//!   (`ServiceCollection`, `ServiceContainer`)
//! - Subscriber service registration
//! - The inbound adapter (`EventForwarder`) and lifecycle (`HeraldRuntime`)
//!
//! ```ignore
//! use herald_runtime::HeraldRuntime;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let runtime = HeraldRuntime::builder().with_modules().build()?;
//!     let forwarder = runtime.forwarder();
//!     connection.on_event(move |event| forwarder.forward(event.kind, event.sender, event.args));
//!     runtime.run().await?;
//!     Ok(())
//! }
//! ```

pub mod adapter;
pub mod config;
pub mod container;
pub mod error;
pub mod logging;
pub mod runtime;
pub mod subscribers;

// Re-exports
pub use adapter::EventForwarder;
pub use config::{ConfigError, ConfigLoader, ConfigResult, HeraldConfig, LoggingConfig};
pub use container::{
    ContainerScope, ContainerStats, Lifetime, ServiceCollection, ServiceContainer,
    ServiceDescriptor, ServiceFactory,
};
pub use error::{RuntimeError, RuntimeResult};
pub use logging::{LoggingBuilder, SpanEvents};
pub use runtime::{HeraldRuntime, RuntimeBuilder};

// Re-export tracing for use by other crates
pub use tracing;
pub use tracing_subscriber;

/// Logging macros for application code.
pub mod prelude {
    pub use tracing::{Level, debug, error, info, instrument, span, trace, warn};
}
