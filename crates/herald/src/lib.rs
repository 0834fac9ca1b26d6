//! # Herald
//!
//! Typed event subscribers and configurable dispatch for Discord bots.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐     ┌────────────────┐     ┌─────────────────┐     ┌────────────┐
//! │ Connection │────▶│ EventForwarder │────▶│ EventDispatcher │────▶│ Subscriber │
//! │  (client)  │     │  (spawn task)  │     │  (strategy ×    │────▶│ Subscriber │
//! └────────────┘     └────────────────┘     │   scope)        │────▶│ Subscriber │
//!                                           └─────────────────┘     └────────────┘
//!                                                  │   ▲
//!                                       metadata + │   │ scoped instances
//!                                       delegates  ▼   │
//!                                           ┌─────────────────┐
//!                                           │ MetadataProvider│  ServiceContainer
//!                                           └─────────────────┘
//! ```
//!
//! - **Subscribers** implement [`EventSubscriber`](prelude::EventSubscriber) or
//!   [`CommandEventSubscriber`](prelude::CommandEventSubscriber) and are
//!   declared with a [`SubscriberDescriptor`](prelude::SubscriberDescriptor)
//! - **MetadataProvider** indexes subscribers by event and caches one
//!   delegate per (subscriber, event) pair
//! - **EventDispatcher** resolves subscribers per event occurrence and invokes
//!   them sequentially or in parallel, with one scope per subscriber or per
//!   event
//! - **HeraldRuntime** assembles everything from configuration
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use herald::prelude::*;
//!
//! struct Welcome;
//!
//! impl Injectable for Welcome {
//!     fn inject(_: &dyn ServiceScope) -> ResolveResult<Self> {
//!         Ok(Welcome)
//!     }
//! }
//!
//! #[async_trait]
//! impl EventSubscriber<GuildMemberAdded> for Welcome {
//!     async fn on_event(&self, _: &DiscordClient, event: &GuildMemberAdded) -> SubscriberResult {
//!         info!(user = event.user_id, "member joined");
//!         Ok(())
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let runtime = HeraldRuntime::builder()
//!         .subscriber(SubscriberDescriptor::of::<Welcome>().event::<GuildMemberAdded>())
//!         .build()?;
//!     runtime.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `toml-config`: TOML configuration files (default)
//! - `yaml-config`: YAML configuration files
//! - `json-log`: JSON log output

pub use herald_core as core;
pub use herald_framework as framework;
pub use herald_runtime as runtime;

/// Everything needed to write subscribers and host them.
pub mod prelude {
    pub use herald_framework::prelude::*;
    pub use herald_framework::{CancellationToken, DispatchError, MetadataError, linkme};
    pub use herald_core::{CommandsExtension, DiscordClient, EventCatalog};
    pub use herald_runtime::prelude::*;
    pub use herald_runtime::{
        EventForwarder, HeraldConfig, HeraldRuntime, Lifetime, ServiceCollection,
    };
}
