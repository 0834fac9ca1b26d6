//! Runtime assembly and lifecycle.
//!
//! [`RuntimeBuilder`] wires configuration, logging, subscriber metadata, the
//! service container and the dispatcher together. [`HeraldRuntime`] then
//! starts and stops the dispatcher around the application's lifetime.
//!
//! ```rust,ignore
//! let runtime = HeraldRuntime::builder()
//!     .config_file("herald.toml")
//!     .with_modules()
//!     .subscriber(SubscriberDescriptor::of::<Greeter>().event::<GuildMemberAdded>())
//!     .services(|services| {
//!         services.add_instance(Arc::new(Database::connect(url)?));
//!     })
//!     .build()?;
//!
//! let forwarder = runtime.forwarder();
//! // hand `forwarder` to the connection layer
//! runtime.run().await?;
//! ```

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::signal;
use tracing::{info, warn};

use crate::adapter::EventForwarder;
use crate::config::{ConfigLoader, HeraldConfig, validate_config};
use crate::container::{ServiceCollection, ServiceContainer};
use crate::error::RuntimeResult;
use crate::logging;
use herald_core::{BoxedSender, EventArgs, EventCatalog};
use herald_framework::{EventDispatcher, MetadataProvider, SubscriberDescriptor};

/// An assembled Herald application.
pub struct HeraldRuntime {
    config: HeraldConfig,
    metadata: Arc<MetadataProvider>,
    container: ServiceContainer,
    dispatcher: Arc<EventDispatcher>,
    running: AtomicBool,
}

impl HeraldRuntime {
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    pub fn config(&self) -> &HeraldConfig {
        &self.config
    }

    pub fn metadata(&self) -> &Arc<MetadataProvider> {
        &self.metadata
    }

    pub fn container(&self) -> &ServiceContainer {
        &self.container
    }

    pub fn dispatcher(&self) -> &Arc<EventDispatcher> {
        &self.dispatcher
    }

    /// An inbound adapter bound to this runtime's dispatcher.
    pub fn forwarder(&self) -> EventForwarder {
        EventForwarder::new(Arc::clone(&self.dispatcher))
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Starts dispatching events.
    pub fn start(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Runtime is already running");
            return;
        }
        self.dispatcher.start();
        info!(
            events = self.metadata.event_data().len(),
            subscribers = self.metadata.descriptors().count(),
            "Herald runtime started"
        );
    }

    /// Stops dispatching events.
    ///
    /// Dispatches already in flight are left to finish on their own; new
    /// events are dropped.
    pub fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            warn!("Runtime is not running");
            return;
        }
        self.dispatcher.stop();
        let stats = self.container.stats();
        info!(open_scopes = stats.open_scopes(), "Herald runtime stopped");
    }

    /// Dispatches `args` and waits for every subscriber to finish.
    ///
    /// Unlike [`EventForwarder`], failures are returned to the caller.
    pub async fn publish<E: EventArgs>(&self, sender: BoxedSender, args: E) -> RuntimeResult<()> {
        self.dispatcher.publish(sender, args).await?;
        Ok(())
    }

    /// Runs until Ctrl+C or SIGTERM.
    pub async fn run(&self) -> RuntimeResult<()> {
        self.start();
        info!("Herald runtime is now running. Press Ctrl+C to stop.");
        wait_for_shutdown().await;
        self.stop();
        Ok(())
    }

    /// Runs until `shutdown` completes.
    pub async fn run_until<F>(&self, shutdown: F) -> RuntimeResult<()>
    where
        F: Future<Output = ()>,
    {
        self.start();
        shutdown.await;
        self.stop();
        Ok(())
    }
}

impl std::fmt::Debug for HeraldRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeraldRuntime")
            .field("config", &self.config)
            .field("container", &self.container)
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

async fn wait_for_shutdown() {
    #[cfg(unix)]
    {
        let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to register SIGTERM handler");

        tokio::select! {
            _ = signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down");
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down");
            }
        }
    }

    #[cfg(not(unix))]
    {
        signal::ctrl_c().await.expect("Failed to listen for Ctrl+C");
        info!("Received Ctrl+C, shutting down");
    }
}

// =============================================================================
// RuntimeBuilder
// =============================================================================

/// Builder for [`HeraldRuntime`].
pub struct RuntimeBuilder {
    config_loader: ConfigLoader,
    config: Option<HeraldConfig>,
    init_logging: bool,
    catalog: Option<Arc<EventCatalog>>,
    descriptors: Vec<SubscriberDescriptor>,
    scan_modules: bool,
    services: ServiceCollection,
}

impl RuntimeBuilder {
    pub fn new() -> Self {
        Self {
            config_loader: ConfigLoader::new().with_current_dir(),
            config: None,
            init_logging: true,
            catalog: None,
            descriptors: Vec::new(),
            scan_modules: false,
            services: ServiceCollection::new(),
        }
    }

    pub fn config_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.file(path);
        self
    }

    pub fn profile(mut self, profile: impl Into<String>) -> Self {
        self.config_loader = self.config_loader.profile(profile);
        self
    }

    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.search_path(path);
        self
    }

    pub fn without_env(mut self) -> Self {
        self.config_loader = self.config_loader.without_env();
        self
    }

    /// Merges configuration on top of the loaded sources.
    pub fn merge(mut self, config: HeraldConfig) -> Self {
        self.config_loader = self.config_loader.merge(config);
        self
    }

    /// Uses `config` as is instead of loading configuration.
    pub fn config(mut self, config: HeraldConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Leaves the global tracing subscriber alone.
    pub fn without_logging(mut self) -> Self {
        self.init_logging = false;
        self
    }

    /// Replaces the default Discord event catalog.
    pub fn catalog(mut self, catalog: Arc<EventCatalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Registers one subscriber.
    pub fn subscriber(mut self, descriptor: impl Into<SubscriberDescriptor>) -> Self {
        self.descriptors.push(descriptor.into());
        self
    }

    pub fn subscribers<I>(mut self, descriptors: I) -> Self
    where
        I: IntoIterator<Item = SubscriberDescriptor>,
    {
        self.descriptors.extend(descriptors);
        self
    }

    /// Also registers every module linked into the binary.
    pub fn with_modules(mut self) -> Self {
        self.scan_modules = true;
        self
    }

    /// Adds application services.
    pub fn services<F>(mut self, configure: F) -> Self
    where
        F: FnOnce(&mut ServiceCollection),
    {
        configure(&mut self.services);
        self
    }

    /// Loads and validates configuration, then assembles the runtime.
    ///
    /// The returned runtime is stopped.
    pub fn build(self) -> RuntimeResult<HeraldRuntime> {
        let config = match self.config {
            Some(config) => config,
            None => self.config_loader.load()?,
        };
        validate_config(&config)?;

        if self.init_logging {
            logging::init_from_config(&config.logging);
        }

        let catalog = self.catalog.unwrap_or_else(EventCatalog::discord);
        let mut metadata = MetadataProvider::with_catalog(catalog);
        metadata.append_types(self.descriptors)?;
        if self.scan_modules {
            metadata.append_modules(None)?;
        }

        let mut services = self.services;
        services.add_event_subscribers(&metadata, None);
        let container = services.build();

        let metadata = Arc::new(metadata);
        let dispatcher = Arc::new(EventDispatcher::new(
            Arc::clone(&metadata),
            Arc::new(container.clone()),
            config.dispatch.clone(),
        ));

        info!(
            basic_events = metadata.basic_event_data().count(),
            command_events = metadata.command_event_data().count(),
            delegates = metadata.delegates().len(),
            "Herald runtime assembled"
        );

        Ok(HeraldRuntime {
            config,
            metadata,
            container,
            dispatcher,
            running: AtomicBool::new(false),
        })
    }
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigError;
    use crate::error::RuntimeError;
    use herald_framework::{DispatchStrategy, MetadataError};

    #[test]
    fn test_build_empty_runtime() {
        let runtime = HeraldRuntime::builder()
            .config(HeraldConfig::default())
            .without_logging()
            .build()
            .unwrap();

        assert!(!runtime.is_running());
        assert!(!runtime.dispatcher().is_enabled());
        assert!(runtime.metadata().event_data().is_empty());

        runtime.start();
        assert!(runtime.is_running());
        assert!(runtime.dispatcher().is_enabled());

        runtime.stop();
        assert!(!runtime.dispatcher().is_enabled());
    }

    #[test]
    fn test_config_is_validated() {
        let mut config = HeraldConfig::default();
        config.dispatch.max_basic_event_parallelism = Some(0);

        let result = HeraldRuntime::builder()
            .config(config)
            .without_logging()
            .build();
        assert!(matches!(
            result,
            Err(RuntimeError::Config(ConfigError::ValidationError { .. }))
        ));
    }

    #[test]
    fn test_dispatch_config_is_applied() {
        let mut config = HeraldConfig::default();
        config.dispatch.basic_dispatch_strategy = DispatchStrategy::Sequential;

        let runtime = HeraldRuntime::builder()
            .config(config)
            .without_logging()
            .build()
            .unwrap();
        assert_eq!(
            runtime.dispatcher().config().basic_dispatch_strategy,
            DispatchStrategy::Sequential
        );
    }

    #[tokio::test]
    async fn test_dispatch_errors_surface() {
        use herald_core::model::MessageCreated;
        use herald_core::{DiscordClient, Injectable, ResolveResult, ServiceScope};
        use herald_framework::{DispatchError, EventSubscriber, SubscriberResult, async_trait};

        struct Failing;

        impl Injectable for Failing {
            fn inject(_: &dyn ServiceScope) -> ResolveResult<Self> {
                Ok(Failing)
            }
        }

        #[async_trait]
        impl EventSubscriber<MessageCreated> for Failing {
            async fn on_event(&self, _: &DiscordClient, _: &MessageCreated) -> SubscriberResult {
                Err("rejected".into())
            }
        }

        let runtime = HeraldRuntime::builder()
            .config(HeraldConfig::default())
            .without_logging()
            .subscriber(SubscriberDescriptor::of::<Failing>().event::<MessageCreated>())
            .build()
            .unwrap();
        let sender = || BoxedSender::new(DiscordClient::new(0, 1));

        // Stopped runtimes drop events.
        assert!(runtime.publish(sender(), MessageCreated::default()).await.is_ok());

        runtime.start();
        let result = runtime.publish(sender(), MessageCreated::default()).await;
        assert!(matches!(
            result,
            Err(RuntimeError::Dispatch(DispatchError::Subscriber { .. }))
        ));
        runtime.stop();
    }

    #[test]
    fn test_metadata_errors_surface() {
        use herald_core::model::Zombied;
        use herald_core::{Injectable, ResolveResult, ServiceScope};
        use herald_framework::{Subscriber, SubscriberResult, async_trait};

        struct Stray;

        impl Injectable for Stray {
            fn inject(_: &dyn ServiceScope) -> ResolveResult<Self> {
                Ok(Stray)
            }
        }

        // Basic events are raised by the client, never by a `u8`.
        #[async_trait]
        impl Subscriber<u8, Zombied> for Stray {
            async fn handle(&self, _: &u8, _: &Zombied) -> SubscriberResult {
                Ok(())
            }
        }

        let result = HeraldRuntime::builder()
            .config(HeraldConfig::default())
            .without_logging()
            .subscriber(SubscriberDescriptor::of::<Stray>().handles::<u8, Zombied>())
            .build();
        assert!(matches!(
            result,
            Err(RuntimeError::Metadata(MetadataError::HandlerNotFound { .. }))
        ));
    }
}
