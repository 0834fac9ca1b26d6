//! Inbound adapter from the client connection to the dispatcher.
//!
//! The connection layer raises events synchronously and does not wait for
//! handlers. [`EventForwarder`] spawns each dispatch onto the tokio runtime
//! and logs failures, so a slow or failing subscriber never blocks the
//! connection.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::error;

use herald_core::{BoxedEventArgs, BoxedSender, CommandsExtension, DiscordClient, EventArgs, TypeKey};
use herald_framework::EventDispatcher;

/// Forwards raised events to an [`EventDispatcher`].
#[derive(Debug, Clone)]
pub struct EventForwarder {
    dispatcher: Arc<EventDispatcher>,
}

impl EventForwarder {
    pub fn new(dispatcher: Arc<EventDispatcher>) -> Self {
        Self { dispatcher }
    }

    pub fn dispatcher(&self) -> &Arc<EventDispatcher> {
        &self.dispatcher
    }

    /// Spawns a dispatch of `args` and returns its handle.
    ///
    /// Must be called from within a tokio runtime. Dropping the handle does
    /// not cancel the dispatch.
    pub fn forward(&self, event: TypeKey, sender: BoxedSender, args: BoxedEventArgs) -> JoinHandle<()> {
        let dispatcher = Arc::clone(&self.dispatcher);
        tokio::spawn(async move {
            if let Err(err) = dispatcher.dispatch(event, sender, args).await {
                error!(event = %event, error = %err, "Event dispatch failed");
            }
        })
    }

    /// Forwards a basic event raised by `client`.
    pub fn client_event<E: EventArgs>(&self, client: &Arc<DiscordClient>, args: E) -> JoinHandle<()> {
        self.forward(
            TypeKey::of::<E>(),
            BoxedSender::from_arc(Arc::clone(client)),
            BoxedEventArgs::new(args),
        )
    }

    /// Forwards a command event raised by `commands`.
    pub fn command_event<E: EventArgs>(
        &self,
        commands: &Arc<CommandsExtension>,
        args: E,
    ) -> JoinHandle<()> {
        self.forward(
            TypeKey::of::<E>(),
            BoxedSender::from_arc(Arc::clone(commands)),
            BoxedEventArgs::new(args),
        )
    }
}
