//! The slice of the chat platform's object model that the dispatcher observes.
//!
//! The gateway connection itself is owned by the client SDK; these types only
//! carry what an inbound adapter hands to the dispatcher.

mod client;
mod events;

pub use client::{CommandsExtension, DiscordClient};
pub use events::*;

pub(crate) use events::{basic_event_types, command_event_types};
