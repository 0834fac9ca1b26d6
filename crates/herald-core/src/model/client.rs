use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Sender of every basic event: one sharded client connection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscordClient {
    /// Shard this connection serves.
    pub shard_id: u32,
    /// Total number of shards.
    pub shard_count: u32,
    /// Id of the logged-in user, once the session is ready.
    pub current_user_id: Option<u64>,
}

impl DiscordClient {
    pub fn new(shard_id: u32, shard_count: u32) -> Self {
        Self {
            shard_id,
            shard_count,
            current_user_id: None,
        }
    }
}

/// Sender of every command event: the command extension attached to a client.
#[derive(Debug, Clone, Default)]
pub struct CommandsExtension {
    /// The client this extension is attached to.
    pub client: Arc<DiscordClient>,
    /// Registered command prefixes.
    pub prefixes: Vec<String>,
}

impl CommandsExtension {
    pub fn new(client: Arc<DiscordClient>) -> Self {
        Self {
            client,
            prefixes: Vec::new(),
        }
    }

    /// Adds a command prefix.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefixes.push(prefix.into());
        self
    }
}
