//! Built-in event payloads.

use serde::{Deserialize, Serialize};

use crate::event::EventArgs;
use crate::key::TypeKey;

/// Declares payload structs and a function listing their [`TypeKey`]s.
macro_rules! declare_events {
    (
        fn $list:ident;
        $(
            $(#[$meta:meta])*
            $name:ident { $( $(#[$fmeta:meta])* $field:ident : $ty:ty ),* $(,)? }
        )*
    ) => {
        $(
            $(#[$meta])*
            #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
            #[serde(default)]
            pub struct $name {
                $( $(#[$fmeta])* pub $field: $ty, )*
            }

            impl EventArgs for $name {}
        )*

        pub(crate) fn $list() -> Vec<TypeKey> {
            vec![$(TypeKey::of::<$name>()),*]
        }
    };
}

// ─── Basic events ─────────────────────────────────────────────────────────────

declare_events! {
    fn basic_event_types;

    /// The gateway session is ready.
    SessionCreated {
        session_id: String,
        guild_ids: Vec<u64>,
    }
    /// A dropped session was resumed.
    SessionResumed {
        session_id: String,
    }
    /// Heartbeats stopped being acknowledged.
    Zombied {
        failures: u32,
        guild_download_completed: bool,
    }
    SocketOpened {}
    SocketClosed {
        close_code: u16,
        close_message: String,
    }
    SocketErrored {
        message: String,
    }
    /// A heartbeat was acknowledged.
    Heartbeated {
        ping_ms: u64,
        timestamp: i64,
    }
    GuildCreated {
        guild_id: u64,
        name: String,
    }
    GuildAvailable {
        guild_id: u64,
    }
    GuildUpdated {
        guild_id: u64,
        name: String,
    }
    GuildDeleted {
        guild_id: u64,
        unavailable: bool,
    }
    GuildUnavailable {
        guild_id: u64,
    }
    /// All guilds of the session finished downloading.
    GuildDownloadCompleted {
        guild_ids: Vec<u64>,
    }
    ChannelCreated {
        guild_id: Option<u64>,
        channel_id: u64,
    }
    ChannelUpdated {
        guild_id: Option<u64>,
        channel_id: u64,
    }
    ChannelDeleted {
        guild_id: Option<u64>,
        channel_id: u64,
    }
    MessageCreated {
        channel_id: u64,
        message_id: u64,
        author_id: u64,
        content: String,
    }
    MessageUpdated {
        channel_id: u64,
        message_id: u64,
        content: String,
    }
    MessageDeleted {
        channel_id: u64,
        message_id: u64,
    }
    MessageReactionAdded {
        channel_id: u64,
        message_id: u64,
        user_id: u64,
        emoji: String,
    }
    MessageReactionRemoved {
        channel_id: u64,
        message_id: u64,
        user_id: u64,
        emoji: String,
    }
    GuildMemberAdded {
        guild_id: u64,
        user_id: u64,
    }
    GuildMemberRemoved {
        guild_id: u64,
        user_id: u64,
    }
    GuildMemberUpdated {
        guild_id: u64,
        user_id: u64,
        nickname: Option<String>,
    }
    InviteCreated {
        channel_id: u64,
        code: String,
    }
    InviteDeleted {
        channel_id: u64,
        code: String,
    }
    PresenceUpdated {
        user_id: u64,
        status: String,
    }
    TypingStarted {
        channel_id: u64,
        user_id: u64,
    }
    VoiceStateUpdated {
        guild_id: u64,
        channel_id: Option<u64>,
        user_id: u64,
    }
}

// ─── Command events ───────────────────────────────────────────────────────────

declare_events! {
    fn command_event_types;

    /// A command finished successfully.
    CommandExecuted {
        command_name: String,
        user_id: u64,
        channel_id: u64,
    }
    /// A command failed.
    CommandErrored {
        command_name: String,
        user_id: u64,
        channel_id: u64,
        error: String,
    }
}
