//! Gateway Replay
//!
//! Feeds recorded gateway traffic through Herald subscribers, without a live
//! Discord connection.
//!
//! # Input
//!
//! One JSON object per line, tagged by event name:
//!
//! ```text
//! {"type": "session_created", "data": {"session_id": "abc", "guild_ids": [1]}}
//! {"type": "guild_member_added", "data": {"guild_id": 1, "user_id": 42}}
//! {"type": "message_created", "data": {"channel_id": 7, "author_id": 42, "content": "ping"}}
//! {"type": "command_executed", "data": {"command_name": "ban", "user_id": 42}}
//! ```
//!
//! Missing payload fields take their default values. Without `--events`, a
//! synthetic session is generated instead.
//!
//! # Usage
//!
//! ```bash
//! cargo run --package gateway-replay -- --events session.jsonl
//! cargo run --package gateway-replay -- --sessions 5 --burst
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{Context, Result};
use clap::Parser;
use herald::framework::SUBSCRIBER_MODULES;
use herald::prelude::*;
use ::linkme::distributed_slice;
use serde::Deserialize;
use tokio::task::JoinHandle;
use tracing::{info, warn};

// ============================================================================
// Command line
// ============================================================================

#[derive(Parser, Debug)]
#[command(version, about = "Replay gateway events through Herald subscribers")]
struct Args {
    /// Configuration file (defaults to herald.toml in the working directory).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Configuration profile.
    #[arg(short, long)]
    profile: Option<String>,

    /// Recorded events, one JSON object per line.
    #[arg(short, long)]
    events: Option<PathBuf>,

    /// Number of synthetic sessions when no recording is given.
    #[arg(long, default_value_t = 2)]
    sessions: u32,

    /// Forward every event at once instead of one after another.
    #[arg(long)]
    burst: bool,
}

// ============================================================================
// Recorded events
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
enum ReplayEvent {
    SessionCreated(SessionCreated),
    Zombied(Zombied),
    GuildMemberAdded(GuildMemberAdded),
    MessageCreated(MessageCreated),
    MessageDeleted(MessageDeleted),
    CommandExecuted(CommandExecuted),
    CommandErrored(CommandErrored),
}

impl ReplayEvent {
    fn forward(
        self,
        forwarder: &EventForwarder,
        client: &Arc<DiscordClient>,
        commands: &Arc<CommandsExtension>,
    ) -> JoinHandle<()> {
        match self {
            Self::SessionCreated(e) => forwarder.client_event(client, e),
            Self::Zombied(e) => forwarder.client_event(client, e),
            Self::GuildMemberAdded(e) => forwarder.client_event(client, e),
            Self::MessageCreated(e) => forwarder.client_event(client, e),
            Self::MessageDeleted(e) => forwarder.client_event(client, e),
            Self::CommandExecuted(e) => forwarder.command_event(commands, e),
            Self::CommandErrored(e) => forwarder.command_event(commands, e),
        }
    }
}

async fn load_recording(path: &PathBuf) -> Result<Vec<ReplayEvent>> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;

    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(number, line)| {
            serde_json::from_str(line)
                .with_context(|| format!("{}:{}: malformed event", path.display(), number + 1))
        })
        .collect()
}

fn synthetic_sessions(sessions: u32) -> Vec<ReplayEvent> {
    let mut events = Vec::new();
    for session in 0..u64::from(sessions) {
        let guild_id = 100 + session;
        let channel_id = 1000 + session;
        events.push(ReplayEvent::SessionCreated(SessionCreated {
            session_id: format!("replay-{session}"),
            guild_ids: vec![guild_id],
        }));
        events.push(ReplayEvent::GuildMemberAdded(GuildMemberAdded {
            guild_id,
            user_id: 42,
        }));
        for (message_id, content) in [(1, "hello"), (2, "ping"), (3, "buy cheap spam here")] {
            events.push(ReplayEvent::MessageCreated(MessageCreated {
                channel_id,
                message_id,
                author_id: 42,
                content: content.to_string(),
            }));
        }
        events.push(ReplayEvent::MessageDeleted(MessageDeleted {
            channel_id,
            message_id: 3,
        }));
        events.push(ReplayEvent::CommandExecuted(CommandExecuted {
            command_name: "ping".to_string(),
            user_id: 42,
            channel_id,
        }));
        events.push(ReplayEvent::CommandErrored(CommandErrored {
            command_name: "ban".to_string(),
            user_id: 42,
            channel_id,
            error: "missing permissions".to_string(),
        }));
    }
    events.push(ReplayEvent::Zombied(Zombied {
        failures: 3,
        guild_download_completed: true,
    }));
    events
}

// ============================================================================
// Services
// ============================================================================

/// Counters shared by every subscriber.
#[derive(Debug, Default)]
struct Metrics {
    sessions: AtomicU64,
    members_greeted: AtomicU64,
    messages_seen: AtomicU64,
    messages_flagged: AtomicU64,
    messages_deleted: AtomicU64,
    commands_succeeded: AtomicU64,
    commands_failed: AtomicU64,
}

impl Metrics {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn report(&self) {
        info!(
            sessions = self.sessions.load(Ordering::Relaxed),
            members_greeted = self.members_greeted.load(Ordering::Relaxed),
            messages_seen = self.messages_seen.load(Ordering::Relaxed),
            messages_flagged = self.messages_flagged.load(Ordering::Relaxed),
            messages_deleted = self.messages_deleted.load(Ordering::Relaxed),
            commands_succeeded = self.commands_succeeded.load(Ordering::Relaxed),
            commands_failed = self.commands_failed.load(Ordering::Relaxed),
            "Replay finished"
        );
    }
}

// ============================================================================
// Subscribers
// ============================================================================

/// Welcomes new members and announces sessions.
struct Greeter {
    metrics: Arc<Metrics>,
}

impl Injectable for Greeter {
    fn inject(scope: &dyn ServiceScope) -> ResolveResult<Self> {
        Ok(Self {
            metrics: scope.get::<Metrics>()?,
        })
    }
}

#[async_trait]
impl EventSubscriber<SessionCreated> for Greeter {
    async fn on_event(&self, client: &DiscordClient, event: &SessionCreated) -> SubscriberResult {
        Metrics::bump(&self.metrics.sessions);
        info!(
            shard = client.shard_id,
            session = %event.session_id,
            guilds = event.guild_ids.len(),
            "Session ready"
        );
        Ok(())
    }
}

#[async_trait]
impl EventSubscriber<GuildMemberAdded> for Greeter {
    async fn on_event(&self, _: &DiscordClient, event: &GuildMemberAdded) -> SubscriberResult {
        Metrics::bump(&self.metrics.members_greeted);
        info!(guild = event.guild_id, user = event.user_id, "Welcome aboard!");
        Ok(())
    }
}

/// Flags suspicious messages and records deletions.
struct ModerationLog {
    metrics: Arc<Metrics>,
}

impl ModerationLog {
    const BLOCKED: &'static [&'static str] = &["spam", "free nitro"];
}

impl Injectable for ModerationLog {
    fn inject(scope: &dyn ServiceScope) -> ResolveResult<Self> {
        Ok(Self {
            metrics: scope.get::<Metrics>()?,
        })
    }
}

#[async_trait]
impl EventSubscriber<MessageCreated> for ModerationLog {
    async fn on_event(&self, _: &DiscordClient, event: &MessageCreated) -> SubscriberResult {
        Metrics::bump(&self.metrics.messages_seen);
        let content = event.content.to_lowercase();
        if let Some(word) = Self::BLOCKED.iter().find(|word| content.contains(*word)) {
            Metrics::bump(&self.metrics.messages_flagged);
            return Err(format!("message {} contains blocked phrase {word:?}", event.message_id).into());
        }
        Ok(())
    }
}

#[async_trait]
impl EventSubscriber<MessageDeleted> for ModerationLog {
    async fn on_event(&self, _: &DiscordClient, event: &MessageDeleted) -> SubscriberResult {
        Metrics::bump(&self.metrics.messages_deleted);
        info!(channel = event.channel_id, message = event.message_id, "Message deleted");
        Ok(())
    }
}

/// Replies to pings.
struct Pong;

impl Injectable for Pong {
    fn inject(_: &dyn ServiceScope) -> ResolveResult<Self> {
        Ok(Self)
    }
}

#[async_trait]
impl EventSubscriber<MessageCreated> for Pong {
    async fn on_event(&self, _: &DiscordClient, event: &MessageCreated) -> SubscriberResult {
        if event.content.trim() == "ping" {
            info!(channel = event.channel_id, "Pong!");
        }
        Ok(())
    }
}

/// Warns when heartbeats stop being acknowledged.
struct HealthWatch;

impl Injectable for HealthWatch {
    fn inject(_: &dyn ServiceScope) -> ResolveResult<Self> {
        Ok(Self)
    }
}

#[async_trait]
impl EventSubscriber<Zombied> for HealthWatch {
    async fn on_event(&self, client: &DiscordClient, event: &Zombied) -> SubscriberResult {
        warn!(
            shard = client.shard_id,
            failures = event.failures,
            "Connection is zombied, a reconnect is due"
        );
        Ok(())
    }
}

/// Audits command outcomes. Contributed as a module and resolved through
/// its keyed interface registrations.
struct CommandAudit {
    metrics: Arc<Metrics>,
}

impl Injectable for CommandAudit {
    fn inject(scope: &dyn ServiceScope) -> ResolveResult<Self> {
        Ok(Self {
            metrics: scope.get::<Metrics>()?,
        })
    }
}

#[async_trait]
impl CommandEventSubscriber<CommandExecuted> for CommandAudit {
    async fn on_event(&self, commands: &CommandsExtension, event: &CommandExecuted) -> SubscriberResult {
        Metrics::bump(&self.metrics.commands_succeeded);
        info!(
            prefix = commands.prefixes.first().map(String::as_str).unwrap_or(""),
            command = %event.command_name,
            user = event.user_id,
            "Command executed"
        );
        Ok(())
    }
}

#[async_trait]
impl CommandEventSubscriber<CommandErrored> for CommandAudit {
    async fn on_event(&self, _: &CommandsExtension, event: &CommandErrored) -> SubscriberResult {
        Metrics::bump(&self.metrics.commands_failed);
        warn!(
            command = %event.command_name,
            user = event.user_id,
            error = %event.error,
            "Command failed"
        );
        Ok(())
    }
}

#[distributed_slice(SUBSCRIBER_MODULES)]
static AUDIT: SubscriberModule = SubscriberModule::new("audit", || {
    vec![
        SubscriberDescriptor::of::<CommandAudit>()
            .command_event::<CommandExecuted>()
            .command_event::<CommandErrored>()
            .resolved_by(ResolveStrategy::KeyedInterface)
            .build(),
    ]
});

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let metrics = Arc::new(Metrics::default());

    let mut builder = HeraldRuntime::builder()
        .with_modules()
        .subscriber(
            SubscriberDescriptor::of::<Greeter>()
                .event::<SessionCreated>()
                .event::<GuildMemberAdded>()
                .order(1),
        )
        .subscriber(
            SubscriberDescriptor::of::<ModerationLog>()
                .event::<MessageCreated>()
                .event::<MessageDeleted>()
                .order(2),
        )
        .subscriber(SubscriberDescriptor::of::<Pong>().event::<MessageCreated>())
        .subscriber(SubscriberDescriptor::of::<HealthWatch>().event::<Zombied>())
        .services({
            let metrics = Arc::clone(&metrics);
            move |services| {
                services.add_instance(metrics);
            }
        });
    if let Some(path) = &args.config {
        builder = builder.config_file(path);
    }
    if let Some(profile) = args.profile {
        builder = builder.profile(profile);
    }
    let runtime = builder.build()?;

    let events = match &args.events {
        Some(path) => load_recording(path).await?,
        None => synthetic_sessions(args.sessions),
    };
    info!(events = events.len(), burst = args.burst, "Replaying gateway events");

    let client = Arc::new(DiscordClient::new(0, 1));
    let commands = Arc::new(CommandsExtension::new(Arc::clone(&client)).with_prefix("!"));
    let forwarder = runtime.forwarder();

    runtime.start();
    if args.burst {
        let handles: Vec<_> = events
            .into_iter()
            .map(|event| event.forward(&forwarder, &client, &commands))
            .collect();
        for handle in handles {
            handle.await?;
        }
    } else {
        for event in events {
            event.forward(&forwarder, &client, &commands).await?;
        }
    }
    runtime.stop();

    metrics.report();
    Ok(())
}
