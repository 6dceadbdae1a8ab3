//! Discord adapter (serenity).
//!
//! Implements the `quip-core` connection and reply-send ports over the
//! Discord gateway.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use async_trait::async_trait;
use serenity::all::{
    ChannelId, Client, Context, CreateMessage, EventHandler, GatewayIntents, Http, Message,
    MessageId as DiscordMessageId, MessageReference, Ready,
};
use tokio_util::sync::CancellationToken;
use tracing::info;

use quip_core::{
    classify::MessageEvent,
    domain::{AccountId, ChatId, MessageId},
    errors::Error,
    ports::{BotConnection, ReplySender},
    respond::Responder,
    Result,
};

/// One Discord gateway connection for one bot identity.
pub struct DiscordConnection {
    label: String,
    token: String,
    responder: Arc<Responder>,
}

impl DiscordConnection {
    pub fn new(token: impl Into<String>, responder: Arc<Responder>) -> Self {
        let label = format!("{}/discord", responder.name());
        Self {
            label,
            token: token.into(),
            responder,
        }
    }
}

#[async_trait]
impl BotConnection for DiscordConnection {
    fn label(&self) -> &str {
        &self.label
    }

    async fn run(&self, cancel: CancellationToken) -> Result<()> {
        let intents = GatewayIntents::non_privileged() | GatewayIntents::MESSAGE_CONTENT;
        let handler = Handler {
            label: self.label.clone(),
            responder: self.responder.clone(),
            self_id: AtomicU64::new(0),
        };

        let mut client = Client::builder(&self.token, intents)
            .event_handler(handler)
            .await
            .map_err(|e| Error::Transport(format!("discord client setup failed: {e}")))?;

        let shards = client.shard_manager.clone();
        tokio::select! {
            result = client.start() => {
                result.map_err(|e| Error::Transport(format!("discord gateway failed: {e}")))
            }
            _ = cancel.cancelled() => {
                shards.shutdown_all().await;
                Ok(())
            }
        }
    }
}

struct Handler {
    label: String,
    responder: Arc<Responder>,
    self_id: AtomicU64,
}

#[async_trait]
impl EventHandler for Handler {
    async fn ready(&self, _ctx: Context, ready: Ready) {
        self.self_id.store(ready.user.id.get(), Ordering::Release);
        info!(bot = %self.label, username = %ready.user.name, "discord connection up");
    }

    async fn message(&self, ctx: Context, msg: Message) {
        let self_id = self.self_id.load(Ordering::Acquire);
        if self_id == 0 {
            // The gateway can deliver messages before `ready`; without our
            // own id the mention rules cannot be evaluated.
            return;
        }

        let event = normalize(&msg, AccountId(self_id));
        let sender = DiscordSender {
            http: ctx.http.clone(),
        };
        self.responder.handle(event, &sender).await;
    }
}

/// Map a gateway message onto the core event model.
fn normalize(msg: &Message, self_id: AccountId) -> MessageEvent {
    MessageEvent {
        chat_id: ChatId(msg.channel_id.get() as i64),
        message_id: MessageId(msg.id.get() as i64),
        parent_id: msg
            .message_reference
            .as_ref()
            .and_then(|r| r.message_id)
            .map(|id| MessageId(id.get() as i64)),
        text: msg.content.clone(),
        author_is_bot: msg.author.bot,
        self_id,
        mentioned: msg.mentions.iter().map(|u| AccountId(u.id.get())).collect(),
        // "Called by name": the raw content spells out our account id, which
        // is how clients render a mention typed out as literal text.
        mentioned_in_text: msg.content.contains(&self_id.0.to_string()),
        replied_to_self: msg
            .referenced_message
            .as_deref()
            .map(|parent| parent.author.id.get() == self_id.0)
            .unwrap_or(false),
        chat_is_private: msg.guild_id.is_none(),
    }
}

struct DiscordSender {
    http: Arc<Http>,
}

#[async_trait]
impl ReplySender for DiscordSender {
    async fn send_reply(&self, chat_id: ChatId, text: &str, anchor: MessageId) -> Result<()> {
        let channel = ChannelId::new(chat_id.0 as u64);
        let reference =
            MessageReference::from((channel, DiscordMessageId::new(anchor.0 as u64)));
        channel
            .send_message(
                &self.http,
                CreateMessage::new().content(text).reference_message(reference),
            )
            .await
            .map_err(|e| Error::Transport(format!("discord send failed: {e}")))?;
        Ok(())
    }
}
