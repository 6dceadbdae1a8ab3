//! Telegram adapter (teloxide).
//!
//! Normalizes Telegram updates into `quip-core` message events and implements
//! the reply-send port over the Bot API.

use std::{collections::HashSet, sync::Arc, time::Duration};

use async_trait::async_trait;
use teloxide::{
    dispatching::Dispatcher,
    dptree,
    prelude::*,
    types::{MessageEntity, MessageEntityKind},
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

/// One Telegram long-polling connection for one bot identity.
pub struct TelegramConnection {
    label: String,
    token: String,
    responder: Arc<Responder>,
}

impl TelegramConnection {
    pub fn new(token: impl Into<String>, responder: Arc<Responder>) -> Self {
        let label = format!("{}/telegram", responder.name());
        Self {
            label,
            token: token.into(),
            responder,
        }
    }
}

#[async_trait]
impl BotConnection for TelegramConnection {
    fn label(&self) -> &str {
        &self.label
    }

    async fn run(&self, cancel: CancellationToken) -> Result<()> {
        let bot = Bot::new(self.token.clone());

        // Failing to resolve our own identity means the token is unusable;
        // that is fatal for this connection only.
        let me = bot
            .get_me()
            .await
            .map_err(|e| Error::Transport(format!("get_me failed: {e}")))?;
        info!(bot = %self.label, username = me.username(), "telegram connection up");

        let ctx = Arc::new(UpdateContext {
            responder: self.responder.clone(),
            sender: TelegramSender { bot: bot.clone() },
            self_id: AccountId(me.user.id.0),
            username: me.username().to_string(),
        });

        let handler = Update::filter_message().endpoint(handle_message);
        let mut dispatcher = Dispatcher::builder(bot, handler)
            .dependencies(dptree::deps![ctx])
            .build();

        // Bridge the shared cancellation signal into teloxide's own shutdown
        // token so a cancelled process stops polling promptly.
        let shutdown = dispatcher.shutdown_token();
        let stopper = tokio::spawn(async move {
            cancel.cancelled().await;
            loop {
                match shutdown.shutdown() {
                    Ok(done) => {
                        done.await;
                        break;
                    }
                    // Dispatching has not started yet; retry shortly.
                    Err(_) => tokio::time::sleep(Duration::from_millis(100)).await,
                }
            }
        });

        dispatcher.dispatch().await;
        stopper.abort();
        Ok(())
    }
}

struct UpdateContext {
    responder: Arc<Responder>,
    sender: TelegramSender,
    self_id: AccountId,
    username: String,
}

async fn handle_message(msg: Message, ctx: Arc<UpdateContext>) -> ResponseResult<()> {
    let Some(event) = normalize(&msg, &ctx) else {
        return Ok(());
    };
    ctx.responder.handle(event, &ctx.sender).await;
    Ok(())
}

/// Map a Telegram message onto the core event model. Returns `None` for
/// updates with no sender (channel posts and service messages).
fn normalize(msg: &Message, ctx: &UpdateContext) -> Option<MessageEvent> {
    let from = msg.from()?;
    let text = msg
        .text()
        .or_else(|| msg.caption())
        .unwrap_or_default()
        .to_string();

    let mentioned_self = msg
        .entities()
        .map(|entities| mentions_username(&text, entities, &ctx.username))
        .unwrap_or(false);
    let mut mentioned = HashSet::new();
    if mentioned_self {
        mentioned.insert(ctx.self_id);
    }

    let parent = msg.reply_to_message();
    let replied_to_self = parent
        .and_then(|p| p.from())
        .map(|u| AccountId(u.id.0) == ctx.self_id)
        .unwrap_or(false);

    Some(MessageEvent {
        chat_id: ChatId(msg.chat.id.0),
        message_id: MessageId(msg.id.0 as i64),
        parent_id: parent.map(|p| MessageId(p.id.0 as i64)),
        text,
        author_is_bot: from.is_bot,
        self_id: ctx.self_id,
        mentioned,
        // A Telegram mention is an `@username` span in the message body, so a
        // structured mention is always also a textual one.
        mentioned_in_text: mentioned_self,
        replied_to_self,
        chat_is_private: msg.chat.is_private(),
    })
}

/// True if any mention entity in `text` names `username`.
///
/// Entity offsets count UTF-16 code units, so the text is re-encoded before
/// slicing.
fn mentions_username(text: &str, entities: &[MessageEntity], username: &str) -> bool {
    let units: Vec<u16> = text.encode_utf16().collect();
    entities
        .iter()
        .filter(|e| matches!(e.kind, MessageEntityKind::Mention))
        .any(|e| {
            let Some(range) = units.get(e.offset..e.offset + e.length) else {
                return false;
            };
            let Ok(span) = String::from_utf16(range) else {
                return false;
            };
            span.strip_prefix('@')
                .map(|name| name.eq_ignore_ascii_case(username))
                .unwrap_or(false)
        })
}

struct TelegramSender {
    bot: Bot,
}

#[async_trait]
impl ReplySender for TelegramSender {
    async fn send_reply(&self, chat_id: ChatId, text: &str, anchor: MessageId) -> Result<()> {
        self.bot
            .send_message(teloxide::types::ChatId(chat_id.0), text.to_string())
            .reply_to_message_id(teloxide::types::MessageId(anchor.0 as i32))
            .await
            .map_err(|e| Error::Transport(format!("telegram send failed: {e}")))?;
        Ok(())
    }
}
