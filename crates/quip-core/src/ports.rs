use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::{
    domain::{ChatId, MessageId},
    Result,
};

/// Outbound side of a platform adapter: deliver one reply anchored to an
/// existing message.
///
/// Fire-and-forget from the core's perspective; the result is reported for
/// logging only, and no retry or backoff happens at this layer.
#[async_trait]
pub trait ReplySender: Send + Sync {
    async fn send_reply(&self, chat_id: ChatId, text: &str, anchor: MessageId) -> Result<()>;
}

/// A running chat connection for one bot identity on one platform.
///
/// `run` blocks until the cancellation token fires or the connection fails
/// fatally. Implementations own their platform client, normalize native
/// events into [`crate::classify::MessageEvent`]s and feed them to the bot's
/// responder, suppressing anything authored by the bot's own account.
#[async_trait]
pub trait BotConnection: Send + Sync {
    /// `name/platform` label used in logs.
    fn label(&self) -> &str;

    async fn run(&self, cancel: CancellationToken) -> Result<()>;
}
