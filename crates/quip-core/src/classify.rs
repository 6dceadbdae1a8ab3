use std::collections::HashSet;

use crate::domain::{AccountId, ChatId, MessageId};
use crate::phrases::TriggerSet;

/// Normalized incoming message, produced by a platform adapter and consumed
/// once by classification.
#[derive(Clone, Debug)]
pub struct MessageEvent {
    pub chat_id: ChatId,
    pub message_id: MessageId,
    /// Message this one replies to, when the platform reports one.
    pub parent_id: Option<MessageId>,
    pub text: String,
    pub author_is_bot: bool,
    /// The bot's own account on this connection.
    pub self_id: AccountId,
    /// Accounts referenced by structured mentions.
    pub mentioned: HashSet<AccountId>,
    /// Whether the raw text spells out the bot's identity, as opposed to
    /// carrying only a structured mention. How this is detected is
    /// platform-specific, so the adapter supplies it.
    pub mentioned_in_text: bool,
    /// Whether this message replies to one of the bot's own messages.
    pub replied_to_self: bool,
    pub chat_is_private: bool,
}

/// Outcome of classifying one incoming message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReplyDecision {
    Skip,
    /// Reply, anchored to the given message.
    ReplyTo(MessageId),
}

/// Decide whether to respond to `event` and which message the reply should
/// be anchored to.
///
/// Total over all inputs and stateless. Precedence: automated authors are
/// never engaged; then mentions; then replies to the bot's own messages;
/// then trigger matches; then the private-chat fallback.
pub fn classify(event: &MessageEvent, triggers: &TriggerSet) -> ReplyDecision {
    if event.author_is_bot {
        return ReplyDecision::Skip;
    }

    if event.mentioned.contains(&event.self_id) {
        // A structured mention alone continues a thread on one of the bot's
        // own messages, so the reply anchors to the message itself. A mention
        // that also names the bot in free text is a summons: the reply
        // anchors to whatever the author was responding to, falling back to
        // the message when there is no parent.
        let anchor = if event.mentioned_in_text {
            event.parent_id.unwrap_or(event.message_id)
        } else {
            event.message_id
        };
        return ReplyDecision::ReplyTo(anchor);
    }

    if event.replied_to_self || triggers.matches(&event.text) || event.chat_is_private {
        return ReplyDecision::ReplyTo(event.message_id);
    }

    ReplyDecision::Skip
}
