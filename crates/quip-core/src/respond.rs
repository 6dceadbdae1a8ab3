use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::classify::{classify, MessageEvent, ReplyDecision};
use crate::phrases::{ReplyPool, TriggerSet};
use crate::ports::ReplySender;

/// Per-identity dispatch: classifies incoming events and answers eligible
/// ones with a line from the reply pool.
///
/// The pool sits behind a mutex because platform clients may deliver events
/// from concurrent tasks, and the recent-reply window is only correct under
/// serialized access. One responder per (bot, platform) identity; responders
/// are never shared.
pub struct Responder {
    name: String,
    triggers: TriggerSet,
    pool: Mutex<ReplyPool>,
}

impl Responder {
    pub fn new(name: impl Into<String>, triggers: TriggerSet, pool: ReplyPool) -> Self {
        Self {
            name: name.into(),
            triggers,
            pool: Mutex::new(pool),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Handle one incoming message event.
    ///
    /// Send failures are logged and dropped; a flaky transport must not take
    /// the event loop down or block later events.
    pub async fn handle(&self, event: MessageEvent, sender: &dyn ReplySender) {
        debug!(
            bot = %self.name,
            chat = event.chat_id.0,
            mentioned = event.mentioned.contains(&event.self_id),
            mentioned_in_text = event.mentioned_in_text,
            "received message: {}",
            event.text
        );

        let anchor = match classify(&event, &self.triggers) {
            ReplyDecision::Skip => return,
            ReplyDecision::ReplyTo(anchor) => anchor,
        };

        let text = {
            let mut pool = self.pool.lock().await;
            pool.select_reply().to_string()
        };

        debug!(bot = %self.name, chat = event.chat_id.0, anchor = anchor.0, "replying with {text}");

        if let Err(e) = sender.send_reply(event.chat_id, &text, anchor).await {
            warn!(bot = %self.name, chat = event.chat_id.0, error = %e, "failed to send reply");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::{Arc, Mutex as StdMutex};

    use async_trait::async_trait;
    use rand::{rngs::StdRng, SeedableRng};

    use super::*;
    use crate::domain::{AccountId, ChatId, MessageId};
    use crate::errors::Error;

    #[derive(Default)]
    struct RecordingSender {
        sent: StdMutex<Vec<(ChatId, String, MessageId)>>,
        fail: bool,
    }

    #[async_trait]
    impl ReplySender for RecordingSender {
        async fn send_reply(
            &self,
            chat_id: ChatId,
            text: &str,
            anchor: MessageId,
        ) -> crate::Result<()> {
            self.sent
                .lock()
                .unwrap()
                .push((chat_id, text.to_string(), anchor));
            if self.fail {
                return Err(Error::Transport("wire down".to_string()));
            }
            Ok(())
        }
    }

    fn responder(replies: Vec<String>, window: usize) -> Responder {
        let pool = ReplyPool::with_rng(replies, window, StdRng::seed_from_u64(0)).unwrap();
        Responder::new("test-bot", TriggerSet::new(["ping"]), pool)
    }

    fn private_event() -> MessageEvent {
        MessageEvent {
            chat_id: ChatId(7),
            message_id: MessageId(100),
            parent_id: None,
            text: "hi".to_string(),
            author_is_bot: false,
            self_id: AccountId(42),
            mentioned: HashSet::new(),
            mentioned_in_text: false,
            replied_to_self: false,
            chat_is_private: true,
        }
    }

    fn public_event() -> MessageEvent {
        MessageEvent {
            chat_is_private: false,
            ..private_event()
        }
    }

    #[tokio::test]
    async fn eligible_events_produce_one_anchored_reply() {
        let responder = responder(vec!["ack".to_string()], 0);
        let sender = RecordingSender::default();

        responder.handle(private_event(), &sender).await;

        let sent = sender.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0], (ChatId(7), "ack".to_string(), MessageId(100)));
    }

    #[tokio::test]
    async fn skipped_events_send_nothing() {
        let responder = responder(vec!["ack".to_string()], 0);
        let sender = RecordingSender::default();

        responder.handle(public_event(), &sender).await;

        assert!(sender.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn send_failures_do_not_stop_later_events() {
        let responder = responder(vec!["ack".to_string()], 0);
        let sender = RecordingSender {
            fail: true,
            ..Default::default()
        };

        responder.handle(private_event(), &sender).await;
        responder.handle(private_event(), &sender).await;

        assert_eq!(sender.sent.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn concurrent_events_serialize_on_the_pool() {
        let replies = (0..5).map(|i| format!("line-{i}")).collect();
        let responder = Arc::new(responder(replies, 3));
        let sender = Arc::new(RecordingSender::default());

        let mut tasks = tokio::task::JoinSet::new();
        for _ in 0..50 {
            let responder = responder.clone();
            let sender = sender.clone();
            tasks.spawn(async move {
                responder.handle(private_event(), sender.as_ref()).await;
            });
        }
        while tasks.join_next().await.is_some() {}

        assert_eq!(sender.sent.lock().unwrap().len(), 50);
    }
}
