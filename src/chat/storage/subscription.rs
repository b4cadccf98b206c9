//! "New entry" notification channel.

use std::sync::{Mutex, PoisonError};

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::chat::core::message::ChatMessage;

/// Receiving end of the new-entry channel.
#[derive(Debug)]
pub struct MessageSubscription {
    rx: UnboundedReceiver<ChatMessage>,
}

impl MessageSubscription {
    /// Wait for the next appended entry.
    ///
    /// Returns `None` once the store that issued the subscription is gone.
    pub async fn next(&mut self) -> Option<ChatMessage> {
        self.rx.recv().await
    }

    /// Take an already delivered entry without waiting.
    pub fn try_next(&mut self) -> Option<ChatMessage> {
        self.rx.try_recv().ok()
    }
}

/// Fan-out set of live subscriptions held by a store.
#[derive(Debug, Default)]
pub struct SubscriberSet {
    senders: Mutex<Vec<UnboundedSender<ChatMessage>>>,
}

impl SubscriberSet {
    /// Create an empty set.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            senders: Mutex::new(Vec::new()),
        }
    }

    /// Open a new subscription.
    #[must_use]
    pub fn subscribe(&self) -> MessageSubscription {
        let (tx, rx) = mpsc::unbounded_channel();
        self.senders
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        MessageSubscription { rx }
    }

    /// Deliver `message` to every live subscription, pruning closed ones.
    ///
    /// Returns the number of subscriptions reached.
    #[must_use]
    pub fn publish(&self, message: &ChatMessage) -> usize {
        let mut senders = self.senders.lock().unwrap_or_else(PoisonError::into_inner);
        senders.retain(|tx| tx.send(message.clone()).is_ok());
        senders.len()
    }
}
