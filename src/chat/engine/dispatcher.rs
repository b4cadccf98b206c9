//! Delivery of new-entry events to the reply orchestrator.
//!
//! Every appended entry becomes its own tokio task; invocations share no
//! mutable state and run concurrently.

use std::sync::Arc;

use tokio::sync::Notify;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info, info_span, warn, Instrument};

use crate::chat::core::ids::InvocationId;
use crate::chat::core::message::ChatMessage;
use crate::chat::engine::orchestrator::{ReplyOrchestrator, ReplyOutcome};
use crate::chat::storage::subscription::MessageSubscription;

/// Counters from a dispatcher run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchStats {
    /// Entries received from the subscription.
    pub received: usize,
    /// Invocations that appended a reply.
    pub replied: usize,
    /// Invocations filtered out.
    pub skipped: usize,
    /// Invocations that failed.
    pub aborted: usize,
}

impl DispatchStats {
    const fn record(&mut self, outcome: &ReplyOutcome) {
        match outcome {
            ReplyOutcome::Replied(_) => self.replied += 1,
            ReplyOutcome::Skipped(_) => self.skipped += 1,
            ReplyOutcome::Aborted { .. } => self.aborted += 1,
        }
    }
}

/// Subscription-driven worker spawning one invocation per new entry.
pub struct ReplyDispatcher {
    orchestrator: Arc<ReplyOrchestrator>,
    subscription: MessageSubscription,
    shutdown: Arc<Notify>,
}

impl ReplyDispatcher {
    /// Create a dispatcher over an open subscription.
    #[must_use]
    pub fn new(orchestrator: Arc<ReplyOrchestrator>, subscription: MessageSubscription) -> Self {
        Self {
            orchestrator,
            subscription,
            shutdown: Arc::new(Notify::new()),
        }
    }

    /// Get a shutdown notifier to stop the dispatcher.
    #[must_use]
    pub fn shutdown_notifier(&self) -> Arc<Notify> {
        Arc::clone(&self.shutdown)
    }

    /// Spawn the dispatcher as a tokio task.
    #[must_use]
    pub fn spawn(self) -> JoinHandle<DispatchStats> {
        tokio::spawn(self.run())
    }

    /// Dispatch entries until shutdown is signaled or the store goes away.
    ///
    /// On shutdown, entries already delivered to the subscription are still
    /// dispatched, and in-flight invocations (plus the entries their replies
    /// produce) are awaited before returning.
    pub async fn run(mut self) -> DispatchStats {
        let mut stats = DispatchStats::default();
        let mut in_flight: JoinSet<ReplyOutcome> = JoinSet::new();
        info!("Reply dispatcher started");

        loop {
            tokio::select! {
                entry = self.subscription.next() => {
                    let Some(entry) = entry else {
                        info!("Message store closed, stopping dispatcher");
                        break;
                    };
                    stats.received += 1;
                    self.dispatch(&mut in_flight, entry);
                }
                Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                    Self::collect(&mut stats, joined);
                }
                () = self.shutdown.notified() => {
                    info!(in_flight = in_flight.len(), "Reply dispatcher shutting down");
                    break;
                }
            }
        }

        loop {
            while let Some(entry) = self.subscription.try_next() {
                stats.received += 1;
                self.dispatch(&mut in_flight, entry);
            }
            let Some(joined) = in_flight.join_next().await else {
                break;
            };
            Self::collect(&mut stats, joined);
        }

        debug!(?stats, "Reply dispatcher stopped");
        stats
    }

    fn dispatch(&self, in_flight: &mut JoinSet<ReplyOutcome>, entry: ChatMessage) {
        let orchestrator = Arc::clone(&self.orchestrator);
        let span = info_span!(
            "reply",
            invocation = %InvocationId::new(),
            key = %entry.key
        );
        in_flight.spawn(async move { orchestrator.handle(&entry).await }.instrument(span));
    }

    fn collect(stats: &mut DispatchStats, joined: Result<ReplyOutcome, tokio::task::JoinError>) {
        match joined {
            Ok(outcome) => stats.record(&outcome),
            Err(err) => {
                stats.aborted += 1;
                warn!(?err, "Reply invocation panicked or was cancelled");
            }
        }
    }
}
