//! Reply pipeline orchestration and event delivery.

pub mod dispatcher;
pub mod orchestrator;

pub use dispatcher::{DispatchStats, ReplyDispatcher};
pub use orchestrator::{ReplyOrchestrator, ReplyOutcome, ReplyStage, SkipReason};
