//! The agent execution loop for Taskloom.
//!
//! An [`Agent`] follows a **Reason → Act → Check** cycle:
//!
//! 1. **Reason** via its [`StepStrategy`] (final answer or tool calls)
//! 2. **Act**: dispatch each tool call against its registry
//! 3. **Check**: special tools finish the run, repeated responses are
//!    nudged by the [`StuckDetector`], cancellation and the step budget stop it
//!
//! Progress is pushed to a [`StreamSink`] as [`AgentStreamEvent`]s and every
//! run ends with a [`RunSummary`].

pub mod agent;
pub mod strategy;
pub mod stream;
pub mod stream_event;
pub mod stuck;
pub mod summary;

#[cfg(any(test, feature = "test-support"))]
pub mod test_helpers;

pub use agent::Agent;
pub use strategy::{DirectAnswerStrategy, StepContext, StepStrategy, ToolCallStrategy};
pub use stream::{ChannelSink, CollectingSink, NullSink, StreamSink};
pub use stream_event::AgentStreamEvent;
pub use stuck::{NUDGE_PROMPT, StuckDetector};
pub use summary::{RunSummary, Termination};
pub use tokio_util::sync::CancellationToken;
