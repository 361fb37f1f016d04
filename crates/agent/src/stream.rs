//! Output sinks for streamed agent progress.
//!
//! `push` is synchronous and never blocks the agent loop. A sink whose
//! consumer has gone away silently drops further events.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::debug;

use crate::stream_event::AgentStreamEvent;

/// An ordered, one-way channel for [`AgentStreamEvent`]s.
pub trait StreamSink: Send + Sync {
    fn push(&self, event: AgentStreamEvent);
}

impl<T: StreamSink + ?Sized> StreamSink for Arc<T> {
    fn push(&self, event: AgentStreamEvent) {
        (**self).push(event)
    }
}

/// Forwards events over an unbounded tokio channel.
///
/// The consumer drains the paired [`UnboundedReceiverStream`], usually in
/// its own task.
#[derive(Debug)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<AgentStreamEvent>,
    disconnected: AtomicBool,
}

impl ChannelSink {
    pub fn channel() -> (Self, UnboundedReceiverStream<AgentStreamEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                tx,
                disconnected: AtomicBool::new(false),
            },
            UnboundedReceiverStream::new(rx),
        )
    }
}

impl StreamSink for ChannelSink {
    fn push(&self, event: AgentStreamEvent) {
        if self.tx.send(event).is_err() && !self.disconnected.swap(true, Ordering::Relaxed) {
            debug!("Stream consumer disconnected, dropping further events");
        }
    }
}

/// Keeps every event in memory.
#[derive(Debug, Default)]
pub struct CollectingSink {
    events: Mutex<Vec<AgentStreamEvent>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AgentStreamEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Outputs of the `step` events, in order.
    pub fn step_outputs(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                AgentStreamEvent::Step { output, .. } => Some(output),
                _ => None,
            })
            .collect()
    }
}

impl StreamSink for CollectingSink {
    fn push(&self, event: AgentStreamEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl StreamSink for NullSink {
    fn push(&self, _event: AgentStreamEvent) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_stream::StreamExt;

    fn step(n: u32) -> AgentStreamEvent {
        AgentStreamEvent::Step {
            agent: "a".into(),
            step: n,
            output: format!("out {n}"),
        }
    }

    #[tokio::test]
    async fn channel_sink_preserves_order() {
        let (sink, stream) = ChannelSink::channel();
        for n in 1..=3 {
            sink.push(step(n));
        }
        drop(sink);

        let received: Vec<_> = stream.collect().await;
        assert_eq!(received, vec![step(1), step(2), step(3)]);
    }

    #[tokio::test]
    async fn channel_sink_survives_dropped_consumer() {
        let (sink, stream) = ChannelSink::channel();
        drop(stream);
        sink.push(step(1));
        sink.push(step(2));
        assert!(sink.disconnected.load(Ordering::Relaxed));
    }

    #[test]
    fn collecting_sink_projects_steps() {
        let sink = CollectingSink::new();
        sink.push(step(1));
        sink.push(AgentStreamEvent::Nudge {
            agent: "a".into(),
            step: 1,
        });
        sink.push(step(2));
        assert_eq!(sink.events().len(), 3);
        assert_eq!(sink.step_outputs(), vec!["out 1", "out 2"]);
    }

    #[test]
    fn arc_sink_delegates() {
        let sink = Arc::new(CollectingSink::new());
        let shared: Arc<dyn StreamSink> = sink.clone();
        shared.push(step(7));
        assert_eq!(sink.step_outputs(), vec!["out 7"]);
    }
}
