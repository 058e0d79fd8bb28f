//! Event channel between a running pipeline and its caller
//!
//! One channel is created per pipeline run. The producer half ([`EventSink`])
//! is owned by the runner and lent to each step for the duration of its
//! `run` call; the consumer half ([`EventStream`]) is handed to the caller and
//! can be drained while a step is still suspended on I/O.
//!
//! The channel is unbounded so that emitting never blocks a step. It closes
//! when the sink is dropped, which the runner only does once the run's
//! outcome is known; events already buffered are still delivered after that.

use super::event::ProgressEvent;
use crate::observability::metrics::metrics;
use futures::Stream;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tracing::trace;

/// Create a fresh channel for one pipeline run
pub fn event_channel() -> (EventSink, EventStream) {
    let (sender, receiver) = mpsc::unbounded_channel();
    (EventSink { sender }, EventStream { receiver })
}

/// Producer side of the event channel.
///
/// Deliberately not `Clone`: steps only ever see `&EventSink`, so no handle
/// can outlive the step invocation it was lent to.
#[derive(Debug)]
pub struct EventSink {
    sender: mpsc::UnboundedSender<ProgressEvent>,
}

impl EventSink {
    /// Emit an event. Never blocks; events sent after the consumer went away
    /// are dropped.
    pub fn emit(&self, event: ProgressEvent) {
        metrics().record_event(event.kind());
        if let Err(mpsc::error::SendError(event)) = self.sender.send(event) {
            trace!(kind = event.kind(), "Dropping progress event, consumer gone");
        }
    }

    /// Alias of [`EventSink::emit`] matching the channel vocabulary
    pub fn send(&self, event: ProgressEvent) {
        self.emit(event);
    }

    /// True once the consumer half has been dropped
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

/// Consumer side of the event channel: a lazy, finite sequence of events
#[derive(Debug)]
pub struct EventStream {
    receiver: mpsc::UnboundedReceiver<ProgressEvent>,
}

impl EventStream {
    /// Next event, or `None` once the run has finished and the buffer is empty
    pub async fn recv(&mut self) -> Option<ProgressEvent> {
        self.receiver.recv().await
    }

    /// Drain every remaining event until the channel closes
    pub async fn collect_remaining(mut self) -> Vec<ProgressEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.receiver.recv().await {
            events.push(event);
        }
        events
    }
}

impl Stream for EventStream {
    type Item = ProgressEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}
