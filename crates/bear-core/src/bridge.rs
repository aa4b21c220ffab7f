//! Bridge from a blocking turn to a pull-based consumer.
//!
//! The agent turn runs on its own thread and pushes messages into a bounded
//! `tokio::sync::mpsc` channel; the consumer pulls them one at a time, either
//! from an async loop ([`TurnStream::next`]) or from a plain thread
//! ([`TurnStream::blocking_next`]).
//!
//! # Example
//!
//! ```rust
//! use bear_core::bridge::{spawn_turn, BridgeMessage};
//!
//! let mut stream = spawn_turn(8, |_sink| Ok::<_, bear_core::AgentError>(42));
//! assert!(matches!(stream.blocking_next(), Some(BridgeMessage::Finished(42))));
//! assert!(stream.blocking_next().is_none());
//! ```
//!
//! Delivery order equals emission order. When the channel is full the
//! producer blocks until the consumer catches up.

use std::thread;

use tokio::sync::mpsc;

use crate::agents::event::StreamMessage;
use crate::error::AgentError;
use crate::invocation::CancelToken;

/// One value carried across the bridge.
#[derive(Debug)]
pub enum BridgeMessage<T> {
    /// A forwarded stream message.
    Event(StreamMessage),
    /// The turn completed with this result. Always the last message.
    Finished(T),
    /// The turn failed. Always the last message.
    Failed(AgentError),
}

impl<T> BridgeMessage<T> {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Event(_))
    }
}

/// Producer side handed to the turn's work function.
///
/// Clones feed the same channel, so a clone can be moved into a `'static`
/// stream callback.
#[derive(Debug)]
pub struct EventSink<T> {
    tx: mpsc::Sender<BridgeMessage<T>>,
}

impl<T> Clone for EventSink<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<T> EventSink<T> {
    /// Forward one message, blocking while the channel is full.
    ///
    /// Returns false once the consumer is gone; further messages are dropped.
    pub fn emit(&self, message: StreamMessage) -> bool {
        self.tx.blocking_send(BridgeMessage::Event(message)).is_ok()
    }
}

/// Consumer side of one turn.
#[derive(Debug)]
pub struct TurnStream<T> {
    rx: mpsc::Receiver<BridgeMessage<T>>,
    cancel: Option<CancelToken>,
}

impl<T> TurnStream<T> {
    /// Fire `cancel` when the stream is aborted.
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Wait for the next message. `None` after the terminal message.
    pub async fn next(&mut self) -> Option<BridgeMessage<T>> {
        self.rx.recv().await
    }

    /// Blocking variant of [`TurnStream::next`] for non-async callers.
    ///
    /// Must not be called from inside an async runtime.
    pub fn blocking_next(&mut self) -> Option<BridgeMessage<T>> {
        self.rx.blocking_recv()
    }

    /// Give up on the turn: fire the cancel token and close the channel.
    ///
    /// Messages already queued can still be drained.
    pub fn abort(&mut self) {
        if let Some(ref cancel) = self.cancel {
            cancel.cancel();
        }
        self.rx.close();
    }
}

/// Run `work` on a dedicated thread and stream its events and result.
///
/// `work` receives an [`EventSink`] for forwarded messages; its return value
/// becomes the terminal [`BridgeMessage::Finished`] or
/// [`BridgeMessage::Failed`].
pub fn spawn_turn<T, F>(capacity: usize, work: F) -> TurnStream<T>
where
    T: Send + 'static,
    F: FnOnce(&EventSink<T>) -> Result<T, AgentError> + Send + 'static,
{
    let (tx, rx) = mpsc::channel(capacity.max(1));

    thread::spawn(move || {
        let sink = EventSink { tx };
        let terminal = match work(&sink) {
            Ok(value) => BridgeMessage::Finished(value),
            Err(e) => BridgeMessage::Failed(e),
        };
        if sink.tx.blocking_send(terminal).is_err() {
            log::debug!("turn finished after its consumer went away");
        }
    });

    TurnStream { rx, cancel: None }
}

// ============================================================================
// TESTS
// ============================================================================
