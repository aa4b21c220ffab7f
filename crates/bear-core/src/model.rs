//! Message-driven model of one streamed turn.
//!
//! A UI loop feeds every bridge message (and user interrupts) into
//! [`TurnModel::update`] and acts on the returned [`Effect`]. All transitions
//! live in the single `match` inside `update`:
//!
//! | state               | message              | next state  | effect        |
//! |---------------------|----------------------|-------------|---------------|
//! | Waiting / Streaming | `Bridge(Event)`      | Streaming   | `WaitForNext` |
//! | Waiting / Streaming | `Bridge(Finished)`   | Finished    | `Quit`        |
//! | Waiting / Streaming | `Bridge(Failed)`     | Failed      | `Quit`        |
//! | Waiting / Streaming | `Bridge(Failed(Cancelled))` | Cancelled | `Quit` |
//! | Waiting / Streaming | `Interrupt`          | Cancelled   | `Quit`        |
//! | Waiting / Streaming | `Closed`             | Failed (`TurnLost`) | `Quit` |
//! | terminal            | anything             | unchanged   | `None`        |
//!
//! Rendering is left to the caller; the model only keeps the last few display
//! lines and the outcome.

use std::collections::VecDeque;

use crate::bridge::BridgeMessage;
use crate::error::AgentError;

/// Display lines kept for the live view.
pub const WINDOW_LINES: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    /// Nothing received yet.
    Waiting,
    Streaming,
    Finished,
    Failed,
    Cancelled,
}

impl TurnState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Finished | Self::Failed | Self::Cancelled)
    }
}

/// Input to the model.
#[derive(Debug)]
pub enum ModelMsg<T> {
    Bridge(BridgeMessage<T>),
    /// The user asked to stop the turn.
    Interrupt,
    /// The bridge closed without a terminal message, i.e. the turn thread
    /// died.
    Closed,
}

/// What the loop should do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Re-arm the wait on the bridge.
    WaitForNext,
    /// Leave the loop.
    Quit,
    None,
}

#[derive(Debug)]
pub struct TurnModel<T> {
    state: TurnState,
    window: VecDeque<String>,
    events: usize,
    outcome: Option<Result<T, AgentError>>,
}

impl<T> Default for TurnModel<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> TurnModel<T> {
    pub fn new() -> Self {
        Self {
            state: TurnState::Waiting,
            window: VecDeque::with_capacity(WINDOW_LINES),
            events: 0,
            outcome: None,
        }
    }

    pub fn update(&mut self, msg: ModelMsg<T>) -> Effect {
        if self.state.is_terminal() {
            return Effect::None;
        }

        match msg {
            ModelMsg::Bridge(BridgeMessage::Event(message)) => {
                self.events += 1;
                for line in message.display_lines(WINDOW_LINES) {
                    if self.window.len() == WINDOW_LINES {
                        self.window.pop_front();
                    }
                    self.window.push_back(line);
                }
                self.state = TurnState::Streaming;
                Effect::WaitForNext
            }
            ModelMsg::Bridge(BridgeMessage::Finished(value)) => {
                self.finish(TurnState::Finished, Ok(value))
            }
            ModelMsg::Bridge(BridgeMessage::Failed(AgentError::Cancelled)) => {
                self.finish(TurnState::Cancelled, Err(AgentError::Cancelled))
            }
            ModelMsg::Bridge(BridgeMessage::Failed(e)) => self.finish(TurnState::Failed, Err(e)),
            ModelMsg::Interrupt => self.finish(TurnState::Cancelled, Err(AgentError::Cancelled)),
            ModelMsg::Closed => self.finish(TurnState::Failed, Err(AgentError::TurnLost)),
        }
    }

    fn finish(&mut self, state: TurnState, outcome: Result<T, AgentError>) -> Effect {
        self.state = state;
        self.outcome = Some(outcome);
        Effect::Quit
    }

    pub fn state(&self) -> TurnState {
        self.state
    }

    /// The most recent display lines, oldest first.
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.window.iter().map(String::as_str)
    }

    /// Number of stream events received.
    pub fn events(&self) -> usize {
        self.events
    }

    /// The turn's result, available once the state is terminal.
    pub fn take_outcome(&mut self) -> Option<Result<T, AgentError>> {
        self.outcome.take()
    }
}
