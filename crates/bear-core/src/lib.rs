//! # bear-core
//!
//! Session driver for Bear, which turns a rough feature request into an
//! approved specification by running the Claude CLI unattended.
//!
//! This crate is UI-agnostic and can be used by:
//! - the `bear` command-line driver
//! - any UI loop that can pull messages from a channel
//!
//! ## Key Concepts
//!
//! - **Invocation**: one run of the `claude` process for one conversational turn
//! - **StreamMessage**: an assistant/user record reduced to its first content block
//! - **Bridge**: a bounded channel carrying a turn's messages to a consumer loop
//! - **SpecSession**: the clarification → drafting → revision state machine

pub mod agents;
pub mod bridge;
pub mod config;
pub mod error;
pub mod invocation;
pub mod logging;
pub mod model;
pub mod paths;
pub mod prompts;
pub mod schema;
pub mod session;
pub mod spawn;
pub mod workspace;

// Re-export commonly used types
pub use agents::event::{ContentKind, StreamMessage, StreamRole};
pub use bridge::{spawn_turn, BridgeMessage, EventSink, TurnStream};
pub use config::AgentSettings;
pub use error::{AgentError, ErrorKind};
pub use invocation::CancelToken;
pub use logging::SessionLog;
pub use model::{Effect, ModelMsg, TurnModel, TurnState};
pub use session::{
    ClaudeSessionFactory, SessionFactory, SessionPhase, SpecSession, SpecWriter, StreamCallback,
};
