//! Agent protocol support.
//!
//! `claude` holds everything specific to the Claude CLI: locating the binary,
//! building its command line and parsing its stream-json output. `event` holds
//! the agent-neutral messages forwarded to callers.

pub mod claude;
pub mod event;

pub use event::{ContentKind, StreamMessage, StreamRole};
