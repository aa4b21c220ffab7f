//! Claude CLI support: binary resolution, spawn configuration and the
//! stream-json parser.

pub mod binary;
mod parser;
pub mod spawn;
mod types;

pub use binary::{find_claude_binary, resolve_claude_binary, BinaryProbe, SystemProbe};
pub use parser::{process_stream, project_record, ClaudeParser, LineOutcome};
pub use spawn::{ClaudeConfig, SessionArg};
pub use types::*;
