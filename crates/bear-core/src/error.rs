//! Error taxonomy for the session driver.
//!
//! Every failure surfaces as one [`AgentError`] variant so callers can decide
//! whether to retry, prompt the user, or abort. Nothing in this crate retries
//! on its own; [`AgentError::kind`] is the only classification offered.

use std::io;
use std::time::Duration;

use thiserror::Error;

use crate::session::SessionPhase;
use crate::workspace::WorkspaceError;

/// Coarse grouping of [`AgentError`] variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The agent binary could not be located.
    Resolution,
    /// The agent process could not be started.
    Launch,
    /// The process ran but its output was unusable.
    Protocol,
    /// The agent reported a failed turn, or its payload broke the schema.
    Agent,
    /// An operation was called in the wrong session phase.
    State,
    /// The turn was cancelled or timed out.
    Aborted,
    /// The workspace path was rejected.
    Workspace,
}

#[derive(Error, Debug)]
pub enum AgentError {
    #[error("claude binary not found in PATH or any fallback location")]
    BinaryNotFound,

    #[error("failed to start claude process: {0}")]
    ProcessStartFailed(#[source] io::Error),

    #[error("failed to prepare system prompt file: {0}")]
    PromptFile(#[source] io::Error),

    #[error("claude process exited with error (code {code:?}): {stderr}")]
    ProcessExit { code: Option<i32>, stderr: String },

    #[error("failed to parse stream JSON line: {line}")]
    StreamParse {
        line: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("stream read error: {0}")]
    StreamRead(#[source] io::Error),

    #[error("stream ended without a result message")]
    NoResultReceived,

    #[error(
        "claude code CLI error: authentication failed: run `/login` first in the CLI \
         or set ANTHROPIC_API_KEY environment variable"
    )]
    AuthenticationFailed,

    #[error("claude code CLI error: {0}")]
    Cli(String),

    #[error("unexpected stream record type for projection: {0}")]
    UnexpectedRecord(String),

    #[error("result returned an error (subtype={subtype}, is_error={is_error}): {result}")]
    ResultError {
        subtype: String,
        is_error: bool,
        result: String,
    },

    #[error("structured output does not satisfy schema {schema}: {reason}")]
    SchemaViolation { schema: &'static str, reason: String },

    #[error("failed to build JSON schema for {schema}: {reason}")]
    Schema { schema: &'static str, reason: String },

    #[error("unexpected session state for {operation}: {phase}")]
    StateMismatch {
        operation: &'static str,
        phase: SessionPhase,
    },

    #[error("invocation cancelled")]
    Cancelled,

    #[error("invocation timed out after {0:?}")]
    Timeout(Duration),

    #[error("turn worker exited without reporting a result")]
    TurnLost,

    #[error(transparent)]
    Workspace(#[from] WorkspaceError),
}

impl AgentError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::BinaryNotFound => ErrorKind::Resolution,
            Self::ProcessStartFailed(_) | Self::PromptFile(_) | Self::ProcessExit { .. } => {
                ErrorKind::Launch
            }
            Self::StreamParse { .. }
            | Self::StreamRead(_)
            | Self::NoResultReceived
            | Self::AuthenticationFailed
            | Self::Cli(_)
            | Self::UnexpectedRecord(_)
            | Self::TurnLost => ErrorKind::Protocol,
            Self::ResultError { .. } | Self::SchemaViolation { .. } | Self::Schema { .. } => {
                ErrorKind::Agent
            }
            Self::StateMismatch { .. } => ErrorKind::State,
            Self::Cancelled | Self::Timeout(_) => ErrorKind::Aborted,
            Self::Workspace(_) => ErrorKind::Workspace,
        }
    }
}
