//! Spec sessions: the clarification → drafting → revision workflow and the
//! Claude client it runs on.

mod client;
mod spec_writer;
mod state;

pub use client::{AgentBackend, ClaudeClient, StreamCallback};
pub use spec_writer::{ClaudeSessionFactory, SessionFactory, SpecSession, SpecWriter};
pub use state::{Operation, Outcome, SessionPhase, SessionToken};
