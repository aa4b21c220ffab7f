//! Session identity and the phase state machine.
//!
//! ```text
//! Begin ──► AwaitingAnswers ◄─┐
//!   │            │            │ (more questions)
//!   │            └────────────┘
//!   │            │ (no questions left)
//!   └──────► NoQuestionsPending ──► SpecDrafting ──► AwaitingFeedback ──► Approved
//!                                                      │      ▲
//!                                                      └──────┘ (revise)
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AgentError;

/// Continuity token passed to the agent with `--session-id` / `--resume`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionToken(pub String);

impl SessionToken {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionToken {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where a spec session stands in the conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionPhase {
    Begin,
    AwaitingAnswers,
    NoQuestionsPending,
    /// A drafting turn is in flight.
    SpecDrafting,
    AwaitingFeedback,
    Approved,
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Begin => "Begin",
            Self::AwaitingAnswers => "AwaitingAnswers",
            Self::NoQuestionsPending => "NoQuestionsPending",
            Self::SpecDrafting => "SpecDrafting",
            Self::AwaitingFeedback => "AwaitingFeedback",
            Self::Approved => "Approved",
        };
        f.write_str(name)
    }
}

/// Public operations of a spec session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    InitialQuestions,
    NextQuestions,
    DraftSpec,
    ReviseSpec,
    ApproveSpec,
}

impl Operation {
    pub fn name(self) -> &'static str {
        match self {
            Self::InitialQuestions => "get_initial_questions",
            Self::NextQuestions => "get_next_questions",
            Self::DraftSpec => "draft_spec",
            Self::ReviseSpec => "revise_spec",
            Self::ApproveSpec => "approve_spec",
        }
    }

    /// The only phase in which the operation may start.
    pub fn required_phase(self) -> SessionPhase {
        match self {
            Self::InitialQuestions => SessionPhase::Begin,
            Self::NextQuestions => SessionPhase::AwaitingAnswers,
            Self::DraftSpec => SessionPhase::NoQuestionsPending,
            Self::ReviseSpec | Self::ApproveSpec => SessionPhase::AwaitingFeedback,
        }
    }
}

/// What a successful operation produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// A clarification turn returned this many questions.
    Questions(usize),
    /// A drafting or revision turn returned a spec.
    Spec,
    Approved,
}

impl SessionPhase {
    /// Fail unless `op` may run in this phase.
    pub fn expect(self, op: Operation) -> Result<(), AgentError> {
        if self == op.required_phase() {
            Ok(())
        } else {
            Err(AgentError::StateMismatch {
                operation: op.name(),
                phase: self,
            })
        }
    }

    /// The phase after `op` succeeded with `outcome`.
    pub fn after(op: Operation, outcome: Outcome) -> SessionPhase {
        match (op, outcome) {
            (_, Outcome::Questions(0)) => Self::NoQuestionsPending,
            (_, Outcome::Questions(_)) => Self::AwaitingAnswers,
            (_, Outcome::Spec) => Self::AwaitingFeedback,
            (Operation::ApproveSpec, Outcome::Approved) => Self::Approved,
            (op, Outcome::Approved) => op.required_phase(),
        }
    }

    pub fn is_finished(self) -> bool {
        self == Self::Approved
    }
}
