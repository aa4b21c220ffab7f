//! The clarification → drafting → revision workflow.

use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::agents::claude::resolve_claude_binary;
use crate::config::AgentSettings;
use crate::error::AgentError;
use crate::invocation::CancelToken;
use crate::logging::SessionLog;
use crate::prompts;
use crate::schema::{ClarificationOutput, SpecOutput};
use crate::workspace::{validate_workspace_path, WorkspaceError};

use super::client::{AgentBackend, ClaudeClient, StreamCallback};
use super::state::{Operation, Outcome, SessionPhase};

/// Turns a rough user request into an approved specification.
///
/// Every operation checks the session phase first and fails with
/// [`AgentError::StateMismatch`] without touching the agent when called out
/// of order.
pub trait SpecWriter: Send {
    /// Receive intermediate messages of every following turn.
    fn set_stream_callback(&mut self, callback: Option<StreamCallback>);

    /// First clarification turn. An empty list means no questions are needed.
    fn get_initial_questions(&mut self, initial_request: &str) -> Result<Vec<String>, AgentError>;

    /// Follow-up clarification turn, called until it returns an empty list.
    fn get_next_questions(&mut self, answer: &str) -> Result<Vec<String>, AgentError>;

    /// Draft the spec from the request and all answers so far.
    fn draft_spec(&mut self) -> Result<String, AgentError>;

    /// Revise the current draft according to `feedback`.
    fn revise_spec(&mut self, feedback: &str) -> Result<String, AgentError>;

    /// Accept the current draft. No agent turn is run.
    fn approve_spec(&mut self) -> Result<(), AgentError>;

    fn phase(&self) -> SessionPhase;

    /// Token that aborts the running turn of this session.
    fn cancel_token(&self) -> CancelToken;
}

/// [`SpecWriter`] over an agent backend, by default the Claude CLI.
pub struct SpecSession<B = ClaudeClient> {
    backend: B,
    phase: SessionPhase,
    log: SessionLog,
}

impl<B: AgentBackend> SpecSession<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            phase: SessionPhase::Begin,
            log: SessionLog::disabled(),
        }
    }

    pub fn with_log(mut self, log: SessionLog) -> Self {
        self.log = log;
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    fn transition(&mut self, op: Operation, outcome: Outcome) {
        let next = SessionPhase::after(op, outcome);
        self.log.info(
            "STATE",
            &format!("{}: {} -> {}", op.name(), self.phase, next),
        );
        self.phase = next;
    }

    fn clarify(
        &mut self,
        op: Operation,
        user_prompt: &str,
    ) -> Result<Vec<String>, AgentError> {
        self.phase.expect(op)?;
        let output: ClarificationOutput = self
            .backend
            .query(prompts::clarification_system_prompt(), user_prompt)?;
        log::debug!("{} returned {} questions", op.name(), output.questions.len());
        self.transition(op, Outcome::Questions(output.questions.len()));
        Ok(output.questions)
    }

    fn write_spec(&mut self, op: Operation, user_prompt: &str) -> Result<String, AgentError> {
        let output: SpecOutput = self
            .backend
            .query(prompts::spec_system_prompt(), user_prompt)?;
        self.transition(op, Outcome::Spec);
        Ok(output.spec)
    }
}

impl<B: AgentBackend> SpecWriter for SpecSession<B> {
    fn set_stream_callback(&mut self, callback: Option<StreamCallback>) {
        self.backend.set_stream_callback(callback);
    }

    fn get_initial_questions(&mut self, initial_request: &str) -> Result<Vec<String>, AgentError> {
        let prompt = prompts::clarification_user_prompt_for_initial_request(initial_request);
        self.clarify(Operation::InitialQuestions, &prompt)
    }

    fn get_next_questions(&mut self, answer: &str) -> Result<Vec<String>, AgentError> {
        let prompt = prompts::clarification_user_prompt_for_answer(answer);
        self.clarify(Operation::NextQuestions, &prompt)
    }

    fn draft_spec(&mut self) -> Result<String, AgentError> {
        self.phase.expect(Operation::DraftSpec)?;
        self.phase = SessionPhase::SpecDrafting;
        let result = self.write_spec(Operation::DraftSpec, prompts::spec_user_prompt_for_draft());
        if result.is_err() {
            self.phase = SessionPhase::NoQuestionsPending;
        }
        result
    }

    fn revise_spec(&mut self, feedback: &str) -> Result<String, AgentError> {
        self.phase.expect(Operation::ReviseSpec)?;
        let prompt = prompts::spec_user_prompt_for_revision(feedback);
        self.write_spec(Operation::ReviseSpec, &prompt)
    }

    fn approve_spec(&mut self) -> Result<(), AgentError> {
        self.phase.expect(Operation::ApproveSpec)?;
        self.transition(Operation::ApproveSpec, Outcome::Approved);
        Ok(())
    }

    fn phase(&self) -> SessionPhase {
        self.phase
    }

    fn cancel_token(&self) -> CancelToken {
        self.backend.cancel_token()
    }
}

/// Creates isolated spec sessions.
pub trait SessionFactory {
    type Session: SpecWriter;

    /// A new session working in `working_dir`. An empty path means the
    /// current directory.
    fn new_session(&self, working_dir: &Path) -> Result<Self::Session, AgentError>;
}

/// Factory for sessions driven by the local Claude CLI.
#[derive(Debug, Clone, Default)]
pub struct ClaudeSessionFactory {
    api_key: Option<String>,
    settings: AgentSettings,
    binary_path: Option<PathBuf>,
}

impl ClaudeSessionFactory {
    pub fn new(api_key: Option<String>, settings: AgentSettings) -> Self {
        Self {
            api_key,
            settings,
            binary_path: None,
        }
    }

    /// Skip binary resolution and use `path`.
    pub fn with_binary_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.binary_path = Some(path.into());
        self
    }
}

impl SessionFactory for ClaudeSessionFactory {
    type Session = SpecSession<ClaudeClient>;

    fn new_session(&self, working_dir: &Path) -> Result<Self::Session, AgentError> {
        let binary_path = match self.binary_path {
            Some(ref path) => path.clone(),
            None => resolve_claude_binary()?,
        };

        let working_dir = if working_dir.as_os_str().is_empty() {
            std::env::current_dir().map_err(WorkspaceError::Stat)?
        } else {
            validate_workspace_path(working_dir)?;
            working_dir.to_path_buf()
        };

        let log = match self.settings.log_dir {
            Some(ref dir) => {
                let id = Uuid::new_v4().simple().to_string();
                SessionLog::open(dir, &id[..8])
            }
            None => SessionLog::disabled(),
        };
        log.info(
            "SESSION",
            &format!(
                "binary {} in {}",
                binary_path.display(),
                working_dir.display()
            ),
        );

        let client = ClaudeClient::new(
            self.api_key.clone(),
            working_dir,
            binary_path,
            self.settings.clone(),
        )
        .with_log(log.clone());
        Ok(SpecSession::new(client).with_log(log))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::event::{ContentKind, StreamMessage, StreamRole};
    use serde_json::{json, Value};
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    /// Backend that replays canned payloads and records the prompts it got.
    #[derive(Default)]
    struct ScriptedBackend {
        replies: VecDeque<Result<Value, AgentError>>,
        prompts: Arc<Mutex<Vec<(String, String)>>>,
        callback: Option<StreamCallback>,
        cancel: CancelToken,
    }

    impl ScriptedBackend {
        fn new(replies: Vec<Result<Value, AgentError>>) -> Self {
            Self {
                replies: replies.into(),
                ..Self::default()
            }
        }
    }

    impl AgentBackend for ScriptedBackend {
        fn query<T: crate::schema::OutputSchema>(
            &mut self,
            system_prompt: &str,
            user_prompt: &str,
        ) -> Result<T, AgentError> {
            self.prompts
                .lock()
                .unwrap()
                .push((system_prompt.to_string(), user_prompt.to_string()));
            if let Some(ref mut cb) = self.callback {
                cb(StreamMessage::new(StreamRole::Assistant, ContentKind::Text, "working"));
            }
            let reply = self.replies.pop_front().expect("no scripted reply left")?;
            T::decode(reply)
        }

        fn set_stream_callback(&mut self, callback: Option<StreamCallback>) {
            self.callback = callback;
        }

        fn cancel_token(&self) -> CancelToken {
            self.cancel.clone()
        }
    }

    fn questions(qs: &[&str]) -> Result<Value, AgentError> {
        Ok(json!({ "questions": qs }))
    }

    fn spec(text: &str) -> Result<Value, AgentError> {
        Ok(json!({ "spec": text }))
    }

    mod happy_path {
        use super::*;

        #[test]
        fn questions_then_draft_then_revise_then_approve() {
            let backend = ScriptedBackend::new(vec![
                questions(&["Which DB?"]),
                questions(&["Which version?"]),
                questions(&[]),
                spec("# Draft"),
                spec("# Revised"),
            ]);
            let recorded = Arc::clone(&backend.prompts);
            let mut session = SpecSession::new(backend);

            assert_eq!(
                session.get_initial_questions("build a thing").unwrap(),
                vec!["Which DB?"]
            );
            assert_eq!(session.phase(), SessionPhase::AwaitingAnswers);

            session.get_next_questions("postgres").unwrap();
            assert_eq!(session.phase(), SessionPhase::AwaitingAnswers);

            assert!(session.get_next_questions("16").unwrap().is_empty());
            assert_eq!(session.phase(), SessionPhase::NoQuestionsPending);

            assert_eq!(session.draft_spec().unwrap(), "# Draft");
            assert_eq!(session.phase(), SessionPhase::AwaitingFeedback);

            assert_eq!(session.revise_spec("shorter").unwrap(), "# Revised");
            assert_eq!(session.phase(), SessionPhase::AwaitingFeedback);

            session.approve_spec().unwrap();
            assert_eq!(session.phase(), SessionPhase::Approved);

            let prompts_seen = recorded.lock().unwrap();
            assert_eq!(prompts_seen.len(), 5);
            assert!(prompts_seen[0].1.contains("build a thing"));
            assert!(prompts_seen[1].1.contains("postgres"));
            assert_eq!(prompts_seen[0].0, prompts::clarification_system_prompt());
            assert_eq!(prompts_seen[3].0, prompts::spec_system_prompt());
            assert!(prompts_seen[4].1.contains("shorter"));
        }

        #[test]
        fn no_initial_questions_goes_straight_to_drafting() {
            let mut session = SpecSession::new(ScriptedBackend::new(vec![questions(&[])]));
            assert!(session.get_initial_questions("clear request").unwrap().is_empty());
            assert_eq!(session.phase(), SessionPhase::NoQuestionsPending);
        }

        #[test]
        fn stream_callback_receives_messages() {
            let seen = Arc::new(Mutex::new(Vec::new()));
            let sink = Arc::clone(&seen);
            let mut session = SpecSession::new(ScriptedBackend::new(vec![questions(&[])]));
            session.set_stream_callback(Some(Box::new(move |m: StreamMessage| {
                sink.lock().unwrap().push(m.content)
            })));
            session.get_initial_questions("x").unwrap();
            assert_eq!(*seen.lock().unwrap(), vec!["working"]);
        }
    }

    mod ordering {
        use super::*;

        #[test]
        fn out_of_order_calls_fail_without_querying() {
            let backend = ScriptedBackend::new(vec![]);
            let recorded = Arc::clone(&backend.prompts);
            let mut session = SpecSession::new(backend);

            for err in [
                session.get_next_questions("a").unwrap_err(),
                session.draft_spec().unwrap_err(),
                session.revise_spec("f").unwrap_err(),
                session.approve_spec().unwrap_err(),
            ] {
                assert!(matches!(
                    err,
                    AgentError::StateMismatch {
                        phase: SessionPhase::Begin,
                        ..
                    }
                ));
            }
            assert!(recorded.lock().unwrap().is_empty());
            assert_eq!(session.phase(), SessionPhase::Begin);
        }

        #[test]
        fn initial_questions_only_once() {
            let mut session = SpecSession::new(ScriptedBackend::new(vec![questions(&["q"])]));
            session.get_initial_questions("x").unwrap();
            let err = session.get_initial_questions("x").unwrap_err();
            assert!(matches!(
                err,
                AgentError::StateMismatch {
                    operation: "get_initial_questions",
                    phase: SessionPhase::AwaitingAnswers,
                }
            ));
        }

        #[test]
        fn approved_session_rejects_everything() {
            let mut session = SpecSession::new(ScriptedBackend::new(vec![
                questions(&[]),
                spec("# S"),
            ]));
            session.get_initial_questions("x").unwrap();
            session.draft_spec().unwrap();
            session.approve_spec().unwrap();
            assert!(session.revise_spec("more").is_err());
            assert!(session.approve_spec().is_err());
            assert!(session.draft_spec().is_err());
        }
    }

    mod failures {
        use super::*;

        #[test]
        fn failed_clarification_keeps_phase() {
            let mut session = SpecSession::new(ScriptedBackend::new(vec![
                Err(AgentError::NoResultReceived),
                questions(&["q"]),
            ]));
            assert!(session.get_initial_questions("x").is_err());
            assert_eq!(session.phase(), SessionPhase::Begin);
            assert_eq!(session.get_initial_questions("x").unwrap(), vec!["q"]);
        }

        #[test]
        fn failed_draft_reverts_to_no_questions_pending() {
            let mut session = SpecSession::new(ScriptedBackend::new(vec![
                questions(&[]),
                Err(AgentError::Cancelled),
                spec("# S"),
            ]));
            session.get_initial_questions("x").unwrap();
            assert!(matches!(session.draft_spec(), Err(AgentError::Cancelled)));
            assert_eq!(session.phase(), SessionPhase::NoQuestionsPending);
            assert_eq!(session.draft_spec().unwrap(), "# S");
        }

        #[test]
        fn schema_violation_keeps_phase() {
            let mut session = SpecSession::new(ScriptedBackend::new(vec![
                questions(&[]),
                spec("# S"),
                Ok(json!({"spec": ""})),
            ]));
            session.get_initial_questions("x").unwrap();
            session.draft_spec().unwrap();
            assert!(matches!(
                session.revise_spec("f"),
                Err(AgentError::SchemaViolation { .. })
            ));
            assert_eq!(session.phase(), SessionPhase::AwaitingFeedback);
        }
    }

    mod factory {
        use super::*;

        #[test]
        fn empty_working_dir_uses_current_dir() {
            let factory = ClaudeSessionFactory::new(None, AgentSettings::default())
                .with_binary_path("/usr/bin/claude");
            let session = factory.new_session(Path::new("")).unwrap();
            assert_eq!(
                session.backend().working_dir(),
                std::env::current_dir().unwrap()
            );
            assert_eq!(session.phase(), SessionPhase::Begin);
        }

        #[test]
        fn invalid_working_dir_is_rejected() {
            let factory = ClaudeSessionFactory::new(None, AgentSettings::default())
                .with_binary_path("/usr/bin/claude");
            assert!(matches!(
                factory.new_session(Path::new("relative/dir")),
                Err(AgentError::Workspace(WorkspaceError::RelativePath))
            ));
            assert!(matches!(
                factory.new_session(Path::new("/nonexistent/bear/workspace")),
                Err(AgentError::Workspace(WorkspaceError::NotFound))
            ));
        }

        #[test]
        fn log_dir_enables_session_log() {
            let dir = tempfile::tempdir().unwrap();
            let settings = AgentSettings {
                log_dir: Some(dir.path().to_path_buf()),
                ..AgentSettings::default()
            };
            let factory = ClaudeSessionFactory::new(None, settings).with_binary_path("/usr/bin/claude");
            let session = factory.new_session(dir.path()).unwrap();
            let path = session.backend().log().path().unwrap().to_path_buf();
            assert!(path.starts_with(dir.path()));
            assert!(std::fs::read_to_string(path).unwrap().contains("SESSION"));
        }
    }
}
