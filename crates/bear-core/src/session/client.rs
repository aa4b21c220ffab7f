//! Claude-backed agent client.

use std::path::{Path, PathBuf};

use crate::agents::claude::SessionArg;
use crate::agents::event::StreamMessage;
use crate::config::AgentSettings;
use crate::error::AgentError;
use crate::invocation::{CancelToken, Invocation};
use crate::logging::SessionLog;
use crate::schema::OutputSchema;

use super::state::SessionToken;

/// Receives forwarded stream messages while a turn runs.
pub type StreamCallback = Box<dyn FnMut(StreamMessage) + Send>;

/// Something that can run one schema-typed turn of a conversation.
pub trait AgentBackend: Send {
    fn query<T: OutputSchema>(&mut self, system_prompt: &str, user_prompt: &str)
        -> Result<T, AgentError>;

    /// Replace the stream callback. `None` discards forwarded messages.
    fn set_stream_callback(&mut self, callback: Option<StreamCallback>);

    fn cancel_token(&self) -> CancelToken;
}

/// One conversation with the Claude CLI, bound to one working directory.
pub struct ClaudeClient {
    api_key: Option<String>,
    working_dir: PathBuf,
    binary_path: PathBuf,
    token: Option<SessionToken>,
    settings: AgentSettings,
    log: SessionLog,
    cancel: CancelToken,
    callback: Option<StreamCallback>,
}

impl ClaudeClient {
    pub fn new(
        api_key: Option<String>,
        working_dir: PathBuf,
        binary_path: PathBuf,
        settings: AgentSettings,
    ) -> Self {
        Self {
            api_key: api_key.filter(|k| !k.is_empty()),
            working_dir,
            binary_path,
            token: None,
            settings,
            log: SessionLog::disabled(),
            cancel: CancelToken::new(),
            callback: None,
        }
    }

    pub fn with_log(mut self, log: SessionLog) -> Self {
        self.log = log;
        self
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    pub fn binary_path(&self) -> &Path {
        &self.binary_path
    }

    /// The continuity token, once the first turn has started.
    pub fn session_token(&self) -> Option<&SessionToken> {
        self.token.as_ref()
    }

    pub fn log(&self) -> &SessionLog {
        &self.log
    }

    /// Start a new agent session on the first call, resume it afterwards.
    ///
    /// The token is fixed the first time this runs, even if that turn fails.
    fn next_session_arg(&mut self) -> SessionArg {
        match self.token {
            Some(ref token) => SessionArg::Resume(token.to_string()),
            None => {
                let token = SessionToken::new();
                self.log
                    .info("SESSION", &format!("new agent session {}", token));
                let arg = SessionArg::Start(token.to_string());
                self.token = Some(token);
                arg
            }
        }
    }
}

impl AgentBackend for ClaudeClient {
    fn query<T: OutputSchema>(
        &mut self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<T, AgentError> {
        let session = self.next_session_arg();
        self.log.debug("QUERY", &format!("{} turn: {}", T::NAME, user_prompt));

        let on_event = self
            .callback
            .as_deref_mut()
            .map(|c| c as &mut dyn FnMut(StreamMessage));

        let result = Invocation {
            binary_path: &self.binary_path,
            working_dir: &self.working_dir,
            api_key: self.api_key.as_deref(),
            settings: &self.settings,
            session,
            system_prompt,
            user_prompt,
            log: &self.log,
            cancel: &self.cancel,
        }
        .run_as::<T>(on_event);

        if let Err(ref e) = result {
            log::debug!("{} turn failed: {}", T::NAME, e);
            self.log.error("QUERY", &format!("{} turn failed: {}", T::NAME, e));
        }
        result
    }

    fn set_stream_callback(&mut self, callback: Option<StreamCallback>) {
        self.callback = callback;
    }

    fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }
}
