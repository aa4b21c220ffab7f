//! One request/response turn against the Claude CLI.
//!
//! An [`Invocation`] writes the system prompt to a temporary file, spawns the
//! agent, feeds its stdout through the stream parser and only then waits for
//! the process. The temporary file is owned by the invocation and removed
//! when it goes out of scope, on every exit path.
//!
//! Failure precedence: cancellation or timeout, then parser errors, then a
//! non-zero exit status.

use std::io::{self, BufReader, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use serde_json::Value;

use crate::agents::claude::{ClaudeConfig, ClaudeParser, SessionArg};
use crate::agents::event::StreamMessage;
use crate::config::AgentSettings;
use crate::error::AgentError;
use crate::logging::SessionLog;
use crate::schema::OutputSchema;
use crate::spawn::{AgentProcess, ProcessHandle};

const PROMPT_FILE_PREFIX: &str = "bear-system-prompt-";
const PROMPT_FILE_SUFFIX: &str = ".md";

/// Shared cancellation switch for the turns of one session.
///
/// Cancelling is sticky: the running turn is stopped and every later turn
/// fails with [`AgentError::Cancelled`] until [`CancelToken::reset`].
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    inner: Arc<CancelInner>,
}

#[derive(Debug, Default)]
struct CancelInner {
    cancelled: AtomicBool,
    process: Mutex<Option<ProcessHandle>>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel the running turn, if any, and all later ones.
    ///
    /// Returns immediately; the agent is stopped on a background thread.
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
        if let Some(handle) = self.current() {
            thread::spawn(move || handle.stop());
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Allow new turns again.
    pub fn reset(&self) {
        self.inner.cancelled.store(false, Ordering::SeqCst);
    }

    fn current(&self) -> Option<ProcessHandle> {
        self.inner
            .process
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn register(&self, handle: ProcessHandle) {
        *self.inner.process.lock().unwrap_or_else(|e| e.into_inner()) = Some(handle.clone());
        // A cancel that raced with the spawn must still take effect.
        if self.is_cancelled() {
            handle.kill();
        }
    }

    fn unregister(&self) {
        self.inner
            .process
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
    }
}

/// Clears the registered process when the turn ends.
struct Registration<'a>(&'a CancelToken);

impl Drop for Registration<'_> {
    fn drop(&mut self) {
        self.0.unregister();
    }
}

/// Kills the process if the turn outlives its deadline.
struct Watchdog {
    done: Option<mpsc::Sender<()>>,
    fired: Arc<AtomicBool>,
    thread: Option<thread::JoinHandle<()>>,
}

impl Watchdog {
    fn start(timeout: Option<Duration>, handle: ProcessHandle, log: SessionLog) -> Self {
        let fired = Arc::new(AtomicBool::new(false));
        let Some(timeout) = timeout else {
            return Self {
                done: None,
                fired,
                thread: None,
            };
        };

        let (done, rx) = mpsc::channel::<()>();
        let flag = Arc::clone(&fired);
        let thread = thread::spawn(move || {
            if let Err(RecvTimeoutError::Timeout) = rx.recv_timeout(timeout) {
                log.warn("INVOKE", &format!("turn exceeded {:?}, killing agent", timeout));
                flag.store(true, Ordering::SeqCst);
                handle.kill();
            }
        });

        Self {
            done: Some(done),
            fired,
            thread: Some(thread),
        }
    }

    /// Disarm and report whether the deadline was hit.
    fn finish(mut self) -> bool {
        self.done.take();
        if let Some(t) = self.thread.take() {
            let _ = t.join();
        }
        self.fired.load(Ordering::SeqCst)
    }
}

/// Inputs for one turn.
#[derive(Debug)]
pub struct Invocation<'a> {
    pub binary_path: &'a Path,
    pub working_dir: &'a Path,
    pub api_key: Option<&'a str>,
    pub settings: &'a AgentSettings,
    pub session: SessionArg,
    pub system_prompt: &'a str,
    pub user_prompt: &'a str,
    pub log: &'a SessionLog,
    pub cancel: &'a CancelToken,
}

impl Invocation<'_> {
    /// Run the turn and decode its structured output as `T`.
    pub fn run_as<T: OutputSchema>(
        self,
        on_event: Option<&mut dyn FnMut(StreamMessage)>,
    ) -> Result<T, AgentError> {
        let schema = T::schema_argument()?;
        let payload = self.run(&schema, on_event)?;
        T::decode(payload)
    }

    /// Run the turn and return the raw structured output.
    pub fn run(
        self,
        json_schema: &str,
        on_event: Option<&mut dyn FnMut(StreamMessage)>,
    ) -> Result<Value, AgentError> {
        if self.cancel.is_cancelled() {
            return Err(AgentError::Cancelled);
        }

        let prompt_file = write_prompt_file(self.system_prompt)?;
        self.log.debug(
            "INVOKE",
            &format!("system prompt file {}", prompt_file.path().display()),
        );

        let config = ClaudeConfig {
            binary_path: self.binary_path.to_path_buf(),
            working_dir: self.working_dir.to_path_buf(),
            prompt: self.user_prompt.to_string(),
            system_prompt_file: prompt_file.path().to_path_buf(),
            json_schema: json_schema.to_string(),
            session: self.session.clone(),
            model: self.settings.model.clone(),
            effort_level: self.settings.effort_level.clone(),
            tools: self.settings.tool_list(),
            api_key: self.api_key.map(str::to_string),
        }
        .build();

        self.log.info(
            "INVOKE",
            &format!(
                "starting {} (session {}, {})",
                self.binary_path.display(),
                self.session.token(),
                match self.session {
                    SessionArg::Start(_) => "new",
                    SessionArg::Resume(_) => "resume",
                }
            ),
        );

        let mut process =
            AgentProcess::spawn(config, self.log.clone()).map_err(AgentError::ProcessStartFailed)?;
        self.cancel.register(process.handle());
        let _registration = Registration(self.cancel);
        let watchdog = Watchdog::start(self.settings.timeout, process.handle(), self.log.clone());

        let stdout = process.take_stdout().ok_or_else(|| {
            AgentError::ProcessStartFailed(io::Error::other("stdout was not captured"))
        })?;
        let mut reader = BufReader::new(stdout);

        let mut parser = ClaudeParser::new().with_log(self.log.clone());
        if let Some(callback) = on_event {
            parser = parser.with_callback(callback);
        }
        let parsed = parser.run(&mut reader);

        match parsed {
            // Drain whatever follows the result so the agent never blocks on
            // a full pipe before exiting.
            Ok(_) => {
                if let Err(e) = io::copy(&mut reader, &mut io::sink()) {
                    log::debug!("error draining agent stdout: {}", e);
                }
            }
            Err(_) => process.kill(),
        }

        let status = process.wait();
        let timed_out = watchdog.finish();
        let stderr = process.stderr();

        if timed_out {
            let timeout = self.settings.timeout.unwrap_or_default();
            self.log.error("INVOKE", &format!("timed out after {:?}", timeout));
            return Err(AgentError::Timeout(timeout));
        }
        if self.cancel.is_cancelled() {
            self.log.warn("INVOKE", "cancelled");
            return Err(AgentError::Cancelled);
        }

        let payload = parsed.inspect_err(|e| self.log.error("INVOKE", &e.to_string()))?;

        let status = status.map_err(|e| AgentError::ProcessExit {
            code: None,
            stderr: e.to_string(),
        })?;
        if !status.success() {
            self.log.error(
                "INVOKE",
                &format!("agent exited with {}: {}", status, stderr.trim()),
            );
            return Err(AgentError::ProcessExit {
                code: status.code(),
                stderr,
            });
        }

        self.log.info(
            "INVOKE",
            &format!("turn finished, {} messages forwarded", parser.forwarded()),
        );
        Ok(payload)
    }
}

fn write_prompt_file(system_prompt: &str) -> Result<tempfile::NamedTempFile, AgentError> {
    let mut file = tempfile::Builder::new()
        .prefix(PROMPT_FILE_PREFIX)
        .suffix(PROMPT_FILE_SUFFIX)
        .tempfile()
        .map_err(AgentError::PromptFile)?;
    file.write_all(system_prompt.as_bytes())
        .and_then(|_| file.flush())
        .map_err(AgentError::PromptFile)?;
    Ok(file)
}
