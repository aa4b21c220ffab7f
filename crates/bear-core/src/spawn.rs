//! Agent process spawning and I/O management.
//!
//! This module starts the agent binary and owns its pipes:
//! - the stdin payload is written on a helper thread, then stdin is closed
//! - stderr is drained on a second thread into an in-memory buffer
//! - stdout is handed to the caller as a plain reader
//!
//! The child lives behind a mutex so that a [`ProcessHandle`] can stop it from
//! another thread (cancellation, timeouts) while the owner is blocked reading
//! stdout.
//!
//! Agent-specific spawn configurations are built elsewhere, see
//! [`crate::agents::claude::ClaudeConfig`].

use std::ffi::OsString;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, ExitStatus, Stdio};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::logging::SessionLog;

const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(50);
const GRACEFUL_STOP_POLLS: u32 = 30;
const GRACEFUL_STOP_INTERVAL: Duration = Duration::from_millis(100);

/// Configuration for spawning an agent process.
#[derive(Debug, Clone)]
pub struct SpawnConfig {
    /// Path to the agent binary
    pub binary_path: PathBuf,
    /// Arguments to pass to the binary
    pub args: Vec<String>,
    /// Working directory for the process
    pub working_dir: Option<PathBuf>,
    /// Variables set on top of the inherited environment
    pub env: Vec<(String, String)>,
    /// Written to stdin after spawning; stdin is closed afterwards
    pub stdin_payload: Option<String>,
}

impl SpawnConfig {
    /// Create a new spawn config with required fields.
    pub fn new(binary_path: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            binary_path: binary_path.into(),
            args,
            working_dir: None,
            env: Vec::new(),
            stdin_payload: None,
        }
    }

    /// Set the working directory.
    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Overlay an environment variable. Later values for the same key win.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Set the data to send on stdin.
    pub fn stdin_payload(mut self, payload: impl Into<String>) -> Self {
        self.stdin_payload = Some(payload.into());
        self
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.binary_path);
        cmd.args(&self.args);
        if let Some(ref dir) = self.working_dir {
            cmd.current_dir(dir);
        }
        if let Some(path) = path_with_binary_dir(&self.binary_path, std::env::var_os("PATH")) {
            cmd.env("PATH", path);
        }
        for (key, value) in &self.env {
            cmd.env(key, value);
        }
        cmd
    }
}

/// Prepend the binary's parent directory to `PATH` so node-based installs
/// find their runtime.
fn path_with_binary_dir(binary_path: &Path, existing: Option<OsString>) -> Option<OsString> {
    let parent = binary_path.parent().filter(|p| !p.as_os_str().is_empty())?;
    let mut dirs = vec![parent.to_path_buf()];
    if let Some(ref existing) = existing {
        dirs.extend(std::env::split_paths(existing));
    }
    std::env::join_paths(dirs).ok()
}

/// Read stderr to EOF, whatever its content.
///
/// The pipe must stay open until the child exits: closing it early turns the
/// child's next stderr write into SIGPIPE. Invalid UTF-8 is replaced.
fn drain_stderr<R: Read>(pipe: R, sink: &Mutex<String>, log: &SessionLog) {
    let mut reader = BufReader::new(pipe);
    let mut raw = Vec::new();
    loop {
        raw.clear();
        match reader.read_until(b'\n', &mut raw) {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&raw);
                let line = line.trim_end_matches(['\n', '\r']);
                log.debug("STDERR", line);
                let mut buf = sink.lock().unwrap_or_else(|e| e.into_inner());
                buf.push_str(line);
                buf.push('\n');
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                log::debug!("stopped reading agent stderr: {}", e);
                break;
            }
        }
    }
}

/// Cloneable handle that can stop a running process from any thread.
#[derive(Debug, Clone)]
pub struct ProcessHandle {
    child: Arc<Mutex<Option<Child>>>,
}

impl ProcessHandle {
    fn lock(&self) -> MutexGuard<'_, Option<Child>> {
        self.child.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Process id, if the child has not been reaped yet.
    pub fn id(&self) -> Option<u32> {
        self.lock().as_ref().map(Child::id)
    }

    /// Check if the process is still running.
    pub fn is_running(&self) -> bool {
        match self.lock().as_mut() {
            Some(child) => matches!(child.try_wait(), Ok(None)),
            None => false,
        }
    }

    /// Force kill the process immediately.
    pub fn kill(&self) {
        if let Some(child) = self.lock().as_mut() {
            if let Ok(None) = child.try_wait() {
                let _ = child.kill();
            }
        }
    }

    /// Stop the process gracefully (SIGINT on Unix, then force kill).
    pub fn stop(&self) {
        #[cfg(unix)]
        {
            let Some(pid) = self.running_pid() else {
                return;
            };
            unsafe {
                libc::kill(pid as i32, libc::SIGINT);
            }
            // Give the process up to 3 seconds to exit gracefully
            for _ in 0..GRACEFUL_STOP_POLLS {
                thread::sleep(GRACEFUL_STOP_INTERVAL);
                if !self.is_running() {
                    return;
                }
            }
        }

        self.kill();
    }

    #[cfg(unix)]
    fn running_pid(&self) -> Option<u32> {
        let mut guard = self.lock();
        let child = guard.as_mut()?;
        match child.try_wait() {
            Ok(None) => Some(child.id()),
            _ => None,
        }
    }
}

/// A running agent process.
pub struct AgentProcess {
    handle: ProcessHandle,
    stdout: Option<ChildStdout>,
    stderr: Arc<Mutex<String>>,
    stderr_thread: Option<JoinHandle<()>>,
    stdin_thread: Option<JoinHandle<()>>,
}

impl AgentProcess {
    /// Spawn a new agent process.
    ///
    /// Background threads for the stdin payload and the stderr drain are
    /// started immediately. Stdout is left for the caller, see
    /// [`AgentProcess::take_stdout`].
    pub fn spawn(config: SpawnConfig, log: SessionLog) -> io::Result<Self> {
        let mut cmd = config.command();
        cmd.stdin(if config.stdin_payload.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        });
        cmd.stdout(Stdio::piped()).stderr(Stdio::piped());

        log::debug!(
            "spawning {} {:?}",
            config.binary_path.display(),
            config.args
        );
        let mut child = cmd.spawn()?;

        let stdout = child.stdout.take();
        let stderr_pipe = child
            .stderr
            .take()
            .ok_or_else(|| io::Error::other("failed to capture stderr"))?;

        let stdin_thread = match (child.stdin.take(), config.stdin_payload) {
            (Some(mut stdin), Some(payload)) => {
                let log = log.clone();
                log.debug("STDIN", &payload);
                Some(thread::spawn(move || {
                    if let Err(e) = stdin.write_all(payload.as_bytes()).and_then(|_| stdin.flush()) {
                        log::debug!("failed to write agent stdin: {}", e);
                        log.warn("STDIN", &format!("write failed: {}", e));
                    }
                    // Dropping stdin closes the pipe and signals EOF.
                }))
            }
            _ => None,
        };

        let stderr = Arc::new(Mutex::new(String::new()));
        let stderr_sink = Arc::clone(&stderr);
        let stderr_thread = thread::spawn(move || drain_stderr(stderr_pipe, &stderr_sink, &log));

        Ok(Self {
            handle: ProcessHandle {
                child: Arc::new(Mutex::new(Some(child))),
            },
            stdout,
            stderr,
            stderr_thread: Some(stderr_thread),
            stdin_thread,
        })
    }

    /// A handle for stopping the process from another thread.
    pub fn handle(&self) -> ProcessHandle {
        self.handle.clone()
    }

    /// Take the stdout pipe. Returns `None` on the second call.
    pub fn take_stdout(&mut self) -> Option<ChildStdout> {
        self.stdout.take()
    }

    /// Wait for the process to exit.
    ///
    /// Polls so the mutex is never held across a blocking wait; a
    /// [`ProcessHandle`] can still kill the child meanwhile. Once the process
    /// has exited the stderr drain is joined, so [`AgentProcess::stderr`] is
    /// complete afterwards.
    pub fn wait(&mut self) -> io::Result<ExitStatus> {
        let status = loop {
            {
                let mut guard = self.handle.lock();
                let child = guard
                    .as_mut()
                    .ok_or_else(|| io::Error::other("process already reaped"))?;
                if let Some(status) = child.try_wait()? {
                    break status;
                }
            }
            thread::sleep(WAIT_POLL_INTERVAL);
        };

        if let Some(t) = self.stdin_thread.take() {
            let _ = t.join();
        }
        if let Some(t) = self.stderr_thread.take() {
            let _ = t.join();
        }
        Ok(status)
    }

    /// Everything the process wrote to stderr so far.
    pub fn stderr(&self) -> String {
        self.stderr
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Force kill the process immediately.
    pub fn kill(&self) {
        self.handle.kill();
    }

    /// Stop the process gracefully (SIGINT on Unix, then force kill).
    pub fn stop(&self) {
        self.handle.stop();
    }
}

impl Drop for AgentProcess {
    fn drop(&mut self) {
        // Never leave an orphaned agent behind.
        self.handle.kill();
        if let Some(mut child) = self.handle.lock().take() {
            let _ = child.wait();
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
