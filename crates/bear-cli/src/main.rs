//! `bear`: turn a feature request into an approved specification.
//!
//! The agent's intermediate messages go to stderr; the approved spec is
//! printed to stdout.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use clap::Parser;

use bear_core::config::{api_key_from_lookup, AgentSettings};
use bear_core::workspace::validate_workspace_path;
use bear_core::{AgentError, ClaudeSessionFactory, SessionFactory, SpecWriter};

mod turn;

use turn::{lock, run_turn};

/// Exit status after Ctrl-C, as a shell would report it.
const EXIT_INTERRUPTED: u8 = 130;

#[derive(Parser, Debug)]
#[command(name = "bear")]
#[command(about = "Turn a feature request into an approved spec with the Claude CLI")]
#[command(version)]
struct Args {
    /// The feature request. Read from stdin when omitted.
    request: Option<String>,

    /// Workspace directory the agent works in (defaults to the current directory)
    #[arg(long, short = 'w')]
    workspace: Option<PathBuf>,

    /// Directory for the per-session log file (overrides BEAR_LOG_DIR)
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Hard limit for a single agent turn, in seconds
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Claude model to use
    #[arg(long)]
    model: Option<String>,
}

impl Args {
    /// Environment settings overridden by command-line flags.
    fn settings(&self) -> AgentSettings {
        let mut settings = AgentSettings::from_env();
        if let Some(ref model) = self.model {
            settings.model = model.clone();
        }
        if let Some(secs) = self.timeout_secs {
            settings.timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }
        if let Some(ref dir) = self.log_dir {
            settings.log_dir = Some(dir.clone());
        }
        settings
    }
}

#[derive(Debug)]
enum CliError {
    Agent(AgentError),
    Io(io::Error),
    Usage(String),
    Interrupted,
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Agent(e) => write!(f, "{}", e),
            Self::Io(e) => write!(f, "failed to read input: {}", e),
            Self::Usage(msg) => f.write_str(msg),
            Self::Interrupted => f.write_str("interrupted"),
        }
    }
}

impl From<AgentError> for CliError {
    fn from(e: AgentError) -> Self {
        match e {
            AgentError::Cancelled => Self::Interrupted,
            other => Self::Agent(other),
        }
    }
}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = Args::parse();
    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(CliError::Interrupted) => {
            eprintln!("\ninterrupted");
            ExitCode::from(EXIT_INTERRUPTED)
        }
        Err(e) => {
            log::error!("{}", e);
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<(), CliError> {
    let settings = args.settings();
    let capacity = settings.bridge_capacity;

    let api_key = api_key_from_lookup(|key| std::env::var(key).ok());
    if api_key.is_none() {
        log::warn!("ANTHROPIC_API_KEY is not set");
        eprintln!(
            "warning: ANTHROPIC_API_KEY is not set; the Claude CLI must already be logged in"
        );
    }

    let workspace = match args.workspace {
        Some(ref dir) => dir.clone(),
        None => std::env::current_dir()?,
    };
    validate_workspace_path(&workspace).map_err(AgentError::from)?;

    let request = match args.request {
        Some(ref text) => text.trim().to_string(),
        None => read_block("Describe what you want to build (finish with an empty line):").await?,
    };
    if request.is_empty() {
        return Err(CliError::Usage("the request is empty".to_string()));
    }

    let factory = ClaudeSessionFactory::new(api_key, settings);
    let session = Arc::new(Mutex::new(factory.new_session(&workspace)?));
    log::info!("session started in {}", workspace.display());

    let mut questions = run_turn(&session, capacity, "thinking about your request", move |s| {
        s.get_initial_questions(&request)
    })
    .await?;

    while !questions.is_empty() {
        eprintln!("\nA few questions before writing the spec:");
        for (i, q) in questions.iter().enumerate() {
            eprintln!("  {}. {}", i + 1, q);
        }
        let answer = read_block("Your answers (finish with an empty line):").await?;
        questions = run_turn(&session, capacity, "reading your answers", move |s| {
            s.get_next_questions(&answer)
        })
        .await?;
    }

    let mut spec = run_turn(&session, capacity, "drafting the spec", |s| s.draft_spec()).await?;

    loop {
        eprintln!("\n{}\n", spec);
        let feedback =
            read_block("Feedback to revise the spec (empty line to approve):").await?;
        if feedback.is_empty() {
            lock(&session).approve_spec()?;
            break;
        }
        spec = run_turn(&session, capacity, "revising the spec", move |s| {
            s.revise_spec(&feedback)
        })
        .await?;
    }

    let mut stdout = io::stdout().lock();
    writeln!(stdout, "{}", spec)?;
    Ok(())
}

/// Prompt on stderr and read lines from stdin until an empty line or EOF.
///
/// Runs the blocking read off the async runtime so Ctrl-C still works.
async fn read_block(prompt: &str) -> Result<String, CliError> {
    eprintln!("{}", prompt);
    let read = tokio::task::spawn_blocking(|| {
        let stdin = io::stdin();
        let mut lines = Vec::new();
        for line in stdin.lock().lines() {
            let line = line?;
            if line.trim().is_empty() {
                break;
            }
            lines.push(line);
        }
        Ok::<_, io::Error>(lines.join("\n"))
    });

    tokio::select! {
        joined = read => match joined {
            Ok(text) => Ok(text?.trim().to_string()),
            Err(e) => Err(CliError::Io(io::Error::other(e))),
        },
        _ = tokio::signal::ctrl_c() => Err(CliError::Interrupted),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_flags() {
        let args = Args::try_parse_from([
            "bear",
            "add a --json flag",
            "--workspace",
            "/tmp",
            "--timeout-secs",
            "90",
            "--model",
            "claude-sonnet-4-5",
        ])
        .unwrap();
        assert_eq!(args.request.as_deref(), Some("add a --json flag"));
        assert_eq!(args.workspace, Some(PathBuf::from("/tmp")));

        let settings = args.settings();
        assert_eq!(settings.model, "claude-sonnet-4-5");
        assert_eq!(settings.timeout, Some(Duration::from_secs(90)));
    }

    #[test]
    fn request_is_optional() {
        let args = Args::try_parse_from(["bear"]).unwrap();
        assert!(args.request.is_none());
        assert!(args.workspace.is_none());
    }

    #[test]
    fn zero_timeout_disables_limit() {
        let args = Args::try_parse_from(["bear", "--timeout-secs", "0"]).unwrap();
        assert!(args.settings().timeout.is_none());
    }

    #[test]
    fn cancelled_maps_to_interrupted() {
        assert!(matches!(
            CliError::from(AgentError::Cancelled),
            CliError::Interrupted
        ));
        assert!(matches!(
            CliError::from(AgentError::BinaryNotFound),
            CliError::Agent(AgentError::BinaryNotFound)
        ));
        assert!(matches!(
            CliError::from(AgentError::TurnLost),
            CliError::Agent(AgentError::TurnLost)
        ));
    }
}
