//! Claude agent spawn configuration.

use std::path::PathBuf;

use crate::config::API_KEY_ENV_VAR;
use crate::spawn::SpawnConfig;

/// How an invocation attaches to the agent's conversation history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionArg {
    /// First turn: create a session with this id (`--session-id`).
    Start(String),
    /// Later turns: continue the session with this id (`--resume`).
    Resume(String),
}

impl SessionArg {
    pub fn token(&self) -> &str {
        match self {
            Self::Start(token) | Self::Resume(token) => token,
        }
    }
}

/// Configuration options for one non-interactive Claude turn.
#[derive(Debug, Clone)]
pub struct ClaudeConfig {
    pub binary_path: PathBuf,
    pub working_dir: PathBuf,
    /// User prompt, written to stdin.
    pub prompt: String,
    /// File holding the system prompt (`--append-system-prompt-file`).
    pub system_prompt_file: PathBuf,
    /// JSON schema the final structured output must satisfy.
    pub json_schema: String,
    pub session: SessionArg,
    pub model: String,
    pub effort_level: String,
    /// Comma-joined tool allow-list.
    pub tools: String,
    pub api_key: Option<String>,
}

impl ClaudeConfig {
    /// Build a SpawnConfig for Claude CLI.
    pub fn build(self) -> SpawnConfig {
        let mut args: Vec<String> = vec![
            "-p".into(),
            "--model".into(),
            self.model,
            "--output-format".into(),
            "stream-json".into(),
            "--verbose".into(),
            "--include-partial-messages".into(),
            "--allow-dangerously-skip-permissions".into(),
            "--permission-mode".into(),
            "bypassPermissions".into(),
            "--tools".into(),
            self.tools,
            "--append-system-prompt-file".into(),
            self.system_prompt_file.to_string_lossy().into_owned(),
            "--json-schema".into(),
            self.json_schema,
        ];

        match self.session {
            SessionArg::Start(token) => {
                args.push("--session-id".into());
                args.push(token);
            }
            SessionArg::Resume(token) => {
                args.push("--resume".into());
                args.push(token);
            }
        }

        let mut config = SpawnConfig::new(self.binary_path, args)
            .working_dir(self.working_dir)
            .env("CLAUDE_CODE_EFFORT_LEVEL", self.effort_level)
            .env("CLAUDE_CODE_DISABLE_AUTO_MEMORY", "0")
            .env("CLAUDE_CODE_DISABLE_FEEDBACK_SURVEY", "1")
            .stdin_payload(self.prompt);

        if let Some(key) = self.api_key.filter(|k| !k.is_empty()) {
            config = config.env(API_KEY_ENV_VAR, key);
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(session: SessionArg, api_key: Option<&str>) -> ClaudeConfig {
        ClaudeConfig {
            binary_path: PathBuf::from("/usr/bin/claude"),
            working_dir: PathBuf::from("/tmp/work"),
            prompt: "Hello".to_string(),
            system_prompt_file: PathBuf::from("/tmp/bear-system-prompt-x.md"),
            json_schema: r#"{"type":"object"}"#.to_string(),
            session,
            model: "claude-opus-4-6".to_string(),
            effort_level: "high".to_string(),
            tools: "Bash,Read".to_string(),
            api_key: api_key.map(str::to_string),
        }
    }

    fn env_value<'a>(spawn: &'a SpawnConfig, key: &str) -> Option<&'a str> {
        spawn
            .env
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn claude_config_builds_exact_args() {
        let spawn = config(SessionArg::Start("tok-1".to_string()), None).build();
        assert_eq!(spawn.binary_path, PathBuf::from("/usr/bin/claude"));
        assert_eq!(
            spawn.args,
            vec![
                "-p",
                "--model",
                "claude-opus-4-6",
                "--output-format",
                "stream-json",
                "--verbose",
                "--include-partial-messages",
                "--allow-dangerously-skip-permissions",
                "--permission-mode",
                "bypassPermissions",
                "--tools",
                "Bash,Read",
                "--append-system-prompt-file",
                "/tmp/bear-system-prompt-x.md",
                "--json-schema",
                r#"{"type":"object"}"#,
                "--session-id",
                "tok-1",
            ]
        );
        assert_eq!(spawn.working_dir, Some(PathBuf::from("/tmp/work")));
        assert_eq!(spawn.stdin_payload.as_deref(), Some("Hello"));
    }

    #[test]
    fn resume_replaces_session_id() {
        let spawn = config(SessionArg::Resume("tok-1".to_string()), None).build();
        let tail = &spawn.args[spawn.args.len() - 2..];
        assert_eq!(tail, ["--resume", "tok-1"]);
        assert!(!spawn.args.iter().any(|a| a == "--session-id"));
    }

    #[test]
    fn tuning_env_is_always_set() {
        let spawn = config(SessionArg::Start("t".to_string()), None).build();
        assert_eq!(env_value(&spawn, "CLAUDE_CODE_EFFORT_LEVEL"), Some("high"));
        assert_eq!(env_value(&spawn, "CLAUDE_CODE_DISABLE_AUTO_MEMORY"), Some("0"));
        assert_eq!(
            env_value(&spawn, "CLAUDE_CODE_DISABLE_FEEDBACK_SURVEY"),
            Some("1")
        );
        assert_eq!(env_value(&spawn, "ANTHROPIC_API_KEY"), None);
    }

    #[test]
    fn api_key_only_when_non_empty() {
        let spawn = config(SessionArg::Start("t".to_string()), Some("")).build();
        assert_eq!(env_value(&spawn, "ANTHROPIC_API_KEY"), None);

        let spawn = config(SessionArg::Start("t".to_string()), Some("sk-test")).build();
        assert_eq!(env_value(&spawn, "ANTHROPIC_API_KEY"), Some("sk-test"));
    }

    #[test]
    fn session_arg_token() {
        assert_eq!(SessionArg::Start("a".into()).token(), "a");
        assert_eq!(SessionArg::Resume("b".into()).token(), "b");
    }
}
