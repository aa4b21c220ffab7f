//! Runtime settings for driving the Claude CLI.

use std::path::PathBuf;
use std::time::Duration;

/// Environment variable holding the Anthropic API key.
pub const API_KEY_ENV_VAR: &str = "ANTHROPIC_API_KEY";

pub const DEFAULT_MODEL: &str = "claude-opus-4-6";
pub const DEFAULT_EFFORT_LEVEL: &str = "high";

/// Capacity of the event bridge channel for one turn.
pub const DEFAULT_BRIDGE_CAPACITY: usize = 64;

/// Tools the agent may use while running unattended.
pub const TOOL_ALLOW_LIST: &[&str] = &[
    "AskUserQuestion",
    "Bash",
    "TaskOutput",
    "Edit",
    "ExitPlanMode",
    "Glob",
    "Grep",
    "KillShell",
    "MCPSearch",
    "Read",
    "Skill",
    "Task",
    "TaskCreate",
    "TaskGet",
    "TaskList",
    "TaskUpdate",
    "WebFetch",
    "WebSearch",
    "Write",
    "LSP",
];

/// Tunables for each invocation of the agent.
#[derive(Debug, Clone)]
pub struct AgentSettings {
    pub model: String,
    pub effort_level: String,
    pub tools: Vec<String>,
    /// Hard limit for a single turn. `None` waits indefinitely.
    pub timeout: Option<Duration>,
    /// Directory for session log files. `None` disables the session log.
    pub log_dir: Option<PathBuf>,
    pub bridge_capacity: usize,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            effort_level: DEFAULT_EFFORT_LEVEL.to_string(),
            tools: TOOL_ALLOW_LIST.iter().map(|t| t.to_string()).collect(),
            timeout: None,
            log_dir: None,
            bridge_capacity: DEFAULT_BRIDGE_CAPACITY,
        }
    }
}

impl AgentSettings {
    /// Defaults overlaid with `BEAR_MODEL`, `BEAR_TIMEOUT_SECS` and `BEAR_LOG_DIR`.
    ///
    /// Unparseable or empty values are ignored with a warning.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = Self::default();

        if let Some(model) = lookup("BEAR_MODEL").filter(|v| !v.is_empty()) {
            settings.model = model;
        }

        if let Some(raw) = lookup("BEAR_TIMEOUT_SECS").filter(|v| !v.is_empty()) {
            match raw.trim().parse::<u64>() {
                Ok(0) => {}
                Ok(secs) => settings.timeout = Some(Duration::from_secs(secs)),
                Err(e) => log::warn!("Ignoring BEAR_TIMEOUT_SECS={:?}: {}", raw, e),
            }
        }

        if let Some(dir) = lookup("BEAR_LOG_DIR").filter(|v| !v.is_empty()) {
            settings.log_dir = Some(PathBuf::from(dir));
        }

        settings
    }

    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// The comma-joined allow-list passed to `--tools`.
    pub fn tool_list(&self) -> String {
        self.tools.join(",")
    }
}

/// Read the API key. A missing or empty key is not an error: the CLI may
/// still authenticate through a subscription login.
pub fn api_key_from_lookup<F>(lookup: F) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(API_KEY_ENV_VAR).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults() {
        let settings = AgentSettings::default();
        assert_eq!(settings.model, "claude-opus-4-6");
        assert_eq!(settings.effort_level, "high");
        assert_eq!(settings.bridge_capacity, 64);
        assert!(settings.timeout.is_none());
        assert_eq!(
            settings.tool_list(),
            "AskUserQuestion,Bash,TaskOutput,Edit,ExitPlanMode,Glob,Grep,KillShell,MCPSearch,\
             Read,Skill,Task,TaskCreate,TaskGet,TaskList,TaskUpdate,WebFetch,WebSearch,Write,LSP"
        );
    }

    #[test]
    fn env_overrides() {
        let settings = AgentSettings::from_lookup(lookup_from(&[
            ("BEAR_MODEL", "claude-sonnet-4-5"),
            ("BEAR_TIMEOUT_SECS", "90"),
            ("BEAR_LOG_DIR", "/tmp/bear-logs"),
        ]));
        assert_eq!(settings.model, "claude-sonnet-4-5");
        assert_eq!(settings.timeout, Some(Duration::from_secs(90)));
        assert_eq!(settings.log_dir, Some(PathBuf::from("/tmp/bear-logs")));
    }

    #[test]
    fn bad_timeout_is_ignored() {
        let settings = AgentSettings::from_lookup(lookup_from(&[("BEAR_TIMEOUT_SECS", "soon")]));
        assert!(settings.timeout.is_none());
    }

    #[test]
    fn zero_timeout_means_none() {
        let settings = AgentSettings::from_lookup(lookup_from(&[("BEAR_TIMEOUT_SECS", "0")]));
        assert!(settings.timeout.is_none());
    }

    #[test]
    fn api_key_missing_or_empty_is_none() {
        assert_eq!(api_key_from_lookup(lookup_from(&[])), None);
        assert_eq!(
            api_key_from_lookup(lookup_from(&[("ANTHROPIC_API_KEY", "")])),
            None
        );
        assert_eq!(
            api_key_from_lookup(lookup_from(&[("ANTHROPIC_API_KEY", "sk-1")])),
            Some("sk-1".to_string())
        );
    }
}
