//! Claude-specific JSON types for stream parsing.
//!
//! # Purpose
//!
//! This module defines Rust structs that mirror the JSON records the Claude
//! CLI prints in `--output-format stream-json` mode. Each line of stdout is
//! one [`StreamRecord`].
//!
//! # Example
//!
//! Claude outputs:
//! ```json
//! {"type":"assistant","session_id":"sess-123","message":{"role":"assistant","content":[...]}}
//! {"type":"result","subtype":"success","is_error":false,"structured_output":{"questions":[]}}
//! ```
//!
//! # Rust Concept: `#[serde(default)]`
//!
//! Every field except `type` is optional in practice, and different record
//! types populate different fields. `#[serde(default)]` makes a missing key
//! decode as `Default::default()` (`None`, `false`, `""`, empty `Vec`)
//! instead of failing the whole line.

use serde::{Deserialize, Serialize};

/// Record types the parser distinguishes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordType {
    Assistant,
    User,
    Result,
    System,
    /// `stream_event` and anything unrecognized.
    Other(String),
}

impl RecordType {
    pub fn from_wire(value: &str) -> Self {
        match value {
            "assistant" => Self::Assistant,
            "user" => Self::User,
            "result" => Self::Result,
            "system" => Self::System,
            other => Self::Other(other.to_string()),
        }
    }
}

/// One line of Claude's stream-json output.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StreamRecord {
    /// The record type ("assistant", "user", "result", "system", "stream_event").
    ///
    /// `type` is a Rust keyword, hence the rename.
    #[serde(rename = "type", default)]
    pub record_type: String,

    /// Set on "result" records ("success", "error_max_turns", ...).
    #[serde(default)]
    pub subtype: String,

    /// Set on "result" records. May be true even when `subtype` is "success".
    #[serde(default)]
    pub is_error: bool,

    /// Human-readable result text on "result" records.
    #[serde(default)]
    pub result: Option<String>,

    /// Message body of "assistant"/"user" records as the CLI emits it.
    #[serde(default)]
    pub message: Option<WireMessage>,

    /// Content blocks given at the top level instead of under `message`.
    #[serde(default)]
    pub content: Option<Vec<ContentBlock>>,

    /// Schema-conforming payload of a successful "result" record.
    #[serde(default)]
    pub structured_output: Option<serde_json::Value>,

    /// Set when the CLI cannot run at all, e.g. "authentication_failed".
    #[serde(default)]
    pub error: Option<String>,

    #[serde(default)]
    pub session_id: Option<String>,
}

impl StreamRecord {
    pub fn kind(&self) -> RecordType {
        RecordType::from_wire(&self.record_type)
    }

    /// Content blocks, preferring the nested `message.content`.
    pub fn blocks(&self) -> &[ContentBlock] {
        if let Some(ref message) = self.message {
            if !message.content.is_empty() || self.content.is_none() {
                return &message.content;
            }
        }
        self.content.as_deref().unwrap_or(&[])
    }

    /// The role declared inside the message body, if any.
    pub fn role(&self) -> Option<&str> {
        self.message
            .as_ref()
            .map(|m| m.role.as_str())
            .filter(|r| !r.is_empty())
    }
}

/// Message body with content blocks.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WireMessage {
    /// "assistant" or "user".
    #[serde(default)]
    pub role: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    #[serde(default)]
    pub content: Vec<ContentBlock>,
}

/// A content block in a message (text, thinking, tool_use, tool_result).
///
/// # Rust Concept: Optional Fields
///
/// Different block types carry different fields:
/// - text block: `text`
/// - thinking block: `thinking`
/// - tool_use block: `name` and `input`
/// - tool_result block: `content`, which is either a string or an array
///
/// Making them all optional lets one struct cover every block type.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContentBlock {
    #[serde(rename = "type", default)]
    pub block_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thinking: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<serde_json::Value>,

    /// Tool result payload. Kept as raw JSON because it may be a string or
    /// an array of objects.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<serde_json::Value>,
}
