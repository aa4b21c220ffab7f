//! Events forwarded from the agent stream to callers.

use serde::{Deserialize, Serialize};

/// Who produced a forwarded message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StreamRole {
    Assistant,
    User,
}

/// What kind of content block a forwarded message was projected from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ContentKind {
    Thinking,
    ToolCall,
    ToolCallResult,
    Text,
}

impl ContentKind {
    /// Short label used when rendering a message as text.
    pub fn label(self) -> &'static str {
        match self {
            Self::Thinking => "thinking",
            Self::ToolCall => "tool",
            Self::ToolCallResult => "result",
            Self::Text => "text",
        }
    }
}

/// One assistant/user record, reduced to its first content block.
///
/// The content is never empty; missing text is replaced with a readable
/// placeholder during projection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamMessage {
    pub role: StreamRole,
    pub kind: ContentKind,
    pub content: String,
}

impl StreamMessage {
    pub fn new(role: StreamRole, kind: ContentKind, content: impl Into<String>) -> Self {
        Self {
            role,
            kind,
            content: content.into(),
        }
    }

    /// Render as at most `max` display lines, the first one tagged with the kind.
    pub fn display_lines(&self, max: usize) -> Vec<String> {
        self.content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .take(max)
            .enumerate()
            .map(|(i, line)| {
                if i == 0 {
                    format!("[{}] {}", self.kind.label(), line)
                } else {
                    format!("  {}", line)
                }
            })
            .collect()
    }
}
