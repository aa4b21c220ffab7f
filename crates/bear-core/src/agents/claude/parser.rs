//! Claude stream parser.
//!
//! Reads Claude's line-by-line JSON output and turns it into forwarded
//! [`StreamMessage`]s plus one terminal structured payload.
//!
//! # How This Parser Works
//!
//! Claude outputs JSON objects, one per line. This parser:
//! 1. Reads one newline-terminated line at a time, skipping blank lines
//! 2. Deserializes each line into a [`StreamRecord`]; a line that is not a
//!    JSON object fails the whole parse
//! 3. Forwards "assistant"/"user" records to the callback, reduced to their
//!    first content block
//! 4. Stops at the first "result" record and returns its structured output,
//!    or the agent's error
//!
//! The parser knows nothing about processes. Anything that implements
//! [`BufRead`] can be fed to it, which is what the tests do.

use std::io::BufRead;

use crate::agents::event::{ContentKind, StreamMessage, StreamRole};
use crate::error::AgentError;
use crate::logging::SessionLog;

use super::types::{ContentBlock, RecordType, StreamRecord};

const AUTHENTICATION_FAILED: &str = "authentication_failed";

/// What a single non-blank line amounted to.
#[derive(Debug, Clone, PartialEq)]
pub enum LineOutcome {
    /// An assistant/user record; the projected message went to the callback.
    Forwarded(StreamMessage),
    /// A system, stream_event or unrecognized record.
    Discarded,
    /// A successful result record carrying this payload.
    Finished(serde_json::Value),
}

/// Parser state for one invocation's output stream.
pub struct ClaudeParser<'a> {
    callback: Option<&'a mut dyn FnMut(StreamMessage)>,
    log: SessionLog,
    session_id: Option<String>,
    forwarded: usize,
}

impl<'a> ClaudeParser<'a> {
    /// A parser with no callback; forwarded messages are dropped.
    pub fn new() -> Self {
        Self {
            callback: None,
            log: SessionLog::disabled(),
            session_id: None,
            forwarded: 0,
        }
    }

    /// Deliver forwarded messages to `callback`, in stream order.
    pub fn with_callback(mut self, callback: &'a mut dyn FnMut(StreamMessage)) -> Self {
        self.callback = Some(callback);
        self
    }

    /// Mirror every raw line into `log`.
    pub fn with_log(mut self, log: SessionLog) -> Self {
        self.log = log;
        self
    }

    /// Number of messages forwarded so far.
    pub fn forwarded(&self) -> usize {
        self.forwarded
    }

    /// Session ID reported by the agent, if any record carried one.
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// Consume `reader` until the first result record.
    ///
    /// Returns the structured output of a successful result. Everything after
    /// the result record is left unread. Invalid UTF-8 is replaced before
    /// decoding, so a stray byte never fails an otherwise valid record.
    pub fn run<R: BufRead>(&mut self, mut reader: R) -> Result<serde_json::Value, AgentError> {
        let mut raw = Vec::new();
        loop {
            raw.clear();
            let read = reader
                .read_until(b'\n', &mut raw)
                .map_err(AgentError::StreamRead)?;
            if read == 0 {
                return Err(AgentError::NoResultReceived);
            }

            let text = String::from_utf8_lossy(&raw);
            let line = text.trim();
            if line.is_empty() {
                continue;
            }

            if let LineOutcome::Finished(output) = self.parse_line(line)? {
                return Ok(output);
            }
        }
    }

    /// Classify one non-blank line.
    pub fn parse_line(&mut self, line: &str) -> Result<LineOutcome, AgentError> {
        self.log.debug("STDOUT", line);

        let record: StreamRecord =
            serde_json::from_str(line).map_err(|source| AgentError::StreamParse {
                line: line.to_string(),
                source,
            })?;

        if let Some(error) = record.error.as_deref().filter(|e| !e.is_empty()) {
            self.log.error("STREAM", &format!("agent reported error: {}", error));
            if error == AUTHENTICATION_FAILED {
                return Err(AgentError::AuthenticationFailed);
            }
            return Err(AgentError::Cli(error.to_string()));
        }

        if self.session_id.is_none() {
            if let Some(ref sid) = record.session_id {
                log::debug!("agent reported session id {}", sid);
                self.session_id = Some(sid.clone());
            }
        }

        match record.kind() {
            RecordType::Assistant | RecordType::User => {
                let message = project_record(&record, &self.log)?;
                self.forwarded += 1;
                if let Some(callback) = self.callback.as_deref_mut() {
                    callback(message.clone());
                }
                Ok(LineOutcome::Forwarded(message))
            }
            RecordType::Result => classify_result(record),
            RecordType::System | RecordType::Other(_) => Ok(LineOutcome::Discarded),
        }
    }
}

impl Default for ClaudeParser<'_> {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse a whole stream, forwarding assistant/user messages to `callback`.
pub fn process_stream<R: BufRead>(
    reader: R,
    callback: Option<&mut dyn FnMut(StreamMessage)>,
) -> Result<serde_json::Value, AgentError> {
    let mut parser = ClaudeParser::new();
    if let Some(callback) = callback {
        parser = parser.with_callback(callback);
    }
    parser.run(reader)
}

/// A result is successful only if it is not flagged as an error, its subtype
/// is "success", and it carries a structured payload. `is_error` wins over a
/// success-looking subtype.
fn classify_result(record: StreamRecord) -> Result<LineOutcome, AgentError> {
    if !record.is_error && record.subtype == "success" {
        if let Some(output) = record.structured_output {
            return Ok(LineOutcome::Finished(output));
        }
    }

    Err(AgentError::ResultError {
        subtype: record.subtype,
        is_error: record.is_error,
        result: record.result.unwrap_or_default(),
    })
}

/// Reduce an assistant/user record to a single message built from its first
/// content block.
pub fn project_record(record: &StreamRecord, log: &SessionLog) -> Result<StreamMessage, AgentError> {
    let role = match record.kind() {
        RecordType::Assistant => StreamRole::Assistant,
        RecordType::User => StreamRole::User,
        _ => return Err(AgentError::UnexpectedRecord(record.record_type.clone())),
    };

    if let Some(declared) = record.role() {
        if declared != "assistant" && declared != "user" {
            log.warn("STREAM", &format!("unexpected stream message role: {}", declared));
            let raw = record
                .message
                .as_ref()
                .and_then(|m| serde_json::to_string(m).ok())
                .unwrap_or_default();
            return Ok(StreamMessage::new(role, ContentKind::Text, raw));
        }
    }

    let Some(block) = record.blocks().first() else {
        log.warn("STREAM", "stream message has no content blocks");
        return Ok(StreamMessage::new(role, ContentKind::Text, "empty stream message"));
    };

    Ok(StreamMessage::new(
        role,
        block_kind(block),
        normalize_newlines(&block_content(block, log)),
    ))
}

fn block_kind(block: &ContentBlock) -> ContentKind {
    match block.block_type.as_str() {
        "tool_use" => ContentKind::ToolCall,
        "tool_result" => ContentKind::ToolCallResult,
        "thinking" => ContentKind::Thinking,
        _ => ContentKind::Text,
    }
}

fn block_content(block: &ContentBlock, log: &SessionLog) -> String {
    match block.block_type.as_str() {
        "text" => non_empty(block.text.as_deref(), "empty text content", log),
        "thinking" => non_empty(block.thinking.as_deref(), "empty thinking content", log),
        "tool_use" => {
            let name = non_empty(block.name.as_deref(), "empty tool_use name", log);
            let input = block
                .input
                .as_ref()
                .map(render_structured)
                .unwrap_or_default();
            let input = non_empty(Some(&input), "empty tool_use input", log);
            format!("{}: {}", name, input)
        }
        "tool_result" => {
            let result = block
                .content
                .as_ref()
                .map(render_tool_result)
                .unwrap_or_default();
            non_empty(Some(&result), "empty tool_result content", log)
        }
        other => {
            log.warn("STREAM", &format!("unknown content block type: {}", other));
            serde_json::to_string(block).unwrap_or_else(|_| "failed to marshal content block".into())
        }
    }
}

fn non_empty(value: Option<&str>, placeholder: &str, log: &SessionLog) -> String {
    match value {
        Some(v) if !v.trim().is_empty() => v.to_string(),
        _ => {
            log.warn("STREAM", placeholder);
            placeholder.to_string()
        }
    }
}

/// YAML reads better than JSON for nested tool input; fall back to compact
/// JSON if YAML rendering fails.
fn render_structured(value: &serde_json::Value) -> String {
    if value.is_null() {
        return String::new();
    }
    match serde_yaml::to_string(value) {
        Ok(yaml) => yaml.trim_end().to_string(),
        Err(e) => {
            log::debug!("failed to render value as YAML: {}", e);
            value.to_string()
        }
    }
}

/// Tool results arrive either as a plain string or as an array of blocks.
/// Strings that themselves hold quoted, escaped text are unescaped.
fn render_tool_result(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => unquote(s).unwrap_or_else(|| s.clone()),
        other => render_structured(other),
    }
}

fn unquote(s: &str) -> Option<String> {
    let trimmed = s.trim();
    if trimmed.len() < 2 || !trimmed.starts_with('"') || !trimmed.ends_with('"') {
        return None;
    }
    serde_json::from_str::<String>(trimmed).ok()
}

fn normalize_newlines(s: &str) -> String {
    s.replace("\r\n", "\n").replace('\r', "\n")
}

// ============================================================================
// TESTS
// ============================================================================
