//! Canonical event model and backend stream parsing.
//!
//! Every backend emits JSON-line output in its own dialect. The stream
//! parser converts those lines into [`CanonicalEvent`] values so the rest
//! of the pipeline never sees backend-specific payloads.
//!
//! The parser is tolerant by design: unrecognized JSON objects become
//! opaque [`CanonicalEvent::Text`] events, malformed lines are logged and
//! skipped, and over-long lines are truncated with a warning event.

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Maximum accepted length for a single stdout line. Longer lines are
/// truncated and flagged with a [`CanonicalEvent::Truncated`] event.
pub const MAX_LINE_BYTES: usize = 1024 * 1024;

/// Normalized event emitted by the stream parser.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CanonicalEvent {
    /// A chunk of agent prose. `last` marks the terminator of a message.
    AgentMessage {
        /// Message text (possibly one fragment of a larger message)
        text: String,
        /// Whether the backend marked this fragment as final
        last: bool,
    },
    /// A tool invocation reported by the backend, kept opaque.
    ToolCall {
        /// Raw backend payload
        payload: Value,
    },
    /// The backend announced a session identifier.
    Session {
        /// Opaque session id usable with the resume flow
        id: String,
    },
    /// Token usage accounting, kept opaque.
    Usage {
        /// Raw backend payload
        payload: Value,
    },
    /// The backend reported an error.
    Error {
        /// Error message text
        message: String,
    },
    /// A non-JSON or unrecognized line, retained verbatim.
    Text {
        /// Raw line content
        raw: String,
    },
    /// A line exceeded [`MAX_LINE_BYTES`] and was cut short.
    Truncated {
        /// Original byte length of the offending line
        length: usize,
    },
}

/// Output dialect spoken by a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParserStyle {
    /// Codex JSON lines: `{"type":"agent_message","text":...,"final":...}`.
    Codex,
    /// Claude stream-json: `system`/`assistant`/`result` envelopes.
    Claude,
    /// Gemini JSON lines, close to the Codex shape.
    Gemini,
    /// OpenCode JSON lines, close to the Codex shape.
    Opencode,
}

/// Line-oriented parser turning one backend's stdout into canonical events.
///
/// The parser accumulates agent-message fragments until the backend marks a
/// terminator; [`StreamParser::finish`] flushes a trailing unterminated
/// message once the stream ends.
#[derive(Debug)]
pub struct StreamParser {
    style: ParserStyle,
    pending: String,
}

impl StreamParser {
    /// Create a parser for the given backend dialect.
    pub fn new(style: ParserStyle) -> Self {
        Self {
            style,
            pending: String::new(),
        }
    }

    /// Parse one stdout line into zero or more canonical events.
    pub fn parse_line(&mut self, line: &str) -> Vec<CanonicalEvent> {
        let mut events = Vec::new();

        let line = if line.len() > MAX_LINE_BYTES {
            warn!("stdout line of {} bytes truncated", line.len());
            events.push(CanonicalEvent::Truncated { length: line.len() });
            // cut on a char boundary at or below the cap
            let mut end = MAX_LINE_BYTES;
            while !line.is_char_boundary(end) {
                end -= 1;
            }
            &line[..end]
        } else {
            line
        };

        let trimmed = line.trim();
        if trimmed.is_empty() {
            return events;
        }

        let value: Value = match serde_json::from_str(trimmed) {
            Ok(v) => v,
            Err(e) => {
                debug!("non-JSON stdout line retained as text: {}", e);
                events.push(CanonicalEvent::Text {
                    raw: line.to_string(),
                });
                return events;
            }
        };

        if !value.is_object() {
            events.push(CanonicalEvent::Text {
                raw: line.to_string(),
            });
            return events;
        }

        match self.style {
            ParserStyle::Claude => self.classify_claude(&value, &mut events),
            ParserStyle::Codex | ParserStyle::Gemini | ParserStyle::Opencode => {
                self.classify_json_lines(&value, &mut events)
            }
        }
        events
    }

    /// Flush a trailing unterminated agent message, if any.
    pub fn finish(&mut self) -> Option<CanonicalEvent> {
        if self.pending.is_empty() {
            return None;
        }
        let text = std::mem::take(&mut self.pending);
        Some(CanonicalEvent::AgentMessage { text, last: false })
    }

    /// Classify the common `{"type": ...}` JSON-line dialect.
    fn classify_json_lines(&mut self, value: &Value, events: &mut Vec<CanonicalEvent>) {
        let event_type = value.get("type").and_then(Value::as_str).unwrap_or("");
        match event_type {
            "agent_message" | "message" | "assistant_message" => {
                let text = value
                    .get("text")
                    .or_else(|| value.get("content"))
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                let last = value
                    .get("final")
                    .or_else(|| value.get("last"))
                    .and_then(Value::as_bool)
                    .unwrap_or(false);
                self.push_message(text, last, events);
            }
            "tool_call" | "tool_use" | "function_call" => {
                events.push(CanonicalEvent::ToolCall {
                    payload: value.clone(),
                });
            }
            "session" | "thread.started" | "session.created" => {
                if let Some(id) = session_id_of(value) {
                    events.push(CanonicalEvent::Session { id });
                }
            }
            "usage" | "token_count" | "token_usage" => {
                events.push(CanonicalEvent::Usage {
                    payload: value.clone(),
                });
            }
            "error" => {
                let message = value
                    .get("message")
                    .or_else(|| value.get("error"))
                    .and_then(Value::as_str)
                    .unwrap_or("unspecified backend error")
                    .to_string();
                events.push(CanonicalEvent::Error { message });
            }
            _ => {
                // Unknown object type: keep the raw payload as opaque text.
                events.push(CanonicalEvent::Text {
                    raw: value.to_string(),
                });
            }
        }
    }

    /// Classify the Claude stream-json dialect.
    fn classify_claude(&mut self, value: &Value, events: &mut Vec<CanonicalEvent>) {
        let event_type = value.get("type").and_then(Value::as_str).unwrap_or("");
        match event_type {
            "system" => {
                if let Some(id) = session_id_of(value) {
                    events.push(CanonicalEvent::Session { id });
                }
            }
            "assistant" => {
                // assistant envelopes carry content blocks; text blocks are
                // fragments of the running agent message
                if let Some(blocks) = value
                    .pointer("/message/content")
                    .and_then(Value::as_array)
                {
                    for block in blocks {
                        match block.get("type").and_then(Value::as_str) {
                            Some("text") => {
                                let text =
                                    block.get("text").and_then(Value::as_str).unwrap_or_default();
                                self.push_message(text, false, events);
                            }
                            Some("tool_use") => events.push(CanonicalEvent::ToolCall {
                                payload: block.clone(),
                            }),
                            _ => {}
                        }
                    }
                }
                if let Some(usage) = value.pointer("/message/usage") {
                    events.push(CanonicalEvent::Usage {
                        payload: usage.clone(),
                    });
                }
            }
            "result" => {
                if let Some(id) = session_id_of(value) {
                    events.push(CanonicalEvent::Session { id });
                }
                let text = value
                    .get("result")
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                self.push_message(text, true, events);
            }
            "error" => {
                let message = value
                    .get("message")
                    .or_else(|| value.get("error"))
                    .and_then(Value::as_str)
                    .unwrap_or("unspecified backend error")
                    .to_string();
                events.push(CanonicalEvent::Error { message });
            }
            _ => {
                events.push(CanonicalEvent::Text {
                    raw: value.to_string(),
                });
            }
        }
    }

    /// Fold a message fragment into the running message, emitting the
    /// completed message when the terminator arrives.
    fn push_message(&mut self, text: &str, last: bool, events: &mut Vec<CanonicalEvent>) {
        if last {
            let mut full = std::mem::take(&mut self.pending);
            if full.is_empty() {
                full = text.to_string();
            } else if !text.is_empty() {
                full.push_str(text);
            }
            events.push(CanonicalEvent::AgentMessage {
                text: full,
                last: true,
            });
        } else if !text.is_empty() {
            self.pending.push_str(text);
            events.push(CanonicalEvent::AgentMessage {
                text: text.to_string(),
                last: false,
            });
        }
    }
}

/// Pull a session identifier out of any of the usual key spellings.
fn session_id_of(value: &Value) -> Option<String> {
    for key in ["session_id", "sessionId", "thread_id", "id"] {
        if let Some(id) = value.get(key).and_then(Value::as_str) {
            if !id.is_empty() {
                return Some(id.to_string());
            }
        }
    }
    None
}

/// Derive the final agent message from a parsed event sequence.
///
/// Returns the last terminated agent message, or the concatenation of all
/// fragments when the backend never marked one final.
pub fn final_agent_message(events: &[CanonicalEvent]) -> String {
    let mut last_final: Option<&str> = None;
    for event in events {
        if let CanonicalEvent::AgentMessage { text, last: true } = event {
            last_final = Some(text);
        }
    }
    if let Some(text) = last_final {
        return text.to_string();
    }
    let mut merged = String::new();
    for event in events {
        if let CanonicalEvent::AgentMessage { text, last: false } = event {
            merged.push_str(text);
        }
    }
    merged
}

/// Derive the last announced session id from a parsed event sequence.
pub fn session_id(events: &[CanonicalEvent]) -> Option<String> {
    events.iter().rev().find_map(|event| match event {
        CanonicalEvent::Session { id } => Some(id.clone()),
        _ => None,
    })
}
