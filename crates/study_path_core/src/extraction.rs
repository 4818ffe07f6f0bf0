//! crates/study_path_core/src/extraction.rs
//!
//! Pulls the single fenced JSON block out of generated text.
//!
//! Generated text is only trusted as a carrier: exactly one block opened by a
//! "```json" line and closed by a line holding only "```" must be present.
//! Anything else fails closed, and the typed shape of the value is left to
//! the calling stage.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExtractionError {
    #[error("No fenced JSON block found in the generated text")]
    BlockNotFound,
    #[error("Fenced JSON block is malformed: {reason}")]
    MalformedPayload { raw: String, reason: String },
}

fn fence_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        // The closing fence must sit on its own line; a JSON string cannot
        // hold a raw newline, so backticks inside values never close the block.
        Regex::new(r"(?si)```json[ \t]*\r?\n(?:(.*?)\r?\n)?[ \t]*```[ \t]*(?:\r?\n|$)")
            .expect("fence pattern is a valid regex")
    })
}

/// Extracts and parses the fenced JSON block of `text`.
pub fn extract(text: &str) -> Result<Value, ExtractionError> {
    let blocks: Vec<&str> = fence_pattern()
        .captures_iter(text)
        .map(|c| c.get(1).map_or("", |m| m.as_str()))
        .collect();

    let raw = match blocks.as_slice() {
        [] => {
            warn!("No fenced JSON block found in generated text.");
            return Err(ExtractionError::BlockNotFound);
        }
        [single] => single.trim(),
        _ => {
            warn!(count = blocks.len(), "Generated text holds more than one JSON block.");
            return Err(ExtractionError::MalformedPayload {
                raw: blocks.join("\n---\n"),
                reason: format!("expected exactly one JSON block, found {}", blocks.len()),
            });
        }
    };

    match serde_json::from_str::<Value>(raw) {
        Ok(value) => {
            debug!("Fenced JSON block decoded.");
            Ok(value)
        }
        Err(e) => {
            warn!(error = %e, raw = %raw, "Failed to decode fenced JSON block.");
            Err(ExtractionError::MalformedPayload {
                raw: raw.to_string(),
                reason: e.to_string(),
            })
        }
    }
}

/// Renders `value` the way `extract` expects to find it.
pub fn emit(value: &Value) -> String {
    let body = serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string());
    format!("```json\n{body}\n```\n")
}
