//! Recovers a JSON record from a free-text model reply.
//!
//! Tiers are tried in order and the first that parses wins:
//! the whole reply, a fenced code block, then the outermost `{ ... }` span.

use regex::Regex;
use serde_json::{json, Value};
use std::sync::OnceLock;
use tracing::{debug, error};

/// Marker placed in the payload when no tier could recover JSON.
pub const PARSE_ERROR_MARKER: &str = "Could not parse response";

/// Maximum number of characters of the raw reply kept for diagnosis.
pub const RAW_PREVIEW_CHARS: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryTier {
    Direct,
    FencedBlock,
    BraceSpan,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Recovery {
    Parsed { value: Value, tier: RecoveryTier },
    Unparsable { preview: String },
}

impl Recovery {
    /// Collapses the recovery into the payload handed back to callers.
    pub fn into_value(self) -> Value {
        match self {
            Recovery::Parsed { value, .. } => value,
            Recovery::Unparsable { preview } => json!({
                "error": PARSE_ERROR_MARKER,
                "raw_response": preview,
            }),
        }
    }
}

fn fenced_block() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)```(?:json)?\s*(\{.*?\})\s*```").expect("fenced block pattern is valid")
    })
}

pub fn recover(reply: &str) -> Recovery {
    if let Ok(value) = serde_json::from_str::<Value>(reply) {
        return Recovery::Parsed {
            value,
            tier: RecoveryTier::Direct,
        };
    }

    if let Some(inner) = fenced_block().captures(reply).and_then(|c| c.get(1)) {
        match serde_json::from_str::<Value>(inner.as_str()) {
            Ok(value) => {
                return Recovery::Parsed {
                    value,
                    tier: RecoveryTier::FencedBlock,
                }
            }
            Err(e) => debug!("Fenced block did not parse: {}", e),
        }
    }

    if let (Some(start), Some(end)) = (reply.find('{'), reply.rfind('}')) {
        if start < end {
            if let Ok(value) = serde_json::from_str::<Value>(&reply[start..=end]) {
                return Recovery::Parsed {
                    value,
                    tier: RecoveryTier::BraceSpan,
                };
            }
        }
    }

    let preview: String = reply.chars().take(RAW_PREVIEW_CHARS).collect();
    error!("Could not parse JSON from response: {}", preview);
    Recovery::Unparsable { preview }
}
