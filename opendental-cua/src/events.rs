use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

/// One streamed response from the automation agent. A chunk may carry
/// several output items.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentChunk {
    #[serde(default)]
    pub output: Vec<Value>,
}

impl AgentChunk {
    /// Decodes the output items in order. Items that do not match a known
    /// shape become [`AgentEvent::Unknown`].
    pub fn into_events(self) -> Vec<AgentEvent> {
        self.output
            .into_iter()
            .map(|item| {
                serde_json::from_value(item).unwrap_or_else(|e| {
                    debug!("Ignoring undecodable agent item: {}", e);
                    AgentEvent::Unknown
                })
            })
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TextBlock {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_text: Option<String>,
}

impl TextBlock {
    pub fn as_text(&self) -> Option<&str> {
        self.text
            .as_deref()
            .filter(|t| !t.is_empty())
            .or_else(|| self.output_text.as_deref().filter(|t| !t.is_empty()))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutputContent {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl OutputContent {
    fn screenshot_url(&self) -> Option<&str> {
        match self.kind.as_str() {
            "computer_screenshot" | "input_image" => {
                self.image_url.as_deref().filter(|u| !u.is_empty())
            }
            _ => None,
        }
    }
}

/// Input action taken on the remote desktop. Only the kind is retained;
/// payloads can contain on-screen text and are dropped on decode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionSummary {
    #[serde(rename = "type", default = "unknown_action")]
    pub kind: String,
}

impl Default for ActionSummary {
    fn default() -> Self {
        Self {
            kind: unknown_action(),
        }
    }
}

fn unknown_action() -> String {
    "unknown".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AgentEvent {
    /// Free-text commentary from the agent.
    #[serde(rename = "message")]
    Narration {
        #[serde(default)]
        content: Vec<TextBlock>,
    },

    /// Result of an action, possibly carrying a screenshot.
    #[serde(rename = "computer_call_output")]
    ScreenshotOutput {
        #[serde(default)]
        content: Vec<OutputContent>,
    },

    #[serde(rename = "computer_call")]
    Action {
        #[serde(default)]
        action: ActionSummary,
    },

    #[serde(other)]
    Unknown,
}

impl AgentEvent {
    pub fn narration(text: impl Into<String>) -> Self {
        AgentEvent::Narration {
            content: vec![TextBlock {
                text: Some(text.into()),
                output_text: None,
            }],
        }
    }

    pub fn screenshot(image_url: impl Into<String>) -> Self {
        AgentEvent::ScreenshotOutput {
            content: vec![OutputContent {
                kind: "computer_screenshot".to_string(),
                image_url: Some(image_url.into()),
            }],
        }
    }

    pub fn action(kind: impl Into<String>) -> Self {
        AgentEvent::Action {
            action: ActionSummary { kind: kind.into() },
        }
    }

    /// The last screenshot URL carried by this event, if any.
    pub fn screenshot_url(&self) -> Option<&str> {
        match self {
            AgentEvent::ScreenshotOutput { content } => {
                content.iter().filter_map(|c| c.screenshot_url()).last()
            }
            _ => None,
        }
    }
}
