use crate::cancellation::with_cancellation;
use crate::errors::SessionError;
use crate::events::AgentEvent;
use crate::image::ImageRef;
use crate::log_sink::{LogEntry, LogSink};
use crate::screenshot::normalize_streamed;
use crate::session::AutomationAgent;
use futures::StreamExt;
use tokio_util::sync::CancellationToken;

/// Narration is cut to this many characters before it is logged.
pub const NARRATION_PREVIEW_CHARS: usize = 200;

/// What one step produced.
#[derive(Debug, Clone, Default)]
pub struct StepOutcome {
    pub screenshot: Option<ImageRef>,
    /// Entries recorded while the step ran, in append order
    pub logs: Vec<LogEntry>,
}

fn preview(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

/// Drains the agent's event stream for one instruction.
///
/// Narration and actions are logged as they arrive; the last screenshot seen
/// becomes the step's candidate. Draining stops early once `cancel` fires,
/// without attempting to cancel anything already running remotely. A transport
/// fault is returned as an error; entries logged before it stay in `sink`.
pub async fn consume(
    agent: &mut dyn AutomationAgent,
    instructions: &str,
    sink: &mut LogSink,
    cancel: &CancellationToken,
) -> Result<StepOutcome, SessionError> {
    let first_entry = sink.len();
    let mut candidate: Option<ImageRef> = None;
    let mut events = agent.run(instructions);

    loop {
        if cancel.is_cancelled() {
            sink.info("Stop requested, no longer waiting on the agent");
            break;
        }

        let Some(next) = with_cancellation(cancel, events.next()).await else {
            continue;
        };
        let Some(event) = next else {
            break;
        };

        match event? {
            AgentEvent::Narration { content } => {
                for text in content.iter().filter_map(|block| block.as_text()) {
                    sink.info(format!(
                        "Agent: {}...",
                        preview(text, NARRATION_PREVIEW_CHARS)
                    ));
                }
            }
            event @ AgentEvent::ScreenshotOutput { .. } => {
                if let Some(url) = event.screenshot_url() {
                    candidate = Some(normalize_streamed(url));
                    sink.info("Screenshot captured");
                }
            }
            AgentEvent::Action { action } => {
                sink.info(format!("Executing: {}", action.kind));
            }
            AgentEvent::Unknown => {}
        }
    }

    Ok(StepOutcome {
        screenshot: candidate,
        logs: sink.entries()[first_entry..].to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::MediaType;
    use crate::session::AgentEventStream;
    use futures::stream;

    struct ScriptedAgent {
        events: Vec<Result<AgentEvent, SessionError>>,
    }

    impl AutomationAgent for ScriptedAgent {
        fn run<'a>(&'a mut self, _instruction: &'a str) -> AgentEventStream<'a> {
            stream::iter(std::mem::take(&mut self.events)).boxed()
        }
    }

    fn messages(outcome: &StepOutcome) -> Vec<String> {
        outcome.logs.iter().map(|e| e.message.clone()).collect()
    }

    #[tokio::test]
    async fn test_last_screenshot_wins() {
        let mut agent = ScriptedAgent {
            events: vec![
                Ok(AgentEvent::screenshot("data:image/png;base64,Rmlyc3Q=")),
                Ok(AgentEvent::action("click")),
                Ok(AgentEvent::screenshot("data:image/jpeg;base64,U2Vjb25k")),
            ],
        };
        let mut sink = LogSink::new("test");
        let outcome = consume(&mut agent, "go", &mut sink, &CancellationToken::new())
            .await
            .unwrap();

        let shot = outcome.screenshot.clone().unwrap();
        assert_eq!(shot.data, "U2Vjb25k");
        assert_eq!(shot.media_type, MediaType::Jpeg);
        assert_eq!(
            messages(&outcome),
            vec!["Screenshot captured", "Executing: click", "Screenshot captured"]
        );
    }

    #[tokio::test]
    async fn test_narration_is_truncated_and_actions_hide_payload() {
        let long = "x".repeat(500);
        let mut agent = ScriptedAgent {
            events: vec![
                Ok(AgentEvent::narration(long)),
                Ok(serde_json::from_value(serde_json::json!({
                    "type": "computer_call",
                    "action": {"type": "type", "text": "123-45-6789"}
                }))
                .unwrap()),
                Ok(AgentEvent::Unknown),
            ],
        };
        let mut sink = LogSink::new("test");
        sink.info("before the step");
        let outcome = consume(&mut agent, "go", &mut sink, &CancellationToken::new())
            .await
            .unwrap();

        let logged = messages(&outcome);
        assert_eq!(logged.len(), 2);
        assert_eq!(logged[0], format!("Agent: {}...", "x".repeat(200)));
        assert_eq!(logged[1], "Executing: type");
        assert!(!logged.iter().any(|m| m.contains("123-45-6789")));
        assert!(outcome.screenshot.is_none());
        assert_eq!(sink.len(), 3);
    }

    #[tokio::test]
    async fn test_transport_fault_keeps_earlier_logs() {
        let mut agent = ScriptedAgent {
            events: vec![
                Ok(AgentEvent::action("screenshot")),
                Err(SessionError::Transport("connection reset".to_string())),
                Ok(AgentEvent::action("click")),
            ],
        };
        let mut sink = LogSink::new("test");
        let result = consume(&mut agent, "go", &mut sink, &CancellationToken::new()).await;

        assert!(matches!(result, Err(SessionError::Transport(_))));
        assert_eq!(sink.len(), 1);
        assert_eq!(sink.entries()[0].message, "Executing: screenshot");
    }

    #[tokio::test]
    async fn test_cancelled_token_stops_draining() {
        let mut agent = ScriptedAgent {
            events: vec![Ok(AgentEvent::screenshot("QUJD"))],
        };
        let token = CancellationToken::new();
        token.cancel();
        let mut sink = LogSink::new("test");
        let outcome = consume(&mut agent, "go", &mut sink, &token).await.unwrap();

        assert!(outcome.screenshot.is_none());
        assert_eq!(
            messages(&outcome),
            vec!["Stop requested, no longer waiting on the agent"]
        );
    }
}
