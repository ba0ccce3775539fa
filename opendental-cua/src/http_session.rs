//! Session collaborator backed by a remote computer-use agent service.
//!
//! The service exposes sessions as REST resources; running an instruction
//! answers with newline-delimited JSON chunks of the form
//! `{"output": [item, ...]}`.

use crate::errors::SessionError;
use crate::events::{AgentChunk, AgentEvent};
use crate::session::{
    AgentEventStream, AgentOptions, AutomationAgent, ConnectParams, RemoteSession,
    SessionConnector,
};
use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use serde::Deserialize;
use serde_json::json;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Debug, Deserialize)]
struct CreatedSession {
    session_id: String,
}

async fn ensure_success(
    response: reqwest::Response,
    map: fn(String) -> SessionError,
) -> Result<reqwest::Response, SessionError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(map(format!(
        "HTTP {}: {}",
        status.as_u16(),
        body.chars().take(200).collect::<String>()
    )))
}

#[derive(Clone)]
pub struct HttpSessionConnector {
    client: reqwest::Client,
    base_url: String,
}

impl HttpSessionConnector {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl SessionConnector for HttpSessionConnector {
    async fn connect(&self, params: &ConnectParams) -> Result<Box<dyn RemoteSession>, SessionError> {
        info!(
            "Connecting to {} sandbox '{}' via {}",
            params.kind, params.name, params.provider
        );

        let response = self
            .client
            .post(format!("{}/sessions", self.base_url))
            .bearer_auth(&params.credential)
            .json(&json!({
                "os_type": params.kind,
                "provider_type": params.provider,
                "name": params.name,
            }))
            .send()
            .await
            .map_err(|e| SessionError::Connect(e.to_string()))?;

        let created: CreatedSession = ensure_success(response, SessionError::Connect)
            .await?
            .json()
            .await
            .map_err(|e| SessionError::Connect(format!("Invalid session response: {e}")))?;

        debug!("Remote session created: {}", created.session_id);

        Ok(Box::new(HttpSession {
            client: self.client.clone(),
            session_url: format!("{}/sessions/{}", self.base_url, created.session_id),
            credential: params.credential.clone(),
            connected: true,
        }))
    }
}

pub struct HttpSession {
    client: reqwest::Client,
    session_url: String,
    credential: String,
    connected: bool,
}

#[async_trait]
impl RemoteSession for HttpSession {
    async fn start(&mut self) -> Result<(), SessionError> {
        if !self.connected {
            return Err(SessionError::NotConnected);
        }
        let response = self
            .client
            .post(format!("{}/start", self.session_url))
            .bearer_auth(&self.credential)
            .send()
            .await
            .map_err(|e| SessionError::Start(e.to_string()))?;
        ensure_success(response, SessionError::Start).await?;
        Ok(())
    }

    fn agent(
        &self,
        options: &AgentOptions,
        storage_root: &Path,
    ) -> Result<Box<dyn AutomationAgent>, SessionError> {
        if !self.connected {
            return Err(SessionError::NotConnected);
        }
        Ok(Box::new(HttpAgent {
            client: self.client.clone(),
            run_url: format!("{}/run", self.session_url),
            credential: self.credential.clone(),
            options: options.clone(),
            trajectory_dir: storage_root.to_path_buf(),
        }))
    }

    async fn disconnect(&mut self) -> Result<(), SessionError> {
        if !self.connected {
            return Ok(());
        }
        self.connected = false;
        let response = self
            .client
            .delete(&self.session_url)
            .bearer_auth(&self.credential)
            .send()
            .await
            .map_err(|e| SessionError::Disconnect(e.to_string()))?;
        ensure_success(response, SessionError::Disconnect).await?;
        Ok(())
    }
}

pub struct HttpAgent {
    client: reqwest::Client,
    run_url: String,
    credential: String,
    options: AgentOptions,
    trajectory_dir: PathBuf,
}

impl AutomationAgent for HttpAgent {
    fn run<'a>(&'a mut self, instruction: &'a str) -> AgentEventStream<'a> {
        let request = self
            .client
            .post(&self.run_url)
            .bearer_auth(&self.credential)
            .json(&json!({
                "messages": [{"role": "user", "content": instruction}],
                "options": self.options,
                "trajectory_dir": self.trajectory_dir.to_string_lossy(),
            }));

        ndjson_events(request).boxed()
    }
}

struct NdjsonState {
    request: Option<reqwest::RequestBuilder>,
    body: Option<BoxStream<'static, reqwest::Result<Vec<u8>>>>,
    buffer: Vec<u8>,
    pending: VecDeque<AgentEvent>,
    /// Fault reported once the events decoded before it are delivered
    failed: Option<SessionError>,
    done: bool,
}

impl NdjsonState {
    /// Moves every complete line in the buffer into `pending`.
    fn drain_lines(&mut self, flush: bool) -> Result<(), SessionError> {
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            self.push_line(&line)?;
        }
        if flush && !self.buffer.is_empty() {
            let line = std::mem::take(&mut self.buffer);
            self.push_line(&line)?;
        }
        Ok(())
    }

    fn push_line(&mut self, line: &[u8]) -> Result<(), SessionError> {
        let text = String::from_utf8_lossy(line);
        let text = text.trim();
        if text.is_empty() {
            return Ok(());
        }
        let chunk: AgentChunk = serde_json::from_str(text)
            .map_err(|e| SessionError::MalformedEvent(e.to_string()))?;
        self.pending.extend(chunk.into_events());
        Ok(())
    }
}

fn ndjson_events(
    request: reqwest::RequestBuilder,
) -> impl futures::Stream<Item = Result<AgentEvent, SessionError>> + Send + 'static {
    let state = NdjsonState {
        request: Some(request),
        body: None,
        buffer: Vec::new(),
        pending: VecDeque::new(),
        failed: None,
        done: false,
    };

    futures::stream::unfold(state, |mut st| async move {
        loop {
            if let Some(event) = st.pending.pop_front() {
                return Some((Ok(event), st));
            }
            if let Some(e) = st.failed.take() {
                return Some((Err(e), st));
            }
            if st.done {
                return None;
            }

            if let Some(request) = st.request.take() {
                let response = match request.send().await {
                    Ok(response) => response,
                    Err(e) => {
                        st.done = true;
                        return Some((Err(SessionError::from(e)), st));
                    }
                };
                match ensure_success(response, SessionError::Transport).await {
                    Ok(response) => {
                        st.body = Some(
                            response
                                .bytes_stream()
                                .map(|chunk| chunk.map(|b| b.to_vec()))
                                .boxed(),
                        );
                    }
                    Err(e) => {
                        st.done = true;
                        return Some((Err(e), st));
                    }
                }
                continue;
            }

            let Some(body) = st.body.as_mut() else {
                st.done = true;
                continue;
            };

            let step = match body.next().await {
                Some(Ok(bytes)) => {
                    st.buffer.extend_from_slice(&bytes);
                    st.drain_lines(false)
                }
                Some(Err(e)) => Err(SessionError::from(e)),
                None => {
                    st.done = true;
                    st.drain_lines(true)
                }
            };

            if let Err(e) = step {
                st.done = true;
                st.failed = Some(e);
            }
        }
    })
}
