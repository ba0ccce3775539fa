//! Narrow interface to the remote desktop session and its automation agent.
//!
//! The orchestrator only calls into these traits; it never manages the
//! session's internals.

use crate::errors::SessionError;
use crate::events::AgentEvent;
use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Parameters used to establish a remote session.
#[derive(Clone, Serialize, Deserialize)]
pub struct ConnectParams {
    /// Operating system of the sandbox, e.g. `windows`
    pub kind: String,
    /// Hosting provider, e.g. `cloud`
    pub provider: String,
    /// Sandbox name
    pub name: String,
    #[serde(skip_serializing)]
    pub credential: String,
}

impl fmt::Debug for ConnectParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectParams")
            .field("kind", &self.kind)
            .field("provider", &self.provider)
            .field("name", &self.name)
            .field("credential", &"<redacted>")
            .finish()
    }
}

/// How the automation agent bound to a session should behave.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentOptions {
    pub model: String,
    pub system_instructions: String,
    /// Number of most recent screenshots the agent keeps in its context
    pub only_n_most_recent_images: u32,
    /// Spend ceiling for one agent trajectory
    pub max_trajectory_budget: f64,
}

pub type AgentEventStream<'a> = BoxStream<'a, Result<AgentEvent, SessionError>>;

#[async_trait]
pub trait SessionConnector: Send + Sync {
    async fn connect(&self, params: &ConnectParams) -> Result<Box<dyn RemoteSession>, SessionError>;
}

#[async_trait]
pub trait RemoteSession: Send {
    /// Brings the session to a ready state.
    async fn start(&mut self) -> Result<(), SessionError>;

    /// Builds an automation agent bound to this session. Screenshots the agent
    /// persists are written under `storage_root`.
    fn agent(
        &self,
        options: &AgentOptions,
        storage_root: &Path,
    ) -> Result<Box<dyn AutomationAgent>, SessionError>;

    async fn disconnect(&mut self) -> Result<(), SessionError>;
}

pub trait AutomationAgent: Send {
    /// Dispatches one natural-language instruction and returns the live
    /// sequence of events it produces.
    fn run<'a>(&'a mut self, instruction: &'a str) -> AgentEventStream<'a>;
}
