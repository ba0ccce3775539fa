use crate::session::{AgentOptions, ConnectParams};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_INFERENCE_URL: &str = "https://api.anthropic.com";
pub const DEFAULT_INFERENCE_MODEL: &str = "claude-sonnet-4-20250514";
pub const INFERENCE_API_VERSION: &str = "2023-06-01";
pub const DEFAULT_AGENT_MODEL: &str = "cua/anthropic/claude-sonnet-4.5";

/// How to reach and drive the remote desktop session.
#[derive(Clone)]
pub struct SessionSettings {
    pub kind: String,
    pub provider: String,
    pub sandbox_name: String,
    pub api_key: String,
    /// Base URL of the computer-use agent service
    pub agent_url: String,
    pub agent_model: String,
    pub only_n_most_recent_images: u32,
    pub max_trajectory_budget: f64,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            kind: "windows".to_string(),
            provider: "cloud".to_string(),
            sandbox_name: String::new(),
            api_key: String::new(),
            agent_url: "http://127.0.0.1:8001".to_string(),
            agent_model: DEFAULT_AGENT_MODEL.to_string(),
            only_n_most_recent_images: 2,
            max_trajectory_budget: 15.0,
        }
    }
}

impl SessionSettings {
    pub fn connect_params(&self) -> ConnectParams {
        ConnectParams {
            kind: self.kind.clone(),
            provider: self.provider.clone(),
            name: self.sandbox_name.clone(),
            credential: self.api_key.clone(),
        }
    }

    pub fn agent_options(&self, system_instructions: &str) -> AgentOptions {
        AgentOptions {
            model: self.agent_model.clone(),
            system_instructions: system_instructions.to_string(),
            only_n_most_recent_images: self.only_n_most_recent_images,
            max_trajectory_budget: self.max_trajectory_budget,
        }
    }
}

/// Settings for the vision inference endpoint.
#[derive(Clone)]
pub struct InferenceSettings {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub single_image_timeout: Duration,
    pub multi_image_timeout: Duration,
}

impl Default for InferenceSettings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: DEFAULT_INFERENCE_URL.to_string(),
            model: DEFAULT_INFERENCE_MODEL.to_string(),
            max_tokens: 4096,
            single_image_timeout: Duration::from_secs(60),
            multi_image_timeout: Duration::from_secs(90),
        }
    }
}

impl InferenceSettings {
    pub fn timeout_for(&self, image_count: usize) -> Duration {
        if image_count > 1 {
            self.multi_image_timeout
        } else {
            self.single_image_timeout
        }
    }
}

#[derive(Clone)]
pub struct Settings {
    pub session: SessionSettings,
    pub inference: InferenceSettings,
    /// Directory under which each run gets its own trajectory folder
    pub trajectory_root: PathBuf,
    /// Capacity of the queue feeding a live log listener
    pub log_queue_capacity: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            session: SessionSettings::default(),
            inference: InferenceSettings::default(),
            trajectory_root: PathBuf::from("trajectories"),
            log_queue_capacity: 256,
        }
    }
}
