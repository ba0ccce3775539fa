mod api;
mod run_manager;
mod types;
mod utils;
mod websocket;

use axum::{
    routing::{get, post},
    Router,
};
use clap::Parser;
use opendental_cua::{HttpSessionConnector, InferenceSettings, SessionSettings, Settings};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use run_manager::RunManager;

#[derive(Parser, Debug)]
#[command(name = "opendental-cua-server")]
#[command(about = "HTTP/WebSocket server that extracts Open Dental data through a computer-use agent")]
struct Args {
    /// Address to bind
    #[arg(long, env = "HOST", default_value = "127.0.0.1")]
    host: String,

    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value = "8000")]
    port: u16,

    /// Enable CORS for all origins
    #[arg(long)]
    cors: bool,

    /// Credential for the remote sandbox provider
    #[arg(long, env = "CUA_API_KEY", default_value = "", hide_env_values = true)]
    cua_api_key: String,

    /// Name of the remote sandbox running Open Dental
    #[arg(long, env = "CUA_SANDBOX_NAME", default_value = "")]
    sandbox_name: String,

    /// Base URL of the computer-use agent service
    #[arg(long, env = "CUA_AGENT_URL", default_value = "http://127.0.0.1:8001")]
    agent_url: String,

    #[arg(long, env = "CUA_AGENT_MODEL", default_value = opendental_cua::config::DEFAULT_AGENT_MODEL)]
    agent_model: String,

    /// Credential for the vision inference service
    #[arg(long, env = "ANTHROPIC_API_KEY", default_value = "", hide_env_values = true)]
    anthropic_api_key: String,

    #[arg(long, env = "INFERENCE_URL", default_value = opendental_cua::config::DEFAULT_INFERENCE_URL)]
    inference_url: String,

    #[arg(long, env = "INFERENCE_MODEL", default_value = opendental_cua::config::DEFAULT_INFERENCE_MODEL)]
    inference_model: String,

    #[arg(long, default_value = "4096")]
    max_tokens: u32,

    /// Inference timeout in seconds for a single screenshot
    #[arg(long, default_value = "60")]
    single_image_timeout: u64,

    /// Inference timeout in seconds for several screenshots
    #[arg(long, default_value = "90")]
    multi_image_timeout: u64,

    /// Directory where run trajectories are stored
    #[arg(long, env = "TRAJECTORY_ROOT", default_value = "trajectories")]
    trajectory_root: PathBuf,
}

impl Args {
    fn settings(&self) -> Settings {
        Settings {
            session: SessionSettings {
                sandbox_name: self.sandbox_name.clone(),
                api_key: self.cua_api_key.clone(),
                agent_url: self.agent_url.clone(),
                agent_model: self.agent_model.clone(),
                ..Default::default()
            },
            inference: InferenceSettings {
                api_key: self.anthropic_api_key.clone(),
                base_url: self.inference_url.clone(),
                model: self.inference_model.clone(),
                max_tokens: self.max_tokens,
                single_image_timeout: Duration::from_secs(self.single_image_timeout),
                multi_image_timeout: Duration::from_secs(self.multi_image_timeout),
            },
            trajectory_root: self.trajectory_root.clone(),
            ..Default::default()
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();
    let args = Args::parse();
    utils::init_logging()?;

    info!("Starting opendental-cua-server v{}", env!("CARGO_PKG_VERSION"));
    if args.sandbox_name.is_empty() {
        warn!("CUA_SANDBOX_NAME is not set");
    }
    if args.anthropic_api_key.is_empty() {
        warn!("ANTHROPIC_API_KEY is not set, extraction will fail");
    }

    let settings = args.settings();
    let connector = Arc::new(HttpSessionConnector::new(&settings.session.agent_url));
    let manager = Arc::new(RunManager::new(settings, connector));

    let mut app = Router::new()
        .route("/api/health", get(api::health))
        .route("/api/status", get(api::status))
        .route("/api/patients", post(api::patients))
        .route("/api/appointments", post(api::appointments))
        .route("/api/patient_chart", post(api::patient_chart))
        .route("/api/reports", post(api::reports))
        .route("/api/stop", post(api::stop))
        .route("/ws", get(websocket::websocket_handler))
        .with_state(manager)
        .layer(TraceLayer::new_for_http());

    if args.cors {
        app = app.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );
    }

    let addr = format!("{}:{}", args.host, args.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Server listening on http://{}", addr);
    info!("WebSocket endpoint: ws://{}/ws", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
