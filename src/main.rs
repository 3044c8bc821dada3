//! Manuscript server - research manuscript authoring over HTTP.
//!
//! The application is organized into the following modules:
//!
//! - `models`: Projects, papers, questions and request bodies
//! - `citations`: Bibliography and in-text citation formatting
//! - `editor`: The rich-text surface and its section binding
//! - `search`: The source panel and the cite operation
//! - `suggest`: Debounced topic and query suggestions
//! - `workflow`: Landing, setup and library navigation
//! - `store`: sled-backed persistence
//! - `handlers`: HTTP route handlers

use std::process::ExitCode;
use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use manuscript::{app, config::Config, AppState};

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env();
    let bind = config.bind.clone();

    let state = match AppState::new(config) {
        Ok(state) => Arc::new(state),
        Err(e) => {
            error!(error = %e, "Failed to open the project database");
            return ExitCode::FAILURE;
        }
    };

    let listener = match tokio::net::TcpListener::bind(&bind).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(error = %e, bind = %bind, "Failed to bind");
            return ExitCode::FAILURE;
        }
    };

    info!("Manuscript server running at http://{}", bind);
    info!(db = %state.config.db_path, "Project database");

    if let Err(e) = axum::serve(listener, app(state)).await {
        error!(error = %e, "Server error");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
