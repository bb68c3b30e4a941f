//! Registration backend — entry point.
//!
//! Loads configuration from the environment, wires the spreadsheet client
//! and the selected proof storage backend, and serves the Axum REST API.

use std::sync::Arc;

use reqwest::Client;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use registrar::api::{self, ApiState};
use registrar::config::{Config, ProofBackend};
use registrar::sheets::SheetsClient;
use registrar::storage::{AppsScriptStore, DriveStore, ProofStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialise structured logging (RUST_LOG controls verbosity).
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // Load optional .env file (ignored if missing).
    let _ = dotenvy::dotenv();

    // Load config from environment.
    let config = Config::from_env().map_err(|e| anyhow::anyhow!("{e}"))?;

    // HTTP client shared by the spreadsheet client and storage backends;
    // every outbound call runs under this timeout.
    let client = Client::builder()
        .timeout(std::time::Duration::from_secs(config.upstream_timeout_secs))
        .build()?;

    let sheets = config
        .apps_script
        .as_ref()
        .map(|target| SheetsClient::new(client.clone(), target));
    if sheets.is_none() {
        warn!("APPS_SCRIPT_URL/APPS_SCRIPT_TOKEN not set; spreadsheet writes disabled");
    }

    let store: Option<Arc<dyn ProofStore>> = match config.proof_backend {
        ProofBackend::Drive => {
            let creds = config
                .drive
                .clone()
                .ok_or_else(|| anyhow::anyhow!("PROOF_STORE=drive requires GDRIVE_* credentials"))?;
            Some(Arc::new(DriveStore::new(client.clone(), creds)))
        }
        ProofBackend::Sheets => sheets
            .clone()
            .map(|sheets| Arc::new(AppsScriptStore::new(sheets)) as Arc<dyn ProofStore>),
    };
    match &store {
        Some(store) => info!("Proof storage backend: {}", store.name()),
        None => warn!("No proof storage backend available; image confirmations will fail"),
    }

    let state = Arc::new(ApiState {
        config: config.clone(),
        sheets,
        store,
    });

    let app = api::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr = format!("0.0.0.0:{}", config.api_port);
    info!("API listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
