//! Application configuration loaded from environment variables.

use crate::errors::{ApiError, Result};
use crate::pricing::Pricing;

/// Which backend stores uploaded payment proofs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProofBackend {
    /// Relay the image through the Apps Script endpoint (`saveProof`).
    Sheets,
    /// Upload directly to Google Drive with a service account.
    Drive,
}

/// Shared-secret target for the spreadsheet service.
#[derive(Debug, Clone)]
pub struct AppsScript {
    /// Apps Script web-app URL (the GAS `/exec` endpoint)
    pub url: String,
    /// Shared secret passed in the query string
    pub token: String,
}

/// Service-account credentials for the Drive backend.
#[derive(Debug, Clone)]
pub struct DriveCredentials {
    pub client_email: String,
    /// PEM-encoded RSA private key (newlines may be escaped as `\n`)
    pub private_key: String,
    /// Destination folder for uploaded proofs
    pub folder_id: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Spreadsheet service target; `None` disables sheet writes (degraded mode)
    pub apps_script: Option<AppsScript>,
    /// Selected proof storage backend
    pub proof_backend: ProofBackend,
    /// Drive credentials, required when `proof_backend` is `Drive`
    pub drive: Option<DriveCredentials>,
    /// Port for the REST API server
    pub api_port: u16,
    /// Bound on every outbound call to the spreadsheet/storage services
    pub upstream_timeout_secs: u64,
    /// Ticket pricing tiers
    pub pricing: Pricing,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let apps_script = match (env_var("APPS_SCRIPT_URL"), env_var("APPS_SCRIPT_TOKEN")) {
            (Ok(url), Ok(token)) => Some(AppsScript { url, token }),
            (Err(_), Err(_)) => None,
            _ => {
                return Err(ApiError::Config(
                    "APPS_SCRIPT_URL and APPS_SCRIPT_TOKEN must be set together".to_string(),
                ))
            }
        };

        let proof_backend = match env_var("PROOF_STORE")
            .unwrap_or_else(|_| "sheets".to_string())
            .as_str()
        {
            "sheets" => ProofBackend::Sheets,
            "drive" => ProofBackend::Drive,
            other => {
                return Err(ApiError::Config(format!(
                    "Invalid PROOF_STORE '{other}' (expected 'sheets' or 'drive')"
                )))
            }
        };

        let drive = if proof_backend == ProofBackend::Drive {
            Some(DriveCredentials {
                client_email: env_var("GDRIVE_CLIENT_EMAIL")?,
                // Deployment environments often store the PEM with literal "\n".
                private_key: env_var("GDRIVE_PRIVATE_KEY")?.replace("\\n", "\n"),
                folder_id: env_var("GDRIVE_FOLDER_ID")?,
            })
        } else {
            None
        };

        Ok(Config {
            apps_script,
            proof_backend,
            drive,
            api_port: env_var("API_PORT")
                .unwrap_or_else(|_| "3001".to_string())
                .parse()
                .map_err(|_| ApiError::Config("Invalid API_PORT".to_string()))?,
            upstream_timeout_secs: env_var("UPSTREAM_TIMEOUT_SECS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .map_err(|_| ApiError::Config("Invalid UPSTREAM_TIMEOUT_SECS".to_string()))?,
            pricing: pricing_from_env()?,
        })
    }
}

fn pricing_from_env() -> Result<Pricing> {
    let defaults = Pricing::default();
    Ok(Pricing {
        member: env_price("MEMBER_PRICE", defaults.member)?,
        base: env_price("BASE_PRICE", defaults.base)?,
        surge: env_price("SURGE_PRICE", defaults.surge)?,
        threshold: match env_var("NON_MEMBER_THRESHOLD") {
            Ok(v) => v
                .parse()
                .map_err(|_| ApiError::Config("Invalid NON_MEMBER_THRESHOLD".to_string()))?,
            Err(_) => defaults.threshold,
        },
        member_university: env_var("MEMBER_UNIVERSITY").unwrap_or(defaults.member_university),
    })
}

fn env_price(key: &str, default: u32) -> Result<u32> {
    match env_var(key) {
        Ok(v) => v
            .parse()
            .map_err(|_| ApiError::Config(format!("Invalid {key}"))),
        Err(_) => Ok(default),
    }
}

fn env_var(key: &str) -> Result<String> {
    std::env::var(key)
        .ok()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::Config(format!("Missing env var: {key}")))
}
