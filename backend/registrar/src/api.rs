//! Axum REST API handlers.
//!
//! Every failure is converted to the `{ ok: false, error }` JSON shape at
//! this boundary; nothing propagates as an unhandled fault. Statuses:
//! 200 success, 400 validation / malformed proof, 500 missing server
//! configuration, 502 upstream failure.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Local;
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::config::Config;
use crate::errors::{ApiError, Result};
use crate::model::{ConfirmRequest, RegisterRequest};
use crate::pricing::Tier;
use crate::proof::ProofArtifact;
use crate::reference::final_reference;
use crate::sheets::{PaidRow, RegistrationRow, SheetsClient};
use crate::storage::ProofStore;

pub struct ApiState {
    pub config: Config,
    /// `None` when the Apps Script pair is absent from the environment
    pub sheets: Option<SheetsClient>,
    /// `None` when the selected backend is unusable without the Apps Script
    /// pair; image confirmations then fail with a configuration error
    pub store: Option<Arc<dyn ProofStore>>,
}

pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/register", post(register))
        .route("/api/confirm-payment", post(confirm_payment))
        .with_state(state)
}

// ─────────────────────────────────────────────────────────
// Response shapes
// ─────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OkResponse {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_reference: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sheet_warning: Option<String>,
}

impl OkResponse {
    fn ok() -> Self {
        OkResponse {
            ok: true,
            final_reference: None,
            sheet_warning: None,
        }
    }
}

// ─────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────

/// `GET /health`
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// `POST /api/register`
///
/// Validates the sign-up and appends a registration/intent row. Stateless:
/// an upstream failure leaves nothing to clean up and the client may simply
/// resubmit.
pub async fn register(
    State(state): State<Arc<ApiState>>,
    payload: std::result::Result<Json<Value>, JsonRejection>,
) -> Result<Json<OkResponse>> {
    let body = read_json(payload)?;
    let req = RegisterRequest::parse(&body)?;

    let sheets = state.sheets.as_ref().ok_or_else(sheets_not_configured)?;

    let row = RegistrationRow {
        name: &req.name,
        telegram: &req.telegram,
        phone: &req.phone,
        matric: &req.matric,
        university: &req.university,
        remarks: &req.remarks,
        is_member: req.is_member,
        price: req.price,
        payment_ref: req.payment_ref.as_deref(),
        submitted_at: Local::now().to_rfc3339(),
        event: req.event.as_ref(),
    };
    sheets.append_registration(&row).await?;

    info!("Registered {} ({})", req.name, req.university);
    Ok(Json(OkResponse::ok()))
}

/// `POST /api/confirm-payment`
///
/// Decodes and stores the proof artifact, derives the final reference from
/// the server clock, and appends the paid row keyed by that reference.
/// Once a proof image is stored, a failed append degrades to a
/// `sheetWarning` rather than failing the whole request.
pub async fn confirm_payment(
    State(state): State<Arc<ApiState>>,
    payload: std::result::Result<Json<Value>, JsonRejection>,
) -> Result<Json<OkResponse>> {
    let body = read_json(payload)?;
    let req = ConfirmRequest::parse(&body)?;

    let artifact = ProofArtifact::from_parts(
        req.typed_reference.as_deref(),
        req.proof_data_url.as_deref(),
    )?;

    let now = Local::now();
    let final_ref = final_reference(&req.name, &req.phone, now.date_naive());

    let stored = match artifact.image() {
        Some(image) => {
            let store = state.store.as_ref().ok_or_else(sheets_not_configured)?;
            let filename = format!("{final_ref}.{}", image.extension());
            let description = format!("Payment proof {final_ref} for {}", req.name);
            let stored = store.store(image, &filename, &description).await?;
            info!("Stored proof {} via {}", stored.name, store.name());
            Some(stored)
        }
        None => None,
    };

    // The durable counter lives in the spreadsheet; recompute the tier at
    // confirmation time, best-effort. The declared price stays on the row
    // as the amount actually paid.
    let tier = confirmed_tier(&state, req.is_member).await;

    let mut sheet_warning = None;
    match &state.sheets {
        Some(sheets) => {
            let row = PaidRow {
                name: &req.name,
                phone: &req.phone,
                university: &req.university,
                is_member: req.is_member,
                price: req.price,
                tier,
                paynow_reference_typed: req.typed_reference.as_deref(),
                paid_at: now.to_rfc3339(),
                client_paid_at: req.paid_at.as_deref(),
                final_ref: &final_ref,
                dedupe_key: &final_ref,
                proof_file_id: stored.as_ref().map(|p| p.id.as_str()),
                proof_file_name: stored.as_ref().map(|p| p.name.as_str()),
                event: req.event.as_ref(),
            };
            if let Err(e) = sheets.append_paid(&row).await {
                if stored.is_some() {
                    // The stored proof is the durable record; bookkeeping
                    // can be reconciled later.
                    warn!("Paid row append failed after upload: {e}");
                    sheet_warning = Some(e.to_string());
                } else {
                    return Err(e);
                }
            }
        }
        None => {
            if stored.is_some() {
                sheet_warning =
                    Some("Spreadsheet service not configured; proof stored only".to_string());
            } else {
                return Err(sheets_not_configured());
            }
        }
    }

    info!("Confirmed payment {final_ref}");
    Ok(Json(OkResponse {
        ok: true,
        final_reference: Some(final_ref),
        sheet_warning,
    }))
}

async fn confirmed_tier(state: &ApiState, is_member: bool) -> Option<Tier> {
    if is_member {
        return Some(Tier::Member);
    }
    match &state.sheets {
        Some(sheets) => match sheets.non_member_count().await {
            Ok(count) => Some(state.config.pricing.tier_for(false, count)),
            Err(e) => {
                warn!("Non-member count unavailable: {e}");
                None
            }
        },
        None => None,
    }
}

fn read_json(payload: std::result::Result<Json<Value>, JsonRejection>) -> Result<Value> {
    match payload {
        Ok(Json(body)) => Ok(body),
        Err(rejection) => Err(ApiError::Validation(format!(
            "Invalid JSON body: {rejection}"
        ))),
    }
}

fn sheets_not_configured() -> ApiError {
    ApiError::Config("Apps Script URL/token not set on server".to_string())
}
