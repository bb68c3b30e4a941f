//! Apps Script spreadsheet client.
//!
//! The spreadsheet service is a single Google Apps Script web-app endpoint.
//! Every call carries the shared-secret token in the query string and an
//! `action` discriminator; responses are JSON with an `ok` boolean.
//!
//! Rows are append-only. The paid row carries a `dedupeKey` (the final
//! reference) so a same-day resubmission does not create a duplicate.
//!
//! Transport errors are stringified via [`reqwest::Error::without_url`] so
//! the token never leaks into a client-visible error payload.

use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::AppsScript;
use crate::errors::{ApiError, Result};
use crate::model::EventInfo;
use crate::pricing::Tier;
use crate::storage::StoredProof;

/// How much of a non-JSON upstream body to keep in an error message.
const RAW_BODY_LIMIT: usize = 200;

#[derive(Debug, Clone)]
pub struct SheetsClient {
    http: Client,
    url: String,
    token: String,
}

// ─────────────────────────────────────────────────────────
// Row shapes
// ─────────────────────────────────────────────────────────

/// Registration (intent) row, appended before payment.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationRow<'a> {
    pub name: &'a str,
    pub telegram: &'a str,
    pub phone: &'a str,
    pub matric: &'a str,
    pub university: &'a str,
    pub remarks: &'a str,
    pub is_member: bool,
    pub price: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_ref: Option<&'a str>,
    #[serde(rename = "submittedAtISO")]
    pub submitted_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event: Option<&'a EventInfo>,
}

/// Paid row, appended once a proof artifact has been handled.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaidRow<'a> {
    pub name: &'a str,
    pub phone: &'a str,
    pub university: &'a str,
    pub is_member: bool,
    pub price: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tier: Option<Tier>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paynow_reference_typed: Option<&'a str>,
    #[serde(rename = "paidAtISO")]
    pub paid_at: String,
    /// Client-reported payment time, audit only
    #[serde(rename = "clientPaidAtISO", skip_serializing_if = "Option::is_none")]
    pub client_paid_at: Option<&'a str>,
    pub final_ref: &'a str,
    /// Equal to `final_ref`; the append is idempotent on this key
    pub dedupe_key: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proof_file_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proof_file_name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event: Option<&'a EventInfo>,
}

// ─────────────────────────────────────────────────────────
// Upstream response shape
// ─────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ScriptResponse {
    #[serde(default)]
    ok: bool,
    error: Option<String>,
    id: Option<String>,
    name: Option<String>,
    count: Option<u32>,
}

impl SheetsClient {
    pub fn new(http: Client, target: &AppsScript) -> Self {
        SheetsClient {
            http,
            url: target.url.clone(),
            token: target.token.clone(),
        }
    }

    /// Append a registration/intent row (`appendRegistration`).
    pub async fn append_registration(&self, row: &RegistrationRow<'_>) -> Result<()> {
        let req = self.request("appendRegistration").json(row);
        self.execute("appendRegistration", req)
            .await
            .map_err(ApiError::Upstream)?;
        Ok(())
    }

    /// Append a paid row keyed by its dedupe key (`appendPaid`).
    pub async fn append_paid(&self, row: &PaidRow<'_>) -> Result<()> {
        let req = self.request("appendPaid").json(row);
        self.execute("appendPaid", req)
            .await
            .map_err(ApiError::Upstream)?;
        Ok(())
    }

    /// Relay a proof image for storage (`saveProof`, multipart field `proof`).
    pub async fn save_proof(
        &self,
        filename: &str,
        mime: &str,
        bytes: Vec<u8>,
    ) -> Result<StoredProof> {
        let part = Part::bytes(bytes)
            .file_name(filename.to_string())
            .mime_str(mime)
            .map_err(|_| ApiError::Upload(format!("Unusable MIME type: {mime}")))?;
        let form = Form::new()
            .text("action", "saveProof")
            .text("filename", filename.to_string())
            .part("proof", part);

        let req = self.request("saveProof").multipart(form);
        let resp = self
            .execute("saveProof", req)
            .await
            .map_err(ApiError::Upload)?;

        Ok(StoredProof {
            id: resp.id.unwrap_or_default(),
            name: resp.name.unwrap_or_else(|| filename.to_string()),
        })
    }

    /// Durable non-member signup count (`nonMemberCount`).
    pub async fn non_member_count(&self) -> Result<u32> {
        let req = self
            .request("nonMemberCount")
            .json(&serde_json::json!({ "action": "nonMemberCount" }));
        let resp = self
            .execute("nonMemberCount", req)
            .await
            .map_err(ApiError::Upstream)?;
        resp.count
            .ok_or_else(|| ApiError::Upstream("nonMemberCount returned no count".to_string()))
    }

    fn request(&self, action: &str) -> RequestBuilder {
        self.http
            .post(&self.url)
            .query(&[("token", self.token.as_str()), ("action", action)])
    }

    /// Send a prepared request and interpret the `ok`-boolean envelope.
    /// Error strings are safe to surface to the caller.
    async fn execute(
        &self,
        action: &str,
        req: RequestBuilder,
    ) -> std::result::Result<ScriptResponse, String> {
        let resp = req
            .send()
            .await
            .map_err(|e| format!("Apps Script unreachable: {}", e.without_url()))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| format!("Apps Script read failed: {}", e.without_url()))?;

        let body: ScriptResponse = match serde_json::from_str(&text) {
            Ok(body) => body,
            Err(_) => {
                return Err(format!(
                    "Apps Script non-JSON ({status}): {}",
                    truncate(&text)
                ))
            }
        };

        if !status.is_success() || !body.ok {
            return Err(body
                .error
                .unwrap_or_else(|| format!("Apps Script failed ({status})")));
        }

        debug!("Apps Script {action} ok");
        Ok(body)
    }
}

fn truncate(s: &str) -> &str {
    match s.char_indices().nth(RAW_BODY_LIMIT) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
