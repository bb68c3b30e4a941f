//! Proof storage backends.
//!
//! A confirmed payment's proof image must land somewhere durable before the
//! spreadsheet append is attempted; the stored file is the source of truth
//! if the append later fails. Two backends exist, selected by
//! configuration:
//!
//! * [`AppsScriptStore`] relays the image through the spreadsheet service
//!   (`saveProof` action), which files it next to the sheet.
//! * [`DriveStore`] uploads straight to a Google Drive folder using a
//!   service account (RS256 JWT grant, then a media upload and a metadata
//!   patch for name / description / parent folder).

use async_trait::async_trait;
use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::DriveCredentials;
use crate::errors::{ApiError, Result};
use crate::proof::ProofImage;
use crate::sheets::SheetsClient;

const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const DRIVE_SCOPE: &str = "https://www.googleapis.com/auth/drive.file";
const UPLOAD_URL: &str = "https://www.googleapis.com/upload/drive/v3/files?uploadType=media";
const FILES_URL: &str = "https://www.googleapis.com/drive/v3/files";

/// Identifier of a stored proof, echoed onto the paid row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredProof {
    pub id: String,
    pub name: String,
}

/// Where proof images go.
#[async_trait]
pub trait ProofStore: Send + Sync {
    /// Persist the image under the given filename. The description is
    /// free-text metadata; backends that have nowhere to put it may drop it.
    async fn store(
        &self,
        image: &ProofImage,
        filename: &str,
        description: &str,
    ) -> Result<StoredProof>;

    fn name(&self) -> &'static str;
}

// ─────────────────────────────────────────────────────────
// Apps Script relay
// ─────────────────────────────────────────────────────────

pub struct AppsScriptStore {
    sheets: SheetsClient,
}

impl AppsScriptStore {
    pub fn new(sheets: SheetsClient) -> Self {
        AppsScriptStore { sheets }
    }
}

#[async_trait]
impl ProofStore for AppsScriptStore {
    async fn store(
        &self,
        image: &ProofImage,
        filename: &str,
        _description: &str,
    ) -> Result<StoredProof> {
        self.sheets
            .save_proof(filename, &image.mime, image.bytes.clone())
            .await
    }

    fn name(&self) -> &'static str {
        "apps-script"
    }
}

// ─────────────────────────────────────────────────────────
// Google Drive service account
// ─────────────────────────────────────────────────────────

pub struct DriveStore {
    http: Client,
    creds: DriveCredentials,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct DriveFile {
    id: String,
    #[serde(default)]
    name: String,
}

impl DriveStore {
    pub fn new(http: Client, creds: DriveCredentials) -> Self {
        DriveStore { http, creds }
    }

    /// Sign the service-account assertion for the token grant.
    fn mint_assertion(&self, now: i64) -> Result<String> {
        #[derive(Debug, Serialize)]
        struct Claims<'a> {
            iss: &'a str,
            scope: &'a str,
            aud: &'a str,
            iat: i64,
            exp: i64,
        }

        let claims = Claims {
            iss: &self.creds.client_email,
            scope: DRIVE_SCOPE,
            aud: TOKEN_URL,
            // A minute of backdating absorbs clock skew.
            iat: now - 60,
            exp: now + 3600,
        };

        let key = EncodingKey::from_rsa_pem(self.creds.private_key.as_bytes())
            .map_err(|_| ApiError::Upload("Invalid service-account private key".to_string()))?;

        jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &key)
            .map_err(|e| ApiError::Upload(format!("JWT signing failed: {e}")))
    }

    async fn access_token(&self) -> Result<String> {
        let assertion = self.mint_assertion(Utc::now().timestamp())?;

        let resp = self
            .http
            .post(TOKEN_URL)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await
            .map_err(|e| ApiError::Upload(format!("Token grant failed: {}", e.without_url())))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ApiError::Upload(format!("Token grant rejected ({status})")));
        }

        let token: TokenResponse = resp
            .json()
            .await
            .map_err(|_| ApiError::Upload("Token grant returned unexpected JSON".to_string()))?;
        Ok(token.access_token)
    }
}

#[async_trait]
impl ProofStore for DriveStore {
    async fn store(
        &self,
        image: &ProofImage,
        filename: &str,
        description: &str,
    ) -> Result<StoredProof> {
        let token = self.access_token().await?;

        // Upload the bytes first; name and folder are patched on afterwards
        // (the media upload endpoint takes content only).
        let resp = self
            .http
            .post(UPLOAD_URL)
            .bearer_auth(&token)
            .header(reqwest::header::CONTENT_TYPE, image.mime.as_str())
            .body(image.bytes.clone())
            .send()
            .await
            .map_err(|e| ApiError::Upload(format!("Drive upload failed: {}", e.without_url())))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ApiError::Upload(format!("Drive upload rejected ({status})")));
        }
        let created: DriveFile = resp
            .json()
            .await
            .map_err(|_| ApiError::Upload("Drive upload returned unexpected JSON".to_string()))?;

        let resp = self
            .http
            .patch(format!(
                "{FILES_URL}/{}?addParents={}",
                created.id, self.creds.folder_id
            ))
            .bearer_auth(&token)
            .json(&serde_json::json!({
                "name": filename,
                "description": description,
            }))
            .send()
            .await
            .map_err(|e| ApiError::Upload(format!("Drive rename failed: {}", e.without_url())))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ApiError::Upload(format!("Drive rename rejected ({status})")));
        }
        let filed: DriveFile = resp
            .json()
            .await
            .map_err(|_| ApiError::Upload("Drive rename returned unexpected JSON".to_string()))?;

        debug!("Stored proof {} as Drive file {}", filename, filed.id);
        Ok(StoredProof {
            id: filed.id,
            name: if filed.name.is_empty() {
                filename.to_string()
            } else {
                filed.name
            },
        })
    }

    fn name(&self) -> &'static str {
        "gdrive"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_garbage_private_key() {
        let store = DriveStore::new(
            Client::new(),
            DriveCredentials {
                client_email: "svc@example.iam.gserviceaccount.com".to_string(),
                private_key: "not a pem".to_string(),
                folder_id: "folder".to_string(),
            },
        );
        let err = store.mint_assertion(1_700_000_000).unwrap_err();
        assert!(matches!(err, ApiError::Upload(_)));
    }
}
