//! Payment-proof artifacts.
//!
//! A confirmation must carry at least one proof of payment: a typed
//! transfer reference, an uploaded screenshot (as a base64 data URL), or
//! both. When both are present the image is the artifact that gets stored
//! and the typed reference rides along as a plain field on the paid row.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use crate::errors::{ApiError, Result};

/// A decoded proof image, ready for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProofImage {
    pub bytes: Vec<u8>,
    pub mime: String,
}

impl ProofImage {
    /// Filename extension guessed from the MIME type. Best effort, not
    /// content-sniffed.
    pub fn extension(&self) -> &'static str {
        match self.mime.as_str() {
            "image/png" => "png",
            "image/jpeg" => "jpg",
            _ => "png",
        }
    }
}

/// What the registrant submitted as proof of payment.
#[derive(Debug, Clone)]
pub enum ProofArtifact {
    TypedReference(String),
    ImageUpload(ProofImage),
}

impl ProofArtifact {
    /// Build the artifact from the two optional request fields.
    ///
    /// The image is preferred when both are present. Fails with a
    /// validation error when neither carries anything.
    pub fn from_parts(typed: Option<&str>, data_url: Option<&str>) -> Result<ProofArtifact> {
        let typed = typed.map(str::trim).filter(|s| !s.is_empty());
        let data_url = data_url.map(str::trim).filter(|s| !s.is_empty());

        match (data_url, typed) {
            (Some(url), _) => Ok(ProofArtifact::ImageUpload(decode_data_url(url)?)),
            (None, Some(reference)) => Ok(ProofArtifact::TypedReference(reference.to_string())),
            (None, None) => Err(ApiError::Validation(
                "Missing payment proof or typed reference".to_string(),
            )),
        }
    }

    pub fn image(&self) -> Option<&ProofImage> {
        match self {
            ProofArtifact::ImageUpload(image) => Some(image),
            ProofArtifact::TypedReference(_) => None,
        }
    }
}

/// Decode a `data:<mime>;base64,<payload>` URL into raw bytes + MIME type.
///
/// No size limit is enforced here; transport limits apply upstream.
pub fn decode_data_url(data_url: &str) -> Result<ProofImage> {
    let malformed = || ApiError::MalformedInput("Invalid data URL".to_string());

    let rest = data_url.strip_prefix("data:").ok_or_else(malformed)?;
    let (mime, payload) = rest.split_once(";base64,").ok_or_else(malformed)?;
    if mime.is_empty() || payload.is_empty() {
        return Err(malformed());
    }

    let bytes = BASE64.decode(payload).map_err(|_| malformed())?;

    Ok(ProofImage {
        bytes,
        mime: mime.to_string(),
    })
}

// ─────────────────────────────────────────────────────────
// Unit tests
// ─────────────────────────────────────────────────────────
