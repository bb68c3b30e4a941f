//! Request payloads and field validation.
//!
//! Both endpoints accept whatever JSON the form sends and validate it
//! field-by-field, so a bad payload always comes back as the standard
//! `{ ok: false, error }` shape instead of a framework rejection.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{ApiError, Result};

/// Event details echoed onto every spreadsheet row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EventInfo {
    pub name: String,
    pub date_str: String,
    pub time_str: String,
    pub venue: String,
    pub city: String,
}

/// A validated registration (intent) submission.
#[derive(Debug, Clone)]
pub struct RegisterRequest {
    pub name: String,
    pub telegram: String,
    pub phone: String,
    pub matric: String,
    pub university: String,
    pub remarks: String,
    pub consent: bool,
    pub is_member: bool,
    pub price: f64,
    /// Client-side display reference, kept for reconciliation only
    pub payment_ref: Option<String>,
    pub event: Option<EventInfo>,
}

impl RegisterRequest {
    /// Validate an untyped JSON body.
    ///
    /// Identity fields must be present, string-typed, and non-empty;
    /// `isMember` must be a boolean and `price` a number.
    pub fn parse(body: &Value) -> Result<Self> {
        Ok(RegisterRequest {
            name: required_str(body, "name")?,
            telegram: required_str(body, "telegram")?,
            phone: required_str(body, "phone")?,
            matric: required_str(body, "matric")?,
            university: required_str(body, "university")?,
            remarks: optional_str(body, "remarks").unwrap_or_default(),
            consent: optional_bool(body, "agree")?.unwrap_or(false),
            is_member: required_bool(body, "isMember")?,
            price: required_number(body, "price")?,
            payment_ref: optional_str(body, "paymentRef"),
            event: optional_event(body),
        })
    }
}

/// A payment-confirmation submission.
///
/// Identity fields are lenient here: the reference generator has
/// placeholders for anything unusable, and the proof artifact is the only
/// hard requirement (checked by the handler).
#[derive(Debug, Clone)]
pub struct ConfirmRequest {
    pub name: String,
    pub phone: String,
    pub university: String,
    pub is_member: bool,
    pub price: f64,
    pub typed_reference: Option<String>,
    pub proof_data_url: Option<String>,
    /// Client-reported payment time, audit field only; the final reference
    /// always uses the server clock
    pub paid_at: Option<String>,
    pub event: Option<EventInfo>,
}

impl ConfirmRequest {
    pub fn parse(body: &Value) -> Result<Self> {
        Ok(ConfirmRequest {
            name: optional_str(body, "name").unwrap_or_default(),
            phone: optional_str(body, "phone").unwrap_or_default(),
            university: optional_str(body, "university").unwrap_or_default(),
            is_member: optional_bool(body, "isMember")?.unwrap_or(false),
            price: optional_number(body, "price")?.unwrap_or(0.0),
            typed_reference: optional_str(body, "paynowReferenceTyped"),
            proof_data_url: optional_str(body, "paymentProofDataUrl"),
            paid_at: optional_str(body, "paidAt"),
            event: optional_event(body),
        })
    }
}

// ─────────────────────────────────────────────────────────
// Field helpers
// ─────────────────────────────────────────────────────────

fn required_str(body: &Value, key: &str) -> Result<String> {
    match body.get(key) {
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        Some(Value::String(_)) | None | Some(Value::Null) => Err(ApiError::Validation(format!(
            "Missing required field: {key}"
        ))),
        Some(_) => Err(ApiError::Validation(format!(
            "Field {key} must be a string"
        ))),
    }
}

fn optional_str(body: &Value, key: &str) -> Option<String> {
    body.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

fn required_bool(body: &Value, key: &str) -> Result<bool> {
    optional_bool(body, key)?
        .ok_or_else(|| ApiError::Validation(format!("Missing required field: {key}")))
}

fn optional_bool(body: &Value, key: &str) -> Result<Option<bool>> {
    match body.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Bool(b)) => Ok(Some(*b)),
        Some(_) => Err(ApiError::Validation(format!(
            "Field {key} must be a boolean"
        ))),
    }
}

fn required_number(body: &Value, key: &str) -> Result<f64> {
    optional_number(body, key)?
        .ok_or_else(|| ApiError::Validation(format!("Missing required field: {key}")))
}

fn optional_number(body: &Value, key: &str) -> Result<Option<f64>> {
    match body.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => Ok(n.as_f64()),
        Some(_) => Err(ApiError::Validation(format!(
            "Field {key} must be a number"
        ))),
    }
}

fn optional_event(body: &Value) -> Option<EventInfo> {
    body.get("event")
        .cloned()
        .and_then(|v| serde_json::from_value(v).ok())
}

// ─────────────────────────────────────────────────────────
// Unit tests
// ─────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn full_register_body() -> Value {
        json!({
            "name": "Asha Rao",
            "telegram": "@asha",
            "phone": "+6591234567",
            "matric": "U2203456A",
            "university": "NTU",
            "remarks": "",
            "agree": true,
            "isMember": true,
            "price": 6,
            "paymentRef": "AS4567-10111805",
            "event": { "name": "Dandiya Night", "dateStr": "11 Oct", "venue": "Auditorium" }
        })
    }

    #[test]
    fn parses_a_complete_registration() {
        let req = RegisterRequest::parse(&full_register_body()).unwrap();
        assert_eq!(req.name, "Asha Rao");
        assert!(req.is_member);
        assert_eq!(req.price, 6.0);
        assert_eq!(req.event.unwrap().name, "Dandiya Night");
    }

    #[test]
    fn rejects_missing_identity_fields() {
        for key in ["name", "telegram", "phone", "matric", "university"] {
            let mut body = full_register_body();
            body.as_object_mut().unwrap().remove(key);
            let err = RegisterRequest::parse(&body).unwrap_err();
            assert!(matches!(err, ApiError::Validation(_)), "{key}");
        }
    }

    #[test]
    fn rejects_blank_identity_fields() {
        let mut body = full_register_body();
        body["name"] = json!("   ");
        assert!(RegisterRequest::parse(&body).is_err());
    }

    #[test]
    fn rejects_string_typed_price() {
        let mut body = full_register_body();
        body["price"] = json!("6");
        let err = RegisterRequest::parse(&body).unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[test]
    fn rejects_non_boolean_membership() {
        let mut body = full_register_body();
        body["isMember"] = json!("yes");
        assert!(RegisterRequest::parse(&body).is_err());
    }

    #[test]
    fn confirm_parse_is_lenient_on_identity() {
        let req = ConfirmRequest::parse(&json!({
            "paynowReferenceTyped": "REF123",
            "price": 10
        }))
        .unwrap();
        assert_eq!(req.name, "");
        assert_eq!(req.price, 10.0);
        assert_eq!(req.typed_reference.as_deref(), Some("REF123"));
    }

    #[test]
    fn confirm_parse_still_rejects_mistyped_price() {
        let err = ConfirmRequest::parse(&json!({ "price": "10" })).unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }
}
