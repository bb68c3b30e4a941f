//! Client-side registration flow.
//!
//! Mirrors the three-step form a registrant walks through: details,
//! payment, done. The flow itself is pure state; [`RegistrationClient`]
//! issues the two backend calls. The embedding UI drives it:
//!
//! 1. fill the form, watch `display_price` / `tier_label`
//! 2. `submit()` to snapshot the quote and get the register payload
//! 3. POST the payload, show the QR + display reference
//! 4. POST the confirm payload once paid, then `confirm_paid()`
//!
//! The quote is snapshotted at submission and the local non-member counter
//! only moves in `confirm_paid()`, so a registrant's own signup can never
//! inflate their own price. The counter here is a per-client approximation;
//! the durable one lives in the spreadsheet and is consulted server-side.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::errors::ApiError;
use crate::model::EventInfo;
use crate::pricing::{Pricing, Tier};
use crate::reference::display_reference;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Details,
    Payment,
    Done,
}

#[derive(Debug, Error)]
pub enum FlowError {
    #[error("form is incomplete or invalid")]
    InvalidForm,
    #[error("operation not valid in the current step")]
    WrongStep,
}

/// The personal-details form.
#[derive(Debug, Clone, Default)]
pub struct RegistrationForm {
    pub name: String,
    pub telegram: String,
    pub phone: String,
    pub matric: String,
    pub university: String,
    pub remarks: String,
    pub consent: bool,
}

impl RegistrationForm {
    /// Gate for the continue-to-payment button.
    pub fn is_valid(&self) -> bool {
        self.name.trim().len() > 1
            && self.telegram.trim().len() >= 3
            && phone_ok(self.phone.trim())
            && self.matric.trim().len() >= 3
            && !self.university.trim().is_empty()
            && self.consent
    }
}

/// Optional `+`, then 8 to 15 digits.
fn phone_ok(phone: &str) -> bool {
    let digits = phone.strip_prefix('+').unwrap_or(phone);
    (8..=15).contains(&digits.len()) && digits.bytes().all(|b| b.is_ascii_digit())
}

/// Price, tier, and display reference frozen at submission time.
#[derive(Debug, Clone)]
pub struct Quote {
    pub price: u32,
    pub tier: Tier,
    pub display_reference: String,
}

/// Wire payload for `POST /api/register`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterPayload {
    pub name: String,
    pub telegram: String,
    pub phone: String,
    pub matric: String,
    pub university: String,
    pub remarks: String,
    pub agree: bool,
    pub is_member: bool,
    pub price: u32,
    pub payment_ref: String,
    pub event: EventInfo,
}

/// Wire payload for `POST /api/confirm-payment`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmPayload {
    pub name: String,
    pub phone: String,
    pub university: String,
    pub is_member: bool,
    pub price: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paynow_reference_typed: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_proof_data_url: Option<String>,
    pub paid_at: String,
    pub event: EventInfo,
}

pub struct RegistrationFlow {
    pricing: Pricing,
    event: EventInfo,
    step: Step,
    pub form: RegistrationForm,
    non_member_count: u32,
    quote: Option<Quote>,
}

impl RegistrationFlow {
    pub fn new(pricing: Pricing, event: EventInfo, non_member_count: u32) -> Self {
        RegistrationFlow {
            pricing,
            event,
            step: Step::Details,
            form: RegistrationForm::default(),
            non_member_count,
            quote: None,
        }
    }

    pub fn step(&self) -> Step {
        self.step
    }

    pub fn non_member_count(&self) -> u32 {
        self.non_member_count
    }

    pub fn is_member(&self) -> bool {
        self.pricing.is_member(&self.form.university)
    }

    /// Price the registrant would currently be quoted.
    pub fn current_price(&self) -> u32 {
        self.pricing
            .price_for(self.is_member(), self.non_member_count)
    }

    /// Price shown on the form: zero until a university is chosen.
    pub fn display_price(&self) -> u32 {
        if self.form.university.trim().is_empty() {
            0
        } else {
            self.current_price()
        }
    }

    /// Tier label under the displayed price; nothing until a university is
    /// chosen.
    pub fn tier_label(&self) -> Option<&'static str> {
        if self.form.university.trim().is_empty() {
            None
        } else {
            Some(
                self.pricing
                    .tier_for(self.is_member(), self.non_member_count)
                    .label(),
            )
        }
    }

    pub fn quote(&self) -> Option<&Quote> {
        self.quote.as_ref()
    }

    /// Submit the details form: freeze the quote and move to the payment
    /// step. Returns the payload for `POST /api/register`.
    pub fn submit(&mut self, at: NaiveDateTime) -> Result<RegisterPayload, FlowError> {
        if self.step != Step::Details {
            return Err(FlowError::WrongStep);
        }
        if !self.form.is_valid() {
            return Err(FlowError::InvalidForm);
        }

        let quote = Quote {
            price: self.current_price(),
            tier: self
                .pricing
                .tier_for(self.is_member(), self.non_member_count),
            display_reference: display_reference(&self.form.name, &self.form.phone, at),
        };
        let payload = RegisterPayload {
            name: self.form.name.trim().to_string(),
            telegram: self.form.telegram.trim().to_string(),
            phone: self.form.phone.trim().to_string(),
            matric: self.form.matric.trim().to_string(),
            university: self.form.university.trim().to_string(),
            remarks: self.form.remarks.trim().to_string(),
            agree: self.form.consent,
            is_member: self.is_member(),
            price: quote.price,
            payment_ref: quote.display_reference.clone(),
            event: self.event.clone(),
        };

        self.quote = Some(quote);
        self.step = Step::Payment;
        Ok(payload)
    }

    /// Build the payload for `POST /api/confirm-payment`. Valid only on the
    /// payment step.
    pub fn confirm_payload(
        &self,
        typed_reference: Option<String>,
        proof_data_url: Option<String>,
        at: NaiveDateTime,
    ) -> Result<ConfirmPayload, FlowError> {
        if self.step != Step::Payment {
            return Err(FlowError::WrongStep);
        }
        let quote = self.quote.as_ref().ok_or(FlowError::WrongStep)?;

        Ok(ConfirmPayload {
            name: self.form.name.trim().to_string(),
            phone: self.form.phone.trim().to_string(),
            university: self.form.university.trim().to_string(),
            is_member: self.is_member(),
            price: quote.price,
            paynow_reference_typed: typed_reference,
            payment_proof_data_url: proof_data_url,
            paid_at: at.format("%Y-%m-%dT%H:%M:%S").to_string(),
            event: self.event.clone(),
        })
    }

    /// Return to the details form; the quote is discarded and recomputed on
    /// the next submission.
    pub fn back(&mut self) {
        if self.step == Step::Payment {
            self.step = Step::Details;
            self.quote = None;
        }
    }

    /// Mark the registration confirmed. Call only after the backend
    /// accepted the confirmation: this is the single point where the local
    /// non-member counter moves, and only for non-members.
    pub fn confirm_paid(&mut self) -> Result<u32, FlowError> {
        if self.step != Step::Payment {
            return Err(FlowError::WrongStep);
        }
        if !self.is_member() {
            self.non_member_count += 1;
        }
        self.step = Step::Done;
        Ok(self.non_member_count)
    }
}

// ─────────────────────────────────────────────────────────
// Backend client
// ─────────────────────────────────────────────────────────

/// Response envelope from both endpoints.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiReply {
    #[serde(default)]
    pub ok: bool,
    pub error: Option<String>,
    pub final_reference: Option<String>,
    pub sheet_warning: Option<String>,
}

/// Thin HTTP client for a deployed registration backend.
pub struct RegistrationClient {
    http: reqwest::Client,
    base_url: String,
}

impl RegistrationClient {
    pub fn new(http: reqwest::Client, base_url: &str) -> Self {
        RegistrationClient {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub async fn register(&self, payload: &RegisterPayload) -> crate::errors::Result<ApiReply> {
        self.post("/api/register", payload).await
    }

    pub async fn confirm_payment(
        &self,
        payload: &ConfirmPayload,
    ) -> crate::errors::Result<ApiReply> {
        self.post("/api/confirm-payment", payload).await
    }

    /// POST and decode the reply envelope. Non-2xx replies still carry the
    /// envelope; the caller inspects `ok` / `error`.
    async fn post<T: Serialize>(&self, path: &str, payload: &T) -> crate::errors::Result<ApiReply> {
        let resp = self
            .http
            .post(format!("{}{path}", self.base_url))
            .json(payload)
            .send()
            .await
            .map_err(|e| ApiError::Upstream(format!("Backend unreachable: {}", e.without_url())))?;

        resp.json()
            .await
            .map_err(|e| ApiError::Upstream(format!("Unexpected reply: {}", e.without_url())))
    }
}

// ─────────────────────────────────────────────────────────
// Unit tests
// ─────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 10, 11)
            .unwrap()
            .and_hms_opt(18, 5, 0)
            .unwrap()
    }

    fn filled(flow: &mut RegistrationFlow, university: &str) {
        flow.form = RegistrationForm {
            name: "Asha Rao".to_string(),
            telegram: "@asha".to_string(),
            phone: "+6591234567".to_string(),
            matric: "U2203456A".to_string(),
            university: university.to_string(),
            remarks: String::new(),
            consent: true,
        };
    }

    #[test]
    fn phone_validation() {
        assert!(phone_ok("91234567"));
        assert!(phone_ok("+6591234567"));
        assert!(!phone_ok("1234567"));
        assert!(!phone_ok("+12345678901234567"));
        assert!(!phone_ok("9123 4567"));
        assert!(!phone_ok("abcdefgh"));
    }

    #[test]
    fn display_price_is_zero_until_university_chosen() {
        let mut flow = RegistrationFlow::new(Pricing::default(), EventInfo::default(), 0);
        filled(&mut flow, "");
        assert_eq!(flow.display_price(), 0);
        assert_eq!(flow.tier_label(), None);

        flow.form.university = "NUS".to_string();
        assert_eq!(flow.display_price(), 10);
        assert_eq!(flow.tier_label(), Some("Non-member Early Bird"));
    }

    #[test]
    fn submit_requires_a_valid_form() {
        let mut flow = RegistrationFlow::new(Pricing::default(), EventInfo::default(), 0);
        filled(&mut flow, "NTU");
        flow.form.consent = false;
        assert!(matches!(flow.submit(at()), Err(FlowError::InvalidForm)));
        assert_eq!(flow.step(), Step::Details);
    }

    #[test]
    fn full_flow_for_a_member() {
        let mut flow = RegistrationFlow::new(Pricing::default(), EventInfo::default(), 7);
        filled(&mut flow, "NTU");

        let payload = flow.submit(at()).unwrap();
        assert!(payload.is_member);
        assert_eq!(payload.price, 6);
        assert_eq!(payload.payment_ref, "AS4567-10111805");
        assert_eq!(flow.step(), Step::Payment);

        let confirm = flow
            .confirm_payload(Some("REF123".to_string()), None, at())
            .unwrap();
        assert_eq!(confirm.price, 6);

        // Members never move the non-member counter.
        assert_eq!(flow.confirm_paid().unwrap(), 7);
        assert_eq!(flow.step(), Step::Done);
    }

    #[test]
    fn counter_moves_only_at_confirmation_for_non_members() {
        let mut flow = RegistrationFlow::new(Pricing::default(), EventInfo::default(), 49);
        filled(&mut flow, "NUS");

        // Quoted at 49 signups: still the base price.
        let payload = flow.submit(at()).unwrap();
        assert_eq!(payload.price, 10);

        // The snapshot survives the bump; only the next registrant sees 50.
        assert_eq!(flow.confirm_paid().unwrap(), 50);
        assert_eq!(flow.quote().unwrap().price, 10);

        let mut next = RegistrationFlow::new(Pricing::default(), EventInfo::default(), 50);
        filled(&mut next, "NUS");
        assert_eq!(next.submit(at()).unwrap().price, 12);
    }

    #[test]
    fn back_discards_the_quote() {
        let mut flow = RegistrationFlow::new(Pricing::default(), EventInfo::default(), 0);
        filled(&mut flow, "NTU");
        flow.submit(at()).unwrap();

        flow.back();
        assert_eq!(flow.step(), Step::Details);
        assert!(flow.quote().is_none());
        assert!(matches!(
            flow.confirm_payload(None, None, at()),
            Err(FlowError::WrongStep)
        ));
    }

    #[test]
    fn confirm_requires_the_payment_step() {
        let mut flow = RegistrationFlow::new(Pricing::default(), EventInfo::default(), 0);
        filled(&mut flow, "NTU");
        assert!(matches!(flow.confirm_paid(), Err(FlowError::WrongStep)));
    }

    #[test]
    fn payload_wire_names() {
        let mut flow = RegistrationFlow::new(Pricing::default(), EventInfo::default(), 0);
        filled(&mut flow, "NTU");
        let payload = flow.submit(at()).unwrap();

        let v = serde_json::to_value(&payload).unwrap();
        assert_eq!(v["isMember"], true);
        assert_eq!(v["paymentRef"], "AS4567-10111805");
        assert_eq!(v["agree"], true);
    }
}
