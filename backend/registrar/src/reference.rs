//! Payment reference derivation.
//!
//! Two forms share the same identity prefix (two initials + last four phone
//! digits):
//!
//! * [`final_reference`] — `II####-YYYYMMDD`, derived server-side at
//!   confirmation time. Day granularity makes it double as the dedupe key
//!   for the spreadsheet append: resubmitting the same identity on the same
//!   day lands on the same row.
//! * [`display_reference`] — `II####-MMDDHHMM`, shown to the registrant
//!   before payment so they can paste it into the transfer remarks. Never
//!   persisted as an identifier.

use chrono::{NaiveDate, NaiveDateTime};

const FALLBACK_INITIALS: &str = "NT";
const FALLBACK_LAST4: &str = "0000";

/// Derive the final reference for a confirmed payment.
///
/// Deterministic for a fixed date; never fails. Empty or unusable inputs
/// fall back to placeholder segments.
pub fn final_reference(name: &str, phone: &str, date: NaiveDate) -> String {
    format!(
        "{}{}-{}",
        initials(name),
        last4(phone),
        date.format("%Y%m%d")
    )
}

/// Derive the pre-payment display hint shown on the payment page.
pub fn display_reference(name: &str, phone: &str, at: NaiveDateTime) -> String {
    format!(
        "{}{}-{}",
        initials(name),
        last4(phone),
        at.format("%m%d%H%M")
    )
}

/// First two alphabetic characters of the name, uppercased.
/// Falls back to `"NT"` unless two usable letters exist.
fn initials(name: &str) -> String {
    let letters: String = name
        .chars()
        .filter(|c| c.is_ascii_alphabetic())
        .take(2)
        .collect::<String>()
        .to_ascii_uppercase();
    if letters.len() < 2 {
        FALLBACK_INITIALS.to_string()
    } else {
        letters
    }
}

/// Last four digits of the phone number.
/// Falls back to `"0000"` when fewer than four digits exist (existing
/// digits are not left-padded).
fn last4(phone: &str) -> String {
    let digits: Vec<char> = phone.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() < 4 {
        FALLBACK_LAST4.to_string()
    } else {
        digits[digits.len() - 4..].iter().collect()
    }
}

// ─────────────────────────────────────────────────────────
// Unit tests
// ─────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 10, 11).unwrap()
    }

    #[test]
    fn final_reference_format() {
        let r = final_reference("Asha Rao", "+65 9123 4567", day());
        assert_eq!(r, "AS4567-20251011");
    }

    #[test]
    fn final_reference_strips_non_letters_and_non_digits() {
        let r = final_reference("  1a-b2c ", "phone: 98(76)54-32", day());
        assert_eq!(r, "AB5432-20251011");
    }

    #[test]
    fn empty_inputs_use_placeholders() {
        assert_eq!(final_reference("", "", day()), "NT0000-20251011");
    }

    #[test]
    fn short_inputs_use_placeholders() {
        // One letter / three digits are not enough for a stable identity.
        assert_eq!(final_reference("A", "123", day()), "NT0000-20251011");
    }

    #[test]
    fn existing_digits_are_not_left_padded() {
        // Five digits: the last four are taken verbatim.
        assert_eq!(final_reference("Maya Lin", "91234", day()), "MA1234-20251011");
    }

    #[test]
    fn deterministic_for_fixed_date() {
        let a = final_reference("Ben Ong", "81112222", day());
        let b = final_reference("Ben Ong", "81112222", day());
        assert_eq!(a, b);
    }

    #[test]
    fn final_reference_matches_shape() {
        for (name, phone) in [
            ("Asha Rao", "+6591234567"),
            ("", ""),
            ("x", "1"),
            ("Jean-Luc", "555 0000 111"),
        ] {
            let r = final_reference(name, phone, day());
            let (id, date) = r.split_once('-').unwrap();
            assert_eq!(id.len(), 6);
            assert!(id[..2].chars().all(|c| c.is_ascii_uppercase()));
            assert!(id[2..].chars().all(|c| c.is_ascii_digit()));
            assert_eq!(date.len(), 8);
            assert!(date.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn display_reference_uses_minute_granularity() {
        let at = day().and_hms_opt(18, 5, 0).unwrap();
        assert_eq!(
            display_reference("Asha Rao", "+65 9123 4567", at),
            "AS4567-10111805"
        );
    }
}
