//! Ticket pricing tiers.
//!
//! Members pay a fixed price. Non-members start on a base price and move to
//! a surge price once the non-member signup count reaches the configured
//! threshold. The count passed in is whatever counter the caller trusts:
//! the client keeps a per-browser approximation, while the confirm endpoint
//! asks the spreadsheet service for the durable one.

use serde::{Deserialize, Serialize};

/// Pricing tier a registrant lands on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Member,
    EarlyBird,
    General,
}

impl Tier {
    /// Human label shown under the displayed price.
    pub fn label(&self) -> &'static str {
        match self {
            Tier::Member => "Member tier",
            Tier::EarlyBird => "Non-member Early Bird",
            Tier::General => "Non-member General",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Member => "member",
            Tier::EarlyBird => "early_bird",
            Tier::General => "general",
        }
    }
}

/// Tier configuration, in whole dollars.
#[derive(Debug, Clone)]
pub struct Pricing {
    pub member: u32,
    pub base: u32,
    pub surge: u32,
    /// Non-member signups at which the surge price kicks in
    pub threshold: u32,
    /// University whose students count as members
    pub member_university: String,
}

impl Default for Pricing {
    fn default() -> Self {
        Pricing {
            member: 6,
            base: 10,
            surge: 12,
            threshold: 50,
            member_university: "NTU".to_string(),
        }
    }
}

impl Pricing {
    /// Price for a registrant given the non-member signup count so far.
    pub fn price_for(&self, is_member: bool, non_member_count: u32) -> u32 {
        match self.tier_for(is_member, non_member_count) {
            Tier::Member => self.member,
            Tier::EarlyBird => self.base,
            Tier::General => self.surge,
        }
    }

    pub fn tier_for(&self, is_member: bool, non_member_count: u32) -> Tier {
        if is_member {
            Tier::Member
        } else if non_member_count < self.threshold {
            Tier::EarlyBird
        } else {
            Tier::General
        }
    }

    /// Whether the given university affiliation counts as a member.
    pub fn is_member(&self, university: &str) -> bool {
        university.trim().eq_ignore_ascii_case(&self.member_university)
    }
}

// ─────────────────────────────────────────────────────────
// Unit tests
// ─────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn member_price_is_fixed() {
        let p = Pricing::default();
        for n in [0, 49, 50, 1000] {
            assert_eq!(p.price_for(true, n), 6);
        }
    }

    #[test]
    fn non_member_boundary_at_threshold() {
        let p = Pricing::default();
        assert_eq!(p.price_for(false, 49), 10);
        assert_eq!(p.price_for(false, 50), 12);
    }

    #[test]
    fn tiers() {
        let p = Pricing::default();
        assert_eq!(p.tier_for(true, 999), Tier::Member);
        assert_eq!(p.tier_for(false, 0), Tier::EarlyBird);
        assert_eq!(p.tier_for(false, 50), Tier::General);
    }

    #[test]
    fn member_university_is_case_insensitive() {
        let p = Pricing::default();
        assert!(p.is_member("ntu"));
        assert!(p.is_member(" NTU "));
        assert!(!p.is_member("NUS"));
    }
}
