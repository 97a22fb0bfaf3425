/// Unit tests for the verification engine's pure logic
/// Tests percentage derivation, facet parsing, OTP challenges and snapshots
use chrono::Utc;
use proven_pro_api::models::{
    SubscriptionTier, User, VerificationFacet, VerificationStatus,
};
use proven_pro_api::verification::{
    completion_percentage, generate_otp_code, snapshot_for, validate_mobile, OtpChallenge,
};
use uuid::Uuid;

/// Helper to build a user row with no verification progress.
fn test_user() -> User {
    User {
        id: Uuid::new_v4(),
        username: "freelancer".to_string(),
        email: "freelancer@example.com".to_string(),
        password_hash: "x".to_string(),
        is_verified: true,
        google_id: None,
        is_google_user: false,
        reset_token_hash: None,
        reset_token_created_at: None,
        subscription_tier: SubscriptionTier::Free,
        subscription_active: true,
        subscription_start_date: None,
        subscription_end_date: None,
        first_name: Some("Alice".to_string()),
        last_name: Some("Reyes".to_string()),
        bio: None,
        profile_mail: None,
        profile_pic_url: None,
        rating: 0.0,
        mobile: None,
        primary_tools: None,
        technical_skills: None,
        soft_skills: None,
        skills_description: None,
        video_intro_url: None,
        video_description: None,
        profile_url: "ab12cd34".to_string(),
        gov_id_document: None,
        gov_id_status: VerificationStatus::Pending,
        address_document: None,
        address_status: VerificationStatus::Pending,
        mobile_status: VerificationStatus::Pending,
        created_at: Utc::now(),
        updated_at: None,
    }
}

#[cfg(test)]
mod percentage_tests {
    use super::*;

    #[test]
    fn test_weights() {
        use VerificationStatus::*;

        assert_eq!(completion_percentage(Pending, Pending, Pending), 0);
        assert_eq!(completion_percentage(Approved, Pending, Pending), 50);
        assert_eq!(completion_percentage(Pending, Approved, Pending), 25);
        assert_eq!(completion_percentage(Pending, Pending, Approved), 25);
        assert_eq!(completion_percentage(Approved, Approved, Pending), 75);
        assert_eq!(completion_percentage(Approved, Approved, Approved), 100);
    }

    #[test]
    fn test_rejected_counts_as_zero() {
        use VerificationStatus::*;

        assert_eq!(completion_percentage(Rejected, Rejected, Rejected), 0);
        assert_eq!(completion_percentage(Approved, Rejected, Pending), 50);
    }

    #[test]
    fn test_all_combinations_reachable_values() {
        use VerificationStatus::*;
        let statuses = [Pending, Approved, Rejected];

        for gov in statuses {
            for addr in statuses {
                for mobile in statuses {
                    let p = completion_percentage(gov, addr, mobile);
                    assert!(
                        [0, 25, 50, 75, 100].contains(&p),
                        "unexpected percentage {} for {:?}/{:?}/{:?}",
                        p,
                        gov,
                        addr,
                        mobile
                    );
                }
            }
        }
    }

    #[test]
    fn test_approving_gov_id_adds_exactly_fifty() {
        use VerificationStatus::*;

        let before = completion_percentage(Pending, Approved, Approved);
        let after = completion_percentage(Approved, Approved, Approved);
        assert_eq!(after - before, 50);
    }
}

#[cfg(test)]
mod otp_tests {
    use super::*;

    #[test]
    fn test_code_shape() {
        for _ in 0..100 {
            let code = generate_otp_code();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn test_challenge_string_comparison() {
        let challenge = OtpChallenge {
            code: "042137".to_string(),
            mobile: "+5511987654321".to_string(),
            requested_at: Utc::now(),
        };

        assert!(challenge.matches("042137"));
        // Leading zeros matter: comparison is string equality, not numeric
        assert!(!challenge.matches("42137"));
        assert!(!challenge.matches("042138"));
        assert!(!challenge.matches(""));
    }
}

#[cfg(test)]
mod mobile_validation_tests {
    use super::*;

    #[test]
    fn test_valid_numbers_normalize_to_e164() {
        let normalized = validate_mobile("+14155552671").unwrap();
        assert_eq!(normalized, "+14155552671");

        let normalized = validate_mobile("+1 (415) 555-2671").unwrap();
        assert_eq!(normalized, "+14155552671");

        let normalized = validate_mobile("+5511987654321").unwrap();
        assert_eq!(normalized, "+5511987654321");
    }

    #[test]
    fn test_invalid_numbers_rejected() {
        assert!(validate_mobile("").is_err());
        assert!(validate_mobile("1234").is_err());
        assert!(validate_mobile("not-a-number").is_err());
    }
}

#[cfg(test)]
mod facet_tests {
    use super::*;

    #[test]
    fn test_parse_known_facets() {
        assert_eq!(
            VerificationFacet::parse("gov_id").unwrap(),
            VerificationFacet::GovId
        );
        assert_eq!(
            VerificationFacet::parse("address").unwrap(),
            VerificationFacet::Address
        );
        assert_eq!(
            VerificationFacet::parse("mobile").unwrap(),
            VerificationFacet::Mobile
        );
    }

    #[test]
    fn test_parse_unknown_facet() {
        use proven_pro_api::errors::AppError;

        let err = VerificationFacet::parse("passport").unwrap_err();
        assert!(matches!(err, AppError::InvalidFacet(ref f) if f == "passport"));
    }

    #[test]
    fn test_display_names() {
        assert_eq!(VerificationFacet::GovId.display_name(), "Government ID");
        assert_eq!(VerificationFacet::Address.display_name(), "Address Proof");
    }
}

#[cfg(test)]
mod snapshot_tests {
    use super::*;

    #[test]
    fn test_fresh_user_snapshot() {
        let user = test_user();
        let snapshot = snapshot_for(&user);

        assert_eq!(snapshot.percentage, 0);
        assert!(!snapshot.has_gov_id_document);
        assert!(!snapshot.has_address_document);
        assert!(snapshot.mobile.is_none());
        assert!(!snapshot.government_id.verified);
        assert_eq!(snapshot.government_id.percentage, 0);
        assert_eq!(snapshot.address_proof.percentage, 0);
        assert_eq!(snapshot.mobile_detail.percentage, 0);
    }

    #[test]
    fn test_approved_gov_id_snapshot() {
        let mut user = test_user();
        user.gov_id_document = Some("verification/gov_id/alice.pdf".to_string());
        user.gov_id_status = VerificationStatus::Approved;

        let snapshot = snapshot_for(&user);

        assert_eq!(snapshot.percentage, 50);
        assert!(snapshot.has_gov_id_document);
        assert!(snapshot.government_id.uploaded);
        assert!(snapshot.government_id.verified);
        assert_eq!(snapshot.government_id.percentage, 50);
    }

    #[test]
    fn test_fully_verified_snapshot() {
        let mut user = test_user();
        user.gov_id_document = Some("gov.pdf".to_string());
        user.gov_id_status = VerificationStatus::Approved;
        user.address_document = Some("addr.pdf".to_string());
        user.address_status = VerificationStatus::Approved;
        user.mobile = Some("+14155552671".to_string());
        user.mobile_status = VerificationStatus::Approved;

        let snapshot = snapshot_for(&user);

        assert_eq!(snapshot.percentage, 100);
        assert!(snapshot.mobile_detail.provided);
        assert!(snapshot.mobile_detail.verified);
        assert_eq!(snapshot.mobile_detail.percentage, 25);
    }

    #[test]
    fn test_uploaded_but_pending_contributes_nothing() {
        let mut user = test_user();
        user.gov_id_document = Some("gov.pdf".to_string());
        user.address_document = Some("addr.pdf".to_string());

        let snapshot = snapshot_for(&user);

        assert_eq!(snapshot.percentage, 0);
        assert!(snapshot.government_id.uploaded);
        assert!(!snapshot.government_id.verified);
    }
}
