/// Property-based tests using proptest
/// Tests invariants that should hold for all inputs
use proptest::prelude::*;
use proven_pro_api::errors::AppError;
use proven_pro_api::models::{ReviewSubmission, VerificationStatus};
use proven_pro_api::shares::{is_valid_email, parse_share_token, validate_review_fields};
use proven_pro_api::verification::{completion_percentage, generate_otp_code};

fn status_strategy() -> impl Strategy<Value = VerificationStatus> {
    prop_oneof![
        Just(VerificationStatus::Pending),
        Just(VerificationStatus::Approved),
        Just(VerificationStatus::Rejected),
    ]
}

// Property: the derived percentage is always one of the five reachable values
// and always equals the weighted sum of approved facets
proptest! {
    #[test]
    fn percentage_is_reachable_weighted_sum(
        gov in status_strategy(),
        addr in status_strategy(),
        mobile in status_strategy()
    ) {
        let p = completion_percentage(gov, addr, mobile);
        prop_assert!([0, 25, 50, 75, 100].contains(&p));

        let expected = 50 * (gov == VerificationStatus::Approved) as i32
            + 25 * (addr == VerificationStatus::Approved) as i32
            + 25 * (mobile == VerificationStatus::Approved) as i32;
        prop_assert_eq!(p, expected);
    }
}

// Property: email validation should never panic
proptest! {
    #[test]
    fn email_validation_never_panics(email in "\\PC*") {
        let _ = is_valid_email(&email);
    }

    #[test]
    fn well_formed_emails_accepted(
        local in "[a-z][a-z0-9]{0,15}",
        domain in "[a-z][a-z0-9]{1,10}",
        tld in "[a-z]{2,4}"
    ) {
        let email = format!("{}@{}.{}", local, domain, tld);
        prop_assert!(is_valid_email(&email), "rejected: {}", email);
    }
}

// Property: review validation accepts exactly ratings 1..=5 with non-empty fields
proptest! {
    #[test]
    fn in_range_reviews_accepted(
        rating in 1i32..=5,
        name in "[A-Za-z]{1,12}",
        comment in "[A-Za-z]{1,40}"
    ) {
        let submission = ReviewSubmission {
            reviewer_name: Some(name),
            rating: Some(rating),
            comment: Some(comment),
        };
        let (_, validated, _) = validate_review_fields(&submission).unwrap();
        prop_assert_eq!(validated, rating);
    }

    #[test]
    fn out_of_range_reviews_rejected(
        rating in prop_oneof![i32::MIN..=0, 6..=i32::MAX],
        name in "[A-Za-z]{1,12}",
        comment in "[A-Za-z]{1,40}"
    ) {
        let submission = ReviewSubmission {
            reviewer_name: Some(name),
            rating: Some(rating),
            comment: Some(comment),
        };
        match validate_review_fields(&submission) {
            Err(AppError::MissingField(fields)) => {
                prop_assert!(fields.contains(&"rating".to_string()));
            }
            other => prop_assert!(false, "expected MissingField, got {:?}", other.err()),
        }
    }
}

// Property: OTP codes are always 6 ASCII digits
proptest! {
    #[test]
    fn otp_codes_are_six_digits(_seed in 0u8..=255) {
        let code = generate_otp_code();
        prop_assert_eq!(code.len(), 6);
        prop_assert!(code.chars().all(|c| c.is_ascii_digit()));
    }
}

// Property: share token parsing accepts exactly UUIDs
proptest! {
    #[test]
    fn uuid_tokens_roundtrip(bytes in any::<[u8; 16]>()) {
        let token = uuid::Uuid::from_bytes(bytes);
        let parsed = parse_share_token(&token.to_string()).unwrap();
        prop_assert_eq!(parsed, token);
    }

    #[test]
    fn non_uuid_tokens_not_found(raw in "[a-z ]{0,20}") {
        if uuid::Uuid::parse_str(&raw).is_err() {
            let err = parse_share_token(&raw).unwrap_err();
            prop_assert!(matches!(err, AppError::TokenNotFound));
        }
    }
}
