/// Unit tests for the share/review token manager's pure logic
/// Tests recipient validation, token parsing, expiry and review validation
use chrono::{Duration, Utc};
use proven_pro_api::errors::AppError;
use proven_pro_api::models::{ProfileShare, ReviewSubmission};
use proven_pro_api::shares::{is_valid_email, parse_share_token, validate_review_fields};
use uuid::Uuid;

fn share_with_ttl_days(ttl: i64) -> ProfileShare {
    let created = Utc::now();
    ProfileShare {
        id: Uuid::new_v4(),
        user_id: Uuid::new_v4(),
        share_token: Uuid::new_v4(),
        recipient_email: "client@example.com".to_string(),
        consumed: false,
        created_at: created,
        expires_at: created + Duration::days(ttl),
    }
}

#[cfg(test)]
mod email_validation_tests {
    use super::*;

    #[test]
    fn test_valid_emails() {
        assert!(is_valid_email("user@example.com"));
        assert!(is_valid_email("test.user@example.com"));
        assert!(is_valid_email("user+tag@example.co.uk"));
        assert!(is_valid_email("user_name@example-domain.com"));
    }

    #[test]
    fn test_invalid_emails() {
        // Missing @ or domain parts
        assert!(!is_valid_email("userexample.com"));
        assert!(!is_valid_email("user@examplecom"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("user@"));

        // Too short
        assert!(!is_valid_email("a@b"));
        assert!(!is_valid_email(""));

        // Whitespace
        assert!(!is_valid_email("user @example.com"));
        assert!(!is_valid_email("user@exam ple.com"));
    }
}

#[cfg(test)]
mod token_parse_tests {
    use super::*;

    #[test]
    fn test_valid_token_roundtrip() {
        let token = Uuid::new_v4();
        let parsed = parse_share_token(&token.to_string()).unwrap();
        assert_eq!(parsed, token);
    }

    #[test]
    fn test_malformed_tokens_are_not_found() {
        // Malformed tokens must be indistinguishable from unknown ones
        for raw in ["", "not-a-uuid", "12345", "zzzzzzzz-zzzz-zzzz-zzzz-zzzzzzzzzzzz"] {
            let err = parse_share_token(raw).unwrap_err();
            assert!(matches!(err, AppError::TokenNotFound), "raw: {:?}", raw);
        }
    }
}

#[cfg(test)]
mod expiry_tests {
    use super::*;

    #[test]
    fn test_share_valid_within_window() {
        let share = share_with_ttl_days(7);
        assert!(!share.is_expired(share.created_at));
        assert!(!share.is_expired(share.created_at + Duration::days(6)));
        // Expiry is strict: the boundary instant is still valid
        assert!(!share.is_expired(share.expires_at));
    }

    #[test]
    fn test_share_dead_after_window() {
        let share = share_with_ttl_days(7);
        assert!(share.is_expired(share.created_at + Duration::days(8)));
        assert!(share.is_expired(share.expires_at + Duration::seconds(1)));
    }

    #[test]
    fn test_one_day_variant() {
        let share = share_with_ttl_days(1);
        assert!(!share.is_expired(share.created_at + Duration::hours(23)));
        assert!(share.is_expired(share.created_at + Duration::hours(25)));
    }
}

#[cfg(test)]
mod review_validation_tests {
    use super::*;

    fn submission(name: Option<&str>, rating: Option<i32>, comment: Option<&str>) -> ReviewSubmission {
        ReviewSubmission {
            reviewer_name: name.map(String::from),
            rating,
            comment: comment.map(String::from),
        }
    }

    #[test]
    fn test_complete_submission_accepted() {
        let (name, rating, comment) =
            validate_review_fields(&submission(Some("Alice"), Some(5), Some("Great!"))).unwrap();
        assert_eq!(name, "Alice");
        assert_eq!(rating, 5);
        assert_eq!(comment, "Great!");
    }

    #[test]
    fn test_each_missing_field_is_named() {
        let err = validate_review_fields(&submission(None, Some(3), Some("ok"))).unwrap_err();
        assert!(matches!(err, AppError::MissingField(ref f) if f == &["reviewer_name"]));

        let err = validate_review_fields(&submission(Some("Bob"), None, Some("ok"))).unwrap_err();
        assert!(matches!(err, AppError::MissingField(ref f) if f == &["rating"]));

        let err = validate_review_fields(&submission(Some("Bob"), Some(3), None)).unwrap_err();
        assert!(matches!(err, AppError::MissingField(ref f) if f == &["comment"]));
    }

    #[test]
    fn test_all_missing_fields_reported_at_once() {
        let err = validate_review_fields(&submission(None, None, None)).unwrap_err();
        match err {
            AppError::MissingField(fields) => {
                assert_eq!(fields, vec!["reviewer_name", "rating", "comment"]);
            }
            other => panic!("expected MissingField, got {:?}", other),
        }
    }

    #[test]
    fn test_out_of_range_rating_fails_never_clamps() {
        for rating in [0, 6, -1, 100] {
            let err =
                validate_review_fields(&submission(Some("Alice"), Some(rating), Some("x")))
                    .unwrap_err();
            assert!(
                matches!(err, AppError::MissingField(ref f) if f.contains(&"rating".to_string())),
                "rating {} must fail validation",
                rating
            );
        }
    }

    #[test]
    fn test_whitespace_only_fields_are_missing() {
        let err =
            validate_review_fields(&submission(Some("   "), Some(4), Some("  "))).unwrap_err();
        match err {
            AppError::MissingField(fields) => {
                assert!(fields.contains(&"reviewer_name".to_string()));
                assert!(fields.contains(&"comment".to_string()));
            }
            other => panic!("expected MissingField, got {:?}", other),
        }
    }

    #[test]
    fn test_boundary_ratings_accepted() {
        assert!(validate_review_fields(&submission(Some("A"), Some(1), Some("meh"))).is_ok());
        assert!(validate_review_fields(&submission(Some("A"), Some(5), Some("wow"))).is_ok());
    }
}
