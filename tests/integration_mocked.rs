/// Integration tests with mocked external collaborators
/// Exercises the SMS, mailer, Google and payment clients without hitting real services
use chrono::Utc;
use proven_pro_api::config::{Config, ProfileFieldConfig};
use proven_pro_api::errors::AppError;
use proven_pro_api::models::{Plan, SubscriptionTier, User, VerificationFacet, VerificationStatus};
use proven_pro_api::services::{GoogleAuthClient, MailerClient, PaymentClient, SmsClient};
use uuid::Uuid;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Helper function to create a test config pointing every collaborator at the
/// mock server.
fn create_test_config(base_url: &str) -> Config {
    Config {
        database_url: "postgresql://test".to_string(),
        port: 8080,
        frontend_url: "https://app.provenpro.example".to_string(),
        jwt_secret: "test-secret-test-secret-test-secret!".to_string(),
        admin_api_key: "admin-key".to_string(),
        mailer_base_url: base_url.to_string(),
        mailer_api_key: "mail-key".to_string(),
        mail_from: "no-reply@provenpro.example".to_string(),
        sms_base_url: base_url.to_string(),
        sms_account_sid: "ACtest".to_string(),
        sms_auth_token: "sms-token".to_string(),
        sms_from_number: "+15550006666".to_string(),
        payment_base_url: base_url.to_string(),
        payment_public_key: "pk-test".to_string(),
        google_tokeninfo_url: format!("{}/tokeninfo", base_url),
        share_ttl_days: 7,
        share_single_use: false,
        profile_fields: ProfileFieldConfig::defaults(),
    }
}

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
        subscription_tier: SubscriptionTier::Standard,
        subscription_active: true,
        subscription_start_date: None,
        subscription_end_date: None,
        first_name: Some("Alice".to_string()),
        last_name: Some("Reyes".to_string()),
        bio: None,
        profile_mail: None,
        profile_pic_url: None,
        rating: 4.5,
        mobile: Some("+5511987654321".to_string()),
        primary_tools: None,
        technical_skills: None,
        soft_skills: None,
        skills_description: None,
        video_intro_url: None,
        video_description: None,
        profile_url: "ab12cd34".to_string(),
        gov_id_document: Some("gov.pdf".to_string()),
        gov_id_status: VerificationStatus::Approved,
        address_document: None,
        address_status: VerificationStatus::Pending,
        mobile_status: VerificationStatus::Pending,
        created_at: Utc::now(),
        updated_at: None,
    }
}

#[tokio::test]
async fn test_sms_send_code_success() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/2010-04-01/Accounts/ACtest/Messages.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "sid": "SM123",
            "status": "queued"
        })))
        .mount(&mock_server)
        .await;

    let config = create_test_config(&mock_server.uri());
    let sms = SmsClient::new(&config).unwrap();

    let delivery_id = sms.send_code("+5511987654321", "042137").await.unwrap();
    assert_eq!(delivery_id, "SM123");
}

#[tokio::test]
async fn test_sms_gateway_error_is_delivery_failure() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("gateway down"))
        .mount(&mock_server)
        .await;

    let config = create_test_config(&mock_server.uri());
    let sms = SmsClient::new(&config).unwrap();

    let err = sms.send_code("+5511987654321", "042137").await.unwrap_err();
    assert!(matches!(err, AppError::DeliveryFailure(_)));
}

#[tokio::test]
async fn test_sms_circuit_opens_after_consecutive_failures() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("gateway down"))
        .mount(&mock_server)
        .await;

    let config = create_test_config(&mock_server.uri());
    let sms = SmsClient::new(&config).unwrap();

    for _ in 0..5 {
        let err = sms.send_code("+5511987654321", "042137").await.unwrap_err();
        assert!(matches!(err, AppError::DeliveryFailure(_)));
    }

    // Circuit is now open: the next call fails fast without reaching the gateway
    let err = sms.send_code("+5511987654321", "042137").await.unwrap_err();
    match err {
        AppError::DeliveryFailure(msg) => assert!(msg.contains("circuit open"), "msg: {}", msg),
        other => panic!("expected DeliveryFailure, got {:?}", other),
    }
}

#[tokio::test]
async fn test_mailer_send_success() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(202))
        .mount(&mock_server)
        .await;

    let config = create_test_config(&mock_server.uri());
    let mailer = MailerClient::new(&config).unwrap();

    let result = mailer
        .send("client@example.com", "Hello", "Plain text body")
        .await;
    assert!(result.is_ok());
}

#[tokio::test]
async fn test_mailer_gateway_error_surfaces() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("smtp relay down"))
        .mount(&mock_server)
        .await;

    let config = create_test_config(&mock_server.uri());
    let mailer = MailerClient::new(&config).unwrap();

    let err = mailer
        .send("client@example.com", "Hello", "Body")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::ExternalApiError(_)));
}

#[tokio::test]
async fn test_verification_result_mail_is_fire_and_forget() {
    let mock_server = MockServer::start().await;

    // Gateway is down; the notification must be swallowed, not propagated
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    let config = create_test_config(&mock_server.uri());
    let mailer = MailerClient::new(&config).unwrap();
    let user = test_user();

    mailer
        .send_verification_result(&user, VerificationFacet::GovId, true, 50)
        .await;
}

#[tokio::test]
async fn test_google_token_validation_success() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/tokeninfo"))
        .and(query_param("id_token", "good-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "email": "alice@gmail.com",
            "sub": "1234567890",
            "name": "Alice Reyes"
        })))
        .mount(&mock_server)
        .await;

    let config = create_test_config(&mock_server.uri());
    let google = GoogleAuthClient::new(&config).unwrap();

    let claims = google.verify_id_token("good-token").await.unwrap();
    assert_eq!(claims.email, "alice@gmail.com");
    assert_eq!(claims.sub, "1234567890");
    assert_eq!(claims.name.as_deref(), Some("Alice Reyes"));
}

#[tokio::test]
async fn test_google_rejected_token_is_unauthorized() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/tokeninfo"))
        .respond_with(ResponseTemplate::new(400).set_body_string("invalid_token"))
        .mount(&mock_server)
        .await;

    let config = create_test_config(&mock_server.uri());
    let google = GoogleAuthClient::new(&config).unwrap();

    let err = google.verify_id_token("bad-token").await.unwrap_err();
    assert!(matches!(err, AppError::Unauthorized(_)));
}

#[tokio::test]
async fn test_checkout_creation_returns_redirect() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/checkout/v1/checkouts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "checkoutId": "chk_1",
            "redirectUrl": "https://pay.example/chk_1"
        })))
        .mount(&mock_server)
        .await;

    let config = create_test_config(&mock_server.uri());
    let payments = PaymentClient::new(&config).unwrap();
    let plan = Plan {
        id: 1,
        name: "standard".to_string(),
        price: bigdecimal::BigDecimal::from(499),
        description: None,
    };
    let user = test_user();

    let url = payments
        .create_checkout(Uuid::new_v4(), &plan, &user, &config.frontend_url)
        .await
        .unwrap();
    assert_eq!(url, "https://pay.example/chk_1");
}

#[tokio::test]
async fn test_checkout_missing_redirect_is_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "checkoutId": "chk_1"
        })))
        .mount(&mock_server)
        .await;

    let config = create_test_config(&mock_server.uri());
    let payments = PaymentClient::new(&config).unwrap();
    let plan = Plan {
        id: 1,
        name: "standard".to_string(),
        price: bigdecimal::BigDecimal::from(499),
        description: None,
    };
    let user = test_user();

    let err = payments
        .create_checkout(Uuid::new_v4(), &plan, &user, &config.frontend_url)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::ExternalApiError(_)));
}

#[tokio::test]
async fn test_concurrent_sms_dispatches() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "sid": "SM123"
        })))
        .expect(10)
        .mount(&mock_server)
        .await;

    let config = create_test_config(&mock_server.uri());

    let mut handles = vec![];
    for i in 0..10 {
        let config_clone = config.clone();
        let handle = tokio::spawn(async move {
            let sms = SmsClient::new(&config_clone).unwrap();
            sms.send_code(&format!("+551198765432{}", i), "042137").await
        });
        handles.push(handle);
    }

    for handle in handles {
        let result = handle.await.unwrap();
        assert!(result.is_ok());
    }
}
