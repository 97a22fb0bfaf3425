use crate::auth::{AdminKey, AuthService, AuthUser};
use crate::config::Config;
use crate::errors::AppError;
use crate::models::*;
use crate::profile::{completion_fields, next_steps, ProfileStorage};
use crate::services::{GoogleAuthClient, MailerClient, PaymentClient, SmsClient};
use crate::shares::ShareService;
use crate::subscription::SubscriptionService;
use crate::verification::{OtpChallenge, VerificationEngine};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use moka::future::Cache;
use serde_json::json;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

/// Shared application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub db: PgPool,
    /// Application configuration.
    pub config: Config,
    /// Session-keyed OTP challenge store (5 minute TTL). This is the only
    /// place an OTP code lives; it never reaches the persistent store.
    pub otp_sessions: Cache<String, OtpChallenge>,
    /// Memoized verification percentages per account (5 minute TTL).
    pub verification_percentages: Cache<Uuid, i32>,
    /// SMS/OTP delivery client.
    pub sms: SmsClient,
    /// Transactional mail client.
    pub mailer: MailerClient,
    /// Google ID token validator.
    pub google: GoogleAuthClient,
    /// Payment gateway checkout client.
    pub payments: PaymentClient,
}

/// Health check endpoint.
pub async fn health() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "proven-pro-api",
            "version": "0.1.0"
        })),
    )
}

// ============ Auth ============

/// POST /api/v1/auth/register
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    tracing::info!("POST /auth/register - username: {}", req.username);
    let body = AuthService::new(&state).register(req).await?;
    Ok(Json(body))
}

/// GET /api/v1/auth/register/confirm?email=..&verify=yes|no
///
/// Target of the links in the confirmation mail.
pub async fn register_confirm(
    State(state): State<Arc<AppState>>,
    Query(params): Query<RegisterConfirmParams>,
) -> Result<Json<serde_json::Value>, AppError> {
    let body = AuthService::new(&state).confirm_registration(params).await?;
    Ok(Json(body))
}

/// POST /api/v1/auth/login
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let response = AuthService::new(&state).login(req).await?;
    Ok(Json(response))
}

/// POST /api/v1/auth/google
pub async fn google_auth(
    State(state): State<Arc<AppState>>,
    Json(req): Json<GoogleAuthRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let response = AuthService::new(&state).google_sign_in(req).await?;
    Ok(Json(response))
}

/// POST /api/v1/auth/logout
pub async fn logout(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RefreshRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let body = AuthService::new(&state).logout(&req.refresh).await?;
    Ok(Json(body))
}

/// POST /api/v1/auth/refresh
pub async fn refresh_token(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RefreshRequest>,
) -> Result<Json<TokenPair>, AppError> {
    let pair = AuthService::new(&state).refresh(&req.refresh).await?;
    Ok(Json(pair))
}

/// POST /api/v1/auth/request-password-reset
pub async fn request_password_reset(
    State(state): State<Arc<AppState>>,
    Json(req): Json<PasswordResetRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let body = AuthService::new(&state).request_password_reset(req).await?;
    Ok(Json(body))
}

/// POST /api/v1/auth/reset-password-confirm
pub async fn confirm_password_reset(
    State(state): State<Arc<AppState>>,
    Json(req): Json<PasswordResetConfirmRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let body = AuthService::new(&state).confirm_password_reset(req).await?;
    Ok(Json(body))
}

// ============ Profile ============

/// GET /api/v1/profile
pub async fn get_profile(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Json<ProfileResponse>, AppError> {
    let profile = ProfileStorage::new(state.db.clone())
        .load_profile(&auth.user)
        .await?;
    Ok(Json(profile))
}

/// POST /api/v1/profile
pub async fn update_profile(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(req): Json<ProfileUpdateRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    tracing::info!("POST /profile - user: {}", auth.user.id);

    let profile = ProfileStorage::new(state.db.clone())
        .update_profile(&auth.user, req, &state.config.profile_fields)
        .await?;

    Ok(Json(json!({
        "message": "Profile updated successfully",
        "data": profile
    })))
}

/// GET /api/v1/profiles/search
pub async fn search_profiles(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<ProfileSummary>>, AppError> {
    let results = ProfileStorage::new(state.db.clone()).search(&params).await?;
    Ok(Json(results))
}

/// GET /api/v1/profile/status
///
/// Profile completion overview plus the memoized verification percentage.
pub async fn profile_status(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Json<serde_json::Value>, AppError> {
    let engine = VerificationEngine::new(&state);
    let verification_percentage = match engine.cached_percentage(auth.user.id).await {
        Some(p) => p,
        None => engine.get_status(&auth.user).await.percentage,
    };

    let fields = completion_fields(&auth.user);
    let completed = fields.iter().filter(|(_, set)| *set).count();
    let completion_percentage = (completed * 100 / fields.len()) as i32;
    let has_profile = auth.user.first_name.is_some() && auth.user.last_name.is_some();

    let field_map: serde_json::Map<String, serde_json::Value> = fields
        .iter()
        .map(|(name, set)| (name.to_string(), json!(set)))
        .collect();

    Ok(Json(json!({
        "has_profile": has_profile,
        "subscription_tier": auth.user.subscription_tier,
        "verification_percentage": verification_percentage,
        "profile_completion": {
            "percentage": completion_percentage,
            "fields": field_map
        },
        "next_steps": next_steps(&fields)
    })))
}

// ============ Verification ============

/// POST /api/v1/verification/documents
pub async fn upload_verification_document(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(req): Json<DocumentUploadRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let facet = VerificationFacet::parse(&req.document_type)?;

    let snapshot = VerificationEngine::new(&state)
        .submit_document(&auth.user, facet, &req.document_url)
        .await?;

    Ok(Json(json!({
        "message": format!("{} document uploaded successfully", facet.display_name()),
        "verification_status": snapshot
    })))
}

/// POST /api/v1/verification/mobile/request
pub async fn request_mobile_verification(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(req): Json<MobileOtpRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let sid = VerificationEngine::new(&state)
        .request_mobile_otp(&auth.session_key, &auth.user, &req.mobile)
        .await?;

    Ok(Json(json!({
        "message": "Verification code sent to your mobile number",
        "sid": sid
    })))
}

/// POST /api/v1/verification/mobile/confirm
pub async fn verify_mobile_otp(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(req): Json<MobileOtpConfirmRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let snapshot = VerificationEngine::new(&state)
        .confirm_mobile_otp(&auth.session_key, &auth.user, &req.otp)
        .await?;

    Ok(Json(json!({
        "message": "Mobile number verified successfully",
        "verification_status": snapshot
    })))
}

/// GET /api/v1/verification/status
pub async fn get_verification_status(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Json<VerificationSnapshot>, AppError> {
    let snapshot = VerificationEngine::new(&state).get_status(&auth.user).await;
    Ok(Json(snapshot))
}

/// POST /api/v1/admin/verification/decision
///
/// Admin-only facet decision, gated by the X-Admin-Key header.
pub async fn admin_document_decision(
    State(state): State<Arc<AppState>>,
    _admin: AdminKey,
    Json(req): Json<AdminDecisionRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let facet = VerificationFacet::parse(&req.document_type)?;

    let snapshot = VerificationEngine::new(&state)
        .decide_facet(req.user_id, facet, req.is_approved)
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": format!(
            "{} {} successfully",
            facet.display_name(),
            if req.is_approved { "approved" } else { "rejected" }
        ),
        "user_id": req.user_id,
        "verification_status": snapshot
    })))
}

// ============ Shares & Reviews ============

/// POST /api/v1/shares
pub async fn generate_profile_share(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(req): Json<ShareRequest>,
) -> Result<(StatusCode, Json<ShareResponse>), AppError> {
    let response = ShareService::new(&state).create_share(&auth.user, &req).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// GET /api/v1/shares/:token
///
/// Public: resolves a share token into the owner's public profile view.
pub async fn resolve_profile_share(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let profile = ShareService::new(&state).resolve_share(&token).await?;
    Ok(Json(json!({
        "profile": profile,
        "share_token": token
    })))
}

/// POST /api/v1/shares/:token/reviews
///
/// Public: submits a review through a valid share token.
pub async fn submit_profile_review(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
    Json(req): Json<ReviewSubmission>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    let review = ShareService::new(&state).submit_review(&token, &req).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Review submitted successfully",
            "review": review
        })),
    ))
}

/// GET /api/v1/reviews
pub async fn get_reviews(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Json<Vec<Review>>, AppError> {
    let reviews = ShareService::new(&state).list_reviews(auth.user.id).await?;
    Ok(Json(reviews))
}

// ============ Subscription ============

/// POST /api/v1/subscriptions/checkout
pub async fn create_subscription_payment(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(req): Json<CheckoutRequest>,
) -> Result<Json<CheckoutResponse>, AppError> {
    let response = SubscriptionService::new(&state)
        .create_checkout(&auth.user, &req.plan)
        .await?;
    Ok(Json(response))
}

/// POST /api/v1/subscriptions/retry
pub async fn retry_subscription_payment(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(req): Json<RetryPaymentRequest>,
) -> Result<Json<CheckoutResponse>, AppError> {
    let response = SubscriptionService::new(&state)
        .retry_payment(&auth.user, req.reference)
        .await?;
    Ok(Json(response))
}

/// GET /api/v1/subscriptions/check
pub async fn subscription_check(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Json<SubscriptionStatusResponse>, AppError> {
    let status = SubscriptionService::new(&state).check(auth.user.id).await?;
    Ok(Json(status))
}

/// POST /api/v1/webhooks/payment
///
/// Payment gateway status callback. Always acknowledged with 200 once parsed.
pub async fn payment_webhook(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<PaymentWebhookPayload>,
) -> Result<StatusCode, AppError> {
    SubscriptionService::new(&state).apply_webhook(&payload).await?;
    Ok(StatusCode::OK)
}
