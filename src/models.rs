use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::errors::AppError;

// ============ Enumerations ============

/// Tri-state status of a single verification facet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "verification_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum VerificationStatus {
    Pending,
    Approved,
    Rejected,
}

/// Subscription tier controlling which profile sections a user may edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "subscription_tier", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionTier {
    Free,
    Standard,
    Premium,
}

impl SubscriptionTier {
    pub fn from_plan_name(name: &str) -> Option<Self> {
        match name {
            "free" => Some(Self::Free),
            "standard" => Some(Self::Standard),
            "premium" => Some(Self::Premium),
            _ => None,
        }
    }
}

/// Payment lifecycle of a subscription purchase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "payment_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
}

/// One of the three verification facets tracked per account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationFacet {
    GovId,
    Address,
    Mobile,
}

impl VerificationFacet {
    /// Parses a facet name from the wire format used by the upload/decision endpoints.
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        match raw {
            "gov_id" => Ok(Self::GovId),
            "address" => Ok(Self::Address),
            "mobile" => Ok(Self::Mobile),
            other => Err(AppError::InvalidFacet(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GovId => "gov_id",
            Self::Address => "address",
            Self::Mobile => "mobile",
        }
    }

    /// Human-readable name used in notification mails.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::GovId => "Government ID",
            Self::Address => "Address Proof",
            Self::Mobile => "Mobile Number",
        }
    }
}

// ============ Database Models ============

/// A platform account plus all flat profile fields.
///
/// The verification engine and the share manager both mutate this row, each
/// restricted to its own columns via partial UPDATEs.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub is_verified: bool,
    #[serde(skip_serializing)]
    pub google_id: Option<String>,
    pub is_google_user: bool,
    #[serde(skip_serializing)]
    pub reset_token_hash: Option<String>,
    #[serde(skip_serializing)]
    pub reset_token_created_at: Option<DateTime<Utc>>,

    pub subscription_tier: SubscriptionTier,
    pub subscription_active: bool,
    pub subscription_start_date: Option<DateTime<Utc>>,
    pub subscription_end_date: Option<DateTime<Utc>>,

    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub bio: Option<String>,
    pub profile_mail: Option<String>,
    pub profile_pic_url: Option<String>,
    pub rating: f64,
    pub mobile: Option<String>,
    pub primary_tools: Option<String>,
    pub technical_skills: Option<String>,
    pub soft_skills: Option<String>,
    pub skills_description: Option<String>,
    pub video_intro_url: Option<String>,
    pub video_description: Option<String>,
    pub profile_url: String,

    pub gov_id_document: Option<String>,
    pub gov_id_status: VerificationStatus,
    pub address_document: Option<String>,
    pub address_status: VerificationStatus,
    pub mobile_status: VerificationStatus,

    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl User {
    /// Display name: "First Last" when both parts are set, username otherwise.
    pub fn display_name(&self) -> String {
        match (&self.first_name, &self.last_name) {
            (Some(first), Some(last)) if !first.is_empty() && !last.is_empty() => {
                format!("{} {}", first, last)
            }
            _ => self.username.clone(),
        }
    }
}

/// A work-history entry.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Experience {
    pub id: Uuid,
    #[serde(skip_serializing)]
    pub user_id: Uuid,
    pub company_name: String,
    pub position: String,
    pub key_responsibilities: Option<String>,
    pub experience_start_date: Option<NaiveDate>,
    pub experience_end_date: Option<NaiveDate>,
}

/// A professional certification.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Certification {
    pub id: Uuid,
    #[serde(skip_serializing)]
    pub user_id: Uuid,
    pub certifications_name: String,
    pub certifications_issuer: String,
    pub certifications_issued_date: NaiveDate,
    pub certifications_expiration_date: Option<NaiveDate>,
    pub certifications_id: Option<String>,
    pub certifications_image_url: Option<String>,
}

/// An offered service category with rate and availability.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ServiceCategory {
    pub id: Uuid,
    #[serde(skip_serializing)]
    pub user_id: Uuid,
    pub services_categories: String,
    pub services_description: Option<String>,
    pub rate_range: Option<String>,
    pub availability: Option<String>,
}

/// A portfolio project.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Portfolio {
    pub id: Uuid,
    #[serde(skip_serializing)]
    pub user_id: Uuid,
    pub project_title: String,
    pub project_description: Option<String>,
    pub project_url: Option<String>,
    pub project_image_url: Option<String>,
}

/// A link to an external social platform profile.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct SocialLink {
    pub id: Uuid,
    #[serde(skip_serializing)]
    pub user_id: Uuid,
    pub platform: String,
    pub url: String,
}

/// A client review submitted through a share token.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Review {
    pub id: Uuid,
    pub user_id: Uuid,
    pub reviewer_name: String,
    pub rating: i32,
    pub comment: String,
    pub created_at: DateTime<Utc>,
}

/// A time-boxed grant of read access to a profile plus review submission.
///
/// Rows are never deleted or revoked; a share goes dead once `expires_at`
/// passes (or, with single-use enforcement on, once `consumed` is set).
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ProfileShare {
    pub id: Uuid,
    pub user_id: Uuid,
    pub share_token: Uuid,
    pub recipient_email: String,
    pub consumed: bool,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl ProfileShare {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// A purchasable subscription plan.
#[derive(Debug, Clone, FromRow)]
pub struct Plan {
    pub id: i32,
    pub name: String,
    pub price: bigdecimal::BigDecimal,
    pub description: Option<String>,
}

/// A subscription purchase attempt and its payment lifecycle.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Subscription {
    pub id: Uuid,
    pub user_id: Uuid,
    pub plan_id: i32,
    pub status: PaymentStatus,
    pub request_reference: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

// ============ Verification Snapshot ============

/// Per-facet detail in a verification snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct FacetDetail {
    pub uploaded: bool,
    pub verified: bool,
    pub percentage: i32,
}

/// Mobile facet detail (keyed on number presence rather than an upload).
#[derive(Debug, Clone, Serialize)]
pub struct MobileDetail {
    pub provided: bool,
    pub verified: bool,
    pub percentage: i32,
}

/// Read-only view of all three facet statuses plus the derived percentage.
#[derive(Debug, Clone, Serialize)]
pub struct VerificationSnapshot {
    pub gov_id_status: VerificationStatus,
    pub address_status: VerificationStatus,
    pub mobile_status: VerificationStatus,
    pub has_gov_id_document: bool,
    pub has_address_document: bool,
    pub mobile: Option<String>,
    pub percentage: i32,
    pub government_id: FacetDetail,
    pub address_proof: FacetDetail,
    pub mobile_detail: MobileDetail,
}

// ============ Public Profile Projection ============

/// Read-only projection of an account's public fields, served to share-token
/// holders. Never includes credentials, verification internals or billing state.
#[derive(Debug, Clone, Serialize)]
pub struct PublicProfileView {
    pub id: Uuid,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub profile_pic_url: Option<String>,
    pub rating: f64,
    pub subscription_tier: SubscriptionTier,
    pub email: String,
    pub mobile: Option<String>,
    pub bio: Option<String>,
    pub primary_tools: Option<String>,
    pub technical_skills: Option<String>,
    pub soft_skills: Option<String>,
    pub skills_description: Option<String>,
    pub video_intro_url: Option<String>,
    pub video_description: Option<String>,
    pub experiences: Vec<Experience>,
    pub certifications: Vec<Certification>,
    pub service_categories: Vec<ServiceCategory>,
    pub portfolios: Vec<Portfolio>,
}

// ============ API Request/Response Models ============

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RegisterConfirmParams {
    pub email: String,
    pub verify: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct GoogleAuthRequest {
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh: String,
}

#[derive(Debug, Deserialize)]
pub struct PasswordResetRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct PasswordResetConfirmRequest {
    pub token: String,
    pub new_password: String,
}

/// Access/refresh token pair returned by login-like endpoints.
#[derive(Debug, Serialize)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub message: String,
    pub access: String,
    pub refresh: String,
    pub user: AuthUserSummary,
}

#[derive(Debug, Serialize)]
pub struct AuthUserSummary {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ExperienceInput {
    pub company_name: String,
    pub position: String,
    pub key_responsibilities: Option<String>,
    pub experience_start_date: Option<NaiveDate>,
    pub experience_end_date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct CertificationInput {
    pub certifications_name: String,
    pub certifications_issuer: String,
    pub certifications_issued_date: NaiveDate,
    pub certifications_expiration_date: Option<NaiveDate>,
    pub certifications_id: Option<String>,
    pub certifications_image_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ServiceCategoryInput {
    pub services_categories: String,
    pub services_description: Option<String>,
    pub rate_range: Option<String>,
    pub availability: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PortfolioInput {
    pub project_title: String,
    pub project_description: Option<String>,
    pub project_url: Option<String>,
    pub project_image_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SocialLinkInput {
    pub platform: String,
    pub url: String,
}

/// Partial profile update. Collections use replace-on-update semantics.
#[derive(Debug, Default, Deserialize)]
pub struct ProfileUpdateRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub bio: Option<String>,
    pub profile_mail: Option<String>,
    pub profile_pic_url: Option<String>,
    pub mobile: Option<String>,
    pub primary_tools: Option<String>,
    pub technical_skills: Option<String>,
    pub soft_skills: Option<String>,
    pub skills_description: Option<String>,
    pub video_intro_url: Option<String>,
    pub video_description: Option<String>,
    pub experiences: Option<Vec<ExperienceInput>>,
    pub certifications: Option<Vec<CertificationInput>>,
    pub service_categories: Option<Vec<ServiceCategoryInput>>,
    pub portfolios: Option<Vec<PortfolioInput>>,
    pub social_links: Option<Vec<SocialLinkInput>>,
}

/// Full profile payload returned by the profile endpoints.
#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    #[serde(flatten)]
    pub user: User,
    pub experiences: Vec<Experience>,
    pub certifications: Vec<Certification>,
    pub service_categories: Vec<ServiceCategory>,
    pub portfolios: Vec<Portfolio>,
    pub social_links: Vec<SocialLink>,
}

/// Compact row returned by profile search.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ProfileSummary {
    pub id: Uuid,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub bio: Option<String>,
    pub rating: f64,
    pub subscription_tier: SubscriptionTier,
    pub profile_url: String,
    pub profile_pic_url: Option<String>,
    pub technical_skills: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub q: Option<String>,
    pub sort_by: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DocumentUploadRequest {
    pub document_type: String,
    pub document_url: String,
}

#[derive(Debug, Deserialize)]
pub struct MobileOtpRequest {
    pub mobile: String,
}

#[derive(Debug, Deserialize)]
pub struct MobileOtpConfirmRequest {
    pub otp: String,
}

#[derive(Debug, Deserialize)]
pub struct AdminDecisionRequest {
    pub user_id: Uuid,
    pub document_type: String,
    pub is_approved: bool,
}

#[derive(Debug, Deserialize)]
pub struct ShareRequest {
    pub email: String,
    pub ttl_days: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct ShareResponse {
    pub message: String,
    pub share_token: Uuid,
    pub verification_url: String,
}

#[derive(Debug, Deserialize)]
pub struct ReviewSubmission {
    pub reviewer_name: Option<String>,
    pub rating: Option<i32>,
    pub comment: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    pub plan: String,
}

#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub checkout_url: String,
    pub reference: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct RetryPaymentRequest {
    pub reference: Uuid,
}

/// Payment gateway webhook payload (PayMaya-style field names).
#[derive(Debug, Deserialize)]
pub struct PaymentWebhookPayload {
    #[serde(rename = "requestReferenceNumber")]
    pub request_reference_number: String,
    #[serde(rename = "paymentStatus", default)]
    pub payment_status: String,
}

#[derive(Debug, Serialize)]
pub struct SubscriptionStatusResponse {
    pub status: PaymentStatus,
    pub plan: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn facet_parse_roundtrip() {
        for raw in ["gov_id", "address", "mobile"] {
            let facet = VerificationFacet::parse(raw).unwrap();
            assert_eq!(facet.as_str(), raw);
        }
    }

    #[test]
    fn facet_parse_rejects_unknown() {
        let err = VerificationFacet::parse("passport").unwrap_err();
        assert!(matches!(err, AppError::InvalidFacet(ref f) if f == "passport"));
    }

    #[test]
    fn share_expiry_is_strict() {
        let created = Utc::now();
        let share = ProfileShare {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            share_token: Uuid::new_v4(),
            recipient_email: "a@b.com".to_string(),
            consumed: false,
            created_at: created,
            expires_at: created + chrono::Duration::days(7),
        };

        assert!(!share.is_expired(created));
        assert!(!share.is_expired(created + chrono::Duration::days(7)));
        assert!(share.is_expired(created + chrono::Duration::days(8)));
    }

    #[test]
    fn plan_name_maps_to_tier() {
        assert_eq!(
            SubscriptionTier::from_plan_name("premium"),
            Some(SubscriptionTier::Premium)
        );
        assert_eq!(SubscriptionTier::from_plan_name("gold"), None);
    }
}
