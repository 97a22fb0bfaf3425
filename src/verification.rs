//! Verification engine: document-bearing facets, the mobile OTP exchange and
//! the derived completion percentage.
//!
//! Facet weights are fixed: government ID 50, address proof 25, mobile 25.
//! Statuses move `pending -> approved | rejected` and may be flipped by an
//! admin decision; the mobile facet is only ever approved through a completed
//! OTP exchange. A decision requires the document to be on file.

use chrono::{DateTime, Utc};
use moka::future::Cache;
use rand::Rng;
use sqlx::PgPool;
use uuid::Uuid;

use crate::errors::AppError;
use crate::handlers::AppState;
use crate::models::{
    FacetDetail, MobileDetail, User, VerificationFacet, VerificationSnapshot, VerificationStatus,
};
use crate::services::{MailerClient, SmsClient};

/// An in-flight OTP challenge, held only in the session-keyed cache.
///
/// The code never touches the persistent store; cache TTL is the challenge
/// lifetime.
#[derive(Debug, Clone)]
pub struct OtpChallenge {
    pub code: String,
    pub mobile: String,
    pub requested_at: DateTime<Utc>,
}

impl OtpChallenge {
    /// Codes are compared as strings, exactly as submitted.
    pub fn matches(&self, submitted: &str) -> bool {
        self.code == submitted
    }
}

/// Generates a 6-digit numeric OTP code.
pub fn generate_otp_code() -> String {
    let mut rng = rand::thread_rng();
    (0..6).map(|_| char::from(b'0' + rng.gen_range(0..10))).collect()
}

/// Derived completion percentage for the three facet statuses.
///
/// Only approved facets count; the reachable values are {0,25,50,75,100}.
pub fn completion_percentage(
    gov_id: VerificationStatus,
    address: VerificationStatus,
    mobile: VerificationStatus,
) -> i32 {
    let mut percentage = 0;
    if gov_id == VerificationStatus::Approved {
        percentage += 50;
    }
    if address == VerificationStatus::Approved {
        percentage += 25;
    }
    if mobile == VerificationStatus::Approved {
        percentage += 25;
    }
    percentage
}

/// Validates a mobile number and normalizes it to E.164.
///
/// Numbers must arrive in international format (+<country><number>); no
/// default region is assumed.
pub fn validate_mobile(raw: &str) -> Result<String, AppError> {
    if raw.trim().is_empty() || raw.len() < 8 {
        return Err(AppError::BadRequest("Mobile number too short".to_string()));
    }

    let parsed = phonenumber::parse(None, raw)
        .map_err(|_| AppError::BadRequest(format!("Invalid mobile number: {}", raw)))?;

    if !phonenumber::is_valid(&parsed) {
        return Err(AppError::BadRequest(format!(
            "Invalid mobile number: {}",
            raw
        )));
    }

    Ok(parsed
        .format()
        .mode(phonenumber::Mode::E164)
        .to_string())
}

/// Builds the read-only verification snapshot for an account. Never mutates.
pub fn snapshot_for(user: &User) -> VerificationSnapshot {
    let percentage =
        completion_percentage(user.gov_id_status, user.address_status, user.mobile_status);

    VerificationSnapshot {
        gov_id_status: user.gov_id_status,
        address_status: user.address_status,
        mobile_status: user.mobile_status,
        has_gov_id_document: user.gov_id_document.is_some(),
        has_address_document: user.address_document.is_some(),
        mobile: user.mobile.clone(),
        percentage,
        government_id: FacetDetail {
            uploaded: user.gov_id_document.is_some(),
            verified: user.gov_id_status == VerificationStatus::Approved,
            percentage: if user.gov_id_status == VerificationStatus::Approved {
                50
            } else {
                0
            },
        },
        address_proof: FacetDetail {
            uploaded: user.address_document.is_some(),
            verified: user.address_status == VerificationStatus::Approved,
            percentage: if user.address_status == VerificationStatus::Approved {
                25
            } else {
                0
            },
        },
        mobile_detail: MobileDetail {
            provided: user.mobile.is_some(),
            verified: user.mobile_status == VerificationStatus::Approved,
            percentage: if user.mobile_status == VerificationStatus::Approved {
                25
            } else {
                0
            },
        },
    }
}

const UPDATE_GOV_ID_DOCUMENT: &str =
    "UPDATE users SET gov_id_document = $1, updated_at = now() WHERE id = $2 RETURNING *";

const UPDATE_ADDRESS_DOCUMENT: &str =
    "UPDATE users SET address_document = $1, updated_at = now() WHERE id = $2 RETURNING *";

pub struct VerificationEngine {
    pool: PgPool,
    otp_sessions: Cache<String, OtpChallenge>,
    percentages: Cache<Uuid, i32>,
    sms: SmsClient,
    mailer: MailerClient,
}

impl VerificationEngine {
    pub fn new(state: &AppState) -> Self {
        Self {
            pool: state.db.clone(),
            otp_sessions: state.otp_sessions.clone(),
            percentages: state.verification_percentages.clone(),
            sms: state.sms.clone(),
            mailer: state.mailer.clone(),
        }
    }

    /// Attaches a document reference to a document-bearing facet.
    ///
    /// Does not auto-approve, and never touches a decided status; only an
    /// admin decision (or the OTP exchange, for mobile) moves a facet.
    pub async fn submit_document(
        &self,
        user: &User,
        facet: VerificationFacet,
        document_url: &str,
    ) -> Result<VerificationSnapshot, AppError> {
        if document_url.trim().is_empty() {
            return Err(AppError::BadRequest("No document provided".to_string()));
        }

        let query = match facet {
            VerificationFacet::GovId => UPDATE_GOV_ID_DOCUMENT,
            VerificationFacet::Address => UPDATE_ADDRESS_DOCUMENT,
            VerificationFacet::Mobile => {
                return Err(AppError::InvalidFacet("mobile".to_string()))
            }
        };

        let updated = sqlx::query_as::<_, User>(query)
            .bind(document_url)
            .bind(user.id)
            .fetch_one(&self.pool)
            .await?;

        self.percentages.invalidate(&user.id).await;

        tracing::info!(
            "User {} submitted {} document",
            user.id,
            facet.as_str()
        );
        Ok(snapshot_for(&updated))
    }

    /// Starts a mobile OTP challenge for the caller's session.
    ///
    /// The number is persisted before dispatch; a delivery failure surfaces
    /// as `DeliveryFailure` but does not roll the number back.
    pub async fn request_mobile_otp(
        &self,
        session_key: &str,
        user: &User,
        mobile: &str,
    ) -> Result<String, AppError> {
        let normalized = validate_mobile(mobile)?;

        sqlx::query("UPDATE users SET mobile = $1, updated_at = now() WHERE id = $2")
            .bind(&normalized)
            .bind(user.id)
            .execute(&self.pool)
            .await?;

        let code = generate_otp_code();
        self.otp_sessions
            .insert(
                session_key.to_string(),
                OtpChallenge {
                    code: code.clone(),
                    mobile: normalized.clone(),
                    requested_at: Utc::now(),
                },
            )
            .await;

        let delivery_id = self.sms.send_code(&normalized, &code).await?;

        tracing::info!("OTP challenge issued for user {}", user.id);
        Ok(delivery_id)
    }

    /// Confirms the pending OTP challenge for the caller's session.
    ///
    /// A mismatch keeps the challenge alive so the user can retry; a match
    /// approves the mobile facet and clears the challenge.
    pub async fn confirm_mobile_otp(
        &self,
        session_key: &str,
        user: &User,
        submitted_code: &str,
    ) -> Result<VerificationSnapshot, AppError> {
        let challenge = self
            .otp_sessions
            .get(session_key)
            .await
            .ok_or(AppError::NoChallengeInProgress)?;

        if !challenge.matches(submitted_code) {
            return Err(AppError::OtpMismatch);
        }

        let updated = sqlx::query_as::<_, User>(
            "UPDATE users
             SET mobile_status = 'approved', mobile = $1, updated_at = now()
             WHERE id = $2
             RETURNING *",
        )
        .bind(&challenge.mobile)
        .bind(user.id)
        .fetch_one(&self.pool)
        .await?;

        self.otp_sessions.invalidate(session_key).await;
        self.percentages.invalidate(&user.id).await;

        tracing::info!("Mobile number verified for user {}", user.id);
        Ok(snapshot_for(&updated))
    }

    /// Applies an admin decision to a document-bearing facet.
    ///
    /// Requires the document to be on file. The account holder is notified
    /// only when the status actually changed; repeating the same decision is
    /// a silent no-op.
    pub async fn decide_facet(
        &self,
        user_id: Uuid,
        facet: VerificationFacet,
        approve: bool,
    ) -> Result<VerificationSnapshot, AppError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

        let (old_status, has_document, query) = match facet {
            VerificationFacet::GovId => (
                user.gov_id_status,
                user.gov_id_document.is_some(),
                "UPDATE users SET gov_id_status = $1, updated_at = now() WHERE id = $2 RETURNING *",
            ),
            VerificationFacet::Address => (
                user.address_status,
                user.address_document.is_some(),
                "UPDATE users SET address_status = $1, updated_at = now() WHERE id = $2 RETURNING *",
            ),
            VerificationFacet::Mobile => {
                return Err(AppError::InvalidFacet("mobile".to_string()))
            }
        };

        if !has_document {
            return Err(AppError::BadRequest(format!(
                "No {} document on file",
                facet.display_name()
            )));
        }

        let new_status = if approve {
            VerificationStatus::Approved
        } else {
            VerificationStatus::Rejected
        };

        let updated = sqlx::query_as::<_, User>(query)
            .bind(new_status)
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;

        self.percentages.invalidate(&user_id).await;
        let snapshot = snapshot_for(&updated);

        if old_status != new_status {
            tracing::info!(
                "Facet {} for user {} moved {:?} -> {:?}",
                facet.as_str(),
                user_id,
                old_status,
                new_status
            );
            self.mailer
                .send_verification_result(&updated, facet, approve, snapshot.percentage)
                .await;
        }

        Ok(snapshot)
    }

    /// Pure read of the verification state; memoizes the derived percentage.
    pub async fn get_status(&self, user: &User) -> VerificationSnapshot {
        let snapshot = snapshot_for(user);
        self.percentages.insert(user.id, snapshot.percentage).await;
        snapshot
    }

    /// Last memoized percentage for an account, if still fresh.
    pub async fn cached_percentage(&self, user_id: Uuid) -> Option<i32> {
        self.percentages.get(&user_id).await
    }
}
