//! Share/review token manager: time-boxed grants of read access to a public
//! profile view, and the review submission they gate.
//!
//! Tokens are 128-bit random values, immutable once issued, never deleted or
//! revoked; wall-clock expiry alone retires them. With `share_single_use`
//! enabled a token also dies after its first accepted review.

use chrono::Utc;
use regex::Regex;
use sqlx::PgPool;
use uuid::Uuid;

use crate::config::Config;
use crate::errors::{AppError, ResultExt};
use crate::handlers::AppState;
use crate::models::{
    ProfileShare, PublicProfileView, Review, ReviewSubmission, ShareRequest, ShareResponse, User,
};
use crate::profile::ProfileStorage;
use crate::services::MailerClient;

/// Validate email address
///
/// Checks basic RFC 5322 structure plus minimum length. Used both for share
/// recipients and registration.
pub fn is_valid_email(email: &str) -> bool {
    if email.len() < 5 {
        return false;
    }

    // RFC 5322 simplified email regex
    let email_regex = Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)+$",
    )
    .unwrap();

    email_regex.is_match(email)
}

/// Parses a share token from its wire form. Malformed tokens are
/// indistinguishable from unknown ones.
pub fn parse_share_token(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| AppError::TokenNotFound)
}

/// Validates review fields, naming every offending field at once.
///
/// A rating outside 1..=5 is reported the same way as an absent one; it is
/// never clamped.
pub fn validate_review_fields(
    submission: &ReviewSubmission,
) -> Result<(String, i32, String), AppError> {
    let mut missing = Vec::new();

    let reviewer_name = submission
        .reviewer_name
        .as_deref()
        .unwrap_or("")
        .trim()
        .to_string();
    if reviewer_name.is_empty() {
        missing.push("reviewer_name".to_string());
    }

    let rating = match submission.rating {
        Some(r) if (1..=5).contains(&r) => Some(r),
        _ => {
            missing.push("rating".to_string());
            None
        }
    };

    let comment = submission
        .comment
        .as_deref()
        .unwrap_or("")
        .trim()
        .to_string();
    if comment.is_empty() {
        missing.push("comment".to_string());
    }

    if let Some(rating) = rating {
        if missing.is_empty() {
            return Ok((reviewer_name, rating, comment));
        }
    }

    Err(AppError::MissingField(missing))
}

pub struct ShareService {
    pool: PgPool,
    config: Config,
    mailer: MailerClient,
}

impl ShareService {
    pub fn new(state: &AppState) -> Self {
        Self {
            pool: state.db.clone(),
            config: state.config.clone(),
            mailer: state.mailer.clone(),
        }
    }

    /// Issues a share token and mails the deep link to the recipient.
    ///
    /// Mail dispatch failure is non-fatal: the token is already persisted and
    /// is returned either way, with a message telling the owner to share the
    /// link manually.
    pub async fn create_share(
        &self,
        user: &User,
        req: &ShareRequest,
    ) -> Result<ShareResponse, AppError> {
        if !is_valid_email(&req.email) {
            return Err(AppError::InvalidRecipient(req.email.clone()));
        }

        let ttl_days = req.ttl_days.unwrap_or(self.config.share_ttl_days);
        if ttl_days <= 0 {
            return Err(AppError::BadRequest(
                "ttl_days must be positive".to_string(),
            ));
        }

        let share = sqlx::query_as::<_, ProfileShare>(
            "INSERT INTO profile_shares (user_id, recipient_email, expires_at)
             VALUES ($1, $2, now() + make_interval(days => $3))
             RETURNING *",
        )
        .bind(user.id)
        .bind(&req.email)
        .bind(ttl_days as i32)
        .fetch_one(&self.pool)
        .await?;

        let verification_url = format!(
            "{}/verify-profile/{}",
            self.config.frontend_url, share.share_token
        );

        let message = match self
            .mailer
            .send_share_invitation(&req.email, &user.display_name(), &verification_url)
            .await
        {
            Ok(()) => "Share link sent successfully",
            Err(e) => {
                tracing::error!("Email sending failed: {}", e);
                "Share link created but email sending failed. Please share the link manually."
            }
        };

        tracing::info!(
            "Share {} issued for user {} (expires {})",
            share.share_token,
            user.id,
            share.expires_at
        );

        Ok(ShareResponse {
            message: message.to_string(),
            share_token: share.share_token,
            verification_url,
        })
    }

    /// Loads a share and applies the validity checks shared by resolve and
    /// review submission.
    async fn load_valid_share(&self, token: &str) -> Result<ProfileShare, AppError> {
        let token = parse_share_token(token)?;

        let share =
            sqlx::query_as::<_, ProfileShare>("SELECT * FROM profile_shares WHERE share_token = $1")
                .bind(token)
                .fetch_optional(&self.pool)
                .await?
                .ok_or(AppError::TokenNotFound)?;

        if share.is_expired(Utc::now()) {
            return Err(AppError::TokenExpired);
        }

        if self.config.share_single_use && share.consumed {
            return Err(AppError::TokenExpired);
        }

        Ok(share)
    }

    /// Resolves a token to the owning account's public profile projection.
    pub async fn resolve_share(&self, token: &str) -> Result<PublicProfileView, AppError> {
        let share = self.load_valid_share(token).await?;

        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(share.user_id)
            .fetch_optional(&self.pool)
            .await
            .context("loading share owner")?
            .ok_or_else(|| AppError::NotFound("Profile not found".to_string()))?;

        ProfileStorage::new(self.pool.clone()).public_view(&user).await
    }

    /// Accepts a review through a valid token and recomputes the owner's
    /// aggregate rating.
    ///
    /// Insert and recompute commit in one transaction; the aggregate is a
    /// server-side AVG, so concurrent submissions cannot lose updates.
    pub async fn submit_review(
        &self,
        token: &str,
        submission: &ReviewSubmission,
    ) -> Result<Review, AppError> {
        let (reviewer_name, rating, comment) = validate_review_fields(submission)?;
        let share = self.load_valid_share(token).await?;

        let mut tx = self.pool.begin().await?;

        let review = sqlx::query_as::<_, Review>(
            "INSERT INTO reviews (user_id, reviewer_name, rating, comment)
             VALUES ($1, $2, $3, $4)
             RETURNING *",
        )
        .bind(share.user_id)
        .bind(&reviewer_name)
        .bind(rating)
        .bind(&comment)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            "UPDATE users
             SET rating = (SELECT COALESCE(AVG(rating)::float8, 0) FROM reviews WHERE user_id = $1)
             WHERE id = $1",
        )
        .bind(share.user_id)
        .execute(&mut *tx)
        .await?;

        if self.config.share_single_use {
            sqlx::query("UPDATE profile_shares SET consumed = TRUE WHERE id = $1")
                .bind(share.id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        tracing::info!(
            "Review {} ({} stars) recorded for user {}",
            review.id,
            review.rating,
            share.user_id
        );
        Ok(review)
    }

    /// Owner-facing review listing, newest first.
    pub async fn list_reviews(&self, user_id: Uuid) -> Result<Vec<Review>, AppError> {
        let reviews = sqlx::query_as::<_, Review>(
            "SELECT * FROM reviews WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(reviews)
    }
}
