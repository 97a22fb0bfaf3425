//! Subscription billing state: plan lookup, checkout creation through the
//! payment gateway collaborator, and the status webhook that finalizes a
//! purchase.

use sqlx::PgPool;
use uuid::Uuid;

use crate::config::Config;
use crate::errors::AppError;
use crate::handlers::AppState;
use crate::models::{
    CheckoutResponse, PaymentStatus, PaymentWebhookPayload, Plan, SubscriptionStatusResponse,
    SubscriptionTier, User,
};
use crate::services::PaymentClient;

pub struct SubscriptionService {
    pool: PgPool,
    config: Config,
    payments: PaymentClient,
}

impl SubscriptionService {
    pub fn new(state: &AppState) -> Self {
        Self {
            pool: state.db.clone(),
            config: state.config.clone(),
            payments: state.payments.clone(),
        }
    }

    /// Creates a pending subscription and a hosted checkout session for it.
    pub async fn create_checkout(
        &self,
        user: &User,
        plan_name: &str,
    ) -> Result<CheckoutResponse, AppError> {
        let plan = self.plan_by_name(plan_name).await?;
        let reference = Uuid::new_v4();

        sqlx::query(
            "INSERT INTO subscriptions (user_id, plan_id, status, request_reference)
             VALUES ($1, $2, 'pending', $3)",
        )
        .bind(user.id)
        .bind(plan.id)
        .bind(reference)
        .execute(&self.pool)
        .await?;

        let checkout_url = self
            .payments
            .create_checkout(reference, &plan, user, &self.config.frontend_url)
            .await?;

        Ok(CheckoutResponse {
            checkout_url,
            reference,
        })
    }

    /// Re-runs checkout for a failed purchase under a fresh reference.
    pub async fn retry_payment(
        &self,
        user: &User,
        reference: Uuid,
    ) -> Result<CheckoutResponse, AppError> {
        let failed: Option<(i32,)> = sqlx::query_as(
            "SELECT plan_id FROM subscriptions
             WHERE request_reference = $1 AND user_id = $2 AND status = 'failed'",
        )
        .bind(reference)
        .bind(user.id)
        .fetch_optional(&self.pool)
        .await?;

        let Some((plan_id,)) = failed else {
            return Err(AppError::NotFound(
                "No failed transaction found".to_string(),
            ));
        };

        let plan = sqlx::query_as::<_, Plan>("SELECT * FROM plans WHERE id = $1")
            .bind(plan_id)
            .fetch_one(&self.pool)
            .await?;

        let new_reference = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO subscriptions (user_id, plan_id, status, request_reference)
             VALUES ($1, $2, 'pending', $3)",
        )
        .bind(user.id)
        .bind(plan.id)
        .bind(new_reference)
        .execute(&self.pool)
        .await?;

        let checkout_url = self
            .payments
            .create_checkout(new_reference, &plan, user, &self.config.frontend_url)
            .await?;

        Ok(CheckoutResponse {
            checkout_url,
            reference: new_reference,
        })
    }

    /// Applies a gateway status webhook.
    ///
    /// Unknown references are acknowledged and dropped; gateways retry
    /// aggressively and a non-2xx would only cause re-delivery.
    pub async fn apply_webhook(&self, payload: &PaymentWebhookPayload) -> Result<(), AppError> {
        let reference = Uuid::parse_str(&payload.request_reference_number)
            .map_err(|_| AppError::BadRequest("Invalid requestReferenceNumber".to_string()))?;
        let status_text = payload.payment_status.to_lowercase();

        let sub: Option<(Uuid, i32)> = sqlx::query_as(
            "SELECT user_id, plan_id FROM subscriptions WHERE request_reference = $1",
        )
        .bind(reference)
        .fetch_optional(&self.pool)
        .await?;

        let Some((user_id, plan_id)) = sub else {
            tracing::warn!("Payment webhook for unknown reference {}", reference);
            return Ok(());
        };

        if status_text.contains("success") {
            sqlx::query(
                "UPDATE subscriptions SET status = 'paid', updated_at = now()
                 WHERE request_reference = $1",
            )
            .bind(reference)
            .execute(&self.pool)
            .await?;

            let plan = sqlx::query_as::<_, Plan>("SELECT * FROM plans WHERE id = $1")
                .bind(plan_id)
                .fetch_one(&self.pool)
                .await?;

            if let Some(tier) = SubscriptionTier::from_plan_name(&plan.name) {
                sqlx::query(
                    "UPDATE users
                     SET subscription_tier = $1,
                         subscription_active = TRUE,
                         subscription_start_date = now(),
                         subscription_end_date = now() + interval '30 days'
                     WHERE id = $2",
                )
                .bind(tier)
                .bind(user_id)
                .execute(&self.pool)
                .await?;
                tracing::info!("User {} upgraded to {} tier", user_id, plan.name);
            } else {
                tracing::error!("Plan '{}' has no matching tier", plan.name);
            }
        } else if status_text.contains("failed") {
            sqlx::query(
                "UPDATE subscriptions SET status = 'failed', updated_at = now()
                 WHERE request_reference = $1",
            )
            .bind(reference)
            .execute(&self.pool)
            .await?;
            tracing::info!("Payment failed for reference {}", reference);
        } else {
            tracing::debug!(
                "Ignoring webhook status '{}' for reference {}",
                payload.payment_status,
                reference
            );
        }

        Ok(())
    }

    /// Latest subscription purchase for an account.
    pub async fn check(&self, user_id: Uuid) -> Result<SubscriptionStatusResponse, AppError> {
        let row: Option<(PaymentStatus, String, chrono::DateTime<chrono::Utc>)> = sqlx::query_as(
            "SELECT s.status, p.name, s.created_at
             FROM subscriptions s
             JOIN plans p ON p.id = s.plan_id
             WHERE s.user_id = $1
             ORDER BY s.created_at DESC
             LIMIT 1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some((status, plan, created_at)) = row else {
            return Err(AppError::NotFound("no_subscription".to_string()));
        };

        Ok(SubscriptionStatusResponse {
            status,
            plan,
            created_at,
        })
    }

    async fn plan_by_name(&self, name: &str) -> Result<Plan, AppError> {
        sqlx::query_as::<_, Plan>("SELECT * FROM plans WHERE name = $1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::BadRequest("Invalid plan".to_string()))
    }
}
