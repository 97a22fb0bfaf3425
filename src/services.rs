use crate::circuit_breaker::{create_delivery_circuit_breaker, DeliveryCircuitBreaker};
use crate::config::Config;
use crate::errors::AppError;
use crate::models::{Plan, User, VerificationFacet};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Client for the SMS/OTP delivery gateway (Twilio-style REST API).
///
/// Sends go through a circuit breaker so a failing gateway is not hammered;
/// a rejected call surfaces as `DeliveryFailure` just like a failed one.
#[derive(Clone)]
pub struct SmsClient {
    client: reqwest::Client,
    base_url: String,
    account_sid: String,
    auth_token: String,
    from_number: String,
    breaker: Arc<DeliveryCircuitBreaker>,
}

impl SmsClient {
    pub fn new(config: &Config) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| {
                AppError::ExternalApiError(format!("Failed to create SMS client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url: config.sms_base_url.clone(),
            account_sid: config.sms_account_sid.clone(),
            auth_token: config.sms_auth_token.clone(),
            from_number: config.sms_from_number.clone(),
            breaker: Arc::new(create_delivery_circuit_breaker()),
        })
    }

    /// Dispatches a verification code to `phone_number`.
    ///
    /// Returns the gateway's delivery id on success.
    pub async fn send_code(&self, phone_number: &str, code: &str) -> Result<String, AppError> {
        use failsafe::futures::CircuitBreaker;

        let url = format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.base_url, self.account_sid
        );
        let body = format!("Your Proven Pro verification code is: {}", code);
        tracing::info!("Dispatching verification code to {}", phone_number);

        let request = self
            .client
            .post(&url)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&[
                ("To", phone_number),
                ("From", self.from_number.as_str()),
                ("Body", body.as_str()),
            ]);

        let result = self
            .breaker
            .call(async move {
                let response = request.send().await.map_err(|e| {
                    AppError::DeliveryFailure(format!("SMS request failed: {}", e))
                })?;

                if !response.status().is_success() {
                    let status = response.status();
                    let error_text = response
                        .text()
                        .await
                        .unwrap_or_else(|_| "Unknown error".to_string());
                    return Err(AppError::DeliveryFailure(format!(
                        "SMS gateway returned {}: {}",
                        status, error_text
                    )));
                }

                let data: serde_json::Value = response.json().await.map_err(|e| {
                    AppError::DeliveryFailure(format!(
                        "Failed to parse SMS gateway response: {}",
                        e
                    ))
                })?;

                Ok(data
                    .get("sid")
                    .and_then(|s| s.as_str())
                    .unwrap_or_default()
                    .to_string())
            })
            .await;

        match result {
            Ok(sid) => {
                tracing::info!("✓ Verification code dispatched, sid={}", sid);
                Ok(sid)
            }
            Err(failsafe::Error::Inner(e)) => Err(e),
            Err(failsafe::Error::Rejected) => Err(AppError::DeliveryFailure(
                "SMS gateway circuit open".to_string(),
            )),
        }
    }
}

/// Client for the transactional mail gateway.
///
/// All mail is plain text; templating and delivery mechanics belong to the
/// gateway, not this service.
#[derive(Clone)]
pub struct MailerClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    from: String,
}

impl MailerClient {
    pub fn new(config: &Config) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| {
                AppError::ExternalApiError(format!("Failed to create mailer client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url: config.mailer_base_url.clone(),
            api_key: config.mailer_api_key.clone(),
            from: config.mail_from.clone(),
        })
    }

    /// Sends a single plain-text mail.
    pub async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), AppError> {
        let url = format!("{}/v1/messages", self.base_url);

        let payload = json!({
            "from": self.from,
            "to": to,
            "subject": subject,
            "text": body,
        });

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&payload)
            .send()
            .await
            .map_err(|e| AppError::ExternalApiError(format!("Mail request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::ExternalApiError(format!(
                "Mail gateway returned {}: {}",
                status, error_text
            )));
        }

        Ok(())
    }

    /// Notifies the account holder of an admin facet decision.
    ///
    /// Fire-and-forget: failure is logged, never propagated to the caller.
    pub async fn send_verification_result(
        &self,
        user: &User,
        facet: VerificationFacet,
        approved: bool,
        percentage: i32,
    ) {
        let status = if approved { "approved" } else { "rejected" };
        let subject = format!("Your {} verification {}", facet.display_name(), status);
        let body = format!(
            "Hello {},\n\n\
             Your {} has been {} by our verification team.\n\n\
             Your current verification status is {}%.\n\
             Thank you for using our service.\n\n\
             Best regards,\n\
             The Proven Pro Team",
            user.display_name(),
            facet.display_name(),
            status,
            percentage
        );

        if let Err(e) = self.send(&user.email, &subject, &body).await {
            tracing::error!("Failed to send verification email: {}", e);
        }
    }

    /// Invites `recipient` to review a shared profile.
    pub async fn send_share_invitation(
        &self,
        recipient: &str,
        owner_name: &str,
        verification_url: &str,
    ) -> Result<(), AppError> {
        let subject = format!("Profile Review Request from {}", owner_name);
        let body = format!(
            "Hello,\n\n\
             {} has invited you to review their profile.\n\n\
             Open the link below to view the profile and leave a review:\n\
             {}\n\n\
             This link expires automatically.\n\n\
             Best regards,\n\
             The Proven Pro Team",
            owner_name, verification_url
        );

        self.send(recipient, &subject, &body).await
    }

    /// Sends the yes/no registration confirmation mail.
    pub async fn send_registration_confirmation(
        &self,
        user: &User,
        yes_url: &str,
        no_url: &str,
    ) -> Result<(), AppError> {
        let subject = "Confirm Your Registration".to_string();
        let body = format!(
            "Hi {},\n\n\
             Please confirm your registration:\n\n\
             YES - {}\n\
             NO - {}\n",
            user.username, yes_url, no_url
        );

        self.send(&user.email, &subject, &body).await
    }

    /// Sends a password reset link.
    pub async fn send_password_reset(&self, email: &str, reset_link: &str) -> Result<(), AppError> {
        let subject = "Reset Your Password".to_string();
        let body = format!(
            "Password Reset Request\n\n\
             Hello,\n\n\
             You've requested to reset your password. Please visit this link to reset it:\n\
             {}\n\n\
             If you didn't request this, please ignore this email.\n\
             This link will expire soon for security reasons.\n\n\
             Best regards,\n\
             The Team",
            reset_link
        );

        self.send(email, &subject, &body).await
    }
}

/// Claims extracted from a validated Google ID token.
#[derive(Debug, Clone, Deserialize)]
pub struct GoogleClaims {
    pub email: String,
    pub sub: String,
    pub name: Option<String>,
}

/// Client validating Google ID tokens against the tokeninfo endpoint.
#[derive(Clone)]
pub struct GoogleAuthClient {
    client: reqwest::Client,
    tokeninfo_url: String,
}

impl GoogleAuthClient {
    pub fn new(config: &Config) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| {
                AppError::ExternalApiError(format!("Failed to create Google auth client: {}", e))
            })?;

        Ok(Self {
            client,
            tokeninfo_url: config.google_tokeninfo_url.clone(),
        })
    }

    /// Validates an ID token and returns its claims.
    pub async fn verify_id_token(&self, token: &str) -> Result<GoogleClaims, AppError> {
        // Build URL with proper parameter encoding
        let url = reqwest::Url::parse_with_params(&self.tokeninfo_url, &[("id_token", token)])
            .map_err(|e| AppError::ExternalApiError(format!("Failed to build URL: {}", e)))?;

        let response = self.client.get(url).send().await.map_err(|e| {
            AppError::ExternalApiError(format!("Google tokeninfo request failed: {}", e))
        })?;

        if !response.status().is_success() {
            tracing::warn!(
                "Google tokeninfo rejected token with status {}",
                response.status()
            );
            return Err(AppError::Unauthorized("Invalid Google token".to_string()));
        }

        let claims: GoogleClaims = response
            .json()
            .await
            .map_err(|_| AppError::Unauthorized("Invalid Google token".to_string()))?;

        if claims.email.is_empty() || claims.sub.is_empty() {
            return Err(AppError::Unauthorized(
                "Google token missing email or subject".to_string(),
            ));
        }

        Ok(claims)
    }
}

/// Client for the payment gateway's hosted checkout API.
///
/// The gateway owns the whole payment flow; this client only creates checkout
/// sessions and hands back the redirect URL.
#[derive(Clone)]
pub struct PaymentClient {
    client: reqwest::Client,
    base_url: String,
    public_key: String,
}

impl PaymentClient {
    pub fn new(config: &Config) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| {
                AppError::ExternalApiError(format!("Failed to create payment client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url: config.payment_base_url.clone(),
            public_key: config.payment_public_key.clone(),
        })
    }

    /// Creates a hosted checkout session and returns the redirect URL.
    pub async fn create_checkout(
        &self,
        reference: Uuid,
        plan: &Plan,
        user: &User,
        frontend_url: &str,
    ) -> Result<String, AppError> {
        let url = format!("{}/checkout/v1/checkouts", self.base_url);
        let price = plan.price.to_string();

        let payload = json!({
            "totalAmount": {
                "value": price,
                "currency": "PHP",
                "details": { "subtotal": price }
            },
            "buyer": {
                "firstName": user.first_name,
                "lastName": user.last_name,
                "contact": {
                    "phone": user.mobile,
                    "email": user.email,
                }
            },
            "redirectUrl": {
                "success": format!("{}/payment/success?ref={}", frontend_url, reference),
                "failure": format!("{}/payment/failure?ref={}", frontend_url, reference),
                "cancel": format!("{}/payment/cancel?ref={}", frontend_url, reference),
            },
            "requestReferenceNumber": reference,
        });

        tracing::info!(
            "Creating checkout for plan '{}', reference {}",
            plan.name,
            reference
        );

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Basic {}", self.public_key))
            .json(&payload)
            .send()
            .await
            .map_err(|e| AppError::ExternalApiError(format!("Checkout request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::ExternalApiError(format!(
                "Payment gateway returned {}: {}",
                status, error_text
            )));
        }

        let data: serde_json::Value = response.json().await.map_err(|e| {
            AppError::ExternalApiError(format!("Failed to parse checkout response: {}", e))
        })?;

        data.get("redirectUrl")
            .and_then(|u| u.as_str())
            .map(str::to_string)
            .ok_or_else(|| {
                AppError::ExternalApiError(
                    "Checkout response missing 'redirectUrl' field".to_string(),
                )
            })
    }
}
