use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

use crate::config::Config;
use crate::errors::AppError;
use crate::handlers::AppState;
use crate::models::{
    AuthResponse, AuthUserSummary, GoogleAuthRequest, LoginRequest, PasswordResetConfirmRequest,
    PasswordResetRequest, RegisterConfirmParams, RegisterRequest, TokenPair, User,
};
use crate::services::{GoogleAuthClient, MailerClient};
use crate::shares::is_valid_email;

const ACCESS_TOKEN_TTL_HOURS: i64 = 1;
const REFRESH_TOKEN_TTL_DAYS: i64 = 14;
const RESET_TOKEN_TTL_HOURS: i64 = 1;

/// Intended use of a JWT, encoded in its `use` claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenUse {
    Access,
    Refresh,
}

impl TokenUse {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Access => "access",
            Self::Refresh => "refresh",
        }
    }
}

/// JWT claims carried by both access and refresh tokens.
///
/// The `jti` of the access token doubles as the OTP session key, so a fresh
/// login starts a fresh verification session.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub jti: Uuid,
    pub exp: i64,
    #[serde(rename = "use")]
    pub token_use: String,
}

/// Issues an access/refresh token pair for a user.
pub fn issue_token_pair(jwt_secret: &str, user_id: Uuid) -> Result<TokenPair, AppError> {
    let access = issue_token(jwt_secret, user_id, TokenUse::Access)?;
    let refresh = issue_token(jwt_secret, user_id, TokenUse::Refresh)?;
    Ok(TokenPair { access, refresh })
}

fn issue_token(jwt_secret: &str, user_id: Uuid, token_use: TokenUse) -> Result<String, AppError> {
    let ttl = match token_use {
        TokenUse::Access => Duration::hours(ACCESS_TOKEN_TTL_HOURS),
        TokenUse::Refresh => Duration::days(REFRESH_TOKEN_TTL_DAYS),
    };

    let claims = Claims {
        sub: user_id,
        jti: Uuid::new_v4(),
        exp: (Utc::now() + ttl).timestamp(),
        token_use: token_use.as_str().to_string(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(jwt_secret.as_bytes()),
    )
    .map_err(|e| AppError::InternalError(format!("Failed to sign token: {}", e)))
}

/// Decodes and validates a token, checking its `use` claim.
pub fn decode_token(
    jwt_secret: &str,
    token: &str,
    expected: TokenUse,
) -> Result<Claims, AppError> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(jwt_secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| AppError::Unauthorized("Invalid or expired token".to_string()))?;

    if data.claims.token_use != expected.as_str() {
        return Err(AppError::Unauthorized(format!(
            "Expected {} token",
            expected.as_str()
        )));
    }

    Ok(data.claims)
}

pub fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| AppError::InternalError(format!("Password hashing failed: {}", e)))
}

pub fn verify_password(hash: &str, password: &str) -> bool {
    PasswordHash::new(hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

/// Password policy: at least 8 characters, one letter, one number, one special.
pub fn validate_password_strength(password: &str) -> Result<(), AppError> {
    if password.len() < 8 {
        return Err(AppError::BadRequest(
            "Password must be at least 8 characters long.".to_string(),
        ));
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err(AppError::BadRequest(
            "Password must contain at least one number.".to_string(),
        ));
    }
    if !password.chars().any(|c| c.is_ascii_alphabetic()) {
        return Err(AppError::BadRequest(
            "Password must contain at least one letter.".to_string(),
        ));
    }
    if !password.chars().any(|c| "!@#$%^&*(),.?\":{}|<>".contains(c)) {
        return Err(AppError::BadRequest(
            "Password must contain at least one special character.".to_string(),
        ));
    }
    Ok(())
}

/// Short public slug for profile URLs (first 8 chars of a v4 UUID).
pub fn generate_profile_slug() -> String {
    Uuid::new_v4().to_string()[..8].to_string()
}

/// Generates a password reset token; the raw value goes into the mail link,
/// only its hash is stored.
pub fn generate_reset_token() -> String {
    let raw: [u8; 32] = rand::thread_rng().gen();
    hex::encode(raw)
}

pub fn hash_reset_token(raw: &str) -> String {
    hex::encode(Sha256::digest(raw.as_bytes()))
}

/// Constant-time string comparison (basic implementation)
/// For production, consider using a crypto library like `subtle`
fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    a.as_bytes()
        .iter()
        .zip(b.as_bytes().iter())
        .fold(0u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}

fn bearer_token(headers: &HeaderMap) -> Result<&str, AppError> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| {
            AppError::Unauthorized("Missing or malformed Authorization header".to_string())
        })
}

/// Extractor for authenticated requests.
///
/// Validates the bearer access token and loads the account. The token's `jti`
/// is exposed as the per-session key used by the OTP challenge store.
pub struct AuthUser {
    pub user: User,
    pub session_key: String,
}

#[axum::async_trait]
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)?;
        let claims = decode_token(&state.config.jwt_secret, token, TokenUse::Access)?;

        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(claims.sub)
            .fetch_optional(&state.db)
            .await?
            .ok_or_else(|| AppError::Unauthorized("Account no longer exists".to_string()))?;

        Ok(AuthUser {
            user,
            session_key: claims.jti.to_string(),
        })
    }
}

/// Extractor gating admin-only endpoints on the X-Admin-Key header.
pub struct AdminKey;

#[axum::async_trait]
impl FromRequestParts<Arc<AppState>> for AdminKey {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let key = parts
            .headers
            .get("X-Admin-Key")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::Unauthorized("Missing X-Admin-Key header".to_string()))?;

        if !constant_time_compare(key, &state.config.admin_api_key) {
            tracing::warn!("Invalid admin key received");
            return Err(AppError::Unauthorized("Invalid admin key".to_string()));
        }

        Ok(AdminKey)
    }
}

/// Account registration, login and credential recovery flows.
pub struct AuthService {
    pool: PgPool,
    config: Config,
    mailer: MailerClient,
    google: GoogleAuthClient,
}

impl AuthService {
    pub fn new(state: &AppState) -> Self {
        Self {
            pool: state.db.clone(),
            config: state.config.clone(),
            mailer: state.mailer.clone(),
            google: state.google.clone(),
        }
    }

    /// Creates an unverified account and sends the yes/no confirmation mail.
    pub async fn register(&self, req: RegisterRequest) -> Result<serde_json::Value, AppError> {
        if req.username.trim().is_empty() {
            return Err(AppError::BadRequest("Username is required".to_string()));
        }
        if !is_valid_email(&req.email) {
            return Err(AppError::BadRequest(
                "A valid email address is required".to_string(),
            ));
        }
        validate_password_strength(&req.password)?;

        let password_hash = hash_password(&req.password)?;
        let profile_url = generate_profile_slug();

        let user = sqlx::query_as::<_, User>(
            "INSERT INTO users (username, email, password_hash, profile_url)
             VALUES ($1, $2, $3, $4)
             RETURNING *",
        )
        .bind(req.username.trim())
        .bind(req.email.to_lowercase())
        .bind(&password_hash)
        .bind(&profile_url)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                AppError::BadRequest("Username or email already registered".to_string())
            }
            _ => AppError::DatabaseError(e),
        })?;

        let yes_url = format!(
            "{}/confirm-registration?email={}&verify=yes",
            self.config.frontend_url, user.email
        );
        let no_url = format!(
            "{}/confirm-registration?email={}&verify=no",
            self.config.frontend_url, user.email
        );

        // Registration stands even when the mail gateway is down; the user can
        // request a fresh confirmation later.
        if let Err(e) = self
            .mailer
            .send_registration_confirmation(&user, &yes_url, &no_url)
            .await
        {
            tracing::error!("Failed to send registration confirmation: {}", e);
        }

        Ok(serde_json::json!({
            "message": "Verification email sent. Please confirm."
        }))
    }

    /// Applies the yes/no choice from the confirmation mail.
    pub async fn confirm_registration(
        &self,
        params: RegisterConfirmParams,
    ) -> Result<serde_json::Value, AppError> {
        match params.verify.as_str() {
            "yes" => {
                let result = sqlx::query("UPDATE users SET is_verified = TRUE WHERE email = $1")
                    .bind(params.email.to_lowercase())
                    .execute(&self.pool)
                    .await?;
                if result.rows_affected() == 0 {
                    return Err(AppError::NotFound("User not found.".to_string()));
                }
                Ok(serde_json::json!({ "message": "Registration successful!" }))
            }
            "no" => {
                let result = sqlx::query("DELETE FROM users WHERE email = $1 AND NOT is_verified")
                    .bind(params.email.to_lowercase())
                    .execute(&self.pool)
                    .await?;
                if result.rows_affected() == 0 {
                    return Err(AppError::NotFound("User not found.".to_string()));
                }
                Ok(serde_json::json!({ "message": "Registration cancelled." }))
            }
            _ => Err(AppError::BadRequest("Invalid choice.".to_string())),
        }
    }

    pub async fn login(&self, req: LoginRequest) -> Result<AuthResponse, AppError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
            .bind(req.email.to_lowercase())
            .fetch_optional(&self.pool)
            .await?;

        let Some(user) = user else {
            return Err(AppError::Unauthorized("Invalid credentials".to_string()));
        };

        if !verify_password(&user.password_hash, &req.password) {
            return Err(AppError::Unauthorized("Invalid credentials".to_string()));
        }

        if !user.is_verified && !user.is_google_user {
            return Err(AppError::Unauthorized(
                "Account not verified. Please confirm registration from your email.".to_string(),
            ));
        }

        let tokens = issue_token_pair(&self.config.jwt_secret, user.id)?;
        Ok(auth_response("Login successful!", tokens, &user))
    }

    /// Sign-in with a Google ID token, creating the account on first use.
    pub async fn google_sign_in(&self, req: GoogleAuthRequest) -> Result<AuthResponse, AppError> {
        let claims = self.google.verify_id_token(&req.token).await?;
        let email = claims.email.to_lowercase();

        let existing = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
            .bind(&email)
            .fetch_optional(&self.pool)
            .await?;

        let user = match existing {
            Some(user) => {
                if user.google_id.is_none() {
                    tracing::info!("Linking existing account {} to Google", user.id);
                    sqlx::query(
                        "UPDATE users SET google_id = $1, is_google_user = TRUE WHERE id = $2",
                    )
                    .bind(&claims.sub)
                    .bind(user.id)
                    .execute(&self.pool)
                    .await?;
                }
                user
            }
            None => self.create_google_user(&claims.sub, &email, claims.name.as_deref()).await?,
        };

        let tokens = issue_token_pair(&self.config.jwt_secret, user.id)?;
        Ok(auth_response("Login successful!", tokens, &user))
    }

    async fn create_google_user(
        &self,
        google_id: &str,
        email: &str,
        name: Option<&str>,
    ) -> Result<User, AppError> {
        let (first_name, last_name) = match name {
            Some(full) => match full.split_once(' ') {
                Some((first, last)) => (Some(first.to_string()), Some(last.to_string())),
                None => (Some(full.to_string()), None),
            },
            None => (None, None),
        };

        let base_username = format!("google_{}", &google_id[..10.min(google_id.len())]);
        let mut username = base_username.clone();
        let mut suffix = 1;
        loop {
            let taken: (bool,) =
                sqlx::query_as("SELECT EXISTS(SELECT 1 FROM users WHERE username = $1)")
                    .bind(&username)
                    .fetch_one(&self.pool)
                    .await?;
            if !taken.0 {
                break;
            }
            username = format!("{}_{}", base_username, suffix);
            suffix += 1;
        }

        // Google accounts never log in with this password; it only fills the column
        let password_hash = hash_password(&Uuid::new_v4().to_string())?;

        let user = sqlx::query_as::<_, User>(
            "INSERT INTO users
                 (username, email, password_hash, profile_url, google_id, is_google_user,
                  is_verified, first_name, last_name)
             VALUES ($1, $2, $3, $4, $5, TRUE, TRUE, $6, $7)
             RETURNING *",
        )
        .bind(&username)
        .bind(email)
        .bind(&password_hash)
        .bind(generate_profile_slug())
        .bind(google_id)
        .bind(first_name)
        .bind(last_name)
        .fetch_one(&self.pool)
        .await?;

        tracing::info!("Created new Google user {}", user.id);
        Ok(user)
    }

    /// Revokes a refresh token.
    pub async fn logout(&self, refresh: &str) -> Result<serde_json::Value, AppError> {
        let claims = decode_token(&self.config.jwt_secret, refresh, TokenUse::Refresh)?;

        sqlx::query("INSERT INTO revoked_tokens (jti) VALUES ($1) ON CONFLICT DO NOTHING")
            .bind(claims.jti)
            .execute(&self.pool)
            .await?;

        Ok(serde_json::json!({ "detail": "Logout successful." }))
    }

    /// Exchanges a live refresh token for a fresh access token.
    pub async fn refresh(&self, refresh: &str) -> Result<TokenPair, AppError> {
        let claims = decode_token(&self.config.jwt_secret, refresh, TokenUse::Refresh)?;

        let revoked: (bool,) =
            sqlx::query_as("SELECT EXISTS(SELECT 1 FROM revoked_tokens WHERE jti = $1)")
                .bind(claims.jti)
                .fetch_one(&self.pool)
                .await?;
        if revoked.0 {
            return Err(AppError::Unauthorized("Token revoked".to_string()));
        }

        let access = issue_token(&self.config.jwt_secret, claims.sub, TokenUse::Access)?;
        Ok(TokenPair {
            access,
            refresh: refresh.to_string(),
        })
    }

    /// Issues a reset token and mails the reset link.
    pub async fn request_password_reset(
        &self,
        req: PasswordResetRequest,
    ) -> Result<serde_json::Value, AppError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
            .bind(req.email.to_lowercase())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found.".to_string()))?;

        let raw_token = generate_reset_token();
        let token_hash = hash_reset_token(&raw_token);

        sqlx::query(
            "UPDATE users SET reset_token_hash = $1, reset_token_created_at = now() WHERE id = $2",
        )
        .bind(&token_hash)
        .bind(user.id)
        .execute(&self.pool)
        .await?;

        let reset_link = format!(
            "{}/ResetPassword?token={}",
            self.config.frontend_url, raw_token
        );

        self.mailer
            .send_password_reset(&user.email, &reset_link)
            .await?;

        Ok(serde_json::json!({
            "message": "Password reset link sent to your email.",
            "success": true
        }))
    }

    /// Applies a reset token and sets the new password.
    pub async fn confirm_password_reset(
        &self,
        req: PasswordResetConfirmRequest,
    ) -> Result<serde_json::Value, AppError> {
        validate_password_strength(&req.new_password)?;

        let token_hash = hash_reset_token(&req.token);
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE reset_token_hash = $1")
            .bind(&token_hash)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::BadRequest("Invalid or expired token.".to_string()))?;

        let fresh = user
            .reset_token_created_at
            .map(|at| Utc::now() - at <= Duration::hours(RESET_TOKEN_TTL_HOURS))
            .unwrap_or(false);
        if !fresh {
            return Err(AppError::BadRequest("Invalid or expired token.".to_string()));
        }

        let password_hash = hash_password(&req.new_password)?;
        sqlx::query(
            "UPDATE users
             SET password_hash = $1, reset_token_hash = NULL, reset_token_created_at = NULL
             WHERE id = $2",
        )
        .bind(&password_hash)
        .bind(user.id)
        .execute(&self.pool)
        .await?;

        Ok(serde_json::json!({ "message": "Password reset successful." }))
    }
}

fn auth_response(message: &str, tokens: TokenPair, user: &User) -> AuthResponse {
    AuthResponse {
        message: message.to_string(),
        access: tokens.access,
        refresh: tokens.refresh,
        user: AuthUserSummary {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
        },
    }
}
