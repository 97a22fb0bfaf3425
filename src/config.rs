use serde::Deserialize;

use crate::models::SubscriptionTier;

/// Field lists controlling which profile fields each subscription tier may edit.
///
/// Loaded once at startup (built-in defaults, or a JSON file via
/// PROFILE_FIELDS_PATH) and passed explicitly to the profile layer.
#[derive(Debug, Clone, Deserialize)]
pub struct ProfileFieldConfig {
    pub free: Vec<String>,
    pub standard: Vec<String>,
    pub premium: Vec<String>,
}

impl ProfileFieldConfig {
    pub fn defaults() -> Self {
        const BASE: &[&str] = &["first_name", "last_name", "bio", "profile_mail"];
        const STANDARD_EXTRA: &[&str] = &[
            "mobile",
            "services_categories",
            "services_description",
            "rate_range",
            "availability",
            "company_name",
            "position",
            "key_responsibilities",
            "experience_start_date",
            "experience_end_date",
            "primary_tools",
            "technical_skills",
            "soft_skills",
            "skills_description",
        ];
        const PREMIUM_EXTRA: &[&str] = &[
            "project_title",
            "project_description",
            "project_url",
            "certifications_name",
            "certifications_issuer",
            "certifications_issued_date",
            "certifications_expiration_date",
            "certifications_id",
            "video_description",
        ];

        let standard: Vec<&str> = [BASE, STANDARD_EXTRA].concat();
        let premium: Vec<&str> = [standard.as_slice(), PREMIUM_EXTRA].concat();

        Self {
            free: BASE.iter().map(|f| f.to_string()).collect(),
            standard: standard.iter().map(|f| f.to_string()).collect(),
            premium: premium.iter().map(|f| f.to_string()).collect(),
        }
    }

    /// Fields the given tier is allowed to edit.
    pub fn allowed(&self, tier: SubscriptionTier) -> &[String] {
        match tier {
            SubscriptionTier::Free => &self.free,
            SubscriptionTier::Standard => &self.standard,
            SubscriptionTier::Premium => &self.premium,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub frontend_url: String,
    pub jwt_secret: String,
    pub admin_api_key: String,
    pub mailer_base_url: String,
    pub mailer_api_key: String,
    pub mail_from: String,
    pub sms_base_url: String,
    pub sms_account_sid: String,
    pub sms_auth_token: String,
    pub sms_from_number: String,
    pub payment_base_url: String,
    pub payment_public_key: String,
    pub google_tokeninfo_url: String,
    pub share_ttl_days: i64,
    pub share_single_use: bool,
    pub profile_fields: ProfileFieldConfig,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            database_url: std::env::var("DB_URL")
                .or_else(|_| std::env::var("DATABASE_URL"))
                .map_err(|_| {
                    anyhow::anyhow!("DB_URL or DATABASE_URL environment variable required")
                })
                .and_then(|url| {
                    if url.trim().is_empty() {
                        anyhow::bail!("DB_URL cannot be empty");
                    }
                    if !url.starts_with("postgresql://") && !url.starts_with("postgres://") {
                        anyhow::bail!("DB_URL must start with postgresql:// or postgres://");
                    }
                    Ok(url)
                })?,
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number between 1-65535"))?,
            frontend_url: std::env::var("FRONTEND_URL")
                .map_err(|_| anyhow::anyhow!("FRONTEND_URL environment variable required"))
                .and_then(|url| {
                    if url.trim().is_empty() {
                        anyhow::bail!("FRONTEND_URL cannot be empty");
                    }
                    if !url.starts_with("http://") && !url.starts_with("https://") {
                        anyhow::bail!("FRONTEND_URL must start with http:// or https://");
                    }
                    Ok(url.trim_end_matches('/').to_string())
                })?,
            jwt_secret: std::env::var("JWT_SECRET")
                .map_err(|_| anyhow::anyhow!("JWT_SECRET environment variable required"))
                .and_then(|secret| {
                    if secret.trim().len() < 32 {
                        anyhow::bail!("JWT_SECRET must be at least 32 characters");
                    }
                    Ok(secret)
                })?,
            admin_api_key: std::env::var("ADMIN_API_KEY")
                .map_err(|_| anyhow::anyhow!("ADMIN_API_KEY environment variable required"))
                .and_then(|key| {
                    if key.trim().is_empty() {
                        anyhow::bail!("ADMIN_API_KEY cannot be empty");
                    }
                    Ok(key)
                })?,
            mailer_base_url: std::env::var("MAILER_BASE_URL")
                .map_err(|_| anyhow::anyhow!("MAILER_BASE_URL environment variable required"))
                .and_then(|url| {
                    if !url.starts_with("http://") && !url.starts_with("https://") {
                        anyhow::bail!("MAILER_BASE_URL must start with http:// or https://");
                    }
                    Ok(url)
                })?,
            mailer_api_key: std::env::var("MAILER_API_KEY")
                .map_err(|_| anyhow::anyhow!("MAILER_API_KEY environment variable required"))?,
            mail_from: std::env::var("MAIL_FROM")
                .unwrap_or_else(|_| "no-reply@provenpro.example".to_string()),
            sms_base_url: std::env::var("SMS_BASE_URL")
                .unwrap_or_else(|_| "https://api.twilio.com".to_string()),
            sms_account_sid: std::env::var("SMS_ACCOUNT_SID")
                .map_err(|_| anyhow::anyhow!("SMS_ACCOUNT_SID environment variable required"))?,
            sms_auth_token: std::env::var("SMS_AUTH_TOKEN")
                .map_err(|_| anyhow::anyhow!("SMS_AUTH_TOKEN environment variable required"))?,
            sms_from_number: std::env::var("SMS_FROM_NUMBER")
                .map_err(|_| anyhow::anyhow!("SMS_FROM_NUMBER environment variable required"))?,
            payment_base_url: std::env::var("PAYMENT_BASE_URL")
                .map_err(|_| anyhow::anyhow!("PAYMENT_BASE_URL environment variable required"))
                .and_then(|url| {
                    if !url.starts_with("http://") && !url.starts_with("https://") {
                        anyhow::bail!("PAYMENT_BASE_URL must start with http:// or https://");
                    }
                    Ok(url)
                })?,
            payment_public_key: std::env::var("PAYMENT_PUBLIC_KEY")
                .map_err(|_| anyhow::anyhow!("PAYMENT_PUBLIC_KEY environment variable required"))?,
            google_tokeninfo_url: std::env::var("GOOGLE_TOKENINFO_URL")
                .unwrap_or_else(|_| "https://oauth2.googleapis.com/tokeninfo".to_string()),
            share_ttl_days: std::env::var("SHARE_TTL_DAYS")
                .unwrap_or_else(|_| "7".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("SHARE_TTL_DAYS must be a positive number"))?,
            share_single_use: std::env::var("SHARE_SINGLE_USE")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
            profile_fields: load_profile_fields()?,
        };

        if config.share_ttl_days <= 0 {
            anyhow::bail!("SHARE_TTL_DAYS must be a positive number");
        }

        // Log successful configuration load (without sensitive values)
        tracing::info!("Configuration loaded successfully");
        tracing::debug!(
            "Database URL: {}...",
            &config.database_url[..20.min(config.database_url.len())]
        );
        tracing::debug!("Frontend URL: {}", config.frontend_url);
        tracing::debug!("Mailer base URL: {}", config.mailer_base_url);
        tracing::debug!("SMS base URL: {}", config.sms_base_url);
        tracing::debug!("Server Port: {}", config.port);
        tracing::info!(
            "Share tokens: {} day TTL, single_use={}",
            config.share_ttl_days,
            config.share_single_use
        );

        Ok(config)
    }
}

/// Load tier field lists from PROFILE_FIELDS_PATH if set, otherwise built-in defaults.
fn load_profile_fields() -> anyhow::Result<ProfileFieldConfig> {
    match std::env::var("PROFILE_FIELDS_PATH") {
        Ok(path) if !path.trim().is_empty() => {
            let raw = std::fs::read_to_string(&path)
                .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", path, e))?;
            let fields: ProfileFieldConfig = serde_json::from_str(&raw)
                .map_err(|e| anyhow::anyhow!("Invalid profile field config {}: {}", path, e))?;
            tracing::info!("Profile field lists loaded from {}", path);
            Ok(fields)
        }
        _ => Ok(ProfileFieldConfig::defaults()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_field_lists_are_nested() {
        let fields = ProfileFieldConfig::defaults();
        for field in &fields.free {
            assert!(fields.standard.contains(field));
            assert!(fields.premium.contains(field));
        }
        for field in &fields.standard {
            assert!(fields.premium.contains(field));
        }
        assert!(fields.premium.contains(&"project_title".to_string()));
        assert!(!fields.standard.contains(&"project_title".to_string()));
    }

    #[test]
    fn allowed_matches_tier() {
        let fields = ProfileFieldConfig::defaults();
        assert_eq!(fields.allowed(SubscriptionTier::Free).len(), fields.free.len());
        assert_eq!(
            fields.allowed(SubscriptionTier::Premium).len(),
            fields.premium.len()
        );
    }
}
