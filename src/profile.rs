//! Tiered profile storage: flat profile fields plus the five child
//! collections, with subscription-tier gating on what may be edited.
//!
//! Collections use replace-on-update semantics: sending a collection replaces
//! the user's existing rows wholesale, mirroring how the profile editor
//! submits complete sections.

use sqlx::PgPool;
use uuid::Uuid;

use crate::config::ProfileFieldConfig;
use crate::errors::AppError;
use crate::models::{
    Certification, CertificationInput, Experience, ExperienceInput, Portfolio, PortfolioInput,
    ProfileResponse, ProfileSummary, ProfileUpdateRequest, PublicProfileView, SearchParams,
    ServiceCategory, ServiceCategoryInput, SocialLink, SocialLinkInput, SubscriptionTier, User,
};

const SOCIAL_PLATFORMS: &[&str] = &[
    "linkedin",
    "facebook",
    "twitter",
    "instagram",
    "github",
    "other",
];

/// Returns the request fields the user's tier is not allowed to edit.
pub fn tier_violations(
    tier: SubscriptionTier,
    req: &ProfileUpdateRequest,
    fields: &ProfileFieldConfig,
) -> Vec<String> {
    let allowed = fields.allowed(tier);
    let permits = |name: &str| allowed.iter().any(|f| f == name);
    let mut violations = Vec::new();
    let mut check = |set: bool, request_field: &str, list_name: &str| {
        if set && !permits(list_name) {
            violations.push(request_field.to_string());
        }
    };

    check(req.first_name.is_some(), "first_name", "first_name");
    check(req.last_name.is_some(), "last_name", "last_name");
    check(req.bio.is_some(), "bio", "bio");
    check(req.profile_mail.is_some(), "profile_mail", "profile_mail");
    check(req.mobile.is_some(), "mobile", "mobile");
    check(req.primary_tools.is_some(), "primary_tools", "primary_tools");
    check(
        req.technical_skills.is_some(),
        "technical_skills",
        "technical_skills",
    );
    check(req.soft_skills.is_some(), "soft_skills", "soft_skills");
    check(
        req.skills_description.is_some(),
        "skills_description",
        "skills_description",
    );
    check(
        req.video_description.is_some(),
        "video_description",
        "video_description",
    );
    // The video itself is gated with its description
    check(
        req.video_intro_url.is_some(),
        "video_intro_url",
        "video_description",
    );

    check(req.experiences.is_some(), "experiences", "company_name");
    check(
        req.service_categories.is_some(),
        "service_categories",
        "services_categories",
    );
    check(
        req.certifications.is_some(),
        "certifications",
        "certifications_name",
    );
    check(req.portfolios.is_some(), "portfolios", "project_title");

    violations
}

/// Per-field completion flags used by the profile-status endpoint.
pub fn completion_fields(user: &User) -> Vec<(&'static str, bool)> {
    vec![
        ("first_name", user.first_name.as_deref().is_some_and(|v| !v.is_empty())),
        ("last_name", user.last_name.as_deref().is_some_and(|v| !v.is_empty())),
        ("bio", user.bio.as_deref().is_some_and(|v| !v.is_empty())),
        ("profile_picture", user.profile_pic_url.is_some()),
        ("skills", user.technical_skills.as_deref().is_some_and(|v| !v.is_empty())),
    ]
}

/// Suggested next steps for an incomplete profile.
pub fn next_steps(fields: &[(&'static str, bool)]) -> Vec<&'static str> {
    let missing = |name: &str| fields.iter().any(|(f, set)| *f == name && !set);
    let mut steps = Vec::new();

    if missing("first_name") || missing("last_name") {
        steps.push("Add your full name");
    }
    if missing("bio") {
        steps.push("Write a professional bio");
    }
    if missing("profile_picture") {
        steps.push("Upload a profile picture");
    }
    if missing("skills") {
        steps.push("Add your skills");
    }

    steps
}

/// Storage layer for profile data. Uses sequential queries rather than
/// multi-statement CTEs for sqlx compatibility.
pub struct ProfileStorage {
    pool: PgPool,
}

impl ProfileStorage {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn experiences(&self, user_id: Uuid) -> Result<Vec<Experience>, AppError> {
        let rows = sqlx::query_as::<_, Experience>(
            "SELECT * FROM experiences WHERE user_id = $1 ORDER BY experience_start_date DESC NULLS LAST",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn certifications(&self, user_id: Uuid) -> Result<Vec<Certification>, AppError> {
        let rows = sqlx::query_as::<_, Certification>(
            "SELECT * FROM certifications WHERE user_id = $1 ORDER BY certifications_issued_date DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn service_categories(&self, user_id: Uuid) -> Result<Vec<ServiceCategory>, AppError> {
        let rows = sqlx::query_as::<_, ServiceCategory>(
            "SELECT * FROM service_categories WHERE user_id = $1 ORDER BY services_categories",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn portfolios(&self, user_id: Uuid) -> Result<Vec<Portfolio>, AppError> {
        let rows = sqlx::query_as::<_, Portfolio>(
            "SELECT * FROM portfolios WHERE user_id = $1 ORDER BY project_title",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn social_links(&self, user_id: Uuid) -> Result<Vec<SocialLink>, AppError> {
        let rows = sqlx::query_as::<_, SocialLink>(
            "SELECT * FROM social_links WHERE user_id = $1 ORDER BY platform",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Full profile payload: the user row plus all collections.
    pub async fn load_profile(&self, user: &User) -> Result<ProfileResponse, AppError> {
        Ok(ProfileResponse {
            user: user.clone(),
            experiences: self.experiences(user.id).await?,
            certifications: self.certifications(user.id).await?,
            service_categories: self.service_categories(user.id).await?,
            portfolios: self.portfolios(user.id).await?,
            social_links: self.social_links(user.id).await?,
        })
    }

    /// Applies a partial profile update after tier gating.
    pub async fn update_profile(
        &self,
        user: &User,
        req: ProfileUpdateRequest,
        fields: &ProfileFieldConfig,
    ) -> Result<ProfileResponse, AppError> {
        let violations = tier_violations(user.subscription_tier, &req, fields);
        if !violations.is_empty() {
            return Err(AppError::BadRequest(format!(
                "Fields require a higher subscription tier: {}",
                violations.join(", ")
            )));
        }

        if let Some(mail) = &req.profile_mail {
            if !crate::shares::is_valid_email(mail) {
                return Err(AppError::BadRequest(
                    "profile_mail must be a valid email address".to_string(),
                ));
            }
        }

        sqlx::query(
            "UPDATE users SET
                 first_name = COALESCE($1, first_name),
                 last_name = COALESCE($2, last_name),
                 bio = COALESCE($3, bio),
                 profile_mail = COALESCE($4, profile_mail),
                 profile_pic_url = COALESCE($5, profile_pic_url),
                 mobile = COALESCE($6, mobile),
                 primary_tools = COALESCE($7, primary_tools),
                 technical_skills = COALESCE($8, technical_skills),
                 soft_skills = COALESCE($9, soft_skills),
                 skills_description = COALESCE($10, skills_description),
                 video_intro_url = COALESCE($11, video_intro_url),
                 video_description = COALESCE($12, video_description),
                 updated_at = now()
             WHERE id = $13",
        )
        .bind(&req.first_name)
        .bind(&req.last_name)
        .bind(&req.bio)
        .bind(&req.profile_mail)
        .bind(&req.profile_pic_url)
        .bind(&req.mobile)
        .bind(&req.primary_tools)
        .bind(&req.technical_skills)
        .bind(&req.soft_skills)
        .bind(&req.skills_description)
        .bind(&req.video_intro_url)
        .bind(&req.video_description)
        .bind(user.id)
        .execute(&self.pool)
        .await?;

        if let Some(items) = &req.experiences {
            self.replace_experiences(user.id, items).await?;
        }
        if let Some(items) = &req.certifications {
            self.replace_certifications(user.id, items).await?;
        }
        if let Some(items) = &req.service_categories {
            self.replace_service_categories(user.id, items).await?;
        }
        if let Some(items) = &req.portfolios {
            self.replace_portfolios(user.id, items).await?;
        }
        if let Some(items) = &req.social_links {
            self.replace_social_links(user.id, items).await?;
        }

        let updated = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(user.id)
            .fetch_one(&self.pool)
            .await?;

        self.load_profile(&updated).await
    }

    async fn replace_experiences(
        &self,
        user_id: Uuid,
        items: &[ExperienceInput],
    ) -> Result<(), AppError> {
        sqlx::query("DELETE FROM experiences WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        for item in items {
            sqlx::query(
                "INSERT INTO experiences
                     (user_id, company_name, position, key_responsibilities,
                      experience_start_date, experience_end_date)
                 VALUES ($1, $2, $3, $4, $5, $6)",
            )
            .bind(user_id)
            .bind(&item.company_name)
            .bind(&item.position)
            .bind(&item.key_responsibilities)
            .bind(item.experience_start_date)
            .bind(item.experience_end_date)
            .execute(&self.pool)
            .await?;
        }
        Ok(())
    }

    async fn replace_certifications(
        &self,
        user_id: Uuid,
        items: &[CertificationInput],
    ) -> Result<(), AppError> {
        sqlx::query("DELETE FROM certifications WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        for item in items {
            sqlx::query(
                "INSERT INTO certifications
                     (user_id, certifications_name, certifications_issuer,
                      certifications_issued_date, certifications_expiration_date,
                      certifications_id, certifications_image_url)
                 VALUES ($1, $2, $3, $4, $5, $6, $7)",
            )
            .bind(user_id)
            .bind(&item.certifications_name)
            .bind(&item.certifications_issuer)
            .bind(item.certifications_issued_date)
            .bind(item.certifications_expiration_date)
            .bind(&item.certifications_id)
            .bind(&item.certifications_image_url)
            .execute(&self.pool)
            .await?;
        }
        Ok(())
    }

    async fn replace_service_categories(
        &self,
        user_id: Uuid,
        items: &[ServiceCategoryInput],
    ) -> Result<(), AppError> {
        sqlx::query("DELETE FROM service_categories WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        for item in items {
            sqlx::query(
                "INSERT INTO service_categories
                     (user_id, services_categories, services_description, rate_range, availability)
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(user_id)
            .bind(&item.services_categories)
            .bind(&item.services_description)
            .bind(&item.rate_range)
            .bind(&item.availability)
            .execute(&self.pool)
            .await?;
        }
        Ok(())
    }

    async fn replace_portfolios(
        &self,
        user_id: Uuid,
        items: &[PortfolioInput],
    ) -> Result<(), AppError> {
        sqlx::query("DELETE FROM portfolios WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        for item in items {
            sqlx::query(
                "INSERT INTO portfolios
                     (user_id, project_title, project_description, project_url, project_image_url)
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(user_id)
            .bind(&item.project_title)
            .bind(&item.project_description)
            .bind(&item.project_url)
            .bind(&item.project_image_url)
            .execute(&self.pool)
            .await?;
        }
        Ok(())
    }

    async fn replace_social_links(
        &self,
        user_id: Uuid,
        items: &[SocialLinkInput],
    ) -> Result<(), AppError> {
        for item in items {
            if !SOCIAL_PLATFORMS.contains(&item.platform.as_str()) {
                return Err(AppError::BadRequest(format!(
                    "Unknown social platform: {}",
                    item.platform
                )));
            }
        }

        sqlx::query("DELETE FROM social_links WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        for item in items {
            sqlx::query("INSERT INTO social_links (user_id, platform, url) VALUES ($1, $2, $3)")
                .bind(user_id)
                .bind(&item.platform)
                .bind(&item.url)
                .execute(&self.pool)
                .await?;
        }
        Ok(())
    }

    /// Read-only public projection served to share-token holders.
    ///
    /// Private fields (credentials, verification internals, billing state)
    /// never appear here.
    pub async fn public_view(&self, user: &User) -> Result<PublicProfileView, AppError> {
        Ok(PublicProfileView {
            id: user.id,
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            profile_pic_url: user.profile_pic_url.clone(),
            rating: user.rating,
            subscription_tier: user.subscription_tier,
            email: user.email.clone(),
            mobile: user.mobile.clone(),
            bio: user.bio.clone(),
            primary_tools: user.primary_tools.clone(),
            technical_skills: user.technical_skills.clone(),
            soft_skills: user.soft_skills.clone(),
            skills_description: user.skills_description.clone(),
            video_intro_url: user.video_intro_url.clone(),
            video_description: user.video_description.clone(),
            experiences: self.experiences(user.id).await?,
            certifications: self.certifications(user.id).await?,
            service_categories: self.service_categories(user.id).await?,
            portfolios: self.portfolios(user.id).await?,
        })
    }

    /// Substring search over names, bio and skills with optional sorting.
    pub async fn search(&self, params: &SearchParams) -> Result<Vec<ProfileSummary>, AppError> {
        let pattern = params.q.as_ref().map(|q| format!("%{}%", q));

        let order = match params.sort_by.as_deref() {
            Some("rating") => "rating DESC",
            Some("first_name") => "first_name ASC NULLS LAST",
            _ => "created_at DESC",
        };

        let sql = format!(
            "SELECT id, first_name, last_name, bio, rating, subscription_tier,
                    profile_url, profile_pic_url, technical_skills
             FROM users
             WHERE $1::text IS NULL
                OR first_name ILIKE $1
                OR last_name ILIKE $1
                OR bio ILIKE $1
                OR technical_skills ILIKE $1
             ORDER BY {}
             LIMIT 50",
            order
        );

        let rows = sqlx::query_as::<_, ProfileSummary>(&sql)
            .bind(pattern)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows)
    }
}
