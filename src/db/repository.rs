//! Database repository for CRUD operations.
//!
//! Uses prepared statements and transactions for data integrity.

use sqlx::{Row, SqlitePool};

use crate::errors::AppError;
use crate::matching::{EligibilityFilter, FEMALE_GENDER};
use crate::models::{
    now_timestamp, ApprovalStatus, Identity, Lead, LeadCounts, LeadFeedback, LeadStatus, NewLead,
    PlanTier, Professional, ProfessionalRole, RegistrationProfile, UpdateProfileRequest,
    SENTINEL_PROFESSIONAL_ID,
};

const PROFESSIONAL_COLUMNS: &str = "id, email, name, oab_number, specialty, status, subscription_active, plan, role, phone, gender, bio, created_at, updated_at";

const LEAD_COLUMNS: &str = "id, professional_id, client_name, client_email, client_phone, category, description, status, is_relevant, quality_rating, feedback_comment, submission_id, created_at, updated_at";

/// Stored credentials for an auth user.
#[derive(Debug, Clone)]
pub struct AuthUserRecord {
    pub id: String,
    pub email: String,
    pub password_hash: Vec<u8>,
    pub password_salt: Vec<u8>,
    pub password_iterations: u32,
    pub email_confirmed: bool,
}

/// Everything needed to register an account and its professional profile at once.
#[derive(Debug, Clone)]
pub struct NewAccount<'a> {
    pub user_id: String,
    pub email: String,
    pub password_hash: Vec<u8>,
    pub password_salt: Vec<u8>,
    pub password_iterations: u32,
    pub email_confirmed: bool,
    pub role: ProfessionalRole,
    pub status: ApprovalStatus,
    pub profile: &'a RegistrationProfile,
}

/// Purpose of a single-use auth token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenPurpose {
    EmailConfirmation,
    PasswordReset,
}

impl TokenPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenPurpose::EmailConfirmation => "email_confirmation",
            TokenPurpose::PasswordReset => "password_reset",
        }
    }
}

/// Database repository for all data operations.
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    // ==================== PROFESSIONAL OPERATIONS ====================

    /// List professionals for the admin console, newest first. The sentinel owner is hidden.
    pub async fn list_professionals(
        &self,
        status: Option<ApprovalStatus>,
    ) -> Result<Vec<Professional>, AppError> {
        let rows = match status {
            Some(status) => {
                sqlx::query(&format!(
                    "SELECT {PROFESSIONAL_COLUMNS} FROM professionals WHERE id <> ? AND status = ? ORDER BY created_at DESC"
                ))
                .bind(SENTINEL_PROFESSIONAL_ID)
                .bind(status.as_str())
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(&format!(
                    "SELECT {PROFESSIONAL_COLUMNS} FROM professionals WHERE id <> ? ORDER BY created_at DESC"
                ))
                .bind(SENTINEL_PROFESSIONAL_ID)
                .fetch_all(&self.pool)
                .await?
            }
        };

        Ok(rows.iter().map(professional_from_row).collect())
    }

    /// Professionals that may receive a new lead, newest registration first.
    pub async fn eligible_professionals(
        &self,
        filter: &EligibilityFilter,
    ) -> Result<Vec<Professional>, AppError> {
        let gender_clause = if filter.female_only {
            " AND gender = ?"
        } else {
            ""
        };
        let sql = format!(
            "SELECT {PROFESSIONAL_COLUMNS} FROM professionals \
             WHERE status = 'approved' AND subscription_active = 1 \
             AND lower(email) <> ? AND phone IS NOT NULL{gender_clause} \
             ORDER BY created_at DESC"
        );

        let mut query = sqlx::query(&sql).bind(filter.admin_email.to_lowercase());
        if filter.female_only {
            query = query.bind(FEMALE_GENDER);
        }
        let rows = query.fetch_all(&self.pool).await?;

        Ok(rows.iter().map(professional_from_row).collect())
    }

    /// Get a professional by ID, without specialty tags.
    pub async fn get_professional(&self, id: &str) -> Result<Option<Professional>, AppError> {
        let row = sqlx::query(&format!(
            "SELECT {PROFESSIONAL_COLUMNS} FROM professionals WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(professional_from_row))
    }

    /// Specialty tags for a professional, alphabetically.
    pub async fn professional_tags(&self, id: &str) -> Result<Vec<String>, AppError> {
        let rows = sqlx::query(
            "SELECT tag FROM professional_specialties WHERE professional_id = ? ORDER BY tag",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(|row| row.get("tag")).collect())
    }

    /// Update the fields a professional may edit on their own profile.
    pub async fn update_professional_profile(
        &self,
        id: &str,
        request: &UpdateProfileRequest,
    ) -> Result<Professional, AppError> {
        let existing = self
            .get_professional(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Professional {} not found", id)))?;

        let now = now_timestamp();
        let name = request.name.clone().unwrap_or(existing.name);
        let oab_number = request.oab_number.clone().unwrap_or(existing.oab_number);
        let specialty = request.specialty.clone().unwrap_or(existing.specialty);
        let phone = request.phone.clone().unwrap_or(existing.phone);
        let gender = request.gender.clone().unwrap_or(existing.gender);
        let bio = request.bio.clone().unwrap_or(existing.bio);

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "UPDATE professionals SET name = ?, oab_number = ?, specialty = ?, phone = ?, gender = ?, bio = ?, updated_at = ? WHERE id = ?",
        )
        .bind(&name)
        .bind(&oab_number)
        .bind(&specialty)
        .bind(&phone)
        .bind(&gender)
        .bind(&bio)
        .bind(&now)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        if let Some(tags) = &request.specialties {
            sqlx::query("DELETE FROM professional_specialties WHERE professional_id = ?")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            for tag in clean_tags(tags) {
                sqlx::query(
                    "INSERT OR IGNORE INTO professional_specialties (professional_id, tag) VALUES (?, ?)",
                )
                .bind(id)
                .bind(&tag)
                .execute(&mut *tx)
                .await?;
            }
        }

        tx.commit().await?;

        self.get_professional(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Professional {} not found", id)))
    }

    /// Select a plan. No payment happens; the subscription flag follows the plan.
    pub async fn set_professional_plan(
        &self,
        id: &str,
        plan: PlanTier,
    ) -> Result<Professional, AppError> {
        let result = sqlx::query(
            "UPDATE professionals SET plan = ?, subscription_active = ?, updated_at = ? WHERE id = ? AND id <> ?",
        )
        .bind(plan.as_str())
        .bind(plan.activates_subscription() as i32)
        .bind(now_timestamp())
        .bind(id)
        .bind(SENTINEL_PROFESSIONAL_ID)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Professional {} not found", id)));
        }

        self.get_professional(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Professional {} not found", id)))
    }

    /// Administrative approval decision.
    pub async fn set_professional_status(
        &self,
        id: &str,
        status: ApprovalStatus,
    ) -> Result<Professional, AppError> {
        let result = sqlx::query(
            "UPDATE professionals SET status = ?, updated_at = ? WHERE id = ? AND id <> ?",
        )
        .bind(status.as_str())
        .bind(now_timestamp())
        .bind(id)
        .bind(SENTINEL_PROFESSIONAL_ID)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Professional {} not found", id)));
        }

        self.get_professional(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Professional {} not found", id)))
    }

    // ==================== LEAD OPERATIONS ====================

    /// Insert a new lead with status pending.
    pub async fn insert_lead(&self, lead: &NewLead) -> Result<Lead, AppError> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = now_timestamp();

        sqlx::query(
            "INSERT INTO leads (id, professional_id, client_name, client_email, client_phone, category, description, status, submission_id, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, 'pending', ?, ?, ?)",
        )
        .bind(&id)
        .bind(&lead.professional_id)
        .bind(&lead.client_name)
        .bind(&lead.client_email)
        .bind(&lead.client_phone)
        .bind(&lead.category)
        .bind(&lead.description)
        .bind(&lead.submission_id)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(|err| match err {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                AppError::Conflict("Lead already submitted".to_string())
            }
            other => AppError::from(other),
        })?;

        Ok(Lead {
            id,
            professional_id: lead.professional_id.clone(),
            client_name: lead.client_name.clone(),
            client_email: lead.client_email.clone(),
            client_phone: lead.client_phone.clone(),
            category: lead.category.clone(),
            description: lead.description.clone(),
            status: LeadStatus::Pending,
            feedback: None,
            submission_id: lead.submission_id.clone(),
            created_at: now.clone(),
            updated_at: now,
        })
    }

    pub async fn get_lead(&self, id: &str) -> Result<Option<Lead>, AppError> {
        let row = sqlx::query(&format!("SELECT {LEAD_COLUMNS} FROM leads WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(lead_from_row))
    }

    pub async fn find_lead_by_submission(
        &self,
        submission_id: &str,
    ) -> Result<Option<Lead>, AppError> {
        let row = sqlx::query(&format!(
            "SELECT {LEAD_COLUMNS} FROM leads WHERE submission_id = ?"
        ))
        .bind(submission_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(lead_from_row))
    }

    /// A professional's inbox, newest first.
    pub async fn list_leads_for_professional(
        &self,
        professional_id: &str,
    ) -> Result<Vec<Lead>, AppError> {
        let rows = sqlx::query(&format!(
            "SELECT {LEAD_COLUMNS} FROM leads WHERE professional_id = ? ORDER BY created_at DESC"
        ))
        .bind(professional_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(lead_from_row).collect())
    }

    /// All leads, or only the unassigned queue, newest first.
    pub async fn list_leads(&self, unassigned_only: bool) -> Result<Vec<Lead>, AppError> {
        if unassigned_only {
            return self
                .list_leads_for_professional(SENTINEL_PROFESSIONAL_ID)
                .await;
        }

        let rows = sqlx::query(&format!(
            "SELECT {LEAD_COLUMNS} FROM leads ORDER BY created_at DESC"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(lead_from_row).collect())
    }

    pub async fn update_lead_status(&self, id: &str, status: LeadStatus) -> Result<Lead, AppError> {
        let result = sqlx::query("UPDATE leads SET status = ?, updated_at = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(now_timestamp())
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Lead {} not found", id)));
        }

        self.get_lead(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Lead {} not found", id)))
    }

    pub async fn set_lead_feedback(
        &self,
        id: &str,
        feedback: &LeadFeedback,
    ) -> Result<Lead, AppError> {
        let result = sqlx::query(
            "UPDATE leads SET is_relevant = ?, quality_rating = ?, feedback_comment = ?, updated_at = ? WHERE id = ?",
        )
        .bind(feedback.is_relevant as i32)
        .bind(feedback.quality_rating as i64)
        .bind(&feedback.comment)
        .bind(now_timestamp())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Lead {} not found", id)));
        }

        self.get_lead(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Lead {} not found", id)))
    }

    /// Move a lead to another owner. Status is left untouched.
    pub async fn assign_lead(&self, id: &str, professional_id: &str) -> Result<Lead, AppError> {
        let result =
            sqlx::query("UPDATE leads SET professional_id = ?, updated_at = ? WHERE id = ?")
                .bind(professional_id)
                .bind(now_timestamp())
                .bind(id)
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Lead {} not found", id)));
        }

        self.get_lead(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Lead {} not found", id)))
    }

    pub async fn lead_counts(&self, professional_id: &str) -> Result<LeadCounts, AppError> {
        let rows = sqlx::query(
            "SELECT status, COUNT(*) AS n FROM leads WHERE professional_id = ? GROUP BY status",
        )
        .bind(professional_id)
        .fetch_all(&self.pool)
        .await?;

        let mut counts = LeadCounts::default();
        for row in rows {
            let status: String = row.get("status");
            if let Some(status) = LeadStatus::from_str(&status) {
                counts.add(status, row.get("n"));
            }
        }
        Ok(counts)
    }

    // ==================== AUTH OPERATIONS ====================

    /// Create the auth user, its professional profile and tags in one transaction.
    pub async fn create_account(&self, account: &NewAccount<'_>) -> Result<Professional, AppError> {
        let now = now_timestamp();
        let confirmed_at = account.email_confirmed.then(|| now.clone());
        let profile = account.profile;

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO auth_users (id, email, password_hash, password_salt, password_iterations, email_confirmed_at, created_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&account.user_id)
        .bind(&account.email)
        .bind(&account.password_hash)
        .bind(&account.password_salt)
        .bind(account.password_iterations as i64)
        .bind(&confirmed_at)
        .bind(&now)
        .execute(&mut *tx)
        .await
        .map_err(|err| match err {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                AppError::Conflict("E-mail já cadastrado.".to_string())
            }
            other => AppError::from(other),
        })?;

        sqlx::query(
            "INSERT INTO professionals (id, email, name, oab_number, specialty, status, subscription_active, plan, role, phone, gender, bio, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, 0, 'none', ?, ?, ?, ?, ?, ?)",
        )
        .bind(&account.user_id)
        .bind(&account.email)
        .bind(&profile.name)
        .bind(&profile.oab_number)
        .bind(&profile.specialty)
        .bind(account.status.as_str())
        .bind(account.role.as_str())
        .bind(&profile.phone)
        .bind(&profile.gender)
        .bind(&profile.bio)
        .bind(&now)
        .bind(&now)
        .execute(&mut *tx)
        .await?;

        for tag in clean_tags(&profile.specialties) {
            sqlx::query(
                "INSERT OR IGNORE INTO professional_specialties (professional_id, tag) VALUES (?, ?)",
            )
            .bind(&account.user_id)
            .bind(&tag)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        self.get_professional(&account.user_id)
            .await?
            .ok_or_else(|| AppError::Internal("Account vanished after insert".to_string()))
    }

    pub async fn find_auth_user_by_email(
        &self,
        email: &str,
    ) -> Result<Option<AuthUserRecord>, AppError> {
        let row = sqlx::query(
            "SELECT id, email, password_hash, password_salt, password_iterations, email_confirmed_at FROM auth_users WHERE email = ?",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| {
            let confirmed_at: Option<String> = row.get("email_confirmed_at");
            let iterations: i64 = row.get("password_iterations");
            AuthUserRecord {
                id: row.get("id"),
                email: row.get("email"),
                password_hash: row.get("password_hash"),
                password_salt: row.get("password_salt"),
                password_iterations: iterations as u32,
                email_confirmed: confirmed_at.is_some(),
            }
        }))
    }

    pub async fn mark_email_confirmed(&self, user_id: &str) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE auth_users SET email_confirmed_at = COALESCE(email_confirmed_at, ?) WHERE id = ?",
        )
        .bind(now_timestamp())
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn update_password(
        &self,
        user_id: &str,
        password_hash: &[u8],
        password_salt: &[u8],
        password_iterations: u32,
    ) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE auth_users SET password_hash = ?, password_salt = ?, password_iterations = ? WHERE id = ?",
        )
        .bind(password_hash)
        .bind(password_salt)
        .bind(password_iterations as i64)
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn insert_session(
        &self,
        token_hash: &[u8],
        user_id: &str,
        expires_at: &str,
    ) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO auth_sessions (token_hash, user_id, expires_at, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(token_hash)
        .bind(user_id)
        .bind(expires_at)
        .bind(now_timestamp())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Look up a session by token hash, returning the identity and expiry.
    pub async fn find_session(
        &self,
        token_hash: &[u8],
    ) -> Result<Option<(Identity, String)>, AppError> {
        let row = sqlx::query(
            "SELECT s.user_id, s.expires_at, u.email FROM auth_sessions s JOIN auth_users u ON u.id = s.user_id WHERE s.token_hash = ?",
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| {
            (
                Identity {
                    user_id: row.get("user_id"),
                    email: row.get("email"),
                },
                row.get("expires_at"),
            )
        }))
    }

    /// Delete one session. Returns the owning user id if it existed.
    pub async fn delete_session(&self, token_hash: &[u8]) -> Result<Option<String>, AppError> {
        let row = sqlx::query("DELETE FROM auth_sessions WHERE token_hash = ? RETURNING user_id")
            .bind(token_hash)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|row| row.get("user_id")))
    }

    pub async fn delete_user_sessions(&self, user_id: &str) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM auth_sessions WHERE user_id = ?")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn insert_auth_token(
        &self,
        token_hash: &[u8],
        user_id: &str,
        purpose: TokenPurpose,
        expires_at: &str,
    ) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO auth_tokens (token_hash, user_id, purpose, expires_at) VALUES (?, ?, ?, ?)",
        )
        .bind(token_hash)
        .bind(user_id)
        .bind(purpose.as_str())
        .bind(expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Consume a single-use token. Returns the user id and expiry if it existed.
    pub async fn take_auth_token(
        &self,
        token_hash: &[u8],
        purpose: TokenPurpose,
    ) -> Result<Option<(String, String)>, AppError> {
        let row = sqlx::query(
            "DELETE FROM auth_tokens WHERE token_hash = ? AND purpose = ? RETURNING user_id, expires_at",
        )
        .bind(token_hash)
        .bind(purpose.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| (row.get("user_id"), row.get("expires_at"))))
    }
}

// Helper functions for row conversion

fn professional_from_row(row: &sqlx::sqlite::SqliteRow) -> Professional {
    let status: String = row.get("status");
    let plan: String = row.get("plan");
    let role: String = row.get("role");
    let subscription_active: i32 = row.get("subscription_active");
    Professional {
        id: row.get("id"),
        email: row.get("email"),
        name: row.get("name"),
        oab_number: row.get("oab_number"),
        specialty: row.get("specialty"),
        specialties: None,
        status: ApprovalStatus::from_str(&status).unwrap_or(ApprovalStatus::Pending),
        subscription_active: subscription_active != 0,
        plan: PlanTier::from_str(&plan).unwrap_or(PlanTier::None),
        role: ProfessionalRole::from_str(&role).unwrap_or_default(),
        phone: row.get("phone"),
        gender: row.get("gender"),
        bio: row.get("bio"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn lead_from_row(row: &sqlx::sqlite::SqliteRow) -> Lead {
    let status: String = row.get("status");
    let is_relevant: Option<i32> = row.get("is_relevant");
    let quality_rating: Option<i64> = row.get("quality_rating");
    let feedback = match (is_relevant, quality_rating) {
        (Some(relevant), Some(rating)) => Some(LeadFeedback {
            is_relevant: relevant != 0,
            quality_rating: rating.clamp(1, 5) as u8,
            comment: row.get("feedback_comment"),
        }),
        _ => None,
    };

    Lead {
        id: row.get("id"),
        professional_id: row.get("professional_id"),
        client_name: row.get("client_name"),
        client_email: row.get("client_email"),
        client_phone: row.get("client_phone"),
        category: row.get("category"),
        description: row.get("description"),
        status: LeadStatus::from_str(&status).unwrap_or(LeadStatus::Pending),
        feedback,
        submission_id: row.get("submission_id"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn clean_tags(tags: &[String]) -> Vec<String> {
    let mut cleaned: Vec<String> = tags
        .iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect();
    cleaned.sort();
    cleaned.dedup();
    cleaned
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_database;
    use tempfile::TempDir;

    async fn repo() -> (Repository, TempDir) {
        let dir = TempDir::new().unwrap();
        let pool = init_database(&dir.path().join("test.sqlite")).await.unwrap();
        (Repository::new(pool), dir)
    }

    fn profile(specialty: &str, phone: Option<&str>, gender: Option<&str>) -> RegistrationProfile {
        RegistrationProfile {
            name: "Dra. Teste".to_string(),
            oab_number: "SP123456".to_string(),
            specialty: specialty.to_string(),
            specialties: vec![" Família ".to_string(), "Civil".to_string(), "Civil".to_string()],
            phone: phone.map(str::to_string),
            gender: gender.map(str::to_string),
            bio: None,
        }
    }

    async fn account(
        repo: &Repository,
        email: &str,
        profile: &RegistrationProfile,
        status: ApprovalStatus,
    ) -> Professional {
        let created = repo
            .create_account(&NewAccount {
                user_id: uuid::Uuid::new_v4().to_string(),
                email: email.to_string(),
                password_hash: vec![1; 32],
                password_salt: vec![2; 16],
                password_iterations: 1,
                email_confirmed: true,
                role: ProfessionalRole::Professional,
                status,
                profile,
            })
            .await
            .unwrap();
        repo.set_professional_plan(&created.id, PlanTier::Basic)
            .await
            .unwrap()
    }

    fn filter(female_only: bool) -> EligibilityFilter {
        EligibilityFilter {
            admin_email: "admin@lexmatch.com.br".to_string(),
            female_only,
        }
    }

    #[tokio::test]
    async fn test_eligible_query_applies_every_condition() {
        let (repo, _dir) = repo().await;

        let ok = account(&repo, "ok@example.com", &profile("Civil", Some("11988887777"), Some("feminino")), ApprovalStatus::Approved).await;
        let male = account(&repo, "male@example.com", &profile("Civil", Some("11988887777"), Some("masculino")), ApprovalStatus::Approved).await;
        account(&repo, "nophone@example.com", &profile("Civil", None, Some("feminino")), ApprovalStatus::Approved).await;
        account(&repo, "pending@example.com", &profile("Civil", Some("11988887777"), Some("feminino")), ApprovalStatus::Pending).await;
        account(&repo, "admin@lexmatch.com.br", &profile("Civil", Some("11988887777"), Some("feminino")), ApprovalStatus::Approved).await;
        let lapsed = account(&repo, "lapsed@example.com", &profile("Civil", Some("11988887777"), Some("feminino")), ApprovalStatus::Approved).await;
        repo.set_professional_plan(&lapsed.id, PlanTier::None).await.unwrap();

        let any: Vec<String> = repo
            .eligible_professionals(&filter(false))
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.id)
            .collect();
        // Newest first
        assert_eq!(any, vec![male.id.clone(), ok.id.clone()]);

        let female = repo.eligible_professionals(&filter(true)).await.unwrap();
        assert_eq!(female.len(), 1);
        assert_eq!(female[0].id, ok.id);
    }

    #[tokio::test]
    async fn test_tags_are_trimmed_and_deduplicated() {
        let (repo, _dir) = repo().await;
        let p = account(&repo, "tags@example.com", &profile("Civil", Some("1199"), None), ApprovalStatus::Pending).await;

        let tags = repo.professional_tags(&p.id).await.unwrap();
        assert_eq!(tags, vec!["Civil".to_string(), "Família".to_string()]);

        let updated = repo
            .update_professional_profile(
                &p.id,
                &UpdateProfileRequest {
                    bio: Some(Some("Atuo há 10 anos".to_string())),
                    specialties: Some(vec!["Trabalhista".to_string()]),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.bio.as_deref(), Some("Atuo há 10 anos"));
        assert_eq!(updated.specialty, "Civil");
        assert_eq!(
            repo.professional_tags(&p.id).await.unwrap(),
            vec!["Trabalhista".to_string()]
        );
    }

    #[tokio::test]
    async fn test_profile_fields_can_be_cleared() {
        let (repo, _dir) = repo().await;
        let p = account(
            &repo,
            "clear@example.com",
            &profile("Civil", Some("11987654321"), Some("feminino")),
            ApprovalStatus::Approved,
        )
        .await;
        let eligible = repo.eligible_professionals(&filter(false)).await.unwrap();
        assert!(eligible.iter().any(|e| e.id == p.id));

        let request: UpdateProfileRequest =
            serde_json::from_str(r#"{"phone": null, "bio": "Nova bio"}"#).unwrap();
        assert_eq!(request.phone, Some(None));
        assert_eq!(request.gender, None);

        let updated = repo.update_professional_profile(&p.id, &request).await.unwrap();
        assert!(updated.phone.is_none());
        assert_eq!(updated.gender.as_deref(), Some("feminino"));
        assert_eq!(updated.bio.as_deref(), Some("Nova bio"));

        // Without a phone the professional drops out of matching
        let eligible = repo.eligible_professionals(&filter(false)).await.unwrap();
        assert!(eligible.iter().all(|e| e.id != p.id));
    }

    #[tokio::test]
    async fn test_duplicate_email_is_conflict() {
        let (repo, _dir) = repo().await;
        let prof = profile("Civil", None, None);
        account(&repo, "dup@example.com", &prof, ApprovalStatus::Pending).await;

        let err = repo
            .create_account(&NewAccount {
                user_id: uuid::Uuid::new_v4().to_string(),
                email: "dup@example.com".to_string(),
                password_hash: vec![0; 32],
                password_salt: vec![0; 16],
                password_iterations: 1,
                email_confirmed: false,
                role: ProfessionalRole::Professional,
                status: ApprovalStatus::Pending,
                profile: &prof,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_sentinel_is_seeded_and_hidden() {
        let (repo, _dir) = repo().await;

        let sentinel = repo.get_professional(SENTINEL_PROFESSIONAL_ID).await.unwrap();
        assert!(sentinel.is_some());
        assert!(repo.list_professionals(None).await.unwrap().is_empty());
        assert!(matches!(
            repo.set_professional_status(SENTINEL_PROFESSIONAL_ID, ApprovalStatus::Approved)
                .await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_lead_lifecycle_and_counts() {
        let (repo, _dir) = repo().await;
        let lead = repo
            .insert_lead(&NewLead {
                professional_id: SENTINEL_PROFESSIONAL_ID.to_string(),
                client_name: "Ana".to_string(),
                client_email: None,
                client_phone: "11999999999".to_string(),
                category: "familia".to_string(),
                description: "Olá".to_string(),
                submission_id: Some("sub-1".to_string()),
            })
            .await
            .unwrap();
        assert_eq!(lead.status, LeadStatus::Pending);
        assert!(lead.is_unassigned());

        let found = repo.find_lead_by_submission("sub-1").await.unwrap().unwrap();
        assert_eq!(found.id, lead.id);
        assert!(found.client_email.is_none());

        let contacted = repo
            .update_lead_status(&lead.id, LeadStatus::Contacted)
            .await
            .unwrap();
        assert_eq!(contacted.status, LeadStatus::Contacted);

        let with_feedback = repo
            .set_lead_feedback(
                &lead.id,
                &LeadFeedback {
                    is_relevant: true,
                    quality_rating: 4,
                    comment: Some("Cliente sério".to_string()),
                },
            )
            .await
            .unwrap();
        assert_eq!(with_feedback.feedback.unwrap().quality_rating, 4);

        let counts = repo.lead_counts(SENTINEL_PROFESSIONAL_ID).await.unwrap();
        assert_eq!(counts.total, 1);
        assert_eq!(counts.contacted, 1);

        assert_eq!(repo.list_leads(true).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_submission_id_is_conflict() {
        let (repo, _dir) = repo().await;
        let new_lead = NewLead {
            professional_id: SENTINEL_PROFESSIONAL_ID.to_string(),
            client_name: "Ana".to_string(),
            client_email: None,
            client_phone: "11999999999".to_string(),
            category: "civil".to_string(),
            description: "Olá".to_string(),
            submission_id: Some("same".to_string()),
        };
        repo.insert_lead(&new_lead).await.unwrap();
        let err = repo.insert_lead(&new_lead).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }
}
