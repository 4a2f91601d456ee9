//! Shared fixtures for unit tests: profile builders and in-memory stores.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::db::MarketplaceStore;
use crate::errors::AppError;
use crate::matching::EligibilityFilter;
use crate::models::{
    now_timestamp, ApprovalStatus, Lead, LeadStatus, NewLead, PlanTier, Professional,
    ProfessionalRole,
};

/// An eligible professional with the given id and specialty.
pub fn professional(id: &str, specialty: &str) -> Professional {
    Professional {
        id: id.to_string(),
        email: format!("{id}@example.com"),
        name: format!("Dr(a). {id}"),
        oab_number: "SP000001".to_string(),
        specialty: specialty.to_string(),
        specialties: None,
        status: ApprovalStatus::Approved,
        subscription_active: true,
        plan: PlanTier::Basic,
        role: ProfessionalRole::Professional,
        phone: Some("11912345678".to_string()),
        gender: None,
        bio: None,
        created_at: now_timestamp(),
        updated_at: now_timestamp(),
    }
}

/// In-memory store with switchable failures and an optional write delay.
#[derive(Default)]
pub struct MemoryStore {
    pub professionals: Mutex<Vec<Professional>>,
    pub tags: Mutex<HashMap<String, Vec<String>>>,
    pub leads: Mutex<Vec<Lead>>,
    pub fail_eligibility: bool,
    pub fail_insert: bool,
    pub insert_delay: Option<Duration>,
    pub profile_delay: Option<Duration>,
}

impl MemoryStore {
    pub fn with_professionals(professionals: Vec<Professional>) -> Self {
        Self {
            professionals: Mutex::new(professionals),
            ..Default::default()
        }
    }

    pub fn lead_count(&self) -> usize {
        self.leads.lock().unwrap().len()
    }
}

#[async_trait]
impl MarketplaceStore for MemoryStore {
    async fn eligible_professionals(
        &self,
        filter: &EligibilityFilter,
    ) -> Result<Vec<Professional>, AppError> {
        if self.fail_eligibility {
            return Err(AppError::Database("connection refused".to_string()));
        }
        let mut eligible: Vec<Professional> = self
            .professionals
            .lock()
            .unwrap()
            .iter()
            .filter(|p| filter.admits(p))
            .cloned()
            .collect();
        eligible.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(eligible)
    }

    async fn get_professional(&self, id: &str) -> Result<Option<Professional>, AppError> {
        if let Some(delay) = self.profile_delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self
            .professionals
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.id == id)
            .cloned())
    }

    async fn professional_tags(&self, id: &str) -> Result<Vec<String>, AppError> {
        Ok(self.tags.lock().unwrap().get(id).cloned().unwrap_or_default())
    }

    async fn insert_lead(&self, lead: &NewLead) -> Result<Lead, AppError> {
        if let Some(delay) = self.insert_delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_insert {
            return Err(AppError::Database("disk full".to_string()));
        }
        let now = now_timestamp();
        let stored = Lead {
            id: uuid::Uuid::new_v4().to_string(),
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
        };
        self.leads.lock().unwrap().push(stored.clone());
        Ok(stored)
    }

    async fn find_lead_by_submission(
        &self,
        submission_id: &str,
    ) -> Result<Option<Lead>, AppError> {
        Ok(self
            .leads
            .lock()
            .unwrap()
            .iter()
            .find(|l| l.submission_id.as_deref() == Some(submission_id))
            .cloned())
    }
}

/// Store whose every call fails.
pub struct FailingStore;

#[async_trait]
impl MarketplaceStore for FailingStore {
    async fn eligible_professionals(
        &self,
        _filter: &EligibilityFilter,
    ) -> Result<Vec<Professional>, AppError> {
        Err(AppError::Database("connection refused".to_string()))
    }

    async fn get_professional(&self, _id: &str) -> Result<Option<Professional>, AppError> {
        Err(AppError::Database("connection refused".to_string()))
    }

    async fn professional_tags(&self, _id: &str) -> Result<Vec<String>, AppError> {
        Err(AppError::Database("connection refused".to_string()))
    }

    async fn insert_lead(&self, _lead: &NewLead) -> Result<Lead, AppError> {
        Err(AppError::Database("connection refused".to_string()))
    }

    async fn find_lead_by_submission(
        &self,
        _submission_id: &str,
    ) -> Result<Option<Lead>, AppError> {
        Err(AppError::Database("connection refused".to_string()))
    }
}
