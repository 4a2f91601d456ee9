//! Narrow store interface used by matching, intake and session resolution.

use async_trait::async_trait;

use super::Repository;
use crate::errors::AppError;
use crate::matching::EligibilityFilter;
use crate::models::{Lead, NewLead, Professional};

/// Table-level operations the core logic needs, so it can be exercised
/// against in-memory fakes as well as SQLite.
#[async_trait]
pub trait MarketplaceStore: Send + Sync {
    /// Professionals passing `filter`, newest registration first.
    async fn eligible_professionals(
        &self,
        filter: &EligibilityFilter,
    ) -> Result<Vec<Professional>, AppError>;

    async fn get_professional(&self, id: &str) -> Result<Option<Professional>, AppError>;

    async fn professional_tags(&self, id: &str) -> Result<Vec<String>, AppError>;

    async fn insert_lead(&self, lead: &NewLead) -> Result<Lead, AppError>;

    async fn find_lead_by_submission(&self, submission_id: &str)
        -> Result<Option<Lead>, AppError>;
}

#[async_trait]
impl MarketplaceStore for Repository {
    async fn eligible_professionals(
        &self,
        filter: &EligibilityFilter,
    ) -> Result<Vec<Professional>, AppError> {
        Repository::eligible_professionals(self, filter).await
    }

    async fn get_professional(&self, id: &str) -> Result<Option<Professional>, AppError> {
        Repository::get_professional(self, id).await
    }

    async fn professional_tags(&self, id: &str) -> Result<Vec<String>, AppError> {
        Repository::professional_tags(self, id).await
    }

    async fn insert_lead(&self, lead: &NewLead) -> Result<Lead, AppError> {
        Repository::insert_lead(self, lead).await
    }

    async fn find_lead_by_submission(
        &self,
        submission_id: &str,
    ) -> Result<Option<Lead>, AppError> {
        Repository::find_lead_by_submission(self, submission_id).await
    }
}
