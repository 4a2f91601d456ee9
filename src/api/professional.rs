//! Professional area endpoints. Every route here sits behind a route guard.

use axum::{
    extract::{Path, State},
    Extension, Json,
};
use serde::Serialize;

use super::{success, ApiResult};
use crate::db::Repository;
use crate::errors::AppError;
use crate::guard::CurrentSession;
use crate::models::{
    Lead, LeadCounts, LeadFeedback, LeadStatus, Professional, SelectPlanRequest,
    UpdateLeadStatusRequest, UpdateProfileRequest,
};
use crate::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub profile: Professional,
    pub lead_counts: LeadCounts,
}

/// Lead owned by `user_id`. Leads of other owners look missing.
async fn owned_lead(repo: &Repository, id: &str, user_id: &str) -> Result<Lead, AppError> {
    match repo.get_lead(id).await? {
        Some(lead) if lead.professional_id == user_id => Ok(lead),
        _ => Err(AppError::NotFound(format!("Lead {} not found", id))),
    }
}

/// GET /api/professional/dashboard
pub async fn dashboard(
    State(state): State<AppState>,
    Extension(session): Extension<CurrentSession>,
) -> ApiResult<Dashboard> {
    let profile = session.profile()?.clone();
    let lead_counts = state.repo.lead_counts(&profile.id).await?;

    success(Dashboard {
        profile,
        lead_counts,
    })
}

/// GET /api/professional/leads - The caller's inbox, newest first.
pub async fn list_my_leads(
    State(state): State<AppState>,
    Extension(session): Extension<CurrentSession>,
) -> ApiResult<Vec<Lead>> {
    let identity = session.identity()?;
    success(state.repo.list_leads_for_professional(&identity.user_id).await?)
}

/// PUT /api/professional/leads/:id/status
pub async fn update_my_lead_status(
    State(state): State<AppState>,
    Extension(session): Extension<CurrentSession>,
    Path(id): Path<String>,
    Json(request): Json<UpdateLeadStatusRequest>,
) -> ApiResult<Lead> {
    let identity = session.identity()?;
    let lead = owned_lead(&state.repo, &id, &identity.user_id).await?;

    if !lead.status.owner_can_move_to(request.status) {
        return Err(AppError::Validation(format!(
            "Não é possível alterar o status de {} para {}.",
            lead.status.as_str(),
            request.status.as_str()
        )));
    }

    let updated = state.repo.update_lead_status(&id, request.status).await?;
    tracing::info!(lead_id = %id, status = request.status.as_str(), "Lead status updated");
    success(updated)
}

/// PUT /api/professional/leads/:id/feedback
pub async fn submit_lead_feedback(
    State(state): State<AppState>,
    Extension(session): Extension<CurrentSession>,
    Path(id): Path<String>,
    Json(feedback): Json<LeadFeedback>,
) -> ApiResult<Lead> {
    let identity = session.identity()?;
    let lead = owned_lead(&state.repo, &id, &identity.user_id).await?;

    if lead.status == LeadStatus::Pending {
        return Err(AppError::Validation(
            "Atualize o status do lead antes de avaliá-lo.".to_string(),
        ));
    }
    if !(1..=5).contains(&feedback.quality_rating) {
        return Err(AppError::Validation(
            "A nota deve estar entre 1 e 5.".to_string(),
        ));
    }

    success(state.repo.set_lead_feedback(&id, &feedback).await?)
}

/// GET /api/professional/profile
pub async fn get_my_profile(
    Extension(session): Extension<CurrentSession>,
) -> ApiResult<Professional> {
    success(session.profile()?.clone())
}

/// PUT /api/professional/profile
pub async fn update_my_profile(
    State(state): State<AppState>,
    Extension(session): Extension<CurrentSession>,
    Json(request): Json<UpdateProfileRequest>,
) -> ApiResult<Professional> {
    let identity = session.identity()?;
    if request.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
        return Err(AppError::Validation("Informe o nome.".to_string()));
    }

    let updated = state
        .repo
        .update_professional_profile(&identity.user_id, &request)
        .await?;

    let refreshed = session.manager.refresh_profile().await;
    success(refreshed.profile().cloned().unwrap_or(updated))
}

/// PUT /api/professional/plan - Select a plan. No payment is taken.
pub async fn select_plan(
    State(state): State<AppState>,
    Extension(session): Extension<CurrentSession>,
    Json(request): Json<SelectPlanRequest>,
) -> ApiResult<Professional> {
    let identity = session.identity()?;
    let updated = state
        .repo
        .set_professional_plan(&identity.user_id, request.plan)
        .await?;
    tracing::info!(
        professional_id = %identity.user_id,
        plan = request.plan.as_str(),
        "Plan selected"
    );

    let refreshed = session.manager.refresh_profile().await;
    success(refreshed.profile().cloned().unwrap_or(updated))
}
