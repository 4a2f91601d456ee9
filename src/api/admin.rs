//! Admin area endpoints.

use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};

use super::{success, ApiResult};
use crate::errors::AppError;
use crate::guard::CurrentSession;
use crate::models::{
    ApprovalStatus, AssignLeadRequest, Lead, LeadListQuery, Professional, ProfessionalListQuery,
    ProfessionalRole, SetApprovalRequest, UpdateLeadStatusRequest, SENTINEL_PROFESSIONAL_ID,
};
use crate::AppState;

/// GET /api/admin/professionals?status=
pub async fn list_professionals(
    State(state): State<AppState>,
    Query(query): Query<ProfessionalListQuery>,
) -> ApiResult<Vec<Professional>> {
    success(state.repo.list_professionals(query.status).await?)
}

/// PUT /api/admin/professionals/:id/status - Approve or reject a registration.
pub async fn set_professional_status(
    State(state): State<AppState>,
    Extension(session): Extension<CurrentSession>,
    Path(id): Path<String>,
    Json(request): Json<SetApprovalRequest>,
) -> ApiResult<Professional> {
    let admin = session.identity()?;
    let professional = state
        .repo
        .set_professional_status(&id, request.status)
        .await?;

    tracing::info!(
        admin_id = %admin.user_id,
        professional_id = %id,
        status = request.status.as_str(),
        "Professional status changed"
    );
    success(professional)
}

/// GET /api/admin/leads?unassigned=
pub async fn list_all_leads(
    State(state): State<AppState>,
    Query(query): Query<LeadListQuery>,
) -> ApiResult<Vec<Lead>> {
    success(state.repo.list_leads(query.unassigned).await?)
}

/// PUT /api/admin/leads/:id/status - Any status may be set.
pub async fn set_lead_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<UpdateLeadStatusRequest>,
) -> ApiResult<Lead> {
    success(state.repo.update_lead_status(&id, request.status).await?)
}

/// PUT /api/admin/leads/:id/assign - Hand a lead to another professional.
pub async fn assign_lead(
    State(state): State<AppState>,
    Extension(session): Extension<CurrentSession>,
    Path(id): Path<String>,
    Json(request): Json<AssignLeadRequest>,
) -> ApiResult<Lead> {
    let admin = session.identity()?;
    let target = state
        .repo
        .get_professional(&request.professional_id)
        .await?
        .ok_or_else(|| {
            AppError::NotFound(format!(
                "Professional {} not found",
                request.professional_id
            ))
        })?;

    // The sentinel takes the lead back to the unassigned queue
    if target.id != SENTINEL_PROFESSIONAL_ID {
        if is_admin_row(&target, &state.config.admin_email) {
            return Err(AppError::Validation(
                "Leads não podem ser atribuídos ao administrador.".to_string(),
            ));
        }
        if target.status != ApprovalStatus::Approved {
            return Err(AppError::Validation(
                "Leads só podem ser atribuídos a profissionais aprovados.".to_string(),
            ));
        }
    }

    let lead = state.repo.assign_lead(&id, &request.professional_id).await?;
    tracing::info!(
        admin_id = %admin.user_id,
        lead_id = %id,
        professional_id = %request.professional_id,
        "Lead reassigned"
    );
    success(lead)
}

/// The administrator's own row never appears in a professional inbox.
fn is_admin_row(professional: &Professional, admin_email: &str) -> bool {
    professional.role == ProfessionalRole::Admin
        || professional.email.eq_ignore_ascii_case(admin_email)
}
