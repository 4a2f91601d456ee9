//! Public questionnaire and lead submission endpoints.

use axum::{extract::State, Json};
use serde::Serialize;

use super::{success, ApiResponse, ApiResult};
use crate::intake::SubmissionOutcome;
use crate::models::{GenderPreference, ProblemKind, Situation, SubmitLeadRequest, Urgency};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct ProblemOption {
    pub value: ProblemKind,
    pub category: &'static str,
}

/// Allowed answer values for every questionnaire step.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionnaireCatalog {
    pub problems: Vec<ProblemOption>,
    pub situations: Vec<Situation>,
    pub urgencies: Vec<Urgency>,
    pub gender_preferences: Vec<GenderPreference>,
}

/// GET /api/questionnaire - Answer options.
pub async fn questionnaire_catalog() -> ApiResult<QuestionnaireCatalog> {
    success(QuestionnaireCatalog {
        problems: ProblemKind::ALL
            .iter()
            .map(|p| ProblemOption {
                value: *p,
                category: p.category(),
            })
            .collect(),
        situations: Situation::ALL.to_vec(),
        urgencies: Urgency::ALL.to_vec(),
        gender_preferences: vec![GenderPreference::Feminino, GenderPreference::Indiferente],
    })
}

/// POST /api/leads - Submit the questionnaire and create a lead.
pub async fn submit_lead(
    State(state): State<AppState>,
    Json(request): Json<SubmitLeadRequest>,
) -> ApiResult<SubmissionOutcome> {
    let outcome = state
        .intake
        .submit_lead(
            &request.submission_id.to_string(),
            &request.contact,
            &request.answers,
        )
        .await?;

    Ok(ApiResponse::created(outcome))
}
