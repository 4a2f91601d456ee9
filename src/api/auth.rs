//! Auth API endpoints.

use axum::{extract::State, http::HeaderMap, Json};
use serde::Serialize;
use serde_json::{json, Value};

use super::{success, ApiResponse, ApiResult};
use crate::auth::bearer_token;
use crate::guard::resolve_session;
use crate::models::{
    IssuedSession, ResetPasswordRequest, SignInRequest, SignUpRequest, SignUpResponse,
    TokenRequest, UpdatePasswordRequest,
};
use crate::session::{SessionManager, SessionState};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct SignInResponse {
    pub session: IssuedSession,
    pub state: SessionState,
}

/// POST /api/auth/sign-up - Register a professional account.
pub async fn sign_up(
    State(state): State<AppState>,
    Json(request): Json<SignUpRequest>,
) -> ApiResult<SignUpResponse> {
    let outcome = state
        .auth
        .sign_up(&request.email, &request.password, &request.profile)
        .await?;

    // No mailer is wired in; the token goes to the log for delivery
    if let Some(token) = &outcome.confirmation_token {
        tracing::info!(
            user_id = %outcome.professional.id,
            token = %token,
            "Confirmation token ready for delivery"
        );
    }

    Ok(ApiResponse::created(SignUpResponse {
        user_id: outcome.professional.id,
        confirmation_required: outcome.confirmation_token.is_some(),
    }))
}

/// POST /api/auth/sign-in - Password sign-in.
pub async fn sign_in(
    State(state): State<AppState>,
    Json(request): Json<SignInRequest>,
) -> ApiResult<SignInResponse> {
    let manager = SessionManager::new(state.auth.clone(), state.repo.clone());
    let mut handle = manager.handle();

    let session = manager.sign_in(&request.email, &request.password).await?;
    let resolved = handle.settled(state.config.guard_settle).await;

    success(SignInResponse {
        session,
        state: resolved,
    })
}

/// POST /api/auth/sign-out - Revoke the caller's session.
pub async fn sign_out(State(state): State<AppState>, headers: HeaderMap) -> ApiResult<Value> {
    let manager = SessionManager::new(state.auth.clone(), state.repo.clone());
    manager.restore(bearer_token(&headers).as_deref()).await;
    manager.sign_out().await?;

    success(json!({ "signedOut": true }))
}

/// GET /api/auth/session - The caller's resolved session.
pub async fn get_session(State(state): State<AppState>, headers: HeaderMap) -> ApiResult<SessionState> {
    let session = resolve_session(&state, &headers).await;
    success(session.state)
}

/// POST /api/auth/confirm - Confirm an email address.
pub async fn confirm_email(
    State(state): State<AppState>,
    Json(request): Json<TokenRequest>,
) -> ApiResult<Value> {
    state.auth.confirm_email(&request.token).await?;
    success(json!({ "confirmed": true }))
}

/// POST /api/auth/reset-password - Start password recovery.
///
/// Always reports success so the endpoint cannot be used to probe accounts.
pub async fn reset_password(
    State(state): State<AppState>,
    Json(request): Json<ResetPasswordRequest>,
) -> ApiResult<Value> {
    if let Some(token) = state.auth.reset_password_for_email(&request.email).await? {
        tracing::info!(token = %token, "Password reset token ready for delivery");
    }
    success(json!({ "sent": true }))
}

/// POST /api/auth/update-password - Finish password recovery.
pub async fn update_password(
    State(state): State<AppState>,
    Json(request): Json<UpdatePasswordRequest>,
) -> ApiResult<Value> {
    state
        .auth
        .update_password(&request.token, &request.new_password)
        .await?;
    success(json!({ "updated": true }))
}
