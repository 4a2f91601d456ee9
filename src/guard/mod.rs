//! Route guards for the professional and admin areas.
//!
//! `evaluate` is the pure decision; `require` is the axum middleware that
//! restores the session, waits for it to settle and applies the decision.

use axum::{
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::auth::bearer_token;
use crate::db::Repository;
use crate::errors::AppError;
use crate::models::{ApprovalStatus, Identity, Professional};
use crate::session::{SessionManager, SessionState};
use crate::AppState;

pub const LOGIN_PATH: &str = "/login";
pub const DASHBOARD_PATH: &str = "/dashboard";
pub const ADMIN_PATH: &str = "/admin";

pub const LOGIN_NOTICE: &str = "Faça login para acessar esta área.";
pub const ADMIN_ONLY_NOTICE: &str = "Acesso restrito a administradores.";
pub const NOT_APPROVED_NOTICE: &str =
    "Seu cadastro ainda está em análise. Os leads ficam disponíveis após a aprovação.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfessionalPage {
    Dashboard,
    Leads,
    Profile,
    Plans,
}

/// A protected area of the app.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Area {
    Admin,
    Professional(ProfessionalPage),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    Allow,
    /// Still resolving; show a placeholder, do not redirect yet
    Loading,
    Redirect {
        to: &'static str,
        notice: Option<&'static str>,
    },
}

pub fn evaluate(area: Area, session: &SessionState) -> GuardDecision {
    match session {
        SessionState::Authenticating | SessionState::Unresolved { .. } => GuardDecision::Loading,
        SessionState::Anonymous => GuardDecision::Redirect {
            to: LOGIN_PATH,
            notice: Some(LOGIN_NOTICE),
        },
        SessionState::Admin { .. } => match area {
            Area::Admin => GuardDecision::Allow,
            Area::Professional(_) => GuardDecision::Redirect {
                to: ADMIN_PATH,
                notice: None,
            },
        },
        SessionState::Professional { profile, .. } => match area {
            Area::Admin => GuardDecision::Redirect {
                to: DASHBOARD_PATH,
                notice: Some(ADMIN_ONLY_NOTICE),
            },
            Area::Professional(ProfessionalPage::Leads) => {
                let approved = profile
                    .as_ref()
                    .is_some_and(|p| p.status == ApprovalStatus::Approved);
                if approved {
                    GuardDecision::Allow
                } else {
                    GuardDecision::Redirect {
                        to: DASHBOARD_PATH,
                        notice: Some(NOT_APPROVED_NOTICE),
                    }
                }
            }
            Area::Professional(_) => GuardDecision::Allow,
        },
    }
}

impl GuardDecision {
    /// HTTP form of a non-`Allow` decision.
    pub fn into_error(self) -> Option<AppError> {
        match self {
            GuardDecision::Allow => None,
            GuardDecision::Loading => Some(AppError::SessionPending),
            GuardDecision::Redirect { to, notice } => {
                let status = if to == LOGIN_PATH {
                    StatusCode::UNAUTHORIZED
                } else {
                    StatusCode::FORBIDDEN
                };
                Some(AppError::Redirect {
                    status,
                    to,
                    notice: notice.unwrap_or_default().to_string(),
                })
            }
        }
    }
}

/// The settled session of a request that passed its guard.
#[derive(Clone)]
pub struct CurrentSession {
    pub state: SessionState,
    pub manager: SessionManager<Repository>,
}

impl CurrentSession {
    /// Allowed sessions are always resolved, so an identity is present.
    pub fn identity(&self) -> Result<&Identity, AppError> {
        self.state
            .identity()
            .ok_or_else(|| AppError::Unauthorized(LOGIN_NOTICE.to_string()))
    }

    /// Handlers in the professional area need an actual profile row.
    pub fn profile(&self) -> Result<&Professional, AppError> {
        self.state
            .profile()
            .ok_or_else(|| AppError::NotFound("Perfil profissional não encontrado.".to_string()))
    }
}

/// Restore the request's session and wait for it to settle.
pub async fn resolve_session(state: &AppState, headers: &HeaderMap) -> CurrentSession {
    let manager = SessionManager::new(state.auth.clone(), state.repo.clone());
    let mut handle = manager.handle();
    let token = bearer_token(headers);

    manager.restore(token.as_deref()).await;
    let settled = handle.settled(state.config.guard_settle).await;

    CurrentSession {
        state: settled,
        manager,
    }
}

/// Middleware for one protected area.
pub async fn require(
    area: Area,
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let session = resolve_session(&state, request.headers()).await;
    let _listener = session.manager.spawn_listener();

    let decision = evaluate(area, &session.state);
    if let Some(err) = decision.clone().into_error() {
        tracing::debug!(
            path = %request.uri().path(),
            admin = session.state.is_admin(),
            ?decision,
            "Route guard rejected request"
        );
        return err.into_response();
    }

    request.extensions_mut().insert(session);
    next.run(request).await
}
