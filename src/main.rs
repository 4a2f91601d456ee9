//! LexMatch Backend
//!
//! REST backend for a legal lead marketplace: questionnaire intake with
//! lawyer matching, professional accounts, and an admin review area.

mod api;
mod auth;
mod config;
mod db;
mod errors;
mod guard;
mod intake;
mod matching;
mod models;
mod session;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use auth::{AuthService, AuthSettings};
use config::Config;
use db::Repository;
use guard::{Area, ProfessionalPage};
use intake::LeadIntake;
use matching::MatchingEngine;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<Repository>,
    pub auth: Arc<AuthService>,
    pub intake: Arc<LeadIntake<Repository>>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(repo: Arc<Repository>, config: Config, engine: MatchingEngine) -> Self {
        let auth = Arc::new(AuthService::new(repo.clone(), AuthSettings::from(&config)));
        let intake = Arc::new(LeadIntake::new(repo.clone(), Arc::new(engine)));
        Self {
            repo,
            auth,
            intake,
            config: Arc::new(config),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize logging
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let registry = tracing_subscriber::registry().with(env_filter);
    if config.log_json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    tracing::info!("Starting LexMatch Backend");
    tracing::info!("Database path: {:?}", config.db_path);
    tracing::info!("Bind address: {}", config.bind_addr);

    // Initialize database
    let pool = db::init_database(&config.db_path).await?;
    let repo = Arc::new(Repository::new(pool));

    let engine = MatchingEngine::new(config.admin_email.clone());
    let state = AppState::new(repo, config.clone(), engine);

    match &config.admin_password {
        Some(password) => {
            if state.auth.ensure_admin(password).await? {
                tracing::info!("Administrator account bootstrapped for {}", config.admin_email);
            }
        }
        None => tracing::warn!(
            "No admin password configured (LEXMATCH_ADMIN_PASSWORD). The admin account must already exist."
        ),
    }

    if config.auto_confirm_email {
        tracing::warn!("Email confirmation is disabled (LEXMATCH_AUTO_CONFIRM_EMAIL)");
    }

    // Build router
    let app = create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Put every route of `routes` behind the guard for `area`.
fn guarded(state: &AppState, area: Area, routes: Router<AppState>) -> Router<AppState> {
    routes.route_layer(middleware::from_fn_with_state(
        state.clone(),
        move |state, request, next| guard::require(area, state, request, next),
    ))
}

/// Create the application router with all routes.
pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let auth_routes = Router::new()
        .route("/sign-up", post(api::sign_up))
        .route("/sign-in", post(api::sign_in))
        .route("/sign-out", post(api::sign_out))
        .route("/confirm", post(api::confirm_email))
        .route("/reset-password", post(api::reset_password))
        .route("/update-password", post(api::update_password))
        .route("/session", get(api::get_session));

    // Professional area, one guard per page
    let professional_routes = Router::new()
        .merge(guarded(
            &state,
            Area::Professional(ProfessionalPage::Dashboard),
            Router::new().route("/dashboard", get(api::dashboard)),
        ))
        .merge(guarded(
            &state,
            Area::Professional(ProfessionalPage::Leads),
            Router::new()
                .route("/leads", get(api::list_my_leads))
                .route("/leads/{id}/status", put(api::update_my_lead_status))
                .route("/leads/{id}/feedback", put(api::submit_lead_feedback)),
        ))
        .merge(guarded(
            &state,
            Area::Professional(ProfessionalPage::Profile),
            Router::new().route(
                "/profile",
                get(api::get_my_profile).put(api::update_my_profile),
            ),
        ))
        .merge(guarded(
            &state,
            Area::Professional(ProfessionalPage::Plans),
            Router::new().route("/plan", put(api::select_plan)),
        ));

    let admin_routes = guarded(
        &state,
        Area::Admin,
        Router::new()
            .route("/professionals", get(api::list_professionals))
            .route(
                "/professionals/{id}/status",
                put(api::set_professional_status),
            )
            .route("/leads", get(api::list_all_leads))
            .route("/leads/{id}/status", put(api::set_lead_status))
            .route("/leads/{id}/assign", put(api::assign_lead)),
    );

    // API routes
    let api_routes = Router::new()
        .route("/questionnaire", get(api::questionnaire_catalog))
        .route("/leads", post(api::submit_lead))
        .nest("/auth", auth_routes)
        .nest("/professional", professional_routes)
        .nest("/admin", admin_routes);

    // Health check
    let health_routes = Router::new().route("/health", get(health_check));

    Router::new()
        .nest("/api", api_routes)
        .merge(health_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> &'static str {
    "OK"
}

#[cfg(test)]
mod testing;
