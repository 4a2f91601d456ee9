//! Session state machine.
//!
//! `SessionManager` is the only writer of a `SessionState`; everything else
//! reads it through a `SessionHandle`. Profile fetches run in spawned tasks
//! and carry the generation they were started for, so a fetch overtaken by a
//! later identity change is dropped instead of applied.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::auth::{AuthError, AuthEvent, AuthService};
use crate::db::MarketplaceStore;
use crate::errors::AppError;
use crate::models::{Identity, IssuedSession, Professional, ProfessionalRole};

/// Where a session currently stands.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SessionState {
    Anonymous,
    /// Restoring a persisted token
    Authenticating,
    /// Token accepted, profile fetch in flight
    Unresolved { identity: Identity },
    Professional {
        identity: Identity,
        profile: Option<Professional>,
    },
    Admin {
        identity: Identity,
        profile: Option<Professional>,
    },
}

impl SessionState {
    pub fn is_pending(&self) -> bool {
        matches!(
            self,
            SessionState::Authenticating | SessionState::Unresolved { .. }
        )
    }

    pub fn identity(&self) -> Option<&Identity> {
        match self {
            SessionState::Anonymous | SessionState::Authenticating => None,
            SessionState::Unresolved { identity }
            | SessionState::Professional { identity, .. }
            | SessionState::Admin { identity, .. } => Some(identity),
        }
    }

    pub fn profile(&self) -> Option<&Professional> {
        match self {
            SessionState::Professional { profile, .. } | SessionState::Admin { profile, .. } => {
                profile.as_ref()
            }
            _ => None,
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, SessionState::Admin { .. })
    }
}

/// Admin if the profile says so, or if the email is the reserved admin address.
pub fn is_admin(identity: &Identity, profile: Option<&Professional>, admin_email: &str) -> bool {
    profile.is_some_and(|p| p.role == ProfessionalRole::Admin)
        || identity.email.eq_ignore_ascii_case(admin_email)
}

/// Sign-in failure as shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AuthFailure {
    #[error("E-mail ou senha incorretos.")]
    InvalidCredentials,
    #[error("Confirme seu e-mail antes de entrar.")]
    EmailNotConfirmed,
    #[error("Não foi possível entrar. Tente novamente.")]
    Other,
}

impl From<&AuthError> for AuthFailure {
    fn from(err: &AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials => AuthFailure::InvalidCredentials,
            AuthError::EmailNotConfirmed => AuthFailure::EmailNotConfirmed,
            _ => AuthFailure::Other,
        }
    }
}

impl From<AuthFailure> for AppError {
    fn from(failure: AuthFailure) -> Self {
        let message = failure.to_string();
        match failure {
            AuthFailure::InvalidCredentials => AppError::InvalidCredentials(message),
            AuthFailure::EmailNotConfirmed => AppError::EmailNotConfirmed(message),
            AuthFailure::Other => AppError::Unauthorized(message),
        }
    }
}

/// Read-only view of a session.
#[derive(Clone)]
pub struct SessionHandle {
    rx: watch::Receiver<SessionState>,
}

impl SessionHandle {
    pub fn state(&self) -> SessionState {
        self.rx.borrow().clone()
    }

    /// Wait until the session leaves the pending states, at most `timeout`.
    /// Returns whatever the state is at that point.
    pub async fn settled(&mut self, timeout: Duration) -> SessionState {
        let settled =
            match tokio::time::timeout(timeout, self.rx.wait_for(|s| !s.is_pending())).await {
                Ok(Ok(state)) => Some(state.clone()),
                _ => None,
            };
        settled.unwrap_or_else(|| self.state())
    }
}

/// Aborts the auth-event listener when dropped.
pub struct ListenerHandle(JoinHandle<()>);

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        self.0.abort();
    }
}

struct Inner<S: ?Sized> {
    auth: Arc<AuthService>,
    admin_email: String,
    state: watch::Sender<SessionState>,
    generation: AtomicU64,
    token: Mutex<Option<String>>,
    store: Arc<S>,
}

/// Owns one session: restore, sign-in, sign-out and profile resolution.
pub struct SessionManager<S: ?Sized> {
    inner: Arc<Inner<S>>,
}

impl<S: ?Sized> Clone for SessionManager<S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<S> SessionManager<S>
where
    S: MarketplaceStore + ?Sized + 'static,
{
    pub fn new(auth: Arc<AuthService>, store: Arc<S>) -> Self {
        let admin_email = auth.settings().admin_email.clone();
        let (state, _) = watch::channel(SessionState::Authenticating);
        Self {
            inner: Arc::new(Inner {
                auth,
                admin_email,
                state,
                generation: AtomicU64::new(0),
                token: Mutex::new(None),
                store,
            }),
        }
    }

    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            rx: self.inner.state.subscribe(),
        }
    }

    pub fn current(&self) -> SessionState {
        self.inner.state.borrow().clone()
    }

    fn token(&self) -> Option<String> {
        self.inner
            .token
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn set_token(&self, token: Option<String>) {
        *self
            .inner
            .token
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = token;
    }

    /// Restore from a persisted token. Ends Anonymous, or Unresolved with a
    /// profile fetch scheduled.
    pub async fn restore(&self, token: Option<&str>) {
        self.inner.state.send_modify(|state| {
            self.inner.generation.fetch_add(1, Ordering::SeqCst);
            *state = SessionState::Authenticating;
        });

        let identity = match token {
            None => None,
            Some(token) => match self.inner.auth.get_session(token).await {
                Ok(identity) => identity,
                Err(err) => {
                    tracing::warn!(error = %err, "Session restore failed");
                    None
                }
            },
        };

        self.set_token(identity.as_ref().and(token.map(str::to_string)));
        self.apply_identity(identity);
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<IssuedSession, AuthFailure> {
        match self.inner.auth.sign_in_with_password(email, password).await {
            Ok(session) => {
                self.set_token(Some(session.access_token.clone()));
                self.apply_identity(Some(session.identity.clone()));
                Ok(session)
            }
            Err(err) => {
                let failure = AuthFailure::from(&err);
                if failure == AuthFailure::Other {
                    tracing::warn!(error = %err, "Sign-in failed");
                }
                Err(failure)
            }
        }
    }

    /// Drop to Anonymous and revoke the server-side session.
    pub async fn sign_out(&self) -> Result<(), AppError> {
        let token = self.token();
        self.set_token(None);
        self.apply_identity(None);

        if let Some(token) = token {
            self.inner.auth.sign_out(&token).await?;
        }
        Ok(())
    }

    /// Fetch the profile again for the current identity and apply it.
    pub async fn refresh_profile(&self) -> SessionState {
        // Read the identity and claim a generation under the same lock
        let mut target = None;
        self.inner.state.send_if_modified(|state| {
            if let Some(identity) = state.identity() {
                let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
                target = Some((generation, identity.clone()));
            }
            false
        });
        let Some((generation, identity)) = target else {
            return self.current();
        };
        let resolved = self.resolve(identity).await;
        self.apply_if_current(generation, resolved);
        self.current()
    }

    /// Follow auth events for this session's user until the handle is dropped.
    pub fn spawn_listener(&self) -> ListenerHandle {
        let mut events = self.inner.auth.subscribe();
        let manager = self.clone();

        ListenerHandle(tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => {
                        let ours = manager
                            .current()
                            .identity()
                            .is_some_and(|i| i.user_id == event.user_id());
                        if !ours {
                            continue;
                        }
                        // Never act inside the receive step
                        tokio::task::yield_now().await;
                        let manager = manager.clone();
                        tokio::spawn(async move { manager.on_auth_event(event).await });
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Auth event listener lagged");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }))
    }

    async fn on_auth_event(&self, event: AuthEvent) {
        tracing::debug!(?event, "Applying auth event");
        match event {
            AuthEvent::SignedIn { .. } | AuthEvent::UserUpdated { .. } => {
                self.refresh_profile().await;
            }
            AuthEvent::SignedOut { .. } => {
                let Some(token) = self.token() else {
                    return;
                };
                match self.inner.auth.get_session(&token).await {
                    Ok(Some(_)) => {}
                    Ok(None) => {
                        self.set_token(None);
                        self.apply_identity(None);
                    }
                    Err(err) => tracing::warn!(error = %err, "Session revalidation failed"),
                }
            }
            AuthEvent::PasswordRecovery { .. } => {}
        }
    }

    /// Start a new generation for `identity` and schedule its profile fetch.
    fn apply_identity(&self, identity: Option<Identity>) {
        let mut generation = 0;
        self.inner.state.send_modify(|state| {
            generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
            *state = match &identity {
                None => SessionState::Anonymous,
                Some(identity) => SessionState::Unresolved {
                    identity: identity.clone(),
                },
            };
        });

        if let Some(identity) = identity {
            let manager = self.clone();
            tokio::spawn(async move {
                let resolved = manager.resolve(identity).await;
                manager.apply_if_current(generation, resolved);
            });
        }
    }

    fn apply_if_current(&self, generation: u64, next: SessionState) -> bool {
        let applied = self.inner.state.send_if_modified(|state| {
            if self.inner.generation.load(Ordering::SeqCst) != generation {
                return false;
            }
            *state = next;
            true
        });
        if !applied {
            tracing::debug!(generation, "Discarded stale profile fetch");
        }
        applied
    }

    async fn resolve(&self, identity: Identity) -> SessionState {
        let profile = match self.fetch_profile(&identity.user_id).await {
            Ok(profile) => profile,
            Err(err) => {
                tracing::warn!(user_id = %identity.user_id, error = %err, "Profile fetch failed");
                None
            }
        };

        if is_admin(&identity, profile.as_ref(), &self.inner.admin_email) {
            SessionState::Admin { identity, profile }
        } else {
            SessionState::Professional { identity, profile }
        }
    }

    /// Profile row with its specialty tags merged in.
    async fn fetch_profile(&self, user_id: &str) -> Result<Option<Professional>, AppError> {
        let Some(mut profile) = self.inner.store.get_professional(user_id).await? else {
            return Ok(None);
        };
        profile.specialties = Some(self.inner.store.professional_tags(user_id).await?);
        Ok(Some(profile))
    }
}
