//! Account and session lifecycle: sign-up, sign-in, sign-out, recovery.
//!
//! Every state change is published on a broadcast channel. The session
//! manager is the only intended subscriber.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use tokio::sync::broadcast;

use super::password::{
    generate_salt, generate_token, hash_password, hash_token, verify_password,
    MIN_PASSWORD_LENGTH,
};
use crate::config::Config;
use crate::db::{NewAccount, Repository, TokenPurpose};
use crate::errors::AppError;
use crate::models::{
    ApprovalStatus, Identity, IssuedSession, Professional, ProfessionalRole, RegistrationProfile,
};

const EVENT_CAPACITY: usize = 64;
const CONFIRMATION_TTL: Duration = Duration::from_secs(48 * 3600);
const RESET_TTL: Duration = Duration::from_secs(3600);

/// Auth-state change notifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    SignedIn { user_id: String },
    SignedOut { user_id: String },
    UserUpdated { user_id: String },
    PasswordRecovery { user_id: String },
}

impl AuthEvent {
    pub fn user_id(&self) -> &str {
        match self {
            AuthEvent::SignedIn { user_id }
            | AuthEvent::SignedOut { user_id }
            | AuthEvent::UserUpdated { user_id }
            | AuthEvent::PasswordRecovery { user_id } => user_id,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("invalid login credentials")]
    InvalidCredentials,
    #[error("email not confirmed")]
    EmailNotConfirmed,
    #[error("email already registered")]
    EmailTaken,
    #[error("{0}")]
    Invalid(String),
    #[error("token is invalid or has expired")]
    InvalidToken,
    #[error(transparent)]
    Store(#[from] AppError),
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials => {
                AppError::InvalidCredentials("E-mail ou senha incorretos.".to_string())
            }
            AuthError::EmailNotConfirmed => {
                AppError::EmailNotConfirmed("Confirme seu e-mail antes de entrar.".to_string())
            }
            AuthError::EmailTaken => AppError::Conflict("E-mail já cadastrado.".to_string()),
            AuthError::Invalid(msg) => AppError::Validation(msg),
            AuthError::InvalidToken => {
                AppError::Unauthorized("Link inválido ou expirado.".to_string())
            }
            AuthError::Store(inner) => inner,
        }
    }
}

/// Knobs taken from [`Config`].
#[derive(Debug, Clone)]
pub struct AuthSettings {
    pub admin_email: String,
    pub session_ttl: Duration,
    pub password_iterations: u32,
    pub auto_confirm_email: bool,
}

impl From<&Config> for AuthSettings {
    fn from(config: &Config) -> Self {
        Self {
            admin_email: config.admin_email.clone(),
            session_ttl: config.session_ttl,
            password_iterations: config.password_iterations,
            auto_confirm_email: config.auto_confirm_email,
        }
    }
}

/// Result of a registration.
#[derive(Debug, Clone)]
pub struct SignUpOutcome {
    pub professional: Professional,
    /// Present when the account must be confirmed before sign-in
    pub confirmation_token: Option<String>,
}

pub struct AuthService {
    repo: Arc<Repository>,
    settings: AuthSettings,
    events: broadcast::Sender<AuthEvent>,
}

impl AuthService {
    pub fn new(repo: Arc<Repository>, settings: AuthSettings) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            repo,
            settings,
            events,
        }
    }

    pub fn settings(&self) -> &AuthSettings {
        &self.settings
    }

    /// Receive auth-state changes from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }

    fn publish(&self, event: AuthEvent) {
        // No receivers is fine
        let _ = self.events.send(event);
    }

    /// Register an account with its professional profile (status pending).
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        profile: &RegistrationProfile,
    ) -> Result<SignUpOutcome, AuthError> {
        let email = normalize_email(email)?;
        check_password(password)?;
        for (value, message) in [
            (&profile.name, "Informe o nome."),
            (&profile.oab_number, "Informe o número da OAB."),
            (&profile.specialty, "Informe a especialidade."),
        ] {
            if value.trim().is_empty() {
                return Err(AuthError::Invalid(message.to_string()));
            }
        }

        // The reserved address would resolve as admin through the email fallback
        if email == self.settings.admin_email {
            return Err(AuthError::Invalid("Este e-mail é reservado.".to_string()));
        }
        if self.repo.find_auth_user_by_email(&email).await?.is_some() {
            return Err(AuthError::EmailTaken);
        }

        let confirmed = self.settings.auto_confirm_email;
        let professional = self
            .create_account(
                &email,
                password,
                profile,
                confirmed,
                ProfessionalRole::Professional,
                ApprovalStatus::Pending,
            )
            .await?;

        let confirmation_token = if confirmed {
            None
        } else {
            let token = self
                .issue_token(&professional.id, TokenPurpose::EmailConfirmation, CONFIRMATION_TTL)
                .await?;
            tracing::info!(user_id = %professional.id, "Email confirmation issued");
            Some(token)
        };

        tracing::info!(user_id = %professional.id, "Professional registered");

        Ok(SignUpOutcome {
            professional,
            confirmation_token,
        })
    }

    pub async fn confirm_email(&self, token: &str) -> Result<(), AuthError> {
        let user_id = self
            .consume_token(token, TokenPurpose::EmailConfirmation)
            .await?;
        self.repo.mark_email_confirmed(&user_id).await?;
        tracing::info!(user_id = %user_id, "Email confirmed");
        self.publish(AuthEvent::UserUpdated { user_id });
        Ok(())
    }

    /// Exchange email and password for a fresh session token.
    pub async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<IssuedSession, AuthError> {
        let email = email.trim().to_lowercase();
        let Some(user) = self.repo.find_auth_user_by_email(&email).await? else {
            return Err(AuthError::InvalidCredentials);
        };

        let password = password.to_string();
        let salt = user.password_salt.clone();
        let expected = user.password_hash.clone();
        let iterations = user.password_iterations;
        let valid = tokio::task::spawn_blocking(move || {
            verify_password(&password, &salt, iterations, &expected)
        })
        .await
        .map_err(|e| AppError::Internal(format!("Password check failed: {}", e)))?;

        if !valid {
            tracing::debug!(user_id = %user.id, "Rejected sign-in");
            return Err(AuthError::InvalidCredentials);
        }
        if !user.email_confirmed {
            return Err(AuthError::EmailNotConfirmed);
        }

        let token = generate_token();
        let expires_at = expiry_after(self.settings.session_ttl)?;
        self.repo
            .insert_session(&hash_token(&token), &user.id, &expires_at)
            .await?;

        tracing::info!(user_id = %user.id, "Signed in");
        self.publish(AuthEvent::SignedIn {
            user_id: user.id.clone(),
        });

        Ok(IssuedSession {
            access_token: token,
            expires_at,
            identity: Identity {
                user_id: user.id,
                email: user.email,
            },
        })
    }

    /// Revoke a session. Unknown tokens are ignored.
    pub async fn sign_out(&self, token: &str) -> Result<(), AuthError> {
        if let Some(user_id) = self.repo.delete_session(&hash_token(token)).await? {
            tracing::info!(user_id = %user_id, "Signed out");
            self.publish(AuthEvent::SignedOut { user_id });
        }
        Ok(())
    }

    /// Resolve a token to its identity. Expired sessions are removed.
    pub async fn get_session(&self, token: &str) -> Result<Option<Identity>, AuthError> {
        let token_hash = hash_token(token);
        let Some((identity, expires_at)) = self.repo.find_session(&token_hash).await? else {
            return Ok(None);
        };

        if is_expired(&expires_at) {
            self.repo.delete_session(&token_hash).await?;
            tracing::debug!(user_id = %identity.user_id, "Session expired");
            return Ok(None);
        }

        Ok(Some(identity))
    }

    /// Start password recovery. Unknown emails succeed silently; the token is
    /// returned for delivery by whatever mailer is wired in.
    pub async fn reset_password_for_email(&self, email: &str) -> Result<Option<String>, AuthError> {
        let email = email.trim().to_lowercase();
        let Some(user) = self.repo.find_auth_user_by_email(&email).await? else {
            tracing::debug!("Password reset requested for unknown email");
            return Ok(None);
        };

        let token = self
            .issue_token(&user.id, TokenPurpose::PasswordReset, RESET_TTL)
            .await?;
        tracing::info!(user_id = %user.id, "Password reset issued");
        self.publish(AuthEvent::PasswordRecovery { user_id: user.id });
        Ok(Some(token))
    }

    /// Set a new password with a reset token. All existing sessions are revoked.
    pub async fn update_password(&self, token: &str, new_password: &str) -> Result<(), AuthError> {
        check_password(new_password)?;
        let user_id = self.consume_token(token, TokenPurpose::PasswordReset).await?;

        let iterations = self.settings.password_iterations;
        let (hash, salt) = self.derive(new_password, iterations).await?;
        self.repo
            .update_password(&user_id, &hash, &salt, iterations)
            .await?;
        let revoked = self.repo.delete_user_sessions(&user_id).await?;

        tracing::info!(user_id = %user_id, revoked, "Password updated");
        self.publish(AuthEvent::SignedOut {
            user_id: user_id.clone(),
        });
        self.publish(AuthEvent::UserUpdated { user_id });
        Ok(())
    }

    /// Create the administrator account if it does not exist yet.
    pub async fn ensure_admin(&self, password: &str) -> Result<bool, AuthError> {
        let email = self.settings.admin_email.clone();
        if self.repo.find_auth_user_by_email(&email).await?.is_some() {
            return Ok(false);
        }
        check_password(password)?;

        let profile = RegistrationProfile {
            name: "Administrador".to_string(),
            oab_number: String::new(),
            specialty: String::new(),
            specialties: Vec::new(),
            phone: None,
            gender: None,
            bio: None,
        };
        let admin = self
            .create_account(
                &email,
                password,
                &profile,
                true,
                ProfessionalRole::Admin,
                ApprovalStatus::Approved,
            )
            .await?;
        tracing::info!(user_id = %admin.id, "Administrator account created");
        Ok(true)
    }

    async fn create_account(
        &self,
        email: &str,
        password: &str,
        profile: &RegistrationProfile,
        email_confirmed: bool,
        role: ProfessionalRole,
        status: ApprovalStatus,
    ) -> Result<Professional, AuthError> {
        let iterations = self.settings.password_iterations;
        let (password_hash, password_salt) = self.derive(password, iterations).await?;

        let professional = self
            .repo
            .create_account(&NewAccount {
                user_id: uuid::Uuid::new_v4().to_string(),
                email: email.to_string(),
                password_hash,
                password_salt,
                password_iterations: iterations,
                email_confirmed,
                role,
                status,
                profile,
            })
            .await
            .map_err(|err| match err {
                AppError::Conflict(_) => AuthError::EmailTaken,
                other => AuthError::Store(other),
            })?;
        Ok(professional)
    }

    async fn derive(&self, password: &str, iterations: u32) -> Result<(Vec<u8>, Vec<u8>), AuthError> {
        let password = password.to_string();
        let (hash, salt) = tokio::task::spawn_blocking(move || {
            let salt = generate_salt();
            (hash_password(&password, &salt, iterations), salt)
        })
        .await
        .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))?;
        Ok((hash.to_vec(), salt.to_vec()))
    }

    async fn issue_token(
        &self,
        user_id: &str,
        purpose: TokenPurpose,
        ttl: Duration,
    ) -> Result<String, AuthError> {
        let token = generate_token();
        let expires_at = expiry_after(ttl)?;
        self.repo
            .insert_auth_token(&hash_token(&token), user_id, purpose, &expires_at)
            .await?;
        Ok(token)
    }

    async fn consume_token(&self, token: &str, purpose: TokenPurpose) -> Result<String, AuthError> {
        match self.repo.take_auth_token(&hash_token(token), purpose).await? {
            Some((user_id, expires_at)) if !is_expired(&expires_at) => Ok(user_id),
            _ => Err(AuthError::InvalidToken),
        }
    }
}

fn normalize_email(email: &str) -> Result<String, AuthError> {
    let email = email.trim().to_lowercase();
    let valid = match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !domain.starts_with('.'),
        None => false,
    };
    if !valid {
        return Err(AuthError::Invalid("Informe um e-mail válido.".to_string()));
    }
    Ok(email)
}

fn check_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::Invalid(format!(
            "A senha deve ter pelo menos {MIN_PASSWORD_LENGTH} caracteres."
        )));
    }
    Ok(())
}

fn expiry_after(ttl: Duration) -> Result<String, AuthError> {
    let ttl = chrono::Duration::from_std(ttl)
        .map_err(|e| AppError::Internal(format!("Invalid TTL: {}", e)))?;
    let at = Utc::now()
        .checked_add_signed(ttl)
        .ok_or_else(|| AppError::Internal("TTL is out of range".to_string()))?;
    Ok(at.to_rfc3339_opts(SecondsFormat::Micros, true))
}

fn is_expired(expires_at: &str) -> bool {
    match DateTime::parse_from_rfc3339(expires_at) {
        Ok(at) => at.with_timezone(&Utc) <= Utc::now(),
        Err(_) => true,
    }
}
