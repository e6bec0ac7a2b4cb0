use anyhow::Result;
use tracing::{info, warn};

use super::password::{hash_password, verify_password};
use super::validation::{validate_email, validate_password, validate_repeated_password};
use crate::db::{clear_session, get_session, get_user_by_email, insert_user, set_session, Database};
use crate::model::{AuthState, Session};

/// Per-field messages from a rejected registration form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldErrors {
    pub email: Option<String>,
    pub password: Option<String>,
    pub confirm_password: Option<String>,
}

/// Result of [`AuthGate::register_validated`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Registration {
    /// Every field passed; the store was consulted.
    Submitted(AuthState),
    /// At least one field failed; nothing was stored.
    Invalid(FieldErrors),
}

/// Local account store and the logged-in session flag.
#[derive(Debug, Clone)]
pub struct AuthGate {
    db: Database,
}

impl AuthGate {
    #[must_use]
    pub const fn new(db: Database) -> Self {
        Self { db }
    }

    /// Create an account. Does not log in.
    pub async fn register(&self, email: &str, password: &str) -> AuthState {
        match self.try_register(email, password).await {
            Ok(state) => state,
            Err(e) => AuthState::Error(format!("Registration failed: {e:#}")),
        }
    }

    async fn try_register(&self, email: &str, password: &str) -> Result<AuthState> {
        if get_user_by_email(self.db.pool(), email).await?.is_some() {
            return Ok(AuthState::Error("User already exists".to_string()));
        }
        let password_hash = hash_password(password)?;
        insert_user(self.db.pool(), email, &password_hash).await?;
        info!(email, "Registered user");
        Ok(AuthState::Success)
    }

    /// Validate the form fields, then register if all pass.
    pub async fn register_validated(
        &self,
        email: &str,
        password: &str,
        confirm_password: &str,
    ) -> Registration {
        let email_result = validate_email(email);
        let password_result = validate_password(password);
        let confirm_result = validate_repeated_password(password, confirm_password);

        if !(email_result.is_valid && password_result.is_valid && confirm_result.is_valid) {
            return Registration::Invalid(FieldErrors {
                email: email_result.error_message,
                password: password_result.error_message,
                confirm_password: confirm_result.error_message,
            });
        }

        Registration::Submitted(self.register(email, password).await)
    }

    /// Check credentials and persist a logged-in session on success.
    pub async fn login(&self, email: &str, password: &str) -> AuthState {
        match self.try_login(email, password).await {
            Ok(state) => state,
            Err(e) => AuthState::Error(format!("Login failed: {e:#}")),
        }
    }

    async fn try_login(&self, email: &str, password: &str) -> Result<AuthState> {
        let Some(user) = get_user_by_email(self.db.pool(), email).await? else {
            return Ok(AuthState::Error("Invalid credentials".to_string()));
        };
        if !verify_password(password, &user.password_hash)? {
            return Ok(AuthState::Error("Invalid credentials".to_string()));
        }
        set_session(self.db.pool(), true, Some(email)).await?;
        info!(email, "User logged in");
        Ok(AuthState::Success)
    }

    /// Current session; reads as logged out if the store cannot be read.
    pub async fn session(&self) -> Session {
        match get_session(self.db.pool()).await {
            Ok(record) => Session {
                is_logged_in: record.is_logged_in,
                email: record.email,
            },
            Err(e) => {
                warn!("Failed to read session: {e:#}");
                Session::default()
            }
        }
    }

    pub async fn is_logged_in(&self) -> bool {
        self.session().await.is_logged_in
    }

    pub async fn current_email(&self) -> Option<String> {
        self.session().await.email
    }

    /// Forget the session.
    ///
    /// # Errors
    ///
    /// Returns an error if the session row cannot be deleted.
    pub async fn logout(&self) -> Result<()> {
        clear_session(self.db.pool()).await?;
        info!("User logged out");
        Ok(())
    }
}
