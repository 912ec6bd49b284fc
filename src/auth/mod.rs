//! Operator authentication.
//!
//! The site only consumes [`AuthProvider`]; [`LocalAuth`] backs it with the
//! `auth_users` table. [`verify_admin`] decides whether a session may reach the
//! admin surface.

mod gate;
mod local;

pub use gate::{AdminCheck, DenyReason, add_admin, verify_admin};
pub use local::{AuthPolicy, LocalAuth, LogMailer, Mailer};

use crate::store::StoreError;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Authentication errors.
///
/// Display strings are shown to the operator as-is.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Password must be at least {min} characters")]
    WeakPassword { min: usize },

    #[error("Reset link is invalid or has expired")]
    InvalidRecoveryToken,

    #[error("An account for `{0}` already exists")]
    UserExists(String),

    #[error("authentication backend unavailable")]
    Store(#[from] StoreError),
}

/// A signed-in operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub token: String,
    pub email: Option<String>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Session and credential capability.
pub trait AuthProvider: Send + Sync {
    fn sign_in(&self, email: &str, password: &str) -> Result<Session, AuthError>;

    /// The live session for `token`, if any.
    fn get_session(&self, token: &str) -> Option<Session>;

    fn sign_out(&self, token: &str);

    /// Send a recovery link pointing at `redirect_url`.
    ///
    /// Succeeds for unknown addresses too.
    fn send_password_reset(&self, email: &str, redirect_url: &str) -> Result<(), AuthError>;

    /// Set a new password using a recovery token. The token is consumed.
    fn update_password(&self, recovery_token: &str, new_password: &str) -> Result<(), AuthError>;
}
