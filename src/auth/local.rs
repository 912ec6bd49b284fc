//! Local credential store backed by the `auth_users` table.
//!
//! Passwords are stored as `blake3::derive_key(CONTEXT, salt || password)`,
//! hex encoded next to a random per-user salt. Sessions and recovery tokens
//! live in memory only, so a restart signs everyone out.

use super::{AuthError, AuthProvider, Session};
use crate::{
    log,
    store::{DataStore, Filter, Row, StoreError, Table},
};
use chrono::{Duration, Utc};
use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use serde_json::Value;
use std::sync::Arc;

const HASH_CONTEXT: &str = "leadsite 2025-10 auth_users password v1";

/// Delivers password recovery links.
pub trait Mailer: Send + Sync {
    fn send_reset(&self, email: &str, link: &str);
}

/// Prints recovery links to the terminal instead of mailing them.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogMailer;

impl Mailer for LogMailer {
    fn send_reset(&self, email: &str, link: &str) {
        log!("auth"; "password reset for {email}: {link}");
    }
}

/// Lifetimes and password rules.
#[derive(Debug, Clone, Copy)]
pub struct AuthPolicy {
    pub session_ttl: Duration,
    pub reset_ttl: Duration,
    pub min_password_len: usize,
}

impl Default for AuthPolicy {
    fn default() -> Self {
        Self {
            session_ttl: Duration::hours(24),
            reset_ttl: Duration::minutes(60),
            min_password_len: 8,
        }
    }
}

struct Recovery {
    email: String,
    expires_at: chrono::DateTime<Utc>,
}

pub struct LocalAuth {
    store: Arc<dyn DataStore>,
    mailer: Arc<dyn Mailer>,
    policy: AuthPolicy,
    sessions: RwLock<FxHashMap<String, Session>>,
    recoveries: Mutex<FxHashMap<String, Recovery>>,
}

impl LocalAuth {
    pub fn new(store: Arc<dyn DataStore>, mailer: Arc<dyn Mailer>, policy: AuthPolicy) -> Self {
        Self {
            store,
            mailer,
            policy,
            sessions: RwLock::default(),
            recoveries: Mutex::default(),
        }
    }

    /// Create a user. Fails if the email is taken.
    pub fn create_user(&self, email: &str, password: &str) -> Result<(), AuthError> {
        let email = normalize_email(email);
        self.check_strength(password)?;
        if self.find_user(&email)?.is_some() {
            return Err(AuthError::UserExists(email));
        }
        self.store.insert_row(Table::AuthUsers, credential_row(&email, password))?;
        Ok(())
    }

    fn check_strength(&self, password: &str) -> Result<(), AuthError> {
        let min = self.policy.min_password_len;
        if password.chars().count() < min {
            return Err(AuthError::WeakPassword { min });
        }
        Ok(())
    }

    fn find_user(&self, email: &str) -> Result<Option<Row>, StoreError> {
        let rows = self
            .store
            .read_rows(Table::AuthUsers, Some(&Filter::eq("email", email)))?;
        Ok(rows.into_iter().next())
    }
}

impl AuthProvider for LocalAuth {
    fn sign_in(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let email = normalize_email(email);
        let row = self
            .find_user(&email)?
            .ok_or(AuthError::InvalidCredentials)?;
        if !verify_password(&row, password) {
            return Err(AuthError::InvalidCredentials);
        }

        let session = Session {
            token: new_token(),
            email: Some(email),
            expires_at: Utc::now() + self.policy.session_ttl,
        };
        self.sessions
            .write()
            .insert(session.token.clone(), session.clone());
        Ok(session)
    }

    fn get_session(&self, token: &str) -> Option<Session> {
        let session = self.sessions.read().get(token).cloned()?;
        if session.is_expired(Utc::now()) {
            self.sessions.write().remove(token);
            return None;
        }
        Some(session)
    }

    fn sign_out(&self, token: &str) {
        self.sessions.write().remove(token);
    }

    fn send_password_reset(&self, email: &str, redirect_url: &str) -> Result<(), AuthError> {
        let email = normalize_email(email);
        if self.find_user(&email)?.is_none() {
            return Ok(());
        }

        let token = new_token();
        let link = format!("{redirect_url}?token={token}");
        self.recoveries.lock().insert(
            token,
            Recovery {
                email: email.clone(),
                expires_at: Utc::now() + self.policy.reset_ttl,
            },
        );
        self.mailer.send_reset(&email, &link);
        Ok(())
    }

    fn update_password(&self, recovery_token: &str, new_password: &str) -> Result<(), AuthError> {
        self.check_strength(new_password)?;

        let recovery = self
            .recoveries
            .lock()
            .remove(recovery_token)
            .ok_or(AuthError::InvalidRecoveryToken)?;
        if Utc::now() >= recovery.expires_at {
            return Err(AuthError::InvalidRecoveryToken);
        }

        self.store.upsert_row(
            Table::AuthUsers,
            credential_row(&recovery.email, new_password),
            "email",
        )?;
        // Existing sessions for this account stay valid until they expire.
        log!("auth"; "password updated for {}", recovery.email);
        Ok(())
    }
}

// ============================================================================
// Hashing
// ============================================================================

pub(super) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn new_token() -> String {
    hex::encode(rand::random::<[u8; 32]>())
}

fn hash_password(salt: &str, password: &str) -> [u8; 32] {
    let mut material = Vec::with_capacity(salt.len() + password.len());
    material.extend_from_slice(salt.as_bytes());
    material.extend_from_slice(password.as_bytes());
    blake3::derive_key(HASH_CONTEXT, &material)
}

fn credential_row(email: &str, password: &str) -> Row {
    let salt = hex::encode(rand::random::<[u8; 16]>());
    let hash = hex::encode(hash_password(&salt, password));
    let mut row = Row::new();
    row.insert("email".into(), Value::from(email));
    row.insert("salt".into(), Value::from(salt));
    row.insert("password_hash".into(), Value::from(hash));
    row
}

fn verify_password(row: &Row, password: &str) -> bool {
    let (Some(salt), Some(stored)) = (
        row.get("salt").and_then(Value::as_str),
        row.get("password_hash").and_then(Value::as_str),
    ) else {
        return false;
    };
    let Ok(stored) = blake3::Hash::from_hex(stored) else {
        return false;
    };
    // `Hash` equality is constant time.
    blake3::Hash::from(hash_password(salt, password)) == stored
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[derive(Default)]
    struct RecordingMailer {
        sent: Mutex<Vec<(String, String)>>,
    }

    impl Mailer for RecordingMailer {
        fn send_reset(&self, email: &str, link: &str) {
            self.sent.lock().push((email.to_owned(), link.to_owned()));
        }
    }

    fn setup(policy: AuthPolicy) -> (LocalAuth, Arc<RecordingMailer>) {
        let mailer = Arc::new(RecordingMailer::default());
        let auth = LocalAuth::new(Arc::new(MemoryStore::new()), mailer.clone(), policy);
        auth.create_user("Owner@Example.com", "correct horse").unwrap();
        (auth, mailer)
    }

    fn token_from(link: &str) -> &str {
        link.split_once("?token=").unwrap().1
    }

    #[test]
    fn test_sign_in_and_session() {
        let (auth, _) = setup(AuthPolicy::default());
        let session = auth.sign_in(" owner@example.com ", "correct horse").unwrap();
        assert_eq!(session.email.as_deref(), Some("owner@example.com"));
        assert_eq!(session.token.len(), 64);
        assert_eq!(auth.get_session(&session.token), Some(session.clone()));

        auth.sign_out(&session.token);
        assert_eq!(auth.get_session(&session.token), None);
    }

    #[test]
    fn test_bad_credentials_are_indistinguishable() {
        let (auth, _) = setup(AuthPolicy::default());
        let wrong_pw = auth.sign_in("owner@example.com", "nope").unwrap_err();
        let no_user = auth.sign_in("ghost@example.com", "correct horse").unwrap_err();
        assert_eq!(wrong_pw.to_string(), "Invalid credentials");
        assert_eq!(no_user.to_string(), "Invalid credentials");
    }

    #[test]
    fn test_expired_session_is_dropped() {
        let policy = AuthPolicy {
            session_ttl: Duration::zero(),
            ..AuthPolicy::default()
        };
        let (auth, _) = setup(policy);
        let session = auth.sign_in("owner@example.com", "correct horse").unwrap();
        assert_eq!(auth.get_session(&session.token), None);
    }

    #[test]
    fn test_create_user_rules() {
        let (auth, _) = setup(AuthPolicy::default());
        assert!(matches!(
            auth.create_user("owner@example.com", "another pw"),
            Err(AuthError::UserExists(_))
        ));
        assert!(matches!(
            auth.create_user("new@example.com", "short"),
            Err(AuthError::WeakPassword { min: 8 })
        ));
    }

    #[test]
    fn test_reset_for_unknown_email_sends_nothing() {
        let (auth, mailer) = setup(AuthPolicy::default());
        auth.send_password_reset("ghost@example.com", "https://x/reset-password")
            .unwrap();
        assert!(mailer.sent.lock().is_empty());
    }

    #[test]
    fn test_reset_flow_consumes_token() {
        let (auth, mailer) = setup(AuthPolicy::default());
        auth.send_password_reset("owner@example.com", "https://x/reset-password")
            .unwrap();
        let (email, link) = mailer.sent.lock()[0].clone();
        assert_eq!(email, "owner@example.com");
        assert!(link.starts_with("https://x/reset-password?token="));
        let token = token_from(&link);

        // A weak password leaves the token usable.
        assert!(matches!(
            auth.update_password(token, "short"),
            Err(AuthError::WeakPassword { .. })
        ));
        auth.update_password(token, "battery staple").unwrap();
        assert!(matches!(
            auth.update_password(token, "battery staple"),
            Err(AuthError::InvalidRecoveryToken)
        ));

        assert!(auth.sign_in("owner@example.com", "correct horse").is_err());
        assert!(auth.sign_in("owner@example.com", "battery staple").is_ok());
    }

    #[test]
    fn test_expired_recovery_token() {
        let policy = AuthPolicy {
            reset_ttl: Duration::zero(),
            ..AuthPolicy::default()
        };
        let (auth, mailer) = setup(policy);
        auth.send_password_reset("owner@example.com", "https://x/r").unwrap();
        let link = mailer.sent.lock()[0].1.clone();
        assert!(matches!(
            auth.update_password(token_from(&link), "battery staple"),
            Err(AuthError::InvalidRecoveryToken)
        ));
    }

    #[test]
    fn test_salts_differ_per_user() {
        let a = credential_row("a@x.io", "same password");
        let b = credential_row("b@x.io", "same password");
        assert_ne!(a["salt"], b["salt"]);
        assert_ne!(a["password_hash"], b["password_hash"]);
        assert!(verify_password(&a, "same password"));
        assert!(!verify_password(&a, "other password"));
    }
}
