//! Admin surface gate.
//!
//! Fails closed: anything short of a live session whose email is listed in
//! `admins` denies access, and every denial after a session was found signs
//! that session out.

use super::{AuthProvider, Session, local::normalize_email};
use crate::{
    log,
    store::{DataStore, Filter, Row, StoreError, Table},
};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    NoSession,
    NoEmail,
    LookupFailed,
    NotAnAdmin,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminCheck {
    Granted(Session),
    Denied(DenyReason),
}

impl AdminCheck {
    pub fn is_granted(&self) -> bool {
        matches!(self, Self::Granted(_))
    }
}

/// Decide whether `token` belongs to an admin.
pub fn verify_admin(auth: &dyn AuthProvider, store: &dyn DataStore, token: Option<&str>) -> AdminCheck {
    let Some(session) = token.and_then(|t| auth.get_session(t)) else {
        return AdminCheck::Denied(DenyReason::NoSession);
    };

    let reason = match session.email.as_deref() {
        None => DenyReason::NoEmail,
        Some(email) => {
            let filter = Filter::eq("email", normalize_email(email));
            match store.read_rows(Table::Admins, Some(&filter)) {
                Ok(rows) if !rows.is_empty() => return AdminCheck::Granted(session),
                Ok(_) => DenyReason::NotAnAdmin,
                Err(e) => {
                    log!("auth"; "admin lookup failed: {e}");
                    DenyReason::LookupFailed
                }
            }
        }
    };

    auth.sign_out(&session.token);
    log!("auth"; "denied {} ({reason:?}), signed out", session.email.as_deref().unwrap_or("<no email>"));
    AdminCheck::Denied(reason)
}

/// List `email` in the `admins` table.
pub fn add_admin(store: &dyn DataStore, email: &str) -> Result<(), StoreError> {
    let mut row = Row::new();
    row.insert("email".into(), Value::from(normalize_email(email)));
    store.upsert_row(Table::Admins, row, "email")
}
