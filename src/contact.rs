//! Contact form intake.
//!
//! Submissions are insert-only: the site never reads them back, the admin
//! panel only lists them.

use crate::store::{DataStore, Row, StoreError, Table};
use chrono::{SecondsFormat, Utc};
use regex::Regex;
use serde_json::Value;
use std::{fmt, str::FromStr, sync::LazyLock};
use thiserror::Error;

/// Choices offered for `specialty_interest`.
pub const SPECIALTY_OPTIONS: &[&str] = &[
    "Cardiology",
    "Orthopedics",
    "Neurology",
    "Pediatrics",
    "General Practice",
    "Other",
];

pub const SUCCESS_MESSAGE: &str = "Thank you! Your message has been saved.";

static EMAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap());

#[derive(Debug, Error)]
pub enum ContactError {
    #[error("Please enter your {0}")]
    Missing(&'static str),

    #[error("Please enter a valid email address")]
    InvalidEmail,

    #[error("Unknown specialty `{0}`")]
    UnknownSpecialty(String),

    #[error("Could not save your message, please try again")]
    Store(#[from] StoreError),
}

/// Review state of a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubmissionStatus {
    #[default]
    New,
    Read,
    Responded,
    Archived,
}

impl SubmissionStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Read => "read",
            Self::Responded => "responded",
            Self::Archived => "archived",
        }
    }
}

impl fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubmissionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new" => Ok(Self::New),
            "read" => Ok(Self::Read),
            "responded" => Ok(Self::Responded),
            "archived" => Ok(Self::Archived),
            other => Err(format!("unknown submission status `{other}`")),
        }
    }
}

/// Raw form values, as typed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContactForm {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub specialty_interest: String,
    pub message: String,
}

impl ContactForm {
    /// Build from decoded `key=value` pairs, ignoring unknown keys.
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let mut form = Self::default();
        for (key, value) in pairs {
            let slot = match key {
                "name" => &mut form.name,
                "email" => &mut form.email,
                "phone" => &mut form.phone,
                "specialty_interest" => &mut form.specialty_interest,
                "message" => &mut form.message,
                _ => continue,
            };
            *slot = value.to_owned();
        }
        form
    }

    pub fn validate(&self) -> Result<(), ContactError> {
        if self.name.trim().is_empty() {
            return Err(ContactError::Missing("name"));
        }
        if self.email.trim().is_empty() {
            return Err(ContactError::Missing("email"));
        }
        if !EMAIL.is_match(self.email.trim()) {
            return Err(ContactError::InvalidEmail);
        }
        let specialty = self.specialty_interest.trim();
        if !specialty.is_empty() && !SPECIALTY_OPTIONS.contains(&specialty) {
            return Err(ContactError::UnknownSpecialty(specialty.to_owned()));
        }
        if self.message.trim().is_empty() {
            return Err(ContactError::Missing("message"));
        }
        Ok(())
    }

    fn to_row(&self) -> Row {
        let now = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        let mut row = Row::new();
        row.insert("name".into(), Value::from(self.name.trim()));
        row.insert("email".into(), Value::from(self.email.trim()));
        row.insert("phone".into(), optional(&self.phone));
        row.insert("specialty_interest".into(), optional(&self.specialty_interest));
        row.insert("message".into(), Value::from(self.message.trim()));
        row.insert("status".into(), Value::from(SubmissionStatus::New.as_str()));
        row.insert("admin_notes".into(), Value::Null);
        row.insert("created_at".into(), Value::from(now.clone()));
        row.insert("updated_at".into(), Value::from(now));
        row
    }
}

fn optional(value: &str) -> Value {
    match value.trim() {
        "" => Value::Null,
        v => Value::from(v),
    }
}

/// Validate and store a submission.
pub fn submit(store: &dyn DataStore, form: &ContactForm) -> Result<(), ContactError> {
    form.validate()?;
    store.insert_row(Table::ContactSubmissions, form.to_row())?;
    Ok(())
}
