//! Relational data store capability.
//!
//! Rows are JSON objects keyed by column name. Every table declares its
//! columns up front, and a row naming any other column is rejected before it
//! reaches a backend.
//!
//! | Table | Key | Written by |
//! |-------|-----|------------|
//! | `content` | `section` | content editing (upsert) |
//! | `contact_submissions` | `id` | contact form (insert) |
//! | `admins` | `email` | `leadsite admin add` |
//! | `auth_users` | `email` | local auth provider |

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

/// One row: column name → value.
pub type Row = Map<String, Value>;

/// Store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error")]
    Sqlite(#[from] rusqlite::Error),

    #[error("malformed json in `{table}.{column}`")]
    Json {
        table: Table,
        column: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("`{table}` has no column `{column}`")]
    UnknownColumn { table: Table, column: String },

    #[error("row for `{table}` is missing `{column}`")]
    MissingColumn { table: Table, column: String },

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Known tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Content,
    ContactSubmissions,
    Admins,
    AuthUsers,
}

impl Table {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Content => "content",
            Self::ContactSubmissions => "contact_submissions",
            Self::Admins => "admins",
            Self::AuthUsers => "auth_users",
        }
    }

    pub const fn columns(self) -> &'static [&'static str] {
        match self {
            Self::Content => &["section", "data", "updated_at"],
            Self::ContactSubmissions => &[
                "id",
                "name",
                "email",
                "phone",
                "specialty_interest",
                "message",
                "status",
                "admin_notes",
                "created_at",
                "updated_at",
            ],
            Self::Admins => &["email"],
            Self::AuthUsers => &["email", "salt", "password_hash"],
        }
    }

    /// Columns holding a JSON document rather than a scalar.
    pub const fn json_columns(self) -> &'static [&'static str] {
        match self {
            Self::Content => &["data"],
            _ => &[],
        }
    }

    /// Column filled in by the store on insert.
    pub const fn generated_key(self) -> Option<&'static str> {
        match self {
            Self::ContactSubmissions => Some("id"),
            _ => None,
        }
    }

    /// Resolve a column name to its static spelling.
    pub fn column(self, name: &str) -> Result<&'static str, StoreError> {
        self.columns()
            .iter()
            .copied()
            .find(|c| *c == name)
            .ok_or_else(|| StoreError::UnknownColumn {
                table: self,
                column: name.to_owned(),
            })
    }

    /// Check every column of `row` against the table.
    pub fn check_row(self, row: &Row) -> Result<(), StoreError> {
        row.keys().try_for_each(|k| self.column(k).map(|_| ()))
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Equality filter on one column.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub column: String,
    pub value: Value,
}

impl Filter {
    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            column: column.into(),
            value: value.into(),
        }
    }

    pub fn matches(&self, row: &Row) -> bool {
        row.get(&self.column) == Some(&self.value)
    }
}

/// The relational store as consumed by the rest of the site.
pub trait DataStore: Send + Sync {
    /// Read every row of `table`, optionally filtered, in unspecified order.
    fn read_rows(&self, table: Table, filter: Option<&Filter>) -> Result<Vec<Row>, StoreError>;

    /// Insert `row`, or overwrite the row sharing its `conflict_key` value.
    fn upsert_row(&self, table: Table, row: Row, conflict_key: &str) -> Result<(), StoreError>;

    /// Insert a new row.
    fn insert_row(&self, table: Table, row: Row) -> Result<(), StoreError>;
}
