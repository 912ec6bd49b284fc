//! SQLite-backed store.

use super::{DataStore, Filter, Row, StoreError, Table};
use parking_lot::Mutex;
use rusqlite::{
    Connection, ToSql, params_from_iter,
    types::{ToSqlOutput, Value as SqlValue, ValueRef},
};
use serde_json::Value;
use std::path::Path;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS content (
        section     TEXT PRIMARY KEY,
        data        TEXT NOT NULL,
        updated_at  TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS contact_submissions (
        id                  INTEGER PRIMARY KEY AUTOINCREMENT,
        name                TEXT NOT NULL,
        email               TEXT NOT NULL,
        phone               TEXT,
        specialty_interest  TEXT,
        message             TEXT NOT NULL,
        status              TEXT NOT NULL DEFAULT 'new'
                            CHECK (status IN ('new', 'read', 'responded', 'archived')),
        admin_notes         TEXT,
        created_at          TEXT NOT NULL,
        updated_at          TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS admins (
        email   TEXT PRIMARY KEY
    );

    CREATE TABLE IF NOT EXISTS auth_users (
        email           TEXT PRIMARY KEY,
        salt            TEXT NOT NULL,
        password_hash   TEXT NOT NULL
    );
";

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create a database at the given path. Creates schema if needed.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        Self::with_connection(conn)
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

/// JSON value bound as a statement parameter.
///
/// Objects and arrays are stored as JSON text.
struct Param<'a>(&'a Value);

impl ToSql for Param<'_> {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self.0 {
            Value::Null => ToSqlOutput::Owned(SqlValue::Null),
            Value::Bool(b) => ToSqlOutput::Owned(SqlValue::Integer(i64::from(*b))),
            Value::Number(n) => match n.as_i64() {
                Some(i) => ToSqlOutput::Owned(SqlValue::Integer(i)),
                None => ToSqlOutput::Owned(SqlValue::Real(n.as_f64().unwrap_or_default())),
            },
            Value::String(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            other => ToSqlOutput::Owned(SqlValue::Text(other.to_string())),
        })
    }
}

fn read_value(table: Table, column: &'static str, value: ValueRef<'_>) -> Result<Value, StoreError> {
    let text = match value {
        ValueRef::Null => return Ok(Value::Null),
        ValueRef::Integer(i) => return Ok(Value::from(i)),
        ValueRef::Real(f) => return Ok(Value::from(f)),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => String::from_utf8_lossy(bytes),
    };

    if table.json_columns().contains(&column) {
        serde_json::from_str(&text).map_err(|source| StoreError::Json {
            table,
            column,
            source,
        })
    } else {
        Ok(Value::String(text.into_owned()))
    }
}

impl DataStore for SqliteStore {
    fn read_rows(&self, table: Table, filter: Option<&Filter>) -> Result<Vec<Row>, StoreError> {
        let columns = table.columns();
        let mut sql = format!("SELECT {} FROM {}", columns.join(", "), table.name());
        let mut params = Vec::new();
        if let Some(filter) = filter {
            sql.push_str(&format!(" WHERE {} = ?1", table.column(&filter.column)?));
            params.push(Param(&filter.value));
        }

        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(params.iter()))?;

        let mut result = Vec::new();
        while let Some(row) = rows.next()? {
            let mut out = Row::new();
            for (i, column) in columns.iter().enumerate() {
                out.insert((*column).to_owned(), read_value(table, column, row.get_ref(i)?)?);
            }
            result.push(out);
        }
        Ok(result)
    }

    fn upsert_row(&self, table: Table, row: Row, conflict_key: &str) -> Result<(), StoreError> {
        table.check_row(&row)?;
        let key = table.column(conflict_key)?;
        if !row.contains_key(key) {
            return Err(StoreError::MissingColumn {
                table,
                column: key.to_owned(),
            });
        }

        let columns: Vec<&str> = row.keys().map(String::as_str).collect();
        let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{i}")).collect();
        let updates: Vec<String> = columns
            .iter()
            .filter(|c| **c != key)
            .map(|c| format!("{c} = excluded.{c}"))
            .collect();
        let action = if updates.is_empty() {
            "NOTHING".to_owned()
        } else {
            format!("UPDATE SET {}", updates.join(", "))
        };
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT({key}) DO {action}",
            table.name(),
            columns.join(", "),
            placeholders.join(", "),
        );

        let params: Vec<Param> = row.values().map(Param).collect();
        self.conn.lock().execute(&sql, params_from_iter(params.iter()))?;
        Ok(())
    }

    fn insert_row(&self, table: Table, row: Row) -> Result<(), StoreError> {
        table.check_row(&row)?;
        let columns: Vec<&str> = row.keys().map(String::as_str).collect();
        let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{i}")).collect();
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            table.name(),
            columns.join(", "),
            placeholders.join(", "),
        );

        let params: Vec<Param> = row.values().map(Param).collect();
        self.conn.lock().execute(&sql, params_from_iter(params.iter()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn row(value: Value) -> Row {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_content_upsert_keeps_one_row_per_section() {
        let store = SqliteStore::open_in_memory().unwrap();
        for title in ["A", "B"] {
            store
                .upsert_row(
                    Table::Content,
                    row(json!({
                        "section": "home",
                        "data": { "hero": { "title": title } },
                        "updated_at": "2025-01-01T00:00:00Z"
                    })),
                    "section",
                )
                .unwrap();
        }

        let rows = store.read_rows(Table::Content, None).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["data"], json!({ "hero": { "title": "B" } }));
    }

    #[test]
    fn test_filtered_read() {
        let store = SqliteStore::open_in_memory().unwrap();
        for email in ["a@x.com", "b@x.com"] {
            store
                .insert_row(Table::Admins, row(json!({ "email": email })))
                .unwrap();
        }
        let rows = store
            .read_rows(Table::Admins, Some(&Filter::eq("email", "b@x.com")))
            .unwrap();
        assert_eq!(rows, vec![row(json!({ "email": "b@x.com" }))]);
    }

    #[test]
    fn test_submission_defaults_and_nulls() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .insert_row(
                Table::ContactSubmissions,
                row(json!({
                    "name": "Ann",
                    "email": "ann@x.com",
                    "phone": null,
                    "message": "hi",
                    "created_at": "2025-01-01T00:00:00Z",
                    "updated_at": "2025-01-01T00:00:00Z"
                })),
            )
            .unwrap();

        let rows = store.read_rows(Table::ContactSubmissions, None).unwrap();
        assert_eq!(rows[0]["id"], json!(1));
        assert_eq!(rows[0]["status"], json!("new"));
        assert_eq!(rows[0]["phone"], Value::Null);
        assert_eq!(rows[0]["admin_notes"], Value::Null);
    }

    #[test]
    fn test_rejects_invalid_status() {
        let store = SqliteStore::open_in_memory().unwrap();
        let result = store.insert_row(
            Table::ContactSubmissions,
            row(json!({
                "name": "Ann",
                "email": "ann@x.com",
                "message": "hi",
                "status": "deleted",
                "created_at": "now",
                "updated_at": "now"
            })),
        );
        assert!(matches!(result, Err(StoreError::Sqlite(_))));
    }

    #[test]
    fn test_malformed_json_is_reported() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .conn
            .lock()
            .execute(
                "INSERT INTO content (section, data, updated_at) VALUES ('home', '{oops', 'now')",
                [],
            )
            .unwrap();
        let err = store.read_rows(Table::Content, None).unwrap_err();
        assert!(matches!(err, StoreError::Json { column: "data", .. }));
    }

    #[test]
    fn test_reopen_keeps_rows() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("site.db");
        {
            let store = SqliteStore::open(&path).unwrap();
            store
                .insert_row(Table::Admins, row(json!({ "email": "a@x.com" })))
                .unwrap();
        }
        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.read_rows(Table::Admins, None).unwrap().len(), 1);
    }
}
