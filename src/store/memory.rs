//! In-memory store, used by `leadsite serve --memory` and tests.

use super::{DataStore, Filter, Row, StoreError, Table};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use serde_json::Value;

#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<FxHashMap<Table, Vec<Row>>>,
    next_id: RwLock<i64>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rows currently in `table`.
    #[cfg(test)]
    pub fn len(&self, table: Table) -> usize {
        self.tables.read().get(&table).map_or(0, Vec::len)
    }
}

impl DataStore for MemoryStore {
    fn read_rows(&self, table: Table, filter: Option<&Filter>) -> Result<Vec<Row>, StoreError> {
        if let Some(filter) = filter {
            table.column(&filter.column)?;
        }
        let tables = self.tables.read();
        Ok(tables
            .get(&table)
            .map(|rows| {
                rows.iter()
                    .filter(|row| filter.is_none_or(|f| f.matches(row)))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn upsert_row(&self, table: Table, row: Row, conflict_key: &str) -> Result<(), StoreError> {
        table.check_row(&row)?;
        let key = table.column(conflict_key)?;
        let value = row
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::MissingColumn {
                table,
                column: key.to_owned(),
            })?;

        let mut tables = self.tables.write();
        let rows = tables.entry(table).or_default();
        match rows.iter_mut().find(|r| r.get(key) == Some(&value)) {
            Some(existing) => *existing = row,
            None => rows.push(row),
        }
        Ok(())
    }

    fn insert_row(&self, table: Table, mut row: Row) -> Result<(), StoreError> {
        table.check_row(&row)?;
        if let Some(key) = table.generated_key() {
            let mut next_id = self.next_id.write();
            *next_id += 1;
            row.insert(key.to_owned(), Value::from(*next_id));
        }
        self.tables.write().entry(table).or_default().push(row);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> Row {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_upsert_overwrites_by_key() {
        let store = MemoryStore::new();
        store
            .upsert_row(Table::Content, row(json!({"section": "home", "data": {"a": "1"}})), "section")
            .unwrap();
        store
            .upsert_row(Table::Content, row(json!({"section": "home", "data": {"a": "2"}})), "section")
            .unwrap();
        store
            .upsert_row(Table::Content, row(json!({"section": "contact", "data": {}})), "section")
            .unwrap();

        assert_eq!(store.len(Table::Content), 2);
        let home = store
            .read_rows(Table::Content, Some(&Filter::eq("section", "home")))
            .unwrap();
        assert_eq!(home[0]["data"], json!({"a": "2"}));
    }

    #[test]
    fn test_upsert_requires_conflict_column() {
        let store = MemoryStore::new();
        let err = store
            .upsert_row(Table::Content, row(json!({"data": {}})), "section")
            .unwrap_err();
        assert!(matches!(err, StoreError::MissingColumn { .. }));
    }

    #[test]
    fn test_insert_assigns_ids() {
        let store = MemoryStore::new();
        for name in ["a", "b"] {
            store
                .insert_row(Table::ContactSubmissions, row(json!({"name": name})))
                .unwrap();
        }
        let rows = store.read_rows(Table::ContactSubmissions, None).unwrap();
        assert_eq!(rows[0]["id"], json!(1));
        assert_eq!(rows[1]["id"], json!(2));
    }

    #[test]
    fn test_read_rejects_unknown_filter_column() {
        let store = MemoryStore::new();
        assert!(store
            .read_rows(Table::Admins, Some(&Filter::eq("role", "x")))
            .is_err());
    }
}
