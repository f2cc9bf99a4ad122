use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use rusqlite::Connection;
use tracing::debug;

use crate::error::SQLError;
use crate::traits::{Row, SQLStore, Statement, Value};

/// How long a writer waits on a locked database before giving up.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SqliteStore is a SQLStore implementation backed by rusqlite (bundled SQLite).
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create a SQLite database at the given path.
    pub fn open(path: &Path) -> Result<Self, SQLError> {
        let conn = Connection::open(path)
            .map_err(|e| SQLError::Connection(e.to_string()))?;

        // WAL for concurrent readers alongside the single writer.
        conn.execute_batch("PRAGMA journal_mode=WAL;")
            .map_err(|e| SQLError::Connection(e.to_string()))?;
        debug!("opened sqlite database at {}", path.display());

        Self::configure(conn)
    }

    /// Create an in-memory SQLite database (useful for tests).
    pub fn open_in_memory() -> Result<Self, SQLError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| SQLError::Connection(e.to_string()))?;
        Self::configure(conn)
    }

    fn configure(conn: Connection) -> Result<Self, SQLError> {
        conn.execute_batch("PRAGMA foreign_keys=ON;")
            .map_err(|e| SQLError::Connection(e.to_string()))?;
        conn.busy_timeout(BUSY_TIMEOUT)
            .map_err(|e| SQLError::Connection(e.to_string()))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

/// Convert our Value enum to rusqlite's ToSql.
fn bind_params(params: &[Value]) -> Vec<Box<dyn rusqlite::types::ToSql + '_>> {
    params
        .iter()
        .map(|v| -> Box<dyn rusqlite::types::ToSql + '_> {
            match v {
                Value::Null => Box::new(rusqlite::types::Null),
                Value::Integer(i) => Box::new(*i),
                Value::Real(f) => Box::new(*f),
                Value::Text(s) => Box::new(s.as_str()),
                Value::Blob(b) => Box::new(b.as_slice()),
            }
        })
        .collect()
}

/// Classify a write failure so callers can tell constraint violations apart.
fn write_error(e: rusqlite::Error) -> SQLError {
    match e.sqlite_error_code() {
        Some(rusqlite::ErrorCode::ConstraintViolation) => SQLError::Constraint(e.to_string()),
        _ => SQLError::Execution(e.to_string()),
    }
}

impl SQLStore for SqliteStore {
    fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>, SQLError> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| SQLError::Query(e.to_string()))?;

        let bound = bind_params(params);
        let param_refs: Vec<&dyn rusqlite::types::ToSql> =
            bound.iter().map(|b| b.as_ref()).collect();

        let mut stmt = conn
            .prepare(sql)
            .map_err(|e| SQLError::Query(e.to_string()))?;

        let column_names: Vec<String> = stmt
            .column_names()
            .iter()
            .map(|s| s.to_string())
            .collect();

        let rows = stmt
            .query_map(param_refs.as_slice(), |row| {
                let mut columns = Vec::with_capacity(column_names.len());
                for (i, name) in column_names.iter().enumerate() {
                    columns.push((name.clone(), row_value_at(row, i)));
                }
                Ok(Row { columns })
            })
            .map_err(write_error)?;

        let mut result = Vec::new();
        for row in rows {
            result.push(row.map_err(write_error)?);
        }
        Ok(result)
    }

    fn exec(&self, sql: &str, params: &[Value]) -> Result<u64, SQLError> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| SQLError::Execution(e.to_string()))?;

        let bound = bind_params(params);
        let param_refs: Vec<&dyn rusqlite::types::ToSql> =
            bound.iter().map(|b| b.as_ref()).collect();

        let affected = conn
            .execute(sql, param_refs.as_slice())
            .map_err(write_error)?;

        Ok(affected as u64)
    }

    fn exec_batch(&self, sql: &str) -> Result<(), SQLError> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| SQLError::Execution(e.to_string()))?;
        conn.execute_batch(sql).map_err(write_error)
    }

    fn transaction(&self, statements: &[Statement]) -> Result<Vec<u64>, SQLError> {
        let mut conn = self
            .conn
            .lock()
            .map_err(|e| SQLError::Execution(e.to_string()))?;

        // Dropping an uncommitted transaction rolls it back.
        let tx = conn.transaction().map_err(write_error)?;
        let mut affected = Vec::with_capacity(statements.len());
        for statement in statements {
            let bound = bind_params(&statement.params);
            let param_refs: Vec<&dyn rusqlite::types::ToSql> =
                bound.iter().map(|b| b.as_ref()).collect();
            let n = tx
                .execute(&statement.sql, param_refs.as_slice())
                .map_err(write_error)?;
            affected.push(n as u64);
        }
        tx.commit().map_err(write_error)?;
        Ok(affected)
    }
}

/// Extract a Value from a rusqlite row at a given column index.
fn row_value_at(row: &rusqlite::Row, idx: usize) -> Value {
    use rusqlite::types::ValueRef;

    match row.get_ref(idx) {
        Ok(ValueRef::Integer(i)) => Value::Integer(i),
        Ok(ValueRef::Real(f)) => Value::Real(f),
        Ok(ValueRef::Text(t)) => Value::Text(String::from_utf8_lossy(t).into_owned()),
        Ok(ValueRef::Blob(b)) => Value::Blob(b.to_vec()),
        Ok(ValueRef::Null) | Err(_) => Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with_table() -> SqliteStore {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .exec_batch(
                "CREATE TABLE items (id TEXT PRIMARY KEY, code TEXT NOT NULL UNIQUE, qty INTEGER);
                 CREATE TABLE counters (name TEXT PRIMARY KEY, value INTEGER NOT NULL);",
            )
            .unwrap();
        store
    }

    #[test]
    fn exec_and_query() {
        let store = store_with_table();
        store
            .exec(
                "INSERT INTO items (id, code, qty) VALUES (?1, ?2, ?3)",
                &["a".into(), "A-1".into(), Value::Integer(3)],
            )
            .unwrap();

        let rows = store
            .query("SELECT id, code, qty FROM items WHERE id = ?1", &["a".into()])
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get_str("code"), Some("A-1"));
        assert_eq!(rows[0].get_i64("qty"), Some(3));
    }

    #[test]
    fn text_that_looks_numeric_stays_text() {
        let store = store_with_table();
        store
            .exec(
                "INSERT INTO items (id, code) VALUES (?1, ?2)",
                &["b".into(), "0042".into()],
            )
            .unwrap();
        let rows = store.query("SELECT code, qty FROM items", &[]).unwrap();
        assert_eq!(rows[0].get_str("code"), Some("0042"));
        assert_eq!(rows[0].get("qty"), Some(&Value::Null));
    }

    #[test]
    fn unique_violation_is_constraint_error() {
        let store = store_with_table();
        let insert = "INSERT INTO items (id, code) VALUES (?1, ?2)";
        store.exec(insert, &["a".into(), "DUP".into()]).unwrap();
        let err = store.exec(insert, &["b".into(), "DUP".into()]).unwrap_err();
        assert_eq!(err.unique_violation(), Some("items.code"));
    }

    #[test]
    fn transaction_rolls_back_on_failure() {
        let store = store_with_table();
        store
            .exec("INSERT INTO items (id, code) VALUES ('a', 'A')", &[])
            .unwrap();

        let result = store.transaction(&[
            Statement::new("UPDATE items SET qty = 9 WHERE id = 'a'", vec![]),
            Statement::new("INSERT INTO items (id, code) VALUES ('b', 'A')", vec![]),
        ]);
        assert!(result.is_err());

        let rows = store.query("SELECT qty FROM items WHERE id = 'a'", &[]).unwrap();
        assert_eq!(rows[0].get("qty"), Some(&Value::Null));
    }

    #[test]
    fn transaction_commits_all() {
        let store = store_with_table();
        let affected = store
            .transaction(&[
                Statement::new("INSERT INTO items (id, code) VALUES (?1, ?2)", vec!["a".into(), "A".into()]),
                Statement::new("INSERT INTO items (id, code) VALUES (?1, ?2)", vec!["b".into(), "B".into()]),
            ])
            .unwrap();
        assert_eq!(affected, vec![1, 1]);
    }

    #[test]
    fn upsert_returning_counts_up() {
        let store = store_with_table();
        let next = || {
            store
                .query(
                    "INSERT INTO counters (name, value) VALUES ('n', 1) \
                     ON CONFLICT(name) DO UPDATE SET value = value + 1 RETURNING value",
                    &[],
                )
                .unwrap()[0]
                .get_i64("value")
                .unwrap()
        };
        assert_eq!(next(), 1);
        assert_eq!(next(), 2);
        assert_eq!(next(), 3);
    }

    #[test]
    fn open_file_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.sqlite");
        {
            let store = SqliteStore::open(&path).unwrap();
            store.exec_batch("CREATE TABLE t (x INTEGER)").unwrap();
            store.exec("INSERT INTO t (x) VALUES (1)", &[]).unwrap();
        }
        let store = SqliteStore::open(&path).unwrap();
        let rows = store.query("SELECT COUNT(*) AS cnt FROM t", &[]).unwrap();
        assert_eq!(rows[0].get_i64("cnt"), Some(1));
    }
}
