//! SQLite sessions backed by `rusqlite`.

use std::path::Path;

use parking_lot::Mutex;
use rusqlite::types::{Value, ValueRef};
use rusqlite::{params_from_iter, Connection, OpenFlags};

use super::session::{ParamType, PreparedShape, Row, Session, SqlParam};
use crate::error::{SosError, SosResult};

const STATEMENT_CACHE_CAPACITY: usize = 64;

pub struct SqliteSession {
    conn: Mutex<Connection>,
}

impl SqliteSession {
    /// Opens a read-only session on an existing database file.
    pub fn open(path: &Path) -> SosResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY
                | OpenFlags::SQLITE_OPEN_NO_MUTEX
                | OpenFlags::SQLITE_OPEN_URI,
        )
        .map_err(|e| {
            SosError::ConfigurationError(format!(
                "cannot open database '{}': {}",
                path.display(),
                e
            ))
        })?;
        Ok(Self::from_connection(conn))
    }

    pub fn from_connection(conn: Connection) -> Self {
        conn.set_prepared_statement_cache_capacity(STATEMENT_CACHE_CAPACITY);
        Self {
            conn: Mutex::new(conn),
        }
    }

    fn render(value: ValueRef<'_>) -> Option<String> {
        match value {
            ValueRef::Null => None,
            ValueRef::Integer(i) => Some(i.to_string()),
            ValueRef::Real(f) => Some(f.to_string()),
            ValueRef::Text(t) => Some(String::from_utf8_lossy(t).into_owned()),
            ValueRef::Blob(b) => Some(hex::encode(b)),
        }
    }

    fn to_value(param: &SqlParam) -> Value {
        match param {
            SqlParam::Integer(i) => Value::Integer(*i),
            SqlParam::Text(s) => Value::Text(s.clone()),
            SqlParam::Unbound => Value::Null,
        }
    }
}

impl Session for SqliteSession {
    fn prepare(&self, sql: &str) -> SosResult<PreparedShape> {
        let conn = self.conn.lock();
        let stmt = conn.prepare_cached(sql)?;
        Ok(PreparedShape {
            parameter_count: stmt.parameter_count(),
            column_count: stmt.column_count(),
        })
    }

    /// SQLite parameters carry no declared type.
    fn parameter_types(&self, _sql: &str) -> SosResult<Option<Vec<ParamType>>> {
        Ok(None)
    }

    fn query(&self, sql: &str, params: &[SqlParam]) -> SosResult<Vec<Row>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(sql)?;
        let column_count = stmt.column_count();

        let values: Vec<Value> = params.iter().map(Self::to_value).collect();
        let mut rows = stmt.query(params_from_iter(values.iter()))?;

        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let mut columns = Vec::with_capacity(column_count);
            for i in 0..column_count {
                columns.push(Self::render(row.get_ref(i)?));
            }
            out.push(columns);
        }
        Ok(out)
    }

    fn release(&self) {
        self.conn.lock().flush_prepared_statement_cache();
    }
}
