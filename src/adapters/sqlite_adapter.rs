//! SQLite database handle and dialect.

use crate::domain::error::GtaError;
use crate::domain::identity::Identity;
use crate::domain::schema::{ColumnSpec, DataType};
use crate::domain::value::Value;
use crate::ports::config_port::ConfigParams;
use crate::ports::database_port::{Cursor, Database, Dialect};
use crate::ports::resource_port::{ConnectionState, Resource};
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{Connection, ErrorCode};
use std::sync::{Mutex, MutexGuard, PoisonError};

pub const PROVIDER_NAMES: &[&str] = &["sqlite", "sqlite3"];

pub struct SqliteDialect;

impl Dialect for SqliteDialect {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn placeholder(&self, index: usize) -> String {
        format!("?{index}")
    }

    fn column_type(&self, column: &ColumnSpec) -> String {
        match column.data_type {
            DataType::Integer | DataType::BigInt => "INTEGER".into(),
            DataType::Boolean => "BOOLEAN".into(),
            DataType::Double => "REAL".into(),
            DataType::Text => "TEXT".into(),
            DataType::VarChar(n) => format!("VARCHAR({n})"),
            // ISO-8601 text
            DataType::Date | DataType::Timestamp => "TEXT".into(),
            DataType::Enum(enum_type) => {
                let members: Vec<String> = enum_type
                    .members
                    .iter()
                    .map(|m| format!("'{}'", m.replace('\'', "''")))
                    .collect();
                format!("TEXT CHECK ({} IN ({}))", column.name, members.join(", "))
            }
        }
    }

    fn identity_column(&self, _column: &ColumnSpec) -> String {
        "INTEGER PRIMARY KEY AUTOINCREMENT".into()
    }
}

pub struct SqliteDatabase {
    identity: Identity,
    path: String,
    conn: Mutex<Option<Connection>>,
}

impl SqliteDatabase {
    pub fn from_config(identity: Identity, mut params: ConfigParams) -> Result<Self, GtaError> {
        let path = params.require_string("path")?;
        params.finish("SqliteDatabase");
        Ok(Self::new(identity, path))
    }

    pub fn new(identity: Identity, path: impl Into<String>) -> Self {
        Self {
            identity,
            path: path.into(),
            conn: Mutex::new(None),
        }
    }

    /// Private in-memory database, gone when the handle drops.
    pub fn in_memory(identity: Identity) -> Self {
        Self::new(identity, ":memory:")
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    fn lock(&self) -> MutexGuard<'_, Option<Connection>> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn open(&self) -> Result<Connection, GtaError> {
        let conn = Connection::open(&self.path).map_err(|e| GtaError::Connection {
            reason: format!("{}: {e}", self.path),
        })?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .map_err(map_sqlite_error)?;
        tracing::info!(identity = %self.identity, path = %self.path, "sqlite database opened");
        Ok(conn)
    }

    fn with_conn<T>(
        &self,
        f: impl FnOnce(&Connection) -> Result<T, GtaError>,
    ) -> Result<T, GtaError> {
        let mut guard = self.lock();
        if guard.is_none() {
            *guard = Some(self.open()?);
        }
        match guard.as_ref() {
            Some(conn) => f(conn),
            None => Err(GtaError::Connection {
                reason: format!("{} is not connected", self.identity),
            }),
        }
    }
}

impl Resource for SqliteDatabase {
    fn identity(&self) -> &Identity {
        &self.identity
    }

    fn provider_names(&self) -> &'static [&'static str] {
        PROVIDER_NAMES
    }

    fn connect(&self) -> Result<ConnectionState, GtaError> {
        self.with_conn(|_| Ok(ConnectionState::Connected))
    }

    fn is_connected(&self) -> bool {
        self.lock().is_some()
    }
}

impl Database for SqliteDatabase {
    fn dialect(&self) -> &dyn Dialect {
        &SqliteDialect
    }

    fn execute(&self, sql: &str, params: &[Value]) -> Result<Cursor, GtaError> {
        let bound: Vec<SqlValue> = params.iter().map(to_sql_value).collect();
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(sql).map_err(map_sqlite_error)?;
            let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
            if columns.is_empty() {
                let affected = stmt
                    .execute(rusqlite::params_from_iter(bound.iter()))
                    .map_err(map_sqlite_error)?;
                return Ok(Cursor {
                    columns,
                    rows: Vec::new(),
                    rows_affected: affected as u64,
                });
            }
            let width = columns.len();
            let mut rows = stmt
                .query(rusqlite::params_from_iter(bound.iter()))
                .map_err(map_sqlite_error)?;
            let mut out = Vec::new();
            while let Some(row) = rows.next().map_err(map_sqlite_error)? {
                let mut values = Vec::with_capacity(width);
                for i in 0..width {
                    values.push(from_value_ref(row.get_ref(i).map_err(map_sqlite_error)?)?);
                }
                out.push(values);
            }
            Ok(Cursor {
                columns,
                rows: out,
                rows_affected: 0,
            })
        })
    }
}

fn to_sql_value(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Int(i) => SqlValue::Integer(*i),
        Value::Float(f) => SqlValue::Real(*f),
        Value::Text(s) => SqlValue::Text(s.clone()),
        Value::Date(d) => SqlValue::Text(d.format("%Y-%m-%d").to_string()),
        Value::Timestamp(ts) => SqlValue::Text(ts.to_rfc3339()),
        Value::Enum(member) => SqlValue::Text(member.stored().to_string()),
    }
}

fn from_value_ref(value: ValueRef<'_>) -> Result<Value, GtaError> {
    match value {
        ValueRef::Null => Ok(Value::Null),
        ValueRef::Integer(i) => Ok(Value::Int(i)),
        ValueRef::Real(f) => Ok(Value::Float(f)),
        ValueRef::Text(bytes) => std::str::from_utf8(bytes)
            .map(|s| Value::Text(s.to_string()))
            .map_err(|e| GtaError::DatabaseQuery {
                reason: e.to_string(),
            }),
        ValueRef::Blob(_) => Err(GtaError::DatabaseQuery {
            reason: "blob columns are not supported".into(),
        }),
    }
}

fn map_sqlite_error(e: rusqlite::Error) -> GtaError {
    let reason = e.to_string();
    match &e {
        rusqlite::Error::SqliteFailure(err, _) => match err.extended_code {
            rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE | rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
                GtaError::DuplicateKey { reason }
            }
            _ => match err.code {
                ErrorCode::ConstraintViolation => GtaError::ConstraintViolation { reason },
                ErrorCode::CannotOpen
                | ErrorCode::NotADatabase
                | ErrorCode::DatabaseBusy
                | ErrorCode::DatabaseLocked => GtaError::Connection { reason },
                _ => GtaError::DatabaseQuery { reason },
            },
        },
        _ => GtaError::DatabaseQuery { reason },
    }
}
