//! PostgreSQL database handle and dialect.

use crate::domain::error::GtaError;
use crate::domain::identity::Identity;
use crate::domain::schema::{ColumnSpec, DataType};
use crate::domain::sql_enum::EnumType;
use crate::domain::value::Value;
use crate::ports::config_port::ConfigParams;
use crate::ports::database_port::{Cursor, Database, Dialect};
use crate::ports::resource_port::{ConnectionState, Resource};
use bytes::BytesMut;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use postgres::error::SqlState;
use postgres::types::{to_sql_checked, IsNull, ToSql, Type};
use postgres::{Client, Config, NoTls, Row};
use std::error::Error;
use std::sync::{Mutex, MutexGuard, PoisonError};

pub const PROVIDER_NAMES: &[&str] = &["postgres", "postgresql"];

/// Database used for server-level commands such as CREATE DATABASE.
const MAINTENANCE_DB: &str = "postgres";

pub struct PostgresDialect {
    schema: String,
}

impl PostgresDialect {
    pub fn new(schema: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
        }
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    fn enum_name(&self, enum_type: &EnumType) -> String {
        format!("{}.{}", self.schema, enum_type.name)
    }
}

impl Dialect for PostgresDialect {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn placeholder(&self, index: usize) -> String {
        format!("${index}")
    }

    fn bind(&self, index: usize, column: &ColumnSpec) -> String {
        match column.enum_type() {
            Some(enum_type) => format!("${index}::text::{}", self.enum_name(enum_type)),
            None => self.placeholder(index),
        }
    }

    fn select_expr(&self, column: &ColumnSpec) -> String {
        match column.enum_type() {
            Some(_) => format!("{0}::text AS {0}", column.name),
            None => column.name.to_string(),
        }
    }

    fn qualify(&self, table: &str) -> String {
        format!("{}.{table}", self.schema)
    }

    fn column_type(&self, column: &ColumnSpec) -> String {
        match column.data_type {
            DataType::Integer => "integer".into(),
            DataType::BigInt => "bigint".into(),
            DataType::Boolean => "boolean".into(),
            DataType::Double => "double precision".into(),
            DataType::Text => "text".into(),
            DataType::VarChar(n) => format!("varchar({n})"),
            DataType::Date => "date".into(),
            DataType::Timestamp => "timestamptz".into(),
            DataType::Enum(enum_type) => self.enum_name(enum_type),
        }
    }

    fn identity_column(&self, column: &ColumnSpec) -> String {
        format!(
            "{} GENERATED ALWAYS AS IDENTITY PRIMARY KEY",
            self.column_type(column)
        )
    }

    fn create_namespace(&self) -> Option<String> {
        Some(format!("CREATE SCHEMA IF NOT EXISTS {}", self.schema))
    }

    fn create_enum_type(&self, enum_type: &EnumType) -> Option<String> {
        let members: Vec<String> = enum_type
            .members
            .iter()
            .map(|m| format!("'{}'", m.replace('\'', "''")))
            .collect();
        Some(format!(
            "DO $$ BEGIN \
                IF NOT EXISTS ( \
                    SELECT 1 FROM pg_type t \
                    LEFT JOIN pg_namespace p ON t.typnamespace = p.oid \
                    WHERE t.typname = '{name}' AND p.nspname = '{schema}' \
                ) THEN \
                    CREATE TYPE {qualified} AS ENUM ({members}); \
                END IF; \
            END $$",
            name = enum_type.name,
            schema = self.schema,
            qualified = self.enum_name(enum_type),
            members = members.join(", "),
        ))
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[derive(Debug, Clone)]
struct ConnSettings {
    host: String,
    port: u16,
    database: String,
    user: Option<String>,
    password: Option<String>,
}

impl ConnSettings {
    fn config(&self, database: &str) -> Config {
        let mut config = Config::new();
        config.host(&self.host).port(self.port).dbname(database);
        if let Some(user) = &self.user {
            config.user(user);
        }
        if let Some(password) = &self.password {
            config.password(password);
        }
        config
    }

    fn connect(&self, database: &str) -> Result<Client, GtaError> {
        self.config(database)
            .connect(NoTls)
            .map_err(|e| GtaError::Connection {
                reason: format!("{}:{}/{database}: {e}", self.host, self.port),
            })
    }
}

pub struct PostgresDatabase {
    identity: Identity,
    settings: ConnSettings,
    dialect: PostgresDialect,
    client: Mutex<Option<Client>>,
}

impl PostgresDatabase {
    /// Keys: `host url`, `port` (5432), `database`, `username`, `password`,
    /// `schema` (public).
    pub fn from_config(identity: Identity, mut params: ConfigParams) -> Result<Self, GtaError> {
        let host = params.require_string("host url")?;
        let port = params.take_int("port", 5432)?;
        let port = u16::try_from(port).map_err(|e| GtaError::ConfigInvalid {
            section: params.section().to_string(),
            key: "port".into(),
            reason: e.to_string(),
        })?;
        let database = params.require_string("database")?;
        let user = params.take_string("username");
        let password = params.take_string("password");
        let schema = params
            .take_string("schema")
            .unwrap_or_else(|| "public".to_string());
        if !is_identifier(&schema) {
            return Err(GtaError::ConfigInvalid {
                section: params.section().to_string(),
                key: "schema".into(),
                reason: format!("`{schema}` is not a plain identifier"),
            });
        }
        params.finish("PostgresDatabase");
        Ok(Self {
            identity,
            settings: ConnSettings {
                host,
                port,
                database,
                user,
                password,
            },
            dialect: PostgresDialect::new(schema),
            client: Mutex::new(None),
        })
    }

    pub fn database_name(&self) -> &str {
        &self.settings.database
    }

    fn lock(&self) -> MutexGuard<'_, Option<Client>> {
        self.client.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn with_client<T>(
        &self,
        f: impl FnOnce(&mut Client) -> Result<T, GtaError>,
    ) -> Result<T, GtaError> {
        let mut guard = self.lock();
        if guard.is_none() {
            let client = self.settings.connect(&self.settings.database)?;
            tracing::info!(identity = %self.identity, host = %self.settings.host, "postgres connected");
            *guard = Some(client);
        }
        match guard.as_mut() {
            Some(client) => f(client),
            None => Err(GtaError::Connection {
                reason: format!("{} is not connected", self.identity),
            }),
        }
    }

    /// Create this handle's database unless it already exists. Returns
    /// whether it was created.
    pub fn create_db(&self) -> Result<bool, GtaError> {
        if self.settings.connect(&self.settings.database).is_ok() {
            tracing::info!(database = %self.settings.database, "database already exists");
            return Ok(false);
        }
        let mut admin = self.settings.connect(MAINTENANCE_DB)?;
        admin
            .batch_execute(&format!(
                "CREATE DATABASE {}",
                quote_ident(&self.settings.database)
            ))
            .map_err(map_pg_error)?;
        tracing::info!(database = %self.settings.database, "database created");
        Ok(true)
    }

    /// Drop this handle's database. Closes the handle's own connection first.
    pub fn drop_db(&self) -> Result<(), GtaError> {
        tracing::warn!(database = %self.settings.database, "dropping database");
        self.lock().take();
        let mut admin = self.settings.connect(MAINTENANCE_DB)?;
        admin
            .batch_execute(&format!(
                "DROP DATABASE IF EXISTS {}",
                quote_ident(&self.settings.database)
            ))
            .map_err(map_pg_error)
    }
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

impl Resource for PostgresDatabase {
    fn identity(&self) -> &Identity {
        &self.identity
    }

    fn provider_names(&self) -> &'static [&'static str] {
        PROVIDER_NAMES
    }

    fn connect(&self) -> Result<ConnectionState, GtaError> {
        self.with_client(|_| Ok(ConnectionState::Connected))
    }

    fn is_connected(&self) -> bool {
        self.lock().as_ref().is_some_and(|c| !c.is_closed())
    }
}

impl Database for PostgresDatabase {
    fn dialect(&self) -> &dyn Dialect {
        &self.dialect
    }

    fn execute(&self, sql: &str, params: &[Value]) -> Result<Cursor, GtaError> {
        let wrapped: Vec<PgValue<'_>> = params.iter().map(PgValue).collect();
        let refs: Vec<&(dyn ToSql + Sync)> =
            wrapped.iter().map(|p| p as &(dyn ToSql + Sync)).collect();
        self.with_client(|client| {
            let stmt = client.prepare(sql).map_err(map_pg_error)?;
            let columns: Vec<String> = stmt.columns().iter().map(|c| c.name().to_string()).collect();
            if columns.is_empty() {
                let affected = client.execute(&stmt, &refs).map_err(map_pg_error)?;
                return Ok(Cursor {
                    columns,
                    rows: Vec::new(),
                    rows_affected: affected,
                });
            }
            let rows = client
                .query(&stmt, &refs)
                .map_err(map_pg_error)?
                .iter()
                .map(read_row)
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Cursor {
                columns,
                rows,
                rows_affected: 0,
            })
        })
    }
}

/// Binds a [`Value`] to whatever parameter type the server inferred.
#[derive(Debug)]
struct PgValue<'a>(&'a Value);

impl ToSql for PgValue<'_> {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> Result<IsNull, Box<dyn Error + Sync + Send>> {
        match self.0 {
            Value::Null => Ok(IsNull::Yes),
            Value::Bool(b) => b.to_sql(ty, out),
            Value::Int(i) => {
                if *ty == Type::INT2 {
                    i16::try_from(*i)?.to_sql(ty, out)
                } else if *ty == Type::INT4 {
                    i32::try_from(*i)?.to_sql(ty, out)
                } else if *ty == Type::FLOAT8 {
                    (*i as f64).to_sql(ty, out)
                } else {
                    i.to_sql(ty, out)
                }
            }
            Value::Float(f) => {
                if *ty == Type::FLOAT4 {
                    (*f as f32).to_sql(ty, out)
                } else {
                    f.to_sql(ty, out)
                }
            }
            Value::Text(s) => s.as_str().to_sql(ty, out),
            Value::Date(d) => d.to_sql(ty, out),
            Value::Timestamp(ts) => ts.to_sql(ty, out),
            Value::Enum(member) => member.stored().to_sql(ty, out),
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    to_sql_checked!();
}

fn read_row(row: &Row) -> Result<Vec<Value>, GtaError> {
    row.columns()
        .iter()
        .enumerate()
        .map(|(i, column)| read_column(row, i, column.type_()))
        .collect()
}

fn read_column(row: &Row, i: usize, ty: &Type) -> Result<Value, GtaError> {
    let value = if *ty == Type::BOOL {
        row.try_get::<_, Option<bool>>(i).map(|v| v.map(Value::Bool))
    } else if *ty == Type::INT2 {
        row.try_get::<_, Option<i16>>(i).map(|v| v.map(|n| Value::Int(n.into())))
    } else if *ty == Type::INT4 {
        row.try_get::<_, Option<i32>>(i).map(|v| v.map(|n| Value::Int(n.into())))
    } else if *ty == Type::INT8 {
        row.try_get::<_, Option<i64>>(i).map(|v| v.map(Value::Int))
    } else if *ty == Type::FLOAT4 {
        row.try_get::<_, Option<f32>>(i).map(|v| v.map(|n| Value::Float(n.into())))
    } else if *ty == Type::FLOAT8 {
        row.try_get::<_, Option<f64>>(i).map(|v| v.map(Value::Float))
    } else if [Type::TEXT, Type::VARCHAR, Type::BPCHAR, Type::NAME].contains(ty) {
        row.try_get::<_, Option<String>>(i).map(|v| v.map(Value::Text))
    } else if *ty == Type::DATE {
        row.try_get::<_, Option<NaiveDate>>(i).map(|v| v.map(Value::Date))
    } else if *ty == Type::TIMESTAMPTZ {
        row.try_get::<_, Option<DateTime<Utc>>>(i).map(|v| v.map(Value::Timestamp))
    } else if *ty == Type::TIMESTAMP {
        row.try_get::<_, Option<NaiveDateTime>>(i)
            .map(|v| v.map(|ts| Value::Timestamp(ts.and_utc())))
    } else {
        return Err(GtaError::DatabaseQuery {
            reason: format!("unsupported column type {ty} at position {i}"),
        });
    };
    value
        .map(|v| v.unwrap_or(Value::Null))
        .map_err(map_pg_error)
}

/// Server message, then detail and constraint name when the server sent them.
fn describe_db_error(message: &str, detail: Option<&str>, constraint: Option<&str>) -> String {
    let mut reason = message.to_string();
    if let Some(detail) = detail {
        reason.push_str(": ");
        reason.push_str(detail);
    }
    if let Some(constraint) = constraint {
        reason.push_str(&format!(" (constraint {constraint})"));
    }
    reason
}

fn map_pg_error(e: postgres::Error) -> GtaError {
    let reason = match e.as_db_error() {
        Some(db) => describe_db_error(db.message(), db.detail(), db.constraint()),
        None => e.to_string(),
    };
    match e.code() {
        Some(code) if *code == SqlState::UNIQUE_VIOLATION => GtaError::DuplicateKey { reason },
        Some(code)
            if *code == SqlState::FOREIGN_KEY_VIOLATION
                || *code == SqlState::NOT_NULL_VIOLATION
                || *code == SqlState::CHECK_VIOLATION
                || *code == SqlState::EXCLUSION_VIOLATION =>
        {
            GtaError::ConstraintViolation { reason }
        }
        _ if e.is_closed() => GtaError::Connection { reason },
        _ => GtaError::DatabaseQuery { reason },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::identity::Environment;
    use crate::domain::sql_enum::MARKET;

    fn params() -> ConfigParams {
        ConfigParams::new("main")
            .with("host url", "localhost")
            .with("database", "gta_test")
    }

    #[test]
    fn from_config_defaults() {
        let db = PostgresDatabase::from_config(
            Identity::database("main", Environment::Test),
            params(),
        )
        .unwrap();
        assert_eq!(db.settings.port, 5432);
        assert_eq!(db.dialect.schema(), "public");
        assert_eq!(db.database_name(), "gta_test");
        assert!(!db.is_connected());
    }

    #[test]
    fn from_config_rejects_bad_values() {
        let identity = Identity::database("main", Environment::Test);
        assert!(matches!(
            PostgresDatabase::from_config(identity.clone(), params().with("port", "99999")),
            Err(GtaError::ConfigInvalid { .. })
        ));
        assert!(matches!(
            PostgresDatabase::from_config(identity.clone(), params().with("schema", "x; drop")),
            Err(GtaError::ConfigInvalid { .. })
        ));
        assert!(matches!(
            PostgresDatabase::from_config(identity, ConfigParams::new("main")),
            Err(GtaError::ConfigMissing { .. })
        ));
    }

    #[test]
    fn server_errors_keep_message_detail_and_constraint() {
        assert_eq!(
            describe_db_error(
                "duplicate key value violates unique constraint \"exchange_name_key\"",
                Some("Key (name)=(ASX) already exists."),
                Some("exchange_name_key"),
            ),
            "duplicate key value violates unique constraint \"exchange_name_key\": \
             Key (name)=(ASX) already exists. (constraint exchange_name_key)"
        );
        assert_eq!(describe_db_error("syntax error", None, None), "syntax error");
    }

    #[test]
    fn dialect_casts_enums() {
        let d = PostgresDialect::new("gta");
        let market = ColumnSpec::new("market", DataType::Enum(&MARKET));
        let name = ColumnSpec::new("name", DataType::Text);
        assert_eq!(d.bind(2, &market), "$2::text::gta.market");
        assert_eq!(d.bind(2, &name), "$2");
        assert_eq!(d.select_expr(&market), "market::text AS market");
        assert_eq!(d.qualify("security"), "gta.security");
        assert_eq!(d.column_type(&market), "gta.market");
    }

    #[test]
    fn dialect_ddl() {
        let d = PostgresDialect::new("public");
        let id = ColumnSpec::identity("id", DataType::BigInt);
        assert_eq!(
            d.identity_column(&id),
            "bigint GENERATED ALWAYS AS IDENTITY PRIMARY KEY"
        );
        let ddl = d.create_enum_type(&MARKET).unwrap();
        assert!(ddl.starts_with("DO $$ BEGIN"));
        assert!(ddl.contains("t.typname = 'market' AND p.nspname = 'public'"));
        assert!(ddl.contains("CREATE TYPE public.market AS ENUM ('crypto', 'forex', 'futures', 'stock')"));
        assert_eq!(
            d.create_namespace().unwrap(),
            "CREATE SCHEMA IF NOT EXISTS public"
        );
    }

    #[test]
    fn identifiers() {
        assert!(is_identifier("public"));
        assert!(is_identifier("_x1"));
        assert!(!is_identifier("1x"));
        assert!(!is_identifier(""));
        assert_eq!(quote_ident("a\"b"), "\"a\"\"b\"");
    }
}
