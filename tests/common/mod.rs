#![allow(dead_code)]

use gtauto::domain::entity::{Entity, Model};
use gtauto::domain::error::GtaError;
use gtauto::domain::identity::{Environment, Identity};
use gtauto::domain::models::{Company, DatafeedSrc, Exchange, Security};
use gtauto::domain::orm::Orm;
use gtauto::domain::schema::SchemaRegistry;
use gtauto::domain::sql_enum::{Currency, Market};
use gtauto::domain::value::Value;
use gtauto::ports::database_port::{Cursor, Database, Dialect};
use gtauto::ports::resource_port::{ConnectionState, Resource};
use std::fs;
use std::sync::Mutex;
use tempfile::TempDir;

/// Delegating database that records every statement it is asked to run.
pub struct RecordingDb<D> {
    pub inner: D,
    statements: Mutex<Vec<String>>,
}

impl<D: Database> RecordingDb<D> {
    pub fn new(inner: D) -> Self {
        Self {
            inner,
            statements: Mutex::new(Vec::new()),
        }
    }

    pub fn statements(&self) -> Vec<String> {
        self.statements.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.statements.lock().unwrap().len()
    }

    pub fn clear(&self) {
        self.statements.lock().unwrap().clear();
    }
}

impl<D: Database> Resource for RecordingDb<D> {
    fn identity(&self) -> &Identity {
        self.inner.identity()
    }

    fn provider_names(&self) -> &'static [&'static str] {
        self.inner.provider_names()
    }

    fn connect(&self) -> Result<ConnectionState, GtaError> {
        self.inner.connect()
    }

    fn is_connected(&self) -> bool {
        self.inner.is_connected()
    }
}

impl<D: Database> Database for RecordingDb<D> {
    fn dialect(&self) -> &dyn Dialect {
        self.inner.dialect()
    }

    fn execute(&self, sql: &str, params: &[Value]) -> Result<Cursor, GtaError> {
        self.statements.lock().unwrap().push(sql.to_string());
        self.inner.execute(sql, params)
    }
}

/// Config directory with the given file contents; empty strings are skipped.
pub fn conf_dir(databases: &str, apics: &str, secrets: &str) -> TempDir {
    let dir = TempDir::new().unwrap();
    for (name, content) in [
        ("databases.conf", databases),
        ("apics.conf", apics),
        (".secrets.conf", secrets),
    ] {
        if !content.is_empty() {
            fs::write(dir.path().join(name), content).unwrap();
        }
    }
    dir
}

pub fn test_identity(id: &str) -> Identity {
    Identity::database(id, Environment::Test)
}

/// In-memory SQLite database with every standard table created.
#[cfg(feature = "sqlite")]
pub fn memory_db() -> gtauto::adapters::sqlite_adapter::SqliteDatabase {
    let db = gtauto::adapters::sqlite_adapter::SqliteDatabase::in_memory(test_identity("mem"));
    let schemas = SchemaRegistry::standard().unwrap();
    Orm::new(&db).create_schemas(&schemas).unwrap();
    db
}

fn id_of(entity: &Entity) -> i64 {
    entity.get("id").and_then(Value::as_i64).unwrap()
}

pub fn add_datafeed(db: &dyn Database, config_parser: &str) -> i64 {
    let mut src = DatafeedSrc::new_entity()
        .with("config_parser", config_parser)
        .unwrap();
    src.create(db).unwrap();
    id_of(&src)
}

pub fn add_exchange(db: &dyn Database, src: i64, name: &str) -> i64 {
    let mut exchange = Exchange::new_entity()
        .with("name", name)
        .unwrap()
        .with("acronym", name)
        .unwrap()
        .with("datafeed_src_id", src)
        .unwrap();
    exchange.create(db).unwrap();
    id_of(&exchange)
}

pub fn add_company(db: &dyn Database, src: i64, name: &str) -> i64 {
    let mut company = Company::new_entity()
        .with("name", name)
        .unwrap()
        .with("datafeed_src_id", src)
        .unwrap();
    company.create(db).unwrap();
    id_of(&company)
}

pub fn add_security(
    db: &dyn Database,
    src: i64,
    exchange: i64,
    company: i64,
    ticker: &str,
    market: Market,
) -> i64 {
    let mut security = Security::new_entity()
        .with("exchange_id", exchange)
        .unwrap()
        .with("ticker", ticker)
        .unwrap()
        .with("market", market)
        .unwrap()
        .with("name", ticker)
        .unwrap()
        .with("company_id", company)
        .unwrap()
        .with("currency", Currency::Usd)
        .unwrap()
        .with("datafeed_src_id", src)
        .unwrap();
    security.create(db).unwrap();
    id_of(&security)
}

/// One datafeed, exchange and company to hang securities off.
pub struct Fixture {
    pub src: i64,
    pub exchange: i64,
    pub company: i64,
}

pub fn fixture(db: &dyn Database) -> Fixture {
    let src = add_datafeed(db, "test feed");
    Fixture {
        src,
        exchange: add_exchange(db, src, "NYSE"),
        company: add_company(db, src, "Acme"),
    }
}
