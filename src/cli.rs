//! CLI definition and dispatch.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::error::GtaError;
use crate::domain::identity::{Environment, Identity, ResourceKind};
use crate::domain::query::{Query, ReturnAs};
use crate::domain::registry::Registry;
use crate::domain::schema::SchemaRegistry;
use crate::ports::config_port::ConfigLookup;
use crate::ports::database_port::Database;

#[derive(Parser, Debug)]
#[command(name = "gtauto", about = "Trading data store toolkit")]
pub struct Cli {
    /// Log filter such as `info` or `gtauto=debug`; overrides RUST_LOG
    #[arg(long, global = true)]
    pub log_level: Option<String>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Args, Debug, Clone)]
pub struct Target {
    /// Directory holding databases.conf, apics.conf and .secrets.conf
    #[arg(long, default_value = "conf")]
    pub conf_dir: PathBuf,
    #[arg(long, default_value = "dev")]
    pub env: Environment,
    /// Database id; defaults to the first one configured for the env
    #[arg(long)]
    pub db: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create the namespace, enum types and tables if missing
    InitSchema {
        #[command(flatten)]
        target: Target,
    },
    /// Create the configured PostgreSQL database if missing
    CreateDb {
        #[command(flatten)]
        target: Target,
    },
    /// Drop the configured PostgreSQL database
    DropDb {
        #[command(flatten)]
        target: Target,
        /// Confirm the drop
        #[arg(long)]
        yes: bool,
    },
    /// Print rows of a table
    Query {
        table: String,
        #[arg(long)]
        limit: Option<u64>,
        /// Print only the number of rows
        #[arg(long)]
        count: bool,
        #[command(flatten)]
        target: Target,
    },
    /// Build and connect every configured resource for the env
    Check {
        #[command(flatten)]
        target: Target,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    let result = match cli.command {
        Command::InitSchema { target } => run_init_schema(&target),
        Command::CreateDb { target } => run_create_db(&target),
        Command::DropDb { target, yes } => run_drop_db(&target, yes),
        Command::Query {
            table,
            limit,
            count,
            target,
        } => run_query(&target, &table, limit, count),
        Command::Check { target } => run_check(&target),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::from(&e)
        }
    }
}

struct Session {
    config: Arc<FileConfigAdapter>,
    registry: Registry,
}

fn open_session(target: &Target) -> Result<Session, GtaError> {
    eprintln!("Loading config from {}", target.conf_dir.display());
    let config = Arc::new(FileConfigAdapter::from_dir(&target.conf_dir)?);
    let registry = Registry::with_default_providers(config.clone());
    Ok(Session { config, registry })
}

fn resolve_db_id(config: &dyn ConfigLookup, target: &Target) -> Result<String, GtaError> {
    if let Some(id) = &target.db {
        return Ok(id.clone());
    }
    config
        .ids(ResourceKind::Database, target.env)
        .into_iter()
        .next()
        .ok_or_else(|| GtaError::ConfigLookup {
            kind: ResourceKind::Database.to_string(),
            id: "*".into(),
            env: target.env.to_string(),
        })
}

fn open_database(target: &Target) -> Result<Arc<dyn Database>, GtaError> {
    let session = open_session(target)?;
    let id = resolve_db_id(session.config.as_ref(), target)?;
    session.registry.database(&id, target.env)
}

pub fn run_init_schema(target: &Target) -> Result<(), GtaError> {
    let db = open_database(target)?;
    let schemas = SchemaRegistry::standard()?;
    db.orm().create_schemas(&schemas)?;
    eprintln!(
        "Schema ready on {} ({} tables)",
        db.identity(),
        schemas.schemas().len()
    );
    Ok(())
}

pub fn run_query(
    target: &Target,
    table: &str,
    limit: Option<u64>,
    count: bool,
) -> Result<(), GtaError> {
    let schemas = SchemaRegistry::standard()?;
    let schema = schemas.get(table).ok_or_else(|| GtaError::InvalidQuery {
        reason: format!("unknown table `{table}`"),
    })?;
    let db = open_database(target)?;
    let mut query = Query::new();
    query.limit = limit;
    if count {
        let n = db.orm().query(schema, &query, ReturnAs::CountOnly)?.into_count()?;
        println!("{n}");
        return Ok(());
    }
    let cursor = db.orm().query(schema, &query, ReturnAs::RawRows)?.into_rows()?;
    println!("{}", cursor.columns.join("\t"));
    for row in &cursor.rows {
        let cells: Vec<String> = row.iter().map(ToString::to_string).collect();
        println!("{}", cells.join("\t"));
    }
    eprintln!("{} row(s)", cursor.rows.len());
    Ok(())
}

pub fn run_check(target: &Target) -> Result<(), GtaError> {
    let session = open_session(target)?;
    let mut failures = Vec::new();
    for kind in [ResourceKind::Database, ResourceKind::ApiClient] {
        for id in session.config.ids(kind, target.env) {
            let identity = Identity::new(kind, id, target.env);
            match session.registry.get(&identity) {
                Ok(_) => eprintln!("  ok    {identity}"),
                Err(e) => {
                    eprintln!("  FAIL  {identity}: {e}");
                    failures.push(e);
                }
            }
        }
    }
    match failures.into_iter().next() {
        Some(first) => Err(first),
        None => Ok(()),
    }
}

#[cfg(feature = "postgres")]
fn postgres_database(
    target: &Target,
) -> Result<crate::adapters::postgres_adapter::PostgresDatabase, GtaError> {
    use crate::adapters::postgres_adapter::{PostgresDatabase, PROVIDER_NAMES};

    let config = FileConfigAdapter::from_dir(&target.conf_dir)?;
    let id = resolve_db_id(&config, target)?;
    let identity = Identity::database(id, target.env);
    let mut params = config.lookup(&identity).ok_or_else(|| GtaError::ConfigLookup {
        kind: ResourceKind::Database.to_string(),
        id: identity.id().to_string(),
        env: target.env.to_string(),
    })?;
    let dbms = params.require_string(ResourceKind::Database.provider_key())?;
    if !PROVIDER_NAMES.contains(&dbms.to_lowercase().as_str()) {
        return Err(GtaError::UnsupportedProvider {
            kind: ResourceKind::Database.to_string(),
            provider: dbms,
        });
    }
    PostgresDatabase::from_config(identity, params)
}

#[cfg(feature = "postgres")]
pub fn run_create_db(target: &Target) -> Result<(), GtaError> {
    let db = postgres_database(target)?;
    if db.create_db()? {
        eprintln!("Created database {}", db.database_name());
    } else {
        eprintln!("Database {} already exists", db.database_name());
    }
    Ok(())
}

#[cfg(feature = "postgres")]
pub fn run_drop_db(target: &Target, yes: bool) -> Result<(), GtaError> {
    if !yes {
        return Err(GtaError::InvalidQuery {
            reason: "refusing to drop a database without --yes".into(),
        });
    }
    let db = postgres_database(target)?;
    db.drop_db()?;
    eprintln!("Dropped database {}", db.database_name());
    Ok(())
}

#[cfg(not(feature = "postgres"))]
pub fn run_create_db(_target: &Target) -> Result<(), GtaError> {
    Err(postgres_disabled())
}

#[cfg(not(feature = "postgres"))]
pub fn run_drop_db(_target: &Target, _yes: bool) -> Result<(), GtaError> {
    Err(postgres_disabled())
}

#[cfg(not(feature = "postgres"))]
fn postgres_disabled() -> GtaError {
    GtaError::UnsupportedProvider {
        kind: ResourceKind::Database.to_string(),
        provider: "postgres (built without the postgres feature)".into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_query_command() {
        let cli = Cli::try_parse_from([
            "gtauto", "query", "security", "--limit", "5", "--count", "--env", "test", "--db",
            "main",
        ])
        .unwrap();
        match cli.command {
            Command::Query {
                table,
                limit,
                count,
                target,
            } => {
                assert_eq!(table, "security");
                assert_eq!(limit, Some(5));
                assert!(count);
                assert_eq!(target.env, Environment::Test);
                assert_eq!(target.db.as_deref(), Some("main"));
                assert_eq!(target.conf_dir, PathBuf::from("conf"));
            }
            other => panic!("expected query, got {other:?}"),
        }
    }

    #[test]
    fn rejects_unknown_env() {
        assert!(Cli::try_parse_from(["gtauto", "check", "--env", "staging"]).is_err());
    }

    #[test]
    fn global_log_level() {
        let cli = Cli::try_parse_from(["gtauto", "init-schema", "--log-level", "debug"]).unwrap();
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
    }
}
