//! CLI command orchestration against config directories on disk.
//!
//! Tests cover:
//! - init-schema on a file-backed SQLite store (idempotent)
//! - query and query --count on a seeded store
//! - check over every configured resource
//! - database id resolution and config errors

mod common;

use common::*;
use gtauto::cli::{self, Target};
use gtauto::domain::error::GtaError;
use gtauto::domain::identity::Environment;
use std::path::Path;

fn target(dir: &Path, db: Option<&str>) -> Target {
    Target {
        conf_dir: dir.to_path_buf(),
        env: Environment::Test,
        db: db.map(String::from),
    }
}

mod config_errors {
    use super::*;

    #[test]
    fn no_database_for_env_is_lookup_error() {
        let dir = conf_dir("[main]\ndbms = sqlite\npath = :memory:\nenv = prod\n", "", "");
        let result = cli::run_init_schema(&target(dir.path(), None));
        assert!(matches!(result, Err(GtaError::ConfigLookup { .. })));
    }

    #[test]
    fn unknown_table_is_rejected() {
        let dir = conf_dir("", "", "");
        let result = cli::run_query(&target(dir.path(), None), "trades", None, false);
        assert!(matches!(result, Err(GtaError::InvalidQuery { .. })));
    }

    #[test]
    fn drop_without_confirmation_is_refused() {
        let dir = conf_dir("", "", "");
        assert!(cli::run_drop_db(&target(dir.path(), None), false).is_err());
    }

    #[test]
    fn check_reports_first_failure() {
        let apics = "[broker]\nprovider = ibkr\nenv = test\n";
        let dir = conf_dir("", apics, "");
        assert!(matches!(
            cli::run_check(&target(dir.path(), None)),
            Err(GtaError::UnsupportedProvider { .. })
        ));
    }
}

#[cfg(feature = "sqlite")]
mod sqlite_store {
    use super::*;
    use gtauto::adapters::sqlite_adapter::SqliteDatabase;
    use gtauto::domain::entity::Model;
    use gtauto::domain::models::Company;
    use gtauto::domain::query::{Query, ReturnAs};

    fn file_store() -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = conf_dir("", "", "");
        let path = dir.path().join("cli.sqlite");
        let databases = format!(
            "[store]\ndbms = sqlite\npath = {}\nenv = test\n",
            path.display()
        );
        std::fs::write(dir.path().join("databases.conf"), databases).unwrap();
        (dir, path)
    }

    #[test]
    fn init_schema_is_idempotent() {
        let (dir, path) = file_store();
        cli::run_init_schema(&target(dir.path(), None)).unwrap();
        cli::run_init_schema(&target(dir.path(), Some("store"))).unwrap();
        assert!(path.exists());

        let db = SqliteDatabase::new(test_identity("store"), path.display().to_string());
        let count = Company::query_direct(&db, &Query::new(), ReturnAs::CountOnly)
            .unwrap()
            .into_count()
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn query_reads_seeded_rows() {
        let (dir, path) = file_store();
        cli::run_init_schema(&target(dir.path(), None)).unwrap();
        {
            let db = SqliteDatabase::new(test_identity("store"), path.display().to_string());
            let src = add_datafeed(&db, "cli feed");
            add_company(&db, src, "Listed");
        }
        cli::run_query(&target(dir.path(), None), "company", Some(10), false).unwrap();
        cli::run_query(&target(dir.path(), None), "company", None, true).unwrap();
    }

    #[test]
    fn check_connects_every_resource() {
        let (dir, _) = file_store();
        std::fs::write(
            dir.path().join("apics.conf"),
            "[av]\nprovider = av\nenv = test\n",
        )
        .unwrap();
        cli::run_check(&target(dir.path(), None)).unwrap();
    }

    #[test]
    fn unknown_db_id_is_lookup_error() {
        let (dir, _) = file_store();
        let result = cli::run_init_schema(&target(dir.path(), Some("missing")));
        assert!(matches!(result, Err(GtaError::ConfigLookup { .. })));
    }
}
