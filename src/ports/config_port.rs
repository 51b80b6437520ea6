//! Configuration lookup port.
//!
//! The core never parses files itself: a [`ConfigLookup`] maps an identity to
//! the flat key/value parameters its handle is built from.

use crate::domain::error::GtaError;
use crate::domain::identity::{Environment, Identity, ResourceKind};
use std::collections::BTreeMap;

pub trait ConfigLookup: Send + Sync {
    /// Parameters for `identity`, or `None` if no section matches.
    fn lookup(&self, identity: &Identity) -> Option<ConfigParams>;

    /// Ids of every configured resource of `kind` valid in `env`.
    fn ids(&self, kind: ResourceKind, env: Environment) -> Vec<String>;
}

/// Constructor parameters for one handle.
///
/// Accessors consume the keys they read, so whatever is left when a
/// constructor calls [`ConfigParams::finish`] was never used.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigParams {
    section: String,
    values: BTreeMap<String, String>,
}

impl ConfigParams {
    pub fn new(section: impl Into<String>) -> Self {
        Self {
            section: section.into(),
            values: BTreeMap::new(),
        }
    }

    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: &str, value: impl Into<String>) {
        self.values
            .insert(key.trim().to_lowercase(), value.into().trim().to_string());
    }

    pub fn section(&self) -> &str {
        &self.section
    }

    pub fn peek(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn take_string(&mut self, key: &str) -> Option<String> {
        self.values.remove(key)
    }

    pub fn require_string(&mut self, key: &str) -> Result<String, GtaError> {
        match self.take_string(key) {
            Some(v) if !v.is_empty() => Ok(v),
            _ => Err(GtaError::ConfigMissing {
                section: self.section.clone(),
                key: key.to_string(),
            }),
        }
    }

    pub fn take_int(&mut self, key: &str, default: i64) -> Result<i64, GtaError> {
        match self.take_string(key) {
            None => Ok(default),
            Some(v) => v.parse::<i64>().map_err(|e| GtaError::ConfigInvalid {
                section: self.section.clone(),
                key: key.to_string(),
                reason: e.to_string(),
            }),
        }
    }

    /// Log and drop every parameter no accessor consumed.
    pub fn finish(self, consumer: &str) {
        if self.values.is_empty() {
            return;
        }
        let keys: Vec<&str> = self.values.keys().map(String::as_str).collect();
        tracing::warn!(
            section = %self.section,
            "discarded excess config parameters provided to {consumer}: {}",
            keys.join(", ")
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> ConfigParams {
        ConfigParams::new("main")
            .with("Path", " /tmp/x.db ")
            .with("port", "5433")
            .with("flag", "yes")
            .with("bad port", "abc")
    }

    #[test]
    fn keys_are_normalized() {
        let p = params();
        assert_eq!(p.peek("path"), Some("/tmp/x.db"));
    }

    #[test]
    fn take_consumes() {
        let mut p = params();
        assert_eq!(p.take_string("path").as_deref(), Some("/tmp/x.db"));
        assert_eq!(p.take_string("path"), None);
    }

    #[test]
    fn require_string_missing() {
        let mut p = params();
        match p.require_string("database") {
            Err(GtaError::ConfigMissing { section, key }) => {
                assert_eq!(section, "main");
                assert_eq!(key, "database");
            }
            other => panic!("expected ConfigMissing, got: {other:?}"),
        }
    }

    #[test]
    fn take_int_parses_or_defaults() {
        let mut p = params();
        assert_eq!(p.take_int("port", 5432).unwrap(), 5433);
        assert_eq!(p.take_int("port", 5432).unwrap(), 5432);
        assert!(matches!(
            p.take_int("bad port", 1),
            Err(GtaError::ConfigInvalid { .. })
        ));
    }

    #[test]
    fn finish_tolerates_leftovers() {
        params().finish("Test");
        ConfigParams::new("empty").finish("Test");
    }
}
