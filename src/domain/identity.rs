//! Resource identity: the `(kind, id, environment)` triple naming a handle.

use crate::domain::error::GtaError;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKind {
    Database,
    ApiClient,
}

impl ResourceKind {
    /// Config key naming the concrete provider for this kind.
    pub fn provider_key(self) -> &'static str {
        match self {
            ResourceKind::Database => "dbms",
            ResourceKind::ApiClient => "provider",
        }
    }

    /// Prefix of the matching section in the secrets file.
    pub fn secrets_prefix(self) -> &'static str {
        match self {
            ResourceKind::Database => "database",
            ResourceKind::ApiClient => "apic",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::Database => write!(f, "database"),
            ResourceKind::ApiClient => write!(f, "api client"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Environment {
    Prod,
    Dev,
    Test,
}

impl Environment {
    pub fn as_str(self) -> &'static str {
        match self {
            Environment::Prod => "prod",
            Environment::Dev => "dev",
            Environment::Test => "test",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = GtaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "prod" | "production" => Ok(Environment::Prod),
            "dev" | "development" => Ok(Environment::Dev),
            "test" | "testing" => Ok(Environment::Test),
            other => Err(GtaError::ConfigInvalid {
                section: "env".into(),
                key: "env".into(),
                reason: format!("unknown environment `{other}`"),
            }),
        }
    }
}

/// Immutable key of the registry cache. Equal iff all three fields match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identity {
    kind: ResourceKind,
    id: String,
    environment: Environment,
}

impl Identity {
    pub fn new(kind: ResourceKind, id: impl Into<String>, environment: Environment) -> Self {
        Self {
            kind,
            id: id.into(),
            environment,
        }
    }

    pub fn database(id: impl Into<String>, environment: Environment) -> Self {
        Self::new(ResourceKind::Database, id, environment)
    }

    pub fn api_client(id: impl Into<String>, environment: Environment) -> Self {
        Self::new(ResourceKind::ApiClient, id, environment)
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn environment(&self) -> Environment {
        self.environment
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} `{}` ({})", self.kind, self.id, self.environment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn environment_parses_aliases() {
        assert_eq!("prod".parse::<Environment>().unwrap(), Environment::Prod);
        assert_eq!(
            " Development ".parse::<Environment>().unwrap(),
            Environment::Dev
        );
        assert_eq!("TEST".parse::<Environment>().unwrap(), Environment::Test);
    }

    #[test]
    fn environment_rejects_unknown() {
        match "staging".parse::<Environment>() {
            Err(GtaError::ConfigInvalid { reason, .. }) => {
                assert!(reason.contains("staging"));
            }
            other => panic!("expected ConfigInvalid, got: {other:?}"),
        }
    }

    #[test]
    fn identity_equality_requires_all_fields() {
        let a = Identity::database("main", Environment::Test);
        assert_eq!(a, Identity::database("main", Environment::Test));
        assert_ne!(a, Identity::database("main", Environment::Prod));
        assert_ne!(a, Identity::database("other", Environment::Test));
        assert_ne!(a, Identity::api_client("main", Environment::Test));

        let set: HashSet<Identity> = [a.clone(), a.clone()].into_iter().collect();
        assert_eq!(set.len(), 1);
    }
}
