//! Resource capability port shared by database and API-client handles.

use crate::domain::identity::{Environment, Identity, ResourceKind};
use crate::ports::database_port::Database;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// A persistent connection or session is open.
    Connected,
    /// The provider keeps no persistent connection.
    Stateless,
}

pub trait Resource: Send + Sync {
    fn identity(&self) -> &Identity;

    /// Names accepted for this provider in the `dbms`/`provider` config key.
    fn provider_names(&self) -> &'static [&'static str];

    /// Open the connection if not already open. Idempotent.
    fn connect(&self) -> Result<ConnectionState, crate::domain::error::GtaError>;

    fn is_connected(&self) -> bool;

    /// True if this handle satisfies every criterion given. `None` criteria
    /// are not checked.
    fn matches_id_criteria(
        &self,
        id: &str,
        env: Option<Environment>,
        provider: Option<&str>,
    ) -> bool {
        let identity = self.identity();
        if identity.id() != id {
            return false;
        }
        if env.is_some_and(|e| e != identity.environment()) {
            return false;
        }
        if let Some(provider) = provider {
            let provider = provider.trim().to_lowercase();
            if !self.provider_names().contains(&provider.as_str()) {
                return false;
            }
        }
        true
    }
}

/// External market-data or brokerage API client.
pub trait ApiClient: Resource {
    fn base_url(&self) -> &str;
}

/// A cached handle of either kind.
#[derive(Clone)]
pub enum Handle {
    Database(Arc<dyn Database>),
    ApiClient(Arc<dyn ApiClient>),
}

impl Handle {
    pub fn kind(&self) -> ResourceKind {
        match self {
            Handle::Database(_) => ResourceKind::Database,
            Handle::ApiClient(_) => ResourceKind::ApiClient,
        }
    }

    pub fn identity(&self) -> &Identity {
        match self {
            Handle::Database(db) => db.identity(),
            Handle::ApiClient(apic) => apic.identity(),
        }
    }

    pub fn connect(&self) -> Result<ConnectionState, crate::domain::error::GtaError> {
        match self {
            Handle::Database(db) => db.connect(),
            Handle::ApiClient(apic) => apic.connect(),
        }
    }

    pub fn matches_id_criteria(
        &self,
        id: &str,
        env: Option<Environment>,
        provider: Option<&str>,
    ) -> bool {
        match self {
            Handle::Database(db) => db.matches_id_criteria(id, env, provider),
            Handle::ApiClient(apic) => apic.matches_id_criteria(id, env, provider),
        }
    }

    pub fn as_database(&self) -> Option<&Arc<dyn Database>> {
        match self {
            Handle::Database(db) => Some(db),
            Handle::ApiClient(_) => None,
        }
    }

    pub fn as_api_client(&self) -> Option<&Arc<dyn ApiClient>> {
        match self {
            Handle::ApiClient(apic) => Some(apic),
            Handle::Database(_) => None,
        }
    }

    /// True if both handles share one allocation.
    pub fn ptr_eq(&self, other: &Handle) -> bool {
        match (self, other) {
            (Handle::Database(a), Handle::Database(b)) => Arc::ptr_eq(a, b),
            (Handle::ApiClient(a), Handle::ApiClient(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl std::fmt::Debug for Handle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Handle").field(self.identity()).finish()
    }
}
