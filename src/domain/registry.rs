//! Process-wide cache of resource handles keyed by identity.
//!
//! A handle is built on first request from its configuration section, by
//! the provider named in that section, then connected and cached for the
//! life of the registry. Concurrent first requests for one identity build
//! it exactly once; failed builds are not cached.

use crate::domain::error::GtaError;
use crate::domain::identity::{Environment, Identity, ResourceKind};
use crate::ports::config_port::{ConfigLookup, ConfigParams};
use crate::ports::database_port::Database;
use crate::ports::resource_port::{ApiClient, Handle};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

type Factory = Box<dyn Fn(Identity, ConfigParams) -> Result<Handle, GtaError> + Send + Sync>;

/// Builds handles of one kind for a set of provider names.
pub struct Provider {
    kind: ResourceKind,
    names: Vec<String>,
    factory: Factory,
}

impl Provider {
    pub fn database<F>(names: &[&str], factory: F) -> Self
    where
        F: Fn(Identity, ConfigParams) -> Result<Arc<dyn Database>, GtaError> + Send + Sync + 'static,
    {
        Self::new(ResourceKind::Database, names, move |identity, params| {
            factory(identity, params).map(Handle::Database)
        })
    }

    pub fn api_client<F>(names: &[&str], factory: F) -> Self
    where
        F: Fn(Identity, ConfigParams) -> Result<Arc<dyn ApiClient>, GtaError> + Send + Sync + 'static,
    {
        Self::new(ResourceKind::ApiClient, names, move |identity, params| {
            factory(identity, params).map(Handle::ApiClient)
        })
    }

    fn new<F>(kind: ResourceKind, names: &[&str], factory: F) -> Self
    where
        F: Fn(Identity, ConfigParams) -> Result<Handle, GtaError> + Send + Sync + 'static,
    {
        Self {
            kind,
            names: names.iter().map(|n| n.trim().to_lowercase()).collect(),
            factory: Box::new(factory),
        }
    }

    fn accepts(&self, kind: ResourceKind, name: &str) -> bool {
        self.kind == kind && self.names.iter().any(|n| *n == name)
    }
}

type Slot = Arc<Mutex<Option<Handle>>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct Registry {
    config: Arc<dyn ConfigLookup>,
    providers: Vec<Provider>,
    slots: Mutex<HashMap<Identity, Slot>>,
}

impl Registry {
    /// Registry with no providers.
    pub fn new(config: Arc<dyn ConfigLookup>) -> Self {
        Self {
            config,
            providers: Vec::new(),
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Registry with every provider compiled into this build.
    pub fn with_default_providers(config: Arc<dyn ConfigLookup>) -> Self {
        let mut registry = Self::new(config);
        for provider in crate::adapters::default_providers() {
            registry.register_provider(provider);
        }
        registry
    }

    /// Later registrations win when names overlap.
    pub fn register_provider(&mut self, provider: Provider) {
        self.providers.insert(0, provider);
    }

    /// Cached handle for `identity`, building and connecting it on a miss.
    pub fn get(&self, identity: &Identity) -> Result<Handle, GtaError> {
        loop {
            let slot = {
                let mut slots = lock(&self.slots);
                Arc::clone(slots.entry(identity.clone()).or_default())
            };
            let mut cached = lock(&slot);
            if let Some(handle) = cached.as_ref() {
                return Ok(handle.clone());
            }
            // A failed build removes its slot; waiters on it start over.
            if !self.holds(identity, &slot) {
                continue;
            }
            return match self.build(identity) {
                Ok(handle) => {
                    *cached = Some(handle.clone());
                    Ok(handle)
                }
                Err(e) => {
                    lock(&self.slots).remove(identity);
                    Err(e)
                }
            };
        }
    }

    fn holds(&self, identity: &Identity, slot: &Slot) -> bool {
        lock(&self.slots)
            .get(identity)
            .is_some_and(|current| Arc::ptr_eq(current, slot))
    }

    fn build(&self, identity: &Identity) -> Result<Handle, GtaError> {
        let kind = identity.kind();
        let mut params = self
            .config
            .lookup(identity)
            .ok_or_else(|| GtaError::ConfigLookup {
                kind: kind.to_string(),
                id: identity.id().to_string(),
                env: identity.environment().to_string(),
            })?;
        let provider_name = params
            .require_string(kind.provider_key())?
            .to_lowercase();
        let provider = self
            .providers
            .iter()
            .find(|p| p.accepts(kind, &provider_name))
            .ok_or_else(|| GtaError::UnsupportedProvider {
                kind: kind.to_string(),
                provider: provider_name.clone(),
            })?;
        tracing::info!(%identity, provider = %provider_name, "building handle");
        let handle = (provider.factory)(identity.clone(), params)?;
        let state = handle.connect()?;
        tracing::info!(%identity, ?state, "handle ready");
        Ok(handle)
    }

    pub fn database(&self, id: &str, env: Environment) -> Result<Arc<dyn Database>, GtaError> {
        let identity = Identity::database(id, env);
        match self.get(&identity)? {
            Handle::Database(db) => Ok(db),
            other => Err(wrong_kind(&identity, &other)),
        }
    }

    pub fn api_client(&self, id: &str, env: Environment) -> Result<Arc<dyn ApiClient>, GtaError> {
        let identity = Identity::api_client(id, env);
        match self.get(&identity)? {
            Handle::ApiClient(apic) => Ok(apic),
            other => Err(wrong_kind(&identity, &other)),
        }
    }

    /// Load every configured resource of `kind` for `env`.
    pub fn load_all(&self, kind: ResourceKind, env: Environment) -> Result<Vec<Handle>, GtaError> {
        self.config
            .ids(kind, env)
            .into_iter()
            .map(|id| self.get(&Identity::new(kind, id, env)))
            .collect()
    }

    /// Cached handles of `kind` matching the given criteria. Never builds.
    pub fn find_loaded(
        &self,
        kind: ResourceKind,
        id: &str,
        env: Option<Environment>,
        provider: Option<&str>,
    ) -> Vec<Handle> {
        let slots: Vec<Slot> = lock(&self.slots).values().cloned().collect();
        slots
            .iter()
            .filter_map(|slot| lock(slot).clone())
            .filter(|h| h.kind() == kind && h.matches_id_criteria(id, env, provider))
            .collect()
    }

    pub fn loaded_count(&self) -> usize {
        let slots: Vec<Slot> = lock(&self.slots).values().cloned().collect();
        slots.iter().filter(|slot| lock(slot).is_some()).count()
    }
}

fn wrong_kind(identity: &Identity, handle: &Handle) -> GtaError {
    GtaError::InvalidQuery {
        reason: format!("{identity} resolved to a {} handle", handle.kind()),
    }
}
