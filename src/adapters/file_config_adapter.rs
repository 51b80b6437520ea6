//! INI file configuration adapter.
//!
//! A config directory holds `databases.conf` and `apics.conf`, with one
//! section per resource id, plus an optional `.secrets.conf` whose
//! `database::<id>` and `apic::<id>` sections override keys of the matching
//! resource. Every resource section names its environment in `env`.

use crate::domain::error::GtaError;
use crate::domain::identity::{Environment, Identity, ResourceKind};
use crate::ports::config_port::{ConfigLookup, ConfigParams};
use configparser::ini::Ini;
use std::collections::HashMap;
use std::path::Path;

pub const DATABASES_FILE: &str = "databases.conf";
pub const APICS_FILE: &str = "apics.conf";
pub const SECRETS_FILE: &str = ".secrets.conf";

type Sections = HashMap<String, HashMap<String, Option<String>>>;

pub struct FileConfigAdapter {
    databases: Sections,
    apics: Sections,
    secrets: Sections,
}

impl FileConfigAdapter {
    /// Load the config files from `dir`. Absent files count as empty.
    pub fn from_dir<P: AsRef<Path>>(dir: P) -> Result<Self, GtaError> {
        let dir = dir.as_ref();
        let load = |name: &str| -> Result<Sections, GtaError> {
            let path = dir.join(name);
            if !path.exists() {
                tracing::debug!(path = %path.display(), "config file absent");
                return Ok(Sections::new());
            }
            let mut ini = Ini::new();
            ini.load(&path).map_err(|reason| GtaError::ConfigParse {
                file: path.display().to_string(),
                reason,
            })
        };
        Ok(Self {
            databases: load(DATABASES_FILE)?,
            apics: load(APICS_FILE)?,
            secrets: load(SECRETS_FILE)?,
        })
    }

    pub fn from_strings(databases: &str, apics: &str, secrets: &str) -> Result<Self, GtaError> {
        let parse = |file: &str, content: &str| -> Result<Sections, GtaError> {
            let mut ini = Ini::new();
            ini.read(content.to_string())
                .map_err(|reason| GtaError::ConfigParse {
                    file: file.to_string(),
                    reason,
                })
        };
        Ok(Self {
            databases: parse(DATABASES_FILE, databases)?,
            apics: parse(APICS_FILE, apics)?,
            secrets: parse(SECRETS_FILE, secrets)?,
        })
    }

    fn sections(&self, kind: ResourceKind) -> &Sections {
        match kind {
            ResourceKind::Database => &self.databases,
            ResourceKind::ApiClient => &self.apics,
        }
    }

    fn section_env(id: &str, section: &HashMap<String, Option<String>>) -> Option<Environment> {
        let raw = section.get("env").cloned().flatten()?;
        match raw.parse::<Environment>() {
            Ok(env) => Some(env),
            Err(e) => {
                tracing::warn!(section = id, "ignoring section: {e}");
                None
            }
        }
    }

    fn secrets_for(&self, kind: ResourceKind, id: &str) -> Option<&HashMap<String, Option<String>>> {
        self.secrets.iter().find_map(|(name, section)| {
            let (prefix, secret_id) = name.split_once("::")?;
            let matches = prefix.trim().eq_ignore_ascii_case(kind.secrets_prefix())
                && secret_id.trim().eq_ignore_ascii_case(id.trim());
            matches.then_some(section)
        })
    }
}

impl ConfigLookup for FileConfigAdapter {
    fn lookup(&self, identity: &Identity) -> Option<ConfigParams> {
        let id = identity.id().trim().to_lowercase();
        let section = self.sections(identity.kind()).get(&id)?;
        if Self::section_env(&id, section)? != identity.environment() {
            return None;
        }
        let mut params = ConfigParams::new(identity.id());
        let secrets = self.secrets_for(identity.kind(), &id).into_iter().flatten();
        for (key, value) in section.iter().chain(secrets) {
            if key == "env" {
                continue;
            }
            if let Some(value) = value {
                params.insert(key, value.as_str());
            }
        }
        Some(params)
    }

    fn ids(&self, kind: ResourceKind, env: Environment) -> Vec<String> {
        let mut ids: Vec<String> = self
            .sections(kind)
            .iter()
            .filter(|(id, section)| Self::section_env(id, section) == Some(env))
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }
}
