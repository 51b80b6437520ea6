//! Alpaca broker API client handle.
//!
//! Unlike Alpha Vantage, Alpaca keeps an authenticated session per handle.
//! `connect` opens it once from the configured credentials; later calls
//! reuse it.

use crate::domain::error::GtaError;
use crate::domain::identity::Identity;
use crate::ports::config_port::ConfigParams;
use crate::ports::resource_port::{ApiClient, ConnectionState, Resource};
use std::sync::{Mutex, MutexGuard, PoisonError};

pub const PROVIDER_NAMES: &[&str] = &["alpaca", "apca"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeDomain {
    Live,
    Paper,
}

impl TradeDomain {
    fn base_url(self) -> &'static str {
        match self {
            TradeDomain::Live => "https://api.alpaca.markets",
            TradeDomain::Paper => "https://paper-api.alpaca.markets",
        }
    }
}

/// Credentials sent with every request of an open session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub key_id: String,
    secret_key: String,
}

impl Session {
    pub fn auth_headers(&self) -> [(&'static str, &str); 2] {
        [
            ("APCA-API-KEY-ID", self.key_id.as_str()),
            ("APCA-API-SECRET-KEY", self.secret_key.as_str()),
        ]
    }
}

pub struct AlpacaClient {
    identity: Identity,
    section: String,
    trade_domain: TradeDomain,
    key_id: Option<String>,
    secret_key: Option<String>,
    session: Mutex<Option<Session>>,
}

impl AlpacaClient {
    /// Keys: `trade domain` (`live` or `paper`), and `api key id` and
    /// `secret key`, normally from the secrets file.
    pub fn from_config(identity: Identity, mut params: ConfigParams) -> Result<Self, GtaError> {
        let section = params.section().to_string();
        let domain = params.require_string("trade domain")?;
        let trade_domain = match domain.to_lowercase().as_str() {
            "live" => TradeDomain::Live,
            "paper" => TradeDomain::Paper,
            other => {
                return Err(GtaError::ConfigInvalid {
                    section,
                    key: "trade domain".into(),
                    reason: format!("expected `live` or `paper`, got `{other}`"),
                });
            }
        };
        let key_id = params.take_string("api key id");
        let secret_key = params.take_string("secret key");
        params.finish("AlpacaClient");
        Ok(Self {
            identity,
            section,
            trade_domain,
            key_id,
            secret_key,
            session: Mutex::new(None),
        })
    }

    pub fn trade_domain(&self) -> TradeDomain {
        self.trade_domain
    }

    /// The open session, if `connect` has succeeded.
    pub fn session(&self) -> Option<Session> {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, Option<Session>> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn credential(&self, value: &Option<String>, key: &str) -> Result<String, GtaError> {
        match value {
            Some(v) if !v.is_empty() => Ok(v.clone()),
            _ => Err(GtaError::ConfigMissing {
                section: self.section.clone(),
                key: key.to_string(),
            }),
        }
    }
}

impl Resource for AlpacaClient {
    fn identity(&self) -> &Identity {
        &self.identity
    }

    fn provider_names(&self) -> &'static [&'static str] {
        PROVIDER_NAMES
    }

    fn connect(&self) -> Result<ConnectionState, GtaError> {
        let mut session = self.lock();
        if session.is_none() {
            let opened = Session {
                key_id: self.credential(&self.key_id, "api key id")?,
                secret_key: self.credential(&self.secret_key, "secret key")?,
            };
            tracing::info!(
                identity = %self.identity,
                domain = ?self.trade_domain,
                "opened Alpaca session"
            );
            *session = Some(opened);
        }
        Ok(ConnectionState::Connected)
    }

    fn is_connected(&self) -> bool {
        self.lock().is_some()
    }
}

impl ApiClient for AlpacaClient {
    fn base_url(&self) -> &str {
        self.trade_domain.base_url()
    }
}
