//! Alpha Vantage API client handle.
//!
//! The service is plain HTTPS with a per-request key, so there is no session
//! to open and the handle reports itself stateless.

use crate::domain::error::GtaError;
use crate::domain::identity::Identity;
use crate::ports::config_port::ConfigParams;
use crate::ports::resource_port::{ApiClient, ConnectionState, Resource};

pub const PROVIDER_NAMES: &[&str] = &["alpha vantage", "alphavantage", "alphav", "av"];

const DEFAULT_BASE_URL: &str = "https://www.alphavantage.co/query";

pub struct AlphaVantageClient {
    identity: Identity,
    base_url: String,
    api_key: Option<String>,
}

impl AlphaVantageClient {
    /// Keys: `api key` (usually from the secrets file), `base url`.
    pub fn from_config(identity: Identity, mut params: ConfigParams) -> Result<Self, GtaError> {
        let api_key = params.take_string("api key");
        if api_key.is_none() {
            tracing::warn!(%identity, "no api key configured");
        }
        let base_url = params
            .take_string("base url")
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        params.finish("AlphaVantageClient");
        Ok(Self {
            identity,
            base_url,
            api_key,
        })
    }

    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref()
    }
}

impl Resource for AlphaVantageClient {
    fn identity(&self) -> &Identity {
        &self.identity
    }

    fn provider_names(&self) -> &'static [&'static str] {
        PROVIDER_NAMES
    }

    fn connect(&self) -> Result<ConnectionState, GtaError> {
        Ok(ConnectionState::Stateless)
    }

    fn is_connected(&self) -> bool {
        false
    }
}

impl ApiClient for AlphaVantageClient {
    fn base_url(&self) -> &str {
        &self.base_url
    }
}
