//! Concrete adapter implementations for ports.

pub mod alpaca_adapter;
pub mod alphavantage_adapter;
pub mod file_config_adapter;
#[cfg(feature = "postgres")]
pub mod postgres_adapter;
#[cfg(feature = "sqlite")]
pub mod sqlite_adapter;

use crate::domain::registry::Provider;
use crate::ports::database_port::Database;
use crate::ports::resource_port::ApiClient;
use std::sync::Arc;

/// Providers for every handle type compiled into this build.
pub fn default_providers() -> Vec<Provider> {
    let mut providers = vec![
        Provider::api_client(alphavantage_adapter::PROVIDER_NAMES, |identity, params| {
            let client = alphavantage_adapter::AlphaVantageClient::from_config(identity, params)?;
            Ok(Arc::new(client) as Arc<dyn ApiClient>)
        }),
        Provider::api_client(alpaca_adapter::PROVIDER_NAMES, |identity, params| {
            let client = alpaca_adapter::AlpacaClient::from_config(identity, params)?;
            Ok(Arc::new(client) as Arc<dyn ApiClient>)
        }),
    ];
    #[cfg(feature = "sqlite")]
    providers.push(Provider::database(
        sqlite_adapter::PROVIDER_NAMES,
        |identity, params| {
            let db = sqlite_adapter::SqliteDatabase::from_config(identity, params)?;
            Ok(Arc::new(db) as Arc<dyn Database>)
        },
    ));
    #[cfg(feature = "postgres")]
    providers.push(Provider::database(
        postgres_adapter::PROVIDER_NAMES,
        |identity, params| {
            let db = postgres_adapter::PostgresDatabase::from_config(identity, params)?;
            Ok(Arc::new(db) as Arc<dyn Database>)
        },
    ));
    providers
}
