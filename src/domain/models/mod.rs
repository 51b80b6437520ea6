//! Application entity models.

pub mod company;
pub mod datafeed_src;
pub mod exchange;
pub mod security;
pub mod security_price;
pub mod stock_adjustment;

pub use company::{Company, COMPANY};
pub use datafeed_src::{DatafeedSrc, DATAFEED_SRC};
pub use exchange::{Exchange, EXCHANGE};
pub use security::{Security, SECURITY};
pub use security_price::{SecurityPrice, SECURITY_PRICE};
pub use stock_adjustment::{StockAdjustment, STOCK_ADJUSTMENT};

use crate::domain::error::GtaError;
use crate::domain::schema::SchemaRegistry;

impl SchemaRegistry {
    /// Every application table, referenced tables first.
    pub fn standard() -> Result<Self, GtaError> {
        SchemaRegistry::new()
            .with(&DATAFEED_SRC)?
            .with(&COMPANY)?
            .with(&EXCHANGE)?
            .with(&SECURITY)?
            .with(&SECURITY_PRICE)?
            .with(&STOCK_ADJUSTMENT)
    }
}
