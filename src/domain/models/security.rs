//! Tradable securities, one per exchange and ticker.

use crate::domain::entity::Model;
use crate::domain::schema::{ColumnSpec, DataType, RefAction, Schema};
use crate::domain::sql_enum::{CURRENCY, MARKET};
use std::sync::LazyLock;

pub static SECURITY: LazyLock<Schema> = LazyLock::new(|| {
    Schema::new("security")
        .column(ColumnSpec::identity("id", DataType::Integer))
        .column(ColumnSpec::new("exchange_id", DataType::Integer).not_null())
        .column(ColumnSpec::new("ticker", DataType::VarChar(12)).not_null())
        .column(ColumnSpec::new("market", DataType::Enum(&MARKET)).not_null())
        .column(ColumnSpec::new("name", DataType::VarChar(200)).not_null())
        .column(ColumnSpec::new("company_id", DataType::Integer).not_null())
        .column(ColumnSpec::new("currency", DataType::Enum(&CURRENCY)).not_null())
        .column(ColumnSpec::new("datafeed_src_id", DataType::Integer).not_null())
        .primary_key(&["id"])
        .unique(&["exchange_id", "ticker"])
        .foreign_key("exchange_id", "exchange", RefAction::Restrict, RefAction::Cascade)
        .foreign_key("company_id", "company", RefAction::Restrict, RefAction::Cascade)
        .foreign_key("datafeed_src_id", "datafeed_src", RefAction::SetNull, RefAction::Cascade)
});

pub struct Security;

impl Model for Security {
    fn schema() -> &'static Schema {
        &SECURITY
    }
}
