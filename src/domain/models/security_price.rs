//! Price bars per security, frequency and source.

use crate::domain::entity::Model;
use crate::domain::schema::{ColumnSpec, DataType, RefAction, Schema};
use crate::domain::sql_enum::PRICE_FREQUENCY;
use std::sync::LazyLock;

pub static SECURITY_PRICE: LazyLock<Schema> = LazyLock::new(|| {
    Schema::new("security_price")
        .column(ColumnSpec::identity("id", DataType::BigInt))
        .column(ColumnSpec::new("security_id", DataType::Integer).not_null())
        .column(ColumnSpec::new("datetime", DataType::Timestamp).not_null())
        .column(ColumnSpec::new("raw_open", DataType::Double))
        .column(ColumnSpec::new("raw_close", DataType::Double))
        .column(ColumnSpec::new("raw_high", DataType::Double))
        .column(ColumnSpec::new("raw_low", DataType::Double))
        .column(ColumnSpec::new("raw_volume", DataType::Double))
        .column(ColumnSpec::new("adj_open", DataType::Double))
        .column(ColumnSpec::new("adj_close", DataType::Double))
        .column(ColumnSpec::new("adj_high", DataType::Double))
        .column(ColumnSpec::new("adj_low", DataType::Double))
        .column(ColumnSpec::new("adj_volume", DataType::Double))
        .column(ColumnSpec::new("is_intraperiod", DataType::Boolean).not_null())
        .column(ColumnSpec::new("frequency", DataType::Enum(&PRICE_FREQUENCY)).not_null())
        .column(ColumnSpec::new("datafeed_src_id", DataType::Integer).not_null())
        .primary_key(&["id"])
        .unique(&["security_id", "datetime", "datafeed_src_id"])
        .foreign_key("security_id", "security", RefAction::Cascade, RefAction::Cascade)
        .foreign_key("datafeed_src_id", "datafeed_src", RefAction::SetNull, RefAction::Cascade)
});

pub struct SecurityPrice;

impl Model for SecurityPrice {
    fn schema() -> &'static Schema {
        &SECURITY_PRICE
    }
}
