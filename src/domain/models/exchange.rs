use crate::domain::entity::Model;
use crate::domain::schema::{ColumnSpec, DataType, RefAction, Schema};
use std::sync::LazyLock;

pub static EXCHANGE: LazyLock<Schema> = LazyLock::new(|| {
    Schema::new("exchange")
        .column(ColumnSpec::identity("id", DataType::Integer))
        .column(ColumnSpec::new("name", DataType::VarChar(50)).not_null())
        .column(ColumnSpec::new("acronym", DataType::VarChar(50)).not_null())
        .column(ColumnSpec::new("datafeed_src_id", DataType::Integer).not_null())
        .primary_key(&["id"])
        .unique(&["name"])
        .foreign_key("datafeed_src_id", "datafeed_src", RefAction::SetNull, RefAction::Cascade)
});

pub struct Exchange;

impl Model for Exchange {
    fn schema() -> &'static Schema {
        &EXCHANGE
    }
}
