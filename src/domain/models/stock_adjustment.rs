use crate::domain::entity::Model;
use crate::domain::schema::{ColumnSpec, DataType, RefAction, Schema};
use std::sync::LazyLock;

pub static STOCK_ADJUSTMENT: LazyLock<Schema> = LazyLock::new(|| {
    Schema::new("stock_adjustment")
        .column(ColumnSpec::identity("id", DataType::Integer))
        .column(ColumnSpec::new("security_id", DataType::Integer).not_null())
        .column(ColumnSpec::new("date", DataType::Date).not_null())
        .column(ColumnSpec::new("factor", DataType::Double).not_null())
        .column(ColumnSpec::new("dividend", DataType::Double))
        .column(ColumnSpec::new("split_ratio", DataType::Double))
        .column(ColumnSpec::new("datafeed_src_id", DataType::Integer).not_null())
        .primary_key(&["id"])
        .unique(&["security_id", "date", "datafeed_src_id"])
        .foreign_key("security_id", "security", RefAction::Cascade, RefAction::Cascade)
        .foreign_key("datafeed_src_id", "datafeed_src", RefAction::Cascade, RefAction::Cascade)
});

pub struct StockAdjustment;

impl Model for StockAdjustment {
    fn schema() -> &'static Schema {
        &STOCK_ADJUSTMENT
    }
}
