use crate::domain::entity::Model;
use crate::domain::schema::{ColumnSpec, DataType, RefAction, Schema};
use std::sync::LazyLock;

pub static COMPANY: LazyLock<Schema> = LazyLock::new(|| {
    Schema::new("company")
        .column(ColumnSpec::identity("id", DataType::Integer))
        .column(ColumnSpec::new("name", DataType::VarChar(50)).not_null())
        .column(ColumnSpec::new("sector", DataType::VarChar(50)))
        .column(ColumnSpec::new("industry_group", DataType::VarChar(50)))
        .column(ColumnSpec::new("industry_category", DataType::VarChar(50)))
        .column(ColumnSpec::new("cik", DataType::VarChar(10)))
        .column(ColumnSpec::new("sic", DataType::VarChar(4)))
        .column(ColumnSpec::new("datafeed_src_id", DataType::Integer).not_null())
        .primary_key(&["id"])
        .foreign_key("datafeed_src_id", "datafeed_src", RefAction::SetNull, RefAction::Cascade)
});

pub struct Company;

impl Model for Company {
    fn schema() -> &'static Schema {
        &COMPANY
    }
}
