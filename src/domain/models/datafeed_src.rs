//! Data feed sources. Every other table points here for provenance.

use crate::domain::entity::Model;
use crate::domain::schema::{ColumnSpec, DataType, Schema};
use std::sync::LazyLock;

pub static DATAFEED_SRC: LazyLock<Schema> = LazyLock::new(|| {
    Schema::new("datafeed_src")
        .column(ColumnSpec::identity("id", DataType::Integer))
        .column(ColumnSpec::new("config_parser", DataType::Text).not_null())
        .column(ColumnSpec::new("is_init_complete", DataType::Boolean).default_sql("false"))
        .column(ColumnSpec::new("progress_marker", DataType::Text))
        .primary_key(&["id"])
        .unique(&["config_parser"])
});

pub struct DatafeedSrc;

impl Model for DatafeedSrc {
    fn schema() -> &'static Schema {
        &DATAFEED_SRC
    }
}
