//! Database capability and SQL dialect ports.

use crate::domain::error::GtaError;
use crate::domain::orm::Orm;
use crate::domain::schema::ColumnSpec;
use crate::domain::sql_enum::EnumType;
use crate::domain::value::Value;
use crate::ports::resource_port::Resource;

/// Result of one executed statement.
///
/// Values are as the driver produced them; typed decoding against a schema
/// happens in the ORM.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Cursor {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
    /// Rows changed by a statement that returns no rows.
    pub rows_affected: u64,
}

pub trait Database: Resource {
    fn dialect(&self) -> &dyn Dialect;

    /// Execute one statement with positional parameters.
    fn execute(&self, sql: &str, params: &[Value]) -> Result<Cursor, GtaError>;
}

impl dyn Database + '_ {
    pub fn orm(&self) -> Orm<'_> {
        Orm::new(self)
    }
}

/// Per-engine SQL spelling.
pub trait Dialect: Send + Sync {
    fn name(&self) -> &'static str;

    /// Placeholder for the parameter at 1-based `index`.
    fn placeholder(&self, index: usize) -> String;

    /// Placeholder for a parameter compared with or written to `column`.
    fn bind(&self, index: usize, _column: &ColumnSpec) -> String {
        self.placeholder(index)
    }

    /// Expression selecting `column` under its own name.
    fn select_expr(&self, column: &ColumnSpec) -> String {
        column.name.to_string()
    }

    fn qualify(&self, table: &str) -> String {
        table.to_string()
    }

    /// Column type, including any inline check constraint.
    fn column_type(&self, column: &ColumnSpec) -> String;

    /// Everything after the column name for an identity primary key.
    fn identity_column(&self, column: &ColumnSpec) -> String;

    fn create_namespace(&self) -> Option<String> {
        None
    }

    fn create_enum_type(&self, _enum_type: &EnumType) -> Option<String> {
        None
    }
}
