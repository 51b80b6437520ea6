//! ORM engine: runs compiled statements through a database handle and
//! shapes the results.

use crate::domain::entity::Entity;
use crate::domain::error::GtaError;
use crate::domain::query::{Filter, Query, ReturnAs};
use crate::domain::schema::{ColumnSpec, DataType, Schema, SchemaRegistry};
use crate::domain::sql_builder::{SqlBuilder, Statement};
use crate::domain::value::Value;
use crate::ports::database_port::{Cursor, Database};
use chrono::{DateTime, NaiveDate, Utc};

#[derive(Debug, Clone, PartialEq)]
pub enum QueryResult {
    Entities(Vec<Entity>),
    Rows(Cursor),
    Count(u64),
}

impl QueryResult {
    pub fn into_entities(self) -> Result<Vec<Entity>, GtaError> {
        match self {
            QueryResult::Entities(entities) => Ok(entities),
            other => Err(unexpected_shape("entities", &other)),
        }
    }

    pub fn into_rows(self) -> Result<Cursor, GtaError> {
        match self {
            QueryResult::Rows(cursor) => Ok(cursor),
            other => Err(unexpected_shape("rows", &other)),
        }
    }

    pub fn into_count(self) -> Result<u64, GtaError> {
        match self {
            QueryResult::Count(n) => Ok(n),
            other => Err(unexpected_shape("a count", &other)),
        }
    }

    fn shape(&self) -> &'static str {
        match self {
            QueryResult::Entities(_) => "entities",
            QueryResult::Rows(_) => "rows",
            QueryResult::Count(_) => "a count",
        }
    }
}

fn unexpected_shape(wanted: &str, got: &QueryResult) -> GtaError {
    GtaError::InvalidQuery {
        reason: format!("expected {wanted} but the query returned {}", got.shape()),
    }
}

/// Convert a driver value into the canonical value for `column`.
pub fn decode_value(table: &str, column: &ColumnSpec, raw: Value) -> Result<Value, GtaError> {
    let mismatch = |raw: &Value, detail: &str| GtaError::InvalidQuery {
        reason: format!("{table}.{} cannot hold `{raw}`{detail}", column.name),
    };
    match (column.data_type, raw) {
        (_, Value::Null) => Ok(Value::Null),
        (DataType::Enum(enum_type), Value::Text(stored)) => enum_type.member(&stored).map(Value::Enum),
        (DataType::Enum(enum_type), Value::Enum(member)) if member.enum_type() == enum_type => {
            Ok(Value::Enum(member))
        }
        (DataType::Integer | DataType::BigInt, v @ Value::Int(_)) => Ok(v),
        (DataType::Integer | DataType::BigInt, Value::Float(f))
            if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 =>
        {
            Ok(Value::Int(f as i64))
        }
        (DataType::Boolean, v @ Value::Bool(_)) => Ok(v),
        (DataType::Boolean, Value::Int(i)) => Ok(Value::Bool(i != 0)),
        (DataType::Double, v @ Value::Float(_)) => Ok(v),
        (DataType::Double, Value::Int(i)) => Ok(Value::Float(i as f64)),
        (DataType::Text | DataType::VarChar(_), v @ Value::Text(_)) => Ok(v),
        (DataType::Date, v @ Value::Date(_)) => Ok(v),
        (DataType::Date, Value::Text(s)) => match NaiveDate::parse_from_str(&s, "%Y-%m-%d") {
            Ok(date) => Ok(Value::Date(date)),
            Err(e) => Err(mismatch(&Value::Text(s), &format!(": {e}"))),
        },
        (DataType::Timestamp, v @ Value::Timestamp(_)) => Ok(v),
        (DataType::Timestamp, Value::Text(s)) => match DateTime::parse_from_rfc3339(&s) {
            Ok(ts) => Ok(Value::Timestamp(ts.with_timezone(&Utc))),
            Err(e) => Err(mismatch(&Value::Text(s), &format!(": {e}"))),
        },
        (_, other) => Err(mismatch(&other, "")),
    }
}

/// Executes entity operations against one database handle.
#[derive(Clone, Copy)]
pub struct Orm<'a> {
    db: &'a dyn Database,
}

impl<'a> Orm<'a> {
    pub fn new(db: &'a dyn Database) -> Self {
        Self { db }
    }

    pub fn builder(&self, schema: &'static Schema) -> SqlBuilder<'a> {
        SqlBuilder::new(self.db.dialect(), schema)
    }

    fn run(&self, stmt: &Statement) -> Result<Cursor, GtaError> {
        tracing::debug!(
            db = %self.db.identity(),
            sql = %stmt.sql,
            params = stmt.params.len(),
            "executing statement"
        );
        self.db.execute(&stmt.sql, &stmt.params)
    }

    /// Insert one row and return the primary key values the store assigned.
    pub fn add(
        &self,
        schema: &'static Schema,
        values: &[(&str, Value)],
    ) -> Result<Vec<(&'static str, Value)>, GtaError> {
        let stmt = self.builder(schema).insert(values)?;
        let cursor = self.run(&stmt)?;
        let Some(row) = cursor.rows.into_iter().next() else {
            return Err(GtaError::DatabaseQuery {
                reason: format!("insert into {} returned no key", schema.table),
            });
        };
        schema
            .primary_key
            .iter()
            .zip(row)
            .map(|(name, raw)| {
                let (_, spec) = schema.require_column(name)?;
                Ok((spec.name, decode_value(schema.table, spec, raw)?))
            })
            .collect()
    }

    /// Update every row matching `filter`; an empty `values` is a no-op that
    /// issues no statement.
    pub fn update(
        &self,
        schema: &'static Schema,
        values: &[(&str, Value)],
        filter: Option<&Filter>,
    ) -> Result<u64, GtaError> {
        let builder = self.builder(schema);
        if values.is_empty() {
            if let Some(filter) = filter {
                builder.validate_filter(filter)?;
            }
            tracing::debug!(table = schema.table, "update with no columns skipped");
            return Ok(0);
        }
        let stmt = builder.update(values, filter)?;
        Ok(self.run(&stmt)?.rows_affected)
    }

    pub fn delete(
        &self,
        schema: &'static Schema,
        filter: Option<&Filter>,
        really_delete_all: bool,
    ) -> Result<u64, GtaError> {
        let stmt = self.builder(schema).delete(filter, really_delete_all)?;
        Ok(self.run(&stmt)?.rows_affected)
    }

    pub fn query(
        &self,
        schema: &'static Schema,
        query: &Query,
        return_as: ReturnAs,
    ) -> Result<QueryResult, GtaError> {
        let builder = self.builder(schema);
        match return_as {
            ReturnAs::CountOnly => {
                let cursor = self.run(&builder.count(query)?)?;
                let count = cursor
                    .rows
                    .first()
                    .and_then(|row| row.first())
                    .and_then(Value::as_i64)
                    .ok_or_else(|| GtaError::DatabaseQuery {
                        reason: format!("count over {} returned no number", schema.table),
                    })?;
                Ok(QueryResult::Count(count.max(0) as u64))
            }
            ReturnAs::RawRows => Ok(QueryResult::Rows(self.run(&builder.select(query)?)?)),
            ReturnAs::Entities => {
                let columns = builder.selected_columns(query)?;
                let cursor = self.run(&builder.select(query)?)?;
                let entities = cursor
                    .rows
                    .into_iter()
                    .map(|row| Entity::hydrate(schema, &columns, row))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(QueryResult::Entities(entities))
            }
        }
    }

    /// Create the namespace, enum types and tables of `registry` if missing.
    pub fn create_schemas(&self, registry: &SchemaRegistry) -> Result<(), GtaError> {
        let dialect = self.db.dialect();
        if let Some(sql) = dialect.create_namespace() {
            self.run_ddl(sql)?;
        }
        for enum_type in registry.enum_types() {
            if let Some(sql) = dialect.create_enum_type(enum_type) {
                self.run_ddl(sql)?;
            }
        }
        for &schema in registry.schemas() {
            self.run_ddl(self.builder(schema).create_table())?;
        }
        tracing::info!(
            db = %self.db.identity(),
            tables = registry.schemas().len(),
            "schema ensured"
        );
        Ok(())
    }

    fn run_ddl(&self, sql: String) -> Result<(), GtaError> {
        self.run(&Statement {
            sql,
            params: Vec::new(),
        })
        .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::sql_enum::{Market, MARKET};

    fn col(data_type: DataType) -> ColumnSpec {
        ColumnSpec::new("c", data_type)
    }

    #[test]
    fn decodes_driver_representations() {
        assert_eq!(
            decode_value("t", &col(DataType::Enum(&MARKET)), Value::Text("stock".into())).unwrap(),
            Value::from(Market::Stock)
        );
        assert_eq!(
            decode_value("t", &col(DataType::Boolean), Value::Int(1)).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            decode_value("t", &col(DataType::Double), Value::Int(2)).unwrap(),
            Value::Float(2.0)
        );
        assert_eq!(
            decode_value("t", &col(DataType::Date), Value::Text("2021-03-04".into())).unwrap(),
            Value::Date(NaiveDate::from_ymd_opt(2021, 3, 4).unwrap())
        );
        let ts = decode_value(
            "t",
            &col(DataType::Timestamp),
            Value::Text("2021-03-04T10:00:00+00:00".into()),
        )
        .unwrap();
        assert_eq!(ts.as_timestamp().unwrap().to_rfc3339(), "2021-03-04T10:00:00+00:00");
        assert_eq!(decode_value("t", &col(DataType::Text), Value::Null).unwrap(), Value::Null);
        assert_eq!(
            decode_value("t", &col(DataType::BigInt), Value::Float(7.0)).unwrap(),
            Value::Int(7)
        );
        assert!(decode_value("t", &col(DataType::Integer), Value::Float(7.25)).is_err());
    }

    #[test]
    fn rejects_mismatched_values() {
        assert!(matches!(
            decode_value("t", &col(DataType::Enum(&MARKET)), Value::Text("bonds".into())),
            Err(GtaError::UnknownEnumMember { .. })
        ));
        assert!(matches!(
            decode_value("t", &col(DataType::Integer), Value::Text("1".into())),
            Err(GtaError::InvalidQuery { .. })
        ));
        assert!(decode_value("t", &col(DataType::Date), Value::Text("03/04/2021".into())).is_err());
    }

    #[test]
    fn result_shape_accessors() {
        assert_eq!(QueryResult::Count(3).into_count().unwrap(), 3);
        assert!(QueryResult::Count(3).into_entities().is_err());
        assert!(QueryResult::Rows(Cursor::default()).into_rows().is_ok());
    }
}
