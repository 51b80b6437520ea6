//! Live entity instances with explicit column presence.
//!
//! An [`Entity`] holds one slot per schema column plus the set of columns
//! that are *active*. Only active columns go into INSERT and UPDATE
//! payloads, so a partially loaded or partially built entity never
//! overwrites columns it does not know about.

use crate::domain::error::GtaError;
use crate::domain::orm::{decode_value, Orm, QueryResult};
use crate::domain::query::{Filter, Query, ReturnAs};
use crate::domain::schema::{ColumnSpec, Schema};
use crate::domain::value::Value;
use crate::ports::database_port::Database;
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    schema: &'static Schema,
    values: Vec<Value>,
    active: BTreeSet<usize>,
}

impl Entity {
    pub fn new(schema: &'static Schema) -> Self {
        Self {
            schema,
            values: vec![Value::Null; schema.columns.len()],
            active: BTreeSet::new(),
        }
    }

    /// Entity built from a selected row; every selected column is active.
    pub fn hydrate(
        schema: &'static Schema,
        columns: &[&'static ColumnSpec],
        row: Vec<Value>,
    ) -> Result<Self, GtaError> {
        let mut entity = Self::new(schema);
        for (spec, raw) in columns.iter().zip(row) {
            entity.store(spec.name, decode_value(schema.table, spec, raw)?)?;
        }
        Ok(entity)
    }

    pub fn schema(&self) -> &'static Schema {
        self.schema
    }

    pub fn table(&self) -> &'static str {
        self.schema.table
    }

    /// Set a column and mark it active.
    ///
    /// Values are coerced to the column type: stored text becomes an enum
    /// member, ISO dates become dates, and so on.
    pub fn set(&mut self, column: &str, value: impl Into<Value>) -> Result<(), GtaError> {
        let (_, spec) = self.schema.require_column(column)?;
        let value = decode_value(self.schema.table, spec, value.into())?;
        self.store(column, value)
    }

    pub fn with(mut self, column: &str, value: impl Into<Value>) -> Result<Self, GtaError> {
        self.set(column, value)?;
        Ok(self)
    }

    fn store(&mut self, column: &str, value: Value) -> Result<(), GtaError> {
        let (index, _) = self.schema.require_column(column)?;
        self.values[index] = value;
        self.active.insert(index);
        Ok(())
    }

    /// Value of an active column. Inactive and unknown columns yield `None`.
    pub fn get(&self, column: &str) -> Option<&Value> {
        let index = self.schema.column_index(column)?;
        self.active.contains(&index).then(|| &self.values[index])
    }

    /// Drop a column from the active set, forgetting its value.
    pub fn unset(&mut self, column: &str) -> Result<(), GtaError> {
        let (index, _) = self.schema.require_column(column)?;
        self.values[index] = Value::Null;
        self.active.remove(&index);
        Ok(())
    }

    pub fn is_active(&self, column: &str) -> bool {
        self.schema
            .column_index(column)
            .is_some_and(|i| self.active.contains(&i))
    }

    /// Active column names in schema order.
    pub fn active_columns(&self) -> Vec<&'static str> {
        self.active
            .iter()
            .map(|&i| self.schema.columns[i].name)
            .collect()
    }

    fn active_pairs(&self, keys: bool) -> Vec<(&'static str, Value)> {
        self.active
            .iter()
            .map(|&i| (self.schema.columns[i].name, &self.values[i]))
            .filter(|(name, _)| self.schema.is_key(name) == keys)
            .map(|(name, value)| (name, value.clone()))
            .collect()
    }

    /// Filter selecting this entity's row by its primary key.
    pub fn key_filter(&self) -> Result<Filter, GtaError> {
        let mut conditions = Vec::with_capacity(self.schema.primary_key.len());
        for key in &self.schema.primary_key {
            match self.get(key) {
                Some(value) if !value.is_null() => conditions.push(Filter::eq(*key, value.clone())),
                _ => {
                    return Err(GtaError::InvalidQuery {
                        reason: format!("{} key column `{key}` is not set", self.schema.table),
                    });
                }
            }
        }
        Ok(match conditions.len() {
            1 => conditions.remove(0),
            _ => Filter::and(conditions),
        })
    }

    /// Insert the active columns; key values assigned by the store are
    /// written back and marked active.
    pub fn create(&mut self, db: &dyn Database) -> Result<(), GtaError> {
        let values: Vec<(&str, Value)> = self
            .active
            .iter()
            .map(|&i| (self.schema.columns[i].name, self.values[i].clone()))
            .collect();
        let keys = Orm::new(db).add(self.schema, &values)?;
        for (name, value) in keys {
            self.store(name, value)?;
        }
        Ok(())
    }

    /// Re-read this entity's row by primary key.
    ///
    /// Afterwards the active set is what was active before, plus columns
    /// the store fills by default, plus any column that came back non-null.
    pub fn refresh(&mut self, db: &dyn Database) -> Result<(), GtaError> {
        let query = Query::new().filter(self.key_filter()?);
        let cursor = Orm::new(db)
            .query(self.schema, &query, ReturnAs::RawRows)?
            .into_rows()?;
        let mut rows = cursor.rows;
        let row = match rows.len() {
            0 => {
                return Err(GtaError::NotFound {
                    table: self.schema.table.to_string(),
                });
            }
            1 => rows.remove(0),
            count => {
                return Err(GtaError::AmbiguousResult {
                    table: self.schema.table.to_string(),
                    count,
                });
            }
        };
        for ((index, spec), raw) in self.schema.columns.iter().enumerate().zip(row) {
            let value = decode_value(self.schema.table, spec, raw)?;
            if !value.is_null() || spec.has_server_default() {
                self.active.insert(index);
            }
            self.values[index] = value;
        }
        Ok(())
    }

    /// Write active non-key columns to this entity's row. With none active
    /// no statement is issued and 0 is returned.
    pub fn update(&self, db: &dyn Database) -> Result<u64, GtaError> {
        let filter = self.key_filter()?;
        let values = self.active_pairs(false);
        if values.is_empty() {
            tracing::debug!(table = self.schema.table, "no active non-key columns to update");
            return Ok(0);
        }
        Orm::new(db).update(self.schema, &values, Some(&filter))
    }

    pub fn delete(&self, db: &dyn Database) -> Result<u64, GtaError> {
        let filter = self.key_filter()?;
        Orm::new(db).delete(self.schema, Some(&filter), false)
    }

    /// Active key columns and their values.
    pub fn key_values(&self) -> Vec<(&'static str, Value)> {
        self.active_pairs(true)
    }
}

/// A persisted entity type with a static schema.
pub trait Model {
    fn schema() -> &'static Schema;

    fn new_entity() -> Entity {
        Entity::new(Self::schema())
    }

    fn query_direct(
        db: &dyn Database,
        query: &Query,
        return_as: ReturnAs,
    ) -> Result<QueryResult, GtaError> {
        Orm::new(db).query(Self::schema(), query, return_as)
    }

    fn add_direct(
        db: &dyn Database,
        values: &[(&str, Value)],
    ) -> Result<Vec<(&'static str, Value)>, GtaError> {
        Orm::new(db).add(Self::schema(), values)
    }

    fn update_direct(
        db: &dyn Database,
        values: &[(&str, Value)],
        filter: Option<&Filter>,
    ) -> Result<u64, GtaError> {
        Orm::new(db).update(Self::schema(), values, filter)
    }

    fn delete_direct(
        db: &dyn Database,
        filter: Option<&Filter>,
        really_delete_all: bool,
    ) -> Result<u64, GtaError> {
        Orm::new(db).delete(Self::schema(), filter, really_delete_all)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::identity::{Environment, Identity};
    use crate::domain::schema::DataType;
    use crate::domain::sql_enum::{Market, MARKET};
    use crate::ports::database_port::{Cursor, Dialect};
    use crate::ports::resource_port::{ConnectionState, Resource};
    use std::sync::LazyLock;

    struct QDialect;

    impl Dialect for QDialect {
        fn name(&self) -> &'static str {
            "q"
        }
        fn placeholder(&self, _index: usize) -> String {
            "?".into()
        }
        fn column_type(&self, _column: &ColumnSpec) -> String {
            "TEXT".into()
        }
        fn identity_column(&self, _column: &ColumnSpec) -> String {
            "INTEGER PRIMARY KEY".into()
        }
    }

    /// Answers every statement with the same rows.
    struct CannedDb {
        identity: Identity,
        rows: Vec<Vec<Value>>,
    }

    impl CannedDb {
        fn new(rows: Vec<Vec<Value>>) -> Self {
            Self {
                identity: Identity::database("canned", Environment::Test),
                rows,
            }
        }
    }

    impl Resource for CannedDb {
        fn identity(&self) -> &Identity {
            &self.identity
        }
        fn provider_names(&self) -> &'static [&'static str] {
            &["canned"]
        }
        fn connect(&self) -> Result<ConnectionState, GtaError> {
            Ok(ConnectionState::Stateless)
        }
        fn is_connected(&self) -> bool {
            true
        }
    }

    impl Database for CannedDb {
        fn dialect(&self) -> &dyn Dialect {
            &QDialect
        }
        fn execute(&self, _sql: &str, _params: &[Value]) -> Result<Cursor, GtaError> {
            Ok(Cursor {
                columns: vec!["id".into(), "name".into(), "market".into()],
                rows: self.rows.clone(),
                rows_affected: 0,
            })
        }
    }

    static T: LazyLock<Schema> = LazyLock::new(|| {
        Schema::new("t")
            .column(ColumnSpec::identity("id", DataType::Integer))
            .column(ColumnSpec::new("name", DataType::Text))
            .column(ColumnSpec::new("market", DataType::Enum(&MARKET)))
            .primary_key(&["id"])
    });

    #[test]
    fn set_marks_active_and_coerces() {
        let mut e = Entity::new(&T);
        assert!(e.active_columns().is_empty());
        e.set("market", "crypto").unwrap();
        e.set("name", "x").unwrap();
        assert_eq!(e.active_columns(), vec!["name", "market"]);
        assert_eq!(e.get("market").unwrap().as_enum::<Market>(), Some(Market::Crypto));
        assert_eq!(e.get("id"), None);
    }

    #[test]
    fn set_unknown_column_fails() {
        let mut e = Entity::new(&T);
        assert!(matches!(
            e.set("bogus", 1),
            Err(GtaError::NonexistentColumn { .. })
        ));
        assert!(e.active_columns().is_empty());
    }

    #[test]
    fn unset_clears_presence() {
        let mut e = Entity::new(&T).with("name", "x").unwrap();
        e.unset("name").unwrap();
        assert!(!e.is_active("name"));
        assert_eq!(e.get("name"), None);
    }

    #[test]
    fn key_filter_requires_key() {
        let e = Entity::new(&T).with("name", "x").unwrap();
        assert!(matches!(e.key_filter(), Err(GtaError::InvalidQuery { .. })));
        let e = e.with("id", 4).unwrap();
        assert_eq!(e.key_filter().unwrap(), Filter::eq("id", 4));
        assert_eq!(e.key_values(), vec![("id", Value::Int(4))]);
    }

    #[test]
    fn refresh_with_duplicate_key_rows_is_ambiguous() {
        let row = vec![Value::Int(4), Value::from("x"), Value::from("stock")];
        let db = CannedDb::new(vec![row.clone(), row]);
        let mut e = Entity::new(&T).with("id", 4).unwrap();
        match e.refresh(&db) {
            Err(GtaError::AmbiguousResult { table, count }) => {
                assert_eq!(table, "t");
                assert_eq!(count, 2);
            }
            other => panic!("expected AmbiguousResult, got {other:?}"),
        }
        assert_eq!(e.active_columns(), vec!["id"]);
    }

    #[test]
    fn refresh_single_row_fills_values() {
        let db = CannedDb::new(vec![vec![Value::Int(4), Value::Null, Value::from("forex")]]);
        let mut e = Entity::new(&T).with("id", 4).unwrap();
        e.refresh(&db).unwrap();
        assert_eq!(e.active_columns(), vec!["id", "market"]);
        assert_eq!(e.get("market").unwrap().as_enum::<Market>(), Some(Market::Forex));
    }
}
