//! Declarative table descriptions and the startup schema registry.

use crate::domain::error::GtaError;
use crate::domain::sql_enum::EnumType;
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    Integer,
    BigInt,
    Boolean,
    Double,
    Text,
    VarChar(u16),
    Date,
    Timestamp,
    Enum(&'static EnumType),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Generated {
    /// Value supplied by the caller.
    No,
    /// Identity column assigned by the store; never written by the caller.
    Identity,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    pub name: &'static str,
    pub data_type: DataType,
    pub nullable: bool,
    /// Raw SQL default expression, emitted verbatim in DDL.
    pub default: Option<&'static str>,
    pub generated: Generated,
}

impl ColumnSpec {
    pub const fn new(name: &'static str, data_type: DataType) -> Self {
        Self {
            name,
            data_type,
            nullable: true,
            default: None,
            generated: Generated::No,
        }
    }

    pub const fn identity(name: &'static str, data_type: DataType) -> Self {
        Self {
            name,
            data_type,
            nullable: false,
            default: None,
            generated: Generated::Identity,
        }
    }

    pub const fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub const fn default_sql(mut self, expr: &'static str) -> Self {
        self.default = Some(expr);
        self
    }

    pub fn enum_type(&self) -> Option<&'static EnumType> {
        match self.data_type {
            DataType::Enum(e) => Some(e),
            _ => None,
        }
    }

    /// True if the store fills this column when the caller leaves it out.
    pub fn has_server_default(&self) -> bool {
        self.generated == Generated::Identity || self.default.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefAction {
    Cascade,
    Restrict,
    SetNull,
}

impl RefAction {
    pub fn as_sql(self) -> &'static str {
        match self {
            RefAction::Cascade => "CASCADE",
            RefAction::Restrict => "RESTRICT",
            RefAction::SetNull => "SET NULL",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKey {
    pub column: &'static str,
    pub references: &'static str,
    pub referenced_column: &'static str,
    pub on_delete: RefAction,
    pub on_update: RefAction,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    pub table: &'static str,
    pub columns: Vec<ColumnSpec>,
    pub primary_key: Vec<&'static str>,
    pub unique: Vec<Vec<&'static str>>,
    pub foreign_keys: Vec<ForeignKey>,
}

impl Schema {
    pub fn new(table: &'static str) -> Self {
        Self {
            table,
            columns: Vec::new(),
            primary_key: Vec::new(),
            unique: Vec::new(),
            foreign_keys: Vec::new(),
        }
    }

    pub fn column(mut self, spec: ColumnSpec) -> Self {
        self.columns.push(spec);
        self
    }

    pub fn primary_key(mut self, columns: &[&'static str]) -> Self {
        self.primary_key = columns.to_vec();
        self
    }

    pub fn unique(mut self, columns: &[&'static str]) -> Self {
        self.unique.push(columns.to_vec());
        self
    }

    pub fn foreign_key(
        mut self,
        column: &'static str,
        references: &'static str,
        on_delete: RefAction,
        on_update: RefAction,
    ) -> Self {
        self.foreign_keys.push(ForeignKey {
            column,
            references,
            referenced_column: "id",
            on_delete,
            on_update,
        });
        self
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn column_spec(&self, name: &str) -> Option<&ColumnSpec> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Resolve a column reference, failing with the offending name.
    pub fn require_column(&self, name: &str) -> Result<(usize, &ColumnSpec), GtaError> {
        self.columns
            .iter()
            .enumerate()
            .find(|(_, c)| c.name == name)
            .ok_or_else(|| GtaError::NonexistentColumn {
                table: self.table.to_string(),
                column: name.to_string(),
            })
    }

    pub fn is_key(&self, name: &str) -> bool {
        self.primary_key.iter().any(|k| *k == name)
    }

    /// Enum types referenced by this table's columns.
    pub fn enum_types(&self) -> impl Iterator<Item = &'static EnumType> + '_ {
        self.columns.iter().filter_map(ColumnSpec::enum_type)
    }

    fn validate(&self) -> Result<(), GtaError> {
        let mut seen = HashSet::new();
        for column in &self.columns {
            if !seen.insert(column.name) {
                return Err(GtaError::InvalidQuery {
                    reason: format!(
                        "column `{}` declared twice in {}",
                        column.name, self.table
                    ),
                });
            }
        }
        let referenced = self
            .primary_key
            .iter()
            .chain(self.unique.iter().flatten())
            .chain(self.foreign_keys.iter().map(|fk| &fk.column));
        for name in referenced {
            self.require_column(name)?;
        }
        if self.primary_key.is_empty() {
            return Err(GtaError::InvalidQuery {
                reason: format!("{} has no primary key", self.table),
            });
        }
        Ok(())
    }
}

/// Every schema the ORM may touch, keyed by unique table name.
///
/// Registration order is creation order, so tables referenced by foreign
/// keys must be registered first.
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    schemas: Vec<&'static Schema>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, schema: &'static Schema) -> Result<(), GtaError> {
        if self.get(schema.table).is_some() {
            return Err(GtaError::DuplicateTable {
                table: schema.table.to_string(),
            });
        }
        schema.validate()?;
        for fk in &schema.foreign_keys {
            if fk.references != schema.table && self.get(fk.references).is_none() {
                return Err(GtaError::InvalidQuery {
                    reason: format!(
                        "{}.{} references unregistered table {}",
                        schema.table, fk.column, fk.references
                    ),
                });
            }
        }
        self.schemas.push(schema);
        Ok(())
    }

    pub fn with(mut self, schema: &'static Schema) -> Result<Self, GtaError> {
        self.register(schema)?;
        Ok(self)
    }

    pub fn get(&self, table: &str) -> Option<&'static Schema> {
        self.schemas.iter().copied().find(|s| s.table == table)
    }

    pub fn schemas(&self) -> &[&'static Schema] {
        &self.schemas
    }

    /// Distinct enum types used by registered tables, in first-use order.
    pub fn enum_types(&self) -> Vec<&'static EnumType> {
        let mut out: Vec<&'static EnumType> = Vec::new();
        for schema in &self.schemas {
            for enum_type in schema.enum_types() {
                if !out.contains(&enum_type) {
                    out.push(enum_type);
                }
            }
        }
        out
    }
}
